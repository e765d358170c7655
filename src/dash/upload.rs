// Upload of a pair of exports for a batch.

use std::collections::HashSet;
use std::sync::Mutex;

use crate::dash::io_common::{decode, SpreadsheetKind};
use crate::dash::*;

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct UploadFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct UploadOutcome {
    pub records: usize,
    pub storage_key: String,
}

/// Checks an upload before anything is read: exactly two files, each of them
/// an Excel or a CSV file.
pub fn check_file_names(names: &[String]) -> DashResult<()> {
    if names.len() != 2 {
        return InvalidFileCountSnafu { count: names.len() }.fail();
    }
    for name in names.iter() {
        if SpreadsheetKind::from_file_name(name).is_none() {
            return UnsupportedFileTypeSnafu { name: name.clone() }.fail();
        }
    }
    Ok(())
}

/// Marks a batch as being uploaded, until dropped.
pub struct UploadGuard<'a> {
    in_flight: &'a Mutex<HashSet<Scope>>,
    scope: Scope,
}

impl<'a> Drop for UploadGuard<'a> {
    fn drop(&mut self) {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        in_flight.remove(&self.scope);
    }
}

/// Runs uploads against a repository.
///
/// At most one upload runs per batch: within the session through the
/// in-flight set, and across processes through the lock of the store. The two
/// files of an upload are decoded in parallel and nothing is stored unless
/// both of them could be read.
pub struct UploadSession<S: KvStore> {
    repo: Mutex<DashboardRepository<S>>,
    in_flight: Mutex<HashSet<Scope>>,
    fields: FieldNames,
    labels: StatusLabels,
}

async fn decode_task(file: UploadFile) -> DashResult<Vec<SourceRow>> {
    let name = file.name.clone();
    let res = tokio::task::spawn_blocking(move || decode(&file))
        .await
        .context(DecodeTaskSnafu { name: name.clone() })?;
    res.context(MergeSnafu { name })
}

impl<S: KvStore> UploadSession<S> {
    pub fn new(
        repo: DashboardRepository<S>,
        fields: FieldNames,
        labels: StatusLabels,
    ) -> UploadSession<S> {
        UploadSession {
            repo: Mutex::new(repo),
            in_flight: Mutex::new(HashSet::new()),
            fields,
            labels,
        }
    }

    pub fn try_begin(&self, scope: &Scope) -> DashResult<UploadGuard<'_>> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if !in_flight.insert(scope.clone()) {
            return UploadInProgressSnafu {
                track: scope.track.clone(),
                batch: scope.batch.clone(),
            }
            .fail();
        }
        Ok(UploadGuard {
            in_flight: &self.in_flight,
            scope: scope.clone(),
        })
    }

    pub fn with_repo<R>(&self, f: impl FnOnce(&mut DashboardRepository<S>) -> R) -> R {
        let mut repo = self.repo.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut repo)
    }

    /// Replaces the dataset and the file list of the batch with the merge of
    /// the two files: the survey export first, then the status export.
    pub async fn upload(&self, scope: &Scope, files: Vec<UploadFile>) -> DashResult<UploadOutcome> {
        let names: Vec<String> = files.iter().map(|f| f.name.clone()).collect();
        check_file_names(&names)?;
        let _guard = self.try_begin(scope)?;
        let _lock = self.with_repo(|repo| repo.lock_scope(scope))?;
        info!("upload: {}: {:?}", scope, names);

        let uploaded_at = Local::now().timestamp_millis();
        let metas: Vec<FileMeta> = files
            .iter()
            .enumerate()
            .map(|(idx, f)| FileMeta {
                name: f.name.clone(),
                uid: format!("upload-{}-{}", uploaded_at, idx),
                size: f.bytes.len() as u64,
                track: scope.track.clone(),
                batch: scope.batch.clone(),
            })
            .collect();

        let mut iter = files.into_iter();
        let (primary_file, secondary_file) = match (iter.next(), iter.next()) {
            (Some(p), Some(s)) => (p, s),
            _ => return InvalidFileCountSnafu { count: names.len() }.fail(),
        };
        let (primary, secondary) =
            tokio::try_join!(decode_task(primary_file), decode_task(secondary_file))?;
        debug!(
            "upload: {}: {} primary rows, {} secondary rows",
            scope,
            primary.len(),
            secondary.len()
        );

        let records = merge(&primary, &secondary, &self.fields, &self.labels);
        self.with_repo(|repo| {
            repo.save_dataset(scope, &records)?;
            repo.replace_file_list(scope, &metas)
        })?;
        Ok(UploadOutcome {
            records: records.len(),
            storage_key: merged_data_key(scope),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn csv_file(name: &str, text: &str) -> UploadFile {
        UploadFile {
            name: name.to_string(),
            bytes: text.as_bytes().to_vec(),
        }
    }

    fn session() -> UploadSession<MemoryStore> {
        UploadSession::new(
            DashboardRepository::new(MemoryStore::new(), ExclusionScope::Global),
            FieldNames::default(),
            StatusLabels::default(),
        )
    }

    fn scenario_files() -> Vec<UploadFile> {
        vec![
            csv_file(
                "survey.csv",
                "responseId,모집 상태,제출시간\n1, 작성완료 ,2024-03-01T09:15:00\n2,,2024-03-02T10:00:00\n",
            ),
            csv_file(
                "status.csv",
                "responseId,title,value\n1,현재 신분,학생\n1,최종학력,\"[\"\"대학교\"\",\"\"대학원\"\"]\"\n,현재 신분,무시\n",
            ),
        ]
    }

    #[test]
    fn file_name_checks() {
        let names = |l: &[&str]| l.iter().map(|s| s.to_string()).collect::<Vec<String>>();
        assert!(check_file_names(&names(&["a.xlsx", "b.csv"])).is_ok());
        let err = check_file_names(&names(&["a.xlsx"])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(check_file_names(&names(&["a.xlsx", "b.csv", "c.csv"])).is_err());
        let err = check_file_names(&names(&["a.xlsx", "b.pdf"])).unwrap_err();
        assert!(matches!(err, DashError::UnsupportedFileType { .. }));
    }

    #[tokio::test]
    async fn wrong_count_stores_nothing() {
        let s = session();
        let scope = Scope::new("t", "1");
        let mut files = scenario_files();
        files.pop();
        let err = s.upload(&scope, files).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        s.with_repo(|repo| {
            assert_eq!(repo.store().get("mergedData_t_1").unwrap(), None);
        });
    }

    #[tokio::test]
    async fn merges_and_stores() {
        let s = session();
        let scope = Scope::new("자율주행", "1");
        let outcome = s.upload(&scope, scenario_files()).await.unwrap();
        assert_eq!(outcome.records, 2);
        assert_eq!(outcome.storage_key, "mergedData_자율주행_1");

        let (rows, files) = s.with_repo(|repo| {
            (
                repo.load_dataset(&scope).unwrap(),
                repo.load_file_list(Some(&scope)).unwrap(),
            )
        });
        assert_eq!(rows[0].status, "작성완료");
        assert_eq!(rows[0].get("현재 신분"), Some("학생"));
        assert_eq!(rows[0].get("최종학력"), Some("대학교, 대학원"));
        assert_eq!(rows[1].status, "작성중");
        assert_eq!(rows[1].get("현재 신분"), None);
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].name, "survey.csv");
        assert_ne!(files[0].uid, files[1].uid);
    }

    #[tokio::test]
    async fn excel_survey_export() {
        let mut workbook = rust_xlsxwriter::Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "responseId").unwrap();
        sheet.write_string(0, 1, "모집 상태").unwrap();
        sheet.write_string(0, 2, "생년월일").unwrap();
        sheet.write_string(1, 0, "1").unwrap();
        sheet.write_string(1, 1, "작성완료").unwrap();
        sheet.write_number(1, 2, 19990101.0).unwrap();
        let bytes = workbook.save_to_buffer().unwrap();

        let s = session();
        let scope = Scope::new("t", "1");
        let files = vec![
            UploadFile {
                name: "survey.xlsx".to_string(),
                bytes,
            },
            scenario_files().remove(1),
        ];
        s.upload(&scope, files).await.unwrap();
        let rows = s.with_repo(|repo| repo.load_dataset(&scope).unwrap());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("생년월일"), Some("19990101"));
        assert_eq!(rows[0].get("현재 신분"), Some("학생"));
    }

    #[tokio::test]
    async fn parse_failure_keeps_previous_data() {
        let s = session();
        let scope = Scope::new("t", "1");
        s.upload(&scope, scenario_files()).await.unwrap();

        let bad = vec![
            UploadFile {
                name: "survey.xlsx".to_string(),
                bytes: b"definitely not a workbook".to_vec(),
            },
            scenario_files().remove(1),
        ];
        let err = s.upload(&scope, bad).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Merge);
        assert!(err.to_string().contains("survey.xlsx"));

        let rows = s.with_repo(|repo| repo.load_dataset(&scope).unwrap());
        assert_eq!(rows.len(), 2);
        // The guard was released.
        assert!(s.try_begin(&scope).is_ok());
    }

    #[tokio::test]
    async fn reupload_replaces_data() {
        let s = session();
        let scope = Scope::new("t", "1");
        s.upload(&scope, scenario_files()).await.unwrap();
        s.with_repo(|repo| repo.toggle_exclusion(&scope, "1").unwrap());

        let files = vec![
            csv_file("survey2.csv", "responseId,모집 상태\n3,작성완료\n"),
            csv_file("status2.csv", "responseId,title,value\n"),
        ];
        s.upload(&scope, files).await.unwrap();

        let (rows, exclusions, file_list) = s.with_repo(|repo| {
            (
                repo.load_dataset(&scope).unwrap(),
                repo.load_exclusions(&scope).unwrap(),
                repo.load_file_list(None).unwrap(),
            )
        });
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].response_id, "3");
        assert_eq!(file_list.len(), 2);
        assert_eq!(file_list[0].name, "survey2.csv");
        // The stale exclusion is kept but matches nothing.
        assert!(exclusions.is_excluded("1"));
        let summary = aggregate::summarize(&rows, &exclusions, &StatusLabels::default());
        assert_eq!(summary.total, 1);
        assert_eq!(summary.completed, 1);
    }

    #[tokio::test]
    async fn one_upload_at_a_time_per_store_directory() {
        let dir = tempfile::tempdir().unwrap();
        let dir_session = || {
            UploadSession::new(
                DashboardRepository::new(DirStore::new(dir.path()), ExclusionScope::Global),
                FieldNames::default(),
                StatusLabels::default(),
            )
        };
        let running = dir_session();
        let other = dir_session();
        let scope = Scope::new("t", "1");
        let data_path = dir.path().join("mergedData_t_1.json");

        let lock = running.with_repo(|repo| repo.lock_scope(&scope)).unwrap();
        let err = other.upload(&scope, scenario_files()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(!data_path.exists());
        assert!(other.with_repo(|repo| repo.load_file_list(None).unwrap()).is_empty());

        drop(lock);
        other.upload(&scope, scenario_files()).await.unwrap();
        assert!(data_path.exists());
        assert!(!dir.path().join("mergedData_t_1.lock").exists());
    }

    #[tokio::test]
    async fn one_upload_at_a_time_per_batch() {
        let s = session();
        let scope = Scope::new("t", "1");
        let guard = s.try_begin(&scope).unwrap();

        let err = s.upload(&scope, scenario_files()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        // Another batch is not blocked.
        s.upload(&Scope::new("t", "2"), scenario_files())
            .await
            .unwrap();

        drop(guard);
        s.upload(&scope, scenario_files()).await.unwrap();
    }
}
