// The data behind the three dashboard pages.

use indexmap::IndexMap;

use crate::dash::*;

/// A record of the batch table.
#[derive(PartialEq, Debug, Clone, Serialize)]
pub struct TableRow {
    #[serde(flatten)]
    pub record: RowRecord,
    pub excluded: bool,
}

#[derive(PartialEq, Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchView {
    pub track: String,
    pub batch: String,
    #[serde(flatten)]
    pub result: AggregateResult,
    pub files: Vec<FileMeta>,
    pub excluded_ids: Vec<String>,
    /// The distinct statuses of the dataset, for filtering the table.
    pub status_values: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<Vec<TableRow>>,
}

#[derive(PartialEq, Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchCard {
    pub batch: String,
    pub total: u64,
    pub completed: u64,
    pub rate: f64,
}

#[derive(PartialEq, Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackView {
    pub track: String,
    #[serde(flatten)]
    pub result: AggregateResult,
    pub batches: Vec<BatchCard>,
}

#[derive(PartialEq, Debug, Clone, Serialize)]
pub struct OverviewView {
    pub tracks: IndexMap<String, Summary>,
    pub overall: Summary,
}

fn distinct_statuses(rows: &[RowRecord]) -> Vec<String> {
    let mut res: Vec<String> = Vec::new();
    for r in rows.iter() {
        if !res.contains(&r.status) {
            res.push(r.status.clone());
        }
    }
    res
}

pub fn batch_view<S: KvStore>(
    repo: &DashboardRepository<S>,
    scope: &Scope,
    options: &AggregateOptions,
    with_rows: bool,
) -> DashResult<BatchView> {
    let rows = repo.load_dataset(scope)?;
    let exclusions = repo.load_exclusions(scope)?;
    let files = repo.load_file_list(Some(scope))?;
    debug!(
        "batch_view: {}: {} rows, {} files",
        scope,
        rows.len(),
        files.len()
    );
    let result = recompute(&rows, &exclusions, options);
    let status_values = distinct_statuses(&rows);
    let table = if with_rows {
        Some(
            rows.into_iter()
                .map(|record| TableRow {
                    excluded: exclusions.is_excluded(&record.response_id),
                    record,
                })
                .collect(),
        )
    } else {
        None
    };
    Ok(BatchView {
        track: scope.track.clone(),
        batch: scope.batch.clone(),
        result,
        files,
        excluded_ids: exclusions.iter().cloned().collect(),
        status_values,
        rows: table,
    })
}

/// All the batches of a track, aggregated together.
///
/// An id excluded in any of the batches is excluded from the union.
pub fn track_view<S: KvStore>(
    repo: &DashboardRepository<S>,
    track: &TrackConfig,
    options: &AggregateOptions,
) -> DashResult<TrackView> {
    let mut all_rows: Vec<RowRecord> = Vec::new();
    let mut all_exclusions: Vec<String> = Vec::new();
    let mut cards: Vec<BatchCard> = Vec::new();
    for batch in track.batches.iter() {
        let scope = Scope::new(&track.name, batch);
        let rows = repo.load_dataset(&scope)?;
        let exclusions = repo.load_exclusions(&scope)?;
        let s = aggregate::summarize(&rows, &exclusions, &options.labels);
        cards.push(BatchCard {
            batch: batch.clone(),
            total: s.total,
            completed: s.completed,
            rate: s.rate,
        });
        all_rows.extend(rows);
        all_exclusions.extend(exclusions.iter().cloned());
    }
    let exclusions: ExclusionSet = all_exclusions.into_iter().collect();
    info!(
        "track_view: {}: {} rows over {} batches",
        track.name,
        all_rows.len(),
        cards.len()
    );
    Ok(TrackView {
        track: track.name.clone(),
        result: recompute(&all_rows, &exclusions, options),
        batches: cards,
    })
}

/// The completion of every configured track, and of all of them together.
pub fn overview<S: KvStore>(
    repo: &DashboardRepository<S>,
    tracks: &[TrackConfig],
    options: &AggregateOptions,
) -> DashResult<OverviewView> {
    let mut res: IndexMap<String, Summary> = IndexMap::new();
    let mut total = 0;
    let mut completed = 0;
    for track in tracks.iter() {
        let mut track_total = 0;
        let mut track_completed = 0;
        for batch in track.batches.iter() {
            let scope = Scope::new(&track.name, batch);
            let rows = repo.load_dataset(&scope)?;
            let exclusions = repo.load_exclusions(&scope)?;
            let s = aggregate::summarize(&rows, &exclusions, &options.labels);
            track_total += s.total;
            track_completed += s.completed;
        }
        total += track_total;
        completed += track_completed;
        res.insert(
            track.name.clone(),
            Summary {
                total: track_total,
                completed: track_completed,
                rate: aggregate::completion_rate(track_completed, track_total),
            },
        );
    }
    Ok(OverviewView {
        tracks: res,
        overall: Summary {
            total,
            completed,
            rate: aggregate::completion_rate(completed, total),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, status: &str, submitted: &str) -> RowRecord {
        let mut fields: IndexMap<String, Option<String>> = IndexMap::new();
        fields.insert("제출시간".to_string(), Some(submitted.to_string()));
        RowRecord {
            fields,
            response_id: id.to_string(),
            status: status.to_string(),
        }
    }

    fn options() -> AggregateOptions {
        AggregateOptions::new(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap())
    }

    fn track() -> TrackConfig {
        TrackConfig {
            name: "자율주행".to_string(),
            batches: vec!["1".to_string(), "2".to_string()],
        }
    }

    fn repo(scope: ExclusionScope) -> DashboardRepository<MemoryStore> {
        let mut repo = DashboardRepository::new(MemoryStore::new(), scope);
        repo.save_dataset(
            &Scope::new("자율주행", "1"),
            &[
                record("a", "작성완료", "2024-03-01T09:15:00"),
                record("b", "작성중", "2024-03-01T10:00:00"),
            ],
        )
        .unwrap();
        repo.save_dataset(
            &Scope::new("자율주행", "2"),
            &[
                record("c", "작성완료", "2024-03-02T09:00:00"),
                record("d", "작성완료", "2024-03-03T21:00:00"),
            ],
        )
        .unwrap();
        repo
    }

    #[test]
    fn batch_page() {
        let mut repo = repo(ExclusionScope::Global);
        let scope = Scope::new("자율주행", "1");
        repo.toggle_exclusion(&scope, "b").unwrap();
        let v = batch_view(&repo, &scope, &options(), true).unwrap();
        assert_eq!(v.result.summary.total, 1);
        assert_eq!(v.result.summary.rate, 100.0);
        // Charts still count the excluded row.
        assert_eq!(v.result.submission_time.get("10시"), Some(1));
        assert_eq!(v.excluded_ids, vec!["b".to_string()]);
        assert_eq!(v.status_values, vec!["작성완료", "작성중"]);
        let rows = v.rows.unwrap();
        assert!(!rows[0].excluded);
        assert!(rows[1].excluded);
    }

    #[test]
    fn batch_page_json() {
        let repo = repo(ExclusionScope::Global);
        let v = batch_view(&repo, &Scope::new("자율주행", "2"), &options(), false).unwrap();
        let js = serde_json::to_value(&v).unwrap();
        assert_eq!(js["summary"]["total"], 2);
        assert_eq!(js["dailyTrend"]["labels"][0], "2024-03-02");
        assert!(js.get("rows").is_none());
        assert_eq!(js["files"], serde_json::json!([]));
    }

    #[test]
    fn track_page_union() {
        let mut repo = repo(ExclusionScope::PerBatch);
        repo.toggle_exclusion(&Scope::new("자율주행", "2"), "d").unwrap();
        let v = track_view(&repo, &track(), &options()).unwrap();
        assert_eq!(v.result.summary.total, 3);
        assert_eq!(v.result.summary.completed, 2);
        assert_eq!(v.result.daily_trend.values.iter().sum::<u64>(), 4);
        assert_eq!(v.batches.len(), 2);
        assert_eq!(v.batches[0].total, 2);
        assert_eq!(v.batches[0].rate, 50.0);
        assert_eq!(v.batches[1].total, 1);
    }

    #[test]
    fn overview_totals() {
        let repo = repo(ExclusionScope::Global);
        let other = TrackConfig {
            name: "데이터".to_string(),
            batches: vec!["1".to_string()],
        };
        let v = overview(&repo, &[track(), other], &options()).unwrap();
        assert_eq!(v.tracks["자율주행"].total, 4);
        assert_eq!(v.tracks["자율주행"].completed, 3);
        assert_eq!(v.tracks["자율주행"].rate, 75.0);
        assert_eq!(v.tracks["데이터"].total, 0);
        assert_eq!(v.tracks["데이터"].rate, 0.0);
        assert_eq!(v.overall.total, 4);
        assert_eq!(v.overall.rate, 75.0);
    }
}
