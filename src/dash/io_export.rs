// Export of a merged dataset.

use indexmap::IndexSet;
use rust_xlsxwriter::Workbook;

use crate::dash::io_common::SpreadsheetKind;
use crate::dash::*;

pub const EXPORT_SHEET_NAME: &str = "Data";

/// Columns of the export: the keys of the first record, in order, then the
/// keys that only appear in later records, in order of first appearance.
pub fn export_columns(rows: &[RowRecord]) -> Vec<String> {
    let mut columns: IndexSet<String> = IndexSet::new();
    for row in rows.iter() {
        columns.extend(row.keys());
    }
    columns.into_iter().collect()
}

/// A workbook with a single sheet, one row per record after the header.
pub fn write_xlsx(rows: &[RowRecord]) -> DashResult<Vec<u8>> {
    let columns = export_columns(rows);
    let mut workbook = Workbook::new();
    let worksheet = workbook
        .add_worksheet()
        .set_name(EXPORT_SHEET_NAME)
        .context(ExportSnafu {})?;
    for (col, name) in columns.iter().enumerate() {
        worksheet
            .write_string(0, col as u16, name)
            .context(ExportSnafu {})?;
    }
    for (idx, row) in rows.iter().enumerate() {
        let row_num = (idx + 1) as u32;
        for (col, name) in columns.iter().enumerate() {
            if let Some(v) = row.get(name) {
                worksheet
                    .write_string(row_num, col as u16, v)
                    .context(ExportSnafu {})?;
            }
        }
    }
    workbook.save_to_buffer().context(ExportSnafu {})
}

pub fn write_csv(rows: &[RowRecord]) -> DashResult<Vec<u8>> {
    let columns = export_columns(rows);
    let mut wtr = csv::Writer::from_writer(Vec::new());
    if !columns.is_empty() {
        wtr.write_record(&columns).context(ExportCsvSnafu {})?;
    }
    for row in rows.iter() {
        let line: Vec<&str> = columns
            .iter()
            .map(|c| row.get(c).unwrap_or(""))
            .collect();
        wtr.write_record(&line).context(ExportCsvSnafu {})?;
    }
    wtr.flush().context(ExportIoSnafu { path: "<buffer>" })?;
    match wtr.into_inner() {
        Ok(buf) => Ok(buf),
        Err(e) => Err(e.into_error()).context(ExportIoSnafu { path: "<buffer>" }),
    }
}

/// Writes the export, as CSV if the path ends with `.csv` and as Excel otherwise.
pub fn export_to_path(rows: &[RowRecord], path: &str) -> DashResult<()> {
    let bytes = match SpreadsheetKind::from_file_name(path) {
        Some(SpreadsheetKind::Csv) => write_csv(rows)?,
        _ => write_xlsx(rows)?,
    };
    fs::write(path, bytes).context(ExportIoSnafu { path })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dash::io_common::{decode, grid_to_rows};
    use crate::dash::io_xlsx::read_xlsx_grid;
    use crate::dash::upload::UploadFile;

    fn records() -> Vec<RowRecord> {
        let primary: Vec<SourceRow> = vec![
            [("responseId", "1"), ("모집 상태", "작성완료"), ("이름", "김")]
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            [("responseId", "2"), ("이름", "이")]
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        ];
        merge(
            &primary,
            &[],
            &FieldNames::default(),
            &StatusLabels::default(),
        )
    }

    #[test]
    fn columns_follow_first_record() {
        let cols = export_columns(&records());
        assert_eq!(cols, vec!["모집 상태", "이름", "responseId", "status"]);
        assert!(export_columns(&[]).is_empty());
    }

    fn partly_matched_records() -> Vec<RowRecord> {
        let row = |pairs: &[(&str, &str)]| -> SourceRow {
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect()
        };
        let primary = vec![row(&[("responseId", "1")]), row(&[("responseId", "2")])];
        let secondary = vec![row(&[
            ("responseId", "2"),
            ("title", "현재 신분"),
            ("value", "재학생"),
        ])];
        merge(
            &primary,
            &secondary,
            &FieldNames::default(),
            &StatusLabels::default(),
        )
    }

    #[test]
    fn columns_of_later_records_are_appended() {
        let rows = partly_matched_records();
        assert_eq!(
            export_columns(&rows),
            vec!["responseId", "status", "현재 신분"]
        );
        let text = String::from_utf8(write_csv(&rows).unwrap()).unwrap();
        assert_eq!(
            text,
            "responseId,status,현재 신분\n1,작성중,\n2,작성중,재학생\n"
        );

        let grid = read_xlsx_grid("export.xlsx", &write_xlsx(&rows).unwrap()).unwrap();
        let read_back = grid_to_rows("export.xlsx", grid).unwrap();
        assert_eq!(read_back[0].get("현재 신분"), None);
        assert_eq!(
            read_back[1].get("현재 신분").map(|s| s.as_str()),
            Some("재학생")
        );
    }

    #[test]
    fn xlsx_reads_back() {
        let bytes = write_xlsx(&records()).unwrap();
        let grid = read_xlsx_grid("export.xlsx", &bytes).unwrap();
        let rows = grid_to_rows("export.xlsx", grid).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("responseId").map(|s| s.as_str()), Some("1"));
        assert_eq!(rows[1].get("status").map(|s| s.as_str()), Some("작성중"));
        assert_eq!(rows[1].get("모집 상태"), None);
    }

    #[test]
    fn csv_export() {
        let bytes = write_csv(&records()).unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.starts_with("모집 상태,이름,responseId,status\n"));
        let rows = decode(&UploadFile {
            name: "e.csv".to_string(),
            bytes,
        })
        .unwrap();
        assert_eq!(rows[0].get("status").map(|s| s.as_str()), Some("작성완료"));
    }

    #[test]
    fn export_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("out.xlsx");
        let p = p.to_str().unwrap();
        export_to_path(&records(), p).unwrap();
        assert!(std::path::Path::new(p).exists());
    }
}
