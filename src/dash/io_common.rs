use std::collections::HashMap;
use std::path::Path;

use crate::dash::upload::UploadFile;
use crate::dash::*;

/// The cells of a sheet, row by row. The first row is the header.
pub type Grid = Vec<Vec<Option<String>>>;

pub fn simplify_file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(path)
        .to_string()
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum SpreadsheetKind {
    Xlsx,
    Csv,
}

impl SpreadsheetKind {
    pub fn from_file_name(name: &str) -> Option<SpreadsheetKind> {
        let ext = Path::new(name).extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "xlsx" => Some(SpreadsheetKind::Xlsx),
            "csv" => Some(SpreadsheetKind::Csv),
            _ => None,
        }
    }
}

/// Column names for a header row.
///
/// Blank names become `__EMPTY`, `__EMPTY_1`, ... and repeated names get a
/// `_1`, `_2`, ... suffix so that no column is lost.
pub fn header_names(header: &[Option<String>]) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut res: Vec<String> = Vec::new();
    for cell in header.iter() {
        let base = match cell.as_deref().map(|s| s.trim()) {
            Some(s) if !s.is_empty() => s.to_string(),
            _ => "__EMPTY".to_string(),
        };
        let name = match seen.get(&base) {
            None => base.clone(),
            Some(n) => format!("{}_{}", base, n),
        };
        *seen.entry(base).or_insert(0) += 1;
        res.push(name);
    }
    res
}

/// Turns a grid into one record per non-blank row.
///
/// Empty cells are left out of the records.
pub fn grid_to_rows(name: &str, grid: Grid) -> DashResult<Vec<SourceRow>> {
    let mut iter = grid.into_iter();
    let header = iter.next().context(EmptySpreadsheetSnafu { name })?;
    let names = header_names(&header);
    debug!("grid_to_rows: {}: header: {:?}", name, names);
    let mut res: Vec<SourceRow> = Vec::new();
    for row in iter {
        let mut record = SourceRow::new();
        for (idx, cell) in row.into_iter().enumerate() {
            if let Some(v) = cell {
                if v.is_empty() {
                    continue;
                }
                let col = match names.get(idx) {
                    Some(n) => n.clone(),
                    None if idx == 0 => "__EMPTY".to_string(),
                    None => format!("__EMPTY_{}", idx),
                };
                record.insert(col, v);
            }
        }
        if !record.is_empty() {
            res.push(record);
        }
    }
    info!("grid_to_rows: {}: {} rows", name, res.len());
    Ok(res)
}

/// Decodes an uploaded file into records, according to its extension.
pub fn decode(file: &UploadFile) -> DashResult<Vec<SourceRow>> {
    let grid = match SpreadsheetKind::from_file_name(&file.name) {
        Some(SpreadsheetKind::Xlsx) => io_xlsx::read_xlsx_grid(&file.name, &file.bytes)?,
        Some(SpreadsheetKind::Csv) => io_csv::read_csv_grid(&file.name, &file.bytes)?,
        None => {
            return UnsupportedFileTypeSnafu {
                name: file.name.clone(),
            }
            .fail()
        }
    };
    grid_to_rows(&file.name, grid)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(l: &[&str]) -> Vec<Option<String>> {
        l.iter()
            .map(|s| {
                if s.is_empty() {
                    None
                } else {
                    Some(s.to_string())
                }
            })
            .collect()
    }

    #[test]
    fn file_names() {
        assert_eq!(simplify_file_name("/tmp/x/설문.xlsx"), "설문.xlsx");
        assert_eq!(simplify_file_name("a.csv"), "a.csv");
        assert_eq!(
            SpreadsheetKind::from_file_name("A.XLSX"),
            Some(SpreadsheetKind::Xlsx)
        );
        assert_eq!(
            SpreadsheetKind::from_file_name("b.csv"),
            Some(SpreadsheetKind::Csv)
        );
        assert_eq!(SpreadsheetKind::from_file_name("c.xls"), None);
        assert_eq!(SpreadsheetKind::from_file_name("noext"), None);
    }

    #[test]
    fn header_dedup() {
        let names = header_names(&cells(&["a", "", "a", " ", "b", "a"]));
        assert_eq!(
            names,
            vec!["a", "__EMPTY", "a_1", "__EMPTY_1", "b", "a_2"]
        );
    }

    #[test]
    fn blank_rows_and_cells_are_skipped() {
        let grid = vec![
            cells(&["responseId", "title", "value"]),
            cells(&["1", "현재 신분", "학생"]),
            cells(&["", "", ""]),
            cells(&["2", "", "x"]),
        ];
        let rows = grid_to_rows("t.csv", grid).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].get("title"), None);
        assert_eq!(rows[1].get("value").map(|s| s.as_str()), Some("x"));
    }

    #[test]
    fn empty_grid_is_an_error() {
        let err = grid_to_rows("t.csv", vec![]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
    }

    #[test]
    fn unsupported_extension() {
        let f = UploadFile {
            name: "x.txt".to_string(),
            bytes: vec![],
        };
        assert_eq!(decode(&f).unwrap_err().kind(), ErrorKind::Validation);
    }
}
