// Primitives for reading Excel files.

use std::io::Cursor;

use calamine::{DataType, Reader, Xlsx};
use chrono::{Duration, NaiveDateTime, Timelike};

use crate::dash::io_common::Grid;
use crate::dash::*;

// Day 0 of the Excel 1900 date system, once the 1900 leap year bug is accounted for.
fn excel_epoch() -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)
}

// 9999-12-31 is the last day Excel can display.
const MAX_EXCEL_SERIAL: f64 = 2_958_466.0;

fn format_excel_datetime(serial: f64) -> Option<String> {
    if !serial.is_finite() || !(0.0..MAX_EXCEL_SERIAL).contains(&serial) {
        return None;
    }
    let millis = (serial * 86_400_000.0).round() as i64;
    let dt = excel_epoch()?.checked_add_signed(Duration::try_milliseconds(millis)?)?;
    if dt.num_seconds_from_midnight() == 0 {
        Some(dt.format("%Y-%m-%d").to_string())
    } else {
        Some(dt.format("%Y-%m-%d %H:%M:%S").to_string())
    }
}

fn format_float(f: f64) -> String {
    if f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{}", f as i64)
    } else {
        f.to_string()
    }
}

/// The text of a cell, or None if the cell holds nothing usable.
pub fn cell_text(name: &str, lineno: u64, cell: &DataType) -> DashResult<Option<String>> {
    match cell {
        DataType::Empty => Ok(None),
        DataType::String(s) => Ok(Some(s.clone())),
        DataType::Int(i) => Ok(Some(i.to_string())),
        DataType::Float(f) => Ok(Some(format_float(*f))),
        DataType::Bool(b) => Ok(Some(if *b { "TRUE" } else { "FALSE" }.to_string())),
        DataType::DateTime(serial) => match format_excel_datetime(*serial) {
            Some(s) => Ok(Some(s)),
            None => ExcelWrongCellTypeSnafu {
                name,
                lineno,
                content: format!("{:?}", cell),
            }
            .fail(),
        },
        DataType::Error(e) => {
            debug!("cell_text: {}: line {}: error cell {:?}", name, lineno, e);
            Ok(None)
        }
        #[allow(unreachable_patterns)]
        _ => ExcelWrongCellTypeSnafu {
            name,
            lineno,
            content: format!("{:?}", cell),
        }
        .fail(),
    }
}

/// Reads the first worksheet of a workbook held in memory.
pub fn read_xlsx_grid(name: &str, bytes: &[u8]) -> DashResult<Grid> {
    let mut workbook: Xlsx<_> =
        Xlsx::new(Cursor::new(bytes.to_vec())).context(OpeningExcelSnafu { name })?;
    let wrange = workbook
        .worksheet_range_at(0)
        .context(EmptySpreadsheetSnafu { name })?
        .context(OpeningExcelSnafu { name })?;
    debug!("read_xlsx_grid: {}: size {:?}", name, wrange.get_size());

    let mut grid: Grid = Vec::new();
    for (idx, row) in wrange.rows().enumerate() {
        // The index starts at 1 to respect the conventions of the excel world.
        let lineno = (idx + 1) as u64;
        let cells = row
            .iter()
            .map(|c| cell_text(name, lineno, c))
            .collect::<DashResult<Vec<Option<String>>>>()?;
        grid.push(cells);
    }
    Ok(grid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers() {
        assert_eq!(
            cell_text("t", 1, &DataType::Float(19990101.0)).unwrap(),
            Some("19990101".to_string())
        );
        assert_eq!(
            cell_text("t", 1, &DataType::Float(2.5)).unwrap(),
            Some("2.5".to_string())
        );
        assert_eq!(
            cell_text("t", 1, &DataType::Int(7)).unwrap(),
            Some("7".to_string())
        );
        assert_eq!(cell_text("t", 1, &DataType::Empty).unwrap(), None);
    }

    #[test]
    fn dates() {
        // 2024-03-01 is day 45352.
        assert_eq!(
            cell_text("t", 1, &DataType::DateTime(45352.0)).unwrap(),
            Some("2024-03-01".to_string())
        );
        assert_eq!(
            cell_text("t", 1, &DataType::DateTime(45352.5)).unwrap(),
            Some("2024-03-01 12:00:00".to_string())
        );
    }

    #[test]
    fn out_of_range_dates_are_rejected() {
        for serial in [1e12, -1e12, -1.0, f64::NAN, f64::INFINITY] {
            let err = cell_text("t", 4, &DataType::DateTime(serial)).unwrap_err();
            assert!(matches!(
                err,
                DashError::ExcelWrongCellType { lineno: 4, .. }
            ));
            assert_eq!(err.kind(), ErrorKind::Parse);
        }
        assert_eq!(
            cell_text("t", 1, &DataType::DateTime(2_958_465.0)).unwrap(),
            Some("9999-12-31".to_string())
        );
    }

    #[test]
    fn garbage_is_an_opening_error() {
        let err = read_xlsx_grid("bad.xlsx", b"not a zip file").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
    }
}
