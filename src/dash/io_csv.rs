// Primitives for reading CSV files.

use crate::dash::io_common::Grid;
use crate::dash::*;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Reads a CSV file held in memory. Rows may have different lengths.
pub fn read_csv_grid(name: &str, bytes: &[u8]) -> DashResult<Grid> {
    let data = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    let rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(data);
    let mut grid: Grid = Vec::new();
    for (idx, line_r) in rdr.into_records().enumerate() {
        let line = line_r.context(CsvParseSnafu { name })?;
        debug!("read_csv_grid: {}: line {}: {:?}", name, idx + 1, line);
        grid.push(
            line.iter()
                .map(|s| {
                    if s.is_empty() {
                        None
                    } else {
                        Some(s.to_string())
                    }
                })
                .collect(),
        );
    }
    Ok(grid)
}
