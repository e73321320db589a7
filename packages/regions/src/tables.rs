//! Delimited-file readers for the metrics and point inputs.
//!
//! Cells are kept as trimmed strings in [`CsvTable`]; typed coercion
//! happens in the stage that owns the table.

use std::collections::BTreeMap;
use std::path::Path;

use region_map_regions_models::{AttributeValue, MetricsTable, NAME_COLUMN, Schema};

use crate::RegionError;

/// A header row plus raw string rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsvTable {
    /// Trimmed header names in file order.
    pub headers: Vec<String>,
    /// Trimmed cells; short rows are padded with empty cells.
    pub rows: Vec<Vec<String>>,
}

impl CsvTable {
    /// Capability descriptor of the header row.
    #[must_use]
    pub fn schema(&self) -> Schema {
        Schema::new(self.headers.iter().cloned())
    }

    /// Index of a header, matched exactly.
    #[must_use]
    pub fn column_index(&self, header: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == header)
    }
}

/// Parses a comma-delimited table from any reader.
///
/// # Errors
///
/// Returns [`RegionError::DataSource`] if the data is not valid CSV or has
/// no header row.
pub fn parse_csv<R: std::io::Read>(reader: R, origin: &str) -> Result<CsvTable, RegionError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| RegionError::data_source(origin, e))?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_owned())
        .collect();

    if headers.iter().all(String::is_empty) {
        return Err(RegionError::data_source(origin, "CSV file contains no header row"));
    }

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| RegionError::data_source(origin, e))?;
        let row: Vec<String> = (0..headers.len())
            .map(|i| record.get(i).unwrap_or("").to_owned())
            .collect();
        rows.push(row);
    }

    log::debug!("Parsed {} rows from {origin}", rows.len());

    Ok(CsvTable { headers, rows })
}

/// Reads a CSV file from disk.
///
/// # Errors
///
/// Returns [`RegionError::DataSource`] if the file cannot be opened or
/// parsed.
pub fn read_csv(path: &Path) -> Result<CsvTable, RegionError> {
    let origin = path.display().to_string();
    let file = std::fs::File::open(path).map_err(|e| RegionError::data_source(&origin, e))?;
    parse_csv(std::io::BufReader::new(file), &origin)
}

/// Coerces a raw table into typed metric rows.
///
/// The `name` column is a join key and stays text, so `007` and `1.50`
/// keep their exact spelling.
#[must_use]
pub fn to_metrics_table(table: CsvTable) -> MetricsTable {
    let rows = table
        .rows
        .iter()
        .map(|row| {
            table
                .headers
                .iter()
                .zip(row)
                .map(|(header, cell)| {
                    let value = if header == NAME_COLUMN {
                        AttributeValue::from_text_cell(cell)
                    } else {
                        AttributeValue::from_cell(cell)
                    };
                    (header.clone(), value)
                })
                .collect::<BTreeMap<_, _>>()
        })
        .collect();

    MetricsTable {
        headers: table.headers,
        rows,
    }
}

/// Reads a metrics CSV from disk.
///
/// # Errors
///
/// Returns [`RegionError::DataSource`] if the file cannot be opened or
/// parsed.
pub fn read_metrics_csv(path: &Path) -> Result<MetricsTable, RegionError> {
    let table = read_csv(path)?;
    log::info!(
        "Loaded metrics table {} ({} rows, columns: {})",
        path.display(),
        table.rows.len(),
        table.headers.join(", ")
    );
    Ok(to_metrics_table(table))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_short_rows_and_trims() {
        let table = parse_csv(" name , crime_rate\nA, 1\nB\n".as_bytes(), "inline").unwrap();

        assert_eq!(table.headers, vec!["name", "crime_rate"]);
        assert_eq!(table.rows, vec![vec!["A", "1"], vec!["B", ""]]);
    }

    #[test]
    fn strips_byte_order_mark() {
        let table = parse_csv("\u{feff}region_id,x\n1,2\n".as_bytes(), "inline").unwrap();
        assert_eq!(table.column_index("region_id"), Some(0));
    }

    #[test]
    fn metrics_cells_are_coerced() {
        let table = parse_csv("name,score,note\nA,2.5,\nB,x,hi\n".as_bytes(), "inline").unwrap();
        let metrics = to_metrics_table(table);

        assert_eq!(metrics.len(), 2);
        assert_eq!(metrics.rows[0]["score"], AttributeValue::Number(2.5));
        assert_eq!(metrics.rows[0]["note"], AttributeValue::Null);
        assert_eq!(metrics.rows[1]["score"], AttributeValue::Text("x".to_owned()));
    }

    #[test]
    fn name_column_keeps_its_spelling() {
        let table = parse_csv("name,score
007,1
1.50,2
,3
".as_bytes(), "inline").unwrap();
        let metrics = to_metrics_table(table);

        assert_eq!(metrics.rows[0]["name"], AttributeValue::Text("007".to_owned()));
        assert_eq!(metrics.rows[1]["name"], AttributeValue::Text("1.50".to_owned()));
        assert_eq!(metrics.rows[2]["name"], AttributeValue::Null);
        assert_eq!(metrics.rows[1]["score"], AttributeValue::Number(2.0));
    }

    #[test]
    fn missing_file_is_a_data_source_error() {
        let err = read_csv(Path::new("/definitely/not/here.csv")).unwrap_err();
        assert!(matches!(err, RegionError::DataSource { .. }));
    }
}
