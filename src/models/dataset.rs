//! Dataset model - uploaded CSV table and the in-memory store holding it

use std::io::Read;
use std::sync::Arc;

use csv::{ReaderBuilder, StringRecord, Trim};
use parking_lot::RwLock;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("No columns to parse from file")]
    NoColumns,

    #[error("{0}")]
    Csv(#[from] csv::Error),

    #[error("missing column '{0}'")]
    MissingColumn(String),

    #[error("row {row}: column '{column}' has non-numeric value '{value}'")]
    NonNumeric {
        row: usize,
        column: String,
        value: String,
    },

    #[error("row {row}: column '{column}' is empty")]
    EmptyValue { row: usize, column: String },
}

/// Parsed CSV table: header names plus raw string cells
#[derive(Debug, Clone)]
pub struct Dataset {
    columns: Vec<String>,
    rows: Vec<StringRecord>,
}

impl Dataset {
    /// Parse a CSV document with a header row
    pub fn from_csv<R: Read>(reader: R) -> Result<Self, DatasetError> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .trim(Trim::All)
            .from_reader(reader);

        let columns: Vec<String> = reader
            .headers()?
            .iter()
            .map(str::to_string)
            .collect();

        if columns.iter().all(String::is_empty) {
            return Err(DatasetError::NoColumns);
        }

        let rows = reader.records().collect::<Result<Vec<_>, _>>()?;

        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    fn require_column(&self, name: &str) -> Result<usize, DatasetError> {
        self.column_index(name)
            .ok_or_else(|| DatasetError::MissingColumn(name.to_string()))
    }

    /// Read a column as finite floats
    pub fn numeric_column(&self, name: &str) -> Result<Vec<f64>, DatasetError> {
        let idx = self.require_column(name)?;

        self.rows
            .iter()
            .enumerate()
            .map(|(i, record)| {
                let raw = record.get(idx).unwrap_or_default();
                match raw.parse::<f64>() {
                    Ok(value) if value.is_finite() => Ok(value),
                    _ => Err(DatasetError::NonNumeric {
                        row: i + 1,
                        column: name.to_string(),
                        value: raw.to_string(),
                    }),
                }
            })
            .collect()
    }

    /// Read a column as non-empty strings
    pub fn text_column(&self, name: &str) -> Result<Vec<String>, DatasetError> {
        let idx = self.require_column(name)?;

        self.rows
            .iter()
            .enumerate()
            .map(|(i, record)| match record.get(idx) {
                Some(value) if !value.is_empty() => Ok(value.to_string()),
                _ => Err(DatasetError::EmptyValue {
                    row: i + 1,
                    column: name.to_string(),
                }),
            })
            .collect()
    }
}

/// Holds the most recent upload. Readers get an `Arc` snapshot.
#[derive(Debug, Default)]
pub struct DatasetStore {
    current: RwLock<Option<Arc<Dataset>>>,
}

impl DatasetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current dataset
    pub fn store(&self, dataset: Dataset) -> Arc<Dataset> {
        let dataset = Arc::new(dataset);
        *self.current.write() = Some(Arc::clone(&dataset));
        dataset
    }

    pub fn current(&self) -> Option<Arc<Dataset>> {
        self.current.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "Machine_ID, Temperature, Run_Time, Downtime_Flag\n\
                          1, 80.5, 120, 0\n\
                          2, 95.0, 180, 1\n\
                          3, 70, 90, 0\n";

    #[test]
    fn test_parse_csv() {
        let dataset = Dataset::from_csv(SAMPLE.as_bytes()).unwrap();

        assert_eq!(dataset.len(), 3);
        assert_eq!(
            dataset.columns(),
            &["Machine_ID", "Temperature", "Run_Time", "Downtime_Flag"]
        );
        assert_eq!(dataset.column_index("Run_Time"), Some(2));
        assert_eq!(dataset.numeric_column("Temperature").unwrap(), vec![80.5, 95.0, 70.0]);
        assert_eq!(dataset.text_column("Downtime_Flag").unwrap(), vec!["0", "1", "0"]);
    }

    #[test]
    fn test_empty_input_rejected() {
        let err = Dataset::from_csv("".as_bytes()).unwrap_err();
        assert!(matches!(err, DatasetError::NoColumns));
        assert_eq!(err.to_string(), "No columns to parse from file");
    }

    #[test]
    fn test_header_only_is_valid() {
        let dataset = Dataset::from_csv("Temperature,Run_Time\n".as_bytes()).unwrap();
        assert!(dataset.is_empty());
        assert_eq!(dataset.columns().len(), 2);
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let err = Dataset::from_csv("a,b\n1,2\n3\n".as_bytes()).unwrap_err();
        assert!(matches!(err, DatasetError::Csv(_)));
    }

    #[test]
    fn test_column_errors() {
        let dataset = Dataset::from_csv("Temperature,Flag\n80,1\nhot,\n".as_bytes()).unwrap();

        match dataset.numeric_column("Temperature").unwrap_err() {
            DatasetError::NonNumeric { row, column, value } => {
                assert_eq!(row, 2);
                assert_eq!(column, "Temperature");
                assert_eq!(value, "hot");
            }
            other => panic!("unexpected error: {other}"),
        }

        assert!(matches!(
            dataset.text_column("Flag").unwrap_err(),
            DatasetError::EmptyValue { row: 2, .. }
        ));
        assert_eq!(
            dataset.numeric_column("Run_Time").unwrap_err().to_string(),
            "missing column 'Run_Time'"
        );
    }

    #[test]
    fn test_non_finite_values_rejected() {
        let dataset = Dataset::from_csv("Temperature\nNaN\n".as_bytes()).unwrap();
        assert!(dataset.numeric_column("Temperature").is_err());
    }

    #[test]
    fn test_store_replaces_previous() {
        let store = DatasetStore::new();
        assert!(store.current().is_none());

        store.store(Dataset::from_csv(SAMPLE.as_bytes()).unwrap());
        assert_eq!(store.current().unwrap().len(), 3);

        let snapshot = store.current().unwrap();
        store.store(Dataset::from_csv("Temperature\n1\n".as_bytes()).unwrap());

        assert_eq!(store.current().unwrap().len(), 1);
        // Earlier snapshots stay intact
        assert_eq!(snapshot.len(), 3);
    }
}
