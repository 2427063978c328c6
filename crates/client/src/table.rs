//! Text-celled tables parsed from CSV.
//!
//! Cells stay as strings; typed records are read out of a table on demand
//! (see [`crate::model`]). Tables are immutable values: every transformation
//! returns a new table.

use std::fmt;
use std::str::FromStr;

use covidmap_core::Error;
use serde::{Deserialize, Serialize};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Which dataset a table holds, selecting its cleaning rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DatasetKind {
    #[serde(rename = "nsw_cases_by_notification_date_and_postcode")]
    NswCases,
    #[serde(rename = "au_postcodes")]
    AuPostcodes,
    #[serde(rename = "other")]
    Other,
}

impl DatasetKind {
    pub fn id(&self) -> &'static str {
        match self {
            DatasetKind::NswCases => "nsw_cases_by_notification_date_and_postcode",
            DatasetKind::AuPostcodes => "au_postcodes",
            DatasetKind::Other => "other",
        }
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for DatasetKind {
    type Err = std::convert::Infallible;

    /// Unrecognised ids map to [`DatasetKind::Other`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "nsw_cases_by_notification_date_and_postcode" => DatasetKind::NswCases,
            "au_postcodes" => DatasetKind::AuPostcodes,
            _ => DatasetKind::Other,
        })
    }
}

/// A table with named columns and string cells.
///
/// Every row has exactly one cell per column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// Build a table, rejecting rows whose width differs from the header.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self, Error> {
        if let Some((idx, row)) = rows.iter().enumerate().find(|(_, row)| row.len() != columns.len()) {
            return Err(Error::Parse(format!(
                "row {idx} has {} cells, expected {}",
                row.len(),
                columns.len()
            )));
        }
        Ok(Self { columns, rows })
    }

    /// Parse comma-separated text with a header row.
    ///
    /// A leading UTF-8 byte order mark is ignored. Short rows are padded with
    /// empty cells and long rows truncated to the header width.
    pub fn from_csv(bytes: &[u8]) -> Result<Self, Error> {
        let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(bytes);

        let columns: Vec<String> = reader
            .headers()
            .map_err(|e| Error::Parse(format!("invalid CSV header: {e}")))?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| Error::Parse(format!("invalid CSV record: {e}")))?;
            let mut row: Vec<String> = record.iter().take(columns.len()).map(str::to_string).collect();
            row.resize(columns.len(), String::new());
            rows.push(row);
        }

        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
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

    /// Index of a column that must be present.
    pub fn require_column(&self, name: &str) -> Result<usize, Error> {
        self.column_index(name)
            .ok_or_else(|| Error::Parse(format!("missing column '{name}'")))
    }

    /// Cell at `row` in column `name`; None if either is absent.
    pub fn get(&self, row: usize, name: &str) -> Option<&str> {
        let col = self.column_index(name)?;
        self.rows.get(row).map(|r| r[col].as_str())
    }

    /// New table containing the rows for which `keep` returns true.
    pub fn filter_rows(&self, mut keep: impl FnMut(&[String]) -> bool) -> Table {
        let rows = self.rows.iter().filter(|row| keep(row)).cloned().collect();
        Table { columns: self.columns.clone(), rows }
    }

    /// New table with column `name` set to `values`, appended if it is new.
    pub fn with_column(&self, name: &str, values: Vec<String>) -> Result<Table, Error> {
        if values.len() != self.rows.len() {
            return Err(Error::InvalidInput(format!(
                "column '{name}' has {} values for {} rows",
                values.len(),
                self.rows.len()
            )));
        }

        let mut columns = self.columns.clone();
        let mut rows = self.rows.clone();
        match self.column_index(name) {
            Some(col) => {
                for (row, value) in rows.iter_mut().zip(values) {
                    row[col] = value;
                }
            }
            None => {
                columns.push(name.to_string());
                for (row, value) in rows.iter_mut().zip(values) {
                    row.push(value);
                }
            }
        }
        Ok(Table { columns, rows })
    }

    /// Values of one column, empty strings where the column is absent.
    pub fn column_values(&self, name: &str) -> Vec<&str> {
        match self.column_index(name) {
            Some(col) => self.rows.iter().map(|r| r[col].as_str()).collect(),
            None => vec![""; self.rows.len()],
        }
    }
}
