//! Typed records read out of cleaned tables, and pipeline outputs.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use covidmap_core::Error;
use serde::{Deserialize, Serialize};

use crate::table::{DatasetKind, Table};

/// Column names used by the case and postcode sources.
pub mod columns {
    pub const POSTCODE: &str = "postcode";
    pub const NOTIFICATION_DATE: &str = "notification_date";
    pub const CASE_LGA: &str = "lga_name19";
    pub const LOCALITY: &str = "locality";
    pub const STATE: &str = "state";
    pub const LONGITUDE: &str = "long";
    pub const LATITUDE: &str = "lat";

    /// LGA name columns of the postcode source, in order of preference.
    pub const POSTCODE_LGA: &[&str] = &["lga_name19", "lga_name", "lgaregion"];
}

/// Read a postcode cell as a non-negative integer.
///
/// Blank or unreadable cells become 0; float text such as `2000.0` is
/// accepted when it holds a whole number.
pub fn parse_postcode(cell: &str) -> u32 {
    let cell = cell.trim();
    if cell.is_empty() {
        return 0;
    }
    if let Ok(n) = cell.parse::<u32>() {
        return n;
    }
    match cell.parse::<f64>() {
        Ok(f) if f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= f64::from(u32::MAX) => f as u32,
        _ => 0,
    }
}

fn parse_coordinate(cell: &str) -> Option<f64> {
    cell.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn non_empty(cell: Option<&str>) -> Option<String> {
    cell.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

/// One reported case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseRecord {
    pub postcode: u32,
    pub notification_date: Option<NaiveDate>,
    /// LGA name as published, e.g. `Sydney (C)`.
    pub locality_raw: Option<String>,
}

impl CaseRecord {
    /// Read every row of a case table. Only the postcode column is required.
    pub fn from_table(table: &Table) -> Result<Vec<Self>, Error> {
        table.require_column(columns::POSTCODE)?;

        Ok((0..table.len())
            .map(|row| CaseRecord {
                postcode: parse_postcode(table.get(row, columns::POSTCODE).unwrap_or_default()),
                notification_date: table
                    .get(row, columns::NOTIFICATION_DATE)
                    .and_then(|d| NaiveDate::parse_from_str(d.trim(), "%Y-%m-%d").ok()),
                locality_raw: non_empty(table.get(row, columns::CASE_LGA)),
            })
            .collect())
    }
}

/// Geo reference point for a postcode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostcodeRecord {
    pub postcode: u32,
    pub state: String,
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
    pub lga_name: Option<String>,
}

impl PostcodeRecord {
    /// Read every row of a postcode table; `postcode` and `state` are required.
    pub fn from_table(table: &Table) -> Result<Vec<Self>, Error> {
        table.require_column(columns::POSTCODE)?;
        table.require_column(columns::STATE)?;
        let lga_column = columns::POSTCODE_LGA.iter().find(|c| table.column_index(c).is_some());

        Ok((0..table.len())
            .map(|row| PostcodeRecord {
                postcode: parse_postcode(table.get(row, columns::POSTCODE).unwrap_or_default()),
                state: table.get(row, columns::STATE).unwrap_or_default().trim().to_string(),
                longitude: table.get(row, columns::LONGITUDE).and_then(parse_coordinate),
                latitude: table.get(row, columns::LATITUDE).and_then(parse_coordinate),
                lga_name: lga_column.and_then(|c| non_empty(table.get(row, c))),
            })
            .collect())
    }
}

/// Case total for one geo point, accumulated within its LGA.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedPoint {
    pub postcode: u32,
    pub lga_name: String,
    pub longitude: f64,
    pub latitude: f64,
    pub cumulative_cases: u64,
}

/// When the source data last changed, if the server said.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LastUpdate {
    #[default]
    Unknown,
    At(DateTime<Utc>),
}

impl fmt::Display for LastUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LastUpdate::Unknown => f.write_str("N/A"),
            LastUpdate::At(at) => write!(f, "{}", at.format("%Y-%m-%d %H:%M UTC")),
        }
    }
}

/// Cleaned datasets keyed by kind, as handed to the presentation layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetBundle {
    pub datasets: BTreeMap<DatasetKind, Table>,
    pub last_update: LastUpdate,
}

impl DatasetBundle {
    pub fn get(&self, kind: DatasetKind) -> Option<&Table> {
        self.datasets.get(&kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_postcode() {
        assert_eq!(parse_postcode("2000"), 2000);
        assert_eq!(parse_postcode(" 2000 "), 2000);
        assert_eq!(parse_postcode("2000.0"), 2000);
        assert_eq!(parse_postcode(""), 0);
        assert_eq!(parse_postcode("nan"), 0);
        assert_eq!(parse_postcode("-5"), 0);
        assert_eq!(parse_postcode("2000.5"), 0);
        assert_eq!(parse_postcode("unknown"), 0);
    }

    #[test]
    fn test_case_records_from_table() {
        let table = Table::from_csv(
            b"notification_date,postcode,lga_name19\n2020-03-01,2000.0,Sydney (C)\n2020-03-02,,\n",
        )
        .unwrap();
        let cases = CaseRecord::from_table(&table).unwrap();

        assert_eq!(cases.len(), 2);
        assert_eq!(cases[0].postcode, 2000);
        assert_eq!(cases[0].notification_date, NaiveDate::from_ymd_opt(2020, 3, 1));
        assert_eq!(cases[0].locality_raw.as_deref(), Some("Sydney (C)"));
        assert_eq!(cases[1].postcode, 0);
        assert_eq!(cases[1].locality_raw, None);
    }

    #[test]
    fn test_case_records_require_postcode() {
        let table = Table::from_csv(b"notification_date\n2020-03-01\n").unwrap();
        assert!(matches!(CaseRecord::from_table(&table), Err(Error::Parse(_))));
    }

    #[test]
    fn test_postcode_records_lga_alias() {
        let table =
            Table::from_csv(b"postcode,state,long,lat,lgaregion\n2000,NSW,151.2,-33.8,Sydney\n2001,NSW,x,,\n")
                .unwrap();
        let records = PostcodeRecord::from_table(&table).unwrap();

        assert_eq!(records[0].lga_name.as_deref(), Some("Sydney"));
        assert_eq!(records[0].longitude, Some(151.2));
        assert_eq!(records[1].longitude, None);
        assert_eq!(records[1].latitude, None);
        assert_eq!(records[1].lga_name, None);
    }

    #[test]
    fn test_last_update_display() {
        assert_eq!(LastUpdate::Unknown.to_string(), "N/A");
        let at = DateTime::parse_from_rfc3339("2020-04-01T09:30:00Z").unwrap().with_timezone(&Utc);
        assert_eq!(LastUpdate::At(at).to_string(), "2020-04-01 09:30 UTC");
    }
}
