//! Dataset cleaning, dispatched on [`DatasetKind`].
//!
//! Cleaning never mutates its input and keeps every input column. Rows are
//! only dropped by the postcode table's state filter and de-duplication.

use std::collections::HashSet;
use std::fmt::Display;
use std::sync::LazyLock;

use covidmap_core::{CaseCleaning, Error};
use regex::Regex;

use crate::model::{columns, parse_postcode};
use crate::table::{DatasetKind, Table};

/// State whose postcodes are plotted.
pub const STATE_FILTER: &str = "NSW";

/// Trailing LGA status marker: ` (A)` area or ` (C)` city.
static LGA_STATUS_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r" \([AC]\)$").expect("static LGA suffix pattern is valid"));

/// Clean `table` according to its kind.
///
/// `policy` only affects [`DatasetKind::NswCases`]; unknown kinds pass
/// through unchanged.
pub fn clean(table: &Table, kind: DatasetKind, policy: CaseCleaning) -> Result<Table, Error> {
    match kind {
        DatasetKind::AuPostcodes => clean_postcodes(table),
        DatasetKind::NswCases => match policy {
            CaseCleaning::Locality => clean_cases(table),
            CaseCleaning::PostcodeCoercion => coerce_case_postcodes(table),
        },
        DatasetKind::Other => Ok(table.clone()),
    }
}

/// Keep NSW rows, one per postcode (first occurrence wins).
///
/// Some postcodes span several localities; one point per postcode is
/// enough for plotting.
pub fn clean_postcodes(table: &Table) -> Result<Table, Error> {
    let state_col = table.require_column(columns::STATE)?;
    let postcode_col = table.require_column(columns::POSTCODE)?;

    let mut seen = HashSet::new();
    let cleaned = table
        .filter_rows(|row| row[state_col].trim() == STATE_FILTER && seen.insert(parse_postcode(&row[postcode_col])));

    tracing::debug!(before = table.len(), after = cleaned.len(), "cleaned postcode table");
    Ok(cleaned)
}

/// Add a normalized `locality` column derived from the case LGA name.
///
/// Rows without an LGA name get an empty locality.
pub fn clean_cases(table: &Table) -> Result<Table, Error> {
    let localities = table.column_values(columns::CASE_LGA).into_iter().map(get_locality).collect();
    table.with_column(columns::LOCALITY, localities)
}

/// Older case rule: rewrite the postcode column as integers, blanks as 0.
pub fn coerce_case_postcodes(table: &Table) -> Result<Table, Error> {
    table.require_column(columns::POSTCODE)?;
    let postcodes = table
        .column_values(columns::POSTCODE)
        .into_iter()
        .map(|cell| parse_postcode(cell).to_string())
        .collect();
    table.with_column(columns::POSTCODE, postcodes)
}

/// Upper-cased LGA name without its ` (A)` / ` (C)` status suffix.
///
/// Accepts anything displayable so numeric or otherwise odd cells are
/// coerced rather than rejected.
pub fn get_locality(name: impl Display) -> String {
    let name = name.to_string();
    LGA_STATUS_SUFFIX.replace(&name, "").to_uppercase()
}
