//! Join cases to postcode geo points and accumulate counts per LGA.

use std::collections::HashMap;

use covidmap_core::Error;

use crate::model::{AggregatedPoint, CaseRecord, PostcodeRecord};
use crate::table::Table;

/// Grouping key; coordinates are compared by bit pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PointKey {
    postcode: u32,
    lga_name: String,
    longitude: u64,
    latitude: u64,
}

/// Per-point case totals, running-summed within each LGA.
///
/// Cases are left-joined to `postcodes` on postcode. Each case counts once
/// toward the point `(postcode, lga_name, longitude, latitude)` of its row;
/// rows lacking any of those (no geo match, no LGA) have no map position and
/// are left out. Points keep the order in which they were first seen, and
/// `cumulative_cases` is the running total over the points of the same LGA
/// in that order. The LGA of a row is the case's own LGA when it has one,
/// otherwise the postcode's.
pub fn aggregate(cases: &[CaseRecord], postcodes: &[PostcodeRecord]) -> Vec<AggregatedPoint> {
    let mut geo: HashMap<u32, &PostcodeRecord> = HashMap::with_capacity(postcodes.len());
    for record in postcodes {
        geo.entry(record.postcode).or_insert(record);
    }

    let mut index: HashMap<PointKey, usize> = HashMap::new();
    let mut points: Vec<(AggregatedPoint, u64)> = Vec::new();
    let mut unplaced = 0usize;

    for case in cases {
        let Some(point) = geo.get(&case.postcode) else {
            unplaced += 1;
            continue;
        };
        let (Some(longitude), Some(latitude)) = (point.longitude, point.latitude) else {
            unplaced += 1;
            continue;
        };
        let Some(lga_name) = case.locality_raw.as_ref().or(point.lga_name.as_ref()) else {
            unplaced += 1;
            continue;
        };

        let key = PointKey {
            postcode: case.postcode,
            lga_name: lga_name.clone(),
            longitude: longitude.to_bits(),
            latitude: latitude.to_bits(),
        };
        let slot = *index.entry(key).or_insert_with(|| {
            points.push((
                AggregatedPoint {
                    postcode: case.postcode,
                    lga_name: lga_name.clone(),
                    longitude,
                    latitude,
                    cumulative_cases: 0,
                },
                0,
            ));
            points.len() - 1
        });
        points[slot].1 += 1;
    }

    if unplaced > 0 {
        tracing::debug!(unplaced, total = cases.len(), "cases without a map position");
    }

    let mut running: HashMap<String, u64> = HashMap::new();
    points
        .into_iter()
        .map(|(mut point, total)| {
            let sum = running.entry(point.lga_name.clone()).or_insert(0);
            *sum += total;
            point.cumulative_cases = *sum;
            point
        })
        .collect()
}

/// [`aggregate`] over cleaned case and postcode tables.
pub fn aggregate_tables(cases: &Table, postcodes: &Table) -> Result<Vec<AggregatedPoint>, Error> {
    let cases = CaseRecord::from_table(cases)?;
    let postcodes = PostcodeRecord::from_table(postcodes)?;
    Ok(aggregate(&cases, &postcodes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn case(postcode: u32, lga: Option<&str>) -> CaseRecord {
        CaseRecord {
            postcode,
            notification_date: NaiveDate::from_ymd_opt(2020, 3, 1),
            locality_raw: lga.map(str::to_string),
        }
    }

    fn postcode(postcode: u32, lga: &str, long: f64, lat: f64) -> PostcodeRecord {
        PostcodeRecord {
            postcode,
            state: "NSW".into(),
            longitude: Some(long),
            latitude: Some(lat),
            lga_name: Some(lga.into()),
        }
    }

    #[test]
    fn test_two_cases_one_postcode() {
        let cases = vec![case(2000, None), case(2000, None)];
        let postcodes = vec![postcode(2000, "Sydney (C)", 151.2, -33.8)];

        let points = aggregate(&cases, &postcodes);

        assert_eq!(points.len(), 1);
        assert_eq!(points[0].postcode, 2000);
        assert_eq!(points[0].lga_name, "Sydney (C)");
        assert_eq!(points[0].longitude, 151.2);
        assert_eq!(points[0].latitude, -33.8);
        assert_eq!(points[0].cumulative_cases, 2);
    }

    #[test]
    fn test_cumulative_within_lga_in_first_seen_order() {
        let cases = vec![
            case(2010, Some("Sydney (C)")),
            case(2000, Some("Sydney (C)")),
            case(2150, Some("Parramatta (C)")),
            case(2000, Some("Sydney (C)")),
            case(2010, Some("Sydney (C)")),
            case(2010, Some("Sydney (C)")),
        ];
        let postcodes = vec![
            postcode(2000, "Sydney (C)", 151.2, -33.8),
            postcode(2010, "Sydney (C)", 151.21, -33.88),
            postcode(2150, "Parramatta (C)", 151.0, -33.81),
        ];

        let points = aggregate(&cases, &postcodes);
        let summary: Vec<(u32, u64)> = points.iter().map(|p| (p.postcode, p.cumulative_cases)).collect();

        // 2010 holds 3 cases and 2000 holds 2; Sydney's running total ends at 5
        assert_eq!(summary, vec![(2010, 3), (2000, 5), (2150, 1)]);
    }

    #[test]
    fn test_cumulative_is_monotonic_and_ends_at_group_total() {
        let lgas = ["Sydney (C)", "Burwood (A)", "Sydney (C)", "Burwood (A)", "Sydney (C)"];
        let postcodes: Vec<PostcodeRecord> = (0..5)
            .map(|i| postcode(2000 + i, lgas[i as usize], 151.0 + i as f64 / 10.0, -33.8))
            .collect();
        let cases: Vec<CaseRecord> = [0u32, 1, 2, 2, 3, 4, 4, 4, 0, 1]
            .iter()
            .map(|i| case(2000 + i, Some(lgas[*i as usize])))
            .collect();

        let points = aggregate(&cases, &postcodes);

        for lga in ["Sydney (C)", "Burwood (A)"] {
            let series: Vec<u64> = points.iter().filter(|p| p.lga_name == lga).map(|p| p.cumulative_cases).collect();
            assert!(series.windows(2).all(|w| w[0] <= w[1]));
            let total = cases.iter().filter(|c| c.locality_raw.as_deref() == Some(lga)).count() as u64;
            assert_eq!(series.last().copied(), Some(total));
        }
    }

    #[test]
    fn test_unmatched_cases_are_left_out() {
        let cases = vec![case(2000, None), case(0, None), case(9999, Some("Nowhere"))];
        let postcodes = vec![postcode(2000, "Sydney (C)", 151.2, -33.8)];

        let points = aggregate(&cases, &postcodes);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].cumulative_cases, 1);
    }

    #[test]
    fn test_missing_coordinates_are_left_out() {
        let mut record = postcode(2000, "Sydney (C)", 151.2, -33.8);
        record.latitude = None;
        let points = aggregate(&[case(2000, None)], &[record]);
        assert!(points.is_empty());
    }

    #[test]
    fn test_case_lga_takes_precedence() {
        let cases = vec![case(2000, Some("City of Sydney")), case(2000, None)];
        let postcodes = vec![postcode(2000, "Sydney (C)", 151.2, -33.8)];

        let points = aggregate(&cases, &postcodes);
        let names: Vec<&str> = points.iter().map(|p| p.lga_name.as_str()).collect();
        assert_eq!(names, vec!["City of Sydney", "Sydney (C)"]);
    }

    #[test]
    fn test_first_postcode_record_wins() {
        let postcodes = vec![postcode(2000, "Sydney (C)", 151.2, -33.8), postcode(2000, "Other", 1.0, 1.0)];
        let points = aggregate(&[case(2000, None)], &postcodes);
        assert_eq!(points[0].lga_name, "Sydney (C)");
    }

    #[test]
    fn test_aggregate_is_idempotent() {
        let cases = vec![case(2010, None), case(2000, None), case(2010, None)];
        let postcodes = vec![postcode(2000, "Sydney (C)", 151.2, -33.8), postcode(2010, "Sydney (C)", 151.21, -33.88)];

        assert_eq!(aggregate(&cases, &postcodes), aggregate(&cases, &postcodes));
    }

    #[test]
    fn test_aggregate_tables() {
        let cases = Table::from_csv(b"notification_date,postcode\n2020-03-01,2000\n2020-03-02,2000.0\n").unwrap();
        let postcodes = Table::from_csv(b"postcode,state,long,lat,lga_name\n2000,NSW,151.2,-33.8,Sydney (C)\n").unwrap();

        let points = aggregate_tables(&cases, &postcodes).unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].cumulative_cases, 2);
    }
}
