//! Timeline Merging
//!
//! Builds one row per assigned vessel over a fixed horizon. When two voyages
//! claim the same day of a vessel, the rendered cell keeps the voyage that came
//! first in input order; both contributions are kept and the disputed range is
//! reported as a [`TimelineOverlap`] for the conflict detector.

use std::collections::{BTreeMap, HashMap};

use fleetplan_core::{
    Diagnostic, DiagnosticKind, Outcome, TimelineGrid, TimelineOverlap, TimelineRequest, VesselRow,
    VoyageStatus,
};
use tracing::{debug, info};

use crate::expand::expand_voyage;

/// Merge voyages into a vessel-by-day grid
pub fn merge_timeline(request: &TimelineRequest) -> Outcome<TimelineGrid> {
    let horizon = request.horizon_days;
    let mut grid = TimelineGrid::new(request.origin, horizon);
    let mut diagnostics = Vec::new();

    let mut row_index: HashMap<String, usize> = HashMap::new();
    // Per row and day: indices (in request order) of every voyage claiming the day
    let mut claims: Vec<Vec<Vec<usize>>> = Vec::new();

    for (voyage_idx, voyage) in request.voyages.iter().enumerate() {
        if voyage.status == VoyageStatus::Cancelled {
            diagnostics.push(Diagnostic::info(
                DiagnosticKind::VoyageExcluded,
                voyage.id.clone(),
                "cancelled voyage left off the timeline",
            ));
            continue;
        }
        let Some(vessel_id) = &voyage.vessel_id else {
            diagnostics.push(Diagnostic::info(
                DiagnosticKind::UnassignedVesselTimeline,
                voyage.id.clone(),
                "voyage has no vessel and is not shown on the timeline",
            ));
            continue;
        };

        let (expanded, leg_diagnostics) =
            expand_voyage(voyage, request.origin, horizon).into_parts();
        diagnostics.extend(leg_diagnostics);

        let row_idx = *row_index.entry(vessel_id.clone()).or_insert_with(|| {
            grid.rows.push(VesselRow::new(vessel_id.clone(), horizon));
            claims.push(vec![Vec::new(); horizon as usize]);
            grid.rows.len() - 1
        });
        let row = &mut grid.rows[row_idx];
        let row_claims = &mut claims[row_idx];

        for cell in expanded.cells {
            let day = cell.day_index as usize;
            if row.cells[day].is_none() {
                row.cells[day] = Some(cell.class);
            }
            if row_claims[day].last() != Some(&voyage_idx) {
                row_claims[day].push(voyage_idx);
            }
            row.contributions.push(cell);
        }
    }

    for (row, row_claims) in grid.rows.iter().zip(&claims) {
        for ((first, second), days) in disputed_days(row_claims) {
            for (start_day, end_day) in contiguous_ranges(&days) {
                debug!(
                    vessel = %row.vessel_id,
                    first = %request.voyages[first].id,
                    second = %request.voyages[second].id,
                    start_day,
                    end_day,
                    "overlapping voyages on timeline"
                );
                grid.overlaps.push(TimelineOverlap {
                    vessel_id: row.vessel_id.clone(),
                    first_voyage: request.voyages[first].id.clone(),
                    second_voyage: request.voyages[second].id.clone(),
                    start_day,
                    end_day,
                });
            }
        }
    }

    info!(
        vessels = grid.rows.len(),
        horizon,
        overlaps = grid.overlaps.len(),
        "timeline merged"
    );

    Outcome::new(grid, diagnostics)
}

/// Days claimed by more than one voyage, grouped by voyage pair
fn disputed_days(row_claims: &[Vec<usize>]) -> BTreeMap<(usize, usize), Vec<u32>> {
    let mut disputed: BTreeMap<(usize, usize), Vec<u32>> = BTreeMap::new();
    for (day, voyages) in row_claims.iter().enumerate() {
        for (i, first) in voyages.iter().enumerate() {
            for second in &voyages[i + 1..] {
                disputed
                    .entry((*first, *second))
                    .or_default()
                    .push(day as u32);
            }
        }
    }
    disputed
}

/// Collapse sorted day indices into inclusive `(start, end)` runs
fn contiguous_ranges(days: &[u32]) -> Vec<(u32, u32)> {
    let mut ranges: Vec<(u32, u32)> = Vec::new();
    for &day in days {
        match ranges.last_mut() {
            Some((_, end)) if *end + 1 == day => *end = day,
            _ => ranges.push((day, day)),
        }
    }
    ranges
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use fleetplan_core::{OperationClass, Voyage, VoyageLeg};
    use pretty_assertions::assert_eq;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn voyage(
        id: &str,
        vessel: Option<&str>,
        start: NaiveDate,
        legs: &[(OperationClass, f64)],
    ) -> Voyage {
        let mut v = Voyage::new(id, start);
        v.vessel_id = vessel.map(str::to_string);
        for (class, days) in legs {
            v = v.leg(VoyageLeg::new(*class).days(*days));
        }
        v
    }

    #[test]
    fn oversized_legs_leave_an_empty_row() {
        let origin = date(2025, 1, 1);
        let request = TimelineRequest::new(
            vec![voyage(
                "v1",
                Some("A"),
                origin,
                &[(OperationClass::Transit, 3.0e9), (OperationClass::Transit, 3.0e9)],
            )],
            origin,
            5,
        );

        let outcome = merge_timeline(&request);
        assert_eq!(outcome.value.rows[0].cells, vec![None; 5]);
        assert_eq!(outcome.of_kind(DiagnosticKind::InvalidLegDuration).count(), 2);
    }

    #[test]
    fn one_row_per_assigned_vessel_in_first_seen_order() {
        let origin = date(2025, 1, 1);
        let request = TimelineRequest::new(
            vec![
                voyage("v1", Some("B"), origin, &[(OperationClass::Transit, 3.0)]),
                voyage("v2", Some("A"), origin, &[(OperationClass::Loading, 2.0)]),
                voyage("v3", Some("B"), date(2025, 1, 5), &[(OperationClass::Discharge, 1.0)]),
            ],
            origin,
            7,
        );

        let grid = merge_timeline(&request).value;
        let ids: Vec<&str> = grid.rows.iter().map(|r| r.vessel_id.as_str()).collect();
        assert_eq!(ids, vec!["B", "A"]);

        let b = grid.row("B").unwrap();
        use OperationClass::*;
        assert_eq!(
            b.cells,
            vec![Some(Transit), Some(Transit), Some(Transit), None, Some(Discharge), None, None]
        );
        assert!(grid.overlaps.is_empty());
    }

    #[test]
    fn unassigned_and_cancelled_voyages_are_excluded() {
        let origin = date(2025, 1, 1);
        let request = TimelineRequest::new(
            vec![
                voyage("free", None, origin, &[(OperationClass::Transit, 3.0)]),
                voyage("gone", Some("A"), origin, &[(OperationClass::Transit, 3.0)])
                    .with_status(VoyageStatus::Cancelled),
            ],
            origin,
            5,
        );

        let outcome = merge_timeline(&request);
        assert!(outcome.value.rows.is_empty());
        assert_eq!(outcome.of_kind(DiagnosticKind::UnassignedVesselTimeline).count(), 1);
        assert_eq!(outcome.of_kind(DiagnosticKind::VoyageExcluded).count(), 1);
        assert!(!outcome.has_warnings());
    }

    #[test]
    fn disputed_days_render_first_voyage_and_are_flagged() {
        let origin = date(2025, 1, 1);
        let request = TimelineRequest::new(
            vec![
                voyage("A", Some("V1"), origin, &[(OperationClass::Transit, 10.0)]),
                voyage("B", Some("V1"), date(2025, 1, 8), &[(OperationClass::Loading, 8.0)]),
            ],
            origin,
            20,
        );

        let grid = merge_timeline(&request).value;
        let row = grid.row("V1").unwrap();
        assert_eq!(row.cells[9], Some(OperationClass::Transit));
        assert_eq!(row.cells[10], Some(OperationClass::Loading));
        assert_eq!(row.contributions.len(), 18);

        assert_eq!(
            grid.overlaps,
            vec![TimelineOverlap {
                vessel_id: "V1".into(),
                first_voyage: "A".into(),
                second_voyage: "B".into(),
                start_day: 7,
                end_day: 9,
            }]
        );
        assert_eq!(grid.overlaps[0].days(), 3);
    }

    #[test]
    fn three_way_dispute_flags_every_pair() {
        let origin = date(2025, 1, 1);
        let request = TimelineRequest::new(
            vec![
                voyage("A", Some("V1"), origin, &[(OperationClass::Transit, 4.0)]),
                voyage("B", Some("V1"), date(2025, 1, 2), &[(OperationClass::Waiting, 2.0)]),
                voyage("C", Some("V1"), date(2025, 1, 3), &[(OperationClass::Bunker, 1.0)]),
            ],
            origin,
            6,
        );

        let grid = merge_timeline(&request).value;
        let pairs: Vec<(&str, &str)> = grid
            .overlaps
            .iter()
            .map(|o| (o.first_voyage.as_str(), o.second_voyage.as_str()))
            .collect();
        assert_eq!(pairs, vec![("A", "B"), ("A", "C"), ("B", "C")]);
    }

    #[test]
    fn contiguous_ranges_split_on_gaps() {
        assert_eq!(contiguous_ranges(&[1, 2, 3, 7, 8, 10]), vec![(1, 3), (7, 8), (10, 10)]);
        assert!(contiguous_ranges(&[]).is_empty());
    }
}
