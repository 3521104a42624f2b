//! Statistics Aggregation
//!
//! Pure functions deriving counts and utilization from timelines and year
//! schedules.

use std::collections::BTreeMap;

use fleetplan_core::{
    days_in_year, FilteredTimeline, MonthlyTotals, OperationClass, ScheduleStatistics,
    TimelineGrid, TimelineStatistics, YearSchedule,
};

/// Statistics over the rendered cells of an unfiltered grid
pub fn timeline_statistics(grid: &TimelineGrid) -> TimelineStatistics {
    let mut class_counts: BTreeMap<OperationClass, usize> =
        OperationClass::ALL.into_iter().map(|c| (c, 0)).collect();
    let mut vessel_occupied_days = Vec::with_capacity(grid.rows.len());
    let mut occupied_cells = 0;

    for row in &grid.rows {
        let mut occupied = 0;
        for class in row.cells.iter().flatten() {
            *class_counts.entry(*class).or_insert(0) += 1;
            occupied += 1;
        }
        occupied_cells += occupied;
        vessel_occupied_days.push((row.vessel_id.clone(), occupied));
    }

    let total_cells = grid.rows.len() * grid.horizon_days as usize;
    let utilization = if total_cells == 0 {
        0.0
    } else {
        occupied_cells as f64 / total_cells as f64 * 100.0
    };

    TimelineStatistics {
        vessel_occupied_days,
        class_counts,
        occupied_cells,
        total_cells,
        utilization,
    }
}

/// Statistics over a filtered view, for callers that explicitly want
/// presentation-level counts
pub fn filtered_statistics(filtered: &FilteredTimeline) -> TimelineStatistics {
    timeline_statistics(&filtered.grid)
}

/// Placement, utilization, volume and conflict figures of a year schedule
pub fn schedule_statistics(schedule: &YearSchedule) -> ScheduleStatistics {
    let year_days = days_in_year(schedule.year);
    let vessel_utilization: Vec<(String, f64)> = schedule
        .vessel_ids()
        .into_iter()
        .map(|vessel_id| {
            let allocated: u32 = schedule
                .months
                .iter()
                .filter_map(|m| m.vessel(&vessel_id))
                .map(|v| v.allocated_days)
                .sum();
            let rate = if year_days == 0 {
                0.0
            } else {
                (f64::from(allocated) / f64::from(year_days) * 100.0).clamp(0.0, 100.0)
            };
            (vessel_id, rate)
        })
        .collect();

    let average_utilization = mean(vessel_utilization.iter().map(|(_, rate)| *rate));

    let monthly: Vec<MonthlyTotals> = schedule
        .months
        .iter()
        .map(|m| MonthlyTotals {
            month: m.month,
            total_voyages: m.total_voyages,
            total_cargo: m.total_cargo,
            average_utilization: mean(m.vessels.iter().map(|v| v.utilization_rate)),
        })
        .collect();

    let mut conflicts_by_severity = BTreeMap::new();
    for conflict in &schedule.conflicts {
        *conflicts_by_severity.entry(conflict.severity).or_insert(0) += 1;
    }

    ScheduleStatistics {
        placed_voyages: schedule.placements.len(),
        unplaced_voyages: schedule.unplaced.len(),
        vessel_utilization,
        average_utilization,
        total_cargo: monthly.iter().map(|m| m.total_cargo).sum(),
        monthly,
        conflicts_by_severity,
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}
