//! Plain-text rendering of timelines, schedules and conflicts

use std::fmt::Write;

use fleetplan_core::{
    ScheduleConflict, TimelineGrid, TimelineStatistics, YearSchedule,
};

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// One line per vessel, one character per day (`.` for idle days)
pub fn timeline(grid: &TimelineGrid) -> String {
    let mut out = String::new();
    let width = grid
        .rows
        .iter()
        .map(|r| r.vessel_id.len())
        .max()
        .unwrap_or(0)
        .max("vessel".len());

    let _ = writeln!(
        out,
        "{:<width$} | {} + {} days",
        "vessel",
        grid.origin,
        grid.horizon_days,
        width = width
    );
    for row in &grid.rows {
        let cells: String = row
            .cells
            .iter()
            .map(|cell| cell.map(|class| class.symbol()).unwrap_or('.'))
            .collect();
        let _ = writeln!(out, "{:<width$} | {}", row.vessel_id, cells, width = width);
    }
    for overlap in &grid.overlaps {
        let _ = writeln!(
            out,
            "overlap: {} carries {} and {} on {} to {}",
            overlap.vessel_id,
            overlap.first_voyage,
            overlap.second_voyage,
            grid.date_of(overlap.start_day),
            grid.date_of(overlap.end_day),
        );
    }
    out
}

pub fn timeline_statistics(stats: &TimelineStatistics) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "utilization: {:.1}% ({} of {} vessel-days)",
        stats.utilization, stats.occupied_cells, stats.total_cells
    );
    let counts: Vec<String> = stats
        .class_counts
        .iter()
        .filter(|(_, count)| **count > 0)
        .map(|(class, count)| format!("{class} {count}"))
        .collect();
    if !counts.is_empty() {
        let _ = writeln!(out, "days by operation: {}", counts.join(", "));
    }
    out
}

/// Monthly utilization table followed by placements and unplaced voyages
pub fn schedule(schedule: &YearSchedule) -> String {
    let mut out = String::new();
    let vessels = schedule.vessel_ids();
    let width = vessels.iter().map(|v| v.len()).max().unwrap_or(0).max(6);

    let _ = writeln!(out, "{} allocation ({})", schedule.year, schedule.goal);
    let _ = write!(out, "{:<width$}", "vessel", width = width);
    for month in MONTHS {
        let _ = write!(out, " {month:>5}");
    }
    let _ = writeln!(out);
    for vessel_id in &vessels {
        let _ = write!(out, "{:<width$}", vessel_id, width = width);
        for month in &schedule.months {
            let rate = month.vessel(vessel_id).map(|v| v.utilization_rate).unwrap_or(0.0);
            let _ = write!(out, " {rate:>4.0}%");
        }
        let _ = writeln!(out);
    }

    let stats = &schedule.statistics;
    let _ = writeln!(
        out,
        "placed {} voyage(s), {} unplaced, average utilization {:.1}%",
        stats.placed_voyages, stats.unplaced_voyages, stats.average_utilization
    );
    for placement in &schedule.placements {
        let _ = writeln!(
            out,
            "  {} -> {} ({} to {})",
            placement.voyage_id, placement.vessel_id, placement.start, placement.end
        );
    }
    for unplaced in &schedule.unplaced {
        let _ = writeln!(out, "  {} unplaced: {}", unplaced.voyage_id, unplaced.reason);
    }
    if schedule.cancelled {
        let _ = writeln!(out, "allocation was cancelled before all voyages were considered");
    }
    out
}

pub fn conflicts(conflicts: &[ScheduleConflict]) -> String {
    let mut out = String::new();
    if conflicts.is_empty() {
        let _ = writeln!(out, "no conflicts");
        return out;
    }
    for conflict in conflicts {
        let _ = writeln!(out, "{}[{}]: {}", conflict.severity, conflict.id, conflict.description);
        if !conflict.affected_entity_ids.is_empty() {
            let _ = writeln!(out, "   = affects: {}", conflict.affected_entity_ids.join(", "));
        }
        if let Some(resolution) = &conflict.suggested_resolution {
            let _ = writeln!(out, "   = hint: {resolution}");
        }
    }
    out
}
