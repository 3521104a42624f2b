//! Operation Filtering
//!
//! Masks grid cells to a subset of operation classes. Filtering is a
//! presentation step: the result is a [`FilteredTimeline`], which statistics
//! only read when explicitly asked to.

use fleetplan_core::{FilteredTimeline, OperationSet, TimelineGrid};

/// Empty every cell whose class is not in `accepted`. Rows, horizon,
/// contributions and overlaps are left untouched.
pub fn filter_grid(grid: &TimelineGrid, accepted: OperationSet) -> FilteredTimeline {
    let mut masked = grid.clone();
    for row in &mut masked.rows {
        for cell in &mut row.cells {
            if matches!(cell, Some(class) if !accepted.contains(*class)) {
                *cell = None;
            }
        }
    }
    FilteredTimeline {
        accepted,
        grid: masked,
    }
}

/// Cell-by-cell merge: each cell of `base` that is empty takes the value of
/// the same vessel and day in `top`. The result has the shape of `base`.
pub fn overlay(base: &TimelineGrid, top: &TimelineGrid) -> TimelineGrid {
    let mut merged = base.clone();
    for row in &mut merged.rows {
        let Some(other) = top.row(&row.vessel_id) else {
            continue;
        };
        for (cell, other_cell) in row.cells.iter_mut().zip(&other.cells) {
            if cell.is_none() {
                *cell = *other_cell;
            }
        }
    }
    merged
}

/// Recombine two filtered views of the same grid
pub fn overlay_filtered(a: &FilteredTimeline, b: &FilteredTimeline) -> TimelineGrid {
    overlay(&a.grid, &b.grid)
}
