//! Leg Expansion
//!
//! Turns one voyage's ordered legs into consecutive day cells. A cursor starts
//! at the voyage's start date and advances by `ceil(duration)` per leg; legs
//! without a usable duration are skipped and reported, never guessed.

use chrono::NaiveDate;
use fleetplan_core::{
    CellContribution, Diagnostic, DiagnosticKind, OperationClass, Outcome, TimelineCell,
    VesselId, Voyage, VoyageId,
};
use tracing::{debug, warn};

/// Day range of one accepted leg, relative to the voyage start
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegSpan {
    /// Position of the leg in the voyage
    pub leg_index: usize,
    pub class: OperationClass,
    /// First day (inclusive)
    pub start_day: u32,
    /// Day after the last day (exclusive)
    pub end_day: u32,
    /// Port occupied during a port-stay leg
    pub port: Option<String>,
}

impl LegSpan {
    pub fn days(&self) -> u32 {
        self.end_day - self.start_day
    }
}

/// One voyage expanded onto a timeline
#[derive(Debug, Clone, PartialEq)]
pub struct ExpandedVoyage {
    pub voyage_id: VoyageId,
    pub vessel_id: Option<VesselId>,
    /// Cells inside the horizon, in day order
    pub cells: Vec<CellContribution>,
    /// Every accepted leg, untruncated
    pub spans: Vec<LegSpan>,
}

impl ExpandedVoyage {
    /// Days covered by accepted legs, ignoring the horizon
    pub fn total_days(&self) -> u32 {
        self.spans.last().map(|s| s.end_day).unwrap_or(0)
    }

    /// Cells tagged with the assigned vessel; empty for unassigned voyages
    pub fn timeline_cells(&self) -> Vec<TimelineCell> {
        let Some(vessel_id) = &self.vessel_id else {
            return Vec::new();
        };
        self.cells
            .iter()
            .map(|c| TimelineCell {
                vessel_id: vessel_id.clone(),
                day_index: c.day_index,
                class: c.class,
            })
            .collect()
    }
}

/// Compute the voyage-relative span of every leg with a valid duration
pub fn leg_spans(voyage: &Voyage) -> Outcome<Vec<LegSpan>> {
    let mut spans = Vec::with_capacity(voyage.legs.len());
    let mut diagnostics = Vec::new();
    let mut cursor: u32 = 0;

    for (index, leg) in voyage.legs.iter().enumerate() {
        match leg.day_count() {
            Ok(days) => {
                let Some(end_day) = cursor.checked_add(days) else {
                    warn!(voyage = %voyage.id, leg = index, "voyage length overflows, excluded");
                    diagnostics.push(Diagnostic::warning(
                        DiagnosticKind::InvalidLegDuration,
                        voyage.id.clone(),
                        format!(
                            "leg {} ({}) overflows the voyage length, voyage excluded",
                            index + 1,
                            leg.class
                        ),
                    ));
                    return Outcome::new(Vec::new(), diagnostics);
                };
                spans.push(LegSpan {
                    leg_index: index,
                    class: leg.class,
                    start_day: cursor,
                    end_day,
                    port: leg.port().map(str::to_string),
                });
                cursor = end_day;
            }
            Err(err) => {
                warn!(voyage = %voyage.id, leg = index, class = %leg.class, "skipping leg: {err}");
                diagnostics.push(Diagnostic::warning(
                    DiagnosticKind::InvalidLegDuration,
                    voyage.id.clone(),
                    format!("leg {} ({}) skipped: {}", index + 1, leg.class, err),
                ));
            }
        }
    }

    Outcome::new(spans, diagnostics)
}

/// Expand a voyage onto a timeline starting at `origin` and spanning
/// `horizon_days` days. Cells before the origin or past the horizon are dropped.
pub fn expand_voyage(
    voyage: &Voyage,
    origin: NaiveDate,
    horizon_days: u32,
) -> Outcome<ExpandedVoyage> {
    let (spans, diagnostics) = leg_spans(voyage).into_parts();
    let offset = (voyage.start_date - origin).num_days();
    let horizon = i64::from(horizon_days);

    let mut cells = Vec::new();
    let mut dropped = 0u64;
    for span in &spans {
        // Voyage-relative days that land inside [0, horizon)
        let first = i64::from(span.start_day).max(-offset);
        let last = i64::from(span.end_day).min(horizon - offset);
        let kept = (last - first).max(0);
        dropped += u64::from(span.days()) - kept as u64;
        for day in first..last {
            cells.push(CellContribution {
                voyage_id: voyage.id.clone(),
                day_index: (offset + day) as u32,
                class: span.class,
            });
        }
    }

    if dropped > 0 {
        debug!(voyage = %voyage.id, dropped, "cells outside the timeline horizon were truncated");
    }

    Outcome::new(
        ExpandedVoyage {
            voyage_id: voyage.id.clone(),
            vessel_id: voyage.vessel_id.clone(),
            cells,
            spans,
        },
        diagnostics,
    )
}
