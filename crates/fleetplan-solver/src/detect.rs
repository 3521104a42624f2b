//! Conflict Detection
//!
//! Four independent rules evaluated over one [`DetectionSnapshot`]:
//!
//! | Rule | Trigger | Severity |
//! |------|---------|----------|
//! | vessel-overlap | two occupancies of one vessel share a day | by overlap length |
//! | port-capacity | simultaneous calls at a port exceed its capacity | by peak excess ratio |
//! | cargo-timing | no loading day of a voyage falls in its cargo's laycan | high |
//! | resource-shortage | the allocator could not place a voyage | critical |
//!
//! A rule whose input is malformed (an inverted day range) is skipped with a
//! `ConflictDetectionFailure` diagnostic; the remaining rules still run.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::NaiveDate;
use fleetplan_core::{
    offset_date, CargoCommitment, CargoId, ConflictSeverity, ConflictType, DetectionConfig,
    Diagnostic, DiagnosticKind, OperationClass, Outcome, ScheduleConflict, TimelineGrid,
    UnplacedVoyage, VesselId, Voyage, VoyageId, YearSchedule,
};
use tracing::{debug, warn};

use crate::expand::leg_spans;

/// A vessel busy with a voyage over `[start_day, end_day)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occupancy {
    pub vessel_id: VesselId,
    pub voyage_id: VoyageId,
    pub start_day: i64,
    pub end_day: i64,
}

/// A voyage present at a port over `[start_day, end_day)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortCall {
    pub port: String,
    pub voyage_id: VoyageId,
    pub start_day: i64,
    pub end_day: i64,
}

/// Loading day ranges of a voyage and the cargo it carries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadingWindow {
    pub voyage_id: VoyageId,
    pub cargo_ids: Vec<CargoId>,
    /// `[start, end)` day ranges of the voyage's loading legs
    pub ranges: Vec<(i64, i64)>,
}

/// Everything the detector inspects, with days counted from `origin`
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionSnapshot {
    pub origin: NaiveDate,
    pub occupancies: Vec<Occupancy>,
    pub port_calls: Vec<PortCall>,
    pub loading_windows: Vec<LoadingWindow>,
    pub cargo: Vec<CargoCommitment>,
    pub unplaced: Vec<UnplacedVoyage>,
}

impl DetectionSnapshot {
    pub fn new(origin: NaiveDate) -> Self {
        Self {
            origin,
            occupancies: Vec::new(),
            port_calls: Vec::new(),
            loading_windows: Vec::new(),
            cargo: Vec::new(),
            unplaced: Vec::new(),
        }
    }

    /// Snapshot of a year schedule's placements and unplaced voyages.
    /// `voyages` supplies the legs of placed voyages.
    pub fn from_schedule(
        schedule: &YearSchedule,
        voyages: &[Voyage],
        cargo: &[CargoCommitment],
    ) -> Self {
        let origin = NaiveDate::from_ymd_opt(schedule.year, 1, 1).unwrap_or(NaiveDate::MIN);
        let mut snapshot = Self::new(origin);
        let by_id: HashMap<&str, &Voyage> = voyages.iter().map(|v| (v.id.as_str(), v)).collect();

        for placement in &schedule.placements {
            snapshot.occupancies.push(Occupancy {
                vessel_id: placement.vessel_id.clone(),
                voyage_id: placement.voyage_id.clone(),
                start_day: snapshot.day(placement.start),
                end_day: snapshot.day(placement.end) + 1,
            });
            if let Some(voyage) = by_id.get(placement.voyage_id.as_str()) {
                snapshot.add_voyage_activity(voyage, None);
            }
        }

        snapshot.cargo = cargo.to_vec();
        snapshot.unplaced = schedule.unplaced.clone();
        snapshot
    }

    /// Snapshot of the voyages shown on a timeline grid, limited to its horizon
    pub fn from_timeline(
        grid: &TimelineGrid,
        voyages: &[Voyage],
        cargo: &[CargoCommitment],
    ) -> Self {
        let mut snapshot = Self::new(grid.origin);

        for row in &grid.rows {
            let mut spans: BTreeMap<&str, (i64, i64)> = BTreeMap::new();
            for cell in &row.contributions {
                let day = i64::from(cell.day_index);
                spans
                    .entry(cell.voyage_id.as_str())
                    .and_modify(|(start, end)| {
                        *start = (*start).min(day);
                        *end = (*end).max(day + 1);
                    })
                    .or_insert((day, day + 1));
            }
            for (voyage_id, (start_day, end_day)) in spans {
                snapshot.occupancies.push(Occupancy {
                    vessel_id: row.vessel_id.clone(),
                    voyage_id: voyage_id.to_string(),
                    start_day,
                    end_day,
                });
            }
        }

        let shown: BTreeSet<String> = snapshot
            .occupancies
            .iter()
            .map(|o| o.voyage_id.clone())
            .collect();
        let horizon = Some((0, i64::from(grid.horizon_days)));
        for voyage in voyages.iter().filter(|v| shown.contains(v.id.as_str())) {
            snapshot.add_voyage_activity(voyage, horizon);
        }

        snapshot.cargo = cargo.to_vec();
        snapshot
    }

    /// Add a voyage's port calls and loading windows, optionally clipped to
    /// `[clip.0, clip.1)`
    pub fn add_voyage_activity(&mut self, voyage: &Voyage, clip: Option<(i64, i64)>) {
        let offset = self.day(voyage.start_date);
        let spans = leg_spans(voyage).value;
        let clip_range = |start: i64, end: i64| match clip {
            Some((lo, hi)) => {
                let (s, e) = (start.max(lo), end.min(hi));
                (s < e).then_some((s, e))
            }
            None => Some((start, end)),
        };

        for span in &spans {
            let Some(port) = &span.port else { continue };
            let start = offset + i64::from(span.start_day);
            let end = offset + i64::from(span.end_day);
            if let Some((start_day, end_day)) = clip_range(start, end) {
                self.port_calls.push(PortCall {
                    port: port.clone(),
                    voyage_id: voyage.id.clone(),
                    start_day,
                    end_day,
                });
            }
        }

        if voyage.cargo_ids.is_empty() {
            return;
        }
        let ranges: Vec<(i64, i64)> = spans
            .iter()
            .filter(|s| s.class == OperationClass::Loading)
            .map(|s| (offset + i64::from(s.start_day), offset + i64::from(s.end_day)))
            .collect();
        if ranges.is_empty() {
            debug!(voyage = %voyage.id, "voyage carries cargo but has no loading leg");
            return;
        }
        self.loading_windows.push(LoadingWindow {
            voyage_id: voyage.id.clone(),
            cargo_ids: voyage.cargo_ids.clone(),
            ranges,
        });
    }

    /// Day offset of a date from the origin
    pub fn day(&self, date: NaiveDate) -> i64 {
        (date - self.origin).num_days()
    }

    /// Date of a day offset
    pub fn date(&self, day: i64) -> NaiveDate {
        offset_date(self.origin, day)
    }
}

/// Rule-based conflict detector
#[derive(Debug, Clone, Default)]
pub struct ConflictDetector {
    config: DetectionConfig,
}

struct Findings {
    conflicts: Vec<ScheduleConflict>,
    diagnostics: Vec<Diagnostic>,
    sequence: HashMap<ConflictType, usize>,
}

impl Findings {
    fn push(
        &mut self,
        conflict_type: ConflictType,
        severity: ConflictSeverity,
        affected_entity_ids: Vec<String>,
        description: String,
        suggested_resolution: String,
    ) {
        let seq = self.sequence.entry(conflict_type).or_insert(0);
        *seq += 1;
        self.conflicts.push(ScheduleConflict {
            id: format!("{}-{:03}", conflict_type.as_str(), seq),
            conflict_type,
            severity,
            affected_entity_ids,
            description,
            suggested_resolution: Some(suggested_resolution),
        });
    }

    fn rule_skipped(&mut self, rule: ConflictType, reason: String) {
        warn!(rule = %rule, "conflict rule skipped: {reason}");
        self.diagnostics.push(Diagnostic::warning(
            DiagnosticKind::ConflictDetectionFailure,
            rule.as_str(),
            format!("rule skipped: {reason}"),
        ));
    }
}

impl ConflictDetector {
    pub fn new(config: DetectionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    /// Run every rule over the snapshot
    pub fn detect(&self, snapshot: &DetectionSnapshot) -> Outcome<Vec<ScheduleConflict>> {
        let mut findings = Findings {
            conflicts: Vec::new(),
            diagnostics: Vec::new(),
            sequence: HashMap::new(),
        };

        self.vessel_overlaps(snapshot, &mut findings);
        self.port_capacity(snapshot, &mut findings);
        self.cargo_timing(snapshot, &mut findings);
        self.resource_shortage(snapshot, &mut findings);

        debug!(conflicts = findings.conflicts.len(), "conflict detection finished");
        Outcome::new(findings.conflicts, findings.diagnostics)
    }

    fn vessel_overlaps(&self, snapshot: &DetectionSnapshot, findings: &mut Findings) {
        if let Some(bad) = snapshot.occupancies.iter().find(|o| o.end_day <= o.start_day) {
            findings.rule_skipped(
                ConflictType::VesselOverlap,
                format!(
                    "voyage {} on {} has an empty or negative day range",
                    bad.voyage_id, bad.vessel_id
                ),
            );
            return;
        }

        let mut by_vessel: BTreeMap<&str, Vec<&Occupancy>> = BTreeMap::new();
        for occupancy in &snapshot.occupancies {
            by_vessel
                .entry(occupancy.vessel_id.as_str())
                .or_default()
                .push(occupancy);
        }

        for (vessel_id, mut occupancies) in by_vessel {
            occupancies.sort_by(|a, b| {
                a.start_day
                    .cmp(&b.start_day)
                    .then_with(|| a.voyage_id.cmp(&b.voyage_id))
            });
            for (i, first) in occupancies.iter().enumerate() {
                for second in &occupancies[i + 1..] {
                    if second.start_day >= first.end_day {
                        break;
                    }
                    let overlap_end = first.end_day.min(second.end_day);
                    let days = (overlap_end - second.start_day) as u32;
                    let severity = self.config.overlap.classify(days);
                    findings.push(
                        ConflictType::VesselOverlap,
                        severity,
                        vec![
                            vessel_id.to_string(),
                            first.voyage_id.clone(),
                            second.voyage_id.clone(),
                        ],
                        format!(
                            "{} is booked by voyages {} and {} for {} overlapping day(s), {} to {}",
                            vessel_id,
                            first.voyage_id,
                            second.voyage_id,
                            days,
                            snapshot.date(second.start_day),
                            snapshot.date(overlap_end - 1),
                        ),
                        format!(
                            "Start voyage {} on or after {} or move it to another vessel",
                            second.voyage_id,
                            snapshot.date(first.end_day),
                        ),
                    );
                }
            }
        }
    }

    fn port_capacity(&self, snapshot: &DetectionSnapshot, findings: &mut Findings) {
        if let Some(bad) = snapshot.port_calls.iter().find(|c| c.end_day <= c.start_day) {
            findings.rule_skipped(
                ConflictType::PortCapacity,
                format!(
                    "call of voyage {} at {} has an empty or negative day range",
                    bad.voyage_id, bad.port
                ),
            );
            return;
        }

        // Port -> day -> voyages present
        let mut presence: BTreeMap<&str, BTreeMap<i64, BTreeSet<&str>>> = BTreeMap::new();
        for call in &snapshot.port_calls {
            let days = presence.entry(call.port.as_str()).or_default();
            for day in call.start_day..call.end_day {
                days.entry(day).or_default().insert(call.voyage_id.as_str());
            }
        }

        for (port, days) in presence {
            let capacity = self.config.port_capacity(port).max(1);
            for period in congested_periods(&days, capacity as usize) {
                let excess_ratio = (period.peak - capacity as usize) as f64 / f64::from(capacity);
                let severity = self.config.port_excess.classify(excess_ratio);
                let mut affected = vec![port.to_string()];
                affected.extend(period.voyages.iter().map(|v| v.to_string()));
                findings.push(
                    ConflictType::PortCapacity,
                    severity,
                    affected,
                    format!(
                        "{} has up to {} simultaneous calls against a capacity of {} from {} to {}",
                        port,
                        period.peak,
                        capacity,
                        snapshot.date(period.start),
                        snapshot.date(period.end),
                    ),
                    format!(
                        "Stagger arrivals at {} or divert {} call(s) to another port",
                        port,
                        period.peak - capacity as usize,
                    ),
                );
            }
        }
    }

    fn cargo_timing(&self, snapshot: &DetectionSnapshot, findings: &mut Findings) {
        if let Some(bad) = snapshot.cargo.iter().find(|c| !c.laycan_is_valid()) {
            findings.rule_skipped(
                ConflictType::CargoTiming,
                format!(
                    "cargo {} has a laycan ending ({}) before it starts ({})",
                    bad.id, bad.laycan_end, bad.laycan_start
                ),
            );
            return;
        }
        if let Some(bad) = snapshot
            .loading_windows
            .iter()
            .find(|w| w.ranges.iter().any(|(s, e)| e <= s))
        {
            findings.rule_skipped(
                ConflictType::CargoTiming,
                format!("voyage {} has an empty or negative loading range", bad.voyage_id),
            );
            return;
        }

        let cargo_by_id: HashMap<&str, &CargoCommitment> =
            snapshot.cargo.iter().map(|c| (c.id.as_str(), c)).collect();

        for window in &snapshot.loading_windows {
            for cargo_id in &window.cargo_ids {
                let Some(cargo) = cargo_by_id.get(cargo_id.as_str()) else {
                    debug!(
                        voyage = %window.voyage_id,
                        cargo = %cargo_id,
                        "cargo commitment not in snapshot"
                    );
                    continue;
                };
                let laycan_start = snapshot.day(cargo.laycan_start);
                let laycan_end = snapshot.day(cargo.laycan_end) + 1;
                let meets_laycan = window
                    .ranges
                    .iter()
                    .any(|(start, end)| *start < laycan_end && laycan_start < *end);
                if meets_laycan {
                    continue;
                }

                let (first_start, _) = window.ranges[0];
                let (_, last_end) = window.ranges[window.ranges.len() - 1];
                let timing = if first_start >= laycan_end { "after" } else { "before" };
                findings.push(
                    ConflictType::CargoTiming,
                    ConflictSeverity::High,
                    vec![window.voyage_id.clone(), cargo.id.clone()],
                    format!(
                        "Voyage {} loads {} to {}, {} the laycan of cargo {} ({} to {})",
                        window.voyage_id,
                        snapshot.date(first_start),
                        snapshot.date(last_end - 1),
                        timing,
                        cargo.id,
                        cargo.laycan_start,
                        cargo.laycan_end,
                    ),
                    format!(
                        "Move voyage {} into the {} to {} laycan or renegotiate it",
                        window.voyage_id,
                        cargo.laycan_start,
                        cargo.laycan_end,
                    ),
                );
            }
        }
    }

    fn resource_shortage(&self, snapshot: &DetectionSnapshot, findings: &mut Findings) {
        for unplaced in &snapshot.unplaced {
            findings.push(
                ConflictType::ResourceShortage,
                ConflictSeverity::Critical,
                vec![unplaced.voyage_id.clone()],
                format!(
                    "Voyage {} ({} to {}) could not be placed: {}",
                    unplaced.voyage_id, unplaced.start, unplaced.end, unplaced.reason
                ),
                "Charter in additional tonnage or move the voyage to a period with spare capacity"
                    .to_string(),
            );
        }
    }
}

/// A contiguous run of days where a port is over capacity
struct CongestedPeriod<'a> {
    start: i64,
    /// Last day (inclusive)
    end: i64,
    peak: usize,
    voyages: BTreeSet<&'a str>,
}

fn congested_periods<'a>(
    days: &BTreeMap<i64, BTreeSet<&'a str>>,
    capacity: usize,
) -> Vec<CongestedPeriod<'a>> {
    let mut periods: Vec<CongestedPeriod<'a>> = Vec::new();
    let mut current: Option<CongestedPeriod<'a>> = None;

    for (&day, voyages) in days {
        if voyages.len() <= capacity {
            if let Some(period) = current.take() {
                periods.push(period);
            }
            continue;
        }
        match &mut current {
            Some(period) if period.end + 1 == day => {
                period.end = day;
                period.peak = period.peak.max(voyages.len());
                period.voyages.extend(voyages.iter().copied());
            }
            _ => {
                if let Some(period) = current.take() {
                    periods.push(period);
                }
                current = Some(CongestedPeriod {
                    start: day,
                    end: day,
                    peak: voyages.len(),
                    voyages: voyages.clone(),
                });
            }
        }
    }

    if let Some(period) = current {
        periods.push(period);
    }
    periods
}
