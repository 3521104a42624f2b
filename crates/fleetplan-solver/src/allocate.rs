//! Annual Allocation
//!
//! Greedy single pass over the year's voyages in start order. Each voyage
//! goes to the best vessel in scope that still has room in every month the
//! voyage spans; voyages no vessel can take are reported as unplaced and end
//! up as resource-shortage conflicts.

use std::cmp::Ordering;

use chrono::{Datelike, Days, NaiveDate};
use fleetplan_core::{
    days_in_month, total_leg_days, AllocationConfig, AllocationEngine, AllocationRequest,
    CancellationToken, DetectionConfig, Diagnostic, DiagnosticKind, NeverCancel,
    OptimizationGoal, Outcome, PartialEconomicsPolicy, PlanningConfig, UnplacedVoyage, VesselId,
    Voyage, VoyageEconomics, VoyagePlacement, VoyageStatus, VoyageTemplate, YearSchedule,
};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::detect::{ConflictDetector, DetectionSnapshot};
use crate::expand::leg_spans;
use crate::stats::schedule_statistics;

/// A voyage ready for placement
struct Candidate<'a> {
    voyage: &'a Voyage,
    start: NaiveDate,
    end: NaiveDate,
    /// (month index 0-11, days of the voyage in that month)
    month_days: Vec<(usize, u32)>,
    /// Scope index of the vessel the voyage is pinned to
    pinned: Option<usize>,
}

/// A vessel able to take the current voyage
#[derive(Debug, Clone, Copy)]
struct Ranked {
    scope_index: usize,
    figure: Option<Decimal>,
    utilization: f64,
}

/// Greedy annual fleet allocator
#[derive(Debug, Clone, Default)]
pub struct AnnualAllocator {
    allocation: AllocationConfig,
    detection: DetectionConfig,
}

impl AnnualAllocator {
    pub fn new(config: &PlanningConfig) -> Self {
        Self {
            allocation: config.allocation.clone(),
            detection: config.detection.clone(),
        }
    }

    pub fn with_policy(mut self, policy: PartialEconomicsPolicy) -> Self {
        self.allocation.partial_economics = policy;
        self
    }

    /// Allocate without cancellation
    pub fn plan_year(&self, request: &AllocationRequest) -> Outcome<YearSchedule> {
        self.allocate_with(request, &NeverCancel)
    }

    /// Allocate, polling `cancel` before each voyage
    pub fn allocate_with(
        &self,
        request: &AllocationRequest,
        cancel: &dyn CancellationToken,
    ) -> Outcome<YearSchedule> {
        let mut diagnostics = Vec::new();
        let scope = dedup_scope(&request.vessel_ids);
        let mut schedule = YearSchedule::new(request.year, request.goal, &scope);

        let (Some(year_start), Some(year_end)) = (
            NaiveDate::from_ymd_opt(request.year, 1, 1),
            NaiveDate::from_ymd_opt(request.year, 12, 31),
        ) else {
            diagnostics.push(Diagnostic::warning(
                DiagnosticKind::VoyageExcluded,
                request.year.to_string(),
                "year outside the supported calendar range, nothing allocated",
            ));
            return Outcome::new(schedule, diagnostics);
        };

        let mut voyages = request.voyages.clone();
        if request.use_templates {
            for template in &request.templates {
                let (instances, template_diagnostics) =
                    instantiate_template(template, year_start, year_end).into_parts();
                diagnostics.extend(template_diagnostics);
                voyages.extend(instances);
            }
        }

        let mut candidates = Vec::with_capacity(voyages.len());
        for voyage in &voyages {
            if let Some(candidate) =
                prepare(voyage, &scope, year_start, year_end, &mut diagnostics)
            {
                candidates.push(candidate);
            }
        }
        candidates.sort_by(|a, b| {
            a.start
                .cmp(&b.start)
                .then_with(|| a.voyage.id.cmp(&b.voyage.id))
        });

        let total = candidates.len();
        for (position, candidate) in candidates.iter().enumerate() {
            if cancel.is_cancelled() {
                schedule.cancelled = true;
                info!(placed = schedule.placements.len(), "allocation cancelled");
                diagnostics.push(Diagnostic::info(
                    DiagnosticKind::VoyageExcluded,
                    candidate.voyage.id.clone(),
                    format!(
                        "allocation cancelled, {} voyage(s) not considered",
                        total - position
                    ),
                ));
                break;
            }
            self.place(candidate, request, &scope, &mut schedule, &mut diagnostics);
        }

        for month in &mut schedule.months {
            month.refresh_voyage_count();
        }
        apply_rollups(&mut schedule, request, &mut diagnostics);

        let snapshot = DetectionSnapshot::from_schedule(&schedule, &voyages, &request.cargo);
        let (conflicts, detect_diagnostics) = ConflictDetector::new(self.detection.clone())
            .detect(&snapshot)
            .into_parts();
        schedule.conflicts = conflicts;
        diagnostics.extend(detect_diagnostics);
        schedule.statistics = schedule_statistics(&schedule);

        info!(
            year = request.year,
            goal = %request.goal,
            placed = schedule.placements.len(),
            unplaced = schedule.unplaced.len(),
            conflicts = schedule.conflicts.len(),
            cancelled = schedule.cancelled,
            "annual allocation finished"
        );

        Outcome::new(schedule, diagnostics)
    }

    fn place(
        &self,
        candidate: &Candidate<'_>,
        request: &AllocationRequest,
        scope: &[VesselId],
        schedule: &mut YearSchedule,
        diagnostics: &mut Vec<Diagnostic>,
    ) {
        let voyage = candidate.voyage;
        let eligible: Vec<usize> = match candidate.pinned {
            Some(idx) => vec![idx],
            None => (0..scope.len()).collect(),
        };

        let mut ranked: Vec<Ranked> = eligible
            .into_iter()
            .filter(|&idx| has_capacity(schedule, idx, &candidate.month_days))
            .map(|idx| Ranked {
                scope_index: idx,
                figure: figure_for(&request.economics, &voyage.id, &scope[idx], request.goal),
                utilization: mean_utilization(schedule, idx, &candidate.month_days),
            })
            .collect();

        let use_figures = match request.goal {
            OptimizationGoal::BalanceUtilization => false,
            _ => match self.allocation.partial_economics {
                PartialEconomicsPolicy::PreferPriced => ranked.iter().any(|r| r.figure.is_some()),
                PartialEconomicsPolicy::UtilizationOnly => {
                    !ranked.is_empty() && ranked.iter().all(|r| r.figure.is_some())
                }
            },
        };
        ranked.sort_by(|a, b| rank(a, b, request.goal, use_figures));

        let Some(best) = ranked.first() else {
            let reason = match candidate.pinned {
                Some(idx) => format!("pinned vessel {} has no spare capacity", scope[idx]),
                None if scope.is_empty() => "no vessels in scope".to_string(),
                None => "no vessel in scope has spare capacity in every spanned month".to_string(),
            };
            warn!(voyage = %voyage.id, start = %candidate.start, "voyage left unplaced: {reason}");
            diagnostics.push(Diagnostic::warning(
                DiagnosticKind::AllocationOverflow,
                voyage.id.clone(),
                reason.clone(),
            ));
            schedule.unplaced.push(UnplacedVoyage {
                voyage_id: voyage.id.clone(),
                start: candidate.start,
                end: candidate.end,
                reason,
            });
            return;
        };

        let idx = best.scope_index;
        let vessel_id = &scope[idx];
        for &(month, days) in &candidate.month_days {
            let bucket = &mut schedule.months[month];
            let dim = bucket.days_in_month();
            bucket.vessels[idx].book(&voyage.id, days, dim);
        }

        if let Some(&(first_month, _)) = candidate.month_days.first() {
            let cargo: f64 = request
                .cargo
                .iter()
                .filter(|c| voyage.cargo_ids.contains(&c.id))
                .map(|c| c.quantity)
                .sum();
            let bucket = &mut schedule.months[first_month];
            bucket.total_cargo += cargo;
            let figure = |goal| figure_for(&request.economics, &voyage.id, vessel_id, goal);
            if let Some(revenue) = figure(OptimizationGoal::MaximizeRevenue) {
                bucket.total_revenue += revenue;
            }
            if let Some(cost) = figure(OptimizationGoal::MinimizeCost) {
                bucket.total_cost += cost;
            }
        }

        debug!(
            voyage = %voyage.id,
            vessel = %vessel_id,
            start = %candidate.start,
            end = %candidate.end,
            "voyage placed"
        );
        schedule.placements.push(VoyagePlacement {
            voyage_id: voyage.id.clone(),
            vessel_id: vessel_id.clone(),
            start: candidate.start,
            end: candidate.end,
        });
    }
}

impl AllocationEngine for AnnualAllocator {
    fn allocate(
        &self,
        request: &AllocationRequest,
        cancel: &dyn CancellationToken,
    ) -> Outcome<YearSchedule> {
        self.allocate_with(request, cancel)
    }
}

/// Keep the first occurrence of every vessel id
fn dedup_scope(vessel_ids: &[VesselId]) -> Vec<VesselId> {
    let mut scope: Vec<VesselId> = Vec::with_capacity(vessel_ids.len());
    for id in vessel_ids {
        if !scope.contains(id) {
            scope.push(id.clone());
        }
    }
    scope
}

/// Filter a voyage and work out its per-month footprint within the year
fn prepare<'a>(
    voyage: &'a Voyage,
    scope: &[VesselId],
    year_start: NaiveDate,
    year_end: NaiveDate,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<Candidate<'a>> {
    if voyage.status == VoyageStatus::Cancelled {
        diagnostics.push(Diagnostic::info(
            DiagnosticKind::VoyageExcluded,
            voyage.id.clone(),
            "cancelled voyage not allocated",
        ));
        return None;
    }

    let (spans, leg_diagnostics) = leg_spans(voyage).into_parts();
    diagnostics.extend(leg_diagnostics);
    if spans.is_empty() {
        diagnostics.push(Diagnostic::warning(
            DiagnosticKind::VoyageExcluded,
            voyage.id.clone(),
            "voyage has no leg with a valid duration",
        ));
        return None;
    }
    let Some((start, end)) = voyage.span() else {
        diagnostics.push(Diagnostic::warning(
            DiagnosticKind::VoyageExcluded,
            voyage.id.clone(),
            format!("voyage starting {} ends past the last representable date", voyage.start_date),
        ));
        return None;
    };

    if end < year_start || start > year_end {
        diagnostics.push(Diagnostic::info(
            DiagnosticKind::VoyageExcluded,
            voyage.id.clone(),
            format!("voyage runs {start} to {end}, outside {}", year_start.year()),
        ));
        return None;
    }

    let pinned = match &voyage.vessel_id {
        Some(vessel_id) => match scope.iter().position(|v| v == vessel_id) {
            Some(idx) => Some(idx),
            None => {
                diagnostics.push(Diagnostic::warning(
                    DiagnosticKind::VesselOutOfScope,
                    voyage.id.clone(),
                    format!("assigned vessel {vessel_id} is outside the scope, reallocating"),
                ));
                None
            }
        },
        None => None,
    };

    Some(Candidate {
        voyage,
        start,
        end,
        month_days: month_footprint(start.max(year_start), end.min(year_end)),
        pinned,
    })
}

/// Days per month of an inclusive date range lying within one year
fn month_footprint(start: NaiveDate, end: NaiveDate) -> Vec<(usize, u32)> {
    let mut footprint = Vec::new();
    for month in start.month()..=end.month() {
        let first = if month == start.month() { start.day() } else { 1 };
        let last = if month == end.month() {
            end.day()
        } else {
            days_in_month(start.year(), month)
        };
        footprint.push(((month - 1) as usize, last - first + 1));
    }
    footprint
}

fn has_capacity(schedule: &YearSchedule, idx: usize, month_days: &[(usize, u32)]) -> bool {
    month_days.iter().all(|&(month, days)| {
        let bucket = &schedule.months[month];
        bucket.vessels[idx].free_days(bucket.days_in_month()) >= days
    })
}

/// Mean utilization of a vessel over the months a voyage spans
fn mean_utilization(schedule: &YearSchedule, idx: usize, month_days: &[(usize, u32)]) -> f64 {
    if month_days.is_empty() {
        return 0.0;
    }
    let sum: f64 = month_days
        .iter()
        .map(|&(month, _)| schedule.months[month].vessels[idx].utilization_rate)
        .sum();
    sum / month_days.len() as f64
}

/// The revenue (or cost) figure for a voyage on a vessel. Vessel-specific
/// figures win over figures that apply to any vessel.
fn figure_for(
    economics: &[VoyageEconomics],
    voyage_id: &str,
    vessel_id: &str,
    goal: OptimizationGoal,
) -> Option<Decimal> {
    let pick = |e: &VoyageEconomics| match goal {
        OptimizationGoal::MaximizeRevenue => e.revenue,
        OptimizationGoal::MinimizeCost => e.cost,
        OptimizationGoal::BalanceUtilization => None,
    };
    let for_voyage = || economics.iter().filter(|e| e.voyage_id == voyage_id);

    for_voyage()
        .filter(|e| e.vessel_id.as_deref() == Some(vessel_id))
        .find_map(pick)
        .or_else(|| for_voyage().filter(|e| e.vessel_id.is_none()).find_map(pick))
}

fn rank(a: &Ranked, b: &Ranked, goal: OptimizationGoal, use_figures: bool) -> Ordering {
    let by_figure = if use_figures {
        match (a.figure, b.figure) {
            (Some(x), Some(y)) if goal == OptimizationGoal::MaximizeRevenue => y.cmp(&x),
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    } else {
        Ordering::Equal
    };

    by_figure
        .then_with(|| a.utilization.total_cmp(&b.utilization))
        .then_with(|| a.scope_index.cmp(&b.scope_index))
}

/// Expand a template into voyages starting within the year
fn instantiate_template(
    template: &VoyageTemplate,
    year_start: NaiveDate,
    year_end: NaiveDate,
) -> Outcome<Vec<Voyage>> {
    let mut diagnostics = Vec::new();
    let length = total_leg_days(&template.legs).unwrap_or(0);
    if length == 0 {
        diagnostics.push(Diagnostic::warning(
            DiagnosticKind::VoyageExcluded,
            template.id.clone(),
            "template has no leg with a valid duration",
        ));
        return Outcome::new(Vec::new(), diagnostics);
    }

    let interval = Days::new(u64::from(template.interval_days.unwrap_or(length).max(1)));
    let length = Days::new(u64::from(length));
    let mut next = Some(template.first_start.unwrap_or(year_start));
    // Skip instances that end before the year
    while let Some(start) = next {
        if start.checked_add_days(length).map_or(true, |end| end > year_start) {
            break;
        }
        next = start.checked_add_days(interval);
    }

    let mut instances = Vec::new();
    while let Some(start) = next.filter(|&start| start <= year_end) {
        let mut voyage = Voyage::new(format!("{}-{}", template.id, instances.len() + 1), start);
        voyage.legs = template.legs.clone();
        voyage.cargo_ids = template.cargo_ids.clone();
        instances.push(voyage);
        next = start.checked_add_days(interval);
    }

    debug!(template = %template.id, instances = instances.len(), "template instantiated");
    Outcome::new(instances, diagnostics)
}

/// Overwrite monthly financial and volume totals with supplied rollups
fn apply_rollups(
    schedule: &mut YearSchedule,
    request: &AllocationRequest,
    diagnostics: &mut Vec<Diagnostic>,
) {
    for rollup in &request.rollups {
        let Some(bucket) = schedule.months.iter_mut().find(|m| m.month == rollup.month) else {
            diagnostics.push(Diagnostic::info(
                DiagnosticKind::VoyageExcluded,
                format!("rollup-{}", rollup.month),
                "rollup month outside 1-12 ignored",
            ));
            continue;
        };
        bucket.total_cargo = rollup.total_cargo;
        bucket.total_revenue = rollup.total_revenue;
        bucket.total_cost = rollup.total_cost;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetplan_core::{CargoCommitment, MonthlyRollup, OperationClass, VoyageLeg};
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;
    use std::sync::atomic::AtomicBool;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn voyage(id: &str, start: NaiveDate, days: f64) -> Voyage {
        Voyage::new(id, start).leg(VoyageLeg::new(OperationClass::Transit).days(days))
    }

    fn scope(ids: &[&str]) -> Vec<VesselId> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    fn year_request(ids: &[&str], goal: OptimizationGoal) -> AllocationRequest {
        AllocationRequest::new(2025, scope(ids), goal)
    }

    fn placed_on<'a>(schedule: &'a YearSchedule, voyage_id: &str) -> &'a str {
        &schedule.placement(voyage_id).unwrap().vessel_id
    }

    #[test]
    fn month_footprint_splits_across_months() {
        assert_eq!(
            month_footprint(date(2025, 1, 30), date(2025, 3, 2)),
            vec![(0, 2), (1, 28), (2, 2)]
        );
        assert_eq!(month_footprint(date(2024, 2, 1), date(2024, 2, 29)), vec![(1, 29)]);
    }

    #[test]
    fn balance_spreads_voyages_across_vessels() {
        let request = year_request(&["A", "B"], OptimizationGoal::BalanceUtilization)
            .voyages(vec![
                voyage("v1", date(2025, 1, 1), 10.0),
                voyage("v2", date(2025, 1, 5), 10.0),
                voyage("v3", date(2025, 1, 20), 5.0),
            ]);

        let schedule = AnnualAllocator::default().plan_year(&request).value;
        assert_eq!(placed_on(&schedule, "v1"), "A");
        assert_eq!(placed_on(&schedule, "v2"), "B");
        // Both at 10/31; scope order breaks the tie
        assert_eq!(placed_on(&schedule, "v3"), "A");
        assert_eq!(schedule.months[0].total_voyages, 3);
        assert_eq!(schedule.months[0].vessel("A").unwrap().allocated_days, 15);
    }

    #[test]
    fn voyages_are_placed_in_start_order_regardless_of_input_order() {
        let request = year_request(&["A"], OptimizationGoal::BalanceUtilization)
            .voyages(vec![
                voyage("late", date(2025, 2, 1), 28.0),
                voyage("early", date(2025, 1, 1), 31.0),
            ]);
        let schedule = AnnualAllocator::default().plan_year(&request).value;
        let order: Vec<&str> = schedule.placements.iter().map(|p| p.voyage_id.as_str()).collect();
        assert_eq!(order, vec!["early", "late"]);
    }

    #[test]
    fn full_month_leaves_voyage_unplaced() {
        let request = year_request(&["A"], OptimizationGoal::BalanceUtilization)
            .voyages(vec![
                voyage("v1", date(2025, 3, 1), 31.0),
                voyage("v2", date(2025, 3, 15), 2.0),
            ]);

        let outcome = AnnualAllocator::default().plan_year(&request);
        let schedule = &outcome.value;
        assert_eq!(schedule.placements.len(), 1);
        assert_eq!(schedule.unplaced[0].voyage_id, "v2");
        assert_eq!(outcome.of_kind(DiagnosticKind::AllocationOverflow).count(), 1);
        assert_eq!(schedule.months[2].vessels[0].utilization_rate, 100.0);
    }

    #[test]
    fn pinned_vessel_is_respected_and_checked() {
        let request = year_request(&["A", "B"], OptimizationGoal::BalanceUtilization)
            .voyages(vec![
                voyage("v1", date(2025, 1, 1), 10.0).vessel("B"),
                voyage("v2", date(2025, 4, 1), 30.0).vessel("B"),
                voyage("v3", date(2025, 4, 10), 5.0).vessel("B"),
            ]);

        let schedule = AnnualAllocator::default().plan_year(&request).value;
        assert_eq!(placed_on(&schedule, "v1"), "B");
        assert_eq!(placed_on(&schedule, "v2"), "B");
        assert_eq!(schedule.unplaced.len(), 1);
        assert!(schedule.unplaced[0].reason.contains("pinned vessel B"));
    }

    #[test]
    fn out_of_scope_vessel_is_reallocated() {
        let request = year_request(&["A"], OptimizationGoal::BalanceUtilization)
            .voyages(vec![voyage("v1", date(2025, 1, 1), 10.0).vessel("Z")]);

        let outcome = AnnualAllocator::default().plan_year(&request);
        assert_eq!(placed_on(&outcome.value, "v1"), "A");
        assert_eq!(outcome.of_kind(DiagnosticKind::VesselOutOfScope).count(), 1);
    }

    #[test]
    fn excluded_voyages_are_reported() {
        let request = year_request(&["A"], OptimizationGoal::BalanceUtilization)
            .voyages(vec![
                voyage("gone", date(2025, 1, 1), 3.0).with_status(VoyageStatus::Cancelled),
                voyage("last-year", date(2024, 6, 1), 3.0),
                Voyage::new("empty", date(2025, 1, 1)).leg(VoyageLeg::new(OperationClass::Canal)),
            ]);

        let outcome = AnnualAllocator::default().plan_year(&request);
        assert!(outcome.value.placements.is_empty());
        assert!(outcome.value.unplaced.is_empty());
        assert_eq!(outcome.of_kind(DiagnosticKind::VoyageExcluded).count(), 3);
        assert_eq!(outcome.of_kind(DiagnosticKind::InvalidLegDuration).count(), 1);
    }

    #[test]
    fn oversized_or_unrepresentable_voyages_are_excluded() {
        let request = year_request(&["A"], OptimizationGoal::BalanceUtilization)
            .voyages(vec![
                voyage("huge", date(2025, 1, 1), 1.0e9),
                Voyage::new("far", NaiveDate::MAX - Days::new(5))
                    .leg(VoyageLeg::new(OperationClass::Transit).days(30.0)),
                voyage("ok", date(2025, 3, 1), 4.0),
            ]);

        let outcome = AnnualAllocator::default().plan_year(&request);
        assert_eq!(placed_on(&outcome.value, "ok"), "A");
        assert_eq!(outcome.value.placements.len(), 1);
        assert_eq!(outcome.of_kind(DiagnosticKind::InvalidLegDuration).count(), 1);
        let excluded: Vec<&str> = outcome
            .of_kind(DiagnosticKind::VoyageExcluded)
            .map(|d| d.subject.as_str())
            .collect();
        assert_eq!(excluded, vec!["huge", "far"]);
    }

    #[test]
    fn year_boundary_voyage_books_only_days_in_year() {
        let request = year_request(&["A"], OptimizationGoal::BalanceUtilization)
            .voyages(vec![voyage("v1", date(2024, 12, 25), 10.0)]);

        let schedule = AnnualAllocator::default().plan_year(&request).value;
        assert_eq!(schedule.months[0].vessels[0].allocated_days, 3);
        let placement = schedule.placement("v1").unwrap();
        assert_eq!(placement.start, date(2024, 12, 25));
        assert_eq!(placement.end, date(2025, 1, 3));
    }

    #[test]
    fn revenue_goal_prefers_highest_figure() {
        let request = year_request(&["A", "B"], OptimizationGoal::MaximizeRevenue)
            .voyages(vec![voyage("v1", date(2025, 1, 1), 10.0)])
            .economics(vec![
                VoyageEconomics::new("v1").on_vessel("A").revenue(dec!(100000)),
                VoyageEconomics::new("v1").on_vessel("B").revenue(dec!(125000.50)),
            ]);

        let schedule = AnnualAllocator::default().plan_year(&request).value;
        assert_eq!(placed_on(&schedule, "v1"), "B");
        assert_eq!(schedule.months[0].total_revenue, dec!(125000.50));
    }

    #[test]
    fn cost_goal_prefers_lowest_figure_and_specific_over_generic() {
        let request = year_request(&["A", "B"], OptimizationGoal::MinimizeCost)
            .voyages(vec![voyage("v1", date(2025, 1, 1), 10.0)])
            .economics(vec![
                VoyageEconomics::new("v1").cost(dec!(50000)),
                VoyageEconomics::new("v1").on_vessel("A").cost(dec!(60000)),
            ]);

        let schedule = AnnualAllocator::default().plan_year(&request).value;
        assert_eq!(placed_on(&schedule, "v1"), "B");
        assert_eq!(schedule.months[0].total_cost, dec!(50000));
    }

    #[test]
    fn partial_economics_policies_differ() {
        let request = year_request(&["A", "B"], OptimizationGoal::MaximizeRevenue)
            .voyages(vec![
                voyage("v0", date(2025, 1, 1), 5.0).vessel("A"),
                voyage("v1", date(2025, 1, 10), 5.0),
            ])
            .economics(vec![VoyageEconomics::new("v1").on_vessel("A").revenue(dec!(1))]);

        let priced = AnnualAllocator::default().plan_year(&request).value;
        assert_eq!(placed_on(&priced, "v1"), "A");

        let by_utilization = AnnualAllocator::default()
            .with_policy(PartialEconomicsPolicy::UtilizationOnly)
            .plan_year(&request)
            .value;
        assert_eq!(placed_on(&by_utilization, "v1"), "B");
    }

    #[test]
    fn templates_instantiate_across_the_year() {
        let template = VoyageTemplate::new("shuttle")
            .leg(VoyageLeg::new(OperationClass::Loading).days(2.0))
            .leg(VoyageLeg::new(OperationClass::Transit).days(5.0))
            .every(30);
        let request = year_request(&["A"], OptimizationGoal::BalanceUtilization)
            .templates(vec![template]);

        let schedule = AnnualAllocator::default().plan_year(&request).value;
        // Jan 1 + 30n for n = 0..=12 stays within 2025
        assert_eq!(schedule.placements.len(), 13);
        assert_eq!(schedule.placements[0].voyage_id, "shuttle-1");
        assert_eq!(schedule.placements[1].start, date(2025, 1, 31));
    }

    #[test]
    fn templates_are_ignored_unless_requested() {
        let template =
            VoyageTemplate::new("t").leg(VoyageLeg::new(OperationClass::Transit).days(3.0));
        let mut request =
            year_request(&["A"], OptimizationGoal::BalanceUtilization).templates(vec![template]);
        request.use_templates = false;
        let schedule = AnnualAllocator::default().plan_year(&request).value;
        assert!(schedule.placements.is_empty());
    }

    #[test]
    fn cancelled_run_returns_partial_schedule() {
        let request = year_request(&["A"], OptimizationGoal::BalanceUtilization)
            .voyages(vec![voyage("v1", date(2025, 1, 1), 3.0)]);
        let cancel = AtomicBool::new(true);

        let outcome = AnnualAllocator::default().allocate(&request, &cancel);
        assert!(outcome.value.cancelled);
        assert!(outcome.value.placements.is_empty());
        assert_eq!(outcome.value.months.len(), 12);
    }

    #[test]
    fn cargo_and_rollups_feed_monthly_totals() {
        let request = year_request(&["A"], OptimizationGoal::BalanceUtilization)
            .voyages(vec![voyage("v1", date(2025, 2, 3), 4.0).cargo("CG-1")])
            .cargo(vec![
                CargoCommitment::new("CG-1", date(2025, 2, 1), date(2025, 2, 5)).quantity(80_000.0)
            ])
            .rollups(vec![MonthlyRollup {
                month: 5,
                total_cargo: 12_000.0,
                total_revenue: dec!(900000),
                total_cost: dec!(450000),
            }]);

        let schedule = AnnualAllocator::default().plan_year(&request).value;
        assert_eq!(schedule.months[1].total_cargo, 80_000.0);
        assert_eq!(schedule.months[4].total_cargo, 12_000.0);
        assert_eq!(schedule.months[4].total_revenue, dec!(900000));
        assert_eq!(schedule.statistics.total_cargo, 92_000.0);
    }

    #[test]
    fn duplicate_scope_entries_are_collapsed() {
        let request = year_request(&["A", "B", "A"], OptimizationGoal::BalanceUtilization);
        let schedule = AnnualAllocator::default().plan_year(&request).value;
        assert_eq!(schedule.vessel_ids(), scope(&["A", "B"]));
    }
}
