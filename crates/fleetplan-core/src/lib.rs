//! # fleetplan-core
//!
//! Core domain model and traits for the fleetplan voyage planning engine.
//!
//! This crate provides:
//! - Domain types: `Voyage`, `VoyageLeg`, `Vessel`, `CargoCommitment`, `Snapshot`
//! - Derived structures: `TimelineGrid`, `YearSchedule`, `ResourceAllocation`
//! - Core traits: `TimelineEngine`, `AllocationEngine`, `CancellationToken`
//! - Diagnostics, conflict types and configuration
//!
//! ## Example
//!
//! ```rust
//! use chrono::NaiveDate;
//! use fleetplan_core::{OperationClass, Voyage, VoyageLeg};
//!
//! let voyage = Voyage::new("V-001", NaiveDate::from_ymd_opt(2025, 3, 1).unwrap())
//!     .vessel("MV Aurora")
//!     .leg(VoyageLeg::new(OperationClass::Loading).days(2.0).from("Santos"))
//!     .leg(VoyageLeg::new(OperationClass::Transit).days(18.5))
//!     .leg(VoyageLeg::new(OperationClass::Discharge).days(3.0).from("Qingdao"));
//!
//! assert_eq!(voyage.total_days(), Some(24));
//! ```

pub mod config;
pub mod conflict;
pub mod diagnostics;

pub use config::{
    AllocationConfig, ConfigError, DetectionConfig, PartialEconomicsPolicy, PlanningConfig,
    TimelineConfig,
};
pub use conflict::{
    ConflictSeverity, ConflictType, ExcessThresholds, OverlapThresholds, ScheduleConflict,
};
pub use diagnostics::{Diagnostic, DiagnosticKind, DiagnosticLevel, Outcome};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

// ============================================================================
// Type Aliases
// ============================================================================

/// Unique identifier for a voyage
pub type VoyageId = String;

/// Unique identifier for a vessel
pub type VesselId = String;

/// Unique identifier for a cargo commitment
pub type CargoId = String;

/// Unique identifier for a voyage template
pub type TemplateId = String;

/// Number of days in the given month, or 0 for an invalid month.
pub fn days_in_month(year: i32, month: u32) -> u32 {
    let Some(first) = NaiveDate::from_ymd_opt(year, month, 1) else {
        return 0;
    };
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    next.map(|n| (n - first).num_days() as u32).unwrap_or(0)
}

/// Number of days in the given year (365 or 366).
pub fn days_in_year(year: i32) -> u32 {
    (1..=12).map(|m| days_in_month(year, m)).sum()
}

// ============================================================================
// Operation Classes
// ============================================================================

/// The kind of work a vessel performs during a voyage leg
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationClass {
    Ballast,
    Loading,
    Transit,
    Discharge,
    Canal,
    Bunker,
    Waiting,
}

impl OperationClass {
    /// Every operation class, in declaration order
    pub const ALL: [OperationClass; 7] = [
        OperationClass::Ballast,
        OperationClass::Loading,
        OperationClass::Transit,
        OperationClass::Discharge,
        OperationClass::Canal,
        OperationClass::Bunker,
        OperationClass::Waiting,
    ];

    /// Wire name of the class
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationClass::Ballast => "ballast",
            OperationClass::Loading => "loading",
            OperationClass::Transit => "transit",
            OperationClass::Discharge => "discharge",
            OperationClass::Canal => "canal",
            OperationClass::Bunker => "bunker",
            OperationClass::Waiting => "waiting",
        }
    }

    /// Single-character symbol used by text timelines
    pub fn symbol(&self) -> char {
        match self {
            OperationClass::Ballast => 'b',
            OperationClass::Loading => 'L',
            OperationClass::Transit => 'T',
            OperationClass::Discharge => 'D',
            OperationClass::Canal => 'C',
            OperationClass::Bunker => 'F',
            OperationClass::Waiting => 'W',
        }
    }

    /// Whether the vessel occupies a berth or anchorage during this operation
    pub fn is_port_stay(&self) -> bool {
        matches!(
            self,
            OperationClass::Loading
                | OperationClass::Discharge
                | OperationClass::Bunker
                | OperationClass::Waiting
        )
    }

    fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

impl std::fmt::Display for OperationClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown operation class name
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown operation class: {0}")]
pub struct UnknownOperationClass(pub String);

impl std::str::FromStr for OperationClass {
    type Err = UnknownOperationClass;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        OperationClass::ALL
            .into_iter()
            .find(|c| c.as_str() == needle)
            .ok_or_else(|| UnknownOperationClass(s.to_string()))
    }
}

/// A set of operation classes, stored as a bitset
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<OperationClass>", into = "Vec<OperationClass>")]
pub struct OperationSet {
    bits: u8,
}

impl OperationSet {
    const MASK: u8 = 0b0111_1111;

    pub const fn empty() -> Self {
        Self { bits: 0 }
    }

    pub const fn all() -> Self {
        Self { bits: Self::MASK }
    }

    pub fn with(mut self, class: OperationClass) -> Self {
        self.insert(class);
        self
    }

    pub fn insert(&mut self, class: OperationClass) {
        self.bits |= class.bit();
    }

    pub fn remove(&mut self, class: OperationClass) {
        self.bits &= !class.bit();
    }

    pub fn contains(&self, class: OperationClass) -> bool {
        self.bits & class.bit() != 0
    }

    /// Classes not in this set
    pub fn complement(&self) -> Self {
        Self {
            bits: !self.bits & Self::MASK,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    pub fn len(&self) -> usize {
        self.bits.count_ones() as usize
    }

    pub fn iter(&self) -> impl Iterator<Item = OperationClass> + '_ {
        OperationClass::ALL
            .into_iter()
            .filter(move |c| self.contains(*c))
    }
}

impl FromIterator<OperationClass> for OperationSet {
    fn from_iter<I: IntoIterator<Item = OperationClass>>(iter: I) -> Self {
        let mut set = Self::empty();
        for class in iter {
            set.insert(class);
        }
        set
    }
}

impl From<Vec<OperationClass>> for OperationSet {
    fn from(classes: Vec<OperationClass>) -> Self {
        classes.into_iter().collect()
    }
}

impl From<OperationSet> for Vec<OperationClass> {
    fn from(set: OperationSet) -> Self {
        set.iter().collect()
    }
}

// ============================================================================
// Voyage
// ============================================================================

/// Why a leg cannot be placed on a timeline
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LegError {
    #[error("leg has no duration")]
    MissingDuration,

    #[error("leg duration must be positive, got {0}")]
    NonPositiveDuration(f64),

    #[error("leg duration is not a finite number")]
    NonFiniteDuration,

    #[error("leg duration of {0} days exceeds the {max}-day limit", max = MAX_LEG_DAYS)]
    TooLong(f64),
}

/// Longest accepted leg, in days
pub const MAX_LEG_DAYS: f64 = 3650.0;

/// One phase of a voyage
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VoyageLeg {
    /// Operation performed during the leg
    #[serde(rename = "type")]
    pub class: OperationClass,
    /// Port where the leg begins
    #[serde(default)]
    pub origin: Option<String>,
    /// Port where the leg ends
    #[serde(default)]
    pub destination: Option<String>,
    /// Distance in nautical miles
    #[serde(default)]
    pub distance_nm: Option<f64>,
    /// Duration in days (fractional days round up on the timeline)
    #[serde(default)]
    pub duration_days: Option<f64>,
}

impl VoyageLeg {
    pub fn new(class: OperationClass) -> Self {
        Self {
            class,
            origin: None,
            destination: None,
            distance_nm: None,
            duration_days: None,
        }
    }

    /// Set the duration in days
    pub fn days(mut self, days: f64) -> Self {
        self.duration_days = Some(days);
        self
    }

    /// Set the origin port
    pub fn from(mut self, port: impl Into<String>) -> Self {
        self.origin = Some(port.into());
        self
    }

    /// Set the destination port
    pub fn to(mut self, port: impl Into<String>) -> Self {
        self.destination = Some(port.into());
        self
    }

    /// Set the sailed distance
    pub fn distance(mut self, nm: f64) -> Self {
        self.distance_nm = Some(nm);
        self
    }

    /// Number of whole timeline days the leg occupies: `ceil(duration)`.
    pub fn day_count(&self) -> Result<u32, LegError> {
        let days = self.duration_days.ok_or(LegError::MissingDuration)?;
        if !days.is_finite() {
            return Err(LegError::NonFiniteDuration);
        }
        if days <= 0.0 {
            return Err(LegError::NonPositiveDuration(days));
        }
        if days > MAX_LEG_DAYS {
            return Err(LegError::TooLong(days));
        }
        Ok(days.ceil() as u32)
    }

    /// Port occupied by a port-stay leg (origin, falling back to destination)
    pub fn port(&self) -> Option<&str> {
        if !self.class.is_port_stay() {
            return None;
        }
        self.origin.as_deref().or(self.destination.as_deref())
    }
}

/// Lifecycle state of a voyage
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VoyageStatus {
    #[default]
    Planned,
    Active,
    Completed,
    Cancelled,
}

impl std::fmt::Display for VoyageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VoyageStatus::Planned => write!(f, "planned"),
            VoyageStatus::Active => write!(f, "active"),
            VoyageStatus::Completed => write!(f, "completed"),
            VoyageStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// A multi-leg voyage, optionally assigned to a vessel
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Voyage {
    /// Unique identifier
    pub id: VoyageId,
    /// Assigned vessel (None until allocated)
    #[serde(default)]
    pub vessel_id: Option<VesselId>,
    /// Ordered legs; order defines time progression
    #[serde(default)]
    pub legs: Vec<VoyageLeg>,
    /// First day of the first leg
    pub start_date: NaiveDate,
    /// Lifecycle state
    #[serde(default)]
    pub status: VoyageStatus,
    /// Cargo commitments carried on this voyage
    #[serde(default)]
    pub cargo_ids: Vec<CargoId>,
}

impl Voyage {
    /// Create an unassigned, planned voyage with no legs
    pub fn new(id: impl Into<String>, start_date: NaiveDate) -> Self {
        Self {
            id: id.into(),
            vessel_id: None,
            legs: Vec::new(),
            start_date,
            status: VoyageStatus::Planned,
            cargo_ids: Vec::new(),
        }
    }

    /// Assign a vessel
    pub fn vessel(mut self, vessel_id: impl Into<String>) -> Self {
        self.vessel_id = Some(vessel_id.into());
        self
    }

    /// Append a leg
    pub fn leg(mut self, leg: VoyageLeg) -> Self {
        self.legs.push(leg);
        self
    }

    /// Attach a cargo commitment
    pub fn cargo(mut self, cargo_id: impl Into<String>) -> Self {
        self.cargo_ids.push(cargo_id.into());
        self
    }

    /// Set the status
    pub fn with_status(mut self, status: VoyageStatus) -> Self {
        self.status = status;
        self
    }

    pub fn is_assigned(&self) -> bool {
        self.vessel_id.is_some()
    }

    /// Total timeline days over all valid legs, None if the sum overflows
    pub fn total_days(&self) -> Option<u32> {
        total_leg_days(&self.legs)
    }

    /// First and last calendar day of the voyage (inclusive). None if it has
    /// no valid legs or its end falls outside the calendar.
    pub fn span(&self) -> Option<(NaiveDate, NaiveDate)> {
        let days = self.total_days().filter(|&d| d > 0)?;
        let end = self.start_date.checked_add_days(chrono::Days::new(u64::from(days - 1)))?;
        Some((self.start_date, end))
    }
}

/// Sum of `day_count` over the legs that have one, None on overflow
pub fn total_leg_days(legs: &[VoyageLeg]) -> Option<u32> {
    legs.iter()
        .filter_map(|l| l.day_count().ok())
        .try_fold(0u32, |total, days| total.checked_add(days))
}

/// `date` moved by `days`, saturating at the ends of the calendar
pub fn offset_date(date: NaiveDate, days: i64) -> NaiveDate {
    chrono::Duration::try_days(days)
        .and_then(|delta| date.checked_add_signed(delta))
        .unwrap_or(if days < 0 { NaiveDate::MIN } else { NaiveDate::MAX })
}

// ============================================================================
// Fleet & Commercial Inputs
// ============================================================================

/// A vessel in the fleet; only the id is used by the engines
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Vessel {
    pub id: VesselId,
    #[serde(default)]
    pub name: String,
    /// Deadweight tonnage
    #[serde(default)]
    pub dwt: Option<f64>,
}

impl Vessel {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            dwt: None,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// A contractual cargo commitment
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CargoCommitment {
    pub id: CargoId,
    /// Quantity in metric tonnes
    #[serde(default)]
    pub quantity: f64,
    #[serde(default)]
    pub load_port: String,
    #[serde(default)]
    pub disch_port: String,
    /// First day loading may commence
    pub laycan_start: NaiveDate,
    /// Last day loading may commence
    pub laycan_end: NaiveDate,
}

impl CargoCommitment {
    pub fn new(id: impl Into<String>, laycan_start: NaiveDate, laycan_end: NaiveDate) -> Self {
        Self {
            id: id.into(),
            quantity: 0.0,
            load_port: String::new(),
            disch_port: String::new(),
            laycan_start,
            laycan_end,
        }
    }

    pub fn quantity(mut self, tonnes: f64) -> Self {
        self.quantity = tonnes;
        self
    }

    pub fn ports(mut self, load: impl Into<String>, disch: impl Into<String>) -> Self {
        self.load_port = load.into();
        self.disch_port = disch.into();
        self
    }

    /// Whether the laycan window is well-formed (start on or before end)
    pub fn laycan_is_valid(&self) -> bool {
        self.laycan_start <= self.laycan_end
    }
}

/// Externally supplied revenue/cost figures for a voyage
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VoyageEconomics {
    pub voyage_id: VoyageId,
    /// Vessel the figures apply to; None applies to every vessel
    #[serde(default)]
    pub vessel_id: Option<VesselId>,
    #[serde(default)]
    pub revenue: Option<Decimal>,
    #[serde(default)]
    pub cost: Option<Decimal>,
}

impl VoyageEconomics {
    pub fn new(voyage_id: impl Into<String>) -> Self {
        Self {
            voyage_id: voyage_id.into(),
            vessel_id: None,
            revenue: None,
            cost: None,
        }
    }

    pub fn on_vessel(mut self, vessel_id: impl Into<String>) -> Self {
        self.vessel_id = Some(vessel_id.into());
        self
    }

    pub fn revenue(mut self, revenue: Decimal) -> Self {
        self.revenue = Some(revenue);
        self
    }

    pub fn cost(mut self, cost: Decimal) -> Self {
        self.cost = Some(cost);
        self
    }
}

/// A repeatable voyage pattern instantiated across a planning year
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VoyageTemplate {
    pub id: TemplateId,
    pub legs: Vec<VoyageLeg>,
    /// First instance start; defaults to January 1st of the target year
    #[serde(default)]
    pub first_start: Option<NaiveDate>,
    /// Days between instance starts; defaults to the template length
    #[serde(default)]
    pub interval_days: Option<u32>,
    #[serde(default)]
    pub cargo_ids: Vec<CargoId>,
}

impl VoyageTemplate {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            legs: Vec::new(),
            first_start: None,
            interval_days: None,
            cargo_ids: Vec::new(),
        }
    }

    pub fn leg(mut self, leg: VoyageLeg) -> Self {
        self.legs.push(leg);
        self
    }

    pub fn starting(mut self, date: NaiveDate) -> Self {
        self.first_start = Some(date);
        self
    }

    pub fn every(mut self, days: u32) -> Self {
        self.interval_days = Some(days);
        self
    }
}

/// Pass-through monthly financial and volume figures
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MonthlyRollup {
    /// Month (1-12)
    pub month: u32,
    #[serde(default)]
    pub total_cargo: f64,
    #[serde(default)]
    pub total_revenue: Decimal,
    #[serde(default)]
    pub total_cost: Decimal,
}

/// Read-only snapshot handed over by the repository layer
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub vessels: Vec<Vessel>,
    pub voyages: Vec<Voyage>,
    pub cargo: Vec<CargoCommitment>,
    pub economics: Vec<VoyageEconomics>,
    pub templates: Vec<VoyageTemplate>,
    pub rollups: Vec<MonthlyRollup>,
}

// ============================================================================
// Timeline
// ============================================================================

/// One occupied day on a vessel timeline
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineCell {
    pub vessel_id: VesselId,
    /// Offset in days from the timeline origin
    pub day_index: u32,
    pub class: OperationClass,
}

/// A day contributed to a vessel row by a specific voyage
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellContribution {
    pub voyage_id: VoyageId,
    pub day_index: u32,
    pub class: OperationClass,
}

/// One vessel's row in a timeline grid
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VesselRow {
    pub vessel_id: VesselId,
    /// Rendered cells, one per horizon day
    pub cells: Vec<Option<OperationClass>>,
    /// Every voyage contribution, including ones hidden by an earlier voyage
    pub contributions: Vec<CellContribution>,
}

impl VesselRow {
    pub fn new(vessel_id: impl Into<String>, horizon_days: u32) -> Self {
        Self {
            vessel_id: vessel_id.into(),
            cells: vec![None; horizon_days as usize],
            contributions: Vec::new(),
        }
    }

    /// Number of non-empty rendered cells
    pub fn occupied_days(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }
}

/// Two voyages contributing to the same days of one vessel
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineOverlap {
    pub vessel_id: VesselId,
    /// Voyage shown in the rendered cells
    pub first_voyage: VoyageId,
    /// Voyage hidden by the first
    pub second_voyage: VoyageId,
    /// First disputed day index
    pub start_day: u32,
    /// Last disputed day index (inclusive)
    pub end_day: u32,
}

impl TimelineOverlap {
    pub fn days(&self) -> u32 {
        self.end_day - self.start_day + 1
    }
}

/// Vessel rows by day columns over a fixed horizon
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimelineGrid {
    /// Calendar date of day index 0
    pub origin: NaiveDate,
    pub horizon_days: u32,
    pub rows: Vec<VesselRow>,
    pub overlaps: Vec<TimelineOverlap>,
}

impl TimelineGrid {
    pub fn new(origin: NaiveDate, horizon_days: u32) -> Self {
        Self {
            origin,
            horizon_days,
            rows: Vec::new(),
            overlaps: Vec::new(),
        }
    }

    pub fn row(&self, vessel_id: &str) -> Option<&VesselRow> {
        self.rows.iter().find(|r| r.vessel_id == vessel_id)
    }

    /// All non-empty rendered cells, row by row
    pub fn cells(&self) -> impl Iterator<Item = TimelineCell> + '_ {
        self.rows.iter().flat_map(|row| {
            row.cells.iter().enumerate().filter_map(move |(day, cell)| {
                cell.map(|class| TimelineCell {
                    vessel_id: row.vessel_id.clone(),
                    day_index: day as u32,
                    class,
                })
            })
        })
    }

    /// Calendar date of a day index
    pub fn date_of(&self, day_index: u32) -> NaiveDate {
        offset_date(self.origin, i64::from(day_index))
    }
}

/// A grid masked to a subset of operation classes, kept apart from
/// `TimelineGrid` so aggregate statistics are not taken from it by accident
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FilteredTimeline {
    pub accepted: OperationSet,
    pub grid: TimelineGrid,
}

/// Input to a timeline projection
#[derive(Clone, Debug)]
pub struct TimelineRequest {
    pub voyages: Vec<Voyage>,
    pub origin: NaiveDate,
    pub horizon_days: u32,
}

impl TimelineRequest {
    pub fn new(voyages: Vec<Voyage>, origin: NaiveDate, horizon_days: u32) -> Self {
        Self {
            voyages,
            origin,
            horizon_days,
        }
    }
}

// ============================================================================
// Annual Allocation
// ============================================================================

/// Objective used to choose a vessel for each voyage
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OptimizationGoal {
    MaximizeRevenue,
    MinimizeCost,
    #[default]
    BalanceUtilization,
}

impl std::fmt::Display for OptimizationGoal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OptimizationGoal::MaximizeRevenue => write!(f, "maximize-revenue"),
            OptimizationGoal::MinimizeCost => write!(f, "minimize-cost"),
            OptimizationGoal::BalanceUtilization => write!(f, "balance-utilization"),
        }
    }
}

/// One vessel's load within a month
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VesselAllocation {
    pub vessel_id: VesselId,
    pub allocated_days: u32,
    /// allocated_days / days_in_month * 100, always within 0..=100
    pub utilization_rate: f64,
    pub assigned_voyage_ids: BTreeSet<VoyageId>,
}

impl VesselAllocation {
    pub fn new(vessel_id: impl Into<String>) -> Self {
        Self {
            vessel_id: vessel_id.into(),
            allocated_days: 0,
            utilization_rate: 0.0,
            assigned_voyage_ids: BTreeSet::new(),
        }
    }

    /// Days still available in a month of `days_in_month` days
    pub fn free_days(&self, days_in_month: u32) -> u32 {
        days_in_month.saturating_sub(self.allocated_days)
    }

    /// Book `days` for a voyage and recompute the utilization rate
    pub fn book(&mut self, voyage_id: &str, days: u32, days_in_month: u32) {
        self.allocated_days = (self.allocated_days + days).min(days_in_month);
        self.assigned_voyage_ids.insert(voyage_id.to_string());
        self.utilization_rate = if days_in_month == 0 {
            0.0
        } else {
            (f64::from(self.allocated_days) / f64::from(days_in_month) * 100.0).clamp(0.0, 100.0)
        };
    }
}

/// Fleet allocation for one month
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResourceAllocation {
    /// Month (1-12)
    pub month: u32,
    pub year: i32,
    pub vessels: Vec<VesselAllocation>,
    /// Distinct voyages placed in the month
    pub total_voyages: usize,
    pub total_cargo: f64,
    pub total_revenue: Decimal,
    pub total_cost: Decimal,
}

impl ResourceAllocation {
    pub fn new(year: i32, month: u32, vessel_ids: &[VesselId]) -> Self {
        Self {
            month,
            year,
            vessels: vessel_ids.iter().map(VesselAllocation::new).collect(),
            total_voyages: 0,
            total_cargo: 0.0,
            total_revenue: Decimal::ZERO,
            total_cost: Decimal::ZERO,
        }
    }

    pub fn days_in_month(&self) -> u32 {
        days_in_month(self.year, self.month)
    }

    pub fn vessel(&self, vessel_id: &str) -> Option<&VesselAllocation> {
        self.vessels.iter().find(|v| v.vessel_id == vessel_id)
    }

    pub fn vessel_mut(&mut self, vessel_id: &str) -> Option<&mut VesselAllocation> {
        self.vessels.iter_mut().find(|v| v.vessel_id == vessel_id)
    }

    /// Recount distinct voyages across all vessels
    pub fn refresh_voyage_count(&mut self) {
        let voyages: BTreeSet<&VoyageId> = self
            .vessels
            .iter()
            .flat_map(|v| v.assigned_voyage_ids.iter())
            .collect();
        self.total_voyages = voyages.len();
    }
}

/// Day-level record of a voyage placed on a vessel
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoyagePlacement {
    pub voyage_id: VoyageId,
    pub vessel_id: VesselId,
    /// First day (inclusive)
    pub start: NaiveDate,
    /// Last day (inclusive)
    pub end: NaiveDate,
}

/// A voyage the allocator could not place
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnplacedVoyage {
    pub voyage_id: VoyageId,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub reason: String,
}

/// Input to an annual allocation run
#[derive(Clone, Debug)]
pub struct AllocationRequest {
    pub year: i32,
    /// Vessels eligible for allocation, in tie-break order
    pub vessel_ids: Vec<VesselId>,
    pub goal: OptimizationGoal,
    pub voyages: Vec<Voyage>,
    pub cargo: Vec<CargoCommitment>,
    pub economics: Vec<VoyageEconomics>,
    /// Instantiate `templates` into candidate voyages
    pub use_templates: bool,
    pub templates: Vec<VoyageTemplate>,
    pub rollups: Vec<MonthlyRollup>,
}

impl AllocationRequest {
    pub fn new(year: i32, vessel_ids: Vec<VesselId>, goal: OptimizationGoal) -> Self {
        Self {
            year,
            vessel_ids,
            goal,
            voyages: Vec::new(),
            cargo: Vec::new(),
            economics: Vec::new(),
            use_templates: false,
            templates: Vec::new(),
            rollups: Vec::new(),
        }
    }

    /// Build a request covering every vessel and voyage of a snapshot
    pub fn from_snapshot(snapshot: &Snapshot, year: i32, goal: OptimizationGoal) -> Self {
        Self {
            year,
            vessel_ids: snapshot.vessels.iter().map(|v| v.id.clone()).collect(),
            goal,
            voyages: snapshot.voyages.clone(),
            cargo: snapshot.cargo.clone(),
            economics: snapshot.economics.clone(),
            use_templates: false,
            templates: snapshot.templates.clone(),
            rollups: snapshot.rollups.clone(),
        }
    }

    pub fn voyages(mut self, voyages: Vec<Voyage>) -> Self {
        self.voyages = voyages;
        self
    }

    pub fn cargo(mut self, cargo: Vec<CargoCommitment>) -> Self {
        self.cargo = cargo;
        self
    }

    pub fn economics(mut self, economics: Vec<VoyageEconomics>) -> Self {
        self.economics = economics;
        self
    }

    pub fn templates(mut self, templates: Vec<VoyageTemplate>) -> Self {
        self.use_templates = true;
        self.templates = templates;
        self
    }

    pub fn rollups(mut self, rollups: Vec<MonthlyRollup>) -> Self {
        self.rollups = rollups;
        self
    }
}

/// Result of an annual allocation run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct YearSchedule {
    pub year: i32,
    pub goal: OptimizationGoal,
    /// Twelve monthly buckets, January first
    pub months: Vec<ResourceAllocation>,
    pub placements: Vec<VoyagePlacement>,
    pub unplaced: Vec<UnplacedVoyage>,
    pub conflicts: Vec<ScheduleConflict>,
    pub statistics: ScheduleStatistics,
    /// True when the run stopped early on request
    pub cancelled: bool,
}

impl YearSchedule {
    /// Empty schedule with twelve monthly buckets for the given scope
    pub fn new(year: i32, goal: OptimizationGoal, vessel_ids: &[VesselId]) -> Self {
        Self {
            year,
            goal,
            months: (1..=12)
                .map(|m| ResourceAllocation::new(year, m, vessel_ids))
                .collect(),
            placements: Vec::new(),
            unplaced: Vec::new(),
            conflicts: Vec::new(),
            statistics: ScheduleStatistics::default(),
            cancelled: false,
        }
    }

    pub fn month(&self, month: u32) -> Option<&ResourceAllocation> {
        self.months.iter().find(|m| m.month == month)
    }

    pub fn placement(&self, voyage_id: &str) -> Option<&VoyagePlacement> {
        self.placements.iter().find(|p| p.voyage_id == voyage_id)
    }

    /// Vessels in scope, in allocation order
    pub fn vessel_ids(&self) -> Vec<VesselId> {
        self.months
            .first()
            .map(|m| m.vessels.iter().map(|v| v.vessel_id.clone()).collect())
            .unwrap_or_default()
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// Counts derived from a timeline grid
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TimelineStatistics {
    /// Occupied days per vessel, in row order
    pub vessel_occupied_days: Vec<(VesselId, usize)>,
    /// Cell count per operation class
    pub class_counts: BTreeMap<OperationClass, usize>,
    pub occupied_cells: usize,
    pub total_cells: usize,
    /// occupied_cells / total_cells * 100
    pub utilization: f64,
}

/// Per-month figures of a year schedule
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MonthlyTotals {
    pub month: u32,
    pub total_voyages: usize,
    pub total_cargo: f64,
    pub average_utilization: f64,
}

/// Figures derived from a year schedule
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ScheduleStatistics {
    pub placed_voyages: usize,
    pub unplaced_voyages: usize,
    /// Annual utilization per vessel (0-100), in scope order
    pub vessel_utilization: Vec<(VesselId, f64)>,
    /// Mean of the per-vessel utilization across the scope
    pub average_utilization: f64,
    pub monthly: Vec<MonthlyTotals>,
    pub total_cargo: f64,
    pub conflicts_by_severity: BTreeMap<ConflictSeverity, usize>,
}

// ============================================================================
// Traits
// ============================================================================

/// Cooperative cancellation, polled between units of work
pub trait CancellationToken: Send + Sync {
    fn is_cancelled(&self) -> bool;
}

impl CancellationToken for AtomicBool {
    fn is_cancelled(&self) -> bool {
        self.load(Ordering::Relaxed)
    }
}

/// Token that never requests cancellation
#[derive(Clone, Copy, Debug, Default)]
pub struct NeverCancel;

impl CancellationToken for NeverCancel {
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Projects voyages onto a day-indexed vessel grid
pub trait TimelineEngine: Send + Sync {
    fn project(&self, request: &TimelineRequest) -> Outcome<TimelineGrid>;
}

/// Builds an annual fleet allocation
pub trait AllocationEngine: Send + Sync {
    fn allocate(
        &self,
        request: &AllocationRequest,
        cancel: &dyn CancellationToken,
    ) -> Outcome<YearSchedule>;
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn month_lengths() {
        assert_eq!(days_in_month(2025, 1), 31);
        assert_eq!(days_in_month(2025, 2), 28);
        assert_eq!(days_in_month(2024, 2), 29);
        assert_eq!(days_in_month(2025, 12), 31);
        assert_eq!(days_in_month(2025, 13), 0);
        assert_eq!(days_in_year(2024), 366);
        assert_eq!(days_in_year(2025), 365);
    }

    #[test]
    fn leg_day_count_rounds_up() {
        assert_eq!(VoyageLeg::new(OperationClass::Transit).days(2.0).day_count(), Ok(2));
        assert_eq!(VoyageLeg::new(OperationClass::Transit).days(2.1).day_count(), Ok(3));
        assert_eq!(VoyageLeg::new(OperationClass::Transit).days(0.25).day_count(), Ok(1));
    }

    #[test]
    fn leg_day_count_rejects_bad_durations() {
        assert_eq!(
            VoyageLeg::new(OperationClass::Canal).day_count(),
            Err(LegError::MissingDuration)
        );
        assert_eq!(
            VoyageLeg::new(OperationClass::Canal).days(0.0).day_count(),
            Err(LegError::NonPositiveDuration(0.0))
        );
        assert_eq!(
            VoyageLeg::new(OperationClass::Canal).days(-1.5).day_count(),
            Err(LegError::NonPositiveDuration(-1.5))
        );
        assert_eq!(
            VoyageLeg::new(OperationClass::Canal).days(f64::NAN).day_count(),
            Err(LegError::NonFiniteDuration)
        );
        assert_eq!(
            VoyageLeg::new(OperationClass::Transit).days(1.0e9).day_count(),
            Err(LegError::TooLong(1.0e9))
        );
        assert_eq!(
            VoyageLeg::new(OperationClass::Transit).days(MAX_LEG_DAYS).day_count(),
            Ok(3650)
        );
    }

    #[test]
    fn leg_port_only_for_port_stays() {
        let loading = VoyageLeg::new(OperationClass::Loading).days(2.0).to("Tubarao");
        assert_eq!(loading.port(), Some("Tubarao"));

        let transit = VoyageLeg::new(OperationClass::Transit)
            .days(10.0)
            .from("Tubarao")
            .to("Rotterdam");
        assert_eq!(transit.port(), None);
    }

    #[test]
    fn voyage_span_skips_invalid_legs() {
        let voyage = Voyage::new("v1", date(2025, 1, 30))
            .leg(VoyageLeg::new(OperationClass::Loading).days(2.0))
            .leg(VoyageLeg::new(OperationClass::Waiting))
            .leg(VoyageLeg::new(OperationClass::Transit).days(4.5));

        assert_eq!(voyage.total_days(), Some(7));
        assert_eq!(voyage.span(), Some((date(2025, 1, 30), date(2025, 2, 5))));
        assert_eq!(Voyage::new("empty", date(2025, 1, 1)).span(), None);
    }

    #[test]
    fn voyage_span_past_the_calendar_end_is_none() {
        let voyage = Voyage::new("v1", NaiveDate::MAX - chrono::Duration::days(5))
            .leg(VoyageLeg::new(OperationClass::Transit).days(30.0));
        assert_eq!(voyage.total_days(), Some(30));
        assert_eq!(voyage.span(), None);

        let huge = Voyage::new("v2", date(2025, 1, 1))
            .leg(VoyageLeg::new(OperationClass::Transit).days(1.0e9));
        assert_eq!(huge.total_days(), Some(0));
        assert_eq!(huge.span(), None);
    }

    #[test]
    fn offset_date_saturates() {
        assert_eq!(offset_date(date(2025, 1, 1), 31), date(2025, 2, 1));
        assert_eq!(offset_date(date(2025, 1, 1), i64::MAX), NaiveDate::MAX);
        assert_eq!(offset_date(date(2025, 1, 1), i64::MIN), NaiveDate::MIN);
    }

    #[test]
    fn operation_class_parsing() {
        assert_eq!("Loading".parse::<OperationClass>(), Ok(OperationClass::Loading));
        assert_eq!(" bunker ".parse::<OperationClass>(), Ok(OperationClass::Bunker));
        assert!("sailing".parse::<OperationClass>().is_err());
    }

    #[test]
    fn operation_set_complement_partitions_all_classes() {
        let set: OperationSet = [OperationClass::Loading, OperationClass::Discharge]
            .into_iter()
            .collect();
        let rest = set.complement();

        assert_eq!(set.len(), 2);
        assert_eq!(rest.len(), 5);
        for class in OperationClass::ALL {
            assert_ne!(set.contains(class), rest.contains(class));
        }
        assert_eq!(rest.complement(), set);
        assert_eq!(OperationSet::all().complement(), OperationSet::empty());
    }

    #[test]
    fn operation_set_serializes_as_list() {
        let set = OperationSet::empty()
            .with(OperationClass::Canal)
            .with(OperationClass::Ballast);
        let classes: Vec<OperationClass> = set.into();
        assert_eq!(classes, vec![OperationClass::Ballast, OperationClass::Canal]);
    }

    #[test]
    fn vessel_allocation_clamps_utilization() {
        let mut alloc = VesselAllocation::new("MV Aurora");
        alloc.book("v1", 20, 30);
        assert_eq!(alloc.allocated_days, 20);
        assert!((alloc.utilization_rate - 66.666).abs() < 0.01);
        assert_eq!(alloc.free_days(30), 10);

        alloc.book("v2", 15, 30);
        assert_eq!(alloc.allocated_days, 30);
        assert_eq!(alloc.utilization_rate, 100.0);
        assert_eq!(alloc.assigned_voyage_ids.len(), 2);
    }

    #[test]
    fn year_schedule_has_twelve_months() {
        let schedule = YearSchedule::new(
            2025,
            OptimizationGoal::BalanceUtilization,
            &["A".to_string(), "B".to_string()],
        );
        assert_eq!(schedule.months.len(), 12);
        assert_eq!(schedule.month(2).unwrap().days_in_month(), 28);
        assert_eq!(schedule.vessel_ids(), vec!["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn resource_allocation_counts_distinct_voyages() {
        let mut month = ResourceAllocation::new(2025, 3, &["A".to_string(), "B".to_string()]);
        month.vessel_mut("A").unwrap().book("v1", 5, 31);
        month.vessel_mut("B").unwrap().book("v2", 5, 31);
        month.vessel_mut("B").unwrap().book("v1", 2, 31);
        month.refresh_voyage_count();
        assert_eq!(month.total_voyages, 2);
    }

    #[test]
    fn grid_cells_iterates_occupied_days() {
        let mut grid = TimelineGrid::new(date(2025, 1, 1), 4);
        let mut row = VesselRow::new("A", 4);
        row.cells[1] = Some(OperationClass::Loading);
        row.cells[3] = Some(OperationClass::Transit);
        grid.rows.push(row);

        let cells: Vec<TimelineCell> = grid.cells().collect();
        assert_eq!(cells.len(), 2);
        assert_eq!(cells[0].day_index, 1);
        assert_eq!(cells[1].class, OperationClass::Transit);
        assert_eq!(grid.date_of(3), date(2025, 1, 4));
    }

    #[test]
    fn never_cancel_and_atomic_token() {
        assert!(!NeverCancel.is_cancelled());
        let flag = AtomicBool::new(false);
        assert!(!flag.is_cancelled());
        flag.store(true, Ordering::Relaxed);
        assert!(flag.is_cancelled());
    }
}
