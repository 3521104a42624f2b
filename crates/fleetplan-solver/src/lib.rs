//! # fleetplan-solver
//!
//! Planning engines for fleetplan.
//!
//! This crate provides:
//! - Voyage leg expansion and vessel timeline merging
//! - Operation-class filtering of rendered timelines
//! - Greedy annual fleet allocation
//! - Rule-based schedule conflict detection
//! - Timeline and schedule statistics
//!
//! ## Example
//!
//! ```rust
//! use chrono::NaiveDate;
//! use fleetplan_core::{OperationClass, TimelineEngine, TimelineRequest, Voyage, VoyageLeg};
//! use fleetplan_solver::TimelineProjector;
//!
//! let origin = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
//! let voyage = Voyage::new("VOY-001", origin)
//!     .vessel("MV Aurora")
//!     .leg(VoyageLeg::new(OperationClass::Loading).days(2.0))
//!     .leg(VoyageLeg::new(OperationClass::Transit).days(5.0));
//!
//! let grid = TimelineProjector.project(&TimelineRequest::new(vec![voyage], origin, 30)).value;
//! assert_eq!(grid.rows[0].occupied_days(), 7);
//! ```

pub mod allocate;
pub mod detect;
pub mod expand;
pub mod filter;
pub mod merge;
pub mod stats;

pub use allocate::AnnualAllocator;
pub use detect::{ConflictDetector, DetectionSnapshot, LoadingWindow, Occupancy, PortCall};
pub use expand::{expand_voyage, leg_spans, ExpandedVoyage, LegSpan};
pub use filter::{filter_grid, overlay, overlay_filtered};
pub use merge::merge_timeline;
pub use stats::{filtered_statistics, schedule_statistics, timeline_statistics};

use fleetplan_core::{
    AllocationEngine, AllocationRequest, CancellationToken, CargoCommitment, DetectionConfig,
    Outcome, PlanningConfig, ScheduleConflict, TimelineEngine, TimelineGrid, TimelineRequest,
    Voyage, YearSchedule,
};

/// Timeline engine backed by [`merge_timeline`]
#[derive(Debug, Clone, Copy, Default)]
pub struct TimelineProjector;

impl TimelineEngine for TimelineProjector {
    fn project(&self, request: &TimelineRequest) -> Outcome<TimelineGrid> {
        merge_timeline(request)
    }
}

/// Detect conflicts among the voyages shown on a timeline
pub fn check_timeline(
    grid: &TimelineGrid,
    voyages: &[Voyage],
    cargo: &[CargoCommitment],
    config: &DetectionConfig,
) -> Outcome<Vec<ScheduleConflict>> {
    let snapshot = DetectionSnapshot::from_timeline(grid, voyages, cargo);
    ConflictDetector::new(config.clone()).detect(&snapshot)
}

/// Which engine a [`Planner`] should run
#[derive(Debug, Clone)]
pub enum PlanRequest {
    Timeline(TimelineRequest),
    Annual(AllocationRequest),
}

#[derive(Debug, Clone)]
pub enum PlanOutput {
    Timeline(TimelineGrid),
    Annual(Box<YearSchedule>),
}

/// Dispatches plan requests to a timeline and an allocation engine
pub struct Planner<T = TimelineProjector, A = AnnualAllocator> {
    timeline: T,
    allocator: A,
}

impl Planner {
    pub fn new(config: &PlanningConfig) -> Self {
        Self {
            timeline: TimelineProjector,
            allocator: AnnualAllocator::new(config),
        }
    }
}

impl Default for Planner {
    fn default() -> Self {
        Self::new(&PlanningConfig::default())
    }
}

impl<T: TimelineEngine, A: AllocationEngine> Planner<T, A> {
    pub fn with_engines(timeline: T, allocator: A) -> Self {
        Self { timeline, allocator }
    }

    pub fn run(
        &self,
        request: &PlanRequest,
        cancel: &dyn CancellationToken,
    ) -> Outcome<PlanOutput> {
        match request {
            PlanRequest::Timeline(request) => {
                self.timeline.project(request).map(PlanOutput::Timeline)
            }
            PlanRequest::Annual(request) => self
                .allocator
                .allocate(request, cancel)
                .map(|schedule| PlanOutput::Annual(Box::new(schedule))),
        }
    }
}
