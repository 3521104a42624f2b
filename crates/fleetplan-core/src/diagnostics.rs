//! Non-fatal diagnostics
//!
//! Nothing in the planning engines aborts on bad input. Problems are recorded
//! as [`Diagnostic`]s and returned next to the primary output in an
//! [`Outcome`], so callers can surface them as warnings while still using the
//! partial result.

use serde::{Deserialize, Serialize};

/// Category of a diagnostic; the same kebab-case name in text and JSON output
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticKind {
    /// A leg has a missing, non-positive or non-finite duration and was skipped
    InvalidLegDuration,
    /// A voyage has no vessel and was left off the timeline
    UnassignedVesselTimeline,
    /// A voyage could not be placed within any vessel's capacity
    AllocationOverflow,
    /// A conflict rule was skipped because its input was malformed
    ConflictDetectionFailure,
    /// A voyage was left out of a run (cancelled, outside the year, no valid legs)
    VoyageExcluded,
    /// A voyage names a vessel outside the allocation scope
    VesselOutOfScope,
}

impl DiagnosticKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticKind::InvalidLegDuration => "invalid-leg-duration",
            DiagnosticKind::UnassignedVesselTimeline => "unassigned-vessel-timeline",
            DiagnosticKind::AllocationOverflow => "allocation-overflow",
            DiagnosticKind::ConflictDetectionFailure => "conflict-detection-failure",
            DiagnosticKind::VoyageExcluded => "voyage-excluded",
            DiagnosticKind::VesselOutOfScope => "vessel-out-of-scope",
        }
    }
}

impl std::fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How prominently a diagnostic should be surfaced
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticLevel {
    Info,
    Warning,
}

impl std::fmt::Display for DiagnosticLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiagnosticLevel::Info => write!(f, "info"),
            DiagnosticLevel::Warning => write!(f, "warning"),
        }
    }
}

/// A recoverable problem found while planning
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub level: DiagnosticLevel,
    /// Entity the diagnostic is about (voyage, vessel, port or rule name)
    pub subject: String,
    pub message: String,
}

impl Diagnostic {
    pub fn warning(
        kind: DiagnosticKind,
        subject: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            level: DiagnosticLevel::Warning,
            subject: subject.into(),
            message: message.into(),
        }
    }

    pub fn info(
        kind: DiagnosticKind,
        subject: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            level: DiagnosticLevel::Info,
            subject: subject.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}[{}] {}: {}", self.level, self.kind, self.subject, self.message)
    }
}

/// Primary output of an engine call plus the diagnostics gathered on the way
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Outcome<T> {
    pub value: T,
    pub diagnostics: Vec<Diagnostic>,
}

impl<T> Outcome<T> {
    pub fn new(value: T, diagnostics: Vec<Diagnostic>) -> Self {
        Self { value, diagnostics }
    }

    pub fn clean(value: T) -> Self {
        Self {
            value,
            diagnostics: Vec::new(),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        Outcome {
            value: f(self.value),
            diagnostics: self.diagnostics,
        }
    }

    /// Diagnostics of the given kind
    pub fn of_kind(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> + '_ {
        self.diagnostics.iter().filter(move |d| d.kind == kind)
    }

    pub fn has_warnings(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.level == DiagnosticLevel::Warning)
    }

    pub fn into_parts(self) -> (T, Vec<Diagnostic>) {
        (self.value, self.diagnostics)
    }
}
