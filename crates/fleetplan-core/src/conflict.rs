//! Schedule conflict types and severity thresholds

use serde::{Deserialize, Serialize};

/// Overlap length (days) at which a vessel overlap becomes `medium`
pub const DEFAULT_OVERLAP_MEDIUM_DAYS: u32 = 2;
/// Overlap length (days) at which a vessel overlap becomes `high`
pub const DEFAULT_OVERLAP_HIGH_DAYS: u32 = 5;
/// Overlap length (days) at which a vessel overlap becomes `critical`
pub const DEFAULT_OVERLAP_CRITICAL_DAYS: u32 = 10;

/// Port excess ratio at which a port-capacity conflict becomes `medium`
pub const DEFAULT_EXCESS_MEDIUM_RATIO: f64 = 0.25;
/// Port excess ratio at which a port-capacity conflict becomes `high`
pub const DEFAULT_EXCESS_HIGH_RATIO: f64 = 0.5;
/// Port excess ratio at which a port-capacity conflict becomes `critical`
pub const DEFAULT_EXCESS_CRITICAL_RATIO: f64 = 1.0;

/// Category of a schedule conflict
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictType {
    VesselOverlap,
    PortCapacity,
    CargoTiming,
    ResourceShortage,
}

impl ConflictType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictType::VesselOverlap => "vessel-overlap",
            ConflictType::PortCapacity => "port-capacity",
            ConflictType::CargoTiming => "cargo-timing",
            ConflictType::ResourceShortage => "resource-shortage",
        }
    }
}

impl std::fmt::Display for ConflictType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity of a schedule conflict, ordered from least to most severe
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ConflictSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictSeverity::Low => "low",
            ConflictSeverity::Medium => "medium",
            ConflictSeverity::High => "high",
            ConflictSeverity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for ConflictSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scheduling problem found by the conflict detector
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleConflict {
    pub id: String,
    #[serde(rename = "type")]
    pub conflict_type: ConflictType,
    pub severity: ConflictSeverity,
    /// Vessel, port, voyage or cargo ids involved
    pub affected_entity_ids: Vec<String>,
    pub description: String,
    #[serde(default)]
    pub suggested_resolution: Option<String>,
}

/// Day thresholds for vessel-overlap severity
///
/// An overlap shorter than `medium_from` days is `low`, shorter than
/// `high_from` is `medium`, shorter than `critical_from` is `high`, and
/// anything longer is `critical`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlapThresholds {
    pub medium_from: u32,
    pub high_from: u32,
    pub critical_from: u32,
}

impl Default for OverlapThresholds {
    fn default() -> Self {
        Self {
            medium_from: DEFAULT_OVERLAP_MEDIUM_DAYS,
            high_from: DEFAULT_OVERLAP_HIGH_DAYS,
            critical_from: DEFAULT_OVERLAP_CRITICAL_DAYS,
        }
    }
}

impl OverlapThresholds {
    pub fn classify(&self, overlap_days: u32) -> ConflictSeverity {
        if overlap_days >= self.critical_from {
            ConflictSeverity::Critical
        } else if overlap_days >= self.high_from {
            ConflictSeverity::High
        } else if overlap_days >= self.medium_from {
            ConflictSeverity::Medium
        } else {
            ConflictSeverity::Low
        }
    }

    pub fn is_ascending(&self) -> bool {
        self.medium_from <= self.high_from && self.high_from <= self.critical_from
    }
}

/// Excess-ratio thresholds for port-capacity severity
///
/// The excess ratio is `(calls - capacity) / capacity`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExcessThresholds {
    pub medium_from: f64,
    pub high_from: f64,
    pub critical_from: f64,
}

impl Default for ExcessThresholds {
    fn default() -> Self {
        Self {
            medium_from: DEFAULT_EXCESS_MEDIUM_RATIO,
            high_from: DEFAULT_EXCESS_HIGH_RATIO,
            critical_from: DEFAULT_EXCESS_CRITICAL_RATIO,
        }
    }
}

impl ExcessThresholds {
    pub fn classify(&self, excess_ratio: f64) -> ConflictSeverity {
        if excess_ratio >= self.critical_from {
            ConflictSeverity::Critical
        } else if excess_ratio >= self.high_from {
            ConflictSeverity::High
        } else if excess_ratio >= self.medium_from {
            ConflictSeverity::Medium
        } else {
            ConflictSeverity::Low
        }
    }

    pub fn is_ascending(&self) -> bool {
        self.medium_from >= 0.0
            && self.medium_from <= self.high_from
            && self.high_from <= self.critical_from
    }
}
