//! Normalization of raw measurements into comparable utilities.
//!
//! Raw criterion values come in mixed units (metres, counts, percentages,
//! 0-100 scores). Each criterion carries a fixed [`ValueKind`] that maps its
//! raw value and threshold onto a bounded utility: ordinary criteria land in
//! [0, 1], disamenity criteria in [-1, 0].

use serde::{Deserialize, Serialize};

/// How a criterion's raw value maps onto a utility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    /// Distance in metres, normalized against a kilometre threshold.
    Distance,
    /// Distance where being far away is good (railway tracks, freeways,
    /// airports, civil-services noise): the normalized closeness is negated.
    DisamenityDistance,
    /// Count normalized against a count threshold.
    Count,
    /// Count where more is worse (e.g. collisions): negated.
    DisamenityCount,
    /// Percentage-like value, scaled by 1/100.
    Percent,
    /// Raw 0-100 score passed through as raw/100, no threshold lookup.
    FixedRange,
}

impl ValueKind {
    /// Whether utilities of this kind are negative contributions.
    pub fn is_disamenity(&self) -> bool {
        matches!(self, Self::DisamenityDistance | Self::DisamenityCount)
    }

    /// Whether this kind consults the threshold set at all.
    pub fn uses_threshold(&self) -> bool {
        !matches!(self, Self::Percent | Self::FixedRange)
    }
}

pub fn clip(x: f64, lo: f64, hi: f64) -> f64 {
    x.min(hi).max(lo)
}

/// Normalize `x` into [0, 1] against `[lo, hi]`. A zero `hi` (degenerate
/// threshold) yields 0 rather than dividing by zero, so scoring stays total.
pub fn norm(x: f64, lo: f64, hi: f64) -> f64 {
    if hi == 0.0 {
        0.0
    } else {
        clip(x, lo, hi) / hi
    }
}

/// Apply the fixed per-kind rule. `threshold` is in kilometres for distance
/// kinds and in raw units for counts; ignored for Percent and FixedRange.
pub fn utility(kind: ValueKind, raw: f64, threshold: f64) -> f64 {
    match kind {
        ValueKind::Distance => norm(raw / 1000.0, 0.0, threshold),
        ValueKind::DisamenityDistance => -norm(raw / 1000.0, 0.0, threshold),
        ValueKind::Count => norm(raw, 0.0, threshold),
        ValueKind::DisamenityCount => -norm(raw, 0.0, threshold),
        ValueKind::Percent | ValueKind::FixedRange => clip(raw, 0.0, 100.0) / 100.0,
    }
}
