//! Ranking and population-relative comparison of candidate locations.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::catalog::{Category, EnrichmentOutcome, EnrichmentStatus};
use crate::model::{self, ModelError, ThresholdSet, WeightSet};
use crate::provider::Address;

/// One enrolled candidate location with everything computed for it.
#[derive(Debug, Clone, Serialize)]
pub struct Variant {
    pub address: Address,
    pub raw: BTreeMap<String, f64>,
    pub latlon: Option<(f64, f64)>,
    pub fine: BTreeMap<String, f64>,
    pub coarse: BTreeMap<Category, f64>,
    /// Present only for fully-scored variants.
    pub score: Option<f64>,
    pub status: EnrichmentStatus,
    pub failures: BTreeMap<String, String>,
}

impl Variant {
    /// Build a variant from an enrichment outcome. Only fully-scored
    /// outcomes get utilities; partial ones stay enrolled but unscored.
    pub fn from_outcome(
        address: Address,
        outcome: EnrichmentOutcome,
        thresholds: &ThresholdSet,
        weights: &WeightSet,
    ) -> Result<Self, ModelError> {
        let mut variant = Self {
            address,
            raw: outcome.values,
            latlon: outcome.latlon,
            fine: BTreeMap::new(),
            coarse: BTreeMap::new(),
            score: None,
            status: outcome.status,
            failures: outcome.failures,
        };
        variant.rescore(thresholds, weights)?;
        Ok(variant)
    }

    /// Recompute utilities and score from the stored raw values. Called when
    /// thresholds or weights change; never re-fetches.
    pub fn rescore(
        &mut self,
        thresholds: &ThresholdSet,
        weights: &WeightSet,
    ) -> Result<(), ModelError> {
        if self.status != EnrichmentStatus::FullyScored {
            return Ok(());
        }
        let fine = model::fine_utilities(thresholds, &self.raw)?;
        let coarse = model::coarse_utilities(weights, &fine)?;
        self.score = Some(model::score(&coarse));
        self.fine = fine;
        self.coarse = coarse;
        Ok(())
    }
}

/// Order fully-scored variants by score, best first. Ties keep the candidates'
/// insertion order (stable sort, no secondary key). Unscored variants do not
/// rank at all.
pub fn rank(variants: &[Variant]) -> Vec<&Variant> {
    let mut ranked: Vec<&Variant> = variants.iter().filter(|v| v.score.is_some()).collect();
    ranked.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    ranked
}

/// Relative quality of one category value within the current candidate set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Band {
    Low,
    Mid,
    High,
}

/// Per-category quartile bands across the candidate set: below the 25th
/// percentile is Low, above the 75th is High. A relative signal, recomputed
/// whenever the set changes; unscored variants get an empty row.
pub fn comparison_bands(variants: &[Variant]) -> Vec<BTreeMap<Category, Band>> {
    let mut rows: Vec<BTreeMap<Category, Band>> = vec![BTreeMap::new(); variants.len()];
    for category in Category::ALL {
        let mut values: Vec<f64> = variants
            .iter()
            .filter(|v| v.score.is_some())
            .filter_map(|v| v.coarse.get(&category).copied())
            .collect();
        if values.is_empty() {
            continue;
        }
        values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let p25 = percentile(&values, 0.25);
        let p75 = percentile(&values, 0.75);
        for (variant, row) in variants.iter().zip(rows.iter_mut()) {
            if variant.score.is_none() {
                continue;
            }
            if let Some(value) = variant.coarse.get(&category).copied() {
                let band = if value < p25 {
                    Band::Low
                } else if value > p75 {
                    Band::High
                } else {
                    Band::Mid
                };
                row.insert(category, band);
            }
        }
    }
    rows
}

/// Ordered coarse-contribution breakdown for one variant, largest first.
/// A read projection for waterfall-style presentation.
pub fn explain(variant: &Variant) -> Vec<(Category, f64)> {
    let mut contributions: Vec<(Category, f64)> =
        variant.coarse.iter().map(|(c, u)| (*c, *u)).collect();
    contributions.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    contributions
}

/// Linear-interpolation percentile over an ascending-sorted slice.
fn percentile(sorted: &[f64], q: f64) -> f64 {
    debug_assert!(!sorted.is_empty());
    if sorted.len() == 1 {
        return sorted[0];
    }
    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    sorted[lower] + fraction * (sorted[upper] - sorted[lower])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentile_interpolates_between_ranks() {
        let values = [0.3, 0.5, 0.7, 0.9];
        assert!((percentile(&values, 0.25) - 0.45).abs() < 1e-12);
        assert!((percentile(&values, 0.75) - 0.75).abs() < 1e-12);
        assert_eq!(percentile(&values, 0.0), 0.3);
        assert_eq!(percentile(&values, 1.0), 0.9);
    }
}
