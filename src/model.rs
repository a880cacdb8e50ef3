//! The multi-criteria utility model.
//!
//! Fine utilities come from the fixed normalization table; coarse utilities
//! weight each category's mean fine utility by the user's (re-normalized)
//! category weight; the global score is the sum of coarse utilities.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::catalog::{self, Category, CriterionSpec, CATALOG};
use crate::normalize;

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// Scoring never silently proceeds with a partial utility set.
    #[error("unresolved criterion `{0}`: raw value missing at scoring time")]
    MissingCriterion(String),
    #[error("weight sum is zero; at least one category must carry weight")]
    ZeroWeightSum,
}

/// Per-criterion saturation thresholds. Criteria without an override use the
/// catalog default; percent and fixed-range criteria ignore thresholds.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct ThresholdSet {
    overrides: HashMap<String, f64>,
}

// Entries route through `set` so profile files clamp at the load boundary.
impl<'de> Deserialize<'de> for ThresholdSet {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let entries = HashMap::<String, f64>::deserialize(deserializer)?;
        let mut set = Self::default();
        for (criterion, threshold) in entries {
            set.set(criterion, threshold);
        }
        Ok(set)
    }
}

impl ThresholdSet {
    pub fn set(&mut self, criterion: impl Into<String>, threshold: f64) {
        self.overrides.insert(criterion.into(), threshold.max(0.0));
    }

    pub fn get(&self, spec: &CriterionSpec) -> f64 {
        self.overrides
            .get(spec.name)
            .copied()
            .unwrap_or(spec.default_threshold)
    }
}

/// Per-category weights in [0, 1]. They need not sum to 1: the aggregator
/// divides by the realized sum on every scoring pass.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct WeightSet {
    weights: HashMap<Category, f64>,
}

// Entries route through `set` so profile files clamp at the load boundary.
impl<'de> Deserialize<'de> for WeightSet {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let entries = HashMap::<Category, f64>::deserialize(deserializer)?;
        let mut set = Self {
            weights: HashMap::new(),
        };
        for (category, weight) in entries {
            set.set(category, weight);
        }
        Ok(set)
    }
}

impl Default for WeightSet {
    fn default() -> Self {
        Self {
            weights: Category::ALL.iter().map(|c| (*c, 1.0)).collect(),
        }
    }
}

impl WeightSet {
    pub fn set(&mut self, category: Category, weight: f64) {
        self.weights.insert(category, weight.clamp(0.0, 1.0));
    }

    pub fn get(&self, category: Category) -> f64 {
        self.weights.get(&category).copied().unwrap_or(0.0)
    }

    pub fn total(&self) -> f64 {
        Category::ALL.iter().map(|c| self.get(*c)).sum()
    }

    /// Isolated adjustment hook: shift one category's weight by `delta`,
    /// clamped into [0, 1]. The caller decides the delta; no preference
    /// inference happens here.
    pub fn nudge(&mut self, category: Category, delta: f64) {
        let current = self.get(category);
        self.set(category, current + delta);
    }
}

/// Normalize every catalog criterion. A raw value missing from `raw` is a
/// hard error, not a default.
pub fn fine_utilities(
    thresholds: &ThresholdSet,
    raw: &BTreeMap<String, f64>,
) -> Result<BTreeMap<String, f64>, ModelError> {
    let mut fine = BTreeMap::new();
    for spec in CATALOG {
        let value = raw
            .get(spec.name)
            .copied()
            .ok_or_else(|| ModelError::MissingCriterion(spec.name.to_string()))?;
        fine.insert(
            spec.name.to_string(),
            normalize::utility(spec.kind, value, thresholds.get(spec)),
        );
    }
    Ok(fine)
}

/// Weighted coarse aggregation: `(w[C] / Σw) * mean(fine of members)`,
/// recomputed fresh each pass since weights change per profile edit.
pub fn coarse_utilities(
    weights: &WeightSet,
    fine: &BTreeMap<String, f64>,
) -> Result<BTreeMap<Category, f64>, ModelError> {
    let total = weights.total();
    if total == 0.0 {
        return Err(ModelError::ZeroWeightSum);
    }

    let mut coarse = BTreeMap::new();
    for category in Category::ALL {
        let mut sum = 0.0;
        let mut count = 0usize;
        for spec in catalog::members(category) {
            let utility = fine
                .get(spec.name)
                .copied()
                .ok_or_else(|| ModelError::MissingCriterion(spec.name.to_string()))?;
            sum += utility;
            count += 1;
        }
        let mean = sum / count as f64;
        coarse.insert(category, weights.get(category) / total * mean);
    }
    Ok(coarse)
}

/// Global score: the sum of coarse utilities. Expected in [0, 1] for
/// well-behaved inputs; disamenity-heavy inputs can push categories negative.
pub fn score(coarse: &BTreeMap<Category, f64>) -> f64 {
    coarse.values().sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_raw() -> BTreeMap<String, f64> {
        CATALOG.iter().map(|s| (s.name.to_string(), 0.0)).collect()
    }

    #[test]
    fn missing_criterion_is_a_hard_error() {
        let mut raw = full_raw();
        raw.remove("post_office");
        let err = fine_utilities(&ThresholdSet::default(), &raw).unwrap_err();
        assert!(matches!(err, ModelError::MissingCriterion(name) if name == "post_office"));
    }

    #[test]
    fn zero_weight_sum_is_rejected() {
        let mut weights = WeightSet::default();
        for category in Category::ALL {
            weights.set(category, 0.0);
        }
        let fine = fine_utilities(&ThresholdSet::default(), &full_raw()).unwrap();
        assert!(matches!(
            coarse_utilities(&weights, &fine),
            Err(ModelError::ZeroWeightSum)
        ));
    }

    #[test]
    fn score_is_bounded_by_one_for_unit_fine_utilities() {
        // All fine utilities at their ordinary maximum of 1.
        let fine: BTreeMap<String, f64> =
            CATALOG.iter().map(|s| (s.name.to_string(), 1.0)).collect();
        let mut weights = WeightSet::default();
        weights.set(Category::Safety, 0.3);
        weights.set(Category::Transport, 0.9);
        let coarse = coarse_utilities(&weights, &fine).unwrap();
        let total = score(&coarse);
        assert!(total <= 1.0 + 1e-12, "score {total} exceeds bound");
    }

    #[test]
    fn weights_are_renormalized_by_realized_sum() {
        let fine: BTreeMap<String, f64> =
            CATALOG.iter().map(|s| (s.name.to_string(), 1.0)).collect();
        let mut weights = WeightSet::default();
        for category in Category::ALL {
            weights.set(category, 0.0);
        }
        // A lone weighted category absorbs the whole simplex.
        weights.set(Category::Services, 0.4);
        let coarse = coarse_utilities(&weights, &fine).unwrap();
        assert!((coarse[&Category::Services] - 1.0).abs() < 1e-12);
        assert_eq!(coarse[&Category::Safety], 0.0);
    }

    #[test]
    fn nudge_clamps_into_unit_interval() {
        let mut weights = WeightSet::default();
        weights.nudge(Category::Nature, 0.7);
        assert_eq!(weights.get(Category::Nature), 1.0);
        weights.nudge(Category::Nature, -1.8);
        assert_eq!(weights.get(Category::Nature), 0.0);
    }

    #[test]
    fn deserialized_weights_clamp_into_unit_interval() {
        let weights: WeightSet =
            serde_json::from_str(r#"{"Safety": -1.0, "Nature": 2.0}"#).unwrap();
        assert_eq!(weights.get(Category::Safety), 0.0);
        assert_eq!(weights.get(Category::Nature), 1.0);

        // Clamped weights keep the aggregation bound intact.
        let fine: BTreeMap<String, f64> =
            CATALOG.iter().map(|s| (s.name.to_string(), 1.0)).collect();
        let coarse = coarse_utilities(&weights, &fine).unwrap();
        assert!(score(&coarse) <= 1.0 + 1e-12);
    }

    #[test]
    fn deserialized_thresholds_clamp_to_non_negative() {
        let thresholds: ThresholdSet = serde_json::from_str(r#"{"post_office": -3.0}"#).unwrap();
        let spec = catalog::criterion("post_office").unwrap();
        assert_eq!(thresholds.get(spec), 0.0);
    }

    #[test]
    fn threshold_overrides_fall_back_to_catalog_defaults() {
        let mut thresholds = ThresholdSet::default();
        let spec = catalog::criterion("post_office").unwrap();
        assert_eq!(thresholds.get(spec), 1.0);
        thresholds.set("post_office", 2.5);
        assert_eq!(thresholds.get(spec), 2.5);
    }
}
