//! A comparison session owning the candidate set.
//!
//! Variants live exclusively here: enrolled once, rescored in place when the
//! profile (thresholds/weights) changes, discarded on removal. Enrichment
//! goes through an injected bounded memo so re-enrolling a recently scored
//! address stays in-process.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::catalog::{Category, CriteriaMemo};
use crate::model::{ModelError, ThresholdSet, WeightSet};
use crate::provider::{Address, EnrichmentClient};
use crate::rank::{self, Band, Variant};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("address already enrolled: {0}")]
    Duplicate(String),
}

pub struct ComparisonSession {
    client: Arc<EnrichmentClient>,
    memo: CriteriaMemo,
    thresholds: ThresholdSet,
    weights: WeightSet,
    variants: Vec<Variant>,
}

impl ComparisonSession {
    pub fn new(client: Arc<EnrichmentClient>, memo_capacity: usize) -> Self {
        Self::with_profile(
            client,
            memo_capacity,
            ThresholdSet::default(),
            WeightSet::default(),
        )
    }

    pub fn with_profile(
        client: Arc<EnrichmentClient>,
        memo_capacity: usize,
        thresholds: ThresholdSet,
        weights: WeightSet,
    ) -> Self {
        Self {
            client,
            memo: CriteriaMemo::new(memo_capacity),
            thresholds,
            weights,
            variants: Vec::new(),
        }
    }

    /// Enrich and score one address, adding it to the candidate set. A
    /// partially enriched address is enrolled unscored, visible in the
    /// comparison but excluded from ranking until resolved.
    pub async fn enroll(&mut self, address: Address) -> Result<&Variant, SessionError> {
        if self.variants.iter().any(|v| v.address == address) {
            return Err(SessionError::Duplicate(address.label()));
        }
        let outcome = self.memo.enrich(&self.client, &address).await;
        let variant = Variant::from_outcome(address, outcome, &self.thresholds, &self.weights)?;
        self.variants.push(variant);
        let idx = self.variants.len() - 1;
        Ok(&self.variants[idx])
    }

    /// Discard a candidate. Returns whether it was present.
    pub fn remove(&mut self, address: &Address) -> bool {
        let before = self.variants.len();
        self.variants.retain(|v| v.address != *address);
        self.variants.len() != before
    }

    pub fn variants(&self) -> &[Variant] {
        &self.variants
    }

    pub fn thresholds(&self) -> &ThresholdSet {
        &self.thresholds
    }

    pub fn weights(&self) -> &WeightSet {
        &self.weights
    }

    /// Replace the weight profile and rescore every variant from its cached
    /// raw values. No re-fetching.
    pub fn set_weights(&mut self, weights: WeightSet) -> Result<(), ModelError> {
        self.weights = weights;
        self.rescore_all()
    }

    pub fn set_thresholds(&mut self, thresholds: ThresholdSet) -> Result<(), ModelError> {
        self.thresholds = thresholds;
        self.rescore_all()
    }

    /// Apply the explicit weight-adjustment hook and rescore.
    pub fn nudge_weight(&mut self, category: Category, delta: f64) -> Result<(), ModelError> {
        self.weights.nudge(category, delta);
        self.rescore_all()
    }

    fn rescore_all(&mut self) -> Result<(), ModelError> {
        for variant in &mut self.variants {
            variant.rescore(&self.thresholds, &self.weights)?;
        }
        Ok(())
    }

    /// Fully-scored candidates, best first.
    pub fn ranked(&self) -> Vec<&Variant> {
        rank::rank(&self.variants)
    }

    /// Quartile bands per coarse category, aligned with [`Self::variants`].
    pub fn comparison_bands(&self) -> Vec<BTreeMap<Category, Band>> {
        rank::comparison_bands(&self.variants)
    }

    /// Coarse-contribution breakdown for one enrolled candidate.
    pub fn explain(&self, address: &Address) -> Option<Vec<(Category, f64)>> {
        self.variants
            .iter()
            .find(|v| v.address == *address)
            .map(rank::explain)
    }
}
