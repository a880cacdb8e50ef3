#![forbid(unsafe_code)]

//! # homescout
//!
//! Ranks candidate residential locations by what actually surrounds them.
//!
//! Each address is enriched through a paid geospatial/demographic provider:
//! one cached call per (endpoint, payload), with a durable append-only record
//! of every request/response pair so identical lookups are never paid for
//! twice. Raw measurements (distances, counts, percentages, scores) are
//! normalized into comparable utilities, aggregated through a two-level
//! weighted hierarchy (25 fine criteria under 8 coarse categories), and the
//! resulting scores drive a stable ranking with population-relative quartile
//! bands.

pub mod cache;
pub mod catalog;
pub mod config;
pub mod model;
pub mod normalize;
pub mod provider;
pub mod rank;
pub mod session;

pub use cache::{CacheKey, EnrichmentCache, JsonlCacheStore};
pub use catalog::{Category, CriteriaMemo, EnrichmentOutcome, EnrichmentStatus, CATALOG};
pub use config::ProviderConfig;
pub use model::{ModelError, ThresholdSet, WeightSet};
pub use provider::{
    Address, ClientConfig, EnrichmentClient, EnrichmentProvider, GeoApiAdapter, ProviderError,
    Query, RawValue,
};
pub use rank::{comparison_bands, explain, rank, Band, Variant};
pub use session::{ComparisonSession, SessionError};
