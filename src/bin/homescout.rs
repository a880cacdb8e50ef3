#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use homescout::{
    catalog, Address, Band, Category, ComparisonSession, EnrichmentClient, EnrichmentStatus,
    ProviderConfig, ThresholdSet, WeightSet,
};

#[derive(Parser)]
#[command(name = "homescout", version, about = "Rank candidate residential locations")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enrich one address and print its raw criterion values
    Enrich {
        /// Provider credentials file (connection.json)
        #[arg(long)]
        config: PathBuf,
        #[arg(long)]
        city: String,
        #[arg(long)]
        street: String,
        #[arg(long)]
        building: String,
        #[arg(long)]
        postcode: String,
        /// Write JSON here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Enrich, score, and rank a set of candidate addresses
    Rank {
        /// Provider credentials file (connection.json)
        #[arg(long)]
        config: PathBuf,
        /// JSON array of addresses
        #[arg(long)]
        input: PathBuf,
        /// Optional category weights (JSON map, 0..1 each)
        #[arg(long)]
        weights: Option<PathBuf>,
        /// Optional per-criterion threshold overrides (JSON map)
        #[arg(long)]
        thresholds: Option<PathBuf>,
        /// Capacity of the per-session enrichment memo
        #[arg(long, default_value_t = 64)]
        memo_capacity: usize,
        /// Write JSON here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

/// Candidate address as it appears in the input file.
#[derive(Debug, Deserialize)]
struct CandidateInput {
    city: String,
    street: String,
    #[serde(alias = "buildingNumber", alias = "building_no")]
    building_number: String,
    #[serde(alias = "code", alias = "postcode")]
    postal_code: String,
}

impl From<CandidateInput> for Address {
    fn from(c: CandidateInput) -> Self {
        Address::new(c.city, c.street, c.building_number, c.postal_code)
    }
}

#[derive(Debug, Serialize)]
struct RankedEntry {
    rank: usize,
    address: Address,
    score: f64,
    coarse: BTreeMap<Category, f64>,
    bands: BTreeMap<Category, Band>,
    explanation: Vec<(Category, f64)>,
}

#[derive(Debug, Serialize)]
struct IncompleteEntry {
    address: Address,
    status: EnrichmentStatus,
    failures: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
struct RankReport {
    ranked: Vec<RankedEntry>,
    incomplete: Vec<IncompleteEntry>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Enrich {
            config,
            city,
            street,
            building,
            postcode,
            out,
        } => {
            let config = ProviderConfig::from_path(config)?;
            let client = EnrichmentClient::from_config(&config)?;
            let address = Address::new(city, street, building, postcode);
            let outcome = catalog::enrich(&client, &address).await;
            emit(out, &serde_json::to_string_pretty(&outcome)?)?;
        }
        Commands::Rank {
            config,
            input,
            weights,
            thresholds,
            memo_capacity,
            out,
        } => {
            let config = ProviderConfig::from_path(config)?;
            let client = Arc::new(EnrichmentClient::from_config(&config)?);

            let candidates: Vec<CandidateInput> =
                serde_json::from_str(&std::fs::read_to_string(input)?)?;
            let weights: WeightSet = match weights {
                Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
                None => WeightSet::default(),
            };
            let thresholds: ThresholdSet = match thresholds {
                Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
                None => ThresholdSet::default(),
            };

            let mut session =
                ComparisonSession::with_profile(client, memo_capacity, thresholds, weights);
            for candidate in candidates {
                session.enroll(candidate.into()).await?;
            }

            let bands = session.comparison_bands();
            let mut ranked = Vec::new();
            for (position, variant) in session.ranked().into_iter().enumerate() {
                let row = session
                    .variants()
                    .iter()
                    .position(|v| v.address == variant.address)
                    .and_then(|idx| bands.get(idx).cloned())
                    .unwrap_or_default();
                ranked.push(RankedEntry {
                    rank: position + 1,
                    address: variant.address.clone(),
                    score: variant.score.unwrap_or_default(),
                    coarse: variant.coarse.clone(),
                    bands: row,
                    explanation: homescout::explain(variant),
                });
            }
            let incomplete = session
                .variants()
                .iter()
                .filter(|v| v.score.is_none())
                .map(|v| IncompleteEntry {
                    address: v.address.clone(),
                    status: v.status,
                    failures: v.failures.clone(),
                })
                .collect();

            let report = RankReport { ranked, incomplete };
            emit(out, &serde_json::to_string_pretty(&report)?)?;
        }
    }

    Ok(())
}

fn emit(out: Option<PathBuf>, json: &str) -> Result<(), Box<dyn std::error::Error>> {
    match out {
        Some(path) => {
            let mut file = File::create(path)?;
            writeln!(file, "{json}")?;
        }
        None => println!("{json}"),
    }
    Ok(())
}
