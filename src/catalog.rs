//! The fine-criterion catalog.
//!
//! Declares, for each of the 25 fine criteria, its coarse category, how its
//! raw value normalizes ([`ValueKind`]), the provider queries that produce it,
//! and the reducer that combines multi-query composites. The reducer choice is
//! fixed per criterion; changing it silently changes rankings, so the whole
//! mapping lives in one const table.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

use linked_hash_map::LinkedHashMap;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::normalize::ValueKind;
use crate::provider::{Address, EnrichmentClient, ErrorContext, ProviderError, Query, RawValue};

/// User-facing coarse category; each carries one weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    Safety,
    Education,
    Nature,
    Transport,
    Services,
    Comfort,
    Community,
    Extraversion,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::Safety,
        Category::Education,
        Category::Nature,
        Category::Transport,
        Category::Services,
        Category::Comfort,
        Category::Community,
        Category::Extraversion,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Safety => "Safety",
            Self::Education => "Education",
            Self::Nature => "Nature",
            Self::Transport => "Transport",
            Self::Services => "Services",
            Self::Comfort => "Comfort",
            Self::Community => "Community",
            Self::Extraversion => "Extraversion",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// How sub-query results combine into one raw number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reducer {
    Mean,
    Sum,
    Min,
}

impl Reducer {
    fn apply(&self, values: &[f64]) -> f64 {
        match self {
            Self::Sum => values.iter().sum(),
            Self::Mean => {
                if values.is_empty() {
                    0.0
                } else {
                    values.iter().sum::<f64>() / values.len() as f64
                }
            }
            Self::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
        }
    }
}

/// Query plan for one criterion: a single query, or a reduction over
/// sub-plans (nesting covers civil services: mean of min-of-fire and police).
#[derive(Debug, Clone, Copy)]
pub enum Plan {
    Query(Query),
    Reduce(Reducer, &'static [Plan]),
}

impl Plan {
    fn eval<'a>(
        &'a self,
        client: &'a EnrichmentClient,
        address: &'a Address,
    ) -> Pin<Box<dyn Future<Output = Result<f64, ProviderError>> + Send + 'a>> {
        Box::pin(async move {
            match self {
                Self::Query(query) => {
                    let raw = client.fetch(address, *query).await?;
                    raw.as_scalar().ok_or_else(|| {
                        ProviderError::invalid_response(
                            "expected a scalar value",
                            ErrorContext::new().with_endpoint(query.endpoint()),
                        )
                    })
                }
                Self::Reduce(reducer, parts) => {
                    let mut values = Vec::with_capacity(parts.len());
                    for part in *parts {
                        values.push(part.eval(client, address).await?);
                    }
                    Ok(reducer.apply(&values))
                }
            }
        })
    }
}

/// One fine criterion: name, category, normalization kind, query plan, and
/// the default saturation threshold (km for distances, raw units for counts;
/// unused for percent/fixed-range kinds).
#[derive(Debug, Clone, Copy)]
pub struct CriterionSpec {
    pub name: &'static str,
    pub category: Category,
    pub kind: ValueKind,
    pub plan: Plan,
    pub default_threshold: f64,
}

const fn nearest(code: &'static str) -> Plan {
    Plan::Query(Query::NearestPoi(code))
}

/// The fixed catalog. Composite plans reproduce the provider's documented
/// reducers exactly: culture = mean of 4 distances, education = sum of 6
/// counts, freeways = min of 2 road types, civil services = mean of the
/// nearer fire station and the police station.
pub const CATALOG: &[CriterionSpec] = &[
    // -- Safety --------------------------------------------------------------
    CriterionSpec {
        name: "collisions",
        category: Category::Safety,
        kind: ValueKind::DisamenityCount,
        plan: Plan::Query(Query::AreaStatistic("SR_KOLIZJE_Z_PIESZYMI")),
        default_threshold: 10.0,
    },
    CriterionSpec {
        name: "geoscore",
        category: Category::Safety,
        kind: ValueKind::FixedRange,
        plan: Plan::Query(Query::Geoscore),
        default_threshold: 0.0,
    },
    CriterionSpec {
        name: "cr3",
        category: Category::Safety,
        kind: ValueKind::FixedRange,
        plan: Plan::Query(Query::AreaStatistic("SR_CR3_KREDYTOBIORCY")),
        default_threshold: 0.0,
    },
    // -- Education -----------------------------------------------------------
    CriterionSpec {
        name: "university",
        category: Category::Education,
        kind: ValueKind::Distance,
        plan: nearest("D_EDUKACJA_WYZSZE_SZKOLY_PUBLICZNE"),
        default_threshold: 3.0,
    },
    CriterionSpec {
        name: "education",
        category: Category::Education,
        kind: ValueKind::Count,
        plan: Plan::Reduce(
            Reducer::Sum,
            &[
                Plan::Query(Query::PoiCount("EDUKACJA_PRZEDSZKOLA_I_PUNKTY_PRZEDSZKOLNE")),
                Plan::Query(Query::PoiCount("EDUKACJA_SZKOLY_PODSTAWOWE")),
                Plan::Query(Query::PoiCount("EDUKACJA_LICEA_OGOLNOKSZTALCACE_I_PROFILOWANE")),
                Plan::Query(Query::PoiCount("EDUKACJA_ZESPOL_SZKOL")),
                Plan::Query(Query::PoiCount("EDUKACJA_TECHNIKA")),
                Plan::Query(Query::PoiCount("EDUKACJA_SZKOLY_BRANZOWE")),
            ],
        ),
        default_threshold: 20.0,
    },
    // -- Nature --------------------------------------------------------------
    CriterionSpec {
        name: "green_spaces",
        category: Category::Nature,
        kind: ValueKind::Percent,
        plan: Plan::Query(Query::AreaStatistic("SR_TERENY_ZIELONE")),
        default_threshold: 0.0,
    },
    // -- Transport -----------------------------------------------------------
    CriterionSpec {
        name: "railway_station",
        category: Category::Transport,
        kind: ValueKind::Distance,
        plan: nearest("D_TRANSPORT_PKP_PRZYSTANEK_LUB_STACJA_DWORZEC"),
        default_threshold: 2.0,
    },
    CriterionSpec {
        name: "bus_stop",
        category: Category::Transport,
        kind: ValueKind::Distance,
        plan: nearest("D_TRANSPORT_PRZYSTANEK_AUTOBUSOWY"),
        default_threshold: 0.5,
    },
    CriterionSpec {
        name: "tram_stop",
        category: Category::Transport,
        kind: ValueKind::Distance,
        plan: nearest("D_TRANSPORT_PRZYSTANEK_TRAMWAJOWY"),
        default_threshold: 0.5,
    },
    CriterionSpec {
        name: "garages",
        category: Category::Transport,
        kind: ValueKind::Count,
        plan: Plan::Query(Query::PoiCount("PARKINGI_I_GARAZE")),
        default_threshold: 10.0,
    },
    // -- Services ------------------------------------------------------------
    CriterionSpec {
        name: "post_office",
        category: Category::Services,
        kind: ValueKind::Distance,
        plan: nearest("D_POCZTA"),
        default_threshold: 1.0,
    },
    CriterionSpec {
        name: "mall",
        category: Category::Services,
        kind: ValueKind::Distance,
        plan: nearest("D_CENTRUM_HANDLOWE"),
        default_threshold: 3.0,
    },
    CriterionSpec {
        name: "culture_entertainment",
        category: Category::Services,
        kind: ValueKind::Distance,
        plan: Plan::Reduce(
            Reducer::Mean,
            &[
                nearest("D_ROZRYWKA_I_KULTURA_KINO"),
                nearest("D_ROZRYWKA_I_KULTURA_KREGIELNIE"),
                nearest("D_ROZRYWKA_I_KULTURA_MUZEUM"),
                nearest("D_ROZRYWKA_I_KULTURA_TEATR"),
            ],
        ),
        default_threshold: 3.0,
    },
    CriterionSpec {
        name: "health",
        category: Category::Services,
        kind: ValueKind::Distance,
        plan: nearest("D_ZDROWIE"),
        default_threshold: 1.5,
    },
    // -- Comfort -------------------------------------------------------------
    CriterionSpec {
        name: "parcel_lockers",
        category: Category::Comfort,
        kind: ValueKind::Distance,
        plan: nearest("D_PRZESYLKI_PACZKOMAT"),
        default_threshold: 0.5,
    },
    CriterionSpec {
        name: "civil_services",
        category: Category::Comfort,
        kind: ValueKind::DisamenityDistance,
        plan: Plan::Reduce(
            Reducer::Mean,
            &[
                Plan::Reduce(
                    Reducer::Min,
                    &[
                        nearest("D_URZAD_I_SLUZBA_PUBLICZNA_SLUZBY_PUBLICZNE_OCHOTNICZA_STRAZ_POZARNA"),
                        nearest("D_URZAD_I_SLUZBA_PUBLICZNA_SLUZBY_PUBLICZNE_STRAZ_POZARNA"),
                    ],
                ),
                nearest("D_URZAD_I_SLUZBA_PUBLICZNA_SLUZBY_PUBLICZNE_KOMENDA_POLICJI"),
            ],
        ),
        default_threshold: 1.0,
    },
    CriterionSpec {
        name: "railway_tracks",
        category: Category::Comfort,
        kind: ValueKind::DisamenityDistance,
        plan: nearest("D_TORY_KOLEJOWE"),
        default_threshold: 1.0,
    },
    CriterionSpec {
        name: "freeways",
        category: Category::Comfort,
        kind: ValueKind::DisamenityDistance,
        plan: Plan::Reduce(
            Reducer::Min,
            &[nearest("D_DROGA_EKSPRESOWA"), nearest("D_AUTOSTRADA")],
        ),
        default_threshold: 1.0,
    },
    CriterionSpec {
        name: "airports",
        category: Category::Comfort,
        kind: ValueKind::DisamenityDistance,
        plan: nearest("D_TRANSPORT_LOTNISKO_MIEDZYNARODOWE"),
        default_threshold: 10.0,
    },
    // -- Community -----------------------------------------------------------
    CriterionSpec {
        name: "sports_participation",
        category: Category::Community,
        kind: ValueKind::Percent,
        plan: Plan::Query(Query::AreaStatistic("SR_AKTYWNOSC_SPORTOWA")),
        default_threshold: 0.0,
    },
    CriterionSpec {
        name: "over_60",
        category: Category::Community,
        kind: ValueKind::Percent,
        plan: Plan::Reduce(
            Reducer::Sum,
            &[
                Plan::Query(Query::Demographic("POPT6064")),
                Plan::Query(Query::Demographic("POPT6569")),
                Plan::Query(Query::Demographic("POPT7074")),
                Plan::Query(Query::Demographic("POPT7599")),
            ],
        ),
        default_threshold: 0.0,
    },
    CriterionSpec {
        name: "worship",
        category: Category::Community,
        kind: ValueKind::Distance,
        plan: nearest("D_MIEJSCE_KULTU_KOSCIOL"),
        default_threshold: 1.0,
    },
    CriterionSpec {
        name: "consumer_expenses",
        category: Category::Community,
        kind: ValueKind::Percent,
        plan: Plan::Query(Query::Wealth("WK_RAZEM")),
        default_threshold: 0.0,
    },
    // -- Extraversion --------------------------------------------------------
    CriterionSpec {
        name: "dating_apps",
        category: Category::Extraversion,
        kind: ValueKind::Percent,
        plan: Plan::Query(Query::AreaStatistic("SR_APLIKACJE_RANDKOWE")),
        default_threshold: 0.0,
    },
    CriterionSpec {
        name: "between_20_30",
        category: Category::Extraversion,
        kind: ValueKind::Percent,
        plan: Plan::Reduce(
            Reducer::Sum,
            &[
                Plan::Query(Query::Demographic("POPT2024")),
                Plan::Query(Query::Demographic("POPT2529")),
            ],
        ),
        default_threshold: 0.0,
    },
];

static BY_NAME: Lazy<HashMap<&'static str, &'static CriterionSpec>> =
    Lazy::new(|| CATALOG.iter().map(|spec| (spec.name, spec)).collect());

/// Look up one criterion by name.
pub fn criterion(name: &str) -> Option<&'static CriterionSpec> {
    BY_NAME.get(name).copied()
}

/// Member criteria of one coarse category, in catalog order.
pub fn members(category: Category) -> impl Iterator<Item = &'static CriterionSpec> {
    CATALOG.iter().filter(move |spec| spec.category == category)
}

/// How far an address got through enrichment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrichmentStatus {
    /// Every criterion resolved; the address can be scored and ranked.
    FullyScored,
    /// Some criteria failed; excluded from ranking until resolved.
    Partial,
    /// Nothing resolved.
    Failed,
}

/// Raw criterion values for one address, with per-criterion failures kept
/// separate so one bad fetch never blocks the rest.
#[derive(Debug, Clone, Serialize)]
pub struct EnrichmentOutcome {
    pub values: BTreeMap<String, f64>,
    /// Derived coordinates, for the map-rendering collaborator.
    pub latlon: Option<(f64, f64)>,
    pub failures: BTreeMap<String, String>,
    pub status: EnrichmentStatus,
}

/// Run the full catalog for one address. Each query is independently cached
/// by the client; a failed criterion is recorded and skipped, never fatal.
pub async fn enrich(client: &EnrichmentClient, address: &Address) -> EnrichmentOutcome {
    let mut values = BTreeMap::new();
    let mut failures = BTreeMap::new();

    for spec in CATALOG {
        match spec.plan.eval(client, address).await {
            Ok(value) => {
                values.insert(spec.name.to_string(), value);
            }
            Err(err) => {
                tracing::warn!(
                    criterion = spec.name,
                    code = err.code(),
                    address = %address.label(),
                    "criterion enrichment failed"
                );
                failures.insert(spec.name.to_string(), err.to_string());
            }
        }
    }

    // Status reflects criterion resolution only. Coordinates are a
    // map-rendering extra; failing to derive them never unscores a candidate.
    let status = if failures.is_empty() {
        EnrichmentStatus::FullyScored
    } else if values.is_empty() {
        EnrichmentStatus::Failed
    } else {
        EnrichmentStatus::Partial
    };

    let latlon = match client.fetch(address, Query::Coordinates).await {
        Ok(RawValue::Coords(x, y)) => Some((x, y)),
        Ok(RawValue::Scalar(_)) => None,
        Err(err) => {
            failures.insert("latlon".to_string(), err.to_string());
            None
        }
    };

    EnrichmentOutcome {
        values,
        latlon,
        failures,
        status,
    }
}

/// Bounded LRU memo over the whole per-address enrichment, so an address
/// already scored in this session is not swept through the catalog again.
/// Only fully-scored outcomes are memoized; failures stay retryable.
pub struct CriteriaMemo {
    entries: Mutex<LinkedHashMap<Address, EnrichmentOutcome>>,
    capacity: usize,
}

impl CriteriaMemo {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(LinkedHashMap::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn get(&self, address: &Address) -> Option<EnrichmentOutcome> {
        let mut entries = self.entries.lock().ok()?;
        entries.get_refresh(address).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert(&self, address: Address, outcome: EnrichmentOutcome) {
        if let Ok(mut entries) = self.entries.lock() {
            while entries.len() >= self.capacity {
                entries.pop_front();
            }
            entries.insert(address, outcome);
        }
    }

    /// Memoized [`enrich`].
    pub async fn enrich(&self, client: &EnrichmentClient, address: &Address) -> EnrichmentOutcome {
        if let Some(hit) = self.get(address) {
            return hit;
        }
        let outcome = enrich(client, address).await;
        if outcome.status == EnrichmentStatus::FullyScored {
            self.insert(address.clone(), outcome.clone());
        }
        outcome
    }
}
