use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use homescout::provider::EnrichmentProvider;
use homescout::{
    Address, Category, ClientConfig, ComparisonSession, EnrichmentClient, EnrichmentStatus,
    JsonlCacheStore, ProviderError, SessionError, WeightSet,
};

/// In-process provider: every lookup resolves, and grid statistics scale with
/// the building number so different addresses earn different scores.
struct StubProvider {
    calls: AtomicUsize,
}

fn keyed(outer: &str, code: &str, value: f64) -> Value {
    let mut inner = serde_json::Map::new();
    inner.insert(code.to_string(), json!(value));
    let mut body = serde_json::Map::new();
    body.insert(outer.to_string(), Value::Object(inner));
    Value::Object(body)
}

#[async_trait]
impl EnrichmentProvider for StubProvider {
    async fn post(&self, endpoint: &str, payload: &Value) -> Result<Value, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let building: f64 = payload["address"]["buildingNumber"]
            .as_str()
            .unwrap()
            .parse()
            .unwrap();
        let echo = |key: &str| payload[key].as_str().unwrap().to_string();
        let body = match endpoint {
            "bik-api-4/punkty-zainteresowania-adres" => keyed("nearestPOI", &echo("nearestPOI"), 500.0),
            "bik-api-4/liczba-poi-adres" => keyed("poinumber", &echo("poinumber"), 3.0),
            "bik-api-4/dane-demograficzne-adres" => {
                keyed("demographicData", &echo("demographicData"), 10.0)
            }
            "bik-api-4/zamoznosc-adres" => keyed("wealth", &echo("wealth"), 50.0),
            "bik-api-5/geoscore-adres" => json!({"score": 50.0}),
            "bik-api-6/address" => json!({
                "geostats": [{
                    "result": 10.0 * building,
                    "inputDataCoordinates": {"utm_x": 51.75, "utm_y": 19.45},
                }]
            }),
            other => panic!("unexpected endpoint {other}"),
        };
        Ok(body)
    }
}

fn session_with_stub(dir: &tempfile::TempDir) -> (ComparisonSession, Arc<StubProvider>) {
    let provider = Arc::new(StubProvider {
        calls: AtomicUsize::new(0),
    });
    let cache = JsonlCacheStore::new(dir.path()).unwrap();
    let client = EnrichmentClient::new(
        provider.clone(),
        Arc::new(cache),
        ClientConfig::default(),
    );
    (ComparisonSession::new(Arc::new(client), 8), provider)
}

fn address(building: &str) -> Address {
    Address::new("Łódź", "Dobra", building, "60123")
}

#[tokio::test]
async fn enroll_scores_and_ranks_candidates() {
    let dir = tempfile::tempdir().unwrap();
    let (mut session, _provider) = session_with_stub(&dir);

    for building in ["1", "3", "2"] {
        let variant = session.enroll(address(building)).await.unwrap();
        assert_eq!(variant.status, EnrichmentStatus::FullyScored);
        assert!(variant.score.is_some());
        assert_eq!(variant.latlon, Some((51.75, 19.45)));
    }

    // Grid statistics grow with the building number, so "3" wins.
    let ranked = session.ranked();
    let buildings: Vec<&str> = ranked
        .iter()
        .map(|v| v.address.building_number.as_str())
        .collect();
    assert_eq!(buildings, ["3", "2", "1"]);
}

#[tokio::test]
async fn duplicate_enrollment_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let (mut session, _provider) = session_with_stub(&dir);

    session.enroll(address("1")).await.unwrap();
    let err = session.enroll(address("1")).await.unwrap_err();
    assert!(matches!(err, SessionError::Duplicate(_)));
    assert_eq!(session.variants().len(), 1);
}

#[tokio::test]
async fn profile_edits_rescore_without_refetching() {
    let dir = tempfile::tempdir().unwrap();
    let (mut session, provider) = session_with_stub(&dir);

    session.enroll(address("1")).await.unwrap();
    session.enroll(address("2")).await.unwrap();
    let calls_after_enroll = provider.calls.load(Ordering::SeqCst);
    let before: Vec<f64> = session.variants().iter().filter_map(|v| v.score).collect();

    // Shift all weight onto Safety and rescore in place.
    let mut weights = WeightSet::default();
    for category in Category::ALL {
        weights.set(category, 0.0);
    }
    weights.set(Category::Safety, 1.0);
    session.set_weights(weights).unwrap();

    let after: Vec<f64> = session.variants().iter().filter_map(|v| v.score).collect();
    assert_ne!(before, after);
    assert_eq!(provider.calls.load(Ordering::SeqCst), calls_after_enroll);

    session.nudge_weight(Category::Nature, 0.5).unwrap();
    assert_eq!(session.weights().get(Category::Nature), 0.5);
    assert_eq!(provider.calls.load(Ordering::SeqCst), calls_after_enroll);
}

#[tokio::test]
async fn removed_addresses_reenroll_from_the_memo() {
    let dir = tempfile::tempdir().unwrap();
    let (mut session, provider) = session_with_stub(&dir);

    session.enroll(address("1")).await.unwrap();
    let calls_after_enroll = provider.calls.load(Ordering::SeqCst);

    assert!(session.remove(&address("1")));
    assert!(session.variants().is_empty());
    assert!(!session.remove(&address("1")));

    session.enroll(address("1")).await.unwrap();
    assert_eq!(provider.calls.load(Ordering::SeqCst), calls_after_enroll);
}

#[tokio::test]
async fn explain_reports_the_enrolled_candidate() {
    let dir = tempfile::tempdir().unwrap();
    let (mut session, _provider) = session_with_stub(&dir);

    session.enroll(address("2")).await.unwrap();
    let contributions = session.explain(&address("2")).unwrap();
    assert_eq!(contributions.len(), Category::ALL.len());
    assert!(session.explain(&address("9")).is_none());

    let bands = session.comparison_bands();
    assert_eq!(bands.len(), 1);
}
