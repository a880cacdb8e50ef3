use homescout::cache::CacheKey;
use homescout::{Address, Query};

#[test]
fn cache_key_is_stable_and_sensitive_to_inputs() {
    let address = Address::new("Łódź", "Dobra", "42", "60123");
    let query = Query::NearestPoi("D_POCZTA");

    let key1 = CacheKey::new(query.endpoint(), query.payload(&address));
    let key2 = CacheKey::new(query.endpoint(), query.payload(&address));
    assert_eq!(key1.key_hash, key2.key_hash);
    assert_eq!(key1.canonical, key2.canonical);

    let other = Address::new("Łódź", "Dobra", "44", "60123");
    let key3 = CacheKey::new(query.endpoint(), query.payload(&other));
    assert_ne!(key1.key_hash, key3.key_hash);
}

#[test]
fn cache_key_depends_on_endpoint() {
    let payload = serde_json::json!({"size": "100"});
    let a = CacheKey::new("bik-api-4/punkty-zainteresowania-adres", payload.clone());
    let b = CacheKey::new("bik-api-4/liczba-poi-adres", payload);
    assert_ne!(a.key_hash, b.key_hash);
}

#[test]
fn semantically_identical_payloads_share_a_key_regardless_of_field_order() {
    let forward: serde_json::Value =
        serde_json::from_str(r#"{"size":"100","address":{"city":"Łódź","code":"60123"},"nearestPOI":"D_POCZTA"}"#)
            .unwrap();
    let shuffled: serde_json::Value =
        serde_json::from_str(r#"{"nearestPOI":"D_POCZTA","address":{"code":"60123","city":"Łódź"},"size":"100"}"#)
            .unwrap();

    let a = CacheKey::new("bik-api-4/punkty-zainteresowania-adres", forward);
    let b = CacheKey::new("bik-api-4/punkty-zainteresowania-adres", shuffled);
    assert_eq!(a.canonical, b.canonical);
    assert_eq!(a.key_hash, b.key_hash);
}
