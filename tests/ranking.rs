use std::collections::BTreeMap;

use homescout::catalog::{EnrichmentOutcome, EnrichmentStatus, CATALOG};
use homescout::rank::{comparison_bands, explain, rank, Band, Variant};
use homescout::{Address, Category, ThresholdSet, WeightSet};

fn nature_only_weights() -> WeightSet {
    let mut weights = WeightSet::default();
    for category in Category::ALL {
        weights.set(category, 0.0);
    }
    weights.set(Category::Nature, 1.0);
    weights
}

/// Variant whose score is fully determined by its green-space share: with
/// only Nature weighted, score = green / 100.
fn variant(building: &str, green: f64) -> Variant {
    let mut values: BTreeMap<String, f64> =
        CATALOG.iter().map(|s| (s.name.to_string(), 0.0)).collect();
    values.insert("green_spaces".to_string(), green);
    let outcome = EnrichmentOutcome {
        values,
        latlon: None,
        failures: BTreeMap::new(),
        status: EnrichmentStatus::FullyScored,
    };
    Variant::from_outcome(
        Address::new("Łódź", "Dobra", building, "60123"),
        outcome,
        &ThresholdSet::default(),
        &nature_only_weights(),
    )
    .unwrap()
}

fn partial_variant(building: &str) -> Variant {
    let outcome = EnrichmentOutcome {
        values: BTreeMap::new(),
        latlon: None,
        failures: [("geoscore".to_string(), "HTTP 500".to_string())].into(),
        status: EnrichmentStatus::Partial,
    };
    Variant::from_outcome(
        Address::new("Łódź", "Dobra", building, "60123"),
        outcome,
        &ThresholdSet::default(),
        &nature_only_weights(),
    )
    .unwrap()
}

#[test]
fn rank_orders_best_first_and_keeps_ties_stable() {
    let variants = vec![
        variant("1", 50.0),
        variant("2", 90.0),
        variant("3", 50.0),
        variant("4", 30.0),
    ];
    let ranked = rank(&variants);
    let buildings: Vec<&str> = ranked.iter().map(|v| v.address.building_number.as_str()).collect();
    // Equal scores keep insertion order: "1" stays ahead of "3".
    assert_eq!(buildings, ["2", "1", "3", "4"]);
}

#[test]
fn quartile_bands_split_the_candidate_set() {
    let variants = vec![
        variant("1", 90.0),
        variant("2", 70.0),
        variant("3", 50.0),
        variant("4", 30.0),
    ];
    let bands = comparison_bands(&variants);
    assert_eq!(bands.len(), 4);
    // p25 = 0.45, p75 = 0.75 over [0.3, 0.5, 0.7, 0.9].
    assert_eq!(bands[0][&Category::Nature], Band::High);
    assert_eq!(bands[1][&Category::Nature], Band::Mid);
    assert_eq!(bands[2][&Category::Nature], Band::Mid);
    assert_eq!(bands[3][&Category::Nature], Band::Low);
    // With every other category identically zero, nothing is an outlier.
    assert_eq!(bands[0][&Category::Safety], Band::Mid);
}

#[test]
fn unscored_variants_are_excluded_but_stay_visible() {
    let variants = vec![variant("1", 90.0), partial_variant("2"), variant("3", 30.0)];

    let ranked = rank(&variants);
    assert_eq!(ranked.len(), 2);
    assert!(ranked.iter().all(|v| v.address.building_number != "2"));

    // The band table stays aligned with the input; the unscored row is empty.
    let bands = comparison_bands(&variants);
    assert_eq!(bands.len(), 3);
    assert!(bands[1].is_empty());
    assert!(!bands[0].is_empty());
}

#[test]
fn rescore_reacts_to_weight_changes_without_new_raw_values() {
    let mut v = variant("1", 80.0);
    assert!((v.score.unwrap() - 0.8).abs() < 1e-12);

    // Shift all weight to Safety: green space stops mattering.
    let mut weights = WeightSet::default();
    for category in Category::ALL {
        weights.set(category, 0.0);
    }
    weights.set(Category::Safety, 1.0);
    v.rescore(&ThresholdSet::default(), &weights).unwrap();
    assert_eq!(v.score.unwrap(), 0.0);
}

#[test]
fn rescore_is_a_no_op_for_partial_variants() {
    let mut v = partial_variant("1");
    assert!(v.score.is_none());
    v.rescore(&ThresholdSet::default(), &WeightSet::default()).unwrap();
    assert!(v.score.is_none());
    assert!(v.fine.is_empty());
}

#[test]
fn explain_lists_contributions_largest_first() {
    let mut values: BTreeMap<String, f64> =
        CATALOG.iter().map(|s| (s.name.to_string(), 0.0)).collect();
    values.insert("green_spaces".to_string(), 80.0);
    values.insert("sports_participation".to_string(), 40.0);
    let outcome = EnrichmentOutcome {
        values,
        latlon: None,
        failures: BTreeMap::new(),
        status: EnrichmentStatus::FullyScored,
    };
    let mut weights = nature_only_weights();
    weights.set(Category::Community, 0.5);
    let v = Variant::from_outcome(
        Address::new("Łódź", "Dobra", "1", "60123"),
        outcome,
        &ThresholdSet::default(),
        &weights,
    )
    .unwrap();

    let contributions = explain(&v);
    assert_eq!(contributions.len(), Category::ALL.len());
    assert_eq!(contributions[0].0, Category::Nature);
    assert_eq!(contributions[1].0, Category::Community);
    for pair in contributions.windows(2) {
        assert!(pair[0].1 >= pair[1].1);
    }
}
