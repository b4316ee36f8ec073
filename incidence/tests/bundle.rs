//! Loading input bundles and configuration from disk.

mod common;

use assert_matches::assert_matches;
use common::{assert_close, bundle};
use mindset_incidence::{
    run, IncidenceConfig, IncidenceError, InputBundle, PriceScenario, SectorId,
};
use tempfile::tempdir;

#[test]
fn test_bundle_file_feeds_the_pipeline() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bundle.json");
    let original = bundle(&["BGR", "KEN"]);
    original.to_json_path(&path).unwrap();

    let loaded = InputBundle::from_json_path(&path).unwrap();
    assert_eq!(loaded.countries(), ["BGR", "KEN"]);
    assert_eq!(loaded.survey.len(), original.survey.len());
    assert_eq!(loaded.concordance, original.concordance);

    let config = IncidenceConfig::default();
    let from_disk = run(&loaded.country_inputs("KEN", &config).unwrap(), &config).unwrap();
    let in_memory = run(&original.country_inputs("KEN", &config).unwrap(), &config).unwrap();
    for (a, b) in from_disk.burdens.iter().zip(&in_memory.burdens) {
        assert_close(a.absolute, b.absolute, 1e-12);
    }
}

#[test]
fn test_config_file_selects_scenario() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("incidence.toml");
    let config = IncidenceConfig {
        scenario: PriceScenario::Technology,
        ..Default::default()
    };
    config.save(&path).unwrap();
    let config = IncidenceConfig::load(&path).unwrap();

    let inputs = bundle(&["BGR"]).country_inputs("BGR", &config).unwrap();
    // Technology deltas are half the base deltas
    assert_close(inputs.prices.get(SectorId(1)).unwrap(), 0.01, 1e-12);
}

#[test]
fn test_missing_scenario_column_is_schema_mismatch() {
    let config = IncidenceConfig {
        scenario: PriceScenario::Trade,
        ..Default::default()
    };
    let err = bundle(&["BGR"]).country_inputs("BGR", &config).unwrap_err();
    assert_matches!(
        err.downcast_ref::<IncidenceError>(),
        Some(IncidenceError::SchemaMismatch(_))
    );
    assert!(format!("{err:#}").contains("Invalid inputs for BGR"));
}

#[test]
fn test_unknown_country_is_rejected() {
    let config = IncidenceConfig::default();
    let err = bundle(&["BGR"]).country_inputs("FRA", &config).unwrap_err();
    assert_matches!(
        err.downcast_ref::<IncidenceError>(),
        Some(IncidenceError::SchemaMismatch(_))
    );
}

#[test]
fn test_split_reference_country_must_be_present() {
    let config = IncidenceConfig {
        split_reference_country: "ROU".to_string(),
        ..Default::default()
    };
    let err = bundle(&["BGR"]).country_inputs("BGR", &config).unwrap_err();
    assert!(format!("{err:#}").contains("reference country ROU"));
}

#[test]
fn test_missing_population_year() {
    let config = IncidenceConfig {
        population_year: 2030,
        ..Default::default()
    };
    let err = bundle(&["BGR"]).country_inputs("BGR", &config).unwrap_err();
    assert!(format!("{err:#}").contains("no population figure for BGR in 2030"));
}

#[test]
fn test_optional_tables_may_be_absent() {
    let mut bundle = bundle(&["BGR"]);
    bundle.revenue.clear();
    bundle.government_spending.clear();
    bundle.other_investment.clear();

    let json = serde_json::to_value(&bundle).unwrap();
    let mut object = json.as_object().unwrap().clone();
    object.remove("revenue");
    object.remove("government_spending");
    object.remove("other_investment");
    let bundle: InputBundle = serde_json::from_value(object.into()).unwrap();

    let config = IncidenceConfig::default();
    let inputs = bundle.country_inputs("BGR", &config).unwrap();
    assert!(inputs.revenue.is_none());
    assert!(inputs.funding.is_none());
}

#[test]
fn test_incomplete_funding_tables_are_rejected() {
    let mut bundle = bundle(&["BGR"]);
    bundle.other_investment.retain(|r| r.sector != SectorId(96));
    let err = bundle
        .country_inputs("BGR", &IncidenceConfig::default())
        .unwrap_err();
    assert_matches!(
        err.downcast_ref::<IncidenceError>(),
        Some(IncidenceError::SchemaMismatch(_))
    );
}
