//! End-to-end runs of the incidence pipeline on the synthetic bundle.

mod common;

use assert_matches::assert_matches;
use common::{assert_close, bundle, INCOME_REVENUE, POPULATION};
use mindset_incidence::{
    run, run_countries, CountryInputs, ExpenditureCategory, IncidenceConfig, IncidenceError,
    InfrastructureCategory, PriceScenario, SectorId,
};

fn inputs(country: &str, config: &IncidenceConfig) -> CountryInputs {
    bundle(&["BGR", "KEN"])
        .country_inputs(country, config)
        .unwrap()
}

#[test]
fn test_full_run_passes_every_check() {
    let config = IncidenceConfig::default();
    let report = run(&inputs("KEN", &config), &config).unwrap();

    assert_eq!(report.country, "KEN");
    assert_eq!(report.population, POPULATION);
    assert_eq!(report.burdens.len(), 10);
    assert!(report.income.is_some());
    assert!(report.infrastructure.is_some());

    let failed: Vec<_> = report.failed_checks().map(|c| c.name).collect();
    assert!(failed.is_empty(), "failed checks: {failed:?}");

    let names: Vec<_> = report.checks.iter().map(|c| c.name).collect();
    for expected in [
        "sector share sum",
        "decile share sum",
        "demand mass",
        "price",
        "burden",
        "demand response",
        "price sector factors",
        "income sector factors",
        "survey consumption",
        "targeted transfer budget",
        "infrastructure budget",
    ] {
        assert!(names.contains(&expected), "missing check {expected}");
    }
}

#[test]
fn test_split_groups_follow_reference_shares() {
    let config = IncidenceConfig::default();
    let report = run(&inputs("KEN", &config), &config).unwrap();

    // Uniform survey shares: a fifth of sectors 62 + 63, half of sector 21
    let petroleum = (1_000.0 + 620.0 + 1_000.0 + 630.0) * 1_000.0;
    for category in [
        ExpenditureCategory::Diesel,
        ExpenditureCategory::Gasoline,
        ExpenditureCategory::Lpg,
    ] {
        assert_close(report.category_demand.get(category).unwrap(), petroleum / 5.0, 1e-9);
    }
    let biomass = (1_000.0 + 210.0) * 1_000.0;
    assert_close(
        report.category_demand.get(ExpenditureCategory::Firewood).unwrap(),
        biomass / 2.0,
        1e-9,
    );

    // Sectors 62 (Δp 0.03) and 63 (Δp 0.04) weighted by demand
    let expected = (1_620.0 * 0.03 + 1_630.0 * 0.04) / 3_250.0;
    assert_close(
        report.price_changes.get(ExpenditureCategory::Kerosene).unwrap(),
        expected,
        1e-12,
    );

    // Split sectors carry the share-weighted mean of the group factors
    let factor = report.price_sector_factors.get(SectorId(62)).unwrap();
    let mean: f64 = [
        ExpenditureCategory::Diesel,
        ExpenditureCategory::Ethanol,
        ExpenditureCategory::Gasoline,
        ExpenditureCategory::Kerosene,
        ExpenditureCategory::Lpg,
    ]
    .iter()
    .map(|c| report.price_adjustment.factors[c])
    .sum::<f64>()
        / 5.0;
    assert_close(factor, mean, 1e-12);
}

#[test]
fn test_price_response_lowers_burden() {
    let config = IncidenceConfig::default();
    let report = run(&inputs("KEN", &config), &config).unwrap();

    for burden in &report.burdens {
        assert!(burden.absolute > 0.0);
        assert!(burden.absolute_with_response < burden.absolute);
        assert!(burden.demand_response_factor() < 1.0);
        assert_close(burden.relative, burden.absolute / burden.consumption_per_capita, 1e-12);
    }
    for factor in report.price_adjustment.factors.values() {
        assert!(*factor < 1.0);
    }
}

#[test]
fn test_targeted_transfer_to_poorest_deciles() {
    let config = IncidenceConfig {
        decile_target: 4,
        ..Default::default()
    };
    let report = run(&inputs("KEN", &config), &config).unwrap();
    let income = report.income.as_ref().unwrap();

    // 5e6 USD over 4 deciles of 100 000 people
    for (recycled, burden) in income.burdens.iter().zip(&report.burdens) {
        let expected = if recycled.decile.get() <= 4 { 12.5 } else { 0.0 };
        assert_close(recycled.transfer_per_capita, expected, 1e-12);
        assert_close(recycled.absolute, burden.absolute - expected, 1e-9);
    }
    let paid: f64 = income
        .burdens
        .iter()
        .map(|r| r.transfer_per_capita * POPULATION as f64 / 10.0)
        .sum();
    assert_close(paid, INCOME_REVENUE * 1_000.0, 1e-9);

    // Every category has spending in the targeted deciles
    assert!(income.adjustment.factors.values().all(|f| *f > 1.0));
    assert_eq!(income.adjustment.transfers.len(), 10);
}

#[test]
fn test_infrastructure_budget_is_spent() {
    let config = IncidenceConfig::default();
    let report = run(&inputs("KEN", &config), &config).unwrap();
    let infrastructure = report.infrastructure.as_ref().unwrap();

    // Shares 0.41 of 3e6 USD plus 820 000 USD of other investment
    assert_close(infrastructure.transfers.allocated_total(), 2_050_000.0, 1e-9);

    let water = &infrastructure.transfers.pools[&InfrastructureCategory::Water];
    assert_close(water.allocated, 0.03 * 3e6 + 60_000.0, 1e-9);
    // Access is 5 %, 15 %, ..., 95 %: half the population lacks it
    assert_close(water.population_without_access, POPULATION as f64 / 2.0, 1e-9);

    let first = &infrastructure.burdens[0];
    let last = &infrastructure.burdens[9];
    assert!(first.transfer_per_capita > last.transfer_per_capita);
}

#[test]
fn test_technology_scenario_halves_static_burden() {
    let base = IncidenceConfig::default();
    let technology = IncidenceConfig {
        scenario: PriceScenario::Technology,
        ..Default::default()
    };
    let base_report = run(&inputs("KEN", &base), &base).unwrap();
    let technology_report = run(&inputs("KEN", &technology), &technology).unwrap();

    for (b, t) in base_report.burdens.iter().zip(&technology_report.burdens) {
        assert_close(t.absolute, b.absolute / 2.0, 1e-9);
    }
}

#[test]
fn test_without_revenue_skips_recycling() {
    let config = IncidenceConfig::default();
    let mut inputs = inputs("BGR", &config);
    inputs.revenue = None;
    let report = run(&inputs, &config).unwrap();
    assert!(report.income.is_none());
    assert!(report.infrastructure.is_none());
    assert!(report.all_checks_passed());
}

#[test]
fn test_price_drop_below_minus_one_is_rejected() {
    let config = IncidenceConfig::default();
    let mut bundle = bundle(&["BGR"]);
    for row in bundle.prices.iter_mut().filter(|r| r.sector == SectorId(1)) {
        row.base = -1.5;
    }
    let inputs = bundle.country_inputs("BGR", &config).unwrap();
    assert_matches!(run(&inputs, &config), Err(IncidenceError::DomainViolation { .. }));
}

#[test]
fn test_run_countries_is_independent() {
    let config = IncidenceConfig::default();
    let all = vec![inputs("BGR", &config), inputs("KEN", &config)];
    let results = run_countries(&all, &config);

    assert_eq!(results.len(), 2);
    let countries: Vec<_> = results.iter().map(|(c, _)| c.as_str()).collect();
    assert_eq!(countries, ["BGR", "KEN"]);
    for (_, result) in &results {
        assert!(result.as_ref().unwrap().all_checks_passed());
    }
}
