//! Consistency diagnostics between the category-level results and the
//! macro-model sector vectors they were derived from.
//!
//! Each check compares two ways of computing the same aggregate. A failure
//! points at dropped join keys, an incomplete concordance or inconsistent
//! survey shares.

use serde::Serialize;
use tracing::warn;

use crate::adjustment::{weighted_category_demand, PriceAdjustment, SectorFactors};
use crate::burden::TaxBurdenRecord;
use crate::category::CategoryMap;
use crate::demand::{CategoryDemand, USD_PER_MODEL_UNIT};
use crate::error::{IncidenceError, Result};
use crate::sector::{Concordance, DemandVector, PriceVector};
use crate::shares::PriceChanges;
use crate::survey::{HouseholdSurvey, DECILE_COUNT};

/// Outcome of one diagnostic.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ConsistencyCheck {
    pub name: &'static str,
    pub expected: f64,
    pub actual: f64,
    /// Largest accepted relative deviation.
    pub tolerance: f64,
}

impl ConsistencyCheck {
    /// Build a check, logging a warning if it fails.
    pub fn new(name: &'static str, expected: f64, actual: f64, tolerance: f64) -> Self {
        let check = Self {
            name,
            expected,
            actual,
            tolerance,
        };
        if !check.passed() {
            warn!(
                check = name,
                expected,
                actual,
                deviation = check.relative_deviation(),
                tolerance,
                "consistency check failed"
            );
        }
        check
    }

    /// |actual − expected| / |expected|, or the absolute deviation when the
    /// expected value is zero.
    pub fn relative_deviation(&self) -> f64 {
        let deviation = (self.actual - self.expected).abs();
        if self.expected == 0.0 {
            deviation
        } else {
            deviation / self.expected.abs()
        }
    }

    pub fn passed(&self) -> bool {
        self.relative_deviation() <= self.tolerance
    }
}

/// Σ_sector Δp · q over concordance sectors, USD.
fn sector_price_effect(
    concordance: &Concordance,
    demand: &DemandVector,
    prices: &PriceVector,
) -> f64 {
    concordance
        .sector_ids()
        .into_iter()
        .filter_map(|s| Some(demand.get(s)? * prices.get(s)?))
        .sum::<f64>()
        * USD_PER_MODEL_UNIT
}

/// Σ_category Δp · demand agrees with Σ_sector Δp · q.
pub fn price_consistency(
    price_changes: &PriceChanges,
    category_demand: &CategoryDemand,
    concordance: &Concordance,
    demand: &DemandVector,
    prices: &PriceVector,
    tolerance: f64,
) -> ConsistencyCheck {
    let actual: f64 = category_demand
        .iter()
        .filter_map(|(c, q)| price_changes.get(c).map(|dp| dp * q))
        .sum();
    ConsistencyCheck::new(
        "price",
        sector_price_effect(concordance, demand, prices),
        actual,
        tolerance,
    )
}

/// Absolute burden scaled to the population agrees with Σ_sector Δp · q.
pub fn burden_consistency(
    burdens: &[TaxBurdenRecord],
    population: u64,
    concordance: &Concordance,
    demand: &DemandVector,
    prices: &PriceVector,
    tolerance: f64,
) -> ConsistencyCheck {
    let decile_population = population as f64 / DECILE_COUNT as f64;
    let actual: f64 = burdens.iter().map(|b| b.absolute * decile_population).sum();
    ConsistencyCheck::new(
        "burden",
        sector_price_effect(concordance, demand, prices),
        actual,
        tolerance,
    )
}

/// Aggregate demand response of the deciles agrees with category demand
/// weighted by the price adjustment factors.
pub fn response_consistency(
    burdens: &[TaxBurdenRecord],
    population: u64,
    category_demand: &CategoryDemand,
    price_adjustment: &PriceAdjustment,
    tolerance: f64,
) -> ConsistencyCheck {
    let decile_population = population as f64 / DECILE_COUNT as f64;
    let actual: f64 = burdens
        .iter()
        .map(|b| b.aggregate_demand_response * decile_population)
        .sum();
    ConsistencyCheck::new(
        "demand response",
        weighted_category_demand(&price_adjustment.factors, category_demand),
        actual,
        tolerance,
    )
}

/// Category factors weighted by category demand agree with sector factors
/// weighted by macro demand.
pub fn sector_factor_consistency(
    name: &'static str,
    category_factors: &CategoryMap<f64>,
    category_demand: &CategoryDemand,
    sector_factors: &SectorFactors,
    demand: &DemandVector,
    tolerance: f64,
) -> ConsistencyCheck {
    ConsistencyCheck::new(
        name,
        weighted_category_demand(category_factors, category_demand),
        sector_factors.weighted_demand(demand),
        tolerance,
    )
}

/// Pre-policy consumption summed over categories agrees with the survey's
/// total consumption, i.e. budget shares add up to 100 %.
pub fn survey_consumption(
    survey: &HouseholdSurvey,
    price_adjustment: &PriceAdjustment,
    tolerance: f64,
) -> ConsistencyCheck {
    let expected: f64 = survey.deciles().iter().map(|d| d.consumption_per_capita).sum();
    let actual: f64 = price_adjustment.old_consumption.values().sum();
    ConsistencyCheck::new("survey consumption", expected, actual, tolerance)
}

/// Average consumption per capita from the survey and from the macro model.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SurveyComparison {
    pub country: String,
    /// Survey average converted to USD of the model year.
    pub survey_per_capita: f64,
    /// Σ macro demand per capita, USD.
    pub model_per_capita: f64,
    /// |model − survey| / survey, percent.
    pub deviation_pct: f64,
}

/// Compare survey and macro-model consumption per capita.
///
/// `exchange_rate` is local currency per USD in the survey year;
/// `deflator_ratio` is the GDP deflator of the model year over that of the
/// survey year.
pub fn compare_survey_to_model(
    survey: &HouseholdSurvey,
    demand: &DemandVector,
    population: u64,
    exchange_rate: f64,
    deflator_ratio: f64,
) -> Result<SurveyComparison> {
    if !(exchange_rate > 0.0 && deflator_ratio > 0.0) {
        return Err(IncidenceError::InvalidInput(format!(
            "exchange rate ({exchange_rate}) and deflator ratio ({deflator_ratio}) must be positive"
        )));
    }
    if population == 0 {
        return Err(IncidenceError::InvalidInput(
            "population must be positive".to_string(),
        ));
    }
    let survey_per_capita = survey.average_consumption() / exchange_rate * deflator_ratio;
    if survey_per_capita == 0.0 {
        return Err(IncidenceError::empty_group(
            survey.country(),
            "survey consumption per capita",
        ));
    }
    let model_per_capita = demand.total() * USD_PER_MODEL_UNIT / population as f64;
    Ok(SurveyComparison {
        country: survey.country().to_string(),
        survey_per_capita,
        model_per_capita,
        deviation_pct: ((model_per_capita - survey_per_capita) / survey_per_capita).abs() * 100.0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adjustment::price_adjustment_factors;
    use crate::category::ExpenditureCategory;
    use crate::survey::tests::uniform_row;

    #[test]
    fn test_relative_deviation() {
        let check = ConsistencyCheck::new("x", 100.0, 100.5, 1e-2);
        assert!((check.relative_deviation() - 0.005).abs() < 1e-12);
        assert!(check.passed());
        assert!(!ConsistencyCheck::new("x", 100.0, 102.0, 1e-2).passed());
        assert!(ConsistencyCheck::new("x", 0.0, 1e-9, 1e-6).passed());
    }

    #[test]
    fn test_survey_consumption_with_complete_shares() {
        let rows: Vec<_> = (1..=3).map(|d| uniform_row("BGR", d, 100.0)).collect();
        let survey = HouseholdSurvey::for_country(&rows, "BGR").unwrap();
        let prices = PriceChanges::from_values(ExpenditureCategory::ALL.iter().map(|&c| (c, 0.0)));
        let adjustment = price_adjustment_factors(&survey, &prices).unwrap();
        assert!(survey_consumption(&survey, &adjustment, 1e-6).passed());
    }

    #[test]
    fn test_compare_survey_to_model() {
        let rows: Vec<_> = (1..=2).map(|d| uniform_row("BGR", d, 2_000.0 * d as f64)).collect();
        let survey = HouseholdSurvey::for_country(&rows, "BGR").unwrap();
        let demand = DemandVector::from_pairs(vec![(1, 1_500.0), (2, 500.0)]);

        // Survey: 3000 LCU / 2 LCU per USD × 1.2 = 1800 USD; model: 2e6 / 1000 = 2000 USD
        let comparison = compare_survey_to_model(&survey, &demand, 1_000, 2.0, 1.2).unwrap();
        assert!((comparison.survey_per_capita - 1_800.0).abs() < 1e-9);
        assert!((comparison.model_per_capita - 2_000.0).abs() < 1e-9);
        assert!((comparison.deviation_pct - 100.0 / 9.0).abs() < 1e-9);

        assert!(compare_survey_to_model(&survey, &demand, 1_000, 0.0, 1.0).is_err());
    }
}
