//! Tax burden per decile.

use serde::Serialize;
use tracing::debug;

use crate::allocation::DecileExpenditure;
use crate::category::ExpenditureCategory;
use crate::error::{elastic_response, share_of, Result};
use crate::shares::PriceChanges;
use crate::survey::{Decile, HouseholdSurvey};

/// Burden of the price changes on one decile.
///
/// Absolute figures are USD per capita; relative figures are fractions of
/// pre-policy consumption per capita.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TaxBurdenRecord {
    pub country: String,
    pub decile: Decile,
    pub absolute: f64,
    pub relative: f64,
    /// Burden with each category term scaled by its price response.
    pub absolute_with_response: f64,
    pub relative_with_response: f64,
    /// Pre-policy consumption per capita, scaled to macro demand.
    pub consumption_per_capita: f64,
    /// Σ_category (1 + Δp)^ε · expenditure per capita.
    pub aggregate_demand_response: f64,
}

impl TaxBurdenRecord {
    /// Post-response consumption as a fraction of pre-policy consumption.
    pub fn demand_response_factor(&self) -> f64 {
        if self.consumption_per_capita == 0.0 {
            1.0
        } else {
            self.aggregate_demand_response / self.consumption_per_capita
        }
    }
}

/// Absolute and relative burden per decile, with and without the price
/// response of demand.
pub fn tax_burden(
    survey: &HouseholdSurvey,
    allocation: &DecileExpenditure,
    price_changes: &PriceChanges,
) -> Result<Vec<TaxBurdenRecord>> {
    let mut records = Vec::with_capacity(survey.len());

    for decile in survey.deciles() {
        let allocated = allocation.require(decile.decile)?;
        let consumption = allocated.total_per_capita();

        let mut absolute = 0.0;
        let mut absolute_with_response = 0.0;
        let mut aggregate_demand_response = 0.0;
        for category in ExpenditureCategory::ALL {
            let delta = price_changes.require(category)?;
            let spending = allocated.category(category).per_capita;
            let response = elastic_response(
                format!("{category}, {}", decile.decile),
                1.0 + delta,
                decile.profile(category).price_elasticity,
            )?;
            absolute += delta * spending;
            absolute_with_response += response * delta * spending;
            aggregate_demand_response += response * spending;
        }

        let group = decile.decile;
        records.push(TaxBurdenRecord {
            country: survey.country().to_string(),
            decile: decile.decile,
            absolute,
            relative: share_of(group, "consumption per capita", absolute, consumption)?,
            absolute_with_response,
            relative_with_response: share_of(
                group,
                "consumption per capita",
                absolute_with_response,
                consumption,
            )?,
            consumption_per_capita: consumption,
            aggregate_demand_response,
        });
    }

    debug!(country = survey.country(), deciles = records.len(), "computed tax burden");
    Ok(records)
}
