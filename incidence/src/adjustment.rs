//! Demand adjustment factors from price and income elasticities.
//!
//! Both factors are decile-weighted averages of per-decile elastic
//! responses:
//!
//! ```text
//! price:  f(cat) = Σ_d w(d, cat) · (1 + Δp(cat))^ε_p(d, cat)
//! income: f(cat) = Σ_d w(d, cat) · (1 + transfer(d) / total(d))^ε_y(d, cat)
//! ```
//!
//! where `w(d, cat)` is decile `d`'s share of the category's survey
//! expenditure. Category factors can be remapped onto macro sectors with
//! [`sector_factors`] for use by the macro model.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::allocation::DecileExpenditure;
use crate::category::{CategoryMap, ExpenditureCategory};
use crate::demand::{CategoryDemand, SplitShares, USD_PER_MODEL_UNIT};
use crate::error::{elastic_response, share_of, IncidenceError, Result};
use crate::sector::{Concordance, DemandVector, SectorId};
use crate::shares::PriceChanges;
use crate::survey::{Decile, HouseholdSurvey, DECILE_COUNT};

/// Price-side adjustment factors.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceAdjustment {
    /// Decile-weighted price response per category.
    pub factors: CategoryMap<f64>,
    /// Σ over deciles of pre-policy per-capita consumption per category.
    pub old_consumption: CategoryMap<f64>,
}

/// Income-side adjustment factors.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct IncomeAdjustment {
    /// Decile-weighted income response per category.
    pub factors: CategoryMap<f64>,
    /// Transfer received by each decile, USD.
    pub transfers: BTreeMap<Decile, f64>,
}

fn decile_group(category: ExpenditureCategory, decile: Decile) -> String {
    format!("{category}, {decile}")
}

/// Price-side factor per category.
pub fn price_adjustment_factors(
    survey: &HouseholdSurvey,
    price_changes: &PriceChanges,
) -> Result<PriceAdjustment> {
    let mut result = PriceAdjustment::default();

    for category in ExpenditureCategory::ALL {
        let delta = price_changes.require(category)?;
        let old_total: f64 = survey.deciles().iter().map(|d| d.expenditure(category)).sum();

        let mut factor = 0.0;
        for decile in survey.deciles() {
            let weight = share_of(
                category,
                "pre-policy consumption",
                decile.expenditure(category),
                old_total,
            )?;
            let response = elastic_response(
                decile_group(category, decile.decile),
                1.0 + delta,
                decile.profile(category).price_elasticity,
            )?;
            factor += weight * response;
        }

        result.factors.insert(category, factor);
        result.old_consumption.insert(category, old_total);
    }

    debug!(country = survey.country(), "computed price adjustment factors");
    Ok(result)
}

/// Income-side factor per category for a revenue pool recycled as equal
/// transfers to deciles `1..=decile_target`.
///
/// `revenue_pool` is in macro-model units (thousand USD).
pub fn income_adjustment_factors(
    survey: &HouseholdSurvey,
    allocation: &DecileExpenditure,
    revenue_pool: f64,
    decile_target: u8,
) -> Result<IncomeAdjustment> {
    check_decile_target(decile_target)?;
    if !revenue_pool.is_finite() {
        return Err(IncidenceError::InvalidInput(format!(
            "revenue pool must be finite, got {revenue_pool}"
        )));
    }
    let per_decile = revenue_pool / decile_target as f64 * USD_PER_MODEL_UNIT;

    let mut result = IncomeAdjustment::default();
    let mut relative_transfers = Vec::with_capacity(survey.len());
    for decile in survey.deciles() {
        let transfer = if decile.decile.is_targeted(decile_target) {
            per_decile
        } else {
            0.0
        };
        let total = allocation.require(decile.decile)?.total();
        let relative = share_of(decile.decile, "allocated expenditure", transfer, total)?;
        result.transfers.insert(decile.decile, transfer);
        relative_transfers.push(relative);
    }

    for category in ExpenditureCategory::ALL {
        let mut factor = 0.0;
        for (decile, relative) in survey.deciles().iter().zip(&relative_transfers) {
            let weight = allocation
                .require(decile.decile)?
                .category(category)
                .share_of_category;
            let response = elastic_response(
                decile_group(category, decile.decile),
                1.0 + relative,
                decile.profile(category).income_elasticity,
            )?;
            factor += weight * response;
        }
        result.factors.insert(category, factor);
    }

    debug!(
        country = survey.country(),
        decile_target, revenue_pool, "computed income adjustment factors"
    );
    Ok(result)
}

pub(crate) fn check_decile_target(decile_target: u8) -> Result<()> {
    if (1..=DECILE_COUNT).contains(&decile_target) {
        Ok(())
    } else {
        Err(IncidenceError::InvalidInput(format!(
            "decile target must be within 1..={DECILE_COUNT}, got {decile_target}"
        )))
    }
}

/// Adjustment factors re-expressed per macro sector.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SectorFactors {
    values: BTreeMap<SectorId, f64>,
}

impl SectorFactors {
    pub fn get(&self, sector: SectorId) -> Option<f64> {
        self.values.get(&sector).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SectorId, f64)> + '_ {
        self.values.iter().map(|(&s, &f)| (s, f))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Σ_sector factor × demand, rescaled to USD.
    pub fn weighted_demand(&self, demand: &DemandVector) -> f64 {
        self.iter()
            .filter_map(|(s, f)| demand.get(s).map(|q| f * q))
            .sum::<f64>()
            * USD_PER_MODEL_UNIT
    }
}

/// Map category factors onto the sectors of the concordance.
///
/// A sector in a split group gets Σ factor(cat) · split(cat) over the
/// group's categories. Any other sector takes the factor of its single
/// category; a sector mapped to several categories outside a split group
/// is a schema mismatch.
pub fn sector_factors(
    concordance: &Concordance,
    factors: &CategoryMap<f64>,
    split: &SplitShares,
) -> Result<SectorFactors> {
    let factor_of = |category: ExpenditureCategory| {
        factors.get(&category).copied().ok_or_else(|| {
            IncidenceError::SchemaMismatch(format!(
                "no adjustment factor for category `{category}`"
            ))
        })
    };

    let mut values = BTreeMap::new();
    for sector in concordance.sector_ids() {
        let value = match split.group_for_sector(sector) {
            Some(group) => {
                let mut combined = 0.0;
                for &category in &group.categories {
                    combined += factor_of(category)? * split.factor(category);
                }
                combined
            }
            None => match concordance.categories(sector).as_slice() {
                [category] => factor_of(*category)?,
                categories => {
                    return Err(IncidenceError::SchemaMismatch(format!(
                        "sector {sector} maps to {} categories but belongs to no split group",
                        categories.len()
                    )))
                }
            },
        };
        values.insert(sector, value);
    }
    Ok(SectorFactors { values })
}

/// Σ_category factor × category demand, USD.
pub fn weighted_category_demand(factors: &CategoryMap<f64>, demand: &CategoryDemand) -> f64 {
    demand
        .iter()
        .filter_map(|(c, q)| factors.get(&c).map(|f| f * q))
        .sum()
}
