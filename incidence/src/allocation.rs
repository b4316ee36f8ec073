//! Distribution of category demand across survey deciles.

use serde::Serialize;
use tracing::debug;

use crate::category::{CategoryMap, ExpenditureCategory};
use crate::demand::CategoryDemand;
use crate::error::{share_of, IncidenceError, Result};
use crate::survey::{Decile, HouseholdSurvey, DECILE_COUNT};

/// One decile's part of one category's demand.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct CategoryAllocation {
    /// Decile's share of the category's survey expenditure.
    pub share_of_category: f64,
    /// Decile's part of the category demand, USD.
    pub total: f64,
    /// `total` per person in the decile, USD.
    pub per_capita: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DecileAllocation {
    pub decile: Decile,
    categories: CategoryMap<CategoryAllocation>,
}

impl DecileAllocation {
    /// Allocation of `category`. Present for every category by construction.
    pub fn category(&self, category: ExpenditureCategory) -> &CategoryAllocation {
        &self.categories[&category]
    }

    pub fn iter(&self) -> impl Iterator<Item = (ExpenditureCategory, &CategoryAllocation)> + '_ {
        self.categories.iter().map(|(&c, a)| (c, a))
    }

    /// Decile total expenditure over all categories, USD.
    pub fn total(&self) -> f64 {
        self.categories.values().map(|a| a.total).sum()
    }

    /// Total expenditure per capita, scaled to macro demand.
    pub fn total_per_capita(&self) -> f64 {
        self.categories.values().map(|a| a.per_capita).sum()
    }
}

/// Category demand allocated to the deciles of one country.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DecileExpenditure {
    country: String,
    population: u64,
    deciles: Vec<DecileAllocation>,
}

impl DecileExpenditure {
    pub fn country(&self) -> &str {
        &self.country
    }

    pub fn population(&self) -> u64 {
        self.population
    }

    /// Population of one decile.
    pub fn decile_population(&self) -> f64 {
        self.population as f64 / DECILE_COUNT as f64
    }

    pub fn deciles(&self) -> &[DecileAllocation] {
        &self.deciles
    }

    pub fn get(&self, decile: Decile) -> Option<&DecileAllocation> {
        self.deciles.iter().find(|d| d.decile == decile)
    }

    pub fn require(&self, decile: Decile) -> Result<&DecileAllocation> {
        self.get(decile).ok_or_else(|| {
            IncidenceError::SchemaMismatch(format!(
                "no allocated expenditure for {decile} in {}",
                self.country
            ))
        })
    }

    /// Σ over deciles of the decile shares of `category`; 1 up to rounding.
    pub fn share_sum(&self, category: ExpenditureCategory) -> f64 {
        self.deciles
            .iter()
            .map(|d| d.category(category).share_of_category)
            .sum()
    }

    /// Σ over deciles of the allocated totals of `category`.
    pub fn category_total(&self, category: ExpenditureCategory) -> f64 {
        self.deciles.iter().map(|d| d.category(category).total).sum()
    }
}

/// Allocate each category's demand to deciles in proportion to their survey
/// expenditure, then express it per capita.
///
/// ```text
/// share(d)      = share_pct(d)/100 · consumption_pc(d) / Σ_d' (same)
/// total(d)      = share(d) · demand(category)
/// per_capita(d) = total(d) · 10 / population
/// ```
pub fn allocate(
    survey: &HouseholdSurvey,
    demand: &CategoryDemand,
    population: u64,
) -> Result<DecileExpenditure> {
    if population == 0 {
        return Err(IncidenceError::InvalidInput(format!(
            "population of {} must be positive",
            survey.country()
        )));
    }
    let decile_population = population as f64 / DECILE_COUNT as f64;

    let mut deciles: Vec<DecileAllocation> = survey
        .deciles()
        .iter()
        .map(|d| DecileAllocation {
            decile: d.decile,
            categories: CategoryMap::new(),
        })
        .collect();

    for category in ExpenditureCategory::ALL {
        let category_demand = demand.require(category)?;
        let survey_total: f64 = survey.deciles().iter().map(|d| d.expenditure(category)).sum();

        for (allocation, decile) in deciles.iter_mut().zip(survey.deciles()) {
            let share = share_of(
                category,
                "survey expenditure",
                decile.expenditure(category),
                survey_total,
            )?;
            let total = share * category_demand;
            allocation.categories.insert(
                category,
                CategoryAllocation {
                    share_of_category: share,
                    total,
                    per_capita: total / decile_population,
                },
            );
        }
    }

    debug!(
        country = survey.country(),
        deciles = deciles.len(),
        population,
        "allocated category demand to deciles"
    );
    Ok(DecileExpenditure {
        country: survey.country().to_string(),
        population,
        deciles,
    })
}
