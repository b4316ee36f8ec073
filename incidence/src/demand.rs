//! Household demand per expenditure category.
//!
//! Most macro sectors map to exactly one category. Two groups of sectors
//! feed several categories at once (refined petroleum and coke, and
//! charcoal and firewood). Their demand is split between the member
//! categories with [`SplitShares`], derived from average survey budget
//! shares of a reference country.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::category::{CategoryMap, ExpenditureCategory};
use crate::error::{share_of, IncidenceError, Result};
use crate::sector::{join, Concordance, DemandVector, JoinReport, SectorId};
use crate::survey::{HouseholdSurvey, HouseholdSurveyRow};

/// Macro demand is reported in thousands of USD.
pub const USD_PER_MODEL_UNIT: f64 = 1000.0;

/// Largest accepted deviation from 1 of a group's split shares.
const SPLIT_SUM_TOLERANCE: f64 = 1e-6;

/// A set of sectors shared by several expenditure categories.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitGroup {
    pub name: String,
    pub sectors: BTreeSet<SectorId>,
    pub categories: Vec<ExpenditureCategory>,
}

impl SplitGroup {
    pub fn new(
        name: impl Into<String>,
        sectors: impl IntoIterator<Item = u32>,
        categories: impl IntoIterator<Item = ExpenditureCategory>,
    ) -> Self {
        Self {
            name: name.into(),
            sectors: sectors.into_iter().map(SectorId).collect(),
            categories: categories.into_iter().collect(),
        }
    }

    /// Refined petroleum and coke oven products (sectors 62, 63).
    pub fn petroleum_coke() -> Self {
        use ExpenditureCategory::*;
        Self::new("petroleum_coke", [62, 63], [Diesel, Ethanol, Gasoline, Kerosene, Lpg])
    }

    /// Charcoal and firewood (sector 21).
    pub fn charcoal_firewood() -> Self {
        use ExpenditureCategory::*;
        Self::new("charcoal_firewood", [21], [Charcoal, Firewood])
    }

    /// The two groups known to the macro model's sector classification.
    pub fn defaults() -> Vec<Self> {
        vec![Self::petroleum_coke(), Self::charcoal_firewood()]
    }

    /// Check that every group is non-empty and no sector or category is
    /// claimed by two groups.
    pub fn validate_all(groups: &[SplitGroup]) -> Result<()> {
        let mut sectors = BTreeSet::new();
        let mut categories = BTreeSet::new();
        for group in groups {
            if group.sectors.is_empty() || group.categories.is_empty() {
                return Err(IncidenceError::InvalidInput(format!(
                    "split group `{}` needs at least one sector and one category",
                    group.name
                )));
            }
            if let Some(s) = group.sectors.iter().find(|s| !sectors.insert(**s)) {
                return Err(IncidenceError::InvalidInput(format!(
                    "sector {s} belongs to more than one split group"
                )));
            }
            if let Some(c) = group.categories.iter().find(|c| !categories.insert(**c)) {
                return Err(IncidenceError::InvalidInput(format!(
                    "category `{c}` belongs to more than one split group"
                )));
            }
        }
        Ok(())
    }
}

/// Share of each split-group category in its group's demand.
///
/// Categories outside every group have an implicit share of 1.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SplitShares {
    shares: CategoryMap<f64>,
    groups: Vec<SplitGroup>,
}

impl SplitShares {
    /// Derive split shares from the survey rows of `reference_country`.
    pub fn from_survey(
        rows: &[HouseholdSurveyRow],
        reference_country: &str,
        groups: &[SplitGroup],
    ) -> Result<Self> {
        let reference = HouseholdSurvey::for_country(rows, reference_country)?;
        Self::from_reference(&reference, groups)
    }

    /// Derive split shares from an already validated reference survey.
    ///
    /// Each category's share is its average budget share divided by the sum
    /// of the average budget shares of its group.
    pub fn from_reference(reference: &HouseholdSurvey, groups: &[SplitGroup]) -> Result<Self> {
        SplitGroup::validate_all(groups)?;
        let mut shares = CategoryMap::new();
        for group in groups {
            let averages: Vec<_> = group
                .categories
                .iter()
                .map(|&c| (c, reference.average_share_pct(c)))
                .collect();
            let total: f64 = averages.iter().map(|(_, a)| a).sum();
            for (category, average) in averages {
                let share = share_of(&group.name, "average budget share", average, total)?;
                shares.insert(category, share);
            }
        }
        debug!(
            reference = reference.country(),
            groups = groups.len(),
            "derived split shares"
        );
        Ok(Self {
            shares,
            groups: groups.to_vec(),
        })
    }

    /// Split shares given directly.
    ///
    /// Every category of every group needs a finite, non-negative share, and
    /// the shares of a group must sum to 1.
    pub fn from_values(
        groups: Vec<SplitGroup>,
        shares: impl IntoIterator<Item = (ExpenditureCategory, f64)>,
    ) -> Result<Self> {
        SplitGroup::validate_all(&groups)?;
        let shares: CategoryMap<f64> = shares.into_iter().collect();

        if let Some(category) = shares
            .keys()
            .find(|c| !groups.iter().any(|g| g.categories.contains(*c)))
        {
            return Err(IncidenceError::InvalidInput(format!(
                "split share given for `{category}`, which belongs to no split group"
            )));
        }
        for group in &groups {
            let mut total = 0.0;
            for category in &group.categories {
                let share = shares.get(category).copied().ok_or_else(|| {
                    IncidenceError::InvalidInput(format!(
                        "split group `{}` has no share for `{category}`",
                        group.name
                    ))
                })?;
                if !(share.is_finite() && share >= 0.0) {
                    return Err(IncidenceError::InvalidInput(format!(
                        "split share of `{category}` must be finite and non-negative, got {share}"
                    )));
                }
                total += share;
            }
            if (total - 1.0).abs() > SPLIT_SUM_TOLERANCE {
                return Err(IncidenceError::InvalidInput(format!(
                    "split shares of group `{}` sum to {total}, not 1",
                    group.name
                )));
            }
        }

        Ok(Self { shares, groups })
    }

    /// Multiplier applied to the category's joined demand.
    pub fn factor(&self, category: ExpenditureCategory) -> f64 {
        self.shares.get(&category).copied().unwrap_or(1.0)
    }

    pub fn groups(&self) -> &[SplitGroup] {
        &self.groups
    }

    pub fn group_for_sector(&self, sector: SectorId) -> Option<&SplitGroup> {
        self.groups.iter().find(|g| g.sectors.contains(&sector))
    }
}

/// Household demand per category, in USD.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryDemand {
    values: CategoryMap<f64>,
    pub report: JoinReport,
}

impl CategoryDemand {
    /// Category demand given directly, already in USD.
    pub fn from_values(values: impl IntoIterator<Item = (ExpenditureCategory, f64)>) -> Self {
        Self {
            values: values.into_iter().collect(),
            report: JoinReport::default(),
        }
    }

    pub fn get(&self, category: ExpenditureCategory) -> Option<f64> {
        self.values.get(&category).copied()
    }

    pub fn require(&self, category: ExpenditureCategory) -> Result<f64> {
        self.get(category).ok_or_else(|| {
            IncidenceError::SchemaMismatch(format!("no household demand for category `{category}`"))
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (ExpenditureCategory, f64)> + '_ {
        self.values.iter().map(|(&c, &v)| (c, v))
    }

    /// Total demand over all categories, USD.
    pub fn total(&self) -> f64 {
        self.values.values().sum()
    }

    /// Total demand in macro-model units.
    pub fn total_model_units(&self) -> f64 {
        self.total() / USD_PER_MODEL_UNIT
    }
}

/// Sum macro demand per category, apply split shares and rescale to USD.
pub fn category_demand(
    concordance: &Concordance,
    demand: &DemandVector,
    split: &SplitShares,
) -> Result<CategoryDemand> {
    demand.validate_demand()?;
    let (rows, report) = join(concordance, demand);
    report.log("category demand");

    let mut summed: CategoryMap<f64> = BTreeMap::new();
    for (category, _, q) in rows {
        *summed.entry(category).or_default() += q;
    }

    let values = summed
        .into_iter()
        .map(|(c, q)| (c, q * split.factor(c) * USD_PER_MODEL_UNIT))
        .collect();
    Ok(CategoryDemand { values, report })
}
