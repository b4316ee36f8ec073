//! Household survey microdata: one row per (country, expenditure decile).

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::category::{CategoryMap, ExpenditureCategory, InfrastructureCategory};
use crate::error::{IncidenceError, Result};

/// Decile code used by the survey for households that are not classified.
pub const UNCLASSIFIED_DECILE: u16 = 9999;

/// Number of expenditure deciles; each holds a tenth of the population.
pub const DECILE_COUNT: u8 = 10;

/// A validated expenditure decile, 1 (poorest) to 10 (richest).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct Decile(u8);

impl Decile {
    pub fn new(raw: u16) -> Result<Self> {
        if (1..=DECILE_COUNT as u16).contains(&raw) {
            Ok(Self(raw as u8))
        } else {
            Err(IncidenceError::InvalidInput(format!(
                "decile must be within 1..={DECILE_COUNT}, got {raw}"
            )))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// Whether the decile receives a transfer targeted at deciles `1..=target`.
    pub fn is_targeted(self, target: u8) -> bool {
        self.0 <= target
    }
}

impl TryFrom<u16> for Decile {
    type Error = IncidenceError;

    fn try_from(raw: u16) -> Result<Self> {
        Self::new(raw)
    }
}

impl From<Decile> for u16 {
    fn from(decile: Decile) -> Self {
        decile.0 as u16
    }
}

impl fmt::Display for Decile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "decile {}", self.0)
    }
}

/// Survey figures of one decile for one expenditure category.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CategoryProfile {
    /// Budget share of the category, in percent of total consumption.
    #[serde(rename = "share")]
    pub expenditure_share_pct: f64,
    /// Own-price elasticity of demand.
    #[serde(rename = "elasticity_price")]
    pub price_elasticity: f64,
    /// Income elasticity of demand.
    #[serde(rename = "elasticity_income")]
    pub income_elasticity: f64,
}

impl CategoryProfile {
    pub fn new(expenditure_share_pct: f64, price_elasticity: f64, income_elasticity: f64) -> Self {
        Self {
            expenditure_share_pct,
            price_elasticity,
            income_elasticity,
        }
    }
}

/// Raw survey row as delivered by the data layer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HouseholdSurveyRow {
    /// ISO3 country code.
    #[serde(rename = "iso3")]
    pub country: String,
    /// Decile code; [`UNCLASSIFIED_DECILE`] rows are skipped.
    #[serde(rename = "quant_cons")]
    pub decile: u16,
    /// Total consumption per capita (survey currency, rent-adjusted).
    #[serde(rename = "cons_pc_acrent")]
    pub consumption_per_capita: f64,
    pub categories: CategoryMap<CategoryProfile>,
    /// Share of the decile with access to each infrastructure type, percent.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub infrastructure_access: BTreeMap<InfrastructureCategory, f64>,
}

/// One validated decile of a country survey.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SurveyDecile {
    pub decile: Decile,
    pub consumption_per_capita: f64,
    categories: CategoryMap<CategoryProfile>,
    infrastructure_access: BTreeMap<InfrastructureCategory, f64>,
}

impl SurveyDecile {
    /// Survey profile of `category`. Present for every category by construction.
    pub fn profile(&self, category: ExpenditureCategory) -> &CategoryProfile {
        &self.categories[&category]
    }

    /// Pre-policy consumption per capita on `category`:
    /// budget share × total consumption per capita.
    pub fn expenditure(&self, category: ExpenditureCategory) -> f64 {
        self.profile(category).expenditure_share_pct / 100.0 * self.consumption_per_capita
    }

    /// Share of the decile with access to `infra`, percent.
    pub fn access_share_pct(&self, infra: InfrastructureCategory) -> Result<f64> {
        self.infrastructure_access.get(&infra).copied().ok_or_else(|| {
            IncidenceError::SchemaMismatch(format!(
                "{} has no access share for infrastructure `{infra}`",
                self.decile
            ))
        })
    }
}

/// Survey of one country, validated and ordered by decile.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HouseholdSurvey {
    country: String,
    deciles: Vec<SurveyDecile>,
}

impl HouseholdSurvey {
    /// Select and validate the rows of `country`.
    ///
    /// Unclassified rows are skipped. Every remaining row must carry a valid,
    /// unique decile, all expenditure categories, and finite non-negative
    /// consumption and budget shares.
    pub fn for_country(rows: &[HouseholdSurveyRow], country: &str) -> Result<Self> {
        let mut deciles: Vec<SurveyDecile> = Vec::new();
        let mut skipped = 0usize;

        for row in rows.iter().filter(|r| r.country == country) {
            if row.decile == UNCLASSIFIED_DECILE {
                skipped += 1;
                continue;
            }
            let decile = Decile::new(row.decile)?;
            if deciles.iter().any(|d| d.decile == decile) {
                return Err(IncidenceError::SchemaMismatch(format!(
                    "duplicate survey row for {decile} in {country}"
                )));
            }
            Self::validate_row(row, decile)?;
            deciles.push(SurveyDecile {
                decile,
                consumption_per_capita: row.consumption_per_capita,
                categories: row.categories.clone(),
                infrastructure_access: row.infrastructure_access.clone(),
            });
        }

        if deciles.is_empty() {
            return Err(IncidenceError::SchemaMismatch(format!(
                "no classified survey rows for country {country}"
            )));
        }
        if skipped > 0 {
            debug!(country, skipped, "skipped unclassified survey rows");
        }

        deciles.sort_by_key(|d| d.decile);
        Ok(Self {
            country: country.to_string(),
            deciles,
        })
    }

    fn validate_row(row: &HouseholdSurveyRow, decile: Decile) -> Result<()> {
        let country = &row.country;
        if !(row.consumption_per_capita.is_finite() && row.consumption_per_capita >= 0.0) {
            return Err(IncidenceError::InvalidInput(format!(
                "consumption per capita of {decile} in {country} must be finite and non-negative"
            )));
        }
        for category in ExpenditureCategory::ALL {
            let profile = row.categories.get(&category).ok_or_else(|| {
                IncidenceError::SchemaMismatch(format!(
                    "survey row for {decile} in {country} lacks category `{category}`"
                ))
            })?;
            let share = profile.expenditure_share_pct;
            if !(share.is_finite() && share >= 0.0) {
                return Err(IncidenceError::InvalidInput(format!(
                    "budget share of `{category}` for {decile} in {country} \
                     must be finite and non-negative"
                )));
            }
            if !(profile.price_elasticity.is_finite() && profile.income_elasticity.is_finite()) {
                return Err(IncidenceError::InvalidInput(format!(
                    "elasticities of `{category}` for {decile} in {country} must be finite"
                )));
            }
        }
        for (infra, access) in &row.infrastructure_access {
            if !(0.0..=100.0).contains(access) {
                return Err(IncidenceError::InvalidInput(format!(
                    "access share of `{infra}` for {decile} in {country} must be within 0..=100"
                )));
            }
        }
        Ok(())
    }

    pub fn country(&self) -> &str {
        &self.country
    }

    pub fn deciles(&self) -> &[SurveyDecile] {
        &self.deciles
    }

    pub fn len(&self) -> usize {
        self.deciles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deciles.is_empty()
    }

    /// Budget share of `category` averaged over all deciles (average household).
    pub fn average_share_pct(&self, category: ExpenditureCategory) -> f64 {
        let total: f64 = self
            .deciles
            .iter()
            .map(|d| d.profile(category).expenditure_share_pct)
            .sum();
        total / self.deciles.len() as f64
    }

    /// Average total consumption per capita over deciles.
    pub fn average_consumption(&self) -> f64 {
        let total: f64 = self.deciles.iter().map(|d| d.consumption_per_capita).sum();
        total / self.deciles.len() as f64
    }
}
