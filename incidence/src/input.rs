//! Input tables of a run, as delivered by the data layer.
//!
//! A bundle carries every table for any number of countries. Converting it
//! with [`InputBundle::country_inputs`] selects and validates one country.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::IncidenceConfig;
use crate::demand::SplitShares;
use crate::pipeline::{CountryInputs, RevenuePools};
use crate::population::{PopulationRow, PopulationSource, PopulationTable};
use crate::recycling::{GovernmentSpendingRow, InfrastructureFunding, OtherInvestmentRow};
use crate::sector::{Concordance, ConcordanceEntry, MacroDemandRow, MacroPriceRow, SectorVector};
use crate::survey::{HouseholdSurvey, HouseholdSurveyRow};

/// Revenue to recycle for one country, thousand USD.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RevenueRow {
    pub country: String,
    /// Recycled through transfers or income tax cuts.
    pub income: f64,
    /// Recycled through government spending.
    pub government: f64,
}

/// All input tables of a run.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct InputBundle {
    pub survey: Vec<HouseholdSurveyRow>,
    pub concordance: Vec<ConcordanceEntry>,
    pub demand: Vec<MacroDemandRow>,
    pub prices: Vec<MacroPriceRow>,
    pub population: Vec<PopulationRow>,
    #[serde(default)]
    pub revenue: Vec<RevenueRow>,
    #[serde(default)]
    pub government_spending: Vec<GovernmentSpendingRow>,
    #[serde(default)]
    pub other_investment: Vec<OtherInvestmentRow>,
}

impl InputBundle {
    /// Load a bundle from a JSON file.
    pub fn from_json_path(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read input bundle from {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse input bundle from {}", path.display()))
    }

    /// Write the bundle as pretty JSON.
    pub fn to_json_path(&self, path: &Path) -> Result<()> {
        let contents =
            serde_json::to_string_pretty(self).context("Failed to serialize input bundle")?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write input bundle to {}", path.display()))
    }

    /// Countries with survey rows, sorted and deduplicated.
    pub fn countries(&self) -> Vec<String> {
        let mut countries: Vec<_> = self.survey.iter().map(|r| r.country.clone()).collect();
        countries.sort();
        countries.dedup();
        countries
    }

    /// Select and validate the tables of `country`.
    ///
    /// Revenue and infrastructure funding are optional: without them the
    /// recycling stages are skipped.
    pub fn country_inputs(&self, country: &str, config: &IncidenceConfig) -> Result<CountryInputs> {
        let context = || format!("Invalid inputs for {country}");

        let survey = HouseholdSurvey::for_country(&self.survey, country).with_context(context)?;
        let split = SplitShares::from_survey(
            &self.survey,
            &config.split_reference_country,
            &config.split_groups,
        )
        .with_context(|| {
            format!(
                "Failed to derive split shares from reference country {}",
                config.split_reference_country
            )
        })?;
        let demand = SectorVector::demand_for(&self.demand, country).with_context(context)?;
        let prices =
            SectorVector::prices_for(&self.prices, country, config.scenario).with_context(context)?;
        let population = PopulationTable::from(self.population.clone())
            .require(country, config.population_year)
            .with_context(context)?;

        let revenue = self
            .revenue
            .iter()
            .find(|r| r.country == country)
            .map(|r| RevenuePools {
                income: r.income,
                government: r.government,
            });
        let funding = if self.government_spending.is_empty() && self.other_investment.is_empty() {
            None
        } else {
            Some(
                InfrastructureFunding::for_country(
                    &self.government_spending,
                    &self.other_investment,
                    country,
                )
                .with_context(context)?,
            )
        };

        Ok(CountryInputs {
            survey,
            concordance: Concordance::new(self.concordance.iter().copied()),
            demand,
            prices,
            split,
            population,
            revenue,
            funding,
        })
    }
}
