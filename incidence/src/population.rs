//! Population lookup by country and year.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{IncidenceError, Result};

/// Source of official population figures.
pub trait PopulationSource {
    /// Population of `country` (ISO3) in `year`, if known.
    fn population(&self, country: &str, year: u16) -> Option<u64>;

    /// Population of `country` in `year`, failing if unknown or zero.
    fn require(&self, country: &str, year: u16) -> Result<u64> {
        match self.population(country, year) {
            Some(0) => Err(IncidenceError::InvalidInput(format!(
                "population of {country} in {year} is zero"
            ))),
            Some(p) => Ok(p),
            None => Err(IncidenceError::SchemaMismatch(format!(
                "no population figure for {country} in {year}"
            ))),
        }
    }
}

/// One row of a population table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopulationRow {
    pub country: String,
    pub year: u16,
    pub population: u64,
}

/// In-memory population table.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<PopulationRow>", into = "Vec<PopulationRow>")]
pub struct PopulationTable {
    figures: BTreeMap<(String, u16), u64>,
}

impl PopulationTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, country: impl Into<String>, year: u16, population: u64) {
        self.figures.insert((country.into(), year), population);
    }

    pub fn len(&self) -> usize {
        self.figures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.figures.is_empty()
    }
}

impl PopulationSource for PopulationTable {
    fn population(&self, country: &str, year: u16) -> Option<u64> {
        self.figures.get(&(country.to_string(), year)).copied()
    }
}

impl<F> PopulationSource for F
where
    F: Fn(&str, u16) -> Option<u64>,
{
    fn population(&self, country: &str, year: u16) -> Option<u64> {
        self(country, year)
    }
}

impl From<Vec<PopulationRow>> for PopulationTable {
    fn from(rows: Vec<PopulationRow>) -> Self {
        let mut table = Self::new();
        for row in rows {
            table.insert(row.country, row.year, row.population);
        }
        table
    }
}

impl From<PopulationTable> for Vec<PopulationRow> {
    fn from(table: PopulationTable) -> Self {
        table
            .figures
            .into_iter()
            .map(|((country, year), population)| PopulationRow {
                country,
                year,
                population,
            })
            .collect()
    }
}
