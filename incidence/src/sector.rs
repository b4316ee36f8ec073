//! Macro-model sectors, the sector/category concordance and sector vectors.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::category::ExpenditureCategory;
use crate::error::{IncidenceError, Result};

/// Identifier of a macro-model (GLORIA) sector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SectorId(pub u32);

impl SectorId {
    /// Create a new sector ID.
    pub fn new(id: u32) -> Self {
        Self(id)
    }
}

impl fmt::Display for SectorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One row of the exploded concordance table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConcordanceEntry {
    /// Household expenditure category.
    pub category: ExpenditureCategory,
    /// Macro-model sector mapped into the category.
    pub sector: SectorId,
}

impl ConcordanceEntry {
    pub fn new(category: ExpenditureCategory, sector: u32) -> Self {
        Self {
            category,
            sector: SectorId(sector),
        }
    }
}

/// Mapping between macro sectors and expenditure categories.
///
/// Entries are kept sorted by sector and free of duplicates.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<ConcordanceEntry>", into = "Vec<ConcordanceEntry>")]
pub struct Concordance {
    entries: Vec<ConcordanceEntry>,
}

impl Concordance {
    /// Build a concordance, dropping duplicate pairs.
    pub fn new(entries: impl IntoIterator<Item = ConcordanceEntry>) -> Self {
        let mut entries: Vec<_> = entries.into_iter().collect();
        let before = entries.len();
        entries.sort_by_key(|e| (e.sector, e.category));
        entries.dedup();
        if entries.len() < before {
            debug!(
                dropped = before - entries.len(),
                "removed duplicate concordance entries"
            );
        }
        Self { entries }
    }

    /// Build a concordance from `(category code, sector)` rows.
    pub fn from_codes<S: AsRef<str>>(rows: impl IntoIterator<Item = (S, u32)>) -> Result<Self> {
        let entries = rows
            .into_iter()
            .map(|(code, sector)| Ok(ConcordanceEntry::new(code.as_ref().parse()?, sector)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(entries))
    }

    pub fn entries(&self) -> &[ConcordanceEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sectors mapped into `category`.
    pub fn sectors(&self, category: ExpenditureCategory) -> impl Iterator<Item = SectorId> + '_ {
        self.entries
            .iter()
            .filter(move |e| e.category == category)
            .map(|e| e.sector)
    }

    /// Categories a sector is mapped into.
    pub fn categories(&self, sector: SectorId) -> Vec<ExpenditureCategory> {
        self.entries
            .iter()
            .filter(|e| e.sector == sector)
            .map(|e| e.category)
            .collect()
    }

    /// Every sector that appears in the table.
    pub fn sector_ids(&self) -> BTreeSet<SectorId> {
        self.entries.iter().map(|e| e.sector).collect()
    }
}

impl From<Vec<ConcordanceEntry>> for Concordance {
    fn from(entries: Vec<ConcordanceEntry>) -> Self {
        Self::new(entries)
    }
}

impl From<Concordance> for Vec<ConcordanceEntry> {
    fn from(concordance: Concordance) -> Self {
        concordance.entries
    }
}

/// Values per sector for one country: final household demand or price change.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SectorVector {
    values: BTreeMap<SectorId, f64>,
}

/// Final household demand per sector, in model units (thousand USD).
pub type DemandVector = SectorVector;

/// Fractional price change per sector.
pub type PriceVector = SectorVector;

impl SectorVector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(sector, value)` pairs. Later pairs overwrite earlier ones.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (u32, f64)>) -> Self {
        Self {
            values: pairs.into_iter().map(|(s, v)| (SectorId(s), v)).collect(),
        }
    }

    /// Household demand of one country from macro output rows.
    ///
    /// Fails if the country has no rows, a sector repeats, or a demand is
    /// negative or not finite.
    pub fn demand_for(rows: &[MacroDemandRow], country: &str) -> Result<DemandVector> {
        let vector = Self::collect_country(
            rows.iter()
                .filter(|r| r.country == country)
                .map(|r| (r.sector, r.demand)),
            "macro demand",
            country,
        )?;
        vector.validate_demand()?;
        Ok(vector)
    }

    /// Price changes of one country under `scenario` from macro price rows.
    pub fn prices_for(
        rows: &[MacroPriceRow],
        country: &str,
        scenario: PriceScenario,
    ) -> Result<PriceVector> {
        let mut selected = Vec::new();
        for row in rows.iter().filter(|r| r.country == country) {
            let delta = row.delta(scenario).ok_or_else(|| {
                IncidenceError::SchemaMismatch(format!(
                    "price row for sector {} in {country} has no `{scenario}` scenario",
                    row.sector
                ))
            })?;
            selected.push((row.sector, delta));
        }
        let vector = Self::collect_country(selected.into_iter(), "macro price", country)?;
        vector.validate_prices()?;
        Ok(vector)
    }

    pub(crate) fn collect_country(
        pairs: impl Iterator<Item = (SectorId, f64)>,
        what: &str,
        country: &str,
    ) -> Result<Self> {
        let mut values = BTreeMap::new();
        for (sector, value) in pairs {
            if values.insert(sector, value).is_some() {
                return Err(IncidenceError::SchemaMismatch(format!(
                    "duplicate {what} row for sector {sector} in {country}"
                )));
            }
        }
        if values.is_empty() {
            return Err(IncidenceError::SchemaMismatch(format!(
                "no {what} rows for country {country}"
            )));
        }
        Ok(Self { values })
    }

    /// Check every value is finite and non-negative.
    pub fn validate_demand(&self) -> Result<()> {
        match self.values.iter().find(|(_, v)| !(v.is_finite() && **v >= 0.0)) {
            Some((sector, v)) => Err(IncidenceError::InvalidInput(format!(
                "demand for sector {sector} must be finite and non-negative, got {v}"
            ))),
            None => Ok(()),
        }
    }

    /// Check every value is finite.
    pub fn validate_prices(&self) -> Result<()> {
        match self.values.iter().find(|(_, v)| !v.is_finite()) {
            Some((sector, v)) => Err(IncidenceError::InvalidInput(format!(
                "price change for sector {sector} must be finite, got {v}"
            ))),
            None => Ok(()),
        }
    }

    pub fn get(&self, sector: SectorId) -> Option<f64> {
        self.values.get(&sector).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SectorId, f64)> + '_ {
        self.values.iter().map(|(&k, &v)| (k, v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Sum over all sectors.
    pub fn total(&self) -> f64 {
        self.values.values().sum()
    }

    /// Σ self(s) × other(s) over sectors present in both.
    pub fn dot(&self, other: &SectorVector) -> f64 {
        self.iter()
            .filter_map(|(s, v)| other.get(s).map(|w| v * w))
            .sum()
    }
}

/// Which macro-model price column to use.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum PriceScenario {
    /// Tax only.
    #[default]
    Base,
    /// Tax with technology response.
    Technology,
    /// Tax with trade response.
    Trade,
}

impl fmt::Display for PriceScenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Base => "base",
            Self::Technology => "technology",
            Self::Trade => "trade",
        })
    }
}

/// One row of the macro-model household demand output.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MacroDemandRow {
    pub country: String,
    pub sector: SectorId,
    /// Final household demand (`q_hh_base`), thousand USD.
    pub demand: f64,
}

/// One row of the macro-model price output.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MacroPriceRow {
    pub country: String,
    pub sector: SectorId,
    #[serde(rename = "delta_p_base")]
    pub base: f64,
    #[serde(rename = "delta_p_techn", default, skip_serializing_if = "Option::is_none")]
    pub technology: Option<f64>,
    #[serde(rename = "delta_p_trade", default, skip_serializing_if = "Option::is_none")]
    pub trade: Option<f64>,
}

impl MacroPriceRow {
    /// The price change under `scenario`, if the row carries it.
    pub fn delta(&self, scenario: PriceScenario) -> Option<f64> {
        match scenario {
            PriceScenario::Base => Some(self.base),
            PriceScenario::Technology => self.technology,
            PriceScenario::Trade => self.trade,
        }
    }
}

/// Keys dropped by an inner join between the concordance and a sector vector.
///
/// Dropping is the accepted behavior; this makes it observable.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinReport {
    /// Concordance sectors with no value in the vector.
    pub missing_values: BTreeSet<SectorId>,
    /// Vector sectors with no concordance entry.
    pub unmapped_sectors: BTreeSet<SectorId>,
}

impl JoinReport {
    /// Total number of dropped keys.
    pub fn dropped(&self) -> usize {
        self.missing_values.len() + self.unmapped_sectors.len()
    }

    pub fn is_clean(&self) -> bool {
        self.dropped() == 0
    }

    pub(crate) fn log(&self, stage: &str) {
        if !self.is_clean() {
            warn!(
                stage,
                missing_values = self.missing_values.len(),
                unmapped_sectors = self.unmapped_sectors.len(),
                "inner join dropped sector keys: missing {:?}, unmapped {:?}",
                self.missing_values,
                self.unmapped_sectors,
            );
        }
    }
}

/// Inner-join the concordance with a sector vector.
///
/// Returns one `(category, sector, value)` triple per matched concordance
/// entry and the report of dropped keys.
pub(crate) fn join(
    concordance: &Concordance,
    vector: &SectorVector,
) -> (Vec<(ExpenditureCategory, SectorId, f64)>, JoinReport) {
    let mut report = JoinReport::default();
    let mut rows = Vec::with_capacity(concordance.len());

    for entry in concordance.entries() {
        match vector.get(entry.sector) {
            Some(value) => rows.push((entry.category, entry.sector, value)),
            None => {
                report.missing_values.insert(entry.sector);
            }
        }
    }

    let mapped = concordance.sector_ids();
    report.unmapped_sectors = vector
        .iter()
        .map(|(s, _)| s)
        .filter(|s| !mapped.contains(s))
        .collect();

    (rows, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::ExpenditureCategory::*;
    use assert_matches::assert_matches;

    fn concordance() -> Concordance {
        Concordance::new(vec![
            ConcordanceEntry::new(Food, 5),
            ConcordanceEntry::new(Food, 12),
            ConcordanceEntry::new(Clothing, 57),
            ConcordanceEntry::new(Food, 5),
        ])
    }

    #[test]
    fn test_concordance_dedup_and_lookup() {
        let c = concordance();
        assert_eq!(c.len(), 3);
        assert_eq!(c.sectors(Food).collect::<Vec<_>>(), vec![SectorId(5), SectorId(12)]);
        assert_eq!(c.categories(SectorId(57)), vec![Clothing]);
        assert!(c.categories(SectorId(99)).is_empty());
    }

    #[test]
    fn test_concordance_from_codes() {
        let c = Concordance::from_codes(vec![("food", 5), ("transp_pub", 101)]).unwrap();
        assert_eq!(c.categories(SectorId(101)), vec![PublicTransport]);

        assert_matches!(
            Concordance::from_codes(vec![("foods", 5)]),
            Err(IncidenceError::UnknownCategory(_))
        );
    }

    #[test]
    fn test_join_reports_dropped_keys() {
        let demand = SectorVector::from_pairs(vec![(5, 1.0), (57, 2.0), (200, 3.0)]);
        let (rows, report) = join(&concordance(), &demand);

        assert_eq!(rows.len(), 2);
        assert_eq!(report.missing_values, BTreeSet::from([SectorId(12)]));
        assert_eq!(report.unmapped_sectors, BTreeSet::from([SectorId(200)]));
        assert_eq!(report.dropped(), 2);
        assert!(!report.is_clean());
    }

    fn demand_row(country: &str, sector: u32, demand: f64) -> MacroDemandRow {
        MacroDemandRow {
            country: country.into(),
            sector: SectorId(sector),
            demand,
        }
    }

    #[test]
    fn test_demand_for_country() {
        let rows = vec![
            demand_row("BGR", 5, 10.0),
            demand_row("ROU", 5, 99.0),
            demand_row("BGR", 12, 20.0),
        ];
        let demand = SectorVector::demand_for(&rows, "BGR").unwrap();
        assert_eq!(demand.len(), 2);
        assert_eq!(demand.total(), 30.0);

        assert_matches!(
            SectorVector::demand_for(&rows, "DEU"),
            Err(IncidenceError::SchemaMismatch(_))
        );
    }

    #[test]
    fn test_demand_rejects_negative_and_duplicates() {
        let negative = vec![demand_row("BGR", 5, -1.0)];
        assert_matches!(
            SectorVector::demand_for(&negative, "BGR"),
            Err(IncidenceError::InvalidInput(_))
        );

        let duplicate = vec![demand_row("BGR", 5, 1.0), demand_row("BGR", 5, 2.0)];
        assert_matches!(
            SectorVector::demand_for(&duplicate, "BGR"),
            Err(IncidenceError::SchemaMismatch(_))
        );
    }

    #[test]
    fn test_prices_for_scenario() {
        let rows = vec![MacroPriceRow {
            country: "BGR".into(),
            sector: SectorId(5),
            base: 0.01,
            technology: Some(0.02),
            trade: None,
        }];
        let base = SectorVector::prices_for(&rows, "BGR", PriceScenario::Base).unwrap();
        assert_eq!(base.get(SectorId(5)), Some(0.01));
        let techn = SectorVector::prices_for(&rows, "BGR", PriceScenario::Technology).unwrap();
        assert_eq!(techn.get(SectorId(5)), Some(0.02));
        assert_matches!(
            SectorVector::prices_for(&rows, "BGR", PriceScenario::Trade),
            Err(IncidenceError::SchemaMismatch(_))
        );
    }

    #[test]
    fn test_price_row_serde_names() {
        let row: MacroPriceRow = serde_json::from_str(
            r#"{"country":"BGR","sector":62,"delta_p_base":-0.05,"delta_p_trade":0.01}"#,
        )
        .unwrap();
        assert_eq!(row.sector, SectorId(62));
        assert_eq!(row.delta(PriceScenario::Trade), Some(0.01));
        assert_eq!(row.delta(PriceScenario::Technology), None);
    }

    #[test]
    fn test_dot() {
        let a = SectorVector::from_pairs(vec![(1, 2.0), (2, 3.0)]);
        let b = SectorVector::from_pairs(vec![(2, 0.5), (3, 10.0)]);
        assert_eq!(a.dot(&b), 1.5);
    }
}
