//! Sector shares of category demand and category price changes.
//!
//! A category price change is the demand-weighted mean of the price changes
//! of the macro sectors mapped into it:
//!
//! ```text
//! share(s)  = q(s) / Σ_{s' ∈ category} q(s')
//! Δp(cat)   = Σ_{s ∈ category} share(s) · Δp(s)
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::category::{CategoryMap, ExpenditureCategory};
use crate::error::{share_of, IncidenceError, Result};
use crate::sector::{join, Concordance, DemandVector, JoinReport, PriceVector, SectorId};

/// Share of each sector in the household demand of its category.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SectorShares {
    shares: CategoryMap<BTreeMap<SectorId, f64>>,
    /// Keys dropped while joining the concordance with the demand vector.
    pub report: JoinReport,
}

impl SectorShares {
    /// Share of `sector` within `category`, if the pair was joined.
    pub fn get(&self, category: ExpenditureCategory, sector: SectorId) -> Option<f64> {
        self.shares.get(&category)?.get(&sector).copied()
    }

    /// Sector shares of one category.
    pub fn category(&self, category: ExpenditureCategory) -> Option<&BTreeMap<SectorId, f64>> {
        self.shares.get(&category)
    }

    /// Categories with at least one joined sector.
    pub fn categories(&self) -> impl Iterator<Item = ExpenditureCategory> + '_ {
        self.shares.keys().copied()
    }

    /// Sum of the shares of `category`; 1 up to rounding.
    pub fn sum(&self, category: ExpenditureCategory) -> f64 {
        self.shares
            .get(&category)
            .map(|s| s.values().sum())
            .unwrap_or(0.0)
    }

    pub fn iter(
        &self,
    ) -> impl Iterator<Item = (ExpenditureCategory, &BTreeMap<SectorId, f64>)> + '_ {
        self.shares.iter().map(|(&c, s)| (c, s))
    }
}

/// Compute the share of every sector in its category's household demand.
///
/// Fails with [`IncidenceError::EmptyAggregationGroup`] if a joined category
/// has zero total demand.
pub fn sector_shares(concordance: &Concordance, demand: &DemandVector) -> Result<SectorShares> {
    demand.validate_demand()?;
    let (rows, report) = join(concordance, demand);
    report.log("sector shares");

    let mut grouped: CategoryMap<BTreeMap<SectorId, f64>> = BTreeMap::new();
    for (category, sector, q) in rows {
        grouped.entry(category).or_default().insert(sector, q);
    }

    let mut shares = CategoryMap::new();
    for (category, sectors) in grouped {
        let total: f64 = sectors.values().sum();
        let mut category_shares = BTreeMap::new();
        for (sector, q) in sectors {
            category_shares.insert(sector, share_of(category, "household demand", q, total)?);
        }
        shares.insert(category, category_shares);
    }

    debug!(categories = shares.len(), "computed sector shares");
    Ok(SectorShares { shares, report })
}

/// Price change per expenditure category.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceChanges {
    values: CategoryMap<f64>,
    /// `missing_values`: share sectors without a price (dropped, so the
    /// category is underweighted). `unmapped_sectors`: priced sectors with no share.
    pub report: JoinReport,
}

impl PriceChanges {
    /// Price changes given directly per category.
    pub fn from_values(values: impl IntoIterator<Item = (ExpenditureCategory, f64)>) -> Self {
        Self {
            values: values.into_iter().collect(),
            report: JoinReport::default(),
        }
    }

    pub fn get(&self, category: ExpenditureCategory) -> Option<f64> {
        self.values.get(&category).copied()
    }

    /// Price change of `category`, failing if it was never computed.
    pub fn require(&self, category: ExpenditureCategory) -> Result<f64> {
        self.get(category).ok_or_else(|| {
            IncidenceError::SchemaMismatch(format!("no price change for category `{category}`"))
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (ExpenditureCategory, f64)> + '_ {
        self.values.iter().map(|(&c, &v)| (c, v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Weight sector price changes by sector shares into category price changes.
pub fn price_changes(shares: &SectorShares, prices: &PriceVector) -> Result<PriceChanges> {
    prices.validate_prices()?;
    let mut report = JoinReport::default();
    let mut values = CategoryMap::new();

    for (category, sectors) in shares.iter() {
        let mut delta = 0.0;
        for (&sector, &share) in sectors {
            match prices.get(sector) {
                Some(dp) => delta += share * dp,
                None => {
                    report.missing_values.insert(sector);
                }
            }
        }
        values.insert(category, delta);
    }

    report.unmapped_sectors = prices
        .iter()
        .map(|(s, _)| s)
        .filter(|&s| !shares.iter().any(|(_, sectors)| sectors.contains_key(&s)))
        .collect();

    if !report.missing_values.is_empty() {
        warn!(
            sectors = ?report.missing_values,
            "sectors without a price change were dropped; their categories are underweighted"
        );
    }
    report.log("price changes");

    Ok(PriceChanges { values, report })
}

/// Sector shares followed by price aggregation.
pub fn category_price_changes(
    concordance: &Concordance,
    demand: &DemandVector,
    prices: &PriceVector,
) -> Result<PriceChanges> {
    let shares = sector_shares(concordance, demand)?;
    price_changes(&shares, prices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::ExpenditureCategory::*;
    use crate::sector::{ConcordanceEntry, SectorVector};
    use assert_matches::assert_matches;

    fn food_concordance() -> Concordance {
        Concordance::new(vec![
            ConcordanceEntry::new(Food, 5),
            ConcordanceEntry::new(Food, 12),
            ConcordanceEntry::new(Food, 47),
        ])
    }

    #[test]
    fn test_food_shares_and_price() {
        let demand = SectorVector::from_pairs(vec![(5, 100.0), (12, 200.0), (47, 300.0)]);
        let shares = sector_shares(&food_concordance(), &demand).unwrap();

        assert!((shares.get(Food, SectorId(5)).unwrap() - 1.0 / 6.0).abs() < 1e-12);
        assert!((shares.get(Food, SectorId(12)).unwrap() - 2.0 / 6.0).abs() < 1e-12);
        assert!((shares.get(Food, SectorId(47)).unwrap() - 3.0 / 6.0).abs() < 1e-12);
        assert!(shares.report.is_clean());

        let prices = SectorVector::from_pairs(vec![(5, 0.01), (12, 0.02), (47, 0.03)]);
        let dp = price_changes(&shares, &prices).unwrap();
        let expected = 1.0 / 6.0 * 0.01 + 2.0 / 6.0 * 0.02 + 3.0 / 6.0 * 0.03;
        assert!((dp.require(Food).unwrap() - expected).abs() < 1e-12);
        assert!((dp.require(Food).unwrap() - 0.023333).abs() < 1e-6);
    }

    #[test]
    fn test_shares_sum_to_one() {
        let concordance = Concordance::new(vec![
            ConcordanceEntry::new(Paper, 59),
            ConcordanceEntry::new(Paper, 60),
            ConcordanceEntry::new(Paper, 61),
            ConcordanceEntry::new(Clothing, 57),
        ]);
        let demand = SectorVector::from_pairs(vec![
            (59, 376850.5723),
            (60, 556864.9243),
            (61, 340833.4062),
            (57, 12.0),
        ]);
        let shares = sector_shares(&concordance, &demand).unwrap();
        for category in shares.categories() {
            assert!((shares.sum(category) - 1.0).abs() < 1e-5);
        }
        let papersum = 376850.5723 + 556864.9243 + 340833.4062;
        assert!((shares.get(Paper, SectorId(59)).unwrap() - 376850.5723 / papersum).abs() < 1e-4);
    }

    #[test]
    fn test_zero_demand_category_fails() {
        let demand = SectorVector::from_pairs(vec![(5, 0.0), (12, 0.0), (47, 0.0)]);
        let err = sector_shares(&food_concordance(), &demand).unwrap_err();
        assert_matches!(
            err,
            IncidenceError::EmptyAggregationGroup { ref group, .. } if group == "food"
        );
    }

    #[test]
    fn test_missing_price_is_dropped_and_reported() {
        let demand = SectorVector::from_pairs(vec![(5, 100.0), (12, 100.0), (47, 200.0)]);
        let shares = sector_shares(&food_concordance(), &demand).unwrap();
        let prices = SectorVector::from_pairs(vec![(5, 0.04), (12, 0.04), (300, 1.0)]);

        let dp = price_changes(&shares, &prices).unwrap();
        // Sector 47 carries half the weight but has no price
        assert!((dp.require(Food).unwrap() - 0.02).abs() < 1e-12);
        assert!(dp.report.missing_values.contains(&SectorId(47)));
        assert!(dp.report.unmapped_sectors.contains(&SectorId(300)));
    }

    #[test]
    fn test_unjoined_category_is_absent() {
        let concordance = Concordance::new(vec![
            ConcordanceEntry::new(Food, 5),
            ConcordanceEntry::new(Coal, 16),
        ]);
        let demand = SectorVector::from_pairs(vec![(5, 1.0)]);
        let dp = category_price_changes(
            &concordance,
            &demand,
            &SectorVector::from_pairs(vec![(5, 0.1)]),
        )
        .unwrap();
        assert_eq!(dp.len(), 1);
        assert_matches!(dp.require(Coal), Err(IncidenceError::SchemaMismatch(_)));
    }

    #[test]
    fn test_inputs_are_not_mutated() {
        let concordance = food_concordance();
        let demand = SectorVector::from_pairs(vec![(5, 100.0), (12, 200.0), (47, 300.0)]);
        let (c0, d0) = (concordance.clone(), demand.clone());
        let first = sector_shares(&concordance, &demand).unwrap();
        let second = sector_shares(&concordance, &demand).unwrap();
        assert_eq!(first, second);
        assert_eq!(concordance, c0);
        assert_eq!(demand, d0);
    }
}
