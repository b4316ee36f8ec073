//! Revenue recycling: targeted per-capita transfers and proxied
//! infrastructure investment.
//!
//! Both mechanisms balance their budget: summing the per-capita transfer of
//! every decile times the decile population returns the amount recycled.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::adjustment::check_decile_target;
use crate::burden::TaxBurdenRecord;
use crate::category::InfrastructureCategory;
use crate::demand::USD_PER_MODEL_UNIT;
use crate::error::{share_of, IncidenceError, Result};
use crate::sector::{SectorId, SectorVector};
use crate::survey::{Decile, HouseholdSurvey, DECILE_COUNT};

/// Tax burden of one decile after a transfer.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RecycledBurden {
    pub country: String,
    pub decile: Decile,
    /// Transfer received per capita, USD.
    pub transfer_per_capita: f64,
    pub absolute: f64,
    pub relative: f64,
    pub absolute_with_response: f64,
    pub relative_with_response: f64,
}

fn subtract_transfers(
    burdens: &[TaxBurdenRecord],
    transfer: impl Fn(Decile) -> Result<f64>,
) -> Result<Vec<RecycledBurden>> {
    burdens
        .iter()
        .map(|b| {
            let transfer_per_capita = transfer(b.decile)?;
            let absolute = b.absolute - transfer_per_capita;
            let absolute_with_response = b.absolute_with_response - transfer_per_capita;
            Ok(RecycledBurden {
                country: b.country.clone(),
                decile: b.decile,
                transfer_per_capita,
                absolute,
                relative: share_of(
                    b.decile,
                    "consumption per capita",
                    absolute,
                    b.consumption_per_capita,
                )?,
                absolute_with_response,
                relative_with_response: share_of(
                    b.decile,
                    "consumption per capita",
                    absolute_with_response,
                    b.consumption_per_capita,
                )?,
            })
        })
        .collect()
}

fn check_population(population: u64) -> Result<f64> {
    if population == 0 {
        return Err(IncidenceError::InvalidInput(
            "population must be positive".to_string(),
        ));
    }
    Ok(population as f64)
}

/// Per-capita transfer when `revenue_pool` (thousand USD) is shared equally
/// by everyone in deciles `1..=decile_target`.
pub fn targeted_transfer_per_capita(
    revenue_pool: f64,
    population: u64,
    decile_target: u8,
) -> Result<f64> {
    check_decile_target(decile_target)?;
    let population = check_population(population)?;
    let targeted = population * decile_target as f64 / DECILE_COUNT as f64;
    Ok(revenue_pool * USD_PER_MODEL_UNIT / targeted)
}

/// Burdens after recycling `revenue_pool` as an equal per-capita transfer to
/// deciles `1..=decile_target`.
pub fn targeted_transfer(
    burdens: &[TaxBurdenRecord],
    revenue_pool: f64,
    population: u64,
    decile_target: u8,
) -> Result<Vec<RecycledBurden>> {
    let per_capita = targeted_transfer_per_capita(revenue_pool, population, decile_target)?;
    info!(revenue_pool, decile_target, per_capita, "recycling revenue as targeted transfers");
    subtract_transfers(burdens, |decile| {
        Ok(if decile.is_targeted(decile_target) {
            per_capita
        } else {
            0.0
        })
    })
}

/// Share of a revenue pool spent on one macro sector.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GovernmentSpendingRow {
    pub country: String,
    pub sector: SectorId,
    #[serde(rename = "govt_spend")]
    pub share: f64,
}

/// Investment in one macro sector financed outside the revenue pool.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OtherInvestmentRow {
    pub country: String,
    pub sector: SectorId,
    /// Thousand USD.
    pub amount: f64,
}

/// Funding available to each infrastructure category.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct InfrastructureFunding {
    /// Share of the government revenue pool.
    pub spending_share: BTreeMap<InfrastructureCategory, f64>,
    /// Other investment, USD.
    pub other_investment: BTreeMap<InfrastructureCategory, f64>,
}

impl InfrastructureFunding {
    /// Combine per-sector spending shares and other investment (thousand
    /// USD) with the fixed sector weights of each infrastructure category.
    pub fn from_sectors(
        spending_shares: &SectorVector,
        other_investment: &SectorVector,
    ) -> Result<Self> {
        let mut funding = Self::default();
        for infra in InfrastructureCategory::ALL {
            let mut share = 0.0;
            let mut other = 0.0;
            for &(sector, weight) in infra.sector_weights() {
                let sector = SectorId(sector);
                share += weight * lookup(spending_shares, sector, "government spending share")?;
                other += weight * lookup(other_investment, sector, "other investment")?;
            }
            funding.spending_share.insert(infra, share);
            funding
                .other_investment
                .insert(infra, other * USD_PER_MODEL_UNIT);
        }
        Ok(funding)
    }

    /// Select the rows of `country` and combine them.
    pub fn for_country(
        spending: &[GovernmentSpendingRow],
        other: &[OtherInvestmentRow],
        country: &str,
    ) -> Result<Self> {
        let spending = SectorVector::collect_country(
            spending
                .iter()
                .filter(|r| r.country == country)
                .map(|r| (r.sector, r.share)),
            "government spending share",
            country,
        )?;
        let other = SectorVector::collect_country(
            other
                .iter()
                .filter(|r| r.country == country)
                .map(|r| (r.sector, r.amount)),
            "other investment",
            country,
        )?;
        Self::from_sectors(&spending, &other)
    }

    /// Amount spent on `infra` out of a government pool given in USD.
    pub fn allocated(&self, infra: InfrastructureCategory, spending: f64) -> f64 {
        self.spending_share.get(&infra).copied().unwrap_or(0.0) * spending
            + self.other_investment.get(&infra).copied().unwrap_or(0.0)
    }
}

fn lookup(vector: &SectorVector, sector: SectorId, what: &str) -> Result<f64> {
    vector.get(sector).ok_or_else(|| {
        IncidenceError::SchemaMismatch(format!("no {what} for sector {sector}"))
    })
}

/// Funding of one infrastructure category and who receives it.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct InfrastructurePool {
    /// Amount spent, USD.
    pub allocated: f64,
    pub population_without_access: f64,
    /// Transfer per person without access, USD.
    pub per_capita: f64,
}

/// Proxied transfers received by one decile.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct InfrastructureTransferRecord {
    pub decile: Decile,
    /// Transfer per capita of the decile, by category, USD.
    pub by_category: BTreeMap<InfrastructureCategory, f64>,
    pub total: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct InfrastructureTransfers {
    pub country: String,
    pub pools: BTreeMap<InfrastructureCategory, InfrastructurePool>,
    pub records: Vec<InfrastructureTransferRecord>,
}

impl InfrastructureTransfers {
    /// Total amount spent over all categories, USD.
    pub fn allocated_total(&self) -> f64 {
        self.pools.values().map(|p| p.allocated).sum()
    }

    /// Transfer per capita of `decile`, zero if the decile is unknown.
    pub fn transfer(&self, decile: Decile) -> f64 {
        self.records
            .iter()
            .find(|r| r.decile == decile)
            .map(|r| r.total)
            .unwrap_or(0.0)
    }

    /// Burdens after subtracting the proxied transfers.
    pub fn net_burdens(&self, burdens: &[TaxBurdenRecord]) -> Result<Vec<RecycledBurden>> {
        subtract_transfers(burdens, |decile| {
            self.records
                .iter()
                .find(|r| r.decile == decile)
                .map(|r| r.total)
                .ok_or_else(|| {
                    IncidenceError::SchemaMismatch(format!(
                        "no infrastructure transfer for {decile} in {}",
                        self.country
                    ))
                })
        })
    }
}

/// Proxy infrastructure investment as transfers to households without access.
///
/// For each category, the allocated amount
/// `share · revenue_govt · 1000 + other investment` is divided by the
/// population without access, `Σ_d (1 − access(d)/100) · population/10`.
/// Decile `d` then receives `(1 − access(d)/100)` times that per-capita
/// amount. A category with nothing allocated yields zero transfers.
pub fn infrastructure_transfers(
    survey: &HouseholdSurvey,
    revenue_govt: f64,
    funding: &InfrastructureFunding,
    population: u64,
) -> Result<InfrastructureTransfers> {
    let decile_population = check_population(population)? / DECILE_COUNT as f64;
    let spending = revenue_govt * USD_PER_MODEL_UNIT;

    let mut without_access: BTreeMap<InfrastructureCategory, Vec<f64>> = BTreeMap::new();
    for infra in InfrastructureCategory::ALL {
        let fractions = survey
            .deciles()
            .iter()
            .map(|d| d.access_share_pct(infra).map(|a| 1.0 - a / 100.0))
            .collect::<Result<Vec<_>>>()?;
        without_access.insert(infra, fractions);
    }

    let mut pools = BTreeMap::new();
    for (&infra, fractions) in &without_access {
        let allocated = funding.allocated(infra, spending);
        let population_without_access: f64 = fractions.iter().sum::<f64>() * decile_population;
        let per_capita = if allocated == 0.0 {
            0.0
        } else {
            share_of(infra, "population without access", allocated, population_without_access)?
        };
        pools.insert(
            infra,
            InfrastructurePool {
                allocated,
                population_without_access,
                per_capita,
            },
        );
    }

    let records = survey
        .deciles()
        .iter()
        .enumerate()
        .map(|(i, d)| {
            let by_category: BTreeMap<_, _> = pools
                .iter()
                .map(|(&infra, pool)| (infra, without_access[&infra][i] * pool.per_capita))
                .collect();
            InfrastructureTransferRecord {
                decile: d.decile,
                total: by_category.values().sum(),
                by_category,
            }
        })
        .collect();

    let transfers = InfrastructureTransfers {
        country: survey.country().to_string(),
        pools,
        records,
    };
    debug!(
        country = survey.country(),
        allocated = transfers.allocated_total(),
        "computed infrastructure transfers"
    );
    Ok(transfers)
}
