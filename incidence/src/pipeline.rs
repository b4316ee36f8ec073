//! Per-country orchestration of the incidence stages.
//!
//! ```text
//! concordance + demand ─► sector shares ─► price changes ──────────┐
//!          │                                                       ▼
//!          └──► category demand ─► decile allocation ─► adjustment factors
//!                                                      ─► tax burden ─► recycling
//! ```

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::adjustment::{
    income_adjustment_factors, price_adjustment_factors, sector_factors, IncomeAdjustment,
    PriceAdjustment, SectorFactors,
};
use crate::allocation::{allocate, DecileExpenditure};
use crate::burden::{tax_burden, TaxBurdenRecord};
use crate::category::ExpenditureCategory;
use crate::checks::{self, ConsistencyCheck};
use crate::config::IncidenceConfig;
use crate::demand::{category_demand, CategoryDemand, SplitShares, USD_PER_MODEL_UNIT};
use crate::error::Result;
use crate::recycling::{
    infrastructure_transfers, targeted_transfer, InfrastructureFunding, InfrastructureTransfers,
    RecycledBurden,
};
use crate::sector::{Concordance, DemandVector, PriceVector};
use crate::shares::{price_changes, sector_shares, PriceChanges, SectorShares};
use crate::survey::{HouseholdSurvey, DECILE_COUNT};

/// Revenue available for recycling, thousand USD.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RevenuePools {
    /// Recycled as transfers to households.
    pub income: f64,
    /// Recycled as government (infrastructure) spending.
    pub government: f64,
}

/// Validated inputs of one country.
#[derive(Clone, Debug, PartialEq)]
pub struct CountryInputs {
    pub survey: HouseholdSurvey,
    pub concordance: Concordance,
    pub demand: DemandVector,
    pub prices: PriceVector,
    pub split: SplitShares,
    pub population: u64,
    pub revenue: Option<RevenuePools>,
    pub funding: Option<InfrastructureFunding>,
}

impl CountryInputs {
    pub fn country(&self) -> &str {
        self.survey.country()
    }
}

/// Results of income recycling.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct IncomeRecycling {
    pub adjustment: IncomeAdjustment,
    pub sector_factors: SectorFactors,
    pub burdens: Vec<RecycledBurden>,
}

/// Results of infrastructure recycling.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct InfrastructureRecycling {
    pub transfers: InfrastructureTransfers,
    pub burdens: Vec<RecycledBurden>,
}

/// Everything computed for one country.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CountryReport {
    pub country: String,
    pub population: u64,
    pub sector_shares: SectorShares,
    pub price_changes: PriceChanges,
    pub category_demand: CategoryDemand,
    pub allocation: DecileExpenditure,
    pub price_adjustment: PriceAdjustment,
    pub price_sector_factors: SectorFactors,
    pub burdens: Vec<TaxBurdenRecord>,
    pub income: Option<IncomeRecycling>,
    pub infrastructure: Option<InfrastructureRecycling>,
    pub checks: Vec<ConsistencyCheck>,
}

impl CountryReport {
    pub fn failed_checks(&self) -> impl Iterator<Item = &ConsistencyCheck> {
        self.checks.iter().filter(|c| !c.passed())
    }

    pub fn all_checks_passed(&self) -> bool {
        self.failed_checks().next().is_none()
    }
}

/// The share sum farthest from 1 among `sums`.
fn worst_sum(
    name: &'static str,
    sums: impl Iterator<Item = f64>,
    tolerance: f64,
) -> ConsistencyCheck {
    let worst = sums.fold(1.0, |worst: f64, s| {
        if (s - 1.0).abs() > (worst - 1.0).abs() {
            s
        } else {
            worst
        }
    });
    ConsistencyCheck::new(name, 1.0, worst, tolerance)
}

/// Run every stage for one country.
///
/// Recycling stages run only when revenue pools (and, for infrastructure,
/// funding tables) are present.
pub fn run(inputs: &CountryInputs, config: &IncidenceConfig) -> Result<CountryReport> {
    let country = inputs.country();
    let tolerances = &config.tolerances;
    info!(country, scenario = %config.scenario, "running incidence pipeline");

    let shares = sector_shares(&inputs.concordance, &inputs.demand)?;
    let price_changes = price_changes(&shares, &inputs.prices)?;
    let demand = category_demand(&inputs.concordance, &inputs.demand, &inputs.split)?;
    let allocation = allocate(&inputs.survey, &demand, inputs.population)?;
    let price_adjustment = price_adjustment_factors(&inputs.survey, &price_changes)?;
    let price_sector_factors =
        sector_factors(&inputs.concordance, &price_adjustment.factors, &inputs.split)?;
    let burdens = tax_burden(&inputs.survey, &allocation, &price_changes)?;

    let mut diagnostics = vec![
        worst_sum(
            "sector share sum",
            shares.categories().map(|c| shares.sum(c)),
            tolerances.sector_share_sum,
        ),
        worst_sum(
            "decile share sum",
            ExpenditureCategory::ALL.iter().map(|&c| allocation.share_sum(c)),
            tolerances.decile_share_sum,
        ),
        ConsistencyCheck::new(
            "demand mass",
            inputs.demand.total(),
            demand.total_model_units(),
            tolerances.budget_relative,
        ),
        checks::price_consistency(
            &price_changes,
            &demand,
            &inputs.concordance,
            &inputs.demand,
            &inputs.prices,
            tolerances.price_relative,
        ),
        checks::burden_consistency(
            &burdens,
            inputs.population,
            &inputs.concordance,
            &inputs.demand,
            &inputs.prices,
            tolerances.price_relative,
        ),
        checks::response_consistency(
            &burdens,
            inputs.population,
            &demand,
            &price_adjustment,
            tolerances.price_relative,
        ),
        checks::sector_factor_consistency(
            "price sector factors",
            &price_adjustment.factors,
            &demand,
            &price_sector_factors,
            &inputs.demand,
            tolerances.factor_relative,
        ),
        checks::survey_consumption(&inputs.survey, &price_adjustment, tolerances.price_relative),
    ];

    let decile_population = inputs.population as f64 / DECILE_COUNT as f64;
    let mut income = None;
    let mut infrastructure = None;
    if let Some(revenue) = inputs.revenue {
        let adjustment = income_adjustment_factors(
            &inputs.survey,
            &allocation,
            revenue.income,
            config.decile_target,
        )?;
        let income_sector_factors =
            sector_factors(&inputs.concordance, &adjustment.factors, &inputs.split)?;
        diagnostics.push(checks::sector_factor_consistency(
            "income sector factors",
            &adjustment.factors,
            &demand,
            &income_sector_factors,
            &inputs.demand,
            tolerances.factor_relative,
        ));

        let recycled =
            targeted_transfer(&burdens, revenue.income, inputs.population, config.decile_target)?;
        diagnostics.push(ConsistencyCheck::new(
            "targeted transfer budget",
            revenue.income * USD_PER_MODEL_UNIT,
            recycled
                .iter()
                .map(|r| r.transfer_per_capita * decile_population)
                .sum(),
            tolerances.budget_relative,
        ));
        income = Some(IncomeRecycling {
            adjustment,
            sector_factors: income_sector_factors,
            burdens: recycled,
        });

        if let Some(funding) = &inputs.funding {
            let transfers = infrastructure_transfers(
                &inputs.survey,
                revenue.government,
                funding,
                inputs.population,
            )?;
            diagnostics.push(ConsistencyCheck::new(
                "infrastructure budget",
                transfers.allocated_total(),
                transfers
                    .records
                    .iter()
                    .map(|r| r.total * decile_population)
                    .sum(),
                tolerances.budget_relative,
            ));
            let burdens = transfers.net_burdens(&burdens)?;
            infrastructure = Some(InfrastructureRecycling { transfers, burdens });
        }
    }

    let report = CountryReport {
        country: country.to_string(),
        population: inputs.population,
        sector_shares: shares,
        price_changes,
        category_demand: demand,
        allocation,
        price_adjustment,
        price_sector_factors,
        burdens,
        income,
        infrastructure,
        checks: diagnostics,
    };
    info!(
        country,
        failed_checks = report.failed_checks().count(),
        "finished incidence pipeline"
    );
    Ok(report)
}

/// Run several countries independently, in parallel.
#[cfg(feature = "parallel")]
pub fn run_countries(
    inputs: &[CountryInputs],
    config: &IncidenceConfig,
) -> Vec<(String, Result<CountryReport>)> {
    inputs
        .par_iter()
        .map(|i| (i.country().to_string(), run(i, config)))
        .collect()
}

/// Run several countries independently (serial version when the parallel
/// feature is disabled).
#[cfg(not(feature = "parallel"))]
pub fn run_countries(
    inputs: &[CountryInputs],
    config: &IncidenceConfig,
) -> Vec<(String, Result<CountryReport>)> {
    inputs
        .iter()
        .map(|i| (i.country().to_string(), run(i, config)))
        .collect()
}
