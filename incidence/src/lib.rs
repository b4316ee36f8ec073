//! Household tax incidence of macro-model price changes.
//!
//! Sectoral price and demand changes from the MINDSET macro model are mapped
//! onto household survey deciles through a sector/expenditure-category
//! concordance:
//!
//! 1. **Price changes per category**: demand-weighted mean of the price
//!    changes of the sectors in each category.
//! 2. **Adjustment factors**: decile-weighted demand responses from survey
//!    price and income elasticities, per category and per sector.
//! 3. **Tax burden**: absolute and relative burden per expenditure decile,
//!    with and without the price response of demand.
//! 4. **Revenue recycling**: targeted per-capita transfers and infrastructure
//!    investment proxied as transfers to households lacking access.
//!
//! ## Units
//!
//! | Quantity | Unit |
//! |----------|------|
//! | Macro demand, revenue pools, other investment | thousand USD |
//! | Category demand, decile totals, transfers | USD |
//! | Price changes | fraction (0.05 = +5 %) |
//! | Survey budget shares, access shares | percent |
//!
//! Every decile holds a tenth of the population.
//!
//! ## Key Concepts
//!
//! - **Split group**: macro sectors shared by several categories (refined
//!   petroleum and coke, charcoal and firewood). Their demand is divided by
//!   budget shares of a reference country survey.
//! - **Join report**: sector keys dropped by joining the concordance with a
//!   sector vector. Dropping is accepted; the report makes it observable.
//! - **Consistency check**: a diagnostic comparing a category-level aggregate
//!   with the sector-level aggregate it must reproduce.

pub mod adjustment;
pub mod allocation;
pub mod burden;
pub mod checks;
pub mod config;
pub mod demand;
pub mod input;
pub mod pipeline;
pub mod recycling;
pub mod shares;

mod category;
mod error;
mod population;
mod sector;
mod survey;

pub use category::{CategoryMap, ExpenditureCategory, InfrastructureCategory};
pub use error::{IncidenceError, Result};
pub use population::{PopulationRow, PopulationSource, PopulationTable};
pub use sector::{
    Concordance, ConcordanceEntry, DemandVector, JoinReport, MacroDemandRow, MacroPriceRow,
    PriceScenario, PriceVector, SectorId, SectorVector,
};
pub use survey::{
    CategoryProfile, Decile, HouseholdSurvey, HouseholdSurveyRow, SurveyDecile, DECILE_COUNT,
    UNCLASSIFIED_DECILE,
};

pub use adjustment::{
    income_adjustment_factors, price_adjustment_factors, sector_factors, IncomeAdjustment,
    PriceAdjustment, SectorFactors,
};
pub use allocation::{allocate, CategoryAllocation, DecileAllocation, DecileExpenditure};
pub use burden::{tax_burden, TaxBurdenRecord};
pub use checks::ConsistencyCheck;
pub use config::{IncidenceConfig, Tolerances};
pub use demand::{category_demand, CategoryDemand, SplitGroup, SplitShares, USD_PER_MODEL_UNIT};
pub use input::{InputBundle, RevenueRow};
pub use pipeline::{run, run_countries, CountryInputs, CountryReport, RevenuePools};
pub use recycling::{
    infrastructure_transfers, targeted_transfer, GovernmentSpendingRow, InfrastructureFunding,
    InfrastructureTransfers, OtherInvestmentRow, RecycledBurden,
};
pub use shares::{category_price_changes, price_changes, sector_shares, PriceChanges, SectorShares};
