//! Synthetic input bundle shared by the integration tests.
//!
//! Every non-split category maps to its own sector (1..=18). The petroleum
//! and coke group uses sectors 62 and 63, charcoal and firewood sector 21.
//! All survey budget shares are 4 %, so they add up to 100 %.

#![allow(dead_code)]

use std::collections::BTreeMap;

use mindset_incidence::{
    CategoryProfile, ConcordanceEntry, ExpenditureCategory, GovernmentSpendingRow,
    HouseholdSurveyRow, InfrastructureCategory, InputBundle, MacroDemandRow, MacroPriceRow,
    OtherInvestmentRow, PopulationRow, RevenueRow, SectorId, SplitGroup,
};

pub const POPULATION: u64 = 1_000_000;
pub const INCOME_REVENUE: f64 = 5_000.0;
pub const GOVERNMENT_REVENUE: f64 = 3_000.0;

/// Sectors funding the infrastructure categories.
const INFRASTRUCTURE_SECTORS: [u32; 9] = [93, 95, 96, 101, 102, 104, 106, 110, 111];

fn split_categories() -> Vec<ExpenditureCategory> {
    SplitGroup::defaults()
        .into_iter()
        .flat_map(|g| g.categories)
        .collect()
}

/// Concordance covering every category.
pub fn concordance() -> Vec<ConcordanceEntry> {
    let split = split_categories();
    let mut entries: Vec<_> = ExpenditureCategory::ALL
        .iter()
        .filter(|c| !split.contains(*c))
        .enumerate()
        .map(|(i, &c)| ConcordanceEntry::new(c, i as u32 + 1))
        .collect();
    for group in SplitGroup::defaults() {
        for &category in &group.categories {
            for sector in &group.sectors {
                entries.push(ConcordanceEntry::new(category, sector.0));
            }
        }
    }
    entries
}

/// Sectors of the concordance.
pub fn sectors() -> Vec<u32> {
    let mut sectors: Vec<_> = concordance().iter().map(|e| e.sector.0).collect();
    sectors.sort_unstable();
    sectors.dedup();
    sectors
}

pub fn demand_rows(country: &str) -> Vec<MacroDemandRow> {
    sectors()
        .into_iter()
        .map(|s| MacroDemandRow {
            country: country.to_string(),
            sector: SectorId(s),
            demand: 1_000.0 + 10.0 * s as f64,
        })
        .collect()
}

/// Base price changes between 1 % and 5 %.
pub fn price_rows(country: &str) -> Vec<MacroPriceRow> {
    sectors()
        .into_iter()
        .map(|s| {
            let base = 0.01 * (s % 5 + 1) as f64;
            MacroPriceRow {
                country: country.to_string(),
                sector: SectorId(s),
                base,
                technology: Some(base / 2.0),
                trade: None,
            }
        })
        .collect()
}

/// Ten deciles with rising consumption and access.
pub fn survey_rows(country: &str) -> Vec<HouseholdSurveyRow> {
    (1..=10u16)
        .map(|d| HouseholdSurveyRow {
            country: country.to_string(),
            decile: d,
            consumption_per_capita: 1_000.0 * d as f64,
            categories: ExpenditureCategory::ALL
                .iter()
                .map(|&c| (c, CategoryProfile::new(4.0, -0.5, 0.8)))
                .collect(),
            infrastructure_access: InfrastructureCategory::ALL
                .iter()
                .map(|&i| (i, 10.0 * d as f64 - 5.0))
                .collect::<BTreeMap<_, _>>(),
        })
        .collect()
}

/// A bundle with complete tables for every country in `countries`.
pub fn bundle(countries: &[&str]) -> InputBundle {
    let mut bundle = InputBundle {
        concordance: concordance(),
        ..Default::default()
    };
    for &country in countries {
        bundle.survey.extend(survey_rows(country));
        bundle.demand.extend(demand_rows(country));
        bundle.prices.extend(price_rows(country));
        bundle.population.push(PopulationRow {
            country: country.to_string(),
            year: 2019,
            population: POPULATION,
        });
        bundle.revenue.push(RevenueRow {
            country: country.to_string(),
            income: INCOME_REVENUE,
            government: GOVERNMENT_REVENUE,
        });
        for sector in INFRASTRUCTURE_SECTORS {
            bundle.government_spending.push(GovernmentSpendingRow {
                country: country.to_string(),
                sector: SectorId(sector),
                share: 0.05,
            });
            bundle.other_investment.push(OtherInvestmentRow {
                country: country.to_string(),
                sector: SectorId(sector),
                amount: 100.0,
            });
        }
    }
    bundle
}

pub fn assert_close(actual: f64, expected: f64, tolerance: f64) {
    let scale = expected.abs().max(1.0);
    assert!(
        (actual - expected).abs() <= tolerance * scale,
        "expected {expected}, got {actual}"
    );
}
