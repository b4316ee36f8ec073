//! The closed sets of household expenditure and infrastructure categories.
//!
//! Every component that iterates "for each category" uses
//! [`ExpenditureCategory::ALL`], so the set cannot drift between stages.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::IncidenceError;

/// Per-category values, ordered by the category declaration order.
pub type CategoryMap<T> = BTreeMap<ExpenditureCategory, T>;

/// A household expenditure category of the survey microdata.
///
/// The serialized form is the short survey code (`"food"`, `"gso"`, ...).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ExpenditureCategory {
    #[serde(rename = "appliances")]
    Appliances,
    #[serde(rename = "chemicals")]
    Chemicals,
    #[serde(rename = "clothing")]
    Clothing,
    #[serde(rename = "communications")]
    Communications,
    #[serde(rename = "education")]
    Education,
    #[serde(rename = "food")]
    Food,
    #[serde(rename = "health_srv")]
    HealthServices,
    #[serde(rename = "housing")]
    Housing,
    #[serde(rename = "other")]
    Other,
    #[serde(rename = "paper")]
    Paper,
    #[serde(rename = "pharma")]
    Pharma,
    #[serde(rename = "rectourism")]
    RecreationTourism,
    #[serde(rename = "transp_eqt")]
    TransportEquipment,
    #[serde(rename = "transp_pub")]
    PublicTransport,
    /// Electricity.
    #[serde(rename = "ely")]
    Electricity,
    /// Gasoline.
    #[serde(rename = "gso")]
    Gasoline,
    #[serde(rename = "die")]
    Diesel,
    #[serde(rename = "ker")]
    Kerosene,
    #[serde(rename = "lpg")]
    Lpg,
    #[serde(rename = "nga")]
    NaturalGas,
    #[serde(rename = "ethanol")]
    Ethanol,
    #[serde(rename = "oil")]
    Oil,
    #[serde(rename = "coa")]
    Coal,
    #[serde(rename = "ccl")]
    Charcoal,
    #[serde(rename = "fwd")]
    Firewood,
}

impl ExpenditureCategory {
    /// All categories, in declaration order.
    pub const ALL: [ExpenditureCategory; 25] = [
        Self::Appliances,
        Self::Chemicals,
        Self::Clothing,
        Self::Communications,
        Self::Education,
        Self::Food,
        Self::HealthServices,
        Self::Housing,
        Self::Other,
        Self::Paper,
        Self::Pharma,
        Self::RecreationTourism,
        Self::TransportEquipment,
        Self::PublicTransport,
        Self::Electricity,
        Self::Gasoline,
        Self::Diesel,
        Self::Kerosene,
        Self::Lpg,
        Self::NaturalGas,
        Self::Ethanol,
        Self::Oil,
        Self::Coal,
        Self::Charcoal,
        Self::Firewood,
    ];

    /// Survey code of the category.
    pub const fn code(self) -> &'static str {
        match self {
            Self::Appliances => "appliances",
            Self::Chemicals => "chemicals",
            Self::Clothing => "clothing",
            Self::Communications => "communications",
            Self::Education => "education",
            Self::Food => "food",
            Self::HealthServices => "health_srv",
            Self::Housing => "housing",
            Self::Other => "other",
            Self::Paper => "paper",
            Self::Pharma => "pharma",
            Self::RecreationTourism => "rectourism",
            Self::TransportEquipment => "transp_eqt",
            Self::PublicTransport => "transp_pub",
            Self::Electricity => "ely",
            Self::Gasoline => "gso",
            Self::Diesel => "die",
            Self::Kerosene => "ker",
            Self::Lpg => "lpg",
            Self::NaturalGas => "nga",
            Self::Ethanol => "ethanol",
            Self::Oil => "oil",
            Self::Coal => "coa",
            Self::Charcoal => "ccl",
            Self::Firewood => "fwd",
        }
    }
}

impl fmt::Display for ExpenditureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for ExpenditureCategory {
    type Err = IncidenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.code() == s)
            .ok_or_else(|| IncidenceError::UnknownCategory(s.to_string()))
    }
}

/// Infrastructure types reached by public-investment recycling.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum InfrastructureCategory {
    #[serde(rename = "wtr")]
    Water,
    #[serde(rename = "sani")]
    Sanitation,
    #[serde(rename = "ely")]
    Electricity,
    #[serde(rename = "ICT")]
    Ict,
    #[serde(rename = "transp_pub")]
    PublicTransport,
}

impl InfrastructureCategory {
    /// All infrastructure categories, in declaration order.
    pub const ALL: [InfrastructureCategory; 5] = [
        Self::Water,
        Self::Sanitation,
        Self::Electricity,
        Self::Ict,
        Self::PublicTransport,
    ];

    /// Survey code of the category (prefix of its access-share column).
    pub const fn code(self) -> &'static str {
        match self {
            Self::Water => "wtr",
            Self::Sanitation => "sani",
            Self::Electricity => "ely",
            Self::Ict => "ICT",
            Self::PublicTransport => "transp_pub",
        }
    }

    /// Macro-model sectors funding this category and the weight of each.
    ///
    /// Water and sanitation share sector 95 (60/40); sanitation also takes a
    /// fifth of sector 96.
    pub fn sector_weights(self) -> &'static [(u32, f64)] {
        match self {
            Self::Water => &[(95, 0.6)],
            Self::Sanitation => &[(95, 0.4), (96, 0.2)],
            Self::Electricity => &[(93, 1.0)],
            Self::Ict => &[(110, 1.0), (111, 1.0)],
            Self::PublicTransport => &[(101, 1.0), (102, 1.0), (104, 1.0), (106, 1.0)],
        }
    }
}

impl fmt::Display for InfrastructureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for InfrastructureCategory {
    type Err = IncidenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.code() == s)
            .ok_or_else(|| {
                IncidenceError::SchemaMismatch(format!("unknown infrastructure category `{s}`"))
            })
    }
}
