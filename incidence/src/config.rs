//! Run configuration, stored as TOML.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::adjustment::check_decile_target;
use crate::demand::SplitGroup;
use crate::sector::PriceScenario;

/// Parameters of an incidence run that are not part of the input tables.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IncidenceConfig {
    /// Country whose survey budget shares split the shared sector groups.
    #[serde(default = "default_split_reference_country")]
    pub split_reference_country: String,

    /// Year of the population figure used for per-capita values.
    #[serde(default = "default_population_year")]
    pub population_year: u16,

    /// Transfers go to deciles `1..=decile_target`.
    #[serde(default = "default_decile_target")]
    pub decile_target: u8,

    #[serde(default)]
    pub scenario: PriceScenario,

    #[serde(default)]
    pub tolerances: Tolerances,

    #[serde(default = "SplitGroup::defaults")]
    pub split_groups: Vec<SplitGroup>,
}

fn default_split_reference_country() -> String {
    "BGR".to_string()
}

fn default_population_year() -> u16 {
    2019
}

fn default_decile_target() -> u8 {
    10
}

impl Default for IncidenceConfig {
    fn default() -> Self {
        Self {
            split_reference_country: default_split_reference_country(),
            population_year: default_population_year(),
            decile_target: default_decile_target(),
            scenario: PriceScenario::default(),
            tolerances: Tolerances::default(),
            split_groups: SplitGroup::defaults(),
        }
    }
}

/// Relative tolerances of the consistency checks.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tolerances {
    pub sector_share_sum: f64,
    pub decile_share_sum: f64,
    /// Budget balance and demand mass conservation.
    pub budget_relative: f64,
    /// Category versus sector adjustment factors.
    pub factor_relative: f64,
    /// Price, burden and demand-response aggregates.
    pub price_relative: f64,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            sector_share_sum: 1e-5,
            decile_share_sum: 1e-6,
            budget_relative: 1e-4,
            factor_relative: 1e-3,
            price_relative: 1e-2,
        }
    }
}

impl IncidenceConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config in {}", path.display()))?;
        Ok(config)
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, contents)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        check_decile_target(self.decile_target)?;
        SplitGroup::validate_all(&self.split_groups)?;
        if self.split_reference_country.len() != 3 {
            anyhow::bail!(
                "split reference country must be an ISO3 code, got `{}`",
                self.split_reference_country
            );
        }
        let t = &self.tolerances;
        for (name, value) in [
            ("sector_share_sum", t.sector_share_sum),
            ("decile_share_sum", t.decile_share_sum),
            ("budget_relative", t.budget_relative),
            ("factor_relative", t.factor_relative),
            ("price_relative", t.price_relative),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                anyhow::bail!("tolerance {name} must be finite and non-negative, got {value}");
            }
        }
        Ok(())
    }
}
