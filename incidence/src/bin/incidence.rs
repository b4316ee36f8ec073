//! Household incidence CLI.
//!
//! Compute price changes, tax burdens and revenue recycling for the
//! countries of an input bundle.

#[cfg(feature = "cli")]
mod cli {
    use std::fs;
    use std::path::{Path, PathBuf};

    use anyhow::{bail, Context, Result};
    use clap::{Parser, Subcommand};
    use mindset_incidence::{
        category_price_changes, run_countries, CountryInputs, CountryReport, IncidenceConfig,
        InputBundle, PriceScenario, RecycledBurden, RevenuePools,
    };
    use tracing::{error, info};

    #[derive(Parser)]
    #[command(name = "mindset-incidence")]
    #[command(about = "Household tax incidence of macro-model price changes")]
    pub struct Cli {
        /// Path to the TOML configuration (defaults apply if omitted)
        #[arg(short, long, global = true)]
        pub config: Option<PathBuf>,

        /// Path to the JSON input bundle
        #[arg(short, long, global = true)]
        pub bundle: Option<PathBuf>,

        /// ISO3 code of the country to process
        #[arg(long, global = true)]
        pub country: Option<String>,

        /// Price scenario, overriding the configuration
        #[arg(long, global = true, value_enum)]
        pub scenario: Option<PriceScenario>,

        /// Enable debug logging
        #[arg(short, long, global = true)]
        pub verbose: bool,

        #[command(subcommand)]
        pub command: Command,
    }

    #[derive(Subcommand)]
    pub enum Command {
        /// Write the default configuration
        InitConfig {
            /// Destination of the TOML file
            path: PathBuf,
        },

        /// Print the price change of every expenditure category
        Prices,

        /// Print the tax burden per decile
        Burden,

        /// Print category and sector adjustment factors
        Factors {
            /// Also compute income adjustment factors
            #[arg(long)]
            income: bool,

            /// Income revenue pool in thousand USD (defaults to the bundle)
            #[arg(short, long)]
            revenue: Option<f64>,
        },

        /// Recycle revenue as targeted per-capita transfers
        Targeted {
            /// Revenue pool in thousand USD (defaults to the bundle)
            #[arg(short, long)]
            revenue: Option<f64>,

            /// Transfers go to deciles 1..=N
            #[arg(short, long)]
            decile_target: Option<u8>,
        },

        /// Recycle revenue as infrastructure investment
        Infrastructure {
            /// Government revenue pool in thousand USD (defaults to the bundle)
            #[arg(short, long)]
            revenue: Option<f64>,
        },

        /// Run every consistency check; fails if any check fails
        Check,

        /// Run the full pipeline
        Run {
            /// Write the reports as JSON
            #[arg(short, long)]
            output: Option<PathBuf>,
        },
    }

    pub fn run(cli: Cli) -> Result<()> {
        let Cli {
            config,
            bundle,
            country,
            scenario,
            verbose: _,
            command,
        } = cli;

        let mut config = match &config {
            Some(path) => IncidenceConfig::load(path)?,
            None => IncidenceConfig::default(),
        };
        if let Some(scenario) = scenario {
            config.scenario = scenario;
        }

        if let Command::InitConfig { path } = &command {
            config.save(path)?;
            println!("Wrote configuration to {}", path.display());
            return Ok(());
        }

        let bundle_path = bundle.context("--bundle is required for this command")?;
        let bundle = InputBundle::from_json_path(&bundle_path)?;
        let countries = match country {
            Some(country) => vec![country],
            None => bundle.countries(),
        };
        if countries.is_empty() {
            bail!("Input bundle {} has no survey rows", bundle_path.display());
        }

        match command {
            Command::InitConfig { .. } => Ok(()),
            Command::Prices => print_prices(&single(&bundle, &countries, &config)?),
            Command::Burden => {
                let inputs = single(&bundle, &countries, &config)?;
                let report = mindset_incidence::run(&inputs, &config)?;
                print_burden(&report);
                Ok(())
            }
            Command::Factors { income, revenue } => {
                let mut inputs = single(&bundle, &countries, &config)?;
                if income {
                    override_revenue(&mut inputs, revenue, None)?;
                } else {
                    inputs.revenue = None;
                }
                let report = mindset_incidence::run(&inputs, &config)?;
                print_factors(&report);
                Ok(())
            }
            Command::Targeted {
                revenue,
                decile_target,
            } => {
                if let Some(target) = decile_target {
                    config.decile_target = target;
                    config.validate()?;
                }
                let mut inputs = single(&bundle, &countries, &config)?;
                override_revenue(&mut inputs, revenue, None)?;
                let report = mindset_incidence::run(&inputs, &config)?;
                if let Some(income) = &report.income {
                    println!(
                        "Targeted transfers, deciles 1..={} ({})",
                        config.decile_target, report.country
                    );
                    print_recycled(&income.burdens);
                }
                Ok(())
            }
            Command::Infrastructure { revenue } => {
                let mut inputs = single(&bundle, &countries, &config)?;
                if inputs.funding.is_none() {
                    bail!("Bundle has no government spending or other investment tables");
                }
                override_revenue(&mut inputs, None, revenue)?;
                let report = mindset_incidence::run(&inputs, &config)?;
                print_infrastructure(&report);
                Ok(())
            }
            Command::Check => {
                let reports = run_all(&bundle, &countries, &config)?;
                let mut failed = 0;
                for report in &reports {
                    println!("Consistency checks ({})", report.country);
                    println!(
                        "{:<26} {:>18} {:>18} {:>12} {:>6}",
                        "Check", "Expected", "Actual", "Deviation", "OK"
                    );
                    println!("{:-<26} {:-<18} {:-<18} {:-<12} {:-<6}", "", "", "", "", "");
                    for check in &report.checks {
                        println!(
                            "{:<26} {:>18.4} {:>18.4} {:>12.2e} {:>6}",
                            check.name,
                            check.expected,
                            check.actual,
                            check.relative_deviation(),
                            if check.passed() { "yes" } else { "NO" }
                        );
                    }
                    println!();
                    failed += report.failed_checks().count();
                }
                if failed > 0 {
                    bail!("{failed} consistency checks failed");
                }
                Ok(())
            }
            Command::Run { output } => {
                let reports = run_all(&bundle, &countries, &config)?;
                for report in &reports {
                    print_burden(report);
                }
                if let Some(path) = output {
                    write_reports(&path, &reports)?;
                }
                if reports.len() < countries.len() {
                    bail!(
                        "{} of {} countries failed",
                        countries.len() - reports.len(),
                        countries.len()
                    );
                }
                Ok(())
            }
        }
    }

    fn single(
        bundle: &InputBundle,
        countries: &[String],
        config: &IncidenceConfig,
    ) -> Result<CountryInputs> {
        match countries {
            [country] => bundle.country_inputs(country, config),
            _ => bail!("Bundle holds several countries; pick one with --country"),
        }
    }

    /// Replace the bundle's revenue pools with command-line values.
    fn override_revenue(
        inputs: &mut CountryInputs,
        income: Option<f64>,
        government: Option<f64>,
    ) -> Result<()> {
        if inputs.revenue.is_none() && income.is_none() && government.is_none() {
            bail!("No revenue in the bundle for {}; pass --revenue", inputs.country());
        }
        let current = inputs.revenue.unwrap_or_default();
        inputs.revenue = Some(RevenuePools {
            income: income.unwrap_or(current.income),
            government: government.unwrap_or(current.government),
        });
        Ok(())
    }

    /// Run every country, skipping (and logging) the ones that fail.
    fn run_all(
        bundle: &InputBundle,
        countries: &[String],
        config: &IncidenceConfig,
    ) -> Result<Vec<CountryReport>> {
        let mut inputs = Vec::with_capacity(countries.len());
        for country in countries {
            match bundle.country_inputs(country, config) {
                Ok(i) => inputs.push(i),
                Err(e) => error!(country = %country, "skipping country: {e:#}"),
            }
        }

        let mut reports = Vec::with_capacity(inputs.len());
        for (country, result) in run_countries(&inputs, config) {
            match result {
                Ok(report) => reports.push(report),
                Err(e) => error!(country = %country, "skipping country: {e}"),
            }
        }
        if reports.is_empty() {
            bail!("No country could be processed");
        }
        Ok(reports)
    }

    fn write_reports(path: &Path, reports: &[CountryReport]) -> Result<()> {
        let contents =
            serde_json::to_string_pretty(reports).context("Failed to serialize reports")?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write reports to {}", path.display()))?;
        info!(path = %path.display(), reports = reports.len(), "wrote reports");
        Ok(())
    }

    fn print_prices(inputs: &CountryInputs) -> Result<()> {
        let changes = category_price_changes(&inputs.concordance, &inputs.demand, &inputs.prices)?;
        println!("Category Price Changes ({})", inputs.country());
        println!("==========================");
        println!("{:<16} {:>12}", "Category", "Change");
        println!("{:-<16} {:-<12}", "", "");
        for (category, delta) in changes.iter() {
            println!("{:<16} {:>11.4}%", category.to_string(), delta * 100.0);
        }
        if !changes.report.is_clean() {
            println!();
            println!("Dropped sector keys: {}", changes.report.dropped());
        }
        Ok(())
    }

    fn print_burden(report: &CountryReport) {
        println!("Tax Burden ({})", report.country);
        println!("================");
        println!(
            "{:>6} {:>14} {:>10} {:>14} {:>10} {:>14}",
            "Decile", "Absolute", "Relative", "Abs. (resp.)", "Rel. (resp.)", "Cons. p.c."
        );
        println!("{:-<6} {:-<14} {:-<10} {:-<14} {:-<10} {:-<14}", "", "", "", "", "", "");
        for b in &report.burdens {
            println!(
                "{:>6} {:>14.2} {:>9.3}% {:>14.2} {:>9.3}% {:>14.2}",
                b.decile.get(),
                b.absolute,
                b.relative * 100.0,
                b.absolute_with_response,
                b.relative_with_response * 100.0,
                b.consumption_per_capita
            );
        }
        println!();
    }

    fn print_factors(report: &CountryReport) {
        println!("Adjustment Factors ({})", report.country);
        println!("========================");
        let income = report.income.as_ref().map(|i| &i.adjustment.factors);
        println!("{:<16} {:>12} {:>12}", "Category", "Price", "Income");
        println!("{:-<16} {:-<12} {:-<12}", "", "", "");
        for (category, factor) in &report.price_adjustment.factors {
            let income = income
                .and_then(|f| f.get(category))
                .map(|f| format!("{f:.6}"))
                .unwrap_or_else(|| "-".to_string());
            println!("{:<16} {:>12.6} {:>12}", category.to_string(), factor, income);
        }

        println!();
        println!("{:>8} {:>12} {:>12}", "Sector", "Price", "Income");
        println!("{:-<8} {:-<12} {:-<12}", "", "", "");
        let income_sectors = report.income.as_ref().map(|i| &i.sector_factors);
        for (sector, factor) in report.price_sector_factors.iter() {
            let income = income_sectors
                .and_then(|f| f.get(sector))
                .map(|f| format!("{f:.6}"))
                .unwrap_or_else(|| "-".to_string());
            println!("{:>8} {:>12.6} {:>12}", sector.to_string(), factor, income);
        }
    }

    fn print_recycled(burdens: &[RecycledBurden]) {
        println!(
            "{:>6} {:>12} {:>14} {:>10} {:>14} {:>10}",
            "Decile", "Transfer", "Absolute", "Relative", "Abs. (resp.)", "Rel. (resp.)"
        );
        println!("{:-<6} {:-<12} {:-<14} {:-<10} {:-<14} {:-<10}", "", "", "", "", "", "");
        for b in burdens {
            println!(
                "{:>6} {:>12.2} {:>14.2} {:>9.3}% {:>14.2} {:>9.3}%",
                b.decile.get(),
                b.transfer_per_capita,
                b.absolute,
                b.relative * 100.0,
                b.absolute_with_response,
                b.relative_with_response * 100.0
            );
        }
        println!();
    }

    fn print_infrastructure(report: &CountryReport) {
        let Some(infrastructure) = &report.infrastructure else {
            return;
        };
        println!("Infrastructure Investment ({})", report.country);
        println!("===============================");
        println!(
            "{:<12} {:>16} {:>16} {:>12}",
            "Category", "Allocated", "No access", "Per capita"
        );
        println!("{:-<12} {:-<16} {:-<16} {:-<12}", "", "", "", "");
        for (category, pool) in &infrastructure.transfers.pools {
            println!(
                "{:<12} {:>16.0} {:>16.0} {:>12.2}",
                category.to_string(),
                pool.allocated,
                pool.population_without_access,
                pool.per_capita
            );
        }
        println!();
        print_recycled(&infrastructure.burdens);
    }
}

#[cfg(feature = "cli")]
fn main() -> anyhow::Result<()> {
    use clap::Parser;
    let cli = cli::Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();

    cli::run(cli)
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("This binary requires the 'cli' feature. Build with:");
    eprintln!("  cargo build -p mindset-incidence --features cli --bin mindset-incidence");
}
