use crate::loader::DataSources;
use crate::types::{PriceRecord, Scope, Toggles};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Regional price analytics: trends, seasonality, city x year averages and
/// a regional premium.
#[derive(Parser, Debug, Clone)]
#[command(name = "price-report", version)]
pub struct Settings {
    /// Normalized long-format cache file
    #[arg(long, default_value = "russian_apple_prices_long.csv")]
    pub long_path: PathBuf,

    /// Raw wide-format source (first column city, then month.year columns)
    #[arg(long, default_value = "manzanas.csv")]
    pub raw_path: PathBuf,

    /// Cities in the selected scope (default: first three, sorted)
    #[arg(long, value_delimiter = ',')]
    pub cities: Vec<String>,

    /// First year of the selected scope (default: earliest year)
    #[arg(long)]
    pub from_year: Option<i32>,

    /// Last year of the selected scope (default: latest year)
    #[arg(long)]
    pub to_year: Option<i32>,

    /// Case-insensitive prefix naming the premium region
    #[arg(long, default_value = "mosc")]
    pub region_prefix: String,

    /// Price unit shown next to averages
    #[arg(long, default_value = "rub/kg")]
    pub unit: String,

    /// Hide the seasonality view
    #[arg(long)]
    pub no_seasonality: bool,

    /// Hide the city x year heatmap
    #[arg(long)]
    pub no_heatmap: bool,

    /// Hide the regional premium KPI
    #[arg(long)]
    pub no_premium: bool,

    /// Show price volatility by city
    #[arg(long)]
    pub volatility: bool,

    /// Directory to write report CSVs and summary.json into
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// Write the long table back out in wide format
    #[arg(long)]
    pub export_wide: Option<PathBuf>,

    /// Rows shown per table preview
    #[arg(long, default_value = "5")]
    pub preview_rows: usize,

    /// Logging level or filter directive
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Settings {
    pub fn sources(&self) -> DataSources {
        DataSources {
            long_path: self.long_path.clone(),
            raw_path: self.raw_path.clone(),
        }
    }

    pub fn toggles(&self) -> Toggles {
        Toggles {
            seasonality: !self.no_seasonality,
            heatmap: !self.no_heatmap,
            premium: !self.no_premium,
            volatility: self.volatility,
        }
    }

    /// Selected scope, with unspecified parts taken from the table defaults.
    pub fn scope(&self, table: &[PriceRecord]) -> Scope {
        let defaults = Scope::default_for(table);
        let cities = if self.cities.is_empty() {
            defaults.cities
        } else {
            self.cities.iter().map(|c| c.trim().to_string()).collect()
        };
        Scope::new(
            cities,
            self.from_year.unwrap_or(defaults.min_year),
            self.to_year.unwrap_or(defaults.max_year),
        )
    }
}

/// Initialise the global `tracing` subscriber on stderr.
pub fn setup_logging(log_level: &str) {
    let filter = EnvFilter::try_new(log_level.to_lowercase()).unwrap_or_else(|_| EnvFilter::new("info"));
    let layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);
    tracing_subscriber::registry().with(filter).with(layer).init();
}
