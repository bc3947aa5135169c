use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tabled::Tabled;

/// One row of the raw wide table: a city and one cell per `month.year`
/// column, in column order. Blank cells are `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct RawWideRow {
    pub city: String,
    pub cells: Vec<(String, Option<String>)>,
}

/// One observation of the long table. `year` and `month` always mirror `date`.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceRecord {
    pub city: String,
    pub date: NaiveDate,
    pub price: f64,
    pub year: i32,
    pub month: u32,
}

impl PriceRecord {
    pub fn new(city: impl Into<String>, date: NaiveDate, price: f64) -> Self {
        Self {
            city: city.into(),
            date,
            price,
            year: date.year(),
            month: date.month(),
        }
    }

    /// Recompute `year`/`month` from `date`.
    pub fn refresh_derived(&mut self) {
        self.year = self.date.year();
        self.month = self.date.month();
    }
}

/// Row shape of the normalized cache file when reading it back. Extra
/// columns such as `year`/`month` are ignored and recomputed.
#[derive(Debug, Deserialize)]
pub struct CachedRow {
    pub city: Option<String>,
    pub date: Option<String>,
    pub price: Option<String>,
}

/// Row shape of the normalized cache file when writing it.
#[derive(Debug, Serialize)]
pub struct CacheRow<'a> {
    pub city: &'a str,
    pub date: NaiveDate,
    pub price: f64,
}

impl<'a> From<&'a PriceRecord> for CacheRow<'a> {
    fn from(r: &'a PriceRecord) -> Self {
        Self {
            city: &r.city,
            date: r.date,
            price: r.price,
        }
    }
}

/// A transient filter over the long table: chosen cities and an inclusive
/// year range.
#[derive(Debug, Clone, PartialEq)]
pub struct Scope {
    pub cities: BTreeSet<String>,
    pub min_year: i32,
    pub max_year: i32,
}

impl Scope {
    pub fn new<I, S>(cities: I, min_year: i32, max_year: i32) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let (min_year, max_year) = if min_year <= max_year {
            (min_year, max_year)
        } else {
            (max_year, min_year)
        };
        Self {
            cities: cities.into_iter().map(Into::into).collect(),
            min_year,
            max_year,
        }
    }

    /// Default selection: the first three cities in sorted order and the
    /// table's full year range.
    pub fn default_for(table: &[PriceRecord]) -> Self {
        let cities: BTreeSet<&str> = table.iter().map(|r| r.city.as_str()).collect();
        let min_year = table.iter().map(|r| r.year).min().unwrap_or_default();
        let max_year = table.iter().map(|r| r.year).max().unwrap_or_default();
        Self::new(cities.into_iter().take(3), min_year, max_year)
    }

    pub fn contains(&self, r: &PriceRecord) -> bool {
        self.cities.contains(&r.city) && (self.min_year..=self.max_year).contains(&r.year)
    }
}

/// Which optional views the report renders.
#[derive(Debug, Clone, Copy)]
pub struct Toggles {
    pub seasonality: bool,
    pub heatmap: bool,
    pub premium: bool,
    pub volatility: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegionPremium {
    pub city: String,
    pub premium_pct: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CityVolatility {
    pub city: String,
    pub observations: usize,
    pub mean: f64,
    pub std_dev: Option<f64>,
    pub cv_pct: Option<f64>,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct KpiRow {
    #[serde(rename = "Metric")]
    #[tabled(rename = "Metric")]
    pub metric: String,
    #[serde(rename = "Value")]
    #[tabled(rename = "Value")]
    pub value: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct SeasonRow {
    #[serde(rename = "Month")]
    #[tabled(rename = "Month")]
    pub month: u32,
    #[serde(rename = "AvgPrice")]
    #[tabled(rename = "AvgPrice")]
    pub avg_price: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct TrendRow {
    #[serde(rename = "City")]
    #[tabled(rename = "City")]
    pub city: String,
    #[serde(rename = "Date")]
    #[tabled(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "Price")]
    #[tabled(rename = "Price")]
    pub price: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct VolatilityRow {
    #[serde(rename = "City")]
    #[tabled(rename = "City")]
    pub city: String,
    #[serde(rename = "Observations")]
    #[tabled(rename = "Observations")]
    pub observations: usize,
    #[serde(rename = "MeanPrice")]
    #[tabled(rename = "MeanPrice")]
    pub mean_price: String,
    #[serde(rename = "StdDev")]
    #[tabled(rename = "StdDev")]
    pub std_dev: String,
    #[serde(rename = "CoeffOfVariation")]
    #[tabled(rename = "CoeffOfVariation")]
    pub cv_pct: String,
}

/// Dense city x year grid of average prices. `None` marks a city/year with
/// no observations.
#[derive(Debug, Clone, PartialEq)]
pub struct HeatmapGrid {
    pub years: Vec<i32>,
    pub rows: Vec<(String, Vec<Option<f64>>)>,
}

#[derive(Debug, Serialize)]
pub struct SummaryStats {
    pub total_records: usize,
    pub total_cities: usize,
    pub first_year: Option<i32>,
    pub last_year: Option<i32>,
    pub overall_avg: Option<f64>,
    pub scope_avg: Option<f64>,
    pub premium_city: Option<String>,
    pub premium_pct: Option<f64>,
    pub seasonal_peak: Option<u32>,
    pub seasonal_trough: Option<u32>,
}
