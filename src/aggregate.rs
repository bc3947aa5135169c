// Aggregations over the long price table.
//
// Every function here is a pure fold over `&[PriceRecord]`. Scalar results
// are `None` when there is nothing to average; grouped results simply omit
// keys without observations.
use crate::types::{CityVolatility, PriceRecord, RegionPremium, Scope};
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};

/// Running sum/count finalized to a mean.
#[derive(Debug, Clone, Copy, Default)]
struct MeanAcc {
    sum: f64,
    count: usize,
}

impl MeanAcc {
    fn add(&mut self, v: f64) {
        self.sum += v;
        self.count += 1;
    }

    fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

fn mean_of<'a>(records: impl IntoIterator<Item = &'a PriceRecord>) -> Option<f64> {
    let mut acc = MeanAcc::default();
    for r in records {
        acc.add(r.price);
    }
    acc.mean()
}

fn group_mean<K: Ord>(
    table: &[PriceRecord],
    key: impl Fn(&PriceRecord) -> K,
) -> BTreeMap<K, f64> {
    let mut groups: BTreeMap<K, MeanAcc> = BTreeMap::new();
    for r in table {
        groups.entry(key(r)).or_default().add(r.price);
    }
    groups
        .into_iter()
        .filter_map(|(k, acc)| acc.mean().map(|m| (k, m)))
        .collect()
}

/// Distinct city names in order of first appearance.
pub fn distinct_cities(table: &[PriceRecord]) -> Vec<&str> {
    let mut seen = BTreeSet::new();
    table
        .iter()
        .map(|r| r.city.as_str())
        .filter(|c| seen.insert(*c))
        .collect()
}

pub fn year_bounds(table: &[PriceRecord]) -> Option<(i32, i32)> {
    let min = table.iter().map(|r| r.year).min()?;
    let max = table.iter().map(|r| r.year).max()?;
    Some((min, max))
}

pub fn filter_scope(table: &[PriceRecord], scope: &Scope) -> Vec<PriceRecord> {
    table.iter().filter(|r| scope.contains(r)).cloned().collect()
}

pub fn overall_average(table: &[PriceRecord]) -> Option<f64> {
    mean_of(table)
}

/// Mean price inside `scope`; `None` when the scope selects nothing.
pub fn scope_average(table: &[PriceRecord], scope: &Scope) -> Option<f64> {
    mean_of(table.iter().filter(|r| scope.contains(r)))
}

/// First city (in table order) whose lower-cased name starts with the
/// lower-cased `prefix`.
pub fn resolve_region<'a>(table: &'a [PriceRecord], prefix: &str) -> Option<&'a str> {
    let prefix = prefix.to_lowercase();
    distinct_cities(table)
        .into_iter()
        .find(|c| c.to_lowercase().starts_with(&prefix))
}

/// Percentage by which the resolved region's mean price exceeds the mean of
/// every other city. `None` when no city matches or either side is empty.
pub fn region_premium(table: &[PriceRecord], prefix: &str) -> Option<RegionPremium> {
    let region = resolve_region(table, prefix)?;
    let inside = mean_of(table.iter().filter(|r| r.city == region))?;
    let rest = mean_of(table.iter().filter(|r| r.city != region))?;
    let premium_pct = (inside / rest - 1.0) * 100.0;
    premium_pct.is_finite().then(|| RegionPremium {
        city: region.to_string(),
        premium_pct,
    })
}

/// Mean price per calendar month, collapsing years and cities.
pub fn seasonal_profile(table: &[PriceRecord]) -> BTreeMap<u32, f64> {
    group_mean(table, |r| r.month)
}

/// `(peak, trough)` months of the seasonal profile. Ties go to the lowest
/// month number.
pub fn seasonal_peak_trough(table: &[PriceRecord]) -> Option<(u32, u32)> {
    let profile = seasonal_profile(table);
    let mut iter = profile.iter();
    let (&first_month, &first_value) = iter.next()?;
    let (mut peak, mut trough) = ((first_month, first_value), (first_month, first_value));
    for (&month, &value) in iter {
        if value > peak.1 {
            peak = (month, value);
        }
        if value < trough.1 {
            trough = (month, value);
        }
    }
    Some((peak.0, trough.0))
}

/// Mean price per `(city, year)`. Pairs with no observations are absent.
pub fn annual_city_matrix(table: &[PriceRecord]) -> BTreeMap<(String, i32), f64> {
    group_mean(table, |r| (r.city.clone(), r.year))
}

/// Per-city price series in date order.
pub fn city_trends(table: &[PriceRecord]) -> BTreeMap<String, Vec<(NaiveDate, f64)>> {
    let mut out: BTreeMap<String, Vec<(NaiveDate, f64)>> = BTreeMap::new();
    for r in table {
        out.entry(r.city.clone()).or_default().push((r.date, r.price));
    }
    for series in out.values_mut() {
        series.sort_by_key(|(d, _)| *d);
    }
    out
}

/// Spread of prices per city: sample standard deviation and coefficient of
/// variation.
pub fn city_volatility(table: &[PriceRecord]) -> Vec<CityVolatility> {
    city_trends(table)
        .into_iter()
        .map(|(city, series)| {
            let n = series.len();
            let mean = series.iter().map(|(_, p)| p).sum::<f64>() / n as f64;
            let std_dev = (n > 1).then(|| {
                let ss: f64 = series.iter().map(|(_, p)| (p - mean).powi(2)).sum();
                (ss / (n - 1) as f64).sqrt()
            });
            let cv_pct = std_dev
                .map(|sd| sd / mean * 100.0)
                .filter(|v| v.is_finite());
            CityVolatility {
                city,
                observations: n,
                mean,
                std_dev,
                cv_pct,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(city: &str, y: i32, m: u32, price: f64) -> PriceRecord {
        PriceRecord::new(city, NaiveDate::from_ymd_opt(y, m, 1).unwrap(), price)
    }

    #[test]
    fn test_overall_average() {
        let t = vec![rec("A", 2020, 1, 10.0), rec("A", 2020, 2, 20.0), rec("B", 2020, 1, 30.0)];
        assert_eq!(overall_average(&t), Some(20.0));
    }

    #[test]
    fn test_empty_table_degrades_gracefully() {
        let t: Vec<PriceRecord> = Vec::new();
        let scope = Scope::new(["A"], 2020, 2021);
        assert_eq!(overall_average(&t), None);
        assert_eq!(scope_average(&t, &scope), None);
        assert_eq!(region_premium(&t, "a"), None);
        assert!(seasonal_profile(&t).is_empty());
        assert_eq!(seasonal_peak_trough(&t), None);
        assert!(annual_city_matrix(&t).is_empty());
        assert!(city_volatility(&t).is_empty());
        assert_eq!(year_bounds(&t), None);
    }

    #[test]
    fn test_scope_average_filters_city_and_years() {
        let t = vec![
            rec("A", 2019, 1, 1000.0),
            rec("A", 2020, 1, 10.0),
            rec("A", 2021, 1, 30.0),
            rec("B", 2020, 1, 500.0),
        ];
        let scope = Scope::new(["A"], 2020, 2021);
        assert_eq!(scope_average(&t, &scope), Some(20.0));
        assert_eq!(filter_scope(&t, &scope).len(), 2);
    }

    #[test]
    fn test_scope_average_unknown_city_is_none() {
        let t = vec![rec("A", 2020, 1, 10.0)];
        let scope = Scope::new(["Nowhere"], 2020, 2020);
        assert_eq!(scope_average(&t, &scope), None);
    }

    #[test]
    fn test_region_premium() {
        let t = vec![
            rec("A", 2020, 1, 100.0),
            rec("A", 2020, 2, 100.0),
            rec("B", 2020, 1, 50.0),
            rec("B", 2020, 2, 50.0),
        ];
        let p = region_premium(&t, "a").unwrap();
        assert_eq!(p.city, "A");
        assert!((p.premium_pct - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_region_premium_unresolved() {
        let t = vec![rec("A", 2020, 1, 100.0), rec("B", 2020, 1, 50.0)];
        assert_eq!(region_premium(&t, "mosc"), None);
    }

    #[test]
    fn test_region_premium_without_other_cities() {
        let t = vec![rec("Moscow", 2020, 1, 100.0)];
        assert_eq!(region_premium(&t, "mosc"), None);
    }

    #[test]
    fn test_resolve_region_first_match_wins() {
        let t = vec![
            rec("Moscow region", 2020, 1, 1.0),
            rec("Moscow", 2020, 1, 2.0),
            rec("Omsk", 2020, 1, 3.0),
        ];
        assert_eq!(resolve_region(&t, "MOSC"), Some("Moscow region"));
    }

    #[test]
    fn test_seasonal_peak_trough() {
        let t = vec![
            rec("A", 2020, 7, 40.0),
            rec("A", 2021, 7, 60.0),
            rec("A", 2020, 1, 10.0),
            rec("A", 2021, 1, 30.0),
            rec("A", 2020, 3, 35.0),
        ];
        let profile = seasonal_profile(&t);
        assert_eq!(profile.get(&7), Some(&50.0));
        assert_eq!(profile.get(&1), Some(&20.0));
        assert_eq!(seasonal_peak_trough(&t), Some((7, 1)));
    }

    #[test]
    fn test_seasonal_ties_pick_lowest_month() {
        let t = vec![rec("A", 2020, 2, 5.0), rec("A", 2020, 9, 5.0), rec("A", 2020, 4, 5.0)];
        assert_eq!(seasonal_peak_trough(&t), Some((2, 2)));
    }

    #[test]
    fn test_annual_city_matrix_omits_missing_pairs() {
        let t = vec![
            rec("A", 2020, 1, 10.0),
            rec("A", 2020, 2, 20.0),
            rec("B", 2021, 1, 7.0),
        ];
        let m = annual_city_matrix(&t);
        assert_eq!(m.len(), 2);
        assert_eq!(m.get(&("A".to_string(), 2020)), Some(&15.0));
        assert_eq!(m.get(&("B".to_string(), 2021)), Some(&7.0));
        assert_eq!(m.get(&("A".to_string(), 2021)), None);
    }

    #[test]
    fn test_city_trends_are_date_ordered() {
        let t = vec![rec("A", 2021, 1, 2.0), rec("A", 2020, 1, 1.0)];
        let trends = city_trends(&t);
        let dates: Vec<NaiveDate> = trends["A"].iter().map(|(d, _)| *d).collect();
        assert!(dates[0] < dates[1]);
    }

    #[test]
    fn test_city_volatility() {
        let t = vec![
            rec("A", 2020, 1, 10.0),
            rec("A", 2020, 2, 20.0),
            rec("A", 2020, 3, 30.0),
            rec("B", 2020, 1, 5.0),
        ];
        let v = city_volatility(&t);
        assert_eq!(v.len(), 2);
        assert_eq!(v[0].observations, 3);
        assert_eq!(v[0].mean, 20.0);
        assert!((v[0].std_dev.unwrap() - 10.0).abs() < 1e-9);
        assert!((v[0].cv_pct.unwrap() - 50.0).abs() < 1e-9);
        assert_eq!(v[1].std_dev, None);
        assert_eq!(v[1].cv_pct, None);
    }

    #[test]
    fn test_distinct_cities_keep_first_seen_order() {
        let t = vec![rec("B", 2020, 1, 1.0), rec("A", 2020, 1, 1.0), rec("B", 2020, 2, 1.0)];
        assert_eq!(distinct_cities(&t), vec!["B", "A"]);
        assert_eq!(year_bounds(&t), Some((2020, 2020)));
    }
}
