use crate::aggregate::{
    annual_city_matrix, city_trends, city_volatility, distinct_cities, overall_average, region_premium,
    scope_average, seasonal_peak_trough, seasonal_profile, year_bounds,
};
use crate::types::{
    HeatmapGrid, KpiRow, PriceRecord, Scope, SeasonRow, SummaryStats, TrendRow, VolatilityRow,
};
use crate::util::{format_number, format_opt};
use std::collections::BTreeSet;

/// Views that fall back to the whole table when the scope is empty use this.
pub fn display_base<'a>(scoped: &'a [PriceRecord], full: &'a [PriceRecord]) -> &'a [PriceRecord] {
    if scoped.is_empty() {
        full
    } else {
        scoped
    }
}

pub fn generate_summary(table: &[PriceRecord], scope: &Scope, region_prefix: &str) -> SummaryStats {
    let bounds = year_bounds(table);
    let premium = region_premium(table, region_prefix);
    let peak_trough = seasonal_peak_trough(table);
    SummaryStats {
        total_records: table.len(),
        total_cities: distinct_cities(table).len(),
        first_year: bounds.map(|b| b.0),
        last_year: bounds.map(|b| b.1),
        overall_avg: overall_average(table),
        scope_avg: scope_average(table, scope),
        premium_city: premium.as_ref().map(|p| p.city.clone()),
        premium_pct: premium.map(|p| p.premium_pct),
        seasonal_peak: peak_trough.map(|p| p.0),
        seasonal_trough: peak_trough.map(|p| p.1),
    }
}

pub fn generate_kpis(summary: &SummaryStats, unit: &str, show_premium: bool) -> Vec<KpiRow> {
    let with_unit = |v: Option<f64>| match v {
        Some(v) if v.is_finite() => format!("{} {}", format_number(v, 2), unit),
        _ => "—".to_string(),
    };
    let mut rows = vec![
        KpiRow {
            metric: "Overall average price".to_string(),
            value: with_unit(summary.overall_avg),
        },
        KpiRow {
            metric: "Selected scope avg".to_string(),
            value: with_unit(summary.scope_avg),
        },
    ];
    if show_premium {
        rows.push(match (&summary.premium_city, summary.premium_pct) {
            (Some(city), Some(pct)) => KpiRow {
                metric: format!("{} premium (overall)", city),
                value: format!("{}%", format_number(pct, 1)),
            },
            _ => KpiRow {
                metric: "Region premium".to_string(),
                value: "N/A".to_string(),
            },
        });
    }
    rows.push(KpiRow {
        metric: "Seasonal peak / trough".to_string(),
        value: match (summary.seasonal_peak, summary.seasonal_trough) {
            (Some(p), Some(t)) => format!("{} / {}", p, t),
            _ => "—".to_string(),
        },
    });
    rows
}

pub fn generate_seasonality(table: &[PriceRecord]) -> Vec<SeasonRow> {
    seasonal_profile(table)
        .into_iter()
        .map(|(month, avg)| SeasonRow {
            month,
            avg_price: format_number(avg, 2),
        })
        .collect()
}

pub fn generate_heatmap(table: &[PriceRecord]) -> HeatmapGrid {
    let matrix = annual_city_matrix(table);
    let years: Vec<i32> = matrix
        .keys()
        .map(|(_, y)| *y)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let cities: BTreeSet<&str> = matrix.keys().map(|(c, _)| c.as_str()).collect();
    let rows = cities
        .into_iter()
        .map(|city| {
            let cells = years
                .iter()
                .map(|y| matrix.get(&(city.to_string(), *y)).copied())
                .collect();
            (city.to_string(), cells)
        })
        .collect();
    HeatmapGrid { years, rows }
}

impl HeatmapGrid {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Header plus one row per city; absent cells render as a dash.
    pub fn to_records(&self, decimals: usize) -> Vec<Vec<String>> {
        let header: Vec<String> = std::iter::once("City".to_string())
            .chain(self.years.iter().map(|y| y.to_string()))
            .collect();
        let body = self.rows.iter().map(|(city, cells)| {
            std::iter::once(city.clone())
                .chain(cells.iter().map(|c| format_opt(*c, decimals)))
                .collect::<Vec<String>>()
        });
        std::iter::once(header).chain(body).collect()
    }
}

/// One row per observation, grouped by city and date-ordered within each
/// city regardless of the table's order.
pub fn generate_trends(scoped: &[PriceRecord]) -> Vec<TrendRow> {
    city_trends(scoped)
        .into_iter()
        .flat_map(|(city, series)| {
            series.into_iter().map(move |(date, price)| TrendRow {
                city: city.clone(),
                date,
                price: format_number(price, 2),
            })
        })
        .collect()
}

pub fn generate_volatility(table: &[PriceRecord]) -> Vec<VolatilityRow> {
    let mut stats = city_volatility(table);
    stats.sort_by(|a, b| {
        b.cv_pct
            .unwrap_or(f64::MIN)
            .total_cmp(&a.cv_pct.unwrap_or(f64::MIN))
            .then_with(|| a.city.cmp(&b.city))
    });
    stats
        .into_iter()
        .map(|v| VolatilityRow {
            city: v.city,
            observations: v.observations,
            mean_price: format_number(v.mean, 2),
            std_dev: format_opt(v.std_dev, 2),
            cv_pct: format_opt(v.cv_pct, 1),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn rec(city: &str, y: i32, m: u32, price: f64) -> PriceRecord {
        PriceRecord::new(city, NaiveDate::from_ymd_opt(y, m, 1).unwrap(), price)
    }

    fn sample() -> Vec<PriceRecord> {
        vec![
            rec("Moscow", 2020, 1, 100.0),
            rec("Moscow", 2021, 7, 100.0),
            rec("Omsk", 2020, 1, 40.0),
            rec("Omsk", 2020, 7, 60.0),
        ]
    }

    #[test]
    fn test_summary_and_kpis() {
        let table = sample();
        let scope = Scope::new(["Omsk"], 2020, 2020);
        let summary = generate_summary(&table, &scope, "mosc");
        assert_eq!(summary.total_records, 4);
        assert_eq!(summary.total_cities, 2);
        assert_eq!((summary.first_year, summary.last_year), (Some(2020), Some(2021)));
        assert_eq!(summary.scope_avg, Some(50.0));
        assert_eq!(summary.premium_city.as_deref(), Some("Moscow"));

        let kpis = generate_kpis(&summary, "rub/kg", true);
        assert_eq!(kpis[0].value, "75.00 rub/kg");
        assert_eq!(kpis[2].metric, "Moscow premium (overall)");
        assert_eq!(kpis[2].value, "100.0%");
        assert_eq!(kpis[3].value, "7 / 1");
    }

    #[test]
    fn test_kpis_render_placeholders() {
        let table = sample();
        let scope = Scope::new(["Tver"], 2020, 2021);
        let summary = generate_summary(&table, &scope, "kaz");
        let kpis = generate_kpis(&summary, "rub/kg", true);
        assert_eq!(kpis[1].value, "—");
        assert_eq!(kpis[2].metric, "Region premium");
        assert_eq!(kpis[2].value, "N/A");

        let without_premium = generate_kpis(&summary, "rub/kg", false);
        assert_eq!(without_premium.len(), 3);
    }

    #[test]
    fn test_kpis_on_empty_table() {
        let summary = generate_summary(&[], &Scope::new(Vec::<String>::new(), 0, 0), "mosc");
        let kpis = generate_kpis(&summary, "rub/kg", true);
        assert!(kpis.iter().all(|k| k.value == "—" || k.value == "N/A"));
    }

    #[test]
    fn test_heatmap_marks_absent_cells() {
        let grid = generate_heatmap(&sample());
        assert_eq!(grid.years, vec![2020, 2021]);
        assert_eq!(grid.rows[1], ("Omsk".to_string(), vec![Some(50.0), None]));
        let records = grid.to_records(2);
        assert_eq!(records[0], vec!["City", "2020", "2021"]);
        assert_eq!(records[2], vec!["Omsk", "50.00", "—"]);
    }

    #[test]
    fn test_display_base_falls_back_to_full_table() {
        let full = sample();
        assert_eq!(display_base(&[], &full).len(), 4);
        assert_eq!(display_base(&full[..1], &full).len(), 1);
    }

    #[test]
    fn test_seasonality_rows_in_month_order() {
        let rows = generate_seasonality(&sample());
        let months: Vec<u32> = rows.iter().map(|r| r.month).collect();
        assert_eq!(months, vec![1, 7]);
        assert_eq!(rows[0].avg_price, "70.00");
    }

    #[test]
    fn test_volatility_sorted_by_spread() {
        let mut table = sample();
        table.push(rec("Omsk", 2021, 1, 80.0));
        let rows = generate_volatility(&table);
        assert_eq!(rows[0].city, "Omsk");
        assert_eq!(rows[1].city, "Moscow");
        assert_eq!(rows[1].std_dev, "0.00");
    }

    #[test]
    fn test_trends_are_date_ordered_for_unsorted_input() {
        let table = vec![
            rec("Omsk", 2021, 3, 3.0),
            rec("Moscow", 2020, 5, 9.0),
            rec("Omsk", 2020, 1, 1.0),
            rec("Omsk", 2020, 11, 2.0),
        ];
        let rows = generate_trends(&table);
        let keys: Vec<(&str, NaiveDate)> = rows.iter().map(|r| (r.city.as_str(), r.date)).collect();
        let d = |y, m| NaiveDate::from_ymd_opt(y, m, 1).unwrap();
        assert_eq!(
            keys,
            vec![
                ("Moscow", d(2020, 5)),
                ("Omsk", d(2020, 1)),
                ("Omsk", d(2020, 11)),
                ("Omsk", d(2021, 3)),
            ]
        );
        assert_eq!(rows[1].price, "1.00");
    }
}
