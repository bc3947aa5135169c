// Entry point and high-level CLI flow.
//
// The dataset is loaded once into a `Dataset` session context (preferring
// the normalized cache, rebuilding it from the raw wide file when missing),
// then every enabled view is rendered from that single table:
// - KPI summary (overall/scope average, regional premium, seasonal peak).
// - Trend by city for the selected scope.
// - Seasonality and the city x year heatmap.
// - Optional volatility by city.
mod aggregate;
mod error;
mod loader;
mod normalize;
mod output;
mod reports;
mod settings;
mod types;
mod util;

use aggregate::filter_scope;
use anyhow::Context;
use clap::Parser;
use loader::{Dataset, LoadSource};
use settings::Settings;
use types::{PriceRecord, Scope, Toggles};

/// Print the load diagnostics for the session's table.
fn print_load_summary(dataset: &Dataset) -> anyhow::Result<()> {
    let report = dataset.report()?;
    let origin = match report.source {
        LoadSource::Cache => "normalized cache",
        LoadSource::Raw => "raw wide file",
    };
    println!(
        "Processing dataset... ({} records from {}, {} rows read)",
        util::format_int(report.records),
        origin,
        util::format_int(report.rows_read)
    );
    if report.skipped > 0 {
        println!(
            "Note: {} rows skipped due to a missing date or price.",
            util::format_int(report.skipped)
        );
    }
    println!();
    Ok(())
}

fn describe_scope(scope: &Scope) -> String {
    let cities: Vec<&str> = scope.cities.iter().map(String::as_str).collect();
    format!(
        "{} | {}–{}",
        if cities.is_empty() { "no cities".to_string() } else { cities.join(", ") },
        scope.min_year,
        scope.max_year
    )
}

/// Render every enabled view; write exports when `out_dir` is set.
fn render_reports(
    settings: &Settings,
    table: &[PriceRecord],
    scope: &Scope,
    toggles: Toggles,
) -> anyhow::Result<()> {
    let rows = settings.preview_rows;
    let scoped = filter_scope(table, scope);
    let base = reports::display_base(&scoped, table);
    let out_dir = settings.out_dir.as_deref();
    if let Some(dir) = out_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating output directory {}", dir.display()))?;
    }

    let summary = reports::generate_summary(table, scope, &settings.region_prefix);
    let kpis = reports::generate_kpis(&summary, &settings.unit, toggles.premium);
    output::preview_table("Key figures", Some(describe_scope(scope).as_str()), &kpis, kpis.len());

    let trends = reports::generate_trends(&scoped);
    if trends.is_empty() {
        println!("Trend by city (selected)\n");
        println!("No data for the current selection. Try widening the year range or selecting more cities.\n");
    } else {
        output::preview_table("Trend by city (selected)", None, &trends, rows);
    }

    if toggles.seasonality {
        let season = reports::generate_seasonality(base);
        output::preview_table("Seasonality (average by calendar month)", None, &season, 12);
        if let Some(dir) = out_dir {
            output::write_csv(&dir.join("seasonality.csv"), &season)?;
        }
    }

    if toggles.heatmap {
        println!("City x Year heatmap (average price)\n");
        let grid = reports::generate_heatmap(base);
        if grid.is_empty() {
            println!("Not enough data to render the heatmap for the current selection.\n");
        } else {
            let records = grid.to_records(2);
            output::preview_records(&records, rows);
            if let Some(dir) = out_dir {
                output::write_records(&dir.join("city_year_heatmap.csv"), &records)?;
            }
        }
    }

    if toggles.volatility {
        let vol = reports::generate_volatility(base);
        output::preview_table("Volatility by city", Some("sorted by coefficient of variation"), &vol, rows);
        if let Some(dir) = out_dir {
            output::write_csv(&dir.join("volatility.csv"), &vol)?;
        }
    }

    if let Some(dir) = out_dir {
        output::write_csv(&dir.join("trends.csv"), &trends)?;
        output::write_json(&dir.join("summary.json"), &summary)?;
        println!("(Full tables exported to {})\n", dir.display());
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let settings = Settings::parse();
    settings::setup_logging(&settings.log_level);

    let dataset = Dataset::new(settings.sources());
    let table = dataset.table().context("loading price dataset")?;
    print_load_summary(&dataset)?;

    if let Some(path) = &settings.export_wide {
        normalize::write_wide(path, &normalize::to_wide(table))
            .with_context(|| format!("writing wide export {}", path.display()))?;
        println!("Wide table exported to {}\n", path.display());
    }

    let scope = settings.scope(table);
    render_reports(&settings, table, &scope, settings.toggles())
}
