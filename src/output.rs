use crate::error::Result;
use serde::Serialize;
use std::path::Path;
use tabled::{builder::Builder, settings::Style, Table, Tabled};

pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    for r in rows {
        wtr.serialize(r)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write pre-rendered records (header first) as CSV.
pub fn write_records(path: &Path, records: &[Vec<String>]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    for r in records {
        wtr.write_record(r)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s)?;
    Ok(())
}

pub fn preview_table<T>(title: &str, note: Option<&str>, rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    println!("{}", title);
    if let Some(n) = note {
        println!("({})", n);
    }
    println!();
    preview_table_rows(rows, max_rows);
}

pub fn preview_table_rows<T>(rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().take(max_rows).cloned().collect();
    if slice.is_empty() {
        println!("(no rows)\n");
        return;
    }
    let table_str = Table::new(slice).with(Style::markdown()).to_string();
    println!("{}\n", table_str);
}

/// Preview a grid whose columns are only known at runtime. The first record
/// is the header and is always shown.
pub fn preview_records(records: &[Vec<String>], max_rows: usize) {
    if records.len() <= 1 {
        println!("(no rows)\n");
        return;
    }
    let mut builder = Builder::default();
    for r in records.iter().take(max_rows + 1) {
        builder.push_record(r.iter().cloned());
    }
    let table_str = builder.build().with(Style::markdown()).to_string();
    println!("{}\n", table_str);
}
