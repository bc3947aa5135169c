// Wide-to-long reshaping of the raw price table.
//
// The raw file has one row per city and one column per `month.year` token.
// The long table has one `PriceRecord` per non-empty cell.
use crate::error::Result;
use crate::types::{PriceRecord, RawWideRow};
use crate::util::{parse_month_year, parse_price};
use chrono::{Datelike, NaiveDate};
use csv::StringRecord;
use std::collections::BTreeSet;
use std::io::Read;
use std::path::Path;
use tracing::debug;

pub const CITY_COLUMN: &str = "city";

/// Bind the first header to the canonical `city` field, whatever it was
/// called in the source. Returns the value headers (everything after it).
pub fn bind_city_column(headers: &StringRecord) -> Vec<String> {
    if let Some(first) = headers.get(0) {
        if first != CITY_COLUMN {
            debug!(original = first, "renaming first column to city");
        }
    }
    headers.iter().skip(1).map(str::to_string).collect()
}

pub fn read_wide<R: Read>(mut rdr: csv::Reader<R>) -> Result<Vec<RawWideRow>> {
    let value_headers = bind_city_column(rdr.headers()?);
    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result?;
        let city = record.get(0).unwrap_or_default().to_string();
        let cells = value_headers
            .iter()
            .enumerate()
            .map(|(i, token)| {
                let value = record
                    .get(i + 1)
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(str::to_string);
                (token.clone(), value)
            })
            .collect();
        rows.push(RawWideRow { city, cells });
    }
    Ok(rows)
}

/// Reshape wide rows into long records sorted by `(city, date)`.
///
/// A candidate is dropped when its column header is not a date token or its
/// cell holds no price. Nothing else is validated.
pub fn normalize(raw: &[RawWideRow]) -> Vec<PriceRecord> {
    let mut out = Vec::new();
    let mut bad_tokens: BTreeSet<&str> = BTreeSet::new();
    let mut empty_cells = 0usize;

    for row in raw {
        for (token, value) in &row.cells {
            let date = match parse_month_year(token) {
                Ok(d) => d,
                Err(_) => {
                    bad_tokens.insert(token.as_str());
                    continue;
                }
            };
            let Some(price) = parse_price(value.as_deref()) else {
                empty_cells += 1;
                continue;
            };
            out.push(PriceRecord::new(row.city.clone(), date, price));
        }
    }

    if !bad_tokens.is_empty() {
        debug!(?bad_tokens, "dropped columns with malformed date tokens");
    }
    debug!(
        rows = raw.len(),
        records = out.len(),
        empty_cells,
        "normalized wide table"
    );

    out.sort_by(|a, b| a.city.cmp(&b.city).then(a.date.cmp(&b.date)));
    out
}

/// Inverse of [`normalize`]: one row per city (first-seen order), one column
/// per distinct month in ascending date order.
pub fn to_wide(table: &[PriceRecord]) -> Vec<RawWideRow> {
    let dates: BTreeSet<NaiveDate> = table.iter().map(|r| r.date).collect();
    let dates: Vec<NaiveDate> = dates.into_iter().collect();
    let tokens: Vec<String> = dates
        .iter()
        .map(|d| format!("{}.{}", d.month(), d.year()))
        .collect();

    let mut rows: Vec<RawWideRow> = Vec::new();
    for r in table {
        let idx = match rows.iter().position(|row| row.city == r.city) {
            Some(i) => i,
            None => {
                rows.push(RawWideRow {
                    city: r.city.clone(),
                    cells: tokens.iter().map(|t| (t.clone(), None)).collect(),
                });
                rows.len() - 1
            }
        };
        if let Ok(col) = dates.binary_search(&r.date) {
            rows[idx].cells[col].1 = Some(r.price.to_string());
        }
    }
    rows
}

pub fn write_wide(path: &Path, rows: &[RawWideRow]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    if let Some(first) = rows.first() {
        let header = std::iter::once(CITY_COLUMN).chain(first.cells.iter().map(|(t, _)| t.as_str()));
        wtr.write_record(header)?;
    }
    for row in rows {
        let values = row
            .cells
            .iter()
            .map(|(_, v)| v.as_deref().unwrap_or_default());
        wtr.write_record(std::iter::once(row.city.as_str()).chain(values))?;
    }
    wtr.flush()?;
    Ok(())
}
