use crate::error::{ReportError, Result};
use crate::normalize::{normalize, read_wide};
use crate::types::{CacheRow, CachedRow, PriceRecord};
use crate::util::{parse_iso_date, parse_price};
use csv::{ReaderBuilder, WriterBuilder};
use once_cell::unsync::OnceCell;
use std::fs::File;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Where the long table came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    Cache,
    Raw,
}

#[derive(Debug, Clone)]
pub struct LoadReport {
    pub source: LoadSource,
    pub rows_read: usize,
    pub records: usize,
    pub skipped: usize,
}

/// Well-known locations of the normalized cache and the raw wide source.
#[derive(Debug, Clone)]
pub struct DataSources {
    pub long_path: PathBuf,
    pub raw_path: PathBuf,
}

/// Session context: loads the long table on first use and hands out the
/// same value afterwards without touching storage again.
pub struct Dataset {
    sources: DataSources,
    loaded: OnceCell<(Vec<PriceRecord>, LoadReport)>,
}

impl Dataset {
    pub fn new(sources: DataSources) -> Self {
        Self {
            sources,
            loaded: OnceCell::new(),
        }
    }

    pub fn table(&self) -> Result<&[PriceRecord]> {
        Ok(&self.load()?.0)
    }

    pub fn report(&self) -> Result<&LoadReport> {
        Ok(&self.load()?.1)
    }

    fn load(&self) -> Result<&(Vec<PriceRecord>, LoadReport)> {
        self.loaded
            .get_or_try_init(|| load_long_table(&self.sources))
    }
}

/// Load the long table, preferring the cache and falling back to the raw
/// wide source. The fallback writes the cache for later runs.
pub fn load_long_table(sources: &DataSources) -> Result<(Vec<PriceRecord>, LoadReport)> {
    let (mut table, report) = match open_if_exists(&sources.long_path)? {
        Some(file) => {
            info!(path = %sources.long_path.display(), "loading normalized cache");
            read_cached(&sources.long_path, file)?
        }
        None => {
            let Some(file) = open_if_exists(&sources.raw_path)? else {
                return Err(ReportError::DataUnavailable {
                    long_path: sources.long_path.clone(),
                    raw_path: sources.raw_path.clone(),
                });
            };
            info!(path = %sources.raw_path.display(), "cache missing; normalizing raw wide file");
            let raw = read_wide(ReaderBuilder::new().flexible(true).from_reader(file))?;
            let table = normalize(&raw);
            write_cache(&sources.long_path, &table)?;
            let report = LoadReport {
                source: LoadSource::Raw,
                rows_read: raw.len(),
                records: table.len(),
                skipped: 0,
            };
            (table, report)
        }
    };

    // Stored artifacts may predate the derived columns.
    for r in &mut table {
        r.refresh_derived();
    }

    debug!(
        source = ?report.source,
        rows_read = report.rows_read,
        records = report.records,
        skipped = report.skipped,
        "long table ready"
    );
    Ok((table, report))
}

fn open_if_exists(path: &Path) -> Result<Option<File>> {
    match File::open(path) {
        Ok(f) => Ok(Some(f)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(source) => Err(ReportError::FileRead {
            path: path.to_path_buf(),
            source,
        }),
    }
}

const CACHE_COLUMNS: [&str; 3] = ["city", "date", "price"];

fn read_cached(path: &Path, file: File) -> Result<(Vec<PriceRecord>, LoadReport)> {
    let mut rdr = ReaderBuilder::new().flexible(true).from_reader(file);
    let headers = rdr.headers()?;
    for column in ["date", "price"] {
        if !headers.iter().any(|h| h == column) {
            return Err(ReportError::MissingColumn {
                path: path.to_path_buf(),
                column,
            });
        }
    }
    let mut rows_read = 0usize;
    let mut skipped = 0usize;
    let mut table = Vec::new();

    for result in rdr.deserialize::<CachedRow>() {
        rows_read += 1;
        let row = match result {
            Ok(r) => r,
            Err(e) => {
                debug!(row = rows_read, error = %e, "unreadable cache row");
                skipped += 1;
                continue;
            }
        };
        let date = parse_iso_date(row.date.as_deref());
        let price = parse_price(row.price.as_deref());
        let (Some(date), Some(price)) = (date, price) else {
            skipped += 1;
            continue;
        };
        table.push(PriceRecord::new(row.city.unwrap_or_default(), date, price));
    }

    if skipped > 0 {
        warn!(skipped, "skipped cache rows without a valid date or price");
    }
    let report = LoadReport {
        source: LoadSource::Cache,
        rows_read,
        records: table.len(),
        skipped,
    };
    Ok((table, report))
}

/// Write the cache through a sibling temp file renamed into place, so a
/// failed write never leaves a partial cache behind.
pub fn write_cache(path: &Path, table: &[PriceRecord]) -> Result<()> {
    let parent = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(p) => p,
        None => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;
    let mut tmp = NamedTempFile::new_in(parent)?;
    {
        let mut wtr = WriterBuilder::new()
            .has_headers(false)
            .from_writer(tmp.as_file_mut());
        wtr.write_record(CACHE_COLUMNS)?;
        for r in table {
            wtr.serialize(CacheRow::from(r))?;
        }
        wtr.flush()?;
    }
    tmp.persist(path).map_err(|e| e.error)?;
    info!(path = %path.display(), records = table.len(), "wrote normalized cache");
    Ok(())
}
