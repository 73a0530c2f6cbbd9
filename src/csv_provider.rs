use crate::symbol::Symbol;
use crate::time_series::{DataLoadError, DataProvider, StockRecord};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use csv::{ReaderBuilder, StringRecord, Trim};
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

const REQUIRED_COLUMNS: [&str; 4] = ["symbol", "date", "close", "volume"];

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Options for parsing delimited input.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Field delimiter (default: `,`)
    pub delimiter: u8,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        LoaderConfig { delimiter: b',' }
    }
}

/// Column positions of the required fields within a header row.
#[derive(Debug, Clone, Copy)]
struct ColumnIndex {
    symbol: usize,
    date: usize,
    close: usize,
    volume: usize,
}

impl ColumnIndex {
    fn from_headers(headers: &StringRecord, source: &str) -> Result<Self, DataLoadError> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|header| header.trim().eq_ignore_ascii_case(name))
                .ok_or_else(|| DataLoadError::MissingColumn {
                    source: source.to_string(),
                    column: name.to_string(),
                })
        };

        Ok(ColumnIndex {
            symbol: find(REQUIRED_COLUMNS[0])?,
            date: find(REQUIRED_COLUMNS[1])?,
            close: find(REQUIRED_COLUMNS[2])?,
            volume: find(REQUIRED_COLUMNS[3])?,
        })
    }
}

/// Delimited-file data provider.
///
/// Reads a table with at least `Symbol, Date, Close, Volume` columns (matched
/// case-insensitively, extra columns ignored) and normalizes every date to a
/// calendar date. The whole file is parsed on each call to
/// [`DataProvider::load_records`]; any bad row fails the entire load.
#[derive(Debug, Clone)]
pub struct CsvDataProvider {
    path: PathBuf,
    config: LoaderConfig,
}

impl CsvDataProvider {
    /// Creates a provider for the file at `path`.
    ///
    /// The file is not opened until records are loaded.
    pub fn new<P: AsRef<Path>>(path: P, config: LoaderConfig) -> Self {
        CsvDataProvider {
            path: path.as_ref().to_path_buf(),
            config,
        }
    }

    /// Parses records from any reader.
    ///
    /// `source` names the input in error messages.
    pub fn from_reader<R: Read>(
        reader: R,
        source: &str,
        config: &LoaderConfig,
    ) -> Result<Vec<StockRecord>, DataLoadError> {
        let mut rdr = ReaderBuilder::new()
            .delimiter(config.delimiter)
            .trim(Trim::All)
            .has_headers(true)
            .from_reader(reader);

        let headers = rdr
            .headers()
            .map_err(|e| DataLoadError::Unreadable {
                source: source.to_string(),
                message: e.to_string(),
            })?
            .clone();
        let columns = ColumnIndex::from_headers(&headers, source)?;

        let mut records = Vec::new();
        for (index, row) in rdr.records().enumerate() {
            // Header occupies line 1; quoted fields may span further lines.
            let fallback = index + 2;
            let row = row.map_err(|e| DataLoadError::InvalidRow {
                source: source.to_string(),
                row: e.position().map_or(fallback, |pos| pos.line() as usize),
                message: e.to_string(),
            })?;
            let line = row.position().map_or(fallback, |pos| pos.line() as usize);
            let record = parse_row(&row, &columns).map_err(|message| DataLoadError::InvalidRow {
                source: source.to_string(),
                row: line,
                message,
            })?;
            records.push(record);
        }

        if records.is_empty() {
            return Err(DataLoadError::Empty {
                source: source.to_string(),
            });
        }

        log::debug!("Parsed {} records from {}", records.len(), source);
        Ok(records)
    }
}

impl DataProvider for CsvDataProvider {
    fn load_records(&self) -> Result<Vec<StockRecord>, DataLoadError> {
        let source = self.path.display().to_string();
        let file = File::open(&self.path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => DataLoadError::NotFound {
                source: source.clone(),
            },
            _ => DataLoadError::Unreadable {
                source: source.clone(),
                message: e.to_string(),
            },
        })?;

        let records = Self::from_reader(file, &source, &self.config)?;
        log::info!("Loaded {} records from {}", records.len(), source);
        Ok(records)
    }
}

fn field<'r>(row: &'r StringRecord, index: usize, name: &str) -> Result<&'r str, String> {
    row.get(index)
        .ok_or_else(|| format!("missing {} field", name))
}

fn parse_row(row: &StringRecord, columns: &ColumnIndex) -> Result<StockRecord, String> {
    let symbol = Symbol::new(field(row, columns.symbol, "symbol")?).map_err(|e| e.to_string())?;

    let raw_date = field(row, columns.date, "date")?;
    let date = parse_date(raw_date).ok_or_else(|| format!("unparsable date '{}'", raw_date))?;

    let raw_close = field(row, columns.close, "close")?;
    let close = raw_close
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| format!("invalid close '{}'", raw_close))?;

    let raw_volume = field(row, columns.volume, "volume")?;
    let volume =
        parse_volume(raw_volume).ok_or_else(|| format!("invalid volume '{}'", raw_volume))?;

    Ok(StockRecord::new(symbol, date, close, volume))
}

/// Normalizes a date or timestamp string to its calendar date.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return Some(date);
        }
    }

    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return Some(timestamp.date_naive());
    }

    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|datetime| datetime.date())
}

/// Accepts integer volumes and integral floats such as `1200.0`.
fn parse_volume(raw: &str) -> Option<u64> {
    if let Ok(volume) = raw.parse::<u64>() {
        return Some(volume);
    }

    let value = raw.parse::<f64>().ok()?;
    if value.is_finite() && value >= 0.0 && value.fract() == 0.0 && value <= u64::MAX as f64 {
        Some(value as u64)
    } else {
        None
    }
}
