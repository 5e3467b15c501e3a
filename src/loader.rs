use std::io::Read;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord};
use once_cell::unsync::OnceCell;
use tracing::{debug, info, warn};

use crate::error::{ReportError, Result};
use crate::types::{Dataset, RawRow, Transaction};
use crate::util::{non_empty, parse_f64_safe, parse_i64_safe};

/// Logical column and the header names it may appear under.
struct ColumnSpec {
    name: &'static str,
    headers: &'static [&'static str],
}

const REQUIRED_COLUMNS: &[ColumnSpec] = &[
    ColumnSpec { name: "category_major", headers: &["category_major", "card_tpbuz_nm_1"] },
    ColumnSpec { name: "category_minor", headers: &["category_minor", "card_tpbuz_nm_2"] },
    ColumnSpec { name: "transaction_date", headers: &["transaction_date", "ta_ymd"] },
    ColumnSpec { name: "amount", headers: &["amount", "amt"] },
    ColumnSpec { name: "sex", headers: &["sex"] },
];

const AGE_COLUMN: ColumnSpec = ColumnSpec { name: "age", headers: &["age"] };
const TIME_BAND_COLUMN: ColumnSpec = ColumnSpec { name: "time_band", headers: &["time_band", "hour"] };

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub total_rows: usize,
    pub loaded_rows: usize,
    pub parse_errors: usize,
    pub invalid_ages: usize,
}

fn header_matches(headers: &StringRecord, spec: &ColumnSpec) -> usize {
    headers.iter().filter(|h| spec.headers.contains(&h.trim())).count()
}

fn has_column(headers: &StringRecord, spec: &ColumnSpec) -> bool {
    let found = header_matches(headers, spec) > 0;
    debug!(column = spec.name, found, "resolved column");
    found
}

/// Fails with every missing required column, not just the first. A column
/// present under two spellings is rejected too, since rows could not be
/// mapped onto it.
fn check_columns(headers: &StringRecord) -> Result<()> {
    let ambiguous: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .chain([&AGE_COLUMN, &TIME_BAND_COLUMN])
        .filter(|spec| header_matches(headers, spec) > 1)
        .map(|spec| spec.name.to_string())
        .collect();
    if !ambiguous.is_empty() {
        return Err(ReportError::AmbiguousColumns(ambiguous));
    }

    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|spec| !has_column(headers, spec))
        .map(|spec| spec.name.to_string())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ReportError::MissingColumns(missing))
    }
}

/// Every column the reports know about and whether the loaded file has it.
/// Required columns are always present once a dataset loads.
pub fn column_presence(data: &Dataset) -> Vec<(&'static str, bool)> {
    let mut columns: Vec<(&'static str, bool)> = REQUIRED_COLUMNS.iter().map(|spec| (spec.name, true)).collect();
    columns.push((AGE_COLUMN.name, data.has_age));
    columns.push((TIME_BAND_COLUMN.name, data.has_time_band));
    columns
}

pub fn load_dataset(path: impl AsRef<Path>) -> Result<(Dataset, LoadReport)> {
    let path = path.as_ref();
    info!(path = %path.display(), "loading dataset");
    let file = std::fs::File::open(path)?;
    read_dataset(file)
}

pub fn read_dataset<R: Read>(reader: R) -> Result<(Dataset, LoadReport)> {
    let mut rdr = ReaderBuilder::new().flexible(true).trim(csv::Trim::Headers).from_reader(reader);
    let headers = rdr.headers()?.clone();
    check_columns(&headers)?;

    let has_age = has_column(&headers, &AGE_COLUMN);
    let has_time_band = has_column(&headers, &TIME_BAND_COLUMN);
    let mut report = LoadReport::default();
    if !has_age {
        warn!("dataset has no age column; the age table will be skipped");
    }

    let mut records = Vec::new();
    for result in rdr.deserialize::<RawRow>() {
        report.total_rows += 1;
        let row = match result {
            Ok(r) => r,
            Err(e) => {
                debug!(error = %e, "skipping malformed row");
                report.parse_errors += 1;
                continue;
            }
        };

        let (Some(category_major), Some(category_minor)) =
            (non_empty(row.category_major), non_empty(row.category_minor))
        else {
            report.parse_errors += 1;
            continue;
        };
        let Some(amount) = parse_f64_safe(row.amount.as_deref()) else {
            report.parse_errors += 1;
            continue;
        };

        let age = match non_empty(row.age) {
            Some(raw) => {
                let parsed = parse_i64_safe(Some(&raw));
                if parsed.is_none() {
                    report.invalid_ages += 1;
                }
                parsed
            }
            None => None,
        };

        records.push(Transaction {
            category_major,
            category_minor,
            transaction_date: row.transaction_date.unwrap_or_default().trim().to_string(),
            amount,
            sex: non_empty(row.sex).unwrap_or_else(|| "Unknown".to_string()),
            age,
            time_band: non_empty(row.time_band),
        });
    }

    report.loaded_rows = records.len();
    if report.parse_errors > 0 {
        warn!(rows = report.parse_errors, "rows skipped due to parse/validation errors");
    }
    info!(total = report.total_rows, loaded = report.loaded_rows, "dataset loaded");
    Ok((Dataset::new(records, has_age, has_time_band), report))
}

/// Loads the dataset on first use and hands out the same copy afterwards.
/// Owned by the caller and passed to whoever needs the data.
pub struct DatasetCache {
    path: PathBuf,
    cell: OnceCell<(Dataset, LoadReport)>,
}

impl DatasetCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), cell: OnceCell::new() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.get().is_some()
    }

    pub fn get_or_load(&self) -> Result<&(Dataset, LoadReport)> {
        let loaded = self.cell.get_or_try_init(|| load_dataset(&self.path))?;
        if loaded.0.is_empty() {
            return Err(ReportError::EmptyDataset);
        }
        Ok(loaded)
    }

    pub fn dataset(&self) -> Result<&Dataset> {
        Ok(&self.get_or_load()?.0)
    }
}
