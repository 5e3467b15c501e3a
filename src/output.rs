use std::path::{Path, PathBuf};

use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};
use tracing::info;

use crate::error::Result;
use crate::pipeline::AggregateReport;
use crate::types::SummaryStats;

pub const MONTHLY_FILE: &str = "monthly_sales.csv";
pub const GENDER_FILE: &str = "gender_sales.csv";
pub const AGE_FILE: &str = "age_sales.csv";
pub const WEEKDAY_FILE: &str = "weekday_sales.csv";
pub const HOUR_FILE: &str = "hour_sales.csv";
pub const SUMMARY_FILE: &str = "summary.json";

pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    for r in rows {
        wtr.serialize(r)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s)?;
    Ok(())
}

/// Write every produced table plus the summary into `dir`, creating it if
/// needed. Returns the files written, in table order.
pub fn write_report(dir: &Path, report: &AggregateReport, summary: &SummaryStats) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    let mut written = Vec::new();

    let path = dir.join(MONTHLY_FILE);
    write_csv(&path, &report.monthly)?;
    written.push(path);
    let path = dir.join(GENDER_FILE);
    write_csv(&path, &report.gender)?;
    written.push(path);
    if let Some(age) = &report.age {
        let path = dir.join(AGE_FILE);
        write_csv(&path, age)?;
        written.push(path);
    }
    let path = dir.join(WEEKDAY_FILE);
    write_csv(&path, &report.weekday)?;
    written.push(path);
    let path = dir.join(HOUR_FILE);
    write_csv(&path, &report.hour)?;
    written.push(path);
    let path = dir.join(SUMMARY_FILE);
    write_json(&path, summary)?;
    written.push(path);

    info!(dir = %dir.display(), files = written.len(), "report written");
    Ok(written)
}

pub fn render_table<T>(rows: &[T], max_rows: usize) -> String
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().take(max_rows).cloned().collect();
    if slice.is_empty() {
        return "(no rows)".to_string();
    }
    Table::new(slice).with(Style::markdown()).to_string()
}

pub fn preview_table<T>(title: &str, rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    println!("{}", title);
    println!("{}", render_table(rows, max_rows));
    if rows.len() > max_rows {
        println!("({} more rows)", rows.len() - max_rows);
    }
    println!();
}
