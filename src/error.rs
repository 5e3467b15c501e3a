use std::fmt;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Missing required column(s): {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("Column(s) appear under more than one header: {}", .0.join(", "))]
    AmbiguousColumns(Vec<String>),

    #[error("Dataset contains no usable rows")]
    EmptyDataset,

    #[error("Invalid selection: {0}")]
    InvalidSelection(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ReportError>;

/// Non-fatal anomaly: rows were left out of one aggregate, or an optional
/// aggregate could not be produced at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "kind", content = "rows", rename_all = "snake_case")]
pub enum DataQualityWarning {
    UnparseableDates(usize),
    UnmappedHours(usize),
    InvalidAges(usize),
    MissingAges(usize),
    UnknownSexCodes(usize),
    AgeColumnMissing,
}

impl fmt::Display for DataQualityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnparseableDates(n) => write!(
                f,
                "{n} row(s) with an unparseable date left out of the monthly, weekday and time-of-day tables"
            ),
            Self::UnmappedHours(n) => {
                write!(f, "{n} row(s) without a time band left out of the time-of-day table")
            }
            Self::InvalidAges(n) => write!(f, "{n} row(s) with a negative age left out of the age table"),
            Self::MissingAges(n) => write!(f, "{n} row(s) without an age left out of the age table"),
            Self::UnknownSexCodes(n) => {
                write!(f, "{n} row(s) with a sex code other than M/F kept as their own group")
            }
            Self::AgeColumnMissing => write!(f, "no age column in the dataset; age table skipped"),
        }
    }
}
