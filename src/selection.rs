use std::collections::BTreeSet;

use crate::error::{ReportError, Result};
use crate::types::Dataset;

pub const MAX_MINOR_SELECTIONS: usize = 3;

/// Distinct major categories, sorted.
pub fn major_categories(data: &Dataset) -> Vec<String> {
    let set: BTreeSet<&str> = data.records.iter().map(|r| r.category_major.as_str()).collect();
    set.into_iter().map(str::to_string).collect()
}

/// Distinct minor categories seen together with `major`, sorted.
pub fn minor_categories(data: &Dataset, major: &str) -> Vec<String> {
    let set: BTreeSet<&str> = data
        .records
        .iter()
        .filter(|r| r.category_major == major)
        .map(|r| r.category_minor.as_str())
        .collect();
    set.into_iter().map(str::to_string).collect()
}

/// One major category and the minor categories to compare within it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub major: String,
    pub minors: Vec<String>,
}

impl Selection {
    /// Duplicate minors are dropped, first occurrence wins.
    pub fn new(major: impl Into<String>, minors: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let mut seen = BTreeSet::new();
        let minors = minors
            .into_iter()
            .map(Into::into)
            .filter(|m: &String| seen.insert(m.clone()))
            .collect();
        Self { major: major.into(), minors }
    }

    /// The first available minor category under `major`.
    pub fn default_for(data: &Dataset, major: &str) -> Option<Self> {
        let first = minor_categories(data, major).into_iter().next()?;
        Some(Self::new(major, [first]))
    }

    pub fn contains_minor(&self, minor: &str) -> bool {
        self.minors.iter().any(|m| m == minor)
    }

    /// Caller-side check before running the pipeline.
    pub fn validate(&self, data: &Dataset) -> Result<()> {
        if self.minors.is_empty() {
            return Err(ReportError::InvalidSelection(
                "select at least one minor category".to_string(),
            ));
        }
        if self.minors.len() > MAX_MINOR_SELECTIONS {
            return Err(ReportError::InvalidSelection(format!(
                "at most {} minor categories can be compared, got {}",
                MAX_MINOR_SELECTIONS,
                self.minors.len()
            )));
        }
        let available = minor_categories(data, &self.major);
        if available.is_empty() {
            return Err(ReportError::InvalidSelection(format!(
                "unknown major category '{}'",
                self.major
            )));
        }
        let stray: Vec<&str> = self
            .minors
            .iter()
            .filter(|m| !available.contains(*m))
            .map(String::as_str)
            .collect();
        if !stray.is_empty() {
            return Err(ReportError::InvalidSelection(format!(
                "not under '{}': {}",
                self.major,
                stray.join(", ")
            )));
        }
        Ok(())
    }
}
