//! Diff summary evaluation

use serde::Deserialize;

use crate::models::release::Release;

/// Change counts of a computed diff
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffStats {
    #[serde(default)]
    pub files_changed: u64,
    #[serde(default)]
    pub lines_added: u64,
    #[serde(default)]
    pub lines_removed: u64,
}

/// Outcome of a release's diff against its predecessor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffOutcome {
    /// No summary and no error; rendered blank
    NotComputed,
    Error(String),
    Empty,
    Changed(DiffStats),
    /// The summary is present but malformed
    Unreadable(String),
}

impl DiffOutcome {
    pub fn files_changed(&self) -> Option<u64> {
        match self {
            DiffOutcome::Changed(stats) => Some(stats.files_changed),
            _ => None,
        }
    }
}

/// Evaluate diff fields. An error always wins over a summary.
pub fn evaluate(summary: Option<&str>, error: Option<&str>) -> DiffOutcome {
    if let Some(error) = error.filter(|e| !e.trim().is_empty()) {
        return DiffOutcome::Error(error.to_string());
    }

    let raw = match summary.map(str::trim) {
        Some(raw) if !raw.is_empty() => raw,
        _ => return DiffOutcome::NotComputed,
    };

    match serde_json::from_str::<DiffStats>(raw) {
        Ok(stats) if stats.files_changed > 0 => DiffOutcome::Changed(stats),
        Ok(_) => DiffOutcome::Empty,
        Err(e) => DiffOutcome::Unreadable(e.to_string()),
    }
}

pub fn evaluate_release(release: &Release) -> DiffOutcome {
    evaluate(
        release.diff_summary.as_deref(),
        release.diff_summary_error.as_deref(),
    )
}
