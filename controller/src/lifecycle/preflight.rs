//! Preflight result evaluation

use serde::Deserialize;
use tracing::warn;

use crate::errors::ControllerError;
use crate::models::release::Release;

/// Overall preflight state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PreflightState {
    /// No result yet; preflight affordances are hidden
    #[default]
    Unknown,
    Pass,
    Warn,
    Fail,
}

impl PreflightState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PreflightState::Unknown => "",
            PreflightState::Pass => "pass",
            PreflightState::Warn => "warn",
            PreflightState::Fail => "fail",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PreflightCheck {
    #[serde(default)]
    is_fail: bool,
    #[serde(default)]
    is_warn: bool,
    #[serde(default)]
    is_pass: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct PreflightPayload {
    #[serde(default)]
    results: Option<Vec<PreflightCheck>>,
    #[serde(default)]
    errors: Option<Vec<serde_json::Value>>,
}

/// Normalized preflight outcome of a release
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PreflightOutcome {
    pub state: PreflightState,
    pub failed: bool,
    pub skipped: bool,
    pub passed_checks: usize,
    pub warned_checks: usize,
    pub failed_checks: usize,
}

/// Evaluate a raw preflight payload
///
/// A missing or blank payload means preflights have not produced a result.
/// A payload that does not deserialize is an error, never a pass.
pub fn evaluate(payload: Option<&str>, skipped: bool) -> Result<PreflightOutcome, ControllerError> {
    let raw = match payload.map(str::trim) {
        Some(raw) if !raw.is_empty() && raw != "null" => raw,
        _ => {
            return Ok(PreflightOutcome {
                skipped,
                ..Default::default()
            })
        }
    };

    let parsed: PreflightPayload =
        serde_json::from_str(raw).map_err(|e| ControllerError::Parse {
            what: "preflight result",
            reason: e.to_string(),
        })?;

    let results = parsed.results.unwrap_or_default();
    let has_errors = parsed.errors.is_some_and(|errors| !errors.is_empty());

    let passed_checks = results.iter().filter(|c| c.is_pass).count();
    let warned_checks = results.iter().filter(|c| c.is_warn).count();
    let failed_checks = results.iter().filter(|c| c.is_fail).count();

    let state = if has_errors || failed_checks > 0 {
        PreflightState::Fail
    } else if warned_checks > 0 {
        PreflightState::Warn
    } else {
        PreflightState::Pass
    };

    Ok(PreflightOutcome {
        state,
        failed: state == PreflightState::Fail,
        skipped,
        passed_checks,
        warned_checks,
        failed_checks,
    })
}

/// Evaluate the preflight fields of a release
pub fn evaluate_release(release: &Release) -> Result<PreflightOutcome, ControllerError> {
    evaluate(release.preflight_result.as_deref(), release.preflight_skipped)
}

/// Display form of a release's preflight result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreflightSummary {
    /// Nothing to show yet
    NotRun { skipped: bool },
    Evaluated(PreflightOutcome),
    /// The payload exists but could not be read
    Unreadable(String),
}

impl PreflightSummary {
    pub fn of(release: &Release) -> Self {
        match evaluate_release(release) {
            Ok(outcome) if outcome.state == PreflightState::Unknown => PreflightSummary::NotRun {
                skipped: outcome.skipped,
            },
            Ok(outcome) => PreflightSummary::Evaluated(outcome),
            Err(e) => {
                warn!("Release {}: {}", release.sequence, e);
                PreflightSummary::Unreadable(e.to_string())
            }
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, PreflightSummary::Evaluated(outcome) if outcome.failed)
    }
}
