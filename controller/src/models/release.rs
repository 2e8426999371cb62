//! Release models

use chrono::{DateTime, Utc};
use openapi_client::models::TaskState;
use serde::{Deserialize, Serialize};

/// Release status as reported by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseStatus {
    /// Required config values are missing
    PendingConfig,

    /// Preflight checks are still running
    PendingPreflight,

    /// Release metadata is known but the bundle has not been downloaded
    PendingDownload,

    /// Ready to deploy
    Pending,

    Deploying,

    Deployed,

    Failed,

    /// Committed through GitOps
    Merged,

    #[serde(other)]
    Unknown,
}

impl ReleaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReleaseStatus::PendingConfig => "pending_config",
            ReleaseStatus::PendingPreflight => "pending_preflight",
            ReleaseStatus::PendingDownload => "pending_download",
            ReleaseStatus::Pending => "pending",
            ReleaseStatus::Deploying => "deploying",
            ReleaseStatus::Deployed => "deployed",
            ReleaseStatus::Failed => "failed",
            ReleaseStatus::Merged => "merged",
            ReleaseStatus::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ReleaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A manifest validation failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YamlError {
    pub path: String,

    #[serde(default)]
    pub error: Option<String>,
}

/// Last terminal download outcome, persisted server-side
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadStatus {
    #[serde(default)]
    pub message: String,

    #[serde(default)]
    pub status: TaskState,
}

impl DownloadStatus {
    pub fn is_failed(&self) -> bool {
        self.status == TaskState::Failed
    }
}

/// One candidate or historical version of the application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Release {
    /// Unique per downstream, assigned upstream
    pub sequence: i64,

    /// Midstream release this one was rendered from
    #[serde(default)]
    pub parent_sequence: i64,

    #[serde(default)]
    pub version_label: String,

    pub status: ReleaseStatus,

    #[serde(default)]
    pub deployed_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub created_on: Option<DateTime<Utc>>,

    #[serde(default)]
    pub source: Option<String>,

    #[serde(default)]
    pub release_notes: Option<String>,

    #[serde(default)]
    pub is_required: bool,

    /// Serialized preflight result, absent until preflights complete
    #[serde(default)]
    pub preflight_result: Option<String>,

    #[serde(default)]
    pub preflight_skipped: bool,

    #[serde(default)]
    pub yaml_errors: Option<Vec<YamlError>>,

    #[serde(default)]
    pub diff_summary: Option<String>,

    #[serde(default)]
    pub diff_summary_error: Option<String>,

    /// The admin console must be upgraded before this release can be applied
    #[serde(default)]
    pub needs_kots_upgrade: bool,

    #[serde(default)]
    pub commit_url: Option<String>,

    #[serde(default)]
    pub git_deployable: Option<bool>,

    #[serde(default = "default_true")]
    pub is_deployable: bool,

    #[serde(default)]
    pub non_deployable_cause: Option<String>,

    #[serde(default)]
    pub download_status: Option<DownloadStatus>,
}

fn default_true() -> bool {
    true
}

impl Release {
    /// Minimal release used as a starting point by callers and tests
    pub fn new(sequence: i64, status: ReleaseStatus) -> Self {
        Self {
            sequence,
            parent_sequence: sequence,
            version_label: String::new(),
            status,
            deployed_at: None,
            created_on: None,
            source: None,
            release_notes: None,
            is_required: false,
            preflight_result: None,
            preflight_skipped: false,
            yaml_errors: None,
            diff_summary: None,
            diff_summary_error: None,
            needs_kots_upgrade: false,
            commit_url: None,
            git_deployable: None,
            is_deployable: true,
            non_deployable_cause: None,
            download_status: None,
        }
    }

    pub fn has_yaml_errors(&self) -> bool {
        self.yaml_errors.as_ref().is_some_and(|errors| !errors.is_empty())
    }

    pub fn is_downloaded(&self) -> bool {
        self.status != ReleaseStatus::PendingDownload
    }

    /// Only an explicit `false` makes a release permanently uncommittable
    pub fn is_git_deployable(&self) -> bool {
        self.git_deployable != Some(false)
    }

    pub fn display_label(&self) -> String {
        if self.version_label.is_empty() {
            format!("Sequence {}", self.sequence)
        } else {
            self.version_label.clone()
        }
    }
}
