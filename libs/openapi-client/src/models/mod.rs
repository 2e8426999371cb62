//! API models

use serde::{Deserialize, Serialize};

/// State reported by a long-running server task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Running,
    Failed,
    Successful,
    #[serde(other)]
    Unknown,
}

impl Default for TaskState {
    fn default() -> Self {
        TaskState::Unknown
    }
}

/// Status of a server task (update check, download, airgap processing, console upgrade)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatus {
    #[serde(default)]
    pub status: TaskState,
    #[serde(default)]
    pub current_message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskStatus {
    /// Anything other than `running` is terminal
    pub fn is_terminal(&self) -> bool {
        self.status != TaskState::Running
    }

    pub fn is_failed(&self) -> bool {
        self.status == TaskState::Failed
    }
}

/// A release reference returned by the update check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseRef {
    pub sequence: i64,
    #[serde(default)]
    pub version: String,
}

/// Update check response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCheckResponse {
    #[serde(default)]
    pub available_updates: i64,
    #[serde(default)]
    pub current_release: Option<ReleaseRef>,
    #[serde(default)]
    pub available_releases: Vec<ReleaseRef>,
}

/// Deploy request body
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployRequest {
    pub is_skip_preflights: bool,
    pub continue_with_failed_preflights: bool,
    #[serde(rename = "isCLI")]
    pub is_cli: bool,
}

/// Generic acknowledgement returned by action endpoints
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorResponse {
    /// The most specific message carried by the response
    pub fn message(&self) -> &str {
        match self.message.as_deref() {
            Some(message) if !message.is_empty() => message,
            _ => &self.error,
        }
    }
}
