//! Finite state machine for per-release downloads

use openapi_client::models::{TaskState, TaskStatus};

use crate::errors::ControllerError;
use crate::models::release::DownloadStatus;

/// Download state
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DownloadState {
    /// Nothing requested locally
    #[default]
    Idle,

    Downloading,

    Failed,

    /// Bundle is on the server; the release list must be refetched
    Complete,
}

/// Download event
#[derive(Debug, Clone)]
pub enum DownloadEvent {
    /// Download requested
    Start,

    /// Server reported progress
    Progress(String),

    /// Download finished
    Succeeded(String),

    /// Download failed
    Failed(String),
}

/// Download FSM
#[derive(Debug, Clone, Default)]
pub struct DownloadFsm {
    state: DownloadState,
    message: Option<String>,
    attempts: u32,
}

impl DownloadFsm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &DownloadState {
        &self.state
    }

    /// Latest server message, or the failure reason
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// The release's button stays disabled while downloading
    pub fn is_downloading(&self) -> bool {
        self.state == DownloadState::Downloading
    }

    /// Process an event and transition state
    pub fn process(&mut self, event: DownloadEvent) -> Result<(), ControllerError> {
        let new_state = match (&self.state, &event) {
            (DownloadState::Idle, DownloadEvent::Start)
            | (DownloadState::Failed, DownloadEvent::Start) => {
                self.message = None;
                self.attempts += 1;
                DownloadState::Downloading
            }

            (DownloadState::Downloading, DownloadEvent::Progress(message)) => {
                self.message = Some(message.clone());
                DownloadState::Downloading
            }
            (DownloadState::Downloading, DownloadEvent::Succeeded(message)) => {
                self.message = (!message.is_empty()).then(|| message.clone());
                DownloadState::Complete
            }
            (DownloadState::Downloading, DownloadEvent::Failed(error)) => {
                self.message = Some(error.clone());
                DownloadState::Failed
            }

            (state, event) => {
                return Err(ControllerError::InvalidTransition(format!(
                    "download {:?} -> {:?}",
                    state, event
                )));
            }
        };

        self.state = new_state;
        Ok(())
    }

    /// Fold a polled task status into the machine
    pub fn apply(&mut self, status: &TaskStatus) -> Result<(), ControllerError> {
        let event = match status.status {
            TaskState::Running => DownloadEvent::Progress(status.current_message.clone()),
            TaskState::Failed => DownloadEvent::Failed(
                status
                    .error
                    .clone()
                    .filter(|e| !e.is_empty())
                    .unwrap_or_else(|| status.current_message.clone()),
            ),
            _ => DownloadEvent::Succeeded(status.current_message.clone()),
        };
        self.process(event)
    }
}

/// Download message shown next to a release
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadMessage {
    pub message: String,
    pub failed: bool,
}

/// Local polling takes precedence; the persisted status fills in otherwise
pub fn download_message(
    local: Option<&DownloadFsm>,
    persisted: Option<&DownloadStatus>,
) -> Option<DownloadMessage> {
    if let Some(fsm) = local.filter(|fsm| fsm.state() != &DownloadState::Idle) {
        return fsm.message().map(|message| DownloadMessage {
            message: message.to_string(),
            failed: fsm.state() == &DownloadState::Failed,
        });
    }

    persisted
        .filter(|status| !status.message.is_empty())
        .map(|status| DownloadMessage {
            message: status.message.clone(),
            failed: status.is_failed(),
        })
}
