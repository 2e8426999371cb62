//! Version lifecycle decisions
//!
//! Pure functions from a release and its downstream to what the user may do
//! with it. Nothing here performs I/O.

pub mod action;
pub mod diff;
pub mod diff_selection;
pub mod download;
pub mod gate;
pub mod gitops;
pub mod preflight;

use crate::lifecycle::action::{action_button, ActionButton, ActionFlags};
use crate::lifecycle::diff::DiffOutcome;
use crate::lifecycle::download::{download_message, DownloadFsm, DownloadMessage};
use crate::lifecycle::gitops::GitOpsSurface;
use crate::lifecycle::preflight::PreflightSummary;
use crate::models::downstream::Downstream;
use crate::models::release::{Release, ReleaseStatus};

/// The action area of a release row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionSurface {
    /// Direct deploy actions
    Local(ActionButton),

    /// GitOps replaces the action area
    GitOps(GitOpsSurface),

    /// The bundle must be fetched first
    Download { in_progress: bool },
}

impl ActionSurface {
    pub fn label(&self) -> &'static str {
        match self {
            ActionSurface::Local(button) => button.label,
            ActionSurface::GitOps(surface) => surface.label(),
            ActionSurface::Download { in_progress: true } => "Downloading",
            ActionSurface::Download { in_progress: false } => "Download",
        }
    }

    pub fn is_enabled(&self) -> bool {
        match self {
            ActionSurface::Local(button) => button.enabled,
            ActionSurface::GitOps(GitOpsSurface::ViewCommit { .. }) => true,
            ActionSurface::GitOps(_) => false,
            ActionSurface::Download { in_progress } => !in_progress,
        }
    }
}

/// Everything the presentation layer needs for one release
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseDecision {
    pub sequence: i64,
    pub status: ReleaseStatus,
    pub surface: ActionSurface,
    pub preflight: PreflightSummary,
    pub diff: DiffOutcome,
    pub download: Option<DownloadMessage>,
}

/// Combine normalized facts about a release into its decision
pub fn decide(
    release: &Release,
    downstream: &Downstream,
    flags: ActionFlags,
    download: Option<&DownloadFsm>,
) -> ReleaseDecision {
    let surface = if downstream.gitops_connected() {
        ActionSurface::GitOps(GitOpsSurface::of(release))
    } else if release.status == ReleaseStatus::PendingDownload {
        ActionSurface::Download {
            in_progress: download.is_some_and(DownloadFsm::is_downloading),
        }
    } else {
        ActionSurface::Local(action_button(release, downstream, flags))
    };

    ReleaseDecision {
        sequence: release.sequence,
        status: release.status,
        surface,
        preflight: PreflightSummary::of(release),
        diff: diff::evaluate_release(release),
        download: download_message(download, release.download_status.as_ref()),
    }
}
