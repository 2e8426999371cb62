//! Controller state

use std::collections::HashMap;

use crate::http::versions::VersionHistory;
use crate::lifecycle::diff_selection::DiffSelection;
use crate::lifecycle::download::DownloadFsm;
use crate::models::downstream::{App, Downstream};
use crate::models::release::{Release, ReleaseStatus};

/// History page position, owned by the caller and passed through verbatim
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub current_page: u32,
    pub page_size: u32,
}

impl Pagination {
    pub fn new(page_size: u32) -> Self {
        Self {
            current_page: 0,
            page_size,
        }
    }

    pub fn set_page(&mut self, page: u32) {
        self.current_page = page;
    }

    /// Changing the page size always returns to the first page
    pub fn set_page_size(&mut self, page_size: u32) {
        self.page_size = page_size;
        self.current_page = 0;
    }
}

/// Release history as last fetched. Replaced wholesale, never patched.
#[derive(Debug, Clone, Default)]
pub struct HistoryState {
    pub app: Option<App>,
    pub releases: Vec<Release>,
    pub num_of_skipped_versions: i64,
    pub num_of_remaining_versions: i64,
    pub total_count: i64,
    pub loaded: bool,
    pub error_msg: Option<String>,
}

impl HistoryState {
    pub fn from_fetch(app: App, history: VersionHistory) -> Self {
        Self {
            app: Some(app),
            releases: history.version_history,
            num_of_skipped_versions: history.num_of_skipped_versions,
            num_of_remaining_versions: history.num_of_remaining_versions,
            total_count: history.total_count,
            loaded: true,
            error_msg: None,
        }
    }

    pub fn downstream(&self) -> Downstream {
        self.app
            .as_ref()
            .and_then(|app| app.downstream.clone())
            .unwrap_or_default()
    }

    /// Find a release in the page, the downstream lists, or the current version
    pub fn release(&self, sequence: i64) -> Option<Release> {
        if let Some(release) = self.releases.iter().find(|r| r.sequence == sequence) {
            return Some(release.clone());
        }
        let downstream = self.app.as_ref()?.downstream.as_ref()?;
        downstream
            .current_version
            .iter()
            .chain(downstream.pending_versions.iter())
            .chain(downstream.past_versions.iter())
            .find(|r| r.sequence == sequence)
            .cloned()
    }

    pub fn holds(&self, sequence: i64) -> bool {
        self.release(sequence).is_some()
    }

    /// Preflight results are still being computed for some listed release
    pub fn has_pending_preflights(&self) -> bool {
        self.releases
            .iter()
            .any(|r| r.status == ReleaseStatus::PendingPreflight)
    }
}

/// Console upgrade progress for one release
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpgradeProgress {
    pub running: bool,
    pub message: String,
    pub error_msg: Option<String>,
}

/// Per-operation state and scoped error messages
#[derive(Debug, Default)]
pub struct OperationState {
    pub downloads: HashMap<i64, DownloadFsm>,
    pub upgrades: HashMap<i64, UpgradeProgress>,
    pub deploy_error_msg: Option<String>,
    pub diff_selection: DiffSelection,
}
