//! Controller configuration options

use std::time::Duration;

use crate::lifecycle::action::ActionFlags;
use crate::storage::settings::Settings;

/// Main controller options
#[derive(Debug, Clone)]
pub struct ControllerOptions {
    /// Slug of the installed application
    pub app_slug: String,

    /// Installation-wide action flags
    pub flags: ActionFlags,

    /// Initial history page size
    pub page_size: u32,

    /// Polling intervals
    pub polling: PollingOptions,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            app_slug: String::new(),
            flags: ActionFlags::default(),
            page_size: 20,
            polling: PollingOptions::default(),
        }
    }
}

impl From<&Settings> for ControllerOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            app_slug: settings.app_slug.clone(),
            flags: ActionFlags {
                airgap: settings.airgap,
                embedded_cluster: settings.embedded_cluster,
            },
            page_size: settings.page_size,
            polling: PollingOptions {
                update_status: Duration::from_millis(settings.polling.update_status_interval_ms),
                download_status: Duration::from_millis(
                    settings.polling.download_status_interval_ms,
                ),
                upgrade_status: Duration::from_millis(settings.polling.upgrade_status_interval_ms),
                history_refresh: Duration::from_millis(
                    settings.polling.history_refresh_interval_ms,
                ),
            },
        }
    }
}

/// Repeater periods
#[derive(Debug, Clone)]
pub struct PollingOptions {
    /// Update check and airgap processing status
    pub update_status: Duration,

    /// Per-release download status
    pub download_status: Duration,

    /// Admin console upgrade status
    pub upgrade_status: Duration,

    /// History refetch while preflights are running
    pub history_refresh: Duration,
}

impl Default for PollingOptions {
    fn default() -> Self {
        Self {
            update_status: Duration::from_secs(1),
            download_status: Duration::from_secs(2),
            upgrade_status: Duration::from_secs(1),
            history_refresh: Duration::from_secs(2),
        }
    }
}
