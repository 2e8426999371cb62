//! Intents raised for the presentation layer

use crate::lifecycle::gate::DeployGate;
use crate::models::release::Release;

/// Something the presentation layer must show or do
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    /// Open the config editor for a release
    RequestConfigure { release: Release },

    /// Show the deploy gate for a release
    RequestDeploy { release: Release, gate: DeployGate },

    /// A bundle download was started
    RequestDownload { release: Release },

    /// An admin console upgrade was started
    RequestConsoleUpgrade { release: Release },

    RequestDiffView {
        first_sequence: i64,
        second_sequence: i64,
    },

    RequestExternalCommitView { url: String },

    RequestExternalDiffView { url: String },

    /// The release list was replaced
    HistoryRefreshed,

    /// Authentication failed; log out globally
    SessionExpired,
}
