//! Deploy request gating

use crate::lifecycle::action::LifecycleFacts;
use crate::lifecycle::preflight::{evaluate_release, PreflightState};
use crate::models::downstream::{App, Downstream};
use crate::models::release::{Release, ReleaseStatus};

/// Wording of the deploy confirmation; the underlying call is the same
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployKind {
    Deploy,
    Redeploy,
    Rollback,
}

/// What the user must acknowledge before a deploy is issued
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployGate {
    /// Manifest validation failed; the details view offers a forced deploy
    ManifestErrors { deploy_intent: bool },

    /// Preflights are still running
    SkipPreflights,

    /// Preflights completed and failed
    PreflightWarning,

    Confirm {
        kind: DeployKind,
        /// Deploying a non-latest release turns automatic deploys off
        disables_auto_deploy: bool,
    },
}

/// A deploy request coming from the user
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeployRequest {
    /// Bypass all gates and deploy now
    pub force: bool,
    pub skip_preflights: bool,
    pub continue_with_failed_preflights: bool,
}

impl DeployRequest {
    pub fn force() -> Self {
        Self {
            force: true,
            ..Default::default()
        }
    }
}

/// Result of planning a deploy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployPlan {
    Gate(DeployGate),

    Finalize {
        skip_preflights: bool,
        continue_with_failed_preflights: bool,
    },

    /// No deploy call may be issued for this release
    NotAllowed(String),
}

fn not_allowed(release: &Release, downstream: &Downstream) -> Option<String> {
    if downstream.gitops_connected() {
        return Some("Deployments are made through GitOps commits".to_string());
    }
    if release.status == ReleaseStatus::PendingConfig {
        return Some("Release must be configured before it can be deployed".to_string());
    }
    if release.status == ReleaseStatus::PendingDownload {
        return Some("Release must be downloaded before it can be deployed".to_string());
    }
    if !release.is_deployable {
        return Some(
            release
                .non_deployable_cause
                .clone()
                .unwrap_or_else(|| "Release cannot be deployed".to_string()),
        );
    }
    None
}

/// Decide whether a deploy goes straight through or needs acknowledgement
pub fn plan_deploy(
    release: &Release,
    downstream: &Downstream,
    app: &App,
    facts: &LifecycleFacts,
    request: DeployRequest,
) -> DeployPlan {
    if !request.force && release.has_yaml_errors() {
        return DeployPlan::Gate(DeployGate::ManifestErrors {
            deploy_intent: true,
        });
    }

    if let Some(reason) = not_allowed(release, downstream) {
        return DeployPlan::NotAllowed(reason);
    }

    if request.force {
        return DeployPlan::Finalize {
            skip_preflights: request.skip_preflights,
            continue_with_failed_preflights: request.continue_with_failed_preflights,
        };
    }

    if release.status == ReleaseStatus::PendingPreflight {
        return DeployPlan::Gate(DeployGate::SkipPreflights);
    }

    // An unreadable result does not count as failed
    let preflight_failed = evaluate_release(release)
        .map(|outcome| outcome.state == PreflightState::Fail)
        .unwrap_or(false);
    if preflight_failed && release.status == ReleaseStatus::Pending {
        return DeployPlan::Gate(DeployGate::PreflightWarning);
    }

    let kind = if facts.is_rollback {
        DeployKind::Rollback
    } else if facts.is_redeploy {
        DeployKind::Redeploy
    } else {
        DeployKind::Deploy
    };

    DeployPlan::Gate(DeployGate::Confirm {
        kind,
        disables_auto_deploy: facts.is_past && app.auto_deploy_enabled(),
    })
}
