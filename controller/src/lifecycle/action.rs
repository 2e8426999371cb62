//! Action resolution for a release

use serde::{Deserialize, Serialize};

use crate::models::downstream::Downstream;
use crate::models::release::{Release, ReleaseStatus};

/// Installation-wide flags that change which actions are offered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionFlags {
    /// Releases arrive as uploaded bundles
    pub airgap: bool,

    /// The console runs inside an embedded cluster and cannot self-upgrade
    pub embedded_cluster: bool,
}

/// The action offered for a release
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionDecision {
    Configure,
    Upgrade,
    Deploy,
    Redeploy,
    Rollback,
    Deploying,
    Deployed,
}

impl ActionDecision {
    pub fn label(&self) -> &'static str {
        match self {
            ActionDecision::Configure => "Configure",
            ActionDecision::Upgrade => "Upgrade",
            ActionDecision::Deploy => "Deploy",
            ActionDecision::Redeploy => "Redeploy",
            ActionDecision::Rollback => "Rollback",
            ActionDecision::Deploying => "Deploying",
            ActionDecision::Deployed => "Deployed",
        }
    }

    /// Display-only states with a disabled button
    pub fn is_terminal(&self) -> bool {
        matches!(self, ActionDecision::Deploying | ActionDecision::Deployed)
    }

    /// Actions that go through the deploy gate
    pub fn is_deploy(&self) -> bool {
        matches!(
            self,
            ActionDecision::Deploy | ActionDecision::Redeploy | ActionDecision::Rollback
        )
    }
}

/// Facts about a release relative to its downstream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleFacts {
    pub has_current: bool,
    pub is_current: bool,
    pub is_past: bool,
    pub is_deploying: bool,
    pub needs_config: bool,
    pub is_rollback: bool,
    pub is_redeploy: bool,
    pub can_upgrade_console: bool,
}

impl LifecycleFacts {
    pub fn new(release: &Release, downstream: &Downstream, flags: ActionFlags) -> Self {
        let is_current = downstream.is_current(release.sequence);
        let is_past = downstream.is_past(release.sequence);

        Self {
            has_current: downstream.current_version.is_some(),
            is_current,
            is_past,
            is_deploying: release.status == ReleaseStatus::Deploying,
            needs_config: release.status == ReleaseStatus::PendingConfig,
            is_rollback: is_past && release.deployed_at.is_some() && downstream.allow_rollback,
            is_redeploy: is_current
                && matches!(
                    release.status,
                    ReleaseStatus::Failed | ReleaseStatus::Deployed
                ),
            can_upgrade_console: release.needs_kots_upgrade
                && !flags.airgap
                && !flags.embedded_cluster,
        }
    }

    fn deploy_or_upgrade(&self) -> ActionDecision {
        if self.can_upgrade_console {
            ActionDecision::Upgrade
        } else {
            ActionDecision::Deploy
        }
    }
}

/// Resolve the action for a release. The first matching rule wins.
pub fn resolve(facts: &LifecycleFacts) -> ActionDecision {
    if facts.needs_config {
        return ActionDecision::Configure;
    }
    if !facts.has_current {
        return facts.deploy_or_upgrade();
    }
    if facts.is_redeploy {
        return ActionDecision::Redeploy;
    }
    if facts.is_rollback {
        return ActionDecision::Rollback;
    }
    if facts.is_deploying {
        return ActionDecision::Deploying;
    }
    if facts.is_current {
        return ActionDecision::Deployed;
    }
    facts.deploy_or_upgrade()
}

pub fn resolve_action(
    release: &Release,
    downstream: &Downstream,
    flags: ActionFlags,
) -> ActionDecision {
    resolve(&LifecycleFacts::new(release, downstream, flags))
}

/// The primary button of a release row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionButton {
    pub decision: ActionDecision,
    pub label: &'static str,
    pub enabled: bool,
    pub disabled_reason: Option<String>,
}

pub fn action_button(release: &Release, downstream: &Downstream, flags: ActionFlags) -> ActionButton {
    let decision = resolve_action(release, downstream, flags);

    let (enabled, disabled_reason) = if decision.is_terminal() {
        (false, None)
    } else if decision != ActionDecision::Configure && !release.is_deployable {
        (false, release.non_deployable_cause.clone())
    } else {
        (true, None)
    };

    ActionButton {
        decision,
        label: decision.label(),
        enabled,
        disabled_reason,
    }
}
