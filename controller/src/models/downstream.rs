//! Downstream and application models

use serde::{Deserialize, Serialize};

use crate::models::release::Release;

/// Git provider of a GitOps-connected downstream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GitProvider {
    Github,
    GithubEnterprise,
    Gitlab,
    GitlabEnterprise,
    Bitbucket,
    BitbucketServer,
    #[serde(other)]
    Other,
}

/// GitOps connection of a downstream
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitOps {
    #[serde(default)]
    pub is_connected: bool,

    /// Repository URI, e.g. `https://github.com/org/repo`
    #[serde(default)]
    pub uri: String,

    #[serde(default)]
    pub provider: Option<GitProvider>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub slug: String,
}

/// A deployment target receiving releases
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Downstream {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub cluster: Cluster,

    #[serde(default)]
    pub current_version: Option<Release>,

    #[serde(default)]
    pub pending_versions: Vec<Release>,

    #[serde(default)]
    pub past_versions: Vec<Release>,

    #[serde(default)]
    pub gitops: GitOps,

    #[serde(default)]
    pub allow_rollback: bool,
}

impl Downstream {
    pub fn current_sequence(&self) -> Option<i64> {
        self.current_version.as_ref().map(|v| v.sequence)
    }

    pub fn is_current(&self, sequence: i64) -> bool {
        self.current_sequence() == Some(sequence)
    }

    pub fn is_past(&self, sequence: i64) -> bool {
        self.past_versions.iter().any(|v| v.sequence == sequence)
    }

    pub fn is_pending(&self, sequence: i64) -> bool {
        self.pending_versions.iter().any(|v| v.sequence == sequence)
    }

    pub fn gitops_connected(&self) -> bool {
        self.gitops.is_connected
    }
}

/// The installed application
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct App {
    pub slug: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub is_airgap: bool,

    /// Auto deploy schedule, `disabled` when off
    #[serde(default = "default_auto_deploy")]
    pub auto_deploy: String,

    #[serde(default)]
    pub downstream: Option<Downstream>,
}

fn default_auto_deploy() -> String {
    "disabled".to_string()
}

impl App {
    pub fn auto_deploy_enabled(&self) -> bool {
        !self.auto_deploy.is_empty() && self.auto_deploy != "disabled"
    }
}
