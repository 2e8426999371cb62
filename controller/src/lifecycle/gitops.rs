//! GitOps action surface

use url::Url;

use crate::errors::ControllerError;
use crate::lifecycle::preflight::PreflightSummary;
use crate::models::downstream::{GitOps, GitProvider};
use crate::models::release::Release;

/// What a GitOps-connected downstream shows instead of deploy actions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitOpsSurface {
    /// The release can never be committed
    NothingToCommit,

    /// No commit exists yet; only the preflight badge is shown
    AwaitingCommit(PreflightSummary),

    ViewCommit { url: String },
}

impl GitOpsSurface {
    pub fn of(release: &Release) -> Self {
        if !release.is_git_deployable() {
            return GitOpsSurface::NothingToCommit;
        }
        match release.commit_url.as_deref().filter(|u| !u.is_empty()) {
            Some(url) => GitOpsSurface::ViewCommit {
                url: url.to_string(),
            },
            None => GitOpsSurface::AwaitingCommit(PreflightSummary::of(release)),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            GitOpsSurface::NothingToCommit => "Nothing to commit",
            GitOpsSurface::AwaitingCommit(_) => "",
            GitOpsSurface::ViewCommit { .. } => "View commit",
        }
    }
}

/// Commit hash carried by the last path segment of a commit URL
pub fn commit_hash(commit_url: &str) -> Option<String> {
    let url = Url::parse(commit_url).ok()?;
    url.path_segments()?
        .filter(|segment| !segment.is_empty())
        .next_back()
        .map(str::to_string)
}

/// Provider compare URL between two commits, oldest first
pub fn compare_url(
    gitops: &GitOps,
    first_hash: &str,
    second_hash: &str,
) -> Result<String, ControllerError> {
    let uri = gitops.uri.trim_end_matches('/');
    if uri.is_empty() {
        return Err(ControllerError::ConfigError(
            "GitOps repository URI is not set".to_string(),
        ));
    }
    // must be absolute
    Url::parse(uri)?;

    let url = match gitops.provider {
        Some(GitProvider::Gitlab) | Some(GitProvider::GitlabEnterprise) => {
            format!("{}/-/compare/{}...{}", uri, first_hash, second_hash)
        }
        Some(GitProvider::Bitbucket) | Some(GitProvider::BitbucketServer) => {
            format!(
                "{}/branches/compare/{}..{}#diff",
                uri, second_hash, first_hash
            )
        }
        _ => format!("{}/compare/{}...{}", uri, first_hash, second_hash),
    };
    Ok(url)
}
