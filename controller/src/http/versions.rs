//! Release history and deploy endpoints

use openapi_client::models::{ActionResponse, DeployRequest, UpdateCheckResponse};
use serde::{Deserialize, Serialize};

use crate::errors::ControllerError;
use crate::http::client::HttpClient;
use crate::models::downstream::App;
use crate::models::release::Release;

/// One page of release history
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionHistory {
    #[serde(default)]
    pub version_history: Vec<Release>,

    #[serde(default)]
    pub num_of_skipped_versions: i64,

    #[serde(default)]
    pub num_of_remaining_versions: i64,

    #[serde(default)]
    pub total_count: i64,
}

fn check_action(response: Option<ActionResponse>) -> Result<(), ControllerError> {
    match response {
        Some(ActionResponse {
            success: false,
            error: Some(error),
        }) if !error.is_empty() => Err(ControllerError::Internal(error)),
        _ => Ok(()),
    }
}

impl HttpClient {
    /// Get the application with its downstream
    pub async fn get_app(&self, slug: &str) -> Result<App, ControllerError> {
        self.get(&format!("/app/{}", slug)).await
    }

    /// Get one page of release history
    pub async fn get_version_history(
        &self,
        slug: &str,
        current_page: u32,
        page_size: u32,
    ) -> Result<VersionHistory, ControllerError> {
        let path = format!(
            "/app/{}/versions?currentPage={}&pageSize={}&pinLatestDeployable=true",
            slug, current_page, page_size
        );
        self.get(&path).await
    }

    /// Ask the server to check upstream for new releases
    pub async fn post_update_check(&self, slug: &str) -> Result<UpdateCheckResponse, ControllerError> {
        self.post(&format!("/app/{}/updatecheck", slug), &serde_json::json!({}))
            .await
    }

    /// Start downloading a release bundle
    pub async fn post_version_download(
        &self,
        slug: &str,
        parent_sequence: i64,
    ) -> Result<(), ControllerError> {
        let path = format!("/app/{}/sequence/{}/download", slug, parent_sequence);
        let response: Option<ActionResponse> = self.post(&path, &serde_json::json!({})).await?;
        check_action(response)
    }

    /// Deploy a release
    pub async fn post_deploy(
        &self,
        slug: &str,
        sequence: i64,
        body: &DeployRequest,
    ) -> Result<(), ControllerError> {
        let path = format!("/app/{}/sequence/{}/deploy", slug, sequence);
        let response: Option<ActionResponse> = self.post(&path, body).await?;
        check_action(response)
    }

    /// Start upgrading the admin console to the version a release requires
    pub async fn post_console_upgrade(
        &self,
        slug: &str,
        parent_sequence: i64,
    ) -> Result<(), ControllerError> {
        let path = format!("/app/{}/sequence/{}/upgrade-service", slug, parent_sequence);
        let response: Option<ActionResponse> = self.post(&path, &serde_json::json!({})).await?;
        check_action(response)
    }
}
