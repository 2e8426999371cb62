//! Release API seam

use async_trait::async_trait;
use openapi_client::models::{DeployRequest, TaskStatus, UpdateCheckResponse};

use crate::errors::ControllerError;
use crate::http::client::HttpClient;
use crate::http::versions::VersionHistory;
use crate::models::downstream::App;

/// Release API trait for testability
#[async_trait]
pub trait ReleaseApi: Send + Sync {
    async fn get_app(&self, slug: &str) -> Result<App, ControllerError>;

    async fn get_version_history(
        &self,
        slug: &str,
        current_page: u32,
        page_size: u32,
    ) -> Result<VersionHistory, ControllerError>;

    async fn check_for_updates(&self, slug: &str) -> Result<UpdateCheckResponse, ControllerError>;

    async fn update_download_status(&self, slug: &str) -> Result<TaskStatus, ControllerError>;

    async fn airgap_status(&self, slug: &str) -> Result<TaskStatus, ControllerError>;

    async fn download_version(&self, slug: &str, parent_sequence: i64) -> Result<(), ControllerError>;

    async fn version_download_status(
        &self,
        slug: &str,
        parent_sequence: i64,
    ) -> Result<TaskStatus, ControllerError>;

    async fn deploy_version(
        &self,
        slug: &str,
        sequence: i64,
        request: &DeployRequest,
    ) -> Result<(), ControllerError>;

    async fn upgrade_console(&self, slug: &str, parent_sequence: i64) -> Result<(), ControllerError>;

    async fn console_upgrade_status(&self, slug: &str) -> Result<TaskStatus, ControllerError>;
}

#[async_trait]
impl ReleaseApi for HttpClient {
    async fn get_app(&self, slug: &str) -> Result<App, ControllerError> {
        HttpClient::get_app(self, slug).await
    }

    async fn get_version_history(
        &self,
        slug: &str,
        current_page: u32,
        page_size: u32,
    ) -> Result<VersionHistory, ControllerError> {
        HttpClient::get_version_history(self, slug, current_page, page_size).await
    }

    async fn check_for_updates(&self, slug: &str) -> Result<UpdateCheckResponse, ControllerError> {
        self.post_update_check(slug).await
    }

    async fn update_download_status(&self, slug: &str) -> Result<TaskStatus, ControllerError> {
        self.get_update_download_status(slug).await
    }

    async fn airgap_status(&self, slug: &str) -> Result<TaskStatus, ControllerError> {
        self.get_airgap_status(slug).await
    }

    async fn download_version(&self, slug: &str, parent_sequence: i64) -> Result<(), ControllerError> {
        self.post_version_download(slug, parent_sequence).await
    }

    async fn version_download_status(
        &self,
        slug: &str,
        parent_sequence: i64,
    ) -> Result<TaskStatus, ControllerError> {
        self.get_version_download_status(slug, parent_sequence).await
    }

    async fn deploy_version(
        &self,
        slug: &str,
        sequence: i64,
        request: &DeployRequest,
    ) -> Result<(), ControllerError> {
        self.post_deploy(slug, sequence, request).await
    }

    async fn upgrade_console(&self, slug: &str, parent_sequence: i64) -> Result<(), ControllerError> {
        self.post_console_upgrade(slug, parent_sequence).await
    }

    async fn console_upgrade_status(&self, slug: &str) -> Result<TaskStatus, ControllerError> {
        self.get_console_upgrade_status(slug).await
    }
}
