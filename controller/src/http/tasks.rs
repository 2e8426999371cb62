//! Task status endpoints

use openapi_client::models::TaskStatus;

use crate::errors::ControllerError;
use crate::http::client::HttpClient;

impl HttpClient {
    /// Status of the update download started by an update check
    pub async fn get_update_download_status(&self, slug: &str) -> Result<TaskStatus, ControllerError> {
        self.get(&format!("/app/{}/task/updatedownload", slug)).await
    }

    /// Status of a single release's bundle download
    pub async fn get_version_download_status(
        &self,
        slug: &str,
        parent_sequence: i64,
    ) -> Result<TaskStatus, ControllerError> {
        let path = format!("/app/{}/sequence/{}/task/updatedownload", slug, parent_sequence);
        self.get(&path).await
    }

    /// Status of processing an uploaded airgap bundle
    pub async fn get_airgap_status(&self, slug: &str) -> Result<TaskStatus, ControllerError> {
        self.get(&format!("/app/{}/airgap/status", slug)).await
    }

    /// Status of an admin console upgrade
    pub async fn get_console_upgrade_status(&self, slug: &str) -> Result<TaskStatus, ControllerError> {
        self.get(&format!("/app/{}/task/upgrade-service", slug)).await
    }
}
