//! Update check session

use std::sync::MutexGuard;

use chrono::{DateTime, Utc};
use openapi_client::models::TaskStatus;
use tracing::{debug, error, info, warn};

use crate::app::controller::Controller;
use crate::errors::ControllerError;

/// Which server task the update checker follows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusSource {
    /// Online update download started by an update check
    UpdateDownload,

    /// Processing of an uploaded airgap bundle
    Airgap,
}

/// Airgap bundle upload progress, fed by an external uploader
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AirgapUpload {
    pub uploading: bool,
    /// Fraction in `0.0..=1.0`
    pub progress: f64,
    pub size: u64,
    pub resuming: bool,
    pub processing: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateSessionState {
    pub checking_for_updates: bool,
    pub check_for_updates_msg: String,
    pub update_error: Option<String>,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub airgap: AirgapUpload,
}

impl Controller {
    pub fn update_session(&self) -> UpdateSessionState {
        self.lock_session().clone()
    }

    pub fn is_checking_for_updates(&self) -> bool {
        self.update_checker.is_running()
    }

    /// Ask the server for new releases and follow their download
    pub async fn check_for_updates(&self) -> Result<(), ControllerError> {
        self.ensure_active()?;
        self.update_checker.stop();
        {
            let mut session = self.lock_session();
            session.checking_for_updates = true;
            session.check_for_updates_msg.clear();
            session.update_error = None;
        }

        info!("Checking for updates");
        let response = match self.api.check_for_updates(self.slug()).await {
            Ok(response) => response,
            Err(e) => {
                error!("Update check failed: {}", e);
                {
                    let mut session = self.lock_session();
                    session.checking_for_updates = false;
                    session.update_error = Some(e.display_message());
                }
                self.handle_failure(&e);
                return Err(e);
            }
        };
        self.lock_session().last_checked_at = Some(Utc::now());

        if response.available_updates == 0 {
            {
                let mut session = self.lock_session();
                session.checking_for_updates = false;
                session.check_for_updates_msg = "Already up to date".to_string();
            }

            // The server may know a release this page has never seen
            let stale = match &response.current_release {
                Some(current) => !self.history.read().await.holds(current.sequence),
                None => false,
            };
            if stale {
                info!("Release history is stale, refetching");
                self.refresh_history().await?;
            }
            return Ok(());
        }

        self.lock_session().check_for_updates_msg =
            format!("Found {} update(s)", response.available_updates);
        self.start_update_status_poll(StatusSource::UpdateDownload);
        Ok(())
    }

    fn start_update_status_poll(&self, source: StatusSource) {
        if self.is_disposed() {
            return;
        }

        debug!("Polling {:?} status", source);
        let this = self.this.clone();
        self.update_checker
            .start(self.options.polling.update_status, move || {
                let this = this.clone();
                async move {
                    match this.upgrade() {
                        Some(controller) => controller.poll_update_status_once(source).await,
                        None => Ok(()),
                    }
                }
            });
    }

    /// One status poll. A terminal status stops the checker and refetches history.
    pub async fn poll_update_status_once(&self, source: StatusSource) -> Result<(), ControllerError> {
        let result = match source {
            StatusSource::UpdateDownload => self.api.update_download_status(self.slug()).await,
            StatusSource::Airgap => self.api.airgap_status(self.slug()).await,
        };
        let status = match result {
            Ok(status) => status,
            Err(e) => {
                self.lock_session().update_error = Some(e.display_message());
                self.handle_failure(&e);
                return Err(e);
            }
        };

        self.lock_session().check_for_updates_msg = status.current_message.clone();
        if !status.is_terminal() {
            return Ok(());
        }

        self.update_checker.stop();
        self.finish_session(source, &status);
        self.refresh_history().await
    }

    fn finish_session(&self, source: StatusSource, status: &TaskStatus) {
        let mut session = self.lock_session();
        session.checking_for_updates = false;
        if source == StatusSource::Airgap {
            session.airgap.processing = false;
        }
        if status.is_failed() {
            let message = status
                .error
                .clone()
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| status.current_message.clone());
            warn!("{:?} task failed: {}", source, message);
            session.update_error = Some(message.clone());
            if source == StatusSource::Airgap {
                session.airgap.error = Some(message);
            }
        }
    }

    // ================================== AIRGAP =================================== //

    pub fn on_airgap_upload_progress(&self, progress: f64, size: u64, resuming: bool) {
        let mut session = self.lock_session();
        session.airgap.uploading = true;
        session.airgap.progress = progress.clamp(0.0, 1.0);
        session.airgap.size = size;
        session.airgap.resuming = resuming;
        session.airgap.error = None;
    }

    pub fn on_airgap_upload_error(&self, message: impl Into<String>) {
        let mut session = self.lock_session();
        session.airgap.uploading = false;
        session.airgap.resuming = false;
        session.airgap.error = Some(message.into());
    }

    /// The bundle is on the server; follow its processing with the update checker
    pub fn on_airgap_upload_complete(&self) -> Result<(), ControllerError> {
        self.ensure_active()?;
        {
            let mut session = self.lock_session();
            session.airgap.uploading = false;
            session.airgap.resuming = false;
            session.airgap.progress = 1.0;
            session.airgap.processing = true;
            session.checking_for_updates = true;
            session.update_error = None;
        }

        info!("Airgap bundle uploaded, polling processing status");
        self.start_update_status_poll(StatusSource::Airgap);
        Ok(())
    }

    fn lock_session(&self) -> MutexGuard<'_, UpdateSessionState> {
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }
}
