//! Scripted release API

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use http::StatusCode;
use openapi_client::models::{DeployRequest, TaskState, TaskStatus, UpdateCheckResponse};

use relctl::app::options::{ControllerOptions, PollingOptions};
use relctl::errors::ControllerError;
use relctl::http::api::ReleaseApi;
use relctl::http::versions::VersionHistory;
use relctl::models::downstream::{App, Downstream};
use relctl::models::release::Release;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    Unauthorized,
    Server,
}

impl Failure {
    fn to_error(self) -> ControllerError {
        match self {
            Failure::Unauthorized => ControllerError::Unauthorized("token expired".to_string()),
            Failure::Server => ControllerError::Request {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: "internal error".to_string(),
            },
        }
    }
}

#[derive(Default)]
struct Script {
    app: App,
    releases: Vec<Release>,
    update_check: UpdateCheckResponse,
    update_statuses: VecDeque<TaskStatus>,
    airgap_statuses: VecDeque<TaskStatus>,
    upgrade_statuses: VecDeque<TaskStatus>,
    download_statuses: HashMap<i64, VecDeque<TaskStatus>>,
    failures: HashMap<&'static str, Failure>,
    delays: HashMap<&'static str, Duration>,
    calls: Vec<String>,
}

/// Release API answering from a script and recording every call
#[derive(Default)]
pub struct MockApi {
    script: Mutex<Script>,
}

pub fn status(state: TaskState, message: &str) -> TaskStatus {
    TaskStatus {
        status: state,
        current_message: message.to_string(),
        error: None,
    }
}

pub fn failed_status(error: &str) -> TaskStatus {
    TaskStatus {
        status: TaskState::Failed,
        current_message: String::new(),
        error: Some(error.to_string()),
    }
}

/// Take the next scripted status; the last one repeats
fn next_status(queue: &mut VecDeque<TaskStatus>) -> TaskStatus {
    if queue.len() > 1 {
        queue.pop_front().unwrap_or_default()
    } else {
        queue
            .front()
            .cloned()
            .unwrap_or_else(|| status(TaskState::Successful, ""))
    }
}

pub fn options() -> ControllerOptions {
    ControllerOptions {
        app_slug: "sentry".to_string(),
        polling: PollingOptions {
            update_status: Duration::from_millis(100),
            download_status: Duration::from_millis(100),
            upgrade_status: Duration::from_millis(100),
            history_refresh: Duration::from_millis(100),
        },
        ..Default::default()
    }
}

impl MockApi {
    pub fn new(downstream: Downstream, releases: Vec<Release>) -> Self {
        let api = MockApi::default();
        {
            let mut script = api.lock();
            script.app = App {
                slug: "sentry".to_string(),
                name: "Sentry".to_string(),
                auto_deploy: "disabled".to_string(),
                downstream: Some(downstream),
                ..Default::default()
            };
            script.releases = releases;
        }
        api
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap()
    }

    fn record(&self, call: String, name: &'static str) -> Result<(), ControllerError> {
        let mut script = self.lock();
        script.calls.push(call);
        match script.failures.get(name) {
            Some(failure) => Err(failure.to_error()),
            None => Ok(()),
        }
    }

    pub fn set_releases(&self, releases: Vec<Release>) {
        self.lock().releases = releases;
    }

    pub fn set_app(&self, app: App) {
        self.lock().app = app;
    }

    pub fn set_update_check(&self, response: UpdateCheckResponse) {
        self.lock().update_check = response;
    }

    pub fn script_update_statuses(&self, statuses: Vec<TaskStatus>) {
        self.lock().update_statuses = statuses.into();
    }

    pub fn script_airgap_statuses(&self, statuses: Vec<TaskStatus>) {
        self.lock().airgap_statuses = statuses.into();
    }

    pub fn script_upgrade_statuses(&self, statuses: Vec<TaskStatus>) {
        self.lock().upgrade_statuses = statuses.into();
    }

    pub fn script_download_statuses(&self, parent_sequence: i64, statuses: Vec<TaskStatus>) {
        self.lock()
            .download_statuses
            .insert(parent_sequence, statuses.into());
    }

    /// Make every call to `name` fail
    pub fn fail(&self, name: &'static str, failure: Failure) {
        self.lock().failures.insert(name, failure);
    }

    /// Hold every call to `name` for `delay` before answering
    pub fn delay(&self, name: &'static str, delay: Duration) {
        self.lock().delays.insert(name, delay);
    }

    async fn wait(&self, name: &'static str) {
        let delay = self.lock().delays.get(name).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    /// Number of calls whose record starts with `prefix`
    pub fn count(&self, prefix: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }
}

#[async_trait]
impl ReleaseApi for MockApi {
    async fn get_app(&self, slug: &str) -> Result<App, ControllerError> {
        self.record(format!("get_app:{}", slug), "get_app")?;
        Ok(self.lock().app.clone())
    }

    async fn get_version_history(
        &self,
        _slug: &str,
        current_page: u32,
        page_size: u32,
    ) -> Result<VersionHistory, ControllerError> {
        self.record(
            format!("versions:{}:{}", current_page, page_size),
            "versions",
        )?;
        let releases = self.lock().releases.clone();
        Ok(VersionHistory {
            total_count: releases.len() as i64,
            version_history: releases,
            ..Default::default()
        })
    }

    async fn check_for_updates(&self, _slug: &str) -> Result<UpdateCheckResponse, ControllerError> {
        self.record("updatecheck".to_string(), "updatecheck")?;
        Ok(self.lock().update_check.clone())
    }

    async fn update_download_status(&self, _slug: &str) -> Result<TaskStatus, ControllerError> {
        self.record("update_status".to_string(), "update_status")?;
        Ok(next_status(&mut self.lock().update_statuses))
    }

    async fn airgap_status(&self, _slug: &str) -> Result<TaskStatus, ControllerError> {
        self.record("airgap_status".to_string(), "airgap_status")?;
        Ok(next_status(&mut self.lock().airgap_statuses))
    }

    async fn download_version(&self, _slug: &str, parent_sequence: i64) -> Result<(), ControllerError> {
        self.wait("download").await;
        self.record(format!("download:{}", parent_sequence), "download")
    }

    async fn version_download_status(
        &self,
        _slug: &str,
        parent_sequence: i64,
    ) -> Result<TaskStatus, ControllerError> {
        self.record(
            format!("download_status:{}", parent_sequence),
            "download_status",
        )?;
        let mut script = self.lock();
        let queue = script.download_statuses.entry(parent_sequence).or_default();
        Ok(next_status(queue))
    }

    async fn deploy_version(
        &self,
        _slug: &str,
        sequence: i64,
        request: &DeployRequest,
    ) -> Result<(), ControllerError> {
        self.record(
            format!(
                "deploy:{}:skip={}:continue={}",
                sequence, request.is_skip_preflights, request.continue_with_failed_preflights
            ),
            "deploy",
        )
    }

    async fn upgrade_console(&self, _slug: &str, parent_sequence: i64) -> Result<(), ControllerError> {
        self.wait("upgrade").await;
        self.record(format!("upgrade:{}", parent_sequence), "upgrade")
    }

    async fn console_upgrade_status(&self, _slug: &str) -> Result<TaskStatus, ControllerError> {
        self.record("upgrade_status".to_string(), "upgrade_status")?;
        Ok(next_status(&mut self.lock().upgrade_statuses))
    }
}
