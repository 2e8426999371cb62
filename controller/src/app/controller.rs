//! Release controller
//!
//! Owns the release history, the per-operation state and every repeater.
//! Presentation layers read decisions from it and receive [`Intent`]s on the
//! channel returned by [`Controller::new`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use openapi_client::models::DeployRequest as DeployBody;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, error, info, warn};

use crate::app::intents::Intent;
use crate::app::options::ControllerOptions;
use crate::app::session::UpdateSessionState;
use crate::app::state::{HistoryState, OperationState, Pagination, UpgradeProgress};
use crate::errors::ControllerError;
use crate::http::api::ReleaseApi;
use crate::lifecycle::action::{ActionDecision, LifecycleFacts};
use crate::lifecycle::diff_selection::DiffTarget;
use crate::lifecycle::download::{DownloadEvent, DownloadFsm, DownloadState};
use crate::lifecycle::gate::{plan_deploy, DeployPlan, DeployRequest};
use crate::lifecycle::gitops::GitOpsSurface;
use crate::lifecycle::{decide, ActionSurface, ReleaseDecision};
use crate::models::downstream::{App, Downstream};
use crate::models::release::{Release, ReleaseStatus};
use crate::workers::registry::PollingRegistry;
use crate::workers::repeater::Repeater;

pub struct Controller {
    pub(super) api: Arc<dyn ReleaseApi>,
    pub(super) options: ControllerOptions,
    pub(super) history: RwLock<HistoryState>,
    pagination: Mutex<Pagination>,
    operations: Mutex<OperationState>,
    pub(super) session: Mutex<UpdateSessionState>,

    history_poller: Repeater,
    pub(super) update_checker: Repeater,
    downloads: PollingRegistry<i64>,
    upgrades: PollingRegistry<i64>,

    intents: mpsc::UnboundedSender<Intent>,
    session_expired: AtomicBool,
    disposed: AtomicBool,
    pub(super) this: Weak<Controller>,
}

impl Controller {
    pub fn new(
        api: Arc<dyn ReleaseApi>,
        options: ControllerOptions,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<Intent>) {
        let (intents, intent_rx) = mpsc::unbounded_channel();
        let pagination = Pagination::new(options.page_size);

        let controller = Arc::new_cyclic(|this| Controller {
            api,
            options,
            history: RwLock::new(HistoryState::default()),
            pagination: Mutex::new(pagination),
            operations: Mutex::new(OperationState::default()),
            session: Mutex::new(UpdateSessionState::default()),
            history_poller: Repeater::new("history"),
            update_checker: Repeater::new("update-check"),
            downloads: PollingRegistry::new("download"),
            upgrades: PollingRegistry::new("console-upgrade"),
            intents,
            session_expired: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
            this: this.clone(),
        });
        (controller, intent_rx)
    }

    pub fn slug(&self) -> &str {
        &self.options.app_slug
    }

    // ================================ ACCESSORS =================================== //

    pub fn pagination(&self) -> Pagination {
        *self.pagination.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub async fn history(&self) -> HistoryState {
        self.history.read().await.clone()
    }

    pub fn download(&self, sequence: i64) -> Option<DownloadFsm> {
        self.lock_operations().downloads.get(&sequence).cloned()
    }

    pub fn upgrade_progress(&self, sequence: i64) -> Option<UpgradeProgress> {
        self.lock_operations().upgrades.get(&sequence).cloned()
    }

    pub fn deploy_error_msg(&self) -> Option<String> {
        self.lock_operations().deploy_error_msg.clone()
    }

    pub fn marked_for_diff(&self) -> Vec<i64> {
        self.lock_operations().diff_selection.marked()
    }

    pub fn is_download_polling(&self, sequence: i64) -> bool {
        self.downloads.is_running(&sequence)
    }

    pub fn is_upgrade_polling(&self, sequence: i64) -> bool {
        self.upgrades.is_running(&sequence)
    }

    pub fn is_history_polling(&self) -> bool {
        self.history_poller.is_running()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Decisions for every release of the current page, in list order
    pub async fn decisions(&self) -> Vec<ReleaseDecision> {
        let history = self.history.read().await;
        let downstream = history.downstream();
        let operations = self.lock_operations();

        history
            .releases
            .iter()
            .map(|release| {
                decide(
                    release,
                    &downstream,
                    self.options.flags,
                    operations.downloads.get(&release.sequence),
                )
            })
            .collect()
    }

    // ================================= HISTORY =================================== //

    /// Fetch the history page and keep the refetch poller in sync with it
    pub async fn refresh_history(&self) -> Result<(), ControllerError> {
        let result = self.fetch_history_once().await;
        self.sync_history_polling().await;
        result
    }

    async fn fetch_history_once(&self) -> Result<(), ControllerError> {
        let Pagination {
            current_page,
            page_size,
        } = self.pagination();
        let slug = self.slug();

        let fetched = futures::try_join!(
            self.api.get_app(slug),
            self.api.get_version_history(slug, current_page, page_size)
        )
        .map(|(app, history)| HistoryState::from_fetch(app, history));

        match fetched {
            Ok(state) => {
                debug!(
                    "Fetched {} release(s) of {} for {}",
                    state.releases.len(),
                    state.total_count,
                    slug
                );
                *self.history.write().await = state;
                self.emit(Intent::HistoryRefreshed);
                Ok(())
            }
            Err(e) => {
                error!("Failed to fetch release history: {}", e);
                self.history.write().await.error_msg = Some(e.display_message());
                self.handle_failure(&e);
                Err(e)
            }
        }
    }

    /// Refetch while preflight results are still being computed
    async fn sync_history_polling(&self) {
        let pending = self.history.read().await.has_pending_preflights();
        if !pending || self.is_disposed() {
            self.history_poller.stop();
            return;
        }
        if self.history_poller.is_running() {
            return;
        }

        debug!("Preflights running, polling release history");
        let this = self.this.clone();
        self.history_poller
            .start(self.options.polling.history_refresh, move || {
                let this = this.clone();
                async move {
                    let Some(controller) = this.upgrade() else {
                        return Ok(());
                    };
                    controller.fetch_history_once().await?;
                    if !controller.history.read().await.has_pending_preflights() {
                        controller.history_poller.stop();
                    }
                    Ok(())
                }
            });
    }

    pub async fn set_page(&self, page: u32) -> Result<(), ControllerError> {
        self.lock_pagination().set_page(page);
        self.refresh_history().await
    }

    pub async fn set_page_size(&self, page_size: u32) -> Result<(), ControllerError> {
        if page_size == 0 {
            return Err(ControllerError::ConfigError(
                "page size must be greater than zero".to_string(),
            ));
        }
        self.lock_pagination().set_page_size(page_size);
        self.refresh_history().await
    }

    // ================================= ACTIONS =================================== //

    /// Run the primary action of a release row
    pub async fn activate(&self, sequence: i64) -> Result<(), ControllerError> {
        let (release, downstream, _) = self.snapshot(sequence).await?;
        let decision = {
            let operations = self.lock_operations();
            decide(
                &release,
                &downstream,
                self.options.flags,
                operations.downloads.get(&sequence),
            )
        };

        match decision.surface {
            ActionSurface::GitOps(GitOpsSurface::ViewCommit { url }) => {
                self.emit(Intent::RequestExternalCommitView { url });
                Ok(())
            }
            ActionSurface::GitOps(_) | ActionSurface::Download { in_progress: true } => Ok(()),
            ActionSurface::Download { in_progress: false } => self.start_download(sequence).await,
            ActionSurface::Local(button) if !button.enabled => {
                Err(ControllerError::InvalidTransition(
                    button
                        .disabled_reason
                        .unwrap_or_else(|| format!("{} is not available", button.label)),
                ))
            }
            ActionSurface::Local(button) => match button.decision {
                ActionDecision::Configure => {
                    self.emit(Intent::RequestConfigure { release });
                    Ok(())
                }
                ActionDecision::Upgrade => self.start_console_upgrade(sequence).await,
                ActionDecision::Deploy | ActionDecision::Redeploy | ActionDecision::Rollback => self
                    .request_deploy(sequence, DeployRequest::default())
                    .await
                    .map(|_| ()),
                ActionDecision::Deploying | ActionDecision::Deployed => Ok(()),
            },
        }
    }

    /// Gate a deploy request, finalizing it when nothing needs acknowledging
    pub async fn request_deploy(
        &self,
        sequence: i64,
        request: DeployRequest,
    ) -> Result<DeployPlan, ControllerError> {
        let (release, downstream, app) = self.snapshot(sequence).await?;
        let facts = LifecycleFacts::new(&release, &downstream, self.options.flags);
        let plan = plan_deploy(&release, &downstream, &app, &facts, request);

        match &plan {
            DeployPlan::Gate(gate) => {
                debug!("Deploy of sequence {} gated: {:?}", sequence, gate);
                self.emit(Intent::RequestDeploy {
                    release,
                    gate: gate.clone(),
                });
            }
            DeployPlan::Finalize {
                skip_preflights,
                continue_with_failed_preflights,
            } => {
                self.finalize_deploy(&release, *skip_preflights, *continue_with_failed_preflights)
                    .await?;
            }
            DeployPlan::NotAllowed(reason) => {
                warn!("Deploy of sequence {} not allowed: {}", sequence, reason);
            }
        }
        Ok(plan)
    }

    async fn finalize_deploy(
        &self,
        release: &Release,
        skip_preflights: bool,
        continue_with_failed_preflights: bool,
    ) -> Result<(), ControllerError> {
        self.lock_operations().deploy_error_msg = None;

        let body = DeployBody {
            is_skip_preflights: skip_preflights,
            continue_with_failed_preflights,
            is_cli: false,
        };
        info!("Deploying sequence {}", release.sequence);
        if let Err(e) = self
            .api
            .deploy_version(self.slug(), release.sequence, &body)
            .await
        {
            error!("Failed to deploy sequence {}: {}", release.sequence, e);
            self.lock_operations().deploy_error_msg = Some(e.display_message());
            self.handle_failure(&e);
            return Err(e);
        }

        self.refresh_history().await
    }

    // ================================ DOWNLOADS ================================== //

    pub async fn start_download(&self, sequence: i64) -> Result<(), ControllerError> {
        self.ensure_active()?;
        let release = self.release(sequence).await?;
        if release.status != ReleaseStatus::PendingDownload {
            return Err(ControllerError::InvalidTransition(format!(
                "sequence {} is already downloaded",
                sequence
            )));
        }

        self.lock_operations()
            .downloads
            .entry(sequence)
            .or_default()
            .process(DownloadEvent::Start)?;

        info!("Downloading sequence {}", sequence);
        if let Err(e) = self
            .api
            .download_version(self.slug(), release.parent_sequence)
            .await
        {
            error!("Failed to start download of sequence {}: {}", sequence, e);
            self.record_download(sequence, DownloadEvent::Failed(e.display_message()));
            self.handle_failure(&e);
            return Err(e);
        }

        // disposal may have happened while the request was in flight
        self.ensure_active()?;
        let parent_sequence = release.parent_sequence;
        self.emit(Intent::RequestDownload { release });

        let this = self.this.clone();
        self.downloads
            .start(&sequence, self.options.polling.download_status, move || {
                let this = this.clone();
                async move {
                    match this.upgrade() {
                        Some(controller) => {
                            controller
                                .poll_download_once(sequence, parent_sequence)
                                .await
                        }
                        None => Ok(()),
                    }
                }
            })
    }

    /// One download status poll for a single sequence
    pub async fn poll_download_once(
        &self,
        sequence: i64,
        parent_sequence: i64,
    ) -> Result<(), ControllerError> {
        let status = match self
            .api
            .version_download_status(self.slug(), parent_sequence)
            .await
        {
            Ok(status) => status,
            Err(e) => {
                self.record_download(sequence, DownloadEvent::Failed(e.display_message()));
                self.downloads.stop(&sequence);
                self.handle_failure(&e);
                return Err(e);
            }
        };

        let state = {
            let mut operations = self.lock_operations();
            let fsm = operations.downloads.entry(sequence).or_default();
            fsm.apply(&status)?;
            fsm.state().clone()
        };

        match state {
            DownloadState::Complete => {
                info!("Download of sequence {} complete", sequence);
                self.downloads.remove(&sequence);
                self.lock_operations().downloads.remove(&sequence);
                self.refresh_history().await?;
            }
            DownloadState::Failed => {
                warn!("Download of sequence {} failed", sequence);
                self.downloads.stop(&sequence);
            }
            DownloadState::Idle | DownloadState::Downloading => {}
        }
        Ok(())
    }

    fn record_download(&self, sequence: i64, event: DownloadEvent) {
        let mut operations = self.lock_operations();
        let fsm = operations.downloads.entry(sequence).or_default();
        if let Err(e) = fsm.process(event) {
            debug!("Ignoring download event for sequence {}: {}", sequence, e);
        }
    }

    // ============================= CONSOLE UPGRADE =============================== //

    pub async fn start_console_upgrade(&self, sequence: i64) -> Result<(), ControllerError> {
        self.ensure_active()?;
        let (release, downstream, _) = self.snapshot(sequence).await?;
        let facts = LifecycleFacts::new(&release, &downstream, self.options.flags);
        if !facts.can_upgrade_console {
            return Err(ControllerError::InvalidTransition(format!(
                "sequence {} does not require an admin console upgrade",
                sequence
            )));
        }

        self.lock_operations().upgrades.insert(
            sequence,
            UpgradeProgress {
                running: true,
                ..Default::default()
            },
        );

        info!("Upgrading admin console for sequence {}", sequence);
        if let Err(e) = self
            .api
            .upgrade_console(self.slug(), release.parent_sequence)
            .await
        {
            error!("Failed to start console upgrade: {}", e);
            if let Some(progress) = self.lock_operations().upgrades.get_mut(&sequence) {
                progress.running = false;
                progress.error_msg = Some(e.display_message());
            }
            self.handle_failure(&e);
            return Err(e);
        }

        self.ensure_active()?;
        self.emit(Intent::RequestConsoleUpgrade { release });

        let this = self.this.clone();
        self.upgrades
            .start(&sequence, self.options.polling.upgrade_status, move || {
                let this = this.clone();
                async move {
                    match this.upgrade() {
                        Some(controller) => controller.poll_console_upgrade_once(sequence).await,
                        None => Ok(()),
                    }
                }
            })
    }

    /// One console upgrade status poll. Request errors keep the poller alive.
    pub async fn poll_console_upgrade_once(&self, sequence: i64) -> Result<(), ControllerError> {
        let status = match self.api.console_upgrade_status(self.slug()).await {
            Ok(status) => status,
            Err(e) => {
                self.handle_failure(&e);
                return Err(e);
            }
        };

        let terminal = status.is_terminal();
        {
            let mut operations = self.lock_operations();
            let progress = operations.upgrades.entry(sequence).or_default();
            progress.running = !terminal;
            progress.message = status.current_message.clone();
            if status.is_failed() {
                progress.error_msg = Some(
                    status
                        .error
                        .clone()
                        .filter(|e| !e.is_empty())
                        .unwrap_or_else(|| status.current_message.clone()),
                );
            }
        }

        if !terminal {
            return Ok(());
        }

        self.upgrades.remove(&sequence);
        if status.is_failed() {
            warn!("Console upgrade for sequence {} failed", sequence);
            return Ok(());
        }
        info!("Console upgrade for sequence {} complete", sequence);
        self.refresh_history().await
    }

    // =================================== DIFF ==================================== //

    /// Mark or unmark a release for diffing. Returns the marked sequences.
    pub async fn toggle_diff(&self, sequence: i64) -> Result<Vec<i64>, ControllerError> {
        let release = self.release(sequence).await?;
        let mut operations = self.lock_operations();
        operations.diff_selection.toggle(&release)?;
        Ok(operations.diff_selection.marked())
    }

    pub fn clear_diff(&self) {
        self.lock_operations().diff_selection.clear();
    }

    /// Open the diff of the two marked releases
    pub async fn open_diff(&self) -> Result<DiffTarget, ControllerError> {
        let target = {
            let history = self.history.read().await;
            let downstream = history.downstream();
            let commit_url_of =
                |sequence: i64| history.release(sequence).and_then(|r| r.commit_url);
            self.lock_operations()
                .diff_selection
                .target(&downstream, commit_url_of)?
        };

        match &target {
            DiffTarget::Inline(pair) => self.emit(Intent::RequestDiffView {
                first_sequence: pair.first_sequence,
                second_sequence: pair.second_sequence,
            }),
            DiffTarget::External { url } => {
                self.emit(Intent::RequestExternalDiffView { url: url.clone() })
            }
        }
        Ok(target)
    }

    // ================================= TEARDOWN ================================== //

    /// Auth failures end the session; everything else stays scoped to its operation
    pub(super) fn handle_failure(&self, error: &ControllerError) {
        if !error.is_unauthorized() {
            return;
        }
        if !self.session_expired.swap(true, Ordering::SeqCst) {
            warn!("Session expired, stopping all pollers");
            self.emit(Intent::SessionExpired);
        }
        self.dispose();
    }

    /// Stop every repeater. Returns how many were active.
    pub fn dispose(&self) -> usize {
        self.disposed.store(true, Ordering::SeqCst);

        let mut stopped = self.downloads.stop_all() + self.upgrades.stop_all();
        stopped += usize::from(self.history_poller.stop());
        stopped += usize::from(self.update_checker.stop());

        info!("Controller disposed, {} poller(s) stopped", stopped);
        stopped
    }

    pub(super) fn ensure_active(&self) -> Result<(), ControllerError> {
        if self.is_disposed() {
            return Err(ControllerError::InvalidTransition(
                "controller has been disposed".to_string(),
            ));
        }
        Ok(())
    }

    // ================================= HELPERS =================================== //

    pub(super) fn emit(&self, intent: Intent) {
        if self.intents.send(intent).is_err() {
            debug!("Intent receiver dropped");
        }
    }

    async fn release(&self, sequence: i64) -> Result<Release, ControllerError> {
        self.history
            .read()
            .await
            .release(sequence)
            .ok_or_else(|| ControllerError::NotFound(format!("sequence {}", sequence)))
    }

    async fn snapshot(&self, sequence: i64) -> Result<(Release, Downstream, App), ControllerError> {
        let history = self.history.read().await;
        let release = history
            .release(sequence)
            .ok_or_else(|| ControllerError::NotFound(format!("sequence {}", sequence)))?;
        let app = history.app.clone().unwrap_or_default();
        Ok((release, history.downstream(), app))
    }

    fn lock_operations(&self) -> MutexGuard<'_, OperationState> {
        self.operations.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_pagination(&self) -> MutexGuard<'_, Pagination> {
        self.pagination.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.dispose();
    }
}
