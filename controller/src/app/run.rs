//! Main application run loop

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::app::controller::Controller;
use crate::app::intents::Intent;
use crate::app::options::ControllerOptions;
use crate::app::session::UpdateSessionState;
use crate::app::state::HistoryState;
use crate::errors::ControllerError;
use crate::http::api::ReleaseApi;
use crate::lifecycle::ReleaseDecision;

/// What a single CLI invocation should do
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// History page to show
    pub page: u32,

    /// Run an update check and wait for it to settle
    pub check_updates: bool,

    /// How often to look for the session settling
    pub idle_poll_interval: Duration,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            page: 0,
            check_updates: false,
            idle_poll_interval: Duration::from_millis(500),
        }
    }
}

/// Final state of a run, ready to print
#[derive(Debug, Clone)]
pub struct Report {
    pub history: HistoryState,
    pub decisions: Vec<ReleaseDecision>,
    pub session: UpdateSessionState,
}

/// Run the release controller once
pub async fn run(
    api: Arc<dyn ReleaseApi>,
    options: ControllerOptions,
    run_options: RunOptions,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<Report, ControllerError> {
    info!("Initializing release controller for {}...", options.app_slug);
    let (controller, mut intents) = Controller::new(api, options);

    let result = execute(&controller, &mut intents, &run_options, shutdown_signal).await;

    let report = Report {
        history: controller.history().await,
        decisions: controller.decisions().await,
        session: controller.update_session(),
    };
    controller.dispose();
    result.map(|_| report)
}

async fn execute(
    controller: &Controller,
    intents: &mut mpsc::UnboundedReceiver<Intent>,
    run_options: &RunOptions,
    shutdown_signal: impl Future<Output = ()>,
) -> Result<(), ControllerError> {
    if run_options.page > 0 {
        controller.set_page(run_options.page).await?;
    } else {
        controller.refresh_history().await?;
    }

    if !run_options.check_updates {
        return Ok(());
    }

    controller.check_for_updates().await?;
    tokio::select! {
        _ = shutdown_signal => {
            info!("Shutdown signal received, shutting down...");
            Ok(())
        }
        result = await_settled(controller, intents, run_options.idle_poll_interval) => result,
    }
}

/// Wait until no update check or history refetch is in flight
async fn await_settled(
    controller: &Controller,
    intents: &mut mpsc::UnboundedReceiver<Intent>,
    poll_interval: Duration,
) -> Result<(), ControllerError> {
    loop {
        tokio::select! {
            intent = intents.recv() => match intent {
                Some(Intent::SessionExpired) => {
                    warn!("Session expired");
                    return Err(ControllerError::Unauthorized(
                        "session token rejected".to_string(),
                    ));
                }
                Some(intent) => debug!("Intent: {:?}", intent),
                None => return Ok(()),
            },
            _ = tokio::time::sleep(poll_interval) => {
                if !controller.is_checking_for_updates() && !controller.is_history_polling() {
                    return Ok(());
                }
            }
        }
    }
}
