//! Cancellable interval poller
//!
//! A [`Repeater`] runs a unit of async work after a period, then again one
//! period after each run completes. Work never overlaps with itself, and a
//! failed run does not end the schedule; only [`Repeater::stop`] (or a
//! replacing [`Repeater::start`]) does.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::errors::ControllerError;

struct Schedule {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl Schedule {
    /// Signal the loop to exit. Work already in flight is allowed to finish.
    fn cancel(self) {
        self.stop_tx.send_replace(true);
        drop(self.handle);
    }
}

/// Start/stop controlled recurring async poll
pub struct Repeater {
    name: String,
    schedule: Mutex<Option<Schedule>>,
}

impl Repeater {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schedule: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Start polling `work` every `period`, replacing any previous schedule
    pub fn start<F, Fut>(&self, period: Duration, work: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ControllerError>> + Send + 'static,
    {
        let mut schedule = self.schedule.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = schedule.take() {
            debug!("Repeater {} restarted, replacing previous schedule", self.name);
            previous.cancel();
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(run(self.name.clone(), period, work, stop_rx));
        *schedule = Some(Schedule { stop_tx, handle });
    }

    /// Stop the schedule. Returns whether a schedule was active.
    pub fn stop(&self) -> bool {
        let mut schedule = self.schedule.lock().unwrap_or_else(|e| e.into_inner());
        match schedule.take() {
            Some(active) => {
                debug!("Repeater {} stopped", self.name);
                active.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        let schedule = self.schedule.lock().unwrap_or_else(|e| e.into_inner());
        schedule
            .as_ref()
            .is_some_and(|active| !active.handle.is_finished())
    }
}

impl Drop for Repeater {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run<F, Fut>(name: String, period: Duration, work: F, mut stop_rx: watch::Receiver<bool>)
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<(), ControllerError>>,
{
    loop {
        tokio::select! {
            biased;
            _ = stop_rx.changed() => return,
            _ = tokio::time::sleep(period) => {}
        }

        if *stop_rx.borrow() {
            return;
        }

        if let Err(e) = work().await {
            warn!("Repeater {} run failed: {}", name, e);
        }

        if *stop_rx.borrow() {
            return;
        }
    }
}
