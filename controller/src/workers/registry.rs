//! Keyed collection of repeaters

use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::debug;

use crate::errors::ControllerError;
use crate::workers::repeater::Repeater;

/// One repeater per key, created lazily
///
/// Keys are release sequences in practice, so polling for one release never
/// touches the schedule of another. Once [`PollingRegistry::stop_all`] has
/// run, the registry is closed and refuses new schedules.
pub struct PollingRegistry<K> {
    name: &'static str,
    repeaters: Mutex<HashMap<K, Arc<Repeater>>>,
    closed: AtomicBool,
}

impl<K> PollingRegistry<K>
where
    K: Eq + Hash + Clone + Display,
{
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            repeaters: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Get the repeater for `key`, creating it on first use
    pub fn repeater(&self, key: &K) -> Arc<Repeater> {
        let mut repeaters = self.repeaters.lock().unwrap_or_else(|e| e.into_inner());
        repeaters
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Repeater::new(format!("{}/{}", self.name, key))))
            .clone()
    }

    /// Start (or restart) polling for `key`
    pub fn start<F, Fut>(&self, key: &K, period: Duration, work: F) -> Result<(), ControllerError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ControllerError>> + Send + 'static,
    {
        // checked under the map lock so a concurrent stop_all cannot miss it
        let mut repeaters = self.repeaters.lock().unwrap_or_else(|e| e.into_inner());
        if self.is_closed() {
            return Err(ControllerError::InvalidTransition(format!(
                "registry {} is closed, not polling {}",
                self.name, key
            )));
        }
        repeaters
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Repeater::new(format!("{}/{}", self.name, key))))
            .start(period, work);
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Stop polling for `key`, keeping its entry
    pub fn stop(&self, key: &K) -> bool {
        let repeaters = self.repeaters.lock().unwrap_or_else(|e| e.into_inner());
        repeaters.get(key).is_some_and(|repeater| repeater.stop())
    }

    /// Stop polling for `key` and drop its entry
    pub fn remove(&self, key: &K) -> bool {
        let removed = {
            let mut repeaters = self.repeaters.lock().unwrap_or_else(|e| e.into_inner());
            repeaters.remove(key)
        };
        match removed {
            Some(repeater) => {
                repeater.stop();
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self, key: &K) -> bool {
        let repeaters = self.repeaters.lock().unwrap_or_else(|e| e.into_inner());
        repeaters.get(key).is_some_and(|repeater| repeater.is_running())
    }

    /// Keys whose repeater is currently scheduled
    pub fn active_keys(&self) -> Vec<K> {
        let repeaters = self.repeaters.lock().unwrap_or_else(|e| e.into_inner());
        repeaters
            .iter()
            .filter(|(_, repeater)| repeater.is_running())
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Stop every repeater, clear the registry and close it. Returns how many
    /// were active.
    pub fn stop_all(&self) -> usize {
        let drained: Vec<(K, Arc<Repeater>)> = {
            let mut repeaters = self.repeaters.lock().unwrap_or_else(|e| e.into_inner());
            self.closed.store(true, Ordering::SeqCst);
            repeaters.drain().collect()
        };

        let stopped = drained
            .iter()
            .filter(|(_, repeater)| repeater.stop())
            .count();
        debug!("Registry {} stopped {} repeater(s)", self.name, stopped);
        stopped
    }

    pub fn len(&self) -> usize {
        let repeaters = self.repeaters.lock().unwrap_or_else(|e| e.into_inner());
        repeaters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
