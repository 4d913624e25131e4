use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, Sender, TrySendError};

use super::settings::TileSettings;
use crate::{Error, Result};

pub const MIN_INTERVAL: Duration = Duration::from_millis(250);
pub const MAX_INTERVAL: Duration = Duration::from_secs(10);
pub const MIN_DYNAMIC_INTERVAL: Duration = Duration::from_millis(100);
pub const MAX_DYNAMIC_INTERVAL: Duration = Duration::from_secs(30);
/// Tiles in error state are retried at most this often.
pub const ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// A tracked tile: its action kind, context id and an owned copy of its settings.
#[derive(Debug, Clone, PartialEq)]
pub struct TileAction {
    pub action: String,
    pub context: String,
    pub settings: TileSettings,
}

struct State {
    actions: HashMap<String, TileAction>,
    last_run: HashMap<String, Instant>,
    interval: Duration,
}

/// Owns every tile's settings and drives the periodic re-render.
///
/// Reads hand out copies; callers write changes back with `set_action`.
pub struct ActionManager {
    state: RwLock<State>,
    interval_tx: Sender<Duration>,
    interval_rx: Receiver<Duration>,
}

impl ActionManager {
    pub fn new(interval: Duration) -> Self {
        let (interval_tx, interval_rx) = channel::bounded(1);
        Self {
            state: RwLock::new(State {
                actions: HashMap::new(),
                last_run: HashMap::new(),
                interval: interval.clamp(MIN_INTERVAL, MAX_INTERVAL),
            }),
            interval_tx,
            interval_rx,
        }
    }

    pub fn set_action(&self, action: &str, context: &str, settings: TileSettings) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.actions.insert(
            context.to_string(),
            TileAction {
                action: action.to_string(),
                context: context.to_string(),
                settings,
            },
        );
    }

    pub fn remove_action(&self, context: &str) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.actions.remove(context);
        state.last_run.remove(context);
    }

    pub fn get_settings(&self, context: &str) -> Result<TileSettings> {
        self.get_action(context).map(|a| a.settings)
    }

    pub fn get_action(&self, context: &str) -> Result<TileAction> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state
            .actions
            .get(context)
            .cloned()
            .ok_or_else(|| Error::UnknownTile(context.to_string()))
    }

    pub fn contexts(&self) -> Vec<String> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.actions.keys().cloned().collect()
    }

    pub fn interval(&self) -> Duration {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .interval
    }

    /// Change the tick interval of a running scheduler. A value that has not
    /// been picked up yet is replaced rather than queued behind.
    pub fn set_interval(&self, interval: Duration) -> Duration {
        let interval = interval.clamp(MIN_DYNAMIC_INTERVAL, MAX_DYNAMIC_INTERVAL);
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .interval = interval;
        loop {
            match self.interval_tx.try_send(interval) {
                Ok(()) => break,
                Err(TrySendError::Full(_)) => {
                    let _ = self.interval_rx.try_recv();
                }
                Err(TrySendError::Disconnected(_)) => break,
            }
        }
        interval
    }

    /// One scheduler pass at `now`.
    ///
    /// Candidates are collected under the lock; `update` runs with the lock
    /// released so handlers may mutate settings from inside it.
    pub fn tick(&self, now: Instant, update: &mut dyn FnMut(&TileAction)) -> usize {
        let due: Vec<TileAction> = {
            let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
            state
                .actions
                .values()
                .filter(|a| a.settings.is_valid)
                .filter(|a| {
                    !(a.settings.in_error_state
                        && state
                            .last_run
                            .get(&a.context)
                            .is_some_and(|last| now.saturating_duration_since(*last) < ERROR_BACKOFF))
                })
                .cloned()
                .collect()
        };

        for action in &due {
            update(action);
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            if state.actions.contains_key(&action.context) {
                state.last_run.insert(action.context.clone(), now);
            }
        }
        due.len()
    }

    /// Start the scheduler thread.
    pub fn run<F>(self: &Arc<Self>, mut update: F) -> Result<SchedulerHandle>
    where
        F: FnMut(&TileAction) + Send + 'static,
    {
        let manager = Arc::clone(self);
        let (stop_tx, stop_rx) = channel::bounded::<()>(1);
        let join = thread::Builder::new()
            .name("lhmdeck-scheduler".into())
            .spawn(move || {
                let mut ticker = channel::tick(manager.interval());
                loop {
                    let mut retime = None;
                    channel::select! {
                        recv(stop_rx) -> _ => break,
                        recv(manager.interval_rx) -> msg => retime = msg.ok(),
                        recv(ticker) -> msg => {
                            if msg.is_ok() {
                                manager.tick(Instant::now(), &mut update);
                            }
                        }
                    }
                    if let Some(interval) = retime {
                        ticker = channel::tick(interval);
                        log::info!(
                            "scheduler interval set to {}",
                            humantime::format_duration(interval)
                        );
                    }
                }
                log::debug!("scheduler stopped");
            })?;
        Ok(SchedulerHandle {
            stop: Some(stop_tx),
            join: Some(join),
        })
    }
}

/// Stops the scheduler thread on `stop()` or drop.
pub struct SchedulerHandle {
    stop: Option<Sender<()>>,
    join: Option<JoinHandle<()>>,
}

impl SchedulerHandle {
    pub fn stop(&mut self) {
        self.stop.take();
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
