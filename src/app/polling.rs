use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::telemetry::SnapshotCache;
use crate::Result;

/// Sleep granularity while waiting out an interval, so a stop request is
/// noticed promptly.
const WAKE_SLICE: Duration = Duration::from_millis(50);

/// Guard that keeps the refresh thread alive until stopped or dropped.
pub struct PollingHandle {
    running: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl PollingHandle {
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

impl Drop for PollingHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Spawn the background thread that refreshes `cache` every `interval()`.
/// The interval is re-read each round so runtime changes take effect.
pub fn start_polling<F>(
    cache: Arc<SnapshotCache>,
    interval: F,
    app_running: Arc<AtomicBool>,
) -> Result<PollingHandle>
where
    F: Fn() -> Duration + Send + 'static,
{
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = running.clone();
    let join = thread::Builder::new()
        .name("lhmdeck-poller".into())
        .spawn(move || {
            let alive =
                || app_running.load(Ordering::SeqCst) && running_clone.load(Ordering::SeqCst);
            let mut failing = false;
            while alive() {
                let start = Instant::now();
                match cache.refresh() {
                    Ok(()) if failing => {
                        log::info!("hardware source is back");
                        failing = false;
                    }
                    Ok(()) => {}
                    Err(err) if !failing => {
                        log::warn!("refresh failed: {err}");
                        failing = true;
                    }
                    Err(err) => log::debug!("refresh still failing: {err}"),
                }
                let deadline = start + interval().max(Duration::from_millis(1));
                while alive() {
                    let now = Instant::now();
                    if now >= deadline {
                        break;
                    }
                    thread::sleep((deadline - now).min(WAKE_SLICE));
                }
            }
            log::debug!("poller stopped");
        })?;
    Ok(PollingHandle {
        running,
        join: Some(join),
    })
}
