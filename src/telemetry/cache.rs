use std::sync::{Arc, Condvar, Mutex, PoisonError, RwLock};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use super::node::build_snapshot;
use super::{HardwareSource, PollTime, Reading, Sensor, SensorSnapshot};
use crate::{Error, Result};

#[derive(Default)]
struct Flight {
    in_progress: bool,
    generation: u64,
    last: Option<Result<()>>,
}

/// Caches the most recent successful snapshot and collapses concurrent
/// refreshes into a single upstream fetch.
pub struct SnapshotCache {
    source: Box<dyn HardwareSource>,
    current: RwLock<Option<Arc<SensorSnapshot>>>,
    flight: Mutex<Flight>,
    landed: Condvar,
}

impl SnapshotCache {
    pub fn new(source: impl HardwareSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            current: RwLock::new(None),
            flight: Mutex::new(Flight::default()),
            landed: Condvar::new(),
        }
    }

    /// Fetch and swap in a new snapshot. Callers arriving while a fetch is
    /// running wait for it and receive its result instead of fetching again.
    /// On failure the previous snapshot stays in place.
    pub fn refresh(&self) -> Result<()> {
        let mut flight = self.flight.lock().unwrap_or_else(PoisonError::into_inner);
        if flight.in_progress {
            let joined = flight.generation;
            while flight.generation == joined {
                flight = self
                    .landed
                    .wait(flight)
                    .unwrap_or_else(PoisonError::into_inner);
            }
            return flight.last.clone().unwrap_or(Err(Error::NotReady));
        }
        flight.in_progress = true;
        drop(flight);

        let result = self.fetch_and_swap();
        if let Err(err) = &result {
            log::debug!("snapshot refresh failed: {err}");
        }

        let mut flight = self.flight.lock().unwrap_or_else(PoisonError::into_inner);
        flight.in_progress = false;
        flight.generation = flight.generation.wrapping_add(1);
        flight.last = Some(result.clone());
        self.landed.notify_all();
        result
    }

    fn fetch_and_swap(&self) -> Result<()> {
        let root = self.source.fetch()?;
        let flat = build_snapshot(&root);
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let previous = current.as_ref().map(|snap| snap.poll_time.nanos);
        let snapshot = SensorSnapshot {
            poll_time: PollTime {
                nanos: next_poll_nanos(previous),
                captured_at: Instant::now(),
            },
            sensors: flat.sensors,
            readings: flat.readings,
        };
        *current = Some(Arc::new(snapshot));
        Ok(())
    }

    /// Current snapshot, if any fetch has ever succeeded.
    pub fn snapshot(&self) -> Option<Arc<SensorSnapshot>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn ready(&self) -> Result<Arc<SensorSnapshot>> {
        self.snapshot().ok_or(Error::NotReady)
    }

    pub fn poll_time(&self) -> Result<PollTime> {
        Ok(self.ready()?.poll_time)
    }

    pub fn sensors(&self) -> Result<Vec<Sensor>> {
        let snapshot = self.ready()?;
        if snapshot.sensors.is_empty() {
            return Err(Error::NotReady);
        }
        Ok(snapshot.sensors.clone())
    }

    pub fn readings_for_sensor(&self, sensor_id: &str) -> Result<Vec<Reading>> {
        self.ready()?
            .readings
            .get(sensor_id)
            .cloned()
            .ok_or_else(|| Error::UnknownSensor(sensor_id.to_string()))
    }
}

fn next_poll_nanos(previous: Option<u64>) -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);
    match previous {
        Some(prev) if now <= prev => prev + 1,
        _ => now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::{FakeSource, Node};
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    fn tree(value: &str) -> Node {
        Node {
            text: "CPU".into(),
            children: vec![Node {
                text: "Temps".into(),
                children: vec![Node {
                    text: "Core".into(),
                    value: value.into(),
                    sensor_id: "/cpu/0/temperature/0".into(),
                    kind: "Temperature".into(),
                    ..Node::default()
                }],
                ..Node::default()
            }],
            ..Node::default()
        }
    }

    #[test]
    fn not_ready_before_first_refresh() {
        let cache = SnapshotCache::new(FakeSource::new(vec![]));
        assert_eq!(cache.poll_time().unwrap_err(), Error::NotReady);
        assert_eq!(cache.sensors().unwrap_err(), Error::NotReady);
        assert_eq!(cache.readings_for_sensor("/cpu").unwrap_err(), Error::NotReady);
    }

    #[test]
    fn failed_refresh_keeps_previous_snapshot() {
        let source = FakeSource::new(vec![
            Ok(tree("50 °C")),
            Err(Error::SourceUnavailable("connection refused".into())),
        ]);
        let cache = SnapshotCache::new(source);
        cache.refresh().unwrap();
        let first = cache.poll_time().unwrap();
        let err = cache.refresh().unwrap_err();
        assert!(matches!(err, Error::SourceUnavailable(_)));
        assert_eq!(cache.poll_time().unwrap(), first);
        let readings = cache.readings_for_sensor("/cpu/0").unwrap();
        assert_eq!(readings[0].value, 50.0);
    }

    #[test]
    fn poll_time_strictly_increases() {
        let cache = SnapshotCache::new(FakeSource::repeating(tree("1 °C")));
        cache.refresh().unwrap();
        let a = cache.poll_time().unwrap().nanos;
        cache.refresh().unwrap();
        let b = cache.poll_time().unwrap().nanos;
        assert!(b > a);
    }

    #[test]
    fn unknown_sensor_is_reported() {
        let cache = SnapshotCache::new(FakeSource::repeating(tree("1 °C")));
        cache.refresh().unwrap();
        assert_eq!(
            cache.readings_for_sensor("/nope").unwrap_err(),
            Error::UnknownSensor("/nope".into())
        );
    }

    #[test]
    fn concurrent_refreshes_share_one_fetch() {
        let source = Arc::new(
            FakeSource::repeating(tree("1 °C")).with_delay(Duration::from_millis(150)),
        );
        let cache = Arc::new(SnapshotCache::new(source.clone()));
        let callers = 8;
        let barrier = Arc::new(Barrier::new(callers));
        let handles: Vec<_> = (0..callers)
            .map(|_| {
                let cache = cache.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    cache.refresh()
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }
        assert_eq!(source.fetch_count(), 1);
    }
}
