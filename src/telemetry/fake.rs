use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use super::{HardwareSource, Node};
use crate::{Error, Result};

/// Scripted telemetry source for tests and offline runs. Results are handed
/// out in order; once the script runs dry the last result repeats.
#[derive(Default)]
pub struct FakeSource {
    script: Mutex<VecDeque<Result<Node>>>,
    last: Mutex<Option<Result<Node>>>,
    fetches: AtomicUsize,
    delay: Option<Duration>,
}

impl FakeSource {
    pub fn new(script: Vec<Result<Node>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            ..Self::default()
        }
    }

    pub fn repeating(node: Node) -> Self {
        Self::new(vec![Ok(node)])
    }

    /// Sleep inside every fetch, simulating a slow upstream.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn push(&self, result: Result<Node>) {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(result);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl HardwareSource for FakeSource {
    fn fetch(&self) -> Result<Node> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }
        let next = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        match next {
            Some(result) => {
                *last = Some(result.clone());
                result
            }
            None => last
                .clone()
                .unwrap_or_else(|| Err(Error::SourceUnavailable("no scripted response".into()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fake_source_scripts_then_repeats() {
        let fake = FakeSource::new(vec![
            Ok(Node::default()),
            Err(Error::SourceUnavailable("down".into())),
        ]);
        assert!(fake.fetch().is_ok());
        assert!(fake.fetch().is_err());
        assert!(fake.fetch().is_err());
        assert_eq!(fake.fetch_count(), 3);
    }

    #[test]
    fn empty_fake_is_unavailable() {
        let fake = FakeSource::default();
        assert!(matches!(fake.fetch(), Err(Error::SourceUnavailable(_))));
    }
}
