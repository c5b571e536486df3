// Shared window of not-yet-aggregated samples. Appended by the ingestor, drained by the
// aggregator; both go through the same mutex and never hold it across an await.

use crate::models::SensorSample;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
pub struct Window {
    samples: Vec<SensorSample>,
}

impl Window {
    pub fn push(&mut self, sample: SensorSample) {
        self.samples.push(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Removes and returns every buffered sample in arrival order, leaving the window empty.
    pub fn take(&mut self) -> Vec<SensorSample> {
        std::mem::take(&mut self.samples)
    }
}

pub type SharedWindow = Arc<Mutex<Window>>;

pub fn shared() -> SharedWindow {
    Arc::new(Mutex::new(Window::default()))
}

/// Locks the window. A poisoned lock is recovered: push and take are single steps, so
/// a panic elsewhere cannot leave the sample list half-modified.
pub fn lock(window: &SharedWindow) -> MutexGuard<'_, Window> {
    window.lock().unwrap_or_else(|e| e.into_inner())
}
