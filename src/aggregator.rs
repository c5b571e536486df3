// Flush-side stage: drain the window, reduce it to a rounded mean, build the envelope.

use crate::models::Envelope;
use crate::window::{self, SharedWindow};
use chrono::{DateTime, Utc};

/// Arithmetic mean rounded to the nearest integer, ties to even. Exact (integer math).
/// None for an empty slice.
pub fn rounded_mean(values: &[i64]) -> Option<i64> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as i128;
    let sum: i128 = values.iter().map(|&v| v as i128).sum();
    let q = sum.div_euclid(n);
    let r = sum.rem_euclid(n);
    let rounded = match (2 * r).cmp(&n) {
        std::cmp::Ordering::Greater => q + 1,
        std::cmp::Ordering::Equal if q % 2 != 0 => q + 1,
        _ => q,
    };
    i64::try_from(rounded).ok()
}

pub struct WindowAggregator {
    window: SharedWindow,
    device_id: i64,
}

impl WindowAggregator {
    pub fn new(window: SharedWindow, device_id: i64) -> Self {
        Self { window, device_id }
    }

    pub fn flush(&self) -> Option<Envelope> {
        self.flush_at(Utc::now())
    }

    /// Empties the window in one locked step, then builds the envelope from what was taken.
    /// Returns None (nothing to publish) when the window was already empty.
    pub fn flush_at(&self, now: DateTime<Utc>) -> Option<Envelope> {
        let samples = window::lock(&self.window).take();
        if samples.is_empty() {
            tracing::info!("No data to send yet");
            return None;
        }
        let values: Vec<i64> = samples.iter().map(|s| s.value).collect();
        let water_level = rounded_mean(&values)?;
        tracing::info!(
            samples_count = values.len(),
            water_level,
            device_id = self.device_id,
            "Window flushed"
        );
        Some(Envelope::new(self.device_id, water_level, now))
    }
}

#[cfg(test)]
mod tests {
    use super::rounded_mean;

    #[test]
    fn rounded_mean_basic() {
        assert_eq!(rounded_mean(&[]), None);
        assert_eq!(rounded_mean(&[42]), Some(42));
        assert_eq!(rounded_mean(&[120, 130]), Some(125));
        assert_eq!(rounded_mean(&[10, 10, 11]), Some(10));
        assert_eq!(rounded_mean(&[10, 11, 11]), Some(11));
    }

    #[test]
    fn rounded_mean_ties_go_to_even() {
        assert_eq!(rounded_mean(&[1, 2]), Some(2));
        assert_eq!(rounded_mean(&[2, 3]), Some(2));
        assert_eq!(rounded_mean(&[-1, -2]), Some(-2));
        assert_eq!(rounded_mean(&[-2, -3]), Some(-2));
        assert_eq!(rounded_mean(&[0, 1]), Some(0));
    }

    #[test]
    fn rounded_mean_does_not_overflow() {
        assert_eq!(rounded_mean(&[i64::MAX, i64::MAX]), Some(i64::MAX));
        assert_eq!(rounded_mean(&[i64::MIN, i64::MIN]), Some(i64::MIN));
    }
}
