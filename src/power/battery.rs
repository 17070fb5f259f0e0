// ULP Weather Station: Battery Estimator
//
// Rolling battery voltage estimate.

use crate::config::BATTERY_PLAUSIBLE_MAX_V;

/// Map a raw divider reading to a voltage the estimator may accept.
///
/// Readings at or below 0 V, at or above the plausible maximum, or NaN come
/// from a disconnected or faulted ADC and are reported as 0.0 so they look
/// like a flat battery downstream.
pub fn normalize_voltage(raw: f32) -> f32 {
    if raw > 0.0 && raw < BATTERY_PLAUSIBLE_MAX_V {
        raw
    } else {
        if raw != 0.0 {
            log::warn!("Implausible battery reading {:.3} V, treating as 0.0", raw);
        }
        0.0
    }
}

/// Fixed-capacity ring of the most recent voltage samples.
#[derive(Debug, Clone)]
pub struct BatteryHistory {
    slots: Vec<Option<f32>>,
    cursor: usize,
}

impl BatteryHistory {
    /// `capacity` is raised to 1 if zero.
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity.max(1)],
            cursor: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Overwrite the slot under the write cursor and advance it.
    pub fn submit(&mut self, voltage: f32) {
        self.slots[self.cursor] = Some(voltage);
        self.cursor = (self.cursor + 1) % self.slots.len();
    }

    /// Mean of the populated slots, `None` until the first sample.
    pub fn compute_average(&self) -> Option<f32> {
        let (count, total) = self
            .slots
            .iter()
            .flatten()
            .fold((0usize, 0.0f32), |(n, sum), v| (n + 1, sum + v));
        (count > 0).then(|| total / count as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_undefined_until_first_sample() {
        let history = BatteryHistory::new(5);
        assert_eq!(history.compute_average(), None);
    }

    #[test]
    fn average_ignores_empty_slots() {
        let mut history = BatteryHistory::new(5);
        for v in [3.8, 3.6, 3.7] {
            history.submit(v);
        }
        let avg = history.compute_average().unwrap();
        assert!((avg - 3.7).abs() < 1e-5);
    }

    #[test]
    fn sixth_sample_evicts_oldest() {
        let mut history = BatteryHistory::new(5);
        for v in [4.0, 3.0, 3.0, 3.0, 3.0] {
            history.submit(v);
        }
        history.submit(3.0);
        // The 4.0 written first is gone, not the smallest or largest value
        // by comparison.
        assert_eq!(history.compute_average(), Some(3.0));

        history.submit(4.5);
        let avg = history.compute_average().unwrap();
        assert!((avg - 3.3).abs() < 1e-5);
    }

    #[test]
    fn zero_capacity_is_raised_to_one() {
        let mut history = BatteryHistory::new(0);
        assert_eq!(history.capacity(), 1);
        history.submit(3.9);
        history.submit(3.1);
        assert_eq!(history.compute_average(), Some(3.1));
    }

    #[test]
    fn implausible_readings_normalize_to_zero() {
        assert_eq!(normalize_voltage(3.92), 3.92);
        assert_eq!(normalize_voltage(0.0), 0.0);
        assert_eq!(normalize_voltage(-0.4), 0.0);
        assert_eq!(normalize_voltage(5.0), 0.0);
        assert_eq!(normalize_voltage(7.1), 0.0);
        assert_eq!(normalize_voltage(f32::NAN), 0.0);
    }
}
