// ULP Weather Station: Duty Cycle
//
// Battery-driven sleep interval between gather windows.

use crate::config::DutyCyclePolicy;

impl DutyCyclePolicy {
    /// Longest interval the policy can choose.
    pub fn max_secs(&self) -> u32 {
        self.default_secs + self.max_extra_secs
    }

    /// Seconds to sleep before the next window, given the rolling battery
    /// average. Monotone non-increasing in voltage; no hysteresis.
    ///
    /// At exactly `min_voltage` the interpolation reaches the maximum, so
    /// that point takes the clamped branch.
    pub fn next_sleep_seconds(&self, avg_voltage: Option<f32>) -> u32 {
        let Some(avg) = avg_voltage else {
            return self.default_secs;
        };

        let avg = f64::from(avg);
        let cutoff = f64::from(self.cutoff_voltage);
        let min = f64::from(self.min_voltage);

        if avg >= cutoff {
            self.default_secs
        } else if avg > min {
            let per_volt = f64::from(self.max_extra_secs) / (cutoff - min);
            let secs = f64::from(self.default_secs) + (cutoff - avg) * per_volt;
            (secs as u32).min(self.max_secs())
        } else {
            self.max_secs()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_data_uses_default_interval() {
        assert_eq!(DutyCyclePolicy::default().next_sleep_seconds(None), 20);
    }

    #[test]
    fn boundary_voltages() {
        let policy = DutyCyclePolicy::default();
        assert_eq!(policy.next_sleep_seconds(Some(4.2)), 20);
        assert_eq!(policy.next_sleep_seconds(Some(3.7)), 20);
        assert_eq!(policy.next_sleep_seconds(Some(3.0)), 220);
        assert_eq!(policy.next_sleep_seconds(Some(2.4)), 220);
        assert_eq!(policy.next_sleep_seconds(Some(0.0)), 220);
    }

    #[test]
    fn interpolates_between_thresholds() {
        let policy = DutyCyclePolicy::default();
        let mid = policy.next_sleep_seconds(Some(3.35));
        assert!((119..=120).contains(&mid), "got {}", mid);
    }

    #[test]
    fn monotone_in_voltage() {
        let policy = DutyCyclePolicy::default();
        let mut last = u32::MAX;
        for step in 0..=60 {
            let volts = 2.8 + step as f32 * 0.025;
            let secs = policy.next_sleep_seconds(Some(volts));
            assert!(secs <= last, "{} V gave {} s after {} s", volts, secs, last);
            assert!((20..=220).contains(&secs));
            last = secs;
        }
    }
}
