// ULP Weather Station: Pulse Aggregator
//
// Turns one window of raw counts into physical measurements.

use core::f32::consts::TAU;

use crate::config::AggregatorConfig;

use super::channel::{Burst, PulseChannel};

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum AggregateError {
    /// Clock anomaly: the window closed before (or when) it opened.
    #[error("window length must be positive, got {0} s")]
    NonPositiveWindow(f32),
}

/// Monotonic start of one gather window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleWindow {
    start_ms: u64,
}

impl SampleWindow {
    pub fn open(now_ms: u64) -> Self {
        Self { start_ms: now_ms }
    }

    pub fn start_ms(&self) -> u64 {
        self.start_ms
    }

    /// Seconds between the window start and `now_ms`; negative if the clock
    /// went backwards.
    pub fn elapsed_secs(&self, now_ms: u64) -> f32 {
        let delta = i128::from(now_ms) - i128::from(self.start_ms);
        delta as f32 / 1000.0
    }
}

/// Measurements for one closed window.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WindowMetrics {
    pub elapsed_secs: f32,
    pub wind_pulses: u16,
    /// Average anemometer rate, pulses per second.
    pub wind_rate: f32,
    /// Peak rate implied by the burst value, edges per second.
    pub wind_burst_rate: f32,
    /// Average wind speed, m/s, from whole pulses (one per revolution).
    pub avg_wind: f32,
    /// Gust speed, m/s, from the peak edge rate. An edge is half a
    /// revolution, so a steady wind reports a gust of twice `avg_wind`.
    pub gust_wind: f32,
    pub rain_pulses: u16,
    pub rain_rate: f32,
    pub rain_burst_rate: f32,
    /// Rain pulses since boot, including this window.
    pub rain_lifetime: u32,
}

/// Owns the host views of both channels and the running rain total.
#[derive(Debug)]
pub struct PulseAggregator<W, R> {
    wind: W,
    rain: R,
    config: AggregatorConfig,
    rain_window: u16,
    rain_lifetime: u32,
}

impl<W: PulseChannel, R: PulseChannel> PulseAggregator<W, R> {
    pub fn new(wind: W, rain: R, config: AggregatorConfig) -> Self {
        Self {
            wind,
            rain,
            config,
            rain_window: 0,
            rain_lifetime: 0,
        }
    }

    /// Close a window of `elapsed_secs` and read-and-reset both channels.
    ///
    /// A non-positive window is rejected before any counter is touched, so
    /// its pulses roll into the next window.
    pub fn collect(&mut self, elapsed_secs: f32) -> Result<WindowMetrics, AggregateError> {
        if !(elapsed_secs > 0.0) || !elapsed_secs.is_finite() {
            return Err(AggregateError::NonPositiveWindow(elapsed_secs));
        }

        let wind_pulses = self.wind.take_pulses();
        let wind_burst = self.wind.take_burst();
        let rain_pulses = self.rain.take_pulses();
        let rain_burst = self.rain.take_burst();

        self.rain_window = rain_pulses;
        self.rain_lifetime = self.rain_lifetime.saturating_add(u32::from(rain_pulses));

        let wind_rate = average_rate(wind_pulses, elapsed_secs);
        let wind_burst_rate = burst_rate(wind_burst, &self.config);

        Ok(WindowMetrics {
            elapsed_secs,
            wind_pulses,
            wind_rate,
            wind_burst_rate,
            avg_wind: wind_speed(wind_rate, self.config.cup_radius_mm),
            gust_wind: wind_speed(wind_burst_rate, self.config.cup_radius_mm),
            rain_pulses,
            rain_rate: average_rate(rain_pulses, elapsed_secs),
            rain_burst_rate: burst_rate(rain_burst, &self.config),
            rain_lifetime: self.rain_lifetime,
        })
    }

    /// Drop whatever both channels counted before the first window opened.
    /// The lifetime rain total is not touched.
    pub fn discard(&mut self) {
        self.wind.discard();
        self.rain.discard();
    }

    /// Rain pulses in the last collected window.
    pub fn rain_total(&self) -> u16 {
        self.rain_window
    }

    /// Rain pulses since the aggregator was created. Never reset.
    pub fn rain_lifetime(&self) -> u32 {
        self.rain_lifetime
    }
}

/// Pulses per second over the window. `elapsed_secs` must be positive.
pub fn average_rate(pulses: u16, elapsed_secs: f32) -> f32 {
    f32::from(pulses) / elapsed_secs
}

/// Linear cup speed in m/s for a rotation rate in pulses per second.
pub fn wind_speed(pulses_per_second: f32, radius_mm: f32) -> f32 {
    pulses_per_second * TAU * radius_mm / 1000.0
}

/// Highest rate the engine can physically report: one edge per wake tick.
pub fn max_burst_rate(config: &AggregatorConfig) -> f32 {
    1_000_000.0 / config.wake_period_us.max(1) as f32
}

/// Peak rate per second implied by a burst value, clamped to
/// [`max_burst_rate`]. An empty burst gives 0.
pub fn burst_rate(burst: Burst, config: &AggregatorConfig) -> f32 {
    let rate = match burst {
        Burst::ShortestInterval { ticks: 0 } | Burst::BusiestSlot { edges: 0 } => return 0.0,
        Burst::ShortestInterval { ticks } => {
            let interval_us = f32::from(ticks) * config.wake_period_us as f32;
            1_000_000.0 / interval_us
        }
        Burst::BusiestSlot { edges } => {
            let slot_secs = f32::from(config.histogram_ticks_per_slot) * config.wake_period_us as f32
                / 1_000_000.0;
            f32::from(edges) / slot_secs
        }
    };
    rate.min(max_burst_rate(config))
}

/// Truncate a vane angle to whole degrees and remove the north offset,
/// wrapping into [0, 360).
pub fn correct_heading(raw_degrees: f32, zero_offset: u16) -> u16 {
    let whole = raw_degrees as i32;
    (whole - i32::from(zero_offset)).rem_euclid(360) as u16
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::RecordedChannel;

    fn config() -> AggregatorConfig {
        AggregatorConfig {
            wake_period_us: 5_000,
            cup_radius_mm: 80.0,
            histogram_ticks_per_slot: 200,
        }
    }

    #[test]
    fn rejects_non_positive_window_without_reading() {
        let wind = RecordedChannel::new(&[(4, Burst::ShortestInterval { ticks: 10 })]);
        let rain = RecordedChannel::new(&[(1, Burst::ShortestInterval { ticks: 0 })]);
        let mut agg = PulseAggregator::new(wind, rain, config());

        assert_eq!(agg.collect(0.0), Err(AggregateError::NonPositiveWindow(0.0)));
        assert!(agg.collect(-3.0).is_err());
        assert!(agg.collect(f32::NAN).is_err());

        // The recorded window is still there for the next valid close.
        let m = agg.collect(2.0).unwrap();
        assert_eq!(m.wind_pulses, 4);
        assert_eq!(m.rain_pulses, 1);
    }

    #[test]
    fn wind_speed_is_zero_at_rest_and_monotone() {
        assert_eq!(wind_speed(0.0, 80.0), 0.0);
        let mut last = 0.0;
        for step in 1..200 {
            let speed = wind_speed(step as f32 * 0.25, 80.0);
            assert!(speed >= last);
            last = speed;
        }
        // One revolution per second of an 80 mm cup arm.
        assert!((wind_speed(1.0, 80.0) - 0.502_654_8).abs() < 1e-5);
    }

    #[test]
    fn gust_without_second_edge_is_zero() {
        assert_eq!(burst_rate(Burst::ShortestInterval { ticks: 0 }, &config()), 0.0);
        assert_eq!(burst_rate(Burst::BusiestSlot { edges: 0 }, &config()), 0.0);
    }

    #[test]
    fn burst_rate_is_clamped_to_one_edge_per_tick() {
        let cfg = config();
        assert_eq!(max_burst_rate(&cfg), 200.0);
        assert_eq!(burst_rate(Burst::ShortestInterval { ticks: 1 }, &cfg), 200.0);
        // 1000 edges in a one second slot is impossible at 5 ms ticks.
        assert_eq!(burst_rate(Burst::BusiestSlot { edges: 1000 }, &cfg), 200.0);
        assert_eq!(burst_rate(Burst::BusiestSlot { edges: 12 }, &cfg), 12.0);
    }

    #[test]
    fn gust_not_below_average_when_intervals_match() {
        // 20 pulses in 10 s is one pulse every 0.5 s = 100 ticks at 5 ms.
        let wind = RecordedChannel::new(&[(20, Burst::ShortestInterval { ticks: 100 })]);
        let rain = RecordedChannel::new(&[]);
        let mut agg = PulseAggregator::new(wind, rain, config());
        let m = agg.collect(10.0).unwrap();
        assert_eq!(m.wind_rate, 2.0);
        assert_eq!(m.wind_burst_rate, 2.0);
        assert!(m.gust_wind >= m.avg_wind);
    }

    #[test]
    fn rain_lifetime_accumulates_across_windows() {
        let wind = RecordedChannel::new(&[]);
        let rain = RecordedChannel::new(&[
            (2, Burst::ShortestInterval { ticks: 0 }),
            (0, Burst::ShortestInterval { ticks: 0 }),
            (5, Burst::ShortestInterval { ticks: 0 }),
        ]);
        let mut agg = PulseAggregator::new(wind, rain, config());

        let lifetimes: Vec<(u16, u32)> = (0..3)
            .map(|_| {
                let m = agg.collect(20.0).unwrap();
                (m.rain_pulses, m.rain_lifetime)
            })
            .collect();
        assert_eq!(lifetimes, vec![(2, 2), (0, 2), (5, 7)]);
        assert_eq!(agg.rain_total(), 5);
        assert_eq!(agg.rain_lifetime(), 7);
    }

    #[test]
    fn heading_truncates_and_wraps() {
        assert_eq!(correct_heading(359.9, 0), 359);
        assert_eq!(correct_heading(10.7, 20), 350);
        assert_eq!(correct_heading(20.0, 20), 0);
        assert_eq!(correct_heading(0.0, 0), 0);
    }

    #[test]
    fn window_elapsed_handles_clock_going_backwards() {
        let window = SampleWindow::open(5_000);
        assert_eq!(window.elapsed_secs(25_000), 20.0);
        assert!(window.elapsed_secs(4_000) < 0.0);
        assert_eq!(window.elapsed_secs(5_000), 0.0);
    }
}
