// ULP Weather Station: Pulse Counting
//
// Pulse counting: the always-on edge engine, its shared memory contract,
// and the host-side aggregation into wind and rain measurements.

pub mod aggregator;
pub mod channel;
pub mod engine;
pub mod layout;
pub mod shared;

pub use aggregator::{AggregateError, PulseAggregator, SampleWindow, WindowMetrics};
pub use channel::{Burst, HistogramChannel, IntervalChannel, PulseChannel};
pub use engine::{BurstTracker, DebounceEngine, ShortestInterval, SlotHistogram};
pub use shared::{AtomicRegion, ChannelConfig, EngineSide, HostSide, PulseWords};

use crate::config::{IDLE_LEVEL, RAIN_DEBOUNCE_TICKS, RTC_IO_RAIN, RTC_IO_WIND, WIND_DEBOUNCE_TICKS};

/// Boot configuration of the anemometer channel.
pub const WIND_CHANNEL: ChannelConfig = ChannelConfig {
    rtc_io: RTC_IO_WIND,
    debounce_ticks: WIND_DEBOUNCE_TICKS,
    idle_level: IDLE_LEVEL,
};

/// Boot configuration of the rain bucket channel.
pub const RAIN_CHANNEL: ChannelConfig = ChannelConfig {
    rtc_io: RTC_IO_RAIN,
    debounce_ticks: RAIN_DEBOUNCE_TICKS,
    idle_level: IDLE_LEVEL,
};
