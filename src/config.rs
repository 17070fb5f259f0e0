// ULP Weather Station: Hardware & System Configuration
// Target: ESP32 (Xtensa) with the ULP FSM co-processor enabled

// ---------------------------------------------------------------------------
// GPIO Pin Definitions
// ---------------------------------------------------------------------------
// Pulse inputs only. The I2C bus (SDA 21, SCL 22), the radio UART
// (TX 17, RX 16, SET 23) and the battery divider (GPIO34, ADC1 channel 6)
// are wired up by name in `main.rs` and `device::battery`.
pub const PIN_WIND: i32 = 32;          // Anemometer reed switch (RTC GPIO 9)
pub const PIN_RAIN: i32 = 35;          // Rain bucket tip switch (RTC GPIO 5, no pull-down)
pub const RTC_IO_WIND: u16 = 9;
pub const RTC_IO_RAIN: u16 = 5;

// ---------------------------------------------------------------------------
// I2C Bus
// ---------------------------------------------------------------------------
pub const I2C_ADDR_AS5600: u8 = 0x36;
pub const I2C_ADDR_BME280: u8 = 0x76;
pub const I2C_TIMEOUT_TICKS: u32 = 1000; // FreeRTOS ticks
pub const I2C_BAUDRATE_HZ: u32 = 100_000;

// ---------------------------------------------------------------------------
// Edge Debounce Engine (ULP)
// ---------------------------------------------------------------------------
pub const ULP_WAKE_PERIOD_US: u32 = 5_000;   // one engine tick every 5 ms
pub const WIND_DEBOUNCE_TICKS: u16 = 1;
pub const RAIN_DEBOUNCE_TICKS: u16 = 4;      // 20 ms, bucket contacts chatter
pub const IDLE_LEVEL: u16 = 1;               // inputs idle HIGH
pub const HISTOGRAM_SLOTS: usize = 10;
pub const HISTOGRAM_TICKS_PER_SLOT: u16 = 200; // 1 s slots at 5 ms

// ---------------------------------------------------------------------------
// Calibration
// ---------------------------------------------------------------------------
pub const CUP_RADIUS_MM: f32 = 80.0;
pub const HEADING_ZERO_OFFSET: u16 = 0;     // AS5600 reading when the vane points north

// ---------------------------------------------------------------------------
// Battery & Duty Cycle
// ---------------------------------------------------------------------------
pub const BATTERY_HISTORY_LEN: usize = 5;
pub const BATTERY_PLAUSIBLE_MAX_V: f32 = 5.0;
pub const BATTERY_DIVIDER_RATIO: f32 = 2.0;
pub const VOLTAGE_CUTOFF: f32 = 3.7;        // at or above: default interval
pub const VOLTAGE_MIN: f32 = 3.0;           // at or below: longest interval
pub const DEFAULT_SLEEP_SECS: u32 = 20;
pub const MAX_EXTRA_SLEEP_SECS: u32 = 200;

// ---------------------------------------------------------------------------
// Radio (HC-12 on UART2)
// ---------------------------------------------------------------------------
pub const RADIO_BAUDRATE: u32 = 9_600;
pub const RADIO_SETTLE_MS: u32 = 200;
pub const RADIO_CMD_PROBE: &[u8] = b"AT";
pub const RADIO_CMD_POWER_TIER: &[u8] = b"AT+P6";
pub const RADIO_CMD_SLEEP: &[u8] = b"AT+SLEEP";
pub const RADIO_RESPONSE_BUF: usize = 32;

// ---------------------------------------------------------------------------
// Timing
// ---------------------------------------------------------------------------
pub const BOOT_SETTLE_SECS: u64 = 15;       // window to break into the console

// ---------------------------------------------------------------------------
// Typed configuration
// ---------------------------------------------------------------------------

/// Interval policy between telemetry packets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DutyCyclePolicy {
    pub default_secs: u32,
    pub max_extra_secs: u32,
    pub cutoff_voltage: f32,
    pub min_voltage: f32,
}

impl Default for DutyCyclePolicy {
    fn default() -> Self {
        Self {
            default_secs: DEFAULT_SLEEP_SECS,
            max_extra_secs: MAX_EXTRA_SLEEP_SECS,
            cutoff_voltage: VOLTAGE_CUTOFF,
            min_voltage: VOLTAGE_MIN,
        }
    }
}

/// Conversion constants used when turning counts into physical units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregatorConfig {
    pub wake_period_us: u32,
    pub cup_radius_mm: f32,
    pub histogram_ticks_per_slot: u16,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            wake_period_us: ULP_WAKE_PERIOD_US,
            cup_radius_mm: CUP_RADIUS_MM,
            histogram_ticks_per_slot: HISTOGRAM_TICKS_PER_SLOT,
        }
    }
}

/// Transceiver command vocabulary and timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RadioConfig {
    pub settle_ms: u32,
    pub probe: &'static [u8],
    pub power_tier: &'static [u8],
    pub sleep: &'static [u8],
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            settle_ms: RADIO_SETTLE_MS,
            probe: RADIO_CMD_PROBE,
            power_tier: RADIO_CMD_POWER_TIER,
            sleep: RADIO_CMD_SLEEP,
        }
    }
}

/// Everything the gather loop needs, built once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct StationConfig {
    pub aggregator: AggregatorConfig,
    pub duty_cycle: DutyCyclePolicy,
    pub radio: RadioConfig,
    pub battery_history_len: usize,
    pub heading_zero_offset: u16,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            aggregator: AggregatorConfig::default(),
            duty_cycle: DutyCyclePolicy::default(),
            radio: RadioConfig::default(),
            battery_history_len: BATTERY_HISTORY_LEN,
            heading_zero_offset: HEADING_ZERO_OFFSET,
        }
    }
}
