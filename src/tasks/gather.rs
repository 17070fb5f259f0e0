// ULP Weather Station: Gather Loop
//
// One iteration: sleep for the interval the duty cycle chose, read the
// sensors, close the pulse window, encode and transmit the packet, then
// pick the next interval from the battery average.
//
// A sensor that fails to answer never holds back the pulse telemetry: its
// last good value goes out instead and the window is closed as usual.

use crate::codec;
use crate::config::StationConfig;
use crate::power::{normalize_voltage, BatteryHistory};
use crate::pulse::aggregator::correct_heading;
use crate::pulse::{PulseAggregator, PulseChannel, SampleWindow, WindowMetrics};
use crate::radio::Transmitter;
use crate::record::{EnvironmentReading, RainReading, TelemetryRecord, WindReading};
use crate::sensors::{BatterySensor, Clock, EnvironmentSensor, HeadingSensor, Sleeper};

/// Collaborators the station drives but does not own the logic of.
pub struct StationIo {
    pub environment: Box<dyn EnvironmentSensor>,
    pub heading: Box<dyn HeadingSensor>,
    pub battery: Box<dyn BatterySensor>,
    pub radio: Box<dyn Transmitter>,
    pub clock: Box<dyn Clock>,
    pub sleeper: Box<dyn Sleeper>,
}

/// Result of one completed iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct GatherReport {
    pub record: TelemetryRecord,
    pub metrics: WindowMetrics,
    pub packet_len: usize,
    /// False when the radio reported a transport failure.
    pub transmitted: bool,
    pub next_sleep_secs: u32,
}

/// All state carried from one iteration to the next.
pub struct Station<W, R> {
    config: StationConfig,
    aggregator: PulseAggregator<W, R>,
    battery: BatteryHistory,
    io: StationIo,
    window: SampleWindow,
    next_sleep_secs: u32,
    last_environment: EnvironmentReading,
    last_heading: u16,
}

impl<W: PulseChannel, R: PulseChannel> Station<W, R> {
    /// Build the station and open the first window at the current time.
    pub fn new(config: StationConfig, wind: W, rain: R, io: StationIo) -> Self {
        let window = SampleWindow::open(io.clock.now_ms());
        Self {
            aggregator: PulseAggregator::new(wind, rain, config.aggregator),
            battery: BatteryHistory::new(config.battery_history_len),
            next_sleep_secs: config.duty_cycle.default_secs,
            config,
            io,
            window,
            last_environment: EnvironmentReading::default(),
            last_heading: 0,
        }
    }

    /// Drop pulses counted so far and reopen the window at the current
    /// time. Called once after boot, since the engine starts counting
    /// before the station exists.
    pub fn restart_window(&mut self) {
        self.aggregator.discard();
        self.window = SampleWindow::open(self.io.clock.now_ms());
    }

    pub fn next_sleep_secs(&self) -> u32 {
        self.next_sleep_secs
    }

    pub fn battery_average(&self) -> Option<f32> {
        self.battery.compute_average()
    }

    pub fn rain_lifetime(&self) -> u32 {
        self.aggregator.rain_lifetime()
    }

    /// Sleep, then gather and send one packet.
    pub fn run_once(&mut self) -> anyhow::Result<GatherReport> {
        self.io.sleeper.sleep_secs(self.next_sleep_secs);
        self.gather()
    }

    /// Run forever. Failed iterations are logged and the schedule goes on.
    pub fn run(&mut self) -> ! {
        log::info!("Gather loop started (first window in {} s)", self.next_sleep_secs);
        loop {
            match self.run_once() {
                Ok(report) => report.log(),
                Err(e) => log::warn!("Gather iteration skipped: {:#}", e),
            }
        }
    }

    fn gather(&mut self) -> anyhow::Result<GatherReport> {
        let environment = self.read_environment();
        let heading = self.read_heading();

        let now_ms = self.io.clock.now_ms();
        let elapsed = self.window.elapsed_secs(now_ms);
        let collected = self.aggregator.collect(elapsed);
        self.window = SampleWindow::open(now_ms);
        let metrics = collected?;

        let battery = self.read_battery();
        self.battery.submit(battery);

        let record = TelemetryRecord::new(
            u32::try_from(now_ms / 1000).unwrap_or(u32::MAX),
            battery,
            environment,
            WindReading {
                heading,
                average: metrics.avg_wind,
                gust: metrics.gust_wind,
            },
            RainReading {
                window_pulses: metrics.rain_pulses,
                lifetime_pulses: metrics.rain_lifetime,
            },
        )?;
        let packet = codec::encode_packet(&record)?;

        let transmitted = match self.io.radio.transmit(&packet) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Radio transmit failed: {}", e);
                false
            }
        };

        self.next_sleep_secs = self
            .config
            .duty_cycle
            .next_sleep_seconds(self.battery.compute_average());

        Ok(GatherReport {
            record,
            metrics,
            packet_len: packet.len(),
            transmitted,
            next_sleep_secs: self.next_sleep_secs,
        })
    }

    fn read_environment(&mut self) -> EnvironmentReading {
        match self.io.environment.read() {
            Ok(reading) => {
                self.last_environment = reading;
                reading
            }
            Err(e) => {
                log::warn!("Environment read failed, resending last reading: {:#}", e);
                self.last_environment
            }
        }
    }

    /// Corrected heading, or the last good one if the vane does not answer.
    fn read_heading(&mut self) -> u16 {
        match self.io.heading.raw_degrees() {
            Ok(raw) => {
                self.last_heading = correct_heading(raw, self.config.heading_zero_offset);
                self.last_heading
            }
            Err(e) => {
                log::warn!("Heading read failed, resending {}°: {:#}", self.last_heading, e);
                self.last_heading
            }
        }
    }

    /// Sensor faults read as a flat battery.
    fn read_battery(&mut self) -> f32 {
        match self.io.battery.read_volts() {
            Ok(volts) => normalize_voltage(volts),
            Err(e) => {
                log::warn!("Battery read failed: {}", e);
                0.0
            }
        }
    }
}

impl GatherReport {
    /// One-line window summary at info, rate details at debug.
    pub fn log(&self) {
        let record = &self.record;
        let env = record.environment();
        let wind = record.wind();
        log::info!(
            "t={} s  {:.2} V  {:.1} °C  {:.1} %RH  wind {}° avg {:.2} gust {:.2} m/s  rain {} ({} total)  {} B{}  next in {} s",
            record.timemark(),
            record.battery(),
            env.temperature,
            env.humidity,
            wind.heading,
            wind.average,
            wind.gust,
            record.rain_count(),
            record.rain_lifetime_count(),
            self.packet_len,
            if self.transmitted { "" } else { " (not sent)" },
            self.next_sleep_secs,
        );
        log::debug!(
            "window {:.1} s: wind {} pulses ({:.2}/s, burst {:.2}/s), rain {:.3}/s (burst {:.2}/s)",
            self.metrics.elapsed_secs,
            self.metrics.wind_pulses,
            self.metrics.wind_rate,
            self.metrics.wind_burst_rate,
            self.metrics.rain_rate,
            self.metrics.rain_burst_rate,
        );
    }
}
