// ULP Weather Station: Host Simulation
//
// Runs the real gather loop for a number of windows. Sleeping drives the
// engine model tick by tick with a synthetic anemometer (steady breeze with
// a gust burst every few minutes) and a slow rain bucket. Packets go to a
// mock radio and are checked with the receiver-side verifier.

use ulp_weather::codec;
use ulp_weather::config::{StationConfig, IDLE_LEVEL, ULP_WAKE_PERIOD_US};
use ulp_weather::mock::{
    EngineSleeper, Journal, MockBattery, MockDelay, MockEnvironment, MockHeading, MockPin,
    MockSerial, SimClock,
};
use ulp_weather::pulse::layout::{RAIN, WIND};
use ulp_weather::pulse::{
    AtomicRegion, BurstTracker, DebounceEngine, PulseChannel, RAIN_CHANNEL, WIND_CHANNEL,
};
use ulp_weather::radio::RadioLink;
use ulp_weather::record::EnvironmentReading;
use ulp_weather::tasks::{Station, StationIo};

pub const DEFAULT_WINDOWS: u32 = 8;

/// Half-period of the anemometer square wave in calm and gusty phases.
const BREEZE_HALF_PERIOD_TICKS: u64 = 60;
const GUST_HALF_PERIOD_TICKS: u64 = 12;
/// A 3 s gust every 90 s.
const GUST_EVERY_TICKS: u64 = 18_000;
const GUST_LENGTH_TICKS: u64 = 600;
/// One bucket tip every 45 s, contact closed for 100 ms.
const RAIN_EVERY_TICKS: u64 = 9_000;
const RAIN_CLOSED_TICKS: u64 = 20;

/// Battery sagging from full towards the cutoff over the run.
const BATTERY_SCRIPT: &[f32] = &[4.12, 4.05, 3.96, 3.88, 3.79, 3.71, 3.62, 3.55, 3.49, 3.41];

pub fn run(windows: u32) -> anyhow::Result<()> {
    let config = StationConfig::default();
    let (engine_side, host) = AtomicRegion::split();
    host.configure(&WIND, &WIND_CHANNEL);
    host.configure(&RAIN, &RAIN_CHANNEL);

    #[cfg(not(feature = "histogram-gust"))]
    let (tracker, wind, rain) = {
        use ulp_weather::pulse::{IntervalChannel, ShortestInterval};
        (ShortestInterval, IntervalChannel::new(host.clone(), WIND), IntervalChannel::new(host, RAIN))
    };
    #[cfg(feature = "histogram-gust")]
    let (tracker, wind, rain) = {
        use ulp_weather::pulse::{HistogramChannel, SlotHistogram};
        (
            SlotHistogram::new(config.aggregator.histogram_ticks_per_slot),
            HistogramChannel::new(host.clone(), WIND),
            HistogramChannel::new(host, RAIN),
        )
    };

    simulate(config, DebounceEngine::new(engine_side, tracker), wind, rain, windows)
}

fn simulate<T, W, R>(
    config: StationConfig,
    engine: DebounceEngine<T>,
    wind: W,
    rain: R,
    windows: u32,
) -> anyhow::Result<()>
where
    T: BurstTracker + 'static,
    W: PulseChannel,
    R: PulseChannel,
{
    let clock = SimClock::new();
    let journal = Journal::default();

    let mut radio = RadioLink::new(
        MockSerial::new(journal.clone()),
        MockPin::new(journal.clone()),
        MockDelay::new(journal.clone()),
        config.radio,
    );
    radio.configure()?;

    let io = StationIo {
        environment: Box::new(MockEnvironment::new(EnvironmentReading {
            temperature: 14.5,
            humidity: 72.0,
            pressure: Some(1009.3),
        })),
        heading: Box::new(MockHeading(247.3)),
        battery: Box::new(MockBattery::new(BATTERY_SCRIPT)),
        radio: Box::new(radio),
        clock: Box::new(clock.clone()),
        sleeper: Box::new(EngineSleeper::new(clock, engine, ULP_WAKE_PERIOD_US, input_levels)),
    };
    let mut station = Station::new(config, wind, rain, io);

    log::info!("Simulating {} gather windows", windows);
    let mut sent = 0;
    for _ in 0..windows {
        journal.clear();
        match station.run_once() {
            Ok(report) => {
                report.log();
                let payload = journal
                    .serial_writes()
                    .into_iter()
                    .find(|bytes| bytes.len() == report.packet_len);
                match payload.as_deref().map(codec::verify_packet) {
                    Some(Ok(_)) => sent += 1,
                    Some(Err(e)) => log::warn!("Packet failed verification: {}", e),
                    None => log::warn!("No packet reached the radio"),
                }
            }
            Err(e) => log::warn!("Gather iteration skipped: {:#}", e),
        }
    }

    log::info!(
        "Done: {}/{} packets verified, {} rain pulses in total",
        sent,
        windows,
        station.rain_lifetime()
    );
    Ok(())
}

/// RTC GPIO levels at engine tick `tick`. Both inputs idle at
/// `IDLE_LEVEL` and are pulled the other way by their switch.
fn input_levels(tick: u64) -> u16 {
    let half_period = if tick % GUST_EVERY_TICKS < GUST_LENGTH_TICKS {
        GUST_HALF_PERIOD_TICKS
    } else {
        BREEZE_HALF_PERIOD_TICKS
    };
    let wind_closed = (tick / half_period) % 2 == 1;
    let rain_closed = tick % RAIN_EVERY_TICKS >= RAIN_EVERY_TICKS - RAIN_CLOSED_TICKS;

    level(WIND_CHANNEL.rtc_io, wind_closed) | level(RAIN_CHANNEL.rtc_io, rain_closed)
}

fn level(rtc_io: u16, closed: bool) -> u16 {
    let high = (IDLE_LEVEL != 0) != closed;
    u16::from(high) << rtc_io
}
