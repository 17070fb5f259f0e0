// ULP Weather Station: Simulated Clock, Sleep & Sensors
//
// Simulated clock, sleep and sensors.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use anyhow::anyhow;

use crate::pulse::{BurstTracker, DebounceEngine};
use crate::record::EnvironmentReading;
use crate::sensors::{BatterySensor, Clock, EnvironmentSensor, HeadingSensor, Sleeper};

/// Shared monotonic clock in microseconds. Clones observe the same time.
#[derive(Debug, Default, Clone)]
pub struct SimClock {
    now_us: Rc<Cell<u64>>,
}

impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance_us(&self, us: u64) {
        self.now_us.set(self.now_us.get().saturating_add(us));
    }

    pub fn advance_ms(&self, ms: u64) {
        self.advance_us(ms.saturating_mul(1_000));
    }

    /// Jump to an absolute time, backwards if asked.
    pub fn set_ms(&self, ms: u64) {
        self.now_us.set(ms.saturating_mul(1_000));
    }

    pub fn now_us(&self) -> u64 {
        self.now_us.get()
    }
}

impl Clock for SimClock {
    fn now_ms(&self) -> u64 {
        self.now_us.get() / 1_000
    }
}

/// Sleeper that only moves the clock forward and remembers each request.
#[derive(Debug)]
pub struct MockSleeper {
    clock: SimClock,
    requests: Rc<RefCell<Vec<u32>>>,
}

impl MockSleeper {
    pub fn new(clock: SimClock) -> Self {
        Self {
            clock,
            requests: Rc::default(),
        }
    }

    /// Handle onto the recorded requests, usable after the sleeper has
    /// been moved into a station.
    pub fn requests(&self) -> Rc<RefCell<Vec<u32>>> {
        Rc::clone(&self.requests)
    }
}

impl Sleeper for MockSleeper {
    fn sleep_secs(&mut self, secs: u32) {
        self.requests.borrow_mut().push(secs);
        self.clock.advance_ms(u64::from(secs) * 1_000);
    }
}

/// Sleeper that runs the engine model for every wake tick of the sleep,
/// as the co-processor would, feeding it levels from `signal`.
///
/// `signal` receives the absolute tick number and returns the sampled
/// RTC input bits.
pub struct EngineSleeper<T, F> {
    clock: SimClock,
    engine: DebounceEngine<T>,
    signal: F,
    period_us: u64,
    tick: u64,
}

impl<T, F> EngineSleeper<T, F>
where
    T: BurstTracker,
    F: FnMut(u64) -> u16,
{
    pub fn new(clock: SimClock, engine: DebounceEngine<T>, period_us: u32, signal: F) -> Self {
        Self {
            clock,
            engine,
            signal,
            period_us: u64::from(period_us.max(1)),
            tick: 0,
        }
    }

    pub fn ticks(&self) -> u64 {
        self.tick
    }
}

impl<T, F> Sleeper for EngineSleeper<T, F>
where
    T: BurstTracker,
    F: FnMut(u64) -> u16,
{
    fn sleep_secs(&mut self, secs: u32) {
        let ticks = u64::from(secs) * 1_000_000 / self.period_us;
        for _ in 0..ticks {
            let inputs = (self.signal)(self.tick);
            self.engine.tick(inputs);
            self.tick += 1;
            self.clock.advance_us(self.period_us);
        }
    }
}

/// Environment sensor returning a fixed reading, with injectable failures.
#[derive(Debug, Clone)]
pub struct MockEnvironment {
    reading: EnvironmentReading,
    good_before_failures: usize,
    failures: usize,
}

impl MockEnvironment {
    pub fn new(reading: EnvironmentReading) -> Self {
        Self {
            reading,
            good_before_failures: 0,
            failures: 0,
        }
    }

    /// Fail the next `n` reads.
    pub fn fail_next(&mut self, n: usize) {
        self.fail_after(0, n);
    }

    /// Answer `good` reads, then fail the `n` after them.
    pub fn fail_after(&mut self, good: usize, n: usize) {
        self.good_before_failures = good;
        self.failures = n;
    }
}

impl EnvironmentSensor for MockEnvironment {
    fn read(&mut self) -> anyhow::Result<EnvironmentReading> {
        if self.good_before_failures > 0 {
            self.good_before_failures -= 1;
        } else if self.failures > 0 {
            self.failures -= 1;
            return Err(anyhow!("environment sensor not responding"));
        }
        Ok(self.reading)
    }
}

/// A sensor that is not on the bus at all.
#[derive(Debug, Clone, Copy)]
pub struct DeadSensor;

impl EnvironmentSensor for DeadSensor {
    fn read(&mut self) -> anyhow::Result<EnvironmentReading> {
        Err(anyhow!("no ACK from environment sensor"))
    }
}

impl HeadingSensor for DeadSensor {
    fn raw_degrees(&mut self) -> anyhow::Result<f32> {
        Err(anyhow!("no ACK from heading sensor"))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MockHeading(pub f32);

impl HeadingSensor for MockHeading {
    fn raw_degrees(&mut self) -> anyhow::Result<f32> {
        Ok(self.0)
    }
}

/// Replays raw voltages; the last one repeats once the script runs out.
#[derive(Debug, Clone)]
pub struct MockBattery {
    script: VecDeque<f32>,
    last: f32,
}

impl MockBattery {
    pub fn new(script: &[f32]) -> Self {
        Self {
            script: script.iter().copied().collect(),
            last: 0.0,
        }
    }
}

impl BatterySensor for MockBattery {
    fn read_volts(&mut self) -> anyhow::Result<f32> {
        if let Some(volts) = self.script.pop_front() {
            self.last = volts;
        }
        Ok(self.last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pulse::layout::WIND;
    use crate::pulse::{AtomicRegion, PulseWords, ShortestInterval, WIND_CHANNEL};

    #[test]
    fn engine_sleeper_ticks_for_the_whole_sleep() {
        let clock = SimClock::new();
        let (engine_side, host) = AtomicRegion::split();
        host.configure(&WIND, &WIND_CHANNEL);
        let engine = DebounceEngine::new(engine_side, ShortestInterval);

        // Toggle the wind input every 100 ticks, idle high.
        let wind_bit = 1u16 << WIND_CHANNEL.rtc_io;
        let mut sleeper = EngineSleeper::new(clock.clone(), engine, 5_000, move |tick| {
            if (tick / 100) % 2 == 0 {
                wind_bit
            } else {
                0
            }
        });

        sleeper.sleep_secs(2);
        assert_eq!(sleeper.ticks(), 400);
        assert_eq!(clock.now_ms(), 2_000);
        // Falls at tick 100 and 300, rises at tick 200.
        assert_eq!(host.words().read(WIND.edge_count), 3);
    }

    #[test]
    fn battery_script_repeats_last_value() {
        let mut battery = MockBattery::new(&[3.9, 3.8]);
        let volts: Vec<f32> = (0..4).map(|_| battery.read_volts().unwrap()).collect();
        assert_eq!(volts, vec![3.9, 3.8, 3.8, 3.8]);
    }
}
