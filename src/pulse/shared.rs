// ULP Weather Station: Engine / Host Hand-off
//
// Single-producer / single-consumer hand-off between the edge engine and
// the host.
//
// The engine only ever increments and overwrites words; the host only
// configures channels at boot and then reads-and-resets counters once per
// gather window. The two halves are distinct types so neither can reach
// for the other's operations.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use super::layout::{ChannelWords, REGION_WORDS, ULP_DATA_MASK};

/// Host-side access to the shared words.
///
/// Implemented over RTC slow memory on the device and over atomics for the
/// in-process engine model.
pub trait PulseWords {
    /// Read a word, masked to its low 16 bits.
    fn read(&self, word: usize) -> u16;

    fn write(&self, word: usize, value: u16);

    /// Read `word` and store `next(value)` in its place, returning the value
    /// read. The read always happens before the write so an edge landing
    /// in between is never cleared unseen.
    fn read_and_replace(&self, word: usize, next: impl Fn(u16) -> u16) -> u16;
}

/// Backing store for the engine model.
#[derive(Debug)]
pub struct AtomicRegion {
    words: [AtomicU32; REGION_WORDS],
}

impl AtomicRegion {
    /// Allocate a zeroed region and hand out its two sides.
    pub fn split() -> (EngineSide, HostSide<RegionHandle>) {
        let region = Arc::new(Self {
            words: core::array::from_fn(|_| AtomicU32::new(0)),
        });
        (
            EngineSide { region: Arc::clone(&region) },
            HostSide::new(RegionHandle { region }),
        )
    }

    fn word(&self, word: usize) -> &AtomicU32 {
        &self.words[word]
    }
}

/// Cloneable host handle onto an [`AtomicRegion`].
#[derive(Debug, Clone)]
pub struct RegionHandle {
    region: Arc<AtomicRegion>,
}

impl PulseWords for RegionHandle {
    fn read(&self, word: usize) -> u16 {
        (self.region.word(word).load(Ordering::Acquire) & ULP_DATA_MASK) as u16
    }

    fn write(&self, word: usize, value: u16) {
        self.region.word(word).store(u32::from(value), Ordering::Release);
    }

    fn read_and_replace(&self, word: usize, next: impl Fn(u16) -> u16) -> u16 {
        let previous = self
            .region
            .word(word)
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |raw| {
                Some(u32::from(next((raw & ULP_DATA_MASK) as u16)))
            })
            .unwrap_or_else(|raw| raw);
        (previous & ULP_DATA_MASK) as u16
    }
}

/// The engine's half of the region. Owned by whatever drives engine ticks.
#[derive(Debug)]
pub struct EngineSide {
    region: Arc<AtomicRegion>,
}

impl EngineSide {
    pub fn load(&self, word: usize) -> u16 {
        (self.region.word(word).load(Ordering::Acquire) & ULP_DATA_MASK) as u16
    }

    pub fn store(&self, word: usize, value: u16) {
        self.region.word(word).store(u32::from(value), Ordering::Release);
    }

    /// 16-bit wrapping increment, as the co-processor's ALU does it.
    pub fn increment(&self, word: usize) {
        self.update(word, |v| v.wrapping_add(1));
    }

    /// Apply `f` to a word as one atomic step.
    pub fn update(&self, word: usize, f: impl Fn(u16) -> u16) {
        let _ = self
            .region
            .word(word)
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |raw| {
                Some(u32::from(f((raw & ULP_DATA_MASK) as u16)))
            });
    }
}

/// Boot-time settings the host writes into a channel block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelConfig {
    pub rtc_io: u16,
    pub debounce_ticks: u16,
    pub idle_level: u16,
}

/// The host's half of the region.
#[derive(Debug, Clone)]
pub struct HostSide<W> {
    words: W,
}

impl<W: PulseWords> HostSide<W> {
    pub fn new(words: W) -> Self {
        Self { words }
    }

    pub fn words(&self) -> &W {
        &self.words
    }

    /// Write a channel's configuration and clear its counters. Must run
    /// before the engine is started.
    pub fn configure(&self, channel: &ChannelWords, config: &ChannelConfig) {
        self.words.write(channel.io_number, config.rtc_io);
        self.words.write(channel.debounce_threshold, config.debounce_ticks.max(1));
        self.words.write(channel.level, config.idle_level & 1);
        for word in [
            channel.debounce_count,
            channel.edge_count,
            channel.since_edge,
            channel.armed,
            channel.pulse_min,
        ]
        .into_iter()
        .chain(channel.histogram_slots())
        {
            self.words.write(word, 0);
        }
    }

    /// Take the confirmed edges of a channel, leaving an unpaired edge
    /// behind so it completes a pulse in the next window.
    pub fn take_edges(&self, channel: &ChannelWords) -> u16 {
        self.words.read_and_replace(channel.edge_count, |edges| edges % 2)
    }

    /// Take a word and reset it to zero.
    pub fn take(&self, word: usize) -> u16 {
        self.words.read_and_replace(word, |_| 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pulse::layout::WIND;

    #[test]
    fn take_edges_keeps_odd_remainder() {
        let (engine, host) = AtomicRegion::split();
        for _ in 0..5 {
            engine.increment(WIND.edge_count);
        }
        assert_eq!(host.take_edges(&WIND), 5);
        assert_eq!(host.words().read(WIND.edge_count), 1);

        engine.increment(WIND.edge_count);
        assert_eq!(host.take_edges(&WIND), 2);
        assert_eq!(host.words().read(WIND.edge_count), 0);
    }

    #[test]
    fn reads_are_masked_to_sixteen_bits() {
        let (engine, host) = AtomicRegion::split();
        engine.store(WIND.pulse_min, 0xffff);
        engine.increment(WIND.pulse_min);
        assert_eq!(host.words().read(WIND.pulse_min), 0);
    }

    #[test]
    fn configure_clears_counters() {
        let (engine, host) = AtomicRegion::split();
        engine.store(WIND.edge_count, 7);
        engine.store(WIND.pulse_min, 3);
        host.configure(
            &WIND,
            &ChannelConfig { rtc_io: 9, debounce_ticks: 0, idle_level: 1 },
        );
        assert_eq!(engine.load(WIND.edge_count), 0);
        assert_eq!(engine.load(WIND.pulse_min), 0);
        assert_eq!(engine.load(WIND.io_number), 9);
        assert_eq!(engine.load(WIND.debounce_threshold), 1);
        assert_eq!(engine.load(WIND.level), 1);
    }
}
