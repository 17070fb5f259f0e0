// ULP Weather Station: Edge Engine Model
//
// Model of the always-on edge engine.
//
// On the device this logic runs as the ULP program in
// `ulp/pulse_counter.S`. This is the same state machine over the same
// word layout, driven one tick at a time, used by the host simulation and
// by tests that replay recorded input traces.

use crate::config::{HISTOGRAM_SLOTS, HISTOGRAM_TICKS_PER_SLOT};

use super::layout::{ChannelWords, RAIN, SAMPLED_INPUTS, SLOT_POINTER, SLOT_TICKS, WIND};
use super::shared::EngineSide;

/// Interval bookkeeping run by the engine alongside edge counting.
pub trait BurstTracker {
    /// Called once per wake tick for each channel, before its input is
    /// examined.
    fn tick(&mut self, region: &EngineSide, channel: &ChannelWords);

    /// Called once per wake tick after every channel has been stepped.
    fn end_of_tick(&mut self, _region: &EngineSide) {}

    /// Called when a debounced edge is confirmed on `channel`.
    fn edge(&mut self, region: &EngineSide, channel: &ChannelWords);
}

/// Tracks the shortest edge-to-edge interval seen since the host last
/// cleared it.
#[derive(Debug, Default, Clone, Copy)]
pub struct ShortestInterval;

impl BurstTracker for ShortestInterval {
    fn tick(&mut self, region: &EngineSide, channel: &ChannelWords) {
        region.update(channel.since_edge, |ticks| ticks.saturating_add(1));
    }

    fn edge(&mut self, region: &EngineSide, channel: &ChannelWords) {
        if region.load(channel.armed) != 0 {
            let since = region.load(channel.since_edge);
            region.update(channel.pulse_min, |min| {
                if min == 0 || since < min {
                    since
                } else {
                    min
                }
            });
        } else {
            region.store(channel.armed, 1);
        }
        region.store(channel.since_edge, 0);
    }
}

/// Counts edges into a ring of time slots; the busiest slot is the burst.
///
/// Moving into a slot clears it, so after the ring wraps the histogram
/// covers the most recent lap only.
#[derive(Debug, Clone, Copy)]
pub struct SlotHistogram {
    ticks_per_slot: u16,
}

impl SlotHistogram {
    pub fn new(ticks_per_slot: u16) -> Self {
        Self {
            ticks_per_slot: ticks_per_slot.max(1),
        }
    }
}

impl Default for SlotHistogram {
    fn default() -> Self {
        Self::new(HISTOGRAM_TICKS_PER_SLOT)
    }
}

impl BurstTracker for SlotHistogram {
    fn tick(&mut self, _region: &EngineSide, _channel: &ChannelWords) {}

    fn end_of_tick(&mut self, region: &EngineSide) {
        let ticks = region.load(SLOT_TICKS) + 1;
        if ticks >= self.ticks_per_slot {
            region.store(SLOT_TICKS, 0);
            let next = (region.load(SLOT_POINTER) + 1) % HISTOGRAM_SLOTS as u16;
            region.store(SLOT_POINTER, next);
            // A slot only ever holds one lap's worth of edges.
            for channel in [WIND, RAIN] {
                region.store(channel.histogram + usize::from(next), 0);
            }
        } else {
            region.store(SLOT_TICKS, ticks);
        }
    }

    fn edge(&mut self, region: &EngineSide, channel: &ChannelWords) {
        let slot = usize::from(region.load(SLOT_POINTER)) % HISTOGRAM_SLOTS;
        region.increment(channel.histogram + slot);
    }
}

/// Debounces both inputs and counts confirmed edges.
#[derive(Debug)]
pub struct DebounceEngine<T> {
    region: EngineSide,
    tracker: T,
}

impl<T: BurstTracker> DebounceEngine<T> {
    pub fn new(region: EngineSide, tracker: T) -> Self {
        Self { region, tracker }
    }

    /// Run one wake tick. Bit `n` of `inputs` is the level of RTC GPIO `n`.
    pub fn tick(&mut self, inputs: u16) {
        self.region.store(SAMPLED_INPUTS, inputs);
        for channel in [WIND, RAIN] {
            self.step_channel(&channel, inputs);
        }
        self.tracker.end_of_tick(&self.region);
    }

    fn step_channel(&mut self, channel: &ChannelWords, inputs: u16) {
        self.tracker.tick(&self.region, channel);

        let io = u32::from(self.region.load(channel.io_number));
        let level = inputs.checked_shr(io).unwrap_or(0) & 1;

        if level == self.region.load(channel.level) {
            self.region.store(channel.debounce_count, 0);
            return;
        }

        let count = self.region.load(channel.debounce_count).saturating_add(1);
        if count < self.region.load(channel.debounce_threshold) {
            self.region.store(channel.debounce_count, count);
            return;
        }

        // Level held for `threshold` consecutive ticks: confirm the edge.
        self.region.store(channel.debounce_count, 0);
        self.region.store(channel.level, level);
        self.region.increment(channel.edge_count);
        self.tracker.edge(&self.region, channel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pulse::layout::HISTOGRAM_BASE;
    use crate::pulse::shared::{AtomicRegion, ChannelConfig, HostSide, PulseWords, RegionHandle};

    const WIND_IO: u16 = 9;
    const RAIN_IO: u16 = 5;

    fn engine_with<T: BurstTracker>(
        tracker: T,
        threshold: u16,
    ) -> (DebounceEngine<T>, HostSide<RegionHandle>) {
        let (engine_side, host) = AtomicRegion::split();
        host.configure(
            &WIND,
            &ChannelConfig { rtc_io: WIND_IO, debounce_ticks: threshold, idle_level: 0 },
        );
        host.configure(
            &RAIN,
            &ChannelConfig { rtc_io: RAIN_IO, debounce_ticks: threshold, idle_level: 0 },
        );
        (DebounceEngine::new(engine_side, tracker), host)
    }

    fn wind(level: bool) -> u16 {
        u16::from(level) << WIND_IO
    }

    /// Replay a level trace on the wind input, one entry per tick.
    fn replay<T: BurstTracker>(engine: &mut DebounceEngine<T>, trace: &[u8]) {
        for &level in trace {
            engine.tick(wind(level != 0));
        }
    }

    #[test]
    fn glitch_shorter_than_threshold_is_ignored() {
        let (mut engine, host) = engine_with(ShortestInterval, 3);
        replay(&mut engine, &[0, 1, 1, 0, 0, 1, 0, 1, 1, 0]);
        assert_eq!(host.words().read(WIND.edge_count), 0);
        assert_eq!(host.words().read(WIND.level), 0);
    }

    #[test]
    fn edge_confirmed_after_threshold_stable_ticks() {
        let (mut engine, host) = engine_with(ShortestInterval, 3);
        replay(&mut engine, &[1, 1]);
        assert_eq!(host.words().read(WIND.edge_count), 0);
        replay(&mut engine, &[1]);
        assert_eq!(host.words().read(WIND.edge_count), 1);
        assert_eq!(host.words().read(WIND.level), 1);

        // Holding the level does not count again.
        replay(&mut engine, &[1, 1, 1, 1]);
        assert_eq!(host.words().read(WIND.edge_count), 1);

        replay(&mut engine, &[0, 0, 0]);
        assert_eq!(host.words().read(WIND.edge_count), 2);
    }

    #[test]
    fn edges_confirmed_iff_stable_for_threshold() {
        // Exhaustively check every 8-tick trace against a direct model.
        let threshold = 2u16;
        for pattern in 0u16..256 {
            let trace: Vec<u8> = (0..8).map(|bit| ((pattern >> bit) & 1) as u8).collect();
            let (mut engine, host) = engine_with(ShortestInterval, threshold);
            replay(&mut engine, &trace);

            let mut confirmed = 0u8;
            let mut run = 0u16;
            let mut expected = 0u16;
            for &level in &trace {
                if level == confirmed {
                    run = 0;
                } else {
                    run += 1;
                    if run >= threshold {
                        confirmed = level;
                        run = 0;
                        expected += 1;
                    }
                }
            }
            assert_eq!(
                host.words().read(WIND.edge_count),
                expected,
                "trace {:?}",
                trace
            );
        }
    }

    #[test]
    fn channels_are_independent() {
        let (mut engine, host) = engine_with(ShortestInterval, 1);
        engine.tick(1 << RAIN_IO);
        engine.tick(0);
        assert_eq!(host.words().read(RAIN.edge_count), 2);
        assert_eq!(host.words().read(WIND.edge_count), 0);
    }

    #[test]
    fn shortest_interval_needs_two_edges() {
        let (mut engine, host) = engine_with(ShortestInterval, 1);
        replay(&mut engine, &[0, 0, 1]);
        assert_eq!(host.words().read(WIND.pulse_min), 0);

        // Next edge four ticks later, then one two ticks after that.
        replay(&mut engine, &[1, 1, 1, 0, 0, 1]);
        assert_eq!(host.words().read(WIND.edge_count), 3);
        assert_eq!(host.words().read(WIND.pulse_min), 2);

        // A longer interval does not replace the minimum.
        replay(&mut engine, &[1, 1, 1, 1, 1, 0]);
        assert_eq!(host.words().read(WIND.pulse_min), 2);
    }

    #[test]
    fn shortest_interval_rearms_after_host_clear() {
        let (mut engine, host) = engine_with(ShortestInterval, 1);
        replay(&mut engine, &[1, 0]);
        assert_eq!(host.take(WIND.pulse_min), 1);

        replay(&mut engine, &[0, 0, 0, 1]);
        assert_eq!(host.words().read(WIND.pulse_min), 4);
    }

    #[test]
    fn histogram_counts_edges_per_slot() {
        let (mut engine, host) = engine_with(SlotHistogram::new(4), 1);
        // Slot 0: two edges.
        replay(&mut engine, &[1, 0, 0, 0]);
        // Slot 1: four edges.
        replay(&mut engine, &[1, 0, 1, 0]);
        // Slot 2: one edge.
        replay(&mut engine, &[1, 1, 1, 1]);

        assert_eq!(host.words().read(HISTOGRAM_BASE), 2);
        assert_eq!(host.words().read(HISTOGRAM_BASE + 1), 4);
        assert_eq!(host.words().read(HISTOGRAM_BASE + 2), 1);
        assert_eq!(host.words().read(SLOT_POINTER), 3);
        assert_eq!(host.words().read(WIND.edge_count), 7);
    }

    #[test]
    fn histogram_slot_is_cleared_on_entry() {
        let (mut engine, host) = engine_with(SlotHistogram::new(2), 1);
        // An edge on every tick, two per slot, for three laps of the ring.
        for tick in 0..(3 * 2 * HISTOGRAM_SLOTS) {
            engine.tick(wind(tick % 2 == 0));
        }
        // The pointer has just wrapped into slot 0 and emptied it.
        assert_eq!(host.words().read(SLOT_POINTER), 0);
        assert_eq!(host.words().read(WIND.histogram), 0);
        for slot in WIND.histogram_slots().skip(1) {
            assert_eq!(host.words().read(slot), 2, "slot {}", slot - WIND.histogram);
        }
    }

    #[test]
    fn histogram_slot_pointer_wraps() {
        let (mut engine, host) = engine_with(SlotHistogram::new(1), 1);
        for _ in 0..HISTOGRAM_SLOTS {
            engine.tick(0);
        }
        assert_eq!(host.words().read(SLOT_POINTER), 0);
    }
}
