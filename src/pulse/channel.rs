// ULP Weather Station: Pulse Channel Views
//
// Host-side views of one input channel.

use super::layout::ChannelWords;
use super::shared::{HostSide, PulseWords};

/// The auxiliary value a channel reports next to its edge count, from
/// which the peak rate of the window is estimated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Burst {
    /// Shortest edge-to-edge interval in engine ticks, 0 if fewer than two
    /// edges were seen.
    ShortestInterval { ticks: u16 },
    /// Edge count of the busiest histogram slot in the most recent lap of
    /// the ring.
    BusiestSlot { edges: u16 },
}

/// What the aggregator needs from a pulse input, once per window.
pub trait PulseChannel {
    /// Whole pulses since the last call. A pulse is two confirmed edges;
    /// an unpaired edge stays behind for the next window.
    fn take_pulses(&mut self) -> u16;

    /// Read and clear the burst value for the window.
    fn take_burst(&mut self) -> Burst;

    /// Throw away everything counted so far.
    fn discard(&mut self) {
        self.take_pulses();
        self.take_burst();
    }
}

/// Channel whose engine tracks the shortest inter-edge interval.
#[derive(Debug, Clone)]
pub struct IntervalChannel<W> {
    host: HostSide<W>,
    words: ChannelWords,
}

impl<W: PulseWords> IntervalChannel<W> {
    pub fn new(host: HostSide<W>, words: ChannelWords) -> Self {
        Self { host, words }
    }
}

impl<W: PulseWords> PulseChannel for IntervalChannel<W> {
    fn take_pulses(&mut self) -> u16 {
        self.host.take_edges(&self.words) / 2
    }

    fn take_burst(&mut self) -> Burst {
        Burst::ShortestInterval {
            ticks: self.host.take(self.words.pulse_min),
        }
    }
}

/// Channel whose engine fills a time-slot histogram.
#[derive(Debug, Clone)]
pub struct HistogramChannel<W> {
    host: HostSide<W>,
    words: ChannelWords,
}

impl<W: PulseWords> HistogramChannel<W> {
    pub fn new(host: HostSide<W>, words: ChannelWords) -> Self {
        Self { host, words }
    }
}

impl<W: PulseWords> PulseChannel for HistogramChannel<W> {
    fn take_pulses(&mut self) -> u16 {
        self.host.take_edges(&self.words) / 2
    }

    fn take_burst(&mut self) -> Burst {
        let edges = self
            .words
            .histogram_slots()
            .map(|slot| self.host.take(slot))
            .max()
            .unwrap_or(0);
        Burst::BusiestSlot { edges }
    }
}
