// ULP Weather Station: ULP Shared Memory Layout
//
// Word offsets inside the co-processor's shared memory region.
//
// The ULP program declares its data block before the first instruction,
// so every word below sits at a fixed offset from `ULP_MEM_BASE`. These
// offsets come from the data block at the top of `ulp/pulse_counter.S`
// and must be kept in step with it. They are a build artifact of that
// program, not a stable ABI.

use crate::config::HISTOGRAM_SLOTS;

/// Start of RTC slow memory as seen by the main CPU.
pub const ULP_MEM_BASE: usize = 0x5000_0000;
/// The ULP stores 16-bit values; the upper half of each word holds the
/// address of the store instruction and must be masked off on read.
pub const ULP_DATA_MASK: u32 = 0xffff;

const CHANNEL_BLOCK_WORDS: usize = 8;

/// Word offsets of one channel's block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelWords {
    /// Confirmed (debounced) input level, 0 or 1.
    pub level: usize,
    /// Consecutive ticks that disagreed with `level`.
    pub debounce_count: usize,
    /// Ticks of disagreement needed to confirm an edge.
    pub debounce_threshold: usize,
    /// Confirmed edges since the host last read this word.
    pub edge_count: usize,
    /// Ticks since the last confirmed edge, saturating.
    pub since_edge: usize,
    /// Non-zero once at least one edge has been seen.
    pub armed: usize,
    /// Shortest edge-to-edge interval in ticks, 0 when none observed.
    pub pulse_min: usize,
    /// RTC GPIO number sampled for this channel.
    pub io_number: usize,
    /// First of [`HISTOGRAM_SLOTS`] per-slot edge counters.
    pub histogram: usize,
}

impl ChannelWords {
    const fn at(base: usize, histogram: usize) -> Self {
        Self {
            level: base,
            debounce_count: base + 1,
            debounce_threshold: base + 2,
            edge_count: base + 3,
            since_edge: base + 4,
            armed: base + 5,
            pulse_min: base + 6,
            io_number: base + 7,
            histogram,
        }
    }

    /// Word offsets of every histogram slot of this channel.
    pub fn histogram_slots(&self) -> core::ops::Range<usize> {
        self.histogram..self.histogram + HISTOGRAM_SLOTS
    }
}

pub const WIND: ChannelWords = ChannelWords::at(0, HISTOGRAM_BASE);
pub const RAIN: ChannelWords = ChannelWords::at(CHANNEL_BLOCK_WORDS, HISTOGRAM_BASE + HISTOGRAM_SLOTS);

/// Current histogram slot, shared by both channels.
pub const SLOT_POINTER: usize = 2 * CHANNEL_BLOCK_WORDS;
/// Ticks spent in the current slot.
pub const SLOT_TICKS: usize = SLOT_POINTER + 1;
pub const HISTOGRAM_BASE: usize = SLOT_TICKS + 1;
/// Raw RTC GPIO input bits captured on the latest tick.
pub const SAMPLED_INPUTS: usize = HISTOGRAM_BASE + 2 * HISTOGRAM_SLOTS;

/// Number of data words; the program's entry point follows them.
pub const REGION_WORDS: usize = SAMPLED_INPUTS + 1;
/// Entry point of the co-processor program, in words from the load address.
pub const ENTRY_WORD: u32 = REGION_WORDS as u32;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_blocks_do_not_overlap() {
        let mut seen = std::collections::HashSet::new();
        for ch in [WIND, RAIN] {
            for word in [
                ch.level,
                ch.debounce_count,
                ch.debounce_threshold,
                ch.edge_count,
                ch.since_edge,
                ch.armed,
                ch.pulse_min,
                ch.io_number,
            ]
            .into_iter()
            .chain(ch.histogram_slots())
            {
                assert!(seen.insert(word), "word {} used twice", word);
                assert!(word < REGION_WORDS);
            }
        }
        assert!(!seen.contains(&SLOT_POINTER));
        assert!(!seen.contains(&SLOT_TICKS));
        assert!(!seen.contains(&SAMPLED_INPUTS));
    }

    #[test]
    fn offsets_match_ulp_data_block() {
        // Order of the `.long` declarations in ulp/pulse_counter.S.
        assert_eq!(WIND.edge_count, 3);
        assert_eq!(WIND.pulse_min, 6);
        assert_eq!(RAIN.level, 8);
        assert_eq!(RAIN.edge_count, 11);
        assert_eq!(RAIN.pulse_min, 14);
        assert_eq!(SLOT_POINTER, 16);
        assert_eq!(HISTOGRAM_BASE, 18);
        assert_eq!(SAMPLED_INPUTS, 38);
        assert_eq!(ENTRY_WORD, 39);
    }
}
