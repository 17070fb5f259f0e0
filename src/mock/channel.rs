// ULP Weather Station: Recorded Pulse Channel
//
// Pulse channel that replays pre-recorded windows.

use std::collections::VecDeque;

use crate::pulse::{Burst, PulseChannel};

const EMPTY: Burst = Burst::ShortestInterval { ticks: 0 };

/// Each entry is one window: the pulse count and the burst value the
/// channel reports for it. A window is consumed by `take_burst`, so a
/// window that is never closed stays queued. Once the queue runs dry the
/// channel reports an idle input.
#[derive(Debug, Default, Clone)]
pub struct RecordedChannel {
    windows: VecDeque<(u16, Burst)>,
}

impl RecordedChannel {
    pub fn new(windows: &[(u16, Burst)]) -> Self {
        Self {
            windows: windows.iter().copied().collect(),
        }
    }

    pub fn push(&mut self, pulses: u16, burst: Burst) {
        self.windows.push_back((pulses, burst));
    }

    pub fn remaining(&self) -> usize {
        self.windows.len()
    }
}

impl PulseChannel for RecordedChannel {
    fn take_pulses(&mut self) -> u16 {
        self.windows.front().map_or(0, |&(pulses, _)| pulses)
    }

    fn take_burst(&mut self) -> Burst {
        self.windows.pop_front().map_or(EMPTY, |(_, burst)| burst)
    }
}
