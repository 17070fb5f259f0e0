// ULP Weather Station: Mock Transceiver Wiring
//
// Mock transceiver wiring: serial port, SET pin and delay.
//
// All three share one `Journal` so tests can assert on the interleaving
// of pin changes, settle delays and bytes on the wire.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::convert::Infallible;
use std::rc::Rc;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, OutputPin};

use crate::radio::SerialPort;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JournalEntry {
    PinLow,
    PinHigh,
    DelayMs(u32),
    Serial(Vec<u8>),
    Flush,
}

/// Ordered record of everything the mocks were asked to do.
#[derive(Debug, Default, Clone)]
pub struct Journal {
    entries: Rc<RefCell<Vec<JournalEntry>>>,
}

impl Journal {
    fn push(&self, entry: JournalEntry) {
        self.entries.borrow_mut().push(entry);
    }

    pub fn entries(&self) -> Vec<JournalEntry> {
        self.entries.borrow().clone()
    }

    /// Every `write_all` payload, in order.
    pub fn serial_writes(&self) -> Vec<Vec<u8>> {
        self.entries
            .borrow()
            .iter()
            .filter_map(|entry| match entry {
                JournalEntry::Serial(bytes) => Some(bytes.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockSerialError;

/// Serial port with an injectable receive buffer.
#[derive(Debug)]
pub struct MockSerial {
    journal: Journal,
    rx: VecDeque<u8>,
    writes_left: Option<usize>,
}

impl MockSerial {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            rx: VecDeque::new(),
            writes_left: None,
        }
    }

    /// Queue bytes for the next `read_available`.
    pub fn inject_rx(&mut self, data: &[u8]) {
        self.rx.extend(data);
    }

    /// Let `n` more writes through, then fail every write after that.
    pub fn fail_writes_after(&mut self, n: usize) {
        self.writes_left = Some(n);
    }
}

impl SerialPort for MockSerial {
    type Error = MockSerialError;

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        if let Some(left) = self.writes_left.as_mut() {
            if *left == 0 {
                return Err(MockSerialError);
            }
            *left -= 1;
        }
        self.journal.push(JournalEntry::Serial(bytes.to_vec()));
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        self.journal.push(JournalEntry::Flush);
        Ok(())
    }

    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let n = buf.len().min(self.rx.len());
        for (slot, byte) in buf.iter_mut().zip(self.rx.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

/// Output pin that journals level changes.
#[derive(Debug)]
pub struct MockPin {
    journal: Journal,
}

impl MockPin {
    pub fn new(journal: Journal) -> Self {
        Self { journal }
    }
}

impl ErrorType for MockPin {
    type Error = Infallible;
}

impl OutputPin for MockPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.journal.push(JournalEntry::PinLow);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.journal.push(JournalEntry::PinHigh);
        Ok(())
    }
}

/// Delay that returns immediately and journals the requested time.
#[derive(Debug)]
pub struct MockDelay {
    journal: Journal,
}

impl MockDelay {
    pub fn new(journal: Journal) -> Self {
        Self { journal }
    }
}

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.journal.push(JournalEntry::DelayMs(ns / 1_000_000));
    }

    fn delay_ms(&mut self, ms: u32) {
        self.journal.push(JournalEntry::DelayMs(ms));
    }
}
