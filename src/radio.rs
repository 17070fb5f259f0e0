// ULP Weather Station: Half-duplex Radio Link (HC-12 style transceiver)
//
// The transceiver has two modes selected by a SET line: LOW for AT commands,
// HIGH for transparent data. Every step is timing-based; nothing the
// transceiver sends back is checked, so a transceiver that missed a mode
// change will take the next data write as a command.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

use crate::config::{RadioConfig, RADIO_RESPONSE_BUF};

/// Byte transport to the transceiver.
pub trait SerialPort {
    type Error: core::fmt::Debug;

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), Self::Error>;

    /// Block until everything written has left the UART.
    fn flush(&mut self) -> Result<(), Self::Error>;

    /// Copy whatever is already buffered into `buf` without waiting.
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioState {
    Asleep,
    Waking,
    CommandMode,
    Transmitting,
    SleepCommand,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RadioError {
    #[error("serial link failed while {state:?}: {detail}")]
    Serial { state: RadioState, detail: String },
    #[error("mode-select pin failed while {state:?}")]
    ModePin { state: RadioState },
}

/// Anything that can put one packet on the air.
pub trait Transmitter {
    fn transmit(&mut self, payload: &[u8]) -> Result<(), RadioError>;
}

pub struct RadioLink<S, P, D> {
    port: S,
    set_pin: P,
    delay: D,
    config: RadioConfig,
    state: RadioState,
}

impl<S, P, D> RadioLink<S, P, D>
where
    S: SerialPort,
    P: OutputPin,
    D: DelayNs,
{
    pub fn new(port: S, set_pin: P, delay: D, config: RadioConfig) -> Self {
        Self {
            port,
            set_pin,
            delay,
            config,
            state: RadioState::Asleep,
        }
    }

    pub fn state(&self) -> RadioState {
        self.state
    }

    /// One-time setup: select the power tier, then put the transceiver to
    /// sleep until the first transmission.
    pub fn configure(&mut self) -> Result<(), RadioError> {
        self.enter(RadioState::CommandMode);
        self.command_mode(true)?;
        self.settle();
        self.write(self.config.power_tier)?;
        self.drain_response();
        self.flush()?;
        self.command_mode(false)?;
        self.settle();
        log::info!("Radio configured ({})", String::from_utf8_lossy(self.config.power_tier));

        self.power_down()
    }

    /// Wake the transceiver, send `payload` and put it back to sleep.
    pub fn transmit(&mut self, payload: &[u8]) -> Result<(), RadioError> {
        // Waking: hold the SET line low long enough for command mode.
        self.enter(RadioState::Waking);
        self.command_mode(true)?;
        self.settle();

        // CommandMode: liveness probe, response discarded.
        self.enter(RadioState::CommandMode);
        self.write(self.config.probe)?;
        self.drain_response();
        self.flush()?;
        self.command_mode(false)?;
        self.settle();

        self.enter(RadioState::Transmitting);
        self.write(payload)?;
        self.flush()?;
        self.settle();

        self.power_down()
    }

    fn power_down(&mut self) -> Result<(), RadioError> {
        self.enter(RadioState::SleepCommand);
        self.command_mode(true)?;
        self.settle();
        self.write(self.config.sleep)?;
        self.flush()?;
        self.command_mode(false)?;
        self.settle();

        self.enter(RadioState::Asleep);
        Ok(())
    }

    fn enter(&mut self, state: RadioState) {
        log::debug!("Radio {:?} -> {:?}", self.state, state);
        self.state = state;
    }

    fn settle(&mut self) {
        self.delay.delay_ms(self.config.settle_ms);
    }

    /// SET LOW selects command mode.
    fn command_mode(&mut self, enable: bool) -> Result<(), RadioError> {
        let result = if enable {
            self.set_pin.set_low()
        } else {
            self.set_pin.set_high()
        };
        result.map_err(|_| RadioError::ModePin { state: self.state })
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), RadioError> {
        let state = self.state;
        self.port.write_all(bytes).map_err(|e| RadioError::Serial {
            state,
            detail: format!("{:?}", e),
        })
    }

    fn flush(&mut self) -> Result<(), RadioError> {
        let state = self.state;
        self.port.flush().map_err(|e| RadioError::Serial {
            state,
            detail: format!("{:?}", e),
        })
    }

    /// Read back and throw away whatever the transceiver echoed.
    fn drain_response(&mut self) {
        let mut buf = [0u8; RADIO_RESPONSE_BUF];
        match self.port.read_available(&mut buf) {
            Ok(0) => log::debug!("Radio: no response"),
            Ok(n) => log::debug!("Radio response: {}", String::from_utf8_lossy(&buf[..n]).trim_end()),
            Err(e) => log::debug!("Radio response read failed: {:?}", e),
        }
    }
}

impl<S, P, D> Transmitter for RadioLink<S, P, D>
where
    S: SerialPort,
    P: OutputPin,
    D: DelayNs,
{
    fn transmit(&mut self, payload: &[u8]) -> Result<(), RadioError> {
        RadioLink::transmit(self, payload)
    }
}
