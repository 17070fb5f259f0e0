// ULP Weather Station: UART transport for the radio

use esp_idf_hal::delay::{BLOCK, NON_BLOCK};
use esp_idf_hal::uart::UartDriver;
use esp_idf_sys::EspError;

use crate::radio::SerialPort;

pub struct UartPort {
    uart: UartDriver<'static>,
}

impl UartPort {
    pub fn new(uart: UartDriver<'static>) -> Self {
        Self { uart }
    }
}

impl SerialPort for UartPort {
    type Error = EspError;

    fn write_all(&mut self, mut bytes: &[u8]) -> Result<(), Self::Error> {
        while !bytes.is_empty() {
            let written = self.uart.write(bytes)?;
            bytes = &bytes[written..];
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        self.uart.wait_tx_done(BLOCK)
    }

    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        self.uart.read(buf, NON_BLOCK)
    }
}
