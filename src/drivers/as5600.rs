// ULP Weather Station: AS5600 Magnetic Angle Sensor (wind vane)
//
// Register-level driver over the shared I2C bus. Only the filtered 12-bit
// ANGLE register is read; the chip is kept in its lowest power mode.

#[cfg(target_os = "espidf")]
use crate::config::{I2C_ADDR_AS5600, I2C_TIMEOUT_TICKS};
#[cfg(target_os = "espidf")]
use crate::sensors::HeadingSensor;

#[cfg(target_os = "espidf")]
use super::SharedBus;

#[cfg(target_os = "espidf")]
const REG_CONF: u8 = 0x07;
#[cfg(target_os = "espidf")]
const REG_STATUS: u8 = 0x0B;
#[cfg(target_os = "espidf")]
const REG_ANGLE_H: u8 = 0x0E;

/// CONF high byte 0x00, low byte PM = LPM3 (polling every 100 ms).
#[cfg(target_os = "espidf")]
const CONF_LOW_POWER: [u8; 2] = [0x00, 0x03];
/// STATUS bit 5: magnet detected.
const STATUS_MAGNET_DETECTED: u8 = 0x20;

const ANGLE_STEPS: f32 = 4096.0;

/// Convert the two ANGLE register bytes to degrees in [0, 360).
pub fn angle_degrees(raw: [u8; 2]) -> f32 {
    let steps = u16::from_be_bytes(raw) & 0x0fff;
    f32::from(steps) * 360.0 / ANGLE_STEPS
}

pub fn magnet_detected(status: u8) -> bool {
    status & STATUS_MAGNET_DETECTED != 0
}

#[cfg(target_os = "espidf")]
pub struct As5600 {
    bus: SharedBus,
}

#[cfg(target_os = "espidf")]
impl As5600 {
    pub fn new(bus: SharedBus) -> Self {
        Self { bus }
    }

    /// Drop to low-power mode and report whether the vane magnet is seen.
    pub fn init(&self) -> anyhow::Result<()> {
        let mut bus = super::lock(self.bus)?;
        bus.write(
            I2C_ADDR_AS5600,
            &[REG_CONF, CONF_LOW_POWER[0], CONF_LOW_POWER[1]],
            I2C_TIMEOUT_TICKS,
        )?;

        let mut status = [0u8; 1];
        bus.write_read(I2C_ADDR_AS5600, &[REG_STATUS], &mut status, I2C_TIMEOUT_TICKS)?;
        if magnet_detected(status[0]) {
            log::info!("AS5600 initialised (LPM3)");
        } else {
            log::warn!("AS5600 initialised but no magnet detected (status {:#04x})", status[0]);
        }
        Ok(())
    }
}

#[cfg(target_os = "espidf")]
impl HeadingSensor for As5600 {
    fn raw_degrees(&mut self) -> anyhow::Result<f32> {
        let mut bus = super::lock(self.bus)?;
        let mut raw = [0u8; 2];
        bus.write_read(I2C_ADDR_AS5600, &[REG_ANGLE_H], &mut raw, I2C_TIMEOUT_TICKS)?;
        Ok(angle_degrees(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn angle_covers_full_circle() {
        assert_eq!(angle_degrees([0x00, 0x00]), 0.0);
        assert_eq!(angle_degrees([0x04, 0x00]), 90.0);
        assert_eq!(angle_degrees([0x08, 0x00]), 180.0);
        assert!(angle_degrees([0x0f, 0xff]) < 360.0);
        // Upper nibble is not part of the angle.
        assert_eq!(angle_degrees([0xf4, 0x00]), 90.0);
    }

    #[test]
    fn magnet_status_bit() {
        assert!(magnet_detected(0x20));
        assert!(magnet_detected(0x28));
        assert!(!magnet_detected(0x08));
    }
}
