// ULP Weather Station: I2C Sensor Drivers
//
// I2C sensor drivers.
//
// Register decoding and compensation build everywhere; the bus-facing
// structs only exist on the device.

pub mod as5600;
pub mod bme280;

#[cfg(target_os = "espidf")]
use std::sync::{Mutex, MutexGuard};

#[cfg(target_os = "espidf")]
use esp_idf_hal::i2c::I2cDriver;

/// Thread-safe handle to a shared I2C bus.
#[cfg(target_os = "espidf")]
pub type SharedBus = &'static Mutex<I2cDriver<'static>>;

#[cfg(target_os = "espidf")]
fn lock(bus: SharedBus) -> anyhow::Result<MutexGuard<'static, I2cDriver<'static>>> {
    bus.lock().map_err(|_| anyhow::anyhow!("I2C bus mutex poisoned"))
}
