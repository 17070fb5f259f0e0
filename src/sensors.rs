// ULP Weather Station: Sensor & Platform Seams
//
// The gather loop only talks to these traits. The device build backs them
// with the I2C drivers, the ADC and light sleep; host builds use `mock`.

use crate::record::EnvironmentReading;

/// Temperature / humidity / pressure sensor.
pub trait EnvironmentSensor {
    fn read(&mut self) -> anyhow::Result<EnvironmentReading>;
}

/// Wind vane angle sensor.
pub trait HeadingSensor {
    /// Vane angle in degrees, uncorrected for mounting offset.
    fn raw_degrees(&mut self) -> anyhow::Result<f32>;
}

pub trait BatterySensor {
    /// Battery terminal voltage, already scaled for the divider.
    fn read_volts(&mut self) -> anyhow::Result<f32>;
}

/// Monotonic milliseconds since boot.
pub trait Clock {
    fn now_ms(&self) -> u64;
}

/// Low-power wait between gather windows. The pulse engine keeps running.
pub trait Sleeper {
    fn sleep_secs(&mut self, secs: u32);
}
