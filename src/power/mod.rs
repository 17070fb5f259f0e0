// ULP Weather Station: Power Management
//
// Battery estimation and the duty-cycle control law.

pub mod battery;
pub mod duty_cycle;

pub use battery::{normalize_voltage, BatteryHistory};
