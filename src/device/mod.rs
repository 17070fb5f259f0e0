// ULP Weather Station: ESP32 Device Bindings
//
// ESP32 bindings for the hardware seams: ULP loader and RTC memory, UART
// transport, battery ADC, clock and light sleep.

pub mod battery;
pub mod sleep;
pub mod uart;
pub mod ulp;

pub use battery::AdcBattery;
pub use sleep::{EspClock, LightSleep};
pub use uart::UartPort;
pub use ulp::RtcSlowMemory;
