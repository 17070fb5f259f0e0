// ULP Weather Station: Firmware Library
//
// Firmware library for a battery-powered weather station.
//
// The ULP co-processor debounces and counts anemometer and rain-bucket
// pulses while the main CPU sleeps. Once per window the main CPU reads the
// counters, turns them into wind and rain figures, packs a checksummed
// MessagePack packet and sends it over an HC-12 radio, then sleeps for an
// interval chosen from the battery voltage.
//
// Everything except `device` and the bus-facing half of `drivers` builds
// and tests on the host.

pub mod codec;
pub mod config;
pub mod drivers;
pub mod power;
pub mod pulse;
pub mod radio;
pub mod record;
pub mod sensors;
pub mod tasks;

#[cfg(not(target_os = "espidf"))]
pub mod mock;

#[cfg(target_os = "espidf")]
pub mod device;
