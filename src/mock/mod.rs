// ULP Weather Station: Host Mocks
//
// Host stand-ins for the hardware seams.
//
// Used by unit tests, the integration tests under `tests/` and the host
// build of the firmware binary, which runs the gather loop against a
// simulated clock and a modelled pulse engine.

mod channel;
mod link;
mod station;

pub use channel::RecordedChannel;
pub use link::{Journal, JournalEntry, MockDelay, MockPin, MockSerial, MockSerialError};
pub use station::{
    DeadSensor, EngineSleeper, MockBattery, MockEnvironment, MockHeading, MockSleeper, SimClock,
};
