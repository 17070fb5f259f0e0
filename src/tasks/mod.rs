pub mod gather;

pub use gather::{GatherReport, Station, StationIo};
