//! Core infrastructure shared by every component

pub mod clock;

pub use clock::{Clock, FixedClock, SystemClock};
