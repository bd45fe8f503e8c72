//! Time abstractions
//!
//! Credential expiry is wall-clock based, so everything that decides whether
//! a token is still usable reads time through [`Clock`]. Tests swap in
//! [`MockClock`] and move time forward explicitly.

pub mod clock;

pub use clock::{Clock, MockClock, SystemClock};
