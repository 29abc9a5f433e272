#![cfg_attr(not(any(test, feature = "sim")), no_std)]
#![doc = include_str!("../README.md")]

// This mod MUST go first, so that the others see its macros.
pub(crate) mod fmt;

mod macros;

pub mod time;
pub mod rcc;
pub mod family;
#[cfg(any(test, feature = "sim"))]
pub mod sim;

pub use family::Family;
pub use rcc::{ClockFault, ClockProfile, FrequencyState, ProfileBuilder, Rcc};
