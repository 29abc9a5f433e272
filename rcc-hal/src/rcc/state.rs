//! Published bus frequencies.

use core::cell::Cell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;

use crate::time::Hertz;

/// Frequencies of the system clock and the buses derived from it.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Clocks {
    pub sysclk: Hertz,
    pub ahb: Hertz,
    pub apb1: Hertz,
    pub apb2: Hertz,
}

impl Clocks {
    pub const fn new(sysclk: Hertz, ahb: Hertz, apb1: Hertz, apb2: Hertz) -> Self {
        Self { sysclk, ahb, apb1, apb2 }
    }

    /// All buses at `freq`, which is how every family comes out of reset.
    pub const fn uniform(freq: Hertz) -> Self {
        Self::new(freq, freq, freq, freq)
    }
}

/// The frequencies drivers compute baud rates and timer periods from.
///
/// Only a successful profile application (or an explicit resync from the
/// hardware) updates it, and the whole set changes at once: a reader on
/// another execution context sees either the old or the new clocks, never a
/// mix. Usually lives in a `static`:
///
/// ```rust,ignore
/// static CLOCKS: FrequencyState = FrequencyState::new(F1::RESET_CLOCKS);
/// ```
pub struct FrequencyState {
    clocks: Mutex<CriticalSectionRawMutex, Cell<Clocks>>,
}

impl FrequencyState {
    pub const fn new(reset: Clocks) -> Self {
        Self {
            clocks: Mutex::new(Cell::new(reset)),
        }
    }

    pub fn clocks(&self) -> Clocks {
        self.clocks.lock(|c| c.get())
    }

    pub fn current_sysclk_frequency(&self) -> Hertz {
        self.clocks().sysclk
    }

    pub fn current_ahb_frequency(&self) -> Hertz {
        self.clocks().ahb
    }

    pub fn current_apb1_frequency(&self) -> Hertz {
        self.clocks().apb1
    }

    pub fn current_apb2_frequency(&self) -> Hertz {
        self.clocks().apb2
    }

    pub(crate) fn publish(&self, clocks: Clocks) {
        debug!(
            "rcc: sysclk {} ahb {} apb1 {} apb2 {}",
            clocks.sysclk,
            clocks.ahb,
            clocks.apb1,
            clocks.apb2
        );
        self.clocks.lock(|c| c.set(clocks));
    }
}
