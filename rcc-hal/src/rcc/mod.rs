//! Reset and clock control.
//!
//! [`Rcc`] owns the register bus and hands out one view per piece of the
//! clock tree:
//!
//! - [`Oscillators`]: enable, disable and ready polling
//! - [`ClockSwitch`]: the system clock multiplexer
//! - [`PllConfigurator`]: PLL programming, cascades included
//! - [`PrescalerTree`]: AHB/APB dividers
//! - [`VoltageScaling`]: regulator range selection
//!
//! [`Rcc::apply`] composes them to move the whole tree to a
//! [`ClockProfile`] atomically and publishes the result in a
//! [`FrequencyState`] that drivers read their bus frequency from.

use core::marker::PhantomData;

pub mod bus;
mod error;
mod wait;

mod apply;
mod backup;
mod osc;
pub(crate) mod periph;
pub(crate) mod pll;
mod prescaler;
mod profile;
pub(crate) mod state;
mod switch;
pub(crate) mod voltage;

pub use apply::ApplyState;
pub use bus::{Field, Mmio, Reg, RegisterBus};
pub use error::{Bus, ClockFault, ConfigError, FaultKind, HardwareTimeout, InvariantViolation};
pub use osc::{OscState, Oscillators};
pub use periph::ClockGate;
pub use pll::{PllConfig, PllConfigurator, PllFreqs, PllInput};
pub use prescaler::{AhbPrescaler, ApbPrescaler, PrescalerTree, Prescalers};
pub use profile::{Board, ClockProfile, ExternalClock, PllSet, ProfileBuilder};
pub use state::{Clocks, FrequencyState};
pub use switch::ClockSwitch;
#[cfg(feature = "time")]
pub use wait::Deadline;
pub use wait::{NoTimeout, PollLimit, Timeout};
pub use voltage::{NoScaling, ScaleLimits, VoltageScale, VoltageScaling};

use crate::family::Family;

/// The clock tree of one chip.
///
/// `state` is where applied profiles are published. It is borrowed rather
/// than global so independent trees (one per test, for instance) never see
/// each other's frequencies.
pub struct Rcc<'s, F: Family, B: RegisterBus> {
    bus: B,
    state: &'s FrequencyState,
    board: Board,
    apply_state: ApplyState,
    _family: PhantomData<F>,
}

impl<'s, F: Family, B: RegisterBus> Rcc<'s, F, B> {
    pub fn new(bus: B, state: &'s FrequencyState, board: Board) -> Self {
        Self {
            bus,
            state,
            board,
            apply_state: ApplyState::Idle,
            _family: PhantomData,
        }
    }

    pub fn oscillators(&mut self) -> Oscillators<'_, F, B> {
        Oscillators::new(&mut self.bus)
    }

    pub fn switch(&mut self) -> ClockSwitch<'_, F, B> {
        ClockSwitch::new(&mut self.bus)
    }

    pub fn plls(&mut self) -> PllConfigurator<'_, F, B> {
        PllConfigurator::new(&mut self.bus, self.board)
    }

    pub fn prescalers(&mut self) -> PrescalerTree<'_, F, B> {
        PrescalerTree::new(&mut self.bus)
    }

    pub fn regulator(&mut self) -> VoltageScaling<'_, F, B> {
        VoltageScaling::new(&mut self.bus)
    }

    /// Position of the profile state machine. `Idle` outside [`apply`](Self::apply).
    pub fn apply_state(&self) -> ApplyState {
        self.apply_state
    }

    pub fn frequencies(&self) -> &'s FrequencyState {
        self.state
    }

    /// External clocks assumed for frequency calculations. Replaced by the
    /// board of every successfully applied profile.
    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn bus(&mut self) -> &mut B {
        &mut self.bus
    }

    pub fn release(self) -> B {
        self.bus
    }

    /// Decodes the frequencies the hardware runs at right now.
    ///
    /// `None` if the system clock depends on an external clock the board
    /// description does not give a frequency for.
    pub fn read_clocks(&mut self) -> Option<Clocks> {
        let source = switch::current_source::<F, B>(&mut self.bus);
        let sysclk = match crate::family::pll_of::<F>(source) {
            Some(_) => pll::programmed_freq::<F, B>(&mut self.bus, &self.board, source)?,
            None => osc::raw_freq::<F>(source, &self.board)?,
        };
        let p = prescaler::read::<F, B>(&mut self.bus);
        let ahb = sysclk / p.ahb;
        Some(Clocks {
            sysclk,
            ahb,
            apb1: ahb / p.apb1,
            apb2: ahb / p.apb2,
        })
    }

    /// Publishes [`read_clocks`](Self::read_clocks), for trees set up by a
    /// bootloader or by direct use of the views.
    pub fn resync(&mut self) -> Result<Clocks, ClockFault> {
        let source = switch::current_source::<F, B>(&mut self.bus);
        let clocks = self
            .read_clocks()
            .ok_or(ConfigError::MissingExternalClock(F::oscillator(source).name))?;
        self.state.publish(clocks);
        Ok(clocks)
    }

    /// Routes `source` to the RTC. Refused once a different source is
    /// selected; see [`backup_domain_reset`](Self::backup_domain_reset).
    pub fn set_rtc_source(&mut self, source: F::Osc) -> Result<(), ClockFault> {
        backup::set_rtc_source::<F, B>(&mut self.bus, source)
    }

    pub fn rtc_source(&mut self) -> Option<F::Osc> {
        backup::rtc_source::<F, B>(&mut self.bus)
    }

    /// Resets the backup domain: RTC source selection, RTC registers and LSE.
    pub fn backup_domain_reset(&mut self) -> Result<(), ClockFault> {
        backup::reset::<F, B>(&mut self.bus)
    }

    /// Enables the clock of peripheral `T`.
    pub fn enable<T: ClockGate<F>>(&mut self) {
        critical_section::with(|cs| periph::enable_with_cs::<F, T, B>(&mut self.bus, cs));
    }

    /// Enables the clock of peripheral `T` and pulses its reset.
    pub fn enable_and_reset<T: ClockGate<F>>(&mut self) {
        critical_section::with(|cs| {
            periph::enable_with_cs::<F, T, B>(&mut self.bus, cs);
            periph::reset_with_cs::<F, T, B>(&mut self.bus, cs);
        });
    }

    /// Disables the clock of peripheral `T`.
    pub fn disable<T: ClockGate<F>>(&mut self) {
        critical_section::with(|cs| periph::disable_with_cs::<F, T, B>(&mut self.bus, cs));
    }

    /// Pulses the reset of peripheral `T`.
    pub fn reset<T: ClockGate<F>>(&mut self) {
        critical_section::with(|cs| periph::reset_with_cs::<F, T, B>(&mut self.bus, cs));
    }

    pub fn is_enabled<T: ClockGate<F>>(&mut self) -> bool {
        self.bus.is_set(<T as periph::SealedClockGate<F>>::ENABLE)
    }
}

#[cfg(test)]
mod tests;
