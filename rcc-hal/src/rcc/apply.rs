//! Atomic clock profile application.
//!
//! A transition walks the tree from whatever the hardware runs now to a
//! target [`TreeState`] in an order that never runs a bus above the limit of
//! the voltage range in force:
//!
//! 1. start the oscillators the target needs
//! 2. raise the voltage range, if the target needs a higher one
//! 3. reprogram PLLs, upstream first, parking SYSCLK on the safe source when
//!    the PLL being changed drives it
//! 4. widen the bus dividers to the larger of old and new
//! 5. switch SYSCLK
//! 6. set the final bus dividers and stop PLLs the target range forbids
//! 7. lower the voltage range, if the target needs a lower one
//!
//! On failure the same walk runs back to a snapshot taken before the first
//! write.

use super::bus::RegisterBus;
use super::error::ClockFault;
use super::pll::{self, PllInput};
use super::profile::{Board, ClockProfile, PllSet};
use super::prescaler::{self, Prescalers};
use super::wait::Timeout;
use super::{osc, switch, voltage, Rcc};
use crate::family::{self, Family, OscKind, MAX_PLLS};

/// Where [`Rcc::apply`] currently is.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ApplyState {
    Idle,
    SourcingOscillator,
    ConfiguringPll,
    AdjustingPrescalers,
    AdjustingVoltage,
    Switching,
}

/// A clock tree either requested by a profile or captured from hardware.
#[derive(Clone, Copy, Debug)]
pub(crate) struct TreeState<F: Family> {
    source: F::Osc,
    plls: PllSet<F>,
    prescalers: Prescalers,
    scale: F::Scale,
    board: Board,
    /// Bypass setting per oscillator index, where one is required.
    bypass: [Option<bool>; family::MAX_OSCILLATORS],
    /// For snapshots: oscillators that were running. Anything else the
    /// transition started is stopped again.
    running: Option<u32>,
}

impl<F: Family> TreeState<F> {
    pub(crate) fn from_profile(profile: &ClockProfile<F>) -> Self {
        let board = *profile.board();
        let mut bypass = [None; family::MAX_OSCILLATORS];
        for (i, &o) in F::OSCILLATORS.iter().enumerate() {
            if let OscKind::External { slot, .. } = F::oscillator(o).kind {
                bypass[i] = board.external(slot).map(|c| c.bypass);
            }
        }
        Self {
            source: profile.source(),
            plls: *profile.plls(),
            prescalers: profile.prescalers(),
            scale: profile.scale(),
            board,
            bypass,
            running: None,
        }
    }

    fn roots(&self) -> impl Iterator<Item = F::Osc> + '_ {
        let source = family::pll_of::<F>(self.source).is_none().then_some(self.source);
        source.into_iter().chain(self.plls.iter().filter_map(|(_, c)| match c.input {
            PllInput::Osc(o) => Some(o),
            PllInput::Pll(_) => None,
        }))
    }

    fn keeps(&self, osc: F::Osc) -> bool {
        match self.running {
            Some(mask) => mask & (1 << family::osc_index::<F>(osc)) != 0,
            None => true,
        }
    }
}

impl<'s, F: Family, B: RegisterBus> Rcc<'s, F, B> {
    /// Drives the hardware to `profile` and publishes its frequencies.
    ///
    /// Either the whole profile takes effect, or the clock tree is driven back
    /// to the state it had before the call and [`FrequencyState`] is left
    /// untouched. Re-applying the active profile writes no register.
    ///
    /// `timeout` bounds every individual hardware wait.
    ///
    /// [`FrequencyState`]: super::FrequencyState
    pub fn apply<T: Timeout + ?Sized>(&mut self, profile: &ClockProfile<F>, timeout: &mut T) -> Result<(), ClockFault> {
        let snapshot = self.capture();
        let target = TreeState::from_profile(profile);
        info!(
            "rcc: apply {} -> {} via {}",
            F::NAME,
            profile.clocks().sysclk,
            F::oscillator(profile.source()).name
        );

        match self.transition(&target, timeout) {
            Ok(()) => {
                self.board = target.board;
                self.state.publish(profile.clocks());
                Ok(())
            }
            Err(fault) => {
                warn!("rcc: apply failed: {}, restoring previous tree", fault);
                if let Err(restore) = self.transition(&snapshot, timeout) {
                    error!("rcc: restore failed: {}", restore);
                    self.enter(ApplyState::Idle);
                    // Never report frequencies the hardware is not running.
                    if let Some(clocks) = self.read_clocks() {
                        self.state.publish(clocks);
                    }
                }
                Err(fault)
            }
        }
    }

    /// Captures what the hardware runs now.
    pub(crate) fn capture(&mut self) -> TreeState<F> {
        let bus = &mut self.bus;
        let mut plls = PllSet::new();
        for &p in F::PLLS {
            if osc::is_enabled::<F, B>(bus, F::pll(p).osc) {
                plls.set(p, pll::read_config::<F, B>(bus, p));
            }
        }
        let mut bypass = [None; family::MAX_OSCILLATORS];
        let mut running = 0u32;
        for (i, &o) in F::OSCILLATORS.iter().enumerate() {
            if F::oscillator(o).bypass.is_some() {
                bypass[i] = Some(osc::bypass::<F, B>(bus, o));
            }
            if osc::is_enabled::<F, B>(bus, o) {
                running |= 1 << i;
            }
        }
        TreeState {
            source: switch::current_source::<F, B>(bus),
            plls,
            prescalers: prescaler::read::<F, B>(bus),
            scale: voltage::current_scale::<F, B>(bus),
            board: self.board,
            bypass,
            running: Some(running),
        }
    }

    fn enter(&mut self, state: ApplyState) {
        if self.apply_state != state {
            trace!("rcc: {:?} -> {:?}", self.apply_state, state);
            self.apply_state = state;
        }
    }

    pub(crate) fn transition<T: Timeout + ?Sized>(&mut self, target: &TreeState<F>, timeout: &mut T) -> Result<(), ClockFault> {
        self.enter(ApplyState::SourcingOscillator);
        for o in target.roots() {
            let bypass = target.bypass[family::osc_index::<F>(o)];
            self.start_oscillator(o, bypass, timeout)?;
        }

        let from_scale = voltage::current_scale::<F, B>(&mut self.bus);
        if target.scale > from_scale {
            self.enter(ApplyState::AdjustingVoltage);
            voltage::set_scale::<F, B, T>(&mut self.bus, target.scale, timeout)?;
        }

        self.enter(ApplyState::ConfiguringPll);
        for (p, config) in target.plls.iter() {
            self.program_pll(p, config, &target.board, timeout)?;
        }

        self.enter(ApplyState::AdjustingPrescalers);
        let from = prescaler::read::<F, B>(&mut self.bus);
        prescaler::write::<F, B>(&mut self.bus, from.bracket(target.prescalers));

        self.enter(ApplyState::Switching);
        switch::select_source::<F, B>(&mut self.bus, target.source)?;
        switch::wait_for_switch::<F, B, T>(&mut self.bus, target.source, timeout)?;

        self.enter(ApplyState::AdjustingPrescalers);
        prescaler::write::<F, B>(&mut self.bus, target.prescalers);
        self.stop_forbidden_plls(target, timeout)?;

        if target.scale < from_scale {
            self.enter(ApplyState::AdjustingVoltage);
            voltage::set_scale::<F, B, T>(&mut self.bus, target.scale, timeout)?;
        }

        if target.running.is_some() {
            self.prune(target, timeout)?;
        }
        self.enter(ApplyState::Idle);
        Ok(())
    }

    fn start_oscillator<T: Timeout + ?Sized>(&mut self, o: F::Osc, bypass: Option<bool>, timeout: &mut T) -> Result<(), ClockFault> {
        let bus = &mut self.bus;
        if let Some(on) = bypass {
            if F::oscillator(o).bypass.is_some() {
                osc::set_bypass::<F, B>(bus, o, on)?;
            }
        }
        osc::enable::<F, B>(bus, o);
        osc::wait_ready::<F, B, T>(bus, o, timeout)
    }

    /// Moves SYSCLK to the family's safe internal oscillator.
    fn park<T: Timeout + ?Sized>(&mut self, timeout: &mut T) -> Result<(), ClockFault> {
        debug!("rcc: parking sysclk on {}", F::oscillator(F::SAFE_SOURCE).name);
        self.start_oscillator(F::SAFE_SOURCE, None, timeout)?;
        switch::select_source::<F, B>(&mut self.bus, F::SAFE_SOURCE)?;
        switch::wait_for_switch::<F, B, T>(&mut self.bus, F::SAFE_SOURCE, timeout)
    }

    /// Stops `p` and every enabled PLL fed by it, downstream first.
    fn stop_pll<T: Timeout + ?Sized>(&mut self, p: F::Pll, timeout: &mut T, depth: usize) -> Result<(), ClockFault> {
        if depth < MAX_PLLS {
            for d in pll::dependents::<F, B>(&mut self.bus, p).into_iter().flatten() {
                self.stop_pll(d, timeout, depth + 1)?;
            }
        }
        let o = F::pll(p).osc;
        osc::disable_unchecked::<F, B>(&mut self.bus, o);
        osc::wait_stopped::<F, B, T>(&mut self.bus, o, timeout)
    }

    fn program_pll<T: Timeout + ?Sized>(
        &mut self,
        p: F::Pll,
        config: &pll::PllConfig<F>,
        board: &Board,
        timeout: &mut T,
    ) -> Result<(), ClockFault> {
        let o = F::pll(p).osc;
        if osc::is_enabled::<F, B>(&mut self.bus, o) && pll::read_config::<F, B>(&mut self.bus, p).as_ref() == Some(config) {
            return osc::wait_ready::<F, B, T>(&mut self.bus, o, timeout);
        }
        if osc::drives_sysclk::<F, B>(&mut self.bus, o) {
            self.park(timeout)?;
        }
        self.stop_pll(p, timeout, 0)?;
        // A running PLL holding a shared pre-divider at another value would
        // block the write. It is either reprogrammed later or not wanted.
        for other in pll::prediv_conflicts::<F, B>(&mut self.bus, p, config)?.into_iter().flatten() {
            debug!("rcc: stopping {} to free its pre-divider", family::pll_name::<F>(other));
            if osc::drives_sysclk::<F, B>(&mut self.bus, F::pll(other).osc) {
                self.park(timeout)?;
            }
            self.stop_pll(other, timeout, 0)?;
        }
        pll::configure::<F, B>(&mut self.bus, board, p, config)?;
        osc::enable::<F, B>(&mut self.bus, o);
        osc::wait_ready::<F, B, T>(&mut self.bus, o, timeout)
    }

    /// PLLs outside the target that the target voltage range cannot run.
    fn stop_forbidden_plls<T: Timeout + ?Sized>(&mut self, target: &TreeState<F>, timeout: &mut T) -> Result<(), ClockFault> {
        let limits = F::limits(target.scale);
        for &p in F::PLLS.iter().rev() {
            let o = F::pll(p).osc;
            if target.plls.get(p).is_some() || !osc::is_enabled::<F, B>(&mut self.bus, o) {
                continue;
            }
            let too_fast = match (limits.vco, pll::read_config::<F, B>(&mut self.bus, p)) {
                (Some(max), Some(config)) => pll::programmed_ratio::<F, B>(&mut self.bus, &target.board, o)
                    .is_some_and(|out| out.scale(config.postdiv as u32, 1).to_hertz() > max),
                _ => false,
            };
            if !limits.pll || too_fast {
                debug!("rcc: stopping {} for voltage scale", family::pll_name::<F>(p));
                self.stop_pll(p, timeout, 0)?;
            }
        }
        Ok(())
    }

    /// Stops whatever the transition started that the snapshot did not run.
    fn prune<T: Timeout + ?Sized>(&mut self, target: &TreeState<F>, timeout: &mut T) -> Result<(), ClockFault> {
        for &p in F::PLLS.iter().rev() {
            let o = F::pll(p).osc;
            if !target.keeps(o) && osc::is_enabled::<F, B>(&mut self.bus, o) {
                self.stop_pll(p, timeout, 0)?;
            }
        }
        for &o in F::OSCILLATORS {
            if target.keeps(o) || !osc::is_enabled::<F, B>(&mut self.bus, o) {
                continue;
            }
            if osc::drives_sysclk::<F, B>(&mut self.bus, o) {
                continue;
            }
            osc::disable_unchecked::<F, B>(&mut self.bus, o);
            osc::wait_stopped::<F, B, T>(&mut self.bus, o, timeout)?;
        }
        Ok(())
    }
}
