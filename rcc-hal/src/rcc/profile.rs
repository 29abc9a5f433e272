//! Validated clock profiles.

use super::error::{Bus, ClockFault, ConfigError, InvariantViolation};
use super::osc;
use super::pll::{self, PllConfig, PllInput, Ratio};
use super::prescaler::{AhbPrescaler, ApbPrescaler, Prescalers};
use super::state::Clocks;
use super::voltage::{ScaleLimits, VoltageScale};
use crate::family::{self, Family, OscKind, MAX_PLLS};
use crate::time::Hertz;

/// An external clock wired to the chip.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ExternalClock {
    pub freq: Hertz,
    /// Driven by an external oscillator instead of a crystal.
    pub bypass: bool,
}

impl ExternalClock {
    pub const fn crystal(freq: Hertz) -> Self {
        Self { freq, bypass: false }
    }

    pub const fn bypass(freq: Hertz) -> Self {
        Self { freq, bypass: true }
    }
}

/// External clocks fitted on the board.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Board {
    /// High-speed external clock.
    pub hse: Option<ExternalClock>,
    /// Low-speed external clock (32.768 kHz).
    pub lse: Option<ExternalClock>,
}

impl Board {
    pub const fn new() -> Self {
        Self { hse: None, lse: None }
    }

    pub const fn with_hse(mut self, hse: ExternalClock) -> Self {
        self.hse = Some(hse);
        self
    }

    pub const fn with_lse(mut self, lse: ExternalClock) -> Self {
        self.lse = Some(lse);
        self
    }

    pub(crate) fn external(&self, slot: family::ExternalSlot) -> Option<ExternalClock> {
        match slot {
            family::ExternalSlot::High => self.hse,
            family::ExternalSlot::Low => self.lse,
        }
    }
}

/// PLL configurations keyed by the family's PLL order.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct PllSet<F: Family> {
    slots: [Option<PllConfig<F>>; MAX_PLLS],
}

impl<F: Family> PllSet<F> {
    pub const fn new() -> Self {
        Self { slots: [None; MAX_PLLS] }
    }

    pub fn get(&self, pll: F::Pll) -> Option<&PllConfig<F>> {
        self.slots[family::pll_index::<F>(pll)].as_ref()
    }

    pub fn set(&mut self, pll: F::Pll, config: Option<PllConfig<F>>) {
        self.slots[family::pll_index::<F>(pll)] = config;
    }

    /// Configured PLLs, upstream first.
    pub fn iter(&self) -> impl Iterator<Item = (F::Pll, &PllConfig<F>)> + '_ {
        F::PLLS
            .iter()
            .zip(self.slots.iter())
            .filter_map(|(&p, c)| c.as_ref().map(|c| (p, c)))
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }
}

impl<F: Family> Default for PllSet<F> {
    fn default() -> Self {
        Self::new()
    }
}

/// A complete, validated clock tree description.
///
/// Only [`ProfileBuilder::build`] creates one, so every profile that exists
/// respects the family's divider encodings, PLL ranges and the limits of its
/// voltage scale.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ClockProfile<F: Family> {
    board: Board,
    source: F::Osc,
    plls: PllSet<F>,
    prescalers: Prescalers,
    scale: F::Scale,
    clocks: Clocks,
}

impl<F: Family> ClockProfile<F> {
    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn source(&self) -> F::Osc {
        self.source
    }

    pub fn plls(&self) -> &PllSet<F> {
        &self.plls
    }

    pub fn prescalers(&self) -> Prescalers {
        self.prescalers
    }

    pub fn scale(&self) -> F::Scale {
        self.scale
    }

    /// The frequencies this profile produces.
    pub fn clocks(&self) -> Clocks {
        self.clocks
    }
}

/// Builder for [`ClockProfile`].
///
/// ```rust,ignore
/// let profile = ProfileBuilder::<F1>::new(Board::new().with_hse(ExternalClock::crystal(mhz(8))))
///     .with_pll(F1Pll::Pll, PllConfig::new(PllInput::Osc(F1Osc::Hse), 9))
///     .with_source(F1Osc::Pll)
///     .with_apb1(ApbPrescaler::Div2)
///     .build()?;
/// ```
#[derive(Clone, Copy, Debug)]
pub struct ProfileBuilder<F: Family> {
    board: Board,
    source: F::Osc,
    plls: PllSet<F>,
    prescalers: Prescalers,
    scale: Option<F::Scale>,
}

impl<F: Family> ProfileBuilder<F> {
    /// Starts from the family's safe source with every bus undivided.
    pub const fn new(board: Board) -> Self {
        Self {
            board,
            source: F::SAFE_SOURCE,
            plls: PllSet::new(),
            prescalers: Prescalers::new(),
            scale: None,
        }
    }

    pub const fn with_source(mut self, source: F::Osc) -> Self {
        self.source = source;
        self
    }

    pub fn with_pll(mut self, pll: F::Pll, config: PllConfig<F>) -> Self {
        self.plls.set(pll, Some(config));
        self
    }

    pub const fn with_prescalers(mut self, prescalers: Prescalers) -> Self {
        self.prescalers = prescalers;
        self
    }

    pub const fn with_ahb(mut self, ahb: AhbPrescaler) -> Self {
        self.prescalers.ahb = ahb;
        self
    }

    pub const fn with_apb1(mut self, apb1: ApbPrescaler) -> Self {
        self.prescalers.apb1 = apb1;
        self
    }

    pub const fn with_apb2(mut self, apb2: ApbPrescaler) -> Self {
        self.prescalers.apb2 = apb2;
        self
    }

    /// Pins the voltage scale. Without it, `build` picks the lowest scale
    /// that fits the resulting frequencies.
    pub const fn with_scale(mut self, scale: F::Scale) -> Self {
        self.scale = Some(scale);
        self
    }

    pub fn build(self) -> Result<ClockProfile<F>, ClockFault> {
        let source_name = F::oscillator(self.source).name;
        if family::sysclk_code::<F>(self.source).is_none() {
            return Err(ConfigError::NotSystemClock(source_name).into());
        }

        let mut outputs = [None; MAX_PLLS];
        let mut max_vco = None;
        for (pll, config) in self.plls.iter() {
            let input = match config.input {
                PllInput::Osc(o) => Ratio::hz(self.raw_freq(o)?),
                PllInput::Pll(up) => outputs[family::pll_index::<F>(up)]
                    .ok_or(ConfigError::PllMissing(family::pll_name::<F>(up)))?,
            };
            let (freqs, exact) = pll::frequencies::<F>(pll, config, input)?;
            outputs[family::pll_index::<F>(pll)] = Some(exact);
            max_vco = max_vco.max(Some(freqs.vco));
        }
        self.check_shared_dividers()?;

        let sysclk = match family::pll_of::<F>(self.source) {
            Some(pll) => outputs[family::pll_index::<F>(pll)]
                .ok_or(ConfigError::PllMissing(source_name))?
                .to_hertz(),
            None => self.raw_freq(self.source)?,
        };
        let ahb = sysclk / self.prescalers.ahb;
        let clocks = Clocks {
            sysclk,
            ahb,
            apb1: ahb / self.prescalers.apb1,
            apb2: ahb / self.prescalers.apb2,
        };

        let uses_pll = !self.plls.is_empty();
        let scale = match self.scale {
            Some(scale) => {
                if let Some((bus, freq, limit)) = exceeds(F::limits(scale), &clocks, max_vco, uses_pll) {
                    return Err(over_limit::<F>(scale, bus, freq, limit, &clocks, max_vco, uses_pll));
                }
                scale
            }
            None => {
                let all = <F::Scale as VoltageScale>::ALL;
                match all
                    .iter()
                    .copied()
                    .find(|&s| exceeds(F::limits(s), &clocks, max_vco, uses_pll).is_none())
                {
                    Some(scale) => scale,
                    None => {
                        let top = all[all.len() - 1];
                        let (bus, freq, limit) =
                            exceeds(F::limits(top), &clocks, max_vco, uses_pll).unwrap_or((Bus::Sysclk, sysclk, sysclk));
                        return Err(over_limit::<F>(top, bus, freq, limit, &clocks, max_vco, uses_pll));
                    }
                }
            }
        };

        Ok(ClockProfile {
            board: self.board,
            source: self.source,
            plls: self.plls,
            prescalers: self.prescalers,
            scale,
            clocks,
        })
    }

    fn raw_freq(&self, o: F::Osc) -> Result<Hertz, ConfigError> {
        let spec = F::oscillator(o);
        let freq = osc::raw_freq::<F>(o, &self.board).ok_or(ConfigError::MissingExternalClock(spec.name))?;
        if let OscKind::External { min, max, .. } = spec.kind {
            if freq < min || freq > max {
                return Err(ConfigError::FrequencyOutOfRange {
                    what: spec.name,
                    freq,
                    min,
                    max,
                });
            }
        }
        Ok(freq)
    }

    fn check_shared_dividers(&self) -> Result<(), ConfigError> {
        for (a, ca) in self.plls.iter() {
            let Some(knob) = F::pll(a).prediv else { continue };
            for (b, cb) in self.plls.iter() {
                if a != b && F::pll(b).prediv.map(|k| k.field) == Some(knob.field) && ca.prediv != cb.prediv {
                    return Err(ConfigError::SharedDividerConflict(knob.name));
                }
            }
        }
        Ok(())
    }
}

/// The first limit `clocks` break, if any.
fn exceeds(limits: ScaleLimits, clocks: &Clocks, vco: Option<Hertz>, uses_pll: bool) -> Option<(Bus, Hertz, Hertz)> {
    if uses_pll && !limits.pll {
        return Some((Bus::Vco, vco.unwrap_or_default(), Hertz(0)));
    }
    let checks = [
        (Bus::Sysclk, clocks.sysclk, limits.sysclk),
        (Bus::Ahb, clocks.ahb, limits.ahb),
        (Bus::Apb1, clocks.apb1, limits.apb1),
        (Bus::Apb2, clocks.apb2, limits.apb2),
    ];
    if let Some(&hit) = checks.iter().find(|(_, freq, limit)| freq > limit) {
        return Some(hit);
    }
    match (vco, limits.vco) {
        (Some(v), Some(limit)) if v > limit => Some((Bus::Vco, v, limit)),
        _ => None,
    }
}

/// Classifies a limit broken at `scale`: a higher scale that would fit makes
/// it an invariant violation of the declared scale, otherwise the profile is
/// simply impossible.
fn over_limit<F: Family>(
    scale: F::Scale,
    bus: Bus,
    freq: Hertz,
    limit: Hertz,
    clocks: &Clocks,
    vco: Option<Hertz>,
    uses_pll: bool,
) -> ClockFault {
    let fits_higher = <F::Scale as VoltageScale>::ALL
        .iter()
        .any(|&s| s > scale && exceeds(F::limits(s), clocks, vco, uses_pll).is_none());
    let pll_blocked = uses_pll && !F::limits(scale).pll;
    match (fits_higher, pll_blocked) {
        (true, true) | (false, true) => InvariantViolation::PllNotAllowed { scale: scale.name() }.into(),
        (true, false) => InvariantViolation::ScaleTooLow {
            scale: scale.name(),
            bus,
            freq,
            limit,
        }
        .into(),
        (false, false) => ConfigError::BusOverLimit { bus, freq, limit }.into(),
    }
}
