//! PLL configuration, including PLLs fed by other PLLs.

use core::marker::PhantomData;

use super::bus::RegisterBus;
use super::error::{ClockFault, ConfigError};
use super::osc;
use super::profile::Board;
use super::wait::Timeout;
use crate::family::{self, Family, PllInputSpec, PllSpec};
use crate::time::Hertz;

/// What feeds a PLL.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PllInput<F: Family> {
    /// A crystal or RC oscillator.
    Osc(F::Osc),
    /// The output of another PLL.
    Pll(F::Pll),
}

impl<F: Family> PllInput<F> {
    pub fn name(self) -> &'static str {
        match self {
            PllInput::Osc(o) => F::oscillator(o).name,
            PllInput::Pll(p) => family::pll_name::<F>(p),
        }
    }

    /// The oscillator identity of the input signal.
    pub fn osc(self) -> F::Osc {
        match self {
            PllInput::Osc(o) => o,
            PllInput::Pll(p) => F::pll(p).osc,
        }
    }
}

/// PLL parameters. Divider and multiplier values are the real ratios, not
/// register encodings; `1` means "no division".
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct PllConfig<F: Family> {
    pub input: PllInput<F>,
    pub prediv: u8,
    pub mul: u8,
    pub postdiv: u8,
}

impl<F: Family> PllConfig<F> {
    pub const fn new(input: PllInput<F>, mul: u8) -> Self {
        Self {
            input,
            prediv: 1,
            mul,
            postdiv: 1,
        }
    }

    pub const fn with_prediv(mut self, prediv: u8) -> Self {
        self.prediv = prediv;
        self
    }

    pub const fn with_postdiv(mut self, postdiv: u8) -> Self {
        self.postdiv = postdiv;
        self
    }
}

/// Frequencies along one PLL.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct PllFreqs {
    /// After the pre-divider.
    pub input: Hertz,
    pub vco: Hertz,
    pub output: Hertz,
}

/// Register values for a [`PllConfig`], checked against the family tables.
pub(crate) struct Encoded<F: Family> {
    pub input: &'static PllInputSpec<F>,
    pub prediv: Option<u32>,
    pub mul: u32,
    pub postdiv: Option<u32>,
}

fn out_of_range(what: &'static str, value: u8) -> ConfigError {
    ConfigError::ValueOutOfRange { what, value: value as u32 }
}

pub(crate) fn encode<F: Family>(pll: F::Pll, config: &PllConfig<F>) -> Result<Encoded<F>, ConfigError> {
    let spec = F::pll(pll);
    let input = spec
        .inputs
        .iter()
        .find(|i| i.input == config.input)
        .ok_or(ConfigError::NotPllInput(config.input.name()))?;

    let prediv = match (input.fixed_prediv, spec.prediv) {
        (Some(_), _) | (None, None) => {
            if config.prediv != 1 {
                return Err(out_of_range("PLL pre-divider", config.prediv));
            }
            None
        }
        (None, Some(knob)) => Some(knob.encode(config.prediv).ok_or(out_of_range(knob.name, config.prediv))?),
    };
    let mul = spec.mul.encode(config.mul).ok_or(out_of_range(spec.mul.name, config.mul))?;
    let postdiv = match spec.postdiv {
        Some(knob) => Some(knob.encode(config.postdiv).ok_or(out_of_range(knob.name, config.postdiv))?),
        None if config.postdiv == 1 => None,
        None => return Err(out_of_range("PLL post-divider", config.postdiv)),
    };
    Ok(Encoded { input, prediv, mul, postdiv })
}

fn check_range(what: &'static str, freq: Hertz, (min, max): (Hertz, Hertz)) -> Result<(), ConfigError> {
    if freq < min || freq > max {
        return Err(ConfigError::FrequencyOutOfRange { what, freq, min, max });
    }
    Ok(())
}

/// A frequency kept as an exact fraction of hertz along a PLL chain.
///
/// Pre-dividers need not divide their input evenly; truncating at every stage
/// would publish frequencies the hardware is not running.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) struct Ratio {
    num: u64,
    den: u64,
}

impl Ratio {
    pub(crate) const fn hz(freq: Hertz) -> Self {
        Self {
            num: freq.0 as u64,
            den: 1,
        }
    }

    /// `self * mul / div`, reduced.
    pub(crate) fn scale(self, mul: u32, div: u32) -> Self {
        let num = self.num * mul as u64;
        let den = self.den * div.max(1) as u64;
        let g = gcd(num, den);
        Self { num: num / g, den: den / g }
    }

    /// Rounded down to whole hertz.
    pub(crate) fn to_hertz(self) -> Hertz {
        Hertz(u32::try_from(self.num / self.den).unwrap_or(u32::MAX))
    }
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// Frequencies of `pll` running `config` from an input at `source`, with
/// every documented range checked. Also returns the exact output.
pub(crate) fn frequencies<F: Family>(
    pll: F::Pll,
    config: &PllConfig<F>,
    source: Ratio,
) -> Result<(PllFreqs, Ratio), ConfigError> {
    let spec: &PllSpec<F> = F::pll(pll);
    let encoded = encode::<F>(pll, config)?;
    let prediv = encoded.input.fixed_prediv.unwrap_or(config.prediv) as u32;
    let input = source.scale(1, prediv);
    check_range("PLL input", input.to_hertz(), spec.input_range)?;
    let vco = input.scale(config.mul as u32, 1);
    let output = vco.scale(1, config.postdiv as u32);
    check_range(family::pll_name::<F>(pll), output.to_hertz(), spec.output_range)?;
    let freqs = PllFreqs {
        input: input.to_hertz(),
        vco: vco.to_hertz(),
        output: output.to_hertz(),
    };
    Ok((freqs, output))
}

/// The PLL input routed by the selector fields, if any input matches.
pub(crate) fn read_input<F: Family, B: RegisterBus>(bus: &mut B, pll: F::Pll) -> Option<PllInput<F>> {
    F::pll(pll)
        .inputs
        .iter()
        .find(|i| i.select.iter().all(|&(field, value)| bus.read_field(field) == value))
        .map(|i| i.input)
}

/// Decodes the configuration currently programmed for `pll`.
pub(crate) fn read_config<F: Family, B: RegisterBus>(bus: &mut B, pll: F::Pll) -> Option<PllConfig<F>> {
    let spec = F::pll(pll);
    let input = read_input::<F, B>(bus, pll)?;
    let input_spec = spec.inputs.iter().find(|i| i.input == input)?;
    let prediv = match (input_spec.fixed_prediv, spec.prediv) {
        (None, Some(knob)) => knob.encoding.decode(bus.read_field(knob.field))?,
        _ => 1,
    };
    let mul = spec.mul.encoding.decode(bus.read_field(spec.mul.field))?;
    let postdiv = match spec.postdiv {
        Some(knob) => knob.encoding.decode(bus.read_field(knob.field))?,
        None => 1,
    };
    Some(PllConfig { input, prediv, mul, postdiv })
}

/// Output frequency of `osc` as currently programmed in hardware, whether it
/// is running or not.
pub(crate) fn programmed_freq<F: Family, B: RegisterBus>(bus: &mut B, board: &Board, osc: F::Osc) -> Option<Hertz> {
    programmed_ratio::<F, B>(bus, board, osc).map(Ratio::to_hertz)
}

pub(crate) fn programmed_ratio<F: Family, B: RegisterBus>(bus: &mut B, board: &Board, osc: F::Osc) -> Option<Ratio> {
    let mut chain = [None; family::MAX_PLLS];
    let mut cur = osc;
    let mut depth = 0;
    // Walk down to a raw oscillator, then multiply back up.
    let base = loop {
        let Some(pll) = family::pll_of::<F>(cur) else {
            break osc::raw_freq::<F>(cur, board)?;
        };
        if depth == chain.len() {
            return None;
        }
        let config = read_config::<F, B>(bus, pll)?;
        chain[depth] = Some((pll, config));
        depth += 1;
        cur = config.input.osc();
    };
    let mut freq = Ratio::hz(base);
    for &(pll, config) in chain[..depth].iter().rev().flatten() {
        let spec = F::pll(pll);
        let fixed = spec.inputs.iter().find(|i| i.input == config.input).and_then(|i| i.fixed_prediv);
        let prediv = fixed.unwrap_or(config.prediv) as u32;
        freq = freq.scale(config.mul as u32, prediv * config.postdiv as u32);
    }
    Some(freq)
}

/// Enabled PLLs other than `pll` that share its pre-divider and hold a
/// different value in it than `config` needs.
pub(crate) fn prediv_conflicts<F: Family, B: RegisterBus>(
    bus: &mut B,
    pll: F::Pll,
    config: &PllConfig<F>,
) -> Result<[Option<F::Pll>; family::MAX_PLLS], ConfigError> {
    let mut found = [None; family::MAX_PLLS];
    let encoded = encode::<F>(pll, config)?;
    let (Some(knob), Some(raw)) = (F::pll(pll).prediv, encoded.prediv) else {
        return Ok(found);
    };
    if bus.read_field(knob.field) == raw {
        return Ok(found);
    }
    for (slot, &other) in found.iter_mut().zip(F::PLLS.iter()) {
        if other != pll
            && F::pll(other).prediv.map(|k| k.field) == Some(knob.field)
            && osc::is_enabled::<F, B>(bus, F::pll(other).osc)
        {
            *slot = Some(other);
        }
    }
    Ok(found)
}

/// Enabled PLLs whose input is `pll`'s output.
pub(crate) fn dependents<F: Family, B: RegisterBus>(bus: &mut B, pll: F::Pll) -> [Option<F::Pll>; family::MAX_PLLS] {
    let mut found = [None; family::MAX_PLLS];
    for (slot, &p) in found.iter_mut().zip(F::PLLS.iter()) {
        if p != pll
            && osc::is_enabled::<F, B>(bus, F::pll(p).osc)
            && read_input::<F, B>(bus, p) == Some(PllInput::Pll(pll))
        {
            *slot = Some(p);
        }
    }
    found
}

pub(crate) fn configure<F: Family, B: RegisterBus>(
    bus: &mut B,
    board: &Board,
    pll: F::Pll,
    config: &PllConfig<F>,
) -> Result<(), ClockFault> {
    let spec = F::pll(pll);
    let name = family::pll_name::<F>(pll);
    if osc::is_enabled::<F, B>(bus, spec.osc) {
        return Err(ClockFault::ConfigWhileEnabled(name));
    }
    let encoded = encode::<F>(pll, config)?;

    let source = match config.input {
        PllInput::Osc(o) => Ratio::hz(
            osc::raw_freq::<F>(o, board).ok_or(ConfigError::MissingExternalClock(F::oscillator(o).name))?,
        ),
        PllInput::Pll(up) => {
            let up_osc = F::pll(up).osc;
            if !osc::is_ready::<F, B>(bus, up_osc) {
                return Err(ClockFault::UpstreamNotReady(family::pll_name::<F>(up)));
            }
            programmed_ratio::<F, B>(bus, board, up_osc).ok_or(ClockFault::UpstreamNotReady(family::pll_name::<F>(up)))?
        }
    };
    frequencies::<F>(pll, config, source)?;

    if prediv_conflicts::<F, B>(bus, pll, config)?.iter().any(Option::is_some) {
        let name = spec.prediv.map_or("PLL pre-divider", |k| k.name);
        return Err(ConfigError::SharedDividerConflict(name).into());
    }

    trace!(
        "rcc: configure {} from {} /{} x{} /{}",
        name,
        config.input.name(),
        config.prediv,
        config.mul,
        config.postdiv
    );
    for &(field, value) in encoded.input.select {
        bus.write_field(field, value);
    }
    if let (Some(knob), Some(raw)) = (spec.prediv, encoded.prediv) {
        bus.write_field(knob.field, raw);
    }
    bus.write_field(spec.mul.field, encoded.mul);
    if let (Some(knob), Some(raw)) = (spec.postdiv, encoded.postdiv) {
        bus.write_field(knob.field, raw);
    }
    Ok(())
}

/// PLL control.
pub struct PllConfigurator<'a, F: Family, B: RegisterBus> {
    bus: &'a mut B,
    board: Board,
    _family: PhantomData<F>,
}

impl<'a, F: Family, B: RegisterBus> PllConfigurator<'a, F, B> {
    pub(crate) fn new(bus: &'a mut B, board: Board) -> Self {
        Self {
            bus,
            board,
            _family: PhantomData,
        }
    }

    /// Programs input selection, dividers and multiplier.
    ///
    /// Only while the PLL is disabled. Values the hardware cannot encode and
    /// frequencies outside the documented ranges are rejected before any
    /// register is touched.
    pub fn configure(&mut self, pll: F::Pll, config: &PllConfig<F>) -> Result<(), ClockFault> {
        configure::<F, B>(self.bus, &self.board, pll, config)
    }

    pub fn enable(&mut self, pll: F::Pll) {
        osc::enable::<F, B>(self.bus, F::pll(pll).osc);
    }

    /// Refused while the PLL drives the system clock.
    pub fn disable(&mut self, pll: F::Pll) -> Result<(), ClockFault> {
        let o = F::pll(pll).osc;
        if osc::drives_sysclk::<F, B>(self.bus, o) {
            return Err(ClockFault::SourceInUse(family::pll_name::<F>(pll)));
        }
        osc::disable_unchecked::<F, B>(self.bus, o);
        Ok(())
    }

    pub fn is_enabled(&mut self, pll: F::Pll) -> bool {
        osc::is_enabled::<F, B>(self.bus, F::pll(pll).osc)
    }

    pub fn is_locked(&mut self, pll: F::Pll) -> bool {
        osc::is_ready::<F, B>(self.bus, F::pll(pll).osc)
    }

    pub fn wait_ready<T: Timeout + ?Sized>(&mut self, pll: F::Pll, timeout: &mut T) -> Result<(), ClockFault> {
        osc::wait_ready::<F, B, T>(self.bus, F::pll(pll).osc, timeout)
    }

    /// The configuration currently in the registers.
    pub fn config(&mut self, pll: F::Pll) -> Option<PllConfig<F>> {
        read_config::<F, B>(self.bus, pll)
    }

    /// Output frequency of the programmed configuration.
    pub fn output_frequency(&mut self, pll: F::Pll) -> Option<Hertz> {
        programmed_freq::<F, B>(self.bus, &self.board, F::pll(pll).osc)
    }
}
