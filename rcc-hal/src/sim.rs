//! Host-side RCC register simulator.
//!
//! [`SimBus`] behaves like the clock controller of a [`Family`] closely
//! enough to exercise every sequence in [`crate::rcc`]: oscillators report
//! ready some polls after being enabled, PLLs lock only while their input
//! runs, the switch status follows the selector once the selected source is
//! ready, the regulator is busy for a while after a range change and
//! backup-domain bits ignore writes while write-protected.
//!
//! Every register access advances a shared [`SimClock`] by one microsecond,
//! which [`SimDeadline`] measures against.

use std::cell::Cell;
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use crate::family::{self, Family, MAX_OSCILLATORS};
use crate::rcc::bus::{Field, Reg, RegisterBus};
use crate::rcc::voltage::VoltageScale;
use crate::rcc::Timeout;

/// Simulated time in microseconds, shared between a bus and its deadlines.
#[derive(Clone, Debug, Default)]
pub struct SimClock(Rc<Cell<u64>>);

impl SimClock {
    pub fn now_us(&self) -> u64 {
        self.0.get()
    }

    pub fn advance(&self, us: u64) {
        self.0.set(self.0.get() + us);
    }
}

/// A per-wait budget in simulated time.
#[derive(Clone, Debug)]
pub struct SimDeadline {
    clock: SimClock,
    budget_us: u64,
    started: u64,
}

impl SimDeadline {
    pub fn new(clock: SimClock, budget_us: u64) -> Self {
        let started = clock.now_us();
        Self {
            clock,
            budget_us,
            started,
        }
    }

    pub fn from_millis(clock: SimClock, ms: u64) -> Self {
        Self::new(clock, ms * 1_000)
    }
}

impl Timeout for SimDeadline {
    fn start(&mut self) {
        self.started = self.clock.now_us();
    }

    fn expired(&mut self) -> bool {
        self.clock.now_us() - self.started > self.budget_us
    }
}

/// One store as seen by the simulated peripheral.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Write {
    pub reg: Reg,
    pub old: u32,
    pub new: u32,
}

impl Write {
    /// This store changed `field`.
    pub fn touches(&self, field: Field) -> bool {
        self.reg == field.reg && field.extract(self.old) != field.extract(self.new)
    }

    /// This store changed `field` to `value`.
    pub fn sets(&self, field: Field, value: u32) -> bool {
        self.touches(field) && field.extract(self.new) == value
    }
}

impl fmt::Display for Write {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:#010x}] {:#010x} -> {:#010x}", self.reg.0, self.old, self.new)
    }
}

/// Default number of polls an oscillator or PLL takes to become ready.
pub const DEFAULT_STARTUP: u32 = 16;
/// Default number of polls the regulator stays busy after a range change.
pub const DEFAULT_REGULATOR_DELAY: u32 = 8;

/// Simulated clock controller of family `F`, in its reset state.
pub struct SimBus<F: Family> {
    regs: BTreeMap<u32, u32>,
    writes: Vec<Write>,
    clock: SimClock,
    startup: u32,
    regulator_delay: u32,
    starting: [Option<u32>; MAX_OSCILLATORS],
    regulator_busy: u32,
    dead: u32,
    frozen: bool,
    _family: PhantomData<F>,
}

impl<F: Family> SimBus<F> {
    pub fn new() -> Self {
        let mut bus = Self {
            regs: BTreeMap::new(),
            writes: Vec::new(),
            clock: SimClock::default(),
            startup: DEFAULT_STARTUP,
            regulator_delay: DEFAULT_REGULATOR_DELAY,
            starting: [None; MAX_OSCILLATORS],
            regulator_busy: 0,
            dead: 0,
            frozen: false,
            _family: PhantomData,
        };
        let safe = F::oscillator(F::SAFE_SOURCE);
        bus.poke(safe.enable, 1);
        bus.poke(safe.ready, 1);
        if let Some(code) = family::sysclk_code::<F>(F::SAFE_SOURCE) {
            bus.poke(F::SW, code);
            bus.poke(F::SWS, code);
        }
        if let Some(reg) = F::REGULATOR {
            bus.poke(reg.select, F::RESET_SCALE.to_bits());
        }
        bus
    }

    /// Polls an oscillator needs to report ready.
    pub fn with_startup(mut self, polls: u32) -> Self {
        self.startup = polls;
        self
    }

    pub fn with_regulator_delay(mut self, polls: u32) -> Self {
        self.regulator_delay = polls;
        self
    }

    pub fn clock(&self) -> SimClock {
        self.clock.clone()
    }

    /// `osc` never becomes ready again, and stops reporting ready now.
    pub fn kill(&mut self, osc: F::Osc) {
        self.dead |= 1 << family::osc_index::<F>(osc);
    }

    pub fn revive(&mut self, osc: F::Osc) {
        self.dead &= !(1 << family::osc_index::<F>(osc));
    }

    /// Stops the switch status from following the selector.
    pub fn freeze_switch(&mut self, frozen: bool) {
        self.frozen = frozen;
    }

    pub fn writes(&self) -> &[Write] {
        &self.writes
    }

    pub fn clear_writes(&mut self) {
        self.writes.clear();
    }

    /// Index of the first store that changed `field` to `value`.
    pub fn position(&self, field: Field, value: u32) -> Option<usize> {
        self.writes.iter().position(|w| w.sets(field, value))
    }

    /// Index of the last store that changed anything in `field`.
    pub fn last_touch(&self, field: Field) -> Option<usize> {
        self.writes.iter().rposition(|w| w.touches(field))
    }

    /// Reads a register without advancing time.
    pub fn peek(&self, reg: Reg) -> u32 {
        self.regs.get(&reg.0).copied().unwrap_or(0)
    }

    pub fn peek_field(&self, field: Field) -> u32 {
        field.extract(self.peek(field.reg))
    }

    /// Forces a field, bypassing protection and the write log.
    pub fn poke(&mut self, field: Field, value: u32) {
        let word = field.insert(self.peek(field.reg), value);
        self.regs.insert(field.reg.0, word);
    }

    fn is_dead(&self, index: usize) -> bool {
        self.dead & (1 << index) != 0
    }

    fn pll_input_ready(&self, p: F::Pll) -> bool {
        F::pll(p)
            .inputs
            .iter()
            .find(|i| i.select.iter().all(|&(field, value)| self.peek_field(field) == value))
            .is_some_and(|i| self.peek_field(F::oscillator(i.input.osc()).ready) != 0)
    }

    fn tick(&mut self) {
        self.clock.advance(1);

        for (i, &o) in F::OSCILLATORS.iter().enumerate() {
            let spec = F::oscillator(o);
            if self.peek_field(spec.enable) == 0 || self.is_dead(i) {
                self.poke(spec.ready, 0);
                self.starting[i] = None;
                continue;
            }
            if self.peek_field(spec.ready) != 0 {
                continue;
            }
            if let Some(p) = family::pll_of::<F>(o) {
                if !self.pll_input_ready(p) {
                    self.starting[i] = None;
                    continue;
                }
            }
            let left = self.starting[i].get_or_insert(self.startup);
            if *left == 0 {
                self.starting[i] = None;
                self.poke(spec.ready, 1);
            } else {
                *left -= 1;
            }
        }

        if !self.frozen {
            let code = self.peek_field(F::SW);
            let source = F::SYSCLK_SOURCES.iter().find(|(_, c)| *c == code).map(|(o, _)| *o);
            if source.is_some_and(|o| self.peek_field(F::oscillator(o).ready) != 0) {
                self.poke(F::SWS, code);
            }
        }

        if let Some(reg) = F::REGULATOR {
            let busy = self.regulator_busy > 0;
            self.regulator_busy = self.regulator_busy.saturating_sub(1);
            self.poke(reg.busy, busy as u32);
        }
    }

    /// Bits of `reg` only the hardware sets.
    fn read_only(&self, reg: Reg) -> u32 {
        F::OSCILLATORS
            .iter()
            .map(|&o| F::oscillator(o).ready)
            .chain(core::iter::once(F::SWS))
            .chain(F::REGULATOR.map(|r| r.busy))
            .filter(|f| f.reg == reg)
            .fold(0, |m, f| m | f.mask())
    }

    /// Bits of `reg` behind backup domain write protection.
    fn protected(&self, reg: Reg) -> u32 {
        let rtc = F::RTC.into_iter().flat_map(|r| [r.select, r.enable, r.reset]);
        let osc = F::OSCILLATORS
            .iter()
            .map(|&o| F::oscillator(o))
            .filter(|s| s.backup_domain)
            .flat_map(|s| core::iter::once(s.enable).chain(s.bypass));
        rtc.chain(osc).filter(|f| f.reg == reg).fold(0, |m, f| m | f.mask())
    }

    fn backup_reset(&mut self) {
        if let Some(rtc) = F::RTC {
            self.poke(rtc.select, 0);
            self.poke(rtc.enable, 0);
        }
        for &o in F::OSCILLATORS {
            let spec = F::oscillator(o);
            if spec.backup_domain {
                self.poke(spec.enable, 0);
                self.poke(spec.ready, 0);
                if let Some(bypass) = spec.bypass {
                    self.poke(bypass, 0);
                }
            }
        }
    }
}

impl<F: Family> Default for SimBus<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: Family> RegisterBus for SimBus<F> {
    fn read(&mut self, reg: Reg) -> u32 {
        self.tick();
        self.peek(reg)
    }

    fn write(&mut self, reg: Reg, value: u32) {
        self.clock.advance(1);
        let old = self.peek(reg);
        let mut keep = self.read_only(reg);
        if self.peek_field(F::BACKUP_DOMAIN.unlock) == 0 {
            keep |= self.protected(reg);
        }
        let new = (value & !keep) | (old & keep);
        self.regs.insert(reg.0, new);
        self.writes.push(Write { reg, old, new });

        if let Some(r) = F::REGULATOR {
            if r.select.reg == reg && r.select.extract(old) != r.select.extract(new) {
                self.regulator_busy = self.regulator_delay;
                self.poke(r.busy, 1);
            }
        }
        if let Some(rtc) = F::RTC {
            if rtc.reset.reg == reg && rtc.reset.extract(new) != 0 {
                self.backup_reset();
            }
        }
    }
}
