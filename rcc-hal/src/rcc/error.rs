use core::fmt;

use crate::time::Hertz;

/// A clock domain with a frequency limit.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Bus {
    Sysclk,
    Ahb,
    Apb1,
    Apb2,
    /// PLL voltage-controlled oscillator.
    Vco,
}

impl Bus {
    pub const fn name(self) -> &'static str {
        match self {
            Bus::Sysclk => "SYSCLK",
            Bus::Ahb => "AHB",
            Bus::Apb1 => "APB1",
            Bus::Apb2 => "APB2",
            Bus::Vco => "PLL VCO",
        }
    }
}

/// Rejected before any register is written.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// A divider or multiplier outside the set the hardware can encode.
    ValueOutOfRange { what: &'static str, value: u32 },
    /// A derived frequency outside the documented operating interval.
    FrequencyOutOfRange {
        what: &'static str,
        freq: Hertz,
        min: Hertz,
        max: Hertz,
    },
    /// No voltage scale can run this bus at this frequency.
    BusOverLimit { bus: Bus, freq: Hertz, limit: Hertz },
    /// The board description does not provide this external clock.
    MissingExternalClock(&'static str),
    NotSystemClock(&'static str),
    NotPllInput(&'static str),
    NotRtcSource(&'static str),
    NotBypassable(&'static str),
    /// A PLL is referenced but the profile does not configure it.
    PllMissing(&'static str),
    /// Two PLLs need different values in a divider they share.
    SharedDividerConflict(&'static str),
    /// The RTC already runs from another source; reset the backup domain first.
    RtcSourceLocked,
    NoClockSecurity,
    NoRtc,
}

/// A profile whose frequencies exceed what its declared voltage scale allows.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InvariantViolation {
    ScaleTooLow {
        scale: &'static str,
        bus: Bus,
        freq: Hertz,
        limit: Hertz,
    },
    PllNotAllowed { scale: &'static str },
}

/// A ready, lock or status flag never reached its expected value.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HardwareTimeout {
    Oscillator(&'static str),
    OscillatorStop(&'static str),
    PllLock(&'static str),
    Switch(&'static str),
    Voltage,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FaultKind {
    Configuration,
    HardwareTimeout,
    InvariantViolation,
}

/// Error returned by every fallible clock-tree operation.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockFault {
    Config(ConfigError),
    Invariant(InvariantViolation),
    Timeout(HardwareTimeout),
    /// Switching to an oscillator that is not reporting ready.
    SourceNotReady(&'static str),
    /// PLL parameters can only change while the PLL is off.
    ConfigWhileEnabled(&'static str),
    /// The oscillator drives the system clock, directly or through a PLL.
    SourceInUse(&'static str),
    /// A cascaded PLL's upstream PLL is not locked.
    UpstreamNotReady(&'static str),
}

impl ClockFault {
    pub const fn kind(&self) -> FaultKind {
        match self {
            ClockFault::Timeout(_) => FaultKind::HardwareTimeout,
            ClockFault::Invariant(_) => FaultKind::InvariantViolation,
            ClockFault::Config(_)
            | ClockFault::SourceNotReady(_)
            | ClockFault::ConfigWhileEnabled(_)
            | ClockFault::SourceInUse(_)
            | ClockFault::UpstreamNotReady(_) => FaultKind::Configuration,
        }
    }
}

impl From<ConfigError> for ClockFault {
    fn from(e: ConfigError) -> Self {
        ClockFault::Config(e)
    }
}

impl From<InvariantViolation> for ClockFault {
    fn from(e: InvariantViolation) -> Self {
        ClockFault::Invariant(e)
    }
}

impl From<HardwareTimeout> for ClockFault {
    fn from(e: HardwareTimeout) -> Self {
        ClockFault::Timeout(e)
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ValueOutOfRange { what, value } => {
                write!(f, "{} value {} is not supported", what, value)
            }
            ConfigError::FrequencyOutOfRange { what, freq, min, max } => {
                write!(f, "{} at {} is outside {}..={}", what, freq, min, max)
            }
            ConfigError::BusOverLimit { bus, freq, limit } => {
                write!(f, "{} at {} exceeds {}", bus.name(), freq, limit)
            }
            ConfigError::MissingExternalClock(name) => {
                write!(f, "board does not provide {}", name)
            }
            ConfigError::NotSystemClock(name) => write!(f, "{} cannot drive SYSCLK", name),
            ConfigError::NotPllInput(name) => write!(f, "{} cannot feed this PLL", name),
            ConfigError::NotRtcSource(name) => write!(f, "{} cannot clock the RTC", name),
            ConfigError::NotBypassable(name) => write!(f, "{} has no bypass mode", name),
            ConfigError::PllMissing(name) => write!(f, "{} is used but not configured", name),
            ConfigError::SharedDividerConflict(name) => {
                write!(f, "{} is shared and already set differently", name)
            }
            ConfigError::RtcSourceLocked => {
                f.write_str("RTC source already selected, reset the backup domain first")
            }
            ConfigError::NoClockSecurity => f.write_str("no clock security system"),
            ConfigError::NoRtc => f.write_str("no RTC clock selector"),
        }
    }
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvariantViolation::ScaleTooLow { scale, bus, freq, limit } => write!(
                f,
                "{} at {} exceeds {} limit of voltage scale {}",
                bus.name(),
                freq,
                limit,
                scale
            ),
            InvariantViolation::PllNotAllowed { scale } => {
                write!(f, "PLL is not available in voltage scale {}", scale)
            }
        }
    }
}

impl fmt::Display for HardwareTimeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HardwareTimeout::Oscillator(name) => write!(f, "{} did not become ready", name),
            HardwareTimeout::OscillatorStop(name) => write!(f, "{} did not stop", name),
            HardwareTimeout::PllLock(name) => write!(f, "{} did not lock", name),
            HardwareTimeout::Switch(name) => write!(f, "switch to {} not acknowledged", name),
            HardwareTimeout::Voltage => f.write_str("voltage regulator did not settle"),
        }
    }
}

impl fmt::Display for ClockFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClockFault::Config(e) => write!(f, "invalid clock configuration: {}", e),
            ClockFault::Invariant(e) => write!(f, "{}", e),
            ClockFault::Timeout(e) => write!(f, "timeout: {}", e),
            ClockFault::SourceNotReady(name) => write!(f, "{} is not ready", name),
            ClockFault::ConfigWhileEnabled(name) => {
                write!(f, "{} must be disabled to change its configuration", name)
            }
            ClockFault::SourceInUse(name) => write!(f, "{} drives the system clock", name),
            ClockFault::UpstreamNotReady(name) => write!(f, "upstream {} is not locked", name),
        }
    }
}

impl core::error::Error for ClockFault {}
