//! STM32L1 ultra-low-power line.
//!
//! Adds the multi-speed internal oscillator (MSI), which is also the reset
//! clock, and a core regulator with three ranges. Range 3 cannot run the PLL.

use super::{
    BackupDomainSpec, Encoding, ExternalSlot, Family, Knob, OscKind, OscSpec, PllInputSpec, PllSpec, RegulatorSpec,
    RtcSpec,
};
use crate::rcc::bus::Field;
use crate::rcc::pll::PllInput;
use crate::rcc::state::Clocks;
use crate::rcc::voltage::{ScaleLimits, VoltageScale};
use crate::time::Hertz;

pub(crate) mod regs {
    use crate::rcc::bus::{Field, Reg};

    pub const RCC: u32 = 0x4002_3800;
    pub const PWR: u32 = 0x4000_7000;

    pub const CR: Reg = Reg::at(RCC, 0x00);
    pub const CFGR: Reg = Reg::at(RCC, 0x08);
    pub const AHBRSTR: Reg = Reg::at(RCC, 0x10);
    pub const APB2RSTR: Reg = Reg::at(RCC, 0x14);
    pub const APB1RSTR: Reg = Reg::at(RCC, 0x18);
    pub const AHBENR: Reg = Reg::at(RCC, 0x1C);
    pub const APB2ENR: Reg = Reg::at(RCC, 0x20);
    pub const APB1ENR: Reg = Reg::at(RCC, 0x24);
    pub const CSR: Reg = Reg::at(RCC, 0x34);
    pub const PWR_CR: Reg = Reg::at(PWR, 0x00);
    pub const PWR_CSR: Reg = Reg::at(PWR, 0x04);

    pub const HSION: Field = Field::bit(CR, 0);
    pub const HSIRDY: Field = Field::bit(CR, 1);
    pub const MSION: Field = Field::bit(CR, 8);
    pub const MSIRDY: Field = Field::bit(CR, 9);
    pub const HSEON: Field = Field::bit(CR, 16);
    pub const HSERDY: Field = Field::bit(CR, 17);
    pub const HSEBYP: Field = Field::bit(CR, 18);
    pub const PLLON: Field = Field::bit(CR, 24);
    pub const PLLRDY: Field = Field::bit(CR, 25);
    pub const CSSON: Field = Field::bit(CR, 28);

    pub const SW: Field = Field::new(CFGR, 0, 2);
    pub const SWS: Field = Field::new(CFGR, 2, 2);
    pub const HPRE: Field = Field::new(CFGR, 4, 4);
    pub const PPRE1: Field = Field::new(CFGR, 8, 3);
    pub const PPRE2: Field = Field::new(CFGR, 11, 3);
    pub const PLLSRC: Field = Field::bit(CFGR, 16);
    pub const PLLMUL: Field = Field::new(CFGR, 18, 4);
    pub const PLLDIV: Field = Field::new(CFGR, 22, 2);

    pub const LSION: Field = Field::bit(CSR, 0);
    pub const LSIRDY: Field = Field::bit(CSR, 1);
    pub const LSEON: Field = Field::bit(CSR, 8);
    pub const LSERDY: Field = Field::bit(CSR, 9);
    pub const LSEBYP: Field = Field::bit(CSR, 10);
    pub const RTCSEL: Field = Field::new(CSR, 16, 2);
    pub const RTCEN: Field = Field::bit(CSR, 22);
    pub const RTCRST: Field = Field::bit(CSR, 23);

    pub const PWREN: Field = Field::bit(APB1ENR, 28);
    pub const DBP: Field = Field::bit(PWR_CR, 8);
    pub const VOS: Field = Field::new(PWR_CR, 11, 2);
    pub const VOSF: Field = Field::bit(PWR_CSR, 4);
}

use regs::*;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct L1;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum L1Osc {
    /// Multi-speed internal RC, 2.097 MHz out of reset.
    Msi,
    /// 16 MHz internal RC.
    Hsi,
    Hse,
    /// ~37 kHz internal RC.
    Lsi,
    Lse,
    Pll,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum L1Pll {
    Pll,
}

/// Core regulator range. Range 1 is the highest voltage.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum L1Scale {
    /// 1.2 V: up to 4 MHz, no PLL.
    Range3,
    /// 1.5 V: up to 16 MHz.
    Range2,
    /// 1.8 V: up to 32 MHz.
    Range1,
}

impl VoltageScale for L1Scale {
    const ALL: &'static [Self] = &[L1Scale::Range3, L1Scale::Range2, L1Scale::Range1];

    fn to_bits(self) -> u32 {
        match self {
            L1Scale::Range1 => 0b01,
            L1Scale::Range2 => 0b10,
            L1Scale::Range3 => 0b11,
        }
    }

    fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            0b01 => Some(L1Scale::Range1),
            0b10 => Some(L1Scale::Range2),
            0b11 => Some(L1Scale::Range3),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            L1Scale::Range1 => "range1",
            L1Scale::Range2 => "range2",
            L1Scale::Range3 => "range3",
        }
    }
}

pub(crate) const MSI_FREQ: Hertz = Hertz::hz(2_097_000);
pub(crate) const HSI_FREQ: Hertz = Hertz::mhz(16);

static MSI: OscSpec = OscSpec {
    name: "MSI",
    enable: MSION,
    ready: MSIRDY,
    bypass: None,
    kind: OscKind::Internal(MSI_FREQ),
    backup_domain: false,
};

static HSI: OscSpec = OscSpec {
    name: "HSI",
    enable: HSION,
    ready: HSIRDY,
    bypass: None,
    kind: OscKind::Internal(HSI_FREQ),
    backup_domain: false,
};

static HSE: OscSpec = OscSpec {
    name: "HSE",
    enable: HSEON,
    ready: HSERDY,
    bypass: Some(HSEBYP),
    kind: OscKind::External {
        slot: ExternalSlot::High,
        min: Hertz::mhz(1),
        max: Hertz::mhz(24),
    },
    backup_domain: false,
};

static LSI: OscSpec = OscSpec {
    name: "LSI",
    enable: LSION,
    ready: LSIRDY,
    bypass: None,
    kind: OscKind::Internal(Hertz::khz(37)),
    backup_domain: false,
};

static LSE: OscSpec = OscSpec {
    name: "LSE",
    enable: LSEON,
    ready: LSERDY,
    bypass: Some(LSEBYP),
    kind: OscKind::External {
        slot: ExternalSlot::Low,
        min: Hertz::hz(32_768),
        max: Hertz::khz(1_000),
    },
    backup_domain: true,
};

static PLL_OSC: OscSpec = OscSpec {
    name: "PLL",
    enable: PLLON,
    ready: PLLRDY,
    bypass: None,
    kind: OscKind::Pll,
    backup_domain: false,
};

static PLL: PllSpec<L1> = PllSpec {
    osc: L1Osc::Pll,
    inputs: &[
        PllInputSpec {
            input: PllInput::Osc(L1Osc::Hsi),
            select: &[(PLLSRC, 0)],
            fixed_prediv: None,
        },
        PllInputSpec {
            input: PllInput::Osc(L1Osc::Hse),
            select: &[(PLLSRC, 1)],
            fixed_prediv: None,
        },
    ],
    prediv: None,
    mul: Knob {
        name: "PLLMUL",
        field: PLLMUL,
        encoding: Encoding::Table(&[
            (3, 0),
            (4, 1),
            (6, 2),
            (8, 3),
            (12, 4),
            (16, 5),
            (24, 6),
            (32, 7),
            (48, 8),
        ]),
    },
    postdiv: Some(Knob {
        name: "PLLDIV",
        field: PLLDIV,
        encoding: Encoding::Table(&[(2, 1), (3, 2), (4, 3)]),
    }),
    input_range: (Hertz::mhz(2), Hertz::mhz(24)),
    output_range: (Hertz::mhz(2), Hertz::mhz(32)),
};

impl Family for L1 {
    type Osc = L1Osc;
    type Pll = L1Pll;
    type Scale = L1Scale;

    const NAME: &'static str = "STM32L1";

    const OSCILLATORS: &'static [L1Osc] = &[
        L1Osc::Msi,
        L1Osc::Hsi,
        L1Osc::Hse,
        L1Osc::Lsi,
        L1Osc::Lse,
        L1Osc::Pll,
    ];
    const PLLS: &'static [L1Pll] = &[L1Pll::Pll];
    const SYSCLK_SOURCES: &'static [(L1Osc, u32)] =
        &[(L1Osc::Msi, 0), (L1Osc::Hsi, 1), (L1Osc::Hse, 2), (L1Osc::Pll, 3)];

    const SW: Field = regs::SW;
    const SWS: Field = regs::SWS;
    const HPRE: Field = regs::HPRE;
    const PPRE1: Field = regs::PPRE1;
    const PPRE2: Field = regs::PPRE2;
    const CSS: Option<Field> = Some(CSSON);

    const REGULATOR: Option<RegulatorSpec> = Some(RegulatorSpec {
        select: VOS,
        busy: VOSF,
        interface_clock: Some(PWREN),
    });
    const RTC: Option<RtcSpec<L1Osc>> = Some(RtcSpec {
        select: RTCSEL,
        sources: &[(L1Osc::Lse, 0b01), (L1Osc::Lsi, 0b10), (L1Osc::Hse, 0b11)],
        enable: RTCEN,
        reset: RTCRST,
    });
    const BACKUP_DOMAIN: BackupDomainSpec = BackupDomainSpec {
        unlock: DBP,
        interface_clocks: &[PWREN],
    };

    const SAFE_SOURCE: L1Osc = L1Osc::Msi;
    const RESET_SCALE: L1Scale = L1Scale::Range2;
    const RESET_CLOCKS: Clocks = Clocks::uniform(MSI_FREQ);

    fn oscillator(osc: L1Osc) -> &'static OscSpec {
        match osc {
            L1Osc::Msi => &MSI,
            L1Osc::Hsi => &HSI,
            L1Osc::Hse => &HSE,
            L1Osc::Lsi => &LSI,
            L1Osc::Lse => &LSE,
            L1Osc::Pll => &PLL_OSC,
        }
    }

    fn pll(pll: L1Pll) -> &'static PllSpec<L1> {
        match pll {
            L1Pll::Pll => &PLL,
        }
    }

    fn limits(scale: L1Scale) -> ScaleLimits {
        match scale {
            L1Scale::Range1 => ScaleLimits {
                sysclk: Hertz::mhz(32),
                ahb: Hertz::mhz(32),
                apb1: Hertz::mhz(32),
                apb2: Hertz::mhz(32),
                vco: Some(Hertz::mhz(96)),
                pll: true,
            },
            L1Scale::Range2 => ScaleLimits {
                sysclk: Hertz::mhz(16),
                ahb: Hertz::mhz(16),
                apb1: Hertz::mhz(16),
                apb2: Hertz::mhz(16),
                vco: Some(Hertz::mhz(48)),
                pll: true,
            },
            L1Scale::Range3 => ScaleLimits {
                sysclk: Hertz::mhz(4),
                ahb: Hertz::mhz(4),
                apb1: Hertz::mhz(4),
                apb2: Hertz::mhz(4),
                vco: None,
                pll: false,
            },
        }
    }
}

/// Peripheral clock gates.
pub mod periph {
    use super::regs::*;
    use super::L1;
    use crate::rcc::bus::Field;

    clock_gates!([L1];
        GpioA => Field::bit(AHBENR, 0), reset Field::bit(AHBRSTR, 0);
        GpioB => Field::bit(AHBENR, 1), reset Field::bit(AHBRSTR, 1);
        GpioC => Field::bit(AHBENR, 2), reset Field::bit(AHBRSTR, 2);
        GpioD => Field::bit(AHBENR, 3), reset Field::bit(AHBRSTR, 3);
        GpioE => Field::bit(AHBENR, 4), reset Field::bit(AHBRSTR, 4);
        GpioH => Field::bit(AHBENR, 5), reset Field::bit(AHBRSTR, 5);
        Crc => Field::bit(AHBENR, 12), reset Field::bit(AHBRSTR, 12);
        Flitf => Field::bit(AHBENR, 15), reset Field::bit(AHBRSTR, 15);
        Dma1 => Field::bit(AHBENR, 24), reset Field::bit(AHBRSTR, 24);
        Syscfg => Field::bit(APB2ENR, 0), reset Field::bit(APB2RSTR, 0);
        Tim9 => Field::bit(APB2ENR, 2), reset Field::bit(APB2RSTR, 2);
        Tim10 => Field::bit(APB2ENR, 3), reset Field::bit(APB2RSTR, 3);
        Tim11 => Field::bit(APB2ENR, 4), reset Field::bit(APB2RSTR, 4);
        Adc1 => Field::bit(APB2ENR, 9), reset Field::bit(APB2RSTR, 9);
        Spi1 => Field::bit(APB2ENR, 12), reset Field::bit(APB2RSTR, 12);
        Usart1 => Field::bit(APB2ENR, 14), reset Field::bit(APB2RSTR, 14);
        Tim2 => Field::bit(APB1ENR, 0), reset Field::bit(APB1RSTR, 0);
        Tim3 => Field::bit(APB1ENR, 1), reset Field::bit(APB1RSTR, 1);
        Tim4 => Field::bit(APB1ENR, 2), reset Field::bit(APB1RSTR, 2);
        Tim6 => Field::bit(APB1ENR, 4), reset Field::bit(APB1RSTR, 4);
        Tim7 => Field::bit(APB1ENR, 5), reset Field::bit(APB1RSTR, 5);
        Lcd => Field::bit(APB1ENR, 9), reset Field::bit(APB1RSTR, 9);
        Wwdg => Field::bit(APB1ENR, 11), reset Field::bit(APB1RSTR, 11);
        Spi2 => Field::bit(APB1ENR, 14), reset Field::bit(APB1RSTR, 14);
        Usart2 => Field::bit(APB1ENR, 17), reset Field::bit(APB1RSTR, 17);
        Usart3 => Field::bit(APB1ENR, 18), reset Field::bit(APB1RSTR, 18);
        I2c1 => Field::bit(APB1ENR, 21), reset Field::bit(APB1RSTR, 21);
        I2c2 => Field::bit(APB1ENR, 22), reset Field::bit(APB1RSTR, 22);
        Usb => Field::bit(APB1ENR, 23), reset Field::bit(APB1RSTR, 23);
        Pwr => Field::bit(APB1ENR, 28), reset Field::bit(APB1RSTR, 28);
        Dac => Field::bit(APB1ENR, 29), reset Field::bit(APB1RSTR, 29);
        Comp => Field::bit(APB1ENR, 31), reset Field::bit(APB1RSTR, 31);
    );
}

/// Fixed setups for common boards.
pub mod presets {
    use super::{L1Osc, L1Pll, L1Scale, L1};
    use crate::rcc::{AhbPrescaler, Board, ClockFault, ClockProfile, ExternalClock, PllConfig, PllInput, ProfileBuilder};
    use crate::time::Hertz;

    /// HSI straight to SYSCLK, range 2.
    pub fn hsi_out_16mhz() -> Result<ClockProfile<L1>, ClockFault> {
        ProfileBuilder::new(Board::new()).with_source(L1Osc::Hsi).build()
    }

    /// HSI x6 /3 = 32 MHz, range 1.
    pub fn hsi_pll_out_32mhz() -> Result<ClockProfile<L1>, ClockFault> {
        ProfileBuilder::new(Board::new())
            .with_pll(L1Pll::Pll, PllConfig::new(PllInput::Osc(L1Osc::Hsi), 6).with_postdiv(3))
            .with_source(L1Osc::Pll)
            .build()
    }

    /// 8 MHz crystal x12 /3 = 32 MHz, range 1.
    pub fn hse_8mhz_pll_out_32mhz() -> Result<ClockProfile<L1>, ClockFault> {
        ProfileBuilder::new(Board::new().with_hse(ExternalClock::crystal(Hertz::mhz(8))))
            .with_pll(L1Pll::Pll, PllConfig::new(PllInput::Osc(L1Osc::Hse), 12).with_postdiv(3))
            .with_source(L1Osc::Pll)
            .build()
    }

    /// MSI with the AHB halved, range 3.
    pub fn msi_low_power() -> Result<ClockProfile<L1>, ClockFault> {
        ProfileBuilder::new(Board::new())
            .with_source(L1Osc::Msi)
            .with_ahb(AhbPrescaler::Div2)
            .with_scale(L1Scale::Range3)
            .build()
    }

    pub const ALL: &[(&str, fn() -> Result<ClockProfile<L1>, ClockFault>)] = &[
        ("hsi_out_16mhz", hsi_out_16mhz),
        ("hsi_pll_out_32mhz", hsi_pll_out_32mhz),
        ("hse_8mhz_pll_out_32mhz", hse_8mhz_pll_out_32mhz),
        ("msi_low_power", msi_low_power),
    ];
}
