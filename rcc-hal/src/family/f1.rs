//! STM32F1 performance and value lines (F100/F101/F102/F103).

use super::{
    BackupDomainSpec, Encoding, ExternalSlot, Family, Knob, OscKind, OscSpec, PllInputSpec, PllSpec, RegulatorSpec,
    RtcSpec,
};
use crate::rcc::bus::Field;
use crate::rcc::pll::PllInput;
use crate::rcc::state::Clocks;
use crate::rcc::voltage::{NoScaling, ScaleLimits};
use crate::time::Hertz;

/// Register map shared by the whole F1 series, connectivity line included.
pub(crate) mod regs {
    use crate::rcc::bus::{Field, Reg};

    pub const RCC: u32 = 0x4002_1000;
    pub const PWR: u32 = 0x4000_7000;

    pub const CR: Reg = Reg::at(RCC, 0x00);
    pub const CFGR: Reg = Reg::at(RCC, 0x04);
    pub const APB2RSTR: Reg = Reg::at(RCC, 0x0C);
    pub const APB1RSTR: Reg = Reg::at(RCC, 0x10);
    pub const AHBENR: Reg = Reg::at(RCC, 0x14);
    pub const APB2ENR: Reg = Reg::at(RCC, 0x18);
    pub const APB1ENR: Reg = Reg::at(RCC, 0x1C);
    pub const BDCR: Reg = Reg::at(RCC, 0x20);
    pub const CSR: Reg = Reg::at(RCC, 0x24);
    pub const PWR_CR: Reg = Reg::at(PWR, 0x00);

    pub const HSION: Field = Field::bit(CR, 0);
    pub const HSIRDY: Field = Field::bit(CR, 1);
    pub const HSEON: Field = Field::bit(CR, 16);
    pub const HSERDY: Field = Field::bit(CR, 17);
    pub const HSEBYP: Field = Field::bit(CR, 18);
    pub const CSSON: Field = Field::bit(CR, 19);
    pub const PLLON: Field = Field::bit(CR, 24);
    pub const PLLRDY: Field = Field::bit(CR, 25);

    pub const SW: Field = Field::new(CFGR, 0, 2);
    pub const SWS: Field = Field::new(CFGR, 2, 2);
    pub const HPRE: Field = Field::new(CFGR, 4, 4);
    pub const PPRE1: Field = Field::new(CFGR, 8, 3);
    pub const PPRE2: Field = Field::new(CFGR, 11, 3);
    pub const PLLSRC: Field = Field::bit(CFGR, 16);
    pub const PLLXTPRE: Field = Field::bit(CFGR, 17);
    pub const PLLMUL: Field = Field::new(CFGR, 18, 4);

    pub const LSEON: Field = Field::bit(BDCR, 0);
    pub const LSERDY: Field = Field::bit(BDCR, 1);
    pub const LSEBYP: Field = Field::bit(BDCR, 2);
    pub const RTCSEL: Field = Field::new(BDCR, 8, 2);
    pub const RTCEN: Field = Field::bit(BDCR, 15);
    pub const BDRST: Field = Field::bit(BDCR, 16);

    pub const LSION: Field = Field::bit(CSR, 0);
    pub const LSIRDY: Field = Field::bit(CSR, 1);

    pub const BKPEN: Field = Field::bit(APB1ENR, 27);
    pub const PWREN: Field = Field::bit(APB1ENR, 28);
    pub const DBP: Field = Field::bit(PWR_CR, 8);
}

use regs::*;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct F1;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum F1Osc {
    /// 8 MHz internal RC.
    Hsi,
    Hse,
    /// ~40 kHz internal RC.
    Lsi,
    Lse,
    Pll,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum F1Pll {
    Pll,
}

pub(crate) const HSI_FREQ: Hertz = Hertz::mhz(8);
pub(crate) const LSI_FREQ: Hertz = Hertz::khz(40);

pub(crate) static HSI: OscSpec = OscSpec {
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
        min: Hertz::mhz(4),
        max: Hertz::mhz(16),
    },
    backup_domain: false,
};

pub(crate) static LSI: OscSpec = OscSpec {
    name: "LSI",
    enable: LSION,
    ready: LSIRDY,
    bypass: None,
    kind: OscKind::Internal(LSI_FREQ),
    backup_domain: false,
};

pub(crate) static LSE: OscSpec = OscSpec {
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

pub(crate) static PLL_OSC: OscSpec = OscSpec {
    name: "PLL",
    enable: PLLON,
    ready: PLLRDY,
    bypass: None,
    kind: OscKind::Pll,
    backup_domain: false,
};

static PLL: PllSpec<F1> = PllSpec {
    osc: F1Osc::Pll,
    inputs: &[
        PllInputSpec {
            input: PllInput::Osc(F1Osc::Hsi),
            select: &[(PLLSRC, 0)],
            fixed_prediv: Some(2),
        },
        PllInputSpec {
            input: PllInput::Osc(F1Osc::Hse),
            select: &[(PLLSRC, 1)],
            fixed_prediv: None,
        },
    ],
    prediv: Some(Knob {
        name: "PLLXTPRE",
        field: PLLXTPRE,
        encoding: Encoding::Table(&[(1, 0), (2, 1)]),
    }),
    mul: Knob {
        name: "PLLMUL",
        field: PLLMUL,
        encoding: Encoding::Linear { min: 2, max: 16, offset: 2 },
    },
    postdiv: None,
    input_range: (Hertz::mhz(1), Hertz::mhz(25)),
    output_range: (Hertz::mhz(16), Hertz::mhz(72)),
};

pub(crate) const LIMITS: ScaleLimits = ScaleLimits {
    sysclk: Hertz::mhz(72),
    ahb: Hertz::mhz(72),
    apb1: Hertz::mhz(36),
    apb2: Hertz::mhz(72),
    vco: None,
    pll: true,
};

pub(crate) const BKP_DOMAIN: BackupDomainSpec = BackupDomainSpec {
    unlock: DBP,
    interface_clocks: &[PWREN, BKPEN],
};

impl Family for F1 {
    type Osc = F1Osc;
    type Pll = F1Pll;
    type Scale = NoScaling;

    const NAME: &'static str = "STM32F1";

    const OSCILLATORS: &'static [F1Osc] = &[F1Osc::Hsi, F1Osc::Hse, F1Osc::Lsi, F1Osc::Lse, F1Osc::Pll];
    const PLLS: &'static [F1Pll] = &[F1Pll::Pll];
    const SYSCLK_SOURCES: &'static [(F1Osc, u32)] = &[(F1Osc::Hsi, 0), (F1Osc::Hse, 1), (F1Osc::Pll, 2)];

    const SW: Field = regs::SW;
    const SWS: Field = regs::SWS;
    const HPRE: Field = regs::HPRE;
    const PPRE1: Field = regs::PPRE1;
    const PPRE2: Field = regs::PPRE2;
    const CSS: Option<Field> = Some(CSSON);

    const REGULATOR: Option<RegulatorSpec> = None;
    const RTC: Option<RtcSpec<F1Osc>> = Some(RtcSpec {
        select: RTCSEL,
        sources: &[(F1Osc::Lse, 0b01), (F1Osc::Lsi, 0b10), (F1Osc::Hse, 0b11)],
        enable: RTCEN,
        reset: BDRST,
    });
    const BACKUP_DOMAIN: BackupDomainSpec = BKP_DOMAIN;

    const SAFE_SOURCE: F1Osc = F1Osc::Hsi;
    const RESET_SCALE: NoScaling = NoScaling;
    const RESET_CLOCKS: Clocks = Clocks::uniform(HSI_FREQ);

    fn oscillator(osc: F1Osc) -> &'static OscSpec {
        match osc {
            F1Osc::Hsi => &HSI,
            F1Osc::Hse => &HSE,
            F1Osc::Lsi => &LSI,
            F1Osc::Lse => &LSE,
            F1Osc::Pll => &PLL_OSC,
        }
    }

    fn pll(pll: F1Pll) -> &'static PllSpec<F1> {
        match pll {
            F1Pll::Pll => &PLL,
        }
    }

    fn limits(_scale: NoScaling) -> ScaleLimits {
        LIMITS
    }
}

/// Peripheral clock gates.
pub mod periph {
    use super::regs::*;
    use crate::family::{F1Cl, F1};
    use crate::rcc::bus::Field;

    clock_gates!([F1, F1Cl];
        Dma1 => Field::bit(AHBENR, 0);
        Dma2 => Field::bit(AHBENR, 1);
        Crc => Field::bit(AHBENR, 6);
        Afio => Field::bit(APB2ENR, 0), reset Field::bit(APB2RSTR, 0);
        GpioA => Field::bit(APB2ENR, 2), reset Field::bit(APB2RSTR, 2);
        GpioB => Field::bit(APB2ENR, 3), reset Field::bit(APB2RSTR, 3);
        GpioC => Field::bit(APB2ENR, 4), reset Field::bit(APB2RSTR, 4);
        GpioD => Field::bit(APB2ENR, 5), reset Field::bit(APB2RSTR, 5);
        Adc1 => Field::bit(APB2ENR, 9), reset Field::bit(APB2RSTR, 9);
        Adc2 => Field::bit(APB2ENR, 10), reset Field::bit(APB2RSTR, 10);
        Tim1 => Field::bit(APB2ENR, 11), reset Field::bit(APB2RSTR, 11);
        Spi1 => Field::bit(APB2ENR, 12), reset Field::bit(APB2RSTR, 12);
        Usart1 => Field::bit(APB2ENR, 14), reset Field::bit(APB2RSTR, 14);
        Tim2 => Field::bit(APB1ENR, 0), reset Field::bit(APB1RSTR, 0);
        Tim3 => Field::bit(APB1ENR, 1), reset Field::bit(APB1RSTR, 1);
        Tim4 => Field::bit(APB1ENR, 2), reset Field::bit(APB1RSTR, 2);
        Wwdg => Field::bit(APB1ENR, 11), reset Field::bit(APB1RSTR, 11);
        Spi2 => Field::bit(APB1ENR, 14), reset Field::bit(APB1RSTR, 14);
        Usart2 => Field::bit(APB1ENR, 17), reset Field::bit(APB1RSTR, 17);
        Usart3 => Field::bit(APB1ENR, 18), reset Field::bit(APB1RSTR, 18);
        I2c1 => Field::bit(APB1ENR, 21), reset Field::bit(APB1RSTR, 21);
        I2c2 => Field::bit(APB1ENR, 22), reset Field::bit(APB1RSTR, 22);
        Can1 => Field::bit(APB1ENR, 25), reset Field::bit(APB1RSTR, 25);
        Bkp => Field::bit(APB1ENR, 27), reset Field::bit(APB1RSTR, 27);
        Pwr => Field::bit(APB1ENR, 28), reset Field::bit(APB1RSTR, 28);
    );
}

/// Fixed setups for common boards.
pub mod presets {
    use super::{F1Osc, F1Pll, F1};
    use crate::rcc::{ApbPrescaler, Board, ClockFault, ClockProfile, ExternalClock, PllConfig, PllInput, ProfileBuilder};
    use crate::time::Hertz;

    fn hse_pll(hse: Hertz, prediv: u8, mul: u8) -> ProfileBuilder<F1> {
        ProfileBuilder::new(Board::new().with_hse(ExternalClock::crystal(hse)))
            .with_pll(F1Pll::Pll, PllConfig::new(PllInput::Osc(F1Osc::Hse), mul).with_prediv(prediv))
            .with_source(F1Osc::Pll)
    }

    fn hsi_pll(mul: u8) -> ProfileBuilder<F1> {
        ProfileBuilder::new(Board::new())
            .with_pll(F1Pll::Pll, PllConfig::new(PllInput::Osc(F1Osc::Hsi), mul))
            .with_source(F1Osc::Pll)
    }

    /// HSI through the PLL: 4 MHz x 16 = 64 MHz.
    pub fn hsi_out_64mhz() -> Result<ClockProfile<F1>, ClockFault> {
        hsi_pll(16).with_apb1(ApbPrescaler::Div2).build()
    }

    /// HSI through the PLL: 4 MHz x 12 = 48 MHz.
    pub fn hsi_out_48mhz() -> Result<ClockProfile<F1>, ClockFault> {
        hsi_pll(12).with_apb1(ApbPrescaler::Div2).build()
    }

    /// 8 MHz crystal, PLL x3 = 24 MHz, value line maximum.
    pub fn hse_8mhz_out_24mhz() -> Result<ClockProfile<F1>, ClockFault> {
        hse_pll(Hertz::mhz(8), 1, 3).build()
    }

    /// 8 MHz crystal, PLL x9 = 72 MHz, APB1 at 36 MHz.
    pub fn hse_8mhz_out_72mhz() -> Result<ClockProfile<F1>, ClockFault> {
        hse_pll(Hertz::mhz(8), 1, 9).with_apb1(ApbPrescaler::Div2).build()
    }

    /// 12 MHz crystal, PLL x6 = 72 MHz.
    pub fn hse_12mhz_out_72mhz() -> Result<ClockProfile<F1>, ClockFault> {
        hse_pll(Hertz::mhz(12), 1, 6).with_apb1(ApbPrescaler::Div2).build()
    }

    /// 16 MHz crystal, /2 then PLL x9 = 72 MHz.
    pub fn hse_16mhz_out_72mhz() -> Result<ClockProfile<F1>, ClockFault> {
        hse_pll(Hertz::mhz(16), 2, 9).with_apb1(ApbPrescaler::Div2).build()
    }

    /// Every preset by name.
    pub const ALL: &[(&str, fn() -> Result<ClockProfile<F1>, ClockFault>)] = &[
        ("hsi_out_48mhz", hsi_out_48mhz),
        ("hsi_out_64mhz", hsi_out_64mhz),
        ("hse_8mhz_out_24mhz", hse_8mhz_out_24mhz),
        ("hse_8mhz_out_72mhz", hse_8mhz_out_72mhz),
        ("hse_12mhz_out_72mhz", hse_12mhz_out_72mhz),
        ("hse_16mhz_out_72mhz", hse_16mhz_out_72mhz),
    ];
}
