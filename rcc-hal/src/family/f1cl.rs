//! STM32F105/F107 connectivity line.
//!
//! Same register map as the rest of the F1 series, plus two auxiliary PLLs
//! (PLL2, PLL3) behind a shared pre-divider. PLL2 can feed the main PLL.

use super::f1::{self, regs, regs::*};
use super::{
    BackupDomainSpec, Encoding, ExternalSlot, Family, Knob, OscKind, OscSpec, PllInputSpec, PllSpec, RegulatorSpec,
    RtcSpec,
};
use crate::rcc::bus::{Field, Reg};
use crate::rcc::pll::PllInput;
use crate::rcc::state::Clocks;
use crate::rcc::voltage::{NoScaling, ScaleLimits};
use crate::time::Hertz;

const CFGR2: Reg = Reg::at(RCC, 0x2C);

const PLL2ON: Field = Field::bit(CR, 26);
const PLL2RDY: Field = Field::bit(CR, 27);
const PLL3ON: Field = Field::bit(CR, 28);
const PLL3RDY: Field = Field::bit(CR, 29);

const PREDIV1: Field = Field::new(CFGR2, 0, 4);
pub(crate) const PREDIV2: Field = Field::new(CFGR2, 4, 4);
const PLL2MUL: Field = Field::new(CFGR2, 8, 4);
const PLL3MUL: Field = Field::new(CFGR2, 12, 4);
const PREDIV1SRC: Field = Field::bit(CFGR2, 16);

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct F1Cl;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClOsc {
    Hsi,
    Hse,
    Lsi,
    Lse,
    Pll,
    Pll2,
    Pll3,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClPll {
    Pll2,
    Pll3,
    Pll,
}

static HSE: OscSpec = OscSpec {
    name: "HSE",
    enable: HSEON,
    ready: HSERDY,
    bypass: Some(HSEBYP),
    kind: OscKind::External {
        slot: ExternalSlot::High,
        min: Hertz::mhz(3),
        max: Hertz::mhz(25),
    },
    backup_domain: false,
};

static PLL2_OSC: OscSpec = OscSpec {
    name: "PLL2",
    enable: PLL2ON,
    ready: PLL2RDY,
    bypass: None,
    kind: OscKind::Pll,
    backup_domain: false,
};

static PLL3_OSC: OscSpec = OscSpec {
    name: "PLL3",
    enable: PLL3ON,
    ready: PLL3RDY,
    bypass: None,
    kind: OscKind::Pll,
    backup_domain: false,
};

const PREDIV2_KNOB: Knob = Knob {
    name: "PREDIV2",
    field: PREDIV2,
    encoding: Encoding::Linear { min: 1, max: 16, offset: 1 },
};

/// PLL2MUL and PLL3MUL share one encoding; 0b1111 is x20.
const AUX_MUL: Encoding = Encoding::Table(&[
    (8, 6),
    (9, 7),
    (10, 8),
    (11, 9),
    (12, 10),
    (13, 11),
    (14, 12),
    (16, 14),
    (20, 15),
]);

static PLL: PllSpec<F1Cl> = PllSpec {
    osc: ClOsc::Pll,
    inputs: &[
        PllInputSpec {
            input: PllInput::Osc(ClOsc::Hsi),
            select: &[(PLLSRC, 0)],
            fixed_prediv: Some(2),
        },
        PllInputSpec {
            input: PllInput::Osc(ClOsc::Hse),
            select: &[(PLLSRC, 1), (PREDIV1SRC, 0)],
            fixed_prediv: None,
        },
        PllInputSpec {
            input: PllInput::Pll(ClPll::Pll2),
            select: &[(PLLSRC, 1), (PREDIV1SRC, 1)],
            fixed_prediv: None,
        },
    ],
    prediv: Some(Knob {
        name: "PREDIV1",
        field: PREDIV1,
        encoding: Encoding::Linear { min: 1, max: 16, offset: 1 },
    }),
    // x6.5 (0b1101) is not expressible as an integer ratio and is never used.
    mul: Knob {
        name: "PLLMUL",
        field: PLLMUL,
        encoding: Encoding::Linear { min: 4, max: 9, offset: 2 },
    },
    postdiv: None,
    input_range: (Hertz::mhz(3), Hertz::mhz(12)),
    output_range: (Hertz::mhz(18), Hertz::mhz(72)),
};

static PLL2: PllSpec<F1Cl> = PllSpec {
    osc: ClOsc::Pll2,
    inputs: &[PllInputSpec {
        input: PllInput::Osc(ClOsc::Hse),
        select: &[],
        fixed_prediv: None,
    }],
    prediv: Some(PREDIV2_KNOB),
    mul: Knob {
        name: "PLL2MUL",
        field: PLL2MUL,
        encoding: AUX_MUL,
    },
    postdiv: None,
    input_range: (Hertz::mhz(3), Hertz::mhz(5)),
    output_range: (Hertz::mhz(40), Hertz::mhz(74)),
};

static PLL3: PllSpec<F1Cl> = PllSpec {
    osc: ClOsc::Pll3,
    inputs: &[PllInputSpec {
        input: PllInput::Osc(ClOsc::Hse),
        select: &[],
        fixed_prediv: None,
    }],
    prediv: Some(PREDIV2_KNOB),
    mul: Knob {
        name: "PLL3MUL",
        field: PLL3MUL,
        encoding: AUX_MUL,
    },
    postdiv: None,
    input_range: (Hertz::mhz(3), Hertz::mhz(5)),
    output_range: (Hertz::mhz(40), Hertz::mhz(74)),
};

impl Family for F1Cl {
    type Osc = ClOsc;
    type Pll = ClPll;
    type Scale = NoScaling;

    const NAME: &'static str = "STM32F105/107";

    const OSCILLATORS: &'static [ClOsc] = &[
        ClOsc::Hsi,
        ClOsc::Hse,
        ClOsc::Lsi,
        ClOsc::Lse,
        ClOsc::Pll,
        ClOsc::Pll2,
        ClOsc::Pll3,
    ];
    const PLLS: &'static [ClPll] = &[ClPll::Pll2, ClPll::Pll3, ClPll::Pll];
    const SYSCLK_SOURCES: &'static [(ClOsc, u32)] = &[(ClOsc::Hsi, 0), (ClOsc::Hse, 1), (ClOsc::Pll, 2)];

    const SW: Field = regs::SW;
    const SWS: Field = regs::SWS;
    const HPRE: Field = regs::HPRE;
    const PPRE1: Field = regs::PPRE1;
    const PPRE2: Field = regs::PPRE2;
    const CSS: Option<Field> = Some(CSSON);

    const REGULATOR: Option<RegulatorSpec> = None;
    const RTC: Option<RtcSpec<ClOsc>> = Some(RtcSpec {
        select: RTCSEL,
        sources: &[(ClOsc::Lse, 0b01), (ClOsc::Lsi, 0b10), (ClOsc::Hse, 0b11)],
        enable: RTCEN,
        reset: BDRST,
    });
    const BACKUP_DOMAIN: BackupDomainSpec = f1::BKP_DOMAIN;

    const SAFE_SOURCE: ClOsc = ClOsc::Hsi;
    const RESET_SCALE: NoScaling = NoScaling;
    const RESET_CLOCKS: Clocks = Clocks::uniform(f1::HSI_FREQ);

    fn oscillator(osc: ClOsc) -> &'static OscSpec {
        match osc {
            ClOsc::Hsi => &f1::HSI,
            ClOsc::Hse => &HSE,
            ClOsc::Lsi => &f1::LSI,
            ClOsc::Lse => &f1::LSE,
            ClOsc::Pll => &f1::PLL_OSC,
            ClOsc::Pll2 => &PLL2_OSC,
            ClOsc::Pll3 => &PLL3_OSC,
        }
    }

    fn pll(pll: ClPll) -> &'static PllSpec<F1Cl> {
        match pll {
            ClPll::Pll => &PLL,
            ClPll::Pll2 => &PLL2,
            ClPll::Pll3 => &PLL3,
        }
    }

    fn limits(_scale: NoScaling) -> ScaleLimits {
        f1::LIMITS
    }
}

/// Peripheral clock gates. The F1 gates in [`f1::periph`] apply as well.
pub mod periph {
    use crate::family::f1::regs::*;
    use crate::family::F1Cl;
    use crate::rcc::bus::Field;

    clock_gates!([F1Cl];
        Otgfs => Field::bit(AHBENR, 12);
        EthMac => Field::bit(AHBENR, 14);
        EthMacTx => Field::bit(AHBENR, 15);
        EthMacRx => Field::bit(AHBENR, 16);
        GpioE => Field::bit(APB2ENR, 6), reset Field::bit(APB2RSTR, 6);
        Tim5 => Field::bit(APB1ENR, 3), reset Field::bit(APB1RSTR, 3);
        Tim6 => Field::bit(APB1ENR, 4), reset Field::bit(APB1RSTR, 4);
        Tim7 => Field::bit(APB1ENR, 5), reset Field::bit(APB1RSTR, 5);
        Spi3 => Field::bit(APB1ENR, 15), reset Field::bit(APB1RSTR, 15);
        Uart4 => Field::bit(APB1ENR, 19), reset Field::bit(APB1RSTR, 19);
        Uart5 => Field::bit(APB1ENR, 20), reset Field::bit(APB1RSTR, 20);
        Can2 => Field::bit(APB1ENR, 26), reset Field::bit(APB1RSTR, 26);
        Dac => Field::bit(APB1ENR, 29), reset Field::bit(APB1RSTR, 29);
    );
}

/// Fixed setups for common boards.
pub mod presets {
    use super::{ClOsc, ClPll, F1Cl};
    use crate::rcc::{ApbPrescaler, Board, ClockFault, ClockProfile, ExternalClock, PllConfig, PllInput, ProfileBuilder};
    use crate::time::Hertz;

    /// 25 MHz crystal, PLL2 (/5 x8) = 40 MHz, PLL (/5 x9) = 72 MHz.
    ///
    /// The usual Ethernet board setup: the crystal also clocks the PHY.
    pub fn hse_25mhz_out_72mhz() -> Result<ClockProfile<F1Cl>, ClockFault> {
        ProfileBuilder::new(Board::new().with_hse(ExternalClock::crystal(Hertz::mhz(25))))
            .with_pll(ClPll::Pll2, PllConfig::new(PllInput::Osc(ClOsc::Hse), 8).with_prediv(5))
            .with_pll(ClPll::Pll, PllConfig::new(PllInput::Pll(ClPll::Pll2), 9).with_prediv(5))
            .with_source(ClOsc::Pll)
            .with_apb1(ApbPrescaler::Div2)
            .build()
    }

    /// 8 MHz crystal straight into the main PLL, x9 = 72 MHz.
    pub fn hse_8mhz_out_72mhz() -> Result<ClockProfile<F1Cl>, ClockFault> {
        ProfileBuilder::new(Board::new().with_hse(ExternalClock::crystal(Hertz::mhz(8))))
            .with_pll(ClPll::Pll, PllConfig::new(PllInput::Osc(ClOsc::Hse), 9))
            .with_source(ClOsc::Pll)
            .with_apb1(ApbPrescaler::Div2)
            .build()
    }

    pub const ALL: &[(&str, fn() -> Result<ClockProfile<F1Cl>, ClockFault>)] = &[
        ("hse_25mhz_out_72mhz", hse_25mhz_out_72mhz),
        ("hse_8mhz_out_72mhz", hse_8mhz_out_72mhz),
    ];
}
