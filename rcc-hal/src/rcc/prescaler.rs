//! AHB and APB bus prescalers.

use core::marker::PhantomData;
use core::ops::Div;

use super::bus::RegisterBus;
use crate::family::Family;
use crate::time::Hertz;

/// AHB prescaler. Variants are ordered by divisor.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AhbPrescaler {
    #[default]
    Div1,
    Div2,
    Div4,
    Div8,
    Div16,
    Div64,
    Div128,
    Div256,
    Div512,
}

impl AhbPrescaler {
    pub const fn divisor(self) -> u32 {
        match self {
            AhbPrescaler::Div1 => 1,
            AhbPrescaler::Div2 => 2,
            AhbPrescaler::Div4 => 4,
            AhbPrescaler::Div8 => 8,
            AhbPrescaler::Div16 => 16,
            AhbPrescaler::Div64 => 64,
            AhbPrescaler::Div128 => 128,
            AhbPrescaler::Div256 => 256,
            AhbPrescaler::Div512 => 512,
        }
    }

    pub const fn from_divisor(divisor: u32) -> Option<Self> {
        Some(match divisor {
            1 => AhbPrescaler::Div1,
            2 => AhbPrescaler::Div2,
            4 => AhbPrescaler::Div4,
            8 => AhbPrescaler::Div8,
            16 => AhbPrescaler::Div16,
            64 => AhbPrescaler::Div64,
            128 => AhbPrescaler::Div128,
            256 => AhbPrescaler::Div256,
            512 => AhbPrescaler::Div512,
            _ => return None,
        })
    }

    /// HPRE encoding.
    pub const fn to_bits(self) -> u32 {
        match self {
            AhbPrescaler::Div1 => 0b0000,
            AhbPrescaler::Div2 => 0b1000,
            AhbPrescaler::Div4 => 0b1001,
            AhbPrescaler::Div8 => 0b1010,
            AhbPrescaler::Div16 => 0b1011,
            AhbPrescaler::Div64 => 0b1100,
            AhbPrescaler::Div128 => 0b1101,
            AhbPrescaler::Div256 => 0b1110,
            AhbPrescaler::Div512 => 0b1111,
        }
    }

    pub const fn from_bits(bits: u32) -> Self {
        match bits & 0b1111 {
            0b1000 => AhbPrescaler::Div2,
            0b1001 => AhbPrescaler::Div4,
            0b1010 => AhbPrescaler::Div8,
            0b1011 => AhbPrescaler::Div16,
            0b1100 => AhbPrescaler::Div64,
            0b1101 => AhbPrescaler::Div128,
            0b1110 => AhbPrescaler::Div256,
            0b1111 => AhbPrescaler::Div512,
            _ => AhbPrescaler::Div1,
        }
    }
}

/// APB1/APB2 prescaler. Variants are ordered by divisor.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ApbPrescaler {
    #[default]
    Div1,
    Div2,
    Div4,
    Div8,
    Div16,
}

impl ApbPrescaler {
    pub const fn divisor(self) -> u32 {
        match self {
            ApbPrescaler::Div1 => 1,
            ApbPrescaler::Div2 => 2,
            ApbPrescaler::Div4 => 4,
            ApbPrescaler::Div8 => 8,
            ApbPrescaler::Div16 => 16,
        }
    }

    pub const fn from_divisor(divisor: u32) -> Option<Self> {
        Some(match divisor {
            1 => ApbPrescaler::Div1,
            2 => ApbPrescaler::Div2,
            4 => ApbPrescaler::Div4,
            8 => ApbPrescaler::Div8,
            16 => ApbPrescaler::Div16,
            _ => return None,
        })
    }

    /// PPREx encoding.
    pub const fn to_bits(self) -> u32 {
        match self {
            ApbPrescaler::Div1 => 0b000,
            ApbPrescaler::Div2 => 0b100,
            ApbPrescaler::Div4 => 0b101,
            ApbPrescaler::Div8 => 0b110,
            ApbPrescaler::Div16 => 0b111,
        }
    }

    pub const fn from_bits(bits: u32) -> Self {
        match bits & 0b111 {
            0b100 => ApbPrescaler::Div2,
            0b101 => ApbPrescaler::Div4,
            0b110 => ApbPrescaler::Div8,
            0b111 => ApbPrescaler::Div16,
            _ => ApbPrescaler::Div1,
        }
    }
}

impl Div<AhbPrescaler> for Hertz {
    type Output = Hertz;
    fn div(self, rhs: AhbPrescaler) -> Hertz {
        self / rhs.divisor()
    }
}

impl Div<ApbPrescaler> for Hertz {
    type Output = Hertz;
    fn div(self, rhs: ApbPrescaler) -> Hertz {
        self / rhs.divisor()
    }
}

/// The three bus dividers below SYSCLK.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Prescalers {
    pub ahb: AhbPrescaler,
    pub apb1: ApbPrescaler,
    pub apb2: ApbPrescaler,
}

impl Prescalers {
    pub const fn new() -> Self {
        Self {
            ahb: AhbPrescaler::Div1,
            apb1: ApbPrescaler::Div1,
            apb2: ApbPrescaler::Div1,
        }
    }

    pub const fn with_ahb(mut self, ahb: AhbPrescaler) -> Self {
        self.ahb = ahb;
        self
    }

    pub const fn with_apb1(mut self, apb1: ApbPrescaler) -> Self {
        self.apb1 = apb1;
        self
    }

    pub const fn with_apb2(mut self, apb2: ApbPrescaler) -> Self {
        self.apb2 = apb2;
        self
    }

    /// Per bus, the larger divider of the two settings. Bus frequencies under
    /// this setting never exceed either endpoint, whichever source runs.
    pub fn bracket(self, other: Prescalers) -> Prescalers {
        Prescalers {
            ahb: self.ahb.max(other.ahb),
            apb1: self.apb1.max(other.apb1),
            apb2: self.apb2.max(other.apb2),
        }
    }
}

pub(crate) fn read<F: Family, B: RegisterBus>(bus: &mut B) -> Prescalers {
    Prescalers {
        ahb: AhbPrescaler::from_bits(bus.read_field(F::HPRE)),
        apb1: ApbPrescaler::from_bits(bus.read_field(F::PPRE1)),
        apb2: ApbPrescaler::from_bits(bus.read_field(F::PPRE2)),
    }
}

pub(crate) fn write<F: Family, B: RegisterBus>(bus: &mut B, p: Prescalers) {
    bus.write_field(F::HPRE, p.ahb.to_bits());
    bus.write_field(F::PPRE1, p.apb1.to_bits());
    bus.write_field(F::PPRE2, p.apb2.to_bits());
}

/// Bus divider control. Writes take effect immediately.
pub struct PrescalerTree<'a, F: Family, B: RegisterBus> {
    bus: &'a mut B,
    _family: PhantomData<F>,
}

impl<'a, F: Family, B: RegisterBus> PrescalerTree<'a, F, B> {
    pub(crate) fn new(bus: &'a mut B) -> Self {
        Self { bus, _family: PhantomData }
    }

    pub fn set_ahb(&mut self, div: AhbPrescaler) {
        self.bus.write_field(F::HPRE, div.to_bits());
    }

    pub fn set_apb1(&mut self, div: ApbPrescaler) {
        self.bus.write_field(F::PPRE1, div.to_bits());
    }

    pub fn set_apb2(&mut self, div: ApbPrescaler) {
        self.bus.write_field(F::PPRE2, div.to_bits());
    }

    pub fn prescalers(&mut self) -> Prescalers {
        read::<F, B>(self.bus)
    }
}
