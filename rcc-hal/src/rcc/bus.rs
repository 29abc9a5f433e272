//! Register access.
//!
//! Every clock-tree operation goes through [`RegisterBus`], so the same code
//! drives real silicon through [`Mmio`] and the host simulator in tests.

/// Absolute address of a 32-bit register.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Reg(pub u32);

impl Reg {
    pub const fn at(base: u32, offset: u32) -> Self {
        Self(base + offset)
    }
}

/// A contiguous bit field inside a register.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Field {
    pub reg: Reg,
    pub shift: u8,
    pub width: u8,
}

impl Field {
    pub const fn new(reg: Reg, shift: u8, width: u8) -> Self {
        Self { reg, shift, width }
    }

    /// Single-bit field.
    pub const fn bit(reg: Reg, shift: u8) -> Self {
        Self::new(reg, shift, 1)
    }

    /// Largest value the field can hold.
    pub const fn max(&self) -> u32 {
        ((1u64 << self.width) - 1) as u32
    }

    pub const fn mask(&self) -> u32 {
        self.max() << self.shift
    }

    pub const fn extract(&self, word: u32) -> u32 {
        (word >> self.shift) & self.max()
    }

    pub const fn insert(&self, word: u32, value: u32) -> u32 {
        (word & !self.mask()) | ((value & self.max()) << self.shift)
    }
}

/// Raw 32-bit register access.
///
/// Implementors only provide [`read`](Self::read) and [`write`](Self::write);
/// field helpers are built on top. [`write_field`](Self::write_field) is a
/// read-compare-write and skips the store when the field already holds the
/// value, which is what makes re-applying an active clock profile free of
/// register writes.
pub trait RegisterBus {
    fn read(&mut self, reg: Reg) -> u32;

    fn write(&mut self, reg: Reg, value: u32);

    fn read_field(&mut self, field: Field) -> u32 {
        field.extract(self.read(field.reg))
    }

    /// Returns `true` if a store was issued.
    fn write_field(&mut self, field: Field, value: u32) -> bool {
        debug_assert!(value <= field.max());
        let old = self.read(field.reg);
        let new = field.insert(old, value);
        if new != old {
            self.write(field.reg, new);
            true
        } else {
            false
        }
    }

    fn is_set(&mut self, field: Field) -> bool {
        self.read_field(field) != 0
    }

    fn set_flag(&mut self, field: Field, on: bool) -> bool {
        self.write_field(field, on as u32)
    }
}

impl<B: RegisterBus + ?Sized> RegisterBus for &mut B {
    fn read(&mut self, reg: Reg) -> u32 {
        (**self).read(reg)
    }

    fn write(&mut self, reg: Reg, value: u32) {
        (**self).write(reg, value)
    }
}

/// Volatile memory-mapped access to the real peripheral.
pub struct Mmio {
    _private: (),
}

impl Mmio {
    /// # Safety
    ///
    /// Only one `Mmio` may drive the RCC at a time, and every [`Reg`] handed
    /// to it must be a valid peripheral address on the running chip.
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl RegisterBus for Mmio {
    fn read(&mut self, reg: Reg) -> u32 {
        unsafe { core::ptr::read_volatile(reg.0 as usize as *const u32) }
    }

    fn write(&mut self, reg: Reg, value: u32) {
        unsafe { core::ptr::write_volatile(reg.0 as usize as *mut u32, value) };
        // Clock-tree writes must land before the next status poll.
        #[cfg(target_arch = "arm")]
        cortex_m::asm::dsb();
    }
}
