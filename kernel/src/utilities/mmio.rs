// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Register buses for memory-mapped peripherals.
//!
//! A peripheral driver never dereferences raw addresses itself. It owns a
//! [`RegisterBus`] for its register block and builds typed [`MmioRegister`]
//! views from it, one per named register:
//!
//! ```rust,ignore
//! fn cr1(&self) -> MmioRegister<'_, B, CR1::Register> {
//!     MmioRegister::new(&self.registers, CR1_OFFSET)
//! }
//!
//! self.cr1().modify(CR1::MSTR::SET);
//! ```
//!
//! On hardware the bus is [`Mmio`], which performs volatile accesses at a fixed
//! base address. Host tests substitute a bus that emulates the peripheral,
//! for example one built on [`InMemoryBus`].

use core::cell::Cell;
use core::marker::PhantomData;
use core::ptr;

use tock_registers::interfaces::{Readable, Writeable};
use tock_registers::RegisterLongName;

/// Word-sized access to a block of 32-bit registers.
///
/// Offsets are in bytes from the start of the block and are multiples of 4.
pub trait RegisterBus {
    fn read(&self, offset: usize) -> u32;
    fn write(&self, offset: usize, value: u32);
}

impl<B: RegisterBus + ?Sized> RegisterBus for &B {
    fn read(&self, offset: usize) -> u32 {
        (**self).read(offset)
    }

    fn write(&self, offset: usize, value: u32) {
        (**self).write(offset, value)
    }
}

/// Volatile access to a register block at a fixed physical address.
///
/// Reads and writes are never cached, merged, reordered with respect to each
/// other, or elided.
#[derive(Debug)]
pub struct Mmio {
    base: usize,
    size: usize,
}

impl Mmio {
    /// Create a bus for the `size`-byte register block at `base`.
    ///
    /// # Safety
    ///
    /// `base` must be the address of a mapped peripheral block at least `size`
    /// bytes long, and the caller must make sure only one driver owns it.
    pub const unsafe fn new(base: usize, size: usize) -> Mmio {
        Mmio { base, size }
    }
}

impl RegisterBus for Mmio {
    fn read(&self, offset: usize) -> u32 {
        debug_assert!(offset % 4 == 0 && offset < self.size);
        // The constructor guarantees the block is mapped.
        unsafe { ptr::read_volatile((self.base + offset) as *const u32) }
    }

    fn write(&self, offset: usize, value: u32) {
        debug_assert!(offset % 4 == 0 && offset < self.size);
        unsafe { ptr::write_volatile((self.base + offset) as *mut u32, value) }
    }
}

/// A typed view of one 32-bit register on a bus.
///
/// `R` names the bitfields declared with `register_bitfields!`, so only fields
/// of this register can be read or written through the view.
pub struct MmioRegister<'a, B: RegisterBus + ?Sized, R: RegisterLongName = ()> {
    bus: &'a B,
    offset: usize,
    associated_register: PhantomData<R>,
}

impl<'a, B: RegisterBus + ?Sized, R: RegisterLongName> MmioRegister<'a, B, R> {
    pub fn new(bus: &'a B, offset: usize) -> Self {
        MmioRegister {
            bus,
            offset,
            associated_register: PhantomData,
        }
    }
}

impl<B: RegisterBus + ?Sized, R: RegisterLongName> Readable for MmioRegister<'_, B, R> {
    type T = u32;
    type R = R;

    fn get(&self) -> u32 {
        self.bus.read(self.offset)
    }
}

impl<B: RegisterBus + ?Sized, R: RegisterLongName> Writeable for MmioRegister<'_, B, R> {
    type T = u32;
    type R = R;

    fn set(&self, value: u32) {
        self.bus.write(self.offset, value)
    }
}

/// A register block backed by plain memory.
///
/// Registers hold whatever was last written. Accesses past the end of the
/// block read as zero and writes to them are dropped, like unmapped registers
/// on most buses.
pub struct InMemoryBus<const WORDS: usize> {
    words: [Cell<u32>; WORDS],
}

impl<const WORDS: usize> InMemoryBus<WORDS> {
    pub fn new() -> Self {
        InMemoryBus {
            words: core::array::from_fn(|_| Cell::new(0)),
        }
    }

    /// Copy of every register in the block, lowest offset first.
    pub fn snapshot(&self) -> [u32; WORDS] {
        core::array::from_fn(|i| self.words.get(i).map_or(0, Cell::get))
    }
}

impl<const WORDS: usize> RegisterBus for InMemoryBus<WORDS> {
    fn read(&self, offset: usize) -> u32 {
        self.words.get(offset / 4).map_or(0, Cell::get)
    }

    fn write(&self, offset: usize, value: u32) {
        if let Some(word) = self.words.get(offset / 4) {
            word.set(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utilities::registers::interfaces::ReadWriteable;
    use crate::utilities::registers::register_bitfields;

    register_bitfields![u32,
        CTRL [
            ENABLE OFFSET(0) NUMBITS(1) [],
            MODE OFFSET(4) NUMBITS(2) [
                Off = 0,
                Slow = 1,
                Fast = 2
            ]
        ]
    ];

    #[test]
    fn in_memory_bus_holds_last_write() {
        let bus = InMemoryBus::<4>::new();
        bus.write(0x4, 0xdead_beef);
        assert_eq!(bus.read(0x4), 0xdead_beef);
        assert_eq!(bus.read(0x0), 0);
        assert_eq!(bus.snapshot(), [0, 0xdead_beef, 0, 0]);
    }

    #[test]
    fn unmapped_offsets_read_zero() {
        let bus = InMemoryBus::<2>::new();
        bus.write(0x40, 7);
        assert_eq!(bus.read(0x40), 0);
        assert_eq!(bus.snapshot(), [0, 0]);
    }

    #[test]
    fn register_view_modifies_only_its_field() {
        let bus = InMemoryBus::<2>::new();
        let ctrl: MmioRegister<'_, _, CTRL::Register> = MmioRegister::new(&bus, 0x4);

        ctrl.set(0xffff_0000);
        ctrl.modify(CTRL::MODE::Fast);
        assert_eq!(bus.read(0x4), 0xffff_0020);

        // A field is cleared before the new value is set.
        ctrl.modify(CTRL::MODE::Slow + CTRL::ENABLE::SET);
        assert_eq!(ctrl.read(CTRL::MODE), 1);
        assert!(ctrl.is_set(CTRL::ENABLE));
        assert_eq!(bus.read(0x4), 0xffff_0011);
        assert_eq!(bus.read(0x0), 0);
    }

    #[test]
    fn references_to_a_bus_are_buses() {
        let bus = InMemoryBus::<1>::new();
        let by_ref = &bus;
        RegisterBus::write(&by_ref, 0, 3);
        assert_eq!(bus.read(0), 3);
    }
}
