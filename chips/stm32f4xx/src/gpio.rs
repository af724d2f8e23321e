// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! General-purpose I/O ports.

use kernel::hil;
use kernel::platform::chip::ClockInterface;
use kernel::utilities::mmio::{Mmio, MmioRegister, RegisterBus};
use kernel::utilities::registers::interfaces::{ReadWriteable, Readable, Writeable};
use kernel::utilities::registers::{register_bitfields, Field, FieldValue};

/// Byte offsets of the GPIO port registers used here.
pub(crate) mod offset {
    pub(crate) const MODER: usize = 0x00;
    pub(crate) const IDR: usize = 0x10;
    pub(crate) const ODR: usize = 0x14;
    pub(crate) const BSRR: usize = 0x18;
    pub(crate) const AFRL: usize = 0x20;
    pub(crate) const AFRH: usize = 0x24;
}

// Every pin has the same layout in these registers, shifted by the pin number.
// Only pin 0 is named; other pins are reached with `Field::new`.
register_bitfields![u32,
    MODER [
        /// Port x configuration bits
        MODER0 OFFSET(0) NUMBITS(2) []
    ],
    IDR [
        /// Port input data
        IDR0 OFFSET(0) NUMBITS(1) []
    ],
    ODR [
        /// Port output data
        ODR0 OFFSET(0) NUMBITS(1) []
    ],
    BSRR [
        /// Port x reset bit
        BR0 OFFSET(16) NUMBITS(1) [],
        /// Port x set bit
        BS0 OFFSET(0) NUMBITS(1) []
    ],
    AFR [
        /// Alternate function selection for port x pin
        AFR0 OFFSET(0) NUMBITS(4) []
    ]
];

pub const GPIOA_BASE: Mmio = unsafe { Mmio::new(0x4002_0000, 0x400) };

/// Pins per port.
pub const PIN_COUNT: usize = 16;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PortId {
    A = 0b000,
    B = 0b001,
    C = 0b010,
    D = 0b011,
    E = 0b100,
    F = 0b101,
    G = 0b110,
    H = 0b111,
}

/// GPIO pin mode [^1]
///
/// [^1]: Section 8.1.4, page 187 of reference manual
#[repr(u32)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Mode {
    Input = 0b00,
    GeneralPurposeOutputMode = 0b01,
    AlternateFunctionMode = 0b10,
    AnalogMode = 0b11,
}

/// Alternate functions that may be assigned to a `Pin`.
///
/// GPIO pins on the STM32F4 may serve multiple functions. In addition to the
/// default functionality, each pin can be assigned up to sixteen different
/// alternate functions. The various functions for each pin are described in
/// "Alternate Function" section of the STM32F4 datasheet.
#[repr(u32)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AlternateFunction {
    AF0 = 0b0000,
    AF1 = 0b0001,
    AF2 = 0b0010,
    AF3 = 0b0011,
    AF4 = 0b0100,
    AF5 = 0b0101,
    AF6 = 0b0110,
    AF7 = 0b0111,
    AF8 = 0b1000,
    AF9 = 0b1001,
    AF10 = 0b1010,
    AF11 = 0b1011,
    AF12 = 0b1100,
    AF13 = 0b1101,
    AF14 = 0b1110,
    AF15 = 0b1111,
}

impl AlternateFunction {
    const ALL: [AlternateFunction; 16] = [
        AlternateFunction::AF0,
        AlternateFunction::AF1,
        AlternateFunction::AF2,
        AlternateFunction::AF3,
        AlternateFunction::AF4,
        AlternateFunction::AF5,
        AlternateFunction::AF6,
        AlternateFunction::AF7,
        AlternateFunction::AF8,
        AlternateFunction::AF9,
        AlternateFunction::AF10,
        AlternateFunction::AF11,
        AlternateFunction::AF12,
        AlternateFunction::AF13,
        AlternateFunction::AF14,
        AlternateFunction::AF15,
    ];
}

/// One GPIO port and the clock gate it sits behind.
pub struct Port<'a, B: RegisterBus = Mmio> {
    registers: B,
    id: PortId,
    clock: &'a dyn ClockInterface,
}

impl<'a, B: RegisterBus> Port<'a, B> {
    pub const fn new(id: PortId, registers: B, clock: &'a dyn ClockInterface) -> Self {
        Self {
            registers,
            id,
            clock,
        }
    }

    /// Pin `number` of this port, `None` past the last pin.
    pub fn pin(&'a self, number: usize) -> Option<Pin<'a, B>> {
        if number < PIN_COUNT {
            Some(Pin { port: self, number })
        } else {
            None
        }
    }

    pub fn is_enabled_clock(&self) -> bool {
        self.clock.is_enabled()
    }

    pub fn enable_clock(&self) {
        self.clock.enable();
    }

    pub fn disable_clock(&self) {
        self.clock.disable();
    }

    fn moder(&self) -> MmioRegister<'_, B, MODER::Register> {
        MmioRegister::new(&self.registers, offset::MODER)
    }

    fn idr(&self) -> MmioRegister<'_, B, IDR::Register> {
        MmioRegister::new(&self.registers, offset::IDR)
    }

    fn odr(&self) -> MmioRegister<'_, B, ODR::Register> {
        MmioRegister::new(&self.registers, offset::ODR)
    }

    fn bsrr(&self) -> MmioRegister<'_, B, BSRR::Register> {
        MmioRegister::new(&self.registers, offset::BSRR)
    }

    /// AFRL holds pins 0 to 7, AFRH pins 8 to 15.
    fn afr(&self, pin: usize) -> MmioRegister<'_, B, AFR::Register> {
        if pin < 8 {
            MmioRegister::new(&self.registers, offset::AFRL)
        } else {
            MmioRegister::new(&self.registers, offset::AFRH)
        }
    }
}

pub struct Pin<'a, B: RegisterBus = Mmio> {
    port: &'a Port<'a, B>,
    number: usize,
}

impl<B: RegisterBus> Pin<'_, B> {
    pub fn number(&self) -> usize {
        self.number
    }

    pub fn port_id(&self) -> PortId {
        self.port.id
    }

    /// Turn on the clock of the port this pin belongs to. Mode and level
    /// changes are ignored by the hardware while it is off.
    pub fn enable_port_clock(&self) {
        if !self.port.is_enabled_clock() {
            self.port.enable_clock();
        }
    }

    fn mode_field(&self) -> Field<u32, MODER::Register> {
        Field::new(MODER::MODER0.mask, self.number * 2)
    }

    pub fn get_mode(&self) -> Mode {
        match self.port.moder().read(self.mode_field()) {
            0b00 => Mode::Input,
            0b01 => Mode::GeneralPurposeOutputMode,
            0b10 => Mode::AlternateFunctionMode,
            _ => Mode::AnalogMode,
        }
    }

    pub fn set_mode(&self, mode: Mode) {
        self.port.moder().modify(FieldValue::<u32, MODER::Register>::new(
            MODER::MODER0.mask,
            self.number * 2,
            mode as u32,
        ));
    }

    fn alternate_function_shift(&self) -> usize {
        (self.number % 8) * 4
    }

    pub fn get_alternate_function(&self) -> AlternateFunction {
        let field = Field::<u32, AFR::Register>::new(AFR::AFR0.mask, self.alternate_function_shift());
        let bits = self.port.afr(self.number).read(field) as usize;
        AlternateFunction::ALL
            .get(bits)
            .copied()
            .unwrap_or(AlternateFunction::AF0)
    }

    /// Route `af` to this pin. Takes effect once the pin is in
    /// [`Mode::AlternateFunctionMode`].
    pub fn set_alternate_function(&self, af: AlternateFunction) {
        self.port
            .afr(self.number)
            .modify(FieldValue::<u32, AFR::Register>::new(
                AFR::AFR0.mask,
                self.alternate_function_shift(),
                af as u32,
            ));
    }

    fn is_output_high(&self) -> bool {
        self.port.odr().get() & (1 << self.number) != 0
    }
}

impl<B: RegisterBus> hil::gpio::Configure for Pin<'_, B> {
    fn configuration(&self) -> hil::gpio::Configuration {
        match self.get_mode() {
            Mode::Input => hil::gpio::Configuration::Input,
            Mode::GeneralPurposeOutputMode => hil::gpio::Configuration::Output,
            Mode::AlternateFunctionMode => hil::gpio::Configuration::Function,
            Mode::AnalogMode => hil::gpio::Configuration::Analog,
        }
    }

    fn make_output(&self) -> hil::gpio::Configuration {
        self.set_mode(Mode::GeneralPurposeOutputMode);
        hil::gpio::Configuration::Output
    }

    fn make_input(&self) -> hil::gpio::Configuration {
        self.set_mode(Mode::Input);
        hil::gpio::Configuration::Input
    }
}

impl<B: RegisterBus> hil::gpio::Output for Pin<'_, B> {
    // BSRR writes are atomic per pin, so no read-modify-write of ODR.
    fn set(&self) {
        self.port.bsrr().set(1 << self.number);
    }

    fn clear(&self) {
        self.port.bsrr().set(1 << (self.number + 16));
    }

    fn toggle(&self) -> bool {
        if self.is_output_high() {
            self.clear();
            false
        } else {
            self.set();
            true
        }
    }
}

impl<B: RegisterBus> hil::gpio::Input for Pin<'_, B> {
    fn read(&self) -> bool {
        self.port.idr().get() & (1 << self.number) != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emulation::{FakeGpio, Trace};
    use crate::rcc::{PeripheralClock, PeripheralClockType, Rcc, HCLK1};
    use kernel::hil::gpio::{Configuration, Configure, Input, Output};
    use kernel::platform::chip::NO_CLOCK_CONTROL;
    use kernel::utilities::mmio::InMemoryBus;

    #[test]
    fn pins_past_fifteen_do_not_exist() {
        let port = Port::new(PortId::A, InMemoryBus::<10>::new(), &NO_CLOCK_CONTROL);
        assert!(port.pin(15).is_some());
        assert!(port.pin(16).is_none());
    }

    #[test]
    fn mode_is_two_bits_per_pin() {
        let port = Port::new(PortId::A, InMemoryBus::<10>::new(), &NO_CLOCK_CONTROL);
        port.registers.write(offset::MODER, 0xffff_ffff);

        let pa5 = port.pin(5).unwrap();
        pa5.set_mode(Mode::AlternateFunctionMode);
        assert_eq!(port.registers.read(offset::MODER), 0xffff_fbff);
        assert_eq!(pa5.get_mode(), Mode::AlternateFunctionMode);
        assert_eq!(pa5.configuration(), Configuration::Function);

        pa5.make_output();
        assert_eq!(port.registers.read(offset::MODER), 0xffff_f7ff);
        assert!(pa5.is_output());
    }

    #[test]
    fn alternate_function_splits_across_afrl_and_afrh() {
        let port = Port::new(PortId::A, InMemoryBus::<10>::new(), &NO_CLOCK_CONTROL);
        let pa7 = port.pin(7).unwrap();
        let pa9 = port.pin(9).unwrap();

        pa7.set_alternate_function(AlternateFunction::AF5);
        pa9.set_alternate_function(AlternateFunction::AF7);
        assert_eq!(port.registers.read(offset::AFRL), 0x5000_0000);
        assert_eq!(port.registers.read(offset::AFRH), 0x0000_0070);
        assert_eq!(pa7.get_alternate_function(), AlternateFunction::AF5);
        assert_eq!(pa9.get_alternate_function(), AlternateFunction::AF7);

        pa7.set_alternate_function(AlternateFunction::AF2);
        assert_eq!(port.registers.read(offset::AFRL), 0x2000_0000);
    }

    #[test]
    fn output_goes_through_bsrr() {
        let port = Port::new(PortId::A, InMemoryBus::<10>::new(), &NO_CLOCK_CONTROL);
        let pa4 = port.pin(4).unwrap();

        pa4.set();
        assert_eq!(port.registers.read(offset::BSRR), 1 << 4);
        pa4.clear();
        assert_eq!(port.registers.read(offset::BSRR), 1 << 20);
        // ODR is never written directly.
        assert_eq!(port.registers.read(offset::ODR), 0);
    }

    #[test]
    fn toggle_and_read_follow_the_output_latch() {
        let trace = Trace::new();
        let port = Port::new(PortId::A, FakeGpio::new(&trace), &NO_CLOCK_CONTROL);
        let pa4 = port.pin(4).unwrap();
        let pa6 = port.pin(6).unwrap();

        assert!(pa4.toggle());
        assert!(pa4.read());
        assert!(!pa6.read());
        assert!(!pa4.toggle());
        assert!(!pa4.read());
    }

    #[test]
    fn port_clock_is_enabled_once() {
        let rcc = Rcc::new(InMemoryBus::<32>::new());
        let clock = PeripheralClock::new(PeripheralClockType::AHB1(HCLK1::GPIOA), &rcc);
        let port = Port::new(PortId::A, InMemoryBus::<10>::new(), &clock);
        let pa5 = port.pin(5).unwrap();

        assert!(!port.is_enabled_clock());
        pa5.enable_port_clock();
        pa5.enable_port_clock();
        assert!(port.is_enabled_clock());
        assert_eq!(pa5.port_id(), PortId::A);
        assert_eq!(pa5.number(), 5);
    }
}
