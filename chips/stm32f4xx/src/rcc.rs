// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Reset and clock control.
//!
//! Only the parts the SPI bring-up needs: peripheral clock gates for the GPIO
//! ports and SPI1, and reading back the bus prescalers to know the frequency
//! SPI1 is clocked with. The clock tree itself stays at its reset state (HSI
//! as system clock).

use kernel::platform::chip::ClockInterface;
use kernel::utilities::mmio::{Mmio, MmioRegister, RegisterBus};
use kernel::utilities::registers::interfaces::{ReadWriteable, Readable};
use kernel::utilities::registers::{register_bitfields, Field};

/// Byte offsets of the RCC registers used here.
pub(crate) mod offset {
    pub(crate) const CFGR: usize = 0x08;
    pub(crate) const AHB1ENR: usize = 0x30;
    pub(crate) const APB2ENR: usize = 0x44;
}

register_bitfields![u32,
    CFGR [
        /// APB high-speed prescaler (APB2)
        PPRE2 OFFSET(13) NUMBITS(3) [],
        /// APB Low speed prescaler (APB1)
        PPRE1 OFFSET(10) NUMBITS(3) [],
        /// AHB prescaler
        HPRE OFFSET(4) NUMBITS(4) [],
        /// System clock switch status
        SWS OFFSET(2) NUMBITS(2) [
            HSI = 0b00,
            HSE = 0b01,
            PLL = 0b10,
        ],
        /// System clock switch
        SW OFFSET(0) NUMBITS(2) []
    ],
    AHB1ENR [
        /// IO port H clock enable
        GPIOHEN OFFSET(7) NUMBITS(1) [],
        /// IO port G clock enable
        GPIOGEN OFFSET(6) NUMBITS(1) [],
        /// IO port F clock enable
        GPIOFEN OFFSET(5) NUMBITS(1) [],
        /// IO port E clock enable
        GPIOEEN OFFSET(4) NUMBITS(1) [],
        /// IO port D clock enable
        GPIODEN OFFSET(3) NUMBITS(1) [],
        /// IO port C clock enable
        GPIOCEN OFFSET(2) NUMBITS(1) [],
        /// IO port B clock enable
        GPIOBEN OFFSET(1) NUMBITS(1) [],
        /// IO port A clock enable
        GPIOAEN OFFSET(0) NUMBITS(1) []
    ],
    APB2ENR [
        /// SPI1 clock enable
        SPI1EN OFFSET(12) NUMBITS(1) []
    ]
];

pub const RCC_BASE: Mmio = unsafe { Mmio::new(0x4002_3800, 0x400) };

/// Frequency of the internal high-speed oscillator, the reset system clock.
pub const HSI_FREQUENCY_HZ: u32 = 16_000_000;

pub struct Rcc<B: RegisterBus = Mmio> {
    registers: B,
}

impl<B: RegisterBus> Rcc<B> {
    pub const fn new(registers: B) -> Self {
        Self { registers }
    }

    fn cfgr(&self) -> MmioRegister<'_, B, CFGR::Register> {
        MmioRegister::new(&self.registers, offset::CFGR)
    }

    fn ahb1enr(&self) -> MmioRegister<'_, B, AHB1ENR::Register> {
        MmioRegister::new(&self.registers, offset::AHB1ENR)
    }

    fn apb2enr(&self) -> MmioRegister<'_, B, APB2ENR::Register> {
        MmioRegister::new(&self.registers, offset::APB2ENR)
    }

    // AHB1 clocks

    fn ahb1_field(clock: HCLK1) -> Field<u32, AHB1ENR::Register> {
        match clock {
            HCLK1::GPIOA => AHB1ENR::GPIOAEN,
            HCLK1::GPIOB => AHB1ENR::GPIOBEN,
            HCLK1::GPIOC => AHB1ENR::GPIOCEN,
            HCLK1::GPIOD => AHB1ENR::GPIODEN,
            HCLK1::GPIOE => AHB1ENR::GPIOEEN,
            HCLK1::GPIOF => AHB1ENR::GPIOFEN,
            HCLK1::GPIOG => AHB1ENR::GPIOGEN,
            HCLK1::GPIOH => AHB1ENR::GPIOHEN,
        }
    }

    pub(crate) fn is_enabled_ahb1_clock(&self, clock: HCLK1) -> bool {
        self.ahb1enr().is_set(Self::ahb1_field(clock))
    }

    pub(crate) fn enable_ahb1_clock(&self, clock: HCLK1) {
        self.ahb1enr().modify(Self::ahb1_field(clock).val(1))
    }

    pub(crate) fn disable_ahb1_clock(&self, clock: HCLK1) {
        self.ahb1enr().modify(Self::ahb1_field(clock).val(0))
    }

    // APB2 clocks

    fn apb2_field(clock: PCLK2) -> Field<u32, APB2ENR::Register> {
        match clock {
            PCLK2::SPI1 => APB2ENR::SPI1EN,
        }
    }

    pub(crate) fn is_enabled_apb2_clock(&self, clock: PCLK2) -> bool {
        self.apb2enr().is_set(Self::apb2_field(clock))
    }

    pub(crate) fn enable_apb2_clock(&self, clock: PCLK2) {
        self.apb2enr().modify(Self::apb2_field(clock).val(1))
    }

    pub(crate) fn disable_apb2_clock(&self, clock: PCLK2) {
        self.apb2enr().modify(Self::apb2_field(clock).val(0))
    }

    // Bus frequencies

    pub fn get_sys_clock_source(&self) -> SysClockSource {
        match self.cfgr().read(CFGR::SWS) {
            0b00 => SysClockSource::HSI,
            0b01 => SysClockSource::HSE,
            _ => SysClockSource::PLL,
        }
    }

    pub fn get_ahb_prescaler(&self) -> AHBPrescaler {
        match self.cfgr().read(CFGR::HPRE) {
            0b1000 => AHBPrescaler::DivideBy2,
            0b1001 => AHBPrescaler::DivideBy4,
            0b1010 => AHBPrescaler::DivideBy8,
            0b1011 => AHBPrescaler::DivideBy16,
            0b1100 => AHBPrescaler::DivideBy64,
            0b1101 => AHBPrescaler::DivideBy128,
            0b1110 => AHBPrescaler::DivideBy256,
            0b1111 => AHBPrescaler::DivideBy512,
            _ => AHBPrescaler::DivideBy1,
        }
    }

    pub fn get_apb2_prescaler(&self) -> APBPrescaler {
        match self.cfgr().read(CFGR::PPRE2) {
            0b100 => APBPrescaler::DivideBy2,
            0b101 => APBPrescaler::DivideBy4,
            0b110 => APBPrescaler::DivideBy8,
            0b111 => APBPrescaler::DivideBy16,
            _ => APBPrescaler::DivideBy1,
        }
    }

    /// Frequency of the APB2 bus, which clocks SPI1.
    ///
    /// Returns `None` when the system clock is not the HSI: the HSE and PLL
    /// frequencies depend on board and PLL setup this driver does not do.
    pub fn get_apb2_frequency(&self) -> Option<u32> {
        if self.get_sys_clock_source() != SysClockSource::HSI {
            return None;
        }
        let ahb = HSI_FREQUENCY_HZ / u32::from(self.get_ahb_prescaler());
        Some(ahb / u32::from(self.get_apb2_prescaler()))
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SysClockSource {
    HSI,
    HSE,
    PLL,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AHBPrescaler {
    DivideBy1,
    DivideBy2,
    DivideBy4,
    DivideBy8,
    DivideBy16,
    DivideBy64,
    DivideBy128,
    DivideBy256,
    DivideBy512,
}

impl From<AHBPrescaler> for u32 {
    fn from(item: AHBPrescaler) -> u32 {
        match item {
            AHBPrescaler::DivideBy1 => 1,
            AHBPrescaler::DivideBy2 => 2,
            AHBPrescaler::DivideBy4 => 4,
            AHBPrescaler::DivideBy8 => 8,
            AHBPrescaler::DivideBy16 => 16,
            AHBPrescaler::DivideBy64 => 64,
            AHBPrescaler::DivideBy128 => 128,
            AHBPrescaler::DivideBy256 => 256,
            AHBPrescaler::DivideBy512 => 512,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum APBPrescaler {
    DivideBy1,
    DivideBy2,
    DivideBy4,
    DivideBy8,
    DivideBy16,
}

impl From<APBPrescaler> for u32 {
    fn from(item: APBPrescaler) -> u32 {
        match item {
            APBPrescaler::DivideBy1 => 1,
            APBPrescaler::DivideBy2 => 2,
            APBPrescaler::DivideBy4 => 4,
            APBPrescaler::DivideBy8 => 8,
            APBPrescaler::DivideBy16 => 16,
        }
    }
}

/// A clock gate in the RCC, usable wherever a [`ClockInterface`] is expected.
pub struct PeripheralClock<'a, B: RegisterBus = Mmio> {
    pub clock: PeripheralClockType,
    rcc: &'a Rcc<B>,
}

/// Bus type for peripherals
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PeripheralClockType {
    AHB1(HCLK1),
    APB2(PCLK2),
}

/// Peripherals clocked by HCLK1
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum HCLK1 {
    GPIOH,
    GPIOG,
    GPIOF,
    GPIOE,
    GPIOD,
    GPIOC,
    GPIOB,
    GPIOA,
}

/// Peripherals clocked by PCLK2
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PCLK2 {
    SPI1,
}

impl<'a, B: RegisterBus> PeripheralClock<'a, B> {
    pub const fn new(clock: PeripheralClockType, rcc: &'a Rcc<B>) -> Self {
        Self { clock, rcc }
    }
}

impl<B: RegisterBus> ClockInterface for PeripheralClock<'_, B> {
    fn is_enabled(&self) -> bool {
        match self.clock {
            PeripheralClockType::AHB1(clock) => self.rcc.is_enabled_ahb1_clock(clock),
            PeripheralClockType::APB2(clock) => self.rcc.is_enabled_apb2_clock(clock),
        }
    }

    fn enable(&self) {
        match self.clock {
            PeripheralClockType::AHB1(clock) => self.rcc.enable_ahb1_clock(clock),
            PeripheralClockType::APB2(clock) => self.rcc.enable_apb2_clock(clock),
        }
    }

    fn disable(&self) {
        match self.clock {
            PeripheralClockType::AHB1(clock) => self.rcc.disable_ahb1_clock(clock),
            PeripheralClockType::APB2(clock) => self.rcc.disable_apb2_clock(clock),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel::utilities::mmio::InMemoryBus;

    #[test]
    fn spi1_clock_gate_is_bit_12_of_apb2enr() {
        let rcc = Rcc::new(InMemoryBus::<32>::new());
        let clock = PeripheralClock::new(PeripheralClockType::APB2(PCLK2::SPI1), &rcc);

        assert!(!clock.is_enabled());
        clock.enable();
        assert!(clock.is_enabled());
        assert_eq!(rcc.registers.read(offset::APB2ENR), 1 << 12);

        clock.disable();
        assert!(!clock.is_enabled());
        assert_eq!(rcc.registers.read(offset::APB2ENR), 0);
    }

    #[test]
    fn gpio_clock_gates_keep_other_bits() {
        let rcc = Rcc::new(InMemoryBus::<32>::new());
        rcc.registers.write(offset::AHB1ENR, 1 << 21);

        let gpioa = PeripheralClock::new(PeripheralClockType::AHB1(HCLK1::GPIOA), &rcc);
        let gpioh = PeripheralClock::new(PeripheralClockType::AHB1(HCLK1::GPIOH), &rcc);
        gpioa.enable();
        gpioh.enable();
        assert_eq!(rcc.registers.read(offset::AHB1ENR), (1 << 21) | (1 << 7) | 1);

        gpioh.disable();
        assert!(gpioa.is_enabled());
        assert!(!gpioh.is_enabled());
    }

    #[test]
    fn apb2_frequency_follows_prescalers() {
        let rcc = Rcc::new(InMemoryBus::<32>::new());
        assert_eq!(rcc.get_apb2_frequency(), Some(16_000_000));

        // AHB /2, APB2 /4
        rcc.registers.write(offset::CFGR, (0b1000 << 4) | (0b101 << 13));
        assert_eq!(rcc.get_ahb_prescaler(), AHBPrescaler::DivideBy2);
        assert_eq!(rcc.get_apb2_prescaler(), APBPrescaler::DivideBy4);
        assert_eq!(rcc.get_apb2_frequency(), Some(2_000_000));

        // APB1 bits do not matter
        rcc.registers.write(offset::CFGR, 0b111 << 10);
        assert_eq!(rcc.get_apb2_frequency(), Some(16_000_000));
    }

    #[test]
    fn apb2_frequency_unknown_off_hsi() {
        let rcc = Rcc::new(InMemoryBus::<32>::new());
        rcc.registers.write(offset::CFGR, 0b10 << 2);
        assert_eq!(rcc.get_sys_clock_source(), SysClockSource::PLL);
        assert_eq!(rcc.get_apb2_frequency(), None);
    }
}
