// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! SPI1 in master mode, one byte at a time.
//!
//! Transfers are polled: every wait on the status register gives up after
//! [`SpiConfig::poll_limit`] reads and reports [`ErrorCode::TIMEOUT`].
//!
//! Usage
//! -----
//!
//! ```rust,ignore
//! let spi = static_init!(
//!     stm32f4xx::spi::Spi,
//!     stm32f4xx::spi::Spi::new(SPI1_BASE, spi1_clock, pins, pclk2)
//! );
//! spi.init()?;
//! let reply = spi.exchange(0x55)?;
//! ```

use core::cell::Cell;
use core::cmp;

use kernel::config::CONFIG;
use kernel::debug;
use kernel::hil::gpio::{Configure, Output};
use kernel::hil::spi::cs::{ChipSelectPolar, Polarity};
use kernel::hil::spi::{ClockPhase, ClockPolarity, SpiMaster};
use kernel::platform::chip::ClockInterface;
use kernel::utilities::mmio::{Mmio, MmioRegister, RegisterBus};
use kernel::utilities::registers::interfaces::{ReadWriteable, Readable, Writeable};
use kernel::utilities::registers::{register_bitfields, FieldValue};
use kernel::ErrorCode;

use crate::gpio::{AlternateFunction, Mode, Pin};

/// Byte offsets of the SPI registers used here.
pub(crate) mod offset {
    pub(crate) const CR1: usize = 0x00;
    pub(crate) const CR2: usize = 0x04;
    pub(crate) const SR: usize = 0x08;
    pub(crate) const DR: usize = 0x0C;
}

register_bitfields![u32,
    CR1 [
        /// Bidirectional data mode enable
        BIDIMODE OFFSET(15) NUMBITS(1) [],
        /// Data frame format
        DFF OFFSET(11) NUMBITS(1) [],
        /// Software slave management
        SSM OFFSET(9) NUMBITS(1) [],
        /// Internal slave select
        SSI OFFSET(8) NUMBITS(1) [],
        /// Frame format
        LSBFIRST OFFSET(7) NUMBITS(1) [],
        /// SPI enable
        SPE OFFSET(6) NUMBITS(1) [],
        /// Baud rate control
        BR OFFSET(3) NUMBITS(3) [
            DivideBy2 = 0b000,
            DivideBy4 = 0b001,
            DivideBy8 = 0b010,
            DivideBy16 = 0b011,
            DivideBy32 = 0b100,
            DivideBy64 = 0b101,
            DivideBy128 = 0b110,
            DivideBy256 = 0b111
        ],
        /// Master selection
        MSTR OFFSET(2) NUMBITS(1) [],
        /// Clock polarity
        CPOL OFFSET(1) NUMBITS(1) [],
        /// Clock phase
        CPHA OFFSET(0) NUMBITS(1) []
    ],
    CR2 [
        /// SS output enable
        SSOE OFFSET(2) NUMBITS(1) []
    ],
    SR [
        /// Busy flag
        BSY OFFSET(7) NUMBITS(1) [],
        /// Overrun flag
        OVR OFFSET(6) NUMBITS(1) [],
        /// Mode fault
        MODF OFFSET(5) NUMBITS(1) [],
        /// Transmit buffer empty
        TXE OFFSET(1) NUMBITS(1) [],
        /// Receive buffer not empty
        RXNE OFFSET(0) NUMBITS(1) []
    ],
    DR [
        /// 8-bit data register
        DR OFFSET(0) NUMBITS(8) []
    ]
];

pub const SPI1_BASE: Mmio = unsafe { Mmio::new(0x4001_3000, 0x400) };

/// PA4 to PA7 carry SPI1 on alternate function 5.
pub const SPI1_ALTERNATE_FUNCTION: AlternateFunction = AlternateFunction::AF5;

/// Status register reads before a wait gives up.
pub const DEFAULT_POLL_LIMIT: u32 = 100_000;

/// Fastest serial clock SPI1 supports in master mode.
pub const MAX_SCK_FREQUENCY_HZ: u32 = 45_000_000;

/// Divider from the APB2 clock to the serial clock.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BaudRatePrescaler {
    DivideBy2 = 0b000,
    DivideBy4 = 0b001,
    DivideBy8 = 0b010,
    DivideBy16 = 0b011,
    DivideBy32 = 0b100,
    DivideBy64 = 0b101,
    DivideBy128 = 0b110,
    DivideBy256 = 0b111,
}

impl BaudRatePrescaler {
    /// Fastest first.
    pub const ALL: [BaudRatePrescaler; 8] = [
        BaudRatePrescaler::DivideBy2,
        BaudRatePrescaler::DivideBy4,
        BaudRatePrescaler::DivideBy8,
        BaudRatePrescaler::DivideBy16,
        BaudRatePrescaler::DivideBy32,
        BaudRatePrescaler::DivideBy64,
        BaudRatePrescaler::DivideBy128,
        BaudRatePrescaler::DivideBy256,
    ];

    /// Prescaler for the 3-bit `BR` field value `bits`.
    pub fn from_bits(bits: u32) -> Result<Self, ErrorCode> {
        Self::ALL
            .get(bits as usize)
            .copied()
            .ok_or(ErrorCode::INVAL)
    }

    /// Prescaler dividing by exactly `divisor`.
    pub fn from_divisor(divisor: u32) -> Result<Self, ErrorCode> {
        Self::ALL
            .iter()
            .copied()
            .find(|prescaler| prescaler.divisor() == divisor)
            .ok_or(ErrorCode::INVAL)
    }

    pub fn bits(self) -> u32 {
        self as u32
    }

    pub fn divisor(self) -> u32 {
        2 << self.bits()
    }
}

/// Who drives the NSS pin (PA4).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NssManagement {
    /// PA4 is a GPIO output toggled around every transfer. The block's
    /// internal slave select is tied high so it stays master.
    Software,
    /// PA4 is routed to the block, which drives it low for as long as it is
    /// enabled.
    Hardware,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SpiConfig {
    pub prescaler: BaudRatePrescaler,
    pub polarity: ClockPolarity,
    pub phase: ClockPhase,
    pub nss: NssManagement,
    /// Status register reads a single wait may take. Must not be zero.
    pub poll_limit: u32,
}

impl SpiConfig {
    /// Mode 0, APB2 / 16, software chip select.
    pub const fn new() -> SpiConfig {
        SpiConfig {
            prescaler: BaudRatePrescaler::DivideBy16,
            polarity: ClockPolarity::IdleLow,
            phase: ClockPhase::SampleLeading,
            nss: NssManagement::Software,
            poll_limit: DEFAULT_POLL_LIMIT,
        }
    }

    pub const fn with_prescaler(self, prescaler: BaudRatePrescaler) -> SpiConfig {
        SpiConfig { prescaler, ..self }
    }

    pub const fn with_polarity(self, polarity: ClockPolarity) -> SpiConfig {
        SpiConfig { polarity, ..self }
    }

    pub const fn with_phase(self, phase: ClockPhase) -> SpiConfig {
        SpiConfig { phase, ..self }
    }

    pub const fn with_nss(self, nss: NssManagement) -> SpiConfig {
        SpiConfig { nss, ..self }
    }

    pub const fn with_poll_limit(self, poll_limit: u32) -> SpiConfig {
        SpiConfig { poll_limit, ..self }
    }

    /// Check the configuration against an APB2 clock of `pclk_frequency` Hz.
    pub fn validate(&self, pclk_frequency: u32) -> Result<(), ErrorCode> {
        if self.poll_limit == 0 || pclk_frequency == 0 {
            return Err(ErrorCode::INVAL);
        }
        if pclk_frequency / self.prescaler.divisor() > MAX_SCK_FREQUENCY_HZ {
            return Err(ErrorCode::INVAL);
        }
        Ok(())
    }
}

impl Default for SpiConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// The four pins SPI1 uses.
pub struct SpiPins<'a, G: RegisterBus = Mmio> {
    pub nss: &'a Pin<'a, G>,
    pub sck: &'a Pin<'a, G>,
    pub miso: &'a Pin<'a, G>,
    pub mosi: &'a Pin<'a, G>,
}

pub struct Spi<'a, S: RegisterBus = Mmio, G: RegisterBus = Mmio> {
    registers: S,
    clock: &'a dyn ClockInterface,
    pins: SpiPins<'a, G>,
    pclk_frequency: u32,

    /// Applied by the next `configure`/`init`, and the live settings once
    /// configured.
    config: Cell<SpiConfig>,
    configured: Cell<bool>,

    active_slave: Cell<ChipSelectPolar<'a, Pin<'a, G>>>,
    active_after: Cell<bool>,
}

impl<'a, S: RegisterBus, G: RegisterBus> Spi<'a, S, G> {
    /// `pclk_frequency` is the APB2 clock in Hz. The chip select starts out
    /// as the NSS pin, active low.
    pub fn new(
        registers: S,
        clock: &'a dyn ClockInterface,
        pins: SpiPins<'a, G>,
        pclk_frequency: u32,
    ) -> Self {
        let nss = pins.nss;
        Spi {
            registers,
            clock,
            pins,
            pclk_frequency,

            config: Cell::new(SpiConfig::new()),
            configured: Cell::new(false),

            active_slave: Cell::new(ChipSelectPolar {
                pin: nss,
                polarity: Polarity::Low,
            }),
            active_after: Cell::new(false),
        }
    }

    fn cr1(&self) -> MmioRegister<'_, S, CR1::Register> {
        MmioRegister::new(&self.registers, offset::CR1)
    }

    fn cr2(&self) -> MmioRegister<'_, S, CR2::Register> {
        MmioRegister::new(&self.registers, offset::CR2)
    }

    fn sr(&self) -> MmioRegister<'_, S, SR::Register> {
        MmioRegister::new(&self.registers, offset::SR)
    }

    fn dr(&self) -> MmioRegister<'_, S, DR::Register> {
        MmioRegister::new(&self.registers, offset::DR)
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

    pub fn config(&self) -> SpiConfig {
        self.config.get()
    }

    pub fn is_configured(&self) -> bool {
        self.configured.get()
    }

    /// Bring up SPI1 as master with `config`: clocks, pins, then the control
    /// registers with the block enabled last. Calling it again reapplies the
    /// whole sequence.
    ///
    /// An invalid `config` is rejected with `INVAL` before any register is
    /// touched.
    pub fn configure(&self, config: SpiConfig) -> Result<(), ErrorCode> {
        config.validate(self.pclk_frequency)?;
        if self.configured.get() {
            self.wait_for(SR::BSY::CLEAR)?;
        }
        self.config.set(config);

        for pin in [self.pins.nss, self.pins.sck, self.pins.miso, self.pins.mosi] {
            pin.enable_port_clock();
        }
        if !self.is_enabled_clock() {
            self.enable_clock();
        }

        self.configure_pins(config.nss);
        self.configure_control(&config);
        self.configured.set(true);

        if CONFIG.trace_spi {
            debug!(
                "spi1: master at {} Hz, {:?}/{:?}, {:?} nss on P{:?}{}",
                self.get_rate(),
                config.polarity,
                config.phase,
                config.nss,
                self.pins.nss.port_id(),
                self.pins.nss.number()
            );
        }
        Ok(())
    }

    fn configure_pins(&self, nss: NssManagement) {
        for pin in [self.pins.sck, self.pins.miso, self.pins.mosi] {
            pin.set_mode(Mode::AlternateFunctionMode);
            pin.set_alternate_function(SPI1_ALTERNATE_FUNCTION);
        }
        match nss {
            NssManagement::Software => {
                // Deselected before it starts driving the line.
                self.pins.nss.set();
                self.pins.nss.make_output();
            }
            NssManagement::Hardware => {
                self.pins.nss.set_mode(Mode::AlternateFunctionMode);
                self.pins.nss.set_alternate_function(SPI1_ALTERNATE_FUNCTION);
            }
        }
    }

    fn configure_control(&self, config: &SpiConfig) {
        match config.nss {
            NssManagement::Software => self.cr2().modify(CR2::SSOE::CLEAR),
            NssManagement::Hardware => self.cr2().modify(CR2::SSOE::SET),
        }

        // Also disables the block if it was running. Full duplex, 8-bit
        // frames, MSB first.
        self.cr1().set(0);
        self.cr1().modify(CR1::MSTR::SET);
        self.cr1().modify(CR1::BR.val(config.prescaler.bits()));
        self.cr1().modify(Self::polarity_bits(config.polarity));
        self.cr1().modify(Self::phase_bits(config.phase));
        if config.nss == NssManagement::Software {
            // Without SSI high the block sees another master and drops out
            // of master mode (MODF).
            self.cr1().modify(CR1::SSM::SET + CR1::SSI::SET);
        }
        self.cr1().modify(CR1::SPE::SET);
    }

    // IdleLow  = CPOL = 0
    // IdleHigh = CPOL = 1
    fn polarity_bits(polarity: ClockPolarity) -> FieldValue<u32, CR1::Register> {
        match polarity {
            ClockPolarity::IdleLow => CR1::CPOL::CLEAR,
            ClockPolarity::IdleHigh => CR1::CPOL::SET,
        }
    }

    // SampleLeading  = CPHA = 0
    // SampleTrailing = CPHA = 1
    fn phase_bits(phase: ClockPhase) -> FieldValue<u32, CR1::Register> {
        match phase {
            ClockPhase::SampleLeading => CR1::CPHA::CLEAR,
            ClockPhase::SampleTrailing => CR1::CPHA::SET,
        }
    }

    /// Change control bits that may only be written while the block is
    /// disabled. Waits for the bus to go idle first.
    fn set_cr<F>(&self, f: F) -> Result<(), ErrorCode>
    where
        F: FnOnce(),
    {
        self.wait_for(SR::BSY::CLEAR)?;
        self.cr1().modify(CR1::SPE::CLEAR);
        f();
        self.cr1().modify(CR1::SPE::SET);
        Ok(())
    }

    /// Store `config` for the next `configure`, or apply the fields `f`
    /// writes to a running block.
    fn update_config<F>(&self, config: SpiConfig, f: F) -> Result<(), ErrorCode>
    where
        F: FnOnce(),
    {
        config.validate(self.pclk_frequency)?;
        if self.configured.get() {
            self.set_cr(f)?;
        }
        self.config.set(config);
        Ok(())
    }

    /// Read SR until `condition` holds, at most `poll_limit` times.
    fn wait_for(&self, condition: FieldValue<u32, SR::Register>) -> Result<(), ErrorCode> {
        let sr = self.sr();
        for _ in 0..self.config.get().poll_limit {
            if sr.matches_all(condition) {
                return Ok(());
            }
            core::hint::spin_loop();
        }
        Err(ErrorCode::TIMEOUT)
    }

    fn ensure_configured(&self) -> Result<(), ErrorCode> {
        if self.configured.get() {
            Ok(())
        } else {
            Err(ErrorCode::OFF)
        }
    }

    /// Throw away a byte an earlier transmit-only transfer left behind, so
    /// the next receive returns the byte clocked in with it.
    fn drain_rx(&self) {
        let status = self.sr().extract();
        if status.is_set(SR::RXNE) || status.is_set(SR::OVR) {
            // Reading DR and then SR clears both flags.
            let _ = self.dr().get();
            let _ = self.sr().get();
        }
    }

    fn transfer(&self, write: &[u8], mut read: Option<&mut [u8]>) -> Result<usize, ErrorCode> {
        for (i, &byte) in write.iter().enumerate() {
            self.transmit(byte)?;
            let received = self.receive()?;
            if let Some(slot) = read.as_deref_mut().and_then(|buf| buf.get_mut(i)) {
                *slot = received;
            }
        }
        Ok(write.len())
    }

    /// Run `f` with the active chip select asserted. It is released again
    /// afterwards unless held low, and always when `f` fails.
    fn with_chip_select<T>(
        &self,
        f: impl FnOnce() -> Result<T, ErrorCode>,
    ) -> Result<T, ErrorCode> {
        self.drain_rx();
        let cs = self.active_slave.get();
        cs.activate();
        let result = f();
        if result.is_err() || !self.active_after.get() {
            cs.deactivate();
        }
        result
    }
}

impl<'a, S: RegisterBus, G: RegisterBus> SpiMaster for Spi<'a, S, G> {
    type ChipSelect = ChipSelectPolar<'a, Pin<'a, G>>;

    fn init(&self) -> Result<(), ErrorCode> {
        self.configure(self.config.get())
    }

    fn is_busy(&self) -> bool {
        self.sr().is_set(SR::BSY)
    }

    fn transmit(&self, byte: u8) -> Result<(), ErrorCode> {
        self.ensure_configured()?;
        self.wait_for(SR::TXE::SET)?;
        self.dr().write(DR::DR.val(byte as u32));
        self.wait_for(SR::BSY::CLEAR)
    }

    fn receive(&self) -> Result<u8, ErrorCode> {
        self.ensure_configured()?;
        self.wait_for(SR::RXNE::SET)?;
        Ok(self.dr().read(DR::DR) as u8)
    }

    fn exchange(&self, byte: u8) -> Result<u8, ErrorCode> {
        self.ensure_configured()?;
        let result = self.with_chip_select(|| {
            self.transmit(byte)?;
            self.receive()
        });
        if CONFIG.trace_spi {
            debug!("spi1: {:#04x} -> {:?}", byte, result);
        }
        result
    }

    fn exchange_bytes(&self, write: &[u8], read: Option<&mut [u8]>) -> Result<usize, ErrorCode> {
        self.ensure_configured()?;
        let count = match read.as_deref() {
            Some(buf) => cmp::min(write.len(), buf.len()),
            None => write.len(),
        };
        if count == 0 {
            return Err(ErrorCode::SIZE);
        }
        let result = self.with_chip_select(|| self.transfer(&write[..count], read));
        if CONFIG.trace_spi {
            debug!("spi1: {} byte transfer -> {:?}", count, result);
        }
        result
    }

    fn specify_chip_select(&self, cs: Self::ChipSelect) -> Result<(), ErrorCode> {
        self.active_slave.get().deactivate();
        cs.pin.enable_port_clock();
        cs.deactivate();
        cs.pin.make_output();
        self.active_slave.set(cs);
        Ok(())
    }

    fn set_rate(&self, rate: u32) -> Result<u32, ErrorCode> {
        let prescaler = BaudRatePrescaler::ALL
            .iter()
            .copied()
            .find(|prescaler| self.pclk_frequency / prescaler.divisor() <= rate)
            .ok_or(ErrorCode::INVAL)?;
        let config = self.config.get().with_prescaler(prescaler);
        self.update_config(config, || {
            self.cr1().modify(CR1::BR.val(prescaler.bits()))
        })?;
        Ok(self.get_rate())
    }

    fn get_rate(&self) -> u32 {
        self.pclk_frequency / self.config.get().prescaler.divisor()
    }

    fn set_polarity(&self, polarity: ClockPolarity) -> Result<(), ErrorCode> {
        let config = self.config.get().with_polarity(polarity);
        self.update_config(config, || {
            self.cr1().modify(Self::polarity_bits(polarity))
        })
    }

    fn get_polarity(&self) -> ClockPolarity {
        self.config.get().polarity
    }

    fn set_phase(&self, phase: ClockPhase) -> Result<(), ErrorCode> {
        let config = self.config.get().with_phase(phase);
        self.update_config(config, || self.cr1().modify(Self::phase_bits(phase)))
    }

    fn get_phase(&self) -> ClockPhase {
        self.config.get().phase
    }

    fn hold_low(&self) {
        self.active_after.set(true);
    }

    fn release_low(&self) {
        self.active_after.set(false);
        self.active_slave.get().deactivate();
    }
}
