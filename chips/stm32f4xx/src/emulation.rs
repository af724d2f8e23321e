// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Register-level stand-ins for GPIO and SPI used by the host tests.
//!
//! Both record what the driver does to them in a shared [`Trace`], so a test
//! can check the order of chip select edges and data register accesses.

use core::cell::{Cell, RefCell};
use std::vec::Vec;

use kernel::utilities::mmio::{InMemoryBus, RegisterBus};

use crate::gpio::offset as gpio;
use crate::spi::offset as spi;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Event {
    /// A GPIO pin was driven high through BSRR.
    PinHigh(usize),
    /// A GPIO pin was driven low through BSRR.
    PinLow(usize),
    /// A byte was written to the SPI data register.
    DataWrite(u8),
    /// A byte was read from the SPI data register.
    DataRead(u8),
    /// A value was written to SPI CR1.
    ControlWrite(u32),
}

pub(crate) struct Trace {
    events: RefCell<Vec<Event>>,
}

impl Trace {
    pub(crate) fn new() -> Self {
        Trace {
            events: RefCell::new(Vec::new()),
        }
    }

    fn record(&self, event: Event) {
        self.events.borrow_mut().push(event);
    }

    pub(crate) fn events(&self) -> Vec<Event> {
        self.events.borrow().clone()
    }

    pub(crate) fn clear(&self) {
        self.events.borrow_mut().clear();
    }

    pub(crate) fn count(&self, matches: impl Fn(&Event) -> bool) -> usize {
        self.events.borrow().iter().filter(|e| matches(e)).count()
    }
}

/// A GPIO port whose BSRR writes land in ODR, with IDR following ODR.
pub(crate) struct FakeGpio<'t> {
    words: InMemoryBus<10>,
    trace: &'t Trace,
}

impl<'t> FakeGpio<'t> {
    pub(crate) fn new(trace: &'t Trace) -> Self {
        FakeGpio {
            words: InMemoryBus::new(),
            trace,
        }
    }

    pub(crate) fn level(&self, pin: usize) -> bool {
        self.words.read(gpio::ODR) & (1 << pin) != 0
    }

    pub(crate) fn snapshot(&self) -> [u32; 10] {
        self.words.snapshot()
    }
}

impl RegisterBus for FakeGpio<'_> {
    fn read(&self, offset: usize) -> u32 {
        match offset {
            // Write-only.
            gpio::BSRR => 0,
            _ => self.words.read(offset),
        }
    }

    fn write(&self, offset: usize, value: u32) {
        if offset != gpio::BSRR {
            self.words.write(offset, value);
            return;
        }
        let mut odr = self.words.read(gpio::ODR);
        for pin in 0..16 {
            // Set wins when both bits of a pin are written.
            if value & (1 << pin) != 0 {
                odr |= 1 << pin;
                self.trace.record(Event::PinHigh(pin));
            } else if value & (1 << (pin + 16)) != 0 {
                odr &= !(1 << pin);
                self.trace.record(Event::PinLow(pin));
            }
        }
        self.words.write(gpio::ODR, odr);
        self.words.write(gpio::IDR, odr);
    }
}

/// What the device on the other end of the bus sends back.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Peer {
    /// Loopback: every byte comes back as sent.
    Echo,
    /// Always answers with the same byte.
    Reply(u8),
    /// Nothing ever arrives in the receive buffer.
    Silent,
}

const CR1_SPE: u32 = 1 << 6;
const SR_RXNE: u32 = 1 << 0;
const SR_TXE: u32 = 1 << 1;
const SR_OVR: u32 = 1 << 6;
const SR_BSY: u32 = 1 << 7;

/// Status register reads a byte stays on the wire for.
const SHIFT_READS: u32 = 2;

/// An SPI block in master mode.
///
/// A byte written to DR is shifted out over the next few SR reads, but only
/// while SPE is set. During that time TXE is clear and BSY set. Once done, the
/// peer's reply lands in DR and RXNE is set.
pub(crate) struct FakeSpi<'t> {
    trace: &'t Trace,
    cr1: Cell<u32>,
    cr2: Cell<u32>,
    peer: Cell<Peer>,
    in_flight: Cell<Option<u8>>,
    countdown: Cell<u32>,
    rx: Cell<Option<u8>>,
    overrun: Cell<bool>,
    tx_stuck: Cell<bool>,
    busy_stuck: Cell<bool>,
    status_reads: Cell<usize>,
}

impl<'t> FakeSpi<'t> {
    pub(crate) fn new(trace: &'t Trace) -> Self {
        FakeSpi {
            trace,
            cr1: Cell::new(0),
            cr2: Cell::new(0),
            peer: Cell::new(Peer::Echo),
            in_flight: Cell::new(None),
            countdown: Cell::new(0),
            rx: Cell::new(None),
            overrun: Cell::new(false),
            tx_stuck: Cell::new(false),
            busy_stuck: Cell::new(false),
            status_reads: Cell::new(0),
        }
    }

    pub(crate) fn set_peer(&self, peer: Peer) {
        self.peer.set(peer);
    }

    /// TXE never sets.
    pub(crate) fn stick_tx(&self) {
        self.tx_stuck.set(true);
    }

    /// A written byte never finishes shifting out.
    pub(crate) fn stick_busy(&self) {
        self.busy_stuck.set(true);
    }

    /// Put a byte in the receive buffer as if left over from an earlier
    /// transfer.
    pub(crate) fn preload_rx(&self, byte: u8) {
        self.rx.set(Some(byte));
    }

    pub(crate) fn cr1(&self) -> u32 {
        self.cr1.get()
    }

    pub(crate) fn cr2(&self) -> u32 {
        self.cr2.get()
    }

    pub(crate) fn status_reads(&self) -> usize {
        self.status_reads.get()
    }

    fn advance(&self) {
        if self.cr1.get() & CR1_SPE == 0 || self.busy_stuck.get() {
            return;
        }
        if let Some(byte) = self.in_flight.get() {
            let left = self.countdown.get().saturating_sub(1);
            self.countdown.set(left);
            if left == 0 {
                self.in_flight.set(None);
                self.deliver(byte);
            }
        }
    }

    fn deliver(&self, sent: u8) {
        let reply = match self.peer.get() {
            Peer::Echo => Some(sent),
            Peer::Reply(byte) => Some(byte),
            Peer::Silent => None,
        };
        if let Some(byte) = reply {
            if self.rx.get().is_some() {
                // The unread byte is kept, the new one is lost.
                self.overrun.set(true);
            } else {
                self.rx.set(Some(byte));
            }
        }
    }

    fn status(&self) -> u32 {
        self.status_reads.set(self.status_reads.get() + 1);
        self.advance();

        let mut sr = 0;
        if self.rx.get().is_some() {
            sr |= SR_RXNE;
        }
        if self.in_flight.get().is_some() {
            sr |= SR_BSY;
        } else if !self.tx_stuck.get() {
            sr |= SR_TXE;
        }
        if self.overrun.get() {
            sr |= SR_OVR;
        }
        sr
    }
}

impl RegisterBus for FakeSpi<'_> {
    fn read(&self, offset: usize) -> u32 {
        match offset {
            spi::CR1 => self.cr1.get(),
            spi::CR2 => self.cr2.get(),
            spi::SR => self.status(),
            spi::DR => {
                let byte = self.rx.take().unwrap_or(0);
                self.overrun.set(false);
                self.trace.record(Event::DataRead(byte));
                u32::from(byte)
            }
            _ => 0,
        }
    }

    fn write(&self, offset: usize, value: u32) {
        match offset {
            spi::CR1 => {
                self.trace.record(Event::ControlWrite(value));
                self.cr1.set(value);
            }
            spi::CR2 => self.cr2.set(value),
            spi::DR => {
                let byte = value as u8;
                self.trace.record(Event::DataWrite(byte));
                self.in_flight.set(Some(byte));
                self.countdown.set(SHIFT_READS);
            }
            _ => {}
        }
    }
}
