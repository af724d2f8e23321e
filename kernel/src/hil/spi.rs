// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Interface for SPI controller (master) communication.
//!
//! The interface is synchronous: every operation polls the hardware until it
//! completes or a bounded wait runs out, so a stuck peripheral surfaces as
//! [`ErrorCode::TIMEOUT`] instead of a hang.

use crate::ErrorCode;

/// Clock polarity (CPOL) defines whether the SPI clock is high or low when
/// idle.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ClockPolarity {
    /// The clock is low when the SPI bus is not active. This is CPOL = 0.
    IdleLow,
    /// The clock is high when the SPI bus is not active. This is CPOL = 1.
    IdleHigh,
}

/// Clock phase (CPHA) defines whether to sample and send data on a leading or
/// trailing clock edge.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ClockPhase {
    /// Sample on the leading clock edge. This is CPHA = 0.
    SampleLeading,
    /// Sample on the trailing clock edge. This is CPHA = 1.
    SampleTrailing,
}

/// Utility types for modeling chip select pins in a [`SpiMaster`]
/// implementation.
pub mod cs {
    /// Whether high or low on a chip-select pin marks the peripheral active.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub enum Polarity {
        /// Chip select is active high.
        High,
        /// Chip select is active low.
        Low,
    }

    mod private {
        pub trait Sealed {}
    }

    /// Marker trait for the polarity a peripheral requires.
    ///
    /// Sealed, only implemented for [`ActiveLow`] and [`ActiveHigh`].
    pub trait ChipSelectActivePolarity: private::Sealed {
        const POLARITY: Polarity;
    }

    /// Marks a peripheral as requiring an active low chip select.
    pub enum ActiveLow {}
    /// Marks a peripheral as requiring an active high chip select.
    pub enum ActiveHigh {}

    impl private::Sealed for ActiveLow {}
    impl private::Sealed for ActiveHigh {}

    impl ChipSelectActivePolarity for ActiveLow {
        const POLARITY: Polarity = Polarity::Low;
    }

    impl ChipSelectActivePolarity for ActiveHigh {
        const POLARITY: Polarity = Polarity::High;
    }

    /// A type that can be converted to a controller's
    /// [`SpiMaster::ChipSelect`](super::SpiMaster::ChipSelect) for a given
    /// `POLARITY`.
    ///
    /// A controller that only supports one polarity implements this only for
    /// that marker, so a board cannot hand it a pin of the wrong polarity.
    pub trait IntoChipSelect<T, POLARITY> {
        fn into_cs(self) -> T;
    }

    /// A GPIO output used as a chip select together with its polarity.
    pub struct ChipSelectPolar<'a, P: crate::hil::gpio::Output> {
        /// The underlying chip select "pin".
        pub pin: &'a P,
        /// The polarity from which this wrapper was derived using
        /// [`IntoChipSelect`].
        pub polarity: Polarity,
    }

    impl<P: crate::hil::gpio::Output> Clone for ChipSelectPolar<'_, P> {
        fn clone(&self) -> Self {
            *self
        }
    }

    impl<P: crate::hil::gpio::Output> Copy for ChipSelectPolar<'_, P> {}

    impl<'a, P: crate::hil::gpio::Output, A: ChipSelectActivePolarity>
        IntoChipSelect<ChipSelectPolar<'a, P>, A> for &'a P
    {
        fn into_cs(self) -> ChipSelectPolar<'a, P> {
            ChipSelectPolar {
                pin: self,
                polarity: A::POLARITY,
            }
        }
    }

    impl<P: crate::hil::gpio::Output> ChipSelectPolar<'_, P> {
        /// Deactivate the chip select pin.
        ///
        /// High if active low, low if active high.
        pub fn deactivate(&self) {
            match self.polarity {
                Polarity::Low => self.pin.set(),
                Polarity::High => self.pin.clear(),
            }
        }

        /// Activate the chip select pin.
        ///
        /// Low if active low, high if active high.
        pub fn activate(&self) {
            match self.polarity {
                Polarity::Low => self.pin.clear(),
                Polarity::High => self.pin.set(),
            }
        }
    }
}

/// The interface for SPI master hardware.
///
/// Every byte clocked out produces a byte clocked in, so the primitive
/// operation is [`exchange`](SpiMaster::exchange). [`transmit`](SpiMaster::transmit)
/// and [`receive`](SpiMaster::receive) are the two halves it is built from and
/// do not touch the chip select.
pub trait SpiMaster {
    /// Chip select for the peripheral on the other end of the bus.
    type ChipSelect: Copy;

    /// Configure the hardware and enable it. Must be called before any
    /// transfer.
    fn init(&self) -> Result<(), ErrorCode>;

    /// Whether a transfer is still on the wire.
    fn is_busy(&self) -> bool;

    /// Wait for room in the transmit buffer, write `byte`, and wait until it
    /// has been shifted out.
    fn transmit(&self, byte: u8) -> Result<(), ErrorCode>;

    /// Wait for a byte in the receive buffer and return it.
    fn receive(&self) -> Result<u8, ErrorCode>;

    /// Select the peripheral, transmit `byte`, receive the byte clocked in at
    /// the same time, and deselect the peripheral.
    ///
    /// The chip select is released even when the transfer fails.
    fn exchange(&self, byte: u8) -> Result<u8, ErrorCode>;

    /// Full-duplex transfer of `min(write.len(), read.len())` bytes under a
    /// single chip select assertion. Without a read buffer the incoming bytes
    /// are discarded and `write.len()` bytes are sent.
    ///
    /// Returns the number of bytes transferred. Zero bytes is `SIZE`.
    fn exchange_bytes(&self, write: &[u8], read: Option<&mut [u8]>) -> Result<usize, ErrorCode>;

    /// Use `cs` as the chip select for subsequent transfers.
    fn specify_chip_select(&self, cs: Self::ChipSelect) -> Result<(), ErrorCode>;

    /// Set the serial clock to the fastest rate not above `rate` Hz. Returns
    /// the actual rate.
    fn set_rate(&self, rate: u32) -> Result<u32, ErrorCode>;
    fn get_rate(&self) -> u32;

    fn set_polarity(&self, polarity: ClockPolarity) -> Result<(), ErrorCode>;
    fn get_polarity(&self) -> ClockPolarity;

    fn set_phase(&self, phase: ClockPhase) -> Result<(), ErrorCode>;
    fn get_phase(&self) -> ClockPhase;

    /// Keep the chip select asserted after the next transfers complete.
    fn hold_low(&self);

    /// Deassert the chip select after each transfer again, releasing it now if
    /// it was being held.
    fn release_low(&self);
}
