// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Board file for Nucleo-F446RE development board
//!
//! - <https://www.st.com/en/evaluation-tools/nucleo-f446re.html>
//!
//! Brings up SPI1 on the Arduino header (D13 SCK = PA5, D12 MISO = PA6,
//! D11 MOSI = PA7, NSS = PA4) and then exchanges one byte with whatever is
//! attached, forever. Wiring D11 to D12 makes every byte come back as sent.
//!
//! Built with the `debug_console` feature, received bytes are printed over
//! semihosting whenever they change. Without it nothing is printed and the
//! board runs without a debug probe.

#![no_std]
#![no_main]
#![deny(missing_docs)]

use cortex_m_rt::entry;
use kernel::hil::spi::SpiMaster;
use kernel::{debug, static_init, ErrorCode};
use stm32f4xx::gpio::{Pin, Port, PortId, GPIOA_BASE};
use stm32f4xx::rcc::{
    PeripheralClock, PeripheralClockType, Rcc, HCLK1, HSI_FREQUENCY_HZ, PCLK2, RCC_BASE,
};
use stm32f4xx::spi::{Spi, SpiConfig, SpiPins, SPI1_BASE};

/// Support routines for debugging I/O.
pub mod io;

/// Byte clocked out on every exchange.
const PATTERN: u8 = 0x55;

/// Set up the debug writer and SPI1. Returns the driver, configured and
/// enabled.
unsafe fn start() -> Result<&'static Spi<'static>, ErrorCode> {
    let writer = static_init!(io::Writer, io::Writer::new());
    kernel::debug::set_console_writer(writer);

    // We use the default HSI 16Mhz clock
    let rcc: &'static Rcc = static_init!(Rcc, Rcc::new(RCC_BASE));
    let pclk2 = rcc.get_apb2_frequency().unwrap_or(HSI_FREQUENCY_HZ);

    let gpioa_clock = static_init!(
        PeripheralClock<'static>,
        PeripheralClock::new(PeripheralClockType::AHB1(HCLK1::GPIOA), rcc)
    );
    let spi1_clock = static_init!(
        PeripheralClock<'static>,
        PeripheralClock::new(PeripheralClockType::APB2(PCLK2::SPI1), rcc)
    );

    let gpioa: &'static Port<'static> = static_init!(
        Port<'static>,
        Port::new(PortId::A, GPIOA_BASE, gpioa_clock)
    );
    let pins = SpiPins {
        nss: static_init!(Pin<'static>, gpioa.pin(4).ok_or(ErrorCode::NODEVICE)?),
        sck: static_init!(Pin<'static>, gpioa.pin(5).ok_or(ErrorCode::NODEVICE)?),
        miso: static_init!(Pin<'static>, gpioa.pin(6).ok_or(ErrorCode::NODEVICE)?),
        mosi: static_init!(Pin<'static>, gpioa.pin(7).ok_or(ErrorCode::NODEVICE)?),
    };

    let spi: &'static Spi<'static> = static_init!(
        Spi<'static>,
        Spi::new(SPI1_BASE, spi1_clock, pins, pclk2)
    );
    spi.configure(SpiConfig::new())?;

    debug!(
        "nucleo_f446re: SPI1 master at {} Hz, APB2 {} Hz",
        spi.get_rate(),
        pclk2
    );
    Ok(spi)
}

/// Main function called after RAM initialized.
#[entry]
fn main() -> ! {
    let spi = match unsafe { start() } {
        Ok(spi) => spi,
        Err(error) => {
            debug!("nucleo_f446re: SPI1 setup failed: {:?}", error);
            loop {
                cortex_m::asm::wfi();
            }
        }
    };

    let mut last = None;
    loop {
        match spi.exchange(PATTERN) {
            Ok(byte) => {
                if last != Some(byte) {
                    debug!("spi1: sent {:#04x}, received {:#04x}", PATTERN, byte);
                    last = Some(byte);
                }
            }
            Err(error) => {
                debug!("spi1: exchange failed: {:?}", error);
                last = None;
            }
        }
    }
}
