// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Peripheral implementations for the STM32F4xx MCU.
//!
//! STM32F446RE: <https://www.st.com/en/microcontrollers/stm32f4.html>
//!
//! Every driver owns a [`RegisterBus`](kernel::utilities::mmio::RegisterBus)
//! for its register block. On the chip that is the `*_BASE` constant of the
//! module; the unit tests run the same drivers against emulated blocks.

#![no_std]

#[cfg(test)]
extern crate std;

#[cfg(test)]
mod emulation;

pub mod gpio;
pub mod rcc;
pub mod spi;
