// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Utility functions and macros provided by the kernel crate.

pub mod mmio;
pub mod static_init;

/// The Tock Register Interface.
///
/// This is a re-export of the `tock-registers` crate provided for
/// convenience. Bitfields are declared with `register_bitfields!` and accessed
/// through the `interfaces` traits, which [`mmio::MmioRegister`] implements on
/// top of a [`mmio::RegisterBus`].
pub mod registers {
    pub use tock_registers::fields::{Field, FieldValue};
    pub use tock_registers::interfaces;
    pub use tock_registers::register_bitfields;
    pub use tock_registers::RegisterLongName;
}
