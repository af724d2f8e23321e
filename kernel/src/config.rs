// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Data structure for storing compile-time configuration options.
//!
//! Configuration lives in a typed `const` object rather than in `#[cfg]`
//! blocks scattered through the code. Every code path is type-checked no matter
//! which options are enabled, and the compiler folds the constants so a
//! disabled option costs nothing in the final binary.

/// Data structure holding compile-time configuration options.
///
/// To change the configuration, enable the matching cargo feature on the
/// kernel crate from the board crate.
pub struct Config {
    /// Whether SPI drivers should trace configuration steps and every byte
    /// exchange to the debug output.
    ///
    /// Tracing goes through `debug!()` and is slow on a semihosting console, so
    /// it is meant for bring-up only.
    pub trace_spi: bool,

    /// Whether the board's console may be installed as the debug writer.
    ///
    /// A semihosting console traps into the debugger on every write and
    /// faults when no probe is attached. With this off, `debug!()` output and
    /// panic messages are dropped and the console is never touched.
    pub debug_console: bool,

    /// Whether the panic handler should print the panic message and location.
    // Printing pulls the formatting machinery into the binary. Boards that are
    // tight on flash can turn it off.
    pub debug_panics: bool,
}

/// A unique instance of `Config` where compile-time configuration options are
/// defined. This is the only location in the workspace where `#[cfg(x)]` is
/// used to configure code based on Cargo features.
pub const CONFIG: Config = Config {
    trace_spi: cfg!(feature = "trace_spi"),
    debug_console: cfg!(feature = "debug_console"),
    debug_panics: !cfg!(feature = "no_debug_panics"),
};
