// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Support for in-kernel debugging.
//!
//! For printing, this module provides the `debug!()` and `debug_verbose!()`
//! macros. Output goes to the writer installed by the board with
//! [`set_console_writer`]; until one is installed all output is dropped.
//!
//! ```rust,ignore
//! debug!("Yes the code gets here with value {}", i);
//! debug_verbose!("got here"); // includes message count, file, and line
//! ```
//!
//! The panic handler of a board formats the panic through [`panic`], which
//! prints to the same kind of writer and then spins forever.

use core::fmt::{write, Arguments, Write};
use core::panic::PanicInfo;
use core::ptr::addr_of_mut;
use core::sync::atomic::{AtomicUsize, Ordering};

use crate::config;

/// Raw byte sink for debug output.
pub trait IoWrite {
    /// Write `buf` to the underlying device and return how many bytes were
    /// consumed.
    fn write(&mut self, buf: &[u8]) -> usize;
}

static mut DEBUG_WRITER: Option<&'static mut dyn IoWrite> = None;

/// Number of `debug_verbose!()` messages printed so far.
static DEBUG_COUNT: AtomicUsize = AtomicUsize::new(0);

/// Install the writer used by `debug!()`.
///
/// # Safety
///
/// Must be called once during board setup, before any other code can print.
pub unsafe fn set_debug_writer(writer: &'static mut dyn IoWrite) {
    *addr_of_mut!(DEBUG_WRITER) = Some(writer);
}

/// Install the board's console as the debug writer if the kernel is built
/// with `debug_console`. Returns whether it was installed.
///
/// # Safety
///
/// Same as [`set_debug_writer`].
pub unsafe fn set_console_writer(writer: &'static mut dyn IoWrite) -> bool {
    install_console(config::CONFIG.debug_console, writer)
}

unsafe fn install_console(enabled: bool, writer: &'static mut dyn IoWrite) -> bool {
    if enabled {
        set_debug_writer(writer);
    }
    enabled
}

fn with_debug_writer<F: FnOnce(&mut dyn IoWrite)>(f: F) {
    // Only one thread of control exists and the writer is never replaced
    // after setup, so this is the only live borrow.
    let writer = unsafe { (*addr_of_mut!(DEBUG_WRITER)).as_deref_mut() };
    if let Some(writer) = writer {
        f(writer);
    }
}

/// Adapts an [`IoWrite`] to `core::fmt::Write`.
struct FmtWriter<'a>(&'a mut dyn IoWrite);

impl Write for FmtWriter<'_> {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        let mut bytes = s.as_bytes();
        while !bytes.is_empty() {
            let written = self.0.write(bytes);
            if written == 0 {
                return Err(core::fmt::Error);
            }
            bytes = bytes.get(written..).unwrap_or(&[]);
        }
        Ok(())
    }
}

pub fn debug_print(args: Arguments) {
    with_debug_writer(|writer| {
        let _ = write(&mut FmtWriter(writer), args);
    });
}

pub fn debug_println(args: Arguments) {
    with_debug_writer(|writer| {
        let mut writer = FmtWriter(writer);
        let _ = write(&mut writer, args);
        let _ = writer.write_str("\r\n");
    });
}

pub fn debug_verbose_println(args: Arguments, file_line: &(&'static str, u32)) {
    let count = DEBUG_COUNT.fetch_add(1, Ordering::Relaxed);
    let (file, line) = *file_line;
    with_debug_writer(|writer| {
        let mut writer = FmtWriter(writer);
        let _ = writer.write_fmt(format_args!("DEBUG({}): {}:{}: ", count, file, line));
        let _ = write(&mut writer, args);
        let _ = writer.write_str("\r\n");
    });
}

/// In-kernel `println()` debugging.
#[macro_export]
macro_rules! debug {
    () => ({
        // Allow an empty debug!() to print the location when hit
        $crate::debug!("")
    });
    ($msg:expr $(,)?) => ({
        $crate::debug::debug_println(format_args!($msg));
    });
    ($fmt:expr, $($arg:tt)+) => ({
        $crate::debug::debug_println(format_args!($fmt, $($arg)+));
    });
}

/// In-kernel `println()` debugging that also prints the message count, file
/// and line.
#[macro_export]
macro_rules! debug_verbose {
    () => ({
        // Allow an empty debug_verbose!() to print the location when hit
        $crate::debug_verbose!("")
    });
    ($msg:expr $(,)?) => ({
        $crate::debug::debug_verbose_println(format_args!($msg), {
            static _FILE_LINE: (&'static str, u32) = (file!(), line!());
            &_FILE_LINE
        })
    });
    ($fmt:expr, $($arg:tt)+) => ({
        $crate::debug::debug_verbose_println(format_args!($fmt, $($arg)+), {
            static _FILE_LINE: (&'static str, u32) = (file!(), line!());
            &_FILE_LINE
        })
    });
}

/// Print the panic message and location to `writer`.
///
/// Does nothing when the kernel is built with `no_debug_panics` or without
/// `debug_console`.
pub fn panic_print<W: Write + IoWrite>(writer: &mut W, panic_info: &PanicInfo) {
    if !(config::CONFIG.debug_panics && config::CONFIG.debug_console) {
        return;
    }
    let _ = writer.write_fmt(format_args!("\r\n{}\r\n", panic_info));
    let _ = writer.write_fmt(format_args!(
        "\tKernel version {}\r\n",
        option_env!("CARGO_PKG_VERSION").unwrap_or("unknown")
    ));
}

/// Report a panic and spin forever.
///
/// `nop` is called on every iteration of the final loop so the board can pick
/// an architecture-specific idle instruction.
pub fn panic<W: Write + IoWrite>(writer: &mut W, panic_info: &PanicInfo, nop: &dyn Fn()) -> ! {
    panic_print(writer, panic_info);
    loop {
        nop();
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use std::boxed::Box;
    use std::string::String;
    use std::sync::Mutex;

    use super::*;

    static CAPTURED: Mutex<String> = Mutex::new(String::new());
    static UNUSED_CONSOLE_BYTES: AtomicUsize = AtomicUsize::new(0);

    /// Accepts at most three bytes per call to exercise partial writes.
    struct Capture;

    impl IoWrite for Capture {
        fn write(&mut self, buf: &[u8]) -> usize {
            let n = buf.len().min(3);
            let mut captured = CAPTURED.lock().unwrap();
            captured.push_str(core::str::from_utf8(&buf[..n]).unwrap());
            n
        }
    }

    /// Counts what it is asked to write.
    struct Console;

    impl IoWrite for Console {
        fn write(&mut self, buf: &[u8]) -> usize {
            UNUSED_CONSOLE_BYTES.fetch_add(buf.len(), Ordering::Relaxed);
            buf.len()
        }
    }

    // Only this test installs a writer, every other test in this crate prints
    // nothing.
    #[test]
    fn macros_reach_the_installed_writer() {
        // A disabled console is never installed and never written.
        assert!(!unsafe { install_console(false, Box::leak(Box::new(Console))) });
        assert!(unsafe { install_console(true, Box::leak(Box::new(Capture))) });

        crate::debug!("spi ready");
        crate::debug!("received {:#04x}", 0x55);
        crate::debug_verbose!("step {}", 2);

        let captured = CAPTURED.lock().unwrap().clone();
        assert!(captured.starts_with("spi ready\r\nreceived 0x55\r\n"));
        assert!(captured.contains("DEBUG(0): "));
        assert!(captured.ends_with("step 2\r\n"));
        assert!(captured.contains("debug.rs:"));
        assert_eq!(UNUSED_CONSOLE_BYTES.load(Ordering::Relaxed), 0);
    }
}
