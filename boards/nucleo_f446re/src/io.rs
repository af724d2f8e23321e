// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

use core::fmt::Write;
use core::panic::PanicInfo;
use core::ptr::addr_of_mut;

use cortex_m_semihosting::hio::{self, HostStream};
use kernel::debug;
use kernel::debug::IoWrite;

/// Writes to the debugger's console over ARM semihosting.
///
/// Semihosting traps into the attached debug probe. Without one the first
/// write faults, so the kernel only installs it when built with
/// `debug_console`.
pub struct Writer {
    stdout: Option<HostStream>,
}

/// Used by the panic handler only, so panics print even if the debug writer
/// is mid-write.
static mut WRITER: Writer = Writer::new();

impl Writer {
    /// A writer that opens the host's stdout on first use.
    pub const fn new() -> Self {
        Writer { stdout: None }
    }

    fn stdout(&mut self) -> Option<&mut HostStream> {
        if self.stdout.is_none() {
            self.stdout = hio::hstdout().ok();
        }
        self.stdout.as_mut()
    }
}

impl Write for Writer {
    fn write_str(&mut self, s: &str) -> ::core::fmt::Result {
        self.write(s.as_bytes());
        Ok(())
    }
}

impl IoWrite for Writer {
    fn write(&mut self, buf: &[u8]) -> usize {
        match self.stdout() {
            Some(stdout) => {
                if stdout.write_all(buf).is_ok() {
                    buf.len()
                } else {
                    0
                }
            }
            None => 0,
        }
    }
}

/// Panic handler.
#[cfg(not(test))]
#[panic_handler]
fn panic_fmt(pi: &PanicInfo) -> ! {
    cortex_m::interrupt::disable();
    // Interrupts are off and nothing else touches WRITER.
    let writer = unsafe { &mut *addr_of_mut!(WRITER) };
    debug::panic(writer, pi, &cortex_m::asm::nop)
}
