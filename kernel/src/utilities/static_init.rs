// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Support for statically initializing objects in memory.
//!
//! Boards build their peripheral handles once during start-up and hand out
//! `'static` references to them, which is what lets a driver borrow its clock
//! and pins for the rest of the program.

/// Allocates a statically-sized global buffer for a value of type `$T`,
/// initializes it with `$e`, and returns a `&'static mut` reference to it.
///
/// Note: Because this instantiates a static object, you generally cannot pass
/// a type with generic parameters.
///
/// # Safety
///
/// As this macro writes directly to a global area without acquiring a lock,
/// calling it is inherently unsafe. The code that expands it must run at most
/// once, otherwise the second call overwrites the value handed out by the
/// first.
#[macro_export]
macro_rules! static_init {
    ($T:ty, $e:expr $(,)?) => {{
        let buf = $crate::static_buf!($T);
        buf.write($e)
    }};
}

/// Allocates a statically-sized global buffer for a value of type `$T` and
/// returns it uninitialized as a `&'static mut MaybeUninit<$T>`.
#[macro_export]
macro_rules! static_buf {
    ($T:ty $(,)?) => {{
        static mut BUF: core::mem::MaybeUninit<$T> = core::mem::MaybeUninit::uninit();
        &mut *core::ptr::addr_of_mut!(BUF)
    }};
}
