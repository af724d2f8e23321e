// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Core kernel crate.
//!
//! The kernel crate holds the chip-independent pieces shared by the chip and
//! board crates: the Hardware Interface Layer (HIL) definitions, the register
//! bus used by every peripheral driver, the standard error enum, debug output
//! and compile-time configuration.
//!
//! Most `unsafe` code is in this kernel crate.

#![no_std]
#![warn(unreachable_pub)]

pub mod config;
pub mod debug;
pub mod errorcode;
pub mod hil;
pub mod platform;
pub mod utilities;

pub use crate::errorcode::ErrorCode;
