// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2024.

//! Puts the board's `memory.x` where the `cortex-m-rt` linker script looks for
//! it, and makes sure the board is relinked when it changes.

use std::env;
use std::fs;
use std::path::PathBuf;

const MEMORY_LAYOUT: &str = "memory.x";

fn main() {
    let out_dir = PathBuf::from(env::var_os("OUT_DIR").expect("OUT_DIR is set by cargo"));
    fs::copy(MEMORY_LAYOUT, out_dir.join(MEMORY_LAYOUT))
        .expect("boards must provide a `memory.x` file");
    println!("cargo:rustc-link-search={}", out_dir.display());

    // Only link with `link.x` when building for the chip. Host tools such as
    // `cargo clippy` build for the host and would fail to link.
    if env::var("HOST") != env::var("TARGET") {
        // `-Tlink.x`: the `cortex-m-rt` script, which `INCLUDE`s `memory.x`.
        println!("cargo:rustc-link-arg=-Tlink.x");
    }

    println!("cargo:rerun-if-changed={}", MEMORY_LAYOUT);
    println!("cargo:rerun-if-changed=build.rs");
}
