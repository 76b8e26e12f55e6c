//! Build Script for the tickswitch demos
//!
//! Not required when using tickswitch as a library

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: CC0-1.0

use std::{env, error::Error, fs, path::PathBuf};

fn main() -> Result<(), Box<dyn Error>> {
    let out_dir = PathBuf::from(env::var("OUT_DIR")?);
    let semihosting = env::var_os("CARGO_FEATURE_SEMIHOSTING").is_some();
    // The emulator's RAM starts at zero, QEMU's at 0x8000_0000
    let memory_x = if semihosting {
        "memory-qemu.x"
    } else {
        "memory-emulator.x"
    };
    // put memory layout (linker script) in the linker search path as the
    // package root isn't always searched
    fs::copy(memory_x, out_dir.join("memory.x"))?;
    // important - if the files change, re-run the build
    println!("cargo::rerun-if-changed=memory-emulator.x");
    println!("cargo::rerun-if-changed=memory-qemu.x");
    // tell the linker where to find it
    println!("cargo::rustc-link-search={}", out_dir.display());
    // defmt brings its own linker script
    if semihosting {
        println!("cargo::rustc-link-arg=-Tdefmt.x");
    }
    Ok(())
}

// End of File
