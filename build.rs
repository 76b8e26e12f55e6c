//! Build script for tickswitch
//!
//! Turns the build-time scheduler settings into constants for `src/config.rs`.

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use std::{env, error::Error, fs, path::PathBuf};

/// Timer counts between two preemptions, unless overridden
const DEFAULT_TICK_QUANTUM: u64 = 100_000;

/// Size of the stack the trap dispatcher runs on, unless overridden
const DEFAULT_TRAP_STACK_BYTES: usize = 1024;

/// Smallest trap stack we accept
const MIN_TRAP_STACK_BYTES: usize = 256;

/// Entry point to the build script
fn main() -> Result<(), Box<dyn Error>> {
    println!("cargo::rerun-if-env-changed=TICKSWITCH_TICK_QUANTUM");
    println!("cargo::rerun-if-env-changed=TICKSWITCH_TRAP_STACK_BYTES");

    let tick_quantum: u64 = setting("TICKSWITCH_TICK_QUANTUM", DEFAULT_TICK_QUANTUM)?;
    if tick_quantum == 0 {
        return Err("TICKSWITCH_TICK_QUANTUM must not be zero".into());
    }

    let trap_stack_bytes: usize =
        setting("TICKSWITCH_TRAP_STACK_BYTES", DEFAULT_TRAP_STACK_BYTES)?;
    if trap_stack_bytes < MIN_TRAP_STACK_BYTES || !trap_stack_bytes.is_multiple_of(16) {
        return Err(format!(
            "TICKSWITCH_TRAP_STACK_BYTES must be a multiple of 16, and at least {MIN_TRAP_STACK_BYTES}"
        )
        .into());
    }

    let out_dir = PathBuf::from(env::var("OUT_DIR")?);
    fs::write(
        out_dir.join("config.rs"),
        format!(
            "pub const TICK_QUANTUM: u64 = {tick_quantum};\n\
             pub const TRAP_STACK_BYTES: usize = {trap_stack_bytes};\n"
        ),
    )?;

    Ok(())
}

/// Read a numeric setting from the environment, falling back to `default`
fn setting<T>(name: &str, default: T) -> Result<T, Box<dyn Error>>
where
    T: std::str::FromStr,
    T::Err: Error + 'static,
{
    match env::var(name) {
        Ok(value) => Ok(value.trim().replace('_', "").parse()?),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(e) => Err(e.into()),
    }
}

// End of File
