//! Appropriate assembly language routines for the architecture

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

#[cfg(target_arch = "riscv32")]
mod riscv32;

#[cfg(target_arch = "riscv32")]
pub(crate) use riscv32::*;

// End of File
