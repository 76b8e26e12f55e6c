//! The emulator's diagnostic side channel
//!
//! An `ebreak` with `a7` set to one of the bypass selectors is picked up by
//! the emulator before it is delivered as a trap, so tasks can log while the
//! scheduler is running. Arguments go in `a0` and `a1`. Strings must be
//! NUL-terminated, hence [`CStr`].
//!
//! When not built for RV32 these functions do nothing.

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use core::ffi::CStr;

/// The bypass requests the emulator understands
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum LogCall {
    /// Dump all registers
    Regs = 0,
    /// Print `a0` as a decimal integer
    Int = 1,
    /// Print the string at `a0`
    Str = 2,
    /// Print the string at `a0`, then `a1` in decimal
    StrInt = 3,
    /// Print the string at `a0`, then `a1` in hex
    StrHex = 4,
}

impl LogCall {
    /// Selectors at or above this are not real system calls
    pub const BYPASS_BASE: u32 = 0xFFFF_0000;

    /// The value to put in `a7`
    pub const fn selector(self) -> u32 {
        Self::BYPASS_BASE | self as u32
    }
}

/// Ask the emulator to print all the registers
pub fn log_regs() {
    log_call(LogCall::Regs, 0, 0);
}

/// Ask the emulator to print an integer
pub fn log_int(value: u32) {
    log_call(LogCall::Int, value as usize, 0);
}

/// Ask the emulator to print a string
pub fn log_str(message: &CStr) {
    log_call(LogCall::Str, message.as_ptr() as usize, 0);
}

/// Ask the emulator to print a string followed by an integer
pub fn log_str_int(message: &CStr, value: u32) {
    log_call(LogCall::StrInt, message.as_ptr() as usize, value as usize);
}

/// Ask the emulator to print a string followed by an integer in hex
pub fn log_str_hex(message: &CStr, value: u32) {
    log_call(LogCall::StrHex, message.as_ptr() as usize, value as usize);
}

#[cfg(target_arch = "riscv32")]
fn log_call(call: LogCall, arg0: usize, arg1: usize) {
    // SAFETY: The emulator consumes the ebreak and only reads memory we gave
    // it, and a0, a1 and a7
    unsafe {
        core::arch::asm!(
            "ebreak",
            in("a7") call.selector() as usize,
            in("a0") arg0,
            in("a1") arg1,
            options(nostack, readonly),
        );
    }
}

#[cfg(not(target_arch = "riscv32"))]
fn log_call(_call: LogCall, _arg0: usize, _arg1: usize) {}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn selectors_are_in_the_bypass_range() {
        assert_eq!(LogCall::Regs.selector(), 0xFFFF_0000);
        assert_eq!(LogCall::Int.selector(), 0xFFFF_0001);
        assert_eq!(LogCall::Str.selector(), 0xFFFF_0002);
        assert_eq!(LogCall::StrInt.selector(), 0xFFFF_0003);
        assert_eq!(LogCall::StrHex.selector(), 0xFFFF_0004);
    }

    #[test]
    fn logging_off_target_is_harmless() {
        log_str(c"hello");
        log_str_int(c"count", 3);
        log_int(42);
    }
}

// End of File
