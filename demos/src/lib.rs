//! Common panic/exit/timestamp handlers for the demos

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

#![no_std]

#[cfg(feature = "semihosting")]
use defmt_semihosting as _;

use tickswitch::Scheduler;

/// The emulator's `exit` system call
#[cfg(not(feature = "semihosting"))]
const SYS_EXIT: usize = 93;

/// Called when a panic occurs.
///
/// Logs the panic and then halts the hart.
#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    #[cfg(feature = "semihosting")]
    defmt::println!("PANIC: {}", defmt::Debug2Format(info));
    #[cfg(not(feature = "semihosting"))]
    {
        let _ = info;
        log::regs();
        log::message(c"PANIC");
    }
    halt()
}

/// Stop the scheduler, then leave the emulator with the given exit code
pub fn exit(scheduler: &Scheduler, code: i32) -> ! {
    scheduler.stop();
    log::value(c"exit", code as u32);
    leave(code)
}

#[cfg(feature = "semihosting")]
fn leave(code: i32) -> ! {
    semihosting::process::exit(code)
}

/// Once the trap vector is cleared, `ecall` goes to the emulator again
#[cfg(not(feature = "semihosting"))]
fn leave(code: i32) -> ! {
    // SAFETY: The emulator services the exit call and never comes back
    unsafe {
        core::arch::asm!(
            "ecall",
            in("a0") code,
            in("a7") SYS_EXIT,
            options(noreturn, nostack)
        );
    }
}

/// Logging for the demos
///
/// On the emulator this is its `ebreak` side channel. Under QEMU an `ebreak`
/// is a real breakpoint, so with the `semihosting` feature we log through
/// defmt instead.
pub mod log {
    use core::ffi::CStr;

    #[cfg(not(feature = "semihosting"))]
    use tickswitch::diag;

    /// Log a message
    pub fn message(text: &CStr) {
        #[cfg(not(feature = "semihosting"))]
        diag::log_str(text);
        #[cfg(feature = "semihosting")]
        defmt::println!("{=str}", as_str(text));
    }

    /// Log a number
    pub fn int(value: u32) {
        #[cfg(not(feature = "semihosting"))]
        diag::log_int(value);
        #[cfg(feature = "semihosting")]
        defmt::println!("{=u32}", value);
    }

    /// Log a message followed by a number
    pub fn value(text: &CStr, value: u32) {
        #[cfg(not(feature = "semihosting"))]
        diag::log_str_int(text, value);
        #[cfg(feature = "semihosting")]
        defmt::println!("{=str} {=u32}", as_str(text), value);
    }

    /// Log a message followed by a number in hex
    pub fn hex(text: &CStr, value: u32) {
        #[cfg(not(feature = "semihosting"))]
        diag::log_str_hex(text, value);
        #[cfg(feature = "semihosting")]
        defmt::println!("{=str} {=u32:#010x}", as_str(text), value);
    }

    /// Dump the registers, if we can
    pub fn regs() {
        // semihosting has no way to do this
        #[cfg(not(feature = "semihosting"))]
        diag::log_regs();
    }

    #[cfg(feature = "semihosting")]
    fn as_str(text: &CStr) -> &str {
        text.to_str().unwrap_or("<not UTF-8>")
    }
}

/// Mask interrupts and sleep forever
#[allow(unused_unsafe)]
pub fn halt() -> ! {
    // SAFETY: We are never coming back, so nothing can depend on interrupts
    unsafe {
        riscv::register::mstatus::clear_mie();
    }
    loop {
        // SAFETY: wfi has no side effects beyond the pause
        unsafe {
            riscv::asm::wfi();
        }
    }
}

// Log scheduler ticks in the defmt logs
#[cfg(feature = "semihosting")]
defmt::timestamp!("{=u32:010} {}", tickswitch::now(), tickswitch::task_id());

// End of File
