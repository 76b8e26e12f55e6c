//! A preemptive round-robin scheduler for single-hart RV32 machines
//!
//! Give the [`Scheduler`] a static list of [`Task`]s, each with its own
//! [`Stack`], and call [`Scheduler::start`]. Every quantum the machine timer
//! interrupt saves the running task's registers, and the next task in the
//! list resumes exactly where it left off.

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

#[cfg(target_arch = "riscv32")]
mod asm;
pub mod config;
mod context;
pub mod diag;
mod scheduler;
mod stack;
mod task;
pub mod timer;
pub mod trap;

pub use context::TaskContext;
pub use scheduler::{Scheduler, TaskId, next_slot};
pub use stack::Stack;
pub use task::{Task, TaskEntryFn};
pub use timer::{MmioTimer, TimerPort};

/// The machine timer the scheduler drives
///
/// `timer-csr` wins if both timer features are enabled.
#[cfg(all(target_arch = "riscv32", feature = "timer-csr"))]
pub type MachineTimer = timer::CsrTimer;

/// The machine timer the scheduler drives
#[cfg(all(
    feature = "timer-mmio",
    not(all(target_arch = "riscv32", feature = "timer-csr"))
))]
pub type MachineTimer = timer::MmioTimer;

#[cfg(all(
    target_arch = "riscv32",
    not(any(feature = "timer-mmio", feature = "timer-csr"))
))]
compile_error!("Enable the `timer-mmio` or the `timer-csr` feature");

/// Get the current time in ticks
///
/// Returns `0xFFFF_FFFF` if the scheduler has not been started.
pub fn now() -> u32 {
    match Scheduler::get_scheduler() {
        Some(scheduler) => scheduler.now(),
        None => 0xFFFF_FFFF,
    }
}

/// Get the ID of the task that is running
///
/// Returns an invalid ID if the scheduler has not been started.
pub fn task_id() -> TaskId {
    match Scheduler::get_scheduler() {
        Some(scheduler) => scheduler.current_task_id(),
        None => TaskId::invalid(),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn queries_before_start() {
        assert_eq!(now(), 0xFFFF_FFFF);
        assert!(task_id().is_invalid());
    }

    #[cfg(feature = "timer-mmio")]
    #[test]
    fn timer_mmio_selects_the_memory_mapped_timer() {
        use core::any::TypeId;
        assert_eq!(TypeId::of::<MachineTimer>(), TypeId::of::<MmioTimer>());
    }
}

// End of File
