//! RV32 machine mode code
//!
//! While a task runs, `mscratch` holds the address of its [`TaskContext`].
//! The trap entry code swaps it into `t6`, saves every register into the
//! context, and calls the dispatcher on the trap stack. Restoring a context
//! (after a trap, or to start the first task) loads every register back and
//! does an `mret`.

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use core::arch::asm;

use riscv::register::{
    mcause, mie, mstatus, mtval,
    mtvec::{self, TrapMode},
};

use crate::{MachineTimer, Scheduler, Stack, TaskContext, config, trap};

/// The stack the trap dispatcher runs on
static TRAP_STACK: Stack<{ config::TRAP_STACK_BYTES }> = Stack::new();

unsafe extern "C" {
    /// The trap vector, defined below
    fn _tickswitch_trap_entry();
}

// The trap vector
//
// NOTE: Until the context is saved, this code must ONLY touch t6 and t5,
// and t5 only after it has been stored. mtvec needs a 4-byte aligned address.
core::arch::global_asm!(r#"
    .section .text._tickswitch_trap_entry, "ax"
    .global _tickswitch_trap_entry
    .p2align 2
_tickswitch_trap_entry:
    // t6 = the running task's context, mscratch = the task's t6
    csrrw   t6, mscratch, t6

    // x1 - x30, in TaskContext order
    sw      x1, 0(t6)
    sw      x2, 4(t6)
    sw      x3, 8(t6)
    sw      x4, 12(t6)
    sw      x5, 16(t6)
    sw      x6, 20(t6)
    sw      x7, 24(t6)
    sw      x8, 28(t6)
    sw      x9, 32(t6)
    sw      x10, 36(t6)
    sw      x11, 40(t6)
    sw      x12, 44(t6)
    sw      x13, 48(t6)
    sw      x14, 52(t6)
    sw      x15, 56(t6)
    sw      x16, 60(t6)
    sw      x17, 64(t6)
    sw      x18, 68(t6)
    sw      x19, 72(t6)
    sw      x20, 76(t6)
    sw      x21, 80(t6)
    sw      x22, 84(t6)
    sw      x23, 88(t6)
    sw      x24, 92(t6)
    sw      x25, 96(t6)
    sw      x26, 100(t6)
    sw      x27, 104(t6)
    sw      x28, 108(t6)
    sw      x29, 112(t6)
    sw      x30, 116(t6)

    // the task's t6, from mscratch
    csrr    t5, mscratch
    sw      t5, 120(t6)

    csrr    t5, mepc
    sw      t5, {mepc}(t6)
    csrr    t5, mstatus
    sw      t5, {mstatus}(t6)

    //
    // The task is now saved. Run the dispatcher on the trap stack.
    //

    la      sp, {trap_stack}
    li      t5, {trap_stack_bytes}
    add     sp, sp, t5

    // a0 = the saved context
    mv      a0, t6
    call    {handler}

    // a0 = the context to resume
    tail    {restore}
    "#,
    mepc = const TaskContext::MEPC_OFFSET,
    mstatus = const TaskContext::MSTATUS_OFFSET,
    trap_stack = sym TRAP_STACK,
    trap_stack_bytes = const config::TRAP_STACK_BYTES,
    handler = sym trap_handler,
    restore = sym restore_context,
);

/// Restore a task context and return into it
///
/// This is how every task resumes, including the very first one.
///
/// # Safety
///
/// `context` must be a valid context, living in a [`crate::Task`], and
/// interrupts must be disabled.
#[unsafe(naked)]
pub(crate) unsafe extern "C" fn restore_context(context: *const TaskContext) -> ! {
    core::arch::naked_asm!(r#"
    // t6 = the context, which mscratch keeps while the task runs
    mv      t6, a0
    csrw    mscratch, t6

    // The status word has MIE clear. The mret sets MIE from MPIE.
    lw      t5, {mepc}(t6)
    csrw    mepc, t5
    lw      t5, {mstatus}(t6)
    csrw    mstatus, t5

    // x1 - x31, with t6 last
    lw      x1, 0(t6)
    lw      x2, 4(t6)
    lw      x3, 8(t6)
    lw      x4, 12(t6)
    lw      x5, 16(t6)
    lw      x6, 20(t6)
    lw      x7, 24(t6)
    lw      x8, 28(t6)
    lw      x9, 32(t6)
    lw      x10, 36(t6)
    lw      x11, 40(t6)
    lw      x12, 44(t6)
    lw      x13, 48(t6)
    lw      x14, 52(t6)
    lw      x15, 56(t6)
    lw      x16, 60(t6)
    lw      x17, 64(t6)
    lw      x18, 68(t6)
    lw      x19, 72(t6)
    lw      x20, 76(t6)
    lw      x21, 80(t6)
    lw      x22, 84(t6)
    lw      x23, 88(t6)
    lw      x24, 92(t6)
    lw      x25, 96(t6)
    lw      x26, 100(t6)
    lw      x27, 104(t6)
    lw      x28, 108(t6)
    lw      x29, 112(t6)
    lw      x30, 116(t6)
    lw      x31, 120(t6)

    mret
    "#,
    mepc = const TaskContext::MEPC_OFFSET,
    mstatus = const TaskContext::MSTATUS_OFFSET,
    );
}

/// Called by the trap vector, on the trap stack, with interrupts disabled
///
/// Returns the context to resume.
extern "C" fn trap_handler(saved: *mut TaskContext) -> *const TaskContext {
    let cause = trap::TrapCause::from_bits(mcause::read().bits());
    let Some(scheduler) = Scheduler::get_scheduler() else {
        panic!("Trap {:?} before the scheduler started", cause);
    };
    debug_assert_eq!(
        scheduler
            .task(scheduler.current_task_id())
            .map(|task| task.context_ptr().as_ptr()),
        Some(saved)
    );
    let mut timer = MachineTimer::platform();
    trap::dispatch(scheduler, &mut timer, cause, mtval::read()).as_ptr()
}

/// Point mtvec at our trap vector, in direct mode, and enable the timer
/// interrupt
pub(crate) fn install_vector() {
    let vector = _tickswitch_trap_entry as usize;
    debug_assert_eq!(vector & 0b11, 0);
    // SAFETY: The vector is 4-byte aligned, and mscratch is set up before
    // interrupts are enabled
    unsafe {
        mtvec::write(vector, TrapMode::Direct);
        mie::set_mtimer();
    }
}

/// Disable the timer interrupt and zero mtvec
pub(crate) fn uninstall_vector() {
    // SAFETY: Turning the timer interrupt off cannot break anything
    unsafe {
        mie::clear_mtimer();
        mtvec::write(0, TrapMode::Direct);
    }
}

/// Disable machine mode interrupts
pub(crate) fn disable_interrupts() {
    // SAFETY: Disabling interrupts is always sound
    unsafe {
        mstatus::clear_mie();
    }
}

/// Sleep until an interrupt is pending
#[allow(unused_unsafe)]
pub(crate) fn wait_for_interrupt() {
    // SAFETY: wfi has no side effects beyond the pause
    unsafe {
        riscv::asm::wfi();
    }
}

/// Get the value of `gp` the program was linked for
pub(crate) fn global_pointer() -> usize {
    let gp: usize;
    // SAFETY: Just reads a register
    unsafe {
        asm!("mv {0}, gp", out(reg) gp, options(nomem, nostack, preserves_flags));
    }
    gp
}

/// Read the low half of mtime
pub(crate) fn read_mtime() -> u32 {
    let value: u32;
    // SAFETY: Just reads a CSR
    unsafe {
        asm!("csrr {0}, 0x7C0", out(reg) value, options(nomem, nostack));
    }
    value
}

/// Read the high half of mtime
pub(crate) fn read_mtimeh() -> u32 {
    let value: u32;
    // SAFETY: Just reads a CSR
    unsafe {
        asm!("csrr {0}, 0x7C1", out(reg) value, options(nomem, nostack));
    }
    value
}

/// Read the low half of mtimecmp
pub(crate) fn read_mtimecmp() -> u32 {
    let value: u32;
    // SAFETY: Just reads a CSR
    unsafe {
        asm!("csrr {0}, 0x7C2", out(reg) value, options(nomem, nostack));
    }
    value
}

/// Read the high half of mtimecmp
pub(crate) fn read_mtimecmph() -> u32 {
    let value: u32;
    // SAFETY: Just reads a CSR
    unsafe {
        asm!("csrr {0}, 0x7C3", out(reg) value, options(nomem, nostack));
    }
    value
}

/// Write the low half of mtimecmp
pub(crate) fn write_mtimecmp(value: u32) {
    // SAFETY: Moving the timer deadline is the dispatcher's job
    unsafe {
        asm!("csrw 0x7C2, {0}", in(reg) value, options(nomem, nostack));
    }
}

/// Write the high half of mtimecmp
pub(crate) fn write_mtimecmph(value: u32) {
    // SAFETY: Moving the timer deadline is the dispatcher's job
    unsafe {
        asm!("csrw 0x7C3, {0}", in(reg) value, options(nomem, nostack));
    }
}

// End of File
