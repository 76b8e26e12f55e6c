//! Holds the [`TaskContext`] type

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use core::mem::{offset_of, size_of};

/// Everything we need to resume a task exactly where it was interrupted
///
/// The general purpose registers are held in architectural order, so `xN`
/// lives at word `N - 1` (there is no slot for `x0`). The trap entry code
/// relies on this layout.
#[repr(C)]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TaskContext {
    pub ra: usize,
    pub sp: usize,
    pub gp: usize,
    pub tp: usize,
    pub t0: usize,
    pub t1: usize,
    pub t2: usize,
    pub s0: usize,
    pub s1: usize,
    pub a0: usize,
    pub a1: usize,
    pub a2: usize,
    pub a3: usize,
    pub a4: usize,
    pub a5: usize,
    pub a6: usize,
    pub a7: usize,
    pub s2: usize,
    pub s3: usize,
    pub s4: usize,
    pub s5: usize,
    pub s6: usize,
    pub s7: usize,
    pub s8: usize,
    pub s9: usize,
    pub s10: usize,
    pub s11: usize,
    pub t3: usize,
    pub t4: usize,
    pub t5: usize,
    pub t6: usize,
    /// The program counter at the moment of the trap
    pub mepc: usize,
    /// The machine status word at the moment of the trap
    pub mstatus: usize,
}

impl TaskContext {
    /// How many general purpose registers we save (`x1` to `x31`)
    pub const GPR_COUNT: usize = 31;

    /// Byte offset of the saved `mepc`
    pub const MEPC_OFFSET: usize = offset_of!(TaskContext, mepc);

    /// Byte offset of the saved `mstatus`
    pub const MSTATUS_OFFSET: usize = offset_of!(TaskContext, mstatus);

    /// `mstatus.MIE` - machine interrupts enabled
    pub const MSTATUS_MIE: usize = 1 << 3;

    /// `mstatus.MPIE` - the value `mret` copies into `MIE`
    pub const MSTATUS_MPIE: usize = 1 << 7;

    /// `mstatus.MPP` set to Machine mode - the mode `mret` returns to
    pub const MSTATUS_MPP_MACHINE: usize = 0b11 << 11;

    /// The status word a task starts with
    ///
    /// Returning from the trap leaves us in Machine mode with interrupts
    /// enabled.
    pub const INITIAL_MSTATUS: usize = Self::MSTATUS_MPP_MACHINE | Self::MSTATUS_MPIE;

    /// A context with every register zero
    pub const fn zeroed() -> TaskContext {
        TaskContext {
            ra: 0,
            sp: 0,
            gp: 0,
            tp: 0,
            t0: 0,
            t1: 0,
            t2: 0,
            s0: 0,
            s1: 0,
            a0: 0,
            a1: 0,
            a2: 0,
            a3: 0,
            a4: 0,
            a5: 0,
            a6: 0,
            a7: 0,
            s2: 0,
            s3: 0,
            s4: 0,
            s5: 0,
            s6: 0,
            s7: 0,
            s8: 0,
            s9: 0,
            s10: 0,
            s11: 0,
            t3: 0,
            t4: 0,
            t5: 0,
            t6: 0,
            mepc: 0,
            mstatus: 0,
        }
    }

    /// Make the context for a task that has never run
    ///
    /// Restoring it starts `entry` on the stack ending at `stack_top`, with
    /// interrupts enabled. If `entry` were ever to return, it would return to
    /// `exit`. Code linked with relaxation addresses globals through `gp`, so
    /// every task gets the program's `global_pointer`.
    pub const fn template(
        entry: usize,
        stack_top: usize,
        exit: usize,
        global_pointer: usize,
    ) -> TaskContext {
        let mut context = TaskContext::zeroed();
        context.ra = exit;
        context.sp = stack_top;
        context.gp = global_pointer;
        context.mepc = entry;
        context.mstatus = Self::INITIAL_MSTATUS;
        context
    }

    /// Does restoring this context turn interrupts back on?
    pub const fn enables_interrupts(&self) -> bool {
        self.mstatus & Self::MSTATUS_MPIE != 0
    }

    /// Get general purpose register `xN`
    ///
    /// `x0` reads as zero, like the real thing.
    ///
    /// # Panics
    ///
    /// Panics if `n` is not a register number.
    pub fn gpr(&self, n: usize) -> usize {
        assert!(n <= Self::GPR_COUNT, "no such register x{}", n);
        if n == 0 { 0 } else { self.gprs()[n - 1] }
    }

    /// Set general purpose register `xN`
    ///
    /// Writes to `x0` are ignored, like the real thing.
    ///
    /// # Panics
    ///
    /// Panics if `n` is not a register number.
    pub fn set_gpr(&mut self, n: usize, value: usize) {
        assert!(n <= Self::GPR_COUNT, "no such register x{}", n);
        if n != 0 {
            self.gprs_mut()[n - 1] = value;
        }
    }

    fn gprs(&self) -> &[usize; Self::GPR_COUNT] {
        // SAFETY: `repr(C)` struct which starts with GPR_COUNT usize fields,
        // checked below
        unsafe { &*(self as *const TaskContext as *const [usize; Self::GPR_COUNT]) }
    }

    fn gprs_mut(&mut self) -> &mut [usize; Self::GPR_COUNT] {
        // SAFETY: as for `gprs`
        unsafe { &mut *(self as *mut TaskContext as *mut [usize; Self::GPR_COUNT]) }
    }
}

impl Default for TaskContext {
    fn default() -> Self {
        TaskContext::zeroed()
    }
}

const _: () = assert!(offset_of!(TaskContext, ra) == 0);
const _: () = assert!(offset_of!(TaskContext, s2) == 17 * size_of::<usize>());
const _: () = assert!(offset_of!(TaskContext, t6) == 30 * size_of::<usize>());
const _: () = assert!(TaskContext::MEPC_OFFSET == TaskContext::GPR_COUNT * size_of::<usize>());
const _: () = assert!(TaskContext::MSTATUS_OFFSET == TaskContext::MEPC_OFFSET + size_of::<usize>());
const _: () = assert!(size_of::<TaskContext>() == 33 * size_of::<usize>());

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn template_resumes_at_entry_with_interrupts_on() {
        let context = TaskContext::template(0x1000, 0x8000_0400, 0x2000, 0x800);
        assert_eq!(context.mepc, 0x1000);
        assert_eq!(context.gp, 0x800);
        assert_eq!(context.sp, 0x8000_0400);
        assert_eq!(context.ra, 0x2000);
        assert!(context.enables_interrupts());
        // MIE stays off until the mret copies MPIE into it
        assert_eq!(context.mstatus & TaskContext::MSTATUS_MIE, 0);
        assert_eq!(
            context.mstatus & TaskContext::MSTATUS_MPP_MACHINE,
            TaskContext::MSTATUS_MPP_MACHINE
        );
    }

    #[test]
    fn template_clears_everything_else() {
        let context = TaskContext::template(0x1000, 0x8000_0400, 0x2000, 0x800);
        for n in 4..=TaskContext::GPR_COUNT {
            assert_eq!(context.gpr(n), 0, "x{n}");
        }
    }

    #[test]
    fn gpr_numbering_follows_the_abi_names() {
        let mut context = TaskContext::zeroed();
        context.set_gpr(1, 11);
        context.set_gpr(2, 22);
        context.set_gpr(8, 88);
        context.set_gpr(10, 100);
        context.set_gpr(18, 180);
        context.set_gpr(31, 310);
        assert_eq!(context.ra, 11);
        assert_eq!(context.sp, 22);
        assert_eq!(context.s0, 88);
        assert_eq!(context.a0, 100);
        assert_eq!(context.s2, 180);
        assert_eq!(context.t6, 310);
        // and the control registers are untouched
        assert_eq!(context.mepc, 0);
        assert_eq!(context.mstatus, 0);
    }

    #[test]
    fn x0_is_hardwired() {
        let mut context = TaskContext::zeroed();
        context.set_gpr(0, 1234);
        assert_eq!(context.gpr(0), 0);
        assert_eq!(context, TaskContext::zeroed());
    }

    #[test]
    #[should_panic]
    fn x32_does_not_exist() {
        TaskContext::zeroed().gpr(32);
    }
}

// End of File
