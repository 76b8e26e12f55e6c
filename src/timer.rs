//! The machine timer port
//!
//! The machine timer is a free-running 64-bit counter (`mtime`) and a 64-bit
//! compare register (`mtimecmp`). The timer interrupt is pending whenever
//! `mtime >= mtimecmp`. On RV32 both are exposed as pairs of 32-bit halves.

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

/// Access to a 64-bit machine timer and its compare register
pub trait TimerPort {
    /// Read the free-running counter
    fn read_time(&self) -> u64;

    /// Read the compare register
    fn read_compare(&self) -> u64;

    /// Set the compare register, so the timer fires once the counter reaches
    /// `deadline`
    fn arm(&mut self, deadline: u64);

    /// Push the compare register `delta` counts past its current value
    ///
    /// This is relative to the last deadline, not to the current time, so
    /// the deadlines stay on a fixed grid however late the trap was serviced.
    /// A `delta` of zero leaves the interrupt pending.
    fn rearm_by(&mut self, delta: u64) {
        let deadline = self.read_compare().wrapping_add(delta);
        self.arm(deadline);
    }
}

/// Combine a 64-bit value from two 32-bit halves that are read separately
/// while the value may be counting
///
/// Reads high, low, then high again, and tries again if the low half carried
/// into the high half in between.
pub fn read_split<H, L>(mut read_hi: H, mut read_lo: L) -> u64
where
    H: FnMut() -> u32,
    L: FnMut() -> u32,
{
    loop {
        let hi = read_hi();
        let lo = read_lo();
        if read_hi() == hi {
            return (u64::from(hi) << 32) | u64::from(lo);
        }
    }
}

/// Split a 64-bit value into its (low, high) 32-bit halves
const fn halves(value: u64) -> (u32, u32) {
    (value as u32, (value >> 32) as u32)
}

/// A memory-mapped machine timer, laid out like a CLINT
pub struct MmioTimer {
    /// Address of the low half of `mtime`. The high half follows.
    mtime: *mut u32,
    /// Address of the low half of `mtimecmp`. The high half follows.
    mtimecmp: *mut u32,
}

impl MmioTimer {
    /// Where the emulator (and QEMU `virt`) puts `mtime`
    pub const MTIME_ADDR: usize = 0x0200_BFF8;

    /// Where the emulator (and QEMU `virt`) puts `mtimecmp` for hart 0
    pub const MTIMECMP_ADDR: usize = 0x0200_4000;

    /// Create a timer handle for registers at the given addresses
    ///
    /// # Safety
    ///
    /// Both addresses must point at two consecutive, 4-byte aligned 32-bit
    /// registers (low half first), valid for volatile access for as long as
    /// this object is used.
    pub const unsafe fn new(mtime: usize, mtimecmp: usize) -> MmioTimer {
        MmioTimer {
            mtime: mtime as *mut u32,
            mtimecmp: mtimecmp as *mut u32,
        }
    }

    /// The timer at the standard CLINT addresses
    pub const fn platform() -> MmioTimer {
        // SAFETY: These are the fixed timer addresses on our target platform
        unsafe { MmioTimer::new(Self::MTIME_ADDR, Self::MTIMECMP_ADDR) }
    }
}

impl TimerPort for MmioTimer {
    fn read_time(&self) -> u64 {
        // SAFETY: `new` requires the addresses to be valid registers
        unsafe {
            read_split(
                || self.mtime.add(1).read_volatile(),
                || self.mtime.read_volatile(),
            )
        }
    }

    fn read_compare(&self) -> u64 {
        // Only we write the compare register, so it can't change under us
        // SAFETY: `new` requires the addresses to be valid registers
        unsafe {
            let lo = self.mtimecmp.read_volatile();
            let hi = self.mtimecmp.add(1).read_volatile();
            (u64::from(hi) << 32) | u64::from(lo)
        }
    }

    fn arm(&mut self, deadline: u64) {
        let (lo, hi) = halves(deadline);
        // SAFETY: `new` requires the addresses to be valid registers
        unsafe {
            self.mtimecmp.write_volatile(lo);
            self.mtimecmp.add(1).write_volatile(hi);
        }
    }
}

/// A machine timer exposed through the custom CSRs `0x7C0..=0x7C3`
#[cfg(target_arch = "riscv32")]
pub struct CsrTimer(());

#[cfg(target_arch = "riscv32")]
impl CsrTimer {
    /// The timer CSRs of this hart
    pub const fn platform() -> CsrTimer {
        CsrTimer(())
    }
}

#[cfg(target_arch = "riscv32")]
impl TimerPort for CsrTimer {
    fn read_time(&self) -> u64 {
        read_split(crate::asm::read_mtimeh, crate::asm::read_mtime)
    }

    fn read_compare(&self) -> u64 {
        let lo = crate::asm::read_mtimecmp();
        let hi = crate::asm::read_mtimecmph();
        (u64::from(hi) << 32) | u64::from(lo)
    }

    fn arm(&mut self, deadline: u64) {
        let (lo, hi) = halves(deadline);
        crate::asm::write_mtimecmp(lo);
        crate::asm::write_mtimecmph(hi);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use std::cell::Cell;

    #[test]
    fn split_read_without_carry() {
        let value = read_split(|| 0x0000_0001, || 0x2345_6789);
        assert_eq!(value, 0x0000_0001_2345_6789);
    }

    #[test]
    fn split_read_retries_across_a_carry() {
        // The counter is 0x0_FFFF_FFFF when we start, and rolls over to
        // 0x1_0000_0000 right after the first low read.
        let hi_reads = Cell::new(0);
        let lo_reads = Cell::new(0);
        let value = read_split(
            || {
                hi_reads.set(hi_reads.get() + 1);
                if hi_reads.get() == 1 { 0 } else { 1 }
            },
            || {
                lo_reads.set(lo_reads.get() + 1);
                if lo_reads.get() == 1 { 0xFFFF_FFFF } else { 0x0000_0003 }
            },
        );
        assert_eq!(value, 0x0000_0001_0000_0003);
        assert_eq!(lo_reads.get(), 2);
        assert_eq!(hi_reads.get(), 4);
    }

    #[test]
    fn mmio_timer_uses_split_registers() {
        // mtime lo, mtime hi, mtimecmp lo, mtimecmp hi
        let mut regs = [0x8000_0000u32, 0x0000_0002, 0xFFFF_FFF0, 0x0000_0000];
        let base = regs.as_mut_ptr() as usize;
        let mut timer = unsafe { MmioTimer::new(base, base + 8) };

        assert_eq!(timer.read_time(), 0x0000_0002_8000_0000);
        assert_eq!(timer.read_compare(), 0x0000_0000_FFFF_FFF0);

        // carries from the low half into the high half
        timer.rearm_by(0x20);
        assert_eq!(timer.read_compare(), 0x0000_0001_0000_0010);
        assert_eq!(regs[2], 0x0000_0010);
        assert_eq!(regs[3], 0x0000_0001);
        // the counter is left alone
        assert_eq!(regs[0], 0x8000_0000);
        assert_eq!(regs[1], 0x0000_0002);
    }

    #[test]
    fn arm_sets_an_absolute_deadline() {
        let mut regs = [0u32; 4];
        let base = regs.as_mut_ptr() as usize;
        let mut timer = unsafe { MmioTimer::new(base, base + 8) };
        timer.arm(0x1234_5678_9ABC_DEF0);
        assert_eq!(timer.read_compare(), 0x1234_5678_9ABC_DEF0);
        assert_eq!(regs[2], 0x9ABC_DEF0);
        assert_eq!(regs[3], 0x1234_5678);
    }
}

// End of File
