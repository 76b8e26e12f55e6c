//! Checks that preemption preserves every register a task is using
//!
//! Two tasks spin in assembly with every register they can own locked to a
//! counter in `s2`, and check them all on every pass. Any register that comes
//! back from a context switch with the wrong value, or in the wrong slot,
//! breaks the pattern. A third task watches the clock and passes the test
//! once enough ticks have gone by.

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

#![no_std]
#![no_main]

use tickswitch::{Scheduler, Stack, Task, TaskId};
use tickswitch_demos::log;

/// How many time slices to check for
const CHECK_TICKS: u32 = 60;

static TASK_LIST: [Task; 3] = [
    Task::new(churn_low, &LOW_STACK),
    Task::new(churn_high, &HIGH_STACK),
    Task::new(monitor, &MONITOR_STACK),
];

static SCHEDULER: Scheduler = Scheduler::new(&TASK_LIST);

static LOW_STACK: Stack<256> = Stack::new();
static HIGH_STACK: Stack<256> = Stack::new();
static MONITOR_STACK: Stack<1024> = Stack::new();

#[riscv_rt::entry]
fn main() -> ! {
    log::message(c"register_continuity: starting");
    SCHEDULER.start(TaskId::new(0));
}

fn churn_low() -> ! {
    churn(0x0000_1000)
}

fn churn_high() -> ! {
    churn(0xABCD_0000)
}

/// Spin forever, holding every register except `sp` and `gp` at a fixed
/// offset from a counter in `s2`, which starts at `seed`
///
/// In the order `ra`, `tp`, `t0`-`t2`, `s0`, `s1`, `a0`-`a7`, `s3`-`s11`,
/// `t3`-`t6`, the registers sit 64, 128, 192 and so on above `s2`, ending
/// with `t6` at 1792.
///
/// Each pass adds one to every register, then checks each offset using `t6`
/// as scratch. `t6` is checked first, before it is overwritten. The trap
/// entry code swaps `t6` through `mscratch` and uses `t5` first, so those two
/// are the ones most likely to go wrong.
fn churn(seed: u32) -> ! {
    // SAFETY: Never returns, and touches no memory, so the registers we take
    // over are ours
    unsafe {
        core::arch::asm!(
            "mv     s2, a0",
            "addi   ra, s2, 64",
            "addi   tp, s2, 128",
            "addi   t0, s2, 192",
            "addi   t1, s2, 256",
            "addi   t2, s2, 320",
            "addi   s0, s2, 384",
            "addi   s1, s2, 448",
            "addi   a0, s2, 512",
            "addi   a1, s2, 576",
            "addi   a2, s2, 640",
            "addi   a3, s2, 704",
            "addi   a4, s2, 768",
            "addi   a5, s2, 832",
            "addi   a6, s2, 896",
            "addi   a7, s2, 960",
            "addi   s3, s2, 1024",
            "addi   s4, s2, 1088",
            "addi   s5, s2, 1152",
            "addi   s6, s2, 1216",
            "addi   s7, s2, 1280",
            "addi   s8, s2, 1344",
            "addi   s9, s2, 1408",
            "addi   s10, s2, 1472",
            "addi   s11, s2, 1536",
            "addi   t3, s2, 1600",
            "addi   t4, s2, 1664",
            "addi   t5, s2, 1728",
            "addi   t6, s2, 1792",
            "2:",
            // every register steps on by one
            "addi   s2, s2, 1",
            "addi   ra, ra, 1",
            "addi   tp, tp, 1",
            "addi   t0, t0, 1",
            "addi   t1, t1, 1",
            "addi   t2, t2, 1",
            "addi   s0, s0, 1",
            "addi   s1, s1, 1",
            "addi   a0, a0, 1",
            "addi   a1, a1, 1",
            "addi   a2, a2, 1",
            "addi   a3, a3, 1",
            "addi   a4, a4, 1",
            "addi   a5, a5, 1",
            "addi   a6, a6, 1",
            "addi   a7, a7, 1",
            "addi   s3, s3, 1",
            "addi   s4, s4, 1",
            "addi   s5, s5, 1",
            "addi   s6, s6, 1",
            "addi   s7, s7, 1",
            "addi   s8, s8, 1",
            "addi   s9, s9, 1",
            "addi   s10, s10, 1",
            "addi   s11, s11, 1",
            "addi   t3, t3, 1",
            "addi   t4, t4, 1",
            "addi   t5, t5, 1",
            "addi   t6, t6, 1",
            // t6 first, as it is also our scratch register
            "addi   t6, t6, -1792",
            "bne    t6, s2, 3f",
            "addi   t6, ra, -64",
            "bne    t6, s2, 3f",
            "addi   t6, tp, -128",
            "bne    t6, s2, 3f",
            "addi   t6, t0, -192",
            "bne    t6, s2, 3f",
            "addi   t6, t1, -256",
            "bne    t6, s2, 3f",
            "addi   t6, t2, -320",
            "bne    t6, s2, 3f",
            "addi   t6, s0, -384",
            "bne    t6, s2, 3f",
            "addi   t6, s1, -448",
            "bne    t6, s2, 3f",
            "addi   t6, a0, -512",
            "bne    t6, s2, 3f",
            "addi   t6, a1, -576",
            "bne    t6, s2, 3f",
            "addi   t6, a2, -640",
            "bne    t6, s2, 3f",
            "addi   t6, a3, -704",
            "bne    t6, s2, 3f",
            "addi   t6, a4, -768",
            "bne    t6, s2, 3f",
            "addi   t6, a5, -832",
            "bne    t6, s2, 3f",
            "addi   t6, a6, -896",
            "bne    t6, s2, 3f",
            "addi   t6, a7, -960",
            "bne    t6, s2, 3f",
            "addi   t6, s3, -1024",
            "bne    t6, s2, 3f",
            "addi   t6, s4, -1088",
            "bne    t6, s2, 3f",
            "addi   t6, s5, -1152",
            "bne    t6, s2, 3f",
            "addi   t6, s6, -1216",
            "bne    t6, s2, 3f",
            "addi   t6, s7, -1280",
            "bne    t6, s2, 3f",
            "addi   t6, s8, -1344",
            "bne    t6, s2, 3f",
            "addi   t6, s9, -1408",
            "bne    t6, s2, 3f",
            "addi   t6, s10, -1472",
            "bne    t6, s2, 3f",
            "addi   t6, s11, -1536",
            "bne    t6, s2, 3f",
            "addi   t6, t3, -1600",
            "bne    t6, s2, 3f",
            "addi   t6, t4, -1664",
            "bne    t6, s2, 3f",
            "addi   t6, t5, -1728",
            "bne    t6, s2, 3f",
            // put t6 back
            "addi   t6, s2, 1792",
            "j      2b",
            "3:",
            "tail   {failed}",
            in("a0") seed,
            failed = sym continuity_failed,
            options(noreturn, nomem, nostack),
        );
    }
}

/// Where a task goes when it finds a register has changed
extern "C" fn continuity_failed() -> ! {
    // dump the registers before we disturb them
    log::regs();
    log::message(c"register_continuity: FAIL");
    tickswitch_demos::exit(&SCHEDULER, 1)
}

/// Pass the test once enough time slices have gone by
fn monitor() -> ! {
    loop {
        let tick = tickswitch::now();
        if tick >= CHECK_TICKS {
            let mut faults = 0;
            for (idx, task) in TASK_LIST.iter().enumerate() {
                log::value(c"task", idx as u32);
                log::value(c"  activations", task.activations());
                log::value(c"  faults", task.faults());
                faults += task.faults();
            }
            log::value(c"low stack used", LOW_STACK.used() as u32);
            log::value(c"high stack used", HIGH_STACK.used() as u32);
            if faults != 0 {
                log::message(c"register_continuity: FAIL, a task faulted");
                tickswitch_demos::exit(&SCHEDULER, 1);
            }
            log::value(c"register_continuity: PASS, ticks", tick);
            tickswitch_demos::exit(&SCHEDULER, 0);
        }
    }
}

// End of File
