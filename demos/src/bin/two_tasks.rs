//! Two tasks sharing the hart
//!
//! One counts up from zero and the other counts down from `0xFFFF_FFFF`.
//! Neither ever yields. Both report every 0x10000 steps, so the emulator log
//! shows them taking turns once per time slice.

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

#![no_std]
#![no_main]

use core::hint::black_box;

use tickswitch::{Scheduler, Stack, Task, TaskId};
use tickswitch_demos::log;

static TASK_LIST: [Task; 2] = [
    Task::new(count_up, &UP_STACK),
    Task::new(count_down, &DOWN_STACK),
];

static SCHEDULER: Scheduler = Scheduler::new(&TASK_LIST);

#[riscv_rt::entry]
fn main() -> ! {
    log::value(c"two_tasks: quantum", SCHEDULER.quantum() as u32);
    SCHEDULER.start(TaskId::new(0));
}

static UP_STACK: Stack<1024> = Stack::new();

/// Our counting-up task
fn count_up() -> ! {
    log::message(c"TASK 1 starting");
    let mut count: u32 = 0;
    loop {
        if count & 0xFFFF == 0 {
            log::int(count);
        }
        count = black_box(count.wrapping_add(1));
    }
}

static DOWN_STACK: Stack<1024> = Stack::new();

/// Our counting-down task
fn count_down() -> ! {
    log::message(c"TASK 2 starting");
    let mut count: u32 = 0xFFFF_FFFF;
    loop {
        if count & 0xFFFF == 0 {
            log::hex(c"TASK 2:", count);
        }
        count = black_box(count.wrapping_sub(1));
    }
}

// End of File
