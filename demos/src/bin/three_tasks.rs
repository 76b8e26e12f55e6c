//! Three tasks taking turns
//!
//! Each task reports the tick that started its time slice, so the log shows
//! the strict rotation. The first task to see tick 30 stops the demo.

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

#![no_std]
#![no_main]

use core::ffi::CStr;

use tickswitch::{Scheduler, Stack, Task, TaskId};
use tickswitch_demos::log;

/// How many ticks to run for
const RUN_TICKS: u32 = 30;

static SCHEDULER: Scheduler = Scheduler::new({
    static TASK_LIST: [Task; 3] = [
        Task::new(rabbits, {
            static STACK: Stack<1024> = Stack::new();
            &STACK
        }),
        Task::new(hamsters, {
            static STACK: Stack<1024> = Stack::new();
            &STACK
        }),
        Task::new(cats, {
            static STACK: Stack<1024> = Stack::new();
            &STACK
        }),
    ];
    &TASK_LIST
});

#[riscv_rt::entry]
fn main() -> ! {
    log::message(c"three_tasks: hello!");
    SCHEDULER.start(TaskId::new(0));
}

/// Our 'rabbit' task
fn rabbits() -> ! {
    report_slices(c"Rabbit! tick")
}

/// Our 'hamster' task
fn hamsters() -> ! {
    report_slices(c"Hamster! tick")
}

/// Our 'cat' task
fn cats() -> ! {
    report_slices(c"Cat! tick")
}

/// Log `name` and the tick count whenever a new time slice starts
fn report_slices(name: &CStr) -> ! {
    let mut last_tick = None;
    loop {
        let tick = tickswitch::now();
        if last_tick != Some(tick) {
            log::value(name, tick);
            last_tick = Some(tick);
        }
        if tick >= RUN_TICKS {
            tickswitch_demos::exit(&SCHEDULER, 0);
        }
    }
}

// End of File
