//! The trap dispatcher
//!
//! Every trap lands in the entry code in [`crate::asm`], which saves the
//! running task's registers and then calls [`dispatch`] on the trap stack.
//! A machine timer interrupt is a tick for the [`Scheduler`]. Anything else
//! is a fault in the task that was running, which we report and then park
//! that task, so the other tasks keep their time slices.

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use core::{
    ptr::NonNull,
    sync::atomic::{AtomicBool, Ordering},
};

use crate::{Scheduler, TaskContext, scheduler::TaskId, timer::TimerPort};

/// Is our trap vector installed?
static ARMED: AtomicBool = AtomicBool::new(false);

/// Whether we, or the environment, are handling traps
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DispatcherState {
    /// The trap vector is zero, and the environment handles traps
    Idle,
    /// Our trap vector is installed and the timer interrupt is enabled
    Armed,
}

/// Which state is the dispatcher in?
pub fn state() -> DispatcherState {
    if ARMED.load(Ordering::Relaxed) {
        DispatcherState::Armed
    } else {
        DispatcherState::Idle
    }
}

/// Install our trap vector and enable the machine timer interrupt
///
/// Interrupts stay globally disabled. They are turned on by the trap return
/// into the first task.
#[cfg(target_arch = "riscv32")]
pub(crate) fn install() {
    crate::asm::install_vector();
    ARMED.store(true, Ordering::Relaxed);
    debug!("Trap vector installed");
}

/// Disable the machine timer interrupt and hand traps back to the environment
#[cfg(target_arch = "riscv32")]
pub(crate) fn uninstall() {
    crate::asm::uninstall_vector();
    ARMED.store(false, Ordering::Relaxed);
    debug!("Trap vector removed");
}

/// Interrupt causes, from `mcause` with the interrupt bit set
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Interrupt {
    MachineSoftware,
    MachineTimer,
    MachineExternal,
    Other(usize),
}

/// Exception causes, from `mcause` with the interrupt bit clear
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Exception {
    InstructionMisaligned,
    InstructionFault,
    IllegalInstruction,
    Breakpoint,
    LoadMisaligned,
    LoadFault,
    StoreMisaligned,
    StoreFault,
    UserEnvCall,
    SupervisorEnvCall,
    MachineEnvCall,
    Other(usize),
}

/// Why we trapped
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TrapCause {
    Interrupt(Interrupt),
    Exception(Exception),
}

impl TrapCause {
    /// Where `mcause` keeps the interrupt flag
    const INTERRUPT_BIT: usize = 1 << (usize::BITS - 1);

    /// Decode a raw `mcause` value
    pub const fn from_bits(bits: usize) -> TrapCause {
        let code = bits & !Self::INTERRUPT_BIT;
        if bits & Self::INTERRUPT_BIT != 0 {
            TrapCause::Interrupt(match code {
                3 => Interrupt::MachineSoftware,
                7 => Interrupt::MachineTimer,
                11 => Interrupt::MachineExternal,
                other => Interrupt::Other(other),
            })
        } else {
            TrapCause::Exception(match code {
                0 => Exception::InstructionMisaligned,
                1 => Exception::InstructionFault,
                2 => Exception::IllegalInstruction,
                3 => Exception::Breakpoint,
                4 => Exception::LoadMisaligned,
                5 => Exception::LoadFault,
                6 => Exception::StoreMisaligned,
                7 => Exception::StoreFault,
                8 => Exception::UserEnvCall,
                9 => Exception::SupervisorEnvCall,
                11 => Exception::MachineEnvCall,
                other => Exception::Other(other),
            })
        }
    }

    /// Is this the timer tick that drives the scheduler?
    pub const fn is_timer(self) -> bool {
        matches!(self, TrapCause::Interrupt(Interrupt::MachineTimer))
    }
}

/// Something a task did that we cannot let it carry on from
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Fault {
    /// The task trapped for a reason other than the timer
    ForeignTrap {
        task: TaskId,
        cause: TrapCause,
        epc: usize,
        tval: usize,
    },
    /// The task's entry function returned
    TaskReturned { task: TaskId },
}

/// Work out what to resume after a trap
///
/// The trap entry code has already saved the running task's registers into
/// its context. Returns the context to restore.
pub(crate) fn dispatch<T: TimerPort>(
    scheduler: &Scheduler,
    timer: &mut T,
    cause: TrapCause,
    tval: usize,
) -> NonNull<TaskContext> {
    if cause.is_timer() {
        return scheduler.on_timer_tick(timer);
    }

    let task_id = scheduler.current_task_id();
    let Some(task) = scheduler.task(task_id) else {
        panic!("Trap {:?} with no current task", cause);
    };
    // SAFETY: The task is suspended, and we are the trap handler
    let epc = unsafe { task.saved_context().mepc };
    report(Fault::ForeignTrap {
        task: task_id,
        cause,
        epc,
        tval,
    });

    task.count_fault();
    // SAFETY: The task is suspended, and we are the trap handler
    unsafe {
        task.park(parked as usize);
    }
    task.context_ptr()
}

/// Log a fault
///
/// This can run inside the trap handler, so it must not trap itself. Tasks
/// can see faults through [`crate::Task::faults`].
fn report(fault: Fault) {
    error!("FAULT: {}", fault);
}

/// Where a parked task spends the rest of its time slices
pub(crate) extern "C" fn parked() -> ! {
    loop {
        #[cfg(target_arch = "riscv32")]
        crate::asm::wait_for_interrupt();
        #[cfg(not(target_arch = "riscv32"))]
        core::hint::spin_loop();
    }
}

/// Every task starts with its return address pointing here
///
/// Entry functions return `!`, so only hand-written assembly can get here.
pub(crate) extern "C" fn task_returned() -> ! {
    let task_id = crate::task_id();
    if let Some(task) = Scheduler::get_scheduler().and_then(|scheduler| scheduler.task(task_id)) {
        task.count_fault();
    }
    report(Fault::TaskReturned { task: task_id });
    parked()
}

#[cfg(test)]
mod test {
    use super::*;

    use crate::{Stack, Task};

    struct MockTimer {
        compare: u64,
    }

    impl TimerPort for MockTimer {
        fn read_time(&self) -> u64 {
            0
        }

        fn read_compare(&self) -> u64 {
            self.compare
        }

        fn arm(&mut self, deadline: u64) {
            self.compare = deadline;
        }
    }

    fn spin() -> ! {
        loop {
            core::hint::spin_loop();
        }
    }

    const TIMER: usize = (1 << (usize::BITS - 1)) | 7;

    #[test]
    fn decodes_interrupts() {
        assert_eq!(
            TrapCause::from_bits(TIMER),
            TrapCause::Interrupt(Interrupt::MachineTimer)
        );
        assert_eq!(
            TrapCause::from_bits((1 << (usize::BITS - 1)) | 11),
            TrapCause::Interrupt(Interrupt::MachineExternal)
        );
        assert_eq!(
            TrapCause::from_bits((1 << (usize::BITS - 1)) | 5),
            TrapCause::Interrupt(Interrupt::Other(5))
        );
        assert!(TrapCause::from_bits(TIMER).is_timer());
    }

    #[test]
    fn decodes_exceptions() {
        assert_eq!(
            TrapCause::from_bits(2),
            TrapCause::Exception(Exception::IllegalInstruction)
        );
        assert_eq!(
            TrapCause::from_bits(3),
            TrapCause::Exception(Exception::Breakpoint)
        );
        assert_eq!(
            TrapCause::from_bits(6),
            TrapCause::Exception(Exception::StoreMisaligned)
        );
        assert_eq!(
            TrapCause::from_bits(11),
            TrapCause::Exception(Exception::MachineEnvCall)
        );
        assert_eq!(
            TrapCause::from_bits(10),
            TrapCause::Exception(Exception::Other(10))
        );
        // exception 7 is not the timer
        assert!(!TrapCause::from_bits(7).is_timer());
    }

    #[test]
    fn timer_trap_switches_task() {
        static STACKS: [Stack<128>; 2] = [Stack::new(), Stack::new()];
        static TASKS: [Task; 2] = [Task::new(spin, &STACKS[0]), Task::new(spin, &STACKS[1])];
        let scheduler = Scheduler::new(&TASKS).with_quantum(5);
        let mut timer = MockTimer { compare: 0 };
        unsafe {
            scheduler.prepare(&mut timer, TaskId::new(0), 0);
        }

        let next = dispatch(&scheduler, &mut timer, TrapCause::from_bits(TIMER), 0);
        assert_eq!(next, TASKS[1].context_ptr());
        assert_eq!(timer.compare, 10);
    }

    #[test]
    fn foreign_trap_parks_the_task() {
        static STACKS: [Stack<128>; 2] = [Stack::new(), Stack::new()];
        static TASKS: [Task; 2] = [Task::new(spin, &STACKS[0]), Task::new(spin, &STACKS[1])];
        let scheduler = Scheduler::new(&TASKS).with_quantum(5);
        let mut timer = MockTimer { compare: 0 };
        unsafe {
            scheduler.prepare(&mut timer, TaskId::new(0), 0x800);
            let context = TASKS[0].context_ptr().as_ptr();
            (*context).mepc = 0x4000;
            (*context).sp = 0x1234;
        }

        // an illegal instruction in task 0
        let next = dispatch(&scheduler, &mut timer, TrapCause::from_bits(2), 0xFFFF_FFFF);
        assert_eq!(next, TASKS[0].context_ptr());
        let context = unsafe { TASKS[0].saved_context() };
        assert_eq!(context.mepc, parked as usize);
        assert_eq!(context.sp, STACKS[0].top() as usize);
        assert_eq!(context.gp, 0x800);
        assert!(context.enables_interrupts());
        // no tick was spent on it
        assert_eq!(timer.compare, 5);
        assert_eq!(TASKS[0].faults(), 1);
        assert_eq!(TASKS[1].faults(), 0);

        // and the round-robin carries on
        let next = dispatch(&scheduler, &mut timer, TrapCause::from_bits(TIMER), 0);
        assert_eq!(next, TASKS[1].context_ptr());
        let next = dispatch(&scheduler, &mut timer, TrapCause::from_bits(TIMER), 0);
        assert_eq!(next, TASKS[0].context_ptr());
    }

    #[test]
    fn every_fault_is_counted_against_its_task() {
        static STACKS: [Stack<128>; 3] = [Stack::new(), Stack::new(), Stack::new()];
        static TASKS: [Task; 3] = [
            Task::new(spin, &STACKS[0]),
            Task::new(spin, &STACKS[1]),
            Task::new(spin, &STACKS[2]),
        ];
        let scheduler = Scheduler::new(&TASKS).with_quantum(5);
        let mut timer = MockTimer { compare: 0 };
        unsafe {
            scheduler.prepare(&mut timer, TaskId::new(0), 0);
        }

        // a breakpoint that nothing serviced, in task 1, twice
        dispatch(&scheduler, &mut timer, TrapCause::from_bits(TIMER), 0);
        dispatch(&scheduler, &mut timer, TrapCause::from_bits(3), 0);
        dispatch(&scheduler, &mut timer, TrapCause::from_bits(3), 0);
        // and a load fault in task 2
        dispatch(&scheduler, &mut timer, TrapCause::from_bits(TIMER), 0);
        dispatch(&scheduler, &mut timer, TrapCause::from_bits(5), 0x10);

        let faults: Vec<u32> = TASKS.iter().map(Task::faults).collect();
        assert_eq!(faults, [0, 2, 1]);
        // only the two ticks moved the timer
        assert_eq!(timer.compare, 15);
    }

    #[test]
    fn dispatcher_starts_idle() {
        assert_eq!(state(), DispatcherState::Idle);
    }
}

// End of File
