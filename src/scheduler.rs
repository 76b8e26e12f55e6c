//! Contains the [`Scheduler`] type

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use core::{
    ptr::NonNull,
    sync::atomic::{AtomicPtr, AtomicU32, AtomicUsize, Ordering},
};

use crate::{Task, TaskContext, config, timer::TimerPort};

/// The location of our one and only running [`Scheduler`] object.
///
/// We need this so that the free-standing trap handler knows where all our
/// system state is.
pub(crate) static SCHEDULER_PTR: AtomicPtr<Scheduler> = AtomicPtr::new(core::ptr::null_mut());

/// Represents a Task
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TaskId(usize);

impl TaskId {
    /// Represents the Task ID we produce when the scheduler isn't running
    const INVALID_ID: usize = usize::MAX;

    /// Make a Task ID for the task at this position in the task list
    pub const fn new(index: usize) -> TaskId {
        TaskId(index)
    }

    /// Is this the invalid Task ID?
    pub const fn is_invalid(self) -> bool {
        self.0 == Self::INVALID_ID
    }

    /// The position of this task in the task list
    pub const fn index(self) -> usize {
        self.0
    }

    /// Create an invalid Task ID
    pub(crate) const fn invalid() -> TaskId {
        TaskId(Self::INVALID_ID)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for TaskId {
    fn format(&self, fmt: defmt::Formatter) {
        if self.is_invalid() {
            defmt::write!(fmt, "T---");
        } else {
            defmt::write!(fmt, "T{=usize:03}", self.0);
        }
    }
}

impl core::fmt::Display for TaskId {
    fn fmt(&self, fmt: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if self.is_invalid() {
            write!(fmt, "T---")
        } else {
            write!(fmt, "T{:03}", self.0)
        }
    }
}

/// The round-robin rule: the slot after `current`, wrapping at `count`
///
/// # Panics
///
/// Panics if `count` is zero. There is no slot to pick.
pub const fn next_slot(current: usize, count: usize) -> usize {
    assert!(count > 0, "no slots to pick from");
    current.wrapping_add(1) % count
}

/// A pre-emptive task-switching scheduler
///
/// It time slices a fixed list of tasks in a round-robin fashion, whether or
/// not they have work to do. Every time the machine timer fires, the trap
/// entry code saves the running task's registers into its [`Task`], we move
/// the timer compare register on by one quantum and pick the next task in
/// the list, and the trap entry code resumes it.
pub struct Scheduler {
    /// Which task is currently running
    current_task: AtomicUsize,
    /// A fixed, static list of all our tasks
    task_list: &'static [Task],
    /// Timer counts per time slice
    quantum: u64,
    /// Current tick count
    ticks: AtomicU32,
}

impl Scheduler {
    /// Build the scheduler, with the time slice set at build time
    pub const fn new(task_list: &'static [Task]) -> Scheduler {
        // Cannot schedule without at least one task
        assert!(!task_list.is_empty());
        Scheduler {
            current_task: AtomicUsize::new(TaskId::INVALID_ID),
            task_list,
            quantum: config::TICK_QUANTUM,
            ticks: AtomicU32::new(0),
        }
    }

    /// Change the time slice, in timer counts
    pub const fn with_quantum(mut self, quantum: u64) -> Scheduler {
        // A zero quantum would leave the timer interrupt permanently pending
        assert!(quantum > 0);
        self.quantum = quantum;
        self
    }

    /// Run the scheduler
    ///
    /// You may only call this once, and you should call it from `fn main()`
    /// once all your hardware is configured. We should be in Machine mode,
    /// with nothing else using the trap vector.
    ///
    /// Starts `initial` as if it were returning from a timer trap, with
    /// interrupts enabled. The first preemption happens one quantum from
    /// now.
    #[cfg(target_arch = "riscv32")]
    pub fn start(&'static self, initial: TaskId) -> ! {
        use crate::{MachineTimer, asm, trap};

        // Interrupts stay off until the first task's context is restored
        asm::disable_interrupts();

        if !SCHEDULER_PTR.load(Ordering::Acquire).is_null() {
            panic!("Tried to re-start scheduler!");
        }

        let mut timer = MachineTimer::platform();
        // SAFETY: Interrupts are off and no task is running yet
        let first = unsafe { self.prepare(&mut timer, initial, asm::global_pointer()) };

        // remember where this object is - it cannot move because it is 'static
        let self_addr = self as *const Scheduler as *mut Scheduler;
        info!("Scheduler @ {=usize:08x}", self_addr as usize);
        SCHEDULER_PTR.store(self_addr, Ordering::Release);

        // Must do this /after/ setting SCHEDULER_PTR because the trap
        // handler will use SCHEDULER_PTR
        trap::install();

        debug!("Starting {}", initial);
        // SAFETY: `prepare` filled in a valid context for the initial task
        unsafe { asm::restore_context(first.as_ptr()) }
    }

    /// Stop pre-empting tasks
    ///
    /// The task that calls this keeps running, and the other tasks are never
    /// resumed. The trap vector is handed back to the environment.
    #[cfg(target_arch = "riscv32")]
    pub fn stop(&self) {
        crate::trap::uninstall();
        info!("Scheduler stopped in {}", self.current_task_id());
    }

    /// Give every task a fresh context, select the initial task, and arm the
    /// timer one quantum from now
    ///
    /// Returns the context to restore first.
    ///
    /// # Safety
    ///
    /// No task may be running and interrupts must be off.
    pub(crate) unsafe fn prepare<T: TimerPort>(
        &self,
        timer: &mut T,
        initial: TaskId,
        global_pointer: usize,
    ) -> NonNull<TaskContext> {
        if self.current_task.load(Ordering::Relaxed) != TaskId::INVALID_ID {
            panic!("Tried to re-start scheduler!");
        }
        if initial.index() >= self.task_list.len() {
            panic!("No such task {}", initial.index());
        }

        for (task_idx, task) in self.task_list.iter().enumerate() {
            debug!(
                "Init task context {=usize}, with stack @ 0x{=usize:08x}",
                task_idx,
                task.stack_top() as usize
            );
            // SAFETY: The caller guarantees no task is running
            unsafe {
                task.prepare(crate::trap::task_returned as usize, global_pointer);
            }
        }

        let task = &self.task_list[initial.index()];
        task.activate();
        self.current_task.store(initial.index(), Ordering::Relaxed);

        let deadline = timer.read_time().wrapping_add(self.quantum);
        timer.arm(deadline);
        debug!("First tick due @ {=u64}", deadline);

        task.context_ptr()
    }

    /// Handle one timer tick
    ///
    /// Call this from the timer trap, after the running task's registers
    /// have been saved. Moves the timer deadline on by one quantum, and
    /// returns the context of the task to resume.
    pub fn on_timer_tick<T: TimerPort>(&self, timer: &mut T) -> NonNull<TaskContext> {
        timer.rearm_by(self.quantum);

        // Only the trap handler writes these, and it cannot be interrupted,
        // so a plain load and store will do
        let ticks = self.ticks.load(Ordering::Relaxed).wrapping_add(1);
        self.ticks.store(ticks, Ordering::Relaxed);

        let next_task = self.pick_next_task();
        trace!("Tick {=u32} -> {}", ticks, next_task);
        let task = &self.task_list[next_task.index()];
        task.activate();
        task.context_ptr()
    }

    /// Get current tick count
    pub fn now(&self) -> u32 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Get the current Task ID
    pub fn current_task_id(&self) -> TaskId {
        TaskId(self.current_task.load(Ordering::Relaxed))
    }

    /// How many tasks do we have?
    pub fn task_count(&self) -> usize {
        self.task_list.len()
    }

    /// Timer counts per time slice
    pub fn quantum(&self) -> u64 {
        self.quantum
    }

    /// Get a task by ID
    pub fn task(&self, task_id: TaskId) -> Option<&Task> {
        self.task_list.get(task_id.index())
    }

    /// Get the handle to the global scheduler
    pub(crate) fn get_scheduler() -> Option<&'static Scheduler> {
        // Get our stashed pointer
        let scheduler_ptr = SCHEDULER_PTR.load(Ordering::Relaxed);
        // Are we intialised?
        if scheduler_ptr.is_null() {
            None
        } else {
            // SAFETY: Only [`Scheduler::start`] writes to [`SCHEDULER_PTR`] and it
            // always sets it to be a valid pointer to a [`Scheduler`] that does not
            // move.
            Some(unsafe { &*scheduler_ptr })
        }
    }

    /// Select the next task in the round-robin, and make it current
    fn pick_next_task(&self) -> TaskId {
        let current_task = self.current_task.load(Ordering::Relaxed);
        let next_task = if current_task == TaskId::INVALID_ID {
            0
        } else {
            next_slot(current_task, self.task_list.len())
        };
        self.current_task.store(next_task, Ordering::Relaxed);
        TaskId(next_task)
    }
}


// End of File
