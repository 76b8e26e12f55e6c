//! Holds the [`Task`] type and methods

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use core::{
    cell::UnsafeCell,
    ptr::NonNull,
    sync::atomic::{AtomicU32, Ordering},
};

use crate::{Stack, TaskContext};

/// The function a task runs. Tasks never return.
pub type TaskEntryFn = fn() -> !;

/// Represents a task that the scheduler is managing
///
/// Each task owns its stack and a saved [`TaskContext`]. Only the trap entry
/// code and [`Task::prepare`] write to the context.
pub struct Task {
    /// The saved registers, while this task is not running
    context: UnsafeCell<TaskContext>,
    /// Where the task starts
    entry_fn: TaskEntryFn,
    /// One past the highest address of the task's stack
    stack_top: *mut u8,
    /// How many time slices this task has been given
    activations: AtomicU32,
    /// How many times this task has faulted
    faults: AtomicU32,
}

impl Task {
    /// This is the minimum stack we can support
    ///
    /// The trap handler runs on its own stack, so this is only headroom for
    /// the task's own prologue.
    pub const MIN_STACK_SIZE: usize = 64;

    /// Create a new [`Task`] object
    ///
    /// # Panics
    ///
    /// Panics if the stack is smaller than [`Task::MIN_STACK_SIZE`]. In a
    /// `static` this is a build error.
    pub const fn new<const N: usize>(entry_fn: TaskEntryFn, stack: &'static Stack<N>) -> Task {
        assert!(N >= Self::MIN_STACK_SIZE);
        Task {
            context: UnsafeCell::new(TaskContext::zeroed()),
            entry_fn,
            stack_top: stack.top(),
            activations: AtomicU32::new(0),
            faults: AtomicU32::new(0),
        }
    }

    /// Get the initial entry function for this task
    pub const fn entry_fn(&self) -> TaskEntryFn {
        self.entry_fn
    }

    /// Get the top of this task's stack
    pub const fn stack_top(&self) -> *mut u8 {
        self.stack_top
    }

    /// How many time slices has this task been given?
    pub fn activations(&self) -> u32 {
        self.activations.load(Ordering::Relaxed)
    }

    /// How many times has this task faulted?
    ///
    /// A task that faults is parked, so anything above zero means this task
    /// has stopped doing useful work.
    pub fn faults(&self) -> u32 {
        self.faults.load(Ordering::Relaxed)
    }

    /// Write a fresh context, so the next restore starts the task from its
    /// entry function
    ///
    /// # Safety
    ///
    /// The task must not be running, and nothing may be holding a reference
    /// to its context.
    pub(crate) unsafe fn prepare(&self, exit: usize, global_pointer: usize) {
        let template = TaskContext::template(
            self.entry_fn as usize,
            self.stack_top as usize,
            exit,
            global_pointer,
        );
        // SAFETY: the caller guarantees exclusive access to the context
        unsafe {
            self.context.get().write(template);
        }
    }

    /// Throw away the saved context, so the next restore runs `entry` on a
    /// fresh stack instead
    ///
    /// Keeps the task's `gp`.
    ///
    /// # Safety
    ///
    /// The task must not be running, and nothing may be holding a reference
    /// to its context.
    pub(crate) unsafe fn park(&self, entry: usize) {
        let context = self.context.get();
        // SAFETY: the caller guarantees exclusive access to the context
        unsafe {
            let global_pointer = (*context).gp;
            context.write(TaskContext::template(
                entry,
                self.stack_top as usize,
                entry,
                global_pointer,
            ));
        }
    }

    /// Count one more time slice for this task
    ///
    /// Only ever called from the trap handler, so a plain load and store
    /// will do (and works on cores without atomic read-modify-write).
    pub(crate) fn activate(&self) {
        let count = self.activations.load(Ordering::Relaxed);
        self.activations.store(count.wrapping_add(1), Ordering::Relaxed);
    }

    /// Count a fault against this task
    ///
    /// Only the trap handler, or the task itself on its way to being parked,
    /// writes this.
    pub(crate) fn count_fault(&self) {
        let count = self.faults.load(Ordering::Relaxed);
        self.faults.store(count.wrapping_add(1), Ordering::Relaxed);
    }

    /// Get a pointer to this task's saved context
    pub(crate) fn context_ptr(&self) -> NonNull<TaskContext> {
        // SAFETY: UnsafeCell::get never returns null
        unsafe { NonNull::new_unchecked(self.context.get()) }
    }

    /// Get a copy of this task's saved context
    ///
    /// # Safety
    ///
    /// The task must not be running and no trap may be writing to the
    /// context.
    pub unsafe fn saved_context(&self) -> TaskContext {
        // SAFETY: the caller guarantees nobody is writing
        unsafe { (*self.context.get()).clone() }
    }
}

/// SAFETY: The context is only touched before the scheduler starts, and then
/// from the trap handler, which cannot be interrupted.
unsafe impl Sync for Task {}

#[cfg(test)]
mod test {
    use super::*;

    fn idle() -> ! {
        loop {
            core::hint::spin_loop();
        }
    }

    #[test]
    fn prepared_task_starts_at_its_entry_fn() {
        static STACK: Stack<256> = Stack::new();
        let task = Task::new(idle, &STACK);
        unsafe {
            task.prepare(0xDEAD_0000, 0x1800);
        }
        let context = unsafe { task.saved_context() };
        assert_eq!(context.mepc, idle as usize);
        assert_eq!(context.sp, STACK.top() as usize);
        assert_eq!(context.ra, 0xDEAD_0000);
        assert_eq!(context.gp, 0x1800);
        assert!(context.enables_interrupts());
        assert_eq!(task.activations(), 0);
    }

    #[test]
    fn prepare_discards_a_live_context() {
        static STACK: Stack<256> = Stack::new();
        let task = Task::new(idle, &STACK);
        unsafe {
            let context = task.context_ptr().as_ptr();
            (*context).s2 = 42;
            (*context).mepc = 0x1234;
            task.prepare(0, 0);
        }
        let context = unsafe { task.saved_context() };
        assert_eq!(context.s2, 0);
        assert_eq!(context.mepc, idle as usize);
    }

    #[test]
    #[should_panic]
    fn stack_must_be_big_enough() {
        let stack: &'static Stack<48> = Box::leak(Box::new(Stack::new()));
        let _ = Task::new(idle, stack);
    }

    #[test]
    fn faults_count_up() {
        static STACK: Stack<64> = Stack::new();
        let task = Task::new(idle, &STACK);
        assert_eq!(task.faults(), 0);
        task.count_fault();
        assert_eq!(task.faults(), 1);
        assert_eq!(task.activations(), 0);
    }

    #[test]
    fn activations_count_up() {
        static STACK: Stack<64> = Stack::new();
        let task = Task::new(idle, &STACK);
        task.activate();
        task.activate();
        assert_eq!(task.activations(), 2);
    }
}

// End of File
