//! Holds the [`Stack`] type and methods

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use core::cell::UnsafeCell;

/// Memory for one task's stack, `LEN` bytes long
///
/// Stacks are 16-byte aligned, and `LEN` must be a multiple of 16 (checked
/// with an assert), so the top of the stack is a valid initial `sp` under the
/// RISC-V psABI.
///
/// Every byte starts out as [`Stack::PAINT`]. Nothing stops a task running
/// off the bottom of its stack, but [`Stack::used`] shows how close it has
/// come.
#[repr(align(16))]
pub struct Stack<const LEN: usize> {
    contents: UnsafeCell<[u8; LEN]>,
}

impl<const LEN: usize> Stack<LEN> {
    /// The value a stack byte holds until a task writes to it
    pub const PAINT: u8 = 0xA5;

    /// Create a new, painted, stack
    pub const fn new() -> Self {
        assert!(LEN.is_multiple_of(16));
        Self {
            contents: UnsafeCell::new([Self::PAINT; LEN]),
        }
    }

    /// The initial stack pointer: one past the highest byte
    pub const fn top(&self) -> *mut u8 {
        // SAFETY: One past the end of an object is a valid pointer. Stacks
        // grow down, so nothing is ever written at this address.
        unsafe { self.bottom().add(LEN) }
    }

    /// The lowest address of the stack
    pub const fn bottom(&self) -> *mut u8 {
        self.contents.get() as *mut u8
    }

    /// The size of the stack in bytes
    pub const fn len(&self) -> usize {
        LEN
    }

    /// Is this a zero-sized stack?
    pub const fn is_empty(&self) -> bool {
        LEN == 0
    }

    /// How many bytes, counting up from the bottom, have never been written?
    ///
    /// A task that happens to write [`Stack::PAINT`] itself looks unused, so
    /// treat this as an upper bound.
    pub fn unused(&self) -> usize {
        let bottom = self.bottom();
        (0..LEN)
            // SAFETY: Within the stack. Volatile, as the owning task may be
            // writing to it.
            .take_while(|&offset| unsafe { bottom.add(offset).read_volatile() } == Self::PAINT)
            .count()
    }

    /// The deepest this stack has been, in bytes
    pub fn used(&self) -> usize {
        LEN - self.unused()
    }
}

/// SAFETY: We only hand out pointers to the contents, and only read the
/// contents with volatile reads.
unsafe impl<const LEN: usize> Sync for Stack<LEN> {}

impl<const LEN: usize> Default for Stack<LEN> {
    fn default() -> Self {
        Stack::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn top_is_aligned_and_one_past_the_end() {
        let stack: Stack<256> = Stack::new();
        let top = stack.top() as usize;
        let bottom = stack.bottom() as usize;
        assert_eq!(top % 16, 0);
        assert_eq!(top - bottom, 256);
        assert_eq!(stack.len(), 256);
    }

    #[test]
    fn fresh_stack_is_unused() {
        let stack: Stack<128> = Stack::new();
        assert_eq!(stack.unused(), 128);
        assert_eq!(stack.used(), 0);
    }

    #[test]
    fn usage_is_measured_from_the_deepest_write() {
        let stack: Stack<128> = Stack::new();
        unsafe {
            // a push of one word
            stack.top().sub(4).write_volatile(0);
            assert_eq!(stack.used(), 4);
            // a deeper frame, with a hole above it
            stack.top().sub(40).write_volatile(0x12);
        }
        assert_eq!(stack.used(), 40);
        assert_eq!(stack.unused(), 88);
    }
}

// End of File
