//! Build-time scheduler settings
//!
//! Generated by `build.rs`. Set `TICKSWITCH_TICK_QUANTUM` and
//! `TICKSWITCH_TRAP_STACK_BYTES` in the environment to change them.
//!
//! * `TICK_QUANTUM` - timer counts between two preemptions (default 100000)
//! * `TRAP_STACK_BYTES` - size of the stack the trap dispatcher runs on
//!   (default 1024)

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

include!(concat!(env!("OUT_DIR"), "/config.rs"));

const _: () = assert!(TICK_QUANTUM > 0);
const _: () = assert!(TRAP_STACK_BYTES.is_multiple_of(16));

// End of File
