//! Lock policies for the shader API.
//!
//! The shader API is generic over a [`RawMutex`]. Multithreaded builds use
//! `parking_lot::RawMutex`; single-threaded builds use [`NullRawMutex`],
//! which never blocks.

use std::cell::Cell;

use parking_lot::lock_api::{GuardNoSend, RawMutex};

/// A lock that only tracks whether it is held.
///
/// Taking it twice panics instead of deadlocking or aliasing state. The type
/// is `!Sync`, so a shader API built on it cannot be shared across threads.
pub struct NullRawMutex {
    locked: Cell<bool>,
}

// SAFETY: `NullRawMutex` is `!Sync`, so it is only ever used from one thread.
// `lock` never hands out a second guard while the first is alive: it panics
// instead, which upholds mutual exclusion.
unsafe impl RawMutex for NullRawMutex {
    #[allow(clippy::declare_interior_mutable_const)]
    const INIT: Self = Self {
        locked: Cell::new(false),
    };

    type GuardMarker = GuardNoSend;

    fn lock(&self) {
        assert!(
            !self.locked.replace(true),
            "shader API lock taken re-entrantly"
        );
    }

    fn try_lock(&self) -> bool {
        !self.locked.replace(true)
    }

    unsafe fn unlock(&self) {
        self.locked.set(false);
    }

    fn is_locked(&self) -> bool {
        self.locked.get()
    }
}
