// SPDX-FileCopyrightText: 2024 Redox OS Developers
// SPDX-License-Identifier: MIT

//! Process-wide stack mutex
//!
//! Every call into the network engine happens while holding this mutex. It
//! is recursive, so a task already inside the engine may re-enter (an app
//! tick that calls a locked engine API), and priority-inheriting, so a low
//! priority holder is boosted while a higher priority task waits.
//!
//! The mutex must never be taken from interrupt context; interrupts post
//! events instead.

use std::marker::PhantomData;
use std::sync::Arc;

use log::error;
use ot_rtos_hal::kernel::{Kernel, MutexAttributes, RawMutex};
use ot_rtos_hal::Result;

/// Name given to the kernel mutex object
pub const STACK_MUTEX_NAME: &str = "OT Stack Mutex";

/// Recursive, priority-inheriting lock guarding the engine instance
pub struct StackMutex<K: Kernel> {
    raw: K::Mutex,
    kernel: Arc<K>,
}

impl<K: Kernel> StackMutex<K> {
    /// Attributes the stack mutex is created with
    pub const ATTRIBUTES: MutexAttributes =
        MutexAttributes::RECURSIVE.union(MutexAttributes::PRIO_INHERIT);

    /// Create the mutex through the kernel
    pub fn new(kernel: Arc<K>) -> Result<Self> {
        let raw = kernel.create_mutex(STACK_MUTEX_NAME, Self::ATTRIBUTES)?;
        Ok(Self { raw, kernel })
    }

    /// Acquire, blocking without timeout
    ///
    /// # Panics
    ///
    /// Panics when called from interrupt context.
    pub fn lock(&self) -> StackGuard<'_, K> {
        assert!(
            !self.kernel.in_interrupt(),
            "stack mutex acquired from interrupt context"
        );
        self.raw.lock();
        StackGuard::new(self)
    }

    /// Acquire only if no other task holds the mutex
    ///
    /// A `None` result means the caller must defer its work rather than
    /// retry in a loop.
    ///
    /// # Panics
    ///
    /// Panics when called from interrupt context.
    pub fn try_lock(&self) -> Option<StackGuard<'_, K>> {
        assert!(
            !self.kernel.in_interrupt(),
            "stack mutex acquired from interrupt context"
        );
        if self.raw.try_lock() {
            Some(StackGuard::new(self))
        } else {
            None
        }
    }

    /// Run `f` with the mutex held
    pub fn with<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = self.lock();
        f()
    }

    /// Whether the calling task holds the mutex
    pub fn is_held_by_current(&self) -> bool {
        self.raw.is_owned_by_current()
    }
}

/// Proof of holding one level of the stack mutex
///
/// Releases that level when dropped, including during unwinding. Not `Send`:
/// the level must be released by the task that took it.
pub struct StackGuard<'a, K: Kernel> {
    mutex: &'a StackMutex<K>,
    _not_send: PhantomData<*const ()>,
}

impl<'a, K: Kernel> StackGuard<'a, K> {
    fn new(mutex: &'a StackMutex<K>) -> Self {
        Self {
            mutex,
            _not_send: PhantomData,
        }
    }
}

impl<K: Kernel> Drop for StackGuard<'_, K> {
    fn drop(&mut self) {
        if let Err(err) = self.mutex.raw.unlock() {
            error!("stack mutex release failed: {}", err);
        }
    }
}
