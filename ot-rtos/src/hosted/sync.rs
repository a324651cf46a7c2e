// SPDX-FileCopyrightText: 2024 Redox OS Developers
// SPDX-License-Identifier: MIT

//! Hosted semaphore and recursive mutex

use std::thread::{self, ThreadId};

use log::trace;
use ot_rtos_hal::kernel::{MutexAttributes, Priority, RawMutex, Semaphore};
use ot_rtos_hal::{Error, Result};
use parking_lot::{Condvar, Mutex};

use super::kernel::current_priority;

/// Counting semaphore with a maximum count
pub struct HostSemaphore {
    name: &'static str,
    max: u32,
    count: Mutex<u32>,
    available: Condvar,
}

impl HostSemaphore {
    /// Create a semaphore holding `initial` of at most `max` units
    ///
    /// `initial` is clamped to `max`.
    pub fn new(name: &'static str, max: u32, initial: u32) -> Self {
        Self {
            name,
            max,
            count: Mutex::new(initial.min(max)),
            available: Condvar::new(),
        }
    }

    /// Semaphore name
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Maximum count
    pub fn max(&self) -> u32 {
        self.max
    }
}

impl Semaphore for HostSemaphore {
    fn acquire(&self) {
        let mut count = self.count.lock();
        while *count == 0 {
            self.available.wait(&mut count);
        }
        *count -= 1;
    }

    fn try_acquire(&self) -> bool {
        let mut count = self.count.lock();
        if *count == 0 {
            return false;
        }
        *count -= 1;
        true
    }

    fn release(&self) -> Result<()> {
        let mut count = self.count.lock();
        if *count >= self.max {
            return Err(Error::CountLimit);
        }
        *count += 1;
        self.available.notify_one();
        Ok(())
    }

    fn count(&self) -> u32 {
        *self.count.lock()
    }
}

struct MutexState {
    owner: Option<ThreadId>,
    depth: u32,
    /// Owner's own priority
    base: Priority,
    /// Priorities of blocked lockers
    waiters: Vec<Priority>,
}

/// Recursive mutex with priority-inheritance bookkeeping
///
/// Ownership is per thread. The host scheduler does not honour priorities,
/// so inheritance is tracked rather than applied: [`effective_priority`]
/// reports what the owner would run at on target.
///
/// [`effective_priority`]: HostMutex::effective_priority
pub struct HostMutex {
    name: &'static str,
    attributes: MutexAttributes,
    state: Mutex<MutexState>,
    released: Condvar,
}

impl HostMutex {
    /// Create an unlocked mutex
    pub fn new(name: &'static str, attributes: MutexAttributes) -> Self {
        Self {
            name,
            attributes,
            state: Mutex::new(MutexState {
                owner: None,
                depth: 0,
                base: Priority::default(),
                waiters: Vec::new(),
            }),
            released: Condvar::new(),
        }
    }

    /// Mutex name
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Creation attributes
    pub fn attributes(&self) -> MutexAttributes {
        self.attributes
    }

    /// Current recursion depth, zero when unlocked
    pub fn depth(&self) -> u32 {
        self.state.lock().depth
    }

    /// Number of threads blocked in [`RawMutex::lock`]
    pub fn waiters(&self) -> usize {
        self.state.lock().waiters.len()
    }

    /// Priority the owner runs at, `None` when unlocked
    ///
    /// With [`MutexAttributes::PRIO_INHERIT`] this is the higher of the
    /// owner's priority and that of its highest waiter.
    pub fn effective_priority(&self) -> Option<Priority> {
        let state = self.state.lock();
        state.owner?;
        if !self.attributes.contains(MutexAttributes::PRIO_INHERIT) {
            return Some(state.base);
        }
        let boost = state.waiters.iter().copied().max().unwrap_or_default();
        Some(state.base.max(boost))
    }

    /// Take ownership if free or already ours; false if held elsewhere
    fn enter(&self, state: &mut MutexState, me: ThreadId) -> bool {
        match state.owner {
            Some(owner) if owner == me => {
                assert!(
                    self.attributes.contains(MutexAttributes::RECURSIVE),
                    "{}: relocked by its owner",
                    self.name
                );
                state.depth += 1;
                true
            }
            Some(_) => false,
            None => {
                state.owner = Some(me);
                state.depth = 1;
                state.base = current_priority();
                true
            }
        }
    }
}

impl RawMutex for HostMutex {
    fn lock(&self) {
        let me = thread::current().id();
        let mut state = self.state.lock();
        if self.enter(&mut state, me) {
            return;
        }

        let priority = current_priority();
        state.waiters.push(priority);
        trace!("{}: blocked at priority {}", self.name, priority);
        while state.owner.is_some() {
            self.released.wait(&mut state);
        }
        if let Some(pos) = state.waiters.iter().position(|p| *p == priority) {
            state.waiters.swap_remove(pos);
        }
        self.enter(&mut state, me);
    }

    fn try_lock(&self) -> bool {
        let me = thread::current().id();
        let mut state = self.state.lock();
        self.enter(&mut state, me)
    }

    fn unlock(&self) -> Result<()> {
        let me = thread::current().id();
        let mut state = self.state.lock();
        if state.owner != Some(me) {
            return Err(Error::NotOwner);
        }
        state.depth -= 1;
        if state.depth == 0 {
            state.owner = None;
            state.base = Priority::default();
            self.released.notify_all();
        }
        Ok(())
    }

    fn is_owned_by_current(&self) -> bool {
        self.state.lock().owner == Some(thread::current().id())
    }
}
