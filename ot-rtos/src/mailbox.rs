// SPDX-FileCopyrightText: 2024 Redox OS Developers
// SPDX-License-Identifier: MIT

//! Per-task event mailbox
//!
//! A mailbox pairs a word of pending event bits with a binary wake
//! semaphore. Any number of producers (tasks or interrupt handlers) OR bits
//! in and give the semaphore; the single owning task waits for a subset of
//! bits and clears exactly the bits it consumed.
//!
//! Posting sets the bit *before* giving the semaphore, and waiting checks
//! the bits *before* taking it. A post that lands between the waiter's check
//! and its take therefore leaves a unit in the semaphore, and the take
//! returns at once. Because the semaphore saturates at one unit, a stale
//! unit can cause one spurious wake, which the wait loop absorbs by
//! re-checking the bits.

use std::sync::atomic::{AtomicU32, Ordering};

use ot_rtos_hal::kernel::Semaphore;

use crate::event::Event;

/// Maximum units held by a mailbox wake semaphore
pub const WAKE_MAX_COUNT: u32 = 1;

/// Initial units held by a mailbox wake semaphore
pub const WAKE_INITIAL_COUNT: u32 = 0;

/// Pending-event word plus wake semaphore for one task
pub struct Mailbox<S: Semaphore> {
    pending: AtomicU32,
    wake: S,
}

impl<S: Semaphore> Mailbox<S> {
    /// Create an empty mailbox around a wake semaphore
    ///
    /// The semaphore should be created with [`WAKE_MAX_COUNT`] and
    /// [`WAKE_INITIAL_COUNT`].
    pub fn new(wake: S) -> Self {
        Self {
            pending: AtomicU32::new(0),
            wake,
        }
    }

    /// Mark `events` pending and wake the owner
    ///
    /// Never blocks. Repeated posts of the same bit before the owner
    /// consumes it coalesce into one.
    pub fn post(&self, events: Event) {
        self.pending.fetch_or(events.bits(), Ordering::Release);
        // A full semaphore already guarantees a wake.
        let _ = self.wake.release();
    }

    /// Block until any bit of `mask` is pending, then clear and return the
    /// satisfied bits
    pub fn wait(&self, mask: Event) -> Event {
        loop {
            let ready = self.pending() & mask;
            if !ready.is_empty() {
                // Only the owner clears bits, so everything observed in
                // `ready` is still set.
                self.pending.fetch_and(!ready.bits(), Ordering::AcqRel);
                return ready;
            }
            self.wake.acquire();
        }
    }

    /// Snapshot of the pending bits
    pub fn pending(&self) -> Event {
        Event::from_bits_retain(self.pending.load(Ordering::Acquire))
    }

    /// Units currently held by the wake semaphore
    pub fn wake_count(&self) -> u32 {
        self.wake.count()
    }
}
