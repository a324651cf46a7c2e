//! RTOS kernel traits
//!
//! This module defines the scheduler primitives the adaptation layer
//! consumes: task creation, counting semaphores and recursive mutexes.
//! A port binds them to a concrete kernel (CMSIS-RTOS2 on target, std
//! threads on a host).

use alloc::boxed::Box;
use core::fmt;

use bitflags::bitflags;

use crate::error::Result;
use crate::time::Clock;

/// Task priority rank, higher value runs first
///
/// Values follow the CMSIS-RTOS2 `osPriority_t` numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Priority(pub u8);

impl Priority {
    /// `osPriorityIdle`
    pub const IDLE: Priority = Priority(1);
    /// `osPriorityLow`
    pub const LOW: Priority = Priority(8);
    /// `osPriorityBelowNormal`
    pub const BELOW_NORMAL: Priority = Priority(16);
    /// `osPriorityBelowNormal7`
    pub const BELOW_NORMAL7: Priority = Priority(23);
    /// `osPriorityNormal`
    pub const NORMAL: Priority = Priority(24);
    /// `osPriorityAboveNormal`
    pub const ABOVE_NORMAL: Priority = Priority(32);
    /// `osPriorityHigh`
    pub const HIGH: Priority = Priority(40);
    /// `osPriorityRealtime`
    pub const REALTIME: Priority = Priority(48);
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Scheduler-owned task identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(pub u32);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

/// Task creation attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskAttributes {
    /// Task name
    pub name: &'static str,
    /// Scheduling priority
    pub priority: Priority,
    /// Stack size in bytes
    pub stack_size: usize,
}

impl TaskAttributes {
    /// Stack size rounded up to a whole number of 32-bit words
    pub const fn aligned_stack_size(&self) -> usize {
        (self.stack_size + 3) & !3
    }
}

bitflags! {
    /// Mutex creation attributes (CMSIS-RTOS2 `attr_bits`)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MutexAttributes: u32 {
        /// Owner may lock again without deadlocking
        const RECURSIVE = 1 << 0;
        /// Owner inherits the priority of its highest waiter
        const PRIO_INHERIT = 1 << 1;
    }
}

/// Task entry point
pub type TaskEntry = Box<dyn FnOnce() + Send + 'static>;

/// Counting semaphore
pub trait Semaphore: Send + Sync {
    /// Take one unit, blocking without timeout until one is available
    fn acquire(&self);

    /// Take one unit if available, never blocking
    fn try_acquire(&self) -> bool;

    /// Give back one unit
    ///
    /// Fails with [`Error::CountLimit`](crate::Error::CountLimit) when the
    /// semaphore already holds its maximum count.
    fn release(&self) -> Result<()>;

    /// Units currently available
    fn count(&self) -> u32;
}

/// Raw mutex without an attached payload
pub trait RawMutex: Send + Sync {
    /// Lock, blocking without timeout
    fn lock(&self);

    /// Lock only if it can be done without blocking
    fn try_lock(&self) -> bool;

    /// Unlock one level
    fn unlock(&self) -> Result<()>;

    /// Whether the calling task currently owns the mutex
    fn is_owned_by_current(&self) -> bool;
}

/// Kernel services consumed by the adaptation layer
pub trait Kernel: Clock + Send + Sync + 'static {
    /// Semaphore type produced by this kernel
    type Semaphore: Semaphore + 'static;
    /// Mutex type produced by this kernel
    type Mutex: RawMutex + 'static;

    /// Whether the scheduler has started
    fn is_running(&self) -> bool;

    /// Create a semaphore holding `initial` of at most `max` units
    fn create_semaphore(
        &self,
        name: &'static str,
        max: u32,
        initial: u32,
    ) -> Result<Self::Semaphore>;

    /// Create a mutex
    fn create_mutex(&self, name: &'static str, attributes: MutexAttributes)
        -> Result<Self::Mutex>;

    /// Create and start a task
    fn spawn(&self, attributes: &TaskAttributes, entry: TaskEntry) -> Result<TaskId>;

    /// Identity of the calling task, if called from a task
    fn current_task(&self) -> Option<TaskId>;

    /// End the calling task
    ///
    /// On target this does not return. Hosted ports record the termination
    /// and return so the task body can unwind normally.
    fn terminate_current(&self);

    /// Whether the caller runs in interrupt context
    fn in_interrupt(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::NORMAL > Priority::BELOW_NORMAL7);
        assert!(Priority::BELOW_NORMAL7 > Priority::BELOW_NORMAL);
    }

    #[test]
    fn test_stack_size_word_aligned() {
        let attrs = TaskAttributes {
            name: "t",
            priority: Priority::NORMAL,
            stack_size: 4607,
        };
        assert_eq!(attrs.aligned_stack_size(), 4608);
    }

    #[test]
    fn test_mutex_attribute_bits() {
        let attrs = MutexAttributes::RECURSIVE | MutexAttributes::PRIO_INHERIT;
        assert_eq!(attrs.bits(), 0x3);
    }
}
