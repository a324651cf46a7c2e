// SPDX-FileCopyrightText: 2024 Redox OS Developers
// SPDX-License-Identifier: MIT

//! Task descriptors
//!
//! One descriptor per managed task. A descriptor owns the task's mailbox,
//! its lifecycle state and its active-time accumulator; the supervisor owns
//! the descriptors and hands runners a reference.

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::time::Duration;

use ot_rtos_hal::kernel::{Kernel, Priority, TaskAttributes, TaskId};

use crate::config::RtosConfig;
use crate::event::Event;
use crate::mailbox::Mailbox;

/// The fixed set of adaptation tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TaskKind {
    /// Drives the network engine
    Stack,
    /// Runs the application tick
    App,
    /// Services the serial subsystem
    Serial,
}

impl TaskKind {
    /// All kinds, highest priority first
    pub const ALL: [TaskKind; 3] = [TaskKind::Stack, TaskKind::App, TaskKind::Serial];

    /// Task name given to the scheduler
    pub const fn name(&self) -> &'static str {
        match self {
            TaskKind::Stack => "OT Stack",
            TaskKind::App => "OT App",
            TaskKind::Serial => "OT Serial",
        }
    }

    /// Name of the task's wake semaphore
    pub const fn semaphore_name(&self) -> &'static str {
        match self {
            TaskKind::Stack => "OT Stack Semaphore",
            TaskKind::App => "OT App Semaphore",
            TaskKind::Serial => "OT Serial Semaphore",
        }
    }

    /// Event the task waits for
    pub const fn event(&self) -> Event {
        match self {
            TaskKind::Stack => Event::STACK,
            TaskKind::App => Event::APP,
            TaskKind::Serial => Event::SERIAL,
        }
    }

    /// Slot in the task table
    pub const fn index(&self) -> usize {
        match self {
            TaskKind::Stack => 0,
            TaskKind::App => 1,
            TaskKind::Serial => 2,
        }
    }

    /// Scheduler attributes for this task under `config`
    pub fn attributes(&self, config: &RtosConfig) -> TaskAttributes {
        let (priority, stack_size) = match self {
            TaskKind::Stack => (config.stack_priority, config.stack_mem_size),
            TaskKind::App => (config.app_priority, config.app_mem_size),
            TaskKind::Serial => (config.serial_priority, config.serial_mem_size),
        };
        TaskAttributes {
            name: self.name(),
            priority,
            stack_size,
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Task lifecycle
///
/// Transitions only move forward: Created → Running → Terminating →
/// Terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum TaskState {
    /// Descriptor allocated, task not yet scheduled
    Created = 0,
    /// Task body entered
    Running = 1,
    /// Reset observed, tearing down
    Terminating = 2,
    /// Task ended
    Terminated = 3,
}

impl TaskState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => TaskState::Created,
            1 => TaskState::Running,
            2 => TaskState::Terminating,
            _ => TaskState::Terminated,
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskState::Created => "created",
            TaskState::Running => "running",
            TaskState::Terminating => "terminating",
            TaskState::Terminated => "terminated",
        };
        f.write_str(s)
    }
}

/// Per-task bookkeeping
pub struct TaskDescriptor<K: Kernel> {
    kind: TaskKind,
    priority: Priority,
    id: spin::Once<TaskId>,
    mailbox: Mailbox<K::Semaphore>,
    state: AtomicU8,
    active_micros: AtomicU64,
}

impl<K: Kernel> TaskDescriptor<K> {
    /// Create a descriptor around a freshly created wake semaphore
    pub fn new(kind: TaskKind, priority: Priority, wake: K::Semaphore) -> Self {
        Self {
            kind,
            priority,
            id: spin::Once::new(),
            mailbox: Mailbox::new(wake),
            state: AtomicU8::new(TaskState::Created as u8),
            active_micros: AtomicU64::new(0),
        }
    }

    /// Task kind
    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    /// Configured priority
    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// Scheduler identity, once the task has been created
    pub fn id(&self) -> Option<TaskId> {
        self.id.get().copied()
    }

    pub(crate) fn bind(&self, id: TaskId) {
        self.id.call_once(|| id);
    }

    /// The task's mailbox
    pub fn mailbox(&self) -> &Mailbox<K::Semaphore> {
        &self.mailbox
    }

    /// Current lifecycle state
    pub fn state(&self) -> TaskState {
        TaskState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Advance the lifecycle, never moving backwards
    pub(crate) fn advance(&self, next: TaskState) {
        self.state.fetch_max(next as u8, Ordering::AcqRel);
    }

    /// Add time spent doing work
    pub(crate) fn add_active(&self, elapsed: Duration) {
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.active_micros.fetch_add(micros, Ordering::Relaxed);
    }

    /// Total time spent doing work
    pub fn active_duration(&self) -> Duration {
        Duration::from_micros(self.active_micros.load(Ordering::Relaxed))
    }
}
