// SPDX-FileCopyrightText: 2024 Redox OS Developers
// SPDX-License-Identifier: MIT

//! Task activity statistics
//!
//! Snapshots of each task's lifecycle state and accumulated active time,
//! rendered as a small table for diagnostics logs.

use std::fmt;
use std::time::Duration;

use ot_rtos_hal::kernel::{Kernel, Priority};

use crate::event::Event;
use crate::task::{TaskDescriptor, TaskKind, TaskState};

/// Point-in-time view of one task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskStats {
    /// Which task
    pub kind: TaskKind,
    /// Configured priority
    pub priority: Priority,
    /// Lifecycle state at capture time
    pub state: TaskState,
    /// Accumulated active time
    pub active: Duration,
    /// Events posted but not yet consumed
    pub pending: Event,
}

impl TaskStats {
    /// Snapshot a descriptor
    pub fn capture<K: Kernel>(task: &TaskDescriptor<K>) -> Self {
        Self {
            kind: task.kind(),
            priority: task.priority(),
            state: task.state(),
            active: task.active_duration(),
            pending: task.mailbox().pending(),
        }
    }

    /// Task name
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    /// Share of `uptime` spent doing work, in percent
    pub fn utilization(&self, uptime: Duration) -> f64 {
        if uptime.is_zero() {
            return 0.0;
        }
        self.active.as_secs_f64() / uptime.as_secs_f64() * 100.0
    }
}

/// Human-readable stats report
#[derive(Debug, Clone)]
pub struct StatsReport {
    /// Time since the supervisor was created
    pub uptime: Duration,
    /// One entry per initialized task, highest priority first
    pub tasks: Vec<TaskStats>,
}

impl StatsReport {
    /// Entry for `kind`, if that task was initialized
    pub fn task(&self, kind: TaskKind) -> Option<&TaskStats> {
        self.tasks.iter().find(|t| t.kind == kind)
    }

    /// Total active time across all tasks
    pub fn total_active(&self) -> Duration {
        self.tasks.iter().map(|t| t.active).sum()
    }
}

impl fmt::Display for StatsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== OT Task Statistics ===")?;
        writeln!(f, "Uptime: {:.3}s", self.uptime.as_secs_f64())?;
        for task in &self.tasks {
            writeln!(
                f,
                "{:<10} prio {:>2}  {:<11}  active {:>10.3}ms ({:>5.1}%)  pending {}",
                task.name(),
                task.priority.0,
                task.state.to_string(),
                task.active.as_secs_f64() * 1000.0,
                task.utilization(self.uptime),
                task.pending
            )?;
        }
        write!(
            f,
            "Total active: {:.3}ms",
            self.total_active().as_secs_f64() * 1000.0
        )
    }
}
