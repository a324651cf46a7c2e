// SPDX-FileCopyrightText: 2024 Redox OS Developers
// SPDX-License-Identifier: MIT

//! Hosted kernel: std threads as tasks

use std::cell::Cell;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{debug, error, info, warn};
use ot_rtos_hal::kernel::{
    Kernel, MutexAttributes, Priority, TaskAttributes, TaskEntry, TaskId,
};
use ot_rtos_hal::time::{Clock, Instant};
use ot_rtos_hal::{Error, Result};
use parking_lot::Mutex;

use super::sync::{HostMutex, HostSemaphore};

thread_local! {
    static CURRENT_TASK: Cell<Option<TaskId>> = const { Cell::new(None) };
    static CURRENT_PRIORITY: Cell<Priority> = const { Cell::new(Priority(0)) };
    static IN_INTERRUPT: Cell<bool> = const { Cell::new(false) };
}

/// Priority of the calling thread, zero outside kernel tasks
pub(super) fn current_priority() -> Priority {
    CURRENT_PRIORITY.with(Cell::get)
}

/// Task record kept by the hosted kernel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostTask {
    /// Task identity
    pub id: TaskId,
    /// Attributes the task was created with
    pub attributes: TaskAttributes,
}

struct TaskSlot {
    task: HostTask,
    handle: Option<JoinHandle<()>>,
}

/// Restores the interrupt flag, also while unwinding
struct InterruptGuard {
    previous: bool,
}

impl Drop for InterruptGuard {
    fn drop(&mut self) {
        IN_INTERRUPT.with(|flag| flag.set(self.previous));
    }
}

/// Kernel backed by std threads
pub struct HostKernel {
    running: AtomicBool,
    epoch: std::time::Instant,
    next_id: AtomicU32,
    tasks: Mutex<Vec<TaskSlot>>,
    terminated: AtomicUsize,
}

impl HostKernel {
    /// Create a kernel in the not-yet-started state
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            running: AtomicBool::new(false),
            epoch: std::time::Instant::now(),
            next_id: AtomicU32::new(1),
            tasks: Mutex::new(Vec::new()),
            terminated: AtomicUsize::new(0),
        })
    }

    /// Start the scheduler
    pub fn start(&self) {
        if !self.running.swap(true, Ordering::AcqRel) {
            debug!("hosted scheduler started");
        }
    }

    /// Run `f` as if from an interrupt handler on this thread
    pub fn interrupt<R>(&self, f: impl FnOnce() -> R) -> R {
        let previous = IN_INTERRUPT.with(|flag| flag.replace(true));
        let _guard = InterruptGuard { previous };
        f()
    }

    /// Tasks created so far
    pub fn tasks(&self) -> Vec<HostTask> {
        self.tasks.lock().iter().map(|slot| slot.task).collect()
    }

    /// Number of tasks that called [`Kernel::terminate_current`]
    pub fn terminated_count(&self) -> usize {
        self.terminated.load(Ordering::Acquire)
    }

    /// Wait for every task created so far to return
    ///
    /// Returns the number of tasks joined. Tasks that panicked are logged.
    pub fn join_all(&self) -> usize {
        let handles: Vec<_> = self
            .tasks
            .lock()
            .iter_mut()
            .filter_map(|slot| slot.handle.take().map(|h| (slot.task, h)))
            .collect();

        let joined = handles.len();
        for (task, handle) in handles {
            if handle.join().is_err() {
                error!("{} ({}) panicked", task.attributes.name, task.id);
            }
        }
        joined
    }
}

impl Clock for HostKernel {
    fn now(&self) -> Instant {
        let micros = u64::try_from(self.epoch.elapsed().as_micros()).unwrap_or(u64::MAX);
        Instant::from_micros(micros)
    }
}

impl Kernel for HostKernel {
    type Semaphore = HostSemaphore;
    type Mutex = HostMutex;

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn create_semaphore(
        &self,
        name: &'static str,
        max: u32,
        initial: u32,
    ) -> Result<HostSemaphore> {
        if max == 0 || initial > max {
            warn!("{}: invalid counts {}/{}", name, initial, max);
            return Err(Error::InvalidParameter);
        }
        Ok(HostSemaphore::new(name, max, initial))
    }

    fn create_mutex(&self, name: &'static str, attributes: MutexAttributes) -> Result<HostMutex> {
        Ok(HostMutex::new(name, attributes))
    }

    fn spawn(&self, attributes: &TaskAttributes, entry: TaskEntry) -> Result<TaskId> {
        if !self.is_running() {
            return Err(Error::KernelNotRunning);
        }

        let id = TaskId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let priority = attributes.priority;

        // Host threads need more stack than the target budget; the
        // requested size is only recorded.
        let handle = thread::Builder::new()
            .name(attributes.name.to_string())
            .spawn(move || {
                CURRENT_TASK.with(|task| task.set(Some(id)));
                CURRENT_PRIORITY.with(|p| p.set(priority));
                entry();
            })
            .map_err(|err| {
                warn!("failed to spawn {}: {}", attributes.name, err);
                Error::ResourceExhausted
            })?;

        info!(
            "created {} ({}, priority {}, {} byte stack)",
            attributes.name,
            id,
            priority,
            attributes.aligned_stack_size()
        );

        self.tasks.lock().push(TaskSlot {
            task: HostTask {
                id,
                attributes: *attributes,
            },
            handle: Some(handle),
        });
        Ok(id)
    }

    fn current_task(&self) -> Option<TaskId> {
        CURRENT_TASK.with(Cell::get)
    }

    fn terminate_current(&self) {
        self.terminated.fetch_add(1, Ordering::AcqRel);
        match self.current_task() {
            Some(id) => debug!("{} terminated", id),
            None => debug!("non-task thread terminated"),
        }
    }

    fn in_interrupt(&self) -> bool {
        IN_INTERRUPT.with(Cell::get)
    }
}
