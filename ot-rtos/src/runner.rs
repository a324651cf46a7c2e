// SPDX-FileCopyrightText: 2024 Redox OS Developers
// SPDX-License-Identifier: MIT

//! Task runner loops
//!
//! Each runner is bound to one task descriptor. The stack runner drains
//! the engine run-to-completion: it services drivers and tasklets under the
//! stack mutex and only waits on its mailbox once the engine reports no
//! queued tasklets. A post that arrives while the runner is servicing is
//! kept in the mailbox, so the following wait returns immediately and no
//! event is lost.

use log::{debug, info, trace};
use ot_rtos_hal::kernel::Kernel;
use ot_rtos_hal::time::{Clock, Instant};

use crate::engine::{Engine, Hooks, SerialPort};
use crate::stack_mutex::StackMutex;
use crate::task::{TaskDescriptor, TaskState};

/// Shared collaborators every runner needs
pub struct RunnerContext<'a, K: Kernel, E: Engine> {
    /// Scheduler services
    pub kernel: &'a K,
    /// Lock serializing engine access
    pub stack_mutex: &'a StackMutex<K>,
    /// Network engine
    pub engine: &'a E,
    /// Injected application and power hooks
    pub hooks: &'a Hooks,
}

impl<K: Kernel, E: Engine> RunnerContext<'_, K, E> {
    /// Record the time since `started` and block until the task's event
    fn idle(&self, task: &TaskDescriptor<K>, started: Instant) {
        task.add_active(self.kernel.now().duration_since(started));
        self.hooks.update_sleep();
        let woke = task.mailbox().wait(task.kind().event());
        trace!("{} woke on {}", task.kind(), woke);
    }

    fn terminate(&self, task: &TaskDescriptor<K>) {
        task.advance(TaskState::Terminated);
        info!("{} task terminated", task.kind());
        self.kernel.terminate_current();
    }
}

/// Body of the stack task
///
/// Returns only after a pseudo-reset, once the engine is finalized.
pub fn run_stack_task<K: Kernel, E: Engine>(
    ctx: &RunnerContext<'_, K, E>,
    task: &TaskDescriptor<K>,
) {
    task.advance(TaskState::Running);
    debug!("{} task running", task.kind());

    while !ctx.engine.reset_requested() {
        let started = ctx.kernel.now();

        {
            let _guard = ctx.stack_mutex.lock();
            ctx.engine.service_drivers();
            ctx.engine.service_deferred_work();
        }

        if !ctx.engine.has_deferred_work() {
            ctx.idle(task, started);
        }
    }

    task.advance(TaskState::Terminating);
    info!("pseudo-reset requested, finalizing engine");
    ctx.stack_mutex.with(|| ctx.engine.finalize());
    ctx.terminate(task);
}

/// Body of the app task
///
/// Runs the application tick once per wake. Returns once a pseudo-reset is
/// observed.
pub fn run_app_task<K: Kernel, E: Engine>(
    ctx: &RunnerContext<'_, K, E>,
    task: &TaskDescriptor<K>,
) {
    task.advance(TaskState::Running);
    debug!("{} task running", task.kind());

    while !ctx.engine.reset_requested() {
        let started = ctx.kernel.now();
        (ctx.hooks.app_tick)();
        ctx.idle(task, started);
    }

    task.advance(TaskState::Terminating);
    ctx.terminate(task);
}

/// Body of the serial task
///
/// Serial callbacks land in the engine, so the port is processed under the
/// stack mutex. Returns once a pseudo-reset is observed.
pub fn run_serial_task<K: Kernel, E: Engine>(
    ctx: &RunnerContext<'_, K, E>,
    task: &TaskDescriptor<K>,
    port: &dyn SerialPort,
) {
    task.advance(TaskState::Running);
    debug!("{} task running", task.kind());

    while !ctx.engine.reset_requested() {
        let started = ctx.kernel.now();
        ctx.stack_mutex.with(|| port.process());
        ctx.idle(task, started);
    }

    task.advance(TaskState::Terminating);
    ctx.terminate(task);
}
