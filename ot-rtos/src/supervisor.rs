// SPDX-FileCopyrightText: 2024 Redox OS Developers
// SPDX-License-Identifier: MIT

//! Task supervisor
//!
//! Owns the task table, the stack mutex and the engine, creates the tasks
//! the configuration selects, and routes raised events to task mailboxes.
//!
//! ```text
//!   raise_event(APP)
//!         │
//!   ┌─────▼──────┐   APP    ┌──────────┐
//!   │  routing   ├─────────►│ OT App   │  app tick
//!   │  table     │  STACK   ├──────────┤
//!   │            ├─────────►│ OT Stack │  drivers + tasklets
//!   └────────────┘          └──────────┘
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, trace, warn};
use ot_rtos_hal::kernel::Kernel;
use ot_rtos_hal::time::{Clock, Instant};
use ot_rtos_hal::{Error, Result};

use crate::config::RtosConfig;
use crate::engine::{Engine, Hooks, SerialPort};
use crate::event::Event;
use crate::mailbox::{WAKE_INITIAL_COUNT, WAKE_MAX_COUNT};
use crate::runner::{run_app_task, run_serial_task, run_stack_task, RunnerContext};
use crate::stack_mutex::{StackGuard, StackMutex};
use crate::stats::{StatsReport, TaskStats};
use crate::task::{TaskDescriptor, TaskKind, TaskState};

/// Mailbox deliveries for one raised event kind
///
/// Each entry names a target task and the bit posted to its mailbox. An
/// APP event also wakes the stack task, since app ticks may queue stack
/// work. APP routes are only followed while the app task is enabled.
pub fn routes(event: Event) -> &'static [(TaskKind, Event)] {
    const STACK: &[(TaskKind, Event)] = &[(TaskKind::Stack, Event::STACK)];
    const APP: &[(TaskKind, Event)] = &[
        (TaskKind::App, Event::APP),
        (TaskKind::Stack, Event::STACK),
    ];
    const SERIAL: &[(TaskKind, Event)] = &[(TaskKind::Serial, Event::SERIAL)];

    if event == Event::STACK {
        STACK
    } else if event == Event::APP {
        APP
    } else if event == Event::SERIAL {
        SERIAL
    } else {
        &[]
    }
}

struct Shared<K: Kernel, E: Engine> {
    kernel: Arc<K>,
    engine: E,
    config: RtosConfig,
    hooks: Hooks,
    serial: Option<Box<dyn SerialPort>>,
    stack_mutex: spin::Once<StackMutex<K>>,
    tasks: [spin::Once<TaskDescriptor<K>>; 3],
    /// Set by the first `initialize_stack_task` caller
    stack_claimed: AtomicBool,
    /// Set by the first `initialize_app_task` caller
    app_claimed: AtomicBool,
    created_at: Instant,
}

impl<K: Kernel, E: Engine> Shared<K, E> {
    fn task(&self, kind: TaskKind) -> Option<&TaskDescriptor<K>> {
        self.tasks[kind.index()].get()
    }

    fn raise(&self, events: Event) {
        for event in events.iter() {
            if event == Event::APP && !self.config.app_task_enabled {
                trace!("{} ignored, app task disabled", event);
                continue;
            }
            for &(kind, bit) in routes(event) {
                match self.task(kind) {
                    Some(task) => {
                        trace!("{} -> {}", event, kind);
                        task.mailbox().post(bit);
                    }
                    None => trace!("{} -> {} skipped, task not created", event, kind),
                }
            }
        }
        self.hooks.update_sleep();
    }

    /// Body of every spawned task
    fn run(&self, kind: TaskKind) {
        let (Some(stack_mutex), Some(task)) = (self.stack_mutex.get(), self.task(kind)) else {
            error!("{} started before its descriptor", kind);
            return;
        };
        let ctx = RunnerContext {
            kernel: &*self.kernel,
            stack_mutex,
            engine: &self.engine,
            hooks: &self.hooks,
        };
        match kind {
            TaskKind::Stack => run_stack_task(&ctx, task),
            TaskKind::App => run_app_task(&ctx, task),
            TaskKind::Serial => match self.serial.as_deref() {
                Some(port) => run_serial_task(&ctx, task, port),
                None => error!("{} started without a serial port", kind),
            },
        }
    }

    /// Allocate a descriptor for `kind` without publishing it
    fn new_descriptor(&self, kind: TaskKind) -> Result<TaskDescriptor<K>> {
        let wake = self.kernel.create_semaphore(
            kind.semaphore_name(),
            WAKE_MAX_COUNT,
            WAKE_INITIAL_COUNT,
        )?;
        let priority = kind.attributes(&self.config).priority;
        Ok(TaskDescriptor::new(kind, priority, wake))
    }

    /// Publish `descriptor` into its slot
    ///
    /// Callers hold the matching claim, so the slot is still empty.
    fn publish(&self, descriptor: TaskDescriptor<K>) -> &TaskDescriptor<K> {
        self.tasks[descriptor.kind().index()].call_once(|| descriptor)
    }

    /// Everything `initialize_stack_task` allocates, before any of it is
    /// published
    fn stack_resources(&self) -> Result<StackResources<K>> {
        let stack = self.new_descriptor(TaskKind::Stack)?;
        let serial = if self.config.serial_task_enabled {
            Some(self.new_descriptor(TaskKind::Serial)?)
        } else {
            None
        };
        let mutex = StackMutex::new(Arc::clone(&self.kernel))?;
        Ok(StackResources { stack, serial, mutex })
    }
}

struct StackResources<K: Kernel> {
    stack: TaskDescriptor<K>,
    serial: Option<TaskDescriptor<K>>,
    mutex: StackMutex<K>,
}

/// Take `flag` for the caller, or fail if someone already did
fn claim(flag: &AtomicBool) -> Result<()> {
    flag
        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        .map(|_| ())
        .map_err(|_| Error::AlreadyInitialized)
}

/// Spawn the task for a published descriptor
///
/// A kernel that cannot create one of the fixed tasks leaves the system
/// unusable, so failure is fatal.
fn spawn_task<K: Kernel, E: Engine>(shared: &Arc<Shared<K, E>>, task: &TaskDescriptor<K>) {
    let kind = task.kind();
    let attributes = kind.attributes(&shared.config);
    let entry = {
        let shared = Arc::clone(shared);
        Box::new(move || shared.run(kind))
    };
    match shared.kernel.spawn(&attributes, entry) {
        Ok(id) => {
            task.bind(id);
            info!("{} task created as {}", kind, id);
        }
        Err(err) => {
            error!("failed to create {} task: {}", kind, err);
            panic!("failed to create {} task: {}", kind, err);
        }
    }
}

/// Interrupt-safe handle for raising events
///
/// Cheap to clone; engine callbacks and drivers hold one instead of the
/// supervisor.
#[derive(Clone)]
pub struct EventSender {
    sink: Arc<dyn EventSink>,
}

trait EventSink: Send + Sync {
    fn raise(&self, events: Event);
}

impl<K: Kernel, E: Engine> EventSink for Shared<K, E> {
    fn raise(&self, events: Event) {
        Shared::raise(self, events);
    }
}

impl EventSender {
    /// Raise `events` through the routing table
    pub fn raise(&self, events: Event) {
        self.sink.raise(events);
    }

    /// Engine tasklets were queued
    pub fn signal_tasklets_pending(&self) {
        self.sink.raise(Event::STACK);
    }

    /// Engine driver event is pending
    pub fn signal_event_pending(&self) {
        self.sink.raise(Event::STACK);
    }
}

/// Builder for [`Supervisor`]
pub struct SupervisorBuilder<K: Kernel, E: Engine> {
    kernel: Arc<K>,
    engine: E,
    config: RtosConfig,
    hooks: Hooks,
    serial: Option<Box<dyn SerialPort>>,
}

impl<K: Kernel, E: Engine> SupervisorBuilder<K, E> {
    /// Replace the default configuration
    pub fn config(mut self, config: RtosConfig) -> Self {
        self.config = config;
        self
    }

    /// Application tick run by the app task
    pub fn app_tick(mut self, tick: impl Fn() + Send + Sync + 'static) -> Self {
        self.hooks.app_tick = Box::new(tick);
        self
    }

    /// Power-manager hook
    pub fn sleep_update(mut self, update: impl Fn() + Send + Sync + 'static) -> Self {
        self.hooks.sleep_update = Some(Box::new(update));
        self
    }

    /// Serial port serviced by the serial task
    pub fn serial(mut self, port: impl SerialPort) -> Self {
        self.serial = Some(Box::new(port));
        self
    }

    /// Validate the configuration and build the supervisor
    pub fn build(self) -> Result<Supervisor<K, E>> {
        self.config.validate()?;
        if self.config.serial_task_enabled && self.serial.is_none() {
            warn!("serial task enabled without a serial port");
            return Err(Error::InvalidConfig);
        }

        let created_at = self.kernel.now();
        Ok(Supervisor {
            shared: Arc::new(Shared {
                kernel: self.kernel,
                engine: self.engine,
                config: self.config,
                hooks: self.hooks,
                serial: self.serial,
                stack_mutex: spin::Once::new(),
                tasks: [spin::Once::new(), spin::Once::new(), spin::Once::new()],
                stack_claimed: AtomicBool::new(false),
                app_claimed: AtomicBool::new(false),
                created_at,
            }),
        })
    }
}

/// Owner of the adaptation task set
pub struct Supervisor<K: Kernel, E: Engine> {
    shared: Arc<Shared<K, E>>,
}

impl<K: Kernel, E: Engine> Supervisor<K, E> {
    /// Start building a supervisor around `engine`
    pub fn builder(kernel: Arc<K>, engine: E) -> SupervisorBuilder<K, E> {
        SupervisorBuilder {
            kernel,
            engine,
            config: RtosConfig::default(),
            hooks: Hooks::default(),
            serial: None,
        }
    }

    /// Create the stack task, the stack mutex and, when enabled, the
    /// serial task
    ///
    /// The engine is initialized after the mutex exists and before any
    /// task runs. Must be called after the scheduler has started.
    ///
    /// Kernel objects are allocated before anything is published; if one
    /// cannot be created nothing changes and the call may be retried.
    /// Failing to spawn a task is fatal.
    pub fn initialize_stack_task(&self) -> Result<()> {
        let shared = &self.shared;
        if !shared.kernel.is_running() {
            warn!("stack task initialized before scheduler start");
            return Err(Error::KernelNotRunning);
        }
        claim(&shared.stack_claimed)?;

        let resources = match shared.stack_resources() {
            Ok(resources) => resources,
            Err(err) => {
                warn!("stack task resources unavailable: {}", err);
                shared.stack_claimed.store(false, Ordering::Release);
                return Err(err);
            }
        };

        let stack = shared.publish(resources.stack);
        let serial = resources.serial.map(|serial| shared.publish(serial));
        let mutex = shared.stack_mutex.call_once(|| resources.mutex);

        debug!("initializing engine");
        mutex.with(|| shared.engine.initialize());

        spawn_task(shared, stack);
        if let Some(serial) = serial {
            spawn_task(shared, serial);
        }
        Ok(())
    }

    /// Create the app task if the configuration enables it
    ///
    /// Requires the stack task. A disabled app task is not an error.
    pub fn initialize_app_task(&self) -> Result<()> {
        let shared = &self.shared;
        if !shared.config.app_task_enabled {
            debug!("app task disabled");
            return Ok(());
        }
        if shared.stack_mutex.get().is_none() {
            return Err(Error::NotInitialized);
        }
        claim(&shared.app_claimed)?;

        let app = match shared.new_descriptor(TaskKind::App) {
            Ok(app) => shared.publish(app),
            Err(err) => {
                warn!("app task resources unavailable: {}", err);
                shared.app_claimed.store(false, Ordering::Release);
                return Err(err);
            }
        };
        spawn_task(shared, app);
        Ok(())
    }

    /// Post `events` to every mailbox the routing table names
    ///
    /// Never blocks; safe from interrupt context. Tasks that were not
    /// created are skipped, and APP is ignored while the app task is
    /// disabled.
    pub fn raise_event(&self, events: Event) {
        self.shared.raise(events);
    }

    /// Handle for raising events from engine callbacks and drivers
    pub fn sender(&self) -> EventSender {
        EventSender {
            sink: self.shared.clone(),
        }
    }

    /// Take the stack mutex
    pub fn stack_lock(&self) -> Result<StackGuard<'_, K>> {
        let mutex = self.shared.stack_mutex.get().ok_or(Error::NotInitialized)?;
        Ok(mutex.lock())
    }

    /// Take the stack mutex only if no other task holds it
    pub fn try_stack_lock(&self) -> Result<Option<StackGuard<'_, K>>> {
        let mutex = self.shared.stack_mutex.get().ok_or(Error::NotInitialized)?;
        Ok(mutex.try_lock())
    }

    /// Call into the engine with the stack mutex held
    pub fn with_stack<R>(&self, f: impl FnOnce(&E) -> R) -> Result<R> {
        let _guard = self.stack_lock()?;
        Ok(f(&self.shared.engine))
    }

    /// The engine, for calls that do not need the stack mutex
    pub fn engine(&self) -> &E {
        &self.shared.engine
    }

    /// Active configuration
    pub fn config(&self) -> &RtosConfig {
        &self.shared.config
    }

    /// Scheduler services
    pub fn kernel(&self) -> &Arc<K> {
        &self.shared.kernel
    }

    /// Descriptor of `kind`, if created
    pub fn task(&self, kind: TaskKind) -> Option<&TaskDescriptor<K>> {
        self.shared.task(kind)
    }

    /// Lifecycle state of `kind`, if created
    pub fn task_state(&self, kind: TaskKind) -> Option<TaskState> {
        self.task(kind).map(TaskDescriptor::state)
    }

    /// Accumulated active time of `kind`, if created
    pub fn active_duration(&self, kind: TaskKind) -> Option<Duration> {
        self.task(kind).map(TaskDescriptor::active_duration)
    }

    /// Snapshot of every created task
    pub fn stats(&self) -> StatsReport {
        let shared = &self.shared;
        StatsReport {
            uptime: shared.kernel.now().duration_since(shared.created_at),
            tasks: TaskKind::ALL
                .iter()
                .filter_map(|&kind| shared.task(kind))
                .map(TaskStats::capture)
                .collect(),
        }
    }

    /// Log a stats snapshot at info level
    pub fn log_stats(&self) {
        info!("{}", self.stats());
    }
}

#[cfg(all(test, feature = "hosted"))]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    use ot_rtos_hal::kernel::{MutexAttributes, TaskAttributes, TaskEntry, TaskId};

    use super::*;
    use crate::hosted::{HostKernel, HostMutex, HostSemaphore};

    #[derive(Default)]
    struct IdleEngine {
        initialized: AtomicUsize,
        cycles: AtomicUsize,
        reset: AtomicBool,
    }

    impl Engine for IdleEngine {
        fn initialize(&self) {
            self.initialized.fetch_add(1, Ordering::SeqCst);
        }

        fn service_drivers(&self) {
            self.cycles.fetch_add(1, Ordering::SeqCst);
        }

        fn service_deferred_work(&self) {}

        fn has_deferred_work(&self) -> bool {
            false
        }

        fn reset_requested(&self) -> bool {
            self.reset.load(Ordering::SeqCst)
        }

        fn finalize(&self) {}
    }

    #[derive(Default)]
    struct NullPort;

    impl SerialPort for NullPort {
        fn process(&self) {}
    }

    /// Hosted kernel that can be told to refuse object or task creation
    struct FlakyKernel {
        inner: Arc<HostKernel>,
        refuse_semaphore: parking_lot::Mutex<Option<&'static str>>,
        refuse_spawn: AtomicBool,
    }

    impl FlakyKernel {
        fn new(inner: &Arc<HostKernel>) -> Arc<Self> {
            Arc::new(Self {
                inner: Arc::clone(inner),
                refuse_semaphore: parking_lot::Mutex::new(None),
                refuse_spawn: AtomicBool::new(false),
            })
        }
    }

    impl Clock for FlakyKernel {
        fn now(&self) -> Instant {
            self.inner.now()
        }
    }

    impl Kernel for FlakyKernel {
        type Semaphore = HostSemaphore;
        type Mutex = HostMutex;

        fn is_running(&self) -> bool {
            self.inner.is_running()
        }

        fn create_semaphore(
            &self,
            name: &'static str,
            max: u32,
            initial: u32,
        ) -> Result<HostSemaphore> {
            if *self.refuse_semaphore.lock() == Some(name) {
                return Err(Error::ResourceExhausted);
            }
            self.inner.create_semaphore(name, max, initial)
        }

        fn create_mutex(
            &self,
            name: &'static str,
            attributes: MutexAttributes,
        ) -> Result<HostMutex> {
            self.inner.create_mutex(name, attributes)
        }

        fn spawn(&self, attributes: &TaskAttributes, entry: TaskEntry) -> Result<TaskId> {
            if self.refuse_spawn.load(Ordering::SeqCst) {
                return Err(Error::ResourceExhausted);
            }
            self.inner.spawn(attributes, entry)
        }

        fn current_task(&self) -> Option<TaskId> {
            self.inner.current_task()
        }

        fn terminate_current(&self) {
            self.inner.terminate_current()
        }

        fn in_interrupt(&self) -> bool {
            self.inner.in_interrupt()
        }
    }

    fn radio_only(kernel: &Arc<HostKernel>) -> Supervisor<HostKernel, IdleEngine> {
        Supervisor::builder(Arc::clone(kernel), IdleEngine::default())
            .config(RtosConfig::radio_only())
            .build()
            .unwrap()
    }

    fn wait_for(mut cond: impl FnMut() -> bool) {
        for _ in 0..5000 {
            if cond() {
                return;
            }
            thread::sleep(Duration::from_millis(1));
        }
        panic!("condition not reached");
    }

    #[test]
    fn test_routing_table() {
        assert_eq!(routes(Event::STACK), &[(TaskKind::Stack, Event::STACK)]);
        assert_eq!(
            routes(Event::APP),
            &[(TaskKind::App, Event::APP), (TaskKind::Stack, Event::STACK)]
        );
        assert_eq!(routes(Event::SERIAL), &[(TaskKind::Serial, Event::SERIAL)]);
        assert!(routes(Event::empty()).is_empty());
    }

    #[test]
    fn test_requires_running_scheduler() {
        let kernel = HostKernel::new();
        let sup = radio_only(&kernel);
        assert_eq!(sup.initialize_stack_task(), Err(Error::KernelNotRunning));
        assert_eq!(sup.engine().initialized.load(Ordering::SeqCst), 0);
        assert!(sup.stack_lock().is_err());
    }

    #[test]
    fn test_serial_enabled_without_port_rejected() {
        let kernel = HostKernel::new();
        let result = Supervisor::builder(kernel, IdleEngine::default()).build();
        assert!(matches!(result, Err(Error::InvalidConfig)));
    }

    #[test]
    fn test_initialize_once() {
        let kernel = HostKernel::new();
        kernel.start();
        let sup = radio_only(&kernel);
        sup.initialize_stack_task().unwrap();
        assert_eq!(sup.initialize_stack_task(), Err(Error::AlreadyInitialized));
        assert_eq!(sup.engine().initialized.load(Ordering::SeqCst), 1);
        assert_eq!(kernel.tasks().len(), 1);
        assert_eq!(kernel.tasks()[0].attributes.name, "OT Stack");

        // Disabled app task is a no-op.
        sup.initialize_app_task().unwrap();
        assert!(sup.task(TaskKind::App).is_none());

        sup.engine().reset.store(true, Ordering::SeqCst);
        sup.raise_event(Event::STACK);
        kernel.join_all();
        assert_eq!(sup.task_state(TaskKind::Stack), Some(TaskState::Terminated));
    }

    #[test]
    fn test_raise_skips_missing_tasks_and_updates_sleep() {
        let kernel = HostKernel::new();
        kernel.start();
        let updates = Arc::new(AtomicUsize::new(0));
        let sup = {
            let updates = Arc::clone(&updates);
            Supervisor::builder(Arc::clone(&kernel), IdleEngine::default())
                .config(RtosConfig::radio_only())
                .sleep_update(move || {
                    updates.fetch_add(1, Ordering::SeqCst);
                })
                .build()
                .unwrap()
        };

        sup.raise_event(Event::SERIAL);
        assert_eq!(updates.load(Ordering::SeqCst), 1);

        sup.initialize_stack_task().unwrap();
        wait_for(|| sup.engine().cycles.load(Ordering::SeqCst) == 1);

        sup.sender().signal_tasklets_pending();
        wait_for(|| sup.engine().cycles.load(Ordering::SeqCst) == 2);

        sup.engine().reset.store(true, Ordering::SeqCst);
        sup.sender().signal_event_pending();
        kernel.join_all();
        assert!(updates.load(Ordering::SeqCst) >= 3);
    }

    #[test]
    fn test_app_event_ignored_without_app_task() {
        let kernel = HostKernel::new();
        kernel.start();
        let sup = radio_only(&kernel);
        sup.initialize_stack_task().unwrap();
        wait_for(|| sup.engine().cycles.load(Ordering::SeqCst) == 1);
        let stack = sup.task(TaskKind::Stack).unwrap();
        wait_for(|| stack.mailbox().pending().is_empty());

        // Hold the mutex so a wrongly woken stack task could not hide the post.
        let guard = sup.stack_lock().unwrap();
        sup.raise_event(Event::APP);
        sup.sender().raise(Event::APP);
        assert!(stack.mailbox().pending().is_empty());
        drop(guard);

        thread::sleep(Duration::from_millis(50));
        assert_eq!(sup.engine().cycles.load(Ordering::SeqCst), 1);

        sup.engine().reset.store(true, Ordering::SeqCst);
        sup.raise_event(Event::STACK);
        kernel.join_all();
    }

    #[test]
    fn test_failed_allocation_leaves_nothing_behind() {
        let host = HostKernel::new();
        host.start();
        let kernel = FlakyKernel::new(&host);
        let sup = Supervisor::builder(Arc::clone(&kernel), IdleEngine::default())
            .config(RtosConfig {
                app_task_enabled: false,
                ..RtosConfig::default()
            })
            .serial(NullPort)
            .build()
            .unwrap();

        // The serial semaphore is allocated after the stack one.
        *kernel.refuse_semaphore.lock() = Some(TaskKind::Serial.semaphore_name());
        assert_eq!(sup.initialize_stack_task(), Err(Error::ResourceExhausted));
        assert_eq!(sup.engine().initialized.load(Ordering::SeqCst), 0);
        assert!(sup.task(TaskKind::Stack).is_none());
        assert!(sup.task(TaskKind::Serial).is_none());
        assert!(sup.stack_lock().is_err());
        assert!(host.tasks().is_empty());

        *kernel.refuse_semaphore.lock() = None;
        sup.initialize_stack_task().unwrap();
        assert_eq!(sup.engine().initialized.load(Ordering::SeqCst), 1);
        assert_eq!(host.tasks().len(), 2);

        sup.engine().reset.store(true, Ordering::SeqCst);
        sup.raise_event(Event::STACK | Event::SERIAL);
        assert_eq!(host.join_all(), 2);
    }

    #[test]
    fn test_failed_app_allocation_can_retry() {
        let host = HostKernel::new();
        host.start();
        let kernel = FlakyKernel::new(&host);
        let sup = Supervisor::builder(Arc::clone(&kernel), IdleEngine::default())
            .config(RtosConfig {
                app_task_enabled: true,
                serial_task_enabled: false,
                ..RtosConfig::default()
            })
            .build()
            .unwrap();
        sup.initialize_stack_task().unwrap();

        *kernel.refuse_semaphore.lock() = Some(TaskKind::App.semaphore_name());
        assert_eq!(sup.initialize_app_task(), Err(Error::ResourceExhausted));
        assert!(sup.task(TaskKind::App).is_none());

        *kernel.refuse_semaphore.lock() = None;
        sup.initialize_app_task().unwrap();
        assert_eq!(sup.initialize_app_task(), Err(Error::AlreadyInitialized));
        assert_eq!(host.tasks().len(), 2);

        sup.engine().reset.store(true, Ordering::SeqCst);
        sup.raise_event(Event::APP);
        assert_eq!(host.join_all(), 2);
    }

    #[test]
    #[should_panic(expected = "failed to create OT Stack task")]
    fn test_spawn_failure_is_fatal() {
        let host = HostKernel::new();
        host.start();
        let kernel = FlakyKernel::new(&host);
        kernel.refuse_spawn.store(true, Ordering::SeqCst);
        let sup = Supervisor::builder(kernel, IdleEngine::default())
            .config(RtosConfig::radio_only())
            .build()
            .unwrap();
        let _ = sup.initialize_stack_task();
    }

    #[test]
    fn test_concurrent_initialize_claims_once() {
        for _ in 0..10 {
            let kernel = HostKernel::new();
            kernel.start();
            let sup = radio_only(&kernel);
            let barrier = Barrier::new(2);

            let results: Vec<_> = thread::scope(|s| {
                let (sup, barrier) = (&sup, &barrier);
                let handles: Vec<_> = (0..2)
                    .map(|_| {
                        s.spawn(move || {
                            barrier.wait();
                            sup.initialize_stack_task()
                        })
                    })
                    .collect();
                handles.into_iter().map(|h| h.join().unwrap()).collect()
            });

            assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
            assert!(results.contains(&Err(Error::AlreadyInitialized)));
            assert_eq!(sup.engine().initialized.load(Ordering::SeqCst), 1);
            assert_eq!(kernel.tasks().len(), 1);

            sup.engine().reset.store(true, Ordering::SeqCst);
            sup.raise_event(Event::STACK);
            kernel.join_all();
        }
    }

    #[test]
    fn test_with_stack_holds_mutex() {
        let kernel = HostKernel::new();
        kernel.start();
        let sup = radio_only(&kernel);
        assert_eq!(sup.with_stack(|_| ()), Err(Error::NotInitialized));
        sup.initialize_stack_task().unwrap();

        let nested = sup
            .with_stack(|_| {
                // Re-entrant: the stack lock nests inside with_stack.
                let guard = sup.try_stack_lock().unwrap();
                guard.is_some()
            })
            .unwrap();
        assert!(nested);

        sup.engine().reset.store(true, Ordering::SeqCst);
        sup.raise_event(Event::STACK);
        kernel.join_all();
        let report = sup.stats();
        assert_eq!(report.tasks.len(), 1);
        assert_eq!(report.tasks[0].state, TaskState::Terminated);
    }
}
