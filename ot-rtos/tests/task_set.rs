// SPDX-FileCopyrightText: 2024 Redox OS Developers
// SPDX-License-Identifier: MIT

//! Full task set driven through the hosted kernel

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use ot_rtos::hosted::HostKernel;
use ot_rtos::{Engine, Event, RtosConfig, SerialPort, Supervisor, TaskKind, TaskState};

#[derive(Default)]
struct TestEngine {
    log: Mutex<Vec<&'static str>>,
    cycles: AtomicUsize,
    tasklets: AtomicUsize,
    reset: AtomicBool,
    /// Request a reset from inside the given service cycle
    reset_on_cycle: AtomicUsize,
    finalized: AtomicUsize,
    gate: Mutex<()>,
}

impl TestEngine {
    fn cycles(&self) -> usize {
        self.cycles.load(Ordering::SeqCst)
    }

    fn request_reset(&self) {
        self.reset.store(true, Ordering::SeqCst);
    }
}

impl Engine for TestEngine {
    fn initialize(&self) {
        self.log.lock().unwrap().push("init");
    }

    fn service_drivers(&self) {
        let _gate = self.gate.lock().unwrap();
        let cycle = self.cycles.fetch_add(1, Ordering::SeqCst) + 1;
        if cycle == 1 {
            self.log.lock().unwrap().push("service");
        }
        if self.reset_on_cycle.load(Ordering::SeqCst) == cycle {
            self.request_reset();
        }
    }

    fn service_deferred_work(&self) {
        let _ = self
            .tasklets
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
    }

    fn has_deferred_work(&self) -> bool {
        self.tasklets.load(Ordering::SeqCst) > 0
    }

    fn reset_requested(&self) -> bool {
        self.reset.load(Ordering::SeqCst)
    }

    fn finalize(&self) {
        self.finalized.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Clone, Default)]
struct CountingPort {
    processed: Arc<AtomicUsize>,
}

impl SerialPort for CountingPort {
    fn process(&self) {
        self.processed.fetch_add(1, Ordering::SeqCst);
    }
}

fn wait_for(what: &str, mut cond: impl FnMut() -> bool) {
    for _ in 0..5000 {
        if cond() {
            return;
        }
        thread::sleep(Duration::from_millis(1));
    }
    panic!("timed out waiting for {}", what);
}

fn started_kernel() -> Arc<HostKernel> {
    let kernel = HostKernel::new();
    kernel.start();
    kernel
}

#[test]
fn test_app_event_fans_out_to_stack() {
    let kernel = started_kernel();
    let ticks = Arc::new(AtomicUsize::new(0));
    let app_gate = Arc::new(Mutex::new(()));
    let config = RtosConfig {
        app_task_enabled: true,
        serial_task_enabled: false,
        ..RtosConfig::default()
    };
    let sup = {
        let ticks = Arc::clone(&ticks);
        let app_gate = Arc::clone(&app_gate);
        Supervisor::builder(Arc::clone(&kernel), TestEngine::default())
            .config(config)
            .app_tick(move || {
                let _gate = app_gate.lock().unwrap();
                ticks.fetch_add(1, Ordering::SeqCst);
            })
            .build()
            .unwrap()
    };

    sup.initialize_stack_task().unwrap();
    wait_for("first stack cycle", || sup.engine().cycles() == 1);

    // Park both runners inside their work so mailboxes hold what we post.
    let app_held = app_gate.lock().unwrap();
    let engine_held = sup.engine().gate.lock().unwrap();
    sup.initialize_app_task().unwrap();
    sup.raise_event(Event::STACK);
    wait_for("stack task parked in service", || {
        sup.task(TaskKind::Stack).unwrap().mailbox().pending().is_empty()
    });

    sup.raise_event(Event::STACK);
    sup.raise_event(Event::APP);

    let stack = sup.task(TaskKind::Stack).unwrap();
    let app = sup.task(TaskKind::App).unwrap();
    assert_eq!(stack.mailbox().pending(), Event::STACK);
    assert_eq!(app.mailbox().pending(), Event::APP);

    drop(engine_held);
    drop(app_held);
    wait_for("app ticks", || ticks.load(Ordering::SeqCst) == 2);
    wait_for("stack drained", || stack.mailbox().pending().is_empty());

    sup.engine().request_reset();
    sup.raise_event(Event::APP);
    assert_eq!(kernel.join_all(), 2);
    assert_eq!(kernel.terminated_count(), 2);
    assert_eq!(sup.task_state(TaskKind::App), Some(TaskState::Terminated));
    assert_eq!(sup.engine().finalized.load(Ordering::SeqCst), 1);
}

#[test]
fn test_engine_initialized_before_first_service() {
    let kernel = started_kernel();
    let sup = Supervisor::builder(Arc::clone(&kernel), TestEngine::default())
        .config(RtosConfig::radio_only())
        .build()
        .unwrap();

    sup.initialize_stack_task().unwrap();
    wait_for("first stack cycle", || sup.engine().cycles() == 1);
    assert_eq!(*sup.engine().log.lock().unwrap(), ["init", "service"]);

    sup.engine().request_reset();
    sup.raise_event(Event::STACK);
    kernel.join_all();
}

#[test]
fn test_reset_terminates_every_task() {
    let kernel = started_kernel();
    let port = CountingPort::default();
    let processed = Arc::clone(&port.processed);
    let sup = Supervisor::builder(Arc::clone(&kernel), TestEngine::default())
        .config(RtosConfig {
            app_task_enabled: true,
            ..RtosConfig::default()
        })
        .serial(port)
        .build()
        .unwrap();

    sup.initialize_stack_task().unwrap();
    sup.initialize_app_task().unwrap();
    wait_for("serial first pass", || processed.load(Ordering::SeqCst) == 1);

    sup.raise_event(Event::SERIAL);
    wait_for("serial second pass", || processed.load(Ordering::SeqCst) == 2);

    // Reset requested from inside the next engine cycle.
    let next = sup.engine().cycles() + 1;
    sup.engine().reset_on_cycle.store(next, Ordering::SeqCst);
    sup.raise_event(Event::STACK);
    wait_for("reset cycle", || sup.engine().cycles() == next);
    // The runner idles after the cycle; the next wake observes the reset.
    sup.raise_event(Event::STACK);
    wait_for("stack terminated", || {
        sup.task_state(TaskKind::Stack) == Some(TaskState::Terminated)
    });
    assert_eq!(sup.engine().cycles(), next);

    sup.raise_event(Event::APP | Event::SERIAL);
    assert_eq!(kernel.join_all(), 3);
    assert_eq!(kernel.terminated_count(), 3);
    assert_eq!(sup.engine().finalized.load(Ordering::SeqCst), 1);
    assert_eq!(sup.engine().cycles(), next);

    let report = sup.stats();
    assert_eq!(report.tasks.len(), 3);
    assert!(report.tasks.iter().all(|t| t.state == TaskState::Terminated));
}

#[test]
fn test_nested_stack_lock_blocks_stack_task() {
    let kernel = started_kernel();
    let sup = Supervisor::builder(Arc::clone(&kernel), TestEngine::default())
        .config(RtosConfig::radio_only())
        .build()
        .unwrap();
    sup.initialize_stack_task().unwrap();
    wait_for("first stack cycle", || sup.engine().cycles() == 1);

    let outer = sup.stack_lock().unwrap();
    let inner = sup.stack_lock().unwrap();
    sup.raise_event(Event::STACK);

    drop(inner);
    thread::sleep(Duration::from_millis(50));
    assert_eq!(sup.engine().cycles(), 1);

    drop(outer);
    wait_for("stack cycle after release", || sup.engine().cycles() == 2);

    sup.engine().request_reset();
    sup.raise_event(Event::STACK);
    kernel.join_all();
}

#[test]
fn test_queued_tasklets_drain_without_events() {
    let kernel = started_kernel();
    let engine = TestEngine::default();
    engine.tasklets.store(4, Ordering::SeqCst);
    let sup = Supervisor::builder(Arc::clone(&kernel), engine)
        .config(RtosConfig::radio_only())
        .build()
        .unwrap();

    sup.initialize_stack_task().unwrap();
    wait_for("tasklets drained", || sup.engine().cycles() == 4);
    thread::sleep(Duration::from_millis(50));
    assert_eq!(sup.engine().cycles(), 4);
    assert!(sup.active_duration(TaskKind::Stack).is_some());

    sup.engine().request_reset();
    sup.raise_event(Event::STACK);
    kernel.join_all();
    assert_eq!(sup.task_state(TaskKind::Stack), Some(TaskState::Terminated));
}

#[test]
fn test_interrupt_raises_through_sender() {
    let kernel = started_kernel();
    let sup = Supervisor::builder(Arc::clone(&kernel), TestEngine::default())
        .config(RtosConfig::radio_only())
        .build()
        .unwrap();
    sup.initialize_stack_task().unwrap();
    wait_for("first stack cycle", || sup.engine().cycles() == 1);

    let sender = sup.sender();
    kernel.interrupt(|| sender.signal_event_pending());
    wait_for("stack woken from interrupt", || sup.engine().cycles() == 2);

    sup.engine().request_reset();
    kernel.interrupt(|| sender.signal_tasklets_pending());
    kernel.join_all();
    assert_eq!(sup.engine().finalized.load(Ordering::SeqCst), 1);
}
