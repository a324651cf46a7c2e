// SPDX-FileCopyrightText: 2024 Redox OS Developers
// SPDX-License-Identifier: MIT

//! OpenThread RTOS Task Adaptation
//!
//! Multiplexes an event-driven network stack across a small, fixed set of
//! prioritized tasks:
//!
//! - Per-task event mailboxes with coalescing, race-free wakeups
//! - A recursive, priority-inheriting stack mutex serializing engine access
//! - Run-to-completion task runners for the stack, app and serial tasks
//! - A supervisor that creates the tasks and routes raised events
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │          Drivers · Interrupts · Application code                 │
//! └──────────────────────────┬──────────────────────────────────────┘
//!                            │ raise_event / EventSender
//! ┌──────────────────────────▼──────────────────────────────────────┐
//! │                       Supervisor                                 │
//! │  ┌─────────────────────────────────────────────────────────┐    │
//! │  │  Routing: STACK→stack  APP→app+stack  SERIAL→serial     │    │
//! │  └─────────────────────────────────────────────────────────┘    │
//! │  ┌───────────────┐  ┌───────────────┐  ┌───────────────┐        │
//! │  │ OT Stack (24) │  │  OT App (23)  │  │ OT Serial (16)│        │
//! │  │   mailbox     │  │   mailbox     │  │   mailbox     │        │
//! │  └───────┬───────┘  └───────┬───────┘  └───────┬───────┘        │
//! │          └──────────────────┼──────────────────┘                 │
//! │                  ┌──────────▼──────────┐                         │
//! │                  │    Stack Mutex      │ recursive + PI          │
//! │                  └──────────┬──────────┘                         │
//! └─────────────────────────────┼───────────────────────────────────┘
//!                               │ service_drivers / service_deferred_work
//! ┌─────────────────────────────▼───────────────────────────────────┐
//! │                   Network Engine (opaque)                        │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Interrupt handlers only post events; they never take the stack mutex.

pub mod config;
pub mod engine;
pub mod event;
pub mod mailbox;
pub mod runner;
pub mod settings;
pub mod stack_mutex;
pub mod stats;
pub mod supervisor;
pub mod task;

#[cfg(feature = "hosted")]
pub mod hosted;

pub use ot_rtos_hal as hal;

pub use config::RtosConfig;
pub use engine::{Engine, Hooks, SerialPort};
pub use event::Event;
pub use mailbox::Mailbox;
pub use settings::Settings;
pub use stack_mutex::{StackGuard, StackMutex};
pub use stats::{StatsReport, TaskStats};
pub use supervisor::{EventSender, Supervisor, SupervisorBuilder};
pub use task::{TaskDescriptor, TaskKind, TaskState};
