//! OpenThread RTOS adaptation HAL
//!
//! Collaborator traits for running an event-driven network stack on top of
//! a preemptive RTOS. The adaptation core in `ot-rtos` consumes these
//! traits; a port implements them for a concrete kernel and storage
//! backend.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                 ot-rtos (task adaptation core)                   │
//! │   mailboxes · stack mutex · task runners · supervisor            │
//! └──────────────┬───────────────────────────────┬──────────────────┘
//!                │                               │
//! ┌──────────────▼──────────────┐ ┌──────────────▼──────────────────┐
//! │        kernel traits         │ │          nvm traits             │
//! │  Kernel · Semaphore ·        │ │  ObjectStore · ObjectKey        │
//! │  RawMutex · Clock            │ │  RamStore                       │
//! └──────────────┬──────────────┘ └──────────────┬──────────────────┘
//!                │                               │
//! ┌──────────────▼───────────────────────────────▼──────────────────┐
//! │  Port: CMSIS-RTOS2 + NVM3 on target, std threads on a host      │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod error;
pub mod kernel;
pub mod nvm;
pub mod prelude;
pub mod time;

// Re-exports
pub use error::{Error, Result};
