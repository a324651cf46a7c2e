// SPDX-FileCopyrightText: 2024 Redox OS Developers
// SPDX-License-Identifier: MIT

//! Collaborators driven by the task runners
//!
//! The network engine and the serial subsystem are opaque to the
//! adaptation core. Runners only call the entry points below, and only
//! while holding the stack mutex (except the pending-work and reset
//! queries, which the engine answers from its own state).

/// Network engine instance
pub trait Engine: Send + Sync + 'static {
    /// One-time initialization, run after the scheduler has started
    fn initialize(&self) {}

    /// Process pending radio and platform driver work
    fn service_drivers(&self);

    /// Run queued tasklets
    fn service_deferred_work(&self);

    /// Whether tasklets are still queued
    fn has_deferred_work(&self) -> bool;

    /// Whether a pseudo-reset was requested
    fn reset_requested(&self) -> bool;

    /// Tear the instance down after a pseudo-reset
    fn finalize(&self);
}

/// Serial/IO subsystem serviced by the serial task
pub trait SerialPort: Send + Sync + 'static {
    /// Drain received data and complete pending transmissions
    fn process(&self);
}

/// Application tick run by the app task
pub type AppTick = Box<dyn Fn() + Send + Sync + 'static>;

/// Power-manager hook run before a task idles and whenever an event is
/// raised
pub type SleepUpdate = Box<dyn Fn() + Send + Sync + 'static>;

/// Optional behaviour injected at supervisor construction
pub struct Hooks {
    /// Application tick, a no-op unless replaced
    pub app_tick: AppTick,
    /// Sleep-state refresh
    pub sleep_update: Option<SleepUpdate>,
}

impl Hooks {
    /// Refresh the power manager's view of pending work
    pub fn update_sleep(&self) {
        if let Some(update) = &self.sleep_update {
            update();
        }
    }
}

impl Default for Hooks {
    fn default() -> Self {
        Self {
            app_tick: Box::new(|| {}),
            sleep_update: None,
        }
    }
}
