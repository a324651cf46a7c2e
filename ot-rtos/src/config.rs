// SPDX-FileCopyrightText: 2024 Redox OS Developers
// SPDX-License-Identifier: MIT

//! Task set configuration

use log::warn;
use ot_rtos_hal::kernel::Priority;
use ot_rtos_hal::{Error, Result};

/// Default stack task priority (`osPriorityNormal`)
pub const STACK_TASK_PRIORITY: Priority = Priority::NORMAL;
/// Default app task priority (`osPriorityBelowNormal7`)
pub const APP_TASK_PRIORITY: Priority = Priority::BELOW_NORMAL7;
/// Default serial task priority (`osPriorityBelowNormal`)
pub const SERIAL_TASK_PRIORITY: Priority = Priority::BELOW_NORMAL;

/// Default stack task stack size in bytes
pub const STACK_TASK_MEM_SIZE: usize = 4608;
/// Default app task stack size in bytes
pub const APP_TASK_MEM_SIZE: usize = 4608;
/// Default serial task stack size in bytes
pub const SERIAL_TASK_MEM_SIZE: usize = 3072;

/// Smallest accepted task stack in bytes
pub const MIN_TASK_MEM_SIZE: usize = 1000;
/// Largest accepted task stack in bytes
pub const MAX_TASK_MEM_SIZE: usize = 20000;

/// Adaptation task configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtosConfig {
    /// Stack task priority
    pub stack_priority: Priority,
    /// App task priority
    pub app_priority: Priority,
    /// Serial task priority
    pub serial_priority: Priority,
    /// Stack task stack size in bytes
    pub stack_mem_size: usize,
    /// App task stack size in bytes
    pub app_mem_size: usize,
    /// Serial task stack size in bytes
    pub serial_mem_size: usize,
    /// Create the app task
    pub app_task_enabled: bool,
    /// Create the serial task
    pub serial_task_enabled: bool,
}

impl Default for RtosConfig {
    fn default() -> Self {
        Self {
            stack_priority: STACK_TASK_PRIORITY,
            app_priority: APP_TASK_PRIORITY,
            serial_priority: SERIAL_TASK_PRIORITY,
            stack_mem_size: STACK_TASK_MEM_SIZE,
            app_mem_size: APP_TASK_MEM_SIZE,
            serial_mem_size: SERIAL_TASK_MEM_SIZE,
            app_task_enabled: false,
            serial_task_enabled: true,
        }
    }
}

impl RtosConfig {
    /// Radio co-processor builds run neither the app nor the serial task
    pub fn radio_only() -> Self {
        Self {
            app_task_enabled: false,
            serial_task_enabled: false,
            ..Self::default()
        }
    }

    /// Defaults overlaid with `OT_RTOS_*` environment variables
    ///
    /// Unparsable values are ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Defaults overlaid with values from `lookup`
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(p) = parse_priority(&lookup, "OT_RTOS_STACK_PRIORITY") {
            config.stack_priority = p;
        }
        if let Some(p) = parse_priority(&lookup, "OT_RTOS_APP_PRIORITY") {
            config.app_priority = p;
        }
        if let Some(p) = parse_priority(&lookup, "OT_RTOS_SERIAL_PRIORITY") {
            config.serial_priority = p;
        }

        if let Some(n) = lookup("OT_RTOS_STACK_MEM_SIZE").and_then(|v| v.parse().ok()) {
            config.stack_mem_size = n;
        }
        if let Some(n) = lookup("OT_RTOS_APP_MEM_SIZE").and_then(|v| v.parse().ok()) {
            config.app_mem_size = n;
        }
        if let Some(n) = lookup("OT_RTOS_SERIAL_MEM_SIZE").and_then(|v| v.parse().ok()) {
            config.serial_mem_size = n;
        }

        if let Some(val) = lookup("OT_RTOS_APP_TASK") {
            config.app_task_enabled = parse_bool(&val);
        }
        if let Some(val) = lookup("OT_RTOS_SERIAL_TASK") {
            config.serial_task_enabled = parse_bool(&val);
        }

        config
    }

    /// Check stack sizes and the stack > app > serial priority order
    pub fn validate(&self) -> Result<()> {
        let sizes = [
            ("stack", self.stack_mem_size, true),
            ("app", self.app_mem_size, self.app_task_enabled),
            ("serial", self.serial_mem_size, self.serial_task_enabled),
        ];
        for (task, size, enabled) in sizes {
            if enabled && !(MIN_TASK_MEM_SIZE..=MAX_TASK_MEM_SIZE).contains(&size) {
                warn!("{} task stack size {} out of range", task, size);
                return Err(Error::InvalidConfig);
            }
        }

        if self.app_task_enabled && self.app_priority >= self.stack_priority {
            warn!(
                "app task priority {} must be below stack task priority {}",
                self.app_priority, self.stack_priority
            );
            return Err(Error::InvalidConfig);
        }
        if self.serial_task_enabled && self.serial_priority >= self.stack_priority {
            warn!(
                "serial task priority {} must be below stack task priority {}",
                self.serial_priority, self.stack_priority
            );
            return Err(Error::InvalidConfig);
        }
        if self.app_task_enabled
            && self.serial_task_enabled
            && self.serial_priority >= self.app_priority
        {
            warn!(
                "serial task priority {} must be below app task priority {}",
                self.serial_priority, self.app_priority
            );
            return Err(Error::InvalidConfig);
        }

        Ok(())
    }
}

fn parse_priority(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<Priority> {
    lookup(name).and_then(|v| v.parse().ok()).map(Priority)
}

fn parse_bool(val: &str) -> bool {
    val == "1" || val.eq_ignore_ascii_case("true")
}
