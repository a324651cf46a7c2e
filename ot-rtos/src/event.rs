// SPDX-FileCopyrightText: 2024 Redox OS Developers
// SPDX-License-Identifier: MIT

//! Event kinds used to wake adaptation tasks

use bitflags::bitflags;

bitflags! {
    /// Pending-event flags, one bit per wake reason
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Event: u32 {
        /// Network stack has driver or tasklet work
        const STACK = 1 << 0;
        /// Application tick requested
        const APP = 1 << 1;
        /// Serial/IO subsystem has data to process
        const SERIAL = 1 << 2;
    }
}

impl core::fmt::Display for Event {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if self.is_empty() {
            return write!(f, "NONE");
        }
        let mut first = true;
        for (name, _) in self.iter_names() {
            if !first {
                write!(f, "|")?;
            }
            write!(f, "{}", name)?;
            first = false;
        }
        Ok(())
    }
}
