// SPDX-FileCopyrightText: 2024 Redox OS Developers
// SPDX-License-Identifier: MIT

//! Hosted kernel port
//!
//! Binds the kernel traits to std threads so the adaptation core runs off
//! target. Tasks are named OS threads; priorities are recorded and drive
//! the mutex's inheritance bookkeeping but are not enforced by the host
//! scheduler. Interrupt context is simulated per thread with
//! [`HostKernel::interrupt`].

mod kernel;
mod sync;

pub use kernel::{HostKernel, HostTask};
pub use sync::{HostMutex, HostSemaphore};
