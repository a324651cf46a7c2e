//! Prelude module for convenient imports

pub use crate::error::{Error, Result};
pub use crate::kernel::{
    Kernel, MutexAttributes, Priority, RawMutex, Semaphore, TaskAttributes, TaskEntry, TaskId,
};
pub use crate::nvm::{ObjectKey, ObjectStore, RamStore};
pub use crate::time::{Clock, Instant};
