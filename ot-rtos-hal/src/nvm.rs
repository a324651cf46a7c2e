//! Non-volatile object store traits
//!
//! Models an NVM3-style key/value store: objects are addressed by a 32-bit
//! key and can be enumerated in key order within a range.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use core::fmt;

use crate::error::{Error, Result};

/// Object key in the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ObjectKey(pub u32);

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#07x}", self.0)
    }
}

/// Key/value object store
pub trait ObjectStore: Send + Sync {
    /// Whether the store has been opened by anyone
    fn is_open(&self) -> bool;

    /// Open the store
    fn open(&self) -> Result<()>;

    /// Close the store
    fn close(&self) -> Result<()>;

    /// Fill `out` with keys in `first..=last`, ascending, returning how many
    /// were written
    fn enumerate(&self, first: ObjectKey, last: ObjectKey, out: &mut [ObjectKey]) -> usize;

    /// Length of the object stored under `key`
    fn object_len(&self, key: ObjectKey) -> Result<usize>;

    /// Read an object into `buf`, returning the number of bytes copied
    fn read(&self, key: ObjectKey, buf: &mut [u8]) -> Result<usize>;

    /// Create or replace an object
    fn write(&self, key: ObjectKey, data: &[u8]) -> Result<()>;

    /// Delete an object
    fn delete(&self, key: ObjectKey) -> Result<()>;
}

struct RamStoreInner {
    open: bool,
    objects: BTreeMap<ObjectKey, Vec<u8>>,
}

/// RAM-backed object store
///
/// Contents are lost on reset. Used on boards without an NVM region and on
/// hosted builds.
pub struct RamStore {
    inner: spin::Mutex<RamStoreInner>,
}

impl RamStore {
    /// Create an empty, closed store
    pub const fn new() -> Self {
        Self {
            inner: spin::Mutex::new(RamStoreInner {
                open: false,
                objects: BTreeMap::new(),
            }),
        }
    }

    /// Number of stored objects
    pub fn len(&self) -> usize {
        self.inner.lock().objects.len()
    }

    /// Whether the store holds no objects
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for RamStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectStore for RamStore {
    fn is_open(&self) -> bool {
        self.inner.lock().open
    }

    fn open(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.open {
            return Err(Error::AlreadyInitialized);
        }
        inner.open = true;
        Ok(())
    }

    fn close(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        if !inner.open {
            return Err(Error::NotInitialized);
        }
        inner.open = false;
        Ok(())
    }

    fn enumerate(&self, first: ObjectKey, last: ObjectKey, out: &mut [ObjectKey]) -> usize {
        if first > last {
            return 0;
        }
        let inner = self.inner.lock();
        let mut count = 0;
        for (slot, key) in out.iter_mut().zip(inner.objects.range(first..=last).map(|(k, _)| *k)) {
            *slot = key;
            count += 1;
        }
        count
    }

    fn object_len(&self, key: ObjectKey) -> Result<usize> {
        let inner = self.inner.lock();
        if !inner.open {
            return Err(Error::NotInitialized);
        }
        inner.objects.get(&key).map(Vec::len).ok_or(Error::NotFound)
    }

    fn read(&self, key: ObjectKey, buf: &mut [u8]) -> Result<usize> {
        let inner = self.inner.lock();
        if !inner.open {
            return Err(Error::NotInitialized);
        }
        let data = inner.objects.get(&key).ok_or(Error::NotFound)?;
        let n = data.len().min(buf.len());
        buf[..n].copy_from_slice(&data[..n]);
        Ok(n)
    }

    fn write(&self, key: ObjectKey, data: &[u8]) -> Result<()> {
        let mut inner = self.inner.lock();
        if !inner.open {
            return Err(Error::NotInitialized);
        }
        inner.objects.insert(key, data.to_vec());
        Ok(())
    }

    fn delete(&self, key: ObjectKey) -> Result<()> {
        let mut inner = self.inner.lock();
        if !inner.open {
            return Err(Error::NotInitialized);
        }
        inner.objects.remove(&key).map(|_| ()).ok_or(Error::NotFound)
    }
}
