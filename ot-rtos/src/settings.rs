// SPDX-FileCopyrightText: 2024 Redox OS Developers
// SPDX-License-Identifier: MIT

//! Network settings persisted in the NVM object store
//!
//! Each setting key owns a small range of object keys, one per index:
//!
//! ```text
//!   31      17 16         8 7          0
//!   ┌─────────┬────────────┬────────────┐
//!   │ 0x20000 │    key     │   index    │
//!   └─────────┴────────────┴────────────┘
//! ```
//!
//! Indexes are positional: index `n` is the `n`th object present in the
//! key's range, so deleting index 0 shifts the remaining values down.

use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, warn};
use ot_rtos_hal::nvm::{ObjectKey, ObjectStore};
use ot_rtos_hal::{Error, Result};

/// Object key domain reserved for network settings
pub const SETTINGS_DOMAIN: u32 = 0x20000;

/// Highest index an indexed setting may use
pub const NUM_INDEXED_SETTINGS: usize = 10;

/// Keys fetched per enumeration call
const ENUM_BATCH: usize = 4;

/// Object key for `index` of setting `key`
pub const fn object_key(key: u16, index: usize) -> ObjectKey {
    ObjectKey(SETTINGS_DOMAIN | ((key as u32) << 8) | (index as u32 & 0xFF))
}

/// Settings adapter over an object store
pub struct Settings<S: ObjectStore> {
    store: S,
    opened_here: AtomicBool,
}

impl<S: ObjectStore> Settings<S> {
    /// Wrap `store`; nothing is opened until [`init`](Self::init)
    pub fn new(store: S) -> Self {
        Self {
            store,
            opened_here: AtomicBool::new(false),
        }
    }

    /// The underlying store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Open the store unless another user already did
    ///
    /// Only a store opened here is closed again by [`deinit`](Self::deinit).
    /// Open failures are logged, not returned.
    pub fn init(&self) {
        if self.store.is_open() {
            self.opened_here.store(false, Ordering::Release);
            return;
        }
        match self.store.open() {
            Ok(()) => self.opened_here.store(true, Ordering::Release),
            Err(err) => debug!("settings store open failed: {}", err),
        }
    }

    /// Close the store if [`init`](Self::init) opened it
    pub fn deinit(&self) {
        if self.opened_here.swap(false, Ordering::AcqRel) && self.store.is_open() {
            if let Err(err) = self.store.close() {
                warn!("settings store close failed: {}", err);
            }
        }
    }

    /// Whether [`init`](Self::init) opened the store
    pub fn owns_store(&self) -> bool {
        self.opened_here.load(Ordering::Acquire)
    }

    /// Objects present for `key`, in index order
    fn indexed_objects(&self, key: u16) -> Vec<ObjectKey> {
        let last = object_key(key, NUM_INDEXED_SETTINGS);
        let mut found = Vec::new();
        let mut next = object_key(key, 0);
        loop {
            let mut batch = [ObjectKey::default(); ENUM_BATCH];
            let count = self.store.enumerate(next, last, &mut batch);
            found.extend_from_slice(&batch[..count]);
            if count < ENUM_BATCH {
                break;
            }
            next = ObjectKey(batch[count - 1].0 + 1);
        }
        found
    }

    /// Read index `index` of `key`
    pub fn get(&self, key: u16, index: usize) -> Result<Vec<u8>> {
        let object = self.nth_object(key, index)?;
        let len = self.store.object_len(object).map_err(storage_error)?;
        let mut value = vec![0; len];
        let read = self.store.read(object, &mut value).map_err(storage_error)?;
        value.truncate(read);
        Ok(value)
    }

    /// Read index `index` of `key` into `buf`
    ///
    /// Copies at most `buf.len()` bytes and returns the full value length,
    /// which may exceed what was copied.
    pub fn get_into(&self, key: u16, index: usize, buf: &mut [u8]) -> Result<usize> {
        let value = self.get(key, index)?;
        let copied = value.len().min(buf.len());
        buf[..copied].copy_from_slice(&value[..copied]);
        Ok(value.len())
    }

    /// Replace every index of `key` with a single value at index 0
    pub fn set(&self, key: u16, value: &[u8]) -> Result<()> {
        match self.delete(key, None) {
            Ok(()) | Err(Error::NotFound) => self.add(key, value),
            Err(err) => Err(err),
        }
    }

    /// Store `value` at the first free index of `key`
    pub fn add(&self, key: u16, value: &[u8]) -> Result<()> {
        if value.is_empty() {
            return Err(Error::InvalidParameter);
        }
        for index in 0..=NUM_INDEXED_SETTINGS {
            let object = object_key(key, index);
            match self.store.object_len(object) {
                Ok(_) => continue,
                Err(Error::NotFound) => {
                    return self.store.write(object, value).map_err(storage_error);
                }
                Err(err) => return Err(storage_error(err)),
            }
        }
        warn!("setting {:#06x} has no free index", key);
        Err(Error::ResourceExhausted)
    }

    /// Delete index `index` of `key`, or every index when `None`
    pub fn delete(&self, key: u16, index: Option<usize>) -> Result<()> {
        let objects = self.indexed_objects(key);
        let targets = match index {
            Some(i) => objects.get(i).map(core::slice::from_ref).unwrap_or(&[]),
            None => &objects[..],
        };
        if targets.is_empty() {
            return Err(Error::NotFound);
        }
        for &object in targets {
            self.store.delete(object).map_err(storage_error)?;
        }
        Ok(())
    }

    /// Delete every setting
    pub fn wipe(&self) {
        let first = object_key(1, 0);
        let last = object_key(0xFF, 0xFF);
        loop {
            let mut batch = [ObjectKey::default(); ENUM_BATCH];
            let count = self.store.enumerate(first, last, &mut batch);
            if count == 0 {
                break;
            }
            let mut deleted = 0;
            for &object in &batch[..count] {
                match self.store.delete(object) {
                    Ok(()) => deleted += 1,
                    Err(err) => warn!("wipe: failed to delete {}: {}", object, err),
                }
            }
            if deleted == 0 {
                break;
            }
        }
    }

    fn nth_object(&self, key: u16, index: usize) -> Result<ObjectKey> {
        self.indexed_objects(key)
            .get(index)
            .copied()
            .ok_or(Error::NotFound)
    }
}

/// Keep NotFound, fold other store errors into a storage failure
fn storage_error(err: Error) -> Error {
    match err {
        Error::NotFound => Error::NotFound,
        other => {
            warn!("settings store error: {}", other);
            Error::StorageFailure
        }
    }
}
