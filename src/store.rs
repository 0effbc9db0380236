//! Keyed room storage with expiry
//!
//! The real backend is an external collaborator; the service only needs
//! `get`/`set`/`delete` plus a compare-and-set on the room version so two
//! near-simultaneous writes cannot silently overwrite each other.

use tracing::trace;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::error::StoreError;
use crate::room::Room;

pub trait RoomStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Room>, StoreError>;

    /// Unconditionally writes `room`, resetting its time-to-live
    fn set(&self, key: &str, room: &Room, ttl: Duration) -> Result<(), StoreError>;

    fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Writes `room` only if the stored room's version equals `expected`
    /// (`None` meaning no live room under `key`). Returns whether the write happened.
    fn compare_and_set(
        &self,
        key: &str,
        expected: Option<u64>,
        room: &Room,
        ttl: Duration,
    ) -> Result<bool, StoreError>;
}

impl<S: RoomStore + ?Sized> RoomStore for Arc<S> {
    fn get(&self, key: &str) -> Result<Option<Room>, StoreError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, room: &Room, ttl: Duration) -> Result<(), StoreError> {
        (**self).set(key, room, ttl)
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        (**self).delete(key)
    }

    fn compare_and_set(
        &self,
        key: &str,
        expected: Option<u64>,
        room: &Room,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        (**self).compare_and_set(key, expected, room, ttl)
    }
}

struct Entry {
    room: Room,
    expires_at: Instant,
}

/// Process-local store, expiring entries lazily on access
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live rooms
    pub fn len(&self) -> Result<usize, StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        let now = Instant::now();
        entries.retain(|_, entry| entry.expires_at > now);
        Ok(entries.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    fn live_version(entries: &mut HashMap<String, Entry>, key: &str) -> Option<u64> {
        let now = Instant::now();
        match entries.get(key) {
            Some(entry) if entry.expires_at > now => Some(entry.room.version),
            Some(_) => {
                trace!(key, "room expired");
                entries.remove(key);
                None
            }
            None => None,
        }
    }
}

impl RoomStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Room>, StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        if Self::live_version(&mut entries, key).is_none() {
            return Ok(None);
        }
        Ok(entries.get(key).map(|entry| entry.room.clone()))
    }

    fn set(&self, key: &str, room: &Room, ttl: Duration) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        entries.insert(
            key.to_string(),
            Entry {
                room: room.clone(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        entries.remove(key);
        Ok(())
    }

    fn compare_and_set(
        &self,
        key: &str,
        expected: Option<u64>,
        room: &Room,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        if Self::live_version(&mut entries, key) != expected {
            return Ok(false);
        }
        entries.insert(
            key.to_string(),
            Entry {
                room: room.clone(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(true)
    }
}
