//! Typed views over persisted documents.

use crate::error::{ClinicError, Result};
use crate::store::RecordStore;
use crate::subscriptions::StoreEvent;
use crate::types::{RecordId, Stored};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;

/// On-disk shape of a collection.
#[derive(Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct CollectionDocument<T> {
    /// Next identifier to assign. Never decreases, so ids are not reused
    /// after deletion.
    next_id: u64,
    records: Vec<Stored<T>>,
}

impl<T> Default for CollectionDocument<T> {
    fn default() -> Self {
        Self {
            next_id: 1,
            records: Vec::new(),
        }
    }
}

/// A named collection of records.
///
/// Every mutation rewrites the whole document. Reads are total: a missing,
/// unreadable or malformed document reads as an empty collection. Writes
/// are not: a storage error while loading is returned, and a malformed
/// document keeps whatever id counter can still be read from it.
pub struct Collection<'a, T> {
    store: &'a RecordStore,
    key: &'static str,
    name: &'static str,
    _marker: PhantomData<T>,
}

impl<'a, T> Collection<'a, T>
where
    T: Serialize + DeserializeOwned + Clone,
{
    pub(crate) fn new(store: &'a RecordStore, key: &'static str, name: &'static str) -> Self {
        Self {
            store,
            key,
            name,
            _marker: PhantomData,
        }
    }

    /// Storage key of this collection.
    pub fn key(&self) -> &'static str {
        self.key
    }

    /// All records, in insertion order.
    pub fn list(&self) -> Vec<Stored<T>> {
        self.load().records
    }

    pub fn get(&self, id: RecordId) -> Option<Stored<T>> {
        self.load().records.into_iter().find(|r| r.id == id)
    }

    pub fn len(&self) -> usize {
        self.load().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append a record, assigning its id and creation timestamp.
    pub fn append(&self, data: T) -> Result<Stored<T>> {
        let record = {
            let _lock = self.store.write_lock.lock();
            let mut doc = self.load_for_write()?;

            let record = Stored {
                id: RecordId(doc.next_id),
                created_at: self.store.clock.now(),
                data,
            };
            doc.next_id += 1;
            doc.records.push(record.clone());
            self.save(&doc)?;
            record
        };

        tracing::debug!(collection = self.name, id = %record.id, "appended record");
        self.store.events.broadcast(StoreEvent::Appended {
            key: self.key.to_string(),
            id: record.id,
        });
        Ok(record)
    }

    /// Apply `change` to the record with `id` and persist the result.
    pub fn update<F>(&self, id: RecordId, change: F) -> Result<Stored<T>>
    where
        F: FnOnce(&mut T),
    {
        self.try_update(id, |data| {
            change(data);
            Ok(())
        })
    }

    /// Like [`Collection::update`], but `change` may refuse. Nothing is
    /// written when it does, and the check and the write happen under the
    /// same lock.
    pub fn try_update<F>(&self, id: RecordId, change: F) -> Result<Stored<T>>
    where
        F: FnOnce(&mut T) -> Result<()>,
    {
        let record = {
            let _lock = self.store.write_lock.lock();
            let mut doc = self.load_for_write()?;

            let record = doc
                .records
                .iter_mut()
                .find(|r| r.id == id)
                .ok_or(ClinicError::NotFound {
                    collection: self.name,
                    id,
                })?;
            change(&mut record.data)?;
            let record = record.clone();
            self.save(&doc)?;
            record
        };

        self.store.events.broadcast(StoreEvent::Updated {
            key: self.key.to_string(),
            id,
        });
        Ok(record)
    }

    /// Remove a record. Returns false when no record had that id.
    pub fn remove(&self, id: RecordId) -> Result<bool> {
        {
            let _lock = self.store.write_lock.lock();
            let mut doc = self.load_for_write()?;

            let before = doc.records.len();
            doc.records.retain(|r| r.id != id);
            if doc.records.len() == before {
                return Ok(false);
            }
            self.save(&doc)?;
        }

        tracing::debug!(collection = self.name, %id, "removed record");
        self.store.events.broadcast(StoreEvent::Removed {
            key: self.key.to_string(),
            id,
        });
        Ok(true)
    }

    /// Replace the whole collection. The id counter only moves forward.
    pub fn replace(&self, records: Vec<Stored<T>>) -> Result<()> {
        {
            let _lock = self.store.write_lock.lock();
            let current = self.load_for_write()?;

            let highest = records.iter().map(|r| r.id.0).max().unwrap_or(0);
            let doc = CollectionDocument {
                next_id: current.next_id.max(highest + 1),
                records,
            };
            self.save(&doc)?;
        }

        self.store.events.broadcast(StoreEvent::Replaced {
            key: self.key.to_string(),
        });
        Ok(())
    }

    /// Remove every record. The id counter is kept.
    pub fn clear(&self) -> Result<()> {
        {
            let _lock = self.store.write_lock.lock();
            let current = self.load_for_write()?;
            self.save(&CollectionDocument {
                next_id: current.next_id,
                records: Vec::new(),
            })?;
        }

        self.store.events.broadcast(StoreEvent::Replaced {
            key: self.key.to_string(),
        });
        Ok(())
    }

    fn load(&self) -> CollectionDocument<T> {
        match self.store.backend.read(self.key) {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(doc) => doc,
                Err(e) => {
                    tracing::warn!(collection = self.name, error = %e, "malformed collection, reading as empty");
                    CollectionDocument::default()
                }
            },
            Ok(None) => CollectionDocument::default(),
            Err(e) => {
                tracing::warn!(collection = self.name, error = %e, "storage unavailable, reading as empty");
                CollectionDocument::default()
            }
        }
    }

    fn load_for_write(&self) -> Result<CollectionDocument<T>> {
        let Some(raw) = self.store.backend.read(self.key)? else {
            return Ok(CollectionDocument::default());
        };
        match serde_json::from_str(&raw) {
            Ok(doc) => Ok(doc),
            Err(e) => {
                let next_id = salvage_next_id(&raw).unwrap_or(1);
                tracing::warn!(
                    collection = self.name,
                    error = %e,
                    next_id,
                    "overwriting malformed collection"
                );
                Ok(CollectionDocument {
                    next_id,
                    records: Vec::new(),
                })
            }
        }
    }

    fn save(&self, doc: &CollectionDocument<T>) -> Result<()> {
        let raw = serde_json::to_string(doc)?;
        self.store.backend.write(self.key, &raw)
    }
}

/// Reads the id counter from the head of a damaged document.
///
/// `next_id` is serialized first, so it usually survives truncation.
fn salvage_next_id(raw: &str) -> Option<u64> {
    let rest = raw.trim_start().strip_prefix('{')?.trim_start();
    let rest = rest.strip_prefix("\"next_id\"")?.trim_start();
    let rest = rest.strip_prefix(':')?.trim_start();
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// A single optional value, such as the current session.
pub struct Singleton<'a, T> {
    store: &'a RecordStore,
    key: &'static str,
    _marker: PhantomData<T>,
}

impl<'a, T> Singleton<'a, T>
where
    T: Serialize + DeserializeOwned,
{
    pub(crate) fn new(store: &'a RecordStore, key: &'static str) -> Self {
        Self {
            store,
            key,
            _marker: PhantomData,
        }
    }

    /// Current value. Missing or malformed documents read as `None`.
    pub fn get(&self) -> Option<T> {
        match self.store.backend.read(self.key) {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::warn!(key = self.key, error = %e, "malformed singleton, reading as unset");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(key = self.key, error = %e, "storage unavailable, reading as unset");
                None
            }
        }
    }

    pub fn set(&self, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.store.backend.write(self.key, &raw)?;
        self.changed();
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        self.store.backend.remove(self.key)?;
        self.changed();
        Ok(())
    }

    fn changed(&self) {
        self.store.events.broadcast(StoreEvent::SingletonChanged {
            key: self.key.to_string(),
        });
    }
}
