//! Device-type profiles and the process-wide profile store.
//!
//! A `Profile` is the sorted OID tree for one device type (e.g.
//! `cable_modem`), shared read-mostly across every device instance of that
//! type. Swapping in a freshly-loaded profile is atomic: readers either see
//! the whole old snapshot or the whole new one, never a half-loaded mix.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::RwLock;

use crate::behavior::Behavior;
use crate::error::{Error, Result};
use crate::oid::Oid;
use crate::value::TypedValue;

/// Normalized device-type identifier. The single key used by the profile
/// store, the port range assigner, and `Device::device_type` -- there is no
/// separate atom/string API split.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceTypeId(String);

impl DeviceTypeId {
    pub fn new<S: Into<String>>(s: S) -> Self {
        Self(s.into().trim().to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for DeviceTypeId {
    fn from(s: &str) -> Self {
        DeviceTypeId::new(s)
    }
}

impl From<String> for DeviceTypeId {
    fn from(s: String) -> Self {
        DeviceTypeId::new(s)
    }
}

/// One OID's static value plus the behavior used to simulate it over time.
#[derive(Debug, Clone)]
pub struct OidRecord {
    pub oid: Oid,
    pub value: TypedValue,
    pub behavior: Behavior,
}

impl OidRecord {
    pub fn new(oid: Oid, value: TypedValue, behavior: Behavior) -> Self {
        Self {
            oid,
            value,
            behavior,
        }
    }
}

/// An immutable, sorted snapshot of one device type's OID tree.
///
/// `sorted_oids` mirrors the keys of `records` in ascending lexicographic
/// order so GET-NEXT/GET-BULK can binary-search for a successor instead of
/// scanning a hash map, which is what the teacher's `get_next_oid` did.
#[derive(Debug, Default)]
pub struct Profile {
    records: HashMap<Oid, OidRecord>,
    sorted_oids: Vec<Oid>,
}

impl Profile {
    pub fn from_records(records: Vec<OidRecord>) -> Result<Self> {
        let mut map = HashMap::with_capacity(records.len());
        for record in records {
            if map.contains_key(&record.oid) {
                return Err(Error::duplicate_oid(
                    String::new(),
                    record.oid.to_string(),
                ));
            }
            map.insert(record.oid.clone(), record);
        }
        let mut sorted_oids: Vec<Oid> = map.keys().cloned().collect();
        sorted_oids.sort();
        Ok(Self {
            records: map,
            sorted_oids,
        })
    }

    pub fn len(&self) -> usize {
        self.sorted_oids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sorted_oids.is_empty()
    }

    pub fn get(&self, oid: &Oid) -> Option<&OidRecord> {
        self.records.get(oid)
    }

    /// The lexicographically next OID strictly greater than `oid`, or
    /// `None` at end-of-MIB.
    pub fn successor(&self, oid: &Oid) -> Option<&OidRecord> {
        match self.sorted_oids.binary_search(oid) {
            // Exact match: the next element in sorted order, if any.
            Ok(idx) => self.sorted_oids.get(idx + 1),
            // No exact match: the insertion point is already the next
            // greater element.
            Err(idx) => self.sorted_oids.get(idx),
        }
        .and_then(|next_oid| self.records.get(next_oid))
    }

    /// Up to `max_repetitions` records strictly greater than `oid`, in
    /// ascending order, for GET-BULK. Stops early at end-of-MIB.
    pub fn bulk_from(&self, oid: &Oid, max_repetitions: usize) -> Vec<&OidRecord> {
        let start = match self.sorted_oids.binary_search(oid) {
            Ok(idx) => idx + 1,
            Err(idx) => idx,
        };
        self.sorted_oids[start..]
            .iter()
            .take(max_repetitions)
            .filter_map(|oid| self.records.get(oid))
            .collect()
    }
}

/// Process-wide registry of per-device-type profiles.
///
/// Each device type's profile lives behind its own `RwLock<Arc<Profile>>`:
/// loading a fresh profile swaps the whole `Arc` under a write lock held
/// only for the swap; readers clone the `Arc` under a read lock and never
/// block on lookup, successor, or bulk traversal.
#[derive(Debug, Default)]
pub struct ProfileStore {
    profiles: DashMap<DeviceTypeId, RwLock<Arc<Profile>>>,
}

impl ProfileStore {
    pub fn new() -> Self {
        Self {
            profiles: DashMap::new(),
        }
    }

    /// Atomically install a profile for `device_type`, replacing any
    /// previous one in full.
    pub async fn load(&self, device_type: DeviceTypeId, profile: Profile) {
        let profile = Arc::new(profile);
        match self.profiles.get(&device_type) {
            Some(slot) => {
                *slot.write().await = profile;
            }
            None => {
                self.profiles
                    .insert(device_type, RwLock::new(profile));
            }
        }
    }

    /// A cheap snapshot handle for `device_type`, or `None` if no profile
    /// has been loaded for it yet.
    pub async fn snapshot(&self, device_type: &DeviceTypeId) -> Option<Arc<Profile>> {
        let slot = self.profiles.get(device_type)?;
        Some(slot.read().await.clone())
    }

    pub fn device_types(&self) -> Vec<DeviceTypeId> {
        self.profiles.iter().map(|e| e.key().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::TypedValue;

    fn rec(oid: &str, v: i64) -> OidRecord {
        OidRecord::new(
            oid.parse().unwrap(),
            TypedValue::Integer(v),
            Behavior::StaticValue,
        )
    }

    #[test]
    fn successor_advances_in_sorted_order() {
        let profile = Profile::from_records(vec![
            rec("1.3.6.1.2.1.2.2.1.21.9", 1),
            rec("1.3.6.1.2.1.2.2.1.21.10", 2),
            rec("1.3.6.1.2.1.2.2.1.22.1", 3),
        ])
        .unwrap();

        let first: Oid = "1.3.6.1.2.1.2.2.1.21.9".parse().unwrap();
        let next = profile.successor(&first).unwrap();
        assert_eq!(next.oid.to_string(), "1.3.6.1.2.1.2.2.1.21.10");

        let last: Oid = "1.3.6.1.2.1.2.2.1.22.1".parse().unwrap();
        assert!(profile.successor(&last).is_none());
    }

    #[test]
    fn successor_of_nonexistent_oid_is_next_greater() {
        let profile = Profile::from_records(vec![rec("1.3.6.1.2.1.1.3.0", 1)]).unwrap();
        let probe: Oid = "1.3.6.1.2.1.1.1.0".parse().unwrap();
        let next = profile.successor(&probe).unwrap();
        assert_eq!(next.oid.to_string(), "1.3.6.1.2.1.1.3.0");
    }

    #[test]
    fn bulk_from_respects_bound_and_terminates() {
        let profile = Profile::from_records(vec![
            rec("1.1", 1),
            rec("1.2", 2),
            rec("1.3", 3),
        ])
        .unwrap();
        let start: Oid = "1.0".parse().unwrap();
        let page = profile.bulk_from(&start, 2);
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].oid.to_string(), "1.1");
        assert_eq!(page[1].oid.to_string(), "1.2");

        let tail = profile.bulk_from(&"1.3".parse().unwrap(), 5);
        assert!(tail.is_empty());
    }

    #[test]
    fn rejects_duplicate_oids() {
        let err = Profile::from_records(vec![rec("1.1", 1), rec("1.1", 2)]);
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn load_is_atomic_swap() {
        let store = ProfileStore::new();
        let dt = DeviceTypeId::new("cable_modem");
        store
            .load(dt.clone(), Profile::from_records(vec![rec("1.1", 1)]).unwrap())
            .await;
        let snap1 = store.snapshot(&dt).await.unwrap();
        assert_eq!(snap1.len(), 1);

        store
            .load(
                dt.clone(),
                Profile::from_records(vec![rec("1.1", 1), rec("1.2", 2)]).unwrap(),
            )
            .await;
        let snap2 = store.snapshot(&dt).await.unwrap();
        assert_eq!(snap2.len(), 2);
        // The handle taken before the reload still sees the old snapshot.
        assert_eq!(snap1.len(), 1);
    }
}
