use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};

use super::error::KvError;

const TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("kv");

/// Thin wrapper around an embedded key-value store.
///
/// Mirrors the hash/set/list/counter/script surface `spec.md` §4.1 describes for
/// a networked store, but backed by `redb`: every "namespace/key" pair from the
/// persisted key layout (`spec.md` §6) becomes one literal key in a single table.
/// `redb` write transactions serialize writers, which is what makes
/// [`Self::allocate_indices`] atomic without a server-side scripting facility.
pub struct KvAdapter {
    db: Database,
}

impl KvAdapter {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, KvError> {
        let db = Database::create(path)?;
        let write_txn = db.begin_write()?;
        {
            write_txn.open_table(TABLE)?;
        }
        write_txn.commit()?;
        Ok(KvAdapter { db })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Self {
        use tempfile::NamedTempFile;
        let file = NamedTempFile::new().expect("create temp db file");
        let path = file.into_temp_path();
        let path = path.keep().expect("persist temp db path");
        KvAdapter::open(path).expect("open in-memory-ish db")
    }

    fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>, KvError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(TABLE)?;
        Ok(table.get(key)?.map(|v| v.value().to_vec()))
    }

    fn put_raw(&self, key: &str, value: &[u8]) -> Result<(), KvError> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(TABLE)?;
            table.insert(key, value)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn decode<T: serde::de::DeserializeOwned + Default>(
        &self,
        key: &str,
    ) -> Result<T, KvError> {
        match self.get_raw(key)? {
            None => Ok(T::default()),
            Some(bytes) => serde_json::from_slice(&bytes).map_err(|e| KvError::Decode {
                key: key.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    // ---- hash ----

    pub fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>, KvError> {
        self.decode(key)
    }

    pub fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>, KvError> {
        Ok(self.hash_get_all(key)?.remove(field))
    }

    /// Read-modify-write in one `redb` write transaction, so concurrent
    /// callers against the same key (e.g. two loaders both touching
    /// `[ctx].taxonomy-parents`, `spec.md` §5) never clobber each other's
    /// update the way two independent `get_raw`/`put_raw` calls would.
    pub fn hash_set_field(&self, key: &str, field: &str, value: &str) -> Result<(), KvError> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(TABLE)?;
            let mut hash: HashMap<String, String> = read_json(&table, key)?;
            hash.insert(field.to_string(), value.to_string());
            write_json(&mut table, key, &hash)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    // ---- set ----

    pub fn set_members(&self, key: &str) -> Result<BTreeSet<String>, KvError> {
        self.decode(key)
    }

    pub fn set_card(&self, key: &str) -> Result<usize, KvError> {
        Ok(self.set_members(key)?.len())
    }

    /// Read-modify-write in one write transaction (`spec.md` §5: two loaders
    /// on disjoint sample sets both touch `[ctx].samples-represented`
    /// concurrently and must not lose each other's additions).
    pub fn set_add<S: AsRef<str>>(&self, key: &str, members: &[S]) -> Result<(), KvError> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(TABLE)?;
            let mut set: BTreeSet<String> = read_json(&table, key)?;
            for m in members {
                set.insert(m.as_ref().to_string());
            }
            write_json(&mut table, key, &set)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    // ---- list of (count, idx) pairs ----

    pub fn list_range_pairs(&self, key: &str) -> Result<Vec<(u32, u32)>, KvError> {
        self.decode(key)
    }

    /// Read-modify-write in one write transaction; see [`Self::set_add`] for
    /// why this must not be split across separate read/write transactions.
    pub fn list_push_pairs(&self, key: &str, pairs: &[(u32, u32)]) -> Result<(), KvError> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(TABLE)?;
            let mut list: Vec<(u32, u32)> = read_json(&table, key)?;
            list.extend_from_slice(pairs);
            write_json(&mut table, key, &list)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    // ---- list of strings (e.g. state.timestamps, newest first) ----

    pub fn list_range_strings(&self, key: &str) -> Result<Vec<String>, KvError> {
        self.decode(key)
    }

    /// Read-modify-write in one write transaction; see [`Self::set_add`] for
    /// why this must not be split across separate read/write transactions.
    pub fn list_push_front_string(&self, key: &str, value: &str) -> Result<(), KvError> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(TABLE)?;
            let mut list: Vec<String> = read_json(&table, key)?;
            list.insert(0, value.to_string());
            write_json(&mut table, key, &list)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    // ---- counter ----

    pub fn counter_get(&self, key: &str) -> Result<u64, KvError> {
        self.decode(key)
    }

    // ---- opaque bytes (JSON payloads such as a sample's informative-column list) ----

    pub fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Option<T>, KvError> {
        match self.get_raw(key)? {
            None => Ok(None),
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| KvError::Decode {
                    key: key.to_string(),
                    reason: e.to_string(),
                }),
        }
    }

    pub fn put_json<T: serde::Serialize>(&self, key: &str, value: &T) -> Result<(), KvError> {
        let bytes = serde_json::to_vec(value).map_err(|e| KvError::Decode {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        self.put_raw(key, &bytes)
    }

    /// Atomically assigns integer indices to `names` against the per-(context,
    /// axis) forward/inverted maps and counter, in a single write transaction.
    /// Equivalent to the original system's `_INDEX_SCRIPT`: a concurrent caller
    /// never observes a partially-applied batch, and two batches against the same
    /// keys are fully serialized by `redb`.
    ///
    /// Within one call, a repeated name resolves to the same (possibly
    /// newly-assigned) index, matching `HashMap::entry().or_insert_with(...)`.
    pub fn allocate_indices(
        &self,
        forward_key: &str,
        inverted_key: &str,
        counter_key: &str,
        names: &[String],
    ) -> Result<Vec<u32>, KvError> {
        let write_txn = self.db.begin_write()?;
        let mut out = Vec::with_capacity(names.len());
        {
            let mut table = write_txn.open_table(TABLE)?;

            let mut forward: HashMap<String, String> = read_json(&table, forward_key)?;
            let mut inverted: HashMap<String, String> = read_json(&table, inverted_key)?;
            let mut counter: u64 = read_json(&table, counter_key)?;

            for name in names {
                if let Some(existing) = forward.get(name) {
                    out.push(existing.parse::<u32>().expect("index is always u32"));
                    continue;
                }
                let idx = counter as u32;
                forward.insert(name.clone(), idx.to_string());
                inverted.insert(idx.to_string(), name.clone());
                counter += 1;
                out.push(idx);
            }

            write_json(&mut table, forward_key, &forward)?;
            write_json(&mut table, inverted_key, &inverted)?;
            write_json(&mut table, counter_key, &counter)?;
        }
        write_txn.commit()?;
        Ok(out)
    }
}

fn read_json<T: serde::de::DeserializeOwned + Default>(
    table: &redb::Table<&str, &[u8]>,
    key: &str,
) -> Result<T, KvError> {
    match table.get(key)? {
        None => Ok(T::default()),
        Some(v) => serde_json::from_slice(v.value()).map_err(|e| KvError::Decode {
            key: key.to_string(),
            reason: e.to_string(),
        }),
    }
}

fn write_json<T: serde::Serialize>(
    table: &mut redb::Table<&str, &[u8]>,
    key: &str,
    value: &T,
) -> Result<(), KvError> {
    let bytes = serde_json::to_vec(value).map_err(|e| KvError::Decode {
        key: key.to_string(),
        reason: e.to_string(),
    })?;
    table.insert(key, bytes.as_slice())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_round_trips() {
        let kv = KvAdapter::open_in_memory();
        kv.hash_set_field("ctx.state", "db-version", "1").unwrap();
        kv.hash_set_field("ctx.state", "has-taxonomy", "1").unwrap();
        let hash = kv.hash_get_all("ctx.state").unwrap();
        assert_eq!(hash.get("db-version"), Some(&"1".to_string()));
        assert_eq!(hash.get("has-taxonomy"), Some(&"1".to_string()));
    }

    #[test]
    fn set_add_is_idempotent() {
        let kv = KvAdapter::open_in_memory();
        kv.set_add("ctx.samples-represented", &["UNTAGGED_s1", "UNTAGGED_s1"])
            .unwrap();
        kv.set_add("ctx.samples-represented", &["UNTAGGED_s2"])
            .unwrap();
        assert_eq!(kv.set_card("ctx.samples-represented").unwrap(), 2);
    }

    /// `spec.md` §5: two loaders on disjoint sample sets concurrently
    /// `set_add` into the same shared `[ctx].samples-represented` key. Each
    /// `set_add` must be an atomic read-modify-write (one `redb` write
    /// transaction) or the slower writer's read of the pre-update set
    /// clobbers the other thread's addition on commit.
    #[test]
    fn concurrent_set_add_on_shared_key_loses_no_members() {
        use std::sync::Arc;
        use std::thread;

        let kv = Arc::new(KvAdapter::open_in_memory());
        let mut handles = Vec::new();
        for t in 0..8 {
            let kv = Arc::clone(&kv);
            handles.push(thread::spawn(move || {
                for i in 0..20 {
                    kv.set_add("ctx.samples-represented", &[format!("s{t}_{i}")])
                        .unwrap();
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(kv.set_card("ctx.samples-represented").unwrap(), 8 * 20);
    }

    #[test]
    fn missing_key_is_empty_not_error() {
        let kv = KvAdapter::open_in_memory();
        assert!(kv.hash_get_all("nope").unwrap().is_empty());
        assert!(kv.set_members("nope").unwrap().is_empty());
        assert!(kv.list_range_pairs("nope").unwrap().is_empty());
        assert_eq!(kv.counter_get("nope").unwrap(), 0);
    }

    #[test]
    fn allocate_indices_matches_setdefault_semantics() {
        let kv = KvAdapter::open_in_memory();
        let names: Vec<String> = ["A", "A", "B", "C", "B", "Z", "A"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let idx = kv
            .allocate_indices(
                "ctx.feature-index",
                "ctx.feature-index-inverted",
                "ctx.feature-index.counter",
                &names,
            )
            .unwrap();
        assert_eq!(idx, vec![0, 0, 1, 2, 1, 3, 0]);
    }
}
