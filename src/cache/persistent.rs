//! PersistentCache (C6): a bounded, sqlite-backed key -> fingerprint store
//! with LRU eviction.
//!
//! Identity key defaults to `(size, mtime)` per the Open Question resolution
//! in SPEC_FULL.md §D.1 — cheap to compute, fragile across file moves/copies,
//! with a documented (unbuilt) extension point for an opportunistic SHA-256
//! upgrade.

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::CacheError;
use crate::models::{Fingerprint, FINGERPRINT_VERSION};

pub const DEFAULT_MAX_ENTRIES: usize = 100_000;
pub const DEFAULT_MAX_BYTES: u64 = 1 << 30; // 1 GiB

/// `(size, mtime_ns)` composite identity, the default `PersistentCache` key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub size_bytes: u64,
    pub mtime_ns: u64,
}

impl CacheKey {
    fn as_text(&self) -> String {
        format!("{}:{}", self.size_bytes, self.mtime_ns)
    }
}

pub struct PersistentCache {
    conn: Mutex<Connection>,
    max_entries: usize,
    max_bytes: u64,
}

const ROW_OVERHEAD_BYTES: u64 = 32; // approximate key + timestamp overhead

impl PersistentCache {
    pub fn open(
        path: &std::path::Path,
        max_entries: usize,
        max_bytes: u64,
    ) -> Result<Self, CacheError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS persistent_cache (
                key TEXT PRIMARY KEY,
                fingerprint_version INTEGER NOT NULL,
                payload BLOB NOT NULL,
                last_accessed INTEGER NOT NULL
            );",
        )?;
        Ok(Self { conn: Mutex::new(conn), max_entries, max_bytes })
    }

    pub fn open_in_memory(max_entries: usize, max_bytes: u64) -> Result<Self, CacheError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS persistent_cache (
                key TEXT PRIMARY KEY,
                fingerprint_version INTEGER NOT NULL,
                payload BLOB NOT NULL,
                last_accessed INTEGER NOT NULL
            );",
        )?;
        Ok(Self { conn: Mutex::new(conn), max_entries, max_bytes })
    }

    /// Validates `fingerprint_version` on read; a mismatch is treated as a
    /// miss, per spec §4.6.
    pub fn get(&self, key: &CacheKey) -> Option<Fingerprint> {
        let conn = self.conn.lock();
        let row: Option<(u16, Vec<u8>)> = conn
            .query_row(
                "SELECT fingerprint_version, payload FROM persistent_cache WHERE key = ?1",
                params![key.as_text()],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()
            .ok()?;

        let (version, payload) = row?;
        if version != FINGERPRINT_VERSION {
            return None;
        }
        let fp = Fingerprint::from_payload_bytes(&payload, version)?;
        drop(conn);
        self.touch(key);
        Some(fp)
    }

    fn touch(&self, key: &CacheKey) {
        let conn = self.conn.lock();
        let _ = conn.execute(
            "UPDATE persistent_cache SET last_accessed = ?1 WHERE key = ?2",
            params![now_unix(), key.as_text()],
        );
    }

    /// Inserts/replaces `fp` for `key`, then evicts LRU entries until both
    /// `max_entries` and `max_bytes` are satisfied.
    pub fn put(&self, key: &CacheKey, fp: &Fingerprint) -> Result<(), CacheError> {
        let payload = fp.payload_bytes();
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO persistent_cache (key, fingerprint_version, payload, last_accessed)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(key) DO UPDATE SET
                fingerprint_version = excluded.fingerprint_version,
                payload = excluded.payload,
                last_accessed = excluded.last_accessed",
            params![key.as_text(), fp.fingerprint_version, payload.to_vec(), now_unix()],
        )?;
        drop(conn);
        self.evict_if_needed()
    }

    fn evict_if_needed(&self) -> Result<(), CacheError> {
        let conn = self.conn.lock();
        loop {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM persistent_cache", [], |r| r.get(0))?;
            let total_bytes = Self::estimate_total_bytes(&conn)?;
            if (count as usize) <= self.max_entries && total_bytes <= self.max_bytes {
                break;
            }
            let oldest: Option<String> = conn
                .query_row(
                    "SELECT key FROM persistent_cache ORDER BY last_accessed ASC LIMIT 1",
                    [],
                    |r| r.get(0),
                )
                .optional()?;
            match oldest {
                Some(key) => {
                    conn.execute("DELETE FROM persistent_cache WHERE key = ?1", params![key])?;
                }
                None => break,
            }
        }
        Ok(())
    }

    fn estimate_total_bytes(conn: &Connection) -> Result<u64, CacheError> {
        let payload_bytes: i64 =
            conn.query_row("SELECT COALESCE(SUM(LENGTH(payload)), 0) FROM persistent_cache", [], |r| r.get(0))?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM persistent_cache", [], |r| r.get(0))?;
        Ok(payload_bytes as u64 + count as u64 * ROW_OVERHEAD_BYTES)
    }

    pub fn len(&self) -> usize {
        let conn = self.conn.lock();
        conn.query_row("SELECT COUNT(*) FROM persistent_cache", [], |r| r.get::<_, i64>(0))
            .unwrap_or(0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(n: u64) -> CacheKey {
        CacheKey { size_bytes: n, mtime_ns: n }
    }

    #[test]
    fn put_then_get_round_trips() {
        let cache = PersistentCache::open_in_memory(100, 1 << 20).unwrap();
        let mut fp = Fingerprint { tempo_bpm: 140.0, ..Fingerprint::default() };
        fp.sanitize();
        cache.put(&key(1), &fp).unwrap();
        let got = cache.get(&key(1)).expect("hit");
        assert_eq!(got.tempo_bpm, 140.0);
    }

    #[test]
    fn miss_on_unknown_key() {
        let cache = PersistentCache::open_in_memory(100, 1 << 20).unwrap();
        assert!(cache.get(&key(99)).is_none());
    }

    #[test]
    fn evicts_lru_past_max_entries() {
        let cache = PersistentCache::open_in_memory(3, 1 << 20).unwrap();
        let mut fp = Fingerprint::default();
        fp.sanitize();
        for i in 0..5 {
            cache.put(&key(i), &fp).unwrap();
        }
        assert!(cache.len() <= 3, "len={}", cache.len());
    }
}
