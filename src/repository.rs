//! FingerprintRepository (C8): the durable, sqlite-backed store keyed by
//! `track_id`.
//!
//! The one invariant this module exists to enforce: a fingerprint missing
//! `fingerprint_version` is rejected here, at the repository boundary,
//! rather than silently persisted with a garbage/default version (P6).

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::PersistError;
use crate::models::{Fingerprint, FINGERPRINT_VERSION};

pub struct FingerprintRepository {
    conn: Mutex<Connection>,
}

impl FingerprintRepository {
    pub fn open(path: &std::path::Path) -> Result<Self, PersistError> {
        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn open_in_memory() -> Result<Self, PersistError> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn init_schema(conn: &Connection) -> Result<(), PersistError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS fingerprints (
                track_id INTEGER PRIMARY KEY,
                fingerprint_version INTEGER NOT NULL,
                payload BLOB NOT NULL,
                updated_at INTEGER NOT NULL
            );",
        )?;
        Ok(())
    }

    /// Upserts `fp` for `track_id`. Rejects a fingerprint with
    /// `fingerprint_version == 0` (the never-stamped sentinel) before it
    /// ever reaches sqlite.
    pub fn upsert(&self, track_id: u64, fp: &Fingerprint) -> Result<(), PersistError> {
        if fp.fingerprint_version == 0 {
            return Err(PersistError::MissingFingerprintVersion);
        }
        let payload = fp.payload_bytes();
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO fingerprints (track_id, fingerprint_version, payload, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(track_id) DO UPDATE SET
                fingerprint_version = excluded.fingerprint_version,
                payload = excluded.payload,
                updated_at = excluded.updated_at",
            params![track_id as i64, fp.fingerprint_version, payload.to_vec(), now_unix()],
        )?;
        Ok(())
    }

    pub fn get(&self, track_id: u64) -> Result<Option<Fingerprint>, PersistError> {
        let conn = self.conn.lock();
        let row: Option<(u16, Vec<u8>)> = conn
            .query_row(
                "SELECT fingerprint_version, payload FROM fingerprints WHERE track_id = ?1",
                params![track_id as i64],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?;

        Ok(row.and_then(|(version, payload)| {
            if version != FINGERPRINT_VERSION {
                return None;
            }
            Fingerprint::from_payload_bytes(&payload, version)
        }))
    }

    pub fn delete(&self, track_id: u64) -> Result<(), PersistError> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM fingerprints WHERE track_id = ?1", params![track_id as i64])?;
        Ok(())
    }

    pub fn len(&self) -> Result<usize, PersistError> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM fingerprints", [], |r| r.get(0))?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> Result<bool, PersistError> {
        Ok(self.len()? == 0)
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

    #[test]
    fn upsert_then_get_round_trips() {
        let repo = FingerprintRepository::open_in_memory().unwrap();
        let mut fp = Fingerprint { lufs: -14.0, ..Fingerprint::default() };
        fp.sanitize();
        repo.upsert(7, &fp).unwrap();
        let got = repo.get(7).unwrap().expect("present");
        assert_eq!(got.lufs, -14.0);
    }

    #[test]
    fn rejects_fingerprint_missing_version() {
        let repo = FingerprintRepository::open_in_memory().unwrap();
        let fp = Fingerprint { fingerprint_version: 0, ..Fingerprint::default() };
        let err = repo.upsert(1, &fp).unwrap_err();
        assert!(matches!(err, PersistError::MissingFingerprintVersion));
    }

    #[test]
    fn upsert_overwrites_existing_track() {
        let repo = FingerprintRepository::open_in_memory().unwrap();
        let mut fp1 = Fingerprint { tempo_bpm: 100.0, ..Fingerprint::default() };
        fp1.sanitize();
        repo.upsert(5, &fp1).unwrap();

        let mut fp2 = Fingerprint { tempo_bpm: 160.0, ..Fingerprint::default() };
        fp2.sanitize();
        repo.upsert(5, &fp2).unwrap();

        assert_eq!(repo.len().unwrap(), 1);
        assert_eq!(repo.get(5).unwrap().unwrap().tempo_bpm, 160.0);
    }

    #[test]
    fn get_missing_track_is_none() {
        let repo = FingerprintRepository::open_in_memory().unwrap();
        assert!(repo.get(999).unwrap().is_none());
    }
}
