//! SQLite-backed history store. The submitted URL is stored AES-GCM encrypted;
//! the columns used for filtering stay in clear.
//! Key derived from a deployment secret (SHA-256).

use super::history::{
    ApprovalStatus, HistoryFilter, HistoryQuery, HistoryRecord, Page, SortOrder,
};
use super::{HistoryStore, StorageError};
use crate::identity::{Role, UnknownRole};
use crate::verdict::{Label, UnknownLabel};
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Utc};
use rand::RngCore;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

const COLUMNS: &str = "id, submitter_id, submitter_role, url_enc, detection, classifier, \
                       need_review, approved, approved_at, approved_by, created_at, updated_at";

fn derive_key(seed: &[u8]) -> [u8; KEY_LEN] {
    use ring::digest;
    let mut out = [0u8; KEY_LEN];
    let h = digest::digest(&digest::SHA256, seed);
    out[..h.as_ref().len().min(KEY_LEN)].copy_from_slice(h.as_ref());
    out
}

/// Why a stored payload could not be opened.
#[derive(Debug, Error)]
enum SealError {
    #[error("payload is not base64: {0}")]
    Encoding(#[from] base64::DecodeError),
    #[error("payload too short")]
    Truncated,
    #[error("decryption failed")]
    Authentication,
}

fn encrypt(key: &[u8; KEY_LEN], plaintext: &[u8]) -> Result<String, StorageError> {
    let cipher = Aes256Gcm::new(key.into());
    let mut nonce = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce);
    let ciphertext = cipher
        .encrypt((&nonce).into(), plaintext)
        .map_err(|_| StorageError::Crypto)?;
    let mut out = nonce.to_vec();
    out.extend(ciphertext);
    Ok(BASE64.encode(&out))
}

fn decrypt(key: &[u8; KEY_LEN], encoded: &str) -> Result<Vec<u8>, SealError> {
    let raw = BASE64.decode(encoded)?;
    if raw.len() < NONCE_LEN {
        return Err(SealError::Truncated);
    }
    let (nonce, ct) = raw.split_at(NONCE_LEN);
    Aes256Gcm::new(key.into())
        .decrypt(nonce.into(), ct)
        .map_err(|_| SealError::Authentication)
}

/// Row as stored, before decryption and enum parsing.
struct StoredRow {
    id: String,
    submitter_id: String,
    submitter_role: String,
    url_enc: String,
    detection: bool,
    classifier: String,
    need_review: bool,
    approved: Option<String>,
    approved_at: Option<i64>,
    approved_by: Option<String>,
    created_at: i64,
    updated_at: i64,
}

impl StoredRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            submitter_id: row.get(1)?,
            submitter_role: row.get(2)?,
            url_enc: row.get(3)?,
            detection: row.get(4)?,
            classifier: row.get(5)?,
            need_review: row.get(6)?,
            approved: row.get(7)?,
            approved_at: row.get(8)?,
            approved_by: row.get(9)?,
            created_at: row.get(10)?,
            updated_at: row.get(11)?,
        })
    }

    fn into_record(self, key: &[u8; KEY_LEN]) -> Result<HistoryRecord, StorageError> {
        let id = self.id;
        let corrupt = |reason: String| StorageError::Corrupt {
            id: id.clone(),
            reason,
        };
        let plain = decrypt(key, &self.url_enc).map_err(|e| corrupt(e.to_string()))?;
        let original_url = String::from_utf8(plain).map_err(|e| corrupt(e.to_string()))?;
        let submitter_role: Role = self
            .submitter_role
            .parse()
            .map_err(|e: UnknownRole| corrupt(e.to_string()))?;
        let classifier: Label = self
            .classifier
            .parse()
            .map_err(|e: UnknownLabel| corrupt(e.to_string()))?;
        let approved = self
            .approved
            .map(|s| s.parse::<ApprovalStatus>())
            .transpose()
            .map_err(|e| corrupt(e.to_string()))?;
        let approved_at = self
            .approved_at
            .map(|ms| from_millis(ms).ok_or_else(|| corrupt(format!("bad approved_at {}", ms))))
            .transpose()?;
        let created_at = from_millis(self.created_at)
            .ok_or_else(|| corrupt(format!("bad created_at {}", self.created_at)))?;
        let updated_at = from_millis(self.updated_at)
            .ok_or_else(|| corrupt(format!("bad updated_at {}", self.updated_at)))?;

        Ok(HistoryRecord {
            id,
            submitter_id: self.submitter_id,
            submitter_role,
            original_url,
            detection: self.detection,
            classifier,
            need_review: self.need_review,
            approved,
            approved_at,
            approved_by: self.approved_by,
            created_at,
            updated_at,
        })
    }
}

fn from_millis(ms: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
}

/// `WHERE ...` (or empty) plus its positional arguments.
fn where_clause(filter: &HistoryFilter) -> (String, Vec<Value>) {
    let mut conds: Vec<&str> = Vec::new();
    let mut args: Vec<Value> = Vec::new();

    if let Some(from) = filter.created_from {
        conds.push("created_at >= ?");
        args.push(Value::Integer(from.timestamp_millis()));
    }
    if let Some(to) = filter.created_to {
        conds.push("created_at <= ?");
        args.push(Value::Integer(to.timestamp_millis()));
    }
    if let Some(ref submitter) = filter.submitter_id {
        conds.push("submitter_id = ?");
        args.push(Value::Text(submitter.clone()));
    }
    if let Some(label) = filter.classifier {
        conds.push("classifier = ?");
        args.push(Value::Text(label.as_str().to_string()));
    }
    if let Some(status) = filter.approved {
        conds.push("approved = ?");
        args.push(Value::Text(status.as_str().to_string()));
    }
    if let Some(need_review) = filter.need_review {
        conds.push("need_review = ?");
        args.push(Value::Integer(i64::from(need_review)));
    }

    if conds.is_empty() {
        (String::new(), args)
    } else {
        (format!(" WHERE {}", conds.join(" AND ")), args)
    }
}

pub struct SqliteHistoryStore {
    conn: Mutex<Connection>,
    key: [u8; KEY_LEN],
}

impl SqliteHistoryStore {
    /// Open or create DB at path. Key is derived from `secret`.
    pub fn open(path: &Path, secret: &[u8]) -> Result<Self, StorageError> {
        Self::init(Connection::open(path)?, secret)
    }

    pub fn open_in_memory(secret: &[u8]) -> Result<Self, StorageError> {
        Self::init(Connection::open_in_memory()?, secret)
    }

    fn init(conn: Connection, secret: &[u8]) -> Result<Self, StorageError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS history (
                id TEXT PRIMARY KEY,
                submitter_id TEXT NOT NULL,
                submitter_role TEXT NOT NULL,
                url_enc TEXT NOT NULL,
                detection INTEGER NOT NULL,
                classifier TEXT NOT NULL,
                need_review INTEGER NOT NULL,
                approved TEXT,
                approved_at INTEGER,
                approved_by TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_history_submitter ON history(submitter_id);
            CREATE INDEX IF NOT EXISTS idx_history_created ON history(created_at);
            "#,
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
            key: derive_key(secret),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn.lock().map_err(|_| StorageError::Poisoned)
    }
}

impl HistoryStore for SqliteHistoryStore {
    fn insert_many(&self, records: &[HistoryRecord]) -> Result<(), StorageError> {
        let encrypted = records
            .iter()
            .map(|r| encrypt(&self.key, r.original_url.as_bytes()))
            .collect::<Result<Vec<_>, _>>()?;

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(&format!(
                "INSERT INTO history ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                COLUMNS
            ))?;
            for (r, url_enc) in records.iter().zip(&encrypted) {
                stmt.execute(params![
                    r.id,
                    r.submitter_id,
                    r.submitter_role.as_str(),
                    url_enc,
                    r.detection,
                    r.classifier.as_str(),
                    r.need_review,
                    r.approved.map(ApprovalStatus::as_str),
                    r.approved_at.map(|t| t.timestamp_millis()),
                    r.approved_by,
                    r.created_at.timestamp_millis(),
                    r.updated_at.timestamp_millis(),
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<HistoryRecord>, StorageError> {
        let stored = {
            let conn = self.conn()?;
            conn.query_row(
                &format!("SELECT {} FROM history WHERE id = ?1", COLUMNS),
                params![id],
                StoredRow::read,
            )
            .optional()?
        };
        stored.map(|row| row.into_record(&self.key)).transpose()
    }

    fn find(&self, query: &HistoryQuery) -> Result<Page<HistoryRecord>, StorageError> {
        let (clause, mut args) = where_clause(&query.filter);
        let order = match query.sort {
            SortOrder::CreatedAsc => "created_at ASC, rowid ASC",
            SortOrder::ApprovedAtDesc => "approved_at DESC, rowid ASC",
        };

        let (total, rows) = {
            let conn = self.conn()?;
            let total: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM history{}", clause),
                params_from_iter(args.iter()),
                |row| row.get(0),
            )?;

            args.push(Value::Integer(i64::from(query.page.size)));
            args.push(Value::Integer(
                i64::try_from(query.page.offset()).unwrap_or(i64::MAX),
            ));
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM history{} ORDER BY {} LIMIT ? OFFSET ?",
                COLUMNS, clause, order
            ))?;
            let rows = stmt
                .query_map(params_from_iter(args.iter()), StoredRow::read)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            (total, rows)
        };

        let items = rows
            .into_iter()
            .map(|row| row.into_record(&self.key))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page {
            items,
            page: query.page.page,
            size: query.page.size,
            total: u64::try_from(total).unwrap_or(0),
        })
    }

    fn update(&self, record: &HistoryRecord) -> Result<bool, StorageError> {
        let n = self.conn()?.execute(
            "UPDATE history SET need_review = ?2, approved = ?3, approved_at = ?4, \
             approved_by = ?5, updated_at = ?6 WHERE id = ?1",
            params![
                record.id,
                record.need_review,
                record.approved.map(ApprovalStatus::as_str),
                record.approved_at.map(|t| t.timestamp_millis()),
                record.approved_by,
                record.updated_at.timestamp_millis(),
            ],
        )?;
        Ok(n > 0)
    }

    fn delete(&self, id: &str) -> Result<bool, StorageError> {
        let n = self
            .conn()?
            .execute("DELETE FROM history WHERE id = ?1", params![id])?;
        Ok(n > 0)
    }

    fn label_counts(&self, filter: &HistoryFilter) -> Result<Vec<(Label, u64)>, StorageError> {
        let (clause, args) = where_clause(filter);
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT classifier, COUNT(*) FROM history{} GROUP BY classifier",
            clause
        ))?;
        let rows = stmt
            .query_map(params_from_iter(args.iter()), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut counts = rows
            .into_iter()
            .map(|(label, n)| {
                let label: Label = label.parse().map_err(|e: UnknownLabel| {
                    StorageError::Corrupt {
                        id: "<aggregate>".to_string(),
                        reason: e.to_string(),
                    }
                })?;
                Ok((label, u64::try_from(n).unwrap_or(0)))
            })
            .collect::<Result<Vec<_>, StorageError>>()?;
        counts.sort_by_key(|(label, _)| *label);
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::history::PageRequest;

    fn record(id: &str, submitter: &str, label: Label, created_ms: i64) -> HistoryRecord {
        let at = from_millis(created_ms).unwrap();
        HistoryRecord {
            id: id.to_string(),
            submitter_id: submitter.to_string(),
            submitter_role: Role::User,
            original_url: format!("http://{}.example.com/?token=secret", id),
            detection: label.is_detection(),
            classifier: label,
            need_review: false,
            approved: None,
            approved_at: None,
            approved_by: None,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn url_is_not_stored_in_clear() {
        let store = SqliteHistoryStore::open_in_memory(b"test-secret").unwrap();
        store.insert_many(&[record("r1", "u1", Label::Phishing, 1_000)]).unwrap();
        let raw: String = store
            .conn()
            .unwrap()
            .query_row("SELECT url_enc FROM history WHERE id = 'r1'", [], |r| r.get(0))
            .unwrap();
        assert!(!raw.contains("token=secret"));
        assert_eq!(
            store.get("r1").unwrap().unwrap().original_url,
            "http://r1.example.com/?token=secret"
        );
    }

    #[test]
    fn wrong_secret_reports_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.db");
        SqliteHistoryStore::open(&path, b"right")
            .unwrap()
            .insert_many(&[record("r1", "u1", Label::Benign, 1_000)])
            .unwrap();
        let other = SqliteHistoryStore::open(&path, b"wrong").unwrap();
        assert!(matches!(other.get("r1"), Err(StorageError::Corrupt { .. })));
    }

    #[test]
    fn unreadable_payloads_are_typed() {
        let key = derive_key(b"k");
        assert!(matches!(decrypt(&key, "not base64!"), Err(SealError::Encoding(_))));
        assert!(matches!(decrypt(&key, &BASE64.encode([0u8; 4])), Err(SealError::Truncated)));
        let sealed = encrypt(&derive_key(b"other"), b"http://a.com").unwrap();
        assert!(matches!(decrypt(&key, &sealed), Err(SealError::Authentication)));
        assert_eq!(decrypt(&derive_key(b"other"), &sealed).unwrap(), b"http://a.com");
    }

    #[test]
    fn unknown_stored_role_is_corruption() {
        let store = SqliteHistoryStore::open_in_memory(b"s").unwrap();
        store.insert_many(&[record("r1", "u1", Label::Benign, 1_000)]).unwrap();
        store
            .conn()
            .unwrap()
            .execute("UPDATE history SET submitter_role = 'root' WHERE id = 'r1'", [])
            .unwrap();
        match store.get("r1") {
            Err(StorageError::Corrupt { id, reason }) => {
                assert_eq!(id, "r1");
                assert_eq!(reason, "unknown role `root`");
            }
            other => panic!("unexpected {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn insert_many_is_atomic() {
        let store = SqliteHistoryStore::open_in_memory(b"s").unwrap();
        let dup = record("same", "u1", Label::Benign, 1_000);
        assert!(store.insert_many(&[dup.clone(), dup]).is_err());
        let page = store.find(&HistoryQuery::default()).unwrap();
        assert_eq!(page.total, 0);
    }

    #[test]
    fn find_filters_and_paginates() {
        let store = SqliteHistoryStore::open_in_memory(b"s").unwrap();
        let records: Vec<_> = (0..5)
            .map(|i| {
                let label = if i % 2 == 0 { Label::Benign } else { Label::Malware };
                record(&format!("r{}", i), if i < 4 { "u1" } else { "u2" }, label, 1_000 * i)
            })
            .collect();
        store.insert_many(&records).unwrap();

        let mut q = HistoryQuery::default();
        q.filter.submitter_id = Some("u1".into());
        q.page = PageRequest::new(2, 3).unwrap();
        let page = store.find(&q).unwrap();
        assert_eq!(page.total, 4);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].id, "r3");

        let mut q = HistoryQuery::default();
        q.filter.classifier = Some(Label::Benign);
        q.filter.created_from = from_millis(1_000);
        q.filter.created_to = from_millis(4_000);
        let ids: Vec<_> = store.find(&q).unwrap().items.into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["r2", "r4"]);
    }

    #[test]
    fn update_and_sort_by_approval() {
        let store = SqliteHistoryStore::open_in_memory(b"s").unwrap();
        store
            .insert_many(&[
                record("a", "u1", Label::Benign, 1_000),
                record("b", "u1", Label::Phishing, 2_000),
            ])
            .unwrap();
        for (id, approved_ms) in [("a", 9_000), ("b", 5_000)] {
            let mut r = store.get(id).unwrap().unwrap();
            r.need_review = true;
            r.approved = Some(ApprovalStatus::Approved);
            r.approved_at = from_millis(approved_ms);
            r.approved_by = Some("admin".into());
            assert!(store.update(&r).unwrap());
        }

        let mut q = HistoryQuery::default();
        q.filter.need_review = Some(true);
        q.filter.approved = Some(ApprovalStatus::Approved);
        q.sort = SortOrder::ApprovedAtDesc;
        let ids: Vec<_> = store.find(&q).unwrap().items.into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["a", "b"]);

        let mut ghost = record("ghost", "u1", Label::Benign, 0);
        ghost.need_review = true;
        assert!(!store.update(&ghost).unwrap());
    }

    #[test]
    fn delete_and_label_counts() {
        let store = SqliteHistoryStore::open_in_memory(b"s").unwrap();
        store
            .insert_many(&[
                record("a", "u1", Label::Phishing, 1),
                record("b", "u1", Label::Benign, 2),
                record("c", "u2", Label::Phishing, 3),
            ])
            .unwrap();
        assert_eq!(
            store.label_counts(&HistoryFilter::default()).unwrap(),
            vec![(Label::Benign, 1), (Label::Phishing, 2)]
        );
        assert!(store.delete("c").unwrap());
        assert!(!store.delete("c").unwrap());
        let mut f = HistoryFilter::default();
        f.submitter_id = Some("u1".into());
        assert_eq!(
            store.label_counts(&f).unwrap(),
            vec![(Label::Benign, 1), (Label::Phishing, 1)]
        );
    }
}
