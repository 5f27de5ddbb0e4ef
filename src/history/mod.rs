//! Device-local read history and session preferences.
//!
//! Tracking is best-effort: storage failures are logged and degrade to
//! "nothing stored" so they never get in the way of reading comics.

pub mod delimited;
pub mod storage;

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storage::KeyValueStorage;

pub const READ_STATUS_KEY: &str = "xkcd-read-status";
pub const SESSION_KEY: &str = "xkcd-session-data";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadRecord {
    pub first_read: DateTime<Utc>,
    pub last_read: DateTime<Utc>,
}

/// Small preferences kept apart from the read history, so that importing or
/// clearing history never touches them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionState {
    pub last_viewed: Option<u32>,
    pub incognito: bool,
    pub show_alt_text: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            last_viewed: None,
            incognito: true,
            show_alt_text: true,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub skipped: usize,
}

/// Handle to the persisted history. Cheap to clone; clones share storage.
#[derive(Clone)]
pub struct ReadHistoryStore {
    storage: Arc<dyn KeyValueStorage>,
}

impl ReadHistoryStore {
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        Self { storage }
    }

    pub fn get_all(&self) -> BTreeMap<u32, ReadRecord> {
        self.load(READ_STATUS_KEY).unwrap_or_default()
    }

    pub fn get(&self, id: u32) -> Option<ReadRecord> {
        self.get_all().get(&id).copied()
    }

    pub fn mark_read(&self, id: u32) {
        self.mark_read_at(id, Utc::now());
    }

    /// Upserts the record for `id` and remembers it as the last viewed comic.
    pub fn mark_read_at(&self, id: u32, now: DateTime<Utc>) {
        let mut records = self.get_all();
        records
            .entry(id)
            .and_modify(|record| {
                record.last_read = now;
                // A clock that went backwards must not break first <= last.
                if record.first_read > now {
                    record.first_read = now;
                }
            })
            .or_insert(ReadRecord {
                first_read: now,
                last_read: now,
            });
        self.save(READ_STATUS_KEY, &records);

        let mut session = self.session();
        session.last_viewed = Some(id);
        self.save(SESSION_KEY, &session);
    }

    pub fn mark_unread(&self, id: u32) {
        let mut records = self.get_all();
        if records.remove(&id).is_some() {
            self.save(READ_STATUS_KEY, &records);
        }
    }

    /// Drops every read record. Session preferences are kept.
    pub fn clear_all(&self) {
        if let Err(err) = self.storage.remove(READ_STATUS_KEY) {
            tracing::warn!(%err, "failed to clear read history");
        }
    }

    pub fn export_delimited(&self, separator: char) -> String {
        delimited::render(&self.get_all(), separator)
    }

    /// Merges rows from an exported file.
    ///
    /// Unknown ids are inserted as-is. For known ids only a strictly later
    /// `last_read` is taken; `first_read` is never overwritten.
    pub fn import_delimited(&self, text: &str) -> ImportSummary {
        let parsed = delimited::parse(text);
        let mut summary = ImportSummary {
            skipped: parsed.skipped,
            ..ImportSummary::default()
        };

        let mut records = self.get_all();
        for row in parsed.rows {
            match records.get_mut(&row.id) {
                Some(existing) if row.record.last_read > existing.last_read => {
                    existing.last_read = row.record.last_read;
                    summary.updated += 1;
                }
                Some(_) => summary.unchanged += 1,
                None => {
                    records.insert(row.id, row.record);
                    summary.inserted += 1;
                }
            }
        }

        if summary.inserted + summary.updated > 0 {
            self.save(READ_STATUS_KEY, &records);
        }
        tracing::info!(?summary, "imported read history");
        summary
    }

    pub fn session(&self) -> SessionState {
        self.load(SESSION_KEY).unwrap_or_default()
    }

    pub fn last_viewed(&self) -> Option<u32> {
        self.session().last_viewed
    }

    pub fn incognito(&self) -> bool {
        self.session().incognito
    }

    pub fn set_incognito(&self, enabled: bool) {
        let mut session = self.session();
        session.incognito = enabled;
        self.save(SESSION_KEY, &session);
    }

    pub fn show_alt_text(&self) -> bool {
        self.session().show_alt_text
    }

    pub fn set_show_alt_text(&self, show: bool) {
        let mut session = self.session();
        session.show_alt_text = show;
        self.save(SESSION_KEY, &session);
    }

    fn load<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.storage.get(key) {
            Ok(raw) => raw?,
            Err(err) => {
                tracing::warn!(key, %err, "storage read failed; treating as empty");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(key, %err, "stored value is unreadable; treating as empty");
                None
            }
        }
    }

    fn save<T: Serialize>(&self, key: &str, value: &T) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(err) => {
                tracing::warn!(key, %err, "failed to serialize stored value");
                return;
            }
        };
        if let Err(err) = self.storage.set(key, &raw) {
            tracing::warn!(key, %err, "storage write failed");
        }
    }
}
