//! Known users and per-day upload counts.
//!
//! In-memory ledger with an optional JSON snapshot file, rewritten after each
//! change and loaded at startup. Losing it is harmless; it only feeds the
//! admin commands and broadcasts.
//!
//! Snapshots are cloned under the ledger lock and written on the blocking pool
//! after it is released. A revision counter keeps an older snapshot from
//! overwriting a newer one.

use std::{
    collections::{BTreeMap, HashMap},
    path::{Path, PathBuf},
    sync::atomic::{AtomicU64, Ordering},
};

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::{domain::UserId, Result};

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
struct UserRecord {
    username: Option<String>,
    last_seen: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct LedgerData {
    users: BTreeMap<i64, UserRecord>,
    /// date (YYYY-MM-DD) -> user id -> uploads
    uploads: BTreeMap<String, BTreeMap<i64, u64>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TopUser {
    pub user_id: UserId,
    pub username: Option<String>,
    pub uploads: u64,
}

pub struct UsageLedger {
    path: Option<PathBuf>,
    data: Mutex<LedgerData>,
    /// Bumped under the `data` lock for every staged snapshot.
    revision: AtomicU64,
    /// Revision last written to disk; also serializes writers.
    saved: Mutex<u64>,
}

pub fn day_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub fn today_key() -> String {
    day_key(Utc::now().date_naive())
}

impl UsageLedger {
    pub fn in_memory() -> Self {
        Self {
            path: None,
            data: Mutex::new(LedgerData::default()),
            revision: AtomicU64::new(0),
            saved: Mutex::new(0),
        }
    }

    /// Load the snapshot at `path` if it exists; later changes are written back there.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let data = load_ledger_file(&path)?.unwrap_or_default();
        Ok(Self {
            path: Some(path),
            data: Mutex::new(data),
            revision: AtomicU64::new(0),
            saved: Mutex::new(0),
        })
    }

    /// Record that a user interacted with the bot. Returns `true` for a first contact.
    ///
    /// Only a new user or a changed username is written to disk; `last_seen`
    /// alone stays in memory until the next persisted change.
    pub async fn touch_user(&self, user: UserId, username: Option<&str>) -> bool {
        let mut data = self.data.lock().await;
        let now = Utc::now().to_rfc3339();
        let (is_new, changed) = match data.users.get_mut(&user.0) {
            Some(record) => {
                record.last_seen = now;
                let renamed = record.username.as_deref() != username;
                if renamed {
                    record.username = username.map(str::to_string);
                }
                (false, renamed)
            }
            None => {
                data.users.insert(
                    user.0,
                    UserRecord {
                        username: username.map(str::to_string),
                        last_seen: now,
                    },
                );
                (true, true)
            }
        };

        let staged = if changed { self.stage(&data) } else { None };
        drop(data);
        if let Some((rev, snapshot)) = staged {
            self.persist(rev, snapshot).await;
        }
        is_new
    }

    pub async fn record_upload(&self, user: UserId, username: Option<&str>, day: &str) {
        let mut data = self.data.lock().await;
        *data
            .uploads
            .entry(day.to_string())
            .or_default()
            .entry(user.0)
            .or_insert(0) += 1;
        let entry = data.users.entry(user.0).or_default();
        if username.is_some() {
            entry.username = username.map(str::to_string);
        }
        if entry.last_seen.is_empty() {
            entry.last_seen = Utc::now().to_rfc3339();
        }

        let staged = self.stage(&data);
        drop(data);
        if let Some((rev, snapshot)) = staged {
            self.persist(rev, snapshot).await;
        }
    }

    pub async fn uploads_on(&self, day: &str) -> u64 {
        let data = self.data.lock().await;
        data.uploads
            .get(day)
            .map(|per_user| per_user.values().sum())
            .unwrap_or(0)
    }

    /// Users ordered by total uploads (desc), ties by user id.
    pub async fn top_users(&self, limit: usize) -> Vec<TopUser> {
        let data = self.data.lock().await;
        let mut totals: HashMap<i64, u64> = HashMap::new();
        for per_user in data.uploads.values() {
            for (uid, n) in per_user {
                *totals.entry(*uid).or_insert(0) += n;
            }
        }

        let mut out: Vec<TopUser> = totals
            .into_iter()
            .map(|(uid, uploads)| TopUser {
                user_id: UserId(uid),
                username: data.users.get(&uid).and_then(|u| u.username.clone()),
                uploads,
            })
            .collect();
        out.sort_by(|a, b| b.uploads.cmp(&a.uploads).then(a.user_id.cmp(&b.user_id)));
        out.truncate(limit);
        out
    }

    pub async fn user_count(&self) -> usize {
        self.data.lock().await.users.len()
    }

    pub async fn user_ids(&self) -> Vec<UserId> {
        self.data.lock().await.users.keys().map(|id| UserId(*id)).collect()
    }

    /// Must be called with the `data` lock held. `None` when there is no file.
    fn stage(&self, data: &LedgerData) -> Option<(u64, LedgerData)> {
        self.path.as_ref()?;
        let rev = self.revision.fetch_add(1, Ordering::SeqCst) + 1;
        Some((rev, data.clone()))
    }

    async fn persist(&self, rev: u64, snapshot: LedgerData) {
        let Some(path) = self.path.clone() else {
            return;
        };

        let mut saved = self.saved.lock().await;
        if *saved >= rev {
            return;
        }
        let target = path.clone();
        match tokio::task::spawn_blocking(move || save_ledger_file(&target, &snapshot)).await {
            Ok(Ok(())) => *saved = rev,
            Ok(Err(e)) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to save usage ledger");
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "usage ledger writer panicked");
            }
        }
    }
}

fn load_ledger_file(path: &Path) -> Result<Option<LedgerData>> {
    if !path.exists() {
        return Ok(None);
    }
    let txt = std::fs::read_to_string(path)?;
    if txt.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(&txt)?))
}

fn save_ledger_file(path: &Path, data: &LedgerData) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, serde_json::to_vec_pretty(data)?)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn counts_uploads_per_day() {
        let ledger = UsageLedger::in_memory();
        ledger.record_upload(UserId(1), Some("a"), "2026-01-01").await;
        ledger.record_upload(UserId(1), Some("a"), "2026-01-01").await;
        ledger.record_upload(UserId(2), None, "2026-01-01").await;
        ledger.record_upload(UserId(2), None, "2026-01-02").await;

        assert_eq!(ledger.uploads_on("2026-01-01").await, 3);
        assert_eq!(ledger.uploads_on("2026-01-02").await, 1);
        assert_eq!(ledger.uploads_on("2026-01-03").await, 0);
    }

    #[tokio::test]
    async fn top_users_sorted_by_total() {
        let ledger = UsageLedger::in_memory();
        for _ in 0..3 {
            ledger.record_upload(UserId(2), Some("two"), "2026-01-01").await;
        }
        ledger.record_upload(UserId(1), Some("one"), "2026-01-01").await;
        ledger.record_upload(UserId(3), None, "2026-01-02").await;

        let top = ledger.top_users(2).await;
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].user_id, UserId(2));
        assert_eq!(top[0].uploads, 3);
        assert_eq!(top[0].username.as_deref(), Some("two"));
        // Tie on 1 upload: lower id first.
        assert_eq!(top[1].user_id, UserId(1));
    }

    #[tokio::test]
    async fn touch_user_reports_first_contact() {
        let ledger = UsageLedger::in_memory();
        assert!(ledger.touch_user(UserId(5), Some("x")).await);
        assert!(!ledger.touch_user(UserId(5), Some("y")).await);
        assert_eq!(ledger.user_count().await, 1);
        assert_eq!(ledger.user_ids().await, vec![UserId(5)]);
    }

    #[tokio::test]
    async fn snapshot_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("usage.json");
        {
            let ledger = UsageLedger::open(&path).unwrap();
            ledger.touch_user(UserId(9), Some("nine")).await;
            ledger.record_upload(UserId(9), Some("nine"), "2026-03-04").await;
        }
        let ledger = UsageLedger::open(&path).unwrap();
        assert_eq!(ledger.user_count().await, 1);
        assert_eq!(ledger.uploads_on("2026-03-04").await, 1);
    }

    #[tokio::test]
    async fn repeat_contact_does_not_rewrite_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("usage.json");
        let ledger = UsageLedger::open(&path).unwrap();

        assert!(ledger.touch_user(UserId(3), Some("three")).await);
        assert!(path.exists());

        std::fs::remove_file(&path).unwrap();
        assert!(!ledger.touch_user(UserId(3), Some("three")).await);
        assert!(!path.exists());

        ledger.touch_user(UserId(3), Some("renamed")).await;
        let reopened = UsageLedger::open(&path).unwrap();
        reopened.record_upload(UserId(3), None, "2026-05-06").await;
        let top = reopened.top_users(1).await;
        assert_eq!(top[0].username.as_deref(), Some("renamed"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_uploads_all_reach_the_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("usage.json");
        let ledger = std::sync::Arc::new(UsageLedger::open(&path).unwrap());

        let mut handles = Vec::new();
        for i in 0..20i64 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move {
                ledger.record_upload(UserId(i % 4), None, "2026-07-08").await;
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let reopened = UsageLedger::open(&path).unwrap();
        assert_eq!(reopened.uploads_on("2026-07-08").await, 20);
        assert_eq!(reopened.user_count().await, 4);
    }

    #[test]
    fn day_key_format() {
        let d = NaiveDate::from_ymd_opt(2026, 2, 3).unwrap();
        assert_eq!(day_key(d), "2026-02-03");
    }
}
