//! SQLite-backed action store.
//!
//! One database file shared by every worker process. All cross-worker
//! coordination happens through conditional UPDATEs whose WHERE clause
//! re-checks eligibility at write time — a compare-and-swap on the row,
//! never a read-then-write pair. WAL mode plus a busy timeout keep
//! concurrent processes from tripping over each other at the file level.

use std::path::Path;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rusqlite::params;

use marketpulse_core::error::{PulseError, Result};

use crate::actions::{
    ActionItem, ActionStatus, ActionType, ExecutionLogEntry, NewAction, Priority,
};
use crate::dates;
use crate::health::{ExecutionStats, QueueCounts};

/// An in-progress row claimed longer ago than this counts as "stuck"
/// in health snapshots. Orphan recovery uses its own, longer window.
const STUCK_AFTER_HOURS: i64 = 1;

/// SQLite-backed persistence for action items and the execution log.
pub struct ActionStore {
    conn: rusqlite::Connection,
}

impl ActionStore {
    /// Open or create the action database.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = rusqlite::Connection::open(path).map_err(db_err)?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    /// Run migrations to create tables and set pragmas.
    fn migrate(&self) -> Result<()> {
        self.conn
            .pragma_update(None, "journal_mode", "WAL")
            .map_err(db_err)?;
        self.conn
            .busy_timeout(std::time::Duration::from_millis(5000))
            .map_err(db_err)?;
        self.conn
            .execute_batch(
                "
            -- Action items (the work queue)
            CREATE TABLE IF NOT EXISTS action_items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                action_id TEXT NOT NULL UNIQUE,
                action_type TEXT NOT NULL,       -- 'research', 'data_fetch', ...
                priority INTEGER NOT NULL,       -- rank: 1=critical .. 4=low
                title TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                source_context TEXT,
                source_report TEXT,
                status TEXT NOT NULL DEFAULT 'pending',
                created_at TEXT NOT NULL,
                scheduled_for TEXT,              -- NULL = eligible immediately
                deadline TEXT NOT NULL,
                retry_count INTEGER NOT NULL DEFAULT 0,
                last_error TEXT,
                claimed_by TEXT,
                claimed_at TEXT,
                result TEXT,                     -- JSON handler output
                completed_at TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_actions_eligible
                ON action_items (status, scheduled_for);

            -- Execution audit log (append-only)
            CREATE TABLE IF NOT EXISTS execution_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                action_id TEXT NOT NULL,
                succeeded INTEGER NOT NULL,
                duration_ms INTEGER NOT NULL,
                error_message TEXT,
                executed_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_log_executed_at
                ON execution_log (executed_at);
         ",
            )
            .map_err(db_err)?;
        Ok(())
    }

    // ─── Insertion ──────────────────────────────────────

    /// Insert a new action item with `status = pending`.
    ///
    /// `scheduled_for` is computed here, once, from the description.
    /// Idempotent on `action_id`: re-registering an existing id refreshes
    /// the descriptive fields but never touches lifecycle state.
    pub fn insert(&self, new: &NewAction, now: DateTime<Utc>) -> Result<ActionItem> {
        let scheduled_for = dates::extract_schedule(&new.description, now);
        let deadline = now + Duration::days(new.priority.deadline_days());

        self.conn
            .execute(
                "INSERT INTO action_items
                 (action_id, action_type, priority, title, description,
                  source_context, source_report, status, created_at, scheduled_for, deadline)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'pending', ?8, ?9, ?10)
                 ON CONFLICT(action_id) DO UPDATE SET
                    title = excluded.title,
                    description = excluded.description,
                    source_context = excluded.source_context,
                    source_report = excluded.source_report",
                params![
                    new.action_id,
                    new.action_type.as_str(),
                    new.priority.rank(),
                    new.title,
                    new.description,
                    new.source_context,
                    new.source_report,
                    ts(now),
                    scheduled_for.map(ts),
                    ts(deadline),
                ],
            )
            .map_err(db_err)?;

        self.get(&new.action_id)?
            .ok_or_else(|| PulseError::UnknownAction(new.action_id.clone()))
    }

    /// Look up one action item by its stable id.
    pub fn get(&self, action_id: &str) -> Result<Option<ActionItem>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {COLUMNS} FROM action_items WHERE action_id = ?1"
            ))
            .map_err(db_err)?;
        let mut rows = stmt
            .query_map([action_id], row_to_action)
            .map_err(db_err)?;
        match rows.next() {
            Some(row) => Ok(Some(row.map_err(db_err)?)),
            None => Ok(None),
        }
    }

    // ─── Scheduler query ──────────────────────────────────────

    /// The next batch of eligible action items, ordered by priority rank,
    /// then eligibility time (immediate before future-dated), then
    /// creation order.
    ///
    /// Read-only — races between concurrently polling workers are
    /// resolved at claim time, not here.
    pub fn ready_actions(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<ActionItem>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {COLUMNS} FROM action_items
                 WHERE status IN ('pending', 'retry')
                   AND (scheduled_for IS NULL OR scheduled_for <= ?1)
                 ORDER BY priority ASC,
                          scheduled_for IS NOT NULL,
                          scheduled_for ASC,
                          created_at ASC
                 LIMIT ?2"
            ))
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![ts(now), limit as i64], row_to_action)
            .map_err(db_err)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(db_err)?);
        }
        Ok(out)
    }

    // ─── Claim / release ──────────────────────────────────────

    /// Atomically claim one action item for a worker.
    ///
    /// A single conditional UPDATE whose predicate re-checks eligibility
    /// at the moment of the write. Returns true iff exactly one row
    /// changed; false means another worker got there first or the item
    /// is no longer eligible — callers treat that as "skip, not an
    /// error".
    pub fn claim(&self, action_id: &str, worker_id: &str, now: DateTime<Utc>) -> Result<bool> {
        let changed = self
            .conn
            .execute(
                "UPDATE action_items
                 SET status = 'in_progress', claimed_by = ?2, claimed_at = ?3
                 WHERE action_id = ?1
                   AND status IN ('pending', 'retry')
                   AND (scheduled_for IS NULL OR scheduled_for <= ?3)",
                params![action_id, worker_id, ts(now)],
            )
            .map_err(db_err)?;
        Ok(changed == 1)
    }

    /// Voluntarily release a claim back to `pending`, recording why.
    pub fn release(&self, action_id: &str, reason: &str) -> Result<bool> {
        let changed = self
            .conn
            .execute(
                "UPDATE action_items
                 SET status = 'pending', claimed_by = NULL, claimed_at = NULL,
                     last_error = ?2
                 WHERE action_id = ?1 AND status = 'in_progress'",
                params![action_id, reason],
            )
            .map_err(db_err)?;
        Ok(changed == 1)
    }

    /// Release a claim into `retry`, scheduling the next attempt.
    ///
    /// `count_attempt` is false for quota-classified errors, which never
    /// advance `retry_count`.
    pub fn retry_later(
        &self,
        action_id: &str,
        error: &str,
        next_attempt: DateTime<Utc>,
        count_attempt: bool,
    ) -> Result<bool> {
        let changed = self
            .conn
            .execute(
                "UPDATE action_items
                 SET status = 'retry', claimed_by = NULL, claimed_at = NULL,
                     last_error = ?2, scheduled_for = ?3,
                     retry_count = retry_count + ?4
                 WHERE action_id = ?1 AND status = 'in_progress'",
                params![action_id, error, ts(next_attempt), count_attempt as i64],
            )
            .map_err(db_err)?;
        Ok(changed == 1)
    }

    /// Finalize a claim as successfully completed.
    pub fn complete(
        &self,
        action_id: &str,
        result: &serde_json::Value,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let changed = self
            .conn
            .execute(
                "UPDATE action_items
                 SET status = 'completed', claimed_by = NULL, claimed_at = NULL,
                     result = ?2, completed_at = ?3
                 WHERE action_id = ?1 AND status = 'in_progress'",
                params![action_id, result.to_string(), ts(now)],
            )
            .map_err(db_err)?;
        Ok(changed == 1)
    }

    /// Finalize a claim as permanently failed.
    pub fn fail(&self, action_id: &str, error: &str, now: DateTime<Utc>) -> Result<bool> {
        let changed = self
            .conn
            .execute(
                "UPDATE action_items
                 SET status = 'failed', claimed_by = NULL, claimed_at = NULL,
                     last_error = ?2, completed_at = ?3
                 WHERE action_id = ?1 AND status = 'in_progress'",
                params![action_id, error, ts(now)],
            )
            .map_err(db_err)?;
        Ok(changed == 1)
    }

    // ─── Orphan recovery ──────────────────────────────────────

    /// Return stale `in_progress` rows to `pending`, clearing the lease
    /// and appending a recovery note to `last_error`.
    ///
    /// Idempotent: with nothing stuck this is a no-op returning 0.
    pub fn reset_stuck(&self, max_age: Duration, now: DateTime<Utc>) -> Result<usize> {
        let cutoff = now - max_age;
        let note = format!("reclaimed stale lease at {}", ts(now));
        let changed = self
            .conn
            .execute(
                "UPDATE action_items
                 SET status = 'pending', claimed_by = NULL, claimed_at = NULL,
                     last_error = CASE
                        WHEN last_error IS NULL THEN ?2
                        ELSE last_error || '; ' || ?2
                     END
                 WHERE status = 'in_progress' AND claimed_at < ?1",
                params![ts(cutoff), note],
            )
            .map_err(db_err)?;
        if changed > 0 {
            tracing::warn!("Orphan recovery returned {changed} stale claim(s) to pending");
        }
        Ok(changed)
    }

    // ─── Execution log ──────────────────────────────────────

    /// Append one audit record. Never updated after insertion.
    pub fn record_execution(&self, entry: &ExecutionLogEntry) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO execution_log
                 (action_id, succeeded, duration_ms, error_message, executed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    entry.action_id,
                    entry.succeeded as i64,
                    entry.duration_ms as i64,
                    entry.error_message,
                    ts(entry.executed_at),
                ],
            )
            .map_err(db_err)?;
        Ok(())
    }

    /// Most recent execution attempts, newest first.
    pub fn recent_executions(&self, limit: usize) -> Result<Vec<ExecutionLogEntry>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT action_id, succeeded, duration_ms, error_message, executed_at
                 FROM execution_log ORDER BY id DESC LIMIT ?1",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map([limit as i64], |row| {
                Ok(ExecutionLogEntry {
                    action_id: row.get(0)?,
                    succeeded: row.get::<_, i64>(1)? != 0,
                    duration_ms: row.get::<_, i64>(2)? as u64,
                    error_message: row.get(3)?,
                    executed_at: parse_ts_col(row, 4)?,
                })
            })
            .map_err(db_err)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(db_err)?);
        }
        Ok(out)
    }

    // ─── Health queries ──────────────────────────────────────

    /// Partition the queue into ready / scheduled-future / stuck counts.
    pub fn queue_counts(&self, now: DateTime<Utc>) -> Result<QueueCounts> {
        let stuck_cutoff = now - Duration::hours(STUCK_AFTER_HOURS);
        self.conn
            .query_row(
                "SELECT
                    COUNT(*) FILTER (WHERE status IN ('pending', 'retry')
                        AND (scheduled_for IS NULL OR scheduled_for <= ?1)),
                    COUNT(*) FILTER (WHERE status IN ('pending', 'retry')
                        AND scheduled_for > ?1),
                    COUNT(*) FILTER (WHERE status = 'in_progress'
                        AND claimed_at < ?2)
                 FROM action_items",
                params![ts(now), ts(stuck_cutoff)],
                |row| {
                    Ok(QueueCounts {
                        ready_now: row.get::<_, i64>(0)? as u64,
                        scheduled_future: row.get::<_, i64>(1)? as u64,
                        stuck_in_progress: row.get::<_, i64>(2)? as u64,
                    })
                },
            )
            .map_err(db_err)
    }

    /// Trailing execution statistics from the audit log.
    pub fn execution_stats_since(&self, since: DateTime<Utc>) -> Result<ExecutionStats> {
        self.conn
            .query_row(
                "SELECT COUNT(*),
                        COALESCE(SUM(succeeded), 0),
                        AVG(duration_ms)
                 FROM execution_log WHERE executed_at >= ?1",
                params![ts(since)],
                |row| {
                    Ok(ExecutionStats {
                        attempts: row.get::<_, i64>(0)? as u64,
                        successes: row.get::<_, i64>(1)? as u64,
                        avg_duration_ms: row.get::<_, Option<f64>>(2)?,
                    })
                },
            )
            .map_err(db_err)
    }
}

/// Column list shared by every `SELECT` that materializes an ActionItem.
const COLUMNS: &str = "action_id, action_type, priority, title, description, \
    source_context, source_report, status, created_at, scheduled_for, deadline, \
    retry_count, last_error, claimed_by, claimed_at, result, completed_at";

fn row_to_action(row: &rusqlite::Row<'_>) -> rusqlite::Result<ActionItem> {
    let type_str: String = row.get(1)?;
    let status_str: String = row.get(7)?;
    let result_str: Option<String> = row.get(15)?;
    Ok(ActionItem {
        action_id: row.get(0)?,
        action_type: ActionType::parse(&type_str)
            .ok_or_else(|| bad_column(1, &type_str))?,
        priority: Priority::from_rank(row.get(2)?),
        title: row.get(3)?,
        description: row.get(4)?,
        source_context: row.get(5)?,
        source_report: row.get(6)?,
        status: ActionStatus::parse(&status_str)
            .ok_or_else(|| bad_column(7, &status_str))?,
        created_at: parse_ts_col(row, 8)?,
        scheduled_for: parse_opt_ts_col(row, 9)?,
        deadline: parse_ts_col(row, 10)?,
        retry_count: row.get(11)?,
        last_error: row.get(12)?,
        claimed_by: row.get(13)?,
        claimed_at: parse_opt_ts_col(row, 14)?,
        result: result_str.and_then(|s| serde_json::from_str(&s).ok()),
        completed_at: parse_opt_ts_col(row, 16)?,
    })
}

/// Uniform timestamp encoding. Fixed precision and a `Z` suffix keep
/// lexicographic TEXT comparison equivalent to chronological order.
fn ts(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

fn parse_ts_col(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let s: String = row.get(idx)?;
    parse_ts(&s).ok_or_else(|| bad_column(idx, &s))
}

fn parse_opt_ts_col(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let s: Option<String> = row.get(idx)?;
    match s {
        Some(s) => Ok(Some(parse_ts(&s).ok_or_else(|| bad_column(idx, &s))?)),
        None => Ok(None),
    }
}

fn bad_column(idx: usize, value: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        rusqlite::types::Type::Text,
        format!("unparseable value '{value}'").into(),
    )
}

fn db_err(e: rusqlite::Error) -> PulseError {
    PulseError::Store(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn open_temp() -> (tempfile::TempDir, ActionStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ActionStore::open(&dir.path().join("actions.db")).unwrap();
        (dir, store)
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap()
    }

    fn sample(id: &str, priority: Priority) -> NewAction {
        NewAction {
            action_id: id.to_string(),
            action_type: ActionType::DataFetch,
            priority,
            title: format!("task {id}"),
            description: "Fetch COT data".into(),
            source_context: None,
            source_report: None,
        }
    }

    #[test]
    fn test_insert_and_get() {
        let (_dir, store) = open_temp();
        let item = store.insert(&sample("a1", Priority::High), now()).unwrap();
        assert_eq!(item.status, ActionStatus::Pending);
        assert_eq!(item.retry_count, 0);
        assert_eq!(item.scheduled_for, None);
        assert!(item.claimed_by.is_none());

        let fetched = store.get("a1").unwrap().unwrap();
        assert_eq!(fetched.title, "task a1");
        assert!(store.get("nope").unwrap().is_none());
    }

    #[test]
    fn test_insert_extracts_schedule_from_description() {
        let (_dir, store) = open_temp();
        let mut new = sample("a1", Priority::Medium);
        new.description = "Recheck CPI revision on 2026-04-01".into();
        let item = store.insert(&new, now()).unwrap();
        assert_eq!(
            item.scheduled_for,
            Some(Utc.with_ymd_and_hms(2026, 4, 1, 9, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_reinsert_is_idempotent_on_lifecycle() {
        let (_dir, store) = open_temp();
        store.insert(&sample("a1", Priority::High), now()).unwrap();
        assert!(store.claim("a1", "w1", now()).unwrap());

        // Re-registration refreshes the title but not the claim state.
        let mut again = sample("a1", Priority::High);
        again.title = "renamed".into();
        let item = store.insert(&again, now()).unwrap();
        assert_eq!(item.title, "renamed");
        assert_eq!(item.status, ActionStatus::InProgress);
        assert_eq!(item.claimed_by.as_deref(), Some("w1"));
    }

    #[test]
    fn test_ready_ordering_by_priority() {
        let (_dir, store) = open_temp();
        store.insert(&sample("low", Priority::Low), now()).unwrap();
        store
            .insert(&sample("crit", Priority::Critical), now())
            .unwrap();
        store.insert(&sample("high", Priority::High), now()).unwrap();

        let ready = store.ready_actions(now(), 10).unwrap();
        let ids: Vec<_> = ready.iter().map(|a| a.action_id.as_str()).collect();
        assert_eq!(ids, ["crit", "high", "low"]);
    }

    #[test]
    fn test_ready_immediate_sorts_before_future_dated() {
        let (_dir, store) = open_temp();
        let t = now();
        let mut dated = sample("dated", Priority::High);
        dated.description = "Run on 2026-03-01".into(); // already elapsed at `t`
        store.insert(&dated, t - Duration::days(5)).unwrap();
        store.insert(&sample("imm", Priority::High), t).unwrap();

        let ready = store.ready_actions(t, 10).unwrap();
        let ids: Vec<_> = ready.iter().map(|a| a.action_id.as_str()).collect();
        assert_eq!(ids, ["imm", "dated"]);
    }

    #[test]
    fn test_future_scheduled_excluded_until_due() {
        let (_dir, store) = open_temp();
        let t = now();
        let mut new = sample("fut", Priority::High);
        new.description = "Check settlement 2026-03-10".into();
        store.insert(&new, t).unwrap();

        assert!(store.ready_actions(t, 10).unwrap().is_empty());
        let later = Utc.with_ymd_and_hms(2026, 3, 10, 9, 0, 0).unwrap();
        assert_eq!(store.ready_actions(later, 10).unwrap().len(), 1);
    }

    #[test]
    fn test_claim_is_exclusive() {
        let (_dir, store) = open_temp();
        store.insert(&sample("a1", Priority::High), now()).unwrap();

        assert!(store.claim("a1", "worker-a", now()).unwrap());
        // Second claim loses the race: zero rows match the predicate.
        assert!(!store.claim("a1", "worker-b", now()).unwrap());

        let item = store.get("a1").unwrap().unwrap();
        assert_eq!(item.status, ActionStatus::InProgress);
        assert_eq!(item.claimed_by.as_deref(), Some("worker-a"));
        assert!(item.claimed_at.is_some());
    }

    #[test]
    fn test_concurrent_claims_one_winner() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("actions.db");
        let store = ActionStore::open(&path).unwrap();
        store.insert(&sample("a1", Priority::High), now()).unwrap();
        drop(store);

        // Distinct worker processes modelled as threads with their own
        // connections to the shared file.
        let mut handles = Vec::new();
        for i in 0..8 {
            let path = path.clone();
            handles.push(std::thread::spawn(move || {
                let store = ActionStore::open(&path).unwrap();
                store.claim("a1", &format!("worker-{i}"), now()).unwrap()
            }));
        }
        let wins: usize = handles
            .into_iter()
            .map(|h| h.join().unwrap() as usize)
            .sum();
        assert_eq!(wins, 1);
    }

    #[test]
    fn test_terminal_rows_are_never_claimable() {
        let (_dir, store) = open_temp();
        store.insert(&sample("a1", Priority::High), now()).unwrap();
        assert!(store.claim("a1", "w1", now()).unwrap());
        assert!(store
            .complete("a1", &serde_json::json!({"rows": 42}), now())
            .unwrap());

        assert!(!store.claim("a1", "w2", now()).unwrap());
        let item = store.get("a1").unwrap().unwrap();
        assert_eq!(item.status, ActionStatus::Completed);
        assert!(item.completed_at.is_some());
        assert_eq!(item.result.unwrap()["rows"], 42);

        // Same for failed rows.
        store.insert(&sample("a2", Priority::High), now()).unwrap();
        assert!(store.claim("a2", "w1", now()).unwrap());
        assert!(store.fail("a2", "bad ticker", now()).unwrap());
        assert!(!store.claim("a2", "w2", now()).unwrap());
    }

    #[test]
    fn test_retry_later_increments_only_when_counted() {
        let (_dir, store) = open_temp();
        store.insert(&sample("a1", Priority::High), now()).unwrap();

        // Quota path: not counted.
        assert!(store.claim("a1", "w1", now()).unwrap());
        let next = now() + Duration::seconds(30);
        assert!(store
            .retry_later("a1", "429: Resource Exhausted", next, false)
            .unwrap());
        let item = store.get("a1").unwrap().unwrap();
        assert_eq!(item.status, ActionStatus::Retry);
        assert_eq!(item.retry_count, 0);
        assert_eq!(item.scheduled_for, Some(next));
        assert!(item.claimed_by.is_none());

        // Task failure: counted.
        assert!(store.claim("a1", "w1", next).unwrap());
        assert!(store
            .retry_later("a1", "bad ticker", next + Duration::seconds(60), true)
            .unwrap());
        assert_eq!(store.get("a1").unwrap().unwrap().retry_count, 1);
    }

    #[test]
    fn test_release_returns_to_pending() {
        let (_dir, store) = open_temp();
        store.insert(&sample("a1", Priority::High), now()).unwrap();
        assert!(store.claim("a1", "w1", now()).unwrap());
        assert!(store.release("a1", "shutting down").unwrap());

        let item = store.get("a1").unwrap().unwrap();
        assert_eq!(item.status, ActionStatus::Pending);
        assert!(item.claimed_by.is_none());
        assert_eq!(item.last_error.as_deref(), Some("shutting down"));

        // Releasing an unclaimed item changes nothing.
        assert!(!store.release("a1", "again").unwrap());
    }

    #[test]
    fn test_orphan_recovery() {
        let (_dir, store) = open_temp();
        let t0 = now();
        store.insert(&sample("a1", Priority::High), t0).unwrap();
        assert!(store.claim("a1", "crashed-worker", t0).unwrap());

        // Within the window: nothing to do.
        let t1 = t0 + Duration::hours(23);
        assert_eq!(store.reset_stuck(Duration::hours(24), t1).unwrap(), 0);

        // Past the window: reclaimed and eligible again.
        let t2 = t0 + Duration::hours(25);
        assert_eq!(store.reset_stuck(Duration::hours(24), t2).unwrap(), 1);
        let item = store.get("a1").unwrap().unwrap();
        assert_eq!(item.status, ActionStatus::Pending);
        assert!(item.claimed_by.is_none());
        assert!(item.last_error.unwrap().contains("reclaimed stale lease"));
        assert_eq!(store.ready_actions(t2, 10).unwrap().len(), 1);

        // Idempotent: nothing left to reclaim.
        assert_eq!(store.reset_stuck(Duration::hours(24), t2).unwrap(), 0);
    }

    #[test]
    fn test_queue_counts_partition() {
        let (_dir, store) = open_temp();
        let t = now();
        store.insert(&sample("ready", Priority::High), t).unwrap();
        let mut fut = sample("future", Priority::Low);
        fut.description = "Revisit on 2026-06-01".into();
        store.insert(&fut, t).unwrap();
        store.insert(&sample("stuck", Priority::Medium), t).unwrap();
        assert!(store.claim("stuck", "w1", t - Duration::hours(2)).unwrap());

        let counts = store.queue_counts(t).unwrap();
        assert_eq!(counts.ready_now, 1);
        assert_eq!(counts.scheduled_future, 1);
        assert_eq!(counts.stuck_in_progress, 1);
    }

    #[test]
    fn test_execution_log_and_stats() {
        let (_dir, store) = open_temp();
        let t = now();
        for (ok, ms) in [(true, 100), (true, 300), (false, 50)] {
            store
                .record_execution(&ExecutionLogEntry {
                    action_id: "a1".into(),
                    succeeded: ok,
                    duration_ms: ms,
                    error_message: (!ok).then(|| "boom".to_string()),
                    executed_at: t,
                })
                .unwrap();
        }
        // Old entry outside the window.
        store
            .record_execution(&ExecutionLogEntry {
                action_id: "a1".into(),
                succeeded: true,
                duration_ms: 999,
                error_message: None,
                executed_at: t - Duration::days(2),
            })
            .unwrap();

        let stats = store.execution_stats_since(t - Duration::hours(24)).unwrap();
        assert_eq!(stats.attempts, 3);
        assert_eq!(stats.successes, 2);
        assert_eq!(stats.avg_duration_ms, Some(150.0));

        let recent = store.recent_executions(2).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].duration_ms, 999);
    }
}
