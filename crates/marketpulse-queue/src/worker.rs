//! Worker — the polling loop that claims and executes action items.
//!
//! Multiple worker processes may share one store; each is stateless
//! between polling cycles except for its identity string. Coordination
//! happens entirely through the store's conditional claim update.

use std::future::Future;

use chrono::{Duration, Utc};
use rand::Rng;

use marketpulse_core::config::{QueueConfig, WorkerConfig};
use marketpulse_core::error::Result;

use crate::dispatch::Dispatcher;
use crate::store::ActionStore;

/// A single worker process.
pub struct Worker {
    store: ActionStore,
    dispatcher: Dispatcher,
    worker_id: String,
    poll_interval_secs: u64,
    poll_jitter_secs: u64,
    batch_limit: usize,
    orphan_max_age: Duration,
}

impl Worker {
    pub fn new(
        store: ActionStore,
        dispatcher: Dispatcher,
        worker_cfg: &WorkerConfig,
        queue_cfg: &QueueConfig,
    ) -> Self {
        Self {
            store,
            dispatcher,
            worker_id: generate_worker_id(),
            poll_interval_secs: worker_cfg.poll_interval_secs,
            poll_jitter_secs: worker_cfg.poll_jitter_secs,
            batch_limit: worker_cfg.batch_limit,
            orphan_max_age: Duration::hours(queue_cfg.orphan_age_hours as i64),
        }
    }

    /// This worker's identity string, as written into `claimed_by`.
    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    pub fn store(&self) -> &ActionStore {
        &self.store
    }

    /// Run continuously until `shutdown` resolves.
    ///
    /// Orphan recovery runs once before the first poll and again every
    /// hour. Shutdown is graceful: no new claims are taken, the in-flight
    /// action finishes and finalizes, then the loop exits.
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> Result<()> {
        tracing::info!(
            worker_id = %self.worker_id,
            poll_secs = self.poll_interval_secs,
            "Worker started"
        );
        self.recover_orphans()?;
        let mut last_sweep = Utc::now();

        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(self.poll_interval_secs.max(1)));
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!(worker_id = %self.worker_id, "Shutdown requested, draining in-flight work");
                    break;
                }
                _ = interval.tick() => {
                    // Jitter desynchronizes workers polling one store.
                    if self.poll_jitter_secs > 0 {
                        let jitter = rand::thread_rng().gen_range(0..=self.poll_jitter_secs * 1000);
                        tokio::time::sleep(std::time::Duration::from_millis(jitter)).await;
                    }

                    // Hourly sweep catches leases orphaned during normal
                    // operation, not only at process boundaries.
                    if Utc::now() - last_sweep >= Duration::hours(1) {
                        self.recover_orphans()?;
                        last_sweep = Utc::now();
                    }

                    let processed = self.process_batch().await?;
                    if processed > 0 {
                        tracing::debug!(worker_id = %self.worker_id, processed, "Polling cycle done");
                    }
                }
            }
        }
        Ok(())
    }

    /// Process everything currently eligible, then stop.
    pub async fn drain(&self) -> Result<usize> {
        self.recover_orphans()?;
        let mut total = 0;
        loop {
            let processed = self.process_batch().await?;
            if processed == 0 {
                return Ok(total);
            }
            total += processed;
        }
    }

    /// Reclaim leases older than the configured staleness window.
    pub fn recover_orphans(&self) -> Result<usize> {
        self.store.reset_stuck(self.orphan_max_age, Utc::now())
    }

    /// One polling cycle: query, claim, execute. Returns the number of
    /// actions this worker actually executed (lost claim races are
    /// skipped silently).
    async fn process_batch(&self) -> Result<usize> {
        let now = Utc::now();
        let ready = self.store.ready_actions(now, self.batch_limit)?;
        let mut processed = 0;
        for candidate in ready {
            if !self.store.claim(&candidate.action_id, &self.worker_id, now)? {
                // Another worker has it.
                continue;
            }
            // Re-read so the dispatcher sees the claimed row.
            let Some(action) = self.store.get(&candidate.action_id)? else {
                continue;
            };
            self.dispatcher.execute_claimed(&self.store, &action).await?;
            processed += 1;
        }
        Ok(processed)
    }
}

/// Worker identity: hostname, pid, and a short random suffix so two
/// workers on one host never collide.
fn generate_worker_id() -> String {
    let host = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown-host".to_string());
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{host}-{}-{}", std::process::id(), &suffix[..8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{ActionItem, ActionStatus, ActionType, NewAction, Priority};
    use crate::dispatch::{ActionHandler, HandlerRegistry};
    use crate::retry::RetryPolicy;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct OkHandler;
    #[async_trait]
    impl ActionHandler for OkHandler {
        async fn execute(&self, _: &ActionItem) -> std::result::Result<serde_json::Value, String> {
            Ok(serde_json::json!({"ok": true}))
        }
    }

    fn make_worker(dir: &tempfile::TempDir) -> Worker {
        let store = ActionStore::open(&dir.path().join("actions.db")).unwrap();
        let mut registry = HandlerRegistry::new();
        for t in [
            ActionType::Research,
            ActionType::DataFetch,
            ActionType::NewsScan,
            ActionType::Calculation,
            ActionType::Monitoring,
            ActionType::CodeTask,
        ] {
            registry.register(t, Arc::new(OkHandler));
        }
        Worker::new(
            store,
            Dispatcher::new(registry, RetryPolicy::default()),
            &WorkerConfig::default(),
            &QueueConfig::default(),
        )
    }

    #[test]
    fn test_worker_id_shape() {
        let id = generate_worker_id();
        assert!(id.split('-').count() >= 3);
        assert_ne!(generate_worker_id(), generate_worker_id());
    }

    #[tokio::test]
    async fn test_drain_processes_all_eligible() {
        let dir = tempfile::tempdir().unwrap();
        let worker = make_worker(&dir);
        for i in 0..3 {
            worker
                .store()
                .insert(
                    &NewAction::new(
                        ActionType::Research,
                        Priority::Medium,
                        &format!("t{i}"),
                        "no date",
                    ),
                    Utc::now(),
                )
                .unwrap();
        }

        assert_eq!(worker.drain().await.unwrap(), 3);
        // Nothing left on a second pass.
        assert_eq!(worker.drain().await.unwrap(), 0);

        let health = worker.store().queue_counts(Utc::now()).unwrap();
        assert_eq!(health.ready_now, 0);
    }

    #[tokio::test]
    async fn test_drain_skips_items_claimed_elsewhere() {
        let dir = tempfile::tempdir().unwrap();
        let worker = make_worker(&dir);
        let store = worker.store();
        let a = NewAction::new(ActionType::DataFetch, Priority::High, "mine", "no date");
        let b = NewAction::new(ActionType::DataFetch, Priority::High, "theirs", "no date");
        store.insert(&a, Utc::now()).unwrap();
        store.insert(&b, Utc::now()).unwrap();
        assert!(store.claim(&b.action_id, "other-worker", Utc::now()).unwrap());

        assert_eq!(worker.drain().await.unwrap(), 1);
        let mine = store.get(&a.action_id).unwrap().unwrap();
        assert_eq!(mine.status, ActionStatus::Completed);
        let theirs = store.get(&b.action_id).unwrap().unwrap();
        assert_eq!(theirs.status, ActionStatus::InProgress);
        assert_eq!(theirs.claimed_by.as_deref(), Some("other-worker"));
    }

    #[tokio::test]
    async fn test_run_exits_on_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let store = ActionStore::open(&dir.path().join("actions.db")).unwrap();
        let worker = Worker::new(
            store,
            Dispatcher::new(HandlerRegistry::new(), RetryPolicy::default()),
            &WorkerConfig {
                poll_interval_secs: 1,
                poll_jitter_secs: 0,
                batch_limit: 10,
            },
            &QueueConfig::default(),
        );
        // Resolves immediately: the loop must stop without hanging.
        worker.run(async {}).await.unwrap();
    }
}
