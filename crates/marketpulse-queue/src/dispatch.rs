//! Execution dispatch — maps claimed action items to handlers and
//! records every outcome.
//!
//! Handlers are supplied by the embedding application; the dispatcher
//! only knows the closed capability set. Every caught handler error goes
//! through retry classification and lands in `last_error` — nothing is
//! swallowed.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};

use marketpulse_core::error::Result;

use crate::actions::{ActionItem, ActionType, ExecutionLogEntry};
use crate::retry::{RetryDecision, RetryPolicy};
use crate::store::ActionStore;

/// One callable per action type. `Err` carries a human-readable message
/// that feeds both `last_error` and quota classification.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn execute(&self, action: &ActionItem) -> std::result::Result<serde_json::Value, String>;
}

/// Fixed registry: action type → handler.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<ActionType, Arc<dyn ActionHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the handler for one action type, replacing any previous one.
    pub fn register(&mut self, action_type: ActionType, handler: Arc<dyn ActionHandler>) {
        self.handlers.insert(action_type, handler);
    }

    pub fn get(&self, action_type: ActionType) -> Option<Arc<dyn ActionHandler>> {
        self.handlers.get(&action_type).cloned()
    }
}

/// How one dispatch attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    /// Re-queued; the action's next eligibility is `delay` from now.
    Retrying { delay: Duration, counted: bool },
    Failed,
}

/// Executes claimed action items and finalizes their state.
pub struct Dispatcher {
    registry: HandlerRegistry,
    policy: RetryPolicy,
}

impl Dispatcher {
    pub fn new(registry: HandlerRegistry, policy: RetryPolicy) -> Self {
        Self { registry, policy }
    }

    /// Execute one claimed action item and finalize it.
    ///
    /// The caller must hold the claim (`status = in_progress`). Wall-clock
    /// duration is measured and an audit entry written regardless of
    /// outcome; the claim lease is always released through one of the
    /// finalize paths.
    pub async fn execute_claimed(&self, store: &ActionStore, action: &ActionItem) -> Result<Outcome> {
        let handler = match self.registry.get(action.action_type) {
            Some(h) => h,
            None => {
                // A missing handler cannot be fixed by retrying.
                let msg = format!("no handler registered for '{}'", action.action_type);
                tracing::error!(action_id = %action.action_id, "{msg}");
                self.log_attempt(store, action, false, 0, Some(&msg))?;
                self.finalize_failed(store, action, &msg)?;
                return Ok(Outcome::Failed);
            }
        };

        tracing::info!(
            action_id = %action.action_id,
            action_type = %action.action_type,
            priority = %action.priority,
            "Executing '{}'",
            action.title
        );
        let started = std::time::Instant::now();
        let result = handler.execute(action).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(output) => {
                self.log_attempt(store, action, true, duration_ms, None)?;
                if !store.complete(&action.action_id, &output, Utc::now())? {
                    tracing::warn!(
                        action_id = %action.action_id,
                        "Completion hit zero rows; claim was reclaimed mid-flight"
                    );
                }
                tracing::info!(action_id = %action.action_id, duration_ms, "Completed");
                Ok(Outcome::Completed)
            }
            Err(error) => {
                self.log_attempt(store, action, false, duration_ms, Some(&error))?;
                match self.policy.decide(&error, action.retry_count) {
                    RetryDecision::Retry {
                        delay,
                        count_attempt,
                    } => {
                        let next = Utc::now() + delay;
                        if !store.retry_later(&action.action_id, &error, next, count_attempt)? {
                            tracing::warn!(
                                action_id = %action.action_id,
                                "Retry release hit zero rows; claim was reclaimed mid-flight"
                            );
                        }
                        tracing::warn!(
                            action_id = %action.action_id,
                            delay_secs = delay.num_seconds(),
                            counted = count_attempt,
                            "Attempt failed, retrying: {error}"
                        );
                        Ok(Outcome::Retrying {
                            delay,
                            counted: count_attempt,
                        })
                    }
                    RetryDecision::Fail => {
                        self.finalize_failed(store, action, &error)?;
                        Ok(Outcome::Failed)
                    }
                }
            }
        }
    }

    fn finalize_failed(&self, store: &ActionStore, action: &ActionItem, error: &str) -> Result<()> {
        if !store.fail(&action.action_id, error, Utc::now())? {
            tracing::warn!(
                action_id = %action.action_id,
                "Failure finalize hit zero rows; claim was reclaimed mid-flight"
            );
        }
        tracing::error!(
            action_id = %action.action_id,
            retry_count = action.retry_count,
            "Permanently failed: {error}"
        );
        Ok(())
    }

    fn log_attempt(
        &self,
        store: &ActionStore,
        action: &ActionItem,
        succeeded: bool,
        duration_ms: u64,
        error: Option<&str>,
    ) -> Result<()> {
        store.record_execution(&ExecutionLogEntry {
            action_id: action.action_id.clone(),
            succeeded,
            duration_ms,
            error_message: error.map(str::to_string),
            executed_at: Utc::now(),
        })
    }
}
