//! # MarketPulse Queue
//!
//! Persistent action-item queue for the MarketPulse pipeline: extracted
//! action items land in a shared SQLite store, worker processes claim
//! them one at a time, execute them through typed handlers, and retry
//! failures with exponential backoff.
//!
//! ## Architecture
//! ```text
//! Worker (tokio interval poll loop)
//!   ├── startup → orphan recovery (reclaim stale leases)
//!   ├── ready_actions() — priority, eligibility, FIFO order
//!   ├── claim() — one conditional UPDATE, at-most-one winner
//!   ├── Dispatcher → handler registry (research, data_fetch, news_scan,
//!   │                calculation, monitoring, code_task)
//!   └── finalize: completed | retry (backoff → scheduled_for) | failed
//!
//! Health Reporter (read-only)
//!   └── queue counts + trailing 24h execution stats
//! ```
//!
//! ## Concurrency model
//! Workers share nothing but the store. Every lifecycle mutation is a
//! single conditional UPDATE whose WHERE clause re-checks the state being
//! left, so two workers racing for one item resolve at the row level:
//! exactly one sees an affected row. Crashed workers are handled by the
//! orphan-recovery sweep, not by any in-memory lock.

pub mod actions;
pub mod dates;
pub mod dispatch;
pub mod health;
pub mod retry;
pub mod store;
pub mod worker;

pub use actions::{ActionItem, ActionStatus, ActionType, ExecutionLogEntry, NewAction, Priority};
pub use dates::extract_schedule;
pub use dispatch::{ActionHandler, Dispatcher, HandlerRegistry, Outcome};
pub use health::{ExecutionStats, QueueCounts, SystemHealth};
pub use retry::{RetryDecision, RetryPolicy};
pub use store::ActionStore;
pub use worker::Worker;
