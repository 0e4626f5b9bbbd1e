//! Checkpointed batch processing for chat completions.
//!
//! The driver enumerates a list of independent conversations, skips the ones
//! already recorded in the checkpoint, and schedules the rest onto a
//! semaphore-bounded pool of retry-wrapped request units. Each success is
//! appended to the checkpoint (writes serialized behind a mutex) before the
//! item reports back, so an interrupted run can be re-invoked with the same
//! arguments and only the unfinished items are requested again.
//!
//! Completion order is whatever response latency dictates; the final
//! [`BatchReport`] is always in input order, with `None` marking items whose
//! attempt budget was exhausted. Per-item failure never fails the batch.
//!
//! ```rust,no_run
//! use convoy::{run_batch, BatchOptions, ChatClient, ClientConfig, Message};
//! use std::sync::Arc;
//!
//! # async fn demo() -> convoy::Result<()> {
//! let client = Arc::new(ChatClient::new(ClientConfig::new("gpt-4o-mini"))?);
//! let work: Vec<Vec<Message>> = vec![
//!     vec![Message::user("What is 2 + 2?")],
//!     vec![Message::user("Name a prime number.")],
//! ];
//! let report = run_batch(
//!     client,
//!     work,
//!     "answers.jsonl",
//!     BatchOptions::new().with_concurrency(8).with_max_attempts(3),
//! )
//! .await?;
//! println!("{}/{} succeeded", report.success_count(), report.len());
//! # Ok(())
//! # }
//! ```

mod driver;
mod report;

pub use driver::{run_batch, BatchDriver, BatchOptions};
pub use report::{BatchEntry, BatchReport};
