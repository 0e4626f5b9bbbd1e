//! # convoy
//!
//! Async client toolkit for OpenAI-compatible chat-completion endpoints,
//! built around a checkpointed batch driver: run many independent
//! conversations concurrently, persist every completion to an append-only
//! JSONL log, and resume interrupted runs without repeating finished work.
//!
//! ## Key pieces
//!
//! - **Batch driver**: [`run_batch`] / [`batch::BatchDriver`] dispatch
//!   pending conversations onto a bounded worker pool and aggregate an
//!   input-ordered report. Failed items are reported, not fatal.
//! - **Checkpointing**: [`checkpoint::CheckpointStore`] records one JSON
//!   line per completed conversation; re-running with the same path skips
//!   everything already done.
//! - **Bounded retry**: [`retry::execute`] masks transient failures with a
//!   per-item attempt budget, randomized backoff, and optional per-attempt
//!   timeouts.
//! - **Client**: [`ChatClient`] performs single or streaming completions;
//!   any [`CompletionBackend`] implementation can stand in for it.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use convoy::{run_batch, BatchOptions, ChatClient, ClientConfig, Message};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> convoy::Result<()> {
//!     let config = ClientConfig::new("gpt-4o-mini");
//!     let client = Arc::new(ChatClient::new(config)?);
//!
//!     let work = vec![
//!         vec![Message::user("Summarize the plot of Hamlet in one line.")],
//!         vec![Message::user("What is the capital of Peru?")],
//!     ];
//!
//!     let report = run_batch(
//!         client,
//!         work,
//!         "run.jsonl",
//!         BatchOptions::new().with_concurrency(4).with_max_attempts(3),
//!     )
//!     .await?;
//!
//!     for (i, entry) in report.entries.iter().enumerate() {
//!         match entry {
//!             Some(e) => println!("{i}: {:?}", e.payload.last().and_then(|m| m.content())),
//!             None => println!("{i}: failed"),
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Module organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`batch`] | Checkpointed batch driver and its report types |
//! | [`checkpoint`] | Append-only JSONL completion log |
//! | [`retry`] | Bounded retry with randomized backoff |
//! | [`client`] | Chat client and the [`CompletionBackend`] seam |
//! | [`config`] | Explicit client configuration |
//! | [`transport`] | HTTP plumbing |
//! | [`types`] | Role-tagged message types |
//! | [`response`] | Typed completion response envelope |

pub mod batch;
pub mod checkpoint;
pub mod client;
pub mod config;
pub mod response;
pub mod retry;
pub mod transport;
pub mod types;

// Re-export main types for convenience
pub use batch::{run_batch, BatchDriver, BatchEntry, BatchOptions, BatchReport};
pub use checkpoint::{CheckpointRecord, CheckpointStore};
pub use client::{ChatClient, CompletionBackend};
pub use config::ClientConfig;
pub use response::{ChatResponse, Usage};
pub use retry::RetryPolicy;
pub use types::{Message, ToolCall};

use futures::Stream;
use std::pin::Pin;

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// A pinned, boxed stream of fallible items.
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = Result<T>> + Send + 'a>>;

pub mod error;
pub use error::Error;
