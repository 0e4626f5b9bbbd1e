//! Core type definitions shared across the crate.

pub mod message;

pub use message::{FunctionCall, Message, ToolCall};
