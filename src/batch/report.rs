//! Aggregated outcome of one batch run.

use crate::response::Usage;
use crate::types::Message;

/// Outcome for one successfully completed work item.
#[derive(Debug, Clone)]
pub struct BatchEntry {
    /// Conversation snapshot including the appended assistant reply.
    pub payload: Vec<Message>,
    /// Token usage of the final response. Absent for entries restored from
    /// the checkpoint, whose responses were accounted in an earlier run.
    pub usage: Option<Usage>,
    /// Whether this entry came from the checkpoint instead of a request
    /// made during this run.
    pub resumed: bool,
}

/// Input-ordered result of a batch run.
///
/// `entries[i]` corresponds to `work_items[i]` regardless of completion
/// order; `None` marks an item whose attempt budget was exhausted. Failed
/// items are reported here, never as an error from the driver.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub entries: Vec<Option<BatchEntry>>,
    /// Number of work items dispatched (requested) during this run.
    pub dispatched: usize,
}

impl BatchReport {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn success_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_some()).count()
    }

    pub fn failure_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_none()).count()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failure_count() == 0
    }

    /// Indices whose attempts were exhausted.
    pub fn failed_indices(&self) -> Vec<usize> {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.is_none().then_some(i))
            .collect()
    }

    /// Summed token usage over everything completed in this run.
    pub fn total_usage(&self) -> Usage {
        self.entries
            .iter()
            .flatten()
            .filter_map(|e| e.usage.as_ref())
            .fold(Usage::default(), |acc, u| acc.add(u))
    }
}
