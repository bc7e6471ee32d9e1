//! Batch Splitter
//!
//! Partitions traffic records into batches that fit the model's token budget.
//!
//! ## Algorithm
//! 1. Group records by path prefix (first three segments), keeping the order
//!    in which each group is first seen
//! 2. Pack whole groups greedily; a group that would overflow the current
//!    batch closes it and opens a new one
//! 3. A group larger than the budget on its own becomes a dedicated batch;
//!    groups are never split and never dropped

use serde::Serialize;

use crate::ai::tokenizer::{estimate_records, should_batch};
use crate::constants::batching as batch_constants;
use crate::types::TrafficRecord;

/// A contiguous unit of records sent to the model in one request
#[derive(Debug, Clone, Serialize)]
pub struct Batch {
    /// Zero-based position, also the cache key within a session
    pub index: usize,
    /// Shared path prefix, `"mixed"`, or `"empty"`
    pub key: String,
    pub records: Vec<TrafficRecord>,
    pub estimated_tokens: usize,
}

impl Batch {
    fn new(index: usize, records: Vec<TrafficRecord>) -> Self {
        let key = batch_key(&records);
        let estimated_tokens = estimate_records(&records);
        Self {
            index,
            key,
            records,
            estimated_tokens,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Group key of a request path: `/api/v1/users/42` -> `/api/v1/users`.
///
/// Surrounding slashes are ignored; an empty path maps to `/`.
pub fn path_prefix(path: &str) -> String {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        return batch_constants::ROOT_KEY.to_string();
    }

    let segments: Vec<&str> = trimmed
        .split('/')
        .take(batch_constants::PREFIX_SEGMENTS)
        .collect();
    format!("/{}", segments.join("/"))
}

/// Label for a batch: its single shared prefix, `"mixed"`, or `"empty"`
pub fn batch_key(records: &[TrafficRecord]) -> String {
    let Some(first) = records.first() else {
        return batch_constants::EMPTY_KEY.to_string();
    };

    let key = path_prefix(&first.path);
    if records[1..].iter().all(|r| path_prefix(&r.path) == key) {
        key
    } else {
        batch_constants::MIXED_KEY.to_string()
    }
}

/// Split `records` into token-bounded batches.
///
/// A zero budget yields the whole input as one batch; empty input yields none.
pub fn split_batches(records: &[TrafficRecord], max_tokens: usize) -> Vec<Batch> {
    if records.is_empty() {
        return Vec::new();
    }
    if max_tokens == 0 {
        return vec![Batch::new(0, records.to_vec())];
    }

    let mut batches: Vec<Vec<TrafficRecord>> = Vec::new();
    let mut current: Vec<TrafficRecord> = Vec::new();
    let mut current_tokens = 0usize;

    for group in group_by_prefix(records) {
        let group_tokens = estimate_records(&group);

        if !current.is_empty() && current_tokens + group_tokens > max_tokens {
            batches.push(std::mem::take(&mut current));
            current_tokens = 0;
        }

        if current.is_empty() && group_tokens > max_tokens {
            // Oversized group stands alone
            batches.push(group);
            continue;
        }

        current.extend(group);
        current_tokens += group_tokens;
    }

    if !current.is_empty() {
        batches.push(current);
    }

    batches
        .into_iter()
        .enumerate()
        .map(|(index, records)| Batch::new(index, records))
        .collect()
}

/// Batches for one generation run.
///
/// Splits only when the whole input exceeds the budget; otherwise, including
/// for empty input, the run gets a single batch at index 0.
pub fn plan_batches(records: &[TrafficRecord], max_tokens: usize) -> Vec<Batch> {
    if should_batch(records, max_tokens) {
        split_batches(records, max_tokens)
    } else {
        vec![Batch::new(0, records.to_vec())]
    }
}

/// Groups in first-seen order, records within a group in input order
fn group_by_prefix(records: &[TrafficRecord]) -> Vec<Vec<TrafficRecord>> {
    let mut keys: Vec<String> = Vec::new();
    let mut groups: Vec<Vec<TrafficRecord>> = Vec::new();

    for record in records {
        let key = path_prefix(&record.path);
        match keys.iter().position(|k| *k == key) {
            Some(idx) => groups[idx].push(record.clone()),
            None => {
                keys.push(key);
                groups.push(vec![record.clone()]);
            }
        }
    }

    groups
}
