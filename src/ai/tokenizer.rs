//! Token Estimation
//!
//! Approximates model-token cost of text for batch sizing.
//!
//! ## Strategy
//! - Han ideographs run about 2 characters per token
//! - Everything else runs about 4 characters per token
//! - Each class is rounded up separately, so the estimate never undercounts
//!   a short mixed string

use serde::Serialize;
use tracing::debug;

use crate::types::TrafficRecord;

/// Estimate the token cost of `text`.
///
/// `(han + 1) / 2 + (other + 3) / 4`; empty text costs nothing.
pub fn estimate_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }

    let (han, other) = text.chars().fold((0usize, 0usize), |(han, other), ch| {
        if is_han(ch) {
            (han + 1, other)
        } else {
            (han, other + 1)
        }
    });

    han.div_ceil(2) + other.div_ceil(4)
}

/// Han script membership (CJK ideographs plus ideographic marks)
pub fn is_han(ch: char) -> bool {
    matches!(
        ch as u32,
        0x2E80..=0x2E99
            | 0x2E9B..=0x2EF3
            | 0x2F00..=0x2FD5
            | 0x3005
            | 0x3007
            | 0x3021..=0x3029
            | 0x3038..=0x303B
            | 0x3400..=0x4DBF
            | 0x4E00..=0x9FFF
            | 0xF900..=0xFA6D
            | 0xFA70..=0xFAD9
            | 0x20000..=0x2A6DF
            | 0x2A700..=0x2EBEF
            | 0x2EBF0..=0x2EE5D
            | 0x2F800..=0x2FA1D
            | 0x30000..=0x323AF
    )
}

/// Estimate the JSON serialization of any serializable value.
///
/// Serialization of plain data types does not fail; a failure is logged and
/// counted as zero.
pub fn estimate_json<T: Serialize + ?Sized>(value: &T) -> usize {
    match serde_json::to_string(value) {
        Ok(json) => estimate_tokens(&json),
        Err(e) => {
            debug!("Token estimate skipped, serialization failed: {}", e);
            0
        }
    }
}

/// Estimate a slice of traffic records as they are serialized for the model
pub fn estimate_records(records: &[TrafficRecord]) -> usize {
    estimate_json(records)
}

/// Whether `records` exceed `max_tokens` and therefore need splitting.
///
/// A zero budget means unlimited.
pub fn should_batch(records: &[TrafficRecord], max_tokens: usize) -> bool {
    if max_tokens == 0 {
        return false;
    }
    estimate_records(records) > max_tokens
}
