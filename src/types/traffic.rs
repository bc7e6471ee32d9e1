//! Captured traffic records
//!
//! A `TrafficRecord` is one request/response pair produced by the upstream
//! parser and filter. The pipeline only reads them.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One captured request/response pair
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrafficRecord {
    /// Position in capture order
    pub seq: u32,
    pub timestamp: DateTime<Utc>,
    pub method: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub host: String,
    pub path: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub query_params: BTreeMap<String, Vec<String>>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub request_headers: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub request_body: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub content_type: String,
    pub status_code: u16,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub response_headers: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub response_body: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub response_content_type: String,
    pub latency_ms: u64,
    /// Number of equivalent requests collapsed into this record upstream
    #[serde(skip_serializing_if = "is_zero")]
    pub call_count: u32,
}

fn is_zero(n: &u32) -> bool {
    *n == 0
}

impl TrafficRecord {
    /// Minimal record, mostly useful for tests and fixtures
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            status_code: 200,
            ..Default::default()
        }
    }

    pub fn with_seq(mut self, seq: u32) -> Self {
        self.seq = seq;
        self
    }

    pub fn with_response_body(mut self, body: impl Into<String>) -> Self {
        self.response_body = body.into();
        self
    }

    pub fn with_request_body(mut self, body: impl Into<String>) -> Self {
        self.request_body = body.into();
        self
    }

    pub fn with_call_count(mut self, count: u32) -> Self {
        self.call_count = count;
        self
    }

    /// Call count with the upstream "unset means once" convention applied
    pub fn effective_call_count(&self) -> u32 {
        self.call_count.max(1)
    }
}
