//! Prompt Construction
//!
//! Builds the system instruction and the per-batch user prompt sent to the
//! completion endpoint.
//!
//! ## Size controls
//!
//! 1. Batches over `DEDUP_THRESHOLD` records keep one record per distinct path
//! 2. Large JSON request bodies are shallow-truncated
//! 3. Collapsed repeat calls are annotated instead of repeated

use std::collections::HashSet;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

use crate::constants::prompt as prompt_constants;
use crate::types::TrafficRecord;

const SYSTEM_PROMPT: &str = "You are an API documentation expert. You receive:
1. The user's description of the scenario they performed
2. A time-ordered list of HTTP request/response records captured from real traffic

Your task:
1. Analyse the call chain: what each API does and the order it is called in
2. Document every distinct endpoint:
   - method, path, purpose, tag grouping
   - path/query/body parameters (name, type, required, meaning)
   - response fields, including nested structures
   - an example request and response based on the (already redacted) data
3. Describe the scenario call chain: which API is called first, why, and how data flows between calls
4. When the same API is called several times with different parameters, document it once and list every parameter combination
5. Output strictly the JSON shape shown in the example. Output JSON only, never wrapped in a markdown code block

Type inference rules:
- UUID-formatted string -> string (uuid)
- ISO 8601 timestamp -> string (datetime)
- integer literal -> integer
- decimal literal -> number
- true/false -> boolean
- array -> array, with the element type noted

Keep field names exactly as they appear in the traffic.
Output JSON only, no markdown code block.";

const OUTPUT_EXAMPLE: &str = r#"## Output example (format reference only)
{
  "scenario": "List users",
  "call_chain": [
    {"seq": 1, "method": "GET", "path": "/api/v1/users", "description": "Fetch the user list", "depends_on": null}
  ],
  "endpoints": [
    {
      "method": "GET",
      "path": "/api/v1/users",
      "summary": "Fetch the user list",
      "tags": ["Users"],
      "description": "Paged query over all users",
      "query_params": [{"name": "page", "type": "integer", "required": false, "description": "Page number"}],
      "responses": [
        {
          "status_code": 200,
          "content_type": "application/json",
          "description": "User list returned",
          "fields": [
            {"name": "total", "type": "integer", "required": true, "description": "Total count"},
            {"name": "items", "type": "array", "required": true, "description": "Users", "children": [
              {"name": "id", "type": "string (uuid)", "required": true, "description": "User ID"}
            ]}
          ]
        }
      ]
    }
  ]
}

Analyse the traffic above and produce the complete API documentation for this scenario."#;

/// Record as presented to the model
#[derive(Debug, Serialize)]
struct PromptRecord<'a> {
    seq: u32,
    method: &'a str,
    path: &'a str,
    query_params: &'a std::collections::BTreeMap<String, Vec<String>>,
    request_headers: &'a std::collections::BTreeMap<String, String>,
    request_body: String,
    content_type: &'a str,
    status_code: u16,
    response_headers: &'a std::collections::BTreeMap<String, String>,
    response_body: &'a str,
    response_content_type: &'a str,
    call_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    note: Option<String>,
}

/// Static system instruction
pub fn system_prompt() -> &'static str {
    SYSTEM_PROMPT
}

/// User prompt for one batch
pub fn user_prompt(scenario: &str, records: &[TrafficRecord]) -> String {
    let selected = select_records(records);

    let prompt_records: Vec<PromptRecord<'_>> = selected
        .iter()
        .map(|r| PromptRecord {
            seq: r.seq,
            method: &r.method,
            path: &r.path,
            query_params: &r.query_params,
            request_headers: &r.request_headers,
            request_body: shrink_body(&r.request_body),
            content_type: &r.content_type,
            status_code: r.status_code,
            response_headers: &r.response_headers,
            response_body: &r.response_body,
            response_content_type: &r.response_content_type,
            call_count: r.call_count,
            note: (r.effective_call_count() > 1)
                .then(|| format!("This API was called {} times", r.call_count)),
        })
        .collect();

    let records_json = serde_json::to_string_pretty(&prompt_records).unwrap_or_else(|e| {
        warn!("Failed to render prompt records: {}", e);
        "[]".to_string()
    });

    format!(
        "## Scenario\n{}\n\n## API call records ({} total, in time order)\n{}\n\n{}",
        scenario,
        prompt_records.len(),
        records_json,
        OUTPUT_EXAMPLE
    )
}

/// Large batches keep only the first record per path
fn select_records(records: &[TrafficRecord]) -> Vec<&TrafficRecord> {
    if records.len() <= prompt_constants::DEDUP_THRESHOLD {
        return records.iter().collect();
    }

    let mut seen = HashSet::new();
    records
        .iter()
        .filter(|r| seen.insert(r.path.as_str()))
        .collect()
}

fn shrink_body(body: &str) -> String {
    if body.len() > prompt_constants::MAX_BODY_BYTES
        && let Some(truncated) = truncate_json_body(body)
    {
        return truncated;
    }
    body.to_string()
}

/// Replace nested values and long strings of a JSON object body.
///
/// Returns `None` when the body is not a JSON object.
fn truncate_json_body(body: &str) -> Option<String> {
    let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) else {
        return None;
    };

    let truncated: Map<String, Value> = map
        .into_iter()
        .map(|(key, value)| {
            let keep = match &value {
                Value::Object(_) | Value::Array(_) => false,
                Value::String(s) => s.len() <= prompt_constants::MAX_STRING_BYTES,
                _ => true,
            };
            if keep {
                (key, value)
            } else {
                (key, Value::String(prompt_constants::TRUNCATED.to_string()))
            }
        })
        .collect();

    serde_json::to_string(&truncated).ok()
}
