//! Generated API documentation model
//!
//! The shape the model is asked to emit. Decoding is lenient: missing fields
//! fall back to their defaults, and so do explicit `null`s, so partial
//! answers still produce a document.

use serde::{Deserialize, Deserializer, Serialize};

/// Decode `null` as the field's default value
fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// The documentation produced for one batch, or the merged result of a run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratedDocument {
    #[serde(deserialize_with = "null_default")]
    pub scenario: String,
    #[serde(deserialize_with = "null_default")]
    pub call_chain: Vec<ChainStep>,
    #[serde(deserialize_with = "null_default")]
    pub endpoints: Vec<Endpoint>,
}

impl GeneratedDocument {
    /// Decode model output into a document
    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }
}

/// One step in the scenario call chain
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainStep {
    #[serde(deserialize_with = "null_default")]
    pub seq: u32,
    #[serde(deserialize_with = "null_default")]
    pub method: String,
    #[serde(deserialize_with = "null_default")]
    pub path: String,
    #[serde(deserialize_with = "null_default")]
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<u32>,
}

/// One documented endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoint {
    #[serde(deserialize_with = "null_default")]
    pub method: String,
    #[serde(deserialize_with = "null_default")]
    pub path: String,
    #[serde(deserialize_with = "null_default")]
    pub summary: String,
    #[serde(skip_serializing_if = "Vec::is_empty", deserialize_with = "null_default")]
    pub tags: Vec<String>,
    #[serde(deserialize_with = "null_default")]
    pub description: String,
    #[serde(skip_serializing_if = "Vec::is_empty", deserialize_with = "null_default")]
    pub path_params: Vec<Param>,
    #[serde(skip_serializing_if = "Vec::is_empty", deserialize_with = "null_default")]
    pub query_params: Vec<Param>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_body: Option<BodySchema>,
    #[serde(deserialize_with = "null_default")]
    pub responses: Vec<ResponseSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example: Option<Example>,
}

impl Endpoint {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            ..Default::default()
        }
    }

    /// Merge identity: uppercase method plus exact path
    pub fn identity(&self) -> String {
        format!("{} {}", self.method.to_uppercase(), self.path)
    }
}

/// A parameter or field; object and array shapes nest through `children`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Param {
    #[serde(deserialize_with = "null_default")]
    pub name: String,
    #[serde(rename = "type", deserialize_with = "null_default")]
    pub param_type: String,
    #[serde(deserialize_with = "null_default")]
    pub required: bool,
    #[serde(deserialize_with = "null_default")]
    pub description: String,
    #[serde(skip_serializing_if = "Vec::is_empty", deserialize_with = "null_default")]
    pub children: Vec<Param>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BodySchema {
    #[serde(deserialize_with = "null_default")]
    pub content_type: String,
    #[serde(deserialize_with = "null_default")]
    pub fields: Vec<Param>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseSpec {
    #[serde(deserialize_with = "null_default")]
    pub status_code: u16,
    #[serde(skip_serializing_if = "String::is_empty", deserialize_with = "null_default")]
    pub content_type: String,
    #[serde(deserialize_with = "null_default")]
    pub description: String,
    #[serde(skip_serializing_if = "Vec::is_empty", deserialize_with = "null_default")]
    pub fields: Vec<Param>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Example {
    #[serde(deserialize_with = "null_default")]
    pub request: String,
    #[serde(deserialize_with = "null_default")]
    pub response: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_partial_document() {
        let doc =
            GeneratedDocument::from_json(r#"{"scenario":"s","endpoints":[{"method":"GET","path":"/a"}]}"#)
                .unwrap();
        assert_eq!(doc.scenario, "s");
        assert!(doc.call_chain.is_empty());
        assert_eq!(doc.endpoints.len(), 1);
        assert!(doc.endpoints[0].responses.is_empty());
    }

    #[test]
    fn test_decode_null_fields_as_defaults() {
        let raw = r#"{"scenario":"s","call_chain":null,"endpoints":[{"method":"GET","path":"/a",
            "tags":null,"description":null,"path_params":null,"responses":null,
            "request_body":{"content_type":null,"fields":null}}]}"#;
        let doc = GeneratedDocument::from_json(raw).unwrap();
        assert!(doc.call_chain.is_empty());
        let endpoint = &doc.endpoints[0];
        assert!(endpoint.tags.is_empty());
        assert_eq!(endpoint.description, "");
        assert!(endpoint.path_params.is_empty());
        assert!(endpoint.responses.is_empty());
        assert_eq!(endpoint.request_body, Some(BodySchema::default()));
        assert_eq!(endpoint.identity(), "GET /a");
    }

    #[test]
    fn test_decode_nested_params() {
        let raw = r#"{
            "scenario": "list users",
            "call_chain": [{"seq": 1, "method": "GET", "path": "/users", "description": "list", "depends_on": null}],
            "endpoints": [{
                "method": "get",
                "path": "/users",
                "responses": [{
                    "status_code": 200,
                    "description": "ok",
                    "fields": [{"name": "items", "type": "array", "required": true, "description": "",
                                "children": [{"name": "id", "type": "string (uuid)", "required": true, "description": ""}]}]
                }]
            }]
        }"#;
        let doc = GeneratedDocument::from_json(raw).unwrap();
        let field = &doc.endpoints[0].responses[0].fields[0];
        assert_eq!(field.param_type, "array");
        assert_eq!(field.children[0].name, "id");
        assert_eq!(doc.call_chain[0].depends_on, None);
        assert_eq!(doc.endpoints[0].identity(), "GET /users");
    }

    #[test]
    fn test_decode_rejects_non_object() {
        assert!(GeneratedDocument::from_json("not json").is_err());
        assert!(GeneratedDocument::from_json("[1,2]").is_err());
    }
}
