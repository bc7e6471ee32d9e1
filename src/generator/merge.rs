//! Merge per-batch documents into one

use std::collections::HashSet;

use crate::types::GeneratedDocument;

/// Combine batch documents in batch order.
///
/// - scenario: first non-empty one
/// - endpoints: first occurrence per `METHOD path` (method case-insensitive)
/// - call chain: taken from the last document, even when that chain is empty
///
/// `None` entries (failed batches) are skipped.
pub fn merge_documents<'a, I>(documents: I) -> GeneratedDocument
where
    I: IntoIterator<Item = Option<&'a GeneratedDocument>>,
{
    let mut merged = GeneratedDocument::default();
    let mut seen: HashSet<String> = HashSet::new();

    for doc in documents.into_iter().flatten() {
        if merged.scenario.is_empty() {
            merged.scenario = doc.scenario.clone();
        }

        for endpoint in &doc.endpoints {
            if seen.insert(endpoint.identity()) {
                merged.endpoints.push(endpoint.clone());
            }
        }

        merged.call_chain = doc.call_chain.clone();
    }

    merged
}
