//! Correlation store: request id → requester, with expiry

pub mod kv;
pub mod traits;

pub use kv::KvCorrelationStore;
pub use traits::CorrelationStore;

#[cfg(test)]
pub(crate) mod mock;

/// Store key for a request id, or `None` when the id cannot be a key.
///
/// Request ids arrive on the inbound log from an external engine, so they are
/// checked against the KV key alphabet instead of being trusted.
pub(crate) fn mapping_key(request_id: &str) -> Option<String> {
    let valid = !request_id.is_empty()
        && request_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '='));
    valid.then(|| format!("mapping.{}", request_id))
}
