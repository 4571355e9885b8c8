//! Core types for graphlite

/// A single row returned by the store, keyed by column name.
///
/// The toolkit stores node and edge payloads as JSON blobs, so rows map
/// directly onto JSON objects.
pub type Row = serde_json::Map<String, serde_json::Value>;
