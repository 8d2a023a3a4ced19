use crate::oid::OidParseError;

/// Errors detected while compiling a record schema into an OID tree.
///
/// These are returned by [`SchemaWalker::new`](crate::SchemaWalker::new); a
/// failed schema is never cached.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// A field carries an OID annotation that does not parse.
    #[error("field '{field}' has an unparseable OID annotation: {source}")]
    BadAnnotation {
        field: String,
        #[source]
        source: OidParseError,
    },

    /// An absolute (leading-dot) annotation appeared on a field of a nested
    /// record. Absolute paths are only meaningful on the top-level record.
    #[error("field '{field}' uses an absolute OID annotation inside a nested record")]
    AbsoluteInNested { field: String },

    /// The record graph contains a cycle; introspection would not terminate.
    #[error("record type '{type_name}' appears in a cycle in the schema graph")]
    RecursiveSchema { type_name: &'static str },
}

/// Errors surfaced by [`SchemaWalker::query`](crate::SchemaWalker::query).
///
/// Per-PDU anomalies (unknown OIDs, tag/type mismatches, malformed rows) are
/// logged and skipped instead; a single misbehaving row must not abandon the
/// rest of the table.
#[derive(Debug, thiserror::Error)]
pub enum WalkError {
    /// The walker's record has already been filled by a previous query.
    #[error("record has already been filled")]
    AlreadyFilled,

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Transport-level failures (connect, BulkWalk).
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("transport is not connected")]
    NotConnected,

    #[error("invalid BulkWalk root '{root}': {reason}")]
    BadRoot { root: String, reason: String },

    #[error("SNMP client error: {0}")]
    Client(String),
}
