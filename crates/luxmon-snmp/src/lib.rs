//! luxmon-snmp: schema-driven SNMP BulkWalk engine.
//!
//! A record type describes itself as a tree of annotated fields
//! ([`MibRecord`]); that description is compiled once into an OID prefix tree
//! and cached per type. A [`SchemaWalker`] then derives the minimal set of
//! BulkWalk roots from the tree, runs them against a [`SnmpTransport`], and
//! routes every returned PDU back into the right field, creating table rows
//! on the fly for suffix-catching (table) nodes.
//!
//! ```text
//! MibRecord::fields() → OidTree (cached per type) → prefix_paths()
//!                                   ↑                     ↓
//!                            dispatch(pdu)  ←  transport BulkWalks
//! ```
//!
//! The SNMP wire protocol itself lives behind the transport trait; the only
//! type it surfaces is the [`Pdu`].

mod coerce;
pub mod error;
pub mod oid;
pub mod pdu;
pub mod schema;
pub mod transport;
pub mod tree;
pub mod walker;

#[cfg(test)]
mod tests;

pub use error::{SchemaError, TransportError, WalkError};
pub use oid::{common_prefix_len, Oid, OidParseError};
pub use pdu::{Pdu, PduValue};
pub use schema::{schema_tree, FieldSpec, MibRecord, TableKey, TableKeyKind};
pub use transport::{Snmp2cTransport, SnmpTransport};
pub use tree::{NodeKind, OidTree};
pub use walker::SchemaWalker;

#[cfg(any(test, feature = "testing"))]
pub use transport::MockTransport;
