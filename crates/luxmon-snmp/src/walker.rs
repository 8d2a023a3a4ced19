//! The walker: owns a record for the duration of one query, asks the schema
//! tree for its BulkWalk roots, and routes every returned PDU back into the
//! record.

use std::any::Any;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::coerce;
use crate::error::{SchemaError, WalkError};
use crate::oid::{common_prefix_len, Oid};
use crate::pdu::Pdu;
use crate::schema::{schema_tree, MibRecord, NodeAccess, TableKey, TableKeyKind};
use crate::transport::SnmpTransport;
use crate::tree::OidTree;

/// Populates one record of type `R` from a single SNMP query.
///
/// The schema tree is compiled (and cached process-wide) when the walker is
/// created; [`query`](Self::query) may be called at most once per walker.
/// Walkers for different hosts run concurrently without coordination, each
/// holding its own record.
pub struct SchemaWalker<R: MibRecord> {
    tree: Arc<OidTree>,
    record: Mutex<R>,
    filled: AtomicBool,
}

impl<R: MibRecord> SchemaWalker<R> {
    /// Compiles (or fetches the cached) schema tree for `R` and takes
    /// ownership of the record to fill.
    pub fn new(record: R) -> Result<Self, SchemaError> {
        Ok(Self {
            tree: schema_tree::<R>()?,
            record: Mutex::new(record),
            filled: AtomicBool::new(false),
        })
    }

    /// Runs the query: connects, BulkWalks every root prefix of the schema
    /// tree and dispatches each PDU into the record. The first transport
    /// error aborts the remaining walks; the transport is closed on every
    /// exit path past a successful connect.
    ///
    /// A second call fails with [`WalkError::AlreadyFilled`] without touching
    /// the transport; of two racing callers exactly one proceeds.
    pub async fn query<T: SnmpTransport + ?Sized>(
        &self,
        transport: &mut T,
    ) -> Result<(), WalkError> {
        if self
            .filled
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(WalkError::AlreadyFilled);
        }

        // Uncontended: the compare-exchange above admits one caller ever.
        let mut record = self.record.lock().await;

        transport.connect().await?;

        let mut result = Ok(());
        for root in self.tree.prefix_paths() {
            let rec = &mut *record;
            let tree = &*self.tree;
            let mut on_pdu = move |pdu: &Pdu| dispatch(tree, &mut *rec, pdu);
            if let Err(err) = transport.bulk_walk(&root, &mut on_pdu).await {
                result = Err(err);
                break;
            }
        }
        transport.close().await;

        result.map_err(WalkError::from)
    }

    /// Hands the (populated) record back.
    pub fn into_record(self) -> R {
        self.record.into_inner()
    }

    /// Human-readable dump of the BulkWalk root set and the compiled tree.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "BulkWalk queries:");
        for path in self.tree.prefix_paths() {
            let _ = writeln!(out, "- {path}");
        }
        let _ = writeln!(out);
        let _ = writeln!(out, "OID tree:");
        let _ = write!(out, "{}", self.tree);
        out
    }
}

/// Routes one PDU through the schema tree into the record.
///
/// Anomalies at this level (unparseable names, unknown OIDs under a walked
/// subtree, rows with too few key arcs, trailing arcs beyond a scalar) are
/// logged and skipped so that one bad row never abandons the rest of the
/// walk.
pub(crate) fn dispatch(tree: &OidTree, record: &mut dyn Any, pdu: &Pdu) {
    let path: Oid = match pdu.name.parse() {
        Ok(path) => path,
        Err(err) => {
            tracing::warn!(name = %pdu.name, %err, "unparseable PDU name, skipping");
            return;
        }
    };

    let mut node = tree;
    let mut remainder: &[u32] = path.arcs();
    let mut target: &mut dyn Any = record;

    loop {
        if let Some(binding) = node.binding() {
            match &binding.access {
                NodeAccess::Project(project) => {
                    target = match project(target) {
                        Some(next) => next,
                        None => {
                            tracing::error!(
                                field = %binding.qualified_name,
                                "schema accessor does not match record layout"
                            );
                            return;
                        }
                    };
                }

                NodeAccess::Rows {
                    entry,
                    key,
                    key_arity,
                } => {
                    if remainder.len() < *key_arity {
                        tracing::error!(
                            field = %binding.qualified_name,
                            oid = %path,
                            key_arity,
                            "not enough trailing arcs for a table row key"
                        );
                        return;
                    }
                    let split = remainder.len() - key_arity;
                    let row_key = match key {
                        // Arity is pinned to 1 for unsigned keys at schema
                        // construction.
                        TableKeyKind::UInt => TableKey::UInt(remainder[split]),
                        TableKeyKind::Text => TableKey::Text(join_arcs(&remainder[split..])),
                    };
                    remainder = &remainder[..split];
                    target = match entry(target, &row_key) {
                        Some(row) => row,
                        None => {
                            tracing::error!(
                                field = %binding.qualified_name,
                                oid = %path,
                                "table accessor does not match record layout"
                            );
                            return;
                        }
                    };
                }

                NodeAccess::Assign(setter) => {
                    let common = common_prefix_len(node.prefix().arcs(), remainder);
                    if common == node.prefix().len() && common == remainder.len() {
                        coerce::assign(setter, pdu, target, &binding.qualified_name);
                    } else {
                        tracing::debug!(
                            field = %binding.qualified_name,
                            oid = %path,
                            "scalar field with trailing arcs, ignoring PDU"
                        );
                    }
                    return;
                }
            }
        }

        let (next, rest) = node.find_next(remainder);
        match next {
            // A step that ends on the current node has nothing left to
            // consume; bail instead of spinning.
            Some(n) if !std::ptr::eq(n, node) => {
                node = n;
                remainder = rest;
            }
            _ => return,
        }
    }
}

fn join_arcs(arcs: &[u32]) -> String {
    let mut out = String::new();
    for (i, arc) in arcs.iter().enumerate() {
        if i > 0 {
            out.push('.');
        }
        let _ = write!(out, "{arc}");
    }
    out
}
