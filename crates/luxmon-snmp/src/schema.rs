//! Schema introspection: compiles a record type's field descriptions into the
//! OID prefix tree consumed by the walker.
//!
//! A record describes itself through [`MibRecord::fields`]: one [`FieldSpec`]
//! per field, carrying the field's OID suffix annotation and a compiled typed
//! accessor. The accessors replace run-time reflection: the tree stores a
//! projection closure for nested records, a row get-or-insert closure for
//! tables, and a typed setter for scalars, all operating on `&mut dyn Any`
//! with checked downcasts.

use std::any::{Any, TypeId};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, OnceLock, RwLock};

use crate::error::SchemaError;
use crate::oid::Oid;
use crate::tree::{NodeKind, OidTree};

/// A composite value the walker can populate from a BulkWalk.
///
/// Field order in [`fields`](Self::fields) is declaration order; each field's
/// annotation is an OID suffix relative to the enclosing record (absolute,
/// leading-dot annotations are allowed on the top-level record only).
pub trait MibRecord: Default + Send + Any {
    fn fields() -> Vec<FieldSpec>;
}

pub(crate) type ProjectFn =
    Box<dyn for<'a> Fn(&'a mut dyn Any) -> Option<&'a mut dyn Any> + Send + Sync>;
pub(crate) type RowFn =
    Box<dyn for<'a> Fn(&'a mut dyn Any, &TableKey) -> Option<&'a mut dyn Any> + Send + Sync>;

/// Row key of a table field, extracted from the trailing arcs of a walked OID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableKey {
    UInt(u32),
    Text(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKeyKind {
    UInt,
    Text,
}

/// Typed scalar setters, one class per declared field type. The closure
/// returns `false` when the target record fails to downcast, which the
/// dispatcher reports as an internal schema/layout mismatch.
pub(crate) enum ScalarSetter {
    Bool(Box<dyn Fn(&mut dyn Any, bool) -> bool + Send + Sync>),
    Int(Box<dyn Fn(&mut dyn Any, i64) -> bool + Send + Sync>),
    Uint(Box<dyn Fn(&mut dyn Any, u64) -> bool + Send + Sync>),
    Text(Box<dyn Fn(&mut dyn Any, String) -> bool + Send + Sync>),
    Bytes(Box<dyn Fn(&mut dyn Any, Vec<u8>) -> bool + Send + Sync>),
    OidValue(Box<dyn Fn(&mut dyn Any, Oid) -> bool + Send + Sync>),
}

impl fmt::Debug for ScalarSetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ScalarSetter").field(&self.kind_name()).finish()
    }
}

impl ScalarSetter {
    pub(crate) fn kind_name(&self) -> &'static str {
        match self {
            ScalarSetter::Bool(_) => "bool",
            ScalarSetter::Int(_) => "{i32, i64}",
            ScalarSetter::Uint(_) => "{u32, u64}",
            ScalarSetter::Text(_) => "String",
            ScalarSetter::Bytes(_) => "Vec<u8>",
            ScalarSetter::OidValue(_) => "Oid",
        }
    }
}

/// What a tree node does when the dispatcher reaches it.
pub(crate) enum NodeAccess {
    /// Simple node: advance the target into a nested record field.
    Project(ProjectFn),
    /// Suffix-catcher: peel `key_arity` trailing arcs off the remainder,
    /// coerce them to the table's key type and get-or-insert the row.
    Rows {
        entry: RowFn,
        key: TableKeyKind,
        key_arity: usize,
    },
    /// Leaf: coerce the PDU value into the scalar field.
    Assign(ScalarSetter),
}

impl fmt::Debug for NodeAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeAccess::Project(_) => f.debug_tuple("Project").finish(),
            NodeAccess::Rows { key, key_arity, .. } => f
                .debug_struct("Rows")
                .field("key", key)
                .field("key_arity", key_arity)
                .finish(),
            NodeAccess::Assign(setter) => f.debug_tuple("Assign").field(setter).finish(),
        }
    }
}

/// Schema entry stored on a tree node: the qualified field name (diagnostics)
/// plus the compiled accessor.
pub(crate) struct FieldBinding {
    pub(crate) qualified_name: String,
    pub(crate) access: NodeAccess,
}

impl fmt::Debug for FieldBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldBinding")
            .field("qualified_name", &self.qualified_name)
            .field("access", &self.access)
            .finish()
    }
}

enum FieldNode {
    Scalar(ScalarSetter),
    Group {
        project: ProjectFn,
        nested_type: TypeId,
        nested_name: &'static str,
        fields: fn() -> Vec<FieldSpec>,
    },
    Table {
        rows: RowFn,
        key: TableKeyKind,
        key_arity: usize,
        row_type: TypeId,
        row_name: &'static str,
        fields: fn() -> Vec<FieldSpec>,
    },
}

/// One field of a record: name, OID suffix annotation, compiled accessor.
pub struct FieldSpec {
    name: &'static str,
    oid: &'static str,
    node: FieldNode,
}

fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}

impl FieldSpec {
    fn scalar(name: &'static str, oid: &'static str, setter: ScalarSetter) -> Self {
        Self {
            name,
            oid,
            node: FieldNode::Scalar(setter),
        }
    }

    pub fn boolean<R: Any>(
        name: &'static str,
        oid: &'static str,
        get: fn(&mut R) -> &mut bool,
    ) -> Self {
        Self::scalar(
            name,
            oid,
            ScalarSetter::Bool(Box::new(move |target, v| match target.downcast_mut::<R>() {
                Some(r) => {
                    *get(r) = v;
                    true
                }
                None => false,
            })),
        )
    }

    pub fn int32<R: Any>(
        name: &'static str,
        oid: &'static str,
        get: fn(&mut R) -> &mut i32,
    ) -> Self {
        Self::scalar(
            name,
            oid,
            ScalarSetter::Int(Box::new(move |target, v| match target.downcast_mut::<R>() {
                Some(r) => {
                    *get(r) = v as i32;
                    true
                }
                None => false,
            })),
        )
    }

    pub fn int64<R: Any>(
        name: &'static str,
        oid: &'static str,
        get: fn(&mut R) -> &mut i64,
    ) -> Self {
        Self::scalar(
            name,
            oid,
            ScalarSetter::Int(Box::new(move |target, v| match target.downcast_mut::<R>() {
                Some(r) => {
                    *get(r) = v;
                    true
                }
                None => false,
            })),
        )
    }

    pub fn uint32<R: Any>(
        name: &'static str,
        oid: &'static str,
        get: fn(&mut R) -> &mut u32,
    ) -> Self {
        Self::scalar(
            name,
            oid,
            ScalarSetter::Uint(Box::new(move |target, v| match target.downcast_mut::<R>() {
                Some(r) => {
                    *get(r) = v as u32;
                    true
                }
                None => false,
            })),
        )
    }

    pub fn uint64<R: Any>(
        name: &'static str,
        oid: &'static str,
        get: fn(&mut R) -> &mut u64,
    ) -> Self {
        Self::scalar(
            name,
            oid,
            ScalarSetter::Uint(Box::new(move |target, v| match target.downcast_mut::<R>() {
                Some(r) => {
                    *get(r) = v;
                    true
                }
                None => false,
            })),
        )
    }

    pub fn string<R: Any>(
        name: &'static str,
        oid: &'static str,
        get: fn(&mut R) -> &mut String,
    ) -> Self {
        Self::scalar(
            name,
            oid,
            ScalarSetter::Text(Box::new(move |target, v| match target.downcast_mut::<R>() {
                Some(r) => {
                    *get(r) = v;
                    true
                }
                None => false,
            })),
        )
    }

    pub fn bytes<R: Any>(
        name: &'static str,
        oid: &'static str,
        get: fn(&mut R) -> &mut Vec<u8>,
    ) -> Self {
        Self::scalar(
            name,
            oid,
            ScalarSetter::Bytes(Box::new(move |target, v| match target.downcast_mut::<R>() {
                Some(r) => {
                    *get(r) = v;
                    true
                }
                None => false,
            })),
        )
    }

    pub fn oid<R: Any>(
        name: &'static str,
        oid: &'static str,
        get: fn(&mut R) -> &mut Oid,
    ) -> Self {
        Self::scalar(
            name,
            oid,
            ScalarSetter::OidValue(Box::new(move |target, v| {
                match target.downcast_mut::<R>() {
                    Some(r) => {
                        *get(r) = v;
                        true
                    }
                    None => false,
                }
            })),
        )
    }

    /// A nested record field.
    pub fn group<R: Any, N: MibRecord>(
        name: &'static str,
        oid: &'static str,
        get: fn(&mut R) -> &mut N,
    ) -> Self {
        Self {
            name,
            oid,
            node: FieldNode::Group {
                project: Box::new(move |target| {
                    target.downcast_mut::<R>().map(|r| get(r) as &mut dyn Any)
                }),
                nested_type: TypeId::of::<N>(),
                nested_name: short_type_name::<N>(),
                fields: N::fields,
            },
        }
    }

    /// An SNMP table: a map whose rows are created on the fly, keyed by the
    /// last arc of each walked instance.
    pub fn table<R: Any, N: MibRecord>(
        name: &'static str,
        oid: &'static str,
        get: fn(&mut R) -> &mut BTreeMap<u32, N>,
    ) -> Self {
        Self {
            name,
            oid,
            node: FieldNode::Table {
                rows: Box::new(move |target, key| {
                    let map = get(target.downcast_mut::<R>()?);
                    match key {
                        TableKey::UInt(k) => Some(map.entry(*k).or_default() as &mut dyn Any),
                        TableKey::Text(_) => None,
                    }
                }),
                key: TableKeyKind::UInt,
                key_arity: 1,
                row_type: TypeId::of::<N>(),
                row_name: short_type_name::<N>(),
                fields: N::fields,
            },
        }
    }

    /// A table keyed by text. `key_arity` trailing arcs form the row key,
    /// joined with dots; SNMP tables with composite indices set it above 1.
    pub fn text_table<R: Any, N: MibRecord>(
        name: &'static str,
        oid: &'static str,
        key_arity: usize,
        get: fn(&mut R) -> &mut BTreeMap<String, N>,
    ) -> Self {
        Self {
            name,
            oid,
            node: FieldNode::Table {
                rows: Box::new(move |target, key| {
                    let map = get(target.downcast_mut::<R>()?);
                    match key {
                        TableKey::Text(k) => {
                            Some(map.entry(k.clone()).or_default() as &mut dyn Any)
                        }
                        TableKey::UInt(_) => None,
                    }
                }),
                key: TableKeyKind::Text,
                key_arity: key_arity.max(1),
                row_type: TypeId::of::<N>(),
                row_name: short_type_name::<N>(),
                fields: N::fields,
            },
        }
    }
}

/// The compiled tree for `R`, built on first use and shared process-wide.
///
/// On a cache miss the tree is built outside the lock; if two builders race,
/// the losing writer discards its result. Published trees are immutable, so
/// readers need no further synchronization.
pub fn schema_tree<R: MibRecord>() -> Result<Arc<OidTree>, SchemaError> {
    static TREES: OnceLock<RwLock<HashMap<TypeId, Arc<OidTree>>>> = OnceLock::new();
    let cache = TREES.get_or_init(|| RwLock::new(HashMap::new()));

    let key = TypeId::of::<R>();
    {
        let trees = match cache.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(tree) = trees.get(&key) {
            return Ok(Arc::clone(tree));
        }
    }

    let built = Arc::new(build_tree::<R>()?);
    let mut trees = match cache.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    Ok(Arc::clone(trees.entry(key).or_insert(built)))
}

/// Builds the OID prefix tree for `R` by inserting one schema entry per
/// annotated field, recursing into nested record and table row types.
pub(crate) fn build_tree<R: MibRecord>() -> Result<OidTree, SchemaError> {
    let mut tree = OidTree::new();
    let mut type_stack = vec![TypeId::of::<R>()];
    insert_fields(
        &mut tree,
        R::fields(),
        &Oid::default(),
        short_type_name::<R>(),
        true,
        &mut type_stack,
    )?;
    Ok(tree)
}

fn insert_fields(
    tree: &mut OidTree,
    fields: Vec<FieldSpec>,
    parent_prefix: &Oid,
    parent_name: &str,
    top_level: bool,
    type_stack: &mut Vec<TypeId>,
) -> Result<(), SchemaError> {
    for field in fields {
        let qualified = format!("{parent_name}.{}", field.name);

        if field.oid.is_empty() {
            tracing::warn!(field = %qualified, "field has no OID annotation, skipping");
            continue;
        }
        if field.oid.starts_with('.') && !top_level {
            return Err(SchemaError::AbsoluteInNested { field: qualified });
        }

        let suffix: Oid = field
            .oid
            .parse()
            .map_err(|source| SchemaError::BadAnnotation {
                field: qualified.clone(),
                source,
            })?;
        let path = parent_prefix.joined(&suffix);

        match field.node {
            FieldNode::Scalar(setter) => {
                tree.insert(
                    path.arcs(),
                    FieldBinding {
                        qualified_name: qualified,
                        access: NodeAccess::Assign(setter),
                    },
                    NodeKind::Leaf,
                );
            }
            FieldNode::Group {
                project,
                nested_type,
                nested_name,
                fields,
            } => {
                if type_stack.contains(&nested_type) {
                    return Err(SchemaError::RecursiveSchema {
                        type_name: nested_name,
                    });
                }
                tree.insert(
                    path.arcs(),
                    FieldBinding {
                        qualified_name: qualified,
                        access: NodeAccess::Project(project),
                    },
                    NodeKind::Simple,
                );
                type_stack.push(nested_type);
                insert_fields(tree, fields(), &path, nested_name, false, type_stack)?;
                type_stack.pop();
            }
            FieldNode::Table {
                rows,
                key,
                key_arity,
                row_type,
                row_name,
                fields,
            } => {
                if type_stack.contains(&row_type) {
                    return Err(SchemaError::RecursiveSchema {
                        type_name: row_name,
                    });
                }
                tree.insert(
                    path.arcs(),
                    FieldBinding {
                        qualified_name: qualified,
                        access: NodeAccess::Rows {
                            entry: rows,
                            key,
                            key_arity,
                        },
                    },
                    NodeKind::SuffixCatcher,
                );
                type_stack.push(row_type);
                insert_fields(tree, fields(), &path, row_name, false, type_stack)?;
                type_stack.pop();
            }
        }
    }
    Ok(())
}
