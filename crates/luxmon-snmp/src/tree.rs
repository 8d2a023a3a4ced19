//! Radix tree over OID arcs.
//!
//! Each node consumes `prefix` arcs beyond its parent; children are keyed by
//! their first arc, with the remainder stored as the child's own prefix.
//! Invariants:
//!
//! - no two sibling edges share a first arc (the child map key holds it);
//! - a leaf never has children;
//! - interior nodes created by a split are simple nodes without a binding.
//!
//! Trees are built once per record type and never mutated afterwards.

use std::collections::BTreeMap;
use std::fmt;

use crate::oid::{common_prefix_len, Oid};
use crate::schema::FieldBinding;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Uninitialized,
    Simple,
    SuffixCatcher,
    Leaf,
}

pub struct OidTree {
    prefix: Oid,
    children: BTreeMap<u32, OidTree>,
    binding: Option<FieldBinding>,
    kind: NodeKind,
}

impl fmt::Debug for OidTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OidTree")
            .field("prefix", &self.prefix)
            .field("children", &self.children)
            .field("binding", &self.binding)
            .field("kind", &self.kind)
            .finish()
    }
}

impl OidTree {
    pub fn new() -> Self {
        Self {
            prefix: Oid::default(),
            children: BTreeMap::new(),
            binding: None,
            kind: NodeKind::Uninitialized,
        }
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn prefix(&self) -> &Oid {
        &self.prefix
    }

    /// Qualified name of the field bound to this node, if any. Split-created
    /// interior nodes have none.
    pub fn field_name(&self) -> Option<&str> {
        self.binding.as_ref().map(|b| b.qualified_name.as_str())
    }

    pub(crate) fn binding(&self) -> Option<&FieldBinding> {
        self.binding.as_ref()
    }

    pub fn is_leaf(&self) -> bool {
        self.kind == NodeKind::Leaf
    }

    pub fn is_suffix_catching(&self) -> bool {
        self.kind == NodeKind::SuffixCatcher
    }

    pub(crate) fn insert(&mut self, path: &[u32], binding: FieldBinding, kind: NodeKind) {
        // First insert into a fresh root: adopt the entry outright.
        if self.kind == NodeKind::Uninitialized {
            self.prefix = Oid::from_slice(path);
            self.binding = Some(binding);
            self.kind = kind;
            return;
        }

        let mut common = common_prefix_len(self.prefix.arcs(), path);

        // Path extends this node: descend into (or create) the child.
        if common == self.prefix.len() && common < path.len() {
            self.create_or_update_child(&path[common..], binding, kind);
            return;
        }

        // Keep at least one arc to serve as the demoted child's key.
        if common == path.len() {
            common -= 1;
        }

        // Split: move this node's content one level down, then re-insert the
        // new entry as a sibling.
        let demoted = OidTree {
            prefix: Oid::from_slice(&self.prefix.arcs()[common + 1..]),
            children: std::mem::take(&mut self.children),
            binding: self.binding.take(),
            kind: self.kind,
        };
        let demoted_key = self.prefix.arcs()[common];
        self.children.insert(demoted_key, demoted);
        self.prefix.truncate(common);
        self.kind = NodeKind::Simple;

        self.create_or_update_child(&path[common..], binding, kind);
    }

    fn create_or_update_child(&mut self, path: &[u32], binding: FieldBinding, kind: NodeKind) {
        let key = path[0];
        let child_path = &path[1..];
        if let Some(child) = self.children.get_mut(&key) {
            child.insert(child_path, binding, kind);
        } else if self.is_leaf() {
            panic!("oidtree: cannot insert a node under a leaf");
        } else {
            self.children.insert(
                key,
                OidTree {
                    prefix: Oid::from_slice(child_path),
                    children: BTreeMap::new(),
                    binding: Some(binding),
                    kind,
                },
            );
        }
    }

    /// One traversal step. Returns the next node and the arcs still to
    /// consume: `(None, path)` when the path diverges from this node's
    /// prefix or names an unknown child, `(self, &[])` when the path ends
    /// exactly here, and the matching child otherwise.
    pub fn find_next<'t, 'p>(&'t self, path: &'p [u32]) -> (Option<&'t OidTree>, &'p [u32]) {
        let common = common_prefix_len(self.prefix.arcs(), path);
        if common != self.prefix.len() {
            return (None, path);
        }

        let remaining = &path[common..];
        if remaining.is_empty() {
            return (Some(self), remaining);
        }
        if let Some(child) = self.children.get(&remaining[0]) {
            return (Some(child), &remaining[1..]);
        }

        (None, path)
    }

    /// Root prefixes to BulkWalk: the minimal set of subtrees whose union
    /// covers every bound field. A suffix-catcher contributes its whole
    /// subtree as one walk (the SNMP table); a lone leaf is a single value,
    /// not a subtree, and contributes nothing.
    pub fn prefix_paths(&self) -> Vec<Oid> {
        match self.kind {
            NodeKind::Leaf => Vec::new(),
            NodeKind::SuffixCatcher => vec![self.prefix.clone()],
            _ => {
                let mut paths = Vec::new();
                for (key, child) in &self.children {
                    for child_path in child.prefix_paths() {
                        let mut path = self.prefix.clone();
                        path.push(*key);
                        path.extend_from_slice(child_path.arcs());
                        paths.push(path);
                    }
                }
                paths
            }
        }
    }

    fn fmt_indented(&self, f: &mut fmt::Formatter<'_>, indent: &str) -> fmt::Result {
        write!(f, "{indent}{}", self.prefix)?;
        if let Some(name) = self.field_name() {
            write!(f, " {name}")?;
        }
        if self.is_suffix_catching() {
            write!(f, " <suffix-catching>")?;
        }
        if self.is_leaf() {
            write!(f, " <leaf>")?;
        }
        writeln!(f)?;

        let child_indent = format!("{indent}  ");
        for (key, child) in &self.children {
            writeln!(f, "{indent}[{key}]")?;
            child.fmt_indented(f, &child_indent)?;
        }
        Ok(())
    }
}

impl Default for OidTree {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OidTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_indented(f, "")
    }
}
