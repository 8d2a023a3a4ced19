//! OID (Object Identifier) representation.

use std::fmt::{self, Write};
use std::str::FromStr;

/// An OID arc could not be parsed as an unsigned integer.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid arc '{arc}' in OID '{text}'")]
pub struct OidParseError {
    text: String,
    arc: String,
}

/// An ordered sequence of unsigned integer arcs naming a node in the SNMP
/// management tree. The empty OID is valid and denotes the tree root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Oid {
    arcs: Vec<u32>,
}

impl Oid {
    pub fn new(arcs: Vec<u32>) -> Self {
        Self { arcs }
    }

    pub fn from_slice(arcs: &[u32]) -> Self {
        Self {
            arcs: arcs.to_vec(),
        }
    }

    pub fn arcs(&self) -> &[u32] {
        &self.arcs
    }

    pub fn len(&self) -> usize {
        self.arcs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arcs.is_empty()
    }

    pub fn push(&mut self, arc: u32) {
        self.arcs.push(arc);
    }

    pub fn extend_from_slice(&mut self, arcs: &[u32]) {
        self.arcs.extend_from_slice(arcs);
    }

    pub(crate) fn truncate(&mut self, len: usize) {
        self.arcs.truncate(len);
    }

    /// New OID holding `self` followed by `suffix`.
    pub fn joined(&self, suffix: &Oid) -> Self {
        let mut arcs = Vec::with_capacity(self.arcs.len() + suffix.arcs.len());
        arcs.extend_from_slice(&self.arcs);
        arcs.extend_from_slice(&suffix.arcs);
        Self { arcs }
    }

    pub fn is_prefix_of(&self, other: &Oid) -> bool {
        other.arcs.starts_with(&self.arcs)
    }
}

/// Length of the longest shared prefix of `a` and `b`, capped at the shorter
/// of the two.
pub fn common_prefix_len(a: &[u32], b: &[u32]) -> usize {
    a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count()
}

impl FromStr for Oid {
    type Err = OidParseError;

    /// Splits on `.`; leading empty components (a leading dot, or several)
    /// are discarded, so `.1.3.6` and `1.3.6` parse identically.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts: Vec<&str> = s.split('.').collect();
        let leading_empty = parts.iter().take_while(|p| p.is_empty()).count();
        parts.drain(..leading_empty);

        let mut arcs = Vec::with_capacity(parts.len());
        for part in parts {
            let arc = part.parse::<u32>().map_err(|_| OidParseError {
                text: s.to_string(),
                arc: part.to_string(),
            })?;
            arcs.push(arc);
        }
        Ok(Self { arcs })
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for arc in &self.arcs {
            if !first {
                f.write_char('.')?;
            }
            write!(f, "{arc}")?;
            first = false;
        }
        Ok(())
    }
}

impl From<Vec<u32>> for Oid {
    fn from(arcs: Vec<u32>) -> Self {
        Self::new(arcs)
    }
}

impl From<&[u32]> for Oid {
    fn from(arcs: &[u32]) -> Self {
        Self::from_slice(arcs)
    }
}
