//! # Descriptor Fingerprints
//!
//! A [`SchemaDigest`] is a Merkle-style SHA-256 fingerprint of a
//! descriptor. Two descriptors have the same digest exactly when they are
//! structurally identical, which makes the digest the memo key for
//! "one descriptor, one validator".
//!
//! Each node hashes a canonical JSON header (kind, constraint string,
//! field names and requirement flags, literal values) followed by the raw
//! digests of its children. Object keys in the header are sorted
//! recursively, so literal values hash the same whatever their source key
//! order. [`DigestTree`] keeps every intermediate digest, so a subtree is
//! hashed once no matter how deep it sits.

use std::fmt;

use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::descriptor::{Schema, SchemaKind};
use crate::error::SchemaDefinitionError;

/// SHA-256 fingerprint of a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchemaDigest([u8; 32]);

/// The digest of a descriptor together with the digests of its
/// sub-descriptors.
///
/// `children` follows declaration order: the item descriptor of a
/// sequence, tuple positions, record field descriptors, union
/// alternatives. Scalars and literals have no children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestTree {
    /// Digest of the whole descriptor.
    pub digest: SchemaDigest,
    /// Digest trees of the direct sub-descriptors.
    pub children: Vec<DigestTree>,
}

impl DigestTree {
    /// Fingerprint `schema` and every sub-descriptor in one pass.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaDefinitionError::DepthExceeded`] if the descriptor
    /// nests deeper than `max_depth` (the root is depth 0).
    pub fn build(schema: &Schema, max_depth: usize) -> Result<Self, SchemaDefinitionError> {
        Self::build_at(schema, 0, max_depth)
    }

    fn build_at(schema: &Schema, depth: usize, max_depth: usize) -> Result<Self, SchemaDefinitionError> {
        if depth > max_depth {
            return Err(SchemaDefinitionError::DepthExceeded { max_depth });
        }
        let children = schema
            .children()
            .into_iter()
            .map(|child| Self::build_at(child, depth + 1, max_depth))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            digest: SchemaDigest::node(schema, children.iter().map(|c| &c.digest)),
            children,
        })
    }
}

impl SchemaDigest {
    /// Fingerprint `schema` without a depth limit.
    pub fn of(schema: &Schema) -> Self {
        let children: Vec<Self> = schema.children().into_iter().map(Self::of).collect();
        Self::node(schema, children.iter())
    }

    fn node<'a>(schema: &Schema, children: impl ExactSizeIterator<Item = &'a SchemaDigest>) -> Self {
        let mut header = json!({
            "type": schema.kind.name(),
            "constraints": schema.constraints,
            "children": children.len(),
        });
        match &schema.kind {
            SchemaKind::Record { fields } => {
                header["fields"] = fields
                    .iter()
                    .map(|f| json!({"name": f.name, "required": f.required}))
                    .collect();
            }
            SchemaKind::Literal { values } => header["values"] = Value::Array(values.clone()),
            _ => {}
        }
        let mut canonical = String::new();
        write_canonical(&header, &mut canonical);

        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        for child in children {
            hasher.update(child.0);
        }
        let mut out = [0u8; 32];
        out.copy_from_slice(&hasher.finalize());
        Self(out)
    }

    /// The raw 32-byte digest.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Render the digest as a lowercase hex string.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// First 12 hex characters, for log lines.
    pub fn short(&self) -> String {
        self.to_hex()[..12].to_string()
    }
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key.as_str()], out);
            }
            out.push('}');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

impl fmt::Display for SchemaDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sha256:{}", self.to_hex())
    }
}
