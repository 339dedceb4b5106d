//! # Runtime Options
//!
//! [`ApplyOptions`] is supplied once per `apply` call. Validators never
//! store it: each recursive step derives a [`Scope`] for its children, and
//! everything is discarded when the call returns.
//!
//! - `strip`: drop undeclared fields from every record in the output, at
//!   every depth (unlike the schema-level `strip` constraint, which only
//!   affects the record that declares it).
//! - `partial`: relax required-field enforcement, either everywhere or for
//!   a set of dotted field paths (`"address.zip"`). Sequence indices are
//!   not part of these paths; unknown paths are ignored.

use std::collections::BTreeSet;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Required-field relaxation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Partial {
    /// Declared requiredness applies everywhere.
    #[default]
    None,
    /// Every field at every depth is optional.
    All,
    /// Only the named dotted paths are optional.
    Paths(BTreeSet<String>),
}

impl Partial {
    /// Build a path set from any iterator of path strings.
    pub fn paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Paths(paths.into_iter().map(Into::into).collect())
    }
}

impl Serialize for Partial {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::None => serializer.serialize_bool(false),
            Self::All => serializer.serialize_bool(true),
            Self::Paths(paths) => paths.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Partial {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Flag(bool),
            Paths(BTreeSet<String>),
        }
        Ok(match Repr::deserialize(deserializer)? {
            Repr::Flag(false) => Self::None,
            Repr::Flag(true) => Self::All,
            Repr::Paths(paths) => Self::Paths(paths),
        })
    }
}

/// Options for a single `apply` call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplyOptions {
    /// Drop undeclared record fields at every depth.
    pub strip: bool,
    /// Required-field relaxation.
    pub partial: Partial,
}

impl ApplyOptions {
    /// Options with `strip` enabled.
    pub fn strip() -> Self {
        Self {
            strip: true,
            ..Self::default()
        }
    }

    /// Options with the given partial policy.
    pub fn partial(partial: Partial) -> Self {
        Self {
            partial,
            ..Self::default()
        }
    }

    /// The scope of the root value.
    pub fn root_scope(&self) -> Scope<'_> {
        Scope {
            strip: self.strip,
            partial: match &self.partial {
                Partial::None => PartialScope::None,
                Partial::All => PartialScope::All,
                Partial::Paths(paths) => PartialScope::Paths {
                    paths,
                    prefix: String::new(),
                },
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PartialScope<'a> {
    None,
    All,
    Paths {
        paths: &'a BTreeSet<String>,
        prefix: String,
    },
}

/// Runtime options as seen by one node of the validator tree.
///
/// The partial path prefix advances only when descending into a record
/// field; sequences, tuples and unions hand their scope through unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope<'a> {
    strip: bool,
    partial: PartialScope<'a>,
}

impl<'a> Scope<'a> {
    /// Whether undeclared fields are dropped in this scope.
    pub fn strip(&self) -> bool {
        self.strip
    }

    /// Whether partial mode relaxes every field.
    pub fn partial_all(&self) -> bool {
        matches!(self.partial, PartialScope::All)
    }

    /// Whether the field `name` of the record in this scope is optional
    /// under the partial policy.
    pub fn is_partial(&self, name: &str) -> bool {
        match &self.partial {
            PartialScope::None => false,
            PartialScope::All => true,
            PartialScope::Paths { paths, prefix } => {
                if prefix.is_empty() {
                    paths.contains(name)
                } else {
                    paths.contains(&format!("{prefix}.{name}"))
                }
            }
        }
    }

    /// The scope of the value held by field `name` of the record in this
    /// scope.
    pub fn field(&self, name: &str) -> Scope<'a> {
        let partial = match &self.partial {
            PartialScope::None => PartialScope::None,
            PartialScope::All => PartialScope::All,
            PartialScope::Paths { paths, prefix } => PartialScope::Paths {
                paths,
                prefix: if prefix.is_empty() {
                    name.to_string()
                } else {
                    format!("{prefix}.{name}")
                },
            },
        };
        Scope {
            strip: self.strip,
            partial,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let opts = ApplyOptions::default();
        let scope = opts.root_scope();
        assert!(!scope.strip());
        assert!(!scope.is_partial("age"));
    }

    #[test]
    fn test_partial_paths_follow_fields() {
        let opts = ApplyOptions::partial(Partial::paths(["age", "address.zip"]));
        let root = opts.root_scope();
        assert!(root.is_partial("age"));
        assert!(!root.is_partial("name"));
        assert!(!root.is_partial("zip"));

        let address = root.field("address");
        assert!(address.is_partial("zip"));
        assert!(!address.is_partial("city"));
        assert!(!address.is_partial("age"));
    }

    #[test]
    fn test_partial_all_is_inherited() {
        let opts = ApplyOptions::partial(Partial::All);
        let nested = opts.root_scope().field("a").field("b");
        assert!(nested.partial_all());
        assert!(nested.is_partial("anything"));
    }

    #[test]
    fn test_deserialize_options() {
        let o: ApplyOptions = serde_json::from_str(r#"{"strip": true, "partial": true}"#).unwrap();
        assert_eq!(o, ApplyOptions { strip: true, partial: Partial::All });

        let o: ApplyOptions = serde_json::from_str(r#"{"partial": ["age", "address.zip"]}"#).unwrap();
        assert_eq!(o.partial, Partial::paths(["address.zip", "age"]));
        assert!(!o.strip);

        let o: ApplyOptions = serde_json::from_str(r#"{"partial": false}"#).unwrap();
        assert_eq!(o.partial, Partial::None);
    }
}
