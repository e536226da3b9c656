//! Manifest documents as structural YAML trees
//!
//! Documents are decoded into [`serde_yaml::Value`], a tagged union of
//! mappings, sequences and scalars. [`ResourceExt`] adds the Kubernetes-aware
//! accessors the labeling and namespace code needs. They return `None` or an
//! empty mapping on a type mismatch instead of failing.

mod extract;

pub use extract::{extract_documents, join_documents, PostProcess};

use serde_yaml::{Mapping, Value};

/// Key holding the resource kind
pub const KIND_KEY: &str = "kind";

/// Key holding resource metadata
pub const METADATA_KEY: &str = "metadata";

/// Key holding labels within resource metadata
pub const LABELS_KEY: &str = "labels";

/// Kind of the aggregate container resource, compared case-insensitively
pub const LIST_KIND: &str = "list";

/// Kubernetes-aware accessors over a decoded YAML mapping
pub trait ResourceExt {
    /// The raw `kind` value, if the key is present
    fn kind(&self) -> Option<&Value>;

    /// The `kind` value when it is a string
    fn kind_str(&self) -> Option<&str> {
        self.kind().and_then(Value::as_str)
    }

    /// Whether this mapping is a `List` container
    fn is_list(&self) -> bool {
        self.kind_str()
            .is_some_and(|kind| kind.eq_ignore_ascii_case(LIST_KIND))
    }

    /// Whether this mapping is a labelable resource: it has a `kind` and is not a `List`
    fn is_resource(&self) -> bool {
        self.kind().is_some() && !self.is_list()
    }

    /// The `metadata` mapping; `None` when absent or not a mapping
    fn metadata(&self) -> Option<&Mapping>;

    /// Detach the mapping stored under `key`, leaving `null` in its slot.
    ///
    /// A missing key or a non-mapping value yields an empty mapping, so callers
    /// can rebuild the entry and insert it back without changing key order.
    fn take_mapping(&mut self, key: &str) -> Mapping;
}

impl ResourceExt for Mapping {
    fn kind(&self) -> Option<&Value> {
        self.get(KIND_KEY)
    }

    fn metadata(&self) -> Option<&Mapping> {
        self.get(METADATA_KEY).and_then(Value::as_mapping)
    }

    fn take_mapping(&mut self, key: &str) -> Mapping {
        match self.get_mut(key) {
            Some(slot) => match std::mem::replace(slot, Value::Null) {
                Value::Mapping(mapping) => mapping,
                _ => Mapping::new(),
            },
            None => Mapping::new(),
        }
    }
}

/// Human-readable name of a value's variant, for error messages
pub(crate) fn value_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}
