//! Namespace resolution for single-resource manifests

use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use tracing::debug;

use crate::manifest::{value_type, ResourceExt, KIND_KEY};
use crate::{Error, Result};

/// Kind whose own name is the namespace it defines
const NAMESPACE_KIND: &str = "namespace";

/// Return the namespace targeted by the first resource in a manifest.
///
/// A `Namespace` resource yields its own `metadata.name`; any other kind
/// yields `metadata.namespace`. Returns an empty string when the resource has
/// no metadata or the field is not set. Only the first document is decoded.
pub fn get_namespace(manifest: &[u8]) -> Result<String> {
    let resource = first_resource(manifest)?;

    let kind = resource
        .kind_str()
        .ok_or_else(|| Error::validation_for_field(KIND_KEY, "missing 'kind' field"))?;

    let Some(metadata) = resource.metadata() else {
        return Ok(String::new());
    };

    let key = if kind.eq_ignore_ascii_case(NAMESPACE_KIND) {
        "name"
    } else {
        "namespace"
    };

    match metadata.get(key) {
        None => Ok(String::new()),
        Some(Value::String(namespace)) => {
            debug!(kind, namespace = %namespace, "Resolved manifest namespace");
            Ok(namespace.clone())
        }
        Some(other) => Err(Error::validation_for_field(
            format!("metadata.{key}"),
            format!("'{key}' field is not a string (found {})", value_type(other)),
        )),
    }
}

/// Decode the first document as a mapping; a null document is an empty mapping
fn first_resource(manifest: &[u8]) -> Result<Mapping> {
    let document = serde_yaml::Deserializer::from_slice(manifest)
        .next()
        .ok_or_else(|| Error::decode_shape(0, "manifest contains no document"))?;

    match Value::deserialize(document).map_err(|e| Error::decode(0, e))? {
        Value::Mapping(resource) => Ok(resource),
        Value::Null => Ok(Mapping::new()),
        other => Err(Error::decode_shape(
            0,
            format!("expected a mapping, found a {}", value_type(&other)),
        )),
    }
}
