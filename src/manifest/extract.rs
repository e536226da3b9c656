//! Multi-document extraction and re-encoding

use serde::Deserialize;
use serde_yaml::Value;
use tracing::{debug, trace};

use super::ResourceExt;
use crate::error::BoxError;
use crate::{Error, Result, DOCUMENT_SEPARATOR};

/// In-place post-processing step applied to each decoded document
pub type PostProcess<'a> = &'a mut dyn FnMut(&mut Value) -> std::result::Result<(), BoxError>;

/// Extract every document from a multi-document YAML stream.
///
/// Each non-empty document is decoded, optionally mutated by `post_process`,
/// and re-encoded with two-space indentation. Documents that decode to null
/// (blank documents, trailing separators) are dropped. Output order follows
/// input order. Empty input yields no documents without invoking the decoder.
///
/// Error indices count every document in the stream, blank ones included.
pub fn extract_documents(
    manifest: &[u8],
    mut post_process: Option<PostProcess<'_>>,
) -> Result<Vec<Vec<u8>>> {
    let mut docs = Vec::new();
    if manifest.is_empty() {
        return Ok(docs);
    }

    for (index, document) in serde_yaml::Deserializer::from_slice(manifest).enumerate() {
        let mut value = Value::deserialize(document).map_err(|e| Error::decode(index, e))?;

        if value.is_null() {
            trace!(index, "Skipping empty manifest document");
            continue;
        }

        if let Some(post_process) = post_process.as_deref_mut() {
            post_process(&mut value).map_err(|e| Error::transform(index, e))?;
        }

        let encoded = serde_yaml::to_string(&value).map_err(|e| Error::encode(index, e))?;
        debug!(
            index,
            kind = value.as_mapping().and_then(|m| m.kind_str()).unwrap_or("<none>"),
            bytes = encoded.len(),
            "Extracted manifest document"
        );
        docs.push(encoded.into_bytes());
    }

    Ok(docs)
}

/// Join encoded documents into one stream with `---` between them
pub fn join_documents(docs: &[Vec<u8>]) -> Vec<u8> {
    docs.join(DOCUMENT_SEPARATOR.as_bytes())
}
