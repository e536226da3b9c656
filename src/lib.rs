//! kubeapp-manifest - Kubernetes manifest processing for application stacks
//!
//! Splits multi-document YAML manifests into their documents, stamps the
//! application identity labels onto every resource they contain, and resolves
//! the namespace a single resource targets.
//!
//! # Modules
//!
//! - [`manifest`] - Document extraction, re-encoding and resource accessors
//! - [`labels`] - Application label maps and the recursive label injector
//! - [`namespace`] - Namespace resolution for single-document manifests
//! - [`telemetry`] - Tracing subscriber setup for binaries
//! - [`error`] - Error types
//!
//! All operations are synchronous and keep no state between calls.

#![deny(missing_docs)]

pub mod error;
pub mod labels;
pub mod manifest;
pub mod namespace;
pub mod telemetry;

pub use error::Error;
pub use labels::{add_app_labels, add_resource_labels, AppLabels, KubeAppLabels};
pub use manifest::{extract_documents, join_documents};
pub use namespace::get_namespace;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Separator written between documents when a stream is rejoined
pub const DOCUMENT_SEPARATOR: &str = "---\n";
