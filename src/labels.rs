//! Application identity labels
//!
//! Every resource deployed as part of a stack carries a fixed set of labels
//! identifying the stack, application, owner and deployment kind. This module
//! builds those label maps and injects them into manifests.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use tracing::{debug, trace};

use crate::error::BoxError;
use crate::manifest::{extract_documents, join_documents, ResourceExt, LABELS_KEY, METADATA_KEY};
use crate::Result;

/// Label key for the stack name
pub const LABEL_APP_STACK: &str = "io.portainer.kubernetes.application.stack";

/// Label key for the numeric stack identifier
pub const LABEL_APP_STACK_ID: &str = "io.portainer.kubernetes.application.stackid";

/// Label key for the application name
pub const LABEL_APP_NAME: &str = "io.portainer.kubernetes.application.name";

/// Label key for the (sanitized) application owner
pub const LABEL_APP_OWNER: &str = "io.portainer.kubernetes.application.owner";

/// Label key for the deployment kind (e.g. "git", "content")
pub const LABEL_APP_KIND: &str = "io.portainer.kubernetes.application.kind";

/// Label set merged into resource metadata, keyed by label name
pub type AppLabels = BTreeMap<String, String>;

// =============================================================================
// Label maps
// =============================================================================

/// Labels applied to all resources deployed in a Kubernetes stack
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KubeAppLabels {
    /// Numeric stack identifier
    pub stack_id: i64,
    /// Stack name, also used as the application name
    pub stack_name: String,
    /// User who deployed the stack
    pub owner: String,
    /// How the stack was deployed
    pub kind: String,
}

impl KubeAppLabels {
    /// Convert to the five-entry label map
    pub fn to_map(&self) -> AppLabels {
        BTreeMap::from([
            (LABEL_APP_STACK_ID.to_string(), self.stack_id.to_string()),
            (LABEL_APP_STACK.to_string(), self.stack_name.clone()),
            (LABEL_APP_NAME.to_string(), self.stack_name.clone()),
            (LABEL_APP_OWNER.to_string(), sanitize_label(&self.owner)),
            (LABEL_APP_KIND.to_string(), self.kind.clone()),
        ])
    }
}

/// Labels applied to applications deployed through Helm
pub fn helm_app_labels(name: &str, owner: &str) -> AppLabels {
    BTreeMap::from([
        (LABEL_APP_NAME.to_string(), name.to_string()),
        (LABEL_APP_OWNER.to_string(), sanitize_label(owner)),
    ])
}

/// Make a value usable as a label value.
///
/// Every run of characters outside `[A-Za-z0-9._-]` becomes a single `.`.
pub fn sanitize_label(value: &str) -> String {
    let mut sanitized = String::with_capacity(value.len());
    let mut in_invalid_run = false;
    for c in value.chars() {
        if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
            sanitized.push(c);
            in_invalid_run = false;
        } else if !in_invalid_run {
            sanitized.push('.');
            in_invalid_run = true;
        }
    }
    sanitized
}

// =============================================================================
// Label injection
// =============================================================================

/// Add `app_labels` to `metadata.labels` of every resource in a manifest.
///
/// A resource is any mapping with a `kind` other than `List`. Resources may be
/// split across documents or grouped under a `List`; both are handled. The
/// documents are rejoined with `---` separators. Empty input is returned as is.
pub fn add_app_labels(manifest: &[u8], app_labels: &AppLabels) -> Result<Vec<u8>> {
    if manifest.is_empty() {
        return Ok(manifest.to_vec());
    }

    let mut post_process = |document: &mut Value| -> std::result::Result<(), BoxError> {
        add_resource_labels(document, app_labels);
        Ok(())
    };
    let docs = extract_documents(manifest, Some(&mut post_process))?;

    Ok(join_documents(&docs))
}

/// Merge `app_labels` into every resource reachable from `document`.
///
/// Traversal stops at resources: a Deployment's pod template is not labeled
/// separately. `List` mappings and mappings without a `kind` are descended
/// into, through nested mappings and the mapping elements of sequences.
/// Scalars and malformed nodes are skipped.
pub fn add_resource_labels(document: &mut Value, app_labels: &AppLabels) {
    let mut pending: Vec<&mut Mapping> = Vec::new();
    if let Value::Mapping(root) = document {
        pending.push(root);
    }

    while let Some(node) = pending.pop() {
        if node.is_resource() {
            debug!(kind = node.kind_str().unwrap_or("<non-string>"), "Labeling resource");
            merge_labels(node, app_labels);
            continue;
        }

        for (_, value) in node.iter_mut() {
            match value {
                Value::Mapping(child) => pending.push(child),
                Value::Sequence(items) => {
                    pending.extend(items.iter_mut().filter_map(Value::as_mapping_mut))
                }
                _ => {}
            }
        }
    }
}

/// Merge labels into a single resource, creating `metadata.labels` as needed
fn merge_labels(resource: &mut Mapping, app_labels: &AppLabels) {
    let mut metadata = resource.take_mapping(METADATA_KEY);
    let existing = metadata.take_mapping(LABELS_KEY);

    let mut labels = Mapping::with_capacity(existing.len() + app_labels.len());
    for (key, value) in existing {
        match (label_string(&key), label_string(&value)) {
            (Some(key), Some(value)) => {
                labels.insert(Value::String(key), Value::String(value));
            }
            _ => trace!(?key, "Dropping label that has no string form"),
        }
    }
    for (key, value) in app_labels {
        labels.insert(Value::String(key.clone()), Value::String(value.clone()));
    }

    metadata.insert(Value::String(LABELS_KEY.to_string()), Value::Mapping(labels));
    resource.insert(Value::String(METADATA_KEY.to_string()), Value::Mapping(metadata));
}

/// String form of a scalar label key or value
fn label_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => Some(String::new()),
        Value::Tagged(tagged) => label_string(&tagged.value),
        Value::Sequence(_) | Value::Mapping(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app_labels() -> AppLabels {
        KubeAppLabels {
            stack_id: 7,
            stack_name: "shop".to_string(),
            owner: "admin".to_string(),
            kind: "git".to_string(),
        }
        .to_map()
    }

    fn parse(yaml: &str) -> Value {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn labels_of(resource: &Value) -> &Value {
        let labels = &resource["metadata"]["labels"];
        assert!(labels.is_mapping(), "resource should have labels");
        labels
    }

    fn label_count(resource: &Value) -> usize {
        labels_of(resource).as_mapping().map_or(0, Mapping::len)
    }

    // ==========================================================================
    // Label maps
    // ==========================================================================

    #[test]
    fn test_kube_app_labels_to_map() {
        let labels = KubeAppLabels {
            stack_id: 12,
            stack_name: "billing".to_string(),
            owner: "Jane Doe".to_string(),
            kind: "content".to_string(),
        }
        .to_map();

        assert_eq!(labels.len(), 5);
        assert_eq!(labels[LABEL_APP_STACK_ID], "12");
        assert_eq!(labels[LABEL_APP_STACK], "billing");
        assert_eq!(labels[LABEL_APP_NAME], "billing");
        assert_eq!(labels[LABEL_APP_OWNER], "Jane.Doe");
        assert_eq!(labels[LABEL_APP_KIND], "content");
    }

    #[test]
    fn test_helm_app_labels() {
        let labels = helm_app_labels("nginx", "ops team");
        assert_eq!(labels.len(), 2);
        assert_eq!(labels[LABEL_APP_NAME], "nginx");
        assert_eq!(labels[LABEL_APP_OWNER], "ops.team");
    }

    #[test]
    fn test_sanitize_label_collapses_invalid_runs() {
        assert_eq!(sanitize_label("Jane Doe/Team#1"), "Jane.Doe.Team.1");
        assert_eq!(sanitize_label("a  //  b"), "a.b");
        assert_eq!(sanitize_label("valid-name_1.2"), "valid-name_1.2");
        assert_eq!(sanitize_label("üser"), ".ser");
        assert_eq!(sanitize_label(""), "");
    }

    // ==========================================================================
    // Story Tests: Labeling resources in a document
    // ==========================================================================

    /// Story: a resource without metadata gets every app label
    #[test]
    fn story_resource_without_metadata_gets_labels() {
        let mut doc = parse("apiVersion: v1\nkind: ConfigMap\ndata:\n  key: value\n");
        add_resource_labels(&mut doc, &app_labels());

        let labels = labels_of(&doc);
        assert_eq!(label_count(&doc), 5);
        assert_eq!(labels[LABEL_APP_STACK_ID], "7");
        assert_eq!(labels[LABEL_APP_OWNER], "admin");
    }

    /// Story: existing labels survive, conflicting ones are overwritten
    #[test]
    fn story_app_labels_override_existing_values() {
        let mut doc = parse(
            r#"
kind: Service
metadata:
  name: web
  labels:
    app: old
    io.portainer.kubernetes.application.owner: x
"#,
        );
        add_resource_labels(&mut doc, &app_labels());

        let labels = labels_of(&doc);
        assert_eq!(labels["app"], "old");
        assert_eq!(labels[LABEL_APP_OWNER], "admin");
        assert_eq!(doc["metadata"]["name"], "web");
    }

    /// Story: a List is a container, not a resource
    #[test]
    fn story_list_items_are_labeled_but_not_the_list() {
        let mut doc = parse(
            r#"
apiVersion: v1
kind: List
items:
  - kind: Service
    metadata:
      name: a
  - kind: Deployment
    metadata:
      name: b
"#,
        );
        add_resource_labels(&mut doc, &app_labels());

        assert!(doc.get("metadata").is_none());
        let items = doc["items"].as_sequence().unwrap();
        assert_eq!(items.len(), 2);
        for item in items {
            assert_eq!(labels_of(item)[LABEL_APP_STACK], "shop");
        }
    }

    /// Story: embedded templates with their own kind are left alone
    #[test]
    fn story_nested_kind_inside_resource_is_not_labeled() {
        let mut doc = parse(
            r#"
kind: CronJob
metadata:
  name: nightly
spec:
  jobTemplate:
    kind: Job
    metadata:
      name: inner
"#,
        );
        add_resource_labels(&mut doc, &app_labels());

        assert_eq!(label_count(&doc), 5);
        assert!(doc["spec"]["jobTemplate"]["metadata"].get("labels").is_none());
    }

    #[test]
    fn test_resources_nested_under_plain_mappings_are_found() {
        let mut doc = parse(
            r#"
bundle:
  first:
    kind: Secret
  more:
    - kind: ConfigMap
    - plain: scalar
    - [nested, sequence]
    - just-a-string
"#,
        );
        add_resource_labels(&mut doc, &app_labels());

        assert_eq!(label_count(&doc["bundle"]["first"]), 5);
        let more = doc["bundle"]["more"].as_sequence().unwrap();
        assert_eq!(label_count(&more[0]), 5);
        assert!(more[1].get("metadata").is_none());
        assert!(doc.get("metadata").is_none());
    }

    #[test]
    fn test_mismatched_metadata_and_labels_are_replaced() {
        let mut doc = parse("kind: Pod\nmetadata: not-a-mapping\n");
        add_resource_labels(&mut doc, &app_labels());
        assert_eq!(label_count(&doc), 5);

        let mut doc = parse("kind: Pod\nmetadata:\n  name: web\n  labels: [a, b]\n");
        add_resource_labels(&mut doc, &app_labels());
        assert_eq!(label_count(&doc), 5);
        assert_eq!(doc["metadata"]["name"], "web");
    }

    #[test]
    fn test_existing_label_values_become_strings() {
        let mut doc = parse(
            "kind: Pod\nmetadata:\n  labels:\n    replicas: 3\n    canary: true\n    empty: null\n    nested: {a: b}\n",
        );
        add_resource_labels(&mut doc, &app_labels());

        let labels = labels_of(&doc);
        assert_eq!(labels["replicas"], "3");
        assert_eq!(labels["canary"], "true");
        assert_eq!(labels["empty"], "");
        assert!(labels.get("nested").is_none());
    }

    #[test]
    fn test_non_mapping_documents_are_ignored() {
        let mut doc = parse("- kind: Pod\n");
        let before = doc.clone();
        add_resource_labels(&mut doc, &app_labels());
        assert_eq!(doc, before);

        let mut scalar = Value::String("kind".to_string());
        add_resource_labels(&mut scalar, &app_labels());
        assert_eq!(scalar, Value::String("kind".to_string()));
    }

    #[test]
    fn test_deeply_nested_input_does_not_overflow() {
        let mut doc = Value::Mapping(Mapping::new());
        for _ in 0..100_000 {
            let mut wrapper = Mapping::new();
            wrapper.insert("child".into(), doc);
            doc = Value::Mapping(wrapper);
        }
        add_resource_labels(&mut doc, &app_labels());
        // Drop iteratively; the derived Drop would recurse just as deep.
        let mut current = doc;
        while let Value::Mapping(mut map) = current {
            current = map.remove("child").unwrap_or(Value::Null);
        }
    }

    // ==========================================================================
    // Story Tests: Labeling a whole manifest
    // ==========================================================================

    #[test]
    fn test_add_app_labels_empty_input() {
        let out = add_app_labels(b"", &app_labels()).unwrap();
        assert!(out.is_empty());
    }

    /// Story: a multi-document manifest with blank documents is relabeled
    #[test]
    fn story_multi_document_manifest_drops_blank_documents() {
        let manifest = b"---\nkind: Service\nmetadata:\n  name: a\n---\n\n---\nkind: Deployment\nmetadata:\n  name: b\n";
        let out = add_app_labels(manifest, &app_labels()).unwrap();

        let docs: Vec<Value> = serde_yaml::Deserializer::from_slice(&out)
            .map(|d| Value::deserialize(d).unwrap())
            .collect();
        assert_eq!(docs.len(), 2);
        for doc in &docs {
            assert_eq!(labels_of(doc)[LABEL_APP_KIND], "git");
        }
        assert_eq!(docs[0]["metadata"]["name"], "a");
        assert_eq!(docs[1]["metadata"]["name"], "b");
    }

    #[test]
    fn test_add_app_labels_output_format() {
        let labels = helm_app_labels("web", "me");
        let out = add_app_labels(b"kind: Pod\n---\nkind: Service\n", &labels).unwrap();
        let expected = "kind: Pod\nmetadata:\n  labels:\n    io.portainer.kubernetes.application.name: web\n    io.portainer.kubernetes.application.owner: me\n---\nkind: Service\nmetadata:\n  labels:\n    io.portainer.kubernetes.application.name: web\n    io.portainer.kubernetes.application.owner: me\n";
        assert_eq!(String::from_utf8(out).unwrap(), expected);
    }

    #[test]
    fn test_add_app_labels_propagates_decode_errors() {
        let err = add_app_labels(b"kind: Pod\n---\nspec: [oops\n", &app_labels()).unwrap_err();
        assert!(matches!(err, crate::Error::Decode { .. }));
    }
}
