//! Parsing and cleanup of exported manifests.
//!
//! Backups taken with `kubectl get -o yaml` carry server-assigned state that
//! must not be re-applied: identifiers, timestamps, status, bound volume names
//! and the like. The normalizer strips these through a generic pass over
//! `metadata` followed by the kind's rule table in [`rules`].

pub mod rules;

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::collections::HashSet;
use thiserror::Error;

use crate::classifier::{Classification, ClassificationMethod, ResourceKind};
use rules::FieldRule;

/// Errors raised while turning text into resources.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("Failed to parse YAML: {message}")]
    Parse { message: String },

    #[error("Document is not a mapping")]
    NotAMapping,

    #[error("Document is missing required field '{field}'")]
    MalformedDocument { field: &'static str },

    #[error("Failed to serialize resource '{name}': {message}")]
    Serialize { name: String, message: String },
}

pub type Result<T> = std::result::Result<T, NormalizeError>;

/// A cleaned resource ready for placement in the output tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedResource {
    pub api_version: String,
    /// The `kind` value as written in the manifest.
    pub kind_name: String,
    pub kind: ResourceKind,
    /// Whether `kind` was read from the manifest itself. Resources placed by
    /// filename only are written as they are.
    #[serde(default)]
    pub kind_confirmed: bool,
    pub name: String,
    /// Namespace derived from the object key, not from `metadata.namespace`.
    pub namespace: String,
    pub body: Value,
    /// Output file name within the kind directory.
    pub file_name: String,
}

impl ParsedResource {
    pub fn to_yaml(&self) -> Result<String> {
        render_yaml(&self.body, &self.name)
    }
}

pub(crate) fn render_yaml(value: &Value, name: &str) -> Result<String> {
    serde_yaml::to_string(value).map_err(|e| NormalizeError::Serialize {
        name: name.to_string(),
        message: e.to_string(),
    })
}

/// Resources of one namespace in the order they were ingested.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NamespaceBundle {
    pub namespace: String,
    pub resources: Vec<ParsedResource>,
}

impl NamespaceBundle {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            resources: Vec::new(),
        }
    }

    pub fn push(&mut self, resource: ParsedResource) {
        self.resources.push(resource);
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Counts resources per kind, in directory order.
    pub fn kind_counts(&self) -> Vec<(ResourceKind, usize)> {
        let mut counts: std::collections::BTreeMap<ResourceKind, usize> =
            std::collections::BTreeMap::new();
        for resource in &self.resources {
            *counts.entry(resource.kind).or_default() += 1;
        }
        counts.into_iter().collect()
    }
}

/// Splits a YAML stream into resource documents.
///
/// Empty documents are skipped and `List` wrappers are expanded into their
/// items.
pub fn parse_documents(text: &str) -> Result<Vec<Value>> {
    let mut documents = Vec::new();
    for document in serde_yaml::Deserializer::from_str(text) {
        let value = Value::deserialize(document).map_err(|e| NormalizeError::Parse {
            message: e.to_string(),
        })?;
        push_expanded(value, &mut documents);
    }
    Ok(documents)
}

fn push_expanded(value: Value, out: &mut Vec<Value>) {
    if value.is_null() {
        return;
    }
    if is_list_wrapper(&value) {
        if let Some(Value::Sequence(items)) = value.get("items") {
            out.extend(items.iter().filter(|item| !item.is_null()).cloned());
        }
        return;
    }
    out.push(value);
}

fn is_list_wrapper(value: &Value) -> bool {
    let kind_is_list = value
        .get("kind")
        .and_then(Value::as_str)
        .is_some_and(|kind| kind == "List" || kind.ends_with("List"));
    kind_is_list && matches!(value.get("items"), Some(Value::Sequence(_)))
}

/// Strips cluster-assigned state from documents.
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    preserved_fields: HashSet<String>,
}

impl Normalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps the named metadata fields even though they are normally removed.
    pub fn with_preserved_fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            preserved_fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// Cleans a document whose `kind` field named `kind`.
    pub fn normalize(
        &self,
        document: Value,
        kind: ResourceKind,
        namespace: &str,
        file_name: &str,
    ) -> Result<ParsedResource> {
        let classification = Classification {
            kind,
            method: ClassificationMethod::KindField,
        };
        self.normalize_classified(document, &classification, namespace, file_name)
    }

    /// Cleans a document and wraps it as a [`ParsedResource`].
    ///
    /// Kind rules apply only when the classification came from the `kind`
    /// field; a filename match decides the output directory and nothing else.
    pub fn normalize_classified(
        &self,
        mut document: Value,
        classification: &Classification,
        namespace: &str,
        file_name: &str,
    ) -> Result<ParsedResource> {
        if !document.is_mapping() {
            return Err(NormalizeError::NotAMapping);
        }

        let api_version = required_str(&document, &["apiVersion"], "apiVersion")?;
        let kind_name = required_str(&document, &["kind"], "kind")?;
        let name = required_str(&document, &["metadata", "name"], "metadata.name")?;

        let kind_confirmed = classification.method == ClassificationMethod::KindField;
        let rule_kind = if kind_confirmed {
            classification.kind
        } else {
            ResourceKind::Unknown
        };
        self.clean(&mut document, rule_kind);

        Ok(ParsedResource {
            api_version,
            kind_name,
            kind: classification.kind,
            kind_confirmed,
            name,
            namespace: namespace.to_string(),
            body: document,
            file_name: file_name.to_string(),
        })
    }

    /// Removes cluster-assigned fields in place. Running it twice is a no-op.
    pub fn clean(&self, document: &mut Value, kind: ResourceKind) {
        let Some(root) = document.as_mapping_mut() else {
            return;
        };
        root.shift_remove("status");

        if let Some(metadata) = root.get_mut("metadata").and_then(Value::as_mapping_mut) {
            self.clean_metadata(metadata);
        }

        if rules::has_pod_template(kind) {
            if let Some(template_metadata) = path_mut(document, "spec.template.metadata")
                .and_then(Value::as_mapping_mut)
            {
                self.clean_metadata(template_metadata);
            }
        }

        for rule in rules::rules_for(kind) {
            apply_rule(document, rule);
        }

        // Kind rules may empty a map the generic pass kept.
        if let Some(metadata) = document.get_mut("metadata").and_then(Value::as_mapping_mut) {
            drop_if_empty(metadata, "annotations");
            drop_if_empty(metadata, "labels");
        }
        if let Some(template_metadata) =
            path_mut(document, "spec.template.metadata").and_then(Value::as_mapping_mut)
        {
            drop_if_empty(template_metadata, "labels");
        }
    }

    fn clean_metadata(&self, metadata: &mut Mapping) {
        for field in rules::METADATA_FIELDS {
            if !self.preserved_fields.contains(*field) {
                metadata.shift_remove(*field);
            }
        }

        if let Some(annotations) = metadata
            .get_mut("annotations")
            .and_then(Value::as_mapping_mut)
        {
            annotations.retain(|key, _| {
                !key
                    .as_str()
                    .is_some_and(rules::is_blacklisted_annotation)
            });
        }
        if let Some(labels) = metadata.get_mut("labels").and_then(Value::as_mapping_mut) {
            labels.retain(|key, _| !key.as_str().is_some_and(rules::is_blacklisted_label));
        }

        drop_if_empty(metadata, "annotations");
        drop_if_empty(metadata, "labels");
    }
}

fn required_str(document: &Value, path: &[&str], field: &'static str) -> Result<String> {
    let mut current = document;
    for key in path {
        current = current
            .get(*key)
            .ok_or(NormalizeError::MalformedDocument { field })?;
    }
    match current {
        Value::String(s) if !s.trim().is_empty() => Ok(s.clone()),
        _ => Err(NormalizeError::MalformedDocument { field }),
    }
}

fn drop_if_empty(map: &mut Mapping, key: &str) {
    let empty = match map.get(key) {
        Some(Value::Mapping(m)) => m.is_empty(),
        Some(Value::Null) => true,
        _ => false,
    };
    if empty {
        map.shift_remove(key);
    }
}

fn path_mut<'a>(document: &'a mut Value, path: &str) -> Option<&'a mut Value> {
    path.split('.')
        .try_fold(document, |current, key| current.get_mut(key))
}

/// Splits `a.b.c` into the parent path `a.b` and the leaf `c`.
fn split_leaf(path: &str) -> (Option<&str>, &str) {
    match path.rsplit_once('.') {
        Some((parent, leaf)) => (Some(parent), leaf),
        None => (None, path),
    }
}

fn apply_rule(document: &mut Value, rule: &FieldRule) {
    match *rule {
        FieldRule::Remove(path) => {
            let (parent, leaf) = split_leaf(path);
            remove_key(document, parent, leaf, None);
        }
        FieldRule::RemoveIfEquals(path, expected) => {
            let (parent, leaf) = split_leaf(path);
            remove_key(document, parent, leaf, Some(expected));
        }
        FieldRule::RemoveKey(parent, key) => {
            remove_key(document, Some(parent), key, None);
        }
        FieldRule::RemoveWhen(path, condition, expected) => {
            let holds =
                path_mut(document, condition).is_some_and(|value| value.as_str() == Some(expected));
            if holds {
                let (parent, leaf) = split_leaf(path);
                remove_key(document, parent, leaf, None);
            }
        }
    }
}

fn remove_key(document: &mut Value, parent: Option<&str>, key: &str, only_if: Option<&str>) {
    let target = match parent {
        Some(parent) => path_mut(document, parent),
        None => Some(document),
    };
    let Some(map) = target.and_then(Value::as_mapping_mut) else {
        return;
    };
    let matches = match only_if {
        Some(expected) => map.get(key).and_then(Value::as_str) == Some(expected),
        None => true,
    };
    if matches {
        map.shift_remove(key);
    }
}
