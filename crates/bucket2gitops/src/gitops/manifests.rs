//! Typed Kustomization and Argo CD Application documents.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::profile::{EnvironmentProfile, SyncPolicy};

pub const KUSTOMIZE_API_VERSION: &str = "kustomize.config.k8s.io/v1beta1";
pub const ARGOCD_API_VERSION: &str = "argoproj.io/v1alpha1";
pub const ARGOCD_NAMESPACE: &str = "argocd";
pub const ARGOCD_PROJECT: &str = "default";
pub const MANAGED_BY: &str = "argocd";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Kustomization {
    pub api_version: String,
    pub kind: String,
    pub namespace: String,
    pub common_labels: BTreeMap<String, String>,
    pub resources: Vec<String>,
}

impl Kustomization {
    pub fn for_overlay(namespace: &str, profile: &EnvironmentProfile, resources: Vec<String>) -> Self {
        let mut common_labels = BTreeMap::new();
        common_labels.insert("environment".to_string(), profile.name.clone());
        common_labels.insert(
            "app.kubernetes.io/managed-by".to_string(),
            MANAGED_BY.to_string(),
        );
        common_labels.insert("app.kubernetes.io/part-of".to_string(), namespace.to_string());

        Self {
            api_version: KUSTOMIZE_API_VERSION.to_string(),
            kind: "Kustomization".to_string(),
            namespace: profile.target_namespace(namespace),
            common_labels,
            resources,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub api_version: String,
    pub kind: String,
    pub metadata: ApplicationMetadata,
    pub spec: ApplicationSpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationMetadata {
    pub name: String,
    pub namespace: String,
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSpec {
    pub project: String,
    pub source: ApplicationSource,
    pub destination: ApplicationDestination,
    pub sync_policy: ApplicationSyncPolicy,
    pub info: Vec<InfoItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSource {
    #[serde(rename = "repoURL")]
    pub repo_url: String,
    pub target_revision: String,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationDestination {
    pub server: String,
    pub namespace: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSyncPolicy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub automated: Option<AutomatedSync>,
    pub sync_options: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomatedSync {
    pub prune: bool,
    pub self_heal: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoItem {
    pub name: String,
    pub value: String,
}

impl InfoItem {
    fn new(name: &str, value: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            value: value.into(),
        }
    }
}

/// Where an Application pulls its manifests from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRepository {
    pub url: String,
    pub target_revision: String,
}

/// Git-relative path of an environment overlay.
pub fn overlay_path(namespace: &str, environment: &str) -> String {
    format!("namespaces/{}/environments/{}", namespace, environment)
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl Application {
    pub fn for_overlay(
        namespace: &str,
        profile: &EnvironmentProfile,
        cluster_endpoint: &str,
        repository: &SourceRepository,
    ) -> Self {
        let target_namespace = profile.target_namespace(namespace);

        let mut labels = BTreeMap::new();
        labels.insert("namespace".to_string(), namespace.to_string());
        labels.insert("environment".to_string(), profile.name.clone());

        let automated = match profile.sync_policy() {
            SyncPolicy::Automated => Some(AutomatedSync {
                prune: true,
                self_heal: true,
            }),
            SyncPolicy::Manual => None,
        };

        Self {
            api_version: ARGOCD_API_VERSION.to_string(),
            kind: "Application".to_string(),
            metadata: ApplicationMetadata {
                name: target_namespace.clone(),
                namespace: ARGOCD_NAMESPACE.to_string(),
                labels,
            },
            spec: ApplicationSpec {
                project: ARGOCD_PROJECT.to_string(),
                source: ApplicationSource {
                    repo_url: repository.url.clone(),
                    target_revision: repository.target_revision.clone(),
                    path: overlay_path(namespace, &profile.name),
                },
                destination: ApplicationDestination {
                    server: cluster_endpoint.to_string(),
                    namespace: target_namespace.clone(),
                },
                sync_policy: ApplicationSyncPolicy {
                    automated,
                    sync_options: vec!["CreateNamespace=true".to_string()],
                },
                info: vec![
                    InfoItem::new("Environment", capitalize(&profile.name)),
                    InfoItem::new("Target Cluster", cluster_endpoint),
                    InfoItem::new("Namespace", target_namespace),
                ],
            },
        }
    }
}
