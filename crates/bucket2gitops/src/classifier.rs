//! Maps manifests to a resource kind and the directory they are written to.
//!
//! The `kind` field of the document is authoritative. Only when it is missing
//! or names a kind outside the table does the classifier fall back to matching
//! the source filename against an ordered list of substrings.

use serde::{Deserialize, Serialize};
use serde_yaml::Value;

/// The kinds the generator knows how to place.
///
/// Declaration order is the directory order used in generated kustomizations,
/// so the derived `Ord` doubles as the output ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKind {
    Deployment,
    Service,
    ConfigMap,
    Secret,
    PersistentVolumeClaim,
    Route,
    StatefulSet,
    DaemonSet,
    ImageStream,
    CronJob,
    HorizontalPodAutoscaler,
    ServiceAccount,
    Job,
    Ingress,
    NetworkPolicy,
    Role,
    RoleBinding,
    BuildConfig,
    DeploymentConfig,
    ReplicaSet,
    PodDisruptionBudget,
    Pod,
    Unknown,
}

impl ResourceKind {
    /// Returns the directory name for storing resources of this kind.
    pub fn directory(&self) -> &'static str {
        match self {
            ResourceKind::Deployment => "deployments",
            ResourceKind::Service => "services",
            ResourceKind::ConfigMap => "configmaps",
            ResourceKind::Secret => "secrets",
            ResourceKind::PersistentVolumeClaim => "persistentvolumeclaims",
            ResourceKind::Route => "routes",
            ResourceKind::StatefulSet => "statefulsets",
            ResourceKind::DaemonSet => "daemonsets",
            ResourceKind::ImageStream => "imagestreams",
            ResourceKind::CronJob => "cronjobs",
            ResourceKind::HorizontalPodAutoscaler => "hpa",
            ResourceKind::ServiceAccount => "serviceaccounts",
            ResourceKind::Job => "jobs",
            ResourceKind::Ingress => "ingress",
            ResourceKind::NetworkPolicy => "networkpolicies",
            ResourceKind::Role => "roles",
            ResourceKind::RoleBinding => "rolebindings",
            ResourceKind::BuildConfig => "buildconfigs",
            ResourceKind::DeploymentConfig => "deploymentconfigs",
            ResourceKind::ReplicaSet => "replicasets",
            ResourceKind::PodDisruptionBudget => "poddisruptionbudgets",
            ResourceKind::Pod => "pods",
            ResourceKind::Unknown => "other",
        }
    }

    /// Returns all resource kinds in directory order.
    pub fn all() -> &'static [ResourceKind] {
        &[
            ResourceKind::Deployment,
            ResourceKind::Service,
            ResourceKind::ConfigMap,
            ResourceKind::Secret,
            ResourceKind::PersistentVolumeClaim,
            ResourceKind::Route,
            ResourceKind::StatefulSet,
            ResourceKind::DaemonSet,
            ResourceKind::ImageStream,
            ResourceKind::CronJob,
            ResourceKind::HorizontalPodAutoscaler,
            ResourceKind::ServiceAccount,
            ResourceKind::Job,
            ResourceKind::Ingress,
            ResourceKind::NetworkPolicy,
            ResourceKind::Role,
            ResourceKind::RoleBinding,
            ResourceKind::BuildConfig,
            ResourceKind::DeploymentConfig,
            ResourceKind::ReplicaSet,
            ResourceKind::PodDisruptionBudget,
            ResourceKind::Pod,
            ResourceKind::Unknown,
        ]
    }

    /// Whether `spec.replicas` on this kind is rewritten per environment.
    pub fn has_replicas(&self) -> bool {
        matches!(
            self,
            ResourceKind::Deployment
                | ResourceKind::StatefulSet
                | ResourceKind::DeploymentConfig
                | ResourceKind::ReplicaSet
        )
    }

    /// Looks up a manifest `kind` value in the table.
    pub fn from_kind_name(name: &str) -> Option<ResourceKind> {
        ResourceKind::all()
            .iter()
            .copied()
            .filter(|kind| *kind != ResourceKind::Unknown)
            .find(|kind| kind.to_string() == name)
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ResourceKind::Deployment => "Deployment",
            ResourceKind::Service => "Service",
            ResourceKind::ConfigMap => "ConfigMap",
            ResourceKind::Secret => "Secret",
            ResourceKind::PersistentVolumeClaim => "PersistentVolumeClaim",
            ResourceKind::Route => "Route",
            ResourceKind::StatefulSet => "StatefulSet",
            ResourceKind::DaemonSet => "DaemonSet",
            ResourceKind::ImageStream => "ImageStream",
            ResourceKind::CronJob => "CronJob",
            ResourceKind::HorizontalPodAutoscaler => "HorizontalPodAutoscaler",
            ResourceKind::ServiceAccount => "ServiceAccount",
            ResourceKind::Job => "Job",
            ResourceKind::Ingress => "Ingress",
            ResourceKind::NetworkPolicy => "NetworkPolicy",
            ResourceKind::Role => "Role",
            ResourceKind::RoleBinding => "RoleBinding",
            ResourceKind::BuildConfig => "BuildConfig",
            ResourceKind::DeploymentConfig => "DeploymentConfig",
            ResourceKind::ReplicaSet => "ReplicaSet",
            ResourceKind::PodDisruptionBudget => "PodDisruptionBudget",
            ResourceKind::Pod => "Pod",
            ResourceKind::Unknown => "Unknown",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceKind::all()
            .iter()
            .copied()
            .find(|kind| kind.to_string().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown resource kind: {}", s))
    }
}

/// Filename substrings tried in order when the `kind` field cannot be used.
///
/// More specific words come first: `serviceaccount` must win over `service`.
const FILENAME_PATTERNS: &[(&[&str], ResourceKind)] = &[
    (&["statefulset"], ResourceKind::StatefulSet),
    (&["daemonset"], ResourceKind::DaemonSet),
    (&["serviceaccount"], ResourceKind::ServiceAccount),
    (&["deploymentconfig"], ResourceKind::DeploymentConfig),
    (&["deploy"], ResourceKind::Deployment),
    (&["service", "svc"], ResourceKind::Service),
    (&["config", "cm"], ResourceKind::ConfigMap),
    (&["secret"], ResourceKind::Secret),
    (&["pvc", "persistent"], ResourceKind::PersistentVolumeClaim),
    (&["route"], ResourceKind::Route),
    (&["ingress"], ResourceKind::Ingress),
    (&["cron", "job"], ResourceKind::CronJob),
    (&["hpa", "autoscal"], ResourceKind::HorizontalPodAutoscaler),
    (&["image", "stream"], ResourceKind::ImageStream),
    (&["network", "policy"], ResourceKind::NetworkPolicy),
];

/// How a classification was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassificationMethod {
    KindField,
    FilenamePattern,
    Unmatched,
}

/// Result of classifying one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub kind: ResourceKind,
    pub method: ClassificationMethod,
}

impl Classification {
    pub fn directory(&self) -> &'static str {
        self.kind.directory()
    }
}

/// Classifies a document, falling back to its source filename.
pub fn classify(document: &Value, source_filename: &str) -> Classification {
    if let Some(kind) = document
        .get("kind")
        .and_then(Value::as_str)
        .and_then(ResourceKind::from_kind_name)
    {
        return Classification {
            kind,
            method: ClassificationMethod::KindField,
        };
    }

    match classify_filename(source_filename) {
        Some(kind) => Classification {
            kind,
            method: ClassificationMethod::FilenamePattern,
        },
        None => Classification {
            kind: ResourceKind::Unknown,
            method: ClassificationMethod::Unmatched,
        },
    }
}

/// Matches a filename case-insensitively against the fallback patterns.
pub fn classify_filename(filename: &str) -> Option<ResourceKind> {
    let lower = filename.to_lowercase();
    FILENAME_PATTERNS
        .iter()
        .find(|(words, _)| words.iter().any(|word| lower.contains(word)))
        .map(|(_, kind)| *kind)
}
