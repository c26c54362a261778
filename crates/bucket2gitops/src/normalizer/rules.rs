//! Cleanup rule tables.
//!
//! Paths are dot-separated keys from the document root. A rule whose parent
//! path does not exist is a no-op, which keeps cleanup idempotent.

use crate::classifier::ResourceKind;

/// Metadata fields assigned by the API server or controllers.
pub const METADATA_FIELDS: &[&str] = &[
    "uid",
    "resourceVersion",
    "generation",
    "managedFields",
    "creationTimestamp",
    "ownerReferences",
    "selfLink",
    "deletionTimestamp",
    "deletionGracePeriodSeconds",
    "finalizers",
];

/// Annotations removed when their key equals an entry.
pub const ANNOTATION_KEYS: &[&str] = &[
    "kubectl.kubernetes.io/last-applied-configuration",
    "pv.kubernetes.io/bind-completed",
    "pv.kubernetes.io/bound-by-controller",
];

/// Annotations removed when their key starts with an entry.
pub const ANNOTATION_PREFIXES: &[&str] = &[
    "deployment.kubernetes.io/",
    "pv.kubernetes.io/",
    "volume.kubernetes.io/",
    "volume.beta.kubernetes.io/",
    "control-plane.alpha.kubernetes.io/",
];

/// Labels stamped onto objects by controllers.
pub const LABEL_KEYS: &[&str] = &[
    "pod-template-hash",
    "controller-revision-hash",
    "statefulset.kubernetes.io/pod-name",
];

/// A single field-level cleanup step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRule {
    /// Remove the value at a path.
    Remove(&'static str),
    /// Remove the value at a path only when it equals the given string.
    RemoveIfEquals(&'static str, &'static str),
    /// Remove one key from the mapping at a path. Keys may contain dots.
    RemoveKey(&'static str, &'static str),
    /// Remove the value at the first path when the second path holds the
    /// given string.
    RemoveWhen(&'static str, &'static str, &'static str),
}

const SERVICE_RULES: &[FieldRule] = &[
    FieldRule::Remove("spec.clusterIP"),
    FieldRule::Remove("spec.clusterIPs"),
    FieldRule::Remove("spec.internalTrafficPolicy"),
    FieldRule::Remove("spec.externalTrafficPolicy"),
    FieldRule::RemoveWhen("spec.healthCheckNodePort", "spec.type", "LoadBalancer"),
];

const PVC_RULES: &[FieldRule] = &[
    FieldRule::Remove("spec.volumeName"),
    FieldRule::RemoveKey("metadata.annotations", "pv.kubernetes.io/bind-completed"),
    FieldRule::RemoveIfEquals("spec.volumeMode", "Filesystem"),
];

const WORKLOAD_RULES: &[FieldRule] = &[FieldRule::Remove(
    "spec.template.metadata.creationTimestamp",
)];

const DEPLOYMENT_RULES: &[FieldRule] = &[
    FieldRule::Remove("spec.template.metadata.creationTimestamp"),
    FieldRule::Remove("spec.revisionHistoryLimit"),
    FieldRule::Remove("spec.observedGeneration"),
];

const POD_RULES: &[FieldRule] = &[
    FieldRule::Remove("spec.nodeName"),
    FieldRule::Remove("spec.serviceAccount"),
    FieldRule::Remove("metadata.generateName"),
];

const JOB_RULES: &[FieldRule] = &[
    FieldRule::Remove("spec.selector"),
    FieldRule::RemoveKey("spec.template.metadata.labels", "controller-uid"),
    FieldRule::RemoveKey(
        "spec.template.metadata.labels",
        "batch.kubernetes.io/controller-uid",
    ),
];

/// Kind-specific rules, applied in order after the generic metadata cleanup.
pub const KIND_RULES: &[(ResourceKind, &[FieldRule])] = &[
    (ResourceKind::Service, SERVICE_RULES),
    (ResourceKind::PersistentVolumeClaim, PVC_RULES),
    (ResourceKind::Deployment, DEPLOYMENT_RULES),
    (ResourceKind::StatefulSet, WORKLOAD_RULES),
    (ResourceKind::DaemonSet, WORKLOAD_RULES),
    (ResourceKind::Pod, POD_RULES),
    (ResourceKind::Job, JOB_RULES),
];

/// Returns the rules for a kind; kinds without an entry have none.
pub fn rules_for(kind: ResourceKind) -> &'static [FieldRule] {
    KIND_RULES
        .iter()
        .find(|(k, _)| *k == kind)
        .map(|(_, rules)| *rules)
        .unwrap_or(&[])
}

/// Kinds whose pod template metadata is cleaned like top-level metadata.
pub fn has_pod_template(kind: ResourceKind) -> bool {
    matches!(
        kind,
        ResourceKind::Deployment
            | ResourceKind::StatefulSet
            | ResourceKind::DaemonSet
            | ResourceKind::ReplicaSet
            | ResourceKind::DeploymentConfig
            | ResourceKind::Job
    )
}

pub fn is_blacklisted_annotation(key: &str) -> bool {
    ANNOTATION_KEYS.contains(&key) || ANNOTATION_PREFIXES.iter().any(|p| key.starts_with(p))
}

pub fn is_blacklisted_label(key: &str) -> bool {
    LABEL_KEYS.contains(&key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_rules() {
        let rules = rules_for(ResourceKind::Service);
        assert!(rules.contains(&FieldRule::Remove("spec.clusterIP")));
        assert!(rules.contains(&FieldRule::Remove("spec.externalTrafficPolicy")));
        assert!(!rules.contains(&FieldRule::Remove("spec.healthCheckNodePort")));
    }

    #[test]
    fn test_deployment_rules_extend_workload_rules() {
        let rules = rules_for(ResourceKind::Deployment);
        assert!(WORKLOAD_RULES.iter().all(|rule| rules.contains(rule)));
        assert!(rules.contains(&FieldRule::Remove("spec.revisionHistoryLimit")));
        assert_eq!(rules_for(ResourceKind::StatefulSet), WORKLOAD_RULES);
    }

    #[test]
    fn test_kind_without_rules() {
        assert!(rules_for(ResourceKind::ConfigMap).is_empty());
    }

    #[test]
    fn test_annotation_prefix_match() {
        assert!(is_blacklisted_annotation("deployment.kubernetes.io/revision"));
        assert!(is_blacklisted_annotation(
            "kubectl.kubernetes.io/last-applied-configuration"
        ));
        assert!(!is_blacklisted_annotation("kubectl.kubernetes.io/restartedAt"));
        assert!(!is_blacklisted_annotation("example.com/owner"));
    }
}
