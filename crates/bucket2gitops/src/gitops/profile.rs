//! Environment profiles: how one namespace is rendered per environment.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::error::{BuildError, Result};
use crate::validator::{validate_identifier, IdentifierField};

/// In-cluster API server address used when a profile names no cluster.
pub const DEFAULT_CLUSTER_ENDPOINT: &str = "https://kubernetes.default.svc";

/// Whether the deployment controller syncs on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncPolicy {
    Automated,
    Manual,
}

impl SyncPolicy {
    /// dev and test sync on their own; every other environment waits for an
    /// operator.
    pub fn default_for(environment: &str) -> SyncPolicy {
        match environment {
            "dev" | "test" => SyncPolicy::Automated,
            _ => SyncPolicy::Manual,
        }
    }
}

impl std::fmt::Display for SyncPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncPolicy::Automated => write!(f, "Auto"),
            SyncPolicy::Manual => write!(f, "Manual"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentProfile {
    pub name: String,
    /// `None` keeps the replicas of the backed-up manifest.
    #[serde(default)]
    pub replica_count: Option<u32>,
    #[serde(default = "default_storage_multiplier")]
    pub storage_multiplier: f64,
    /// `None` falls back to [`SyncPolicy::default_for`] the profile name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_policy: Option<SyncPolicy>,
    #[serde(default = "default_cluster_endpoint")]
    pub cluster_endpoint: String,
}

fn default_storage_multiplier() -> f64 {
    1.0
}

fn default_cluster_endpoint() -> String {
    DEFAULT_CLUSTER_ENDPOINT.to_string()
}

impl EnvironmentProfile {
    pub fn new(
        name: impl Into<String>,
        replica_count: Option<u32>,
        storage_multiplier: f64,
        sync_policy: SyncPolicy,
    ) -> Self {
        Self {
            name: name.into(),
            replica_count,
            storage_multiplier,
            sync_policy: Some(sync_policy),
            cluster_endpoint: default_cluster_endpoint(),
        }
    }

    /// dev, test, preprod and prod.
    pub fn defaults() -> Vec<EnvironmentProfile> {
        vec![
            EnvironmentProfile::new("dev", None, 1.0, SyncPolicy::Automated),
            EnvironmentProfile::new("test", Some(1), 1.0, SyncPolicy::Automated),
            EnvironmentProfile::new("preprod", Some(2), 2.0, SyncPolicy::Manual),
            EnvironmentProfile::new("prod", Some(3), 5.0, SyncPolicy::Manual),
        ]
    }

    pub fn sync_policy(&self) -> SyncPolicy {
        self.sync_policy
            .unwrap_or_else(|| SyncPolicy::default_for(&self.name))
    }

    /// Namespace the overlay is deployed into.
    pub fn target_namespace(&self, namespace: &str) -> String {
        format!("{}-{}", namespace, self.name)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| BuildError::InvalidProfile {
            name: self.name.clone(),
            reason,
        };

        validate_identifier(IdentifierField::Environment, &self.name)
            .map_err(|e| invalid(e.to_string()))?;
        if !self.storage_multiplier.is_finite() || self.storage_multiplier <= 0.0 {
            return Err(invalid(format!(
                "storage multiplier must be a positive number, got {}",
                self.storage_multiplier
            )));
        }
        validate_endpoint(&self.cluster_endpoint).map_err(invalid)?;
        Ok(())
    }
}

pub(crate) fn validate_endpoint(endpoint: &str) -> std::result::Result<(), String> {
    let rest = endpoint
        .strip_prefix("https://")
        .or_else(|| endpoint.strip_prefix("http://"))
        .ok_or_else(|| format!("cluster endpoint '{}' must be an http(s) URL", endpoint))?;
    if rest.is_empty() || rest.starts_with('/') {
        return Err(format!("cluster endpoint '{}' has no host", endpoint));
    }
    Ok(())
}

/// Checks every profile and rejects duplicate names.
pub fn validate_profiles(profiles: &[EnvironmentProfile]) -> Result<()> {
    if profiles.is_empty() {
        return Err(BuildError::NoProfiles);
    }
    let mut seen = HashSet::new();
    for profile in profiles {
        profile.validate()?;
        if !seen.insert(profile.name.as_str()) {
            return Err(BuildError::DuplicateProfile(profile.name.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_profiles() {
        let profiles = EnvironmentProfile::defaults();
        let names: Vec<&str> = profiles.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["dev", "test", "preprod", "prod"]);
        assert_eq!(profiles[0].replica_count, None);
        assert_eq!(profiles[3].replica_count, Some(3));
        assert_eq!(profiles[3].storage_multiplier, 5.0);
        assert_eq!(profiles[1].sync_policy(), SyncPolicy::Automated);
        assert_eq!(profiles[2].sync_policy(), SyncPolicy::Manual);
        assert!(validate_profiles(&profiles).is_ok());
    }

    #[test]
    fn test_target_namespace() {
        let prod = &EnvironmentProfile::defaults()[3];
        assert_eq!(prod.target_namespace("app"), "app-prod");
    }

    #[test]
    fn test_invalid_multiplier_rejected() {
        for bad in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let profile = EnvironmentProfile::new("dev", None, bad, SyncPolicy::Automated);
            assert!(matches!(
                profile.validate(),
                Err(BuildError::InvalidProfile { .. })
            ));
        }
    }

    #[test]
    fn test_invalid_endpoint_rejected() {
        let mut profile = EnvironmentProfile::new("dev", None, 1.0, SyncPolicy::Automated);
        profile.cluster_endpoint = "kubernetes.default.svc".into();
        assert!(profile.validate().is_err());
        profile.cluster_endpoint = "https://".into();
        assert!(profile.validate().is_err());
        profile.cluster_endpoint = "https://api.prod.example:6443".into();
        assert!(profile.validate().is_ok());
    }

    #[test]
    fn test_duplicate_and_empty_profiles() {
        let dev = EnvironmentProfile::new("dev", None, 1.0, SyncPolicy::Automated);
        assert_eq!(
            validate_profiles(&[dev.clone(), dev]),
            Err(BuildError::DuplicateProfile("dev".into()))
        );
        assert_eq!(validate_profiles(&[]), Err(BuildError::NoProfiles));
    }

    #[test]
    fn test_profile_from_yaml() {
        let profile: EnvironmentProfile = serde_yaml::from_str(
            "name: staging\nreplicaCount: 2\nsyncPolicy: manual\n",
        )
        .unwrap();
        assert_eq!(profile.storage_multiplier, 1.0);
        assert_eq!(profile.cluster_endpoint, DEFAULT_CLUSTER_ENDPOINT);
        assert_eq!(profile.sync_policy(), SyncPolicy::Manual);
    }

    #[test]
    fn test_sync_policy_defaults_by_name() {
        let parse = |yaml: &str| serde_yaml::from_str::<EnvironmentProfile>(yaml).unwrap();

        let dev = parse("name: dev\n");
        assert_eq!(dev.sync_policy, None);
        assert_eq!(dev.sync_policy(), SyncPolicy::Automated);
        assert_eq!(parse("name: test\nreplicaCount: 1\n").sync_policy(), SyncPolicy::Automated);
        assert_eq!(parse("name: preprod\n").sync_policy(), SyncPolicy::Manual);
        assert_eq!(parse("name: prod\n").sync_policy(), SyncPolicy::Manual);
        assert_eq!(parse("name: staging\n").sync_policy(), SyncPolicy::Manual);
        assert_eq!(
            parse("name: prod\nsyncPolicy: automated\n").sync_policy(),
            SyncPolicy::Automated
        );
    }
}
