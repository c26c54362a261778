//! Builders for test configurations and backup manifests.

#![allow(dead_code)]

use bucket2gitops::config::{load_config_from_str, validate_config, Config, PatternConfig};
use bucket2gitops::gitops::{EnvironmentProfile, SyncPolicy};

pub const TEST_REPOSITORY: &str = "https://git.example.com/platform/gitops.git";

/// Builder for a filesystem-backed `Config`.
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        let yaml = format!(
            r#"
store:
  type: filesystem
  root: /nonexistent
  retry:
    maxAttempts: 2
    baseDelayMs: 1
    maxDelayMs: 5
repository:
  url: {}
output:
  directory: ./gitops
  minFreeBytes: 0
"#,
            TEST_REPOSITORY
        );
        let config = load_config_from_str(&yaml).expect("base test config is valid");
        Self { config }
    }

    pub fn filesystem_root(mut self, root: &str) -> Self {
        self.config.store.root = Some(root.to_string());
        self
    }

    pub fn prefix(mut self, prefix: &str) -> Self {
        self.config.store.prefix = prefix.to_string();
        self
    }

    pub fn output_directory(mut self, directory: &str) -> Self {
        self.config.output.directory = directory.to_string();
        self
    }

    pub fn min_free_bytes(mut self, bytes: u64) -> Self {
        self.config.output.min_free_bytes = bytes;
        self
    }

    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.store.batch_size = size;
        self
    }

    pub fn max_object_size(mut self, bytes: usize) -> Self {
        self.config.validation.max_object_size = bytes;
        self
    }

    pub fn max_resources_per_namespace(mut self, max: usize) -> Self {
        self.config.validation.max_resources_per_namespace = max;
        self
    }

    pub fn dangerous_pattern(mut self, name: &str, pattern: &str) -> Self {
        self.config
            .validation
            .dangerous_patterns
            .push(PatternConfig {
                name: name.to_string(),
                pattern: pattern.to_string(),
            });
        self
    }

    pub fn environments(mut self, environments: Vec<EnvironmentProfile>) -> Self {
        self.config.environments = environments;
        self
    }

    pub fn environment(
        mut self,
        name: &str,
        replicas: Option<u32>,
        multiplier: f64,
        sync: SyncPolicy,
    ) -> Self {
        self.config
            .environments
            .push(EnvironmentProfile::new(name, replicas, multiplier, sync));
        self
    }

    pub fn cluster_override(mut self, namespace: &str, environment: &str, endpoint: &str) -> Self {
        self.config
            .cluster_overrides
            .entry(namespace.to_string())
            .or_default()
            .insert(environment.to_string(), endpoint.to_string());
        self
    }

    pub fn preserve_field(mut self, field: &str) -> Self {
        self.config
            .normalization
            .preserve_fields
            .push(field.to_string());
        self
    }

    /// Validated config; panics on an invalid combination.
    pub fn build(self) -> Config {
        validate_config(&self.config).expect("test config should validate");
        self.config
    }

    /// Config without validation, for exercising rejection paths.
    pub fn build_unchecked(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A Deployment as a cluster export would contain it.
pub fn deployment(name: &str, namespace: &str, replicas: u32) -> String {
    format!(
        r#"apiVersion: apps/v1
kind: Deployment
metadata:
  name: {name}
  namespace: {namespace}
  uid: 6f1c2b7e-0c7a-4a43-9a44-7f3f0d1c9a11
  resourceVersion: "483920"
  generation: 7
  creationTimestamp: "2024-03-02T10:00:00Z"
  labels:
    app: {name}
  annotations:
    deployment.kubernetes.io/revision: "7"
    kubectl.kubernetes.io/last-applied-configuration: "{{}}"
spec:
  replicas: {replicas}
  selector:
    matchLabels:
      app: {name}
  template:
    metadata:
      labels:
        app: {name}
    spec:
      containers:
        - name: {name}
          image: registry.example.com/{name}:1.4.2
          ports:
            - containerPort: 8080
status:
  availableReplicas: {replicas}
  readyReplicas: {replicas}
"#
    )
}

/// A ClusterIP Service carrying the cluster-assigned addresses.
pub fn service(name: &str, namespace: &str) -> String {
    format!(
        r#"apiVersion: v1
kind: Service
metadata:
  name: {name}
  namespace: {namespace}
  uid: 0b0cf1de-77a2-4c47-8d4e-5e4c1b2a7f20
  resourceVersion: "1200"
spec:
  clusterIP: 172.30.12.14
  clusterIPs:
    - 172.30.12.14
  selector:
    app: {name}
  ports:
    - port: 80
      targetPort: 8080
status:
  loadBalancer: {{}}
"#
    )
}

pub fn config_map(name: &str, namespace: &str) -> String {
    format!(
        r#"apiVersion: v1
kind: ConfigMap
metadata:
  name: {name}
  namespace: {namespace}
  resourceVersion: "77"
data:
  LOG_LEVEL: info
"#
    )
}

/// A bound claim requesting `storage`.
pub fn persistent_volume_claim(name: &str, namespace: &str, storage: &str) -> String {
    format!(
        r#"apiVersion: v1
kind: PersistentVolumeClaim
metadata:
  name: {name}
  namespace: {namespace}
  annotations:
    pv.kubernetes.io/bind-completed: "yes"
spec:
  accessModes:
    - ReadWriteOnce
  resources:
    requests:
      storage: {storage}
  volumeName: pvc-1d2e3f
status:
  phase: Bound
"#
    )
}
