use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::gitops::EnvironmentProfile;
use crate::secrets::SecretSource;
use crate::storage::{DEFAULT_BACKUP_DIR, DEFAULT_MIN_FREE_BYTES};
use crate::store::client::{
    DEFAULT_BATCH_SIZE, DEFAULT_CONNECT_TIMEOUT, DEFAULT_FETCH_DEADLINE, DEFAULT_MAX_CONNECTIONS,
    DEFAULT_READ_TIMEOUT,
};
use crate::store::RetryPolicy;
use crate::validator::{
    ValidationLimits, DEFAULT_MAX_COLLECTION_LENGTH, DEFAULT_MAX_DEPTH, DEFAULT_MAX_OBJECT_SIZE,
    DEFAULT_MAX_RESOURCES_PER_NAMESPACE, DEFAULT_MAX_STRING_LENGTH,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub store: StoreConfig,
    pub repository: RepositoryConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default = "EnvironmentProfile::defaults")]
    pub environments: Vec<EnvironmentProfile>,
    /// namespace → environment → cluster endpoint
    #[serde(default)]
    pub cluster_overrides: BTreeMap<String, BTreeMap<String, String>>,
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub normalization: NormalizationConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreType {
    #[default]
    S3,
    Filesystem,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreConfig {
    #[serde(rename = "type", default)]
    pub store_type: StoreType,
    /// `host[:port]` or a full URL; S3 only.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub secure: bool,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default)]
    pub bucket: Option<String>,
    /// Local directory standing in for a bucket; filesystem only.
    #[serde(default)]
    pub root: Option<String>,
    #[serde(default)]
    pub prefix: String,

    #[serde(default)]
    pub access_key: Option<String>,
    #[serde(default)]
    pub access_key_file: Option<String>,
    #[serde(default)]
    pub access_key_env_var: Option<String>,
    #[serde(default)]
    pub secret_key: Option<String>,
    #[serde(default)]
    pub secret_key_file: Option<String>,
    #[serde(default)]
    pub secret_key_env_var: Option<String>,

    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,
    #[serde(default = "default_fetch_deadline_secs")]
    pub fetch_deadline_secs: u64,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_max_connections() -> usize {
    DEFAULT_MAX_CONNECTIONS
}

fn default_connect_timeout_secs() -> u64 {
    DEFAULT_CONNECT_TIMEOUT.as_secs()
}

fn default_read_timeout_secs() -> u64 {
    DEFAULT_READ_TIMEOUT.as_secs()
}

fn default_fetch_deadline_secs() -> u64 {
    DEFAULT_FETCH_DEADLINE.as_secs()
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

impl StoreConfig {
    pub fn access_key_source(&self) -> SecretSource {
        SecretSource {
            value: self.access_key.clone(),
            file: self.access_key_file.clone(),
            env_var: self.access_key_env_var.clone(),
        }
    }

    pub fn secret_key_source(&self) -> SecretSource {
        SecretSource {
            value: self.secret_key.clone(),
            file: self.secret_key_file.clone(),
            env_var: self.secret_key_env_var.clone(),
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn fetch_deadline(&self) -> Duration {
        Duration::from_secs(self.fetch_deadline_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    30_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl From<RetryConfig> for RetryPolicy {
    fn from(config: RetryConfig) -> Self {
        RetryPolicy {
            max_attempts: config.max_attempts,
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryConfig {
    pub url: String,
    #[serde(default = "default_target_revision")]
    pub target_revision: String,
}

fn default_target_revision() -> String {
    "main".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputConfig {
    #[serde(default = "default_output_directory")]
    pub directory: String,
    #[serde(default = "default_min_free_bytes")]
    pub min_free_bytes: u64,
    #[serde(default = "default_backup_dir")]
    pub backup_dir: String,
}

fn default_output_directory() -> String {
    "./gitops".to_string()
}

fn default_min_free_bytes() -> u64 {
    DEFAULT_MIN_FREE_BYTES
}

fn default_backup_dir() -> String {
    DEFAULT_BACKUP_DIR.to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_directory(),
            min_free_bytes: default_min_free_bytes(),
            backup_dir: default_backup_dir(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationConfig {
    #[serde(default = "default_max_object_size")]
    pub max_object_size: usize,
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    #[serde(default = "default_max_collection_length")]
    pub max_collection_length: usize,
    #[serde(default = "default_max_string_length")]
    pub max_string_length: usize,
    #[serde(default = "default_max_resources_per_namespace")]
    pub max_resources_per_namespace: usize,
    /// Replaces the built-in dangerous-content rules when non-empty.
    #[serde(default)]
    pub dangerous_patterns: Vec<PatternConfig>,
}

fn default_max_object_size() -> usize {
    DEFAULT_MAX_OBJECT_SIZE
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

fn default_max_collection_length() -> usize {
    DEFAULT_MAX_COLLECTION_LENGTH
}

fn default_max_string_length() -> usize {
    DEFAULT_MAX_STRING_LENGTH
}

fn default_max_resources_per_namespace() -> usize {
    DEFAULT_MAX_RESOURCES_PER_NAMESPACE
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_object_size: default_max_object_size(),
            max_depth: default_max_depth(),
            max_collection_length: default_max_collection_length(),
            max_string_length: default_max_string_length(),
            max_resources_per_namespace: default_max_resources_per_namespace(),
            dangerous_patterns: Vec::new(),
        }
    }
}

impl ValidationConfig {
    pub fn limits(&self) -> ValidationLimits {
        ValidationLimits {
            max_object_size: self.max_object_size,
            max_depth: self.max_depth,
            max_collection_length: self.max_collection_length,
            max_string_length: self.max_string_length,
            max_resources_per_namespace: self.max_resources_per_namespace,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternConfig {
    pub name: String,
    pub pattern: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizationConfig {
    /// Metadata fields kept even though they are normally stripped.
    #[serde(default)]
    pub preserve_fields: Vec<String>,
}
