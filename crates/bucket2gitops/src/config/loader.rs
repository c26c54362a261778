use std::collections::HashSet;
use std::path::Path;

use crate::config::schema::{Config, StoreType};
use crate::error::ConfigError;
use crate::gitops::profile::{validate_endpoint, validate_profiles};
use crate::validator::{validate_identifier, DangerousPattern, IdentifierField};

/// Reads, parses, applies environment overrides and validates a config file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    let config = parse_config(&content, path)?;
    let config = apply_env_overrides(config, |name| std::env::var(name).ok())?;
    validate_config(&config)?;
    Ok(config)
}

/// Parses and validates config text without consulting the environment.
pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let config = parse_config(content, Path::new("<inline>"))?;
    validate_config(&config)?;
    Ok(config)
}

fn parse_config(content: &str, path: &Path) -> Result<Config, ConfigError> {
    serde_yaml::from_str(content).map_err(|e| ConfigError::ParseYaml {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Applies `MINIO_*` and `GIT_REPOSITORY` overrides. `lookup` returns the
/// value of an environment variable, if set.
pub fn apply_env_overrides<F>(mut config: Config, lookup: F) -> Result<Config, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(endpoint) = get("MINIO_ENDPOINT") {
        config.store.endpoint = Some(endpoint);
    }
    if let Some(access_key) = get("MINIO_ACCESS_KEY") {
        config.store.access_key = Some(access_key);
    }
    if let Some(secret_key) = get("MINIO_SECRET_KEY") {
        config.store.secret_key = Some(secret_key);
    }
    if let Some(bucket) = get("MINIO_BUCKET") {
        config.store.bucket = Some(bucket);
    }
    if let Some(prefix) = get("MINIO_PREFIX") {
        config.store.prefix = prefix;
    }
    if let Some(region) = get("MINIO_REGION") {
        config.store.region = region;
    }
    if let Some(secure) = get("MINIO_SECURE") {
        config.store.secure = parse_bool(&secure).ok_or_else(|| {
            ConfigError::validation(format!("MINIO_SECURE must be true or false, got '{}'", secure))
        })?;
    }
    if let Some(url) = get("GIT_REPOSITORY") {
        config.repository.url = url;
    }
    Ok(config)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    validate_store(config)?;

    if config.repository.url.trim().is_empty() {
        return Err(ConfigError::validation("repository.url must not be empty"));
    }
    if config.repository.target_revision.trim().is_empty() {
        return Err(ConfigError::validation(
            "repository.targetRevision must not be empty",
        ));
    }
    if config.output.directory.trim().is_empty() {
        return Err(ConfigError::validation("output.directory must not be empty"));
    }

    validate_profiles(&config.environments)?;

    let environments: HashSet<&str> = config
        .environments
        .iter()
        .map(|p| p.name.as_str())
        .collect();
    for (namespace, endpoints) in &config.cluster_overrides {
        validate_identifier(IdentifierField::Namespace, namespace).map_err(|e| {
            ConfigError::validation(format!("clusterOverrides: {}", e))
        })?;
        for (environment, endpoint) in endpoints {
            if !environments.contains(environment.as_str()) {
                return Err(ConfigError::validation(format!(
                    "clusterOverrides.{} names unknown environment '{}'",
                    namespace, environment
                )));
            }
            validate_endpoint(endpoint).map_err(|reason| {
                ConfigError::validation(format!(
                    "clusterOverrides.{}.{}: {}",
                    namespace, environment, reason
                ))
            })?;
        }
    }

    let v = &config.validation;
    for (name, value) in [
        ("maxObjectSize", v.max_object_size),
        ("maxDepth", v.max_depth),
        ("maxCollectionLength", v.max_collection_length),
        ("maxStringLength", v.max_string_length),
        ("maxResourcesPerNamespace", v.max_resources_per_namespace),
    ] {
        if value == 0 {
            return Err(ConfigError::validation(format!(
                "validation.{} must be greater than zero",
                name
            )));
        }
    }
    compile_patterns(config)?;

    if config
        .normalization
        .preserve_fields
        .iter()
        .any(|f| f.trim().is_empty())
    {
        return Err(ConfigError::validation(
            "normalization.preserveFields must not contain empty names",
        ));
    }

    Ok(())
}

fn validate_store(config: &Config) -> Result<(), ConfigError> {
    let store = &config.store;
    let missing = |field: &str| {
        ConfigError::validation(format!("store.{} is required for a {:?} store", field, store.store_type))
    };
    let is_blank = |v: &Option<String>| v.as_deref().map_or(true, |s| s.trim().is_empty());

    match store.store_type {
        StoreType::S3 => {
            if is_blank(&store.endpoint) {
                return Err(missing("endpoint"));
            }
            if is_blank(&store.bucket) {
                return Err(missing("bucket"));
            }
            if !store.access_key_source().is_configured() {
                return Err(missing("accessKey"));
            }
            if !store.secret_key_source().is_configured() {
                return Err(missing("secretKey"));
            }
        }
        StoreType::Filesystem => {
            if is_blank(&store.root) {
                return Err(missing("root"));
            }
        }
    }

    if store.max_connections == 0 {
        return Err(ConfigError::validation("store.maxConnections must be greater than zero"));
    }
    if store.batch_size == 0 {
        return Err(ConfigError::validation("store.batchSize must be greater than zero"));
    }
    if store.fetch_deadline_secs == 0 {
        return Err(ConfigError::validation(
            "store.fetchDeadlineSecs must be greater than zero",
        ));
    }
    if store.retry.max_attempts == 0 {
        return Err(ConfigError::validation(
            "store.retry.maxAttempts must be at least 1",
        ));
    }
    if store.retry.base_delay_ms > store.retry.max_delay_ms {
        return Err(ConfigError::validation(
            "store.retry.baseDelayMs must not exceed maxDelayMs",
        ));
    }
    Ok(())
}

/// Compiles the configured dangerous-content rules, or the built-in set when
/// none are configured.
pub fn compile_patterns(config: &Config) -> Result<Vec<DangerousPattern>, ConfigError> {
    let configured = &config.validation.dangerous_patterns;
    if configured.is_empty() {
        return Ok(crate::validator::default_patterns());
    }

    let mut names = HashSet::new();
    configured
        .iter()
        .map(|p| {
            if !names.insert(p.name.as_str()) {
                return Err(ConfigError::InvalidPattern {
                    name: p.name.clone(),
                    reason: "duplicate pattern name".to_string(),
                });
            }
            DangerousPattern::new(p.name.clone(), &p.pattern).map_err(|e| {
                ConfigError::InvalidPattern {
                    name: p.name.clone(),
                    reason: e.to_string(),
                }
            })
        })
        .collect()
}
