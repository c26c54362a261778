pub mod loader;
pub mod schema;

pub use loader::{apply_env_overrides, compile_patterns, load_config, load_config_from_str, validate_config};
pub use schema::{
    Config, NormalizationConfig, OutputConfig, PatternConfig, RepositoryConfig, RetryConfig,
    StoreConfig, StoreType, ValidationConfig,
};
