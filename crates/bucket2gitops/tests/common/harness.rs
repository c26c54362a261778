//! Test harness for isolated end-to-end runs.
//!
//! The `TestHarness` owns a temporary directory holding:
//! - `bucket/`: a filesystem object store
//! - `output/`: the generated GitOps tree
//! - `config/`: config files written by tests

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;
use walkdir::WalkDir;

use bucket2gitops::config::Config;
use bucket2gitops::store::ObjectStore;
use bucket2gitops::{Generator, GeneratorError, RunReport};

use super::builders::ConfigBuilder;

pub struct TestHarness {
    temp_dir: TempDir,
    pub bucket_dir: PathBuf,
    pub output_dir: PathBuf,
    pub config_dir: PathBuf,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();

        let bucket_dir = base.join("bucket");
        let output_dir = base.join("output");
        let config_dir = base.join("config");

        std::fs::create_dir_all(&bucket_dir).expect("Failed to create bucket dir");
        std::fs::create_dir_all(&output_dir).expect("Failed to create output dir");
        std::fs::create_dir_all(&config_dir).expect("Failed to create config dir");

        Self {
            temp_dir,
            bucket_dir,
            output_dir,
            config_dir,
        }
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Config builder pre-wired to this harness's bucket and output.
    pub fn config(&self) -> ConfigBuilder {
        ConfigBuilder::new()
            .filesystem_root(&self.bucket_dir.display().to_string())
            .output_directory(&self.output_dir.display().to_string())
    }

    /// Stores an object in the filesystem bucket.
    pub fn put_object(&self, key: &str, content: &str) -> PathBuf {
        self.put_bytes(key, content.as_bytes())
    }

    pub fn put_bytes(&self, key: &str, content: &[u8]) -> PathBuf {
        let path = self.bucket_dir.join(key);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create object dir");
        }
        std::fs::write(&path, content).expect("Failed to write object");
        path
    }

    pub fn write_config(&self, filename: &str, config: &Config) -> PathBuf {
        let path = self.config_dir.join(filename);
        let yaml = serde_yaml::to_string(config).expect("Failed to serialize config");
        std::fs::write(&path, yaml).expect("Failed to write config file");
        path
    }

    pub async fn run(&self, config: &Config) -> Result<RunReport, GeneratorError> {
        Generator::from_config(config)?.run().await
    }

    pub async fn run_with_store(
        &self,
        config: &Config,
        store: Arc<dyn ObjectStore>,
    ) -> Result<RunReport, GeneratorError> {
        Generator::with_store(config, store)?.run().await
    }

    pub fn output_path(&self, relative: &str) -> PathBuf {
        self.output_dir.join(relative)
    }

    pub fn read_output(&self, relative: &str) -> String {
        std::fs::read_to_string(self.output_path(relative))
            .unwrap_or_else(|e| panic!("Failed to read output '{}': {}", relative, e))
    }

    pub fn read_output_yaml(&self, relative: &str) -> serde_yaml::Value {
        serde_yaml::from_str(&self.read_output(relative))
            .unwrap_or_else(|e| panic!("Output '{}' is not YAML: {}", relative, e))
    }

    /// Every generated file and its bytes, excluding backups.
    pub fn snapshot(&self) -> BTreeMap<PathBuf, Vec<u8>> {
        WalkDir::new(&self.output_dir)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .map(|e| {
                let relative = e
                    .path()
                    .strip_prefix(&self.output_dir)
                    .expect("walk stays below output")
                    .to_path_buf();
                (relative, std::fs::read(e.path()).expect("readable output"))
            })
            .filter(|(relative, _)| !relative.starts_with(".gitops-backups"))
            .collect()
    }

    pub fn backup_dir_exists(&self) -> bool {
        self.output_dir.join(".gitops-backups").exists()
    }
}
