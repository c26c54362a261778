use secrecy::ExposeSecret;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info_span, Instrument};

use super::ingest::{list_prefix, parse_key, IngestOutcome, Ingestor, ObjectKey};
use super::progress::{NoopProgress, ProgressEvent, ProgressReporter};
use super::report::{Diagnostic, DiagnosticKind, RunReport};
use crate::config::{compile_patterns, Config, StoreType};
use crate::error::{ConfigError, GeneratorError, Result};
use crate::gitops::{GeneratedArtifact, GitOpsStructureBuilder, SourceRepository};
use crate::normalizer::Normalizer;
use crate::sanitize;
use crate::storage::{FileManager, FileManagerSettings, WriteResult};
use crate::store::{
    ClientSettings, FilesystemStore, ObjectStore, ObjectStoreClient, ObjectSummary, S3Settings,
    S3Store,
};
use crate::validator::Validator;

/// Drives one run: list, fetch, validate, normalize, build, write.
pub struct Generator {
    store: Arc<dyn ObjectStore>,
    client_settings: ClientSettings,
    prefix: String,
    validator: Validator,
    normalizer: Normalizer,
    builder: GitOpsStructureBuilder,
    output_directory: PathBuf,
    file_settings: FileManagerSettings,
    progress: Arc<dyn ProgressReporter>,
}

/// Creates the configured object store backend. Credentials are resolved here.
pub fn build_store(config: &Config) -> Result<Arc<dyn ObjectStore>> {
    let store = &config.store;
    match store.store_type {
        StoreType::S3 => {
            let access_key = store
                .access_key_source()
                .resolve()
                .map_err(ConfigError::from)?;
            let secret_key = store
                .secret_key_source()
                .resolve()
                .map_err(ConfigError::from)?;
            let s3 = S3Store::new(S3Settings {
                endpoint: store.endpoint.clone().unwrap_or_default(),
                secure: store.secure,
                region: store.region.clone(),
                bucket: store.bucket.clone().unwrap_or_default(),
                access_key: access_key.expose_secret().to_string(),
                secret_key,
                max_connections: store.max_connections,
                connect_timeout: store.connect_timeout(),
                read_timeout: store.read_timeout(),
            })?;
            Ok(Arc::new(s3))
        }
        StoreType::Filesystem => {
            let root = store.root.clone().unwrap_or_default();
            Ok(Arc::new(FilesystemStore::new(root)))
        }
    }
}

impl Generator {
    /// Production constructor: builds the store and every stage from config.
    pub fn from_config(config: &Config) -> Result<Self> {
        let store = build_store(config)?;
        Self::with_store(config, store)
    }

    /// Uses `store` instead of the configured backend.
    pub fn with_store(config: &Config, store: Arc<dyn ObjectStore>) -> Result<Self> {
        let patterns = compile_patterns(config)?;
        let validator = Validator::new(config.validation.limits(), patterns);
        let normalizer =
            Normalizer::with_preserved_fields(config.normalization.preserve_fields.iter().cloned());

        let builder = GitOpsStructureBuilder::new(
            config.environments.clone(),
            SourceRepository {
                url: config.repository.url.clone(),
                target_revision: config.repository.target_revision.clone(),
            },
        )?
        .with_cluster_overrides(config.cluster_overrides.clone());

        Ok(Self {
            store,
            client_settings: ClientSettings {
                max_connections: config.store.max_connections,
                fetch_deadline: config.store.fetch_deadline(),
                batch_size: config.store.batch_size,
                retry: config.store.retry.into(),
            },
            prefix: config.store.prefix.clone(),
            validator,
            normalizer,
            builder,
            output_directory: PathBuf::from(&config.output.directory),
            file_settings: FileManagerSettings {
                min_free_bytes: config.output.min_free_bytes,
                backup_dir: config.output.backup_dir.clone(),
            },
            progress: Arc::new(NoopProgress),
        })
    }

    pub fn with_output_directory<P: AsRef<Path>>(mut self, directory: P) -> Self {
        self.output_directory = directory.as_ref().to_path_buf();
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    pub fn output_directory(&self) -> &Path {
        &self.output_directory
    }

    pub async fn run(&self) -> Result<RunReport> {
        let span = info_span!(
            "generate",
            store = %self.store.describe(),
            prefix = %sanitize::redact_key(&self.prefix),
            repository = %sanitize::redact_url(&self.builder.repository().url),
            output = %self.output_directory.display(),
        );
        self.execute().instrument(span).await
    }

    async fn execute(&self) -> Result<RunReport> {
        let mut report = RunReport::default();

        let client = ObjectStoreClient::connect(self.store.clone(), self.client_settings).await?;
        self.progress.report(ProgressEvent::Connected {
            store: self.store.describe(),
        });

        let mut ingestor = Ingestor::new(&self.validator, &self.normalizer);
        let prefix = list_prefix(&self.prefix);
        let mut lister = client.list_objects(&prefix);

        while let Some(batch) = lister.next_batch().await? {
            report.batches += 1;
            let batch_no = report.batches;
            report.objects_listed += batch.len();
            self.progress.report(ProgressEvent::BatchStarted {
                batch: batch_no,
                objects: batch.len(),
            });
            let before = (
                report.objects_processed,
                report.objects_skipped,
                report.objects_failed,
            );

            let accepted: Vec<ObjectKey> = batch
                .iter()
                .filter_map(|summary| match self.admit(summary) {
                    Ok(key) => Some(key),
                    Err(diagnostic) => {
                        report.objects_skipped += 1;
                        report.push(diagnostic);
                        None
                    }
                })
                .collect();
            for key in &accepted {
                ingestor.register_namespace(&key.namespace);
            }

            let keys: Vec<String> = accepted.iter().map(|k| k.key.clone()).collect();
            let fetched = client
                .fetch_batch(&keys)
                .instrument(info_span!("fetch_batch", batch = batch_no, objects = keys.len()))
                .await;

            {
                let _span = info_span!("ingest_batch", batch = batch_no).entered();
                for (key, (_, result)) in accepted.iter().zip(fetched) {
                    match result {
                        Ok(raw) => match ingestor.ingest(key, &raw, &mut report) {
                            IngestOutcome::Processed { resources } => {
                                report.objects_processed += 1;
                                report.resources += resources;
                            }
                            IngestOutcome::Skipped => report.objects_skipped += 1,
                        },
                        Err(e) if e.is_fatal() => return Err(e.into()),
                        Err(e) => {
                            report.objects_failed += 1;
                            report.push(Diagnostic::fetch(&key.key, &e));
                        }
                    }
                }
            }

            self.progress.report(ProgressEvent::BatchCompleted {
                batch: batch_no,
                processed: report.objects_processed - before.0,
                skipped: report.objects_skipped - before.1,
                failed: report.objects_failed - before.2,
            });
        }

        let bundles = ingestor.into_bundles();
        self.progress.report(ProgressEvent::Building {
            namespaces: bundles.len(),
        });
        let output = {
            let _span = info_span!("build", namespaces = bundles.len()).entered();
            self.builder.build(&bundles)?
        };
        for warning in &output.warnings {
            report.push(Diagnostic::build(warning));
        }
        report.namespaces = output.namespaces;

        self.progress.report(ProgressEvent::Writing {
            artifacts: output.artifacts.len(),
        });
        {
            let _span = info_span!("write", artifacts = output.artifacts.len()).entered();
            self.write_artifacts(&output.artifacts, &mut report)?;
        }

        let status = report.status();
        self.progress.report(ProgressEvent::Finished { status });
        log::info!("{}", report.summary());
        Ok(report)
    }

    /// Key and size checks done before an object is fetched.
    fn admit(&self, summary: &ObjectSummary) -> std::result::Result<ObjectKey, Diagnostic> {
        let key = parse_key(&summary.key, &self.prefix)?;
        let size = usize::try_from(summary.size).unwrap_or(usize::MAX);
        self.validator
            .check_size(size)
            .map_err(|e| Diagnostic::validation(&summary.key, &e))?;
        Ok(key)
    }

    fn write_artifacts(
        &self,
        artifacts: &[GeneratedArtifact],
        report: &mut RunReport,
    ) -> Result<()> {
        let mut files = FileManager::new(&self.output_directory, self.file_settings.clone());
        for artifact in artifacts {
            match files.write(artifact) {
                Ok(WriteResult::Created) => report.files_created += 1,
                Ok(WriteResult::Updated { backup }) => {
                    report.files_updated += 1;
                    report.backups.push(backup);
                }
                Ok(WriteResult::Unchanged) => report.files_unchanged += 1,
                Err(e) if !e.is_fatal() => report.push(Diagnostic::new(
                    artifact.relative_path.display().to_string(),
                    DiagnosticKind::WriteRejected,
                    e.to_string(),
                )),
                Err(e) => return Err(GeneratorError::Storage(e)),
            }
        }
        report.written = files.written_paths().to_vec();
        Ok(())
    }
}
