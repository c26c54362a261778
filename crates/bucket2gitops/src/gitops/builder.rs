use serde_yaml::{Mapping, Value};
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;

use super::error::{BuildError, Result};
use super::manifests::{overlay_path, Application, Kustomization, SourceRepository};
use super::profile::{validate_profiles, EnvironmentProfile};
use super::quantity::Quantity;
use super::readme::{render_namespace_readme, render_root_readme, EnvironmentSummary, NamespaceSummary};
use super::{ArtifactKind, GeneratedArtifact};
use crate::classifier::ResourceKind;
use crate::normalizer::{render_yaml, NamespaceBundle, ParsedResource};

/// Storage assumed for claims whose request cannot be read.
pub const DEFAULT_STORAGE: &str = "10Gi";

/// Non-fatal findings of a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildWarning {
    NoResourcesForNamespace {
        namespace: String,
    },
    StorageFallback {
        namespace: String,
        resource: String,
        reason: String,
    },
}

#[derive(Debug, Default)]
pub struct BuildOutput {
    pub artifacts: Vec<GeneratedArtifact>,
    pub warnings: Vec<BuildWarning>,
    /// Namespaces that produced artifacts, in build order.
    pub namespaces: Vec<String>,
}

/// Largest claim of a namespace, with its request as declared.
#[derive(Debug, Clone)]
struct BaseStorage {
    quantity: Quantity,
    declared: String,
}

impl BaseStorage {
    /// Request for an overlay. A multiplier of 1 keeps the declared text.
    fn for_multiplier(&self, multiplier: f64) -> String {
        if multiplier == 1.0 {
            self.declared.clone()
        } else {
            self.quantity.scale(multiplier).to_string()
        }
    }
}

/// A resource and the path it is written to inside an overlay.
struct Placement<'a> {
    resource: &'a ParsedResource,
    index: usize,
    relative: String,
}

/// Turns namespace bundles into overlays, Applications and READMEs.
#[derive(Debug, Clone)]
pub struct GitOpsStructureBuilder {
    profiles: Vec<EnvironmentProfile>,
    repository: SourceRepository,
    /// namespace → environment → cluster endpoint
    cluster_overrides: BTreeMap<String, BTreeMap<String, String>>,
    default_storage: Quantity,
}

impl GitOpsStructureBuilder {
    pub fn new(profiles: Vec<EnvironmentProfile>, repository: SourceRepository) -> Result<Self> {
        validate_profiles(&profiles)?;
        if repository.url.trim().is_empty() {
            return Err(BuildError::MissingRepository);
        }
        let default_storage = DEFAULT_STORAGE
            .parse::<Quantity>()
            .map_err(|reason| BuildError::InvalidProfile {
                name: "default".to_string(),
                reason,
            })?;
        Ok(Self {
            profiles,
            repository,
            cluster_overrides: BTreeMap::new(),
            default_storage,
        })
    }

    pub fn with_cluster_overrides(
        mut self,
        overrides: BTreeMap<String, BTreeMap<String, String>>,
    ) -> Self {
        self.cluster_overrides = overrides;
        self
    }

    pub fn profiles(&self) -> &[EnvironmentProfile] {
        &self.profiles
    }

    pub fn repository(&self) -> &SourceRepository {
        &self.repository
    }

    fn cluster_for<'a>(&'a self, namespace: &str, profile: &'a EnvironmentProfile) -> &'a str {
        self.cluster_overrides
            .get(namespace)
            .and_then(|envs| envs.get(&profile.name))
            .map(String::as_str)
            .unwrap_or(&profile.cluster_endpoint)
    }

    /// Builds every namespace, then the root README.
    pub fn build(&self, bundles: &[NamespaceBundle]) -> Result<BuildOutput> {
        let mut output = BuildOutput::default();
        let mut summaries = Vec::new();

        for bundle in bundles {
            let _span = tracing::info_span!(
                "build_namespace",
                namespace = %bundle.namespace,
                resources = bundle.len()
            )
            .entered();

            if bundle.is_empty() {
                log::warn!("Namespace '{}' has no resources, skipping", bundle.namespace);
                output.warnings.push(BuildWarning::NoResourcesForNamespace {
                    namespace: bundle.namespace.clone(),
                });
                continue;
            }

            let summary = self.build_namespace(bundle, &mut output)?;
            output.namespaces.push(bundle.namespace.clone());
            summaries.push(summary);
        }

        if !summaries.is_empty() {
            output.artifacts.push(GeneratedArtifact {
                relative_path: PathBuf::from("README.md"),
                content: render_root_readme(&summaries).into_bytes(),
                kind: ArtifactKind::Readme,
            });
        }
        Ok(output)
    }

    fn build_namespace(
        &self,
        bundle: &NamespaceBundle,
        output: &mut BuildOutput,
    ) -> Result<NamespaceSummary> {
        let namespace = bundle.namespace.as_str();
        let placements = place(bundle);
        let base_storage = self.base_storage(bundle, &mut output.warnings);

        let mut kustomize_order: Vec<&Placement<'_>> = placements.iter().collect();
        kustomize_order.sort_by_key(|p| (p.resource.kind, p.index));
        let resource_list: Vec<String> =
            kustomize_order.iter().map(|p| p.relative.clone()).collect();

        let mut environments = Vec::with_capacity(self.profiles.len());
        for profile in &self.profiles {
            let overlay = overlay_path(namespace, &profile.name);

            for placement in &placements {
                let body = render_for_profile(placement.resource, profile, base_storage.as_ref());
                let yaml = render_yaml(&body, &placement.resource.name)
                    .map_err(|e| BuildError::serialize(&placement.relative, e))?;
                output.artifacts.push(GeneratedArtifact {
                    relative_path: PathBuf::from(format!("{}/{}", overlay, placement.relative)),
                    content: yaml.into_bytes(),
                    kind: ArtifactKind::Manifest,
                });
            }

            let kustomization =
                Kustomization::for_overlay(namespace, profile, resource_list.clone());
            output.artifacts.push(GeneratedArtifact {
                relative_path: PathBuf::from(format!("{}/kustomization.yaml", overlay)),
                content: serde_yaml::to_string(&kustomization)
                    .map_err(|e| BuildError::serialize("kustomization", e))?
                    .into_bytes(),
                kind: ArtifactKind::Kustomization,
            });

            let cluster = self.cluster_for(namespace, profile);
            let application = Application::for_overlay(namespace, profile, cluster, &self.repository);
            output.artifacts.push(GeneratedArtifact {
                relative_path: PathBuf::from(format!(
                    "namespaces/{}/argocd-apps/{}.yaml",
                    namespace, profile.name
                )),
                content: serde_yaml::to_string(&application)
                    .map_err(|e| BuildError::serialize("application", e))?
                    .into_bytes(),
                kind: ArtifactKind::Application,
            });

            environments.push(EnvironmentSummary {
                name: profile.name.clone(),
                cluster_endpoint: cluster.to_string(),
                target_namespace: profile.target_namespace(namespace),
                sync_policy: profile.sync_policy(),
                replica_count: profile.replica_count,
                storage: base_storage
                    .as_ref()
                    .map(|base| base.for_multiplier(profile.storage_multiplier)),
            });
        }

        let summary = NamespaceSummary {
            namespace: namespace.to_string(),
            kind_counts: bundle.kind_counts(),
            environments,
        };
        output.artifacts.push(GeneratedArtifact {
            relative_path: PathBuf::from(format!("namespaces/{}/README.md", namespace)),
            content: render_namespace_readme(&summary).into_bytes(),
            kind: ArtifactKind::Readme,
        });

        log::info!(
            "Built namespace '{}': {} resources across {} environments",
            namespace,
            placements.len(),
            self.profiles.len()
        );
        Ok(summary)
    }

    /// Largest declared claim in the namespace; unreadable claims count as
    /// the default and are reported once.
    fn base_storage(
        &self,
        bundle: &NamespaceBundle,
        warnings: &mut Vec<BuildWarning>,
    ) -> Option<BaseStorage> {
        let mut base: Option<BaseStorage> = None;
        for resource in &bundle.resources {
            for request in storage_requests(resource) {
                let (quantity, declared) = match request.parse::<Quantity>() {
                    Ok(q) => (q, request),
                    Err(reason) => {
                        log::warn!(
                            "Storage request of '{}' in '{}' unusable ({}), assuming {}",
                            resource.name,
                            bundle.namespace,
                            reason,
                            DEFAULT_STORAGE
                        );
                        warnings.push(BuildWarning::StorageFallback {
                            namespace: bundle.namespace.clone(),
                            resource: resource.name.clone(),
                            reason,
                        });
                        (self.default_storage, DEFAULT_STORAGE.to_string())
                    }
                };
                if base
                    .as_ref()
                    .map_or(true, |b| quantity.bytes() > b.quantity.bytes())
                {
                    base = Some(BaseStorage { quantity, declared });
                }
            }
        }
        base
    }
}

/// Copy of the resource body with replicas and storage set for a profile.
///
/// Every claim gets the namespace's base storage times the multiplier; with
/// a multiplier of 1 claims keep their own request. Resources placed by
/// filename only are copied unchanged.
fn render_for_profile(
    resource: &ParsedResource,
    profile: &EnvironmentProfile,
    base: Option<&BaseStorage>,
) -> Value {
    let mut body = resource.body.clone();
    if !resource.kind_confirmed {
        return body;
    }

    if resource.kind.has_replicas() {
        if let Some(replicas) = profile.replica_count {
            if let Some(spec) = body.get_mut("spec").and_then(Value::as_mapping_mut) {
                spec.insert(Value::from("replicas"), Value::from(replicas));
            }
        }
    }

    let Some(base) = base else {
        return body;
    };
    if profile.storage_multiplier == 1.0 {
        return body;
    }
    let storage = Value::from(base.for_multiplier(profile.storage_multiplier));

    match resource.kind {
        ResourceKind::PersistentVolumeClaim => {
            if body.get("spec").is_some_and(Value::is_mapping) {
                set_storage(&mut body, storage);
            }
        }
        ResourceKind::StatefulSet => {
            if let Some(Value::Sequence(templates)) = body
                .get_mut("spec")
                .and_then(|spec| spec.get_mut("volumeClaimTemplates"))
            {
                for template in templates.iter_mut().filter(|t| t.is_mapping()) {
                    set_storage(template, storage.clone());
                }
            }
        }
        _ => {}
    }

    body
}

/// Assigns each resource its `<kind-dir>/<file>` path, adding `_2`, `_3`…
/// to repeated names within a directory.
fn place(bundle: &NamespaceBundle) -> Vec<Placement<'_>> {
    let mut used: HashSet<String> = HashSet::new();
    let mut placements = Vec::with_capacity(bundle.len());

    for (index, resource) in bundle.resources.iter().enumerate() {
        let directory = resource.kind.directory();
        let (stem, extension) = match resource.file_name.rfind('.') {
            Some(dot) if dot > 0 => resource.file_name.split_at(dot),
            _ => (resource.file_name.as_str(), ""),
        };

        let mut counter = 1;
        let relative = loop {
            let candidate = if counter == 1 {
                format!("{}/{}", directory, resource.file_name)
            } else {
                format!("{}/{}_{}{}", directory, stem, counter, extension)
            };
            if used.insert(candidate.clone()) {
                break candidate;
            }
            counter += 1;
        };

        placements.push(Placement {
            resource,
            index,
            relative,
        });
    }
    placements
}

/// Raw storage request strings declared by a resource.
fn storage_requests(resource: &ParsedResource) -> Vec<String> {
    let describe = |v: Option<&Value>| match v {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(_) => "<non-scalar>".to_string(),
        None => "<missing>".to_string(),
    };

    if !resource.kind_confirmed {
        return Vec::new();
    }
    match resource.kind {
        ResourceKind::PersistentVolumeClaim => vec![describe(storage_at(&resource.body))],
        ResourceKind::StatefulSet => match resource
            .body
            .get("spec")
            .and_then(|spec| spec.get("volumeClaimTemplates"))
        {
            Some(Value::Sequence(templates)) => templates
                .iter()
                .filter(|t| t.is_mapping())
                .map(|t| describe(storage_at(t)))
                .collect(),
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

fn storage_at(claim: &Value) -> Option<&Value> {
    claim
        .get("spec")?
        .get("resources")?
        .get("requests")?
        .get("storage")
}

/// Sets `spec.resources.requests.storage`, creating missing mappings.
fn set_storage(claim: &mut Value, storage: Value) {
    let mut current = claim;
    for key in ["spec", "resources", "requests"] {
        let Some(map) = current.as_mapping_mut() else {
            return;
        };
        let entry = map
            .entry(Value::from(key))
            .or_insert_with(|| Value::Mapping(Mapping::new()));
        if entry.is_null() {
            *entry = Value::Mapping(Mapping::new());
        }
        current = entry;
    }
    if let Some(requests) = current.as_mapping_mut() {
        requests.insert(Value::from("storage"), storage);
    }
}
