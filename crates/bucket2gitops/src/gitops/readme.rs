//! README rendering. Output carries no timestamps so regeneration is
//! byte-identical.

use std::fmt::Write;

use super::profile::SyncPolicy;
use crate::classifier::ResourceKind;

#[derive(Debug, Clone, PartialEq)]
pub struct EnvironmentSummary {
    pub name: String,
    pub cluster_endpoint: String,
    pub target_namespace: String,
    pub sync_policy: SyncPolicy,
    pub replica_count: Option<u32>,
    /// Scaled base storage, when the namespace declares any.
    pub storage: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NamespaceSummary {
    pub namespace: String,
    pub kind_counts: Vec<(ResourceKind, usize)>,
    pub environments: Vec<EnvironmentSummary>,
}

impl NamespaceSummary {
    pub fn total_resources(&self) -> usize {
        self.kind_counts.iter().map(|(_, n)| n).sum()
    }
}

pub fn render_namespace_readme(summary: &NamespaceSummary) -> String {
    let ns = &summary.namespace;
    let mut out = String::new();

    let _ = writeln!(out, "# {} Namespace\n", ns);
    let _ = writeln!(
        out,
        "Generated from object store backups. This namespace contains {} resources.\n",
        summary.total_resources()
    );

    let _ = writeln!(out, "## Resources\n");
    for (kind, count) in &summary.kind_counts {
        let _ = writeln!(out, "- {} {} (`{}/`)", count, kind, kind.directory());
    }

    let _ = writeln!(out, "\n## Environments\n");
    let _ = writeln!(
        out,
        "| Environment | Target Cluster | Namespace | Sync Policy | Replicas | Storage |"
    );
    let _ = writeln!(
        out,
        "|-------------|----------------|-----------|-------------|----------|---------|"
    );
    for env in &summary.environments {
        let _ = writeln!(
            out,
            "| **{}** | `{}` | `{}` | {} | {} | {} |",
            env.name,
            env.cluster_endpoint,
            env.target_namespace,
            env.sync_policy,
            env.replica_count
                .map(|n| n.to_string())
                .unwrap_or_else(|| "as backed up".to_string()),
            env.storage.as_deref().unwrap_or("-"),
        );
    }

    let _ = writeln!(out, "\n## Deployment\n");
    for env in &summary.environments {
        let _ = writeln!(out, "### {}\n", env.name);
        let _ = writeln!(out, "```bash");
        let _ = writeln!(out, "kubectl apply -f namespaces/{}/argocd-apps/{}.yaml", ns, env.name);
        if env.sync_policy == SyncPolicy::Manual {
            let _ = writeln!(out, "argocd app sync {}", env.target_namespace);
        }
        let _ = writeln!(out, "```\n");
    }

    out
}

pub fn render_root_readme(summaries: &[NamespaceSummary]) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "# Multi-Cluster GitOps\n");
    let _ = writeln!(
        out,
        "Generated from object store backups with {} namespaces.\n",
        summaries.len()
    );

    let _ = writeln!(out, "## Structure\n");
    let _ = writeln!(out, "```");
    let _ = writeln!(out, "namespaces/");
    for summary in summaries {
        let _ = writeln!(out, "├── {}/", summary.namespace);
    }
    let _ = writeln!(out, "```\n");

    let _ = writeln!(out, "## Namespaces\n");
    let _ = writeln!(out, "| Namespace | Resources | Documentation |");
    let _ = writeln!(out, "|-----------|-----------|---------------|");
    for summary in summaries {
        let _ = writeln!(
            out,
            "| **{}** | {} resources | `namespaces/{}/README.md` |",
            summary.namespace,
            summary.total_resources(),
            summary.namespace
        );
    }

    out
}
