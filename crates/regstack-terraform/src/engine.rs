//! Engine that renders declarations into Terraform JSON.
//!
//! Handles are deferred: every attribute read becomes a
//! `${<type>.<label>.<attribute>}` reference that Terraform resolves at
//! apply time.

use async_trait::async_trait;
use regstack_core::{
    Engine, Error, Export, Output, ProjectInfo, Resource, ResourceHandle, Result,
};
use serde_json::json;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::document::{self, OutputBlock, TerraformDocument};
use crate::error::TerraformResult;
use crate::graph::DependencyGraph;

const PROJECT_DATA_SOURCE: &str = "google_project";

#[derive(Debug)]
struct TerraformState {
    document: TerraformDocument,
    graph: DependencyGraph,
}

/// Engine producing a Terraform configuration.
#[derive(Debug)]
pub struct TerraformEngine {
    state: Mutex<TerraformState>,
}

impl TerraformEngine {
    pub fn new(project: &str, region: &str, state_bucket: Option<&str>) -> Self {
        Self {
            state: Mutex::new(TerraformState {
                document: TerraformDocument::new(project, region, state_bucket),
                graph: DependencyGraph::new(),
            }),
        }
    }

    /// Snapshot of the document built so far.
    pub async fn document(&self) -> TerraformDocument {
        self.state.lock().await.document.clone()
    }

    /// Snapshot of the dependency graph built so far.
    pub async fn graph(&self) -> DependencyGraph {
        self.state.lock().await.graph.clone()
    }

    /// Render the document to `<dir>/main.tf.json`.
    pub async fn write_to(&self, dir: &Path) -> TerraformResult<PathBuf> {
        let state = self.state.lock().await;
        state.graph.validate()?;
        let rendered = state.document.render()?;
        drop(state);

        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(document::MAIN_FILE);
        tokio::fs::write(&path, rendered).await?;

        info!(path = %path.display(), "Wrote Terraform configuration");
        Ok(path)
    }
}

fn dependencies_of(resource: &Resource) -> Vec<String> {
    resource
        .args
        .deferred_inputs()
        .into_iter()
        .flat_map(|input| input.references())
        .map(|r| r.address.clone())
        .collect()
}

#[async_trait]
impl Engine for TerraformEngine {
    fn name(&self) -> &'static str {
        "terraform"
    }

    async fn register(&self, resource: Resource) -> Result<ResourceHandle> {
        let resource_type = resource.resource_type();
        let type_name = resource_type.type_name();
        let label = document::sanitize_label(&resource.name);
        let address = format!("{}.{}", type_name, label);

        let mut body = serde_json::to_value(&resource.args)
            .map_err(|e| Error::Internal(format!("serialize {}: {}", address, e)))?;
        if resource.options.protect {
            document::prevent_destroy(&mut body);
        }

        let mut state = self.state.lock().await;
        // Distinct names can sanitise to the same label.
        if state.document.has_resource(type_name, &label) {
            return Err(Error::Duplicate(address));
        }

        state.document.insert_resource(type_name, &label, body);
        state.graph.add_node(&address, dependencies_of(&resource));

        debug!(address = %address, protect = resource.options.protect, "Rendered resource");
        Ok(ResourceHandle::deferred(&resource.name, resource_type, address))
    }

    async fn lookup_project(&self, project_id: &str) -> Result<ProjectInfo> {
        if project_id.is_empty() {
            return Err(Error::InvalidInput("project id is empty".to_string()));
        }

        let label = document::sanitize_label(project_id);
        let address = format!("data.{}.{}", PROJECT_DATA_SOURCE, label);

        let mut state = self.state.lock().await;
        if !state.document.has_data(PROJECT_DATA_SOURCE, &label) {
            state
                .document
                .insert_data(PROJECT_DATA_SOURCE, &label, json!({ "project_id": project_id }));
            state.graph.add_node(&address, Vec::<String>::new());
            debug!(address = %address, "Rendered project lookup");
        }

        Ok(ProjectInfo {
            project_id: project_id.to_string(),
            number: Output::reference(address, "number"),
        })
    }

    async fn export(&self, export: Export) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.document.output.contains_key(&export.name) {
            return Err(Error::Duplicate(format!("export {}", export.name)));
        }
        if let Some(missing) = export
            .value
            .references()
            .find(|r| state.graph.node(&r.address).is_none())
        {
            return Err(Error::InvalidInput(format!(
                "export {} references undeclared {}",
                export.name, missing
            )));
        }

        state.document.output.insert(
            export.name,
            OutputBlock {
                value: export.value,
                sensitive: export.secret,
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regstack_core::ResourceArgs;
    use regstack_core::resource::{ProjectIamMemberArgs, WorkloadIdentityPoolArgs};

    fn pool(name: &str) -> Resource {
        Resource::new(
            name,
            ResourceArgs::WorkloadIdentityPool(WorkloadIdentityPoolArgs {
                workload_identity_pool_id: name.to_string(),
                project: "test-project".to_string(),
                display_name: "GitHub Actions Workload Pool".to_string(),
                description: "Workload identity pool for GitHub Actions".to_string(),
                disabled: false,
            }),
        )
    }

    fn binding(name: &str, member: Output) -> Resource {
        Resource::new(
            name,
            ResourceArgs::ProjectIamMember(ProjectIamMemberArgs {
                project: "test-project".to_string(),
                role: "roles/storage.bucketViewer".to_string(),
                member,
            }),
        )
    }

    #[tokio::test]
    async fn test_handles_are_references() {
        let engine = TerraformEngine::new("test-project", "us-central1", None);
        let handle = engine.register(pool("ci-github-actions-pool")).await.unwrap();

        assert_eq!(
            handle.address,
            "google_iam_workload_identity_pool.ci-github-actions-pool"
        );
        assert_eq!(
            handle.resource_name().unwrap().to_interpolation(),
            "${google_iam_workload_identity_pool.ci-github-actions-pool.name}"
        );
    }

    #[tokio::test]
    async fn test_references_become_graph_edges() {
        let engine = TerraformEngine::new("test-project", "us-central1", None);
        let pool = engine.register(pool("pool")).await.unwrap();
        let member = Output::concat([
            Output::from("principalSet://iam.googleapis.com/"),
            pool.resource_name().unwrap(),
            Output::from("/attribute.repository/test/repo"),
        ]);
        let member_binding = engine
            .register(binding("ci-proj-iam-roles/storage.bucketViewer", member))
            .await
            .unwrap();

        assert_eq!(
            member_binding.address,
            "google_project_iam_member.ci-proj-iam-roles_storage_bucketViewer"
        );

        let graph = engine.graph().await;
        let order = graph.topological_order().unwrap();
        assert_eq!(order, vec![pool.address.clone(), member_binding.address.clone()]);

        let doc = engine.document().await;
        assert_eq!(
            doc.resource["google_project_iam_member"]["ci-proj-iam-roles_storage_bucketViewer"]
                ["member"],
            json!("principalSet://iam.googleapis.com/${google_iam_workload_identity_pool.pool.name}/attribute.repository/test/repo")
        );
    }

    #[tokio::test]
    async fn test_sanitised_label_collision_is_duplicate() {
        let engine = TerraformEngine::new("test-project", "us-central1", None);
        engine.register(binding("a/b", Output::known("user:x"))).await.unwrap();
        let err = engine
            .register(binding("a.b", Output::known("user:x")))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Duplicate(_)));
    }

    #[tokio::test]
    async fn test_protected_resource_prevents_destroy() {
        let engine = TerraformEngine::new("test-project", "us-central1", None);
        engine.register(pool("pool").protected(true)).await.unwrap();
        engine.register(pool("other")).await.unwrap();

        let doc = engine.document().await;
        let pools = &doc.resource["google_iam_workload_identity_pool"];
        assert_eq!(pools["pool"]["lifecycle"]["prevent_destroy"], json!(true));
        assert!(pools["other"].get("lifecycle").is_none());
    }

    #[tokio::test]
    async fn test_project_lookup_renders_data_source_once() {
        let engine = TerraformEngine::new("test-project", "us-central1", None);
        let first = engine.lookup_project("test-project").await.unwrap();
        let second = engine.lookup_project("test-project").await.unwrap();

        assert_eq!(first.number, second.number);
        assert_eq!(
            first.number.to_interpolation(),
            "${data.google_project.test-project.number}"
        );
        let doc = engine.document().await;
        assert_eq!(
            doc.data["google_project"]["test-project"],
            json!({ "project_id": "test-project" })
        );
        assert_eq!(engine.graph().await.len(), 1);
    }

    #[tokio::test]
    async fn test_export_sensitive_and_checked() {
        let engine = TerraformEngine::new("test-project", "us-central1", None);
        let pool = engine.register(pool("pool")).await.unwrap();

        engine
            .export(Export::secret("workloadIdentityPoolID", pool.resource_name().unwrap()))
            .await
            .unwrap();
        let doc = engine.document().await;
        assert!(doc.output["workloadIdentityPoolID"].sensitive);

        let dangling = Output::reference("google_storage_bucket.missing", "name");
        assert!(matches!(
            engine.export(Export::plain("sbomBucketName", dangling)).await,
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            engine
                .export(Export::plain("workloadIdentityPoolID", Output::known("x")))
                .await,
            Err(Error::Duplicate(_))
        ));
    }

    #[tokio::test]
    async fn test_write_to_dir() {
        let dir = std::env::temp_dir().join(format!("regstack-tf-{}", std::process::id()));
        let engine = TerraformEngine::new("test-project", "us-central1", Some("tf-state"));
        engine.register(pool("pool")).await.unwrap();

        let path = engine.write_to(&dir).await.unwrap();
        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["terraform"]["backend"]["gcs"]["bucket"], json!("tf-state"));
        assert_eq!(
            written["resource"]["google_iam_workload_identity_pool"]["pool"]["disabled"],
            json!(false)
        );

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
