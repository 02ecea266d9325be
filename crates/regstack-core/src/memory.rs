//! In-memory engine.
//!
//! Records declarations and resolves every attribute immediately, simulating
//! the values Google Cloud would compute (resource names carrying the
//! project number, service-account emails, bucket URLs). Used for previews
//! and tests; nothing leaves the process.

use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::Mutex;
use tracing::debug;

use crate::resource::ResourceType;
use crate::{Engine, Error, Export, Output, ProjectInfo, Resource, ResourceArgs, ResourceHandle, Result};

/// A resource recorded by the in-memory engine.
#[derive(Debug, Clone)]
pub struct DeclaredResource {
    pub resource: Resource,
    pub handle: ResourceHandle,
}

#[derive(Debug, Default)]
struct MemoryState {
    resources: Vec<DeclaredResource>,
    exports: Vec<Export>,
}

/// Engine that resolves everything in memory.
#[derive(Debug)]
pub struct MemoryEngine {
    project_number: String,
    state: Mutex<MemoryState>,
}

impl MemoryEngine {
    /// Project number reported by lookups unless overridden.
    pub const DEFAULT_PROJECT_NUMBER: &'static str = "123456789012";

    pub fn new() -> Self {
        Self::with_project_number(Self::DEFAULT_PROJECT_NUMBER)
    }

    pub fn with_project_number(number: impl Into<String>) -> Self {
        Self {
            project_number: number.into(),
            state: Mutex::new(MemoryState::default()),
        }
    }

    /// All declared resources in declaration order.
    pub async fn resources(&self) -> Vec<DeclaredResource> {
        self.state.lock().await.resources.clone()
    }

    /// Declared resources of one type.
    pub async fn resources_of(&self, resource_type: ResourceType) -> Vec<DeclaredResource> {
        self.state
            .lock()
            .await
            .resources
            .iter()
            .filter(|r| r.handle.resource_type == resource_type)
            .cloned()
            .collect()
    }

    pub async fn exports(&self) -> Vec<Export> {
        self.state.lock().await.exports.clone()
    }

    pub async fn export_named(&self, name: &str) -> Option<Export> {
        self.state
            .lock()
            .await
            .exports
            .iter()
            .find(|e| e.name == name)
            .cloned()
    }

    fn simulate(&self, args: &ResourceArgs) -> BTreeMap<String, Output> {
        let mut attrs = BTreeMap::new();
        let mut set = |key: &str, value: Output| {
            attrs.insert(key.to_string(), value);
        };

        match args {
            ResourceArgs::ArtifactRepository(a) => {
                set("repository_id", Output::known(&a.repository_id));
                set("location", Output::known(&a.location));
                set("project", Output::known(&a.project));
                set("format", Output::known(&a.format));
                set("description", Output::known(&a.description));
                set("name", Output::known(&a.repository_id));
                set(
                    "id",
                    Output::known(format!(
                        "projects/{}/locations/{}/repositories/{}",
                        a.project, a.location, a.repository_id
                    )),
                );
            }
            ResourceArgs::ArtifactRepositoryIamMember(a) => {
                set("project", Output::known(&a.project));
                set("location", Output::known(&a.location));
                set("repository", a.repository.clone());
                set("role", Output::known(&a.role));
                set("member", a.member.clone());
                set(
                    "id",
                    Output::concat([
                        Output::known(format!(
                            "projects/{}/locations/{}/repositories/",
                            a.project, a.location
                        )),
                        a.repository.clone(),
                        Output::known(format!("/{}/", a.role)),
                        a.member.clone(),
                    ]),
                );
                set("etag", Output::known("BwYmemory="));
            }
            ResourceArgs::ProjectIamMember(a) => {
                set("project", Output::known(&a.project));
                set("role", Output::known(&a.role));
                set("member", a.member.clone());
                set(
                    "id",
                    Output::concat([
                        Output::known(format!("{}/{}/", a.project, a.role)),
                        a.member.clone(),
                    ]),
                );
                set("etag", Output::known("BwYmemory="));
            }
            ResourceArgs::WorkloadIdentityPool(a) => {
                set("workload_identity_pool_id", Output::known(&a.workload_identity_pool_id));
                set("project", Output::known(&a.project));
                set("display_name", Output::known(&a.display_name));
                set("description", Output::known(&a.description));
                set("disabled", Output::known(a.disabled.to_string()));
                set("state", Output::known("ACTIVE"));
                set(
                    "name",
                    Output::known(format!(
                        "projects/{}/locations/global/workloadIdentityPools/{}",
                        self.project_number, a.workload_identity_pool_id
                    )),
                );
                set(
                    "id",
                    Output::known(format!(
                        "projects/{}/locations/global/workloadIdentityPools/{}",
                        a.project, a.workload_identity_pool_id
                    )),
                );
            }
            ResourceArgs::WorkloadIdentityPoolProvider(a) => {
                set("workload_identity_pool_id", a.workload_identity_pool_id.clone());
                set(
                    "workload_identity_pool_provider_id",
                    Output::known(&a.workload_identity_pool_provider_id),
                );
                set("project", Output::known(&a.project));
                set("display_name", Output::known(&a.display_name));
                set("description", Output::known(&a.description));
                set("disabled", Output::known(a.disabled.to_string()));
                set("attribute_condition", Output::known(&a.attribute_condition));
                set("state", Output::known("ACTIVE"));
                set(
                    "name",
                    Output::concat([
                        Output::known(format!(
                            "projects/{}/locations/global/workloadIdentityPools/",
                            self.project_number
                        )),
                        a.workload_identity_pool_id.clone(),
                        Output::known(format!(
                            "/providers/{}",
                            a.workload_identity_pool_provider_id
                        )),
                    ]),
                );
                set(
                    "id",
                    Output::concat([
                        Output::known(format!(
                            "projects/{}/locations/global/workloadIdentityPools/",
                            a.project
                        )),
                        a.workload_identity_pool_id.clone(),
                        Output::known(format!(
                            "/providers/{}",
                            a.workload_identity_pool_provider_id
                        )),
                    ]),
                );
            }
            ResourceArgs::ServiceAccount(a) => {
                let email = format!("{}@{}.iam.gserviceaccount.com", a.account_id, a.project);
                let name = format!("projects/{}/serviceAccounts/{}", a.project, email);
                set("account_id", Output::known(&a.account_id));
                set("project", Output::known(&a.project));
                set("display_name", Output::known(&a.display_name));
                set("description", Output::known(&a.description));
                set("member", Output::known(format!("serviceAccount:{email}")));
                set("email", Output::known(email));
                set("id", Output::known(&name));
                set("name", Output::known(name));
                set(
                    "unique_id",
                    Output::known(format!("1{}", self.project_number)),
                );
            }
            ResourceArgs::ServiceAccountIamMember(a) => {
                set("service_account_id", a.service_account_id.clone());
                set("role", Output::known(&a.role));
                set("member", a.member.clone());
                set(
                    "id",
                    Output::concat([
                        a.service_account_id.clone(),
                        Output::known(format!("/{}/", a.role)),
                        a.member.clone(),
                    ]),
                );
                set("etag", Output::known("BwYmemory="));
            }
            ResourceArgs::StorageBucket(a) => {
                set("name", Output::known(&a.name));
                set("id", Output::known(&a.name));
                set("project", Output::known(&a.project));
                set("location", Output::known(a.location.to_uppercase()));
                set("url", Output::known(format!("gs://{}", a.name)));
                set(
                    "self_link",
                    Output::known(format!("https://www.googleapis.com/storage/v1/b/{}", a.name)),
                );
            }
            ResourceArgs::StorageBucketIamMember(a) => {
                set("bucket", a.bucket.clone());
                set("role", Output::known(&a.role));
                set("member", a.member.clone());
                set(
                    "id",
                    Output::concat([
                        Output::from("b/"),
                        a.bucket.clone(),
                        Output::known(format!("/{}/", a.role)),
                        a.member.clone(),
                    ]),
                );
                set("etag", Output::known("BwYmemory="));
            }
        }

        attrs
    }
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Engine for MemoryEngine {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn register(&self, resource: Resource) -> Result<ResourceHandle> {
        let resource_type = resource.resource_type();
        let address = format!("{}.{}", resource_type.type_name(), resource.name);

        let mut state = self.state.lock().await;
        if state.resources.iter().any(|r| r.handle.address == address) {
            return Err(Error::Duplicate(address));
        }

        let attributes = self.simulate(&resource.args);
        let handle = ResourceHandle::resolved(&resource.name, resource_type, &address, attributes);

        debug!(address = %address, "Recorded resource");
        state.resources.push(DeclaredResource {
            resource,
            handle: handle.clone(),
        });

        Ok(handle)
    }

    async fn lookup_project(&self, project_id: &str) -> Result<ProjectInfo> {
        if project_id.is_empty() {
            return Err(Error::InvalidInput("project id is empty".to_string()));
        }
        Ok(ProjectInfo {
            project_id: project_id.to_string(),
            number: Output::known(&self.project_number),
        })
    }

    async fn export(&self, export: Export) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.exports.iter().any(|e| e.name == export.name) {
            return Err(Error::Duplicate(format!("export {}", export.name)));
        }
        state.exports.push(export);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{ServiceAccountArgs, WorkloadIdentityPoolArgs};

    fn service_account(account_id: &str) -> Resource {
        Resource::new(
            account_id,
            ResourceArgs::ServiceAccount(ServiceAccountArgs {
                account_id: account_id.to_string(),
                project: "test-project".to_string(),
                display_name: "GitHub Actions Service Account".to_string(),
                description: "Service account for GitHub Actions CI/CD".to_string(),
            }),
        )
    }

    #[tokio::test]
    async fn test_service_account_email_simulated() {
        let engine = MemoryEngine::new();
        let handle = engine.register(service_account("ci-github-actions-sa")).await.unwrap();

        assert_eq!(
            handle.output("email").unwrap().to_string(),
            "ci-github-actions-sa@test-project.iam.gserviceaccount.com"
        );
        assert_eq!(engine.resources().await.len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_resource_rejected() {
        let engine = MemoryEngine::new();
        engine.register(service_account("sa")).await.unwrap();
        let err = engine.register(service_account("sa")).await.unwrap_err();
        assert!(matches!(err, Error::Duplicate(_)));
    }

    #[tokio::test]
    async fn test_pool_name_uses_project_number() {
        let engine = MemoryEngine::with_project_number("42");
        let handle = engine
            .register(Resource::new(
                "ci-github-actions-pool",
                ResourceArgs::WorkloadIdentityPool(WorkloadIdentityPoolArgs {
                    workload_identity_pool_id: "ci-github-actions-pool".to_string(),
                    project: "test-project".to_string(),
                    display_name: "GitHub Actions Workload Pool".to_string(),
                    description: "Workload identity pool for GitHub Actions".to_string(),
                    disabled: false,
                }),
            ))
            .await
            .unwrap();

        assert_eq!(
            handle.resource_name().unwrap().to_string(),
            "projects/42/locations/global/workloadIdentityPools/ci-github-actions-pool"
        );
        let project = engine.lookup_project("test-project").await.unwrap();
        assert_eq!(project.number.to_string(), "42");
    }

    #[tokio::test]
    async fn test_duplicate_export_rejected() {
        let engine = MemoryEngine::new();
        engine
            .export(Export::plain("registryURL", Output::known("x")))
            .await
            .unwrap();
        assert!(
            engine
                .export(Export::plain("registryURL", Output::known("y")))
                .await
                .is_err()
        );
        assert_eq!(engine.export_named("registryURL").await.unwrap().value.to_string(), "x");
    }
}
