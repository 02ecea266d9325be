//! IAM bindings for the federated GitHub principal.
//!
//! Every token accepted by the provider's attribute condition maps to the
//! same principal set and receives exactly these roles.

use regstack_config::StackConfig;
use regstack_core::resource::{
    ArtifactRepositoryIamMemberArgs, ProjectIamMemberArgs, ServiceAccountArgs,
    ServiceAccountIamMemberArgs,
};
use regstack_core::{Engine, Output, Resource, ResourceArgs, ResourceHandle, Result};
use tracing::info;

use crate::naming;
use crate::registry::Registry;

/// Roles granted on the registry.
pub const REPOSITORY_ROLES: &[&str] = &["roles/artifactregistry.writer"];

/// Roles granted on the project.
pub const PROJECT_ROLES: &[&str] = &[
    // SBOM generation for container images
    "roles/containeranalysis.notes.editor",
    "roles/containeranalysis.occurrences.editor",
    "roles/storage.bucketViewer",
];

/// Role letting the federated principal impersonate the service account.
pub const WORKLOAD_IDENTITY_USER_ROLE: &str = "roles/iam.workloadIdentityUser";

/// Service account for callers that need delegated credentials.
#[derive(Debug, Clone)]
pub struct ServiceAccountDelegation {
    pub account: ResourceHandle,
    pub binding: ResourceHandle,
}

/// Bind the principal to every registry-scoped role.
pub async fn declare_repository_bindings(
    engine: &dyn Engine,
    config: &StackConfig,
    registry: &Registry,
    principal: &Output,
) -> Result<Vec<ResourceHandle>> {
    let repository = registry.repository.resource_name()?;
    let mut members = Vec::with_capacity(REPOSITORY_ROLES.len());

    for role in REPOSITORY_ROLES {
        let binding_name = format!("{}-repo-iam-{}", config.resource_prefix, role);
        info!(role, binding = %binding_name, "Declaring repository IAM binding");

        let member = engine
            .register(Resource::new(
                &binding_name,
                ResourceArgs::ArtifactRepositoryIamMember(ArtifactRepositoryIamMemberArgs {
                    project: config.gcp_project.clone(),
                    location: config.repository_location.clone(),
                    repository: repository.clone(),
                    role: role.to_string(),
                    member: principal.clone(),
                }),
            ))
            .await
            .map_err(|e| e.during(format!("bind {} on repository", role)))?;

        members.push(member);
    }

    Ok(members)
}

/// Bind the principal to every project-scoped role.
pub async fn declare_project_bindings(
    engine: &dyn Engine,
    config: &StackConfig,
    principal: &Output,
) -> Result<Vec<ResourceHandle>> {
    let mut members = Vec::with_capacity(PROJECT_ROLES.len());

    for role in PROJECT_ROLES {
        let binding_name = format!("{}-proj-iam-{}", config.resource_prefix, role);
        info!(role, binding = %binding_name, "Declaring project IAM binding");

        let member = engine
            .register(Resource::new(
                &binding_name,
                ResourceArgs::ProjectIamMember(ProjectIamMemberArgs {
                    project: config.gcp_project.clone(),
                    role: role.to_string(),
                    member: principal.clone(),
                }),
            ))
            .await
            .map_err(|e| e.during(format!("bind {} on project", role)))?;

        members.push(member);
    }

    Ok(members)
}

/// Create a service account the federated principal may impersonate.
pub async fn declare_service_account_delegation(
    engine: &dyn Engine,
    config: &StackConfig,
    principal: &Output,
) -> Result<ServiceAccountDelegation> {
    let account_id = naming::service_account_id(config);
    info!(account = %account_id, "Declaring GitHub Actions service account");

    let account = engine
        .register(
            Resource::new(
                &account_id,
                ResourceArgs::ServiceAccount(ServiceAccountArgs {
                    account_id: account_id.clone(),
                    project: config.gcp_project.clone(),
                    display_name: "GitHub Actions Service Account".to_string(),
                    description: "Service account for GitHub Actions CI/CD".to_string(),
                }),
            )
            .protected(config.protect_resources),
        )
        .await
        .map_err(|e| e.during("declare service account"))?;

    let binding = engine
        .register(Resource::new(
            format!("{}-workload-identity-user", config.resource_prefix),
            ResourceArgs::ServiceAccountIamMember(ServiceAccountIamMemberArgs {
                service_account_id: account.resource_name()?,
                role: WORKLOAD_IDENTITY_USER_ROLE.to_string(),
                member: principal.clone(),
            }),
        ))
        .await
        .map_err(|e| e.during("bind workload identity user on service account"))?;

    Ok(ServiceAccountDelegation { account, binding })
}
