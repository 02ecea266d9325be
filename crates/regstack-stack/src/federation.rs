//! Workload identity federation for GitHub Actions.

use regstack_config::StackConfig;
use regstack_core::resource::{OidcArgs, WorkloadIdentityPoolArgs, WorkloadIdentityPoolProviderArgs};
use regstack_core::{Engine, Output, Resource, ResourceArgs, ResourceHandle, Result};
use tracing::info;

use crate::condition::{self, GITHUB_ISSUER_URI};
use crate::naming;

/// The declared pool and provider.
#[derive(Debug, Clone)]
pub struct IdentityFederation {
    pub pool: ResourceHandle,
    pub provider: ResourceHandle,
    /// Condition presented tokens must satisfy.
    pub attribute_condition: String,
    /// `projects/<number>/locations/global/workloadIdentityPools/<pool>/providers/<provider>`
    pub provider_path: Output,
}

/// Declare the workload identity pool and its GitHub OIDC provider.
pub async fn declare_identity_federation(
    engine: &dyn Engine,
    config: &StackConfig,
    slug: &str,
) -> Result<IdentityFederation> {
    let pool_id = naming::identity_pool_id(config);
    info!(pool = %pool_id, "Declaring workload identity pool");

    let pool = engine
        .register(
            Resource::new(
                &pool_id,
                ResourceArgs::WorkloadIdentityPool(WorkloadIdentityPoolArgs {
                    workload_identity_pool_id: pool_id.clone(),
                    project: config.gcp_project.clone(),
                    display_name: "GitHub Actions Workload Pool".to_string(),
                    description: "Workload identity pool for GitHub Actions".to_string(),
                    disabled: false,
                }),
            )
            .protected(config.protect_resources),
        )
        .await
        .map_err(|e| e.during("declare workload identity pool"))?;

    let provider_id = naming::identity_provider_id(config);
    let attribute_condition = condition::build_attribute_condition(slug, config);
    info!(
        provider = %provider_id,
        condition = %attribute_condition,
        "Declaring GitHub Actions OIDC provider"
    );

    let provider = engine
        .register(
            Resource::new(
                &provider_id,
                ResourceArgs::WorkloadIdentityPoolProvider(WorkloadIdentityPoolProviderArgs {
                    workload_identity_pool_id: pool.output("workload_identity_pool_id")?,
                    workload_identity_pool_provider_id: provider_id.clone(),
                    project: config.gcp_project.clone(),
                    display_name: "GitHub Actions OIDC Provider".to_string(),
                    description: "OIDC provider for GitHub Actions".to_string(),
                    disabled: false,
                    attribute_mapping: condition::attribute_mapping(),
                    attribute_condition: attribute_condition.clone(),
                    oidc: OidcArgs {
                        issuer_uri: GITHUB_ISSUER_URI.to_string(),
                    },
                }),
            )
            .protected(config.protect_resources),
        )
        .await
        .map_err(|e| e.during("declare workload identity pool provider"))?;

    // Global provider paths only accept the project number.
    let project = engine
        .lookup_project(&config.gcp_project)
        .await
        .map_err(|e| e.during("look up project number"))?;

    let provider_path = naming::provider_path(
        &project.number,
        &pool.output("workload_identity_pool_id")?,
        &provider.output("workload_identity_pool_provider_id")?,
    );

    Ok(IdentityFederation {
        pool,
        provider,
        attribute_condition,
        provider_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use regstack_config::ConfigLayer;
    use regstack_core::MemoryEngine;

    fn config() -> StackConfig {
        let mut layer = ConfigLayer::default();
        layer.set("GCP_PROJECT", "test-project");
        layer.set("GCP_REGION", "us-central1");
        layer.set("ALLOWED_REPO_URL", "https://github.com/test/repo");
        layer.set("REPOSITORY_OWNER_ID", "1234");
        StackConfig::from_layer(&layer).unwrap()
    }

    #[tokio::test]
    async fn test_provider_configuration() {
        let engine = MemoryEngine::with_project_number("987654321");
        let federation = declare_identity_federation(&engine, &config(), "test/repo")
            .await
            .unwrap();

        assert_eq!(
            federation.attribute_condition,
            r#"attribute.repository == "test/repo" && attribute.repository_owner_id == "1234""#
        );
        assert_eq!(
            federation.provider_path.to_string(),
            "projects/987654321/locations/global/workloadIdentityPools/ci-github-actions-pool/providers/ci-github-actions-provider"
        );

        let declared = engine.resources().await;
        let provider = declared
            .iter()
            .find_map(|r| match &r.resource.args {
                ResourceArgs::WorkloadIdentityPoolProvider(args) => Some(args.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(provider.oidc.issuer_uri, "https://token.actions.githubusercontent.com");
        assert_eq!(provider.attribute_mapping["google.subject"], "assertion.sub");
        assert_eq!(
            provider.workload_identity_pool_id.to_string(),
            "ci-github-actions-pool"
        );
        assert!(provider.workload_identity_pool_provider_id.len() <= 32);
    }
}
