//! Artifact Registry repository for Docker images.

use regstack_config::StackConfig;
use regstack_core::resource::{
    ArtifactRepositoryArgs, CleanupAction, CleanupCondition, CleanupPolicy, MostRecentVersions,
};
use regstack_core::{Engine, Output, Resource, ResourceArgs, ResourceHandle, Result};
use tracing::info;

use crate::naming;

/// The declared registry.
#[derive(Debug, Clone)]
pub struct Registry {
    pub repository: ResourceHandle,
    /// `<location>-docker.pkg.dev/<project>/<repository>`
    pub url: Output,
}

/// Cleanup policies for the configured retention.
///
/// Keep policies take precedence over delete policies, so the most recent
/// versions survive even when they are older than the delete age.
pub fn cleanup_policies(config: &StackConfig) -> Vec<CleanupPolicy> {
    let mut policies = Vec::new();

    if config.image_retention_count > 0 {
        policies.push(CleanupPolicy {
            id: "keep-most-recent".to_string(),
            action: CleanupAction::Keep,
            condition: None,
            most_recent_versions: Some(MostRecentVersions {
                keep_count: config.image_retention_count,
            }),
        });
    }

    let age = config.delete_images_older_than.as_secs();
    if age > 0 {
        policies.push(CleanupPolicy {
            id: "delete-old-images".to_string(),
            action: CleanupAction::Delete,
            condition: Some(CleanupCondition {
                tag_state: "ANY".to_string(),
                older_than: Some(format!("{}s", age)),
            }),
            most_recent_versions: None,
        });
    }

    policies
}

/// Declare the Docker repository.
pub async fn declare_registry(engine: &dyn Engine, config: &StackConfig) -> Result<Registry> {
    let repository_id = naming::repository_id(config);
    info!(
        repository = %repository_id,
        location = %config.repository_location,
        "Declaring artifact registry repository"
    );

    let resource = Resource::new(
        &repository_id,
        ResourceArgs::ArtifactRepository(ArtifactRepositoryArgs {
            repository_id: repository_id.clone(),
            location: config.repository_location.clone(),
            project: config.gcp_project.clone(),
            description: "CI/CD Docker image registry".to_string(),
            format: "DOCKER".to_string(),
            cleanup_policy_dry_run: false,
            cleanup_policies: cleanup_policies(config),
        }),
    )
    .protected(config.protect_resources);

    let repository = engine
        .register(resource)
        .await
        .map_err(|e| e.during("declare artifact registry repository"))?;

    let url = naming::registry_url(
        &config.repository_location,
        &config.gcp_project,
        &repository.resource_name()?,
    );

    Ok(Registry { repository, url })
}

#[cfg(test)]
mod tests {
    use super::*;
    use regstack_config::ConfigLayer;
    use regstack_core::MemoryEngine;

    fn config(vars: &[(&str, &str)]) -> StackConfig {
        let mut layer = ConfigLayer::default();
        layer.set("GCP_PROJECT", "test-project");
        layer.set("GCP_REGION", "us-central1");
        layer.set("ALLOWED_REPO_URL", "https://github.com/test/repo");
        for (k, v) in vars {
            layer.set(k, *v);
        }
        StackConfig::from_layer(&layer).unwrap()
    }

    #[test]
    fn test_default_cleanup_policies() {
        let policies = cleanup_policies(&config(&[]));
        assert_eq!(policies.len(), 2);
        assert_eq!(policies[0].action, CleanupAction::Keep);
        assert_eq!(policies[0].most_recent_versions.as_ref().unwrap().keep_count, 10);
        assert_eq!(policies[1].action, CleanupAction::Delete);
        assert_eq!(
            policies[1].condition.as_ref().unwrap().older_than.as_deref(),
            Some("2592000s")
        );
    }

    #[test]
    fn test_cleanup_policies_disabled() {
        let policies = cleanup_policies(&config(&[
            ("IMAGE_RETENTION_COUNT", "0"),
            ("DELETE_IMAGES_OLDER_THAN", "0d"),
        ]));
        assert!(policies.is_empty());
    }

    #[tokio::test]
    async fn test_registry_url_from_location() {
        let engine = MemoryEngine::new();
        let registry = declare_registry(&engine, &config(&[("REPOSITORY_LOCATION", "us")]))
            .await
            .unwrap();

        assert_eq!(registry.url.to_string(), "us-docker.pkg.dev/test-project/ci-registry");
        assert_eq!(registry.repository.output("format").unwrap().to_string(), "DOCKER");
    }

    #[tokio::test]
    async fn test_duplicate_registry_wrapped_with_step() {
        let engine = MemoryEngine::new();
        let config = config(&[]);
        declare_registry(&engine, &config).await.unwrap();

        let err = declare_registry(&engine, &config).await.unwrap_err();
        assert!(
            err.to_string()
                .starts_with("declare artifact registry repository: duplicate resource")
        );
    }
}
