//! Storage bucket for SBOM artifacts.

use regstack_config::StackConfig;
use regstack_core::resource::{
    LifecycleAction, LifecycleCondition, LifecycleRule, StorageBucketArgs,
    StorageBucketIamMemberArgs, Versioning,
};
use regstack_core::{Engine, Output, Resource, ResourceArgs, ResourceHandle, Result};
use tracing::info;

use crate::naming;

/// Role granted to the principal on the bucket.
pub const SBOM_BUCKET_ROLE: &str = "roles/storage.objectAdmin";

/// The declared bucket and its binding.
#[derive(Debug, Clone)]
pub struct SbomBucket {
    pub bucket: ResourceHandle,
    pub binding: ResourceHandle,
}

/// Bucket arguments: versioned, uniform access, never public, aged out.
pub fn sbom_bucket_args(config: &StackConfig) -> StorageBucketArgs {
    StorageBucketArgs {
        name: naming::sbom_bucket_name(&config.gcp_project),
        project: config.gcp_project.clone(),
        location: config.gcp_region.clone(),
        force_destroy: false,
        uniform_bucket_level_access: true,
        public_access_prevention: "enforced".to_string(),
        versioning: Versioning { enabled: true },
        lifecycle_rule: vec![LifecycleRule {
            condition: LifecycleCondition {
                age: config.sbom_retention_days,
            },
            action: LifecycleAction {
                action_type: "Delete".to_string(),
            },
        }],
    }
}

/// Declare the SBOM bucket and grant the principal object admin on it.
pub async fn declare_sbom_bucket(
    engine: &dyn Engine,
    config: &StackConfig,
    principal: &Output,
) -> Result<SbomBucket> {
    let args = sbom_bucket_args(config);
    info!(
        bucket = %args.name,
        retention_days = config.sbom_retention_days,
        "Declaring SBOM bucket"
    );

    let bucket = engine
        .register(
            Resource::new(args.name.clone(), ResourceArgs::StorageBucket(args))
                .protected(config.protect_resources),
        )
        .await
        .map_err(|e| e.during("declare SBOM bucket"))?;

    let binding = engine
        .register(Resource::new(
            format!("{}-sbom-iam-{}", config.resource_prefix, SBOM_BUCKET_ROLE),
            ResourceArgs::StorageBucketIamMember(StorageBucketIamMemberArgs {
                bucket: bucket.resource_name()?,
                role: SBOM_BUCKET_ROLE.to_string(),
                member: principal.clone(),
            }),
        ))
        .await
        .map_err(|e| e.during("bind SBOM bucket object admin"))?;

    Ok(SbomBucket { bucket, binding })
}

#[cfg(test)]
mod tests {
    use super::*;
    use regstack_config::ConfigLayer;

    fn config(retention: Option<&str>) -> StackConfig {
        let mut layer = ConfigLayer::default();
        layer.set("GCP_PROJECT", "test-project");
        layer.set("GCP_REGION", "us-central1");
        layer.set("ALLOWED_REPO_URL", "https://github.com/test/repo");
        if let Some(days) = retention {
            layer.set("SBOM_RETENTION_DAYS", days);
        }
        StackConfig::from_layer(&layer).unwrap()
    }

    #[test]
    fn test_bucket_defaults() {
        let args = sbom_bucket_args(&config(None));
        assert_eq!(args.name, "artifacts-test-project-sbom");
        assert!(args.uniform_bucket_level_access);
        assert!(args.versioning.enabled);
        assert_eq!(args.public_access_prevention, "enforced");
        assert_eq!(args.lifecycle_rule.len(), 1);
        assert_eq!(args.lifecycle_rule[0].condition.age, 365);
        assert_eq!(args.lifecycle_rule[0].action.action_type, "Delete");
    }

    #[test]
    fn test_retention_override() {
        let args = sbom_bucket_args(&config(Some("30")));
        assert_eq!(args.lifecycle_rule[0].condition.age, 30);
    }
}
