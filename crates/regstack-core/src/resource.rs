//! Typed declarations for the Google Cloud resources regstack manages.
//!
//! Argument structs serialize with the Google provider's attribute names so
//! an engine can hand them to Terraform unchanged.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{Error, Output, Result};

/// Kind of a declared resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    ArtifactRepository,
    ArtifactRepositoryIamMember,
    ProjectIamMember,
    WorkloadIdentityPool,
    WorkloadIdentityPoolProvider,
    ServiceAccount,
    ServiceAccountIamMember,
    StorageBucket,
    StorageBucketIamMember,
}

impl ResourceType {
    /// Google provider type name.
    pub fn type_name(&self) -> &'static str {
        match self {
            ResourceType::ArtifactRepository => "google_artifact_registry_repository",
            ResourceType::ArtifactRepositoryIamMember => {
                "google_artifact_registry_repository_iam_member"
            }
            ResourceType::ProjectIamMember => "google_project_iam_member",
            ResourceType::WorkloadIdentityPool => "google_iam_workload_identity_pool",
            ResourceType::WorkloadIdentityPoolProvider => {
                "google_iam_workload_identity_pool_provider"
            }
            ResourceType::ServiceAccount => "google_service_account",
            ResourceType::ServiceAccountIamMember => "google_service_account_iam_member",
            ResourceType::StorageBucket => "google_storage_bucket",
            ResourceType::StorageBucketIamMember => "google_storage_bucket_iam_member",
        }
    }

    /// Attributes readable from a declared resource of this type.
    pub fn attributes(&self) -> &'static [&'static str] {
        match self {
            ResourceType::ArtifactRepository => &[
                "id",
                "name",
                "repository_id",
                "location",
                "project",
                "format",
                "description",
                "create_time",
                "update_time",
            ],
            ResourceType::ArtifactRepositoryIamMember => &[
                "id",
                "etag",
                "project",
                "location",
                "repository",
                "role",
                "member",
            ],
            ResourceType::ProjectIamMember => &["id", "etag", "project", "role", "member"],
            ResourceType::WorkloadIdentityPool => &[
                "id",
                "name",
                "state",
                "workload_identity_pool_id",
                "project",
                "display_name",
                "description",
                "disabled",
            ],
            ResourceType::WorkloadIdentityPoolProvider => &[
                "id",
                "name",
                "state",
                "workload_identity_pool_id",
                "workload_identity_pool_provider_id",
                "project",
                "display_name",
                "description",
                "disabled",
                "attribute_condition",
            ],
            ResourceType::ServiceAccount => &[
                "id",
                "name",
                "email",
                "unique_id",
                "member",
                "account_id",
                "project",
                "display_name",
                "description",
            ],
            ResourceType::ServiceAccountIamMember => {
                &["id", "etag", "service_account_id", "role", "member"]
            }
            ResourceType::StorageBucket => {
                &["id", "name", "url", "self_link", "project", "location"]
            }
            ResourceType::StorageBucketIamMember => &["id", "etag", "bucket", "role", "member"],
        }
    }

    pub fn has_attribute(&self, attribute: &str) -> bool {
        self.attributes().contains(&attribute)
    }
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Artifact Registry repository.
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactRepositoryArgs {
    pub repository_id: String,
    pub location: String,
    pub project: String,
    pub description: String,
    pub format: String,
    pub cleanup_policy_dry_run: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cleanup_policies: Vec<CleanupPolicy>,
}

/// Cleanup policy action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CleanupAction {
    Keep,
    Delete,
}

/// A registry cleanup policy.
#[derive(Debug, Clone, Serialize)]
pub struct CleanupPolicy {
    pub id: String,
    pub action: CleanupAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<CleanupCondition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub most_recent_versions: Option<MostRecentVersions>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CleanupCondition {
    pub tag_state: String,
    /// Duration in seconds with an `s` suffix, e.g. `2592000s`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub older_than: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MostRecentVersions {
    pub keep_count: u32,
}

/// IAM member binding on an Artifact Registry repository.
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactRepositoryIamMemberArgs {
    pub project: String,
    pub location: String,
    pub repository: Output,
    pub role: String,
    pub member: Output,
}

/// IAM member binding on a project.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectIamMemberArgs {
    pub project: String,
    pub role: String,
    pub member: Output,
}

/// Workload identity pool.
#[derive(Debug, Clone, Serialize)]
pub struct WorkloadIdentityPoolArgs {
    pub workload_identity_pool_id: String,
    pub project: String,
    pub display_name: String,
    pub description: String,
    pub disabled: bool,
}

/// OIDC settings of a workload identity pool provider.
#[derive(Debug, Clone, Serialize)]
pub struct OidcArgs {
    pub issuer_uri: String,
}

/// Workload identity pool provider.
#[derive(Debug, Clone, Serialize)]
pub struct WorkloadIdentityPoolProviderArgs {
    pub workload_identity_pool_id: Output,
    pub workload_identity_pool_provider_id: String,
    pub project: String,
    pub display_name: String,
    pub description: String,
    pub disabled: bool,
    pub attribute_mapping: BTreeMap<String, String>,
    pub attribute_condition: String,
    pub oidc: OidcArgs,
}

/// Service account.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceAccountArgs {
    pub account_id: String,
    pub project: String,
    pub display_name: String,
    pub description: String,
}

/// IAM member binding on a service account.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceAccountIamMemberArgs {
    pub service_account_id: Output,
    pub role: String,
    pub member: Output,
}

/// Cloud Storage bucket.
#[derive(Debug, Clone, Serialize)]
pub struct StorageBucketArgs {
    pub name: String,
    pub project: String,
    pub location: String,
    pub force_destroy: bool,
    pub uniform_bucket_level_access: bool,
    pub public_access_prevention: String,
    pub versioning: Versioning,
    pub lifecycle_rule: Vec<LifecycleRule>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Versioning {
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct LifecycleRule {
    pub condition: LifecycleCondition,
    pub action: LifecycleAction,
}

#[derive(Debug, Clone, Serialize)]
pub struct LifecycleCondition {
    /// Age in days.
    pub age: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct LifecycleAction {
    #[serde(rename = "type")]
    pub action_type: String,
}

/// IAM member binding on a storage bucket.
#[derive(Debug, Clone, Serialize)]
pub struct StorageBucketIamMemberArgs {
    pub bucket: Output,
    pub role: String,
    pub member: Output,
}

/// Arguments of a declared resource.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ResourceArgs {
    ArtifactRepository(ArtifactRepositoryArgs),
    ArtifactRepositoryIamMember(ArtifactRepositoryIamMemberArgs),
    ProjectIamMember(ProjectIamMemberArgs),
    WorkloadIdentityPool(WorkloadIdentityPoolArgs),
    WorkloadIdentityPoolProvider(WorkloadIdentityPoolProviderArgs),
    ServiceAccount(ServiceAccountArgs),
    ServiceAccountIamMember(ServiceAccountIamMemberArgs),
    StorageBucket(StorageBucketArgs),
    StorageBucketIamMember(StorageBucketIamMemberArgs),
}

impl ResourceArgs {
    pub fn resource_type(&self) -> ResourceType {
        match self {
            ResourceArgs::ArtifactRepository(_) => ResourceType::ArtifactRepository,
            ResourceArgs::ArtifactRepositoryIamMember(_) => {
                ResourceType::ArtifactRepositoryIamMember
            }
            ResourceArgs::ProjectIamMember(_) => ResourceType::ProjectIamMember,
            ResourceArgs::WorkloadIdentityPool(_) => ResourceType::WorkloadIdentityPool,
            ResourceArgs::WorkloadIdentityPoolProvider(_) => {
                ResourceType::WorkloadIdentityPoolProvider
            }
            ResourceArgs::ServiceAccount(_) => ResourceType::ServiceAccount,
            ResourceArgs::ServiceAccountIamMember(_) => ResourceType::ServiceAccountIamMember,
            ResourceArgs::StorageBucket(_) => ResourceType::StorageBucket,
            ResourceArgs::StorageBucketIamMember(_) => ResourceType::StorageBucketIamMember,
        }
    }

    /// Inputs that may carry references to other resources.
    pub fn deferred_inputs(&self) -> Vec<&Output> {
        match self {
            ResourceArgs::ArtifactRepositoryIamMember(a) => vec![&a.repository, &a.member],
            ResourceArgs::ProjectIamMember(a) => vec![&a.member],
            ResourceArgs::WorkloadIdentityPoolProvider(a) => vec![&a.workload_identity_pool_id],
            ResourceArgs::ServiceAccountIamMember(a) => vec![&a.service_account_id, &a.member],
            ResourceArgs::StorageBucketIamMember(a) => vec![&a.bucket, &a.member],
            ResourceArgs::ArtifactRepository(_)
            | ResourceArgs::WorkloadIdentityPool(_)
            | ResourceArgs::ServiceAccount(_)
            | ResourceArgs::StorageBucket(_) => Vec::new(),
        }
    }
}

/// Options applied to a declaration regardless of its type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceOptions {
    /// Refuse to destroy the resource.
    pub protect: bool,
}

/// A resource to declare.
#[derive(Debug, Clone)]
pub struct Resource {
    /// Logical name, unique per resource type.
    pub name: String,
    pub args: ResourceArgs,
    pub options: ResourceOptions,
}

impl Resource {
    pub fn new(name: impl Into<String>, args: ResourceArgs) -> Self {
        Self {
            name: name.into(),
            args,
            options: ResourceOptions::default(),
        }
    }

    pub fn protected(mut self, protect: bool) -> Self {
        self.options.protect = protect;
        self
    }

    pub fn resource_type(&self) -> ResourceType {
        self.args.resource_type()
    }
}

/// How a handle resolves its attributes.
#[derive(Debug, Clone)]
enum Resolution {
    /// Every attribute is a reference into the engine's plan.
    Deferred,
    /// Attribute values are already known.
    Resolved(BTreeMap<String, Output>),
}

/// Handle to a declared resource.
#[derive(Debug, Clone)]
pub struct ResourceHandle {
    /// Logical name given at declaration.
    pub name: String,
    pub resource_type: ResourceType,
    /// Engine address, e.g. `google_storage_bucket.artifacts-test-project-sbom`.
    pub address: String,
    resolution: Resolution,
}

impl ResourceHandle {
    /// A handle whose attributes are references to `address`.
    pub fn deferred(
        name: impl Into<String>,
        resource_type: ResourceType,
        address: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            resource_type,
            address: address.into(),
            resolution: Resolution::Deferred,
        }
    }

    /// A handle with already known attribute values.
    pub fn resolved(
        name: impl Into<String>,
        resource_type: ResourceType,
        address: impl Into<String>,
        attributes: BTreeMap<String, Output>,
    ) -> Self {
        Self {
            name: name.into(),
            resource_type,
            address: address.into(),
            resolution: Resolution::Resolved(attributes),
        }
    }

    /// Read an attribute of the resource.
    pub fn output(&self, attribute: &str) -> Result<Output> {
        if !self.resource_type.has_attribute(attribute) {
            return Err(self.unknown(attribute));
        }
        match &self.resolution {
            Resolution::Deferred => Ok(Output::reference(&self.address, attribute)),
            Resolution::Resolved(attrs) => attrs
                .get(attribute)
                .cloned()
                .ok_or_else(|| self.unknown(attribute)),
        }
    }

    pub fn resource_name(&self) -> Result<Output> {
        self.output("name")
    }

    fn unknown(&self, attribute: &str) -> Error {
        Error::UnknownAttribute {
            resource: self.address.clone(),
            attribute: attribute.to_string(),
        }
    }
}
