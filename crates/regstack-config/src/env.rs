//! Environment variable names and the environment layer.

use crate::ConfigLayer;

pub const GCP_PROJECT: &str = "GCP_PROJECT";
pub const GCP_REGION: &str = "GCP_REGION";
pub const REPOSITORY_LOCATION: &str = "REPOSITORY_LOCATION";
pub const RESOURCE_PREFIX: &str = "RESOURCE_PREFIX";
pub const REPOSITORY_NAME: &str = "REPOSITORY_NAME";
pub const ALLOWED_REPO_URL: &str = "ALLOWED_REPO_URL";
pub const REPOSITORY_OWNER: &str = "REPOSITORY_OWNER";
pub const REPOSITORY_OWNER_ID: &str = "REPOSITORY_OWNER_ID";
pub const REPOSITORY_ID: &str = "REPOSITORY_ID";
pub const IDENTITY_POOL_PROVIDER_NAME: &str = "IDENTITY_POOL_PROVIDER_NAME";
pub const CREATE_SERVICE_ACCOUNT: &str = "CREATE_SERVICE_ACCOUNT";
pub const PROTECT_RESOURCES: &str = "PROTECT_RESOURCES";
pub const IMAGE_RETENTION_COUNT: &str = "IMAGE_RETENTION_COUNT";
pub const DELETE_IMAGES_OLDER_THAN: &str = "DELETE_IMAGES_OLDER_THAN";
pub const SBOM_RETENTION_DAYS: &str = "SBOM_RETENTION_DAYS";
pub const STATE_BUCKET: &str = "STATE_BUCKET";

/// Every setting read from the environment.
pub const ALL: &[&str] = &[
    GCP_PROJECT,
    GCP_REGION,
    REPOSITORY_LOCATION,
    RESOURCE_PREFIX,
    REPOSITORY_NAME,
    ALLOWED_REPO_URL,
    REPOSITORY_OWNER,
    REPOSITORY_OWNER_ID,
    REPOSITORY_ID,
    IDENTITY_POOL_PROVIDER_NAME,
    CREATE_SERVICE_ACCOUNT,
    PROTECT_RESOURCES,
    IMAGE_RETENTION_COUNT,
    DELETE_IMAGES_OLDER_THAN,
    SBOM_RETENTION_DAYS,
    STATE_BUCKET,
];

/// Build a layer from a variable lookup.
///
/// Variables that are unset or empty are left out of the layer.
pub fn layer_from_lookup<F>(lookup: F) -> ConfigLayer
where
    F: Fn(&str) -> Option<String>,
{
    let mut layer = ConfigLayer::default();
    for key in ALL {
        if let Some(value) = lookup(key) {
            layer.set(key, value);
        }
    }
    layer
}
