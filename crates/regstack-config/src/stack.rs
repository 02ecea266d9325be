//! Stack configuration.

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::env;
use crate::file::parse_stack_file;
use crate::interpolate::find_references;
use crate::{ConfigError, ConfigResult};

const DEFAULT_RESOURCE_PREFIX: &str = "ci";
const DEFAULT_REPOSITORY_NAME: &str = "registry";
const DEFAULT_PROVIDER_NAME: &str = "github-actions-provider";
const DEFAULT_IMAGE_RETENTION_COUNT: u32 = 10;
const DEFAULT_DELETE_IMAGES_OLDER_THAN: &str = "30d";
const DEFAULT_SBOM_RETENTION_DAYS: u32 = 365;

/// Raw settings from one source, keyed by environment variable name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigLayer {
    values: BTreeMap<String, String>,
}

impl ConfigLayer {
    /// Set a value. Empty values are ignored.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        if !value.trim().is_empty() {
            self.values.insert(key.to_string(), value.trim().to_string());
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|s| s.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Fail on the first value that still holds a `${...}` reference.
    pub fn check_resolved(&self) -> ConfigResult<()> {
        for (key, value) in &self.values {
            if let Some(reference) = find_references(value).into_iter().next() {
                return Err(ConfigError::InvalidValue {
                    field: key.clone(),
                    message: format!("'${{{}}}' is not set", reference),
                });
            }
        }
        Ok(())
    }

    /// Overlay `other` on top of this layer.
    pub fn merge(mut self, other: ConfigLayer) -> Self {
        self.values.extend(other.values);
        self
    }
}

/// Resolved configuration for one deployment of the stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StackConfig {
    pub gcp_project: String,
    pub gcp_region: String,
    /// Registry location; defaults to the region.
    pub repository_location: String,
    pub resource_prefix: String,
    pub repository_name: String,
    /// GitHub repository allowed to authenticate, e.g. `https://github.com/acme/app`.
    pub allowed_repo_url: String,
    pub repository_owner: Option<String>,
    /// Numeric owner id. Stable across renames and transfers.
    pub repository_owner_id: Option<String>,
    /// Numeric repository id. Stable across renames and transfers.
    pub repository_id: Option<String>,
    pub identity_pool_provider_name: String,
    pub create_service_account: bool,
    pub protect_resources: bool,
    /// Most recent image versions always kept; 0 disables the policy.
    pub image_retention_count: u32,
    /// Versions older than this are deleted; zero disables the policy.
    pub delete_images_older_than: Duration,
    pub sbom_retention_days: u32,
    /// GCS bucket holding Terraform state.
    pub state_bucket: Option<String>,
}

impl StackConfig {
    /// Load configuration from an optional stack file and the process environment.
    pub fn load(file: Option<&Path>) -> ConfigResult<Self> {
        let contents = match file {
            Some(path) => Some(std::fs::read_to_string(path).map_err(|source| {
                ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                }
            })?),
            None => None,
        };
        let config = Self::load_with(contents.as_deref(), |key| std::env::var(key).ok())?;
        config.log_summary();
        Ok(config)
    }

    /// Load configuration from stack file contents and a variable lookup.
    ///
    /// Values from the lookup override values from the file.
    pub fn load_with<F>(file_contents: Option<&str>, lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file_layer = match file_contents {
            Some(contents) => parse_stack_file(contents, &lookup)?,
            None => ConfigLayer::default(),
        };
        let env_layer = env::layer_from_lookup(&lookup);
        Self::from_layer(&file_layer.merge(env_layer))
    }

    /// Resolve a merged layer, applying defaults and checking required settings.
    pub fn from_layer(layer: &ConfigLayer) -> ConfigResult<Self> {
        layer.check_resolved()?;

        let gcp_project = required(layer, env::GCP_PROJECT)?;
        let gcp_region = required(layer, env::GCP_REGION)?;
        let allowed_repo_url = required(layer, env::ALLOWED_REPO_URL)?;

        let repository_location = optional(layer, env::REPOSITORY_LOCATION)
            .unwrap_or_else(|| gcp_region.clone());

        let sbom_retention_days = match layer.get(env::SBOM_RETENTION_DAYS) {
            Some(raw) => parse_u32(env::SBOM_RETENTION_DAYS, raw)?,
            None => DEFAULT_SBOM_RETENTION_DAYS,
        };
        if sbom_retention_days == 0 {
            return Err(ConfigError::InvalidValue {
                field: env::SBOM_RETENTION_DAYS.to_string(),
                message: "must be at least 1 day".to_string(),
            });
        }

        Ok(Self {
            gcp_project,
            gcp_region,
            repository_location,
            resource_prefix: optional(layer, env::RESOURCE_PREFIX)
                .unwrap_or_else(|| DEFAULT_RESOURCE_PREFIX.to_string()),
            repository_name: optional(layer, env::REPOSITORY_NAME)
                .unwrap_or_else(|| DEFAULT_REPOSITORY_NAME.to_string()),
            allowed_repo_url,
            repository_owner: optional(layer, env::REPOSITORY_OWNER),
            repository_owner_id: optional(layer, env::REPOSITORY_OWNER_ID),
            repository_id: optional(layer, env::REPOSITORY_ID),
            identity_pool_provider_name: optional(layer, env::IDENTITY_POOL_PROVIDER_NAME)
                .unwrap_or_else(|| DEFAULT_PROVIDER_NAME.to_string()),
            create_service_account: match layer.get(env::CREATE_SERVICE_ACCOUNT) {
                Some(raw) => parse_bool(env::CREATE_SERVICE_ACCOUNT, raw)?,
                None => false,
            },
            protect_resources: match layer.get(env::PROTECT_RESOURCES) {
                Some(raw) => parse_bool(env::PROTECT_RESOURCES, raw)?,
                None => false,
            },
            image_retention_count: match layer.get(env::IMAGE_RETENTION_COUNT) {
                Some(raw) => parse_u32(env::IMAGE_RETENTION_COUNT, raw)?,
                None => DEFAULT_IMAGE_RETENTION_COUNT,
            },
            delete_images_older_than: parse_age(
                env::DELETE_IMAGES_OLDER_THAN,
                layer
                    .get(env::DELETE_IMAGES_OLDER_THAN)
                    .unwrap_or(DEFAULT_DELETE_IMAGES_OLDER_THAN),
            )?,
            sbom_retention_days,
            state_bucket: optional(layer, env::STATE_BUCKET),
        })
    }

    /// Log the resolved configuration.
    pub fn log_summary(&self) {
        info!("Configuration loaded successfully");
        info!(project = %self.gcp_project, region = %self.gcp_region, "GCP target");
        info!(
            prefix = %self.resource_prefix,
            repository = %self.repository_name,
            location = %self.repository_location,
            "Registry"
        );
        info!(
            allowed_repo_url = %self.allowed_repo_url,
            owner = ?self.repository_owner,
            owner_id = ?self.repository_owner_id,
            repository_id = ?self.repository_id,
            provider = %self.identity_pool_provider_name,
            "Identity federation"
        );
        info!(
            create_service_account = self.create_service_account,
            protect_resources = self.protect_resources,
            image_retention_count = self.image_retention_count,
            delete_images_older_than_secs = self.delete_images_older_than.as_secs(),
            sbom_retention_days = self.sbom_retention_days,
            "Options"
        );
    }
}

fn required(layer: &ConfigLayer, key: &str) -> ConfigResult<String> {
    optional(layer, key).ok_or_else(|| ConfigError::MissingField(key.to_string()))
}

fn optional(layer: &ConfigLayer, key: &str) -> Option<String> {
    layer.get(key).map(|s| s.to_string())
}

fn parse_bool(field: &str, raw: &str) -> ConfigResult<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            field: field.to_string(),
            message: format!("expected a boolean, got '{}'", raw),
        }),
    }
}

fn parse_u32(field: &str, raw: &str) -> ConfigResult<u32> {
    raw.parse::<u32>().map_err(|e| ConfigError::InvalidValue {
        field: field.to_string(),
        message: format!("'{}': {}", raw, e),
    })
}

/// Parse an age such as `30d`, `12h`, `90m` or `3600s`.
pub fn parse_age(field: &str, raw: &str) -> ConfigResult<Duration> {
    let invalid = |message: String| ConfigError::InvalidValue {
        field: field.to_string(),
        message,
    };

    let split = raw
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| invalid(format!("'{}' has no unit (use s, m, h or d)", raw)))?;
    let (digits, unit) = raw.split_at(split);

    let amount: u64 = digits
        .parse()
        .map_err(|_| invalid(format!("'{}' does not start with a number", raw)))?;
    let multiplier = match unit {
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        "d" => 24 * 60 * 60,
        _ => return Err(invalid(format!("unknown unit '{}' in '{}'", unit, raw))),
    };

    amount
        .checked_mul(multiplier)
        .map(Duration::from_secs)
        .ok_or_else(|| invalid(format!("'{}' is too large", raw)))
}
