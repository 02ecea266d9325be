//! KDL stack file parsing.
//!
//! ```kdl
//! project "my-project"
//! region "us-central1"
//! prefix "ci"
//! registry "registry" location="us" {
//!     keep-recent 10
//!     delete-older-than "30d"
//! }
//! github "https://github.com/acme/app" owner="acme" owner-id="1234" repository-id="5678"
//! provider "github-actions-provider"
//! service-account create=#true
//! protect #true
//! sbom retention-days=365
//! state-bucket "acme-terraform-state"
//! ```

use kdl::{KdlDocument, KdlNode, KdlValue};
use std::collections::HashSet;

use crate::env;
use crate::interpolate::Interpolator;
use crate::{ConfigError, ConfigLayer, ConfigResult};

/// Parse a stack file into a configuration layer.
///
/// String values are interpolated with `${env.NAME}` through `lookup`.
pub fn parse_stack_file<F>(contents: &str, lookup: &F) -> ConfigResult<ConfigLayer>
where
    F: Fn(&str) -> Option<String>,
{
    let doc: KdlDocument = contents.parse()?;
    let interpolator = Interpolator::new(lookup);
    let mut layer = ConfigLayer::default();
    let mut seen = HashSet::new();

    let mut put = |key: &str, value: Option<String>| {
        if let Some(value) = value {
            layer.set(key, interpolator.interpolate(&value));
        }
    };

    for node in doc.nodes() {
        let name = node.name().value();
        if !seen.insert(name.to_string()) {
            return Err(ConfigError::Duplicate(name.to_string()));
        }

        match name {
            "project" => put(env::GCP_PROJECT, first_arg(node)),
            "region" => put(env::GCP_REGION, first_arg(node)),
            "prefix" => put(env::RESOURCE_PREFIX, first_arg(node)),
            "registry" => {
                put(env::REPOSITORY_NAME, first_arg(node));
                put(env::REPOSITORY_LOCATION, prop(node, "location"));
                if let Some(children) = node.children() {
                    for child in children.nodes() {
                        match child.name().value() {
                            "keep-recent" => put(env::IMAGE_RETENTION_COUNT, first_arg(child)),
                            "delete-older-than" => {
                                put(env::DELETE_IMAGES_OLDER_THAN, first_arg(child))
                            }
                            other => {
                                return Err(ConfigError::UnknownNode(format!("registry.{}", other)));
                            }
                        }
                    }
                }
            }
            "github" => {
                put(env::ALLOWED_REPO_URL, first_arg(node));
                put(env::REPOSITORY_OWNER, prop(node, "owner"));
                put(env::REPOSITORY_OWNER_ID, prop(node, "owner-id"));
                put(env::REPOSITORY_ID, prop(node, "repository-id"));
            }
            "provider" => put(env::IDENTITY_POOL_PROVIDER_NAME, first_arg(node)),
            "service-account" => put(
                env::CREATE_SERVICE_ACCOUNT,
                prop(node, "create").or_else(|| first_arg(node)),
            ),
            "protect" => put(env::PROTECT_RESOURCES, first_arg(node)),
            "sbom" => put(env::SBOM_RETENTION_DAYS, prop(node, "retention-days")),
            "state-bucket" => put(env::STATE_BUCKET, first_arg(node)),
            other => return Err(ConfigError::UnknownNode(other.to_string())),
        }
    }

    Ok(layer)
}

// Helper functions for extracting values from KDL nodes

fn scalar(value: &KdlValue) -> Option<String> {
    if let Some(s) = value.as_string() {
        return Some(s.to_string());
    }
    if let Some(i) = value.as_integer() {
        return Some(i.to_string());
    }
    value.as_bool().map(|b| b.to_string())
}

fn first_arg(node: &KdlNode) -> Option<String> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| scalar(e.value()))
}

fn prop(node: &KdlNode, name: &str) -> Option<String> {
    node.get(name).and_then(scalar)
}
