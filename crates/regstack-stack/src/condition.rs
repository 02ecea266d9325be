//! Attribute mapping and attribute condition for the GitHub OIDC provider.

use regstack_config::StackConfig;
use std::collections::BTreeMap;

/// Token issuer for GitHub Actions.
pub const GITHUB_ISSUER_URI: &str = "https://token.actions.githubusercontent.com";

/// Claims mapped from the GitHub token to provider attributes.
pub const ATTRIBUTE_MAPPING: &[(&str, &str)] = &[
    ("google.subject", "assertion.sub"),
    ("attribute.repository", "assertion.repository"),
    ("attribute.repository_owner", "assertion.repository_owner"),
    ("attribute.repository_owner_id", "assertion.repository_owner_id"),
    ("attribute.repository_id", "assertion.repository_id"),
    ("attribute.actor", "assertion.actor"),
    ("attribute.ref", "assertion.ref"),
    ("attribute.sha", "assertion.sha"),
    ("attribute.workflow", "assertion.workflow"),
    ("attribute.head_ref", "assertion.head_ref"),
    ("attribute.base_ref", "assertion.base_ref"),
    ("attribute.aud", "assertion.aud"),
];

pub fn attribute_mapping() -> BTreeMap<String, String> {
    ATTRIBUTE_MAPPING
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Constraints a presented token must satisfy.
///
/// The numeric ids survive renames and ownership transfers, the names do
/// not; set them whenever they are known.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepositoryConstraints {
    pub repository: String,
    pub owner: Option<String>,
    pub owner_id: Option<String>,
    pub repository_id: Option<String>,
}

impl RepositoryConstraints {
    pub fn new(repository: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            ..Default::default()
        }
    }

    pub fn from_config(slug: &str, config: &StackConfig) -> Self {
        Self {
            repository: slug.to_string(),
            owner: config.repository_owner.clone(),
            owner_id: config.repository_owner_id.clone(),
            repository_id: config.repository_id.clone(),
        }
    }

    /// Build the CEL attribute condition.
    ///
    /// The repository clause always comes first, followed by the owner,
    /// owner id and repository id clauses for each non-empty value.
    pub fn to_condition(&self) -> String {
        let mut clauses = vec![clause("attribute.repository", &self.repository)];

        let optional = [
            ("attribute.repository_owner", &self.owner),
            ("attribute.repository_owner_id", &self.owner_id),
            ("attribute.repository_id", &self.repository_id),
        ];
        for (attribute, value) in optional {
            if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
                clauses.push(clause(attribute, value));
            }
        }

        clauses.join(" && ")
    }
}

fn clause(attribute: &str, value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("{} == \"{}\"", attribute, escaped)
}

/// Attribute condition for the configured repository.
pub fn build_attribute_condition(slug: &str, config: &StackConfig) -> String {
    RepositoryConstraints::from_config(slug, config).to_condition()
}
