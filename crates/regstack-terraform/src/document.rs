//! Terraform JSON configuration (`main.tf.json`).

use regstack_core::Output;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// File the document is rendered to inside the work dir.
pub const MAIN_FILE: &str = "main.tf.json";

pub const GOOGLE_PROVIDER_SOURCE: &str = "hashicorp/google";
pub const GOOGLE_PROVIDER_VERSION: &str = ">= 5.0";

/// Prefix for state objects in the GCS backend.
pub const STATE_PREFIX: &str = "regstack";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequiredProvider {
    pub source: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GcsBackend {
    pub bucket: String,
    pub prefix: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TerraformSettings {
    pub required_providers: BTreeMap<String, RequiredProvider>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<BTreeMap<String, GcsBackend>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GoogleProvider {
    pub project: String,
    pub region: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputBlock {
    pub value: Output,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub sensitive: bool,
}

/// A complete Terraform JSON document.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TerraformDocument {
    pub terraform: TerraformSettings,
    pub provider: BTreeMap<String, GoogleProvider>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, BTreeMap<String, Value>>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub resource: BTreeMap<String, BTreeMap<String, Value>>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub output: BTreeMap<String, OutputBlock>,
}

impl TerraformDocument {
    /// A document configured for the Google provider.
    ///
    /// With a state bucket the GCS backend is configured; otherwise state
    /// stays local to the work dir.
    pub fn new(project: &str, region: &str, state_bucket: Option<&str>) -> Self {
        let mut required_providers = BTreeMap::new();
        required_providers.insert(
            "google".to_string(),
            RequiredProvider {
                source: GOOGLE_PROVIDER_SOURCE.to_string(),
                version: GOOGLE_PROVIDER_VERSION.to_string(),
            },
        );

        let backend = state_bucket.map(|bucket| {
            BTreeMap::from([(
                "gcs".to_string(),
                GcsBackend {
                    bucket: bucket.to_string(),
                    prefix: STATE_PREFIX.to_string(),
                },
            )])
        });

        let provider = BTreeMap::from([(
            "google".to_string(),
            GoogleProvider {
                project: project.to_string(),
                region: region.to_string(),
            },
        )]);

        Self {
            terraform: TerraformSettings {
                required_providers,
                backend,
            },
            provider,
            ..Default::default()
        }
    }

    pub fn has_resource(&self, type_name: &str, label: &str) -> bool {
        self.resource
            .get(type_name)
            .is_some_and(|blocks| blocks.contains_key(label))
    }

    pub fn has_data(&self, type_name: &str, label: &str) -> bool {
        self.data
            .get(type_name)
            .is_some_and(|blocks| blocks.contains_key(label))
    }

    pub fn insert_resource(&mut self, type_name: &str, label: &str, body: Value) {
        self.resource
            .entry(type_name.to_string())
            .or_default()
            .insert(label.to_string(), body);
    }

    pub fn insert_data(&mut self, type_name: &str, label: &str, body: Value) {
        self.data
            .entry(type_name.to_string())
            .or_default()
            .insert(label.to_string(), body);
    }

    pub fn resource_count(&self) -> usize {
        self.resource.values().map(BTreeMap::len).sum()
    }

    /// Pretty-printed JSON.
    pub fn render(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Add `lifecycle.prevent_destroy` to a resource body.
pub fn prevent_destroy(body: &mut Value) {
    if let Value::Object(fields) = body {
        let mut lifecycle = Map::new();
        lifecycle.insert("prevent_destroy".to_string(), Value::Bool(true));
        fields.insert("lifecycle".to_string(), Value::Object(lifecycle));
    }
}

/// Turn a logical name into a valid Terraform block label.
///
/// Labels may contain letters, digits, underscores and dashes and must not
/// start with a digit or a dash.
pub fn sanitize_label(name: &str) -> String {
    let mut label: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if !label.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_') {
        label.insert(0, '_');
    }
    label
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sanitize_label() {
        assert_eq!(sanitize_label("ci-registry"), "ci-registry");
        assert_eq!(
            sanitize_label("ci-repo-iam-roles/artifactregistry.writer"),
            "ci-repo-iam-roles_artifactregistry_writer"
        );
        assert_eq!(sanitize_label("123-project"), "_123-project");
        assert_eq!(sanitize_label("-x"), "_-x");
        assert_eq!(sanitize_label(""), "_");
    }

    #[test]
    fn test_document_without_backend() {
        let doc = TerraformDocument::new("test-project", "us-central1", None);
        let json = serde_json::to_value(&doc).unwrap();

        assert_eq!(
            json,
            json!({
                "terraform": {
                    "required_providers": {
                        "google": { "source": "hashicorp/google", "version": ">= 5.0" }
                    }
                },
                "provider": {
                    "google": { "project": "test-project", "region": "us-central1" }
                }
            })
        );
    }

    #[test]
    fn test_document_with_backend_and_output() {
        let mut doc = TerraformDocument::new("test-project", "us-central1", Some("tf-state"));
        doc.output.insert(
            "workloadIdentityPoolID".to_string(),
            OutputBlock {
                value: Output::reference("google_iam_workload_identity_pool.pool", "name"),
                sensitive: true,
            },
        );
        let json = serde_json::to_value(&doc).unwrap();

        assert_eq!(
            json["terraform"]["backend"]["gcs"],
            json!({ "bucket": "tf-state", "prefix": "regstack" })
        );
        assert_eq!(
            json["output"]["workloadIdentityPoolID"],
            json!({
                "value": "${google_iam_workload_identity_pool.pool.name}",
                "sensitive": true
            })
        );
    }

    #[test]
    fn test_prevent_destroy() {
        let mut body = json!({ "name": "bucket" });
        prevent_destroy(&mut body);
        assert_eq!(body["lifecycle"]["prevent_destroy"], json!(true));
    }
}
