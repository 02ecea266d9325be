//! Identifier composition.
//!
//! Pure helpers deriving resource ids, the repository slug and the
//! principal/provider identifiers from configuration and engine outputs.

use regstack_config::StackConfig;
use regstack_core::Output;
use tracing::warn;

/// Artifact Registry repository ids are at most 63 characters.
pub const MAX_REPOSITORY_ID_LEN: usize = 63;
/// Workload identity pool and provider ids are at most 32 characters.
pub const MAX_IDENTITY_ID_LEN: usize = 32;
/// Service account ids are at most 30 characters.
pub const MAX_SERVICE_ACCOUNT_ID_LEN: usize = 30;

pub const GITHUB_URL_PREFIX: &str = "https://github.com/";

/// Truncate `name` to at most `max_len` characters.
pub fn cap_to_max(name: &str, max_len: usize) -> String {
    name.chars().take(max_len).collect()
}

fn capped(kind: &str, name: String, max_len: usize) -> String {
    let capped = cap_to_max(&name, max_len);
    if capped != name {
        // Distinct configurations can truncate to the same id.
        warn!(kind, original = %name, truncated = %capped, max_len, "Truncated resource id");
    }
    capped
}

/// `<prefix>-<repository-name>`, capped to 63 characters.
pub fn repository_id(config: &StackConfig) -> String {
    capped(
        "artifact registry repository",
        format!("{}-{}", config.resource_prefix, config.repository_name),
        MAX_REPOSITORY_ID_LEN,
    )
}

/// `<prefix>-github-actions-pool`, capped to 32 characters.
pub fn identity_pool_id(config: &StackConfig) -> String {
    capped(
        "workload identity pool",
        format!("{}-github-actions-pool", config.resource_prefix),
        MAX_IDENTITY_ID_LEN,
    )
}

/// `<prefix>-<provider-name>`, capped to 32 characters.
pub fn identity_provider_id(config: &StackConfig) -> String {
    capped(
        "workload identity pool provider",
        format!(
            "{}-{}",
            config.resource_prefix, config.identity_pool_provider_name
        ),
        MAX_IDENTITY_ID_LEN,
    )
}

/// `<prefix>-github-actions-sa`, capped to 30 characters.
pub fn service_account_id(config: &StackConfig) -> String {
    capped(
        "service account",
        format!("{}-github-actions-sa", config.resource_prefix),
        MAX_SERVICE_ACCOUNT_ID_LEN,
    )
}

/// Extract the `owner/repo` slug from a GitHub URL.
///
/// Anything that does not start with `https://github.com/` is returned as is.
pub fn repo_slug(repo_url: &str) -> &str {
    match repo_url.strip_prefix(GITHUB_URL_PREFIX) {
        Some(slug) if !slug.is_empty() => slug,
        _ => repo_url,
    }
}

/// `artifacts-<project>-sbom`
pub fn sbom_bucket_name(project: &str) -> String {
    format!("artifacts-{}-sbom", project)
}

/// `<location>-docker.pkg.dev/<project>/<repository>`
pub fn registry_url(location: &str, project: &str, repository: &Output) -> Output {
    Output::concat([
        Output::known(format!("{}-docker.pkg.dev/{}/", location, project)),
        repository.clone(),
    ])
}

/// Federated principal set for every identity from one GitHub repository.
pub fn principal_set(pool_name: &Output, slug: &str) -> Output {
    Output::concat([
        Output::from("principalSet://iam.googleapis.com/"),
        pool_name.clone(),
        Output::known(format!("/attribute.repository/{}", slug)),
    ])
}

/// Globally qualified provider path.
///
/// Uses the numeric project number; the project id is not accepted here.
pub fn provider_path(project_number: &Output, pool_id: &Output, provider_id: &Output) -> Output {
    Output::concat([
        Output::from("projects/"),
        project_number.clone(),
        Output::from("/locations/global/workloadIdentityPools/"),
        pool_id.clone(),
        Output::from("/providers/"),
        provider_id.clone(),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use regstack_config::ConfigLayer;

    fn config(prefix: &str, provider: &str) -> StackConfig {
        let mut layer = ConfigLayer::default();
        layer.set("GCP_PROJECT", "test-project");
        layer.set("GCP_REGION", "us-central1");
        layer.set("ALLOWED_REPO_URL", "https://github.com/test/repo");
        layer.set("RESOURCE_PREFIX", prefix);
        layer.set("IDENTITY_POOL_PROVIDER_NAME", provider);
        StackConfig::from_layer(&layer).unwrap()
    }

    #[test]
    fn test_cap_to_max() {
        assert_eq!(cap_to_max("short", 32), "short");
        assert_eq!(cap_to_max("abcdef", 3), "abc");
        assert_eq!(cap_to_max("", 3), "");
        // Multi-byte characters are never split.
        assert_eq!(cap_to_max("ééé", 2), "éé");
    }

    #[test]
    fn test_repo_slug() {
        assert_eq!(repo_slug("https://github.com/test/repo"), "test/repo");
        assert_eq!(repo_slug("test/repo"), "test/repo");
        assert_eq!(repo_slug("https://github.com/"), "https://github.com/");
        assert_eq!(repo_slug("http://github.com/test/repo"), "http://github.com/test/repo");
    }

    #[test]
    fn test_default_ids() {
        let config = config("ci", "github-actions-provider");
        assert_eq!(repository_id(&config), "ci-registry");
        assert_eq!(identity_pool_id(&config), "ci-github-actions-pool");
        assert_eq!(identity_provider_id(&config), "ci-github-actions-provider");
        assert_eq!(service_account_id(&config), "ci-github-actions-sa");
    }

    #[test]
    fn test_identity_ids_never_exceed_limit() {
        let long = "x".repeat(64);
        for prefix in ["ci", "production-platform", "a-very-long-prefix-for-everything"] {
            for provider in ["p", "github-actions-provider", long.as_str()] {
                let config = config(prefix, provider);
                assert!(identity_provider_id(&config).chars().count() <= MAX_IDENTITY_ID_LEN);
                assert!(identity_pool_id(&config).chars().count() <= MAX_IDENTITY_ID_LEN);
                assert!(service_account_id(&config).chars().count() <= MAX_SERVICE_ACCOUNT_ID_LEN);
            }
        }
    }

    #[test]
    fn test_long_similar_prefixes_collide() {
        // Known limitation: truncation alone cannot keep these apart.
        let a = config("platform-team-production-us-east-a", "github-actions-provider");
        let b = config("platform-team-production-us-east-b", "github-actions-provider");
        assert_eq!(identity_provider_id(&a), identity_provider_id(&b));
    }

    #[test]
    fn test_registry_url_shape() {
        let url = registry_url("us", "test-project", &Output::known("ci-registry"));
        assert_eq!(url.to_string(), "us-docker.pkg.dev/test-project/ci-registry");
    }

    #[test]
    fn test_sbom_bucket_name() {
        assert_eq!(sbom_bucket_name("test-project"), "artifacts-test-project-sbom");
    }

    #[test]
    fn test_provider_path_with_references() {
        let path = provider_path(
            &Output::reference("data.google_project.test-project", "number"),
            &Output::known("ci-github-actions-pool"),
            &Output::known("ci-github-actions-provider"),
        );
        assert_eq!(
            path.to_interpolation(),
            "projects/${data.google_project.test-project.number}/locations/global/workloadIdentityPools/ci-github-actions-pool/providers/ci-github-actions-provider"
        );
    }
}
