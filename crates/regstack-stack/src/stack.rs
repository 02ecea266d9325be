//! Top-level stack declaration.

use regstack_config::StackConfig;
use regstack_core::{Engine, Export, Output, ResourceHandle, Result};
use tracing::info;

use crate::federation::{self, IdentityFederation};
use crate::iam::{self, ServiceAccountDelegation};
use crate::naming;
use crate::registry::{self, Registry};
use crate::sbom::{self, SbomBucket};

pub const EXPORT_REGISTRY_URL: &str = "registryURL";
pub const EXPORT_SBOM_BUCKET_NAME: &str = "sbomBucketName";
pub const EXPORT_SERVICE_ACCOUNT_EMAIL: &str = "serviceAccountEmail";
pub const EXPORT_POOL_ID: &str = "workloadIdentityPoolID";
pub const EXPORT_PROVIDER_ID: &str = "workloadIdentityProviderID";
pub const EXPORT_PROVIDER_CONDITION: &str = "workloadIdentityProviderCondition";

/// Everything declared for one GitHub repository's CI registry.
#[derive(Debug, Clone)]
pub struct GithubRegistryStack {
    /// `owner/repo` slug the federation trusts.
    pub slug: String,
    pub registry: Registry,
    pub federation: IdentityFederation,
    /// Federated principal bound in every IAM binding below.
    pub principal: Output,
    pub repository_iam_members: Vec<ResourceHandle>,
    pub project_iam_members: Vec<ResourceHandle>,
    pub sbom: SbomBucket,
    pub service_account: Option<ServiceAccountDelegation>,
}

impl GithubRegistryStack {
    /// Declare the whole stack against `engine`.
    ///
    /// Steps run in order and the first failure aborts the declaration.
    pub async fn declare(engine: &dyn Engine, config: &StackConfig) -> Result<Self> {
        let slug = naming::repo_slug(&config.allowed_repo_url).to_string();
        info!(
            engine = engine.name(),
            project = %config.gcp_project,
            repository = %slug,
            "Declaring GitHub registry stack"
        );

        let registry = registry::declare_registry(engine, config).await?;
        let federation = federation::declare_identity_federation(engine, config, &slug).await?;

        let principal = naming::principal_set(&federation.pool.resource_name()?, &slug);

        let repository_iam_members =
            iam::declare_repository_bindings(engine, config, &registry, &principal).await?;
        let project_iam_members = iam::declare_project_bindings(engine, config, &principal).await?;
        let sbom = sbom::declare_sbom_bucket(engine, config, &principal).await?;

        let service_account = if config.create_service_account {
            Some(iam::declare_service_account_delegation(engine, config, &principal).await?)
        } else {
            None
        };

        Ok(Self {
            slug,
            registry,
            federation,
            principal,
            repository_iam_members,
            project_iam_members,
            sbom,
            service_account,
        })
    }

    /// Outputs for downstream consumers.
    pub fn exports(&self) -> Result<Vec<Export>> {
        let mut exports = vec![
            Export::plain(EXPORT_REGISTRY_URL, self.registry.url.clone()),
            Export::plain(EXPORT_SBOM_BUCKET_NAME, self.sbom.bucket.output("name")?),
        ];

        if let Some(delegation) = &self.service_account {
            exports.push(Export::secret(
                EXPORT_SERVICE_ACCOUNT_EMAIL,
                delegation.account.output("email")?,
            ));
        }

        exports.extend([
            Export::secret(EXPORT_POOL_ID, self.federation.pool.resource_name()?),
            Export::secret(EXPORT_PROVIDER_ID, self.federation.provider_path.clone()),
            Export::plain(
                EXPORT_PROVIDER_CONDITION,
                Output::known(&self.federation.attribute_condition),
            ),
        ]);

        Ok(exports)
    }

    /// Hand every output to the engine.
    pub async fn export(&self, engine: &dyn Engine) -> Result<()> {
        for export in self.exports()? {
            let name = export.name.clone();
            engine
                .export(export)
                .await
                .map_err(|e| e.during(format!("export {}", name)))?;
        }
        Ok(())
    }

    /// Every IAM binding that grants the federated principal a role.
    pub fn principal_bindings(&self) -> impl Iterator<Item = &ResourceHandle> {
        self.repository_iam_members
            .iter()
            .chain(&self.project_iam_members)
            .chain(std::iter::once(&self.sbom.binding))
            .chain(self.service_account.iter().map(|d| &d.binding))
    }
}

/// Declare the stack and export its outputs.
pub async fn deploy(engine: &dyn Engine, config: &StackConfig) -> Result<GithubRegistryStack> {
    let stack = GithubRegistryStack::declare(engine, config).await?;
    stack.export(engine).await?;
    info!(
        bindings = stack.principal_bindings().count(),
        service_account = stack.service_account.is_some(),
        "Stack declared"
    );
    Ok(stack)
}
