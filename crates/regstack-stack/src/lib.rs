//! GitHub Actions registry stack for regstack.
//!
//! Declares, against any [`Engine`](regstack_core::Engine):
//! - an Artifact Registry Docker repository
//! - a workload identity pool and GitHub OIDC provider
//! - IAM bindings for the federated repository principal
//! - an SBOM storage bucket
//! - optionally, a service account the principal may impersonate

pub mod condition;
pub mod federation;
pub mod iam;
pub mod naming;
pub mod registry;
pub mod sbom;
pub mod stack;

pub use condition::RepositoryConstraints;
pub use federation::IdentityFederation;
pub use iam::ServiceAccountDelegation;
pub use registry::Registry;
pub use sbom::SbomBucket;
pub use stack::{GithubRegistryStack, deploy};
