//! Error types for the Terraform backend.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TerraformError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Terraform init failed: {0}")]
    InitFailed(String),

    #[error("Terraform plan failed: {0}")]
    PlanFailed(String),

    #[error("Terraform apply failed: {0}")]
    ApplyFailed(String),

    #[error("Terraform show failed: {0}")]
    ShowFailed(String),

    #[error("Terraform output failed: {0}")]
    OutputFailed(String),

    #[error("Failed to parse terraform output: {0}")]
    ParseFailed(String),

    #[error("cycle detected in dependencies: {0}")]
    CycleDetected(String),

    #[error("{node} depends on undeclared {dependency}")]
    MissingDependency { node: String, dependency: String },
}

pub type TerraformResult<T> = std::result::Result<T, TerraformError>;
