//! Engine trait.
//!
//! An engine receives resource declarations and hands back handles whose
//! attributes it will resolve. Ordering, diffing and the calls against the
//! cloud API all belong to the engine.

use async_trait::async_trait;
use serde::Serialize;

use crate::{Output, Resource, ResourceHandle, Result};

/// Result of looking up a project.
#[derive(Debug, Clone)]
pub struct ProjectInfo {
    /// Human-readable project id.
    pub project_id: String,
    /// Numeric project number.
    pub number: Output,
}

/// A value exported for downstream consumers.
#[derive(Debug, Clone, Serialize)]
pub struct Export {
    pub name: String,
    pub value: Output,
    /// Secret exports are masked when displayed.
    pub secret: bool,
}

impl Export {
    pub fn plain(name: impl Into<String>, value: Output) -> Self {
        Self {
            name: name.into(),
            value,
            secret: false,
        }
    }

    pub fn secret(name: impl Into<String>, value: Output) -> Self {
        Self {
            name: name.into(),
            value,
            secret: true,
        }
    }
}

/// Trait for provisioning engines.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Name of this engine.
    fn name(&self) -> &'static str;

    /// Declare a resource.
    async fn register(&self, resource: Resource) -> Result<ResourceHandle>;

    /// Look up an existing project.
    async fn lookup_project(&self, project_id: &str) -> Result<ProjectInfo>;

    /// Export a value.
    async fn export(&self, export: Export) -> Result<()>;
}
