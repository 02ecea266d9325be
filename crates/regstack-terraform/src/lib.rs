//! Terraform backend for regstack.
//!
//! - [`TerraformEngine`] renders declarations into `main.tf.json`
//! - [`DependencyGraph`] orders declarations by their references
//! - [`TerraformRunner`] drives the Terraform CLI over the rendered work dir

pub mod document;
pub mod engine;
pub mod error;
pub mod graph;
pub mod runner;

pub use document::TerraformDocument;
pub use engine::TerraformEngine;
pub use error::{TerraformError, TerraformResult};
pub use graph::DependencyGraph;
pub use runner::{ApplyResult, PlanResult, TerraformOutput, TerraformRunner};
