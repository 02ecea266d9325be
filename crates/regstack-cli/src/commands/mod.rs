//! CLI command implementations.

pub mod deploy;
pub mod inspect;

use anyhow::{Context, Result};
use regstack_config::StackConfig;
use regstack_stack::deploy as declare_stack;
use regstack_terraform::TerraformEngine;
use std::path::Path;

/// Shown in place of secret values.
pub const MASK: &str = "[secret]";

/// Declare the stack against a Terraform engine.
pub async fn render(config: &StackConfig) -> Result<TerraformEngine> {
    let engine = TerraformEngine::new(
        &config.gcp_project,
        &config.gcp_region,
        config.state_bucket.as_deref(),
    );
    declare_stack(&engine, config)
        .await
        .context("failed to declare stack")?;
    Ok(engine)
}

/// Render the Terraform configuration into `workdir`.
pub async fn synth(config: &StackConfig, workdir: &Path) -> Result<TerraformEngine> {
    let engine = render(config).await?;
    let path = engine
        .write_to(workdir)
        .await
        .with_context(|| format!("failed to write configuration to {}", workdir.display()))?;

    let document = engine.document().await;
    println!(
        "Wrote {} ({} resources, {} outputs)",
        path.display(),
        document.resource_count(),
        document.output.len()
    );
    Ok(engine)
}

/// Format an output value, masking secrets unless asked not to.
pub fn display_value(value: &str, secret: bool, show_secrets: bool) -> &str {
    if secret && !show_secrets { MASK } else { value }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_value_masks_secrets() {
        assert_eq!(display_value("sa@p.iam.gserviceaccount.com", true, false), MASK);
        assert_eq!(
            display_value("sa@p.iam.gserviceaccount.com", true, true),
            "sa@p.iam.gserviceaccount.com"
        );
        assert_eq!(display_value("us-docker.pkg.dev", false, false), "us-docker.pkg.dev");
    }
}
