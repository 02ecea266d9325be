//! Commands that never touch Terraform or the cloud.

use anyhow::{Context, Result};
use regstack_config::StackConfig;
use regstack_core::{MemoryEngine, Output};
use regstack_stack::{condition, deploy as declare_stack, naming};

use super::{display_value, render};

pub fn validate(config: &StackConfig) -> Result<()> {
    let slug = naming::repo_slug(&config.allowed_repo_url);
    let repository_id = naming::repository_id(config);

    println!("Configuration is valid\n");
    println!("  repository slug:   {}", slug);
    println!("  repository id:     {}", repository_id);
    println!(
        "  registry url:      {}",
        naming::registry_url(
            &config.repository_location,
            &config.gcp_project,
            &Output::known(&repository_id)
        )
    );
    println!("  identity pool:     {}", naming::identity_pool_id(config));
    println!("  identity provider: {}", naming::identity_provider_id(config));
    if config.create_service_account {
        println!("  service account:   {}", naming::service_account_id(config));
    }
    println!(
        "  sbom bucket:       {}",
        naming::sbom_bucket_name(&config.gcp_project)
    );
    println!(
        "  condition:         {}",
        condition::build_attribute_condition(slug, config)
    );
    Ok(())
}

pub async fn preview(config: &StackConfig, show_secrets: bool) -> Result<()> {
    let engine = MemoryEngine::new();
    declare_stack(&engine, config)
        .await
        .context("failed to declare stack")?;

    println!("Resources:");
    for declared in engine.resources().await {
        let protect = if declared.resource.options.protect {
            " (protected)"
        } else {
            ""
        };
        println!("  {}{}", declared.handle.address, protect);
        for attribute in ["name", "email", "url"] {
            if let Ok(value) = declared.handle.output(attribute) {
                println!("      {} = {}", attribute, value);
            }
        }
    }

    println!("\nOutputs:");
    for export in engine.exports().await {
        let value = export.value.to_string();
        println!(
            "  {} = {}",
            export.name,
            display_value(&value, export.secret, show_secrets)
        );
    }

    println!(
        "\nProject number {} is a placeholder; real values are resolved on apply.",
        MemoryEngine::DEFAULT_PROJECT_NUMBER
    );
    Ok(())
}

pub async fn graph(config: &StackConfig) -> Result<()> {
    let engine = render(config).await?;
    let graph = engine.graph().await;
    let order = graph
        .topological_order()
        .context("failed to order resources")?;

    for address in order {
        match graph.node(&address) {
            Some(node) if !node.dependencies.is_empty() => {
                let deps: Vec<&str> = node.dependencies.iter().map(String::as_str).collect();
                println!("{} <- {}", address, deps.join(", "));
            }
            _ => println!("{}", address),
        }
    }
    Ok(())
}
