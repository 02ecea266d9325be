//! Commands that drive Terraform.

use anyhow::{Context, Result, bail};
use regstack_config::StackConfig;
use regstack_core::plan::{PlanSummary, RunType};
use regstack_terraform::{PlanResult, TerraformOutput, TerraformRunner};
use std::collections::BTreeMap;
use std::path::Path;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

use super::{display_value, synth};

/// Print Terraform output lines as they arrive.
fn stream_to_stdout() -> (mpsc::Sender<String>, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<String>(256);
    let handle = tokio::spawn(async move {
        while let Some(line) = rx.recv().await {
            println!("{}", line);
        }
    });
    (tx, handle)
}

async fn init(config: &StackConfig, runner: &TerraformRunner, workdir: &Path) -> Result<()> {
    synth(config, workdir).await?;
    info!(workdir = %workdir.display(), "Initializing work dir");
    runner
        .init(workdir, &BTreeMap::new())
        .await
        .context("terraform init failed")?;
    Ok(())
}

async fn run_plan(runner: &TerraformRunner, workdir: &Path, run_type: RunType) -> Result<PlanResult> {
    let (tx, printer) = stream_to_stdout();
    let result = runner.plan(workdir, run_type, Some(tx)).await;
    // The sender is gone once plan returns, so the printer drains and exits.
    let _ = printer.await;
    let result = result.with_context(|| format!("terraform plan ({}) failed", run_type))?;
    info!(%run_type, has_changes = result.has_changes, "Plan finished");

    print_summary(&result.summary);
    Ok(result)
}

fn print_summary(summary: &PlanSummary) {
    println!();
    for change in summary
        .to_add
        .iter()
        .chain(&summary.to_change)
        .chain(&summary.to_destroy)
    {
        println!("  {:>8} {}", change.action.to_string(), change.address);
    }
    println!("Plan: {}.", summary);
}

fn print_outputs(outputs: &BTreeMap<String, TerraformOutput>, show_secrets: bool) {
    if outputs.is_empty() {
        println!("No outputs.");
        return;
    }
    for (name, output) in outputs {
        let value = match &output.value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        println!(
            "{} = {}",
            name,
            display_value(&value, output.sensitive, show_secrets)
        );
    }
}

pub async fn plan(config: &StackConfig, runner: &TerraformRunner, workdir: &Path) -> Result<()> {
    init(config, runner, workdir).await?;
    let result = run_plan(runner, workdir, RunType::Plan).await?;
    if !result.has_changes {
        println!("No changes. Infrastructure matches the configuration.");
    }
    Ok(())
}

pub async fn apply(
    config: &StackConfig,
    runner: &TerraformRunner,
    workdir: &Path,
    auto_approve: bool,
) -> Result<()> {
    init(config, runner, workdir).await?;
    let result = run_plan(runner, workdir, RunType::Apply).await?;

    let Some(plan_file) = result.plan_file else {
        println!("No changes. Infrastructure matches the configuration.");
        return Ok(());
    };
    if !auto_approve {
        bail!("changes pending; re-run with --auto-approve to apply them");
    }

    info!(plan = %plan_file.display(), "Applying saved plan");
    let (tx, printer) = stream_to_stdout();
    let applied = runner.apply(workdir, &plan_file, Some(tx)).await;
    let _ = printer.await;
    let applied = applied.context("terraform apply failed")?;
    info!(outputs = applied.outputs.len(), "Apply finished");

    println!("\nOutputs:");
    print_outputs(&applied.outputs, false);
    Ok(())
}

pub async fn destroy(
    config: &StackConfig,
    runner: &TerraformRunner,
    workdir: &Path,
    auto_approve: bool,
) -> Result<()> {
    init(config, runner, workdir).await?;
    let result = run_plan(runner, workdir, RunType::Destroy).await?;

    let Some(plan_file) = result.plan_file else {
        println!("Nothing to destroy.");
        return Ok(());
    };
    if !auto_approve {
        bail!("re-run with --auto-approve to destroy these resources");
    }

    // Apply the destroy plan that was shown, not a fresh one.
    info!(plan = %plan_file.display(), "Applying saved destroy plan");
    let (tx, printer) = stream_to_stdout();
    let destroyed = runner.apply(workdir, &plan_file, Some(tx)).await;
    let _ = printer.await;
    destroyed.context("terraform destroy failed")?;
    info!("Destroy finished");
    Ok(())
}

pub async fn outputs(runner: &TerraformRunner, workdir: &Path, show_secrets: bool) -> Result<()> {
    let outputs = runner
        .outputs(workdir)
        .await
        .context("failed to read terraform outputs")?;
    print_outputs(&outputs, show_secrets);
    Ok(())
}
