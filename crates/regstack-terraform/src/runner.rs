//! Terraform CLI runner for init/plan/apply/destroy operations.

use regstack_core::plan::{ChangeAction, PlanSummary, ResourceChange, RunType};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::error::{TerraformError, TerraformResult};

/// Binary used when none is configured.
pub const DEFAULT_TERRAFORM_BIN: &str = "terraform";

/// Saved plan file, relative to the work dir.
pub const PLAN_FILE: &str = "tfplan";

/// Runs the Terraform CLI in a work dir.
#[derive(Debug, Clone)]
pub struct TerraformRunner {
    /// Path to terraform binary
    terraform_bin: String,
}

impl Default for TerraformRunner {
    fn default() -> Self {
        Self::new(DEFAULT_TERRAFORM_BIN)
    }
}

impl TerraformRunner {
    pub fn new(terraform_bin: impl Into<String>) -> Self {
        Self {
            terraform_bin: terraform_bin.into(),
        }
    }

    /// Initialize a Terraform working directory.
    pub async fn init(
        &self,
        working_dir: &Path,
        backend_config: &BTreeMap<String, String>,
    ) -> TerraformResult<String> {
        info!(dir = %working_dir.display(), "Running terraform init");

        let mut args = vec![
            "init".to_string(),
            "-input=false".to_string(),
            "-no-color".to_string(),
        ];
        args.extend(
            backend_config
                .iter()
                .map(|(k, v)| format!("-backend-config={}={}", k, v)),
        );

        let output = Command::new(&self.terraform_bin)
            .args(&args)
            .current_dir(working_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let combined = format!("{}\n{}", stdout, stderr);

        if !output.status.success() {
            error!(output = %combined, "Terraform init failed");
            return Err(TerraformError::InitFailed(combined));
        }

        info!("Terraform init succeeded");
        Ok(combined)
    }

    /// Run terraform plan, saving the plan to the work dir.
    ///
    /// `RunType::Destroy` plans the removal of every resource.
    pub async fn plan(
        &self,
        working_dir: &Path,
        run_type: RunType,
        output_tx: Option<mpsc::Sender<String>>,
    ) -> TerraformResult<PlanResult> {
        info!(dir = %working_dir.display(), %run_type, "Running terraform plan");

        let mut args = vec![
            "plan".to_string(),
            "-input=false".to_string(),
            "-no-color".to_string(),
            "-detailed-exitcode".to_string(),
            format!("-out={}", PLAN_FILE),
        ];
        if run_type == RunType::Destroy {
            args.push("-destroy".to_string());
        }

        let (status, output) = self.stream(working_dir, &args, output_tx).await?;

        // Exit codes:
        // 0 = success, no changes
        // 1 = error
        // 2 = success, changes present
        let has_changes = status.code() == Some(2);
        let success = status.code() == Some(0) || has_changes;

        if !success {
            error!(output = %output, "Terraform plan failed");
            return Err(TerraformError::PlanFailed(output));
        }

        // The JSON plan is exact; fall back to the text output without it.
        let plan_json = match self.show_plan_json(working_dir).await {
            Ok(json) => Some(json),
            Err(e) => {
                warn!(error = %e, "Could not read JSON plan");
                None
            }
        };
        let summary = plan_json
            .as_ref()
            .and_then(summary_from_plan_json)
            .unwrap_or_else(|| parse_plan_output(&output));

        info!(
            has_changes = %has_changes,
            to_add = summary.to_add.len(),
            to_change = summary.to_change.len(),
            to_destroy = summary.to_destroy.len(),
            "Terraform plan completed"
        );

        Ok(PlanResult {
            run_type,
            has_changes,
            output,
            plan_file: has_changes.then(|| PathBuf::from(PLAN_FILE)),
            summary,
            plan_json,
        })
    }

    /// Run terraform apply on a saved plan.
    ///
    /// A relative `plan_file` is resolved against `working_dir`, as
    /// returned by [`TerraformRunner::plan`]. Applying a destroy plan
    /// removes the resources it lists.
    pub async fn apply(
        &self,
        working_dir: &Path,
        plan_file: &Path,
        output_tx: Option<mpsc::Sender<String>>,
    ) -> TerraformResult<ApplyResult> {
        info!(dir = %working_dir.display(), plan = %plan_file.display(), "Running terraform apply");

        let args = vec![
            "apply".to_string(),
            "-input=false".to_string(),
            "-no-color".to_string(),
            "-auto-approve".to_string(),
            plan_file.display().to_string(),
        ];

        let (status, output) = self.stream(working_dir, &args, output_tx).await?;

        if !status.success() {
            error!(output = %output, "Terraform apply failed");
            return Err(TerraformError::ApplyFailed(output));
        }

        let outputs = self.outputs(working_dir).await?;

        info!(outputs = ?outputs.keys().collect::<Vec<_>>(), "Terraform apply succeeded");

        Ok(ApplyResult { output, outputs })
    }

    /// Read terraform outputs.
    pub async fn outputs(
        &self,
        working_dir: &Path,
    ) -> TerraformResult<BTreeMap<String, TerraformOutput>> {
        let output = Command::new(&self.terraform_bin)
            .args(["output", "-json", "-no-color"])
            .current_dir(working_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            return Err(TerraformError::OutputFailed(
                String::from_utf8_lossy(&output.stderr).to_string(),
            ));
        }

        parse_outputs(&String::from_utf8_lossy(&output.stdout))
    }

    /// Show the saved plan as JSON.
    async fn show_plan_json(&self, working_dir: &Path) -> TerraformResult<serde_json::Value> {
        let output = Command::new(&self.terraform_bin)
            .args(["show", "-json", PLAN_FILE])
            .current_dir(working_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            return Err(TerraformError::ShowFailed(
                String::from_utf8_lossy(&output.stderr).to_string(),
            ));
        }

        let json_str = String::from_utf8_lossy(&output.stdout);
        serde_json::from_str(&json_str).map_err(|e| TerraformError::ParseFailed(e.to_string()))
    }

    /// Run a command, forwarding stdout and stderr lines as they arrive.
    async fn stream(
        &self,
        working_dir: &Path,
        args: &[String],
        output_tx: Option<mpsc::Sender<String>>,
    ) -> TerraformResult<(ExitStatus, String)> {
        debug!(bin = %self.terraform_bin, ?args, "Spawning terraform");

        let mut child = Command::new(&self.terraform_bin)
            .args(args)
            .current_dir(working_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("terraform stdout not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| std::io::Error::other("terraform stderr not captured"))?;

        let mut stdout_reader = BufReader::new(stdout).lines();
        let mut stderr_reader = BufReader::new(stderr).lines();
        let mut stdout_done = false;
        let mut stderr_done = false;

        let mut output_lines = Vec::new();

        while !(stdout_done && stderr_done) {
            let line = tokio::select! {
                line = stdout_reader.next_line(), if !stdout_done => match line {
                    Ok(Some(line)) => Some(line),
                    Ok(None) => {
                        stdout_done = true;
                        None
                    }
                    Err(e) => {
                        warn!(error = %e, "Error reading stdout");
                        stdout_done = true;
                        None
                    }
                },
                line = stderr_reader.next_line(), if !stderr_done => match line {
                    Ok(Some(line)) => Some(line),
                    Ok(None) => {
                        stderr_done = true;
                        None
                    }
                    Err(e) => {
                        warn!(error = %e, "Error reading stderr");
                        stderr_done = true;
                        None
                    }
                },
            };

            if let Some(line) = line {
                if let Some(ref tx) = output_tx {
                    let _ = tx.send(line.clone()).await;
                }
                output_lines.push(line);
            }
        }

        let status = child.wait().await?;
        Ok((status, output_lines.join("\n")))
    }
}

/// Result of a terraform plan.
#[derive(Debug)]
pub struct PlanResult {
    pub run_type: RunType,
    pub has_changes: bool,
    pub output: String,
    /// Saved plan relative to the work dir, present only when there is
    /// something to apply.
    pub plan_file: Option<PathBuf>,
    pub summary: PlanSummary,
    pub plan_json: Option<serde_json::Value>,
}

/// Result of a terraform apply.
#[derive(Debug)]
pub struct ApplyResult {
    pub output: String,
    pub outputs: BTreeMap<String, TerraformOutput>,
}

/// A value from `terraform output -json`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TerraformOutput {
    pub value: serde_json::Value,
    #[serde(default)]
    pub sensitive: bool,
}

/// Parse `terraform output -json`.
pub fn parse_outputs(json: &str) -> TerraformResult<BTreeMap<String, TerraformOutput>> {
    if json.trim().is_empty() {
        return Ok(BTreeMap::new());
    }
    serde_json::from_str(json).map_err(|e| TerraformError::ParseFailed(e.to_string()))
}

/// Build a summary from the `resource_changes` of a JSON plan.
pub fn summary_from_plan_json(plan: &serde_json::Value) -> Option<PlanSummary> {
    let changes = plan.get("resource_changes")?.as_array()?;
    let mut summary = PlanSummary::default();

    for change in changes {
        let actions: Vec<&str> = change
            .pointer("/change/actions")
            .and_then(|a| a.as_array())
            .map(|a| a.iter().filter_map(|v| v.as_str()).collect())
            .unwrap_or_default();

        let action = match actions.as_slice() {
            ["create"] => ChangeAction::Create,
            ["update"] => ChangeAction::Update,
            ["delete"] => ChangeAction::Delete,
            ["delete", "create"] | ["create", "delete"] => ChangeAction::Replace,
            _ => continue,
        };

        let field = |name: &str| {
            change
                .get(name)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string()
        };

        summary.record(ResourceChange {
            address: field("address"),
            resource_type: field("type"),
            name: field("name"),
            action,
        });
    }

    Some(summary)
}

/// Parse plan text output to extract resource changes.
pub fn parse_plan_output(output: &str) -> PlanSummary {
    let mut summary = PlanSummary::default();

    for line in output.lines() {
        if let Some(change) = parse_resource_line(line.trim()) {
            summary.record(change);
        }
    }

    summary
}

/// Parse a resource change line from plan output.
fn parse_resource_line(line: &str) -> Option<ResourceChange> {
    // "# google_storage_bucket.sbom will be created"
    // "# google_storage_bucket.sbom will be updated in-place"
    // "# google_storage_bucket.sbom must be replaced"
    // "# google_storage_bucket.sbom will be destroyed"
    let line = line.strip_prefix("# ")?;
    let (address, rest) = line.split_once(' ')?;

    let action = if rest.starts_with("will be created") {
        ChangeAction::Create
    } else if rest.starts_with("will be updated") {
        ChangeAction::Update
    } else if rest.starts_with("must be replaced") {
        ChangeAction::Replace
    } else if rest.starts_with("will be destroyed") {
        ChangeAction::Delete
    } else {
        return None;
    };

    // Data sources have a three-part address.
    let resource_address = address.strip_prefix("data.").unwrap_or(address);
    let (resource_type, name) = resource_address
        .split_once('.')
        .unwrap_or((resource_address, ""));

    Some(ResourceChange {
        address: address.to_string(),
        resource_type: resource_type.to_string(),
        name: name.to_string(),
        action,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_plan_output() {
        let output = r#"
Terraform will perform the following actions:

  # google_artifact_registry_repository.ci-registry will be created
  + resource "google_artifact_registry_repository" "ci-registry" {

  # google_storage_bucket.artifacts-test-project-sbom will be updated in-place
  ~ resource "google_storage_bucket" "artifacts-test-project-sbom" {

  # google_iam_workload_identity_pool_provider.ci-github-actions-provider must be replaced
-/+ resource "google_iam_workload_identity_pool_provider" "ci-github-actions-provider" {

  # google_service_account.ci-github-actions-sa will be destroyed

Plan: 2 to add, 1 to change, 2 to destroy.
"#;

        let summary = parse_plan_output(output);
        assert_eq!(summary.to_string(), "2 to add, 1 to change, 2 to destroy");
        assert_eq!(
            summary.to_add[0].address,
            "google_artifact_registry_repository.ci-registry"
        );
        assert_eq!(summary.to_add[0].resource_type, "google_artifact_registry_repository");
        assert_eq!(summary.to_add[0].name, "ci-registry");
        assert_eq!(summary.to_destroy[1].name, "ci-github-actions-sa");
    }

    #[test]
    fn test_read_lines_ignored() {
        let output = "  # data.google_project.test-project will be read during apply";
        assert!(parse_plan_output(output).is_empty());
    }

    #[test]
    fn test_summary_from_plan_json() {
        let plan = json!({
            "resource_changes": [
                {
                    "address": "google_storage_bucket.sbom",
                    "type": "google_storage_bucket",
                    "name": "sbom",
                    "change": { "actions": ["create"] }
                },
                {
                    "address": "google_project_iam_member.viewer",
                    "type": "google_project_iam_member",
                    "name": "viewer",
                    "change": { "actions": ["delete", "create"] }
                },
                {
                    "address": "google_iam_workload_identity_pool.pool",
                    "type": "google_iam_workload_identity_pool",
                    "name": "pool",
                    "change": { "actions": ["no-op"] }
                }
            ]
        });

        let summary = summary_from_plan_json(&plan).unwrap();
        assert_eq!(summary.to_string(), "2 to add, 0 to change, 1 to destroy");
        assert_eq!(summary.to_destroy[0].action, ChangeAction::Replace);
        assert!(summary_from_plan_json(&json!({})).is_none());
    }

    #[test]
    fn test_parse_outputs() {
        let json = r#"{
            "registryURL": { "sensitive": false, "type": "string", "value": "us-docker.pkg.dev/p/ci-registry" },
            "workloadIdentityPoolID": { "sensitive": true, "type": "string", "value": "projects/1/locations/global/workloadIdentityPools/pool" }
        }"#;

        let outputs = parse_outputs(json).unwrap();
        assert!(!outputs["registryURL"].sensitive);
        assert!(outputs["workloadIdentityPoolID"].sensitive);
        assert_eq!(
            outputs["registryURL"].value,
            json!("us-docker.pkg.dev/p/ci-registry")
        );
        assert!(parse_outputs("").unwrap().is_empty());
        assert!(matches!(
            parse_outputs("not json"),
            Err(TerraformError::ParseFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_binary_is_io_error() {
        let runner = TerraformRunner::new("regstack-no-such-terraform-binary");
        let err = runner
            .init(&std::env::temp_dir(), &BTreeMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, TerraformError::Io(_)));
    }

    #[tokio::test]
    async fn test_failing_binary_reports_step() {
        // `false` ignores its arguments and exits 1.
        let runner = TerraformRunner::new("false");
        let dir = std::env::temp_dir();

        assert!(matches!(
            runner.init(&dir, &BTreeMap::new()).await,
            Err(TerraformError::InitFailed(_))
        ));
        assert!(matches!(
            runner.plan(&dir, RunType::Plan, None).await,
            Err(TerraformError::PlanFailed(_))
        ));
        assert!(matches!(
            runner.apply(&dir, Path::new(PLAN_FILE), None).await,
            Err(TerraformError::ApplyFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_stream_forwards_lines() {
        // `echo` prints its arguments and exits 0.
        let runner = TerraformRunner::new("echo");
        let (tx, mut rx) = mpsc::channel(8);

        let result = runner
            .plan(&std::env::temp_dir(), RunType::Destroy, Some(tx))
            .await
            .unwrap();
        let expected = "plan -input=false -no-color -detailed-exitcode -out=tfplan -destroy";
        assert_eq!(result.output, expected);
        assert_eq!(rx.recv().await.as_deref(), Some(expected));
        assert!(!result.has_changes);
        assert!(result.plan_file.is_none());
    }

    #[tokio::test]
    async fn test_plan_then_apply_in_relative_work_dir() {
        // `sh <subcommand> ...` runs the script of that name from the work dir.
        let dir = PathBuf::from(format!("regstack-runner-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let scripts = [
            ("plan", "touch tfplan\nexit 2\n"),
            (
                "show",
                r#"echo '{"resource_changes":[{"address":"google_storage_bucket.sbom","type":"google_storage_bucket","name":"sbom","change":{"actions":["create"]}}]}'"#,
            ),
            ("apply", "test -f \"$4\" || { echo \"no plan at $4\" >&2; exit 1; }\n"),
            (
                "output",
                r#"echo '{"registryURL":{"sensitive":false,"value":"us-docker.pkg.dev/p/ci-registry"}}'"#,
            ),
        ];
        for (name, body) in scripts {
            std::fs::write(dir.join(name), body).unwrap();
        }

        let runner = TerraformRunner::new("sh");
        let planned = runner.plan(&dir, RunType::Apply, None).await.unwrap();
        assert!(planned.has_changes);
        assert_eq!(planned.summary.to_string(), "1 to add, 0 to change, 0 to destroy");

        let plan_file = planned.plan_file.unwrap();
        assert_eq!(plan_file, Path::new(PLAN_FILE));
        let applied = runner.apply(&dir, &plan_file, None).await;
        std::fs::remove_dir_all(&dir).unwrap();

        let applied = applied.unwrap();
        assert_eq!(
            applied.outputs["registryURL"].value,
            json!("us-docker.pkg.dev/p/ci-registry")
        );
    }
}
