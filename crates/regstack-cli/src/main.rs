//! regstack CLI tool.

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use regstack_config::StackConfig;
use regstack_terraform::TerraformRunner;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "regstack")]
#[command(about = "GitHub Actions registry and identity federation for Google Cloud", long_about = None)]
struct Cli {
    /// Stack file (KDL); environment variables override its values
    #[arg(long, global = true, env = "REGSTACK_CONFIG")]
    config: Option<PathBuf>,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Directory holding the rendered Terraform configuration and state
    #[arg(long, global = true, default_value = ".regstack")]
    workdir: PathBuf,

    /// Terraform binary
    #[arg(long, global = true, env = "TERRAFORM_BIN", default_value = "terraform")]
    terraform_bin: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Check the configuration and print the derived identifiers
    Validate,
    /// Declare the stack in memory and print resources and outputs
    Preview {
        /// Print secret outputs in clear text
        #[arg(long)]
        show_secrets: bool,
    },
    /// Render the Terraform configuration into the work dir
    Synth,
    /// Print resources in dependency order
    Graph,
    /// Show the changes Terraform would make
    Plan,
    /// Apply the stack
    Apply {
        /// Apply without stopping at the plan
        #[arg(long)]
        auto_approve: bool,
    },
    /// Destroy every resource of the stack
    Destroy {
        /// Destroy without stopping at the plan
        #[arg(long)]
        auto_approve: bool,
    },
    /// Print the outputs of the last apply
    Outputs {
        /// Print secret outputs in clear text
        #[arg(long)]
        show_secrets: bool,
    },
}

fn load_config(path: Option<&Path>) -> anyhow::Result<StackConfig> {
    StackConfig::load(path).with_context(|| match path {
        Some(path) => format!("failed to load configuration from {}", path.display()),
        None => "failed to load configuration from the environment".to_string(),
    })
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let runner = TerraformRunner::new(&cli.terraform_bin);
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Validate => commands::inspect::validate(&load_config(config_path)?)?,
        Commands::Preview { show_secrets } => {
            commands::inspect::preview(&load_config(config_path)?, show_secrets).await?;
        }
        Commands::Graph => commands::inspect::graph(&load_config(config_path)?).await?,
        Commands::Synth => {
            commands::synth(&load_config(config_path)?, &cli.workdir).await?;
        }
        Commands::Plan => {
            commands::deploy::plan(&load_config(config_path)?, &runner, &cli.workdir).await?;
        }
        Commands::Apply { auto_approve } => {
            let config = load_config(config_path)?;
            commands::deploy::apply(&config, &runner, &cli.workdir, auto_approve).await?;
        }
        Commands::Destroy { auto_approve } => {
            let config = load_config(config_path)?;
            commands::deploy::destroy(&config, &runner, &cli.workdir, auto_approve).await?;
        }
        // Read back from Terraform state; no configuration needed.
        Commands::Outputs { show_secrets } => {
            commands::deploy::outputs(&runner, &cli.workdir, show_secrets).await?;
        }
    }

    Ok(())
}
