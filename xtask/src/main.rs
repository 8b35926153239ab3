use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;

#[derive(Error, Debug)]
enum XtaskError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Environment variable not set: {0}")]
    VarError(#[from] std::env::VarError),
    #[error("Failed to run cargo {0}. Is the toolchain installed?")]
    CargoNotFound(&'static str),
    #[error("cargo {0} failed")]
    StepFailed(&'static str),
    #[error("Failed to get parent directory")]
    NoParentDir,
    #[error("{0} already exists; pass --force to overwrite")]
    WouldOverwrite(String),
}

type Result<T> = std::result::Result<T, XtaskError>;

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Development tasks for the crm-relay workspace")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run formatting, lint and test checks across the workspace
    Ci,
    /// Write an example environment file for crm-relay-server
    EnvExample {
        /// Output path, relative to the workspace root
        #[arg(long, default_value = ".env.example")]
        output: PathBuf,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Each CI step: a label and the cargo arguments that run it.
const CI_STEPS: &[(&str, &[&str])] = &[
    ("fmt", &["fmt", "--all", "--", "--check"]),
    (
        "clippy",
        &["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"],
    ),
    ("test", &["test", "--workspace"]),
];

const ENV_EXAMPLE: &str = "\
# Signing secret for OTP challenges and verification proofs (required)
EMAIL_OTP_SECRET=change-me
EMAIL_OTP_TTL_SECONDS=600
EMAIL_VERIFY_PROOF_TTL_SECONDS=1800

# Downstream workflow that receives submissions
FLOW_ENDPOINT_URL=https://flows.example.com/crm
FLOW_SHARED_KEY=

# Flow that emails the one-time code (falls back to FLOW_SHARED_KEY)
OTP_FLOW_ENDPOINT_URL=https://flows.example.com/otp
OTP_FLOW_SHARED_KEY=

REQUIRE_EMAIL_VERIFICATION=true
CRM_RELAY_ENV=development
CRM_RELAY_SOURCE=digitalaigarage-website
CRM_RELAY_HTTP_TIMEOUT_SECS=15
CRM_RELAY_ADDR=127.0.0.1:7071
RUST_LOG=info,crm_relay_server=debug
";

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Ci => ci(),
        Commands::EnvExample { output, force } => env_example(&output, force),
    }
}

fn ci() -> Result<()> {
    println!("🔧 Running workspace checks...");

    let project_root = project_root()?;

    for &(label, args) in CI_STEPS {
        println!("  Running: cargo {}", args.join(" "));

        let status = Command::new("cargo")
            .current_dir(&project_root)
            .args(args)
            .status()
            .map_err(|_| XtaskError::CargoNotFound(label))?;

        if !status.success() {
            return Err(XtaskError::StepFailed(label));
        }
        println!("  ✓ {label}");
    }

    println!();
    println!("✓ All checks passed");

    Ok(())
}

fn env_example(output: &Path, force: bool) -> Result<()> {
    let path = project_root()?.join(output);
    if path.exists() && !force {
        return Err(XtaskError::WouldOverwrite(path.display().to_string()));
    }

    std::fs::write(&path, ENV_EXAMPLE)?;

    println!("✓ Example environment written to: {}", path.display());
    println!();
    println!("Next steps:");
    println!("  1. Set EMAIL_OTP_SECRET to a long random value");
    println!("  2. Point the flow URLs at your automation endpoints");

    Ok(())
}

fn project_root() -> Result<PathBuf> {
    let manifest_dir = std::env::var("CARGO_MANIFEST_DIR")?;
    let xtask_dir = PathBuf::from(manifest_dir);
    let parent = xtask_dir.parent().ok_or(XtaskError::NoParentDir)?;
    Ok(parent.to_path_buf())
}
