// codeatlas/src/main.rs

mod cli;
mod commands;

use clap::Parser;
use codeatlas_core::infrastructure::error::InfrastructureError;
use codeatlas_core::AtlasError;

use cli::{Cli, Commands, DlqCommands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let exit_code = match cli.command {
        Commands::Run { run_id, offline } => commands::run::execute(cli.project_dir, run_id, offline).await,
        Commands::Reconcile { run_id } => commands::reconcile::execute(cli.project_dir, run_id).await,
        Commands::Sweep { run_id } => commands::sweep::execute(cli.project_dir, run_id).await,
        Commands::Dlq { command: DlqCommands::List { run_id } } => {
            commands::dlq::list(cli.project_dir, run_id).await
        }
    };

    match exit_code {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("error: {e:#}");
            std::process::exit(exit_code_for(&e));
        }
    }
}

/// Maps a command failure to the CLI exit codes of spec.md §6. Tries the
/// concrete error types in order so a config error reported from inside
/// `build_context` (an `InfrastructureError`, not yet wrapped in an
/// `AtlasError`) still lands on 2 rather than the generic 3.
fn exit_code_for(err: &anyhow::Error) -> i32 {
    if let Some(atlas_err) = err.downcast_ref::<AtlasError>() {
        return atlas_err.exit_code();
    }
    if let Some(infra_err) = err.downcast_ref::<InfrastructureError>() {
        return match infra_err {
            InfrastructureError::Config(_) | InfrastructureError::ConfigNotFound(_) => 2,
            _ => 3,
        };
    }
    3
}
