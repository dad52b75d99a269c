// codeatlas/src/cli.rs

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "codeatlas")]
#[command(version)]
#[command(about = "LLM-driven knowledge graph pipeline for source code repositories", long_about = None)]
pub struct Cli {
    /// Project directory (defaults to current directory)
    #[arg(long, global = true, default_value = ".")]
    pub project_dir: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the pipeline end to end: discover, analyze, validate, finalize
    Run {
        /// Run id to use (defaults to a generated id)
        #[arg(long)]
        run_id: Option<String>,

        /// Use the scripted stub LLM client instead of a real endpoint
        #[arg(long, default_value = "false")]
        offline: bool,
    },

    /// Mark files deleted on disk since the last run as pending_deletion
    Reconcile {
        #[arg(long)]
        run_id: String,
    },

    /// Delete pending_deletion files from the graph store and rel store
    Sweep {
        #[arg(long)]
        run_id: String,
    },

    /// Inspect dead-letter jobs from a prior run
    Dlq {
        #[command(subcommand)]
        command: DlqCommands,
    },
}

#[derive(Subcommand)]
pub enum DlqCommands {
    /// List dead-lettered jobs across every queue
    List {
        #[arg(long)]
        run_id: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_defaults() {
        let args = Cli::parse_from(["codeatlas", "run"]);
        match args.command {
            Commands::Run { run_id, offline } => {
                assert_eq!(run_id, None);
                assert!(!offline);
            }
            _ => panic!("expected Run command"),
        }
        assert_eq!(args.project_dir.to_string_lossy(), ".");
    }

    #[test]
    fn test_parse_run_offline_with_project_dir() {
        let args = Cli::parse_from(["codeatlas", "--project-dir", "/tmp/proj", "run", "--offline"]);
        assert_eq!(args.project_dir.to_string_lossy(), "/tmp/proj");
        match args.command {
            Commands::Run { offline, .. } => assert!(offline),
            _ => panic!("expected Run command"),
        }
    }

    #[test]
    fn test_parse_dlq_list() {
        let args = Cli::parse_from(["codeatlas", "dlq", "list", "--run-id", "run1"]);
        match args.command {
            Commands::Dlq { command: DlqCommands::List { run_id } } => {
                assert_eq!(run_id, "run1");
            }
            _ => panic!("expected Dlq List command"),
        }
    }
}
