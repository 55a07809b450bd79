//! Command line interface definition

use clap::{Args, Parser, Subcommand};
use kiln_options::OptionOverride;
use kiln_types::ColorChoice;
use std::path::PathBuf;

/// kiln - recipe-driven dependency resolution and build orchestration
#[derive(Parser)]
#[command(name = "kiln")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Resolve, configure and build native libraries from recipes")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalArgs,
}

/// Global arguments available for all commands
#[derive(Parser)]
pub struct GlobalArgs {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Write debug logs to the kiln log directory
    #[arg(long, global = true)]
    pub debug: bool,

    /// Color output control
    #[arg(long, global = true, value_enum)]
    pub color: Option<ColorChoice>,

    /// Use alternate config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

/// Arguments shared by every command that resolves a recipe
#[derive(Args, Clone)]
pub struct SessionArgs {
    /// Root recipe file (.yml)
    pub recipe: PathBuf,

    /// Option override, e.g. `boost/*:shared=False` or `&:with_tests=True`
    #[arg(short = 'o', long = "option", value_name = "PATTERN:OPTION=VALUE")]
    pub options: Vec<OptionOverride>,

    /// Session setting, e.g. `build_type=Debug`
    #[arg(short = 's', long = "setting", value_name = "KEY=VALUE")]
    pub settings: Vec<String>,

    /// Directory of recipes used to satisfy requirements
    #[arg(long, value_name = "DIR")]
    pub registry: Option<PathBuf>,

    /// Also resolve the root's test requirements
    #[arg(long)]
    pub with_tests: bool,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Resolve a recipe and build every package it needs
    Build {
        #[command(flatten)]
        session: SessionArgs,

        /// Number of packages built concurrently (0 = one per core)
        #[arg(short, long)]
        jobs: Option<usize>,
    },

    /// Show the resolved dependency graph with options and identities
    Graph {
        #[command(flatten)]
        session: SessionArgs,
    },

    /// Show the package identity of every node
    Identity {
        #[command(flatten)]
        session: SessionArgs,
    },
}

impl Commands {
    pub fn session(&self) -> &SessionArgs {
        match self {
            Self::Build { session, .. } | Self::Graph { session } | Self::Identity { session } => {
                session
            }
        }
    }

    /// Operation name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::Build { .. } => "build",
            Self::Graph { .. } => "graph",
            Self::Identity { .. } => "identity",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_build() {
        let cli = Cli::try_parse_from([
            "kiln",
            "build",
            "recipe.yml",
            "-o",
            "boost/*:shared=False",
            "-o",
            "&:with_tests=True",
            "-s",
            "build_type=Debug",
            "--jobs",
            "4",
            "--json",
        ])
        .unwrap();

        assert!(cli.global.json);
        let Commands::Build { session, jobs } = &cli.command else {
            panic!("expected build");
        };
        assert_eq!(*jobs, Some(4));
        assert_eq!(session.options.len(), 2);
        assert_eq!(session.options[0].to_string(), "boost/*:shared=False");
        assert_eq!(session.settings, vec!["build_type=Debug"]);
        assert!(!session.with_tests);
    }

    #[test]
    fn test_rejects_malformed_override() {
        assert!(Cli::try_parse_from(["kiln", "graph", "recipe.yml", "-o", "shared"]).is_err());
    }
}
