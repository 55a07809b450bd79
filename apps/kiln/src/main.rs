//! kiln - recipe-driven dependency resolution and build orchestration
//!
//! The CLI parses arguments, merges configuration and hands the request to
//! the ops crate while rendering the event stream.

mod cli;
mod display;
mod error;
mod events;
mod logging;

use crate::cli::{Cli, Commands, SessionArgs};
use crate::display::OutputRenderer;
use crate::error::CliError;
use crate::events::EventHandler;
use clap::Parser;
use kiln_config::Config;
use kiln_events::EventReceiver;
use kiln_ops::{OperationResult, OpsContextBuilder, OpsCtx, SessionRequest};
use kiln_types::ColorChoice;
use std::path::PathBuf;
use std::process;
use tokio::select;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    // Parse command line arguments first to check for JSON mode
    let cli = Cli::parse();
    let json_mode = cli.global.json;

    init_tracing(json_mode, cli.global.debug);

    if let Err(e) = run(cli).await {
        error!("Application error: {}", e);
        if json_mode {
            println!("{}", e.to_json());
        } else {
            eprintln!("Error: {e}");
        }
        process::exit(1);
    }
}

/// Main application logic
async fn run(cli: Cli) -> Result<(), CliError> {
    info!("Starting kiln v{}", env!("CARGO_PKG_VERSION"));

    // Precedence: file (or defaults), then environment, then CLI flags
    let mut config = Config::load_or_default(cli.global.config.as_deref()).await?;
    config.merge_env()?;
    if let Some(color) = cli.global.color {
        config.general.color = color;
    }

    let (event_sender, event_receiver) = kiln_events::channel();
    let ops_ctx = OpsContextBuilder::new()
        .with_config(config.clone())
        .with_event_sender(event_sender)
        .build()?;

    let cancel = ops_ctx.cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling build session");
            cancel.cancel();
        }
    });

    let colors_enabled = match config.general.color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => console::Term::stderr().features().colors_supported(),
    };
    let log_events = cli.global.debug || std::env::var("RUST_LOG").is_ok();
    let event_handler = EventHandler::new(colors_enabled, cli.global.json, log_events);
    let renderer = OutputRenderer::new(cli.global.json);

    info!(command = cli.command.name(), recipe = %cli.command.session().recipe.display(), "Executing command");
    let result =
        execute_command_with_events(cli.command, ops_ctx, event_receiver, &event_handler).await?;

    renderer.render_result(&result)?;

    info!("Command completed successfully");
    Ok(())
}

/// Execute command with concurrent event handling
async fn execute_command_with_events(
    command: Commands,
    ops_ctx: OpsCtx,
    mut event_receiver: EventReceiver,
    event_handler: &EventHandler,
) -> Result<OperationResult, CliError> {
    let mut command_future = Box::pin(execute_command(command, ops_ctx));

    loop {
        select! {
            result = &mut command_future => {
                while let Ok(message) = event_receiver.try_recv() {
                    event_handler.handle_event(&message);
                }
                return result;
            }

            message = event_receiver.recv() => {
                if let Some(message) = message {
                    event_handler.handle_event(&message);
                }
            }
        }
    }
}

/// Execute the specified command
async fn execute_command(command: Commands, ctx: OpsCtx) -> Result<OperationResult, CliError> {
    match command {
        Commands::Build { session, jobs } => {
            let request = SessionRequest {
                jobs,
                ..session_request(session)
            };
            let report = kiln_ops::build(&ctx, &request).await?;
            Ok(OperationResult::Build(report))
        }
        Commands::Graph { session } => {
            let report = kiln_ops::graph(&ctx, &session_request(session)).await?;
            Ok(OperationResult::Graph(report))
        }
        Commands::Identity { session } => {
            let report = kiln_ops::identity(&ctx, &session_request(session)).await?;
            Ok(OperationResult::Identity(report))
        }
    }
}

fn session_request(args: SessionArgs) -> SessionRequest {
    SessionRequest {
        recipe: args.recipe,
        overrides: args.options,
        settings: args.settings,
        registry: args.registry,
        jobs: None,
        include_tests: args.with_tests,
    }
}

/// Directory for `--debug` log files
fn logs_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("kiln")
        .join("logs")
}

/// Initialize tracing/logging
///
/// `--debug` (or `RUST_LOG`) writes JSON records to a log file; otherwise
/// only warnings reach stderr, and JSON mode keeps stdout clean.
fn init_tracing(json_mode: bool, debug_enabled_flag: bool) {
    let debug_enabled = std::env::var("RUST_LOG").is_ok() || debug_enabled_flag;
    let default_filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,kiln=debug"))
    };

    if debug_enabled {
        let log_dir = logs_dir();
        let log_file = log_dir.join(format!(
            "kiln-{}.log",
            chrono::Utc::now().format("%Y%m%d-%H%M%S")
        ));

        let file = std::fs::create_dir_all(&log_dir)
            .and_then(|()| std::fs::File::create(&log_file));
        match file {
            Ok(file) => {
                tracing_subscriber::fmt()
                    .json()
                    .with_writer(std::sync::Mutex::new(file))
                    .with_env_filter(default_filter())
                    .init();
                if !json_mode {
                    eprintln!("Debug logging enabled: {}", log_file.display());
                }
                return;
            }
            Err(e) => {
                if !json_mode {
                    eprintln!("Warning: Failed to create log file: {e}");
                }
            }
        }
    }

    if json_mode {
        tracing_subscriber::fmt()
            .json()
            .with_writer(std::io::stderr)
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("error")),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .init();
    }
}
