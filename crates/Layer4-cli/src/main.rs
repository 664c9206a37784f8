//! Warden CLI - Main entry point

mod cli;

use clap::{Parser, Subcommand};
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use warden_foundation::WardenConfig;

/// Warden - risk-gated command execution for agents and scripts
#[derive(Parser, Debug)]
#[command(name = "warden")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Do not read or write the registry snapshot (.warden/registry.json)
    #[arg(long, global = true)]
    no_snapshot: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Classify a command without running it
    Classify {
        /// Command line to classify
        command: String,
    },
    /// Run a command through the execution gate
    Exec {
        /// Command line to run
        command: String,

        /// Confirm without prompting when confirmation is required
        #[arg(short, long)]
        yes: bool,

        /// Timeout in seconds (overrides config)
        #[arg(short, long)]
        timeout: Option<u64>,

        /// Working directory
        #[arg(short = 'C', long)]
        dir: Option<String>,
    },
    /// List registered services
    Services {
        /// Only services providing this capability
        #[arg(short, long)]
        capability: Option<String>,
    },
    /// Invoke a service by name
    Invoke {
        /// Service name
        name: String,

        /// JSON arguments
        #[arg(short, long, default_value = "{}")]
        args: String,
    },
    /// Register a descriptor-only service in the snapshot
    Register {
        /// Service name
        name: String,

        #[arg(short, long, default_value = "")]
        description: String,

        /// Capability tag (repeatable)
        #[arg(short, long = "capability")]
        capabilities: Vec<String>,

        /// Metadata entry as key=value (repeatable)
        #[arg(short, long = "meta")]
        metadata: Vec<String>,
    },
    /// Remove a service from the snapshot
    Deregister {
        /// Service name
        name: String,
    },
    /// Write the registry snapshot
    Snapshot,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let config = WardenConfig::load().unwrap_or_else(|e| {
        eprintln!("Warning: Failed to load config: {}", e);
        WardenConfig::default()
    });

    let session = cli::Session {
        config,
        use_snapshot: !args.no_snapshot,
        json: args.json,
    };

    match run(args.command, &session).await {
        Ok(code) => Ok(ExitCode::from(code)),
        Err(e) => match cli::report_error(&e) {
            Some(code) => Ok(ExitCode::from(code)),
            None => Err(e),
        },
    }
}

async fn run(command: Command, session: &cli::Session) -> anyhow::Result<u8> {
    let code = match command {
        Command::Classify { command } => cli::classify(session, &command).await?,
        Command::Exec {
            command,
            yes,
            timeout,
            dir,
        } => cli::exec(session, &command, yes, timeout, dir).await?,
        Command::Services { capability } => cli::services(session, capability.as_deref())?,
        Command::Invoke { name, args } => cli::invoke(session, &name, &args).await?,
        Command::Register {
            name,
            description,
            capabilities,
            metadata,
        } => cli::register(session, &name, &description, capabilities, &metadata)?,
        Command::Deregister { name } => cli::deregister(session, &name)?,
        Command::Snapshot => cli::snapshot(session)?,
    };
    Ok(code)
}
