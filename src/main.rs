// Hostwarden - host liveness alerting and scheduled service recycling
// Main entry point

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use hostwarden::config::Config;
use hostwarden::scheduler::{build_prober, build_recycler, probe_locked, recycle_locked, run_daemon};
use hostwarden::version::build_info;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "hostwarden")]
#[command(author, about, long_about = None)]
#[command(disable_version_flag = true)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Append logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Show version information
    #[arg(short = 'V', long)]
    version: bool,

    /// Show detailed build information
    #[arg(long)]
    build_info: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Probe the target once and alert if it just went down
    Probe,
    /// Stop and restart the managed group once
    Recycle,
    /// Run probe and recycle cycles on internal timers
    Daemon,
    /// Validate configuration and print the effective settings
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.version {
        println!("{}", build_info().format_detailed());
        return Ok(());
    }

    if cli.build_info {
        println!("{}", build_info().format_display());
        println!("\n{}", build_info().format_build_info());
        return Ok(());
    }

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        std::process::exit(2);
    };

    init_logging(cli.debug, cli.log_file.as_ref())?;

    // Configuration errors are the only failures that reach the exit code
    let config = Config::load(cli.config)?;

    match command {
        Commands::Probe => {
            let prober = build_prober(&config)?;
            if let Some(report) = probe_locked(&prober, &config.lock_dir_path()).await? {
                tracing::info!(
                    "Probe of {} finished: {} (previously {})",
                    prober.target(),
                    report.result.outcome,
                    report.prior
                );
            }
        }
        Commands::Recycle => {
            let recycler = build_recycler(&config).await?;
            recycle_locked(&recycler, &config.lock_dir_path()).await?;
        }
        Commands::Daemon => {
            tracing::info!("{} starting in daemon mode", build_info().format_display());
            run_daemon(&config, async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!("Failed to listen for shutdown signal: {}", e);
                }
            })
            .await?;
        }
        Commands::CheckConfig => {
            config.validate_probe()?;
            if config.recycle.group.is_some() {
                config.validate_recycle()?;
            }
            let mut effective = config.clone();
            effective.state_file = Some(config.state_file_path());
            effective.lock_dir = Some(config.lock_dir_path());
            print!("{}", serde_yaml::to_string(&effective)?);
        }
    }

    Ok(())
}

fn init_logging(debug: bool, log_file: Option<&PathBuf>) -> Result<()> {
    let level = if debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
            let subscriber = tracing_subscriber::fmt()
                .with_max_level(level)
                .with_writer(std::sync::Mutex::new(file))
                .with_ansi(false) // Disable ANSI colors in log file
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        None => {
            let subscriber = tracing_subscriber::fmt()
                .with_max_level(level)
                .with_writer(std::io::stderr)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }

    Ok(())
}
