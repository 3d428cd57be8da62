use std::io;
use std::time::Duration;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod config;
mod format;
mod style;
mod util;

use cli::{Cli, Commands};
use commands::{Payload, SendOptions, cmd_config, cmd_monitor, cmd_rssi, cmd_scan, cmd_send};
use config::Config;
use format::FormatOptions;
use util::{require_device, write_mode};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Handle completions command early (before tracing init)
    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(shell, &mut cmd, "robotooth", &mut io::stdout());
        return Ok(());
    }

    let filter = if cli.quiet {
        EnvFilter::new("error")
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let config = Config::load();
    let opts = FormatOptions::new(cli.no_color || config.no_color, cli.compact);
    let quiet = cli.quiet;

    match cli.command {
        Commands::Scan { timeout, format } => {
            let timeout = config.resolve_scan_timeout(timeout);
            cmd_scan(timeout, format, quiet, &opts, &config).await?;
        }
        Commands::Send {
            device,
            payload,
            listen,
            display,
        } => {
            let payload = Payload::from_args(&payload)?;
            let target = require_device(device.device, &config)?;
            let send_opts = SendOptions {
                write_mode: write_mode(device.with_response, &config),
                timeout: Duration::from_secs(device.timeout),
                listen: listen.map(Duration::from_secs),
                display,
                quiet,
                no_color: opts.no_color,
            };
            cmd_send(&target, &payload, send_opts).await?;
        }
        Commands::Monitor { device, display } => {
            let target = require_device(device.device, &config)?;
            cmd_monitor(
                &target,
                write_mode(device.with_response, &config),
                Duration::from_secs(device.timeout),
                display,
                quiet,
                opts.no_color,
            )
            .await?;
        }
        Commands::Rssi { device, format } => {
            let target = require_device(device.device, &config)?;
            cmd_rssi(
                &target,
                write_mode(device.with_response, &config),
                Duration::from_secs(device.timeout),
                format,
                quiet,
                &opts,
            )
            .await?;
        }
        Commands::Config { action } => cmd_config(action, quiet)?,
        // Handled before tracing init
        Commands::Completions { .. } => {}
    }

    Ok(())
}
