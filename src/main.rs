use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use console::style;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use ferrydrop::clipboard::default_backend;
use ferrydrop::common::config::{apply_overrides, load_config, ConfigOverrides};
use ferrydrop::common::config_commands;
use ferrydrop::output::{finish_spinner_error, finish_spinner_success, spinner, TerminalEvents};
use ferrydrop::send::SessionPolicy;
use ferrydrop::server::{RunningServer, ServerHost};
use ferrydrop::transport::BindScope;

#[derive(Parser)]
#[command(name = "ferrydrop", version)]
#[command(about = "Share files, folders and clipboard text over the local network")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Share files or folders for download
    Send {
        #[arg(required = true, help = "Files or folders to share")]
        paths: Vec<PathBuf>,
        #[arg(long, help = "Downloads allowed before the share closes (0 = unlimited)")]
        limit: Option<u32>,
        #[arg(long, help = "Password required to download")]
        password: Option<String>,
        #[arg(long, value_parser = parse_ttl, help = "Share lifetime, e.g. 90, 30s, 10m, 2h, 1d")]
        ttl: Option<Duration>,
        #[arg(long)]
        port: Option<u16>,
        #[arg(long, help = "Only listen on 127.0.0.1")]
        local_only: bool,
    },
    /// Accept uploads from a browser into a directory
    Receive {
        #[arg(help = "Existing directory to save uploads into")]
        dir: PathBuf,
        #[arg(long)]
        port: Option<u16>,
        #[arg(long, help = "Only listen on 127.0.0.1")]
        local_only: bool,
    },
    /// Serve the shared clipboard only
    Clipboard {
        #[arg(long)]
        port: Option<u16>,
        #[arg(long, help = "Only listen on 127.0.0.1")]
        local_only: bool,
    },
    /// Inspect or reset the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Print the config file location
    Path,
    /// Print the effective configuration
    Show,
    /// Overwrite the config file with defaults
    Reset {
        #[arg(long, help = "Do not ask for confirmation")]
        yes: bool,
    },
}

/// Seconds by default, or a number with an `s`, `m`, `h`, or `d` suffix.
fn parse_ttl(raw: &str) -> Result<Duration, String> {
    let raw = raw.trim();
    let (digits, unit) = match raw.char_indices().last() {
        Some((idx, c)) if c.is_ascii_alphabetic() => (&raw[..idx], c.to_ascii_lowercase()),
        _ => (raw, 's'),
    };
    let value: u64 = digits
        .parse()
        .map_err(|_| format!("invalid duration '{raw}'"))?;
    let secs = match unit {
        's' => value,
        'm' => value.saturating_mul(60),
        'h' => value.saturating_mul(3600),
        'd' => value.saturating_mul(86_400),
        other => return Err(format!("unknown duration unit '{other}'")),
    };
    Ok(Duration::from_secs(secs))
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ferrydrop=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn scope(local_only: bool) -> BindScope {
    if local_only {
        BindScope::Loopback
    } else {
        BindScope::AllInterfaces
    }
}

fn host(port: Option<u16>, limit: Option<u32>, local_only: bool) -> Result<ServerHost> {
    let config = apply_overrides(load_config()?, &ConfigOverrides { port, limit });
    config.validate()?;
    Ok(
        ServerHost::new(config, Arc::new(TerminalEvents::new()), default_backend())
            .with_scope(scope(local_only)),
    )
}

/// Print the URL, then block until the server stops on its own or Ctrl+C.
async fn run_until_stopped(running: RunningServer) -> Result<()> {
    println!("\n  {}\n", style(&running.url).cyan().bold().underlined());
    println!("Press Ctrl+C to stop.");

    tokio::select! {
        termination = running.wait() => {
            tracing::debug!(reason = %termination.reason, "server finished");
        }
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for Ctrl+C")?;
            tracing::info!("Ctrl+C received - initiating graceful shutdown");
            running.stop().await;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Config { command } => match command {
            ConfigCommand::Path => config_commands::run_config_path(),
            ConfigCommand::Show => config_commands::run_config_show(),
            ConfigCommand::Reset { yes } => {
                if config_commands::run_config_reset(yes)? {
                    println!("Configuration reset to defaults.");
                }
                Ok(())
            }
        },
        Commands::Send {
            paths,
            limit,
            password,
            ttl,
            port,
            local_only,
        } => {
            let host = host(port, limit, local_only)?;
            let mut policy = SessionPolicy::new(host.config().send.limit);
            if let Some(password) = password {
                policy = policy.with_password(password);
            }
            if let Some(ttl) = ttl {
                policy = policy.with_ttl(ttl);
            }

            let preparing = spinner("Preparing share...");
            let running = match host.start_send(paths, policy).await {
                Ok(running) => {
                    let name = running
                        .session
                        .as_ref()
                        .map_or_else(String::new, |info| info.filename.clone());
                    finish_spinner_success(&preparing, &format!("Sharing {name}"));
                    running
                }
                Err(err) => {
                    finish_spinner_error(&preparing, "Could not start share");
                    return Err(err);
                }
            };
            run_until_stopped(running).await
        }
        Commands::Receive {
            dir,
            port,
            local_only,
        } => {
            let host = host(port, None, local_only)?;
            let running = host.start_receive(dir.clone()).await?;
            println!("Saving uploads to {}", dir.display());
            run_until_stopped(running).await
        }
        Commands::Clipboard { port, local_only } => {
            let host = host(port, None, local_only)?;
            let running = host.start_clipboard().await?;
            run_until_stopped(running).await
        }
    }
}
