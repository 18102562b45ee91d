mod backend;
mod command;
mod config;
mod dispatch;
mod layout;
mod position;
mod registry;
mod status;
mod tmux;
mod transcript;

#[cfg(test)]
mod testutil;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};

use crate::backend::TerminalBackend;
use crate::command::CommandParser;
use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::registry::SessionRegistry;
use crate::status::{LogStatus, StatusSink};
use crate::tmux::TmuxBackend;

/// How long a stop request waits for the dispatcher before aborting it.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "voxmux", about = "Voice-to-terminal dispatch daemon for tmux")]
struct Cli {
    /// Config file path (default: voxmux.toml next to the binary)
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<CliCommand>,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Print the voice command reference
    Commands,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    if matches!(cli.command, Some(CliCommand::Commands)) {
        print_command_reference();
        return Ok(());
    }

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run(cli))
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load(cli.config.as_deref());

    let backend = Arc::new(TmuxBackend::new(&config.registry.target_filter));
    backend
        .probe()
        .await
        .context("no tmux server reachable; start tmux first")?;

    let registry = SessionRegistry::new(
        backend.clone() as Arc<dyn TerminalBackend>,
        config.backend.call_timeout(),
    );
    let parser = CommandParser::new(&config.commands);
    let status: Arc<dyn StatusSink> = Arc::new(LogStatus);
    let dispatcher = Dispatcher::new(parser, registry, status, &config);

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    ctrlc::set_handler(move || {
        let _ = shutdown_tx.send(true);
    })
    .context("failed to install Ctrl+C handler")?;

    let events = transcript::stdin_source();
    eprintln!("voxmux listening for transcripts on stdin (Ctrl+C to stop)");

    let mut stop_watch = shutdown_rx.clone();
    let mut task = tokio::spawn(dispatcher.run(events, shutdown_rx));

    tokio::select! {
        result = &mut task => result??,
        _ = stop_watch.wait_for(|stopped| *stopped) => {
            match tokio::time::timeout(SHUTDOWN_GRACE, &mut task).await {
                Ok(result) => result??,
                Err(_) => {
                    log::warn!("dispatcher did not stop within grace period, aborting");
                    task.abort();
                }
            }
        }
    }

    eprintln!("voxmux stopped");
    Ok(())
}

fn print_command_reference() {
    println!("Voice commands");
    println!("==============");
    println!();
    println!("Navigation (activates a pane):");
    println!("  \"activate the left window\"");
    println!("  \"go to the upper right pane\"");
    println!("  \"switch to the middle window\"");
    println!();
    println!("End of input (submits everything said so far):");
    println!("  \"end voice\"  \"end audio\"  \"submit\"  \"send it\"  \"done\"");
    println!();
    println!("Discard (clears the buffer and the pane's input line):");
    println!("  \"clear and restart\"  \"start over\"  \"never mind\"");
    println!();
    println!("Anything else accumulates and is sent on the next end phrase.");
}
