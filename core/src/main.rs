use anyhow::Result;
use clap::Parser;
use notify_api::{Opcode, WatchFlags};
use tracing::info;
use tracing_subscriber::EnvFilter;

use sysnotify::{
    cli::{Cli, Command},
    server, Config, MAX_BATCH_TARGETS,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(&cli)?;
    // stdout carries the protocol
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.log_filter)?)
        .with_writer(std::io::stderr)
        .init();

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => {
            info!(
                port_capacity = config.port_capacity,
                max_listeners = config.max_listeners,
                "serving on stdio"
            );
            tokio::select! {
                res = server::run_stdio(&config) => res?,
                _ = tokio::signal::ctrl_c() => info!("interrupted"),
            }
        }
        Command::Describe => {
            println!("interest flags:");
            for flag in WatchFlags::ALL.names() {
                println!("  {flag}");
            }
            println!("  {:<20} {:#04x}", "all", WatchFlags::ALL.bits());
            println!("opcodes:");
            for op in Opcode::ALL {
                println!("  {:<20} {}", format!("{op:?}"), op.raw());
            }
            println!("max targets per message: {MAX_BATCH_TARGETS}");
        }
    }
    Ok(())
}
