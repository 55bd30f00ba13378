//! dbkit CLI - connection checks for dbkit-managed databases
//!
//! - `dsn`: print the redacted connection descriptor
//! - `ping`: connect with retry and report round-trip latency
//! - `stats`: connect and print a pool statistics snapshot

use std::time::{Duration, Instant};

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use dbkit_core::{Context, Descriptor, Manager, PoolStats};
use tracing::debug;

mod args;
mod tracing_setup;

use args::ConnArgs;

#[derive(Parser, Debug)]
#[command(
    name = "dbkit",
    author,
    version,
    about = "Check pooled database connections (PostgreSQL, MySQL, SQLite)"
)]
struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(flatten)]
    conn: ConnArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the connection descriptor with the password masked
    Dsn,
    /// Connect, ping, and report latency
    Ping {
        /// Ping timeout in seconds
        #[arg(long, default_value_t = 5)]
        timeout: u64,
    },
    /// Connect and print pool statistics
    Stats {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // dotenvy doesn't overwrite existing vars
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    tracing_setup::init(&tracing_setup::TracingConfig { debug: cli.debug }).ok();

    let config = cli.conn.to_config()?;
    debug!(?config, "Resolved configuration");

    match cli.command {
        Commands::Dsn => {
            let descriptor = Descriptor::build(&config.with_defaults()?)?;
            println!("{descriptor}");
        }
        Commands::Ping { timeout } => {
            let manager = Manager::new(config).await.context("Failed to connect")?;
            let started = Instant::now();
            manager
                .ping(&Context::with_timeout(Duration::from_secs(timeout)))
                .await
                .context("Ping failed")?;
            println!(
                "ok: {} responded in {:.1?}",
                manager.descriptor(),
                started.elapsed()
            );
            manager.close().await;
        }
        Commands::Stats { json } => {
            let manager = Manager::new(config).await.context("Failed to connect")?;
            let stats = manager.stats();
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print_stats(&stats);
            }
            manager.close().await;
        }
    }

    Ok(())
}

fn print_stats(stats: &PoolStats) {
    println!("max open connections: {}", stats.max_open_connections);
    println!("open connections:     {}", stats.open_connections);
    println!("in use:               {}", stats.in_use);
    println!("idle:                 {}", stats.idle);
    println!("wait count:           {}", stats.wait_count);
    println!("wait duration:        {:?}", stats.wait_duration);
    println!("max idle closed:      {}", stats.max_idle_closed);
    println!("max lifetime closed:  {}", stats.max_lifetime_closed);
}
