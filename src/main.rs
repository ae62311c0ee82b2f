//! Opscan CLI - interactive network assessment daemon.
//!
//! This is the main binary entry point. See the `opscan` library for the
//! core functionality.

use anyhow::Result;
use clap::{Parser, Subcommand};
use mimalloc::MiMalloc;
use opscan::pipeline::{self, AssessmentConfig};
use opscan::{server, Config};

/// Global allocator configured per M-MIMALLOC-APPS guideline.
/// mimalloc provides better multi-threaded performance than the system allocator.
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

// CLI
#[derive(Parser)]
#[command(name = "opscan")]
#[command(version)]
#[command(about = "Interactive PTY-based network assessment daemon")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP daemon
    Serve {
        /// Bind address override
        #[arg(long)]
        bind: Option<String>,
        /// Port override
        #[arg(long)]
        port: Option<u16>,
    },
    /// Run the scripted assessment pipeline against one target
    Pipeline {
        /// Target URL (policy allows localhost only)
        #[arg(long)]
        target: String,
        /// Test type: network_scan, web_scan, or full_scan
        #[arg(long, default_value = "network_scan")]
        test_type: String,
    },
    /// Print the effective configuration
    Config,
}

fn run_serve(bind: Option<String>, port: Option<u16>) -> Result<()> {
    let mut config = Config::load()?;
    if let Some(bind) = bind {
        config.bind_addr = bind;
    }
    if let Some(port) = port {
        config.port = port;
    }

    log::info!("opscan v{} starting", env!("CARGO_PKG_VERSION"));
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(server::serve(config))
}

fn run_pipeline(target: String, test_type: String) -> Result<()> {
    let config = AssessmentConfig { target, test_type };
    let reports = pipeline::run_assessment(&config)?;

    println!("\n=== FINAL RESULTS ===");
    for report in &reports {
        println!("\n--- {} OUTPUT ---", report.tool.to_uppercase());
        println!("{}", report.stdout);
        if !report.stderr.is_empty() {
            eprintln!("{}", report.stderr);
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { bind, port } => run_serve(bind, port)?,
        Commands::Pipeline { target, test_type } => run_pipeline(target, test_type)?,
        Commands::Config => {
            let config = Config::load()?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
