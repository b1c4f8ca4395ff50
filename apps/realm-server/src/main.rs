mod config;
mod server;
mod snapshots;

use anyhow::Context;
use clap::Parser;
use config::ServerConfig;
use realm_net::NetServer;
use realm_tick::{RunningFlag, TickScheduler};
use realm_tools::WorldInspector;
use server::WorldServer;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "realm-server", about = "Authoritative world server")]
struct Cli {
    /// TCP port to listen on (overrides the config file)
    #[arg(short, long)]
    port: Option<u16>,

    /// Content and state directory
    #[arg(long, default_value = "./realm_data")]
    data_dir: PathBuf,

    /// Config file [default: <data-dir>/config/server.json]
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    std::fs::create_dir_all(&cli.data_dir)
        .with_context(|| format!("creating data directory {}", cli.data_dir.display()))?;
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| cli.data_dir.join("config").join("server.json"));
    let mut config = ServerConfig::load_or_create(&config_path)?;
    if let Some(port) = cli.port {
        config.port = port;
    }

    let mut server = WorldServer::load(config.clone(), &cli.data_dir)?;
    tracing::info!(
        summary = %WorldInspector::summary(server.registry()),
        object_types = server.object_types().len(),
        "content ready"
    );
    let net = NetServer::bind(SocketAddr::from(([0, 0, 0, 0], config.port)))
        .with_context(|| format!("starting network on port {}", config.port))?;

    let running = RunningFlag::new();
    watch_ctrl_c(running.clone())?;

    let scheduler = TickScheduler::new(config.tick_period(), running);
    let history = scheduler.history();
    let mut outbox = net.outbox();
    let status_interval = config.status_interval_ticks;

    scheduler.run(|| {
        let report = server.step(net.drain(), &mut outbox);
        if status_interval > 0 && report.tick % status_interval == 0 {
            server.log_status(&history.snapshot());
        }
    });

    let stats = scheduler.stats();
    tracing::info!(
        tick = server.tick(),
        ticks = stats.ticks,
        late = stats.late_ticks,
        interrupted = stats.interrupted_sleeps,
        "tick loop finished"
    );
    net.shutdown();
    server.shutdown()
}

/// Clear `running` on Ctrl-C from a small signal thread.
fn watch_ctrl_c(running: RunningFlag) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("building signal runtime")?;
    std::thread::Builder::new()
        .name("realm-signal".into())
        .spawn(move || {
            runtime.block_on(async {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => {
                        tracing::info!("ctrl-c received, stopping");
                        running.stop();
                    }
                    Err(err) => tracing::error!(error = %err, "cannot listen for ctrl-c"),
                }
            })
        })
        .context("spawning signal thread")?;
    Ok(())
}
