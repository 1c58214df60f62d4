//! Resolve hosts from the command line with the configured strategy
//!
//! ```bash
//! HOSTREDIRECT_SERVERS="lobby=10.0.0.1:25565" hostredirect play.example.com
//! ```

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use hostredirect::{
    Config, ConnectionRouter, InitialServerSelection, RouteOutcome, ServerHandle, ServerRegistry,
    StaticRegistry,
};
use tokio_util::sync::CancellationToken;

/// Synthetic connection for one host given on the command line
struct ProbeConnection {
    host: String,
}

impl InitialServerSelection for ProbeConnection {
    fn virtual_host(&self) -> String {
        self.host.clone()
    }

    fn username(&self) -> &str {
        "probe"
    }

    fn set_initial_server(&mut self, _server: ServerHandle) {}

    fn disconnect(&mut self, _reason: &str) {}
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();
    init_tracing();

    let hosts: Vec<String> = std::env::args().skip(1).collect();
    if hosts.is_empty() {
        anyhow::bail!("usage: hostredirect <host>...");
    }

    let config = Config::from_env().context("loading configuration")?;
    tracing::info!(mode = ?config.mode, servers = config.servers.len(), "HostRedirect initialized");

    let registry: Arc<dyn ServerRegistry> =
        Arc::new(config.servers.iter().cloned().collect::<StaticRegistry>());
    let router = ConnectionRouter::from_config(&config, registry)
        .context("building connection router")?;

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        }
    });

    let mut refused = 0usize;
    for host in hosts {
        let mut conn = ProbeConnection { host: host.clone() };
        match router.route(&mut conn, &cancel).await {
            RouteOutcome::Assigned { server } => println!("{} -> {}", host, server),
            RouteOutcome::Refused(e) => {
                println!("{} refused [{}]: {}", host, e.reason(), e);
                refused += 1;
            }
        }
    }

    Ok(if refused == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,hostredirect=debug".into()),
        )
        .with_writer(std::io::stderr)
        .try_init();
}
