use std::{
    num::{NonZeroU16, NonZeroU32},
    path::PathBuf,
};

use clap::Parser;
use http::Uri;
use spigot::{
    config::{self, Config},
    dispatcher::{self, Dispatcher},
};
use spigot_payload::TemplateStore;
use tokio::{runtime::Builder, signal};
use tracing::info;
use tracing_subscriber::{EnvFilter, util::SubscriberInitExt};

#[derive(thiserror::Error, Debug)]
enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("Configuration error: {0}")]
    Config(#[from] config::Error),
    #[error("Invalid template set: {0}")]
    Templates(#[from] spigot_payload::Error),
    #[error("Dispatcher returned an error: {0}")]
    Dispatcher(#[from] dispatcher::Error),
    #[error("Could not join the dispatch task: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Parser, Debug)]
#[command(version, about = "Fires templated JSON POST requests at a fixed rate")]
struct Args {
    /// Path to the spigot config file
    #[arg(long, default_value = "spigot.yaml")]
    config_path: PathBuf,
    /// Validate the configuration and exit without sending traffic
    #[arg(long)]
    check: bool,
    /// Override the configured target URI
    #[arg(long)]
    target_uri: Option<Uri>,
    /// Override the configured global request rate
    #[arg(long)]
    requests_per_second: Option<NonZeroU32>,
    /// Override the configured connection count
    #[arg(long)]
    parallel_connections: Option<NonZeroU16>,
}

impl Args {
    fn overlay(&self, config: &mut Config) {
        if let Some(uri) = &self.target_uri {
            config.target_uri = uri.clone();
        }
        if let Some(rate) = self.requests_per_second {
            config.requests_per_second = rate;
        }
        if let Some(connections) = self.parallel_connections {
            config.parallel_connections = connections;
        }
    }
}

/// Validate everything that would otherwise only surface once the dispatch
/// loop is entered.
fn validate(config: &Config) -> Result<(), Error> {
    let templates = TemplateStore::new(config.template_weights()?)?;
    info!(templates = templates.len(), "template set ok");
    config.id_pools()?;
    Ok(())
}

async fn inner_main(config: Config) -> Result<(), Error> {
    let (shutdown_watcher, shutdown_broadcaster) = spigot_signal::signal();
    let dispatcher = Dispatcher::new(&config, shutdown_watcher)?;
    let mut handle = tokio::spawn(dispatcher.spin());

    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("received ctrl-c, draining in-flight requests");
            shutdown_broadcaster.signal();
            handle.await??;
        }
        res = &mut handle => {
            res??;
        }
    }
    Ok(())
}

fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_ansi(false)
        .finish()
        .init();

    let version = env!("CARGO_PKG_VERSION");
    info!("Starting spigot {version} run.");

    let args = Args::parse();
    let mut config = Config::from_path(&args.config_path)?;
    args.overlay(&mut config);
    validate(&config)?;
    if args.check {
        info!("configuration ok");
        return Ok(());
    }

    let runtime = Builder::new_multi_thread().enable_io().enable_time().build()?;
    runtime.block_on(inner_main(config))
}
