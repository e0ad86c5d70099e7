//! Main entry point for the freight service.
//!
//! Runs the realtime engine that keeps role-scoped views fresh and, when
//! enabled, the HTTP API that serves tracking, timelines, transitions and
//! live refresh streams.

use clap::Parser;
use freight_config::Config;
use freight_core::{CoreBuilder, CoreFactories, FreightCore};
use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use tokio::sync::watch;

mod apis;
mod server;

/// Command-line arguments for the freight service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	use tracing_subscriber::{fmt, EnvFilter};

	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	tracing::info!("Started freight service");

	let config = Config::from_file(&args.config.to_string_lossy()).await?;
	tracing::info!(service = %config.service.id, "Loaded configuration");

	let core = build_core(config)?;
	let engine = core.engine().clone();
	engine.initialize().await?;

	let (shutdown_tx, shutdown_rx) = watch::channel(false);
	tokio::spawn(async move {
		match tokio::signal::ctrl_c().await {
			Ok(()) => tracing::info!("Shutdown requested"),
			Err(e) => tracing::error!(error = %e, "Failed to listen for shutdown signal"),
		}
		shutdown_tx.send(true).ok();
	});

	let engine_task = engine.run_until(wait_for(shutdown_rx.clone()));
	match core.config().api.clone().filter(|api| api.enabled) {
		Some(api_config) => {
			let api_task =
				server::start_server(api_config, core.clone(), wait_for(shutdown_rx.clone()));
			tokio::select! {
				result = engine_task => {
					tracing::info!("Realtime engine finished");
					result?;
				}
				result = api_task => {
					tracing::info!("API server finished");
					result?;
				}
			}
		},
		None => {
			tracing::info!("Starting realtime engine only");
			engine_task.await?;
		},
	}

	engine.shutdown().await?;
	tracing::info!("Stopped freight service");
	Ok(())
}

/// Resolves once the shutdown flag is raised or its sender is gone.
fn wait_for(mut rx: watch::Receiver<bool>) -> impl Future<Output = ()> + Send + 'static {
	async move {
		rx.wait_for(|stop| *stop).await.ok();
	}
}

/// Builds the core with every storage backend compiled into the binary.
fn build_core(config: Config) -> Result<FreightCore, Box<dyn std::error::Error>> {
	let storage_factories: HashMap<_, _> = freight_storage::get_all_implementations()
		.into_iter()
		.map(|(name, factory)| (name.to_string(), factory))
		.collect();

	Ok(CoreBuilder::new(config).build(CoreFactories { storage_factories })?)
}
