//! Main entry point for the payroll service.
//!
//! Loads configuration, builds the payroll engine over the configured storage
//! backend, optionally preloads sample records and serves the HTTP API.

use clap::Parser;
use payroll_config::Config;
use std::path::PathBuf;
use std::sync::Arc;

mod apis;
mod factory_registry;
mod server;

/// Command-line arguments for the payroll service.
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

/// Main entry point for the payroll service.
///
/// This function:
/// 1. Parses command-line arguments
/// 2. Initializes logging infrastructure
/// 3. Loads configuration from file
/// 4. Builds and initializes the engine
/// 5. Serves the API until interrupted
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	// Initialize tracing with env filter
	use tracing_subscriber::{fmt, EnvFilter};

	// RUST_LOG wins over --log-level
	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	tracing::info!("Started payroll");

	let config_path = args
		.config
		.to_str()
		.ok_or("Configuration path is not valid UTF-8")?;
	let config = Config::from_file(config_path).await?;
	tracing::info!("Loaded configuration [{}]", config.service.id);

	let engine = Arc::new(factory_registry::build_engine_from_config(config.clone())?);
	engine.initialize().await?;

	match config.api {
		Some(api_config) if api_config.enabled => {
			server::start_server(api_config, Arc::clone(&engine)).await?;
		},
		_ => {
			tracing::warn!("API server disabled, nothing to serve");
		},
	}

	engine.shutdown().await?;
	tracing::info!("Stopped payroll");
	Ok(())
}
