use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use reader_core::{drain, signal, telemetry, version};
use reader_server::storage::MemoryStorage;
use tracing::info;

#[derive(Parser, Debug)]
#[command(about, long_about = None)]
#[command(disable_version_flag = true)]
struct Args {
	/// Use config from bytes (YAML)
	#[arg(short, long, value_name = "config")]
	config: Option<String>,

	/// Use config from file (YAML)
	#[arg(short, long, value_name = "file")]
	file: Option<PathBuf>,

	/// Print version (as a simple version string)
	#[arg(short = 'V', value_name = "version")]
	version_short: bool,

	/// Print version (as JSON-like debug output)
	#[arg(long = "version")]
	version_long: bool,
}

fn main() -> anyhow::Result<()> {
	telemetry::setup_logging(telemetry::LogFormat::Text);

	let args = Args::parse();
	let Args { config, file, version_short, version_long } = args;

	if version_short {
		println!("{}", version::BuildInfo::current().version);
		return Ok(());
	}
	if version_long {
		println!("{:?}", version::BuildInfo::current());
		return Ok(());
	}

	tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async move {
		let contents = match (config, file) {
			(Some(_), Some(_)) => anyhow::bail!("only one of --config or --file"),
			(Some(config), None) => config,
			(None, Some(file)) => std::fs::read_to_string(&file)?,
			(None, None) => String::new(),
		};
		serve(contents).await
	})
}

async fn serve(contents: String) -> anyhow::Result<()> {
	info!(version = %version::BuildInfo::current(), "starting reader backend");

	let config = reader_server::config::parse_config(if contents.trim().is_empty() { None } else { Some(contents.as_str()) })?;
	let bind_addr = config.bind_addr.clone();
	info!(config = ?config, "running with config");

	let storage: Arc<dyn reader_protocol::Storage> = Arc::new(MemoryStorage::new());
	let app_state = reader_server::build_app(config, storage).await?;

	let mut shutdown = signal::Shutdown::new();
	let (drain_tx, drain_rx) = drain::new();

	let server = tokio::spawn(async move { reader_server::serve(app_state, &bind_addr, drain_rx).await });

	shutdown.wait().await;
	info!("shutting down, draining in-flight requests");
	drain_tx.start_drain_and_wait(drain::DrainMode::Graceful).await;

	server.await??;
	Ok(())
}
