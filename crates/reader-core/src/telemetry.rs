use std::time::Instant;

use once_cell::sync::Lazy;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Process start time, used to report uptime at readiness and in logs.
pub static APPLICATION_START_TIME: Lazy<Instant> = Lazy::new(Instant::now);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
	#[default]
	Text,
	Json,
}

/// Installs the global tracing subscriber. Filter defaults to `info` and is overridable
/// with `RUST_LOG`. Call once, at process startup, before spawning any other tasks.
pub fn setup_logging(format: LogFormat) {
	Lazy::force(&APPLICATION_START_TIME);

	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

	let registry = tracing_subscriber::registry().with(filter);
	match format {
		LogFormat::Json => {
			let fmt_layer = tracing_subscriber::fmt::layer().json().with_target(true).with_current_span(true);
			registry.with(fmt_layer).init();
		},
		LogFormat::Text => {
			let fmt_layer = tracing_subscriber::fmt::layer().with_target(true);
			registry.with(fmt_layer).init();
		},
	}
}
