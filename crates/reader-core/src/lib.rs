pub mod drain;
pub mod readiness;
pub mod signal;
pub mod telemetry;
pub mod version;

pub mod prelude {
	pub use std::fmt::{Debug, Display};
	pub use std::sync::Arc;
	pub use std::time::{Duration, Instant};

	pub use anyhow::Context as _;
	pub use tracing::{Instrument, debug, error, info, trace, warn};
}
