use std::fmt;

/// Static build identity, reported on `/healthz` and logged at startup.
#[derive(Debug, Clone)]
pub struct BuildInfo {
	pub name: &'static str,
	pub version: &'static str,
	pub rust_version: &'static str,
}

impl BuildInfo {
	pub const fn current() -> Self {
		BuildInfo {
			name: env!("CARGO_PKG_NAME"),
			version: env!("CARGO_PKG_VERSION"),
			rust_version: "1.85",
		}
	}
}

impl fmt::Display for BuildInfo {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} {}", self.name, self.version)
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn display_is_name_and_version() {
		let info = BuildInfo::current();
		assert!(info.to_string().contains(info.version));
	}
}
