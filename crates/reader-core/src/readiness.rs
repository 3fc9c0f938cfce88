use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tracing::info;

use crate::telemetry::APPLICATION_START_TIME;

/// Tracks the set of components that must finish starting up before the process reports ready.
#[derive(Clone, Default)]
pub struct Ready(Arc<Mutex<HashSet<String>>>);

impl Ready {
	pub fn new() -> Self {
		Ready(Arc::new(Mutex::new(HashSet::new())))
	}

	/// Registers a task that must call `BlockReady::drop` (or be dropped) before readiness
	/// is reported. Returns a guard; dropping it marks the task ready.
	pub fn register_task(&self, name: impl Into<String>) -> BlockReady {
		let name = name.into();
		self.0.lock().expect("readiness lock poisoned").insert(name.clone());
		BlockReady { ready: self.clone(), name: Some(name) }
	}

	/// Returns the set of task names still pending.
	pub fn pending(&self) -> HashSet<String> {
		self.0.lock().expect("readiness lock poisoned").clone()
	}

	pub fn is_ready(&self) -> bool {
		self.pending().is_empty()
	}
}

#[must_use = "dropping this immediately marks the task ready; hold it until startup finishes"]
pub struct BlockReady {
	ready: Ready,
	name: Option<String>,
}

impl Drop for BlockReady {
	fn drop(&mut self) {
		if let Some(name) = self.name.take() {
			let remaining = {
				let mut pending = self.ready.0.lock().expect("readiness lock poisoned");
				pending.remove(&name);
				pending.len()
			};
			if remaining == 0 {
				info!(
					elapsed = ?APPLICATION_START_TIME.elapsed(),
					"all components ready"
				);
			} else {
				info!(component = name, remaining, "component ready");
			}
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn ready_tracks_outstanding_tasks() {
		let ready = Ready::new();
		let a = ready.register_task("a");
		let b = ready.register_task("b");
		assert!(!ready.is_ready());

		drop(a);
		assert!(!ready.is_ready());

		drop(b);
		assert!(ready.is_ready());
	}
}
