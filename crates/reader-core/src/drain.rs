use std::time::Duration;

pub use internal::{
	DrainMode, ReleaseShutdown as DrainBlocker, Signal as DrainTrigger, Watch as DrainWatcher,
};
use tracing::{debug, info, warn};

/// Constructs a new drain pair.
/// * `DrainTrigger` starts a draining sequence and waits for it to complete.
/// * `DrainWatcher` is held by anything that wants to participate in the drain. It may be
///   cloned, and a drain will not complete until every outstanding watcher is dropped.
pub fn new() -> (DrainTrigger, DrainWatcher) {
	internal::channel()
}

/// Runs `make_future` with graceful-shutdown support. `make_future` receives a `DrainWatcher` —
/// while held, the task is considered active and blocks the server from fully shutting down;
/// it can be awaited (`watcher.wait_for_drain()`) to learn when to start winding down.
pub async fn run_with_drain<F, O>(component: String, drain: DrainWatcher, deadline: Duration, make_future: F)
where
	F: AsyncFnOnce(DrainWatcher) -> O,
	O: Send + 'static,
{
	let (sub_drain_signal, sub_drain) = new();
	let fut = make_future(sub_drain);
	let watch = async move {
		let _blocker = drain.wait_for_drain().await;
		info!(component, "drain started, waiting {:?} for work to finish", deadline);
		if tokio::time::timeout(deadline, sub_drain_signal.start_drain_and_wait(DrainMode::Graceful))
			.await
			.is_err()
		{
			warn!(component, "drain deadline expired with pending work, forcing shutdown");
		}
		debug!(component, "drain complete");
	};
	tokio::select! {
		_ = fut => {},
		_ = watch => {},
	}
}

mod internal {
	use tokio::sync::{mpsc, watch};

	enum Never {}

	#[derive(Debug, Clone, Copy, PartialEq, Eq)]
	pub enum DrainMode {
		Immediate,
		Graceful,
	}

	/// Sends a drain command to all watchers and waits for them to release.
	pub struct Signal {
		drained_rx: mpsc::Receiver<Never>,
		signal_tx: watch::Sender<Option<DrainMode>>,
	}

	/// Watches for a drain command. All `Watch` instances must be dropped for the
	/// corresponding `Signal::start_drain_and_wait` call to complete.
	#[derive(Clone)]
	pub struct Watch {
		drained_tx: mpsc::Sender<Never>,
		signal_rx: watch::Receiver<Option<DrainMode>>,
	}

	pub fn channel() -> (Signal, Watch) {
		let (signal_tx, signal_rx) = watch::channel(None);
		let (drained_tx, drained_rx) = mpsc::channel(1);
		(
			Signal { drained_rx, signal_tx },
			Watch { drained_tx, signal_rx },
		)
	}

	#[must_use = "ReleaseShutdown should be dropped explicitly to release the drain"]
	pub struct ReleaseShutdown(#[allow(dead_code)] mpsc::Sender<Never>, DrainMode);

	impl ReleaseShutdown {
		pub fn mode(&self) -> DrainMode {
			self.1
		}
	}

	impl Signal {
		/// Signals all watchers to begin draining and waits for every handle to be released.
		pub async fn start_drain_and_wait(mut self, mode: DrainMode) {
			let _ = self.signal_tx.send(Some(mode));
			match self.drained_rx.recv().await {
				None => {},
				Some(n) => match n {},
			}
		}

		pub fn count(&self) -> usize {
			self.signal_tx.receiver_count()
		}
	}

	impl Watch {
		/// Completes once a drain has been signaled, returning a handle that must be held for
		/// the duration of the in-flight work and dropped once it is safe to finish shutting down.
		pub async fn wait_for_drain(mut self) -> ReleaseShutdown {
			let mode = self
				.signal_rx
				.wait_for(Option::is_some)
				.await
				.map(|mode| mode.expect("already asserted is_some"))
				.unwrap_or(DrainMode::Immediate);
			ReleaseShutdown(self.drained_tx, mode)
		}
	}

	impl std::fmt::Debug for Signal {
		fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
			f.debug_struct("Signal").finish_non_exhaustive()
		}
	}

	impl std::fmt::Debug for Watch {
		fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
			f.debug_struct("Watch").finish_non_exhaustive()
		}
	}
}

#[cfg(test)]
mod test {
	use std::sync::Arc;
	use std::sync::atomic::{AtomicUsize, Ordering};

	use super::*;

	#[tokio::test]
	async fn drain_waits_for_all_watchers() {
		let (trigger, watcher) = new();
		let completed = Arc::new(AtomicUsize::new(0));

		for i in 1..=3 {
			let watcher = watcher.clone();
			let completed = completed.clone();
			tokio::spawn(async move {
				let blocker = watcher.wait_for_drain().await;
				tokio::time::sleep(Duration::from_millis(i * 5)).await;
				completed.fetch_add(1, Ordering::SeqCst);
				drop(blocker);
			});
		}
		drop(watcher);

		trigger.start_drain_and_wait(DrainMode::Graceful).await;
		assert_eq!(completed.load(Ordering::SeqCst), 3);
	}

	#[tokio::test]
	async fn drain_without_watchers_completes_immediately() {
		let (trigger, watcher) = new();
		drop(watcher);
		tokio::time::timeout(
			Duration::from_millis(100),
			trigger.start_drain_and_wait(DrainMode::Graceful),
		)
		.await
		.expect("drain should complete promptly with no watchers");
	}
}
