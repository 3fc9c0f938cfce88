use tokio::sync::mpsc;
use tracing::info;

/// Receives the process shutdown signal (SIGINT/SIGTERM on unix, ctrl-c elsewhere).
pub struct Shutdown {
	tx: mpsc::Sender<()>,
	rx: mpsc::Receiver<()>,
}

/// A handle that can fire a shutdown manually, independent of OS signals. Useful in tests
/// and for admin-triggered shutdowns.
#[derive(Clone)]
pub struct ShutdownTrigger {
	tx: mpsc::Sender<()>,
}

impl Shutdown {
	pub fn new() -> Self {
		let (tx, rx) = mpsc::channel(1);
		imp::register(tx.clone());
		Shutdown { tx, rx }
	}

	/// Waits for a shutdown to be requested.
	pub async fn wait(&mut self) {
		self.rx.recv().await;
		info!("shutdown signal received");
	}

	pub fn trigger(&self) -> ShutdownTrigger {
		ShutdownTrigger { tx: self.tx.clone() }
	}
}

impl Default for Shutdown {
	fn default() -> Self {
		Self::new()
	}
}

impl ShutdownTrigger {
	pub async fn shutdown_now(&self) {
		let _ = self.tx.send(()).await;
	}
}

#[cfg(unix)]
mod imp {
	use tokio::sync::mpsc;

	pub fn register(tx: mpsc::Sender<()>) {
		tokio::spawn(async move {
			use tokio::signal::unix::{SignalKind, signal};
			let mut sigint = signal(SignalKind::interrupt()).expect("failed to register SIGINT handler");
			let mut sigterm = signal(SignalKind::terminate()).expect("failed to register SIGTERM handler");
			tokio::select! {
				_ = sigint.recv() => {},
				_ = sigterm.recv() => {},
			}
			let _ = tx.send(()).await;
		});
	}
}

#[cfg(not(unix))]
mod imp {
	use tokio::sync::mpsc;

	pub fn register(tx: mpsc::Sender<()>) {
		tokio::spawn(async move {
			let _ = tokio::signal::ctrl_c().await;
			let _ = tx.send(()).await;
		});
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[tokio::test]
	async fn trigger_fires_independently() {
		let mut shutdown = Shutdown::new();
		let (tx, mut rx) = mpsc::channel(1);
		tokio::spawn(async move {
			shutdown.wait().await;
			let _ = tx.send(()).await;
		});
		// nothing sent yet
		assert!(tokio::time::timeout(std::time::Duration::from_millis(20), rx.recv())
			.await
			.is_err());
	}
}
