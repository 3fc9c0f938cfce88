//! The client-side reference `Storage` implementation. Independent lifetime from the
//! server's (see the component design's "two instances" note) — a real mobile embedder
//! swaps this for a platform-durable table.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reader_protocol::{ProtocolError, Storage};
use uuid::Uuid;

struct Entry {
	value: Vec<u8>,
	expires_at: Option<Instant>,
}

#[derive(Default)]
pub struct MemoryStorage {
	rows: Mutex<HashMap<String, Entry>>,
}

impl MemoryStorage {
	pub fn new() -> Self {
		MemoryStorage::default()
	}

	fn is_live(entry: &Entry, now: Instant) -> bool {
		entry.expires_at.map(|exp| now < exp).unwrap_or(true)
	}
}

#[async_trait]
impl Storage for MemoryStorage {
	async fn insert(&self, key: Option<String>, value: Vec<u8>, ttl: Option<Duration>) -> Result<String, ProtocolError> {
		let key = key.unwrap_or_else(|| Uuid::new_v4().to_string());
		let expires_at = ttl.map(|d| Instant::now() + d);
		let mut rows = self.rows.lock().expect("storage lock poisoned");
		rows.insert(key.clone(), Entry { value, expires_at });
		Ok(key)
	}

	async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, ProtocolError> {
		let now = Instant::now();
		let mut rows = self.rows.lock().expect("storage lock poisoned");
		match rows.get(key) {
			Some(entry) if Self::is_live(entry, now) => Ok(Some(entry.value.clone())),
			Some(_) => {
				rows.remove(key);
				Ok(None)
			},
			None => Ok(None),
		}
	}

	async fn update(&self, key: &str, value: Vec<u8>) -> Result<(), ProtocolError> {
		let mut rows = self.rows.lock().expect("storage lock poisoned");
		if let Some(entry) = rows.get_mut(key) {
			entry.value = value;
		} else {
			rows.insert(key.to_string(), Entry { value, expires_at: None });
		}
		Ok(())
	}

	async fn delete(&self, key: &str) -> Result<(), ProtocolError> {
		let mut rows = self.rows.lock().expect("storage lock poisoned");
		rows.remove(key);
		Ok(())
	}

	async fn enumerate(&self) -> Result<Vec<(String, Vec<u8>)>, ProtocolError> {
		let now = Instant::now();
		let mut rows = self.rows.lock().expect("storage lock poisoned");
		rows.retain(|_, entry| Self::is_live(entry, now));
		Ok(rows.iter().map(|(k, v)| (k.clone(), v.value.clone())).collect())
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[tokio::test]
	async fn insert_with_explicit_key_is_reusable() {
		let store = MemoryStorage::new();
		store.insert(Some("default".into()), b"a".to_vec(), None).await.unwrap();
		store.update("default", b"b".to_vec()).await.unwrap();
		assert_eq!(store.get("default").await.unwrap(), Some(b"b".to_vec()));
	}

	#[tokio::test]
	async fn enumerate_skips_expired_rows() {
		let store = MemoryStorage::new();
		store.insert(Some("live".into()), b"x".to_vec(), None).await.unwrap();
		store.insert(Some("dead".into()), b"y".to_vec(), Some(Duration::from_millis(5))).await.unwrap();
		tokio::time::sleep(Duration::from_millis(30)).await;
		let rows = store.enumerate().await.unwrap();
		assert_eq!(rows.len(), 1);
		assert_eq!(rows[0].0, "live");
	}
}
