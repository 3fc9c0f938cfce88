//! The reference `Storage` implementation. A real deployment swaps in a database-backed
//! one; this one is enough to exercise every invariant the protocol needs and is what
//! the tests run against.

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

/// An in-memory, process-lifetime keyed table. Linearizable because every operation
/// takes the same `std::sync::Mutex` and never awaits while holding it.
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
	async fn expired_entries_read_as_absent() {
		let store = MemoryStorage::new();
		let key = store.insert(None, b"hello".to_vec(), Some(Duration::from_millis(10))).await.unwrap();
		assert_eq!(store.get(&key).await.unwrap(), Some(b"hello".to_vec()));
		tokio::time::sleep(Duration::from_millis(30)).await;
		assert_eq!(store.get(&key).await.unwrap(), None);
	}

	#[tokio::test]
	async fn delete_is_idempotent() {
		let store = MemoryStorage::new();
		store.delete("never-existed").await.unwrap();
		let key = store.insert(Some("a".into()), b"x".to_vec(), None).await.unwrap();
		store.delete(&key).await.unwrap();
		store.delete(&key).await.unwrap();
		assert_eq!(store.get(&key).await.unwrap(), None);
	}
}
