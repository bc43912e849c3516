//! Thread-safe in-memory [`CredentialStore`] implementation for local development and tests.

// self
use crate::{
	_prelude::*,
	store::{CredentialAttributes, CredentialStore, StoreError, StoredCredential},
};

type StoreMap = Arc<RwLock<HashMap<String, StoredCredential>>>;

/// Thread-safe storage backend that keeps credentials in-process.
///
/// Clones share the same underlying map, so a test can hand one clone to the middleware and
/// keep another to inspect what the coordinator wrote.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(StoreMap);
impl MemoryStore {
	/// Builds a store pre-seeded with the provided key/value pairs and default attributes.
	pub fn seeded<I, K, V>(entries: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<TokenSecret>,
	{
		let map = entries
			.into_iter()
			.map(|(key, value)| {
				let stored = StoredCredential {
					value: value.into(),
					attributes: CredentialAttributes::default(),
				};

				(key.into(), stored)
			})
			.collect();

		Self(Arc::new(RwLock::new(map)))
	}

	/// Returns the attributes last written for `key`.
	pub fn attributes(&self, key: &str) -> Option<CredentialAttributes> {
		self.0.read().get(key).map(|stored| stored.attributes.clone())
	}

	/// Returns `true` when an entry exists for `key`, expired or not.
	pub fn contains(&self, key: &str) -> bool {
		self.0.read().contains_key(key)
	}

	/// Number of stored entries.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns `true` when the store holds no entries.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}
}
impl CredentialStore for MemoryStore {
	fn get(&self, key: &str) -> Result<Option<TokenSecret>, StoreError> {
		let now = OffsetDateTime::now_utc();

		Ok(self.0.read().get(key).and_then(|stored| stored.live_value(now)))
	}

	fn set(
		&self,
		key: &str,
		value: &TokenSecret,
		attributes: &CredentialAttributes,
	) -> Result<(), StoreError> {
		let stored = StoredCredential { value: value.clone(), attributes: attributes.clone() };

		self.0.write().insert(key.to_owned(), stored);

		Ok(())
	}

	fn remove(&self, key: &str, _attributes: &CredentialAttributes) -> Result<(), StoreError> {
		self.0.write().remove(key);

		Ok(())
	}
}
