//! Credential storage contract and built-in store implementations.
//!
//! Stores are keyed by plain strings (the configured access/refresh token keys) and carry
//! cookie-style [`CredentialAttributes`] alongside each value. Access is synchronous so the
//! interceptor can read the store and claim the refresh slot without suspending in between.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::_prelude::*;

/// Storage backend contract implemented by credential stores.
pub trait CredentialStore
where
	Self: Send + Sync,
{
	/// Fetches the credential stored under `key`, if present and not expired.
	fn get(&self, key: &str) -> Result<Option<TokenSecret>, StoreError>;

	/// Persists or replaces the credential stored under `key`.
	fn set(
		&self,
		key: &str,
		value: &TokenSecret,
		attributes: &CredentialAttributes,
	) -> Result<(), StoreError>;

	/// Removes the credential stored under `key`. Removing an absent key is not an error.
	fn remove(&self, key: &str, attributes: &CredentialAttributes) -> Result<(), StoreError>;
}

/// Error type produced by [`CredentialStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Cookie-style attributes stored alongside a credential.
///
/// Stores that have no use for an attribute ignore it; `expires` is honored by the built-in
/// stores, which report an expired credential as absent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CredentialAttributes {
	/// Path scope, `/` by default.
	pub path: Option<String>,
	/// Domain scope.
	pub domain: Option<String>,
	/// Restricts the credential to secure channels.
	pub secure: bool,
	/// Same-site policy.
	pub same_site: Option<SameSite>,
	/// Absolute expiry instant.
	#[serde(with = "time::serde::rfc3339::option")]
	pub expires: Option<OffsetDateTime>,
}
impl CredentialAttributes {
	/// Overrides the path scope.
	pub fn with_path(mut self, path: impl Into<String>) -> Self {
		self.path = Some(path.into());

		self
	}

	/// Overrides the domain scope.
	pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
		self.domain = Some(domain.into());

		self
	}

	/// Marks the credential as secure-only.
	pub fn secure(mut self) -> Self {
		self.secure = true;

		self
	}

	/// Overrides the same-site policy.
	pub fn with_same_site(mut self, same_site: SameSite) -> Self {
		self.same_site = Some(same_site);

		self
	}

	/// Sets an absolute expiry instant.
	pub fn expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.expires = Some(instant);

		self
	}

	/// Returns `true` when the attributes carry an expiry at or before `now`.
	pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
		self.expires.is_some_and(|expires| expires <= now)
	}
}
impl Default for CredentialAttributes {
	fn default() -> Self {
		Self { path: Some("/".into()), domain: None, secure: false, same_site: None, expires: None }
	}
}

/// Same-site policy attached to a stored credential.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSite {
	/// Sent only with same-site requests.
	Strict,
	/// Sent with same-site requests and top-level navigations.
	Lax,
	/// Sent with every request.
	None,
}

/// Value persisted by the built-in stores.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct StoredCredential {
	pub(crate) value: TokenSecret,
	pub(crate) attributes: CredentialAttributes,
}
impl StoredCredential {
	pub(crate) fn live_value(&self, now: OffsetDateTime) -> Option<TokenSecret> {
		if self.attributes.is_expired_at(now) {
			return None;
		}

		self.value.clone().non_empty()
	}
}

/// Reads a credential, treating empty values as absent.
pub(crate) fn read_token(
	store: &dyn CredentialStore,
	key: &str,
) -> Result<Option<TokenSecret>, StoreError> {
	Ok(store.get(key)?.and_then(TokenSecret::non_empty))
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	#[test]
	fn attributes_default_to_root_path() {
		let attributes = CredentialAttributes::default();

		assert_eq!(attributes.path.as_deref(), Some("/"));
		assert!(!attributes.secure);
		assert!(attributes.expires.is_none());
	}

	#[test]
	fn attributes_deserialize_from_camel_case() {
		let attributes: CredentialAttributes = serde_json::from_str(
			r#"{"domain":"api.example.com","secure":true,"sameSite":"strict","expires":"2030-01-01T00:00:00Z"}"#,
		)
		.expect("Attribute fixture should deserialize.");

		assert_eq!(attributes.path.as_deref(), Some("/"));
		assert_eq!(attributes.domain.as_deref(), Some("api.example.com"));
		assert!(attributes.secure);
		assert_eq!(attributes.same_site, Some(SameSite::Strict));
		assert_eq!(attributes.expires, Some(macros::datetime!(2030-01-01 00:00 UTC)));
	}

	#[test]
	fn expired_credentials_have_no_live_value() {
		let now = macros::datetime!(2026-01-01 12:00 UTC);
		let stored = StoredCredential {
			value: TokenSecret::new("a1"),
			attributes: CredentialAttributes::default().expires_at(now),
		};

		assert!(stored.live_value(now).is_none());
		assert!(stored.live_value(now - time::Duration::seconds(1)).is_some());
	}
}
