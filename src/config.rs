//! Middleware configuration: serde-loadable settings plus typed hooks.
//!
//! [`RefreshSettings`] holds the plain values (storage keys, endpoint, timing, retry policy)
//! and can be loaded from JSON using the same camelCase option names the settings table
//! documents. [`RefreshConfigBuilder`] layers the typed hooks, credential store, and renewal
//! transport on top and validates the result into a [`RefreshConfig`].

// self
use crate::{
	_prelude::*,
	error::ConfigError,
	request::{self, BearerRequest},
	store::{CredentialAttributes, CredentialStore, MemoryStore},
	transport::{RenewalRequest, RenewalResponse, RenewalTransport},
};

/// Per-request bypass predicate; `false` passes the request through untouched.
pub type InterceptPredicate<R> = Arc<dyn Fn(&R) -> bool + Send + Sync>;
/// Shapes the renewal request before it is sent.
pub type RefreshRequestTransform = Arc<dyn Fn(RenewalRequest) -> RenewalRequest + Send + Sync>;
/// Shapes a request that waited for (or led) a renewal, given the new access token.
pub type RetryRequestTransform<R> = Arc<dyn Fn(R, &TokenSecret) -> Result<R> + Send + Sync>;
/// Pulls a credential out of the renewal response.
pub type TokenExtractor =
	Arc<dyn Fn(&RenewalResponse) -> Result<Option<TokenSecret>> + Send + Sync>;
/// Notified after a renewal stored a new access token.
pub type RefreshSuccessHook = Arc<dyn Fn(&RenewalResponse, &TokenSecret) + Send + Sync>;
/// Notified once a renewal cycle fails terminally.
pub type RefreshErrorHook = Arc<dyn Fn(&Error) + Send + Sync>;
/// Notified whenever a renewal is needed but no refresh token is stored.
pub type MissingTokensHook = Arc<dyn Fn() + Send + Sync>;

/// Builds an extractor that reads a string field from a JSON object body.
///
/// An empty body or an absent, non-string, or empty field yields `Ok(None)`; a body that is
/// not a JSON object yields [`Error::ResponseParse`].
pub fn json_field(field: impl Into<String>) -> TokenExtractor {
	let field = field.into();

	Arc::new(move |response: &RenewalResponse| -> Result<Option<TokenSecret>> {
		if response.body().iter().all(u8::is_ascii_whitespace) {
			return Ok(None);
		}

		let mut deserializer = serde_json::Deserializer::from_slice(response.body());
		let body: serde_json::Map<String, serde_json::Value> =
			serde_path_to_error::deserialize(&mut deserializer).map_err(Error::response_parse)?;

		Ok(body
			.get(&field)
			.and_then(serde_json::Value::as_str)
			.and_then(|value| TokenSecret::new(value).non_empty()))
	})
}

/// Plain-data settings for the middleware.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RefreshSettings {
	/// Storage key of the access token.
	pub access_token_key: String,
	/// Storage key of the refresh token.
	pub refresh_token_key: String,
	/// Renewal endpoint.
	pub refresh_token_url: String,
	/// Attributes used when writing or removing the access token.
	pub access_token_cookie_options: CredentialAttributes,
	/// Attributes used when writing or removing the refresh token.
	pub refresh_token_cookie_options: CredentialAttributes,
	/// How long a queued request waits for an in-flight renewal (milliseconds on the wire).
	#[serde(with = "duration_ms")]
	pub timeout_request: Duration,
	/// Attempts per renewal cycle; `0` is treated as `1`.
	pub max_refresh_attempts: u32,
	/// Pause between failed attempts (milliseconds on the wire).
	#[serde(with = "duration_ms")]
	pub refresh_retry_delay: Duration,
}
impl RefreshSettings {
	/// Default storage key of the access token.
	pub const DEFAULT_ACCESS_TOKEN_KEY: &'static str = "accessToken";
	/// Default attempts per renewal cycle (no retry).
	pub const DEFAULT_MAX_REFRESH_ATTEMPTS: u32 = 1;
	/// Default storage key of the refresh token.
	pub const DEFAULT_REFRESH_TOKEN_KEY: &'static str = "refreshToken";
	/// Default pause between failed attempts.
	pub const DEFAULT_REFRESH_RETRY_DELAY: Duration = Duration::from_millis(1_000);
	/// Default wait bound for queued requests.
	pub const DEFAULT_TIMEOUT_REQUEST: Duration = Duration::from_millis(30_000);

	/// Creates default settings targeting the provided renewal endpoint.
	pub fn new(refresh_token_url: impl Into<String>) -> Self {
		Self { refresh_token_url: refresh_token_url.into(), ..Default::default() }
	}

	/// Parses settings from a JSON document, reporting the failing field path on error.
	pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
		let mut deserializer = serde_json::Deserializer::from_str(json);

		serde_path_to_error::deserialize(&mut deserializer)
			.map_err(|e| ConfigError::Settings { source: Arc::new(e) })
	}

	/// Parses settings from JSON bytes, reporting the failing field path on error.
	pub fn from_json_slice(json: &[u8]) -> Result<Self, ConfigError> {
		let mut deserializer = serde_json::Deserializer::from_slice(json);

		serde_path_to_error::deserialize(&mut deserializer)
			.map_err(|e| ConfigError::Settings { source: Arc::new(e) })
	}

	/// Parses and validates the renewal endpoint.
	pub fn refresh_url(&self) -> Result<Url, ConfigError> {
		Url::parse(&self.refresh_token_url).map_err(|source| ConfigError::InvalidRefreshUrl {
			url: self.refresh_token_url.clone(),
			source,
		})
	}

	fn normalized(mut self) -> Self {
		self.max_refresh_attempts = self.max_refresh_attempts.max(1);

		self
	}
}
impl Default for RefreshSettings {
	fn default() -> Self {
		Self {
			access_token_key: Self::DEFAULT_ACCESS_TOKEN_KEY.into(),
			refresh_token_key: Self::DEFAULT_REFRESH_TOKEN_KEY.into(),
			refresh_token_url: String::new(),
			access_token_cookie_options: CredentialAttributes::default(),
			refresh_token_cookie_options: CredentialAttributes::default(),
			timeout_request: Self::DEFAULT_TIMEOUT_REQUEST,
			max_refresh_attempts: Self::DEFAULT_MAX_REFRESH_ATTEMPTS,
			refresh_retry_delay: Self::DEFAULT_REFRESH_RETRY_DELAY,
		}
	}
}

/// Hooks consumed by the refresh coordinator.
#[derive(Clone)]
pub struct RefreshHooks {
	/// Shapes the renewal request; identity by default.
	pub transform_refresh_request: RefreshRequestTransform,
	/// Extracts the new access token; reads the `accessToken` JSON field by default.
	pub get_access_token: TokenExtractor,
	/// Extracts a rotated refresh token, when the endpoint issues one.
	pub get_refresh_token: Option<TokenExtractor>,
	/// Success notification.
	pub on_refresh_success: Option<RefreshSuccessHook>,
	/// Terminal failure notification.
	pub on_refresh_error: Option<RefreshErrorHook>,
	/// Missing-tokens notification.
	pub on_missing_tokens: Option<MissingTokensHook>,
}
impl RefreshHooks {
	pub(crate) fn notify_refresh_success(&self, response: &RenewalResponse, token: &TokenSecret) {
		if let Some(hook) = &self.on_refresh_success {
			hook(response, token);
		}
	}

	pub(crate) fn notify_refresh_error(&self, error: &Error) {
		if let Some(hook) = &self.on_refresh_error {
			hook(error);
		}
	}

	pub(crate) fn notify_missing_tokens(&self) {
		if let Some(hook) = &self.on_missing_tokens {
			hook();
		}
	}
}
impl Default for RefreshHooks {
	fn default() -> Self {
		Self {
			transform_refresh_request: Arc::new(|request: RenewalRequest| request),
			get_access_token: json_field("accessToken"),
			get_refresh_token: None,
			on_refresh_success: None,
			on_refresh_error: None,
			on_missing_tokens: None,
		}
	}
}
impl Debug for RefreshHooks {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RefreshHooks")
			.field("get_refresh_token_set", &self.get_refresh_token.is_some())
			.field("on_refresh_success_set", &self.on_refresh_success.is_some())
			.field("on_refresh_error_set", &self.on_refresh_error.is_some())
			.field("on_missing_tokens_set", &self.on_missing_tokens.is_some())
			.finish()
	}
}

/// Hooks consumed by the request interceptor.
pub struct RequestHooks<R> {
	/// Bypass predicate; intercepts every request by default.
	pub should_intercept_request: InterceptPredicate<R>,
	/// Post-renewal request transform; attaches the bearer header by default.
	pub transform_retry_request: RetryRequestTransform<R>,
}
impl<R> Clone for RequestHooks<R> {
	fn clone(&self) -> Self {
		Self {
			should_intercept_request: self.should_intercept_request.clone(),
			transform_retry_request: self.transform_retry_request.clone(),
		}
	}
}
impl<R> Default for RequestHooks<R>
where
	R: 'static + BearerRequest,
{
	fn default() -> Self {
		Self {
			should_intercept_request: Arc::new(|_: &R| true),
			transform_retry_request: Arc::new(request::attach_bearer::<R>),
		}
	}
}

/// Everything the refresh coordinator needs, validated.
#[derive(Clone)]
pub struct CoordinatorConfig {
	/// Normalized settings.
	pub settings: RefreshSettings,
	/// Parsed renewal endpoint.
	pub refresh_url: Url,
	/// Credential store shared with the interceptor.
	pub store: Arc<dyn CredentialStore>,
	/// Renewal transport.
	pub transport: Arc<dyn RenewalTransport>,
	/// Coordinator hooks.
	pub hooks: RefreshHooks,
}
impl Debug for CoordinatorConfig {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CoordinatorConfig")
			.field("settings", &self.settings)
			.field("refresh_url", &self.refresh_url.as_str())
			.field("hooks", &self.hooks)
			.finish()
	}
}

/// Validated middleware configuration for requests of type `R`.
pub struct RefreshConfig<R> {
	/// Coordinator half of the configuration.
	pub coordinator: CoordinatorConfig,
	/// Interceptor half of the configuration.
	pub request: RequestHooks<R>,
}
impl<R> RefreshConfig<R>
where
	R: 'static + BearerRequest,
{
	/// Starts a builder targeting the provided renewal endpoint.
	pub fn builder(refresh_token_url: impl Into<String>) -> RefreshConfigBuilder<R> {
		RefreshConfigBuilder::from_settings(RefreshSettings::new(refresh_token_url))
	}
}
impl<R> Clone for RefreshConfig<R> {
	fn clone(&self) -> Self {
		Self { coordinator: self.coordinator.clone(), request: self.request.clone() }
	}
}
impl<R> Debug for RefreshConfig<R> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RefreshConfig").field("coordinator", &self.coordinator).finish()
	}
}

/// Builder for [`RefreshConfig`].
pub struct RefreshConfigBuilder<R> {
	settings: RefreshSettings,
	store: Option<Arc<dyn CredentialStore>>,
	transport: Option<Arc<dyn RenewalTransport>>,
	hooks: RefreshHooks,
	request: RequestHooks<R>,
}
impl<R> RefreshConfigBuilder<R>
where
	R: 'static + BearerRequest,
{
	/// Starts from previously loaded settings.
	pub fn from_settings(settings: RefreshSettings) -> Self {
		Self {
			settings,
			store: None,
			transport: None,
			hooks: RefreshHooks::default(),
			request: RequestHooks::default(),
		}
	}

	/// Overrides the access token storage key.
	pub fn access_token_key(mut self, key: impl Into<String>) -> Self {
		self.settings.access_token_key = key.into();

		self
	}

	/// Overrides the refresh token storage key.
	pub fn refresh_token_key(mut self, key: impl Into<String>) -> Self {
		self.settings.refresh_token_key = key.into();

		self
	}

	/// Overrides the attributes used for the access token.
	pub fn access_token_cookie_options(mut self, attributes: CredentialAttributes) -> Self {
		self.settings.access_token_cookie_options = attributes;

		self
	}

	/// Overrides the attributes used for the refresh token.
	pub fn refresh_token_cookie_options(mut self, attributes: CredentialAttributes) -> Self {
		self.settings.refresh_token_cookie_options = attributes;

		self
	}

	/// Overrides the wait bound for queued requests (defaults to 30 seconds).
	pub fn timeout_request(mut self, timeout: Duration) -> Self {
		self.settings.timeout_request = timeout;

		self
	}

	/// Overrides the attempts per renewal cycle (defaults to 1).
	pub fn max_refresh_attempts(mut self, attempts: u32) -> Self {
		self.settings.max_refresh_attempts = attempts;

		self
	}

	/// Overrides the pause between failed attempts (defaults to 1 second).
	pub fn refresh_retry_delay(mut self, delay: Duration) -> Self {
		self.settings.refresh_retry_delay = delay;

		self
	}

	/// Uses the provided credential store (an in-memory store by default).
	pub fn credential_store<S>(self, store: S) -> Self
	where
		S: 'static + CredentialStore,
	{
		self.shared_credential_store(Arc::new(store))
	}

	/// Uses an already shared credential store.
	pub fn shared_credential_store(mut self, store: Arc<dyn CredentialStore>) -> Self {
		self.store = Some(store);

		self
	}

	/// Uses the provided renewal transport (a redirect-free reqwest client by default).
	pub fn renewal_transport<T>(self, transport: T) -> Self
	where
		T: RenewalTransport,
	{
		self.shared_renewal_transport(Arc::new(transport))
	}

	/// Uses an already shared renewal transport.
	pub fn shared_renewal_transport(mut self, transport: Arc<dyn RenewalTransport>) -> Self {
		self.transport = Some(transport);

		self
	}

	/// Sets the per-request bypass predicate.
	pub fn should_intercept_request<F>(mut self, predicate: F) -> Self
	where
		F: 'static + Send + Sync + Fn(&R) -> bool,
	{
		self.request.should_intercept_request = Arc::new(predicate);

		self
	}

	/// Sets the post-renewal request transform.
	pub fn transform_retry_request<F>(mut self, transform: F) -> Self
	where
		F: 'static + Send + Sync + Fn(R, &TokenSecret) -> Result<R>,
	{
		self.request.transform_retry_request = Arc::new(transform);

		self
	}

	/// Sets the renewal request transform.
	pub fn transform_refresh_request<F>(mut self, transform: F) -> Self
	where
		F: 'static + Send + Sync + Fn(RenewalRequest) -> RenewalRequest,
	{
		self.hooks.transform_refresh_request = Arc::new(transform);

		self
	}

	/// Sets the access token extractor.
	pub fn get_access_token<F>(mut self, extractor: F) -> Self
	where
		F: 'static + Send + Sync + Fn(&RenewalResponse) -> Result<Option<TokenSecret>>,
	{
		self.hooks.get_access_token = Arc::new(extractor);

		self
	}

	/// Sets the rotated refresh token extractor.
	pub fn get_refresh_token<F>(mut self, extractor: F) -> Self
	where
		F: 'static + Send + Sync + Fn(&RenewalResponse) -> Result<Option<TokenSecret>>,
	{
		self.hooks.get_refresh_token = Some(Arc::new(extractor));

		self
	}

	/// Sets the success notification.
	pub fn on_refresh_success<F>(mut self, hook: F) -> Self
	where
		F: 'static + Send + Sync + Fn(&RenewalResponse, &TokenSecret),
	{
		self.hooks.on_refresh_success = Some(Arc::new(hook));

		self
	}

	/// Sets the terminal failure notification.
	pub fn on_refresh_error<F>(mut self, hook: F) -> Self
	where
		F: 'static + Send + Sync + Fn(&Error),
	{
		self.hooks.on_refresh_error = Some(Arc::new(hook));

		self
	}

	/// Sets the missing-tokens notification.
	pub fn on_missing_tokens<F>(mut self, hook: F) -> Self
	where
		F: 'static + Send + Sync + Fn(),
	{
		self.hooks.on_missing_tokens = Some(Arc::new(hook));

		self
	}

	/// Validates the settings and fills in the default store and transport.
	pub fn build(self) -> Result<RefreshConfig<R>, ConfigError> {
		let settings = self.settings.normalized();
		let refresh_url = settings.refresh_url()?;
		let store = self.store.unwrap_or_else(|| Arc::new(MemoryStore::default()));
		let transport = match self.transport {
			Some(transport) => transport,
			None => default_transport()?,
		};

		Ok(RefreshConfig {
			coordinator: CoordinatorConfig {
				settings,
				refresh_url,
				store,
				transport,
				hooks: self.hooks,
			},
			request: self.request,
		})
	}
}
impl<R> Debug for RefreshConfigBuilder<R> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RefreshConfigBuilder")
			.field("settings", &self.settings)
			.field("store_set", &self.store.is_some())
			.field("transport_set", &self.transport.is_some())
			.finish()
	}
}

#[cfg(feature = "reqwest")]
fn default_transport() -> Result<Arc<dyn RenewalTransport>, ConfigError> {
	Ok(Arc::new(crate::transport::ReqwestTransport::new()?))
}
#[cfg(not(feature = "reqwest"))]
fn default_transport() -> Result<Arc<dyn RenewalTransport>, ConfigError> {
	Err(ConfigError::MissingTransport)
}

mod duration_ms {
	// std
	use std::time::Duration;
	// crates.io
	use serde::{Deserialize, Deserializer, Serializer};

	pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
	where
		D: Deserializer<'de>,
	{
		u64::deserialize(deserializer).map(Duration::from_millis)
	}
}
