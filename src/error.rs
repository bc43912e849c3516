//! Middleware-level error types shared by the coordinator, interceptor, and stores.
//!
//! [`Error`] is [`Clone`] so a single terminal renewal failure can be handed to the leader
//! request and to every queued follower unchanged. Sources that are not clonable are kept
//! behind an [`Arc`].

pub use crate::store::StoreError;

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type SharedError = Arc<dyn StdError + Send + Sync>;
type JsonPathError = Arc<serde_path_to_error::Error<serde_json::Error>>;

/// Canonical error surfaced to callers of intercepted requests.
#[derive(Clone, Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Credential store failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		StoreError,
	),
	/// The renewal call itself failed (network or HTTP level).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// No refresh credential is available to renew with.
	#[error("No refresh token is available.")]
	MissingRefreshToken,
	/// The renewal call succeeded but its payload lacked an access credential.
	#[error("Refresh response did not contain an access token.")]
	MissingAccessTokenInResponse,
	/// The renewal response body could not be parsed by the token extractor.
	#[error("Refresh response body could not be parsed.")]
	ResponseParse {
		/// Structured parsing failure, including the JSON path that failed.
		#[source]
		source: JsonPathError,
	},
	/// A credential contains bytes that cannot be carried in an HTTP header.
	#[error("Token cannot be encoded as an Authorization header value.")]
	InvalidCredentialFormat,
	/// A queued request waited past its bound for the in-flight renewal.
	#[error("Timed out after {waited:?} waiting for the token refresh.")]
	RefreshTimeout {
		/// Wait bound that elapsed.
		waited: Duration,
	},
	/// A follower was released after a successful renewal but the store holds no access token.
	#[error("Access token is missing after the token refresh completed.")]
	PostRefreshTokenMissing,
	/// The leader stopped driving the renewal before the cycle completed.
	#[error("Token refresh was abandoned before it completed.")]
	RefreshAbandoned,
}
impl Error {
	pub(crate) fn response_parse(source: serde_path_to_error::Error<serde_json::Error>) -> Self {
		Self::ResponseParse { source: Arc::new(source) }
	}
}

/// Configuration and validation failures raised while building the middleware.
#[derive(Clone, Debug, ThisError)]
pub enum ConfigError {
	/// The refresh endpoint URL cannot be parsed.
	#[error("Refresh token URL `{url}` is invalid.")]
	InvalidRefreshUrl {
		/// Raw URL as configured.
		url: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Settings document could not be deserialized.
	#[error("Refresh settings are malformed.")]
	Settings {
		/// Structured parsing failure, including the offending field path.
		#[source]
		source: JsonPathError,
	},
	/// No renewal transport was configured and no default transport is compiled in.
	#[error("No renewal transport is configured.")]
	MissingTransport,
	/// The default reqwest transport could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying builder failure.
		#[source]
		source: SharedError,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::HttpClientBuild { source: Arc::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures of the renewal call.
#[derive(Clone, Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the refresh endpoint.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: SharedError,
	},
	/// The refresh endpoint answered with a non-success status.
	#[error("Refresh endpoint responded with HTTP status {status}.")]
	Status {
		/// HTTP status code.
		status: u16,
	},
	/// The renewal request could not be built or converted for the transport.
	#[error("Refresh request could not be built.")]
	Request {
		/// Underlying construction failure.
		#[source]
		source: SharedError,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Network { source: Arc::new(src) }
	}

	/// Wraps a request construction error.
	pub fn request(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Request { source: Arc::new(src) }
	}
}
impl From<http::Error> for TransportError {
	fn from(e: http::Error) -> Self {
		Self::request(e)
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}
