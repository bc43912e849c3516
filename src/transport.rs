//! Transport primitives for the renewal call.
//!
//! The coordinator builds a [`RenewalRequest`] (a plain [`http::Request`]) carrying the refresh
//! credential and hands it to a [`RenewalTransport`]. The transport is the crate's only
//! dependency on an HTTP stack; the default [`ReqwestTransport`] is compiled in with the
//! `reqwest` feature, and [`transport_fn`] adapts an async closure for tests and bespoke clients.

// crates.io
use http::{Method, header::AUTHORIZATION};
// self
use crate::{_prelude::*, error::TransportError, request};

/// Request descriptor handed to the renewal transport.
pub type RenewalRequest = http::Request<Vec<u8>>;
/// Response descriptor returned by the renewal transport.
pub type RenewalResponse = http::Response<Vec<u8>>;

/// Boxed future returned by [`RenewalTransport::execute`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<RenewalResponse, TransportError>> + 'a + Send>>;

/// Abstraction over HTTP clients capable of executing the renewal call.
///
/// Implementations return any HTTP response they receive, successful or not; the
/// coordinator classifies non-2xx statuses itself so custom transports get the same
/// failure handling as the built-in one. Transports own any time bound on the call.
pub trait RenewalTransport
where
	Self: 'static + Send + Sync,
{
	/// Executes the renewal request.
	fn execute(&self, request: RenewalRequest) -> TransportFuture<'_>;
}

/// Builds the default renewal request: `POST <url>` with `Authorization: Bearer <refresh>`.
pub fn renewal_request(url: &Url, refresh_token: &TokenSecret) -> Result<RenewalRequest> {
	let authorization = request::bearer_header_value(refresh_token)?;
	let request = http::Request::builder()
		.method(Method::POST)
		.uri(url.as_str())
		.header(AUTHORIZATION, authorization)
		.body(Vec::new())
		.map_err(TransportError::from)?;

	Ok(request)
}

/// Adapter that turns an async closure into a [`RenewalTransport`].
#[derive(Clone)]
pub struct FnTransport<F>(F);
impl<F> Debug for FnTransport<F> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("FnTransport(..)")
	}
}
impl<F, Fut> RenewalTransport for FnTransport<F>
where
	F: 'static + Send + Sync + Fn(RenewalRequest) -> Fut,
	Fut: 'static + Send + Future<Output = Result<RenewalResponse, TransportError>>,
{
	fn execute(&self, request: RenewalRequest) -> TransportFuture<'_> {
		Box::pin((self.0)(request))
	}
}

/// Wraps an async closure as a [`RenewalTransport`].
pub fn transport_fn<F, Fut>(f: F) -> FnTransport<F>
where
	F: 'static + Send + Sync + Fn(RenewalRequest) -> Fut,
	Fut: 'static + Send + Future<Output = Result<RenewalResponse, TransportError>>,
{
	FnTransport(f)
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// [`ReqwestTransport::new`] disables redirect following: a refresh endpoint is expected to
/// answer directly, and forwarding the refresh credential to another location is never wanted.
/// There is no `Default`; every transport is built through one of the two constructors.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct ReqwestTransport(ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Builds a transport backed by a fresh client that does not follow redirects.
	pub fn new() -> Result<Self, crate::error::ConfigError> {
		let client = ReqwestClient::builder().redirect(reqwest::redirect::Policy::none()).build()?;

		Ok(Self(client))
	}

	/// Wraps an existing reqwest [`ReqwestClient`] as is.
	///
	/// The client's redirect policy is not inspected. Build it with
	/// `redirect(reqwest::redirect::Policy::none())`, or the refresh credential may be forwarded
	/// to whatever location the endpoint redirects to.
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl RenewalTransport for ReqwestTransport {
	fn execute(&self, request: RenewalRequest) -> TransportFuture<'_> {
		let client = self.0.clone();

		Box::pin(async move {
			let request = reqwest::Request::try_from(request).map_err(TransportError::request)?;
			let response = client.execute(request).await?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let mut renewed = RenewalResponse::new(response.bytes().await?.to_vec());

			*renewed.status_mut() = status;
			*renewed.headers_mut() = headers;

			Ok(renewed)
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn renewal_request_carries_refresh_token_as_bearer() {
		let url =
			Url::parse("https://auth.example.com/refresh").expect("URL fixture should parse.");
		let request = renewal_request(&url, &TokenSecret::new("r1"))
			.expect("Renewal request should build for a plain token.");

		assert_eq!(request.method(), Method::POST);
		assert_eq!(request.uri(), "https://auth.example.com/refresh");
		assert_eq!(
			request.headers().get(AUTHORIZATION).and_then(|value| value.to_str().ok()),
			Some("Bearer r1")
		);
		assert!(request.body().is_empty());
	}

	#[test]
	fn renewal_request_rejects_tokens_with_control_bytes() {
		let url =
			Url::parse("https://auth.example.com/refresh").expect("URL fixture should parse.");
		let err = renewal_request(&url, &TokenSecret::new("r1\nInjected: yes"))
			.expect_err("Header injection should be rejected.");

		assert!(matches!(err, Error::InvalidCredentialFormat));
	}

	#[tokio::test]
	async fn fn_transport_forwards_requests() {
		let transport = transport_fn(|request: RenewalRequest| async move {
			let echoed = request.headers()[AUTHORIZATION].as_bytes().to_vec();

			Ok::<_, TransportError>(RenewalResponse::new(echoed))
		});
		let url =
			Url::parse("https://auth.example.com/refresh").expect("URL fixture should parse.");
		let request = renewal_request(&url, &TokenSecret::new("r1"))
			.expect("Renewal request should build for a plain token.");
		let response = transport.execute(request).await.expect("Closure transport should succeed.");

		assert_eq!(response.body().as_slice(), b"Bearer r1");
	}
}
