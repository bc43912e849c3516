//! Header access for intercepted requests and bearer header helpers.

// crates.io
use http::{HeaderMap, HeaderValue, header::AUTHORIZATION};
// self
use crate::_prelude::*;

const BEARER_PREFIX: &str = "Bearer ";

/// Requests the interceptor can attach a bearer credential to.
///
/// Implemented for [`http::Request`] and, with the `reqwest` feature, for [`reqwest::Request`].
pub trait BearerRequest
where
	Self: Send,
{
	/// Returns the request headers.
	fn headers(&self) -> &HeaderMap;

	/// Returns the request headers for mutation.
	fn headers_mut(&mut self) -> &mut HeaderMap;

	/// Returns the bearer credential currently carried by the `Authorization` header, if any.
	fn bearer_token(&self) -> Option<&str> {
		self.headers().get(AUTHORIZATION)?.to_str().ok()?.strip_prefix(BEARER_PREFIX)
	}
}
impl<B> BearerRequest for http::Request<B>
where
	B: Send,
{
	fn headers(&self) -> &HeaderMap {
		http::Request::headers(self)
	}

	fn headers_mut(&mut self) -> &mut HeaderMap {
		http::Request::headers_mut(self)
	}
}
#[cfg(feature = "reqwest")]
impl BearerRequest for reqwest::Request {
	fn headers(&self) -> &HeaderMap {
		reqwest::Request::headers(self)
	}

	fn headers_mut(&mut self) -> &mut HeaderMap {
		reqwest::Request::headers_mut(self)
	}
}

/// Encodes `Bearer <token>` as a sensitive header value.
pub fn bearer_header_value(token: &TokenSecret) -> Result<HeaderValue> {
	let mut value = HeaderValue::try_from(format!("{BEARER_PREFIX}{}", token.expose()))
		.map_err(|_| Error::InvalidCredentialFormat)?;

	value.set_sensitive(true);

	Ok(value)
}

/// Sets `Authorization: Bearer <token>` on the request, replacing any existing value.
pub fn attach_bearer<R>(mut request: R, token: &TokenSecret) -> Result<R>
where
	R: BearerRequest,
{
	let value = bearer_header_value(token)?;

	request.headers_mut().insert(AUTHORIZATION, value);

	Ok(request)
}
