//! [`reqwest_middleware`] adapter for [`RefreshInterceptor`].
//!
//! ```no_run
//! use bearer_refresh::{
//! 	config::RefreshConfig, interceptor::RefreshInterceptor, middleware::RefreshMiddleware,
//! 	store::MemoryStore,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RefreshConfig::<reqwest::Request>::builder("https://auth.example.com/refresh")
//! 	.credential_store(MemoryStore::seeded([("refreshToken", "r1")]))
//! 	.build()?;
//! let client = reqwest_middleware::ClientBuilder::new(reqwest::Client::new())
//! 	.with(RefreshMiddleware::new(RefreshInterceptor::new(config)))
//! 	.build();
//! # let _ = client;
//! # Ok(())
//! # }
//! ```

// crates.io
use reqwest::{Request, Response};
use reqwest_middleware::{Middleware, Next};
// self
use crate::{_prelude::*, interceptor::RefreshInterceptor};

/// Runs every outgoing request through a [`RefreshInterceptor`] before passing it on.
///
/// Interceptor failures surface as [`reqwest_middleware::Error::Middleware`] wrapping the
/// crate [`Error`].
#[derive(Clone, Debug)]
pub struct RefreshMiddleware {
	interceptor: RefreshInterceptor<Request>,
}
impl RefreshMiddleware {
	/// Wraps the interceptor.
	pub fn new(interceptor: RefreshInterceptor<Request>) -> Self {
		Self { interceptor }
	}

	/// Underlying interceptor.
	pub fn interceptor(&self) -> &RefreshInterceptor<Request> {
		&self.interceptor
	}
}
impl From<RefreshInterceptor<Request>> for RefreshMiddleware {
	fn from(interceptor: RefreshInterceptor<Request>) -> Self {
		Self::new(interceptor)
	}
}
#[async_trait::async_trait]
impl Middleware for RefreshMiddleware {
	async fn handle(
		&self,
		req: Request,
		extensions: &mut http::Extensions,
		next: Next<'_>,
	) -> reqwest_middleware::Result<Response> {
		let req = self
			.interceptor
			.intercept(req)
			.await
			.map_err(reqwest_middleware::Error::middleware)?;

		next.run(req, extensions).await
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// crates.io
	use http::{StatusCode, header::AUTHORIZATION};
	use reqwest_middleware::ClientBuilder;
	// self
	use super::*;
	use crate::{
		config::RefreshConfig,
		error::TransportError,
		store::MemoryStore,
		transport::{RenewalRequest, RenewalResponse, transport_fn},
	};

	#[derive(Default)]
	struct AuthRecorder {
		seen: Mutex<Vec<Option<String>>>,
	}
	#[async_trait::async_trait]
	impl Middleware for AuthRecorder {
		async fn handle(
			&self,
			req: Request,
			_: &mut http::Extensions,
			_: Next<'_>,
		) -> reqwest_middleware::Result<Response> {
			let authorization = req
				.headers()
				.get(AUTHORIZATION)
				.map(|value| value.to_str().expect("Header should be ASCII.").to_owned());

			self.seen.lock().push(authorization);

			Ok(http::Response::<&[u8]>::default().into())
		}
	}

	fn middleware(
		store: MemoryStore,
		status: StatusCode,
		calls: Arc<AtomicUsize>,
	) -> RefreshMiddleware {
		let transport = transport_fn(move |_request: RenewalRequest| {
			calls.fetch_add(1, Ordering::SeqCst);

			async move {
				let mut response = RenewalResponse::new(br#"{"accessToken":"a1"}"#.to_vec());

				*response.status_mut() = status;

				Ok::<_, TransportError>(response)
			}
		});
		let config = RefreshConfig::<Request>::builder("https://auth.example.com/refresh")
			.credential_store(store)
			.renewal_transport(transport)
			.build()
			.expect("Config should build.");

		RefreshMiddleware::new(RefreshInterceptor::new(config))
	}

	#[tokio::test]
	async fn renewed_token_reaches_the_next_middleware() {
		let calls = Arc::new(AtomicUsize::new(0));
		let recorder = Arc::new(AuthRecorder::default());
		let client = ClientBuilder::new(reqwest::Client::new())
			.with(middleware(
				MemoryStore::seeded([("refreshToken", "r1")]),
				StatusCode::OK,
				calls.clone(),
			))
			.with_arc(recorder.clone())
			.build();
		let response =
			client
				.get("https://api.example.com/items")
				.send()
				.await
				.expect("Request should succeed.");

		assert_eq!(response.status(), StatusCode::OK);
		assert_eq!(calls.load(Ordering::SeqCst), 1);
		assert_eq!(recorder.seen.lock().as_slice(), [Some("Bearer a1".to_owned())]);
	}

	#[tokio::test]
	async fn renewal_failures_surface_as_middleware_errors() {
		let store = MemoryStore::seeded([("refreshToken", "r1")]);
		let recorder = Arc::new(AuthRecorder::default());
		let client = ClientBuilder::new(reqwest::Client::new())
			.with(middleware(store.clone(), StatusCode::UNAUTHORIZED, Default::default()))
			.with_arc(recorder.clone())
			.build();
		let err = client
			.get("https://api.example.com/items")
			.send()
			.await
			.expect_err("Failed renewal should abort the request.");

		assert!(matches!(err, reqwest_middleware::Error::Middleware(_)));
		assert!(recorder.seen.lock().is_empty());
		assert!(store.is_empty());
	}
}
