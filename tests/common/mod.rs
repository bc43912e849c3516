//! Shared fixtures for the integration tests.

#![allow(dead_code)]

// std
use std::{
	collections::VecDeque,
	io,
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration,
};
// crates.io
use http::{StatusCode, header::AUTHORIZATION};
use parking_lot::Mutex;
// self
use bearer_refresh::{
	config::{RefreshConfig, RefreshConfigBuilder},
	error::TransportError,
	interceptor::RefreshInterceptor,
	store::{CredentialStore, MemoryStore},
	transport::{RenewalRequest, RenewalResponse, RenewalTransport, TransportFuture},
};

pub type TestRequest = http::Request<()>;

pub const REFRESH_URL: &str = "https://auth.example.com/refresh";

/// Canned answer of the fake renewal endpoint.
#[derive(Clone, Debug)]
pub enum Reply {
	Status(u16, String),
	NetworkDown,
}
impl Reply {
	pub fn access(token: &str) -> Self {
		Self::Status(200, format!(r#"{{"accessToken":"{token}"}}"#))
	}

	pub fn rotated(access: &str, refresh: &str) -> Self {
		Self::Status(200, format!(r#"{{"accessToken":"{access}","refreshToken":"{refresh}"}}"#))
	}

	pub fn failure(status: u16) -> Self {
		Self::Status(status, r#"{"error":"invalid_token"}"#.into())
	}

	fn into_response(self) -> Result<RenewalResponse, TransportError> {
		match self {
			Self::Status(status, body) => {
				let mut response = RenewalResponse::new(body.into_bytes());

				*response.status_mut() =
					StatusCode::from_u16(status).expect("Reply status should be valid.");

				Ok(response)
			},
			Self::NetworkDown => Err(TransportError::network(io::Error::new(
				io::ErrorKind::ConnectionRefused,
				"refresh endpoint unreachable",
			))),
		}
	}
}

struct Script {
	replies: Mutex<VecDeque<Reply>>,
	fallback: Reply,
	calls: AtomicUsize,
	authorizations: Mutex<Vec<Option<String>>>,
}

/// Fake renewal endpoint that plays back scripted replies after an optional delay.
///
/// Clones share the script and the call log.
#[derive(Clone)]
pub struct ScriptedTransport {
	delay: Duration,
	script: Arc<Script>,
}
impl ScriptedTransport {
	pub fn always(reply: Reply) -> Self {
		Self::sequence(Vec::new(), reply)
	}

	pub fn sequence(replies: impl IntoIterator<Item = Reply>, fallback: Reply) -> Self {
		Self {
			delay: Duration::ZERO,
			script: Arc::new(Script {
				replies: Mutex::new(replies.into_iter().collect()),
				fallback,
				calls: AtomicUsize::new(0),
				authorizations: Mutex::new(Vec::new()),
			}),
		}
	}

	pub fn with_delay(mut self, delay: Duration) -> Self {
		self.delay = delay;

		self
	}

	pub fn calls(&self) -> usize {
		self.script.calls.load(Ordering::SeqCst)
	}

	pub fn authorizations(&self) -> Vec<Option<String>> {
		self.script.authorizations.lock().clone()
	}
}
impl RenewalTransport for ScriptedTransport {
	fn execute(&self, request: RenewalRequest) -> TransportFuture<'_> {
		let authorization = request
			.headers()
			.get(AUTHORIZATION)
			.and_then(|value| value.to_str().ok())
			.map(str::to_owned);

		self.script.calls.fetch_add(1, Ordering::SeqCst);
		self.script.authorizations.lock().push(authorization);

		let reply =
			self.script.replies.lock().pop_front().unwrap_or_else(|| self.script.fallback.clone());
		let delay = self.delay;

		Box::pin(async move {
			if !delay.is_zero() {
				tokio::time::sleep(delay).await;
			}

			reply.into_response()
		})
	}
}

pub fn api_request(path: &str) -> TestRequest {
	http::Request::builder()
		.uri(format!("https://api.example.com{path}"))
		.body(())
		.expect("API request fixture should build.")
}

pub fn builder(
	store: &MemoryStore,
	transport: &ScriptedTransport,
) -> RefreshConfigBuilder<TestRequest> {
	RefreshConfig::<TestRequest>::builder(REFRESH_URL)
		.credential_store(store.clone())
		.renewal_transport(transport.clone())
}

pub fn interceptor(
	store: &MemoryStore,
	transport: &ScriptedTransport,
	configure: impl FnOnce(RefreshConfigBuilder<TestRequest>) -> RefreshConfigBuilder<TestRequest>,
) -> RefreshInterceptor<TestRequest> {
	let config = configure(builder(store, transport))
		.build()
		.expect("Interceptor config fixture should build.");

	RefreshInterceptor::new(config)
}

pub fn stored(store: &MemoryStore, key: &str) -> Option<String> {
	store
		.get(key)
		.expect("Memory store reads should succeed.")
		.map(|token| token.expose().to_owned())
}
