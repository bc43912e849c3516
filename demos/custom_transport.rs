//! Demonstrates plugging a custom renewal transport and a file-backed credential store into
//! the interceptor, without any HTTP stack.
//!
//! 1. Implement [`RenewalTransport`] for an in-process issuer that rotates refresh tokens.
//! 2. Persist credentials with [`FileStore`] so a restart reuses the last refresh token.
//! 3. Intercept plain [`http::Request`] values; concurrent requests share one renewal.

// std
use std::{
	env,
	sync::{
		Arc,
		atomic::{AtomicU64, Ordering},
	},
};
// crates.io
use color_eyre::Result;
use http::{HeaderValue, StatusCode, header::AUTHORIZATION};
// self
use bearer_refresh::{
	config::{RefreshConfig, json_field},
	error::TransportError,
	interceptor::RefreshInterceptor,
	request::BearerRequest,
	store::{CredentialAttributes, CredentialStore, FileStore},
	transport::{RenewalRequest, RenewalResponse, RenewalTransport, TransportFuture},
};

/// Issues `access-<n>` / `refresh-<n>` pairs for any presented refresh token.
#[derive(Clone, Default)]
struct InProcessIssuer {
	generation: Arc<AtomicU64>,
}
impl RenewalTransport for InProcessIssuer {
	fn execute(&self, request: RenewalRequest) -> TransportFuture<'_> {
		let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
		let presented = request.headers().get(AUTHORIZATION).cloned();
		let client = request.headers().get("x-client-id").cloned();

		Box::pin(async move {
			let (status, body) = match (presented, client) {
				(Some(_), Some(_)) => (
					StatusCode::OK,
					format!(
						r#"{{"accessToken":"access-{generation}","refreshToken":"refresh-{generation}"}}"#
					),
				),
				_ => (StatusCode::UNAUTHORIZED, r#"{"error":"unknown_client"}"#.to_owned()),
			};
			let mut response = RenewalResponse::new(body.into_bytes());

			*response.status_mut() = status;

			Ok::<_, TransportError>(response)
		})
	}
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let path = env::temp_dir().join("bearer-refresh-demo.json");
	let store = FileStore::open(&path)?;

	if store.get("refreshToken")?.is_none() {
		store.set("refreshToken", &"bootstrap".into(), &CredentialAttributes::default())?;
	}

	let issuer = InProcessIssuer::default();
	let config = RefreshConfig::<http::Request<()>>::builder("https://issuer.internal/renew")
		.credential_store(store)
		.renewal_transport(issuer.clone())
		.transform_refresh_request(|mut request| {
			request.headers_mut().insert("x-client-id", HeaderValue::from_static("demo"));

			request
		})
		.get_refresh_token(json_field("refreshToken"))
		.on_refresh_success(|response, _| println!("renewed with HTTP {}", response.status()))
		.build()?;
	let interceptor = RefreshInterceptor::new(config);
	let mut tasks = Vec::new();

	for id in 0..4 {
		let interceptor = interceptor.clone();

		tasks.push(tokio::spawn(async move {
			let request =
				http::Request::builder().uri(format!("https://api.internal/jobs/{id}")).body(())?;

			color_eyre::eyre::Ok(interceptor.intercept(request).await?)
		}));
	}
	for task in tasks {
		let request = task.await??;

		println!("{} -> {:?}", request.uri(), request.bearer_token());
	}

	println!(
		"renewal calls: {}, followers: {}, snapshot: {}",
		issuer.generation.load(Ordering::SeqCst),
		interceptor.coordinator().metrics().queued(),
		path.display()
	);

	Ok(())
}
