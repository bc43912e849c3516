//! Demonstrates the reqwest middleware against a local mock API: the first wave of requests
//! finds no access token, one of them renews it, and the rest reuse the result.

// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
// self
use bearer_refresh::{
	config::{RefreshConfigBuilder, RefreshSettings},
	interceptor::RefreshInterceptor,
	middleware::RefreshMiddleware,
	reqwest::{Client, Request},
	reqwest_middleware::ClientBuilder,
	store::MemoryStore,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let refresh_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/refresh").header("authorization", "Bearer demo-refresh");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"accessToken":"demo-access"}"#);
		})
		.await;
	let api_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/profile").header("authorization", "Bearer demo-access");
			then.status(200).body(r#"{"name":"demo"}"#);
		})
		.await;
	let settings = RefreshSettings::from_json_str(&format!(
		r#"{{"refreshTokenUrl":"{}","timeoutRequest":5000}}"#,
		server.url("/auth/refresh")
	))?;
	let config = RefreshConfigBuilder::<Request>::from_settings(settings)
		.credential_store(MemoryStore::seeded([("refreshToken", "demo-refresh")]))
		.on_missing_tokens(|| println!("no credentials stored, sign-in required"))
		.build()?;
	let client = ClientBuilder::new(Client::new())
		.with(RefreshMiddleware::new(RefreshInterceptor::new(config)))
		.build();
	let mut tasks = Vec::new();

	for _ in 0..3 {
		let client = client.clone();
		let url = server.url("/profile");

		tasks.push(tokio::spawn(async move { client.get(url).send().await }));
	}
	for task in tasks {
		let response = task.await??;

		println!("{} {}", response.status(), response.text().await?);
	}

	println!(
		"refresh calls: {}, api calls: {}",
		refresh_mock.calls_async().await,
		api_mock.calls_async().await
	);

	Ok(())
}
