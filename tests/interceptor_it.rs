mod common;

// std
use std::{
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration,
};
// crates.io
use tokio::{task::JoinSet, time};
// self
use bearer_refresh::{
	config::json_field,
	error::{Error, TransportError},
	request::BearerRequest,
	store::{CredentialAttributes, CredentialStore, MemoryStore},
};
use common::*;

const RENEWAL_LATENCY: Duration = Duration::from_millis(1_000);

#[tokio::test(start_paused = true)]
async fn concurrent_requests_share_a_single_renewal_call() {
	let store = MemoryStore::seeded([("refreshToken", "r1")]);
	let transport = ScriptedTransport::always(Reply::access("a1")).with_delay(RENEWAL_LATENCY);
	let interceptor = interceptor(&store, &transport, |b| b);
	let mut requests = JoinSet::new();

	for i in 0..10 {
		let interceptor = interceptor.clone();

		requests.spawn(async move {
			interceptor.intercept(api_request(&format!("/items/{i}"))).await
		});
	}

	let mut completed = 0;

	while let Some(joined) = requests.join_next().await {
		let request = joined
			.expect("Request task should not panic.")
			.expect("Every request should receive the renewed token.");

		assert_eq!(request.bearer_token(), Some("a1"));

		completed += 1;
	}

	let coordinator = interceptor.coordinator();

	assert_eq!(completed, 10);
	assert_eq!(transport.calls(), 1);
	assert_eq!(transport.authorizations(), [Some("Bearer r1".to_owned())]);
	assert_eq!(coordinator.metrics().queued(), 9);
	assert!(!coordinator.is_refreshing());
	assert_eq!(coordinator.queue_len(), 0);
}

#[tokio::test(start_paused = true)]
async fn exhausted_renewal_fails_every_request_and_purges_credentials() {
	let store = MemoryStore::seeded([("refreshToken", "r1")]);
	let transport = ScriptedTransport::always(Reply::failure(500)).with_delay(RENEWAL_LATENCY);
	let interceptor = interceptor(&store, &transport, |b| b);
	let mut requests = JoinSet::new();

	for _ in 0..3 {
		let interceptor = interceptor.clone();

		requests.spawn(async move { interceptor.intercept(api_request("/items")).await });
	}

	while let Some(joined) = requests.join_next().await {
		let err = joined
			.expect("Request task should not panic.")
			.expect_err("Every request should fail with the renewal error.");

		assert!(matches!(err, Error::Transport(TransportError::Status { status: 500 })));
	}

	assert_eq!(transport.calls(), 1);
	assert_eq!(stored(&store, "accessToken"), None);
	assert_eq!(stored(&store, "refreshToken"), None);
	assert!(!interceptor.coordinator().is_refreshing());
	assert_eq!(interceptor.coordinator().queue_len(), 0);
}

#[tokio::test(start_paused = true)]
async fn follower_timeout_leaves_the_cycle_running() {
	let store = MemoryStore::seeded([("refreshToken", "r1")]);
	let transport = ScriptedTransport::always(Reply::access("a1")).with_delay(RENEWAL_LATENCY);
	let interceptor =
		interceptor(&store, &transport, |b| b.timeout_request(Duration::from_millis(500)));
	let leader = tokio::spawn({
		let interceptor = interceptor.clone();

		async move { interceptor.intercept(api_request("/leader")).await }
	});

	time::sleep(Duration::from_millis(10)).await;

	let follower = tokio::spawn({
		let interceptor = interceptor.clone();

		async move { interceptor.intercept(api_request("/follower")).await }
	});
	let err = follower
		.await
		.expect("Follower task should not panic.")
		.expect_err("Follower should give up before the renewal lands.");

	assert!(matches!(
		err,
		Error::RefreshTimeout { waited } if waited == Duration::from_millis(500)
	));
	assert!(interceptor.coordinator().is_refreshing());

	let request = leader
		.await
		.expect("Leader task should not panic.")
		.expect("Leader should finish its renewal.");

	assert_eq!(request.bearer_token(), Some("a1"));
	assert_eq!(interceptor.coordinator().metrics().timeouts(), 1);

	let later = interceptor
		.intercept(api_request("/later"))
		.await
		.expect("Later request should attach.");

	assert_eq!(later.bearer_token(), Some("a1"));
	assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn stored_access_tokens_never_trigger_renewal() {
	let store = MemoryStore::seeded([("accessToken", "a0"), ("refreshToken", "r1")]);
	let transport = ScriptedTransport::always(Reply::access("a1"));
	let interceptor = interceptor(&store, &transport, |b| b);

	for _ in 0..5 {
		let request = interceptor
			.intercept(api_request("/items"))
			.await
			.expect("Attach should succeed.");

		assert_eq!(request.bearer_token(), Some("a0"));
	}

	assert_eq!(transport.calls(), 0);
	assert_eq!(store.len(), 2);
	assert_eq!(stored(&store, "accessToken").as_deref(), Some("a0"));
	assert_eq!(stored(&store, "refreshToken").as_deref(), Some("r1"));
}

#[tokio::test]
async fn refresh_token_is_exchanged_for_an_access_token() {
	let store = MemoryStore::seeded([("refreshToken", "r1")]);
	let transport = ScriptedTransport::always(Reply::access("a1"));
	let interceptor = interceptor(&store, &transport, |b| b.max_refresh_attempts(1));
	let request = interceptor
		.intercept(api_request("/items"))
		.await
		.expect("Renewal should succeed.");

	assert_eq!(transport.authorizations(), [Some("Bearer r1".to_owned())]);
	assert_eq!(stored(&store, "accessToken").as_deref(), Some("a1"));
	assert_eq!(request.bearer_token(), Some("a1"));
}

#[tokio::test]
async fn unreachable_endpoint_fails_once_and_clears_the_store() {
	let store = MemoryStore::seeded([("refreshToken", "r1")]);
	let transport = ScriptedTransport::always(Reply::NetworkDown);
	let errors = Arc::new(AtomicUsize::new(0));
	let interceptor = interceptor(&store, &transport, |b| {
		let errors = errors.clone();

		b.max_refresh_attempts(1).on_refresh_error(move |err| {
			assert!(matches!(err, Error::Transport(TransportError::Network { .. })));

			errors.fetch_add(1, Ordering::SeqCst);
		})
	});
	let err = interceptor
		.intercept(api_request("/items"))
		.await
		.expect_err("Unreachable endpoint should fail the request.");

	assert!(matches!(err, Error::Transport(TransportError::Network { .. })));
	assert_eq!(transport.calls(), 1);
	assert_eq!(errors.load(Ordering::SeqCst), 1);
	assert!(store.is_empty());
}

#[tokio::test(start_paused = true)]
async fn followers_arriving_mid_renewal_receive_the_new_token() {
	let store = MemoryStore::seeded([("refreshToken", "r1")]);
	let transport = ScriptedTransport::always(Reply::access("a1")).with_delay(RENEWAL_LATENCY);
	let interceptor = interceptor(&store, &transport, |b| b);
	let mut requests = JoinSet::new();

	requests.spawn({
		let interceptor = interceptor.clone();

		async move { interceptor.intercept(api_request("/leader")).await }
	});
	time::sleep(Duration::from_millis(400)).await;

	for path in ["/first", "/second"] {
		let interceptor = interceptor.clone();

		requests.spawn(async move { interceptor.intercept(api_request(path)).await });
	}

	time::sleep(Duration::from_millis(10)).await;

	assert_eq!(interceptor.coordinator().queue_len(), 2);

	while let Some(joined) = requests.join_next().await {
		let request =
			joined.expect("Request task should not panic.").expect("Request should succeed.");

		assert_eq!(request.bearer_token(), Some("a1"));
	}

	assert_eq!(transport.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn failed_attempts_are_retried_after_the_configured_delay() {
	let store = MemoryStore::seeded([("refreshToken", "r1")]);
	let transport = ScriptedTransport::sequence(
		[Reply::failure(503), Reply::NetworkDown],
		Reply::access("a1"),
	);
	let interceptor = interceptor(&store, &transport, |b| {
		b.max_refresh_attempts(3).refresh_retry_delay(Duration::from_millis(250))
	});
	let started = time::Instant::now();
	let request = interceptor
		.intercept(api_request("/items"))
		.await
		.expect("Third attempt should succeed.");

	assert_eq!(request.bearer_token(), Some("a1"));
	assert_eq!(transport.calls(), 3);
	assert!(started.elapsed() >= Duration::from_millis(500));
	assert_eq!(interceptor.coordinator().refresh_attempts(), 0);
	assert_eq!(interceptor.coordinator().metrics().attempts(), 3);
	assert_eq!(stored(&store, "refreshToken").as_deref(), Some("r1"));
}

#[tokio::test]
async fn missing_credentials_notify_without_renewal() {
	let store = MemoryStore::default();
	let transport = ScriptedTransport::always(Reply::access("a1"));
	let missing = Arc::new(AtomicUsize::new(0));
	let interceptor = interceptor(&store, &transport, |b| {
		let missing = missing.clone();

		b.on_missing_tokens(move || {
			missing.fetch_add(1, Ordering::SeqCst);
		})
	});
	let request = interceptor
		.intercept(api_request("/items"))
		.await
		.expect("Request should pass through.");

	assert_eq!(request.bearer_token(), None);
	assert_eq!(missing.load(Ordering::SeqCst), 1);
	assert_eq!(transport.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn bypassed_requests_do_not_wait_for_an_in_flight_renewal() {
	let store = MemoryStore::seeded([("refreshToken", "r1")]);
	let transport = ScriptedTransport::always(Reply::access("a1")).with_delay(RENEWAL_LATENCY);
	let interceptor = interceptor(&store, &transport, |b| {
		b.should_intercept_request(|request: &TestRequest| request.uri().path() != "/health")
	});
	let leader = tokio::spawn({
		let interceptor = interceptor.clone();

		async move { interceptor.intercept(api_request("/items")).await }
	});

	time::sleep(Duration::from_millis(10)).await;

	let started = time::Instant::now();
	let health = interceptor
		.intercept(api_request("/health"))
		.await
		.expect("Bypass should not fail.");

	assert_eq!(started.elapsed(), Duration::ZERO);
	assert_eq!(health.bearer_token(), None);
	assert_eq!(interceptor.coordinator().queue_len(), 0);

	leader.await.expect("Leader task should not panic.").expect("Leader should succeed.");
}

#[tokio::test]
async fn rotated_refresh_tokens_are_used_for_the_next_renewal() {
	let store = MemoryStore::seeded([("refreshToken", "r1")]);
	let transport =
		ScriptedTransport::sequence([Reply::rotated("a1", "r2")], Reply::rotated("a2", "r3"));
	let interceptor =
		interceptor(&store, &transport, |b| b.get_refresh_token(json_field("refreshToken")));

	interceptor.intercept(api_request("/items")).await.expect("First renewal should succeed.");

	assert_eq!(stored(&store, "accessToken").as_deref(), Some("a1"));
	assert_eq!(stored(&store, "refreshToken").as_deref(), Some("r2"));

	store
		.remove("accessToken", &CredentialAttributes::default())
		.expect("Memory store removals should succeed.");

	let request = interceptor
		.intercept(api_request("/items"))
		.await
		.expect("Second renewal should succeed.");

	assert_eq!(request.bearer_token(), Some("a2"));
	assert_eq!(
		transport.authorizations(),
		[Some("Bearer r1".to_owned()), Some("Bearer r2".to_owned())]
	);
}

#[tokio::test(start_paused = true)]
async fn followers_fail_when_the_store_loses_the_renewed_token() {
	let store = MemoryStore::seeded([("refreshToken", "r1")]);
	let transport = ScriptedTransport::always(Reply::access("a1")).with_delay(RENEWAL_LATENCY);
	let interceptor = interceptor(&store, &transport, |b| {
		let store = store.clone();

		b.on_refresh_success(move |_, _| {
			store
				.remove("accessToken", &CredentialAttributes::default())
				.expect("Memory store removals should succeed.");
		})
	});
	let leader = tokio::spawn({
		let interceptor = interceptor.clone();

		async move { interceptor.intercept(api_request("/leader")).await }
	});

	time::sleep(Duration::from_millis(10)).await;

	let err = interceptor
		.intercept(api_request("/follower"))
		.await
		.expect_err("Follower should not find the renewed token.");

	assert!(matches!(err, Error::PostRefreshTokenMissing));

	let request =
		leader.await.expect("Leader task should not panic.").expect("Leader should succeed.");

	assert_eq!(request.bearer_token(), Some("a1"));
}

#[tokio::test(start_paused = true)]
async fn cancelled_leader_releases_followers() {
	let store = MemoryStore::seeded([("refreshToken", "r1")]);
	let transport = ScriptedTransport::always(Reply::access("a1")).with_delay(RENEWAL_LATENCY);
	let interceptor = interceptor(&store, &transport, |b| b);
	let leader = tokio::spawn({
		let interceptor = interceptor.clone();

		async move { interceptor.intercept(api_request("/leader")).await }
	});

	time::sleep(Duration::from_millis(10)).await;

	let follower = tokio::spawn({
		let interceptor = interceptor.clone();

		async move { interceptor.intercept(api_request("/follower")).await }
	});

	time::sleep(Duration::from_millis(10)).await;
	leader.abort();

	let err = follower
		.await
		.expect("Follower task should not panic.")
		.expect_err("Follower should be released with an error.");

	assert!(matches!(err, Error::RefreshAbandoned));
	assert!(!interceptor.coordinator().is_refreshing());

	let request = interceptor
		.intercept(api_request("/retry"))
		.await
		.expect("Next cycle should succeed.");

	assert_eq!(request.bearer_token(), Some("a1"));
	assert_eq!(transport.calls(), 2);
}
