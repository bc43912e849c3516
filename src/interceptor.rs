//! Per-request decision logic: bypass, attach, lead a renewal, or wait for one.

// self
use crate::{
	_prelude::*,
	config::{RefreshConfig, RequestHooks},
	obs::{self, CycleSpan, RequestPath, log_event},
	refresh::{Admission, Coordinator, Subscriber},
	request::{self, BearerRequest},
};

/// Attaches bearer credentials to requests of type `R`, renewing them single-flight when absent.
///
/// Clones share the same [`Coordinator`], so every clone takes part in the same renewal cycles.
pub struct RefreshInterceptor<R> {
	coordinator: Arc<Coordinator>,
	hooks: RequestHooks<R>,
}
impl<R> RefreshInterceptor<R>
where
	R: 'static + BearerRequest,
{
	/// Builds an interceptor around a fresh coordinator.
	pub fn new(config: RefreshConfig<R>) -> Self {
		let RefreshConfig { coordinator, request } = config;

		Self { coordinator: Arc::new(Coordinator::new(coordinator)), hooks: request }
	}

	/// Shared coordinator driving this interceptor's renewal cycles.
	pub fn coordinator(&self) -> &Arc<Coordinator> {
		&self.coordinator
	}

	/// Prepares `request` for sending.
	///
	/// 1. Requests rejected by the bypass predicate pass through unchanged.
	/// 2. A stored access token is attached as `Authorization: Bearer <token>`.
	/// 3. Without any stored credential the missing-tokens notification runs and the request
	///    passes through unchanged.
	/// 4. Otherwise the request leads a renewal cycle, or waits for the one in flight, and is
	///    shaped by the retry transform with the renewed access token.
	pub async fn intercept(&self, request: R) -> Result<R> {
		if !(self.hooks.should_intercept_request)(&request) {
			obs::record_request_path(RequestPath::Bypass);

			return Ok(request);
		}
		if let Some(access_token) = self.coordinator.access_token()? {
			obs::record_request_path(RequestPath::Attached);

			return request::attach_bearer(request, &access_token);
		}
		if self.coordinator.refresh_token()?.is_none() {
			obs::record_request_path(RequestPath::Missing);
			self.coordinator.notify_missing_tokens();

			return Ok(request);
		}

		let access_token = match self.coordinator.begin_if_idle() {
			Admission::Leader(permit) => {
				obs::record_request_path(RequestPath::Leader);

				CycleSpan::new("leader").instrument(permit.run()).await?
			},
			Admission::Follower(subscriber) => self.follow(subscriber).await?,
		};

		(self.hooks.transform_retry_request)(request, &access_token)
	}

	/// Forces a renewal call, or joins the one already in flight, and returns the new token.
	pub async fn refresh_now(&self) -> Result<TokenSecret> {
		match self.coordinator.begin_if_idle() {
			Admission::Leader(permit) => {
				let outcome = permit.refresh().await;

				permit.complete(&outcome);

				outcome
			},
			Admission::Follower(subscriber) => self.follow(subscriber).await,
		}
	}

	async fn follow(&self, subscriber: Subscriber) -> Result<TokenSecret> {
		obs::record_request_path(RequestPath::Follower);
		self.coordinator.metrics().record_queued();

		log_event!(debug, timeout = ?subscriber.timeout(), "renewal in flight, waiting");

		if let Err(e) = subscriber.settled().await {
			if matches!(e, Error::RefreshTimeout { .. }) {
				log_event!(warn, "gave up waiting for the in-flight renewal");

				self.coordinator.metrics().record_timeout();
			}

			return Err(e);
		}

		self.coordinator.access_token()?.ok_or(Error::PostRefreshTokenMissing)
	}
}
impl<R> Clone for RefreshInterceptor<R> {
	fn clone(&self) -> Self {
		Self { coordinator: self.coordinator.clone(), hooks: self.hooks.clone() }
	}
}
impl<R> Debug for RefreshInterceptor<R> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RefreshInterceptor").field("coordinator", &self.coordinator).finish()
	}
}
