//! Single-flight renewal coordinator with a follower queue and a sequential retry policy.
//!
//! A [`Coordinator`] is constructed once per middleware instance. Requests that find no access
//! token call [`Coordinator::begin_if_idle`]; the first one receives a [`RefreshPermit`] and
//! drives the renewal, every later one receives a [`Subscriber`] and waits for the outcome.
//! Claiming the slot and joining the queue happen inside one critical section, so a follower
//! can never be appended after the queue it belongs to was drained.
//!
//! The permit is the scoped release of the in-flight flag: [`RefreshPermit::complete`] settles
//! the queue and resets the coordinator, and dropping an unsettled permit does the same with
//! [`Error::RefreshAbandoned`].

mod metrics;
mod queue;

pub use metrics::RefreshMetrics;
pub use queue::{Subscriber, SubscriberQueue};

// crates.io
use tokio::time;
// self
use crate::{
	_prelude::*,
	config::{CoordinatorConfig, RefreshSettings},
	error::TransportError,
	obs::{self, CycleOutcome, CycleSpan, log_event},
	store, transport,
};

/// Result of [`Coordinator::begin_if_idle`].
#[derive(Debug)]
pub enum Admission<'a> {
	/// No renewal was in flight; the caller now owns the cycle.
	Leader(RefreshPermit<'a>),
	/// A renewal is already in flight; the caller was queued behind it.
	Follower(Subscriber),
}

#[derive(Debug, Default)]
struct CoordinatorState {
	refreshing: bool,
	attempts: u32,
	queue: SubscriberQueue,
}

/// Owns the in-flight flag, the follower queue, and the retry policy for the renewal call.
#[derive(Debug)]
pub struct Coordinator {
	config: CoordinatorConfig,
	state: Mutex<CoordinatorState>,
	metrics: RefreshMetrics,
}
impl Coordinator {
	/// Creates an idle coordinator.
	pub fn new(config: CoordinatorConfig) -> Self {
		Self {
			config,
			state: Mutex::new(CoordinatorState::default()),
			metrics: RefreshMetrics::default(),
		}
	}

	/// Validated configuration this coordinator runs with.
	pub fn config(&self) -> &CoordinatorConfig {
		&self.config
	}

	/// Normalized settings this coordinator runs with.
	pub fn settings(&self) -> &RefreshSettings {
		&self.config.settings
	}

	/// In-process counters for renewal cycles and followers.
	pub fn metrics(&self) -> &RefreshMetrics {
		&self.metrics
	}

	/// Returns `true` while a renewal cycle is in flight.
	pub fn is_refreshing(&self) -> bool {
		self.state.lock().refreshing
	}

	/// Number of followers waiting on the current cycle.
	pub fn queue_len(&self) -> usize {
		self.state.lock().queue.len()
	}

	/// Failed attempts recorded by the current cycle.
	pub fn refresh_attempts(&self) -> u32 {
		self.state.lock().attempts
	}

	/// Reads the stored access token; empty values read as absent.
	pub fn access_token(&self) -> Result<Option<TokenSecret>> {
		Ok(store::read_token(self.config.store.as_ref(), &self.config.settings.access_token_key)?)
	}

	/// Reads the stored refresh token; empty values read as absent.
	pub fn refresh_token(&self) -> Result<Option<TokenSecret>> {
		Ok(store::read_token(self.config.store.as_ref(), &self.config.settings.refresh_token_key)?)
	}

	/// Invokes the missing-tokens notification.
	pub fn notify_missing_tokens(&self) {
		log_event!(debug, "no credentials are stored");

		self.config.hooks.notify_missing_tokens();
	}

	/// Claims the renewal slot, or joins the queue behind the cycle that holds it.
	///
	/// The follower's wait bound starts now.
	pub fn begin_if_idle(&self) -> Admission<'_> {
		let mut state = self.state.lock();

		if state.refreshing {
			let subscriber = state.queue.append(self.config.settings.timeout_request);

			return Admission::Follower(subscriber);
		}

		state.refreshing = true;

		Admission::Leader(RefreshPermit { coordinator: self, settled: false })
	}

	async fn refresh_cycle(&self) -> Result<TokenSecret> {
		let max_attempts = self.config.settings.max_refresh_attempts.max(1);
		let retry_delay = self.config.settings.refresh_retry_delay;

		loop {
			self.metrics.record_attempt();
			obs::record_cycle_outcome(CycleOutcome::Attempt);

			let error = match self.renew_once().await {
				Ok(token) => {
					self.state.lock().attempts = 0;
					self.metrics.record_success();
					obs::record_cycle_outcome(CycleOutcome::Success);

					return Ok(token);
				},
				Err(e) => e,
			};
			let attempts = {
				let mut state = self.state.lock();

				state.attempts += 1;

				state.attempts
			};

			if attempts < max_attempts {
				log_event!(
					debug,
					attempts,
					max_attempts,
					%error,
					"renewal attempt failed, retrying"
				);
				obs::record_cycle_outcome(CycleOutcome::Retry);
				time::sleep(retry_delay).await;

				continue;
			}

			log_event!(warn, attempts, %error, "renewal failed, purging stored credentials");

			self.purge();
			self.config.hooks.notify_refresh_error(&error);
			self.metrics.record_failure();
			obs::record_cycle_outcome(CycleOutcome::Failure);

			return Err(error);
		}
	}

	async fn renew_once(&self) -> Result<TokenSecret> {
		let CoordinatorConfig {
			settings,
			refresh_url,
			store: credentials,
			transport: renewal,
			hooks,
		} = &self.config;
		let Some(refresh_token) =
			store::read_token(credentials.as_ref(), &settings.refresh_token_key)?
		else {
			self.notify_missing_tokens();

			return Err(Error::MissingRefreshToken);
		};
		let request = (hooks.transform_refresh_request)(transport::renewal_request(
			refresh_url,
			&refresh_token,
		)?);
		let response = renewal.execute(request).await?;

		if !response.status().is_success() {
			return Err(TransportError::Status { status: response.status().as_u16() }.into());
		}

		let access_token = (hooks.get_access_token)(&response)?
			.and_then(TokenSecret::non_empty)
			.ok_or(Error::MissingAccessTokenInResponse)?;

		credentials.set(
			&settings.access_token_key,
			&access_token,
			&settings.access_token_cookie_options,
		)?;

		if let Some(extract) = &hooks.get_refresh_token {
			if let Some(rotated) = extract(&response)?.and_then(TokenSecret::non_empty) {
				credentials.set(
					&settings.refresh_token_key,
					&rotated,
					&settings.refresh_token_cookie_options,
				)?;
			}
		}

		hooks.notify_refresh_success(&response, &access_token);

		Ok(access_token)
	}

	fn purge(&self) {
		let settings = &self.config.settings;
		let credentials = [
			(&settings.access_token_key, &settings.access_token_cookie_options),
			(&settings.refresh_token_key, &settings.refresh_token_cookie_options),
		];

		for (key, attributes) in credentials {
			if let Err(_error) = self.config.store.remove(key, attributes) {
				log_event!(
					warn,
					key = key.as_str(),
					error = %_error,
					"failed to remove credential"
				);
			}
		}
	}
}

/// Exclusive right to run the current renewal cycle.
///
/// Only the holder of a permit may issue renewal calls. The permit must be settled exactly
/// once; dropping it unsettled releases every follower with [`Error::RefreshAbandoned`].
#[derive(Debug)]
pub struct RefreshPermit<'a> {
	coordinator: &'a Coordinator,
	settled: bool,
}
impl RefreshPermit<'_> {
	/// Performs one renewal cycle, retrying failed attempts up to the configured maximum.
	///
	/// On terminal failure both credentials are removed from the store, the error
	/// notification runs, and the last attempt's error is returned.
	pub async fn refresh(&self) -> Result<TokenSecret> {
		CycleSpan::new("refresh").instrument(self.coordinator.refresh_cycle()).await
	}

	/// Settles every follower with `outcome`, then marks the coordinator idle.
	///
	/// Returns the number of followers that were still waiting.
	pub fn complete(mut self, outcome: &Result<TokenSecret>) -> usize {
		self.settle(outcome.as_ref().map(|_| ()).map_err(Clone::clone))
	}

	/// Runs a full leader cycle and settles the permit with its outcome.
	///
	/// An access token stored after the caller last looked (by a cycle that finished in
	/// between) is reused instead of issuing another renewal call.
	pub async fn run(self) -> Result<TokenSecret> {
		let outcome = match self.coordinator.access_token() {
			Ok(Some(token)) => {
				log_event!(debug, "access token already renewed, skipping renewal call");

				Ok(token)
			},
			Ok(None) => self.refresh().await,
			Err(_error) => {
				log_event!(debug, error = %_error, "access token re-check failed, renewing anyway");

				self.refresh().await
			},
		};

		self.complete(&outcome);

		outcome
	}

	fn settle(&mut self, outcome: Result<()>) -> usize {
		if self.settled {
			return 0;
		}

		self.settled = true;

		let mut state = self.coordinator.state.lock();
		let delivered = state.queue.drain_all(&outcome);

		state.refreshing = false;
		state.attempts = 0;

		delivered
	}
}
impl Drop for RefreshPermit<'_> {
	fn drop(&mut self) {
		if self.settled {
			return;
		}

		log_event!(warn, "renewal leader dropped before completing the cycle");
		obs::record_cycle_outcome(CycleOutcome::Abandoned);

		self.settle(Err(Error::RefreshAbandoned));
	}
}
