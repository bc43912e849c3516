//! FIFO holding area for requests that arrive while a renewal is in flight.

// crates.io
use tokio::{
	sync::oneshot,
	time::{self, Instant},
};
// self
use crate::_prelude::*;

type Outcome = Result<()>;

/// Ordered collection of waiting followers, drained once per renewal cycle.
#[derive(Debug, Default)]
pub struct SubscriberQueue {
	waiting: Vec<oneshot::Sender<Outcome>>,
}
impl SubscriberQueue {
	/// Appends a follower whose wait bound starts now.
	///
	/// Followers that already gave up are pruned first, so a stalled renewal does not
	/// accumulate their slots.
	pub fn append(&mut self, timeout: Duration) -> Subscriber {
		self.waiting.retain(|sender| !sender.is_closed());

		let (sender, receiver) = oneshot::channel();

		self.waiting.push(sender);

		Subscriber { receiver, deadline: Instant::now().checked_add(timeout), timeout }
	}

	/// Number of followers currently queued.
	pub fn len(&self) -> usize {
		self.waiting.len()
	}

	/// Returns `true` when nobody is waiting.
	pub fn is_empty(&self) -> bool {
		self.waiting.is_empty()
	}

	/// Settles every queued follower with `outcome` in arrival order and empties the queue.
	///
	/// Followers that already gave up are skipped silently. Returns the number of followers
	/// that were still waiting.
	pub fn drain_all(&mut self, outcome: &Outcome) -> usize {
		let mut delivered = 0;

		for sender in self.waiting.drain(..) {
			if sender.send(outcome.clone()).is_ok() {
				delivered += 1;
			}
		}

		delivered
	}
}

/// A follower's handle on the outcome of the in-flight renewal.
#[derive(Debug)]
pub struct Subscriber {
	receiver: oneshot::Receiver<Outcome>,
	deadline: Option<Instant>,
	timeout: Duration,
}
impl Subscriber {
	/// Wait bound this follower was created with.
	pub fn timeout(&self) -> Duration {
		self.timeout
	}

	/// Waits until the queue is drained or the wait bound elapses.
	///
	/// Resolves to [`Error::RefreshTimeout`] when the bound elapses first and to
	/// [`Error::RefreshAbandoned`] when the queue is dropped without being drained.
	pub async fn settled(self) -> Result<()> {
		let Self { receiver, deadline, timeout } = self;
		let received = match deadline {
			Some(deadline) => time::timeout_at(deadline, receiver)
				.await
				.map_err(|_| Error::RefreshTimeout { waited: timeout })?,
			None => receiver.await,
		};

		received.unwrap_or_else(|_| Err(Error::RefreshAbandoned))
	}
}
