use std::sync::{
	atomic::{AtomicBool, AtomicU64, Ordering},
	Arc, Mutex, PoisonError,
};

use flume::{Receiver, Sender, TrySendError};
use tracing::{debug, info, warn};

use crate::{
	consumer::RawSource,
	decode,
	error::{Error, Result},
	proto::Event,
};

/// Fans events from the single kernel reader out to per-subscriber bounded
/// queues. A slow subscriber loses its own newest events (drop-newest);
/// nobody else is affected.
pub struct Broadcaster {
	subscribers: Mutex<Vec<Sender<Event>>>,
	depth: usize,
	dropped: AtomicU64,
	closed: AtomicBool,
}

impl Broadcaster {
	pub fn new(depth: usize) -> Self {
		Self {
			subscribers: Mutex::new(Vec::new()),
			depth,
			dropped: AtomicU64::new(0),
			closed: AtomicBool::new(false),
		}
	}

	/// Hands out a fresh bounded queue. Once the broadcaster is closed the
	/// receiver comes back already disconnected, so a late subscriber
	/// observes the closed source instead of waiting on a queue nothing
	/// feeds.
	pub fn subscribe(&self) -> Receiver<Event> {
		let (tx, rx) = flume::bounded(self.depth);
		// Hold the lock for the closed check so subscribe cannot race a
		// concurrent close into the cleared list.
		let mut subscribers = self.lock_subscribers();
		if !self.closed.load(Ordering::Acquire) {
			subscribers.push(tx);
		}
		rx
	}

	/// Delivers one event to every live subscriber queue. Full queues drop
	/// the event for that subscriber only; disconnected subscribers are
	/// pruned here.
	pub fn publish(&self, event: &Event) {
		let mut subscribers = self.lock_subscribers();
		subscribers.retain(|tx| match tx.try_send(event.clone()) {
			Ok(()) => true,
			Err(TrySendError::Full(_)) => {
				if self.dropped.fetch_add(1, Ordering::Relaxed) == 0 {
					warn!("subscriber queue full, dropping events (drop-newest)");
				}
				true
			}
			Err(TrySendError::Disconnected(_)) => false,
		});
	}

	/// Drops every subscriber queue, which is what ends the streams reading
	/// them. Terminal: later subscribers get disconnected receivers.
	pub fn close(&self) {
		let mut subscribers = self.lock_subscribers();
		self.closed.store(true, Ordering::Release);
		subscribers.clear();
	}

	pub fn subscriber_count(&self) -> usize {
		self.lock_subscribers().len()
	}

	pub fn dropped_count(&self) -> u64 {
		self.dropped.load(Ordering::Relaxed)
	}

	fn lock_subscribers(&self) -> std::sync::MutexGuard<'_, Vec<Sender<Event>>> {
		self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
	}
}

/// Owns the sole read loop over the record source: read, decode, publish.
/// Malformed records are logged and skipped; only a closed source or a read
/// fault ends the loop.
pub struct FanoutWorker<S: RawSource> {
	source: S,
	broadcaster: Arc<Broadcaster>,
}

impl<S: RawSource> FanoutWorker<S> {
	pub fn new(source: S, broadcaster: Arc<Broadcaster>) -> Self {
		Self { source, broadcaster }
	}

	pub async fn run(mut self) -> Result<()> {
		let res = self.pump().await;

		// Close on every exit path so a reader fault cannot leave clients
		// blocked on queues nothing will ever fill again.
		debug!("closing {} subscriber queue(s)", self.broadcaster.subscriber_count());
		self.broadcaster.close();

		let dropped = self.broadcaster.dropped_count();
		if dropped > 0 {
			info!("fan-out dropped {dropped} event(s) to slow subscribers");
		}

		res
	}

	async fn pump(&mut self) -> Result<()> {
		loop {
			let record = match self.source.read().await {
				Ok(record) => record,
				Err(Error::SourceClosed) => return Ok(()),
				Err(err) => {
					warn!("ring buffer read failed: {err}");
					return Err(err);
				}
			};

			match decode::decode_record(&record) {
				Ok(raw) => self.broadcaster.publish(&decode::to_event(&raw)),
				Err(err) => {
					debug!("dropping malformed record ({} bytes): {err}", record.len());
				}
			}
		}
	}
}
