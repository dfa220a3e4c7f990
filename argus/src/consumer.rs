use std::future::Future;

use aya::maps::{MapData, RingBuf};
use tokio::io::unix::AsyncFd;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// Anything that yields raw ring-buffer records one at a time, in kernel
/// emission order. `Error::SourceClosed` is the terminal result; everything
/// else is an I/O fault.
pub trait RawSource: Send + 'static {
	fn read(&mut self) -> impl Future<Output = Result<Vec<u8>>> + Send;
}

/// Blocking reader over the shared ring buffer. The stop token is the
/// explicit way to unblock a pending read; a stopped consumer reads
/// `SourceClosed` from then on.
pub struct RingBufConsumer {
	ring: AsyncFd<RingBuf<MapData>>,
	stop: CancellationToken,
}

impl RingBufConsumer {
	pub fn new(ring: AsyncFd<RingBuf<MapData>>, stop: CancellationToken) -> Self {
		Self { ring, stop }
	}
}

impl RawSource for RingBufConsumer {
	async fn read(&mut self) -> Result<Vec<u8>> {
		loop {
			let mut guard = tokio::select! {
				_ = self.stop.cancelled() => return Err(Error::SourceClosed),
				guard = self.ring.readable_mut() => guard?,
			};

			if let Some(record) = guard.get_inner_mut().next() {
				return Ok(record.to_vec());
			}
			guard.clear_ready();
		}
	}
}
