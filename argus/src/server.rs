use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status};

use crate::{
	broadcast::Broadcaster,
	proto::{
		tracker_server::{Tracker, TrackerServer},
		Empty, EventBatch,
	},
};

/// The subscription endpoint. Holds the broadcaster it was constructed
/// with; no ambient state.
pub struct TrackerService {
	broadcaster: Arc<Broadcaster>,
}

impl TrackerService {
	pub fn new(broadcaster: Arc<Broadcaster>) -> Self {
		Self { broadcaster }
	}

	pub fn into_server(self) -> TrackerServer<Self> {
		TrackerServer::new(self)
	}
}

#[tonic::async_trait]
impl Tracker for TrackerService {
	type StreamEventsStream = ReceiverStream<Result<EventBatch, Status>>;

	async fn stream_events(&self, _request: Request<Empty>) -> Result<Response<Self::StreamEventsStream>, Status> {
		let subscription = self.broadcaster.subscribe();
		let (tx, rx) = mpsc::channel(1);

		tokio::spawn(async move {
			loop {
				match subscription.recv_async().await {
					Ok(event) => {
						let batch = EventBatch { events: vec![event] };
						// A refused send means this client went away; only
						// this call ends.
						if tx.send(Ok(batch)).await.is_err() {
							break;
						}
					}
					Err(_) => {
						let _ = tx.send(Err(Status::unavailable("event source closed"))).await;
						break;
					}
				}
			}
		});

		Ok(Response::new(ReceiverStream::new(rx)))
	}
}

#[cfg(test)]
mod tests {
	use tokio_stream::StreamExt;

	use super::*;
	use crate::proto::Event;

	#[tokio::test]
	async fn streams_single_event_batches_then_unavailable() {
		let broadcaster = Arc::new(Broadcaster::new(8));
		let service = TrackerService::new(broadcaster.clone());

		let response = service.stream_events(Request::new(Empty {})).await.unwrap();
		let mut stream = response.into_inner();

		broadcaster.publish(&Event {
			bytes: 1,
			..Default::default()
		});
		broadcaster.publish(&Event {
			bytes: 2,
			..Default::default()
		});

		let first = stream.next().await.unwrap().unwrap();
		assert_eq!(first.events.len(), 1);
		assert_eq!(first.events[0].bytes, 1);

		let second = stream.next().await.unwrap().unwrap();
		assert_eq!(second.events.len(), 1);
		assert_eq!(second.events[0].bytes, 2);

		broadcaster.close();
		let status = stream.next().await.unwrap().unwrap_err();
		assert_eq!(status.code(), tonic::Code::Unavailable);
		assert!(stream.next().await.is_none());
	}

	#[tokio::test]
	async fn call_after_source_close_terminates_immediately() {
		let broadcaster = Arc::new(Broadcaster::new(8));
		broadcaster.close();
		let service = TrackerService::new(broadcaster);

		let mut stream = service.stream_events(Request::new(Empty {})).await.unwrap().into_inner();
		let status = stream.next().await.unwrap().unwrap_err();
		assert_eq!(status.code(), tonic::Code::Unavailable);
		assert!(stream.next().await.is_none());
	}

	#[tokio::test]
	async fn client_disconnect_ends_only_its_call() {
		let broadcaster = Arc::new(Broadcaster::new(8));
		let service = TrackerService::new(broadcaster.clone());

		let gone = service.stream_events(Request::new(Empty {})).await.unwrap().into_inner();
		let mut kept = service.stream_events(Request::new(Empty {})).await.unwrap().into_inner();
		drop(gone);

		broadcaster.publish(&Event {
			bytes: 9,
			..Default::default()
		});
		let batch = kept.next().await.unwrap().unwrap();
		assert_eq!(batch.events[0].bytes, 9);
	}
}
