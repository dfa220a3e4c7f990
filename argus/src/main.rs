// region:    --- Modules

mod broadcast;
mod cli;
mod consumer;
mod decode;
mod error;
mod loader;
mod server;
mod supervisor;

pub mod proto {
	tonic::include_proto!("argus.v1");
}

// endregion: --- Modules

use crate::{
	broadcast::{Broadcaster, FanoutWorker},
	cli::args::Cli,
	consumer::RingBufConsumer,
	server::TrackerService,
	supervisor::Supervisor,
};

pub use self::error::{Error, Result};
use clap::Parser;
use std::{path::PathBuf, sync::Arc};
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;
use tracing_subscriber::EnvFilter;
#[rustfmt::skip]
use tracing::{debug, info, warn};

const DEFAULT_OBJ_RELATIVE: &str = "../bpf/tracepoints.o";

#[tokio::main]
async fn main() -> Result<()> {
	let args = Cli::parse();
	tracing_subscriber::fmt()
		.with_target(false)
		.with_env_filter(EnvFilter::from_default_env())
		.init();

	// Bump the memlock rlimit. This is needed for older kernels that don't use the
	// new memcg based accounting, see https://lwn.net/Articles/837122/
	let rlim = libc::rlimit {
		rlim_cur: libc::RLIM_INFINITY,
		rlim_max: libc::RLIM_INFINITY,
	};
	let ret = unsafe { libc::setrlimit(libc::RLIMIT_MEMLOCK, &rlim) };
	if ret != 0 {
		debug!("remove limit on locked memory failed, ret is: {ret}");
	}

	let obj_path = match args.obj {
		Some(path) => path,
		None => default_obj_path()?,
	};
	info!("loading tracepoint artifact from {}", obj_path.display());
	let loader::LoadedArtifact { ebpf, ring, bindings } = loader::load_tracepoints(&obj_path)?;

	let broadcaster = Arc::new(Broadcaster::new(args.queue_depth));
	let mut supervisor = Supervisor::new();

	let consumer = RingBufConsumer::new(ring, supervisor.token());
	let fanout = FanoutWorker::new(consumer, broadcaster.clone());
	supervisor.spawn(fanout.run());

	// Bind before serving so a taken port fails startup, not the serve task.
	let listener = TcpListener::bind(args.listen).await?;
	info!("tracker listening on {}", args.listen);

	let service = TrackerService::new(broadcaster);
	let shutdown = supervisor.token();
	supervisor.spawn(async move {
		Server::builder()
			.add_service(service.into_server())
			.serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown.cancelled_owned())
			.await?;
		Ok(())
	});

	tokio::signal::ctrl_c().await?;
	info!("interrupt received, shutting down");

	match tokio::time::timeout(args.drain_timeout.into(), supervisor.shutdown()).await {
		Ok(res) => res?,
		Err(_) => warn!("drain timed out, abandoning in-flight streams"),
	}

	// The ring buffer went down with the consumer; now detach the tracepoints.
	info!("detaching {} tracepoint(s)", bindings.len());
	drop(bindings);
	drop(ebpf);

	Ok(())
}

fn default_obj_path() -> Result<PathBuf> {
	let exe = std::env::current_exe()?;
	let dir = exe
		.parent()
		.ok_or_else(|| Error::custom("executable path has no parent directory"))?;
	Ok(dir.join(DEFAULT_OBJ_RELATIVE))
}
