use std::{net::SocketAddr, path::PathBuf};

use clap::Parser;
use humantime::Duration;

#[derive(Parser, Debug)]
#[command(name = "argus")]
pub struct Cli {
	#[arg(long, help = "Path to the compiled tracepoint object. Defaults to ../bpf/tracepoints.o next to the executable")]
	pub obj: Option<PathBuf>,

	#[arg(long, default_value = "0.0.0.0:50051")]
	pub listen: SocketAddr,

	#[arg(long, default_value_t = 256, help = "Per-subscriber event queue depth")]
	pub queue_depth: usize,

	#[arg(long, default_value = "5s", help = "How long to wait for in-flight streams on shutdown (e.g., 5s, 1m)")]
	pub drain_timeout: Duration,
}
