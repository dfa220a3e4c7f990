use std::path::Path;

use aya::{
	maps::{MapData, RingBuf},
	programs::{trace_point::TracePointLink, TracePoint},
	Ebpf,
};
use tokio::io::unix::AsyncFd;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Tracepoint programs the artifact may carry. Entries absent from the
/// artifact are skipped so partial builds still load.
const TRACEPOINTS: &[(&str, &str)] = &[
	("trace_openat", "sys_enter_openat"),
	("trace_write", "sys_enter_write"),
	("trace_rename", "sys_enter_rename"),
];

const TRACEPOINT_CATEGORY: &str = "syscalls";
const RING_MAP_NAME: &str = "events";

/// One attached program and its live kernel link. Dropping the binding
/// detaches the tracepoint; the handle is released exactly once.
pub struct TracepointBinding {
	pub program: &'static str,
	pub category: &'static str,
	pub tracepoint: &'static str,
	_link: TracePointLink,
}

pub struct LoadedArtifact {
	pub ebpf: Ebpf,
	pub ring: AsyncFd<RingBuf<MapData>>,
	pub bindings: Vec<TracepointBinding>,
}

/// Loads the compiled tracepoint object from `obj_path`, attaches whichever
/// of the known programs it contains, and takes ownership of the shared ring
/// buffer map. Attach failure aborts the load; links already acquired are
/// detached on drop.
pub fn load_tracepoints(obj_path: &Path) -> Result<LoadedArtifact> {
	let mut ebpf = Ebpf::load_file(obj_path)?;

	let mut bindings = Vec::new();
	for &(prog_name, tp_name) in TRACEPOINTS {
		let Some(prog) = ebpf.program_mut(prog_name) else {
			debug!("program {prog_name} not present in artifact, skipping");
			continue;
		};
		let tp: &mut TracePoint = prog.try_into()?;
		tp.load()?;
		let link_id = tp.attach(TRACEPOINT_CATEGORY, tp_name)?;
		let link = tp.take_link(link_id)?;

		let binding = TracepointBinding {
			program: prog_name,
			category: TRACEPOINT_CATEGORY,
			tracepoint: tp_name,
			_link: link,
		};
		info!("attached {}:{} via {}", binding.category, binding.tracepoint, binding.program);
		bindings.push(binding);
	}

	let ring_map = ebpf.take_map(RING_MAP_NAME).ok_or(Error::RingMapNotFound)?;
	let ring = AsyncFd::new(RingBuf::try_from(ring_map)?)?;

	Ok(LoadedArtifact { ebpf, ring, bindings })
}
