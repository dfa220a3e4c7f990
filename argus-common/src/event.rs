use zerocopy_derive::{FromBytes, Immutable, IntoBytes, KnownLayout};

pub const SYSCALL_OPENAT: u32 = 1;
pub const SYSCALL_WRITE: u32 = 2;
pub const SYSCALL_RENAME: u32 = 3;

/// One record as submitted by the tracepoint programs, byte for byte.
///
/// `_pad` spells out the C compiler's padding between `syscall_id` and
/// `ret_val`, so the struct carries no implicit padding and `IntoBytes`
/// can be derived.
#[repr(C)]
#[derive(Clone, Copy, Debug, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct RawEvent {
	pub ts: u64,
	pub pid: u32,
	pub tid: u32,
	pub comm: [u8; 16],
	pub syscall_id: u32, // 1 => openat, 2 => write, 3 => rename
	pub _pad: [u8; 4],
	pub ret_val: i64,
	pub bytes: u64, // write only
	pub path: [u8; 256],
	pub new_path: [u8; 256], // rename only
}

pub const RAW_EVENT_SIZE: usize = core::mem::size_of::<RawEvent>();

#[cfg(test)]
mod tests {
	use zerocopy::{FromBytes, FromZeros, IntoBytes};

	use super::*;

	#[test]
	fn layout_is_stable() {
		assert_eq!(RAW_EVENT_SIZE, 568);
		assert_eq!(core::mem::align_of::<RawEvent>(), 8);
	}

	#[test]
	fn survives_a_byte_round_trip() {
		let mut evt = RawEvent::new_zeroed();
		evt.ts = 42;
		evt.pid = 7;
		evt.tid = 8;
		evt.syscall_id = SYSCALL_RENAME;
		evt.ret_val = -13;
		evt.path[0] = b'/';

		let back = RawEvent::read_from_bytes(evt.as_bytes()).unwrap();
		assert_eq!(back.ts, 42);
		assert_eq!(back.pid, 7);
		assert_eq!(back.tid, 8);
		assert_eq!(back.syscall_id, SYSCALL_RENAME);
		assert_eq!(back.ret_val, -13);
		assert_eq!(back.path[0], b'/');
	}
}
