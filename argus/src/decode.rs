use std::time::SystemTime;

use argus_common::{RawEvent, SYSCALL_OPENAT, SYSCALL_RENAME, SYSCALL_WRITE};
use zerocopy::FromBytes;

use crate::{
	error::{Error, Result},
	proto::Event,
};

/// Interprets one ring-buffer record as the fixed kernel layout. Anything
/// that is not exactly one `RawEvent` is rejected whole, never partially
/// decoded.
pub fn decode_record(data: &[u8]) -> Result<RawEvent> {
	RawEvent::read_from_bytes(data).map_err(|_| Error::InvalidEventSize)
}

/// NUL-terminated fixed buffer to display text. Truncates at the first NUL
/// and substitutes invalid UTF-8 with U+FFFD. Never fails.
pub fn sanitize(buf: &[u8]) -> String {
	let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
	String::from_utf8_lossy(&buf[..end]).into_owned()
}

pub fn syscall_name(id: u32) -> &'static str {
	match id {
		SYSCALL_OPENAT => "openat",
		SYSCALL_WRITE => "write",
		SYSCALL_RENAME => "rename",
		_ => "unknown",
	}
}

/// Builds the outgoing event, stamped with the receipt wall-clock time.
// TODO: raw.ts carries the kernel-side ktime of the syscall; surface it once
// consumers agree on which clock they want.
pub fn to_event(raw: &RawEvent) -> Event {
	Event {
		ts: Some(prost_types::Timestamp::from(SystemTime::now())),
		pid: raw.pid,
		tid: raw.tid,
		comm: sanitize(&raw.comm),
		syscall: syscall_name(raw.syscall_id).to_string(),
		path: sanitize(&raw.path),
		new_path: sanitize(&raw.new_path),
		ret_val: raw.ret_val,
		bytes: raw.bytes,
	}
}

#[cfg(test)]
mod tests {
	use argus_common::RAW_EVENT_SIZE;
	use zerocopy::IntoBytes;

	use super::*;

	fn sample_raw(syscall_id: u32, bytes: u64) -> RawEvent {
		let mut comm = [0u8; 16];
		comm[..4].copy_from_slice(b"bash");
		let mut path = [0u8; 256];
		path[..8].copy_from_slice(b"/tmp/out");
		RawEvent {
			ts: 123_456_789,
			pid: 4242,
			tid: 4243,
			comm,
			syscall_id,
			_pad: [0; 4],
			ret_val: -2,
			bytes,
			path,
			new_path: [0; 256],
		}
	}

	#[test]
	fn decodes_exact_record() {
		let raw = sample_raw(SYSCALL_WRITE, 77);
		let data = raw.as_bytes();
		assert_eq!(data.len(), RAW_EVENT_SIZE);

		let decoded = decode_record(data).unwrap();
		assert_eq!(decoded.ts, 123_456_789);
		assert_eq!(decoded.pid, 4242);
		assert_eq!(decoded.tid, 4243);
		assert_eq!(decoded.syscall_id, SYSCALL_WRITE);
		assert_eq!(decoded.ret_val, -2);
		assert_eq!(decoded.bytes, 77);
	}

	#[test]
	fn rejects_length_mismatch() {
		let raw = sample_raw(SYSCALL_OPENAT, 0);
		let data = raw.as_bytes();

		assert!(matches!(decode_record(&data[..data.len() - 1]), Err(Error::InvalidEventSize)));

		let mut longer = data.to_vec();
		longer.push(0);
		assert!(matches!(decode_record(&longer), Err(Error::InvalidEventSize)));

		assert!(matches!(decode_record(&[]), Err(Error::InvalidEventSize)));
	}

	#[test]
	fn sanitize_trims_trailing_nuls() {
		let mut buf = [0u8; 16];
		buf[..3].copy_from_slice(b"abc");
		assert_eq!(sanitize(&buf), "abc");
	}

	#[test]
	fn sanitize_replaces_invalid_utf8() {
		let buf = [b'a', 0xff, 0xfe, b'b', 0, 0];
		let text = sanitize(&buf);
		assert!(text.contains('\u{FFFD}'));
		assert!(text.starts_with('a'));
		assert!(text.ends_with('b'));
	}

	#[test]
	fn sanitize_stops_at_embedded_nul() {
		assert_eq!(sanitize(b"ab\0cd"), "ab");
		assert_eq!(sanitize(&[0u8; 8]), "");
	}

	#[test]
	fn resolves_known_syscalls() {
		assert_eq!(syscall_name(1), "openat");
		assert_eq!(syscall_name(2), "write");
		assert_eq!(syscall_name(3), "rename");
		assert_eq!(syscall_name(12345), "unknown");
	}

	#[test]
	fn event_fields_are_sanitized_and_resolved() {
		let raw = sample_raw(SYSCALL_WRITE, 9000);
		let event = to_event(&raw);
		assert_eq!(event.comm, "bash");
		assert_eq!(event.syscall, "write");
		assert_eq!(event.path, "/tmp/out");
		assert_eq!(event.new_path, "");
		assert_eq!(event.ret_val, -2);
		assert_eq!(event.bytes, 9000);
		assert!(event.ts.is_some());
	}
}
