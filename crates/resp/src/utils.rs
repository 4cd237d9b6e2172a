//! Utility functions and constants for RESP protocol.

use crate::error::DecodeError;

/// CRLF line ending
pub const CRLF: &[u8] = b"\r\n";

/// Type markers
pub const SIMPLE_STRING: u8 = b'+';
pub const ERROR: u8 = b'-';
pub const INTEGER: u8 = b':';
pub const BULK_STRING: u8 = b'$';
pub const ARRAY: u8 = b'*';

/// Find the position of CRLF in a byte slice
#[inline]
pub fn find_crlf(buf: &[u8]) -> Option<usize> {
	let mut from = 0;
	while let Some(offset) = memchr::memchr(b'\r', &buf[from..]) {
		let pos = from + offset;
		match buf.get(pos + 1) {
			Some(b'\n') => return Some(pos),
			Some(_) => from = pos + 1,
			None => return None,
		}
	}
	None
}

/// Parse an integer from a byte slice
#[inline]
pub fn parse_integer(buf: &[u8]) -> Result<i64, DecodeError> {
	if buf.is_empty() {
		return Err(DecodeError::InvalidInteger("empty".to_string()));
	}
	let s = std::str::from_utf8(buf)?;
	Ok(s.parse::<i64>()?)
}
