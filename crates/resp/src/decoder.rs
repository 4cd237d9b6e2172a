//! Resumable RESP decoder.
//!
//! Bytes arrive in chunks whose boundaries have nothing to do with message
//! boundaries. The decoder keeps only the bytes that belong to the value it
//! has not finished yet, plus a [`PartialValue`] tree describing how far into
//! that value it got. A scalar is never consumed until all of its bytes are
//! buffered, so resuming a scalar only means looking at the same bytes again.
//! An array is consumed header first; its arity is fixed right away and its
//! elements are stored as they complete, so what the decoder holds never
//! outgrows what the peer actually sent.

use std::iter::FusedIterator;

use bytes::Buf;
use bytes::BytesMut;
use log::debug;

use crate::error::DecodeError;
use crate::types::RespValue;
use crate::types::ServerError;
use crate::utils::*;

/// Upper bounds on what a peer may make the decoder buffer or allocate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderLimits {
	/// Largest accepted bulk string payload, in bytes.
	pub max_bulk_len: usize,
	/// Largest accepted array element count.
	pub max_array_len: usize,
	/// Longest accepted CRLF-terminated line (status, error, integer or
	/// length prefix), in bytes.
	pub max_line_len: usize,
	/// Deepest accepted array nesting.
	pub max_depth: usize,
}

impl Default for DecoderLimits {
	fn default() -> Self {
		Self {
			max_bulk_len: 10_000_000,
			max_array_len: 1024 * 1024,
			max_line_len: 64 * 1024,
			max_depth: 512,
		}
	}
}

/// In-progress decode state of one value.
#[derive(Debug)]
enum PartialValue {
	/// A slot whose type marker has not been consumed yet.
	NotYetParsed,
	/// An array of `len` elements. `items` holds the completed ones in
	/// order and `next` is the element being decoded after them.
	Parsing {
		len: usize,
		items: Vec<RespValue>,
		next: Box<PartialValue>,
	},
	/// A fully decoded value.
	Parsed(RespValue),
}

impl PartialValue {
	fn into_value(self) -> Option<RespValue> {
		match self {
			PartialValue::Parsed(value) => Some(value),
			_ => None,
		}
	}
}

/// A stateful RESP decoder for one connection's inbound byte stream.
#[derive(Debug)]
pub struct RespDecoder {
	buffer: BytesMut,
	current: Option<PartialValue>,
	/// Bytes after the front marker already searched for a CRLF.
	scanned: usize,
	limits: DecoderLimits,
	poisoned: bool,
}

impl Default for RespDecoder {
	fn default() -> Self {
		Self::new()
	}
}

impl RespDecoder {
	pub fn new() -> Self {
		Self::with_limits(DecoderLimits::default())
	}

	pub fn with_limits(limits: DecoderLimits) -> Self {
		Self {
			buffer: BytesMut::new(),
			current: None,
			scanned: 0,
			limits,
			poisoned: false,
		}
	}

	pub fn limits(&self) -> &DecoderLimits {
		&self.limits
	}

	/// Number of bytes retained for the value currently being decoded.
	pub fn buffered(&self) -> usize {
		self.buffer.len()
	}

	/// `true` when no value is in progress and no bytes are retained.
	pub fn is_idle(&self) -> bool {
		self.current.is_none() && self.buffer.is_empty()
	}

	pub fn is_poisoned(&self) -> bool {
		self.poisoned
	}

	/// Append a chunk and return the values it completes.
	///
	/// The returned iterator is lazy: each `next()` decodes at most one
	/// top-level value. It ends when the buffered bytes cannot complete
	/// another value, or right after yielding an error. Bytes left unread
	/// when the iterator is dropped early stay buffered for the next call.
	pub fn feed(&mut self, chunk: &[u8]) -> Values<'_> {
		if !self.poisoned {
			self.buffer.extend_from_slice(chunk);
		}
		Values {
			decoder: self,
			done: false,
		}
	}

	/// Try to complete one value from the bytes buffered so far.
	///
	/// Returns `Ok(None)` when more bytes are needed. Any error poisons the
	/// decoder: the framing of everything after the bad byte is unknown.
	pub fn decode(&mut self) -> Result<Option<RespValue>, DecodeError> {
		if self.poisoned {
			return Err(DecodeError::Poisoned);
		}

		let mut slot = self.current.take().unwrap_or(PartialValue::NotYetParsed);
		let mut input = Input {
			buf: &mut self.buffer,
			limits: &self.limits,
			scanned: &mut self.scanned,
		};
		match resolve(&mut input, &mut slot, 0) {
			Ok(true) => match slot.into_value() {
				Some(value) => Ok(Some(value)),
				None => self.fail(DecodeError::InvalidFormat(
					"Resolved value is incomplete".to_string(),
				)),
			},
			Ok(false) => {
				if !matches!(slot, PartialValue::NotYetParsed) {
					self.current = Some(slot);
				}
				Ok(None)
			}
			Err(e) => self.fail(e),
		}
	}

	fn fail(&mut self, error: DecodeError) -> Result<Option<RespValue>, DecodeError> {
		debug!("RESP decode failed: {}", error);
		self.poisoned = true;
		self.current = None;
		self.scanned = 0;
		self.buffer.clear();
		Err(error)
	}
}

/// Values completed by one [`RespDecoder::feed`] call.
pub struct Values<'a> {
	decoder: &'a mut RespDecoder,
	done: bool,
}

impl Iterator for Values<'_> {
	type Item = Result<RespValue, DecodeError>;

	fn next(&mut self) -> Option<Self::Item> {
		if self.done {
			return None;
		}
		match self.decoder.decode() {
			Ok(Some(value)) => Some(Ok(value)),
			Ok(None) => {
				self.done = true;
				None
			}
			Err(e) => {
				self.done = true;
				Some(Err(e))
			}
		}
	}
}

impl FusedIterator for Values<'_> {}

/// Buffered bytes of the value at the front of the stream.
struct Input<'a> {
	buf: &'a mut BytesMut,
	limits: &'a DecoderLimits,
	/// Leading bytes of the front line known to hold no CRLF. Reset whenever
	/// bytes are consumed.
	scanned: &'a mut usize,
}

impl Input<'_> {
	/// Peek the line after the type marker, enforcing the line length limit.
	///
	/// Only the bytes not searched by an earlier call are searched, so a long
	/// line arriving in small chunks is scanned once overall.
	fn peek_body_line(&mut self) -> Result<Option<(&[u8], usize)>, DecodeError> {
		let max = self.limits.max_line_len;
		let body = &self.buf[1..];
		let from = (*self.scanned).min(body.len());
		match find_crlf(&body[from..]).map(|pos| from + pos) {
			Some(pos) if pos > max => Err(DecodeError::LineTooLong(max)),
			Some(pos) => Ok(Some((&body[..pos], pos + 2))),
			// A trailing '\r' may still be waiting for its '\n'
			None if body.len() > max + 1 => Err(DecodeError::LineTooLong(max)),
			None => {
				*self.scanned = body.len().saturating_sub(1);
				Ok(None)
			}
		}
	}

	/// Drop `n` bytes from the front.
	fn consume(&mut self, n: usize) {
		self.buf.advance(n);
		*self.scanned = 0;
	}
}

/// Advance `slot` as far as the buffered bytes allow.
///
/// Returns `Ok(true)` once `slot` holds a `Parsed` value.
fn resolve(
	input: &mut Input<'_>,
	slot: &mut PartialValue,
	depth: usize,
) -> Result<bool, DecodeError> {
	loop {
		match slot {
			PartialValue::Parsed(_) => return Ok(true),
			PartialValue::NotYetParsed => {
				let Some(&marker) = input.buf.first() else {
					return Ok(false);
				};
				if marker != ARRAY {
					return match decode_scalar(input, marker)? {
						Some(value) => {
							*slot = PartialValue::Parsed(value);
							Ok(true)
						}
						None => Ok(false),
					};
				}

				let Some(len) = start_array(input, depth)? else {
					return Ok(false);
				};
				*slot = PartialValue::Parsing {
					len,
					items: Vec::new(),
					next: Box::new(PartialValue::NotYetParsed),
				};
			}
			PartialValue::Parsing { len, items, next } => {
				while items.len() < *len {
					if !resolve(input, next, depth + 1)? {
						return Ok(false);
					}
					let done = std::mem::replace(next.as_mut(), PartialValue::NotYetParsed);
					let value = done.into_value().ok_or_else(|| {
						DecodeError::InvalidFormat("Array element left unresolved".to_string())
					})?;
					items.push(value);
				}

				*slot = PartialValue::Parsed(RespValue::Array(std::mem::take(items)));
				return Ok(true);
			}
		}
	}
}

/// Consume an array header, returning its element count.
fn start_array(input: &mut Input<'_>, depth: usize) -> Result<Option<usize>, DecodeError> {
	let Some((line, consumed)) = input.peek_body_line()? else {
		return Ok(None);
	};
	let declared = parse_integer(line)?;
	if declared < 0 {
		return Err(DecodeError::InvalidArrayLength(declared));
	}
	let len = usize::try_from(declared).map_err(|_| DecodeError::InvalidArrayLength(declared))?;
	if len > input.limits.max_array_len {
		return Err(DecodeError::ArrayTooLarge {
			len,
			max: input.limits.max_array_len,
		});
	}
	if depth >= input.limits.max_depth {
		return Err(DecodeError::NestingTooDeep(input.limits.max_depth));
	}

	input.consume(1 + consumed);
	Ok(Some(len))
}

/// Decode a non-array value, consuming nothing unless it is complete.
fn decode_scalar(input: &mut Input<'_>, marker: u8) -> Result<Option<RespValue>, DecodeError> {
	match marker {
		SIMPLE_STRING | ERROR => {
			let Some((line, consumed)) = input.peek_body_line()? else {
				return Ok(None);
			};
			let line_len = line.len();
			input.consume(1);
			let text = input.buf.split_to(line_len).freeze();
			input.consume(consumed - line_len);

			if marker == SIMPLE_STRING {
				Ok(Some(RespValue::SimpleString(text)))
			} else {
				Ok(Some(RespValue::Error(ServerError::from_line(text))))
			}
		}
		INTEGER => {
			let Some((line, consumed)) = input.peek_body_line()? else {
				return Ok(None);
			};
			let num = parse_integer(line)?;
			input.consume(1 + consumed);
			Ok(Some(RespValue::Integer(num)))
		}
		BULK_STRING => decode_bulk_string(input),
		_ => Err(DecodeError::InvalidTypeMarker(marker as char)),
	}
}

fn decode_bulk_string(input: &mut Input<'_>) -> Result<Option<RespValue>, DecodeError> {
	// $6\r\nfoobar\r\n
	let Some((line, len_consumed)) = input.peek_body_line()? else {
		return Ok(None);
	};
	let declared = parse_integer(line)?;
	let header_len = 1 + len_consumed;

	if declared < 0 {
		input.consume(header_len);
		return Ok(Some(RespValue::Null));
	}
	let length =
		usize::try_from(declared).map_err(|_| DecodeError::InvalidBulkStringLength(declared))?;
	if length > input.limits.max_bulk_len {
		return Err(DecodeError::BulkStringTooLarge {
			len: length,
			max: input.limits.max_bulk_len,
		});
	}

	let total_needed = header_len + length + 2;
	if input.buf.len() < total_needed {
		return Ok(None);
	}
	if &input.buf[header_len + length..total_needed] != CRLF {
		return Err(DecodeError::InvalidFormat(
			"Missing CRLF after bulk string".to_string(),
		));
	}

	input.consume(header_len);
	let data = input.buf.split_to(length).freeze();
	input.consume(2);
	Ok(Some(RespValue::BulkString(data)))
}

/// Decode exactly one value from a complete buffer.
///
/// Convenience for one-off decoding; streams should use [`RespDecoder`].
pub fn decode(buf: &[u8]) -> Result<RespValue, DecodeError> {
	let mut decoder = RespDecoder::new();
	match decoder.feed(buf).next() {
		Some(result) => result,
		None => Err(DecodeError::UnexpectedEOF),
	}
}

#[cfg(test)]
mod tests {
	use bytes::Bytes;
	use rstest::rstest;

	use super::*;

	fn bulk(s: &'static str) -> RespValue {
		RespValue::BulkString(Bytes::from_static(s.as_bytes()))
	}

	#[test]
	fn test_decode_simple_string() {
		let value = decode(b"+OK\r\n").unwrap();
		assert_eq!(value, RespValue::SimpleString(Bytes::from("OK")));
	}

	#[test]
	fn test_decode_error() {
		let value = decode(b"-ERR unknown command\r\n").unwrap();
		let err = value.as_error().unwrap();
		assert_eq!(err.code(), b"ERR");
		assert_eq!(err.message(), b"unknown command");
	}

	#[test]
	fn test_decode_integer() {
		assert_eq!(decode(b":1000\r\n").unwrap(), RespValue::Integer(1000));
		assert_eq!(decode(b":-42\r\n").unwrap(), RespValue::Integer(-42));
	}

	#[test]
	fn test_decode_bulk_string() {
		assert_eq!(decode(b"$6\r\nfoobar\r\n").unwrap(), bulk("foobar"));
		assert_eq!(decode(b"$0\r\n\r\n").unwrap(), bulk(""));
	}

	#[rstest]
	#[case(b"$-1\r\n")]
	#[case(b"$-5\r\n")]
	fn test_decode_negative_bulk_length_is_null(#[case] input: &[u8]) {
		assert_eq!(decode(input).unwrap(), RespValue::Null);
	}

	#[test]
	fn test_decode_array() {
		let value = decode(b"*2\r\n:1\r\n:2\r\n").unwrap();
		assert_eq!(
			value,
			RespValue::Array(vec![RespValue::Integer(1), RespValue::Integer(2)])
		);
		assert_eq!(decode(b"*0\r\n").unwrap(), RespValue::Array(vec![]));
	}

	#[rstest]
	#[case(b"*-1\r\n", DecodeError::InvalidArrayLength(-1))]
	#[case(b"?oops\r\n", DecodeError::InvalidTypeMarker('?'))]
	#[case(b"$3\r\nfooXY", DecodeError::InvalidFormat("Missing CRLF after bulk string".to_string()))]
	fn test_decode_malformed(#[case] input: &[u8], #[case] expected: DecodeError) {
		assert_eq!(decode(input).unwrap_err(), expected);
	}

	#[rstest]
	#[case(b":12a\r\n")]
	#[case(b"$x\r\n")]
	#[case(b"*\r\n")]
	fn test_decode_malformed_integer(#[case] input: &[u8]) {
		assert!(matches!(
			decode(input),
			Err(DecodeError::InvalidInteger(_))
		));
	}

	#[test]
	fn test_decode_incomplete_consumes_nothing() {
		let mut decoder = RespDecoder::new();
		assert!(decoder.feed(b"$6\r\nfoo").next().is_none());
		assert_eq!(decoder.buffered(), 7);
		assert!(decoder.current.is_none());

		let values: Vec<_> = decoder.feed(b"bar\r\n").collect();
		assert_eq!(values, vec![Ok(bulk("foobar"))]);
		assert!(decoder.is_idle());
	}

	#[test]
	fn test_partial_array_keeps_resolved_slots() {
		let mut decoder = RespDecoder::new();
		assert!(decoder.feed(b"*3\r\n:1\r\n$3\r\nab").next().is_none());

		match decoder.current.as_ref() {
			Some(PartialValue::Parsing { len, items, next }) => {
				assert_eq!(*len, 3);
				assert_eq!(items, &vec![RespValue::Integer(1)]);
				assert!(matches!(next.as_ref(), PartialValue::NotYetParsed));
			}
			other => panic!("Expected array in progress, got {:?}", other),
		}
		// Only the unfinished bulk string is retained
		assert_eq!(decoder.buffered(), b"$3\r\nab".len());

		let values: Vec<_> = decoder.feed(b"c\r\n:3\r\n").collect();
		assert_eq!(
			values,
			vec![Ok(RespValue::Array(vec![
				RespValue::Integer(1),
				bulk("abc"),
				RespValue::Integer(3),
			]))]
		);
	}

	#[test]
	fn test_multiple_values_from_one_chunk() {
		let mut decoder = RespDecoder::new();
		let values: Vec<_> = decoder
			.feed(b"+OK\r\n:5\r\n$-1\r\n*1\r\n+x\r\n+partial")
			.collect();
		assert_eq!(
			values,
			vec![
				Ok(RespValue::simple_string("OK")),
				Ok(RespValue::Integer(5)),
				Ok(RespValue::Null),
				Ok(RespValue::Array(vec![RespValue::simple_string("x")])),
			]
		);
		assert_eq!(decoder.buffered(), b"+partial".len());
	}

	#[test]
	fn test_byte_at_a_time_nested() {
		let wire = b"*2\r\n*2\r\n:1\r\n$2\r\nhi\r\n-ERR bad\r\n";
		let mut decoder = RespDecoder::new();
		let mut values = Vec::new();
		for byte in wire.iter() {
			values.extend(decoder.feed(std::slice::from_ref(byte)));
		}
		assert_eq!(
			values,
			vec![Ok(RespValue::Array(vec![
				RespValue::Array(vec![RespValue::Integer(1), bulk("hi")]),
				RespValue::error("ERR bad"),
			]))]
		);
		assert!(decoder.is_idle());
	}

	/// Element storage held by a value in progress, counted in values.
	fn reserved(partial: &PartialValue) -> usize {
		match partial {
			PartialValue::Parsing { items, next, .. } => items.capacity() + reserved(next),
			_ => 0,
		}
	}

	#[test]
	fn test_array_headers_do_not_preallocate() {
		let mut decoder = RespDecoder::new();
		let header = b"*1048576\r\n";
		for _ in 0..3 {
			assert!(decoder.feed(header).next().is_none());
		}
		assert_eq!(decoder.current.as_ref().map(reserved), Some(0));

		// Storage grows with the elements that actually arrive
		let mut input = 3 * header.len();
		for _ in 0..100 {
			assert!(decoder.feed(b":1\r\n").next().is_none());
			input += 4;
		}
		let held = decoder.current.as_ref().map(reserved).unwrap();
		assert!(held >= 100);
		assert!(held <= input, "{} values reserved for {} bytes", held, input);
	}

	#[test]
	fn test_long_line_resumes_scan() {
		let mut decoder = RespDecoder::new();
		assert!(decoder.feed(b"+abc").next().is_none());
		assert_eq!(decoder.scanned, 2);
		assert!(decoder.feed(b"d\r").next().is_none());
		// The trailing '\r' is searched again with the next chunk
		assert_eq!(decoder.scanned, 4);
		assert!(decoder.feed(b"x\r").next().is_none());
		assert_eq!(decoder.scanned, 6);

		let values: Vec<_> = decoder.feed(b"\n:1\r\n").collect();
		assert_eq!(
			values,
			vec![
				Ok(RespValue::simple_string("abcd\rx")),
				Ok(RespValue::Integer(1)),
			]
		);
		assert_eq!(decoder.scanned, 0);
		assert!(decoder.is_idle());
	}

	#[test]
	fn test_bulk_string_limit() {
		let limits = DecoderLimits {
			max_bulk_len: 4,
			..DecoderLimits::default()
		};
		let mut decoder = RespDecoder::with_limits(limits);
		let first = decoder.feed(b"$5\r\n").next();
		assert_eq!(
			first,
			Some(Err(DecodeError::BulkStringTooLarge { len: 5, max: 4 }))
		);
	}

	#[test]
	fn test_array_limits() {
		let limits = DecoderLimits {
			max_array_len: 2,
			max_depth: 2,
			..DecoderLimits::default()
		};
		let mut decoder = RespDecoder::with_limits(limits);
		assert_eq!(
			decoder.feed(b"*3\r\n").next(),
			Some(Err(DecodeError::ArrayTooLarge { len: 3, max: 2 }))
		);

		let mut decoder = RespDecoder::with_limits(limits);
		assert_eq!(
			decoder.feed(b"*1\r\n*1\r\n*1\r\n:1\r\n").next(),
			Some(Err(DecodeError::NestingTooDeep(2)))
		);

		let mut decoder = RespDecoder::with_limits(limits);
		assert_eq!(
			decoder.feed(b"*1\r\n*1\r\n:1\r\n").next(),
			Some(Ok(RespValue::Array(vec![RespValue::Array(vec![
				RespValue::Integer(1)
			])])))
		);
	}

	#[test]
	fn test_unterminated_line_limit() {
		let limits = DecoderLimits {
			max_line_len: 8,
			..DecoderLimits::default()
		};
		let mut decoder = RespDecoder::with_limits(limits);
		assert!(decoder.feed(b"+12345678\r").next().is_none());
		assert_eq!(
			decoder.feed(b"9").next(),
			Some(Err(DecodeError::LineTooLong(8)))
		);
	}

	#[test]
	fn test_poisoned_after_error() {
		let mut decoder = RespDecoder::new();
		let values: Vec<_> = decoder.feed(b"+OK\r\n!bad\r\n+never\r\n").collect();
		assert_eq!(
			values,
			vec![
				Ok(RespValue::simple_string("OK")),
				Err(DecodeError::InvalidTypeMarker('!')),
			]
		);
		assert!(decoder.is_poisoned());
		assert_eq!(decoder.buffered(), 0);

		let later: Vec<_> = decoder.feed(b"+OK\r\n").collect();
		assert_eq!(later, vec![Err(DecodeError::Poisoned)]);
		assert_eq!(decoder.buffered(), 0);
	}

	#[test]
	fn test_decode_empty_input() {
		assert_eq!(decode(b""), Err(DecodeError::UnexpectedEOF));
		assert_eq!(decode(b"*2\r\n:1\r\n"), Err(DecodeError::UnexpectedEOF));
	}
}
