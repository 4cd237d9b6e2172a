use bytes::BufMut;
use bytes::Bytes;
use bytes::BytesMut;

use crate::types::RespValue;
use crate::types::ServerError;
use crate::utils::*;

/// Wire form of `Null`.
const NULL_BULK_STRING: &[u8] = b"$-1\r\n";

/// Trait for encoding RESP values.
///
/// No escaping is ever performed: binary safety comes from the length
/// prefixes alone.
pub trait RespEncoder {
	fn encode_to(&self, buf: &mut BytesMut);

	/// Exact number of bytes `encode_to` appends.
	fn encoded_len(&self) -> usize;

	fn encode(&self) -> Bytes {
		let mut buf = BytesMut::with_capacity(self.encoded_len());
		self.encode_to(&mut buf);
		buf.freeze()
	}
}

impl RespEncoder for RespValue {
	fn encode_to(&self, buf: &mut BytesMut) {
		match self {
			RespValue::Null => buf.put_slice(NULL_BULK_STRING),
			RespValue::SimpleString(s) => encode_line(buf, SIMPLE_STRING, s),
			RespValue::Error(e) => encode_error(buf, e),
			RespValue::Integer(i) => encode_integer(buf, *i),
			RespValue::BulkString(s) => encode_bulk_string(buf, s),
			RespValue::Array(arr) => encode_array(buf, arr),
		}
	}

	fn encoded_len(&self) -> usize {
		match self {
			RespValue::Null => NULL_BULK_STRING.len(),
			RespValue::SimpleString(s) => 1 + s.len() + 2,
			RespValue::Error(e) => 1 + e.line().len() + 2,
			RespValue::Integer(i) => 1 + decimal_len(*i) + 2,
			RespValue::BulkString(s) => 1 + decimal_len(s.len() as i64) + 2 + s.len() + 2,
			RespValue::Array(arr) => {
				1 + decimal_len(arr.len() as i64)
					+ 2 + arr.iter().map(RespEncoder::encoded_len).sum::<usize>()
			}
		}
	}
}

#[inline]
fn encode_line(buf: &mut BytesMut, marker: u8, line: &[u8]) {
	buf.put_u8(marker);
	buf.put_slice(line);
	buf.put_slice(CRLF);
}

#[inline]
fn encode_error(buf: &mut BytesMut, e: &ServerError) {
	encode_line(buf, ERROR, e.line());
}

#[inline]
fn encode_integer(buf: &mut BytesMut, i: i64) {
	encode_line(buf, INTEGER, i.to_string().as_bytes());
}

#[inline]
fn encode_length(buf: &mut BytesMut, marker: u8, length: usize) {
	encode_line(buf, marker, length.to_string().as_bytes());
}

#[inline]
fn encode_bulk_string(buf: &mut BytesMut, s: &Bytes) {
	encode_length(buf, BULK_STRING, s.len());
	buf.put_slice(s);
	buf.put_slice(CRLF);
}

fn encode_array(buf: &mut BytesMut, arr: &[RespValue]) {
	encode_length(buf, ARRAY, arr.len());
	for value in arr {
		value.encode_to(buf);
	}
}

/// Number of ASCII characters in the decimal form of `n`.
fn decimal_len(n: i64) -> usize {
	let sign = usize::from(n < 0);
	let mut magnitude = n.unsigned_abs();
	let mut digits = 1;
	while magnitude >= 10 {
		magnitude /= 10;
		digits += 1;
	}
	sign + digits
}

#[cfg(test)]
mod tests {
	use rstest::rstest;

	use super::*;

	#[test]
	fn test_encode_simple_string() {
		let val = RespValue::SimpleString(Bytes::from_static(b"OK"));
		assert_eq!(val.encode(), b"+OK\r\n".as_slice());
	}

	#[test]
	fn test_encode_error() {
		let val = RespValue::Error(ServerError::new("ERR", "unknown command"));
		assert_eq!(val.encode(), b"-ERR unknown command\r\n".as_slice());
	}

	#[rstest]
	#[case(100, b":100\r\n")]
	#[case(-100, b":-100\r\n")]
	#[case(0, b":0\r\n")]
	#[case(i64::MIN, b":-9223372036854775808\r\n")]
	fn test_encode_integer(#[case] input: i64, #[case] expected: &[u8]) {
		let val = RespValue::Integer(input);
		assert_eq!(val.encode(), expected);
	}

	#[test]
	fn test_encode_bulk_string() {
		let val = RespValue::BulkString(Bytes::from_static(b"hello"));
		assert_eq!(val.encode(), b"$5\r\nhello\r\n".as_slice());
	}

	#[test]
	fn test_encode_bulk_string_with_crlf() {
		let val = RespValue::BulkString(Bytes::from_static(b"a\r\nb"));
		assert_eq!(val.encode(), b"$4\r\na\r\nb\r\n".as_slice());
	}

	#[test]
	fn test_encode_array() {
		let val = RespValue::Array(vec![
			RespValue::SimpleString(Bytes::from_static(b"hello")),
			RespValue::Integer(42),
		]);
		assert_eq!(val.encode(), b"*2\r\n+hello\r\n:42\r\n".as_slice());
	}

	#[test]
	fn test_encode_array_empty() {
		let val = RespValue::Array(vec![]);
		assert_eq!(val.encode(), b"*0\r\n".as_slice());
	}

	#[test]
	fn test_encode_null() {
		assert_eq!(RespValue::Null.encode(), b"$-1\r\n".as_slice());
	}

	#[rstest]
	#[case(0)]
	#[case(9)]
	#[case(10)]
	#[case(-1)]
	#[case(-10)]
	#[case(123_456_789)]
	#[case(i64::MAX)]
	#[case(i64::MIN)]
	fn test_decimal_len(#[case] n: i64) {
		assert_eq!(decimal_len(n), n.to_string().len());
	}

	#[test]
	fn test_encoded_len_matches_output() {
		let val = RespValue::Array(vec![
			RespValue::Null,
			RespValue::error("ERR x"),
			RespValue::Integer(-7),
			RespValue::bulk_string(vec![0u8; 120]),
			RespValue::Array(vec![RespValue::simple_string("nested")]),
		]);
		assert_eq!(val.encoded_len(), val.encode().len());
	}
}
