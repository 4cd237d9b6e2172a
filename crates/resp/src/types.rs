//! RESP data types and value representation.

use std::fmt;

use bytes::Bytes;

use crate::error::InvalidLine;
use crate::utils::find_crlf;

/// Reject a line the decoder would split at an embedded CRLF.
fn check_line(line: Bytes) -> Result<Bytes, InvalidLine> {
	match find_crlf(&line) {
		Some(position) => Err(InvalidLine { position }),
		None => Ok(line),
	}
}

/// A server-reported error line, e.g. `-WRONGTYPE Operation against a key`.
///
/// The line is kept verbatim. By convention the first space-separated token
/// is the error code and the remainder is the human readable message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServerError {
	line: Bytes,
}

impl ServerError {
	/// Build an error line from a code and a message joined by one space.
	pub fn new(code: &str, message: &str) -> Self {
		if message.is_empty() {
			return Self::from_line(code.to_owned());
		}
		Self::from_line(format!("{code} {message}"))
	}

	/// Wrap a raw error line (without the leading `-` and trailing CRLF).
	///
	/// The line is not checked. One containing CRLF does not survive
	/// encoding; use [`ServerError::try_from_line`] for untrusted input.
	pub fn from_line(line: impl Into<Bytes>) -> Self {
		Self { line: line.into() }
	}

	pub fn try_from_line(line: impl Into<Bytes>) -> Result<Self, InvalidLine> {
		check_line(line.into()).map(|line| Self { line })
	}

	/// The full line as received.
	pub fn line(&self) -> &Bytes {
		&self.line
	}

	/// The error code, i.e. everything before the first space.
	pub fn code(&self) -> &[u8] {
		match memchr::memchr(b' ', &self.line) {
			Some(pos) => &self.line[..pos],
			None => &self.line,
		}
	}

	/// The message, i.e. everything after the first space.
	pub fn message(&self) -> &[u8] {
		match memchr::memchr(b' ', &self.line) {
			Some(pos) => &self.line[pos + 1..],
			None => &[],
		}
	}
}

impl fmt::Display for ServerError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&String::from_utf8_lossy(&self.line))
	}
}

/// Represents a RESP protocol value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RespValue {
	/// Null: `$-1\r\n`
	Null,

	/// Simple string: `+OK\r\n`
	SimpleString(Bytes),

	/// Bulk string: `$6\r\nfoobar\r\n`
	BulkString(Bytes),

	/// Error: `-ERR message\r\n`
	///
	/// Carried as data; a server error is a valid reply, not a failure of
	/// the connection.
	Error(ServerError),

	/// Integer: `:1000\r\n`
	Integer(i64),

	/// Array: `*2\r\n$3\r\nfoo\r\n$3\r\nbar\r\n`
	Array(Vec<RespValue>),
}

impl RespValue {
	pub fn is_error(&self) -> bool {
		matches!(self, RespValue::Error(_))
	}

	pub fn is_null(&self) -> bool {
		matches!(self, RespValue::Null)
	}

	/// Payload of a simple or bulk string.
	pub fn as_bytes(&self) -> Option<&Bytes> {
		let (RespValue::SimpleString(b) | RespValue::BulkString(b)) = self else {
			return None;
		};
		Some(b)
	}

	/// String payload, if it is valid UTF-8.
	pub fn as_str(&self) -> Option<&str> {
		self.as_bytes().and_then(|b| std::str::from_utf8(b).ok())
	}

	/// String payload with invalid UTF-8 replaced.
	pub fn to_string_lossy(&self) -> Option<String> {
		self.as_bytes()
			.map(|b| String::from_utf8_lossy(b).into_owned())
	}

	pub fn as_integer(&self) -> Option<i64> {
		if let RespValue::Integer(i) = self {
			Some(*i)
		} else {
			None
		}
	}

	pub fn as_array(&self) -> Option<&[RespValue]> {
		if let RespValue::Array(items) = self {
			Some(items.as_slice())
		} else {
			None
		}
	}

	pub fn as_error(&self) -> Option<&ServerError> {
		if let RespValue::Error(e) = self {
			Some(e)
		} else {
			None
		}
	}

	pub fn into_vec(self) -> Option<Vec<RespValue>> {
		if let RespValue::Array(items) = self {
			Some(items)
		} else {
			None
		}
	}

	pub fn into_bytes(self) -> Option<Bytes> {
		let (RespValue::SimpleString(b) | RespValue::BulkString(b)) = self else {
			return None;
		};
		Some(b)
	}

	/// A status reply. Like [`ServerError::from_line`] this trusts the
	/// caller to pass a line without CRLF.
	pub fn simple_string(s: impl Into<Bytes>) -> Self {
		RespValue::SimpleString(s.into())
	}

	/// A status reply, rejecting text that contains CRLF.
	pub fn try_simple_string(s: impl Into<Bytes>) -> Result<Self, InvalidLine> {
		check_line(s.into()).map(RespValue::SimpleString)
	}

	pub fn bulk_string(s: impl Into<Bytes>) -> Self {
		RespValue::BulkString(s.into())
	}

	/// An error reply from its full line, e.g. `"ERR syntax error"`.
	pub fn error(line: impl Into<Bytes>) -> Self {
		RespValue::Error(ServerError::from_line(line))
	}

	pub fn try_error(line: impl Into<Bytes>) -> Result<Self, InvalidLine> {
		ServerError::try_from_line(line).map(RespValue::Error)
	}

	pub fn integer(i: i64) -> Self {
		RespValue::Integer(i)
	}

	pub fn array(items: impl IntoIterator<Item = RespValue>) -> Self {
		RespValue::Array(items.into_iter().collect())
	}

	pub fn null() -> Self {
		RespValue::Null
	}
}

/// Byte-like types become bulk strings, the form every command argument
/// takes on the wire.
macro_rules! impl_from_bulk {
	($($ty:ty => $conv:expr),* $(,)?) => {
		$(
			impl From<$ty> for RespValue {
				fn from(value: $ty) -> Self {
					RespValue::BulkString($conv(value))
				}
			}
		)*
	};
}

impl_from_bulk! {
	&str => |s: &str| Bytes::copy_from_slice(s.as_bytes()),
	String => Bytes::from,
	&[u8] => Bytes::copy_from_slice,
	Vec<u8> => Bytes::from,
	Bytes => std::convert::identity,
}

impl From<i64> for RespValue {
	fn from(i: i64) -> Self {
		RespValue::Integer(i)
	}
}

impl From<i32> for RespValue {
	fn from(i: i32) -> Self {
		RespValue::Integer(i64::from(i))
	}
}

impl From<ServerError> for RespValue {
	fn from(e: ServerError) -> Self {
		RespValue::Error(e)
	}
}

impl<T: Into<RespValue>> From<Vec<T>> for RespValue {
	fn from(items: Vec<T>) -> Self {
		RespValue::array(items.into_iter().map(Into::into))
	}
}

/// `None` is the null reply.
impl<T: Into<RespValue>> From<Option<T>> for RespValue {
	fn from(value: Option<T>) -> Self {
		value.map_or(RespValue::Null, Into::into)
	}
}
