//! Error types for RESP decoding and reply correlation.

use thiserror::Error;

/// Errors that can occur while decoding RESP bytes.
///
/// Every variant except `UnexpectedEOF` leaves the stream framing ambiguous
/// and is fatal for the connection it was read from.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
	/// Unexpected end of input while decoding
	#[error("Unexpected end of input")]
	UnexpectedEOF,

	/// Invalid type marker encountered
	#[error("Invalid type marker: {0:?}")]
	InvalidTypeMarker(char),

	/// Invalid format for the current type
	#[error("Invalid format: {0}")]
	InvalidFormat(String),

	/// Invalid integer value
	#[error("Invalid integer: {0}")]
	InvalidInteger(String),

	/// Invalid bulk string length
	#[error("Invalid bulk string length: {0}")]
	InvalidBulkStringLength(i64),

	/// Invalid array length
	#[error("Invalid array length: {0}")]
	InvalidArrayLength(i64),

	/// Declared bulk string length is above the configured maximum
	#[error("Bulk string of {len} bytes exceeds the maximum of {max}")]
	BulkStringTooLarge { len: usize, max: usize },

	/// Declared array length is above the configured maximum
	#[error("Array of {len} elements exceeds the maximum of {max}")]
	ArrayTooLarge { len: usize, max: usize },

	/// A status, error or length line is longer than the configured maximum
	#[error("Line exceeds maximum length of {0} bytes")]
	LineTooLong(usize),

	/// Arrays nested deeper than the configured maximum
	#[error("Arrays nested deeper than {0} levels")]
	NestingTooDeep(usize),

	/// The decoder already failed and must not be fed again
	#[error("Decoder is poisoned by an earlier error")]
	Poisoned,
}

impl From<std::str::Utf8Error> for DecodeError {
	fn from(e: std::str::Utf8Error) -> Self {
		DecodeError::InvalidInteger(e.to_string())
	}
}

impl From<std::num::ParseIntError> for DecodeError {
	fn from(e: std::num::ParseIntError) -> Self {
		DecodeError::InvalidInteger(e.to_string())
	}
}

/// A status or error line that would end early on the wire.
///
/// Lines are written verbatim, so a CRLF inside one would be read back as the
/// end of the value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Line contains CRLF at byte {position}")]
pub struct InvalidLine {
	pub position: usize,
}

/// Connection-level failures delivered to pending responses.
///
/// A server `-ERR` reply is not one of these: it arrives as
/// [`RespValue::Error`](crate::RespValue::Error) through the success path.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
	/// The reply stream could not be decoded
	#[error("Decode error: {0}")]
	Decode(#[from] DecodeError),

	/// A reply arrived while no command was awaiting one
	#[error("Received a reply with no pending command")]
	UnexpectedReply,

	/// The transport failed to read or write
	#[error("Transport error: {0}")]
	Transport(String),

	/// A command argument cannot be sent as a bulk string
	#[error("Invalid argument: {0}")]
	InvalidArgument(String),

	/// The pipeline was shut down
	#[error("Connection closed")]
	Closed,
}

impl From<std::io::Error> for PipelineError {
	fn from(e: std::io::Error) -> Self {
		PipelineError::Transport(e.to_string())
	}
}
