//! Command construction.
//!
//! A command always goes on the wire as an array of bulk strings, so that
//! arguments with arbitrary bytes (CRLF included) arrive intact.

use bytes::Bytes;

use crate::error::PipelineError;
use crate::types::RespValue;

/// A command name plus its arguments, all as raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
	parts: Vec<Bytes>,
}

impl Command {
	pub fn new(name: impl Into<Bytes>) -> Self {
		Self {
			parts: vec![name.into()],
		}
	}

	/// Append one argument.
	pub fn arg(mut self, arg: impl Into<Bytes>) -> Self {
		self.parts.push(arg.into());
		self
	}

	/// Append an integer argument in ASCII decimal form.
	pub fn arg_int(self, arg: i64) -> Self {
		self.arg(arg.to_string())
	}

	/// Append every argument from an iterator.
	pub fn args<I, A>(mut self, args: I) -> Self
	where
		I: IntoIterator<Item = A>,
		A: Into<Bytes>,
	{
		self.parts.extend(args.into_iter().map(Into::into));
		self
	}

	/// Build a command whose arguments are given as values.
	///
	/// Strings are taken verbatim, integers in decimal and server errors as
	/// their line. `Null` and nested arrays have no byte form.
	pub fn from_values(
		name: impl Into<Bytes>,
		args: impl IntoIterator<Item = RespValue>,
	) -> Result<Self, PipelineError> {
		let mut cmd = Self::new(name);
		for (index, value) in args.into_iter().enumerate() {
			let bytes = match value {
				RespValue::SimpleString(b) | RespValue::BulkString(b) => b,
				RespValue::Integer(i) => Bytes::from(i.to_string()),
				RespValue::Error(e) => e.line().clone(),
				RespValue::Null => {
					return Err(PipelineError::InvalidArgument(format!(
						"argument {} is null",
						index + 1
					)));
				}
				RespValue::Array(_) => {
					return Err(PipelineError::InvalidArgument(format!(
						"argument {} is an array",
						index + 1
					)));
				}
			};
			cmd.parts.push(bytes);
		}
		Ok(cmd)
	}

	/// Split a typed line into a command, honouring double quotes and
	/// backslash escapes inside them.
	///
	/// Returns `Ok(None)` for a blank line.
	pub fn parse_line(line: &str) -> Result<Option<Self>, PipelineError> {
		let mut parts: Vec<Bytes> = Vec::new();
		let mut chars = line.chars().peekable();

		loop {
			while chars.next_if(|c| c.is_whitespace()).is_some() {}
			let Some(&first) = chars.peek() else {
				break;
			};

			let mut current = String::new();
			if first == '"' {
				chars.next();
				let mut closed = false;
				while let Some(c) = chars.next() {
					match c {
						'"' => {
							closed = true;
							break;
						}
						'\\' => match chars.next() {
							Some('n') => current.push('\n'),
							Some('r') => current.push('\r'),
							Some('t') => current.push('\t'),
							Some(other) => current.push(other),
							None => break,
						},
						other => current.push(other),
					}
				}
				if !closed {
					return Err(PipelineError::InvalidArgument(
						"unbalanced quotes".to_string(),
					));
				}
			} else {
				while let Some(c) = chars.next_if(|c| !c.is_whitespace()) {
					current.push(c);
				}
			}
			parts.push(Bytes::from(current));
		}

		if parts.is_empty() {
			return Ok(None);
		}
		Ok(Some(Self { parts }))
	}

	pub fn name(&self) -> &Bytes {
		&self.parts[0]
	}

	pub fn arguments(&self) -> &[Bytes] {
		&self.parts[1..]
	}

	/// The wire value: an array with one bulk string per part.
	pub fn into_value(self) -> RespValue {
		RespValue::Array(self.parts.into_iter().map(RespValue::BulkString).collect())
	}
}

impl From<Command> for RespValue {
	fn from(cmd: Command) -> Self {
		cmd.into_value()
	}
}
