//! Human-readable rendering of replies, in the style of redis-cli.

use std::fmt::Write;

use resp::RespValue;

/// Render a reply the way an interactive terminal client shows it.
///
/// Array items are numbered, with nested arrays indented under their index.
pub fn format_reply(value: &RespValue) -> String {
	let mut out = String::new();
	write_value(&mut out, value, 0);
	out
}

fn write_value(out: &mut String, value: &RespValue, indent: usize) {
	match value {
		RespValue::Null => out.push_str("(nil)"),
		RespValue::SimpleString(s) => out.push_str(&String::from_utf8_lossy(s)),
		RespValue::Error(e) => {
			out.push_str("(error) ");
			out.push_str(&e.to_string());
		}
		RespValue::Integer(i) => {
			let _ = write!(out, "(integer) {}", i);
		}
		RespValue::BulkString(b) => write_quoted(out, b),
		RespValue::Array(items) if items.is_empty() => out.push_str("(empty array)"),
		RespValue::Array(items) => {
			let width = items.len().to_string().len();
			for (i, item) in items.iter().enumerate() {
				if i > 0 {
					out.push('\n');
					out.push_str(&" ".repeat(indent));
				}
				let label = format!("{:>width$}) ", i + 1, width = width);
				out.push_str(&label);
				write_value(out, item, indent + label.len());
			}
		}
	}
}

/// Double-quote bytes, escaping anything that is not printable ASCII.
fn write_quoted(out: &mut String, bytes: &[u8]) {
	out.push('"');
	for &b in bytes {
		match b {
			b'\\' => out.push_str("\\\\"),
			b'"' => out.push_str("\\\""),
			b'\n' => out.push_str("\\n"),
			b'\r' => out.push_str("\\r"),
			b'\t' => out.push_str("\\t"),
			0x07 => out.push_str("\\a"),
			0x08 => out.push_str("\\b"),
			0x20..=0x7e => out.push(b as char),
			_ => {
				let _ = write!(out, "\\x{:02x}", b);
			}
		}
	}
	out.push('"');
}
