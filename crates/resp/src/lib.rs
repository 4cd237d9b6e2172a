//! # RESP - Redis Serialization Protocol engine
//!
//! The wire engine of the nimbis client: a resumable decoder, an encoder,
//! and a pipeline that matches replies to commands on one connection.
//!
//! The crate never touches a socket. A transport feeds whatever byte chunks
//! it reads into a [`RespDecoder`], hands each decoded value to
//! [`Pipeline::on_decoded`], and writes out whatever the pipeline's
//! [`FrameSink`] receives, granting transmit demand with
//! [`Pipeline::request`] as it drains.
//!
//! ## Example
//!
//! ```rust
//! use resp::Command;
//! use resp::Pipeline;
//! use resp::RespDecoder;
//! use resp::RespValue;
//! use resp::WriteBuffer;
//!
//! let mut pipeline = Pipeline::new(WriteBuffer::new());
//! pipeline.request(16);
//! let mut reply = pipeline
//! 	.enqueue(Command::new("SET").arg("k").arg("v").into_value())
//! 	.unwrap();
//! assert_eq!(
//! 	&pipeline.sink_mut().take()[..],
//! 	b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n"
//! );
//!
//! // The reply may arrive split at any byte
//! let mut decoder = RespDecoder::new();
//! for chunk in [&b"+O"[..], &b"K\r\n"[..]] {
//! 	for value in decoder.feed(chunk) {
//! 		pipeline.on_decoded(value.unwrap()).unwrap();
//! 	}
//! }
//! assert_eq!(reply.try_take(), Some(Ok(RespValue::simple_string("OK"))));
//! ```

mod command;
mod decoder;
mod encode;
mod error;
mod pipeline;
mod types;
mod utils;

pub use command::Command;
pub use decoder::DecoderLimits;
pub use decoder::RespDecoder;
pub use decoder::Values;
pub use decoder::decode;
pub use encode::RespEncoder;
pub use error::DecodeError;
pub use error::InvalidLine;
pub use error::PipelineError;
pub use pipeline::FrameSink;
pub use pipeline::Pipeline;
pub use pipeline::ReplyResult;
pub use pipeline::ReplySlot;
pub use pipeline::Response;
pub use pipeline::WriteBuffer;
pub use pipeline::reply_slot;
pub use types::RespValue;
pub use types::ServerError;
