//! Reply correlation for a pipelined connection.
//!
//! Redis answers the commands of one connection strictly in the order it
//! received them, so a reply is matched to its command by position alone.
//! The [`Pipeline`] keeps commands that are waiting for transmit demand in
//! an outbound queue and commands that are on the wire in a pending queue.
//! Every command owns one [`ReplySlot`] from the moment it is enqueued; the
//! slot moves from the outbound queue to the pending queue when its frame is
//! handed to the [`FrameSink`], and is resolved when the matching reply is
//! decoded.

use std::collections::VecDeque;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::Context;
use std::task::Poll;

use bytes::Bytes;
use bytes::BytesMut;
use log::debug;
use log::warn;
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;

use crate::command::Command;
use crate::encode::RespEncoder;
use crate::error::PipelineError;
use crate::types::RespValue;

/// Outcome delivered to a command's caller.
pub type ReplyResult = Result<RespValue, PipelineError>;

/// Destination for encoded command frames.
pub trait FrameSink {
	fn write_frame(&mut self, frame: Bytes) -> io::Result<()>;
}

/// A sink that stages frames in memory until the transport drains them.
#[derive(Debug, Default)]
pub struct WriteBuffer {
	buf: BytesMut,
}

impl WriteBuffer {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn is_empty(&self) -> bool {
		self.buf.is_empty()
	}

	pub fn len(&self) -> usize {
		self.buf.len()
	}

	/// Staged bytes, for the transport to write and then `advance` past.
	pub fn buffer_mut(&mut self) -> &mut BytesMut {
		&mut self.buf
	}

	/// Take every staged byte.
	pub fn take(&mut self) -> Bytes {
		self.buf.split().freeze()
	}
}

impl FrameSink for WriteBuffer {
	fn write_frame(&mut self, frame: Bytes) -> io::Result<()> {
		self.buf.extend_from_slice(&frame);
		Ok(())
	}
}

/// The resolving half of a command's result handle.
#[derive(Debug)]
pub struct ReplySlot {
	tx: oneshot::Sender<ReplyResult>,
}

impl ReplySlot {
	/// Resolve the paired [`Response`] directly, for a transport that fails
	/// a command before it reaches a pipeline.
	pub fn resolve(self, result: ReplyResult) {
		if self.tx.send(result).is_err() {
			debug!("Discarding reply for a command whose caller went away");
		}
	}
}

/// Create a connected slot and result handle.
pub fn reply_slot() -> (ReplySlot, Response) {
	let (tx, rx) = oneshot::channel();
	(ReplySlot { tx }, Response { rx })
}

/// Single-shot handle to a command's reply.
///
/// Resolves exactly once, either with the decoded reply (which may be a
/// server error value) or with the connection failure that prevented it.
/// Dropping it does not give up the command's place in the reply order.
#[derive(Debug)]
pub struct Response {
	rx: oneshot::Receiver<ReplyResult>,
}

impl Response {
	/// Non-blocking check for the reply.
	pub fn try_take(&mut self) -> Option<ReplyResult> {
		match self.rx.try_recv() {
			Ok(result) => Some(result),
			Err(TryRecvError::Empty) => None,
			Err(TryRecvError::Closed) => Some(Err(PipelineError::Closed)),
		}
	}
}

impl Future for Response {
	type Output = ReplyResult;

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		Pin::new(&mut self.rx)
			.poll(cx)
			.map(|result| result.unwrap_or(Err(PipelineError::Closed)))
	}
}

#[derive(Debug, Clone, PartialEq)]
enum PipelineState {
	Ready,
	Closed(PipelineError),
}

/// FIFO correlator between submitted commands and decoded replies.
#[derive(Debug)]
pub struct Pipeline<S> {
	sink: S,
	state: PipelineState,
	outbound: VecDeque<(RespValue, ReplySlot)>,
	pending: VecDeque<ReplySlot>,
	demand: usize,
}

impl<S: FrameSink> Pipeline<S> {
	/// Create a pipeline with no transmit demand.
	pub fn new(sink: S) -> Self {
		Self {
			sink,
			state: PipelineState::Ready,
			outbound: VecDeque::new(),
			pending: VecDeque::new(),
			demand: 0,
		}
	}

	pub fn sink(&self) -> &S {
		&self.sink
	}

	pub fn sink_mut(&mut self) -> &mut S {
		&mut self.sink
	}

	/// Commands waiting for transmit demand.
	pub fn queued(&self) -> usize {
		self.outbound.len()
	}

	/// Commands written to the sink and still awaiting a reply.
	pub fn pending(&self) -> usize {
		self.pending.len()
	}

	pub fn demand(&self) -> usize {
		self.demand
	}

	pub fn is_closed(&self) -> bool {
		matches!(self.state, PipelineState::Closed(_))
	}

	/// The error that closed the pipeline, if it is closed.
	pub fn close_reason(&self) -> Option<&PipelineError> {
		match &self.state {
			PipelineState::Ready => None,
			PipelineState::Closed(e) => Some(e),
		}
	}

	/// Queue a command and return the handle its reply will arrive on.
	///
	/// Fails immediately, without touching the sink, once the pipeline is
	/// closed.
	pub fn enqueue(&mut self, command: RespValue) -> Result<Response, PipelineError> {
		if let Some(e) = self.close_reason() {
			return Err(e.clone());
		}
		let (slot, response) = reply_slot();
		self.submit(command, slot);
		Ok(response)
	}

	/// Queue a command whose result slot was created by the caller.
	///
	/// On a closed pipeline the slot is resolved with the closing error.
	pub fn submit(&mut self, command: RespValue, slot: ReplySlot) {
		if let Some(e) = self.close_reason() {
			slot.resolve(Err(e.clone()));
			return;
		}
		self.outbound.push_back((command, slot));
		self.flush();
	}

	/// Build a command from a name and argument values, then enqueue it.
	pub fn run(
		&mut self,
		name: impl Into<Bytes>,
		args: impl IntoIterator<Item = RespValue>,
	) -> Result<Response, PipelineError> {
		let command = Command::from_values(name, args)?;
		self.enqueue(command.into_value())
	}

	/// Grant demand for `n` more frames and transmit what it allows.
	pub fn request(&mut self, n: usize) {
		if self.is_closed() {
			return;
		}
		self.demand = self.demand.saturating_add(n);
		self.flush();
	}

	/// Transmit queued commands while there is demand for them.
	pub fn flush(&mut self) {
		while self.demand > 0 && !self.is_closed() {
			let Some((command, slot)) = self.outbound.pop_front() else {
				break;
			};
			let frame = command.encode();
			debug!("Transmitting {} byte frame", frame.len());

			self.demand -= 1;
			self.pending.push_back(slot);
			if let Err(e) = self.sink.write_frame(frame) {
				self.on_connection_error(PipelineError::from(e));
			}
		}
	}

	/// Resolve the oldest pending command with a decoded reply.
	///
	/// A reply with nothing pending means the stream can no longer be
	/// trusted: the pipeline closes and the error is returned.
	pub fn on_decoded(&mut self, value: RespValue) -> Result<(), PipelineError> {
		if let Some(e) = self.close_reason() {
			return Err(e.clone());
		}
		match self.pending.pop_front() {
			Some(slot) => {
				slot.resolve(Ok(value));
				Ok(())
			}
			None => {
				warn!("Received a reply with no pending command: {:?}", value);
				self.on_connection_error(PipelineError::UnexpectedReply);
				Err(PipelineError::UnexpectedReply)
			}
		}
	}

	/// Fail every outstanding command and close for good.
	///
	/// Commands on the wire are failed before queued ones, each in
	/// submission order. Returns how many commands were failed; a second
	/// call finds nothing left and keeps the first error as the reason.
	pub fn on_connection_error(&mut self, error: PipelineError) -> usize {
		if self.is_closed() {
			return 0;
		}

		let failed = self.pending.len() + self.outbound.len();
		if failed > 0 {
			warn!("Failing {} outstanding commands: {}", failed, error);
		}
		for slot in self.pending.drain(..) {
			slot.resolve(Err(error.clone()));
		}
		for (_, slot) in self.outbound.drain(..) {
			slot.resolve(Err(error.clone()));
		}
		self.demand = 0;
		self.state = PipelineState::Closed(error);
		failed
	}

	/// Close the pipeline on request of its owner.
	pub fn shutdown(&mut self) -> usize {
		self.on_connection_error(PipelineError::Closed)
	}
}
