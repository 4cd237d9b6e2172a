//! Tokio transport for one pipelined connection.
//!
//! A spawned task owns the socket, the decoder and the pipeline. Callers
//! only ever talk to it through a channel, so every engine transition for a
//! connection happens on that one task and submission order on the channel
//! is the order commands reach the wire.

use std::sync::Arc;
use std::sync::OnceLock;
use std::time::Duration;

use bytes::Bytes;
use bytes::BytesMut;
use log::debug;
use log::error;
use log::info;
use log::warn;
use resp::Command;
use resp::Pipeline;
use resp::PipelineError;
use resp::ReplySlot;
use resp::RespDecoder;
use resp::RespValue;
use resp::Response;
use resp::WriteBuffer;
use resp::reply_slot;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;

use crate::config::ClientConfig;
use crate::error::ClientError;

/// A command on its way to the connection task.
#[derive(Debug)]
struct Submission {
	command: RespValue,
	slot: ReplySlot,
}

/// Cloneable handle to a pipelined connection.
///
/// Commands sent through any clone share one FIFO. The connection task
/// exits once every handle is dropped and all outstanding replies have
/// arrived, or as soon as the connection fails.
#[derive(Debug, Clone)]
pub struct Client {
	tx: mpsc::UnboundedSender<Submission>,
	/// Set by the connection task before it stops taking submissions.
	closed: Arc<OnceLock<PipelineError>>,
}

impl Client {
	/// Connect to the configured server and start the connection task.
	pub async fn connect(config: &ClientConfig) -> Result<Self, ClientError> {
		config.validate()?;
		let addr = config.addr();
		let connect = TcpStream::connect(&addr);
		let connected = if config.connect_timeout_ms == 0 {
			connect.await
		} else {
			let timeout = Duration::from_millis(config.connect_timeout_ms);
			tokio::time::timeout(timeout, connect)
				.await
				.map_err(|_| ClientError::ConnectTimeout {
					addr: addr.clone(),
					timeout_ms: config.connect_timeout_ms,
				})?
		};
		let stream = connected.map_err(|source| ClientError::Connect {
			addr: addr.clone(),
			source,
		})?;

		if let Err(e) = stream.set_nodelay(true) {
			warn!("Failed to set TCP_NODELAY: {}", e);
		}
		info!("Connected to {}", addr);
		Ok(Self::from_stream(stream, config))
	}

	/// Start a connection task over an already established stream.
	pub fn from_stream(stream: TcpStream, config: &ClientConfig) -> Self {
		let (tx, rx) = mpsc::unbounded_channel();
		let closed = Arc::new(OnceLock::new());
		let driver = Driver {
			decoder: RespDecoder::with_limits(config.limits()),
			pipeline: Pipeline::new(WriteBuffer::new()),
			write_batch: config.write_batch.max(1),
			read_buffer_size: config.read_buffer_size.max(1),
			closed: Arc::clone(&closed),
		};
		tokio::spawn(driver.run(stream, rx));
		Self { tx, closed }
	}

	/// Queue a raw command value.
	///
	/// The returned handle resolves with the reply, which may be a server
	/// error value, or with the failure that closed the connection.
	pub fn send_value(&self, command: RespValue) -> Response {
		let (slot, response) = reply_slot();
		if let Err(mpsc::error::SendError(rejected)) = self.tx.send(Submission { command, slot }) {
			let reason = self.closed.get().cloned().unwrap_or(PipelineError::Closed);
			debug!("Connection task is gone, failing command: {}", reason);
			rejected.slot.resolve(Err(reason));
		}
		response
	}

	pub fn send(&self, command: Command) -> Response {
		self.send_value(command.into_value())
	}

	/// Send a command built from a name and argument values and wait for
	/// its reply.
	pub async fn run(
		&self,
		name: impl Into<Bytes>,
		args: impl IntoIterator<Item = RespValue>,
	) -> Result<RespValue, ClientError> {
		let command = Command::from_values(name, args)?;
		Ok(self.send(command).await?)
	}

	pub async fn ping(&self) -> Result<RespValue, ClientError> {
		Ok(self.send(Command::new("PING")).await?)
	}

	pub async fn get(&self, key: impl Into<Bytes>) -> Result<RespValue, ClientError> {
		Ok(self.send(Command::new("GET").arg(key)).await?)
	}

	pub async fn set(
		&self,
		key: impl Into<Bytes>,
		value: impl Into<Bytes>,
	) -> Result<RespValue, ClientError> {
		Ok(self.send(Command::new("SET").arg(key).arg(value)).await?)
	}

	pub async fn del<I, K>(&self, keys: I) -> Result<RespValue, ClientError>
	where
		I: IntoIterator<Item = K>,
		K: Into<Bytes>,
	{
		Ok(self.send(Command::new("DEL").args(keys)).await?)
	}
}

/// Engine state owned by the connection task.
struct Driver {
	decoder: RespDecoder,
	pipeline: Pipeline<WriteBuffer>,
	write_batch: usize,
	read_buffer_size: usize,
	closed: Arc<OnceLock<PipelineError>>,
}

impl Driver {
	async fn run(mut self, stream: TcpStream, mut rx: mpsc::UnboundedReceiver<Submission>) {
		let (mut reader, mut writer) = stream.into_split();
		let mut read_buf = BytesMut::with_capacity(self.read_buffer_size);
		let mut accepting = true;
		self.pipeline.request(self.write_batch);

		while !self.pipeline.is_closed() {
			if !accepting && self.pipeline.pending() == 0 && self.pipeline.queued() == 0 {
				debug!("All handles dropped and no replies outstanding");
				self.pipeline.shutdown();
				break;
			}

			let staged = !self.pipeline.sink().is_empty();
			tokio::select! {
				submission = rx.recv(), if accepting => match submission {
					Some(Submission { command, slot }) => self.pipeline.submit(command, slot),
					None => accepting = false,
				},
				result = reader.read_buf(&mut read_buf) => {
					match result {
						Ok(0) => {
							self.fail(PipelineError::Transport("connection closed by peer".into()));
						}
						Ok(n) => {
							debug!("Read {} bytes from socket", n);
							self.on_read(&read_buf);
							read_buf.clear();
						}
						Err(e) => self.fail(e.into()),
					}
				}
				result = writer.write_buf(self.pipeline.sink_mut().buffer_mut()), if staged => {
					match result {
						Ok(0) => {
							self.fail(PipelineError::Transport("connection closed for writing".into()));
						}
						Ok(n) => {
							debug!("Wrote {} bytes to socket", n);
							self.on_drained();
						}
						Err(e) => self.fail(e.into()),
					}
				}
			}
		}

		// Anything submitted after the close gets the closing error
		let reason = self.pipeline.close_reason().cloned().unwrap_or(PipelineError::Closed);
		let _ = self.closed.set(reason);
		rx.close();
		while let Ok(Submission { command, slot }) = rx.try_recv() {
			self.pipeline.submit(command, slot);
		}
		if let Err(e) = writer.shutdown().await {
			debug!("Error shutting down socket: {}", e);
		}
	}

	fn on_read(&mut self, chunk: &[u8]) {
		for value in self.decoder.feed(chunk) {
			match value {
				Ok(value) => {
					if self.pipeline.on_decoded(value).is_err() {
						error!("Received a reply that no command is waiting for");
						return;
					}
				}
				Err(e) => {
					error!("Failed to decode reply: {}", e);
					self.pipeline.on_connection_error(e.into());
					return;
				}
			}
		}
	}

	/// Top demand back up to one batch once the staged frames are written.
	fn on_drained(&mut self) {
		if self.pipeline.sink().is_empty() {
			let missing = self.write_batch.saturating_sub(self.pipeline.demand());
			self.pipeline.request(missing);
		}
	}

	fn fail(&mut self, err: PipelineError) {
		let failed = self.pipeline.on_connection_error(err.clone());
		if failed > 0 {
			error!("Connection failed with {} commands outstanding: {}", failed, err);
		} else {
			info!("Connection closed: {}", err);
		}
	}
}
