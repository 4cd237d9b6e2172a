use resp::PipelineError;
use telemetry::TelemetryError;
use thiserror::Error;

use crate::config::ConfigError;

#[derive(Error, Debug)]
pub enum ClientError {
	#[error("Failed to connect to {addr}: {source}")]
	Connect {
		addr: String,
		source: std::io::Error,
	},

	#[error("Timed out connecting to {addr} after {timeout_ms}ms")]
	ConnectTimeout { addr: String, timeout_ms: u64 },

	#[error(transparent)]
	Pipeline(#[from] PipelineError),

	#[error(transparent)]
	Config(#[from] ConfigError),

	#[error(transparent)]
	Telemetry(#[from] TelemetryError),

	#[error("Failed to read commands: {0}")]
	Input(#[from] std::io::Error),
}
