//! Configuration for the client and its command-line front end
//!
//! Settings come from a configuration file (TOML, JSON or YAML, chosen by
//! extension) and are then overridden by whatever was given explicitly on
//! the command line.
//!
//! # Example
//!
//! ```no_run
//! use client::config::Cli;
//! use client::config::Parser;
//! use client::config::setup;
//!
//! let args = Cli::parse();
//! let config = setup(&args)?;
//! println!("Connecting to {}", config.addr());
//! # Ok::<(), client::ClientError>(())
//! ```

use std::path::Path;

pub use clap::Parser;
use resp::DecoderLimits;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::ClientError;

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
	#[error("Failed to read configuration file '{path}': {source}")]
	Io {
		source: std::io::Error,
		path: String,
	},

	#[error("Failed to parse TOML configuration: {0}")]
	TomlParse(#[from] toml::de::Error),

	#[error("Failed to parse JSON configuration: {0}")]
	JsonParse(#[from] serde_json::Error),

	#[error("Failed to parse YAML configuration: {0}")]
	YamlParse(#[from] serde_yaml::Error),

	#[error("Unsupported configuration format: {0}")]
	UnsupportedFormat(String),

	#[error("Configuration file has no extension")]
	NoExtension,

	#[error("Invalid value for '{field}': {reason}")]
	InvalidValue { field: &'static str, reason: String },
}

/// Command-line arguments for the client
#[derive(Parser, Debug, Default)]
#[command(name = "nimbis-cli", author, version, about, long_about = None)]
pub struct Cli {
	/// Configuration file path (TOML, JSON, or YAML).
	/// Defaults to conf/config.toml if it exists.
	#[arg(short, long)]
	pub config: Option<String>,

	/// Server port
	#[arg(short, long)]
	pub port: Option<u16>,

	/// Server host
	#[arg(long)]
	pub host: Option<String>,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long)]
	pub log_level: Option<String>,

	/// Frames written per batch before waiting for the socket to drain
	#[arg(long)]
	pub write_batch: Option<usize>,

	/// Command and arguments to send. Commands are read from stdin when
	/// omitted.
	#[arg(trailing_var_arg = true, allow_hyphen_values = true)]
	pub command: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
	pub host: String,
	pub port: u16,
	pub log_level: String,
	/// Zero disables the timeout.
	pub connect_timeout_ms: u64,
	pub write_batch: usize,
	pub read_buffer_size: usize,
	pub max_bulk_len: usize,
	pub max_array_len: usize,
	pub max_line_len: usize,
	pub max_depth: usize,
}

impl Default for ClientConfig {
	fn default() -> Self {
		let limits = DecoderLimits::default();
		Self {
			host: "127.0.0.1".into(),
			port: 6379,
			log_level: "info".into(),
			connect_timeout_ms: 5000,
			write_batch: 64,
			read_buffer_size: 16 * 1024,
			max_bulk_len: limits.max_bulk_len,
			max_array_len: limits.max_array_len,
			max_line_len: limits.max_line_len,
			max_depth: limits.max_depth,
		}
	}
}

impl ClientConfig {
	pub fn addr(&self) -> String {
		format!("{}:{}", self.host, self.port)
	}

	/// Decoder limits for replies on this connection.
	pub fn limits(&self) -> DecoderLimits {
		DecoderLimits {
			max_bulk_len: self.max_bulk_len,
			max_array_len: self.max_array_len,
			max_line_len: self.max_line_len,
			max_depth: self.max_depth,
		}
	}

	pub fn validate(&self) -> Result<(), ConfigError> {
		// Zero would fail every write batch, read or array reply
		let positive = [
			("write_batch", self.write_batch),
			("read_buffer_size", self.read_buffer_size),
			("max_array_len", self.max_array_len),
			("max_depth", self.max_depth),
		];
		match positive.into_iter().find(|(_, value)| *value == 0) {
			Some((field, _)) => Err(ConfigError::InvalidValue {
				field,
				reason: "must be at least 1".into(),
			}),
			None => Ok(()),
		}
	}
}

/// Resolve the configuration and initialize logging.
pub fn setup(args: &Cli) -> Result<ClientConfig, ClientError> {
	let config = resolve(args)?;
	telemetry::init(&config.log_level)?;
	Ok(config)
}

/// Load the configuration file, if any, and apply CLI overrides.
pub fn resolve(args: &Cli) -> Result<ClientConfig, ConfigError> {
	let default_config = "conf/config.toml";
	let mut config = match args.config.as_deref() {
		Some(p) => load_from_file(p)?,
		None if Path::new(default_config).exists() => load_from_file(default_config)?,
		None => ClientConfig::default(),
	};

	// Override with CLI arguments if explicitly provided
	if let Some(host) = &args.host {
		config.host = host.clone();
	}
	if let Some(port) = args.port {
		config.port = port;
	}
	if let Some(log_level) = &args.log_level {
		config.log_level = log_level.clone();
	}
	if let Some(n) = args.write_batch {
		config.write_batch = n;
	}

	config.validate()?;
	Ok(config)
}

pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<ClientConfig, ConfigError> {
	let path_ref = path.as_ref();
	let content = std::fs::read_to_string(path_ref).map_err(|source| ConfigError::Io {
		path: path_ref.display().to_string(),
		source,
	})?;

	let extension = path_ref
		.extension()
		.and_then(|ext| ext.to_str())
		.ok_or(ConfigError::NoExtension)?;

	match extension.to_lowercase().as_str() {
		"toml" => Ok(toml::from_str(&content)?),
		"json" => Ok(serde_json::from_str(&content)?),
		"yaml" | "yml" => Ok(serde_yaml::from_str(&content)?),
		_ => Err(ConfigError::UnsupportedFormat(extension.to_string())),
	}
}
