//! Pipelined RESP client over tokio.
//!
//! [`Client::connect`] opens a connection whose replies are matched to
//! commands by order. Any number of commands may be in flight at once:
//!
//! ```no_run
//! use client::Client;
//! use client::config::ClientConfig;
//! use resp::Command;
//!
//! # async fn demo() -> Result<(), client::ClientError> {
//! let client = Client::connect(&ClientConfig::default()).await?;
//! let first = client.send(Command::new("INCR").arg("hits"));
//! let second = client.send(Command::new("GET").arg("hits"));
//! println!("{:?} {:?}", first.await?, second.await?);
//! # Ok(())
//! # }
//! ```

pub mod config;
mod connection;
mod error;
pub mod format;

pub use connection::Client;
pub use error::ClientError;
