//! TGDB Common Library
//!
//! Ambient plumbing shared by the TGDB workspace members:
//!
//! - **Logging**: tracing subscriber setup (console, rolling files, JSON)
//! - **Configuration**: environment-driven ingest settings
//!
//! # Example
//!
//! ```no_run
//! use tgdb_common::config::IngestConfig;
//! use tgdb_common::logging::{init_logging, LogConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     init_logging(&LogConfig::from_env()?)?;
//!     let config = IngestConfig::load()?;
//!     tracing::info!(batch_size = config.batch_size, "Configuration loaded");
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod config;
pub mod logging;

pub use config::IngestConfig;
pub use logging::{init_logging, LogConfig};
