//! Catalog Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared error handling and logging for the catalog workspace.
//!
//! - **Error Handling**: [`CatalogError`] and the [`Result`] alias
//! - **Logging**: environment-driven `tracing` setup, see [`logging`]
//!
//! # Example
//!
//! ```no_run
//! use catalog_common::logging::{init_logging, LogConfig};
//!
//! fn main() -> catalog_common::Result<()> {
//!     let config = LogConfig::from_env()?;
//!     init_logging(&config)?;
//!     tracing::info!("catalog worker started");
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod logging;

pub use error::{CatalogError, Result};
