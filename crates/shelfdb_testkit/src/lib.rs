//! # ShelfDB Testkit
//!
//! Test utilities for ShelfDB.
//!
//! This crate provides:
//! - Shelf fixtures over memory or temporary files
//! - A fault-injecting log backend
//! - Property-based test generators using proptest
//! - A tracing subscriber for test output
//!
//! ## Usage
//!
//! ```rust,ignore
//! use shelfdb_testkit::prelude::*;
//!
//! #[tokio::test]
//! async fn test_with_shelf() {
//!     let shelf = TestShelf::memory();
//!     shelf.initialize(&telemetry_schema()).await.unwrap();
//!     // ... test operations
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod faults;
pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::faults::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::init_tracing;
}

pub use faults::*;
pub use fixtures::*;
pub use generators::*;

/// Installs a test-friendly tracing subscriber once per process.
///
/// The filter comes from `RUST_LOG` and defaults to `warn`.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
