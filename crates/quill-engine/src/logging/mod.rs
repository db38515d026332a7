//! Logger setup for binaries and tests that host quill.
//!
//! Library crates only emit through the `log` facade; installing a backend
//! is left to the host.

mod init;

pub use init::{FILTER_ENV, LoggingConfig, init_logging};
