//! Logging utilities.
//!
//! Every module logs through the `log` facade. This module only decides which
//! backend receives the records; embedders that install their own logger can
//! skip it entirely.

mod init;

pub use init::{init_logging, LoggingConfig};
