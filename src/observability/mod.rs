//! Observability for the controller
//!
//! Structured logging via the tracing crate; format and level are selected
//! through environment variables so the same binary suits both an attached
//! debug console and a log collector.

pub mod logging;

pub use logging::{init_default_logging, init_logging, LogFormat};
