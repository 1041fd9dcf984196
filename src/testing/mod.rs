//! Test support
//!
//! Provides a scripted [`MockLink`] protocol client so the session layer can
//! be exercised without a broker or network.

pub mod mocks;

pub use mocks::{ConnectRecord, MockHandle, MockLink, PublishRecord};
