//! Non-blocking MQTT session layer
//!
//! The session manager owns one protocol client and one handler registry and
//! is driven by the application's control loop through [`SessionManager::tick`].
//! Every internal loop is wall-clock bounded, so a single tick has a bounded
//! worst-case latency even while the broker is unreachable.

pub mod manager;
pub mod registry;

pub use manager::{SessionManager, SessionOptions, SessionStatus, SessionTiming};
pub use registry::{HandlerRegistry, TopicHandler, DEFAULT_HANDLER_CAPACITY};
