//! Protocol client seam for the session manager
//!
//! The session layer never speaks wire-level MQTT itself; it drives a narrow
//! collaborator interface covering connect, publish, subscribe and a
//! single-unit I/O pump. The production implementation wraps rumqttc; tests
//! substitute a scripted mock behind the same trait.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

pub mod rumqtt;

pub use rumqtt::RumqttLink;

/// Username/password pair for an authenticated connect attempt.
///
/// Constructed only when both halves are present and non-empty; a partial
/// pair means the session connects anonymously.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Credentials<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// Outcome of pumping one unit of I/O from the broker link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// An application message arrived on a subscribed topic.
    Message { topic: String, payload: Vec<u8> },
    /// Protocol traffic was processed (acks, pings) but nothing is routable.
    Housekeeping,
    /// Nothing was pending within the wait window.
    Idle,
    /// The link is down; the pump made no progress.
    Disconnected,
}

/// Informational status code, mirroring the last observed link condition.
///
/// Consumed by status reporting and logs only, never for control decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// No connect attempt has been made yet.
    Fresh,
    Connected,
    ConnectionLost,
    /// The broker answered and rejected the session (bad credentials, etc.).
    Refused,
    /// The broker could not be reached at all.
    Unreachable,
}

/// Protocol-level failures, folded into boolean results at the session surface.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("broker refused connection: {0}")]
    Refused(String),
    #[error("broker unreachable: {0}")]
    Unreachable(String),
    #[error("not connected")]
    NotConnected,
    #[error("publish rejected: {0}")]
    Publish(String),
    #[error("subscribe rejected: {0}")]
    Subscribe(String),
}

/// Narrow interface over an MQTT protocol implementation.
///
/// Implementations own the transport handle and track the connection state
/// they last observed; `connected()` must reflect that observation without
/// performing I/O. All methods are driven from a single logical thread.
#[async_trait]
pub trait ProtocolClient: Send {
    /// Perform one connect attempt, resolving on broker acknowledgement or
    /// failure. Callers bound the attempt with their own timeout.
    async fn connect(
        &mut self,
        client_id: &str,
        credentials: Option<Credentials<'_>>,
    ) -> Result<(), LinkError>;

    /// Send one message. Completion means handed to the protocol layer, not
    /// broker-acknowledged.
    async fn publish(&mut self, topic: &str, payload: &[u8], retain: bool)
        -> Result<(), LinkError>;

    /// Register interest in an exact topic.
    async fn subscribe(&mut self, topic: &str) -> Result<(), LinkError>;

    /// Pump one unit of I/O, waiting at most `wait` for something to arrive.
    async fn poll(&mut self, wait: Duration) -> LinkEvent;

    /// Last observed connection state; no I/O.
    fn connected(&self) -> bool;

    /// Informational status code for diagnostics.
    fn state(&self) -> LinkState;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_error_display_is_nonempty() {
        let errors = vec![
            LinkError::Refused("bad credentials".to_string()),
            LinkError::Unreachable("connection refused".to_string()),
            LinkError::NotConnected,
            LinkError::Publish("queue closed".to_string()),
            LinkError::Subscribe("queue closed".to_string()),
        ];

        for error in errors {
            assert!(!error.to_string().is_empty());
        }
    }

    #[test]
    fn link_event_equality() {
        assert_eq!(LinkEvent::Idle, LinkEvent::Idle);
        assert_ne!(LinkEvent::Idle, LinkEvent::Disconnected);
        assert_eq!(
            LinkEvent::Message {
                topic: "t".to_string(),
                payload: b"p".to_vec()
            },
            LinkEvent::Message {
                topic: "t".to_string(),
                payload: b"p".to_vec()
            }
        );
    }
}
