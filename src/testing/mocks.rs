//! Mock implementations for testing
//!
//! [`MockLink`] implements [`ProtocolClient`] against in-memory queues:
//! connect outcomes are scripted, inbound messages are queued by the test,
//! and every call the session makes is recorded for assertions. A cloneable
//! [`MockHandle`] keeps the recorded state reachable after the link has been
//! moved into a session manager.

use crate::link::{Credentials, LinkError, LinkEvent, LinkState, ProtocolClient};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One recorded publish call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishRecord {
    pub topic: String,
    pub payload: Vec<u8>,
    pub retain: bool,
}

/// One recorded connect attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRecord {
    pub client_id: String,
    pub username: Option<String>,
}

/// Shared view into a [`MockLink`]'s state, usable after the link itself has
/// been moved into the code under test.
#[derive(Debug, Clone, Default)]
pub struct MockHandle {
    pub connect_script: Arc<Mutex<VecDeque<bool>>>,
    pub connect_attempts: Arc<Mutex<Vec<ConnectRecord>>>,
    pub subscriptions: Arc<Mutex<Vec<String>>>,
    pub published: Arc<Mutex<Vec<PublishRecord>>>,
    pub inbound: Arc<Mutex<VecDeque<(String, Vec<u8>)>>>,
    pub online: Arc<AtomicBool>,
    pub fail_publish: Arc<AtomicBool>,
    pub stall_poll: Arc<AtomicBool>,
}

impl MockHandle {
    /// Queue scripted outcomes for upcoming connect attempts; once the
    /// script drains, the link falls back to its default behavior.
    pub fn script_connect(&self, outcomes: &[bool]) {
        let mut script = self.connect_script.lock().expect("connect script");
        script.extend(outcomes.iter().copied());
    }

    /// Simulate a broker-side message delivery.
    pub fn queue_inbound(&self, topic: &str, payload: &[u8]) {
        self.inbound
            .lock()
            .expect("inbound queue")
            .push_back((topic.to_owned(), payload.to_vec()));
    }

    /// Simulate the broker dropping the connection.
    pub fn drop_link(&self) {
        self.online.store(false, Ordering::SeqCst);
    }

    pub fn connect_attempt_count(&self) -> usize {
        self.connect_attempts.lock().expect("connect log").len()
    }

    pub fn subscribed(&self) -> Vec<String> {
        self.subscriptions.lock().expect("subscription log").clone()
    }

    pub fn publishes(&self) -> Vec<PublishRecord> {
        self.published.lock().expect("publish log").clone()
    }
}

/// Scripted protocol client for tests.
pub struct MockLink {
    default_accept: bool,
    handle: MockHandle,
}

impl MockLink {
    /// A link whose connect attempts succeed unless scripted otherwise.
    pub fn new() -> Self {
        Self {
            default_accept: true,
            handle: MockHandle::default(),
        }
    }

    /// A link whose connect attempts fail unless scripted otherwise.
    pub fn unreachable() -> Self {
        Self {
            default_accept: false,
            handle: MockHandle::default(),
        }
    }

    /// Clone the shared state before moving the link into the code under test.
    pub fn handle(&self) -> MockHandle {
        self.handle.clone()
    }
}

impl Default for MockLink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProtocolClient for MockLink {
    async fn connect(
        &mut self,
        client_id: &str,
        credentials: Option<Credentials<'_>>,
    ) -> Result<(), LinkError> {
        self.handle
            .connect_attempts
            .lock()
            .expect("connect log")
            .push(ConnectRecord {
                client_id: client_id.to_owned(),
                username: credentials.map(|c| c.username.to_owned()),
            });

        let accept = self
            .handle
            .connect_script
            .lock()
            .expect("connect script")
            .pop_front()
            .unwrap_or(self.default_accept);

        if accept {
            self.handle.online.store(true, Ordering::SeqCst);
            Ok(())
        } else {
            Err(LinkError::Unreachable("scripted refusal".to_string()))
        }
    }

    async fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        retain: bool,
    ) -> Result<(), LinkError> {
        if self.handle.fail_publish.load(Ordering::SeqCst) {
            // A failing write doubles as silent-disconnect detection.
            self.handle.online.store(false, Ordering::SeqCst);
            return Err(LinkError::Publish("scripted write failure".to_string()));
        }

        if !self.handle.online.load(Ordering::SeqCst) {
            return Err(LinkError::NotConnected);
        }

        self.handle
            .published
            .lock()
            .expect("publish log")
            .push(PublishRecord {
                topic: topic.to_owned(),
                payload: payload.to_vec(),
                retain,
            });
        Ok(())
    }

    async fn subscribe(&mut self, topic: &str) -> Result<(), LinkError> {
        if !self.handle.online.load(Ordering::SeqCst) {
            return Err(LinkError::NotConnected);
        }

        self.handle
            .subscriptions
            .lock()
            .expect("subscription log")
            .push(topic.to_owned());
        Ok(())
    }

    async fn poll(&mut self, wait: Duration) -> LinkEvent {
        if !self.handle.online.load(Ordering::SeqCst) {
            return LinkEvent::Disconnected;
        }

        if self.handle.stall_poll.load(Ordering::SeqCst) {
            // Model a window where nothing arrives until the wait elapses.
            tokio::time::sleep(wait).await;
            return LinkEvent::Idle;
        }

        match self.handle.inbound.lock().expect("inbound queue").pop_front() {
            Some((topic, payload)) => LinkEvent::Message { topic, payload },
            None => LinkEvent::Idle,
        }
    }

    fn connected(&self) -> bool {
        self.handle.online.load(Ordering::SeqCst)
    }

    fn state(&self) -> LinkState {
        if self.connected() {
            LinkState::Connected
        } else {
            LinkState::ConnectionLost
        }
    }
}
