//! Session lifecycle state machine and per-tick message pump
//!
//! Connection loss is detected passively by querying the protocol client at
//! the top of every tick; reconnection is rate-limited by a cooldown and each
//! connect cycle is cut off by a hard timeout. Handler dispatch happens
//! synchronously inside the tick, in broker delivery order.

use super::registry::{HandlerRegistry, TopicHandler, DEFAULT_HANDLER_CAPACITY};
use crate::link::{Credentials, LinkEvent, ProtocolClient};
use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Pause between connect retries inside one connect cycle.
const CONNECT_RETRY_PAUSE: Duration = Duration::from_millis(10);

/// Wall-clock bounds for the session's internal loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTiming {
    /// Minimum interval between reconnect cycles while disconnected.
    pub reconnect_cooldown: Duration,
    /// Hard cap on one connect cycle (covers all retries inside it).
    pub connect_timeout: Duration,
    /// Hard cap on draining inbound messages within one tick.
    pub pump_slice: Duration,
}

impl Default for SessionTiming {
    fn default() -> Self {
        Self {
            reconnect_cooldown: Duration::from_secs(15),
            connect_timeout: Duration::from_secs(3),
            pump_slice: Duration::from_millis(20),
        }
    }
}

/// Construction-time session parameters.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub device_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Suffix the client identifier with a random disambiguator so broker-side
    /// sessions cannot collide across reboots.
    pub unique_client_id: bool,
    pub timing: SessionTiming,
    pub handler_capacity: usize,
}

impl SessionOptions {
    pub fn for_device(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            username: None,
            password: None,
            unique_client_id: true,
            timing: SessionTiming::default(),
            handler_capacity: DEFAULT_HANDLER_CAPACITY,
        }
    }
}

/// Externally observable connection status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Disconnected,
    Connected,
}

/// Broker session manager driven by a caller-owned control loop.
pub struct SessionManager<C> {
    link: C,
    registry: HandlerRegistry,
    device_id: String,
    username: Option<String>,
    password: Option<String>,
    unique_client_id: bool,
    timing: SessionTiming,
    status: SessionStatus,
    last_connect_attempt: Option<Instant>,
}

impl<C: ProtocolClient> SessionManager<C> {
    pub fn new(link: C, options: SessionOptions) -> Self {
        Self {
            link,
            registry: HandlerRegistry::with_capacity(options.handler_capacity),
            device_id: options.device_id,
            username: options.username,
            password: options.password,
            unique_client_id: options.unique_client_id,
            timing: options.timing,
            status: SessionStatus::Disconnected,
            last_connect_attempt: None,
        }
    }

    /// Override the device identifier used for client ids and topic
    /// namespacing. Takes effect on the next connect cycle.
    pub fn set_device_id(&mut self, device_id: impl Into<String>) {
        self.device_id = device_id.into();
    }

    /// One-time wiring check. Does not connect; the first connect cycle runs
    /// inside [`tick`](Self::tick) once the cooldown allows it.
    pub fn begin(&mut self) -> bool {
        if self.device_id.is_empty() {
            warn!("session not started: device id is empty");
            return false;
        }

        info!(device_id = %self.device_id, "session manager ready");
        true
    }

    /// One bounded maintenance step: refresh status, then either drain
    /// inbound traffic (connected) or attempt a reconnect cycle (cooldown
    /// permitting). Returns the connection status after the step.
    pub async fn tick(&mut self) -> bool {
        self.refresh_status();

        match self.status {
            SessionStatus::Connected => self.pump_inbound().await,
            SessionStatus::Disconnected => {
                if self.reconnect_due() {
                    self.last_connect_attempt = Some(Instant::now());
                    self.try_connect().await;
                }
            }
        }

        self.connected()
    }

    /// Register a handler for an exact topic.
    ///
    /// Fails only on a full handler table. When the session is already
    /// connected the subscription is issued immediately; otherwise it is
    /// deferred to the next successful connect.
    pub async fn add_handler<H>(&mut self, topic: &str, handler: H) -> bool
    where
        H: TopicHandler + 'static,
    {
        if !self.registry.insert(topic, handler) {
            warn!(topic, "handler table full, registration rejected");
            return false;
        }

        if self.connected() {
            match self.link.subscribe(topic).await {
                Ok(()) => debug!(topic, "subscribed"),
                Err(err) => {
                    warn!(topic, error = %err, "subscribe failed, deferred to next reconnect")
                }
            }
        }

        true
    }

    /// Drop the handler for `topic`. The broker subscription is left in
    /// place; unmatched inbound messages are dropped at dispatch time.
    pub fn remove_handler(&mut self, topic: &str) -> bool {
        let removed = self.registry.remove(topic);
        if removed {
            debug!(topic, "handler removed");
        }
        removed
    }

    /// Publish `payload` under `device_id/topic` with the retain flag set.
    ///
    /// Returns `false` without touching the link when disconnected. The
    /// status is re-read after the attempt since a failed write can be the
    /// first sign of a dropped link.
    pub async fn publish(&mut self, topic: &str, payload: &[u8]) -> bool {
        if !self.connected() {
            debug!(topic, "publish skipped while disconnected");
            return false;
        }

        let full_topic = format!("{}/{}", self.device_id, topic);
        let sent = match self.link.publish(&full_topic, payload, true).await {
            Ok(()) => true,
            Err(err) => {
                warn!(topic = %full_topic, error = %err, "publish failed");
                false
            }
        };

        self.refresh_status();
        sent
    }

    /// Serialize `value` to JSON and publish it; serialization failure is
    /// reported as a publish failure.
    pub async fn publish_json<T: Serialize>(&mut self, topic: &str, value: &T) -> bool {
        match serde_json::to_vec(value) {
            Ok(payload) => self.publish(topic, &payload).await,
            Err(err) => {
                warn!(topic, error = %err, "payload serialization failed");
                false
            }
        }
    }

    pub fn connected(&self) -> bool {
        self.status == SessionStatus::Connected
    }

    /// Human-readable summary for diagnostics; never used for control flow.
    pub fn status(&self) -> String {
        match self.status {
            SessionStatus::Disconnected => "disconnected".to_string(),
            SessionStatus::Connected => {
                format!("connected (handlers: {})", self.registry.len())
            }
        }
    }

    pub fn handler_count(&self) -> usize {
        self.registry.len()
    }

    fn refresh_status(&mut self) {
        self.status = if self.link.connected() {
            SessionStatus::Connected
        } else {
            SessionStatus::Disconnected
        };
    }

    fn reconnect_due(&self) -> bool {
        match self.last_connect_attempt {
            None => true,
            Some(at) => at.elapsed() >= self.timing.reconnect_cooldown,
        }
    }

    /// Drain inbound messages for at most one pump slice, yielding to the
    /// runtime between polls so one burst cannot starve the control loop.
    async fn pump_inbound(&mut self) {
        let deadline = Instant::now() + self.timing.pump_slice;

        loop {
            let budget = deadline.saturating_duration_since(Instant::now());
            if budget.is_zero() {
                break;
            }

            match self.link.poll(budget).await {
                LinkEvent::Message { topic, payload } => {
                    if !self.registry.dispatch(&topic, &payload) {
                        debug!(topic = %topic, "no handler registered, message dropped");
                    }
                }
                LinkEvent::Housekeeping => {}
                LinkEvent::Idle => break,
                LinkEvent::Disconnected => {
                    warn!("link lost while pumping inbound messages");
                    self.status = SessionStatus::Disconnected;
                    break;
                }
            }

            tokio::task::yield_now().await;
        }
    }

    /// One reconnect cycle, bounded by the connect timeout. Retries the
    /// underlying connect with a short pause between attempts; on success,
    /// resubscribes every registered topic before reporting connected.
    async fn try_connect(&mut self) {
        let client_id = self.client_identifier();
        let credentials = self.credential_pair();
        let deadline = Instant::now() + self.timing.connect_timeout;

        debug!(client_id = %client_id, "starting connect cycle");

        loop {
            let budget = deadline.saturating_duration_since(Instant::now());
            if budget.is_zero() {
                break;
            }

            let creds = credentials.as_ref().map(|(username, password)| Credentials {
                username: username.as_str(),
                password: password.as_str(),
            });

            match tokio::time::timeout(budget, self.link.connect(&client_id, creds)).await {
                Ok(Ok(())) => {
                    self.status = SessionStatus::Connected;
                    self.resubscribe_all().await;
                    info!(client_id = %client_id, "connected to broker");
                    return;
                }
                Ok(Err(err)) => debug!(error = %err, "connect attempt failed"),
                Err(_) => break,
            }

            tokio::time::sleep(CONNECT_RETRY_PAUSE).await;
        }

        debug!("connect cycle exhausted, retrying after cooldown");
        self.status = SessionStatus::Disconnected;
    }

    /// Reissue every subscription still marked in the registry, in
    /// registration order. Runs exactly once per successful connect, before
    /// the transition is observable to the caller.
    async fn resubscribe_all(&mut self) {
        for topic in self.registry.subscribed_topics() {
            match self.link.subscribe(topic).await {
                Ok(()) => debug!(topic, "resubscribed"),
                Err(err) => warn!(topic, error = %err, "resubscription failed"),
            }
        }
    }

    fn client_identifier(&self) -> String {
        if self.unique_client_id {
            let disambiguator = Uuid::new_v4().simple().to_string();
            format!("{}-{}", self.device_id, &disambiguator[..8])
        } else {
            self.device_id.clone()
        }
    }

    /// Only a complete username/password pair counts as credentials; a
    /// partial pair connects anonymously.
    fn credential_pair(&self) -> Option<(String, String)> {
        match (&self.username, &self.password) {
            (Some(username), Some(password))
                if !username.is_empty() && !password.is_empty() =>
            {
                Some((username.clone(), password.clone()))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockLink;

    fn session(options: SessionOptions) -> SessionManager<MockLink> {
        SessionManager::new(MockLink::new(), options)
    }

    #[test]
    fn begin_rejects_empty_device_id() {
        let mut manager = session(SessionOptions::for_device(""));
        assert!(!manager.begin());

        manager.set_device_id("bedroom-controller");
        assert!(manager.begin());
    }

    #[test]
    fn status_reports_disconnected_initially() {
        let manager = session(SessionOptions::for_device("dev-1"));
        assert!(!manager.connected());
        assert_eq!(manager.status(), "disconnected");
    }

    #[test]
    fn partial_credentials_mean_anonymous_connect() {
        let mut options = SessionOptions::for_device("dev-1");
        options.username = Some("admin".to_string());
        options.password = None;
        assert_eq!(session(options).credential_pair(), None);

        let mut options = SessionOptions::for_device("dev-1");
        options.username = Some("admin".to_string());
        options.password = Some(String::new());
        assert_eq!(session(options).credential_pair(), None);

        let mut options = SessionOptions::for_device("dev-1");
        options.username = Some("admin".to_string());
        options.password = Some("hunter2".to_string());
        assert_eq!(
            session(options).credential_pair(),
            Some(("admin".to_string(), "hunter2".to_string()))
        );
    }

    #[test]
    fn unique_client_id_appends_disambiguator() {
        let manager = session(SessionOptions::for_device("dev-1"));
        let first = manager.client_identifier();
        let second = manager.client_identifier();

        assert!(first.starts_with("dev-1-"));
        assert_ne!(first, "dev-1");
        // Random suffix: two draws must differ.
        assert_ne!(first, second);
    }

    #[test]
    fn stable_client_id_when_disambiguator_disabled() {
        let mut options = SessionOptions::for_device("dev-1");
        options.unique_client_id = false;
        let manager = session(options);

        assert_eq!(manager.client_identifier(), "dev-1");
    }

    #[tokio::test]
    async fn status_string_counts_handlers_when_connected() {
        let mut manager = session(SessionOptions::for_device("dev-1"));
        manager.add_handler("dev-1/cmd", |_: &str, _: &[u8]| {}).await;
        manager.add_handler("dev-1/cfg", |_: &str, _: &[u8]| {}).await;

        manager.tick().await;
        assert_eq!(manager.status(), "connected (handlers: 2)");
    }

    #[test]
    fn timing_defaults_match_design_values() {
        let timing = SessionTiming::default();
        assert_eq!(timing.reconnect_cooldown, Duration::from_secs(15));
        assert_eq!(timing.connect_timeout, Duration::from_secs(3));
        assert_eq!(timing.pump_slice, Duration::from_millis(20));
    }
}
