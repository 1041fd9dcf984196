//! homelink - connectivity core for a home-automation controller
//!
//! This crate provides the non-blocking MQTT session layer a controller runs
//! inside its main loop, plus the persisted user settings the controller acts
//! on:
//! - Session lifecycle management (connect, loss detection, rate-limited
//!   reconnection) with a hard per-`tick()` time budget
//! - Fixed-capacity topic-handler routing with allocation-free dispatch
//! - Publish/subscribe surface namespaced under the device identifier
//! - Validated JSON settings persistence
//!
//! # Quick Start
//!
//! ```no_run
//! use homelink::config::BrokerSection;
//! use homelink::link::RumqttLink;
//! use homelink::session::{SessionManager, SessionOptions};
//!
//! #[tokio::main]
//! async fn main() {
//!     let broker = BrokerSection {
//!         host: "mqtt.lan".to_string(),
//!         ..Default::default()
//!     };
//!     let link = RumqttLink::new(broker);
//!     let mut session = SessionManager::new(link, SessionOptions::for_device("hall-controller"));
//!     session.begin();
//!
//!     session
//!         .add_handler("hall-controller/cmd", |_topic: &str, payload: &[u8]| {
//!             println!("command: {}", String::from_utf8_lossy(payload));
//!         })
//!         .await;
//!
//!     // The caller owns the control loop; one bounded tick per iteration.
//!     loop {
//!         session.tick().await;
//!         tokio::time::sleep(std::time::Duration::from_millis(50)).await;
//!     }
//! }
//! ```

pub mod config;
pub mod error;
pub mod link;
pub mod observability;
pub mod session;
pub mod settings;
pub mod testing;

pub use config::ControllerConfig;
pub use error::{ControllerError, ControllerResult};
pub use link::{LinkError, LinkEvent, ProtocolClient, RumqttLink};
pub use session::{HandlerRegistry, SessionManager, SessionOptions, SessionTiming, TopicHandler};
pub use settings::{Settings, SettingsStore};
