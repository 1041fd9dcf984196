//! Configuration loading integration tests

use homelink::config::{ConfigError, ControllerConfig};
use std::io::Write;
use tempfile::NamedTempFile;

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp config file");
    file.write_all(content.as_bytes()).expect("write config");
    file
}

#[test]
fn load_minimal_config_from_file() {
    let file = write_config(
        r#"
[device]
id = "bedroom-controller"

[broker]
host = "mqtt.lan"
"#,
    );

    let config = ControllerConfig::load_from_file(file.path()).expect("load config");
    assert_eq!(config.device.id, "bedroom-controller");
    assert_eq!(config.broker.host, "mqtt.lan");
    assert_eq!(config.broker.port, 1883);
    assert_eq!(config.session.reconnect_cooldown_secs, 15);
}

#[test]
fn load_full_config_from_file() {
    let file = write_config(
        r#"
[device]
id = "hall-controller"

[broker]
host = "10.0.0.5"
port = 1884
username = "automation"
password = "hunter2"

[session]
reconnect_cooldown_secs = 30
handler_capacity = 12

[settings]
path = "/data/settings.json"
"#,
    );

    let config = ControllerConfig::load_from_file(file.path()).expect("load config");
    assert_eq!(config.broker.port, 1884);
    assert_eq!(config.broker.password.as_deref(), Some("hunter2"));
    assert_eq!(config.session.reconnect_cooldown_secs, 30);
    assert_eq!(config.session.handler_capacity, 12);

    let options = config.session_options();
    assert_eq!(options.device_id, "hall-controller");
    assert_eq!(
        options.timing.reconnect_cooldown,
        std::time::Duration::from_secs(30)
    );
}

#[test]
fn missing_file_is_an_error() {
    let result = ControllerConfig::load_from_file(std::path::Path::new("/nonexistent/homelink.toml"));
    assert!(matches!(result, Err(ConfigError::FileRead(_))));
}

#[test]
fn malformed_toml_is_an_error() {
    let file = write_config("[device\nid = broken");
    let result = ControllerConfig::load_from_file(file.path());
    assert!(matches!(result, Err(ConfigError::TomlParse(_))));
}

#[test]
fn missing_broker_section_is_an_error() {
    let file = write_config(
        r#"
[device]
id = "bedroom-controller"
"#,
    );
    let result = ControllerConfig::load_from_file(file.path());
    assert!(matches!(result, Err(ConfigError::TomlParse(_))));
}

#[test]
fn bad_device_id_is_an_error() {
    let file = write_config(
        r#"
[device]
id = "bedroom controller!"

[broker]
host = "mqtt.lan"
"#,
    );
    let result = ControllerConfig::load_from_file(file.path());
    assert!(matches!(result, Err(ConfigError::InvalidDeviceId(_))));
}

#[test]
fn partial_credentials_parse_cleanly() {
    // Only a username: valid config; the session layer treats it as anonymous.
    let file = write_config(
        r#"
[device]
id = "bedroom-controller"

[broker]
host = "mqtt.lan"
username = "automation"
"#,
    );

    let config = ControllerConfig::load_from_file(file.path()).expect("load config");
    let options = config.session_options();
    assert_eq!(options.username.as_deref(), Some("automation"));
    assert_eq!(options.password, None);
}
