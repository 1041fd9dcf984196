//! Top-level error type for the controller binary
//!
//! Session operations report failures as booleans by design (every failure
//! there is local and survivable); this type covers the paths that genuinely
//! abort startup, such as unreadable configuration.

use crate::config::ConfigError;
use crate::link::LinkError;
use crate::settings::SettingsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("link error: {0}")]
    Link(#[from] LinkError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for controller operations.
pub type ControllerResult<T> = Result<T, ControllerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_converts() {
        let error: ControllerError =
            ConfigError::InvalidDeviceId("bad id".to_string()).into();
        assert!(error.to_string().contains("bad id"));
    }

    #[test]
    fn link_error_converts() {
        let error: ControllerError = LinkError::NotConnected.into();
        assert!(matches!(error, ControllerError::Link(_)));
    }

    #[test]
    fn error_display_is_nonempty() {
        let errors: Vec<ControllerError> = vec![
            ConfigError::InvalidConfig("missing broker".to_string()).into(),
            SettingsError::Invalid("bad schedule".to_string()).into(),
            LinkError::NotConnected.into(),
        ];

        for error in errors {
            assert!(!error.to_string().is_empty());
        }
    }
}
