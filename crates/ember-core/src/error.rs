//! Error types for Ember

use thiserror::Error;

/// The main error type for Ember operations
///
/// Only configuration loading is fallible. Per-frame simulation never
/// returns an error.
#[derive(Debug, Error)]
pub enum EmberError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(String),

    #[error("Unknown emitter '{child}' referenced by sub-emitter of '{parent}'")]
    UnknownEmitter { parent: String, child: String },

    #[error("Sub-emitter cycle detected: {0}")]
    SubEmitterCycle(String),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

/// Result type alias for Ember operations
pub type Result<T> = std::result::Result<T, EmberError>;

impl From<toml::de::Error> for EmberError {
    fn from(err: toml::de::Error) -> Self {
        EmberError::TomlParseError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_errors_convert() {
        let err: EmberError = toml::from_str::<toml::Table>("= nope")
            .unwrap_err()
            .into();
        assert!(matches!(err, EmberError::TomlParseError(_)));
    }

    #[test]
    fn unknown_emitter_message_names_both_sides() {
        let err = EmberError::UnknownEmitter {
            parent: "rocket".into(),
            child: "sparks".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("rocket"));
        assert!(msg.contains("sparks"));
    }
}
