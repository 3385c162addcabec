// src/errors.rs
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SettingsError {
    // Parse family: fatal to the load.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("XDG directory error: {0}")]
    XdgError(#[from] xdg::BaseDirectoriesError),

    #[error("No settings file found (searched {searched})")]
    SettingsNotFound { searched: String },

    // Config family: semantic violations, surfaced to the caller as-is.
    #[error("Provider '{provider}' has no instance marked default: true")]
    MissingDefault { provider: String },

    #[error("Provider '{provider}' has multiple instances marked default: true ({names:?})")]
    AmbiguousDefault { provider: String, names: Vec<String> },

    #[error("Provider '{provider}' has a malformed instance entry: {detail}")]
    MalformedInstance { provider: String, detail: String },

    #[error("Host must be constructed with a hostname")]
    MissingHostname,

    #[error("Unknown log level '{value}' (expected trace, debug, info, warn, or error)")]
    UnknownLogLevel { value: String },

    // Lookup family: requests for things the document does not define.
    #[error("Unknown nickname '{name}'")]
    UnknownNick { name: String },

    #[error("Unknown provider '{name}'")]
    UnknownProvider { name: String },

    #[error("Provider '{provider}' has no instance named '{name}'")]
    UnknownInstance { provider: String, name: String },
}
