#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Notification send failed: {message}")]
    SendFailed { message: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFailed {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to write config file '{path}': {source}")]
    WriteFailed {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to serialize config: {source}")]
    SerializeFailed {
        #[from]
        source: serde_json::Error,
    },
}
