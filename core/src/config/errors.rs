use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("configuration validation failed: {reason}")]
    ValidationFailed { reason: String },

    #[error("failed to load configuration: {0}")]
    LoadError(String),

    /// A `[exchanges.<name>]` table that does not fit the venue's config type.
    #[error("invalid [exchanges.{exchange}] section: {reason}")]
    ExchangeSection { exchange: String, reason: String },
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        ConfigError::LoadError(err.to_string())
    }
}
