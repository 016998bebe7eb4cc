//! Engine configuration.

/// Configuration for the signing engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Producer string stamped into assembled document metadata.
    pub producer: String,

    /// Default expiry applied to envelopes created without an explicit
    /// `expires_at`, in days. `None` leaves such envelopes without expiry.
    pub default_expiry_days: Option<i64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineConfig {
    /// Create configuration with defaults.
    pub fn new() -> Self {
        Self {
            producer: format!("esign_engine {}", env!("CARGO_PKG_VERSION")),
            default_expiry_days: None,
        }
    }

    /// Set the metadata producer string.
    pub fn with_producer(mut self, producer: impl Into<String>) -> Self {
        self.producer = producer.into();
        self
    }

    /// Set a default envelope expiry in days.
    pub fn with_default_expiry_days(mut self, days: i64) -> Self {
        self.default_expiry_days = Some(days);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = EngineConfig::new()
            .with_producer("acme-sign")
            .with_default_expiry_days(30);
        assert_eq!(config.producer, "acme-sign");
        assert_eq!(config.default_expiry_days, Some(30));
    }

    #[test]
    fn test_default_has_no_expiry() {
        assert!(EngineConfig::default().default_expiry_days.is_none());
    }
}
