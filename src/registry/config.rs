//! Registry configuration

use std::time::Duration;

/// Configuration for the connection registry and its delivery queues
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Capacity of each connection's outbound queue
    pub outbound_capacity: usize,

    /// How long a broadcast waits for room in a connection's queue
    pub delivery_timeout: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            outbound_capacity: 64,
            delivery_timeout: Duration::from_secs(2),
        }
    }
}

impl RegistryConfig {
    /// Set the outbound queue capacity (minimum 1)
    pub fn outbound_capacity(mut self, capacity: usize) -> Self {
        self.outbound_capacity = capacity.max(1);
        self
    }

    /// Set the per-connection delivery timeout
    pub fn delivery_timeout(mut self, timeout: Duration) -> Self {
        self.delivery_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RegistryConfig::default();
        assert_eq!(config.outbound_capacity, 64);
        assert_eq!(config.delivery_timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_outbound_capacity_floor() {
        let config = RegistryConfig::default().outbound_capacity(0);
        assert_eq!(config.outbound_capacity, 1);
    }
}
