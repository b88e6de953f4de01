//! Connection Quality Classification
//!
//! Supplies the gateway fan-out width used by source resolution.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Coarse classification of the listener's connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkQuality {
    /// Fast, stable link (wired or strong WiFi)
    Excellent,
    /// Typical broadband or good cellular
    Good,
    /// Congested or weak cellular
    Fair,
    /// Barely usable link
    Poor,
}

impl LinkQuality {
    /// Number of alternate gateways worth including beyond the proxy and
    /// preferred entries.
    ///
    /// On a weak link every extra candidate is another slow failed fetch
    /// before the working one, so the fan-out narrows with quality.
    pub fn alternate_gateway_count(&self) -> usize {
        match self {
            LinkQuality::Excellent => 4,
            LinkQuality::Good => 3,
            LinkQuality::Fair => 2,
            LinkQuality::Poor => 1,
        }
    }
}

/// Connection probe implemented by the host.
///
/// # Platform Support
///
/// - **Web**: Network Information API effective type
/// - **Desktop**: reachability probe against the preferred gateway
/// - **Mobile**: connectivity manager radio class
#[async_trait]
pub trait ConnectionMonitor: Send + Sync {
    /// Classify the current connection.
    async fn link_quality(&self) -> LinkQuality;

    /// Fan-out width for the current connection.
    async fn alternate_gateway_count(&self) -> usize {
        self.link_quality().await.alternate_gateway_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::mock;

    mock! {
        Monitor {}

        #[async_trait]
        impl ConnectionMonitor for Monitor {
            async fn link_quality(&self) -> LinkQuality;
        }
    }

    #[test]
    fn fan_out_narrows_with_quality() {
        assert!(
            LinkQuality::Excellent.alternate_gateway_count()
                > LinkQuality::Poor.alternate_gateway_count()
        );
        assert_eq!(LinkQuality::Poor.alternate_gateway_count(), 1);
    }

    #[tokio::test]
    async fn default_fan_out_follows_classification() {
        let mut monitor = MockMonitor::new();
        monitor
            .expect_link_quality()
            .return_const(LinkQuality::Fair);
        assert_eq!(monitor.alternate_gateway_count().await, 2);
    }
}
