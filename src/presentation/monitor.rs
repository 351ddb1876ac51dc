//! State polling loop.
//!
//! The facade never retries, so the stop policy lives here: transport
//! failures are counted and polling ends after a configured run of them.
//! A reading that arrives but cannot be decoded is logged and skipped.

use crate::domain::models::FanState;
use crate::domain::settings::MonitorSettings;
use crate::infrastructure::bluetooth::transport::GattTransport;
use crate::infrastructure::bluetooth::FanService;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    /// Stop after this many transport failures in a row. Zero behaves as one.
    pub max_consecutive_failures: u32,
}

impl From<&MonitorSettings> for PollPolicy {
    fn from(settings: &MonitorSettings) -> Self {
        Self {
            interval: Duration::from_secs(settings.poll_interval_secs),
            max_consecutive_failures: settings.max_consecutive_failures,
        }
    }
}

/// Why [`watch`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Shutdown,
    TransportFailures(u32),
}

/// Poll the fan state until `shutdown` resolves or the failure limit is hit.
///
/// `on_state` is called with every successfully decoded reading. The fan is
/// left connected; disconnecting is up to the caller.
pub async fn watch<T, S, F>(
    fan: &mut FanService<T>,
    policy: &PollPolicy,
    shutdown: S,
    mut on_state: F,
) -> StopReason
where
    T: GattTransport,
    S: Future<Output = ()>,
    F: FnMut(&FanState),
{
    let limit = policy.max_consecutive_failures.max(1);
    let mut failures = 0u32;
    tokio::pin!(shutdown);

    loop {
        match fan.get_state().await {
            Ok(state) => {
                failures = 0;
                on_state(&state);
            }
            Err(e) if e.is_transport() => {
                failures += 1;
                warn!("Reading state failed ({}/{}): {}", failures, limit, e);
                if failures >= limit {
                    return StopReason::TransportFailures(failures);
                }
            }
            Err(e) => warn!("Skipping unreadable state: {}", e),
        }

        tokio::select! {
            _ = &mut shutdown => {
                debug!("Monitor interrupted");
                return StopReason::Shutdown;
            }
            _ = tokio::time::sleep(policy.interval) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::infrastructure::bluetooth::protocol::{CharacteristicId, Protocol, SENSOR_DATA_UUID};
    use crate::infrastructure::bluetooth::transport::mock::MockTransport;

    fn sensor_data() -> Vec<u8> {
        let mut raw = Vec::new();
        for v in [1024u16, 84, 7, 1500] {
            raw.extend_from_slice(&v.to_le_bytes());
        }
        raw.extend_from_slice(&[0b0000_0011, 0, 0, 0]);
        raw
    }

    fn policy(max_consecutive_failures: u32) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(1),
            max_consecutive_failures,
        }
    }

    async fn fan(mock: &MockTransport) -> FanService<MockTransport> {
        FanService::connect(mock.clone(), Protocol::Current, "1234")
            .await
            .unwrap()
    }

    #[test]
    fn test_policy_from_settings() {
        let policy = PollPolicy::from(&MonitorSettings::default());
        assert_eq!(policy.interval, Duration::from_secs(2));
        assert_eq!(policy.max_consecutive_failures, 1);
    }

    #[tokio::test]
    async fn test_stops_after_consecutive_failures() {
        let mock = MockTransport::new()
            .with_value(CharacteristicId::Uuid(SENSOR_DATA_UUID), &sensor_data());
        let mut fan = fan(&mock).await;

        // fail, succeed, then fail twice in a row
        mock.fail_next(TransportError::Disconnected);
        let mut seen = 0;
        let reason = watch(&mut fan, &policy(2), std::future::pending(), |_| {
            seen += 1;
            if seen == 1 {
                mock.fail_next(TransportError::Disconnected);
                mock.fail_next(TransportError::Disconnected);
            }
        })
        .await;

        assert_eq!(reason, StopReason::TransportFailures(2));
        assert_eq!(seen, 1);
    }

    #[tokio::test]
    async fn test_zero_limit_stops_on_first_failure() {
        let mock = MockTransport::new();
        let mut fan = fan(&mock).await;
        // no sensor value stored: every read fails with CharacteristicNotFound
        let reason = watch(&mut fan, &policy(0), std::future::pending(), |_| {}).await;
        assert_eq!(reason, StopReason::TransportFailures(1));
    }

    #[tokio::test]
    async fn test_malformed_reading_is_skipped() {
        let mock = MockTransport::new()
            .with_value(CharacteristicId::Uuid(SENSOR_DATA_UUID), &[1, 2, 3]);
        let mut fan = fan(&mock).await;

        let mut seen = 0;
        let shutdown = tokio::time::sleep(Duration::from_millis(20));
        let reason = watch(&mut fan, &policy(1), shutdown, |_| seen += 1).await;
        assert_eq!(seen, 0);
        assert_eq!(reason, StopReason::Shutdown);
    }
}
