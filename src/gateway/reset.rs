//! Recurring reset of the sent-defaults sets.

use super::registry::SessionRegistry;
use autoreply_core::error::AutoReplyError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

/// Runtime-adjustable reset period.
///
/// Every change restarts the running countdown with the new period.
pub struct ResetTimer {
    interval: watch::Sender<Duration>,
}

impl ResetTimer {
    pub fn new(minutes: u64) -> Result<Self, AutoReplyError> {
        let period = minutes_to_duration(minutes)?;
        let (interval, _) = watch::channel(period);
        Ok(Self { interval })
    }

    /// Replace the period. Returns the new period in milliseconds.
    pub fn set_minutes(&self, minutes: u64) -> Result<u64, AutoReplyError> {
        let period = minutes_to_duration(minutes)?;
        self.interval.send_replace(period);
        info!("reset interval set to {minutes} minute(s)");
        Ok(period.as_millis() as u64)
    }

    pub fn period(&self) -> Duration {
        *self.interval.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Duration> {
        self.interval.subscribe()
    }
}

fn minutes_to_duration(minutes: u64) -> Result<Duration, AutoReplyError> {
    if minutes == 0 {
        return Err(AutoReplyError::InvalidInterval(
            "reset interval must be at least 1 minute".into(),
        ));
    }
    minutes
        .checked_mul(60_000)
        .map(Duration::from_millis)
        .ok_or_else(|| {
            AutoReplyError::InvalidInterval(format!("reset interval of {minutes} minutes is too large"))
        })
}

/// Clear all sessions' sent sets every period until the timer is dropped.
pub(super) async fn reset_loop(registry: Arc<SessionRegistry>, mut interval: watch::Receiver<Duration>) {
    loop {
        let period = *interval.borrow_and_update();
        debug!("next default-message reset in {}s", period.as_secs());
        tokio::select! {
            _ = tokio::time::sleep(period) => {
                info!("reset interval elapsed");
                registry.reset_all().await;
            }
            changed = interval.changed() => {
                if changed.is_err() {
                    break;
                }
                debug!("reset interval changed, restarting countdown");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_minutes_rejected() {
        assert!(matches!(
            ResetTimer::new(0),
            Err(AutoReplyError::InvalidInterval(_))
        ));
        let timer = ResetTimer::new(5).unwrap();
        assert!(timer.set_minutes(0).is_err());
        assert_eq!(timer.period(), Duration::from_secs(300));
    }

    #[test]
    fn test_set_minutes_returns_millis() {
        let timer = ResetTimer::new(1440).unwrap();
        assert_eq!(timer.set_minutes(2).unwrap(), 120_000);
        assert_eq!(timer.period(), Duration::from_secs(120));
    }

    #[test]
    fn test_overflowing_minutes_rejected() {
        let timer = ResetTimer::new(1).unwrap();
        assert!(timer.set_minutes(u64::MAX).is_err());
    }

    #[tokio::test]
    async fn test_change_wakes_subscriber() {
        let timer = ResetTimer::new(10).unwrap();
        let mut rx = timer.subscribe();
        rx.borrow_and_update();
        timer.set_minutes(3).unwrap();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), Duration::from_secs(180));
    }
}
