//! Gateway silence watchdog.
//!
//! The serial gateway occasionally wedges: its TCP side stays up but no
//! bus bytes flow. The watchdog watches the time since the last
//! checksum-valid inbound frame and, past a threshold, fires a recovery
//! action. The liveness timestamp is reset before recovery runs, so one
//! silent period triggers exactly one recovery attempt.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, warn};

use crate::traffic::TrafficLog;

/// Something that can kick a wedged gateway back to life.
#[async_trait]
pub trait RecoveryAction: Send + Sync {
    /// Attempt recovery. Errors are logged by the watchdog, not retried
    /// immediately; the next silent period triggers the next attempt.
    async fn recover(&self) -> anyhow::Result<()>;

    /// Short name for logs.
    fn describe(&self) -> &str;
}

/// Recovery action that only logs. Used when auto reboot is disabled.
pub struct LogOnlyRecovery;

#[async_trait]
impl RecoveryAction for LogOnlyRecovery {
    async fn recover(&self) -> anyhow::Result<()> {
        Ok(())
    }

    fn describe(&self) -> &str {
        "log-only"
    }
}

/// Watches inbound silence and drives recovery.
pub struct SilenceWatchdog {
    timeout: Duration,
    cooldown: Duration,
}

impl SilenceWatchdog {
    /// New watchdog with the given silence threshold and post-recovery
    /// cooldown.
    pub fn new(timeout: Duration, cooldown: Duration) -> Self {
        SilenceWatchdog { timeout, cooldown }
    }

    /// Check the silence clock once; fire recovery if it crossed the
    /// threshold.
    ///
    /// Returns whether recovery fired. On firing, the call sleeps for the
    /// cooldown before returning; the bus is down during a gateway reboot
    /// and dispatching into it would only burn send budget.
    pub async fn check(&self, traffic: &TrafficLog, action: &dyn RecoveryAction) -> bool {
        let silence = traffic.silence();
        if silence < self.timeout {
            return false;
        }
        warn!(
            silence_secs = silence.as_secs(),
            action = action.describe(),
            "no valid frames from gateway, attempting recovery"
        );
        metrics::counter!("wallpad_gateway_recoveries_total").increment(1);
        // Reset first: a failed recovery must wait out a full silent
        // period before the next attempt.
        traffic.mark_valid_rx();
        if let Err(e) = action.recover().await {
            error!(error = %e, "gateway recovery failed");
        }
        tokio::time::sleep(self.cooldown).await;
        true
    }
}
