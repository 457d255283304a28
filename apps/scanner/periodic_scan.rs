use crate::scanner::{LogScanner, ScanError, ScanReport};
use alloy::primitives::Address;
use std::{sync::Arc, time::Duration};
use tokio::time::{MissedTickBehavior, interval, sleep};
use tracing::{error, info, instrument, warn};

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    /// Doubles the base delay per failed attempt.
    fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

/// Runs `scanner.scan` once, then retries up to `max_retries` times while it
/// fails. Every attempt resumes from the persisted cursor.
#[instrument(skip(scanner, policy), fields(governor = %governor))]
pub async fn scan_with_retry(
    scanner: &LogScanner,
    governor: Address,
    policy: RetryPolicy,
) -> Result<ScanReport, ScanError> {
    let max_attempts = policy.max_retries.saturating_add(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match scanner.scan(governor).await {
            Ok(report) => return Ok(report),
            Err(e) if attempt < max_attempts => {
                let delay = policy.delay_for(attempt);
                warn!(
                    attempt,
                    max_attempts,
                    delay = ?delay,
                    error = %e,
                    "Scan failed, retrying"
                );
                sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Scans every governor once per `period`, forever.
pub async fn run_periodic_scan(
    scanner: Arc<LogScanner>,
    governors: Vec<Address>,
    period: Duration,
    policy: RetryPolicy,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        for governor in &governors {
            match scan_with_retry(&scanner, *governor, policy).await {
                Ok(report) => info!(
                    governor = %governor,
                    inserted = report.proposals_inserted,
                    total = report.proposals_total,
                    "Periodic scan completed"
                ),
                Err(e) => error!(
                    governor = %governor,
                    error = %e,
                    "Periodic scan failed after retries"
                ),
            }
        }
    }
}
