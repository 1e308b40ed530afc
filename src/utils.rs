//! # Utility Functions
//!
//! Common utility functions used throughout the sweeper.

use crate::error::{SweepError, SweepResult};
use bitcoin::{Address, Network};
use std::str::FromStr;

/// Address formatting and validation utilities
pub mod address {
    use super::*;

    const DISPLAY_PREFIX: usize = 8;
    const DISPLAY_SUFFIX: usize = 5;

    /// Format an address for display with ellipsis in the middle
    ///
    /// # Returns
    /// Formatted address string like "2N8hwP1W...nZQnN"
    pub fn format_short(address: &str) -> String {
        if address.len() <= DISPLAY_PREFIX + DISPLAY_SUFFIX + 3 {
            address.to_string()
        } else {
            format!(
                "{}...{}",
                &address[..DISPLAY_PREFIX],
                &address[address.len() - DISPLAY_SUFFIX..]
            )
        }
    }

    /// Validate and parse a Bitcoin address for the given network
    pub fn validate_and_parse(address_str: &str, network: Network) -> SweepResult<Address> {
        let address = Address::from_str(address_str).map_err(|_| SweepError::InvalidAddress {
            address: address_str.to_string(),
        })?;

        // Ensure the address is for the correct network
        let validated_address = address
            .require_network(network)
            .map_err(|_| SweepError::InvalidAddress {
                address: address_str.to_string(),
            })?;

        Ok(validated_address)
    }
}

/// Amount formatting utilities
pub mod amount {
    /// Convert satoshis to BTC with 8 decimal places
    pub fn sats_to_btc(sats: u64) -> f64 {
        sats as f64 / 100_000_000.0
    }

    /// Format amount with both sats and BTC
    pub fn format_dual(sats: u64) -> String {
        format!("{} sats ({:.8} BTC)", sats, sats_to_btc(sats))
    }
}

/// Time utilities
pub mod time {
    use chrono::{DateTime, Utc};
    use std::time::{Duration, SystemTime};

    /// Format current time
    pub fn format_now() -> String {
        let datetime: DateTime<Utc> = SystemTime::now().into();
        datetime.format("%Y-%m-%d %H:%M:%S UTC").to_string()
    }

    /// Format duration in human-readable form
    pub fn format_duration(duration: Duration) -> String {
        let total_seconds = duration.as_secs();
        let minutes = total_seconds / 60;
        let seconds = total_seconds % 60;

        if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}.{:03}s", seconds, duration.subsec_millis())
        }
    }
}

/// Retry utilities
pub mod retry {
    use crate::config::network::{MAX_RETRY_ATTEMPTS, RETRY_DELAY};
    use std::future::Future;
    use std::time::Duration;
    use tokio::time::sleep;

    fn delay_after(attempt: u32) -> Duration {
        RETRY_DELAY * 2_u32.pow(attempt - 1)
    }

    /// Retry an async operation with exponential backoff.
    ///
    /// Errors rejected by `should_retry` are returned immediately.
    pub async fn with_backoff<F, Fut, T, E, R>(mut operation: F, should_retry: R) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Debug,
        R: Fn(&E) -> bool,
    {
        let mut attempts = 0;
        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(error) => {
                    attempts += 1;
                    if attempts >= MAX_RETRY_ATTEMPTS || !should_retry(&error) {
                        return Err(error);
                    }

                    let delay = delay_after(attempts);
                    log::warn!(
                        "Operation failed (attempt {}), retrying in {:?}: {:?}",
                        attempts,
                        delay,
                        error
                    );
                    sleep(delay).await;
                }
            }
        }
    }

    /// Longest time `with_backoff` can spend when every attempt takes `attempt_timeout`
    pub fn worst_case(attempt_timeout: Duration) -> Duration {
        let backoff: Duration = (1..MAX_RETRY_ATTEMPTS).map(delay_after).sum();
        attempt_timeout * MAX_RETRY_ATTEMPTS + backoff
    }
}
