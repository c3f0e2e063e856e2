//! Polling for asynchronous remote state transitions
//!
//! Satellite locations, hosts and clusters are provisioned in the background.
//! Adapters poll the object until it reaches a target state, fails into an
//! unexpected state, or the deadline passes.

use crate::error::{Error, Result};
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Consecutive not-found results tolerated while waiting for a target state
const DEFAULT_NOT_FOUND_CHECKS: usize = 20;

/// Polling configuration
#[derive(Debug, Clone)]
pub struct StateChangeConf {
    /// States that mean "keep waiting"
    pub pending: Vec<String>,
    /// States that mean "done". Empty means wait until the object is gone.
    pub target: Vec<String>,
    pub timeout: Duration,
    /// Wait before the first poll
    pub delay: Duration,
    pub poll_interval: Duration,
    pub not_found_checks: usize,
}

impl StateChangeConf {
    pub fn new(pending: &[&str], target: &[&str], timeout: Duration) -> Self {
        Self {
            pending: pending.iter().map(|s| s.to_string()).collect(),
            target: target.iter().map(|s| s.to_string()).collect(),
            timeout,
            delay: Duration::from_secs(10),
            poll_interval: Duration::from_secs(10),
            not_found_checks: DEFAULT_NOT_FOUND_CHECKS,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Poll `refresh` until a target state is reached
    ///
    /// `refresh` returns `None` when the object does not exist, otherwise the
    /// object and its current state. Returns the object in its target state, or
    /// `None` when waiting for deletion and the object is gone.
    pub async fn wait_for_state<F, Fut>(&self, mut refresh: F) -> Result<Option<Value>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<(Value, String)>>>,
    {
        // None when the timeout is too large to represent, i.e. no deadline
        let deadline = Instant::now().checked_add(self.timeout);
        let mut not_found = 0usize;
        let mut last_state = String::new();

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay.min(self.timeout)).await;
        }

        loop {
            match refresh().await? {
                None if self.target.is_empty() => return Ok(None),
                None => {
                    not_found += 1;
                    if not_found > self.not_found_checks {
                        return Err(Error::not_found(format!(
                            "resource disappeared while waiting for state {:?}",
                            self.target
                        )));
                    }
                }
                Some((object, state)) => {
                    not_found = 0;
                    if self.target.iter().any(|t| t.eq_ignore_ascii_case(&state)) {
                        return Ok(Some(object));
                    }
                    if !self.pending.is_empty()
                        && !self.pending.iter().any(|p| p.eq_ignore_ascii_case(&state))
                    {
                        return Err(Error::Other(format!(
                            "unexpected state '{}', wanted target {:?}",
                            state, self.target
                        )));
                    }
                    if state != last_state {
                        tracing::debug!("Waiting for state {:?}, currently {}", self.target, state);
                        last_state = state;
                    }
                }
            }

            let next_poll = Instant::now().checked_add(self.poll_interval);
            if deadline.is_some_and(|deadline| next_poll.is_none_or(|next| next > deadline)) {
                return Err(Error::timeout(format!(
                    "timeout while waiting for state to become {:?} (last state: '{}', timeout: {:?})",
                    self.target, last_state, self.timeout
                )));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
