use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::config::RuntimeConfig;
use crate::error::{DriverError, RuntimeError};
use crate::runtime::driver::BrowserDriver;

/// Timeout and polling cadence of every bounded wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self::from_config(&RuntimeConfig::default())
    }
}

impl WaitOptions {
    pub fn from_config(runtime: &RuntimeConfig) -> Self {
        Self {
            timeout: Duration::from_millis(runtime.wait_timeout_ms),
            poll_interval: Duration::from_millis(runtime.poll_interval_ms.max(1)),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

/// Evaluate `predicate` until it returns true or `timeout` elapses; the
/// predicate is always evaluated at least once. A stale element while
/// polling counts as "not yet"; any other error ends the wait.
pub fn poll_until(
    predicate: &mut dyn FnMut() -> Result<bool, RuntimeError>,
    timeout: Duration,
    poll: Duration,
) -> Result<bool, RuntimeError> {
    let deadline = Instant::now() + timeout;
    loop {
        match predicate() {
            Ok(true) => return Ok(true),
            Ok(false) | Err(RuntimeError::Driver(DriverError::StaleElement)) => {}
            Err(e) => return Err(e),
        }
        let now = Instant::now();
        if now >= deadline {
            return Ok(false);
        }
        thread::sleep(poll.min(deadline - now));
    }
}

/// Wait through the driver for a named condition, failing with
/// `WaitTimeout` once the configured timeout elapses.
pub fn wait_for(
    driver: &dyn BrowserDriver,
    options: WaitOptions,
    condition: &str,
    predicate: &mut dyn FnMut() -> Result<bool, RuntimeError>,
) -> Result<(), RuntimeError> {
    debug!("waiting up to {:?} for {}", options.timeout, condition);
    let started = Instant::now();
    if driver.wait_until(predicate, options.timeout, options.poll_interval)? {
        debug!("{} after {:?}", condition, started.elapsed());
        return Ok(());
    }
    warn!("timed out after {:?} waiting for {}", options.timeout, condition);
    Err(RuntimeError::WaitTimeout {
        condition: condition.to_string(),
        timeout_ms: millis(options.timeout),
    })
}

/// Whole milliseconds of `duration`, saturating at `u64::MAX`.
pub fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
