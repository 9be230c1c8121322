// SwitchLab: Blackbox integration tests for a switch routing stack
// Copyright (C) 2022-2023 Tibor Schneider <sctibor@ethz.ch>
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! Bounded polling for eventually-consistent state.
//!
//! Routing protocols converge at their own pace. Every neighbor, route, and recovery check in
//! this crate polls the same way: re-run the probe at a fixed interval until the pattern matches
//! or the retry budget is exhausted. There is no backoff and no caching between attempts; each
//! attempt re-executes the underlying command.

use std::{future::Future, time::Duration};

use crate::SwitchLabError;

/// A bounded fixed-interval retry policy.
///
/// The worst case runtime of [`Poller::run`] is `retries × interval`: `retries` attempts with
/// `retries - 1` sleeps in between (the last failed attempt returns without sleeping).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Poller {
    /// Number of attempts. A miss on the very first attempt consumes a slot like any other.
    pub retries: usize,
    /// Delay between two attempts.
    pub interval: Duration,
}

impl Poller {
    /// Budget for protocol peering to establish (BGP can take well over a minute).
    pub const NEIGHBOR: Poller = Poller::new(120, Duration::from_secs(1));
    /// Budget for a learned route to show up in a routing table.
    pub const ROUTE: Poller = Poller::new(60, Duration::from_secs(1));
    /// Budget for a daemon process to appear in the process list.
    pub const DAEMON: Poller = Poller::new(5, Duration::from_secs(2));
    /// Budget for the data plane to recover after a partition heals.
    pub const RECOVERY: Poller = Poller::new(120, Duration::from_secs(1));

    /// Create a new policy.
    pub const fn new(retries: usize, interval: Duration) -> Self {
        Self { retries, interval }
    }

    /// Poll `attempt` until it reports a match.
    ///
    /// Each attempt returns the observed output together with whether it satisfied the
    /// expectation. On a match, the satisfying observation is returned immediately, without
    /// further waiting. When the budget is exhausted, the error carries `target` and the
    /// last observation verbatim, so the failure report shows what the host actually said.
    ///
    /// An `Err` from `attempt` (the probe itself failed) aborts the poll immediately.
    pub async fn run<F, Fut>(
        &self,
        target: impl AsRef<str>,
        mut attempt: F,
    ) -> Result<String, SwitchLabError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(String, bool), SwitchLabError>>,
    {
        let target = target.as_ref();
        let mut last = String::new();
        for i in 0..self.retries.max(1) {
            let (observed, matched) = attempt().await?;
            if matched {
                return Ok(observed);
            }
            last = observed;
            let left = self.retries.max(1) - i - 1;
            if left > 0 {
                log::trace!("[poll] {target}: no match, {left} retries left");
                tokio::time::sleep(self.interval).await;
            }
        }
        log::warn!("[poll] {target}: retry budget exhausted");
        Err(SwitchLabError::ConvergenceTimeout {
            target: target.to_string(),
            last,
        })
    }
}
