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

use std::{
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use pretty_assertions::assert_eq;

use crate::{poll::Poller, SwitchLabError};

#[tokio::test(start_paused = true)]
async fn success_on_third_attempt() {
    let calls = AtomicUsize::new(0);
    let start = tokio::time::Instant::now();
    let poller = Poller::new(3, Duration::from_secs(1));

    let observed = poller
        .run("third time lucky", || {
            let i = calls.fetch_add(1, Ordering::SeqCst);
            async move { Ok((format!("attempt {i}"), i == 2)) }
        })
        .await
        .unwrap();

    assert_eq!(observed, "attempt 2");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    // two sleeps of one second each, no extra waiting after the match
    assert_eq!(start.elapsed(), Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn immediate_success_does_not_wait() {
    let calls = AtomicUsize::new(0);
    let start = tokio::time::Instant::now();
    let poller = Poller::new(60, Duration::from_secs(1));

    poller
        .run("first try", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Ok(("ok".to_string(), true)) }
        })
        .await
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn budget_exhausted_reports_last_observation() {
    let calls = AtomicUsize::new(0);
    let start = tokio::time::Instant::now();
    let poller = Poller::new(5, Duration::from_secs(1));

    let err = poller
        .run("never converges", || {
            let i = calls.fetch_add(1, Ordering::SeqCst);
            async move { Ok((format!("attempt {i}"), false)) }
        })
        .await
        .unwrap_err();

    // all five slots consumed, with four sleeps in between
    assert_eq!(calls.load(Ordering::SeqCst), 5);
    assert_eq!(start.elapsed(), Duration::from_secs(4));
    match err {
        SwitchLabError::ConvergenceTimeout { target, last } => {
            assert_eq!(target, "never converges");
            assert_eq!(last, "attempt 4");
        }
        e => panic!("unexpected error: {e}"),
    }
}

#[tokio::test(start_paused = true)]
async fn first_attempt_miss_consumes_a_slot() {
    let calls = AtomicUsize::new(0);
    let poller = Poller::new(1, Duration::from_secs(1));

    let err = poller
        .run("one shot", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Ok(("miss".to_string(), false)) }
        })
        .await
        .unwrap_err();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(matches!(err, SwitchLabError::ConvergenceTimeout { .. }));
}

#[tokio::test(start_paused = true)]
async fn probe_error_aborts_the_poll() {
    let calls = AtomicUsize::new(0);
    let poller = Poller::new(10, Duration::from_secs(1));

    let err = poller
        .run("broken probe", || {
            let i = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if i == 1 {
                    Err(SwitchLabError::UnknownHost("R9".to_string()))
                } else {
                    Ok(("miss".to_string(), false))
                }
            }
        })
        .await
        .unwrap_err();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(matches!(err, SwitchLabError::UnknownHost(_)));
}
