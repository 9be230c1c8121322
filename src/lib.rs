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

//! This library drives blackbox integration tests against a switch platform's routing and
//! forwarding stack. It stands up a topology of network namespaces (and already-running
//! containers) around the device under test, runs an ordered scenario of checks against it, and
//! tears everything down again, whether the scenario passed or not.
//!
//! Everything the harness knows about the systems under test it learns by running external
//! commands (`ip`, `vtysh`, `birdc`, `ping`, `ps`, the device's own `goes` CLI, ...) and matching
//! patterns against their raw output. Routing protocols converge asynchronously, so most checks
//! are polled with a bounded retry budget instead of asserted once.
//!
//! # Experiment Setup
//!
//! The device under test routes between front-panel ports. Each port is moved into its own
//! network namespace so that the kernel does not short-circuit traffic between them, and the
//! switch is the only path from one namespace to the other:
//!
//! ```text
//!  ┌────────────┐    ┌──────────────────────────┐    ┌────────────┐
//!  │  netns h1  │    │       switch (DUT)       │    │  netns h2  │
//!  │  eth-1-0   ├────┤  - vnetd / redisd        ├────┤  eth-2-0   │
//!  │  10.1.0.1  │    │  - FIB + adjacencies     │    │  10.2.0.1  │
//!  └────────────┘    └──────────────────────────┘    └────────────┘
//! ```
//!
//! Routing suites (FRR, BIRD, GoBGP, ...) instead exec into containers named `R1`..`R4` that run
//! the routing daemons, wired through the device in a square:
//!
//! ```text
//!        192.168.120.0/24
//!      R1 ──────────────── R2
//!      │                    │
//!      │ 192.168.150.0/24   │ 192.168.222.0/24
//!      │                    │
//!      R4 ──────────────── R3
//!        192.168.111.0/24
//! ```
//!
//! # Lifecycle
//!
//! A [`SwitchLab`] is created in the [`Inactive`] state, where it only holds the configuration.
//! Calling [`SwitchLab::start`] launches the platform daemons (`redisd` and `vnetd`), waits for
//! their readiness keys, and returns a `SwitchLab<Active>`. Only an active lab can build fixtures
//! and run scenarios; this makes it impossible to run a scenario against a device that was never
//! started. Scenarios must not run concurrently against the same lab, as they mutate shared
//! interface and namespace state.
//!
//! Teardown of a fixture is unconditional: it runs after the scenario, pass or fail, so that one
//! failing scenario cannot poison the next one. If teardown itself cannot restore the baseline
//! (an interface does not return to the default namespace), the error is escalated to the whole
//! suite, since any later result would be meaningless.

use std::sync::Arc;

use thiserror::Error;

pub mod config;
pub mod daemon;
pub mod exec;
pub mod expect;
pub mod fixture;
pub mod poll;
pub mod scenario;
pub mod step;
pub mod suites;
pub mod topology;

#[cfg(test)]
mod test;

pub use config::Config;
pub use exec::{CommandRunner, ExecContext, ExecError, Probe, SystemRunner};
pub use fixture::Fixture;
pub use poll::Poller;
pub use scenario::{Scenario, ScenarioReport, ScenarioState};
pub use step::{Step, StepReport};
pub use topology::Topology;

use daemon::Daemon;

/// The lab is not connected to the device. In this state, only configuration and topology
/// handling is available.
pub struct Inactive;

/// The lab has started the platform daemons and owns their handles. Scenarios can only run
/// against an `Active` lab.
pub struct Active {
    pub(crate) redisd: Option<Daemon>,
    pub(crate) vnetd: Option<Daemon>,
}

/// A handle on the device under test and its surrounding environment. The type parameter `S` is
/// either [`Inactive`] or [`Active`]; see the crate documentation for the lifecycle.
pub struct SwitchLab<S = Inactive> {
    config: Arc<Config>,
    runner: Arc<dyn CommandRunner>,
    state: S,
}

impl SwitchLab<Inactive> {
    /// Create a new inactive lab from the given configuration. This does not touch the device.
    pub fn new(config: Config) -> Self {
        Self::with_runner(config, Arc::new(SystemRunner))
    }

    /// Create a new inactive lab that executes all commands through the given runner. Used to
    /// inject a scripted runner in tests.
    pub fn with_runner(config: Config, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            config: Arc::new(config),
            runner,
            state: Inactive,
        }
    }

    /// Start the platform: launch `redisd` and `vnetd` and block until both report ready. In
    /// dry-run mode (or with the `ignore-platform` feature), no daemon is spawned and the lab
    /// transitions immediately.
    pub async fn start(self) -> Result<SwitchLab<Active>, SwitchLabError> {
        let state = if self.config.dry_run || cfg!(feature = "ignore-platform") {
            Active {
                redisd: None,
                vnetd: None,
            }
        } else {
            let local = Probe::local(self.runner.clone());
            let goes = self.config.goes_str();

            // load the port driver; alpha systems use zero-based port numbering
            let mut modprobe = vec!["modprobe".to_string(), self.config.platform.clone()];
            if self.config.alpha {
                modprobe.push("alpha=1".to_string());
            }
            local.run(&modprobe).await?;

            let redisd = Daemon::start(&self.config.goes, "redisd")?;
            local
                .run(&[
                    goes,
                    "hwait",
                    self.config.platform.as_str(),
                    "redis.ready",
                    "true",
                    "10",
                ])
                .await?;

            let vnetd = Daemon::start(&self.config.goes, "vnetd")?;
            if self.config.pause {
                scenario::pause_prompt(&format!(
                    "attach vnet debugger to pid {:?}",
                    vnetd.pid()
                ))
                .await;
            }
            local
                .run(&[
                    goes,
                    "hwait",
                    self.config.platform.as_str(),
                    "vnet.ready",
                    "true",
                    "30",
                ])
                .await?;

            log::debug!("[lab] platform is ready");
            Active {
                redisd: Some(redisd),
                vnetd: Some(vnetd),
            }
        };

        Ok(SwitchLab {
            config: self.config,
            runner: self.runner,
            state,
        })
    }
}

impl SwitchLab<Active> {
    /// Stop the platform daemons (in reverse start order) and return to the inactive state.
    pub async fn stop(mut self) -> Result<SwitchLab<Inactive>, SwitchLabError> {
        if let Some(vnetd) = self.state.vnetd.take() {
            vnetd.stop().await?;
        }
        if let Some(redisd) = self.state.redisd.take() {
            redisd.stop().await?;
        }
        Ok(SwitchLab {
            config: self.config,
            runner: self.runner,
            state: Inactive,
        })
    }

    /// Create a fixture for the given topology without building it. Most callers want
    /// [`SwitchLab::run`] instead, which also guarantees teardown.
    pub fn fixture(&self, topo: Topology) -> Fixture {
        Fixture::new(topo, self.config.clone(), self.runner.clone())
    }

    /// Build the topology, run the scenario against it, and tear the topology down again. The
    /// teardown runs unconditionally, also when the build or one of the steps failed.
    ///
    /// A hard step failure is reported in the returned [`ScenarioReport`] and does not abort the
    /// suite; a teardown failure does, since leftover namespaces or stolen interfaces would
    /// corrupt every scenario that follows.
    pub async fn run(
        &self,
        topo: Topology,
        scenario: Scenario,
    ) -> Result<ScenarioReport, SwitchLabError> {
        let fixture = self.fixture(topo);

        if self.config.dry_run {
            return Ok(scenario.dry_run());
        }

        let report = match fixture.build().await {
            Ok(()) => scenario.run(&fixture).await,
            Err(e) => {
                log::error!("[{}] cannot build the fixture: {e}", scenario.name());
                ScenarioReport::aborted(scenario.name(), e)
            }
        };

        if self.config.pause && !report.passed() {
            scenario::pause_prompt(&format!("{} failed", scenario.name())).await;
        }

        fixture.teardown().await?;

        Ok(report)
    }

    /// Get the configuration of the lab.
    pub fn config(&self) -> &Config {
        &self.config
    }
}

/// Error type thrown while driving the lab.
#[derive(Debug, Error)]
pub enum SwitchLabError {
    /// I/O Error
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Error while executing an external command
    #[error("{0}")]
    Exec(#[from] ExecError),
    /// Error while reading the configuration
    #[error("{0}")]
    Config(#[from] config::ConfigError),
    /// Error in the topology declaration
    #[error("{0}")]
    Topology(#[from] topology::TopologyError),
    /// The topology does not declare the requested host.
    #[error("Host {0} is not declared in the topology")]
    UnknownHost(String),
    /// A topology-build command failed. The scenario is aborted before any step runs.
    #[error("Cannot build the fixture: {0}")]
    Setup(String),
    /// A polled condition never became true within its retry budget.
    #[error("No convergence on {target}; last output:\n{last}")]
    ConvergenceTimeout {
        /// Human-readable description of the expectation that never matched.
        target: String,
        /// The observation of the last attempt, verbatim.
        last: String,
    },
    /// Cleanup could not restore the baseline state. Fatal for the whole suite.
    #[error("Cannot tear the fixture down: {0}")]
    Teardown(String),
}
