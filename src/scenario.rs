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

//! Ordered execution of scenario steps.
//!
//! A [`Scenario`] is one named, ordered sequence of steps exercising a feature end-to-end. Steps
//! run strictly sequentially against one fixture, on a single logical thread of control: steps
//! mutate shared interface and namespace state, so no two steps may overlap.
//!
//! Soft failures accumulate in the report and the scenario advances to the next step, surfacing
//! as many problems as possible per run. A hard failure stops the scenario: the remaining steps
//! would assert on state that was never reached. In both cases the caller tears the fixture
//! down afterwards.

use std::fmt;

use crate::{fixture::Fixture, step::Step, step::StepReport, SwitchLabError};

/// Execution state of a scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioState {
    /// Not yet started.
    Pending,
    /// Step `i` is currently executing.
    Running(usize),
    /// All steps ran without any failure.
    Passed,
    /// A step hard-failed, or at least one soft failure was recorded.
    Failed,
}

/// One named, ordered sequence of steps. The scenario owns its steps but borrows the fixture it
/// runs against.
pub struct Scenario {
    name: String,
    steps: Vec<Box<dyn Step>>,
}

impl Scenario {
    /// Create an empty scenario. The name is the prefix of every step path in the report, e.g.
    /// `frr/bgp`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    /// Append a step.
    pub fn step(mut self, step: impl Step + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    /// Name of the scenario.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the scenario has no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Report what would run, without touching anything.
    pub(crate) fn dry_run(&self) -> ScenarioReport {
        let mut report = ScenarioReport::new(&self.name);
        for step in &self.steps {
            let path = format!("{}/{}", self.name, step.name());
            log::info!("[{path}] would run");
            report.steps.push(StepReport::new(path));
        }
        report.state = ScenarioState::Passed;
        report
    }

    /// Run all steps in order against the fixture. See the module documentation for the failure
    /// semantics.
    pub(crate) async fn run(&self, fx: &Fixture) -> ScenarioReport {
        let mut report = ScenarioReport::new(&self.name);
        let total = self.steps.len();

        for (i, step) in self.steps.iter().enumerate() {
            report.state = ScenarioState::Running(i);
            let path = format!("{}/{}", self.name, step.name());
            log::info!("[{path}] running ({}/{total})", i + 1);

            let mut step_report = StepReport::new(path.clone());
            match step.run(fx, &mut step_report).await {
                Ok(()) => report.steps.push(step_report),
                Err(e) => {
                    log::error!("[{path}] {e}");
                    report.steps.push(step_report);
                    report.error = Some(format!("{path}: {e}"));
                    report.state = ScenarioState::Failed;
                    return report;
                }
            }
        }

        report.state = if report.steps.iter().all(StepReport::passed) {
            ScenarioState::Passed
        } else {
            ScenarioState::Failed
        };
        report
    }
}

/// The outcome of one scenario run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioReport {
    /// Name of the scenario.
    pub name: String,
    /// Terminal state (or the last observed state, if the run was interrupted).
    pub state: ScenarioState,
    /// The per-step records, in execution order. Steps after a hard failure are absent.
    pub steps: Vec<StepReport>,
    /// The hard failure that stopped the scenario, if any.
    pub error: Option<String>,
}

impl ScenarioReport {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            state: ScenarioState::Pending,
            steps: Vec::new(),
            error: None,
        }
    }

    /// Report for a scenario whose fixture could not be built: no step ran.
    pub(crate) fn aborted(name: &str, e: SwitchLabError) -> Self {
        let mut report = Self::new(name);
        report.state = ScenarioState::Failed;
        report.error = Some(e.to_string());
        report
    }

    /// Whether the scenario passed.
    pub fn passed(&self) -> bool {
        self.state == ScenarioState::Passed
    }

    /// Total number of soft failures over all steps.
    pub fn num_failures(&self) -> usize {
        self.steps.iter().map(|s| s.failures.len()).sum()
    }
}

impl fmt::Display for ScenarioReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{}: {}",
            self.name,
            if self.passed() { "PASS" } else { "FAIL" }
        )?;
        for step in &self.steps {
            for failure in &step.failures {
                writeln!(f, "  {}: {}", step.name, failure)?;
            }
        }
        if let Some(e) = &self.error {
            writeln!(f, "  aborted: {e}")?;
        }
        Ok(())
    }
}

/// Freeze until the operator hits enter. Used to attach a debugger to the running fixture
/// before it is torn down.
pub(crate) async fn pause_prompt(msg: &str) {
    println!("{msg} -- press enter to continue");
    let _ = tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        let _ = std::io::stdin().read_line(&mut line);
    })
    .await;
}
