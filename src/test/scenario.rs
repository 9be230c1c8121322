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

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use async_trait::async_trait;
use pretty_assertions::assert_eq;

use super::MockRunner;
use crate::{
    config::Config,
    fixture::Fixture,
    scenario::{Scenario, ScenarioState},
    step::{Connectivity, Step, StepReport},
    topology::{two_nets, Topology},
    SwitchLabError,
};

enum Behavior {
    Pass,
    Soft,
    Hard,
}

struct FakeStep {
    name: &'static str,
    behavior: Behavior,
    ran: Arc<AtomicBool>,
}

impl FakeStep {
    fn new(name: &'static str, behavior: Behavior) -> (Self, Arc<AtomicBool>) {
        let ran = Arc::new(AtomicBool::new(false));
        (
            Self {
                name,
                behavior,
                ran: ran.clone(),
            },
            ran,
        )
    }
}

#[async_trait]
impl Step for FakeStep {
    fn name(&self) -> String {
        self.name.to_string()
    }

    async fn run(&self, _fx: &Fixture, report: &mut StepReport) -> Result<(), SwitchLabError> {
        self.ran.store(true, Ordering::SeqCst);
        match self.behavior {
            Behavior::Pass => Ok(()),
            Behavior::Soft => {
                report.fail("one check failed");
                Ok(())
            }
            Behavior::Hard => Err(SwitchLabError::Setup("boom".to_string())),
        }
    }
}

fn empty_fixture(runner: Arc<MockRunner>) -> Fixture {
    let topo = Topology {
        name: "empty".to_string(),
        hosts: vec![],
    };
    Fixture::new(topo, Arc::new(Config::default()), runner)
}

#[tokio::test]
async fn fail_fast_skips_remaining_steps() {
    let fx = empty_fixture(MockRunner::new());
    let (a, a_ran) = FakeStep::new("a", Behavior::Pass);
    let (b, b_ran) = FakeStep::new("b", Behavior::Hard);
    let (c, c_ran) = FakeStep::new("c", Behavior::Pass);

    let report = Scenario::new("suite").step(a).step(b).step(c).run(&fx).await;

    assert!(a_ran.load(Ordering::SeqCst));
    assert!(b_ran.load(Ordering::SeqCst));
    assert!(!c_ran.load(Ordering::SeqCst));
    assert_eq!(report.state, ScenarioState::Failed);
    // a and b are both recorded, c never ran
    assert_eq!(report.steps.len(), 2);
    assert_eq!(report.steps[0].name, "suite/a");
    assert_eq!(report.steps[1].name, "suite/b");
    assert_eq!(report.error.as_deref(), Some("suite/b: Cannot build the fixture: boom"));
}

#[tokio::test]
async fn soft_failures_advance_to_the_next_step() {
    let fx = empty_fixture(MockRunner::new());
    let (a, _) = FakeStep::new("a", Behavior::Soft);
    let (b, b_ran) = FakeStep::new("b", Behavior::Pass);

    let report = Scenario::new("suite").step(a).step(b).run(&fx).await;

    assert!(b_ran.load(Ordering::SeqCst));
    assert_eq!(report.state, ScenarioState::Failed);
    assert_eq!(report.steps.len(), 2);
    assert_eq!(report.num_failures(), 1);
    assert_eq!(report.error, None);
}

#[tokio::test]
async fn all_steps_passing_yields_passed() {
    let fx = empty_fixture(MockRunner::new());
    let (a, _) = FakeStep::new("a", Behavior::Pass);
    let (b, _) = FakeStep::new("b", Behavior::Pass);

    let report = Scenario::new("suite").step(a).step(b).run(&fx).await;

    assert_eq!(report.state, ScenarioState::Passed);
    assert!(report.passed());
    assert_eq!(report.num_failures(), 0);
}

#[tokio::test]
async fn ping_sweep_continues_after_a_failed_pair() {
    let runner = MockRunner::new();
    // the first pair never answers
    runner.fail("ping -c1 10.2.0.1", usize::MAX);
    let fx = Fixture::new(two_nets(), Arc::new(Config::default()), runner.clone());

    let step = Connectivity::new(&[("h1", "10.2.0.1"), ("h2", "10.1.0.1")]);
    let mut report = StepReport::new("suite/connectivity");
    step.run(&fx, &mut report).await.unwrap();

    // the failed pair is recorded, and the second pair was still attempted
    assert_eq!(report.failures.len(), 1);
    assert!(report.failures[0].contains("10.2.0.1"));
    assert_eq!(runner.count("ping -c1 10.2.0.1"), 1);
    assert_eq!(runner.count("ping -c1 10.1.0.1"), 1);
}

#[tokio::test]
async fn dry_run_reports_without_executing() {
    let (a, a_ran) = FakeStep::new("a", Behavior::Hard);
    let scenario = Scenario::new("suite").step(a);

    let report = scenario.dry_run();

    assert!(!a_ran.load(Ordering::SeqCst));
    assert!(report.passed());
    assert_eq!(report.steps[0].name, "suite/a");
}
