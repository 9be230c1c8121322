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

use std::sync::Arc;

use maplit::hashset;
use pretty_assertions::assert_eq;

use super::MockRunner;
use crate::{
    config::Config,
    exec::CmdOutput,
    fixture::Fixture,
    scenario::{Scenario, ScenarioState},
    step::{AdminDown, Flap},
    topology::{two_nets, two_vlan_nets},
    SwitchLabError,
};

fn fixture(runner: Arc<MockRunner>) -> Fixture {
    Fixture::new(two_nets(), Arc::new(Config::default()), runner)
}

#[tokio::test]
async fn build_moves_ports_and_assigns_addresses() {
    let runner = MockRunner::new();
    let fx = fixture(runner.clone());
    fx.build().await.unwrap();

    assert_eq!(
        runner.namespaces(),
        hashset! {"h1".to_string(), "h2".to_string()}
    );
    let calls = runner.calls();
    assert!(calls.contains(&("local".to_string(), "ip link set xeth1 up netns h1".to_string())));
    assert!(calls.contains(&(
        "h1".to_string(),
        "ip -4 address add 10.1.0.1/24 dev xeth1".to_string()
    )));
    assert!(calls.contains(&(
        "h1".to_string(),
        "ip -4 route append 10.2.0.0/24 via 10.1.0.2".to_string()
    )));
}

#[tokio::test]
async fn build_is_idempotent() {
    let runner = MockRunner::new();
    let fx = fixture(runner.clone());
    fx.build().await.unwrap();
    fx.build().await.unwrap();

    // the namespaces existed on the second build, so they are only created once
    assert_eq!(runner.count("ip netns add h1"), 1);
    assert_eq!(runner.count("ip netns add h2"), 1);
}

#[tokio::test]
async fn teardown_restores_the_baseline() {
    let runner = MockRunner::new();
    let fx = fixture(runner.clone());
    fx.build().await.unwrap();
    fx.teardown().await.unwrap();

    assert!(runner.namespaces().is_empty());
    let calls = runner.calls();
    assert!(calls.contains(&("local".to_string(), "ip netns del h1".to_string())));
    assert!(calls.contains(&("local".to_string(), "ip link set xeth1 up".to_string())));
    assert!(calls.contains(&("local".to_string(), "ip link set xeth2 up".to_string())));
}

#[tokio::test(start_paused = true)]
async fn teardown_retries_slow_interfaces() {
    let runner = MockRunner::new();
    // the kernel takes three attempts to hand xeth1 back
    runner.fail("ip link set xeth1 up", 3);
    let fx = fixture(runner.clone());
    fx.build().await.unwrap();
    fx.teardown().await.unwrap();

    assert_eq!(runner.count("ip link set xeth1 up"), 4);
}

#[tokio::test(start_paused = true)]
async fn teardown_escalates_when_an_interface_is_stuck() {
    let runner = MockRunner::new();
    runner.fail("ip link set xeth1 up", usize::MAX);
    let fx = fixture(runner.clone());
    fx.build().await.unwrap();

    let err = fx.teardown().await.unwrap_err();
    assert!(matches!(err, SwitchLabError::Teardown(_)));
    assert_eq!(
        runner.count("ip link set xeth1 up"),
        crate::fixture::TEARDOWN_RETRIES
    );
}

#[tokio::test]
async fn vlan_interfaces_are_created_inside_the_namespace() {
    let runner = MockRunner::new();
    let fx = Fixture::new(
        two_vlan_nets(),
        Arc::new(Config::default()),
        runner.clone(),
    );
    fx.build().await.unwrap();

    let calls = runner.calls();
    assert!(calls.contains(&(
        "h1".to_string(),
        "ip link add link xeth1 name xeth1.10 type vlan id 10".to_string()
    )));
    assert!(calls.contains(&(
        "h1".to_string(),
        "ip -4 address add 10.1.0.1/24 dev xeth1.10".to_string()
    )));
}

#[tokio::test(start_paused = true)]
async fn flap_then_admin_down_leaves_no_adjacencies() {
    let runner = MockRunner::new();
    let fx = fixture(runner.clone());
    fx.build().await.unwrap();

    let report = Scenario::new("net/flap-admin-down")
        .step(Flap::default())
        .step(AdminDown)
        .run(&fx)
        .await;
    assert_eq!(report.state, ScenarioState::Passed);

    // the flap must end with the link up, before admin-down brings it down for good
    let calls = runner.calls();
    let link_cmds: Vec<&str> = calls
        .iter()
        .filter(|(ctx, c)| ctx == "h1" && c.starts_with("ip link set"))
        .map(|(_, c)| if c.contains("down") { "down" } else { "up" })
        .collect();
    assert_eq!(link_cmds, vec!["down", "up", "down"]);

    // the adjacency table was checked after the interfaces went down
    assert_eq!(runner.count("./goes-platina-mk1 fe1 switch adj"), 1);

    fx.teardown().await.unwrap();
    assert!(runner.namespaces().is_empty());
}

#[tokio::test(start_paused = true)]
async fn leftover_adjacencies_are_reported() {
    let runner = MockRunner::new();
    runner.script(
        "./goes-platina-mk1 fe1 switch adj",
        CmdOutput::ok("0  hard  l3_unicast  installed true  port 12\n"),
    );
    let fx = fixture(runner.clone());
    fx.build().await.unwrap();

    let report = Scenario::new("net/admin-down").step(AdminDown).run(&fx).await;

    assert_eq!(report.state, ScenarioState::Failed);
    assert_eq!(report.num_failures(), 1);
    assert!(report.steps[0].failures[0].contains("1 unexpected rewrites"));
}
