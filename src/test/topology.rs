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

use pretty_assertions::assert_eq;

use crate::{
    config::Config,
    exec::ExecContext,
    suites::{self, Flavor},
    topology::{four_nets, one_net, two_nets, two_vlan_nets, Backing, Role, Topology, TopologyError},
};

#[test]
fn parse_a_toml_topology() {
    let topo = Topology::from_toml(
        r#"
            name = "two-nets"

            [[hosts]]
            hostname = "h1"
            role = "client"
            ifaces = [{ name = "xeth1", address = "10.1.0.1/24" }]
            routes = [{ prefix = "10.2.0.0/24", gw = "10.1.0.2" }]
            remotes = ["10.2.0.1"]

            [[hosts]]
            hostname = "R1"
            backing = "container"
            ifaces = [{ name = "eth-1-0", vlan = 120, address = "192.168.120.5/24" }]
        "#,
    )
    .unwrap();

    assert_eq!(topo.hosts.len(), 2);
    let h1 = topo.host("h1").unwrap();
    assert_eq!(h1.role, Role::Client);
    assert_eq!(h1.backing, Backing::Netns);
    assert_eq!(h1.netns(), "h1");
    assert_eq!(h1.context(), ExecContext::Netns("h1".to_string()));
    assert_eq!(h1.routes[0].gw, "10.1.0.2");

    let r1 = topo.host("R1").unwrap();
    assert_eq!(r1.backing, Backing::Container);
    assert_eq!(r1.context(), ExecContext::Container("R1".to_string()));
    assert_eq!(r1.ifaces[0].ifname(), "eth-1-0.120");
}

#[test]
fn duplicate_hostnames_are_rejected() {
    let err = Topology::from_toml(
        r#"
            name = "dup"
            [[hosts]]
            hostname = "h1"
            [[hosts]]
            hostname = "h1"
        "#,
    )
    .unwrap_err();
    assert!(matches!(err, TopologyError::DuplicateHost(h) if h == "h1"));
}

#[test]
fn bad_addresses_are_rejected() {
    let err = Topology::from_toml(
        r#"
            name = "bad"
            [[hosts]]
            hostname = "h1"
            ifaces = [{ name = "xeth1", address = "10.1.0.1" }]
        "#,
    )
    .unwrap_err();
    assert!(matches!(err, TopologyError::BadAddress(a) if a == "10.1.0.1"));
}

#[test]
fn ifname_carries_the_vlan_tag() {
    let topo = two_vlan_nets();
    assert_eq!(topo.host("h1").unwrap().ifaces[0].ifname(), "xeth1.10");
    let topo = two_nets();
    assert_eq!(topo.host("h1").unwrap().ifaces[0].ifname(), "xeth1");
}

#[test]
fn builtin_topologies_validate() {
    for topo in [one_net(), two_nets(), two_vlan_nets(), four_nets()] {
        topo.validate().unwrap();
    }
}

#[test]
fn four_nets_has_multipath_routes() {
    let topo = four_nets();
    let h1 = topo.host("h1").unwrap();
    assert_eq!(h1.dummies[0].address.as_deref(), Some("192.168.1.1/32"));
    assert_eq!(h1.routes.len(), 3);
    assert!(h1.routes.iter().all(|r| r.gw == "10.1.0.2"));
}

#[test]
fn suite_topologies_validate() {
    let config = Config::default();
    for flavor in [Flavor::Net, Flavor::Vlan] {
        for (topo, scenario) in suites::all(flavor, &config) {
            topo.validate().unwrap();
            assert!(!scenario.is_empty(), "{} has no steps", scenario.name());
        }
    }
}
