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

//! VLAN slice suite: two independent slices (A and B) carrying the same addressing over
//! separate VLANs. Verifies that partitioning one slice never leaks into the other, and that
//! both survive a flood.

use std::time::Duration;

use crate::{
    config::Config,
    scenario::Scenario,
    step::{Connectivity, DaemonUp, InterConnectivity, Isolation, PingFlood, RoutePresent},
    topology::{Role, Topology},
};

use super::{container, iface, Flavor};

fn slice_hosts(topology: &mut Vec<crate::topology::Host>, slice: char, base_vlan: u16) {
    let eth = |i: u16| format!("eth-{slice}-{i}");
    topology.push(container(
        &format!("C{slice}-1"),
        Role::Client,
        vec![iface(
            Flavor::Vlan,
            &eth(1),
            base_vlan,
            "10.1.0.1/24",
        )],
    ));
    topology.push(container(
        &format!("R{slice}-1"),
        Role::Router,
        vec![
            iface(Flavor::Vlan, &eth(2), base_vlan, "10.1.0.2/24"),
            iface(Flavor::Vlan, &eth(3), base_vlan + 1, "10.2.0.2/24"),
        ],
    ));
    topology.push(container(
        &format!("R{slice}-2"),
        Role::Router,
        vec![
            iface(Flavor::Vlan, &eth(4), base_vlan + 1, "10.2.0.3/24"),
            iface(Flavor::Vlan, &eth(5), base_vlan + 2, "10.3.0.3/24"),
        ],
    ));
    topology.push(container(
        &format!("C{slice}-2"),
        Role::Client,
        vec![iface(
            Flavor::Vlan,
            &eth(6),
            base_vlan + 2,
            "10.3.0.4/24",
        )],
    ));
}

fn topology(flavor: Flavor) -> Topology {
    let mut hosts = Vec::new();
    slice_hosts(&mut hosts, 'A', 100);
    slice_hosts(&mut hosts, 'B', 200);
    Topology {
        name: format!("{flavor}-slice"),
        hosts,
    }
}

const CONNECTIVITY: &[(&str, &str)] = &[
    ("CA-1", "10.1.0.2"),
    ("RA-1", "10.1.0.1"),
    ("RA-1", "10.2.0.3"),
    ("RA-2", "10.2.0.2"),
    ("RA-2", "10.3.0.4"),
    ("CA-2", "10.3.0.3"),
    ("CB-1", "10.1.0.2"),
    ("RB-1", "10.1.0.1"),
    ("RB-1", "10.2.0.3"),
    ("RB-2", "10.2.0.2"),
    ("RB-2", "10.3.0.4"),
    ("CB-2", "10.3.0.3"),
];

const ROUTES: &[(&str, &str)] = &[
    ("CA-1", "10.3.0.0/24"),
    ("CA-2", "10.1.0.0/24"),
    ("CB-1", "10.3.0.0/24"),
    ("CB-2", "10.1.0.0/24"),
];

const INTER_CONNECTIVITY: &[(&str, &str)] = &[
    ("CA-1", "10.3.0.4"),
    ("CB-1", "10.3.0.4"),
    ("CA-2", "10.1.0.1"),
    ("CB-2", "10.1.0.1"),
];

/// The slice scenario.
pub fn suite(flavor: Flavor, config: &Config) -> (Topology, Scenario) {
    let flood = Duration::from_secs(config.flood_secs);
    let scenario = Scenario::new(format!("{flavor}/slice"))
        .step(Connectivity::new(CONNECTIVITY))
        .step(DaemonUp::new(&["ospfd", "zebra"]))
        .step(RoutePresent::kernel(ROUTES))
        .step(InterConnectivity::new(INTER_CONNECTIVITY))
        // partition slice B; slice A must be unaffected
        .step(Isolation::new(
            "RB-2",
            ("CB-1", "10.3.0.4"),
            ("CA-1", "10.3.0.4"),
            false,
        ))
        // partition slice A; slice B may still be reconverging from the partition above
        .step(Isolation::new(
            "RA-2",
            ("CA-1", "10.3.0.4"),
            ("CB-1", "10.3.0.4"),
            true,
        ))
        .step(PingFlood::towards(flood, "CA-1", "10.1.0.2"))
        .step(Connectivity::new(CONNECTIVITY))
        .step(RoutePresent::kernel(ROUTES))
        .step(InterConnectivity::new(INTER_CONNECTIVITY));
    (topology(flavor), scenario)
}
