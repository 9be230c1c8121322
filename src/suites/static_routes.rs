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

//! Static-route suite: a two-router chain with client hosts on both ends, default routes only.
//! Also exercises blackhole route precedence and the punt path under `iperf3` load.

use crate::{
    scenario::Scenario,
    step::{
        Blackhole, Connectivity, DaemonUp, Flap, InterConnectivity, PuntStress, StaticRoutes,
    },
    topology::{Iface, Role, Topology},
};

use super::{container, iface, Flavor};

fn topology(flavor: Flavor) -> Topology {
    let mut hosts = vec![
        container(
            "CA-1",
            Role::Client,
            vec![iface(flavor, "eth-1-0", 10, "10.1.0.1/24")],
        ),
        container(
            "RA-1",
            Role::Router,
            vec![
                iface(flavor, "eth-2-0", 10, "10.1.0.2/24"),
                iface(flavor, "eth-2-1", 20, "10.2.0.2/24"),
            ],
        ),
        container(
            "RA-2",
            Role::Router,
            vec![
                iface(flavor, "eth-3-0", 20, "10.2.0.3/24"),
                iface(flavor, "eth-3-1", 30, "10.3.0.3/24"),
            ],
        ),
        container(
            "CA-2",
            Role::Client,
            vec![iface(flavor, "eth-4-0", 30, "10.3.0.4/24")],
        ),
    ];
    // loopbacks the chain must route towards
    hosts[1].dummies = vec![Iface {
        name: "lo1".to_string(),
        vlan: None,
        address: Some("192.168.0.1/32".to_string()),
    }];
    hosts[2].dummies = vec![Iface {
        name: "lo1".to_string(),
        vlan: None,
        address: Some("192.168.0.2/32".to_string()),
    }];
    Topology {
        name: format!("{flavor}-static"),
        hosts,
    }
}

const CONNECTIVITY: &[(&str, &str)] = &[
    ("CA-1", "10.1.0.2"),
    ("RA-1", "10.1.0.1"),
    ("RA-1", "10.2.0.3"),
    ("RA-1", "192.168.0.1"),
    ("RA-2", "10.2.0.2"),
    ("RA-2", "10.3.0.4"),
    ("RA-2", "192.168.0.2"),
    ("CA-2", "10.3.0.3"),
];

const INTER_CONNECTIVITY: &[(&str, &str)] = &[
    ("CA-1", "10.3.0.4"),
    ("CA-1", "192.168.0.2"),
    ("CA-2", "10.1.0.1"),
    ("CA-2", "192.168.0.1"),
];

const INTER_CONNECTIVITY_2: &[(&str, &str)] = &[
    ("CA-1", "10.1.0.2"),
    ("RA-1", "10.1.0.1"),
    ("RA-1", "10.2.0.3"),
    ("RA-1", "192.168.0.1"),
    ("RA-2", "10.2.0.2"),
    ("RA-2", "10.3.0.4"),
    ("RA-2", "192.168.0.2"),
    ("CA-2", "10.3.0.3"),
    ("CA-1", "10.3.0.4"),
    ("CA-1", "192.168.0.2"),
    ("CA-2", "10.1.0.1"),
    ("CA-2", "192.168.0.1"),
];

/// The static-route scenario.
pub fn suite(flavor: Flavor) -> (Topology, Scenario) {
    let scenario = Scenario::new(format!("{flavor}/static"))
        .step(Connectivity::new(CONNECTIVITY))
        .step(DaemonUp::new(&["zebra"]))
        .step(StaticRoutes)
        .step(InterConnectivity::with_tables(INTER_CONNECTIVITY))
        .step(Flap::default())
        .step(InterConnectivity::with_tables(INTER_CONNECTIVITY_2))
        .step(Blackhole::new("RA-2", "10.3.0.4/32", "CA-1", "10.3.0.4"))
        .step(PuntStress::new("CA-2", "10.3.0.4", "CA-1"));
    (topology(flavor), scenario)
}
