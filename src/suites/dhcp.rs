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

//! DHCP suite: R2 serves addresses, R1 drops its static address and re-acquires one over DHCP.
//! Also verifies that the client's request does not leak an invalid `vlan 0` tag through the
//! device (issue seen on tagged ports).

use crate::{
    scenario::Scenario,
    step::{Connectivity, DhcpClient, DhcpServer, DhcpVlanTag},
    topology::{Role, Topology},
};

use super::{container, iface, Flavor};

fn topology(flavor: Flavor) -> Topology {
    Topology {
        name: format!("{flavor}-dhcp"),
        hosts: vec![
            container(
                "R1",
                Role::Client,
                vec![iface(flavor, "eth-1-0", 120, "192.168.120.5/24")],
            ),
            container(
                "R2",
                Role::Router,
                vec![iface(flavor, "eth-2-0", 120, "192.168.120.10/24")],
            ),
        ],
    }
}

const CONNECTIVITY: &[(&str, &str)] = &[
    ("R1", "192.168.120.10"),
    ("R2", "192.168.120.5"),
];

/// The DHCP scenario.
pub fn suite(flavor: Flavor) -> (Topology, Scenario) {
    let scenario = Scenario::new(format!("{flavor}/dhcp"))
        .step(Connectivity::new(CONNECTIVITY))
        .step(DhcpServer {
            server: "R2".to_string(),
        })
        .step(DhcpClient::new("R1", "192.168.120.5/24", "192.168.120.10"))
        .step(Connectivity::new(&[("R1", "192.168.120.10")]))
        .step(DhcpVlanTag::new("R1", "R2"));
    (topology(flavor), scenario)
}
