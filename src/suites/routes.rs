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

//! Route-churn suite: install and remove batches of 900, 1500, and 4500 routes on the middle
//! router, verifying connectivity between every batch. Exercises FIB scaling and cleanup on the
//! device.

use crate::{
    scenario::Scenario,
    step::{BatchRoutes, Connectivity},
    topology::{Role, Topology},
};

use super::{container, iface, Flavor};

fn topology(flavor: Flavor) -> Topology {
    Topology {
        name: format!("{flavor}-routes"),
        hosts: vec![
            container(
                "H1",
                Role::Client,
                vec![iface(flavor, "eth-1-0", 10, "10.1.0.2/24")],
            ),
            container(
                "R1",
                Role::Router,
                vec![
                    iface(flavor, "eth-2-0", 10, "10.1.0.1/24"),
                    iface(flavor, "eth-2-1", 20, "10.2.0.1/24"),
                ],
            ),
            container(
                "H2",
                Role::Client,
                vec![iface(flavor, "eth-3-0", 20, "10.2.0.2/24")],
            ),
        ],
    }
}

const CONNECTIVITY: &[(&str, &str)] = &[
    ("H1", "10.1.0.1"),
    ("R1", "10.1.0.2"),
    ("R1", "10.2.0.2"),
    ("R1", "192.168.1.2"),
    ("R1", "192.168.2.2"),
    ("H2", "10.2.0.1"),
    ("H1", "10.2.0.1"),
    ("H1", "10.2.0.2"),
    ("H1", "192.168.2.2"),
];

/// The route-churn scenario. The batch files are part of the router container image.
pub fn suite(flavor: Flavor) -> (Topology, Scenario) {
    let mut scenario =
        Scenario::new(format!("{flavor}/routes")).step(Connectivity::new(CONNECTIVITY));
    for size in ["900", "1500", "4500"] {
        scenario = scenario
            .step(BatchRoutes::new(
                &format!("add {size}"),
                "R1",
                &format!("/etc/frr/add{size}"),
            ))
            .step(Connectivity::new(CONNECTIVITY))
            .step(BatchRoutes::new(
                &format!("del {size}"),
                "R1",
                &format!("/etc/frr/del{size}"),
            ))
            .step(Connectivity::new(CONNECTIVITY));
    }
    (topology(flavor), scenario)
}
