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

//! BIRD suites: BGP and OSPF over the four-router square.
//!
//! BIRD names its protocol instances after the peer router, so the BGP peerings are checked by
//! instance name rather than by address.

use crate::{
    expect::RoutingDaemon,
    scenario::Scenario,
    step::{
        AdminDown, Connectivity, DaemonUp, Flap, InterConnectivity, NeighborEstablished,
        RoutePresent,
    },
    topology::Topology,
};

use super::{
    four_routers, Flavor, SQUARE_CONNECTIVITY, SQUARE_INTER_CONNECTIVITY, SQUARE_PEERINGS,
    SQUARE_ROUTES,
};

/// The BGP protocol instances of the square, named after the peer.
const BIRD_PEERINGS: &[(&str, &str)] = &[
    ("R1", "R2"),
    ("R1", "R4"),
    ("R2", "R1"),
    ("R2", "R3"),
    ("R3", "R2"),
    ("R3", "R4"),
    ("R4", "R1"),
    ("R4", "R3"),
];

/// eBGP with BIRD.
pub fn bgp(flavor: Flavor) -> (Topology, Scenario) {
    let scenario = Scenario::new(format!("{flavor}/bird/bgp"))
        .step(Connectivity::new(SQUARE_CONNECTIVITY))
        .step(DaemonUp::new(&["bird"]))
        .step(NeighborEstablished::bgp(RoutingDaemon::Bird, BIRD_PEERINGS))
        .step(RoutePresent::kernel(SQUARE_ROUTES))
        .step(InterConnectivity::new(SQUARE_INTER_CONNECTIVITY))
        .step(Flap::default())
        .step(Connectivity::new(SQUARE_CONNECTIVITY))
        .step(AdminDown);
    (four_routers("bird-bgp", flavor), scenario)
}

/// OSPF with BIRD.
pub fn ospf(flavor: Flavor) -> (Topology, Scenario) {
    let scenario = Scenario::new(format!("{flavor}/bird/ospf"))
        .step(Connectivity::new(SQUARE_CONNECTIVITY))
        .step(DaemonUp::new(&["bird"]))
        .step(NeighborEstablished::ospf(
            RoutingDaemon::Bird,
            SQUARE_PEERINGS,
        ))
        .step(RoutePresent::kernel(SQUARE_ROUTES))
        .step(InterConnectivity::new(SQUARE_INTER_CONNECTIVITY))
        .step(Flap::default())
        .step(Connectivity::new(SQUARE_CONNECTIVITY))
        .step(AdminDown);
    (four_routers("bird-ospf", flavor), scenario)
}
