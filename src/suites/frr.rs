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

//! FRRouting suites: BGP, OSPF, and IS-IS over the four-router square.

use crate::{
    expect::RoutingDaemon,
    scenario::Scenario,
    step::{
        AdminDown, Carrier, Connectivity, DaemonUp, Flap, InterConnectivity, IsisIntfConf,
        NeighborEstablished, RoutePresent,
    },
    topology::Topology,
};

use super::{
    four_routers, Flavor, SQUARE_CONNECTIVITY, SQUARE_INTER_CONNECTIVITY, SQUARE_PEERINGS,
    SQUARE_ROUTES,
};

/// eBGP between the four routers, followed by a flap and an admin-down sweep.
pub fn bgp(flavor: Flavor) -> (Topology, Scenario) {
    let scenario = Scenario::new(format!("{flavor}/frr/bgp"))
        .step(Connectivity::new(SQUARE_CONNECTIVITY))
        .step(DaemonUp::new(&["bgpd", "zebra"]))
        .step(NeighborEstablished::bgp(RoutingDaemon::Frr, SQUARE_PEERINGS))
        .step(RoutePresent::kernel(SQUARE_ROUTES))
        .step(InterConnectivity::new(SQUARE_INTER_CONNECTIVITY))
        .step(Flap::default())
        .step(Connectivity::new(SQUARE_CONNECTIVITY))
        .step(AdminDown);
    (four_routers("frr-bgp", flavor), scenario)
}

/// OSPF between the four routers, with a carrier check up front.
pub fn ospf(flavor: Flavor) -> (Topology, Scenario) {
    let scenario = Scenario::new(format!("{flavor}/frr/ospf"))
        .step(Carrier)
        .step(Connectivity::new(SQUARE_CONNECTIVITY))
        .step(DaemonUp::new(&["ospfd", "zebra"]))
        .step(NeighborEstablished::ospf(
            RoutingDaemon::Frr,
            SQUARE_PEERINGS,
        ))
        .step(RoutePresent::kernel(SQUARE_ROUTES))
        .step(InterConnectivity::new(SQUARE_INTER_CONNECTIVITY))
        .step(Flap::default())
        .step(Connectivity::new(SQUARE_CONNECTIVITY))
        .step(AdminDown);
    (four_routers("frr-ospf", flavor), scenario)
}

/// The IS-IS adjacencies of the square: `(host, peer system, peer address)`.
const ISIS_NEIGHBORS: &[(&str, &str, &str)] = &[
    ("R1", "R2", "192.168.120.10"),
    ("R1", "R4", "192.168.150.4"),
    ("R2", "R1", "192.168.120.5"),
    ("R2", "R3", "192.168.222.2"),
    ("R3", "R2", "192.168.222.10"),
    ("R3", "R4", "192.168.111.4"),
    ("R4", "R3", "192.168.111.2"),
    ("R4", "R1", "192.168.150.5"),
];

/// IS-IS between the four routers. The interface configuration is applied by the scenario
/// itself, since the containers only carry the daemon configuration.
pub fn isis(flavor: Flavor) -> (Topology, Scenario) {
    let scenario = Scenario::new(format!("{flavor}/frr/isis"))
        .step(Connectivity::new(SQUARE_CONNECTIVITY))
        .step(DaemonUp::new(&["isisd", "zebra"]))
        .step(IsisIntfConf)
        .step(NeighborEstablished::isis(ISIS_NEIGHBORS))
        .step(RoutePresent::rib("isis", SQUARE_ROUTES))
        .step(InterConnectivity::new(SQUARE_INTER_CONNECTIVITY))
        .step(Flap::default())
        .step(Connectivity::new(SQUARE_CONNECTIVITY))
        .step(AdminDown);
    (four_routers("frr-isis", flavor), scenario)
}
