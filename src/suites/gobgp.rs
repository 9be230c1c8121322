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

//! GoBGP suite: eBGP over the four-router square, with zebra injecting the learned routes into
//! the kernel.

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
};

/// The routes of the square plus the loopbacks each router redistributes.
const GOBGP_ROUTES: &[(&str, &str)] = &[
    ("R1", "192.168.222.0/24"),
    ("R1", "192.168.111.0/24"),
    ("R1", "192.168.1.10/32"),
    ("R1", "192.168.2.2/32"),
    ("R1", "192.168.2.4/32"),
    ("R2", "192.168.150.0/24"),
    ("R2", "192.168.111.0/24"),
    ("R2", "192.168.1.5/32"),
    ("R2", "192.168.2.2/32"),
    ("R2", "192.168.2.4/32"),
    ("R3", "192.168.120.0/24"),
    ("R3", "192.168.150.0/24"),
    ("R3", "192.168.1.5/32"),
    ("R3", "192.168.1.10/32"),
    ("R3", "192.168.2.4/32"),
    ("R4", "192.168.120.0/24"),
    ("R4", "192.168.222.0/24"),
    ("R4", "192.168.1.5/32"),
    ("R4", "192.168.1.10/32"),
    ("R4", "192.168.2.2/32"),
];

/// eBGP with GoBGP.
pub fn ebgp(flavor: Flavor) -> (Topology, Scenario) {
    let scenario = Scenario::new(format!("{flavor}/gobgp/ebgp"))
        .step(Connectivity::new(SQUARE_CONNECTIVITY))
        .step(DaemonUp::new(&["gobgpd", "zebra"]))
        .step(NeighborEstablished::bgp(
            RoutingDaemon::Gobgp,
            SQUARE_PEERINGS,
        ))
        .step(RoutePresent::rib("", GOBGP_ROUTES))
        .step(InterConnectivity::new(SQUARE_INTER_CONNECTIVITY))
        .step(Flap::default())
        .step(Connectivity::new(SQUARE_CONNECTIVITY))
        .step(AdminDown);
    (four_routers("gobgp-ebgp", flavor), scenario)
}
