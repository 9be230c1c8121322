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

//! Basic ping suite: gateway reachability, routed reachability, and a flood, over the two
//! routed networks.

use std::time::Duration;

use crate::{
    config::Config,
    scenario::Scenario,
    step::{PingFlood, PingGateways, PingRemotes},
    topology::{two_nets, two_vlan_nets, Topology},
};

use super::Flavor;

/// The ping scenario.
pub fn suite(flavor: Flavor, config: &Config) -> (Topology, Scenario) {
    let topo = match flavor {
        Flavor::Net => two_nets(),
        Flavor::Vlan => two_vlan_nets(),
    };
    let scenario = Scenario::new(format!("{flavor}/ping"))
        .step(PingGateways)
        .step(PingRemotes::default())
        .step(PingFlood::new(Duration::from_secs(config.flood_secs)));
    (topo, scenario)
}
