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

//! Multipath suite: four namespaced hosts with dummy loopbacks, reached through appended
//! (ECMP) routes. Removing one path must leave the remaining paths working, and removing a
//! route must not break directly-connected reachability.

use crate::{
    scenario::Scenario,
    step::{DeleteNetns, ModifyRoute, PingGateways, PingRemotes},
    topology::{four_nets, Topology},
};

use super::Flavor;

/// The multipath scenario. The VLAN flavour is not wired on the testbed, so both flavours run
/// the plain four-net topology.
pub fn suite(_flavor: Flavor) -> (Topology, Scenario) {
    let scenario = Scenario::new("net/multipath")
        .step(PingRemotes::settling())
        // drop one path towards the far dummies; the appended paths must keep working
        .step(ModifyRoute::del("h3", "192.168.1.1/32", "10.3.0.2"))
        .step(ModifyRoute::del("h4", "192.168.1.1/32", "10.4.0.2"))
        .step(ModifyRoute::append("h3", "192.168.1.1/32", "10.3.0.2"))
        .step(ModifyRoute::append("h4", "192.168.1.1/32", "10.4.0.2"))
        .step(PingRemotes::settling())
        .step(PingGateways)
        // removing a routed prefix must not affect the directly-connected gateway
        .step(ModifyRoute::del("h1", "192.168.2.1/32", "10.1.0.2"))
        .step(PingGateways)
        .step(ModifyRoute::append("h1", "192.168.2.1/32", "10.1.0.2"))
        .step(DeleteNetns);
    (four_nets(), scenario)
}
