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

//! Namespaced-interface suite: move ports into namespaces, verify reachability and the hardware
//! neighbor entries, then delete the namespaces out from under the interfaces and verify that
//! the kernel hands them back and the device forgets the neighbors.

use crate::{
    scenario::Scenario,
    step::{Connectivity, DeleteNetns, HardwareNeighbors, NoHardwareNeighbors},
    topology::{one_net, one_net_ip6, Topology},
};

use super::Flavor;

fn remote_pairs(topo: &Topology) -> Vec<(String, String)> {
    topo.hosts
        .iter()
        .flat_map(|h| {
            h.remotes
                .iter()
                .map(|r| (h.hostname.clone(), r.clone()))
                .collect::<Vec<_>>()
        })
        .collect()
}

fn build(topo: Topology, name: String) -> (Topology, Scenario) {
    let pairs = remote_pairs(&topo);
    let scenario = Scenario::new(name)
        .step(Connectivity { pairs })
        .step(HardwareNeighbors::default())
        .step(DeleteNetns)
        .step(NoHardwareNeighbors);
    (topo, scenario)
}

/// The namespaced-interface scenario over one IPv4 net.
pub fn suite(_flavor: Flavor) -> (Topology, Scenario) {
    build(one_net(), "net/nsif".to_string())
}

/// The namespaced-interface scenario over one IPv6 net.
pub fn suite_ip6() -> (Topology, Scenario) {
    build(one_net_ip6(), "net/nsif-ip6".to_string())
}
