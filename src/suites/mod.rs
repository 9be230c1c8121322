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

//! The test suites of the harness.
//!
//! Each suite is one feature of the routing stack, expressed as a topology plus an ordered
//! scenario of steps. The suites are pure data builders: nothing here touches the device, they
//! only describe what the scenario runner should do.
//!
//! Every suite exists in a `net` flavour (plain interfaces) and, where the testbed wiring
//! supports it, a `vlan` flavour that carries the same subnets as tagged sub-interfaces.

use std::fmt;

use crate::{
    config::Config,
    scenario::Scenario,
    topology::{Backing, Host, Iface, Role, Topology},
};

pub mod bird;
pub mod dhcp;
pub mod frr;
pub mod gobgp;
pub mod multipath;
pub mod nsif;
pub mod ping;
pub mod routes;
pub mod slice;
pub mod static_routes;

/// Whether the topology uses plain or VLAN-tagged interfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flavor {
    /// Plain interfaces.
    Net,
    /// Tagged sub-interfaces carrying the same subnets.
    Vlan,
}

impl fmt::Display for Flavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Flavor::Net => write!(f, "net"),
            Flavor::Vlan => write!(f, "vlan"),
        }
    }
}

/// Build every suite for the given flavour, in the order they should run. The namespaced
/// suites only exist in the `net` flavour, and the slice suite is only wired for VLANs.
pub fn all(flavor: Flavor, config: &Config) -> Vec<(Topology, Scenario)> {
    let mut suites = vec![ping::suite(flavor, config)];
    if flavor == Flavor::Net {
        suites.push(nsif::suite(flavor));
        suites.push(nsif::suite_ip6());
        suites.push(multipath::suite(flavor));
    }
    suites.extend([
        static_routes::suite(flavor),
        routes::suite(flavor),
        gobgp::ebgp(flavor),
        bird::bgp(flavor),
        bird::ospf(flavor),
        frr::bgp(flavor),
        frr::ospf(flavor),
        frr::isis(flavor),
        dhcp::suite(flavor),
    ]);
    if flavor == Flavor::Vlan {
        suites.push(slice::suite(flavor, config));
    }
    suites
}

pub(crate) fn iface(flavor: Flavor, name: &str, vlan: u16, address: &str) -> Iface {
    Iface {
        name: name.to_string(),
        vlan: (flavor == Flavor::Vlan).then_some(vlan),
        address: Some(address.to_string()),
    }
}

pub(crate) fn container(hostname: &str, role: Role, ifaces: Vec<Iface>) -> Host {
    Host {
        hostname: hostname.to_string(),
        role,
        backing: Backing::Container,
        netns: None,
        ifaces,
        dummies: vec![],
        routes: vec![],
        remotes: vec![],
        sysctls: vec![],
    }
}

/// The four routers wired in a square, used by all dynamic-routing suites. The VLAN tag of each
/// link matches the third octet of its subnet.
pub(crate) fn four_routers(name: &str, flavor: Flavor) -> Topology {
    Topology {
        name: format!("{flavor}-{name}"),
        hosts: vec![
            container(
                "R1",
                Role::Router,
                vec![
                    iface(flavor, "eth-1-0", 120, "192.168.120.5/24"),
                    iface(flavor, "eth-1-1", 150, "192.168.150.5/24"),
                ],
            ),
            container(
                "R2",
                Role::Router,
                vec![
                    iface(flavor, "eth-2-0", 120, "192.168.120.10/24"),
                    iface(flavor, "eth-2-1", 222, "192.168.222.10/24"),
                ],
            ),
            container(
                "R3",
                Role::Router,
                vec![
                    iface(flavor, "eth-3-0", 222, "192.168.222.2/24"),
                    iface(flavor, "eth-3-1", 111, "192.168.111.2/24"),
                ],
            ),
            container(
                "R4",
                Role::Router,
                vec![
                    iface(flavor, "eth-4-0", 111, "192.168.111.4/24"),
                    iface(flavor, "eth-4-1", 150, "192.168.150.4/24"),
                ],
            ),
        ],
    }
}

/// The connectivity sweep of the four-router square: every router pings its two direct
/// neighbors.
pub(crate) const SQUARE_CONNECTIVITY: &[(&str, &str)] = &[
    ("R1", "192.168.120.10"),
    ("R1", "192.168.150.4"),
    ("R2", "192.168.222.2"),
    ("R2", "192.168.120.5"),
    ("R3", "192.168.222.10"),
    ("R3", "192.168.111.4"),
    ("R4", "192.168.111.2"),
    ("R4", "192.168.150.5"),
];

/// The cross-segment sweep of the four-router square: every router pings the far side of its
/// neighbors, which only works once routes are exchanged.
pub(crate) const SQUARE_INTER_CONNECTIVITY: &[(&str, &str)] = &[
    ("R1", "192.168.222.2"),
    ("R1", "192.168.111.2"),
    ("R2", "192.168.111.4"),
    ("R2", "192.168.150.4"),
    ("R3", "192.168.120.5"),
    ("R3", "192.168.150.5"),
    ("R4", "192.168.120.10"),
    ("R4", "192.168.222.10"),
];

/// The routes every router must learn about the two subnets it is not attached to.
pub(crate) const SQUARE_ROUTES: &[(&str, &str)] = &[
    ("R1", "192.168.222.0/24"),
    ("R1", "192.168.111.0/24"),
    ("R2", "192.168.150.0/24"),
    ("R2", "192.168.111.0/24"),
    ("R3", "192.168.120.0/24"),
    ("R3", "192.168.150.0/24"),
    ("R4", "192.168.120.0/24"),
    ("R4", "192.168.222.0/24"),
];

/// The BGP/OSPF peerings of the square, by peer address.
pub(crate) const SQUARE_PEERINGS: &[(&str, &str)] = &[
    ("R1", "192.168.120.10"),
    ("R1", "192.168.150.4"),
    ("R2", "192.168.120.5"),
    ("R2", "192.168.222.2"),
    ("R3", "192.168.222.10"),
    ("R3", "192.168.111.4"),
    ("R4", "192.168.111.2"),
    ("R4", "192.168.150.5"),
];
