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

//! Typed expectations over the systems under test.
//!
//! Every check the harness performs is an [`Expectation`]: it knows which command to run and
//! which pattern in the output satisfies it. The command depends on the routing daemon under
//! test (`vtysh` for FRR, `birdc` for BIRD, the `gobgp` client for GoBGP), the pattern is a
//! regular expression over the raw combined output. Keeping both behind one type makes the
//! intent of a check explicit in the scenario, and lets the unit tests exercise command
//! generation and matching against canned outputs without a live device.

use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;

use crate::{exec::Probe, SwitchLabError};

/// The routing control-plane implementation running on the routers of a topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoutingDaemon {
    /// FRRouting, controlled through `vtysh`.
    Frr,
    /// BIRD, controlled through `birdc`.
    Bird,
    /// GoBGP, controlled through the `gobgp` client binary.
    Gobgp,
}

impl fmt::Display for RoutingDaemon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoutingDaemon::Frr => write!(f, "FRR"),
            RoutingDaemon::Bird => write!(f, "BIRD"),
            RoutingDaemon::Gobgp => write!(f, "GoBGP"),
        }
    }
}

lazy_static! {
    /// A hardware rewrite entry for a resolved next-hop, as printed by `goes fe1 switch adj`.
    static ref ADJACENCY_RE: Regex = Regex::new(r"hard.*l3_unicast.*true.*").unwrap();
}

/// Count the hardware rewrite entries in the output of `goes fe1 switch adj`. After all
/// interfaces are admin down, this must be zero; leftovers indicate a cleanup defect in the
/// forwarding daemon.
pub fn adjacency_rewrites(out: &str) -> usize {
    ADJACENCY_RE.find_iter(out).count()
}

/// One verifiable condition on a host or on the device under test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expectation {
    /// A BGP session with `peer` is in the `Established` state.
    BgpPeerEstablished {
        /// The daemon to query.
        daemon: RoutingDaemon,
        /// Peer address (FRR, GoBGP) or protocol instance name (BIRD).
        peer: String,
    },
    /// An OSPF adjacency with `peer` exists.
    OspfNeighbor {
        /// The daemon to query.
        daemon: RoutingDaemon,
        /// Neighbor address (FRR) or router id (BIRD).
        peer: String,
    },
    /// An IS-IS adjacency with the system named `peer` exists on `address`.
    IsisNeighbor {
        /// The hostname of the expected neighbor.
        peer: String,
        /// The interface address the adjacency is expected on.
        address: String,
    },
    /// The kernel FIB contains a route for `prefix`.
    KernelRoute {
        /// The prefix to look for, e.g. `192.168.222.0/24` or `default`.
        prefix: String,
    },
    /// The routing daemon's RIB contains a route for `prefix` learned from `proto`.
    RibRoute {
        /// Protocol selector passed to `show ip route` (e.g. `isis`).
        proto: String,
        /// The prefix to look for.
        prefix: String,
    },
    /// The RIB contains a selected static default route (`S>* 0.0.0.0/0`).
    StaticDefaultRoute,
    /// A process matching `process` shows up in `ps ax`.
    DaemonRunning {
        /// Substring of the process name, e.g. `bgpd`.
        process: String,
    },
    /// The device FIB contains an entry matching `pattern`, checked with
    /// `goes vnet show ip fib [table <table>]`.
    FibEntry {
        /// Restrict the query to the FIB table of one host.
        table: Option<String>,
        /// Pattern that must appear in the FIB dump.
        pattern: String,
    },
    /// The device has a hardware neighbor entry matching `pattern`
    /// (`goes fe1 xeth neigh`).
    HardwareNeighbor {
        /// Pattern of the neighbor address.
        pattern: String,
    },
    /// No hardware neighbor entry matching `pattern` is left on the device.
    NoHardwareNeighbor {
        /// Pattern of the neighbor address.
        pattern: String,
    },
    /// No hardware rewrite entries are left on the device (`goes fe1 switch adj`).
    NoAdjacencies,
}

impl Expectation {
    /// Whether this expectation queries the device under test (and must therefore run locally
    /// through the `goes` CLI) rather than a topology host.
    pub fn on_device(&self) -> bool {
        matches!(
            self,
            Expectation::FibEntry { .. }
                | Expectation::HardwareNeighbor { .. }
                | Expectation::NoHardwareNeighbor { .. }
                | Expectation::NoAdjacencies
        )
    }

    /// The command to run. Device checks take the path of the `goes` binary.
    pub fn command(&self, goes: &str) -> Vec<String> {
        let s = |x: &str| x.to_string();
        match self {
            Expectation::BgpPeerEstablished { daemon, peer } => match daemon {
                RoutingDaemon::Frr => {
                    vec![s("vtysh"), s("-c"), format!("show ip bgp neighbor {peer}")]
                }
                RoutingDaemon::Bird => {
                    vec![s("birdc"), s("show"), s("protocols"), s("all"), s(peer)]
                }
                RoutingDaemon::Gobgp => vec![s("/root/gobgp"), s("neighbor"), s(peer)],
            },
            Expectation::OspfNeighbor { daemon, .. } => match daemon {
                RoutingDaemon::Bird => vec![s("birdc"), s("show"), s("ospf"), s("neighbors")],
                _ => vec![s("vtysh"), s("-c"), s("show ip ospf neighbor")],
            },
            Expectation::IsisNeighbor { peer, .. } => {
                vec![s("vtysh"), s("-c"), format!("show isis neighbor {peer}")]
            }
            Expectation::KernelRoute { prefix } => {
                vec![s("ip"), s("route"), s("show"), s(prefix)]
            }
            Expectation::RibRoute { proto, prefix } => {
                if proto.is_empty() {
                    vec![s("vtysh"), s("-c"), format!("show ip route {prefix}")]
                } else {
                    vec![s("vtysh"), s("-c"), format!("show ip route {proto}")]
                }
            }
            Expectation::StaticDefaultRoute => {
                vec![s("vtysh"), s("-c"), s("show ip route")]
            }
            Expectation::DaemonRunning { .. } => vec![s("ps"), s("ax")],
            Expectation::FibEntry { table, .. } => {
                let mut cmd = vec![s(goes), s("vnet"), s("show"), s("ip"), s("fib")];
                if let Some(table) = table {
                    cmd.push(s("table"));
                    cmd.push(s(table));
                }
                cmd
            }
            Expectation::HardwareNeighbor { .. } | Expectation::NoHardwareNeighbor { .. } => {
                vec![s(goes), s("fe1"), s("xeth"), s("neigh")]
            }
            Expectation::NoAdjacencies => vec![s(goes), s("fe1"), s("switch"), s("adj")],
        }
    }

    /// The pattern whose presence (or absence, for the negated checks) satisfies this
    /// expectation.
    pub fn pattern(&self) -> String {
        match self {
            Expectation::BgpPeerEstablished { daemon, .. } => match daemon {
                RoutingDaemon::Frr => "state = Established".to_string(),
                RoutingDaemon::Bird => "Established".to_string(),
                RoutingDaemon::Gobgp => "state = established".to_string(),
            },
            Expectation::OspfNeighbor { peer, .. } => regex::escape(peer),
            Expectation::IsisNeighbor { address, .. } => regex::escape(address),
            Expectation::KernelRoute { prefix } => regex::escape(prefix),
            Expectation::RibRoute { prefix, .. } => regex::escape(prefix),
            Expectation::StaticDefaultRoute => r"S>\* 0\.0\.0\.0/0".to_string(),
            Expectation::DaemonRunning { process } => format!(".*{}.*", regex::escape(process)),
            Expectation::FibEntry { pattern, .. } => pattern.clone(),
            Expectation::HardwareNeighbor { pattern }
            | Expectation::NoHardwareNeighbor { pattern } => pattern.clone(),
            Expectation::NoAdjacencies => ADJACENCY_RE.as_str().to_string(),
        }
    }

    /// Whether the expectation is satisfied by the pattern being *absent*.
    pub fn negated(&self) -> bool {
        matches!(
            self,
            Expectation::NoHardwareNeighbor { .. } | Expectation::NoAdjacencies
        )
    }

    /// Whether the given output satisfies this expectation.
    pub fn satisfied_by(&self, out: &str) -> bool {
        let found = Regex::new(&self.pattern()).unwrap().is_match(out);
        found != self.negated()
    }

    /// Run the expectation's command on the given probe once, and return the observed output
    /// together with whether it satisfied the expectation. Intended as the attempt body of a
    /// [`crate::Poller`].
    pub async fn check(
        &self,
        probe: &Probe,
        goes: &str,
    ) -> Result<(String, bool), SwitchLabError> {
        let out = probe.output(&self.command(goes)).await?;
        let ok = self.satisfied_by(&out);
        Ok((out, ok))
    }

    /// Human-readable description naming the host and the expectation, used in failure reports.
    pub fn describe(&self, host: &str) -> String {
        match self {
            Expectation::BgpPeerEstablished { daemon, peer } => {
                format!("{daemon} BGP peer {peer} established on {host}")
            }
            Expectation::OspfNeighbor { daemon, peer } => {
                format!("{daemon} OSPF neighbor {peer} on {host}")
            }
            Expectation::IsisNeighbor { peer, address } => {
                format!("IS-IS neighbor {peer} ({address}) on {host}")
            }
            Expectation::KernelRoute { prefix } => format!("kernel route {prefix} on {host}"),
            Expectation::RibRoute { proto, prefix } => {
                format!("{proto} route {prefix} in the RIB of {host}")
            }
            Expectation::StaticDefaultRoute => {
                format!("selected static default route on {host}")
            }
            Expectation::DaemonRunning { process } => format!("{process} running on {host}"),
            Expectation::FibEntry { table, pattern } => match table {
                Some(table) => format!("device FIB entry {pattern} in table {table}"),
                None => format!("device FIB entry {pattern}"),
            },
            Expectation::HardwareNeighbor { pattern } => {
                format!("hardware neighbor {pattern} on the device")
            }
            Expectation::NoHardwareNeighbor { pattern } => {
                format!("no leftover hardware neighbor {pattern} on the device")
            }
            Expectation::NoAdjacencies => "no leftover hardware rewrites on the device".to_string(),
        }
    }
}
