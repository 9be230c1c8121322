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

//! Declarative description of a test topology.
//!
//! A [`Topology`] lists the hosts around the device under test, together with their interfaces,
//! addresses, static routes, and the remote addresses they are expected to reach. Topologies are
//! static data: the fixture builds the live environment from them and never mutates them.
//!
//! Topologies are either loaded from a TOML document or taken from the built-in tables at the
//! bottom of this module, which describe the standard port wirings of the testbed (one net, two
//! nets, four nets, and their VLAN variants).

use std::net::IpAddr;

use ipnet::IpNet;
use serde::Deserialize;
use thiserror::Error;

use crate::exec::ExecContext;

/// The role a host plays in the topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Runs a routing daemon.
    #[default]
    Router,
    /// Traffic source/sink on the client side.
    Client,
    /// Traffic source/sink on the server side.
    Server,
}

/// How the host is realized, and therefore how commands reach it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Backing {
    /// A network namespace created (and destroyed) by the fixture.
    #[default]
    Netns,
    /// An externally provisioned container, reached with `docker exec`. The fixture verifies
    /// that it is running but does not manage its lifecycle.
    Container,
}

/// One interface of a host. The record is static topology metadata; carrier and admin state are
/// mutated externally by scenario steps.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Iface {
    /// Base name of the interface (a front-panel port such as `xeth1`, or `eth-1-0` inside a
    /// container).
    pub name: String,
    /// Optional VLAN tag. Tagged interfaces are addressed as `name.vlan`.
    #[serde(default)]
    pub vlan: Option<u16>,
    /// Address in CIDR notation to assign during the build.
    #[serde(default)]
    pub address: Option<String>,
}

impl Iface {
    /// The full interface name: `name` or `name.vlan` for tagged interfaces.
    pub fn ifname(&self) -> String {
        match self.vlan {
            Some(vlan) => format!("{}.{}", self.name, vlan),
            None => self.name.clone(),
        }
    }

    /// Whether the assigned address is IPv6.
    pub fn is_ip6(&self) -> bool {
        self.address.as_deref().map_or(false, |a| a.contains(':'))
    }
}

/// A static route installed on a host during the build.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StaticRoute {
    /// Destination prefix, or `default`.
    pub prefix: String,
    /// Gateway address.
    pub gw: String,
}

/// One host of the topology.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Host {
    /// Unique name, doubling as the container name or (by default) the namespace name.
    pub hostname: String,
    /// The role of this host.
    #[serde(default)]
    pub role: Role,
    /// How the host is realized.
    #[serde(default)]
    pub backing: Backing,
    /// Name of the network namespace; defaults to the hostname.
    #[serde(default)]
    pub netns: Option<String>,
    /// The interfaces of this host.
    #[serde(default)]
    pub ifaces: Vec<Iface>,
    /// Dummy interfaces to create inside the host (used by the multipath tests).
    #[serde(default)]
    pub dummies: Vec<Iface>,
    /// Static routes to install during the build (with `ip route append`, so that repeated
    /// prefixes become multipath routes).
    #[serde(default)]
    pub routes: Vec<StaticRoute>,
    /// Remote addresses this host is expected to reach once the topology has converged.
    #[serde(default)]
    pub remotes: Vec<String>,
    /// Sysctl assignments (`key=value`) applied to the namespace during the build.
    #[serde(default)]
    pub sysctls: Vec<String>,
}

impl Host {
    /// Name of the network namespace backing this host.
    pub fn netns(&self) -> &str {
        self.netns.as_deref().unwrap_or(&self.hostname)
    }

    /// The execution context commands on this host run in.
    pub fn context(&self) -> ExecContext {
        match self.backing {
            Backing::Netns => ExecContext::Netns(self.netns().to_string()),
            Backing::Container => ExecContext::Container(self.hostname.clone()),
        }
    }
}

/// A declarative multi-host test topology.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Topology {
    /// Name of the topology, used in log messages.
    pub name: String,
    /// The hosts of the topology.
    pub hosts: Vec<Host>,
}

impl Topology {
    /// Parse a topology from a TOML document and validate it.
    pub fn from_toml(raw: &str) -> Result<Self, TopologyError> {
        let topo: Topology = toml::from_str(raw)?;
        topo.validate()?;
        Ok(topo)
    }

    /// Read a topology from a TOML file.
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self, TopologyError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| TopologyError::Read(path.display().to_string(), e))?;
        Self::from_toml(&raw)
    }

    /// Find a host by name.
    pub fn host(&self, hostname: &str) -> Option<&Host> {
        self.hosts.iter().find(|h| h.hostname == hostname)
    }

    /// All hosts with the [`Role::Router`] role.
    pub fn routers(&self) -> impl Iterator<Item = &Host> {
        self.hosts.iter().filter(|h| h.role == Role::Router)
    }

    /// All hosts backed by a namespace that the fixture manages.
    pub fn netns_hosts(&self) -> impl Iterator<Item = &Host> {
        self.hosts.iter().filter(|h| h.backing == Backing::Netns)
    }

    /// Check host-name uniqueness and that all addresses parse.
    pub fn validate(&self) -> Result<(), TopologyError> {
        for (i, host) in self.hosts.iter().enumerate() {
            if self.hosts[..i].iter().any(|h| h.hostname == host.hostname) {
                return Err(TopologyError::DuplicateHost(host.hostname.clone()));
            }
            for iface in host.ifaces.iter().chain(host.dummies.iter()) {
                if let Some(addr) = &iface.address {
                    addr.parse::<IpNet>()
                        .map_err(|_| TopologyError::BadAddress(addr.clone()))?;
                }
            }
            for route in &host.routes {
                if route.prefix != "default" {
                    route
                        .prefix
                        .parse::<IpNet>()
                        .map_err(|_| TopologyError::BadAddress(route.prefix.clone()))?;
                }
                route
                    .gw
                    .parse::<IpAddr>()
                    .map_err(|_| TopologyError::BadAddress(route.gw.clone()))?;
            }
        }
        Ok(())
    }
}

/// Error in a topology declaration.
#[derive(Debug, Error)]
pub enum TopologyError {
    /// The topology file could not be read.
    #[error("Cannot read '{0}': {1}")]
    Read(String, #[source] std::io::Error),
    /// The TOML document could not be parsed.
    #[error("Cannot parse the topology: {0}")]
    Parse(#[from] toml::de::Error),
    /// Two hosts share the same name.
    #[error("Duplicate host {0} in the topology")]
    DuplicateHost(String),
    /// An address or prefix does not parse.
    #[error("Invalid address in the topology: {0}")]
    BadAddress(String),
}

fn netdev(
    hostname: &str,
    port: &str,
    vlan: Option<u16>,
    address: &str,
    routes: &[(&str, &str)],
    remotes: &[&str],
) -> Host {
    Host {
        hostname: hostname.to_string(),
        role: Role::Router,
        backing: Backing::Netns,
        netns: None,
        ifaces: vec![Iface {
            name: port.to_string(),
            vlan,
            address: Some(address.to_string()),
        }],
        dummies: vec![],
        routes: routes
            .iter()
            .map(|(prefix, gw)| StaticRoute {
                prefix: prefix.to_string(),
                gw: gw.to_string(),
            })
            .collect(),
        remotes: remotes.iter().map(|r| r.to_string()).collect(),
        sysctls: vec![],
    }
}

/// A single network: two front-panel ports in one subnet.
pub fn one_net() -> Topology {
    Topology {
        name: "one-net".to_string(),
        hosts: vec![
            netdev("h1", "xeth1", None, "10.1.0.1/24", &[], &["10.1.0.2"]),
            netdev("h2", "xeth2", None, "10.1.0.2/24", &[], &["10.1.0.1"]),
        ],
    }
}

/// The IPv6 variant of [`one_net`].
pub fn one_net_ip6() -> Topology {
    Topology {
        name: "one-net-ip6".to_string(),
        hosts: vec![
            netdev(
                "h1",
                "xeth1",
                None,
                "2001:db8:1::1/64",
                &[],
                &["2001:db8:1::2"],
            ),
            netdev(
                "h2",
                "xeth2",
                None,
                "2001:db8:1::2/64",
                &[],
                &["2001:db8:1::1"],
            ),
        ],
    }
}

/// Two networks routed through the device: each port sits in its own subnet with the switch as
/// the gateway towards the other one.
pub fn two_nets() -> Topology {
    Topology {
        name: "two-nets".to_string(),
        hosts: vec![
            netdev(
                "h1",
                "xeth1",
                None,
                "10.1.0.1/24",
                &[("10.2.0.0/24", "10.1.0.2")],
                &["10.2.0.1"],
            ),
            netdev(
                "h2",
                "xeth2",
                None,
                "10.2.0.1/24",
                &[("10.1.0.0/24", "10.2.0.2")],
                &["10.1.0.1"],
            ),
        ],
    }
}

/// The IPv6 variant of [`two_nets`].
pub fn two_nets_ip6() -> Topology {
    Topology {
        name: "two-nets-ip6".to_string(),
        hosts: vec![
            netdev(
                "h1",
                "xeth1",
                None,
                "2001:db8:1::1/64",
                &[("2001:db8:2::/64", "2001:db8:1::2")],
                &["2001:db8:2::1"],
            ),
            netdev(
                "h2",
                "xeth2",
                None,
                "2001:db8:2::1/64",
                &[("2001:db8:1::/64", "2001:db8:2::2")],
                &["2001:db8:1::1"],
            ),
        ],
    }
}

/// The VLAN variant of [`two_nets`]: the same two subnets, carried as tagged sub-interfaces.
pub fn two_vlan_nets() -> Topology {
    Topology {
        name: "two-vlan-nets".to_string(),
        hosts: vec![
            netdev(
                "h1",
                "xeth1",
                Some(10),
                "10.1.0.1/24",
                &[("10.2.0.0/24", "10.1.0.2")],
                &["10.2.0.1"],
            ),
            netdev(
                "h2",
                "xeth2",
                Some(20),
                "10.2.0.1/24",
                &[("10.1.0.0/24", "10.2.0.2")],
                &["10.1.0.1"],
            ),
        ],
    }
}

/// Four networks with a dummy loopback per host and multipath routes towards the far dummies.
/// Used by the multipath tests: repeated `ip route append` for the same prefix through different
/// gateways yields ECMP routes on the device.
pub fn four_nets() -> Topology {
    let mut hosts = Vec::new();
    for i in 1..=4u8 {
        let far: Vec<u8> = (1..=4).filter(|j| *j != i).collect();
        hosts.push(Host {
            hostname: format!("h{i}"),
            role: Role::Router,
            backing: Backing::Netns,
            netns: None,
            ifaces: vec![Iface {
                name: format!("xeth{i}"),
                vlan: None,
                address: Some(format!("10.{i}.0.1/24")),
            }],
            dummies: vec![Iface {
                name: "dummy0".to_string(),
                vlan: None,
                address: Some(format!("192.168.{i}.1/32")),
            }],
            routes: far
                .iter()
                .map(|j| StaticRoute {
                    prefix: format!("192.168.{j}.1/32"),
                    gw: format!("10.{i}.0.2"),
                })
                .collect(),
            remotes: far.iter().map(|j| format!("192.168.{j}.1")).collect(),
            sysctls: vec![
                "net/ipv4/conf/all/rp_filter=0".to_string(),
                "net/ipv6/conf/all/forwarding=1".to_string(),
            ],
        });
    }
    Topology {
        name: "four-nets".to_string(),
        hosts,
    }
}
