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

use pretty_assertions::assert_eq;

use crate::expect::{adjacency_rewrites, Expectation, RoutingDaemon};

const GOES: &str = "./goes-platina-mk1";

#[test]
fn frr_bgp_neighbor() {
    let exp = Expectation::BgpPeerEstablished {
        daemon: RoutingDaemon::Frr,
        peer: "192.168.120.10".to_string(),
    };
    assert_eq!(
        exp.command(GOES),
        vec!["vtysh", "-c", "show ip bgp neighbor 192.168.120.10"]
    );
    assert!(exp.satisfied_by(
        "BGP neighbor is 192.168.120.10, remote AS 65010, external link\n\
         Hostname: R2\n\
         BGP state = Established, up for 00:02:03\n"
    ));
    assert!(!exp.satisfied_by(
        "BGP neighbor is 192.168.120.10, remote AS 65010, external link\n\
         BGP state = Active\n"
    ));
}

#[test]
fn bird_bgp_neighbor() {
    let exp = Expectation::BgpPeerEstablished {
        daemon: RoutingDaemon::Bird,
        peer: "R2".to_string(),
    };
    assert_eq!(exp.command(GOES), vec!["birdc", "show", "protocols", "all", "R2"]);
    assert!(exp.satisfied_by(
        "name     proto    table    state  since       info\n\
         R2       BGP      master   up     10:01:23    Established\n"
    ));
    assert!(!exp.satisfied_by(
        "name     proto    table    state  since       info\n\
         R2       BGP      master   start  10:01:23    Connect\n"
    ));
}

#[test]
fn gobgp_neighbor_is_lowercase() {
    let exp = Expectation::BgpPeerEstablished {
        daemon: RoutingDaemon::Gobgp,
        peer: "192.168.150.4".to_string(),
    };
    assert_eq!(
        exp.command(GOES),
        vec!["/root/gobgp", "neighbor", "192.168.150.4"]
    );
    assert!(exp.satisfied_by("BGP neighbor is 192.168.150.4, remote AS 65004\n  BGP state = established, up for 00:00:42\n"));
    assert!(!exp.satisfied_by("BGP neighbor is 192.168.150.4\n  BGP state = Established\n"));
}

#[test]
fn isis_neighbor() {
    let exp = Expectation::IsisNeighbor {
        peer: "R2".to_string(),
        address: "192.168.120.10".to_string(),
    };
    assert_eq!(exp.command(GOES), vec!["vtysh", "-c", "show isis neighbor R2"]);
    assert!(exp.satisfied_by(
        " R2\n    Interface: eth-1-0, Level: 2, State: Up, Expires in 28s\n\
            IPv4 Addresses:\n      192.168.120.10\n"
    ));
    assert!(!exp.satisfied_by(" R2\n    Interface: eth-1-0, Level: 2, State: Initializing\n"));
}

#[test]
fn kernel_route_pattern_is_escaped() {
    let exp = Expectation::KernelRoute {
        prefix: "192.168.222.0/24".to_string(),
    };
    assert_eq!(
        exp.command(GOES),
        vec!["ip", "route", "show", "192.168.222.0/24"]
    );
    assert!(exp.satisfied_by("192.168.222.0/24 via 192.168.120.10 dev eth-1-0\n"));
    // the dots must not match arbitrary characters
    assert!(!exp.satisfied_by("192x168y222z0/24 via 192.168.120.10\n"));
    assert!(!exp.satisfied_by(""));
}

#[test]
fn static_default_route() {
    let exp = Expectation::StaticDefaultRoute;
    assert_eq!(exp.command(GOES), vec!["vtysh", "-c", "show ip route"]);
    assert!(exp.satisfied_by(
        "Codes: K - kernel route, C - connected, S - static\n\
         S>* 0.0.0.0/0 [1/0] via 10.1.0.2, eth-2-0\n\
         C>* 10.1.0.0/24 is directly connected, eth-2-0\n"
    ));
    // present but not selected
    assert!(!exp.satisfied_by("S   0.0.0.0/0 [1/0] via 10.1.0.2 inactive\n"));
}

#[test]
fn daemon_running() {
    let exp = Expectation::DaemonRunning {
        process: "bgpd".to_string(),
    };
    assert_eq!(exp.command(GOES), vec!["ps", "ax"]);
    let ps = "  PID TTY      STAT   TIME COMMAND\n\
                  1 ?        Ss     0:00 /sbin/init\n\
                 42 ?        Ssl    0:01 /usr/lib/frr/zebra -d\n\
                 43 ?        Ssl    0:02 /usr/lib/frr/bgpd -d\n";
    assert!(exp.satisfied_by(ps));
    let exp = Expectation::DaemonRunning {
        process: "isisd".to_string(),
    };
    assert!(!exp.satisfied_by(ps));
}

#[test]
fn fib_entry_commands() {
    let global = Expectation::FibEntry {
        table: None,
        pattern: r"0\.0\.0\.0/0".to_string(),
    };
    assert_eq!(global.command(GOES), vec![GOES, "vnet", "show", "ip", "fib"]);

    let table = Expectation::FibEntry {
        table: Some("RA-1".to_string()),
        pattern: r"0\.0\.0\.0/0".to_string(),
    };
    assert_eq!(
        table.command(GOES),
        vec![GOES, "vnet", "show", "ip", "fib", "table", "RA-1"]
    );
    assert!(table.on_device());
    assert!(table.satisfied_by("RA-1: 0.0.0.0/0 via 10.2.0.3\n"));
}

#[test]
fn no_adjacencies_is_negated() {
    let exp = Expectation::NoAdjacencies;
    assert_eq!(exp.command(GOES), vec![GOES, "fe1", "switch", "adj"]);
    assert!(exp.negated());
    assert!(exp.satisfied_by(""));
    assert!(exp.satisfied_by("index  type       installed\n"));

    let leftover = "0  hard  l3_unicast  installed true  port 12\n\
                    1  hard  l3_unicast  installed true  port 13\n";
    assert!(!exp.satisfied_by(leftover));
    assert_eq!(adjacency_rewrites(leftover), 2);
    assert_eq!(adjacency_rewrites("soft l3_unicast false\n"), 0);
}

#[test]
fn hardware_neighbor_checks() {
    let there = Expectation::HardwareNeighbor {
        pattern: regex::escape("10.1.0.2"),
    };
    assert_eq!(there.command(GOES), vec![GOES, "fe1", "xeth", "neigh"]);
    assert!(there.satisfied_by("xeth1  10.1.0.2  50:18:4c:00:12:34\n"));
    assert!(!there.satisfied_by(""));

    let gone = Expectation::NoHardwareNeighbor {
        pattern: regex::escape("10.1.0.2"),
    };
    assert!(gone.satisfied_by(""));
    assert!(!gone.satisfied_by("xeth1  10.1.0.2  50:18:4c:00:12:34\n"));
}
