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

//! The steps a scenario is composed of.
//!
//! A step is a named, single-purpose check or mutation. Steps are constructed fresh for each
//! scenario, hold only their own data, and receive the shared [`Fixture`] when they run.
//!
//! Failures come in two severities. A *soft* failure (one ping in a sweep did not answer) is
//! recorded in the [`StepReport`] and the step carries on, so that a single run surfaces as many
//! problems as possible. A *hard* failure (a mutation command failed, a poll never converged) is
//! returned as an error and aborts the remaining steps of the scenario, since they would assert
//! on state that was never reached.

use std::time::Duration;

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;

use crate::{
    exec::CmdHandle,
    expect::{adjacency_rewrites, Expectation, RoutingDaemon},
    fixture::Fixture,
    poll::Poller,
    SwitchLabError,
};

/// The record of one executed step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    /// Path of the step, `scenario/step`.
    pub name: String,
    /// The soft failures recorded while the step ran. Empty means the step passed.
    pub failures: Vec<String>,
}

impl StepReport {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            failures: Vec::new(),
        }
    }

    /// Whether the step recorded no soft failure.
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }

    /// Record a soft failure and continue.
    pub fn fail(&mut self, msg: impl Into<String>) {
        let msg = msg.into();
        log::error!("[{}] {msg}", self.name);
        self.failures.push(msg);
    }
}

/// A named, single-purpose check or mutation, run as part of a [`crate::Scenario`].
#[async_trait]
pub trait Step: Send + Sync {
    /// Name of the step, used in the report path.
    fn name(&self) -> String;

    /// Perform the check. Record soft failures in `report`; return `Err` only when the scenario
    /// cannot meaningfully continue.
    async fn run(&self, fx: &Fixture, report: &mut StepReport) -> Result<(), SwitchLabError>;
}

/// Poll one expectation on one host until it matches or the budget is exhausted.
pub(crate) async fn poll_expect(
    fx: &Fixture,
    hostname: &str,
    exp: &Expectation,
    poller: &Poller,
) -> Result<String, SwitchLabError> {
    let probe = if exp.on_device() {
        fx.device_probe()
    } else {
        fx.probe(hostname)?
    };
    let goes = fx.goes().to_string();
    poller
        .run(exp.describe(hostname), || {
            let probe = probe.clone();
            let goes = goes.clone();
            let exp = exp.clone();
            async move { exp.check(&probe, &goes).await }
        })
        .await
}

/// Check one expectation on one host exactly once.
pub(crate) async fn check_once(
    fx: &Fixture,
    hostname: &str,
    exp: &Expectation,
) -> Result<(String, bool), SwitchLabError> {
    let probe = if exp.on_device() {
        fx.device_probe()
    } else {
        fx.probe(hostname)?
    };
    exp.check(&probe, fx.goes()).await
}

fn pairs(list: &[(&str, &str)]) -> Vec<(String, String)> {
    list.iter()
        .map(|(a, b)| (a.to_string(), b.to_string()))
        .collect()
}

/// Ping sweep over a fixed list of `(host, target)` pairs. Each pair is checked independently;
/// one unanswered ping is a soft failure and does not stop the sweep.
pub struct Connectivity {
    /// The `(host, target)` pairs to ping.
    pub pairs: Vec<(String, String)>,
}

impl Connectivity {
    /// Create the step from borrowed pairs.
    pub fn new(list: &[(&str, &str)]) -> Self {
        Self { pairs: pairs(list) }
    }
}

#[async_trait]
impl Step for Connectivity {
    fn name(&self) -> String {
        "connectivity".to_string()
    }

    async fn run(&self, fx: &Fixture, report: &mut StepReport) -> Result<(), SwitchLabError> {
        for (host, target) in &self.pairs {
            log::debug!("ping from {host} to {target}");
            if !fx.ping_ok(host, target).await? {
                report.fail(format!("no answer from {target} when pinging from {host}"));
            }
        }
        Ok(())
    }
}

/// Ping sweep across segments, dumping the device FIB after every pair. The FIB dump is
/// diagnostic output; a failing dump is a hard failure since the device CLI itself is broken.
pub struct InterConnectivity {
    /// The `(host, target)` pairs to ping.
    pub pairs: Vec<(String, String)>,
    /// Dump the per-host FIB table instead of the global one.
    pub per_host_table: bool,
}

impl InterConnectivity {
    /// Create the step from borrowed pairs, dumping the global FIB.
    pub fn new(list: &[(&str, &str)]) -> Self {
        Self {
            pairs: pairs(list),
            per_host_table: false,
        }
    }

    /// Create the step from borrowed pairs, dumping the FIB table of each source host.
    pub fn with_tables(list: &[(&str, &str)]) -> Self {
        Self {
            pairs: pairs(list),
            per_host_table: true,
        }
    }
}

#[async_trait]
impl Step for InterConnectivity {
    fn name(&self) -> String {
        "inter-connectivity".to_string()
    }

    async fn run(&self, fx: &Fixture, report: &mut StepReport) -> Result<(), SwitchLabError> {
        for (host, target) in &self.pairs {
            log::debug!("ping from {host} to {target}");
            if !fx.ping_ok(host, target).await? {
                report.fail(format!("no answer from {target} when pinging from {host}"));
            }
            let table = self.per_host_table.then_some(host.as_str());
            let fib = fx.show_fib(table).await?;
            log::trace!("[{}] FIB:\n{fib}", fx.topology().name);
        }
        Ok(())
    }
}

/// Check that the expected daemon processes are running on every router, polling the process
/// list with a small budget (some daemons are slow to fork on loaded routers).
pub struct DaemonUp {
    /// Process-name substrings that must appear in `ps ax`.
    pub processes: Vec<String>,
    /// Retry budget per process.
    pub poller: Poller,
}

impl DaemonUp {
    /// Create the step with the default daemon budget.
    pub fn new(processes: &[&str]) -> Self {
        Self {
            processes: processes.iter().map(|p| p.to_string()).collect(),
            poller: Poller::DAEMON,
        }
    }
}

#[async_trait]
impl Step for DaemonUp {
    fn name(&self) -> String {
        "daemons".to_string()
    }

    async fn run(&self, fx: &Fixture, _report: &mut StepReport) -> Result<(), SwitchLabError> {
        tokio::time::sleep(Duration::from_secs(1)).await;
        for host in fx.topology().routers() {
            log::debug!("checking daemons on {}", host.hostname);
            for process in &self.processes {
                let exp = Expectation::DaemonRunning {
                    process: process.clone(),
                };
                poll_expect(fx, &host.hostname, &exp, &self.poller).await?;
            }
        }
        Ok(())
    }
}

/// Check the carrier of every router interface through sysfs.
pub struct Carrier;

#[async_trait]
impl Step for Carrier {
    fn name(&self) -> String {
        "carrier".to_string()
    }

    async fn run(&self, fx: &Fixture, report: &mut StepReport) -> Result<(), SwitchLabError> {
        for host in fx.topology().routers() {
            for iface in &host.ifaces {
                let ifname = iface.ifname();
                log::debug!("check carrier for {} on {}", host.hostname, ifname);
                let probe = fx.probe(&host.hostname)?;
                let out = probe
                    .output(&["cat".to_string(), format!("/sys/class/net/{ifname}/carrier")])
                    .await?;
                if out.trim() != "1" {
                    report.fail(format!("no carrier on {} of {}", ifname, host.hostname));
                }
            }
        }
        Ok(())
    }
}

/// Poll until every listed peering is established. Exhausting the budget is a hard failure:
/// nothing after this step can pass without the control plane converged.
pub struct NeighborEstablished {
    /// `(host, expectation)` pairs to poll.
    pub checks: Vec<(String, Expectation)>,
    /// Retry budget per peering.
    pub poller: Poller,
}

impl NeighborEstablished {
    /// Expect BGP sessions to reach `Established`.
    pub fn bgp(daemon: RoutingDaemon, list: &[(&str, &str)]) -> Self {
        Self {
            checks: list
                .iter()
                .map(|(host, peer)| {
                    (
                        host.to_string(),
                        Expectation::BgpPeerEstablished {
                            daemon,
                            peer: peer.to_string(),
                        },
                    )
                })
                .collect(),
            poller: Poller::NEIGHBOR,
        }
    }

    /// Expect OSPF adjacencies to form.
    pub fn ospf(daemon: RoutingDaemon, list: &[(&str, &str)]) -> Self {
        Self {
            checks: list
                .iter()
                .map(|(host, peer)| {
                    (
                        host.to_string(),
                        Expectation::OspfNeighbor {
                            daemon,
                            peer: peer.to_string(),
                        },
                    )
                })
                .collect(),
            poller: Poller::NEIGHBOR,
        }
    }

    /// Expect IS-IS adjacencies to form.
    pub fn isis(list: &[(&str, &str, &str)]) -> Self {
        Self {
            checks: list
                .iter()
                .map(|(host, peer, address)| {
                    (
                        host.to_string(),
                        Expectation::IsisNeighbor {
                            peer: peer.to_string(),
                            address: address.to_string(),
                        },
                    )
                })
                .collect(),
            poller: Poller::new(60, Duration::from_secs(1)),
        }
    }
}

#[async_trait]
impl Step for NeighborEstablished {
    fn name(&self) -> String {
        "neighbors".to_string()
    }

    async fn run(&self, fx: &Fixture, _report: &mut StepReport) -> Result<(), SwitchLabError> {
        for (host, exp) in &self.checks {
            poll_expect(fx, host, exp, &self.poller).await?;
        }
        Ok(())
    }
}

/// Poll until every listed route shows up. Exhausting the budget is a hard failure.
pub struct RoutePresent {
    /// `(host, expectation)` pairs to poll.
    pub checks: Vec<(String, Expectation)>,
    /// Retry budget per route.
    pub poller: Poller,
}

impl RoutePresent {
    /// Expect routes in the kernel FIB of each host.
    pub fn kernel(list: &[(&str, &str)]) -> Self {
        Self {
            checks: list
                .iter()
                .map(|(host, prefix)| {
                    (
                        host.to_string(),
                        Expectation::KernelRoute {
                            prefix: prefix.to_string(),
                        },
                    )
                })
                .collect(),
            poller: Poller::ROUTE,
        }
    }

    /// Expect routes learned from `proto` in the RIB of each host.
    pub fn rib(proto: &str, list: &[(&str, &str)]) -> Self {
        Self {
            checks: list
                .iter()
                .map(|(host, prefix)| {
                    (
                        host.to_string(),
                        Expectation::RibRoute {
                            proto: proto.to_string(),
                            prefix: prefix.to_string(),
                        },
                    )
                })
                .collect(),
            poller: Poller::ROUTE,
        }
    }
}

#[async_trait]
impl Step for RoutePresent {
    fn name(&self) -> String {
        "routes".to_string()
    }

    async fn run(&self, fx: &Fixture, _report: &mut StepReport) -> Result<(), SwitchLabError> {
        for (host, exp) in &self.checks {
            poll_expect(fx, host, exp, &self.poller).await?;
        }
        Ok(())
    }
}

/// Check the static default route on every router, in all three places it must appear: the
/// daemon RIB (`S>* 0.0.0.0/0`), the kernel FIB, and the device FIB table of the router.
pub struct StaticRoutes;

#[async_trait]
impl Step for StaticRoutes {
    fn name(&self) -> String {
        "routes".to_string()
    }

    async fn run(&self, fx: &Fixture, report: &mut StepReport) -> Result<(), SwitchLabError> {
        for host in fx.topology().routers() {
            let hostname = &host.hostname;
            log::debug!("check for default route in container RIB on {hostname}");
            let checks = [
                Expectation::StaticDefaultRoute,
                Expectation::KernelRoute {
                    prefix: "default".to_string(),
                },
                Expectation::FibEntry {
                    table: Some(hostname.clone()),
                    pattern: r"0\.0\.0\.0/0".to_string(),
                },
            ];
            for exp in checks {
                let (out, ok) = check_once(fx, hostname, &exp).await?;
                if !ok {
                    report.fail(format!(
                        "{}; last output:\n{out}",
                        exp.describe(hostname)
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Bring every router interface down and up again, with a settle delay in between and a device
/// FIB dump after every cycle. Exercises link-event handling of the forwarding daemon.
pub struct Flap {
    /// Delay after each admin state change.
    pub settle: Duration,
}

impl Default for Flap {
    fn default() -> Self {
        Self {
            settle: Duration::from_secs(1),
        }
    }
}

#[async_trait]
impl Step for Flap {
    fn name(&self) -> String {
        "flap".to_string()
    }

    async fn run(&self, fx: &Fixture, _report: &mut StepReport) -> Result<(), SwitchLabError> {
        for host in fx.topology().routers() {
            let probe = fx.probe(&host.hostname)?;
            for iface in &host.ifaces {
                let ifname = iface.ifname();
                probe
                    .run(&["ip", "link", "set", "down", ifname.as_str()])
                    .await?;
                tokio::time::sleep(self.settle).await;
                probe
                    .run(&["ip", "link", "set", "up", ifname.as_str()])
                    .await?;
                tokio::time::sleep(self.settle).await;
                let fib = fx.show_fib(None).await?;
                log::trace!("[{}] FIB after flapping {ifname}:\n{fib}", host.hostname);
            }
        }
        Ok(())
    }
}

/// Bring every router interface admin down and verify that no hardware rewrite entries are left
/// on the device. Leftover adjacencies after the interfaces are gone indicate a cleanup defect.
pub struct AdminDown;

#[async_trait]
impl Step for AdminDown {
    fn name(&self) -> String {
        "admin-down".to_string()
    }

    async fn run(&self, fx: &Fixture, report: &mut StepReport) -> Result<(), SwitchLabError> {
        for host in fx.topology().routers() {
            let probe = fx.probe(&host.hostname)?;
            for iface in &host.ifaces {
                let ifname = iface.ifname();
                probe
                    .run(&["ip", "link", "set", "down", ifname.as_str()])
                    .await?;
            }
        }

        // FIXME can't assume 1s is enough time for the fdb to flush large tables
        tokio::time::sleep(Duration::from_secs(1)).await;

        let (out, ok) = check_once(fx, "", &Expectation::NoAdjacencies).await?;
        if !ok {
            report.fail(format!(
                "{} unexpected rewrites left on the device",
                adjacency_rewrites(&out)
            ));
        }
        Ok(())
    }
}

/// Check that the device learned a hardware neighbor entry for every remote of the topology.
pub struct HardwareNeighbors {
    /// Retry budget; neighbor discovery is quick but not instantaneous.
    pub poller: Poller,
}

impl Default for HardwareNeighbors {
    fn default() -> Self {
        Self {
            poller: Poller::new(3, Duration::from_secs(1)),
        }
    }
}

#[async_trait]
impl Step for HardwareNeighbors {
    fn name(&self) -> String {
        "neighbor".to_string()
    }

    async fn run(&self, fx: &Fixture, _report: &mut StepReport) -> Result<(), SwitchLabError> {
        tokio::time::sleep(Duration::from_secs(1)).await;
        for host in fx.topology().hosts.iter() {
            for remote in &host.remotes {
                let exp = Expectation::HardwareNeighbor {
                    pattern: regex::escape(remote),
                };
                poll_expect(fx, &host.hostname, &exp, &self.poller).await?;
            }
        }
        Ok(())
    }
}

/// Verify that no hardware neighbor entry of the topology's remotes is left on the device, and
/// that no adjacency rewrites remain either. Run after the namespaces are gone.
pub struct NoHardwareNeighbors;

#[async_trait]
impl Step for NoHardwareNeighbors {
    fn name(&self) -> String {
        "no-neighbor".to_string()
    }

    async fn run(&self, fx: &Fixture, report: &mut StepReport) -> Result<(), SwitchLabError> {
        for host in fx.topology().hosts.iter() {
            for remote in &host.remotes {
                let exp = Expectation::NoHardwareNeighbor {
                    pattern: regex::escape(remote),
                };
                let (out, ok) = check_once(fx, &host.hostname, &exp).await?;
                if !ok {
                    log::trace!("leftover neighbor output:\n{out}");
                    report.fail(format!("leftover neighbor {remote} found"));
                }
            }
        }

        let (out, ok) = check_once(fx, "", &Expectation::NoAdjacencies).await?;
        if !ok {
            report.fail(format!(
                "{} unexpected rewrites left on the device",
                adjacency_rewrites(&out)
            ));
        }
        Ok(())
    }
}

/// Delete the namespaces without first moving the interfaces out, and verify that the kernel
/// hands every interface back to the default namespace anyway.
pub struct DeleteNetns;

#[async_trait]
impl Step for DeleteNetns {
    fn name(&self) -> String {
        "del-netns".to_string()
    }

    async fn run(&self, fx: &Fixture, _report: &mut StepReport) -> Result<(), SwitchLabError> {
        fx.teardown().await
    }
}

/// Partition one segment by bringing a router's interfaces down, and verify that the partition
/// is confined: the broken pair must stop answering while the unaffected pair keeps working.
/// The interfaces are brought back up before the step returns, so that teardown restores the
/// baseline.
pub struct Isolation {
    /// The router to partition.
    pub partition: String,
    /// A `(host, target)` pair inside the partitioned segment; must fail.
    pub broken: (String, String),
    /// A `(host, target)` pair in an independent segment; must keep working.
    pub unaffected: (String, String),
    /// Poll the unaffected pair instead of checking it once (the control plane may still be
    /// reconverging from an earlier partition).
    pub recover: bool,
}

impl Isolation {
    /// Create the step.
    pub fn new(
        partition: &str,
        broken: (&str, &str),
        unaffected: (&str, &str),
        recover: bool,
    ) -> Self {
        Self {
            partition: partition.to_string(),
            broken: (broken.0.to_string(), broken.1.to_string()),
            unaffected: (unaffected.0.to_string(), unaffected.1.to_string()),
            recover,
        }
    }

    async fn set_links(&self, fx: &Fixture, updown: &str) -> Result<(), SwitchLabError> {
        let host = fx
            .topology()
            .host(&self.partition)
            .ok_or_else(|| SwitchLabError::UnknownHost(self.partition.clone()))?
            .clone();
        let probe = fx.probe(&self.partition)?;
        for iface in &host.ifaces {
            let ifname = iface.ifname();
            probe
                .run(&["ip", "link", "set", updown, ifname.as_str()])
                .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Step for Isolation {
    fn name(&self) -> String {
        "isolation".to_string()
    }

    async fn run(&self, fx: &Fixture, report: &mut StepReport) -> Result<(), SwitchLabError> {
        self.set_links(fx, "down").await?;

        log::debug!("verify that the partitioned segment is broken");
        if fx.ping_ok(&self.broken.0, &self.broken.1).await? {
            report.fail(format!(
                "{} still reaches {} through the partition",
                self.broken.0, self.broken.1
            ));
        }

        log::debug!("verify that the independent segment is not affected");
        let (host, target) = (self.unaffected.0.clone(), self.unaffected.1.clone());
        if self.recover {
            let result = Poller::RECOVERY
                .run(format!("ping from {host} to {target}"), || {
                    let host = host.clone();
                    let target = target.clone();
                    async move { Ok((String::new(), fx.ping_ok(&host, &target).await?)) }
                })
                .await;
            if let Err(SwitchLabError::ConvergenceTimeout { .. }) = &result {
                report.fail(format!("{host} cannot reach {target} in the other segment"));
            } else {
                result.map(|_| ())?;
            }
        } else if !fx.ping_ok(&host, &target).await? {
            report.fail(format!("{host} cannot reach {target} in the other segment"));
        }

        self.set_links(fx, "up").await?;
        Ok(())
    }
}

/// Flood a gateway with ICMP echo requests and verify that the control plane still answers an
/// ordinary ping afterwards. Without an explicit target, the first declared gateway of the
/// topology is flooded.
pub struct PingFlood {
    /// How long to flood.
    pub duration: Duration,
    /// Explicit `(host, target)` pair to flood; defaults to the first host with a route and its
    /// first gateway.
    pub target: Option<(String, String)>,
}

impl PingFlood {
    /// Flood the first declared gateway.
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            target: None,
        }
    }

    /// Flood an explicit `(host, target)` pair.
    pub fn towards(duration: Duration, host: &str, target: &str) -> Self {
        Self {
            duration,
            target: Some((host.to_string(), target.to_string())),
        }
    }
}

#[async_trait]
impl Step for PingFlood {
    fn name(&self) -> String {
        format!("flood-{}s", self.duration.as_secs())
    }

    async fn run(&self, fx: &Fixture, report: &mut StepReport) -> Result<(), SwitchLabError> {
        if fx.config().short || self.duration.is_zero() {
            log::debug!("skipping the flood step");
            return Ok(());
        }

        let (host, gw) = match &self.target {
            Some((host, target)) => (host.clone(), target.clone()),
            None => {
                match fx.topology().hosts.iter().find(|h| !h.routes.is_empty()) {
                    Some(host) => (host.hostname.clone(), host.routes[0].gw.clone()),
                    None => return Ok(()),
                }
            }
        };

        if !fx.ping_ok(&host, &gw).await? {
            report.fail(format!("no answer from {gw} before the flood"));
            return Ok(());
        }

        let mut flood = CmdHandle::new(
            "ping flood",
            fx.probe(&host)?.context().clone(),
            &["hping3", "--icmp", "--flood", "-q", "-t", "1", gw.as_str()],
        );
        flood.start()?;
        tokio::time::sleep(self.duration).await;
        flood.stop().await?;

        if let Some(temp) = fx.cpu_temp().await? {
            log::debug!("CPU temperature after the flood: {temp} C");
        }

        if !fx.ping_ok(&host, &gw).await? {
            report.fail(format!("no answer from {gw} after the flood"));
        }
        Ok(())
    }
}

lazy_static! {
    static ref IPERF_RATE_RE: Regex =
        Regex::new(r"([0-9\.]+)\s+([GMK]?)bits/sec\s+receiver").unwrap();
}

/// Stress the punt path with `iperf3` traffic between two hosts and verify that the receiver
/// saw a non-zero rate.
pub struct PuntStress {
    /// Host running the `iperf3` server.
    pub server: String,
    /// Address the client connects to.
    pub server_ip: String,
    /// Host running the `iperf3` client.
    pub client: String,
}

impl PuntStress {
    /// Create the step.
    pub fn new(server: &str, server_ip: &str, client: &str) -> Self {
        Self {
            server: server.to_string(),
            server_ip: server_ip.to_string(),
            client: client.to_string(),
        }
    }
}

#[async_trait]
impl Step for PuntStress {
    fn name(&self) -> String {
        "punt-stress".to_string()
    }

    async fn run(&self, fx: &Fixture, report: &mut StepReport) -> Result<(), SwitchLabError> {
        if fx.config().short {
            log::debug!("skipping the punt-stress step");
            return Ok(());
        }

        let mut server = CmdHandle::new(
            "iperf server",
            fx.probe(&self.server)?.context().clone(),
            &["timeout", "15", "iperf3", "-s"],
        );
        server.start()?;
        tokio::time::sleep(Duration::from_secs(1)).await;

        let out = fx
            .probe(&self.client)?
            .output(&["iperf3", "-c", self.server_ip.as_str()])
            .await;
        // rendezvous with the server before asserting, so its port is free again
        server.wait().await?;
        let out = out?;

        match IPERF_RATE_RE.captures(&out) {
            Some(c) => {
                let rate = c.get(1).map_or("", |m| m.as_str());
                let unit = c.get(2).map_or("", |m| m.as_str());
                log::debug!("iperf3 - {rate} {unit}bits/sec");
                if rate == "0.00" {
                    report.fail("iperf3 receiver rate is 0.00 bits/sec");
                }
            }
            None => report.fail(format!("iperf3 rate not found in output [{out}]")),
        }
        Ok(())
    }
}

/// Install a blackhole route and verify that reachability changes accordingly: the target must
/// answer before, be swallowed while the blackhole is installed, and answer again after it is
/// removed.
pub struct Blackhole {
    /// The router on which the blackhole route is installed.
    pub router: String,
    /// The blackhole prefix.
    pub prefix: String,
    /// Host the probe pings originate from.
    pub from: String,
    /// The address whose reachability is probed.
    pub target: String,
}

impl Blackhole {
    /// Create the step.
    pub fn new(router: &str, prefix: &str, from: &str, target: &str) -> Self {
        Self {
            router: router.to_string(),
            prefix: prefix.to_string(),
            from: from.to_string(),
            target: target.to_string(),
        }
    }

    fn family(&self) -> &'static str {
        if self.prefix.contains(':') {
            "-6"
        } else {
            "-4"
        }
    }
}

#[async_trait]
impl Step for Blackhole {
    fn name(&self) -> String {
        "blackhole".to_string()
    }

    async fn run(&self, fx: &Fixture, report: &mut StepReport) -> Result<(), SwitchLabError> {
        log::debug!("ping from {} to {} before the blackhole", self.from, self.target);
        if !fx.ping_ok(&self.from, &self.target).await? {
            report.fail(format!("{} unreachable before the blackhole", self.target));
            return Ok(());
        }

        let probe = fx.probe(&self.router)?;
        probe
            .run(&[
                "ip",
                self.family(),
                "route",
                "add",
                "blackhole",
                self.prefix.as_str(),
            ])
            .await?;
        tokio::time::sleep(Duration::from_secs(1)).await;

        if fx.ping_ok(&self.from, &self.target).await? {
            report.fail(format!(
                "ping to {} was not swallowed by the blackhole",
                self.target
            ));
        }

        probe
            .run(&[
                "ip",
                self.family(),
                "route",
                "del",
                "blackhole",
                self.prefix.as_str(),
            ])
            .await?;
        tokio::time::sleep(Duration::from_secs(1)).await;

        if !fx.ping_ok(&self.from, &self.target).await? {
            report.fail(format!(
                "{} still unreachable after removing the blackhole",
                self.target
            ));
        }
        Ok(())
    }
}

/// Apply a batch of route changes with `ip -b` on one host.
pub struct BatchRoutes {
    /// Name shown in the report path (e.g. `add 900`).
    pub label: String,
    /// The host to run the batch on.
    pub hostname: String,
    /// Path of the batch file on the host.
    pub file: String,
}

impl BatchRoutes {
    /// Create the step.
    pub fn new(label: &str, hostname: &str, file: &str) -> Self {
        Self {
            label: label.to_string(),
            hostname: hostname.to_string(),
            file: file.to_string(),
        }
    }
}

#[async_trait]
impl Step for BatchRoutes {
    fn name(&self) -> String {
        self.label.clone()
    }

    async fn run(&self, fx: &Fixture, _report: &mut StepReport) -> Result<(), SwitchLabError> {
        fx.probe(&self.hostname)?
            .run(&["ip", "-b", self.file.as_str()])
            .await?;
        Ok(())
    }
}

/// Add or remove a single route on one host.
pub struct ModifyRoute {
    /// `add`, `append`, or `del`.
    pub verb: String,
    /// The host to modify.
    pub hostname: String,
    /// Destination prefix.
    pub prefix: String,
    /// Gateway address.
    pub via: String,
}

impl ModifyRoute {
    /// Remove a route.
    pub fn del(hostname: &str, prefix: &str, via: &str) -> Self {
        Self {
            verb: "del".to_string(),
            hostname: hostname.to_string(),
            prefix: prefix.to_string(),
            via: via.to_string(),
        }
    }

    /// Append a route (repeated prefixes become multipath routes).
    pub fn append(hostname: &str, prefix: &str, via: &str) -> Self {
        Self {
            verb: "append".to_string(),
            hostname: hostname.to_string(),
            prefix: prefix.to_string(),
            via: via.to_string(),
        }
    }
}

#[async_trait]
impl Step for ModifyRoute {
    fn name(&self) -> String {
        format!("route-{}", self.verb)
    }

    async fn run(&self, fx: &Fixture, _report: &mut StepReport) -> Result<(), SwitchLabError> {
        fx.probe(&self.hostname)?
            .run(&[
                "ip",
                "route",
                self.verb.as_str(),
                self.prefix.as_str(),
                "via",
                self.via.as_str(),
            ])
            .await?;
        Ok(())
    }
}

/// Ping the gateway of every declared route. Verifies directly-connected reachability before
/// any routed check runs.
pub struct PingGateways;

#[async_trait]
impl Step for PingGateways {
    fn name(&self) -> String {
        "gateways".to_string()
    }

    async fn run(&self, fx: &Fixture, report: &mut StepReport) -> Result<(), SwitchLabError> {
        for host in fx.topology().hosts.iter() {
            for route in &host.routes {
                if !fx.ping_ok(&host.hostname, &route.gw).await? {
                    report.fail(format!(
                        "no answer from gateway {} when pinging from {}",
                        route.gw, host.hostname
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Ping every declared remote of every host, optionally retrying the whole sweep while the
/// data plane settles.
pub struct PingRemotes {
    /// How often to retry the sweep.
    pub poller: Poller,
}

impl Default for PingRemotes {
    fn default() -> Self {
        Self {
            poller: Poller::new(1, Duration::from_secs(1)),
        }
    }
}

impl PingRemotes {
    /// Retry the sweep while multipath routes settle.
    pub fn settling() -> Self {
        Self {
            poller: Poller::new(3, Duration::from_secs(2)),
        }
    }
}

#[async_trait]
impl Step for PingRemotes {
    fn name(&self) -> String {
        "remotes".to_string()
    }

    async fn run(&self, fx: &Fixture, report: &mut StepReport) -> Result<(), SwitchLabError> {
        let result = self
            .poller
            .run("ping sweep over all remotes", || async move {
                let mut failed = Vec::new();
                for host in fx.topology().hosts.iter() {
                    for remote in &host.remotes {
                        if !fx.ping_ok(&host.hostname, remote).await? {
                            failed.push(format!("{} cannot reach {}", host.hostname, remote));
                        }
                    }
                }
                Ok((failed.join("; "), failed.is_empty()))
            })
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(SwitchLabError::ConvergenceTimeout { last, .. }) => {
                report.fail(last);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

/// Configure IS-IS on every router interface through `vtysh`, using the hostname as the IS-IS
/// instance name.
pub struct IsisIntfConf;

#[async_trait]
impl Step for IsisIntfConf {
    fn name(&self) -> String {
        "add-intf-conf".to_string()
    }

    async fn run(&self, fx: &Fixture, _report: &mut StepReport) -> Result<(), SwitchLabError> {
        for host in fx.topology().routers() {
            let probe = fx.probe(&host.hostname)?;
            for iface in &host.ifaces {
                probe
                    .run(&[
                        "vtysh".to_string(),
                        "-c".to_string(),
                        "conf t".to_string(),
                        "-c".to_string(),
                        format!("interface {}", iface.ifname()),
                        "-c".to_string(),
                        format!("ip router isis {}", host.hostname),
                    ])
                    .await?;
            }
        }
        Ok(())
    }
}

/// Start the DHCP server on a host and wait for the daemon to appear in the process list.
pub struct DhcpServer {
    /// Host running the server.
    pub server: String,
}

#[async_trait]
impl Step for DhcpServer {
    fn name(&self) -> String {
        "server".to_string()
    }

    async fn run(&self, fx: &Fixture, _report: &mut StepReport) -> Result<(), SwitchLabError> {
        let probe = fx.probe(&self.server)?;
        probe
            .run(&["supervisorctl", "start", "dhcpd4"])
            .await?;
        let exp = Expectation::DaemonRunning {
            process: "dhcpd".to_string(),
        };
        poll_expect(fx, &self.server, &exp, &Poller::DAEMON).await?;
        Ok(())
    }
}

/// Drop the static address of a client, verify that connectivity is gone, and re-acquire an
/// address over DHCP.
pub struct DhcpClient {
    /// Host running the client.
    pub client: String,
    /// The static address (CIDR) to remove first.
    pub address: String,
    /// An address that must be unreachable without, and reachable with, the lease.
    pub target: String,
}

impl DhcpClient {
    /// Create the step.
    pub fn new(client: &str, address: &str, target: &str) -> Self {
        Self {
            client: client.to_string(),
            address: address.to_string(),
            target: target.to_string(),
        }
    }
}

#[async_trait]
impl Step for DhcpClient {
    fn name(&self) -> String {
        "client".to_string()
    }

    async fn run(&self, fx: &Fixture, report: &mut StepReport) -> Result<(), SwitchLabError> {
        let host = fx
            .topology()
            .host(&self.client)
            .ok_or_else(|| SwitchLabError::UnknownHost(self.client.clone()))?
            .clone();
        let ifname = host
            .ifaces
            .first()
            .map(|i| i.ifname())
            .ok_or_else(|| SwitchLabError::Setup(format!("{} has no interface", self.client)))?;
        let probe = fx.probe(&self.client)?;

        probe
            .run(&[
                "ip",
                "address",
                "delete",
                self.address.as_str(),
                "dev",
                ifname.as_str(),
            ])
            .await?;

        log::debug!("verify that the ping fails without an address");
        if fx.ping_ok(&self.client, &self.target).await? {
            report.fail(format!(
                "{} still reachable without an address",
                self.target
            ));
        }

        log::debug!("request a dhcp address");
        let out = probe
            .output(&["dhclient", "-4", "-v", ifname.as_str()])
            .await?;
        if !out.contains("bound to") {
            report.fail(format!("dhclient did not bind a lease:\n{out}"));
        }
        Ok(())
    }
}

/// Capture the DHCP exchange on the server side and verify that the client's request does not
/// carry an invalid `vlan 0` tag.
pub struct DhcpVlanTag {
    /// Host running the client.
    pub client: String,
    /// Host running the server (where the capture runs).
    pub server: String,
}

impl DhcpVlanTag {
    /// Create the step.
    pub fn new(client: &str, server: &str) -> Self {
        Self {
            client: client.to_string(),
            server: server.to_string(),
        }
    }
}

#[async_trait]
impl Step for DhcpVlanTag {
    fn name(&self) -> String {
        "vlan-tag".to_string()
    }

    async fn run(&self, fx: &Fixture, report: &mut StepReport) -> Result<(), SwitchLabError> {
        let client_if = first_ifname(fx, &self.client)?;
        let server_if = first_ifname(fx, &self.server)?;
        let probe = fx.probe(&self.client)?;

        probe
            .run(&["ip", "address", "flush", "dev", client_if.as_str()])
            .await?;

        let mut capture = CmdHandle::new(
            "dhcp capture",
            fx.probe(&self.server)?.context().clone(),
            &[
                "timeout",
                "10",
                "tcpdump",
                "-c1",
                "-nvvvei",
                server_if.as_str(),
                "port",
                "67",
            ],
        );
        capture.start()?;
        tokio::time::sleep(Duration::from_secs(1)).await;

        let out = probe
            .output(&["dhclient", "-4", "-v", client_if.as_str()])
            .await?;
        if !out.contains("bound to") {
            report.fail(format!("dhclient did not bind a lease:\n{out}"));
        }

        let captured = capture.wait().await?;
        if captured.combined().contains("vlan 0") {
            report.fail("invalid vlan 0 tag found in the DHCP request");
        }
        Ok(())
    }
}

fn first_ifname(fx: &Fixture, hostname: &str) -> Result<String, SwitchLabError> {
    fx.topology()
        .host(hostname)
        .ok_or_else(|| SwitchLabError::UnknownHost(hostname.to_string()))?
        .ifaces
        .first()
        .map(|i| i.ifname())
        .ok_or_else(|| SwitchLabError::Setup(format!("{hostname} has no interface")))
}
