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

//! The live environment a scenario runs against.
//!
//! A [`Fixture`] owns the namespaces and interfaces created from a [`Topology`]. Building is
//! idempotent: namespaces that already exist are detected and skipped, so a scenario can rebuild
//! on top of a half-torn environment. Teardown is the inverse and must restore the baseline
//! completely: every namespace is deleted and every front-panel port must come back to the
//! default namespace. When the kernel is slow to return an interface, the fixture retries a
//! bounded number of times before escalating, since a stolen port would corrupt every scenario
//! that follows.

use std::{sync::Arc, time::Duration};

use lazy_static::lazy_static;
use regex::Regex;

use crate::{
    config::Config,
    exec::{CommandRunner, Probe},
    topology::{Backing, Host, Iface, Topology},
    SwitchLabError,
};

/// How often the teardown retries to bring a port back into the default namespace.
pub const TEARDOWN_RETRIES: usize = 10;

/// The interval between two teardown retries.
pub const TEARDOWN_INTERVAL: Duration = Duration::from_secs(1);

/// The live test environment built from a [`Topology`]. Exclusively owned by one scenario at a
/// time.
pub struct Fixture {
    topo: Topology,
    config: Arc<Config>,
    runner: Arc<dyn CommandRunner>,
}

impl Fixture {
    pub(crate) fn new(topo: Topology, config: Arc<Config>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            topo,
            config,
            runner,
        }
    }

    /// The topology this fixture was built from.
    pub fn topology(&self) -> &Topology {
        &self.topo
    }

    /// The run configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Path of the `goes` binary of the device under test.
    pub fn goes(&self) -> &str {
        self.config.goes_str()
    }

    /// A probe executing on the given host of the topology.
    pub fn probe(&self, hostname: &str) -> Result<Probe, SwitchLabError> {
        let host = self
            .topo
            .host(hostname)
            .ok_or_else(|| SwitchLabError::UnknownHost(hostname.to_string()))?;
        Ok(Probe::new(host.context(), self.runner.clone()))
    }

    /// A probe executing on the machine running the harness, used for namespace management and
    /// the device CLI.
    pub fn device_probe(&self) -> Probe {
        Probe::local(self.runner.clone())
    }

    /// Build the environment: create namespaces, move interfaces, assign addresses, and install
    /// the declared routes and dummy interfaces. Safe to call when parts of the environment
    /// already exist.
    pub async fn build(&self) -> Result<(), SwitchLabError> {
        log::debug!("[{}] building the fixture", self.topo.name);
        for host in &self.topo.hosts {
            match host.backing {
                Backing::Netns => self.build_netns_host(host).await?,
                Backing::Container => self.check_container_host(host).await?,
            }
        }
        Ok(())
    }

    async fn build_netns_host(&self, host: &Host) -> Result<(), SwitchLabError> {
        let local = self.device_probe();
        let probe = Probe::new(host.context(), self.runner.clone());
        let ns = host.netns();

        if !self.netns_exists(ns).await? {
            local
                .run(&["ip", "netns", "add", ns])
                .await
                .map_err(|e| setup(ns, e))?;
            for sysctl in &host.sysctls {
                probe
                    .run(&["sysctl", "-w", sysctl.as_str()])
                    .await
                    .map_err(|e| setup(ns, e))?;
            }
        }

        for iface in &host.ifaces {
            local
                .run(&["ip", "link", "set", iface.name.as_str(), "up", "netns", ns])
                .await
                .map_err(|e| setup(ns, e))?;
            if let Some(vlan) = iface.vlan {
                let ifname = iface.ifname();
                let vlan_id = vlan.to_string();
                probe
                    .run(&[
                        "ip",
                        "link",
                        "add",
                        "link",
                        iface.name.as_str(),
                        "name",
                        ifname.as_str(),
                        "type",
                        "vlan",
                        "id",
                        vlan_id.as_str(),
                    ])
                    .await
                    .map_err(|e| setup(ns, e))?;
                probe
                    .run(&["ip", "link", "set", ifname.as_str(), "up"])
                    .await
                    .map_err(|e| setup(ns, e))?;
            }
            self.assign_address(&probe, ns, iface).await?;
        }

        for dummy in &host.dummies {
            probe
                .run(&["ip", "link", "add", dummy.name.as_str(), "type", "dummy"])
                .await
                .map_err(|e| setup(ns, e))?;
            probe
                .run(&["ip", "link", "set", dummy.name.as_str(), "up"])
                .await
                .map_err(|e| setup(ns, e))?;
            self.assign_address(&probe, ns, dummy).await?;
        }

        for route in &host.routes {
            let family = ip_family(&route.prefix);
            probe
                .run(&[
                    "ip",
                    family,
                    "route",
                    "append",
                    route.prefix.as_str(),
                    "via",
                    route.gw.as_str(),
                ])
                .await
                .map_err(|e| setup(ns, e))?;
        }

        Ok(())
    }

    async fn assign_address(
        &self,
        probe: &Probe,
        ns: &str,
        iface: &Iface,
    ) -> Result<(), SwitchLabError> {
        if let Some(addr) = &iface.address {
            let family = ip_family(addr);
            let ifname = iface.ifname();
            probe
                .run(&[
                    "ip",
                    family,
                    "address",
                    "add",
                    addr.as_str(),
                    "dev",
                    ifname.as_str(),
                ])
                .await
                .map_err(|e| setup(ns, e))?;
        }
        Ok(())
    }

    /// Verify that an externally provisioned container is running. The fixture does not manage
    /// container lifecycles; a missing container is a setup failure.
    async fn check_container_host(&self, host: &Host) -> Result<(), SwitchLabError> {
        let running = self
            .device_probe()
            .try_output(&[
                "docker",
                "inspect",
                "-f",
                "{{.State.Running}}",
                host.hostname.as_str(),
            ])
            .await?;
        if running.success() && running.stdout.trim() == "true" {
            Ok(())
        } else {
            Err(SwitchLabError::Setup(format!(
                "container {} is not running",
                host.hostname
            )))
        }
    }

    async fn netns_exists(&self, ns: &str) -> Result<bool, SwitchLabError> {
        let path = format!("/var/run/netns/{ns}");
        Ok(self
            .device_probe()
            .status(&["test", "-e", path.as_str()])
            .await?)
    }

    /// Tear the environment down: delete every namespace created for the topology and wait for
    /// all front-panel ports to return to the default namespace. Runs unconditionally after a
    /// scenario; a failure here is fatal for the whole suite.
    ///
    /// Deleting a namespace without first moving its interfaces out is deliberate: the kernel
    /// must hand them back to the default namespace on its own, and the bring-up retry below
    /// verifies that it did.
    pub async fn teardown(&self) -> Result<(), SwitchLabError> {
        log::debug!("[{}] tearing the fixture down", self.topo.name);
        let local = self.device_probe();

        for host in self.topo.netns_hosts() {
            let ns = host.netns();
            if self.netns_exists(ns).await? {
                local
                    .run(&["ip", "netns", "del", ns])
                    .await
                    .map_err(|e| SwitchLabError::Teardown(e.to_string()))?;
            }
        }

        for host in self.topo.netns_hosts() {
            for iface in &host.ifaces {
                let mut restored = false;
                for i in 0..TEARDOWN_RETRIES {
                    if local
                        .status(&["ip", "link", "set", iface.name.as_str(), "up"])
                        .await?
                    {
                        restored = true;
                        break;
                    }
                    if i + 1 < TEARDOWN_RETRIES {
                        log::debug!(
                            "[{}] {} not yet back in the default namespace, retrying",
                            self.topo.name,
                            iface.name
                        );
                        tokio::time::sleep(TEARDOWN_INTERVAL).await;
                    }
                }
                if !restored {
                    return Err(SwitchLabError::Teardown(format!(
                        "interface {} did not return to the default namespace",
                        iface.name
                    )));
                }
            }
        }

        Ok(())
    }

    /// Ping `target` from `hostname` once and report whether it answered.
    pub async fn ping_ok(&self, hostname: &str, target: &str) -> Result<bool, SwitchLabError> {
        let probe = self.probe(hostname)?;
        let program = if target.contains(':') { "ping6" } else { "ping" };
        Ok(probe.status(&[program, "-c1", target]).await?)
    }

    /// Read the CPU core temperature of the device, in degrees Celsius. Returns `None` when the
    /// reading cannot be parsed.
    pub async fn cpu_temp(&self) -> Result<Option<u32>, SwitchLabError> {
        lazy_static! {
            static ref TEMP_RE: Regex = Regex::new(r"sys\.cpu\.coretemp\.C:\s+(\d+)").unwrap();
        }
        let out = self
            .device_probe()
            .output(&[self.goes(), "hget", self.config.platform.as_str(), "temp"])
            .await?;
        Ok(TEMP_RE
            .captures(&out)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok()))
    }

    /// Dump the device FIB, optionally restricted to the table of one host.
    pub async fn show_fib(&self, table: Option<&str>) -> Result<String, SwitchLabError> {
        let mut cmd = vec![self.goes(), "vnet", "show", "ip", "fib"];
        if let Some(table) = table {
            cmd.push("table");
            cmd.push(table);
        }
        Ok(self.device_probe().output(&cmd).await?)
    }
}

fn setup(ns: &str, e: crate::exec::ExecError) -> SwitchLabError {
    SwitchLabError::Setup(format!("{ns}: {e}"))
}

fn ip_family(addr: &str) -> &'static str {
    if addr.contains(':') {
        "-6"
    } else {
        "-4"
    }
}
