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

mod expect;
mod fixture;
mod poll;
mod scenario;
mod topology;

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
};

use async_trait::async_trait;

use crate::exec::{CmdOutput, CommandRunner, ExecContext, ExecError};

/// A scripted [`CommandRunner`] simulating a tiny namespace world, so that fixtures and steps
/// can be exercised without root privileges or a device.
///
/// Namespace management commands (`ip netns add/del`, the `/var/run/netns` existence test) are
/// interpreted against an in-memory set. Everything else returns a scripted output if one was
/// registered for the exact command line, and an empty success otherwise.
#[derive(Default)]
pub(crate) struct MockRunner {
    netns: Mutex<HashSet<String>>,
    outputs: Mutex<HashMap<String, CmdOutput>>,
    failing: Mutex<HashMap<String, usize>>,
    log: Mutex<Vec<(String, String)>>,
}

impl MockRunner {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a canned output for the exact (unwrapped) command line.
    pub(crate) fn script(&self, cmd: &str, out: CmdOutput) {
        self.outputs.lock().unwrap().insert(cmd.to_string(), out);
    }

    /// Make the exact command line fail with exit code 1 for the next `times` invocations.
    /// Use `usize::MAX` to fail forever.
    pub(crate) fn fail(&self, cmd: &str, times: usize) {
        self.failing.lock().unwrap().insert(cmd.to_string(), times);
    }

    /// All executed command lines, including the context name.
    pub(crate) fn calls(&self) -> Vec<(String, String)> {
        self.log.lock().unwrap().clone()
    }

    /// How often the exact command line was executed (in any context).
    pub(crate) fn count(&self, cmd: &str) -> usize {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, c)| c == cmd)
            .count()
    }

    /// The live namespaces of the simulated world.
    pub(crate) fn namespaces(&self) -> HashSet<String> {
        self.netns.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for MockRunner {
    async fn run(&self, ctx: &ExecContext, args: &[String]) -> Result<CmdOutput, ExecError> {
        let raw = args.join(" ");
        self.log
            .lock()
            .unwrap()
            .push((ctx.name().to_string(), raw.clone()));

        if let Some(n) = self.failing.lock().unwrap().get_mut(&raw) {
            if *n > 0 {
                if *n != usize::MAX {
                    *n -= 1;
                }
                return Ok(CmdOutput::failed(1));
            }
        }

        let argv: Vec<&str> = args.iter().map(String::as_str).collect();
        match argv.as_slice() {
            ["ip", "netns", "add", ns] => {
                self.netns.lock().unwrap().insert(ns.to_string());
                return Ok(CmdOutput::ok(""));
            }
            ["ip", "netns", "del", ns] => {
                self.netns.lock().unwrap().remove(*ns);
                return Ok(CmdOutput::ok(""));
            }
            ["test", "-e", path] if path.starts_with("/var/run/netns/") => {
                let ns = path.trim_start_matches("/var/run/netns/");
                return if self.netns.lock().unwrap().contains(ns) {
                    Ok(CmdOutput::ok(""))
                } else {
                    Ok(CmdOutput::failed(1))
                };
            }
            _ => {}
        }

        if let Some(out) = self.outputs.lock().unwrap().get(&raw) {
            return Ok(out.clone());
        }
        Ok(CmdOutput::ok(""))
    }
}
