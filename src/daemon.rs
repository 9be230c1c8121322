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

//! Handles on the long-lived platform daemons.
//!
//! The device stack needs `redisd` and `vnetd` (both subcommands of the `goes` binary) running
//! before any suite can exercise it. A [`Daemon`] owns one such child process for the lifetime
//! of the lab and kills it on [`Daemon::stop`]. Readiness is not the daemon's business: the lab
//! gates on the platform's `hwait` readiness keys after starting each one.

use std::{path::Path, process::Stdio};

use tokio::process::{Child, Command};

use crate::exec::ExecError;

/// A long-lived platform daemon spawned from the `goes` binary.
pub struct Daemon {
    name: String,
    child: Child,
}

impl Daemon {
    /// Spawn `goes <name>`. The child is killed when the handle is dropped, so a panicking suite
    /// does not leave daemons behind.
    pub fn start(goes: impl AsRef<Path>, name: impl AsRef<str>) -> Result<Self, ExecError> {
        let name = name.as_ref().to_string();
        log::debug!("[daemon] starting {name}");
        let child = Command::new(goes.as_ref())
            .arg(&name)
            .kill_on_drop(true)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                ExecError::Spawn(
                    "local".to_string(),
                    format!("{} {name}", goes.as_ref().display()),
                    e,
                )
            })?;
        Ok(Self { name, child })
    }

    /// The daemon's process id, if it is still known to the runtime.
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// The daemon's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Kill the daemon and wait for it to exit.
    pub async fn stop(mut self) -> Result<(), ExecError> {
        log::debug!("[daemon] stopping {}", self.name);
        self.child.kill().await?;
        Ok(())
    }
}
