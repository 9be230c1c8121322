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

//! Run configuration of the harness.
//!
//! The configuration is built exactly once at process start (from an optional TOML file, then
//! command-line overrides) and passed by reference into the lab, the fixtures, and the steps.
//! Nothing in this crate reads configuration from global state.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Immutable run configuration. See the field documentation for the corresponding TOML keys.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Path to the `goes` binary of the device under test.
    pub goes: PathBuf,
    /// Platform name used for readiness keys (`<platform> redis.ready` etc.).
    pub platform: String,
    /// This is a zero-based alpha system. Changes which kernel module arguments are used.
    pub alpha: bool,
    /// Do not touch the device or the network; only report what would run.
    pub dry_run: bool,
    /// Freeze and wait for an operator before tearing down a failed fixture, and after starting
    /// `vnetd` (to attach a debugger).
    pub pause: bool,
    /// Skip the long-running stress and flood steps.
    pub short: bool,
    /// Duration of the ping flood in seconds. `0` disables the flood steps.
    pub flood_secs: u64,
    /// How many times to repeat every selected suite.
    pub repeat: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            goes: PathBuf::from("./goes-platina-mk1"),
            platform: "platina-mk1".to_string(),
            alpha: false,
            dry_run: false,
            pause: false,
            short: false,
            flood_secs: 1,
            repeat: 1,
        }
    }
}

impl Config {
    /// Read the configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
        Ok(toml::from_str(&raw)?)
    }

    /// The `goes` binary path as a string slice, as passed to command lines.
    pub fn goes_str(&self) -> &str {
        self.goes.to_str().unwrap_or("./goes-platina-mk1")
    }
}

/// Error kind returned while reading the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Cannot read '{0}': {1}")]
    Read(PathBuf, #[source] std::io::Error),
    /// The configuration file could not be parsed.
    #[error("Cannot parse the configuration: {0}")]
    Parse(#[from] toml::de::Error),
}
