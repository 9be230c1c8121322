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

use std::path::PathBuf;

use clap::Parser;

use switch_lab::{
    config::Config,
    suites::{self, Flavor},
    ScenarioReport, SwitchLab, SwitchLabError,
};

/// Run the blackbox test suites against the switch under test.
#[derive(Debug, Parser)]
struct Cli {
    /// Path to a TOML configuration file. Command-line flags override its values.
    #[clap(long, short = 'c')]
    config: Option<PathBuf>,
    /// Path to the `goes` binary of the device under test.
    #[clap(long)]
    goes: Option<PathBuf>,
    /// Only report what would run, without touching the device or the network.
    #[clap(long)]
    dry_run: bool,
    /// Freeze failed fixtures before teardown so a debugger can be attached.
    #[clap(long)]
    pause: bool,
    /// This is a zero-based alpha system.
    #[clap(long)]
    alpha: bool,
    /// Skip the long-running stress and flood steps.
    #[clap(long)]
    short: bool,
    /// Flood ping duration in seconds.
    #[clap(long)]
    flood: Option<u64>,
    /// How many times to repeat the selected suites.
    #[clap(long)]
    repeat: Option<usize>,
    /// Only run scenarios whose name contains one of the given strings (e.g. `frr`,
    /// `vlan/bird`).
    #[clap(long, short = 's')]
    suite: Vec<String>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init_timed();

    let args = Cli::parse();
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(goes) = args.goes {
        config.goes = goes;
    }
    config.dry_run |= args.dry_run;
    config.pause |= args.pause;
    config.alpha |= args.alpha;
    config.short |= args.short;
    if let Some(flood) = args.flood {
        config.flood_secs = flood;
    }
    if let Some(repeat) = args.repeat {
        config.repeat = repeat;
    }

    if !config.dry_run && unsafe { libc::geteuid() } != 0 {
        eprintln!("you aren't root");
        std::process::exit(1);
    }

    let passed = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(run(config, args.suite))?;

    if !passed {
        std::process::exit(1);
    }
    Ok(())
}

async fn run(config: Config, filter: Vec<String>) -> Result<bool, SwitchLabError> {
    let repeat = config.repeat.max(1);
    let lab = SwitchLab::new(config).start().await?;

    let mut reports: Vec<ScenarioReport> = Vec::new();
    for round in 0..repeat {
        if repeat > 1 {
            log::info!("round {}/{repeat}", round + 1);
        }
        for flavor in [Flavor::Net, Flavor::Vlan] {
            for (topo, scenario) in suites::all(flavor, lab.config()) {
                if !filter.is_empty()
                    && !filter.iter().any(|f| scenario.name().contains(f.as_str()))
                {
                    continue;
                }
                reports.push(lab.run(topo, scenario).await?);
            }
        }
    }

    lab.stop().await?;

    let passed = reports.iter().all(ScenarioReport::passed);
    for report in &reports {
        print!("{report}");
    }
    println!(
        "{}/{} scenarios passed",
        reports.iter().filter(|r| r.passed()).count(),
        reports.len()
    );
    Ok(passed)
}
