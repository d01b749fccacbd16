// SPDX-License-Identifier: MIT

mod config;
mod device;
mod kernel;
mod probe;
mod utils;

use anyhow::bail;
use clap::{ArgAction, Parser};
use std::path::{Path, PathBuf};

use crate::config::ProbeOptions;
use crate::kernel::ReconcileReport;

#[derive(Parser)]
#[command(
    name = "rimprobe",
    version,
    about = "Inform the kernel of partition table changes",
    long_about = None,
    disable_version_flag = true
)]
struct Cli {
    /// Print a summary of each decoded partition table
    #[arg(short, long)]
    summary: bool,

    /// Decode only, don't update the kernel partition table
    #[arg(short, long)]
    dry_run: bool,

    /// Print diagnostics (checksums, table locations)
    #[arg(short = 'V', long)]
    verbose: bool,

    /// Continue with the next device after a failure
    #[arg(short, long)]
    keep_going: bool,

    /// Print version
    #[arg(short = 'v', long, action = ArgAction::Version)]
    version: Option<bool>,

    /// Block devices to probe (e.g., /dev/sda, /dev/loop0)
    #[arg(required = true, value_name = "DEVICE")]
    devices: Vec<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    utils::log::init(cli.verbose);

    let opts = ProbeOptions {
        summary: cli.summary,
        dry_run: cli.dry_run,
        keep_going: cli.keep_going,
    };
    if opts.dry_run {
        log::info!("Dry run mode: the kernel partition table will not be modified.");
    }

    run(&cli.devices, &opts, probe::probe_device)
}

/// Probes `devices` in order. Without `keep_going` the first failure is
/// returned as is; with it every device is probed and a failure count is
/// reported at the end.
fn run<F>(devices: &[PathBuf], opts: &ProbeOptions, mut probe: F) -> anyhow::Result<()>
where
    F: FnMut(&Path, &ProbeOptions) -> anyhow::Result<ReconcileReport>,
{
    let mut failed = 0usize;
    for device in devices {
        if let Err(e) = probe(device, opts) {
            if !opts.keep_going {
                return Err(e);
            }
            log::error!("{e:#}");
            failed += 1;
        }
    }

    if failed > 0 {
        bail!("{failed} of {} device(s) failed", devices.len());
    }
    Ok(())
}
