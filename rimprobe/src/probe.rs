// SPDX-License-Identifier: MIT

use std::fs::File;
use std::path::Path;

use anyhow::Context;
use rimio::prelude::*;
use rimpart::{DiskLayout, scan_disk};

use crate::config::ProbeOptions;
use crate::device;
use crate::kernel::{self, BlkpgTable, PartitionTable, ReconcileReport};

/// Probes one device: decode its table, then bring the kernel in line.
///
/// The device is opened read-only and closed on return.
pub fn probe_device(path: &Path, opts: &ProbeOptions) -> anyhow::Result<ReconcileReport> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let sector_size = device::sector_size(&file);

    let mut reader = &file;
    let mut io = StdRimIO::new(&mut reader);
    let mut table = BlkpgTable::new(&file);

    let (layout, report) = probe_io(&mut io, sector_size, &mut table, opts)
        .with_context(|| format!("probing {}", path.display()))?;

    log::info!(
        "{}: {} table, {} partition(s) committed",
        path.display(),
        layout.disk_type,
        report.added
    );
    Ok(report)
}

/// Device-independent part of a probe, generic over the reader and the
/// kernel table.
pub fn probe_io<IO, T>(
    io: &mut IO,
    sector_size: u64,
    table: &mut T,
    opts: &ProbeOptions,
) -> anyhow::Result<(DiskLayout, ReconcileReport)>
where
    IO: RimIO + ?Sized,
    T: PartitionTable + ?Sized,
{
    let layout = scan_disk(io, sector_size)?;
    if opts.summary {
        println!("{layout}");
    }
    let report = kernel::reconcile(table, &layout.partitions, opts)?;
    Ok((layout, report))
}
