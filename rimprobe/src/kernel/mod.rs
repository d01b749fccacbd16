// SPDX-License-Identifier: MIT

//! Kernel partition map reconciliation.

mod blkpg;

pub use blkpg::BlkpgTable;

use core::fmt;

use nix::errno::Errno;
use rimpart::Partition;

use crate::config::ProbeOptions;

/// Kernel partition numbers cleared before the decoded table is installed.
pub const MAX_KERNEL_PARTITIONS: u32 = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    /// Delete of a mapping that does not exist.
    NoSuchPartition(u32),
    Rejected { partno: u32, errno: Errno },
    /// Offset or length does not fit the kernel's signed 64-bit fields.
    OutOfRange { partno: u32 },
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelError::NoSuchPartition(n) => write!(f, "partition {n} does not exist"),
            KernelError::Rejected { partno, errno } => {
                write!(f, "kernel rejected partition {partno}: {}", errno.desc())
            }
            KernelError::OutOfRange { partno } => {
                write!(f, "partition {partno} lies beyond the kernel's addressable range")
            }
        }
    }
}

impl std::error::Error for KernelError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            KernelError::Rejected { errno, .. } => Some(errno),
            _ => None,
        }
    }
}

/// The kernel's view of a disk's partitions.
pub trait PartitionTable {
    fn delete_partition(&mut self, partno: u32) -> Result<(), KernelError>;
    fn add_partition(&mut self, partno: u32, start: u64, length: u64) -> Result<(), KernelError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Existing mappings deleted during the clear step.
    pub removed: u32,
    pub added: u32,
}

/// Replaces the kernel's mappings with `parts`.
///
/// Every number in `1..=128` is deleted first; missing mappings are ignored
/// and other delete failures are only logged. The first failed add aborts.
/// A dry run makes no calls on `table`.
pub fn reconcile<T: PartitionTable + ?Sized>(
    table: &mut T,
    parts: &[Partition],
    opts: &ProbeOptions,
) -> Result<ReconcileReport, KernelError> {
    let mut report = ReconcileReport::default();

    if opts.dry_run {
        log::info!("would clear kernel partitions 1..={MAX_KERNEL_PARTITIONS}");
        for p in parts {
            log::info!(
                "would add partition {}: start {} length {}",
                p.number,
                p.start,
                p.length
            );
        }
        return Ok(report);
    }

    for partno in 1..=MAX_KERNEL_PARTITIONS {
        match table.delete_partition(partno) {
            Ok(()) => report.removed += 1,
            Err(KernelError::NoSuchPartition(_)) => {}
            Err(e) => log::warn!("{e}"),
        }
    }
    log::debug!("cleared {} kernel partition(s)", report.removed);

    for p in parts {
        table.add_partition(p.number, p.start, p.length)?;
        log::debug!("added partition {}: start {} length {}", p.number, p.start, p.length);
        report.added += 1;
    }
    Ok(report)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rimpart::PartitionSource;
    use std::collections::BTreeMap;

    /// Kernel table stand-in that records every call.
    #[derive(Default)]
    pub(crate) struct MemTable {
        pub mappings: BTreeMap<u32, (u64, u64)>,
        pub calls: usize,
        pub reject_add: Option<u32>,
        pub busy: Option<u32>,
    }

    impl PartitionTable for MemTable {
        fn delete_partition(&mut self, partno: u32) -> Result<(), KernelError> {
            self.calls += 1;
            if self.busy == Some(partno) {
                return Err(KernelError::Rejected {
                    partno,
                    errno: Errno::EBUSY,
                });
            }
            self.mappings
                .remove(&partno)
                .map(|_| ())
                .ok_or(KernelError::NoSuchPartition(partno))
        }

        fn add_partition(&mut self, partno: u32, start: u64, length: u64) -> Result<(), KernelError> {
            self.calls += 1;
            if self.reject_add == Some(partno) || self.mappings.contains_key(&partno) {
                return Err(KernelError::Rejected {
                    partno,
                    errno: Errno::EBUSY,
                });
            }
            self.mappings.insert(partno, (start, length));
            Ok(())
        }
    }

    fn part(number: u32, start: u64, length: u64) -> Partition {
        Partition {
            number,
            start,
            length,
            source: PartitionSource::Mbr {
                part_type: 0x83,
                first_sector: start / 512,
                sectors: length / 512,
                extended: false,
            },
        }
    }

    fn sample() -> Vec<Partition> {
        vec![part(1, 1 << 20, 4 << 20), part(3, 8 << 20, 2 << 20)]
    }

    #[test]
    fn replaces_stale_mappings() {
        let mut table = MemTable::default();
        table.mappings.insert(2, (0, 512));
        table.mappings.insert(7, (0, 512));

        let report = reconcile(&mut table, &sample(), &ProbeOptions::default()).unwrap();
        assert_eq!(report, ReconcileReport { removed: 2, added: 2 });
        assert_eq!(table.mappings.keys().copied().collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(table.mappings[&3], (8 << 20, 2 << 20));
    }

    #[test]
    fn reconcile_is_idempotent() {
        let opts = ProbeOptions::default();
        let mut once = MemTable::default();
        reconcile(&mut once, &sample(), &opts).unwrap();

        let mut twice = MemTable::default();
        reconcile(&mut twice, &sample(), &opts).unwrap();
        let second = reconcile(&mut twice, &sample(), &opts).unwrap();

        assert_eq!(second.removed, 2);
        assert_eq!(once.mappings, twice.mappings);
    }

    #[test]
    fn dry_run_makes_no_calls() {
        let mut table = MemTable::default();
        table.mappings.insert(5, (0, 512));
        let opts = ProbeOptions {
            dry_run: true,
            ..Default::default()
        };

        let report = reconcile(&mut table, &sample(), &opts).unwrap();
        assert_eq!(report, ReconcileReport::default());
        assert_eq!(table.calls, 0);
        assert!(table.mappings.contains_key(&5));
    }

    #[test]
    fn first_failed_add_aborts() {
        let mut table = MemTable {
            reject_add: Some(1),
            ..Default::default()
        };

        let err = reconcile(&mut table, &sample(), &ProbeOptions::default()).unwrap_err();
        assert_eq!(
            err,
            KernelError::Rejected {
                partno: 1,
                errno: Errno::EBUSY
            }
        );
        assert!(!table.mappings.contains_key(&3));
    }

    #[test]
    fn failed_delete_is_not_fatal() {
        let mut table = MemTable {
            busy: Some(4),
            ..Default::default()
        };
        let report = reconcile(&mut table, &sample(), &ProbeOptions::default()).unwrap();
        assert_eq!(report.added, 2);
        assert_eq!(table.calls, MAX_KERNEL_PARTITIONS as usize + 2);
    }
}
