// SPDX-License-Identifier: MIT

use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt;

use rimio::prelude::*;

use crate::{
    detect::{DiskType, detect_disk_type},
    errors::*,
    gpt::{self, GptCopy},
    guids::{GuidFmt, mbr_type_name},
    mbr,
    partition::{Partition, PartitionSource},
};

/// GPT header facts worth reporting.
#[derive(Debug, Clone)]
pub struct GptInfo {
    pub copy: GptCopy,
    pub disk_guid: [u8; 16],
    pub first_usable_lba: u64,
    pub last_usable_lba: u64,
    pub num_entries: u32,
}

/// Everything one probe learned about a device.
#[derive(Debug, Clone)]
pub struct DiskLayout {
    pub disk_type: DiskType,
    pub sector_size: u64,
    pub gpt: Option<GptInfo>,
    pub partitions: Vec<Partition>,
}

/// Detects the table type and decodes it into an ordered partition list.
///
/// A sector 0 without the 0x55AA signature, or a protective MBR without a
/// GPT header at LBA 1, is `Unsupported`.
pub fn scan_disk<IO: RimIO + ?Sized>(io: &mut IO, sector_size: u64) -> PartResult<DiskLayout> {
    if sector_size < 512 || !sector_size.is_power_of_two() {
        return Err(PartError::Invalid("sector size must be a power of two >= 512"));
    }

    let disk_type = detect_disk_type(io, sector_size)?;
    let (gpt, partitions) = match disk_type {
        DiskType::Gpt => {
            let table = gpt::read_gpt(io, sector_size)?;
            let info = GptInfo {
                copy: table.copy,
                disk_guid: table.header.disk_guid,
                first_usable_lba: table.header.first_usable_lba.get(),
                last_usable_lba: table.header.last_usable_lba.get(),
                num_entries: table.header.num_entries.get(),
            };
            (Some(info), table.partitions(sector_size)?)
        }
        DiskType::Mbr => {
            if !mbr::has_boot_signature(io)? {
                return Err(PartError::Unsupported("no MBR boot signature and no GPT header"));
            }
            if mbr::read_table(io, 0, sector_size)?.is_protective() {
                return Err(PartError::Unsupported(
                    "protective MBR without a GPT header at LBA 1",
                ));
            }
            (None, mbr::walk_mbr(io, sector_size)?)
        }
    };

    log::info!("{disk_type}: {} partition(s)", partitions.len());
    Ok(DiskLayout {
        disk_type,
        sector_size,
        gpt,
        partitions,
    })
}

impl fmt::Display for DiskLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Disk layout • sector: {} • table: {}",
            sep_u64(self.sector_size),
            self.disk_type
        )?;
        if let Some(g) = &self.gpt {
            write!(f, " ({} copy) • disk: {}", g.copy, GuidFmt(&g.disk_guid))?;
        }
        writeln!(f)?;

        writeln!(
            f,
            "  ┌─────┬──────────────┬──────────────┬───────────────┬──────────────────────────────┬──────────────────────┐"
        )?;
        writeln!(
            f,
            "  | No  | Start LBA    | End LBA      | Size          | Type                         | Name                 |"
        )?;
        writeln!(
            f,
            "  ├─────┼──────────────┼──────────────┼───────────────┼──────────────────────────────┼──────────────────────┤"
        )?;

        for p in &self.partitions {
            let (first, last) = p.lba_range();
            let kind = match &p.source {
                PartitionSource::Mbr { part_type, .. } => {
                    format!("{:#04x} {}", part_type, mbr_type_name(*part_type))
                }
                PartitionSource::Gpt { kind, .. } => kind.to_string(),
            };
            writeln!(
                f,
                "  | {:<3} | {:>12} | {:>12} | {:>13} | {:<28} | {:<20} |",
                p.number,
                sep_u64(first),
                sep_u64(last),
                pretty_bytes(p.length),
                truncate(&kind, 28),
                truncate(p.name(), 20),
            )?;
        }

        write!(
            f,
            "  └─────┴──────────────┴──────────────┴───────────────┴──────────────────────────────┴──────────────────────┘"
        )
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

fn pretty_bytes(n: u64) -> String {
    const UNITS: [&str; 7] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB", "EiB"];
    let mut val = n as f64;
    let mut idx = 0usize;
    while val >= 1024.0 && idx + 1 < UNITS.len() {
        val /= 1024.0;
        idx += 1;
    }
    if idx == 0 {
        format!("{} {}", sep_u64(n), UNITS[idx])
    } else {
        format!("{:.1} {}", val, UNITS[idx])
    }
}

fn sep_u64(mut n: u64) -> String {
    // thousands separator: 12 345 678
    if n < 1_000 {
        return n.to_string();
    }
    let mut parts: Vec<String> = Vec::new();
    while n >= 1_000 {
        parts.push(format!("{:03}", (n % 1_000)));
        n /= 1_000;
    }
    parts.push(n.to_string());
    parts.reverse();
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{GptImage, MbrImage};
    use crate::guids;
    use alloc::vec;

    #[test]
    fn scan_gpt_image() {
        // 10 MiB, two-slot array: one used entry, one all-zero entry.
        let img = GptImage::new(20_480, 512)
            .num_entries(2)
            .partition(0, guids::GPT_PARTITION_TYPE_LINUX, [5; 16], 34, 2081, "data")
            .build();
        let mut io = MemRimIO::new(&img);

        let layout = scan_disk(&mut io, 512).unwrap();
        assert_eq!(layout.disk_type, DiskType::Gpt);
        assert_eq!(layout.partitions.len(), 1);
        let p = &layout.partitions[0];
        assert_eq!(p.number, 1);
        assert_eq!(p.start, 34 * 512);
        assert_eq!(p.length, (2081 - 34) * 512);

        let text = format!("{layout}");
        assert!(text.contains("GPT (primary copy)"));
        assert!(text.contains("Linux Filesystem"));
    }

    #[test]
    fn scan_mbr_image() {
        let img = MbrImage::new(8192, 512)
            .entry(0, 0, 0x0C, 2048, 2048)
            .entry(0, 1, 0x83, 4096, 4096)
            .build();
        let mut io = MemRimIO::new(&img);

        let layout = scan_disk(&mut io, 512).unwrap();
        assert_eq!(layout.disk_type, DiskType::Mbr);
        assert!(layout.gpt.is_none());
        assert_eq!(layout.partitions.len(), 2);
        assert!(format!("{layout}").contains("FAT32"));
    }

    #[test]
    fn blank_disk_is_unsupported() {
        let img = vec![0u8; 512 * 64];
        let mut io = MemRimIO::new(&img);
        assert!(matches!(
            scan_disk(&mut io, 512),
            Err(PartError::Unsupported(_))
        ));
    }

    #[test]
    fn gpt_read_with_wrong_sector_size_is_unsupported() {
        // GPT laid out for 4K sectors, probed as 512: LBA1 holds no header and
        // sector 0 is a protective MBR.
        let img = GptImage::new(2_560, 4096).build();
        let mut io = MemRimIO::new(&img);
        assert!(matches!(
            scan_disk(&mut io, 512),
            Err(PartError::Unsupported(_))
        ));
    }

    #[test]
    fn odd_sector_size_is_rejected() {
        let img = vec![0u8; 4096];
        let mut io = MemRimIO::new(&img);
        assert!(matches!(
            scan_disk(&mut io, 520),
            Err(PartError::Invalid(_))
        ));
    }

    #[test]
    fn helpers() {
        assert_eq!(sep_u64(12_345_678), "12 345 678");
        assert_eq!(pretty_bytes(1536), "1.5 KiB");
        assert_eq!(truncate("abcdef", 3), "abc");
    }
}
