// SPDX-License-Identifier: MIT

use rimio::prelude::*;

use crate::{errors::*, gpt::GPT_SIGNATURE, io_ext::RimIOLbaExt};

/// Partition table flavours the prober understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiskType {
    Mbr,
    Gpt,
}

impl core::fmt::Display for DiskType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            DiskType::Mbr => write!(f, "MBR"),
            DiskType::Gpt => write!(f, "GPT"),
        }
    }
}

/// Classifies the device by the second logical sector: `EFI PART` there
/// means GPT, anything else is handed to the MBR walker.
pub fn detect_disk_type<IO: RimIO + ?Sized>(io: &mut IO, sector_size: u64) -> PartResult<DiskType> {
    let mut lba1 = [0u8; 512];
    io.read_at_lba(1, sector_size, &mut lba1)?;

    let kind = if &lba1[..GPT_SIGNATURE.len()] == GPT_SIGNATURE {
        DiskType::Gpt
    } else {
        DiskType::Mbr
    };
    log::debug!("LBA1 at offset {sector_size}: {kind}");
    Ok(kind)
}
