// SPDX-License-Identifier: MIT

use alloc::vec::Vec;

use rimio::prelude::*;
use zerocopy::little_endian::U32;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::errors::*;
use crate::io_ext::lba_offset;
use crate::partition::{Partition, PartitionSource};

pub const MBR_SIGNATURE: [u8; 2] = [0x55, 0xAA];
pub const MBR_TABLE_OFFSET: u64 = 446;
pub const MBR_SIGNATURE_OFFSET: u64 = 510;
/// Slots per table; every table level reserves this many partition numbers.
pub const MBR_SLOTS: u32 = 4;

pub const PART_TYPE_UNUSED: u8 = 0x00;
pub const PART_TYPE_EXTENDED: u8 = 0x05;
pub const PART_TYPE_EXTENDED_LBA: u8 = 0x0F;
pub const PROTECTIVE_GPT: u8 = 0xEE;

/// Extended containers are handed to the kernel with at most this many bytes
/// (or one sector on large-sector disks) so they never overlap their logicals.
pub const EXTENDED_CONTAINER_BYTES: u64 = 1024;

const MAX_CHAIN_DEPTH: usize = 64;

#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned, Copy, Clone, Debug)]
#[repr(C)] // 16 bytes, alignment 1
pub struct MbrEntry {
    pub boot_flag: u8,
    pub starting_chs: [u8; 3],
    pub part_type: u8,
    pub end_chs: [u8; 3],
    pub start_lba: U32,
    pub sectors: U32,
}

impl MbrEntry {
    pub fn new(part_type: u8, start_lba: u32, sectors: u32) -> Self {
        Self {
            boot_flag: 0,
            starting_chs: [0; 3],
            part_type,
            end_chs: [0; 3],
            start_lba: U32::new(start_lba),
            sectors: U32::new(sectors),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.part_type == PART_TYPE_UNUSED
    }

    #[inline]
    pub fn is_extended(&self) -> bool {
        matches!(self.part_type, PART_TYPE_EXTENDED | PART_TYPE_EXTENDED_LBA)
    }

    #[inline]
    pub fn is_protective(&self) -> bool {
        self.part_type == PROTECTIVE_GPT
    }
}

/// The 64-byte, four-slot table found at offset 446 of a boot record.
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned, Copy, Clone, Debug)]
#[repr(C)]
pub struct MbrTable {
    pub entries: [MbrEntry; 4],
}

impl MbrTable {
    pub fn is_protective(&self) -> bool {
        self.entries.iter().any(MbrEntry::is_protective)
    }
}

/// Reads the partition table of the boot record at `sector`.
pub fn read_table<IO: RimIO + ?Sized>(
    io: &mut IO,
    sector: u64,
    sector_size: u64,
) -> PartResult<MbrTable> {
    let offset = lba_offset(sector, sector_size)?
        .checked_add(MBR_TABLE_OFFSET)
        .ok_or(PartError::Invalid("MBR: table offset overflow"))?;
    Ok(io.read_struct::<MbrTable>(offset)?)
}

/// `true` if sector 0 ends with the 0x55AA boot signature.
pub fn has_boot_signature<IO: RimIO + ?Sized>(io: &mut IO) -> PartResult<bool> {
    let sig = io.read_u16_at(MBR_SIGNATURE_OFFSET)?;
    Ok(sig.to_le_bytes() == MBR_SIGNATURE)
}

/// Decodes the primary table and every chained extended table into one
/// list, in pre-order.
///
/// Numbering: slot `i` of a table opened with number `n` is `n + i`, unused
/// slots included. Each table reserves four numbers, so the primary table
/// owns 1..=4 and the first extended table starts at 5.
pub fn walk_mbr<IO: RimIO + ?Sized>(io: &mut IO, sector_size: u64) -> PartResult<Vec<Partition>> {
    let mut walker = MbrWalker {
        io,
        sector_size,
        visited: Vec::new(),
        out: Vec::new(),
    };
    walker.walk_table(0, None, 1, 0)?;
    Ok(walker.out)
}

struct MbrWalker<'a, IO: RimIO + ?Sized> {
    io: &'a mut IO,
    sector_size: u64,
    visited: Vec<u64>,
    out: Vec<Partition>,
}

impl<IO: RimIO + ?Sized> MbrWalker<'_, IO> {
    /// Walks the table at `base`, numbering from `part_no`. `ext_base` is the
    /// first sector of the primary extended partition once inside the chain.
    /// Returns the first number after everything this table reserved.
    fn walk_table(
        &mut self,
        base: u64,
        ext_base: Option<u64>,
        part_no: u32,
        depth: usize,
    ) -> PartResult<u32> {
        if depth > MAX_CHAIN_DEPTH {
            return Err(PartError::Invalid("MBR: extended partition chain too deep"));
        }
        if self.visited.contains(&base) {
            return Err(PartError::Invalid("MBR: extended partition chain loops"));
        }
        self.visited.push(base);

        let table = read_table(&mut *self.io, base, self.sector_size)?;
        let mut last_part = part_no + MBR_SLOTS;

        for (i, entry) in table.entries.iter().enumerate() {
            if entry.is_empty() {
                continue;
            }
            let number = part_no + i as u32;
            let start = entry.start_lba.get() as u64;
            let sectors = entry.sectors.get() as u64;

            // Logical data lives relative to its own table, links relative
            // to the start of the primary extended partition.
            let first_sector = if entry.is_extended() {
                ext_base.unwrap_or(0).checked_add(start)
            } else {
                base.checked_add(start)
            }
            .ok_or(PartError::Invalid("MBR: sector overflow"))?;

            let start_bytes = first_sector
                .checked_mul(self.sector_size)
                .ok_or(PartError::Invalid("MBR: start offset overflow"))?;
            let mut length = sectors
                .checked_mul(self.sector_size)
                .ok_or(PartError::Invalid("MBR: length overflow"))?;
            if entry.is_extended() {
                length = length.min(EXTENDED_CONTAINER_BYTES.max(self.sector_size));
            }

            log::debug!(
                "MBR part {number}: type {:#04x} start sector {first_sector}, {sectors} sectors",
                entry.part_type
            );

            self.out.push(Partition {
                number,
                start: start_bytes,
                length,
                source: PartitionSource::Mbr {
                    part_type: entry.part_type,
                    first_sector,
                    sectors,
                    extended: entry.is_extended(),
                },
            });

            if entry.is_extended() {
                let chain_base = ext_base.unwrap_or(first_sector);
                last_part = self.walk_table(first_sector, Some(chain_base), last_part, depth + 1)?;
            }
        }

        Ok(last_part)
    }
}
