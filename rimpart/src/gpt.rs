// SPDX-License-Identifier: MIT

use alloc::string::String;
use alloc::vec::Vec;

use rimio::prelude::*;
use zerocopy::little_endian::{U32, U64};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::crc::{Crc32, crc32};
use crate::errors::*;
use crate::guids::GptPartitionKind;
use crate::io_ext::lba_offset;
use crate::partition::{Partition, PartitionSource};

pub const GPT_SIGNATURE: &[u8; 8] = b"EFI PART";
pub const GPT_REVISION: u32 = 0x00010000;
pub const GPT_PRIMARY_HEADER_LBA: u64 = 1;
/// Bytes of the header covered by the UEFI definition (the rest of the sector is padding).
pub const GPT_HEADER_SIZE: usize = 92;
/// Minimum (and usual) size of one partition entry.
pub const GPT_ENTRY_SIZE: usize = 128;
pub const GPT_MAX_ENTRIES: u32 = 16_384;
pub const GPT_MAX_ENTRY_SIZE: u32 = 4096;

/// Byte range of `header_crc32` inside the header.
const HEADER_CRC_FIELD: core::ops::Range<usize> = 16..20;

#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned, Copy, Clone, Debug)]
#[repr(C)]
pub struct GptHeader {
    pub signature: [u8; 8],
    pub revision: U32,
    pub header_size: U32,
    pub header_crc32: U32,
    pub reserved: U32,
    pub current_lba: U64,
    pub backup_lba: U64,
    pub first_usable_lba: U64,
    pub last_usable_lba: U64,
    pub disk_guid: [u8; 16],
    pub entries_lba: U64,
    pub num_entries: U32,
    pub entry_size: U32,
    pub entries_crc32: U32,
}

impl GptHeader {
    #[inline]
    pub fn has_signature(&self) -> bool {
        &self.signature == GPT_SIGNATURE
    }

    /// CRC of the first `header_size` bytes of `raw` with the CRC field zeroed.
    /// `None` when `raw` is shorter than `header_size` or than a header.
    pub(crate) fn compute_crc32(raw: &[u8], header_size: usize) -> Option<u32> {
        if header_size < GPT_HEADER_SIZE {
            return None;
        }
        let covered = raw.get(..header_size)?;
        let mut h = Crc32::new();
        h.update(&covered[..HEADER_CRC_FIELD.start])
            .update_zeroes(HEADER_CRC_FIELD.len())
            .update(&covered[HEADER_CRC_FIELD.end..]);
        Some(h.finalize())
    }

    /// Checks the header checksum against the raw sector it was decoded
    /// from, then the table geometry it advertises.
    fn verify(&self, raw: &[u8]) -> Result<(), &'static str> {
        let header_size = self.header_size.get() as usize;
        if header_size < GPT_HEADER_SIZE || header_size > raw.len() {
            return Err("header size out of range");
        }

        let stored = self.header_crc32.get();
        let computed =
            Self::compute_crc32(raw, header_size).ok_or("header size out of range")?;
        log::debug!("GPT header CRC: stored {stored:#010x}, computed {computed:#010x}");
        if stored != computed {
            return Err("header CRC mismatch");
        }

        let entry_size = self.entry_size.get();
        if (entry_size as usize) < GPT_ENTRY_SIZE
            || entry_size % 8 != 0
            || entry_size > GPT_MAX_ENTRY_SIZE
        {
            return Err("invalid partition entry size");
        }
        let num_entries = self.num_entries.get();
        if num_entries == 0 || num_entries > GPT_MAX_ENTRIES {
            return Err("partition entry count out of range");
        }
        Ok(())
    }

    #[inline]
    fn table_len(&self) -> usize {
        self.num_entries.get() as usize * self.entry_size.get() as usize
    }
}

#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned, Copy, Clone, Debug)]
#[repr(C)]
pub struct GptEntry {
    pub type_guid: [u8; 16],
    pub unique_guid: [u8; 16],
    pub first_lba: U64,
    /// Inclusive.
    pub last_lba: U64,
    pub attributes: U64,
    /// UTF-16LE, NUL padded.
    pub name: [u8; 72],
}

impl GptEntry {
    pub fn new(
        type_guid: [u8; 16],
        unique_guid: [u8; 16],
        first_lba: u64,
        last_lba: u64,
        attributes: u64,
        name: &str,
    ) -> Self {
        Self {
            type_guid,
            unique_guid,
            first_lba: U64::new(first_lba),
            last_lba: U64::new(last_lba),
            attributes: U64::new(attributes),
            name: encode_gpt_name(name),
        }
    }

    /// A slot is unused when its type GUID is all zero, whatever else it holds.
    #[inline]
    pub fn is_unused(&self) -> bool {
        self.type_guid.iter().all(|&b| b == 0)
    }

    #[inline]
    pub fn kind(&self) -> GptPartitionKind {
        GptPartitionKind::from_guid(&self.type_guid)
    }

    /// Decodes the name up to the first NUL, replacing invalid code units.
    pub fn name_string(&self) -> String {
        let units: Vec<u16> = self
            .name
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .take_while(|&u| u != 0)
            .collect();
        String::from_utf16_lossy(&units)
    }
}

pub fn encode_gpt_name(name: &str) -> [u8; 72] {
    let mut buf = [0u8; 72];
    for (i, c) in name.encode_utf16().take(36).enumerate() {
        buf[i * 2..i * 2 + 2].copy_from_slice(&c.to_le_bytes());
    }
    buf
}

/// Which header/table pair a table was decoded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GptCopy {
    Primary,
    Backup,
}

impl core::fmt::Display for GptCopy {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            GptCopy::Primary => write!(f, "primary"),
            GptCopy::Backup => write!(f, "backup"),
        }
    }
}

/// A verified header plus the used slots of its partition array.
#[derive(Debug, Clone)]
pub struct GptTable {
    pub copy: GptCopy,
    pub header: GptHeader,
    /// `(slot index, entry)` for every slot with a non-zero type GUID.
    pub entries: Vec<(u32, GptEntry)>,
}

impl GptTable {
    /// Projects the used slots onto kernel partitions: number = slot + 1.
    ///
    /// The length is `(last - first) * sector_size`. GPT's last LBA is
    /// inclusive, so this is one sector short of the on-disk extent. Existing
    /// probe tooling reports the same short length, so it is kept.
    pub fn partitions(&self, sector_size: u64) -> PartResult<Vec<Partition>> {
        let mut out = Vec::with_capacity(self.entries.len());
        for (index, e) in &self.entries {
            let first_lba = e.first_lba.get();
            let last_lba = e.last_lba.get();
            let start = first_lba
                .checked_mul(sector_size)
                .ok_or(PartError::Corrupt("GPT: partition start overflow"))?;
            let length = last_lba
                .checked_sub(first_lba)
                .and_then(|n| n.checked_mul(sector_size))
                .ok_or(PartError::Corrupt("GPT: invalid partition extent"))?;
            out.push(Partition {
                number: index + 1,
                start,
                length,
                source: PartitionSource::Gpt {
                    kind: e.kind(),
                    unique_guid: e.unique_guid,
                    first_lba,
                    last_lba,
                    attributes: e.attributes.get(),
                    name: e.name_string(),
                },
            });
        }
        Ok(out)
    }
}

/// Result of reading one header/table pair.
enum CopyState {
    Valid(GptTable),
    /// `header` is kept when its signature matched, even if its checksum did
    /// not, so its `backup_lba` can still locate the other copy.
    Damaged {
        header: Option<GptHeader>,
        reason: &'static str,
    },
}

fn read_copy<IO: RimIO + ?Sized>(
    io: &mut IO,
    lba: u64,
    sector_size: u64,
    copy: GptCopy,
) -> PartResult<CopyState> {
    let raw = io.read_vec_at(lba_offset(lba, sector_size)?, sector_size as usize)?;
    let header = GptHeader::read_from_prefix(&raw)
        .map(|(h, _)| h)
        .map_err(|_| PartError::Invalid("GPT: sector smaller than a header"))?;

    if !header.has_signature() {
        return Ok(CopyState::Damaged {
            header: None,
            reason: "bad signature",
        });
    }
    log::debug!("GPT {copy} header at LBA {lba}");
    if let Err(reason) = header.verify(&raw) {
        return Ok(CopyState::Damaged {
            header: Some(header),
            reason,
        });
    }

    let table_offset = lba_offset(header.entries_lba.get(), sector_size)?;
    let table = match io.read_vec_at(table_offset, header.table_len()) {
        Ok(table) => table,
        Err(RimIOError::OutOfBounds) => {
            return Ok(CopyState::Damaged {
                header: Some(header),
                reason: "partition table beyond end of device",
            });
        }
        Err(e) => return Err(e.into()),
    };

    let stored = header.entries_crc32.get();
    let computed = crc32(&table);
    log::debug!("GPT {copy} table CRC: stored {stored:#010x}, computed {computed:#010x}");
    if stored != computed {
        return Ok(CopyState::Damaged {
            header: Some(header),
            reason: "partition table CRC mismatch",
        });
    }

    let entry_size = header.entry_size.get() as usize;
    let mut entries = Vec::new();
    for (index, slot) in table.chunks_exact(entry_size).enumerate() {
        let e = GptEntry::read_from_bytes(&slot[..GPT_ENTRY_SIZE])
            .map_err(|_| PartError::Invalid("GPT: invalid entry"))?;
        if e.is_unused() {
            continue;
        }
        if e.last_lba.get() < e.first_lba.get() {
            return Ok(CopyState::Damaged {
                header: Some(header),
                reason: "partition ends before it starts",
            });
        }
        entries.push((index as u32, e));
    }

    Ok(CopyState::Valid(GptTable {
        copy,
        header,
        entries,
    }))
}

/// Last addressable LBA of the device, where UEFI places the backup header.
fn last_lba<IO: RimIO + ?Sized>(io: &mut IO, sector_size: u64) -> PartResult<u64> {
    (io.size()? / sector_size)
        .checked_sub(1)
        .ok_or(PartError::Corrupt("GPT: device too small for a backup header"))
}

/// Reads the GPT, preferring the primary copy at LBA 1.
///
/// If the primary header or its table fails verification, the backup pair
/// is read instead. The primary header's `backup_lba` is tried first
/// whenever that header carries the signature, even with a bad checksum;
/// the last LBA of the device is tried after it (or alone). A backup that
/// cannot be read counts as damaged. No usable backup is `Corrupt`.
pub fn read_gpt<IO: RimIO + ?Sized>(io: &mut IO, sector_size: u64) -> PartResult<GptTable> {
    let (header, reason) =
        match read_copy(io, GPT_PRIMARY_HEADER_LBA, sector_size, GptCopy::Primary)? {
            CopyState::Valid(table) => return Ok(table),
            CopyState::Damaged { header, reason } => (header, reason),
        };
    log::warn!("GPT: primary copy unusable ({reason})");

    let mut candidates = Vec::with_capacity(2);
    if let Some(lba) = header
        .map(|h| h.backup_lba.get())
        .filter(|&lba| lba > GPT_PRIMARY_HEADER_LBA)
    {
        candidates.push(lba);
    }
    match last_lba(io, sector_size) {
        Ok(lba) if !candidates.contains(&lba) => candidates.push(lba),
        Ok(_) => {}
        Err(e) => log::debug!("GPT: no last-LBA backup location ({e})"),
    }

    for lba in candidates {
        log::warn!("GPT: trying backup at LBA {lba}");
        match read_copy(io, lba, sector_size, GptCopy::Backup) {
            Ok(CopyState::Valid(table)) => return Ok(table),
            Ok(CopyState::Damaged { reason, .. }) => {
                log::warn!("GPT: backup copy at LBA {lba} unusable ({reason})")
            }
            Err(e) => log::warn!("GPT: backup copy at LBA {lba} unreadable ({e})"),
        }
    }

    Err(PartError::Corrupt(
        "GPT: primary and backup copies both failed verification",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::GptImage;
    use crate::guids::{GPT_PARTITION_TYPE_ESP, GPT_PARTITION_TYPE_LINUX};

    const TOTAL: u64 = 20_480; // 10 MiB at 512-byte sectors

    fn sample() -> GptImage {
        GptImage::new(TOTAL, 512)
            .partition(0, GPT_PARTITION_TYPE_ESP, [1; 16], 2048, 4095, "EFI-SYSTEM")
            .partition(1, GPT_PARTITION_TYPE_LINUX, [2; 16], 4096, 10_000, "rootfs")
    }

    #[test]
    fn reads_primary_copy() {
        let img = sample().build();
        let mut io = MemRimIO::new(&img);

        let table = read_gpt(&mut io, 512).unwrap();
        assert_eq!(table.copy, GptCopy::Primary);
        assert_eq!(table.entries.len(), 2);

        let parts = table.partitions(512).unwrap();
        assert_eq!(parts[0].number, 1);
        assert_eq!(parts[0].start, 2048 * 512);
        assert_eq!(parts[0].length, (4095 - 2048) * 512);
        assert_eq!(parts[0].name(), "EFI-SYSTEM");
        assert_eq!(parts[1].number, 2);
        assert_eq!(parts[1].name(), "rootfs");
    }

    #[test]
    fn header_corruption_falls_back_to_backup() {
        let gpt = sample();
        let mut img = gpt.build();
        // `reserved` sits at bytes 20..24 of the header, inside the CRC range.
        img[gpt.primary_header_offset() as usize + 20] ^= 0xFF;
        let mut io = MemRimIO::new(&img);

        let table = read_gpt(&mut io, 512).unwrap();
        assert_eq!(table.copy, GptCopy::Backup);
        assert_eq!(table.partitions(512).unwrap().len(), 2);
    }

    #[test]
    fn both_headers_corrupt_is_fatal() {
        let gpt = sample();
        let mut img = gpt.build();
        img[gpt.primary_header_offset() as usize + 20] ^= 0xFF;
        img[gpt.backup_header_offset() as usize + 20] ^= 0xFF;
        let mut io = MemRimIO::new(&img);

        let err = read_gpt(&mut io, 512).unwrap_err();
        assert!(err.is_corrupt());
    }

    #[test]
    fn table_corruption_falls_back_to_backup() {
        let gpt = sample();
        let mut img = gpt.build();
        // Name byte of the first primary entry.
        img[gpt.primary_entries_offset() as usize + 56] ^= 0x01;
        let mut io = MemRimIO::new(&img);

        let table = read_gpt(&mut io, 512).unwrap();
        assert_eq!(table.copy, GptCopy::Backup);
        assert_eq!(table.entries[0].1.name_string(), "EFI-SYSTEM");
    }

    #[test]
    fn backup_table_corruption_is_fatal_after_primary_fails() {
        let gpt = sample();
        let mut img = gpt.build();
        img[gpt.primary_entries_offset() as usize + 56] ^= 0x01;
        img[gpt.backup_entries_offset() as usize + 56] ^= 0x01;
        let mut io = MemRimIO::new(&img);

        assert!(read_gpt(&mut io, 512).unwrap_err().is_corrupt());
    }

    #[test]
    fn wiped_primary_uses_last_lba() {
        let gpt = sample();
        let mut img = gpt.build();
        let off = gpt.primary_header_offset() as usize;
        img[off..off + 512].fill(0);
        let mut io = MemRimIO::new(&img);

        let table = read_gpt(&mut io, 512).unwrap();
        assert_eq!(table.copy, GptCopy::Backup);
        assert_eq!(table.header.current_lba.get(), TOTAL - 1);
    }

    #[test]
    fn damaged_backup_lba_falls_back_to_last_lba() {
        let gpt = sample();
        let mut img = gpt.build();
        // `backup_lba` (bytes 32..40) now points past the device; the
        // header CRC breaks with it.
        let off = gpt.primary_header_offset() as usize + 32;
        img[off..off + 8].copy_from_slice(&1_000_000u64.to_le_bytes());
        let mut io = MemRimIO::new(&img);

        let table = read_gpt(&mut io, 512).unwrap();
        assert_eq!(table.copy, GptCopy::Backup);
        assert_eq!(table.header.current_lba.get(), TOTAL - 1);
        assert_eq!(table.partitions(512).unwrap().len(), 2);
    }

    #[test]
    fn damaged_backup_lba_and_backup_is_corrupt() {
        let gpt = sample();
        let mut img = gpt.build();
        let off = gpt.primary_header_offset() as usize + 32;
        img[off..off + 8].copy_from_slice(&1_000_000u64.to_le_bytes());
        img[gpt.backup_header_offset() as usize + 20] ^= 0xFF;
        let mut io = MemRimIO::new(&img);

        assert!(read_gpt(&mut io, 512).unwrap_err().is_corrupt());
    }

    #[test]
    fn header_crc_needs_a_full_header() {
        let img = sample().build();
        let hdr = &img[512..1024];
        assert!(GptHeader::compute_crc32(hdr, 92).is_some());
        assert_eq!(GptHeader::compute_crc32(&hdr[..60], 92), None);
        assert_eq!(GptHeader::compute_crc32(hdr, 16), None);
        assert_eq!(GptHeader::compute_crc32(hdr, 513), None);
    }

    #[test]
    fn zero_type_guid_is_never_emitted() {
        let img = GptImage::new(TOTAL, 512)
            .partition(0, [0; 16], [9; 16], 2048, 4095, "ghost")
            .partition(1, GPT_PARTITION_TYPE_LINUX, [2; 16], 4096, 8191, "data")
            .build();
        let mut io = MemRimIO::new(&img);

        let parts = read_gpt(&mut io, 512).unwrap().partitions(512).unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].number, 2);
    }

    #[test]
    fn honours_larger_entry_size() {
        let img = sample().entry_size(256).build();
        let mut io = MemRimIO::new(&img);

        let table = read_gpt(&mut io, 512).unwrap();
        assert_eq!(table.header.entry_size.get(), 256);
        assert_eq!(table.entries[1].1.name_string(), "rootfs");
    }

    #[test]
    fn reversed_extent_is_corrupt() {
        let img = GptImage::new(TOTAL, 512)
            .partition(0, GPT_PARTITION_TYPE_LINUX, [2; 16], 8000, 4000, "backwards")
            .build();
        let mut io = MemRimIO::new(&img);

        assert!(read_gpt(&mut io, 512).unwrap_err().is_corrupt());
    }

    #[test]
    fn four_k_sectors() {
        let img = GptImage::new(2_560, 4096)
            .partition(0, GPT_PARTITION_TYPE_LINUX, [3; 16], 256, 2_047, "big")
            .build();
        let mut io = MemRimIO::new(&img);

        let parts = read_gpt(&mut io, 4096).unwrap().partitions(4096).unwrap();
        assert_eq!(parts[0].start, 256 * 4096);
        assert_eq!(parts[0].length, (2_047 - 256) * 4096);
    }

    #[test]
    fn name_round_trip_stops_at_nul() {
        let e = GptEntry::new([1; 16], [2; 16], 34, 100, 0, "héllo");
        assert_eq!(e.name_string(), "héllo");
        assert!(!e.is_unused());
    }
}
