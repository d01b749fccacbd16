// SPDX-License-Identifier: MIT

//! Synthetic disk images for tests and benches.
//!
//! Images are laid out in memory only; nothing here touches a device.

use alloc::vec;
use alloc::vec::Vec;

use zerocopy::IntoBytes;
use zerocopy::little_endian::{U32, U64};

use crate::crc::crc32;
use crate::gpt::{
    GPT_ENTRY_SIZE, GPT_PRIMARY_HEADER_LBA, GPT_REVISION, GPT_SIGNATURE, GptEntry, GptHeader,
};
use crate::mbr::{
    MBR_SIGNATURE, MBR_SIGNATURE_OFFSET, MBR_TABLE_OFFSET, MbrEntry, PROTECTIVE_GPT,
};

/// Blank disk with MBR-style tables written at chosen sectors.
#[derive(Debug, Clone)]
pub struct MbrImage {
    data: Vec<u8>,
    sector_size: u64,
}

impl MbrImage {
    /// Zeroed image with the 0x55AA signature on sector 0.
    pub fn new(total_sectors: u64, sector_size: u64) -> Self {
        let mut img = Self {
            data: vec![0u8; (total_sectors * sector_size) as usize],
            sector_size,
        };
        img.sign(0);
        img
    }

    fn sign(&mut self, sector: u64) {
        let off = (sector * self.sector_size + MBR_SIGNATURE_OFFSET) as usize;
        self.data[off..off + 2].copy_from_slice(&MBR_SIGNATURE);
    }

    /// Writes slot `slot` of the boot record at `table_sector`.
    pub fn entry(mut self, table_sector: u64, slot: usize, part_type: u8, start: u32, sectors: u32) -> Self {
        let e = MbrEntry::new(part_type, start, sectors);
        let off = (table_sector * self.sector_size + MBR_TABLE_OFFSET) as usize + slot * 16;
        self.data[off..off + 16].copy_from_slice(e.as_bytes());
        self.sign(table_sector);
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.data
    }
}

/// Protective MBR plus primary and backup GPT copies with valid checksums.
#[derive(Debug, Clone)]
pub struct GptImage {
    total_sectors: u64,
    sector_size: u64,
    num_entries: u32,
    entry_size: u32,
    disk_guid: [u8; 16],
    slots: Vec<(usize, GptEntry)>,
}

impl GptImage {
    pub fn new(total_sectors: u64, sector_size: u64) -> Self {
        Self {
            total_sectors,
            sector_size,
            num_entries: 128,
            entry_size: GPT_ENTRY_SIZE as u32,
            disk_guid: [0xAB; 16],
            slots: Vec::new(),
        }
    }

    pub fn num_entries(mut self, n: u32) -> Self {
        self.num_entries = n;
        self
    }

    pub fn entry_size(mut self, size: u32) -> Self {
        self.entry_size = size;
        self
    }

    pub fn disk_guid(mut self, guid: [u8; 16]) -> Self {
        self.disk_guid = guid;
        self
    }

    /// Fills array slot `index` (partition number `index + 1`).
    pub fn partition(
        mut self,
        index: usize,
        type_guid: [u8; 16],
        unique_guid: [u8; 16],
        first_lba: u64,
        last_lba: u64,
        name: &str,
    ) -> Self {
        self.slots.retain(|(i, _)| *i != index);
        self.slots.push((
            index,
            GptEntry::new(type_guid, unique_guid, first_lba, last_lba, 0, name),
        ));
        self
    }

    fn table_sectors(&self) -> u64 {
        (self.num_entries as u64 * self.entry_size as u64).div_ceil(self.sector_size)
    }

    fn backup_header_lba(&self) -> u64 {
        self.total_sectors - 1
    }

    fn backup_entries_lba(&self) -> u64 {
        self.backup_header_lba() - self.table_sectors()
    }

    pub fn primary_header_offset(&self) -> u64 {
        GPT_PRIMARY_HEADER_LBA * self.sector_size
    }

    pub fn primary_entries_offset(&self) -> u64 {
        2 * self.sector_size
    }

    pub fn backup_header_offset(&self) -> u64 {
        self.backup_header_lba() * self.sector_size
    }

    pub fn backup_entries_offset(&self) -> u64 {
        self.backup_entries_lba() * self.sector_size
    }

    fn table_bytes(&self) -> Vec<u8> {
        let es = self.entry_size as usize;
        let mut table = vec![0u8; self.num_entries as usize * es];
        for (index, e) in &self.slots {
            let off = index * es;
            table[off..off + GPT_ENTRY_SIZE].copy_from_slice(e.as_bytes());
        }
        table
    }

    fn header(&self, current: u64, backup: u64, entries_lba: u64, entries_crc: u32) -> GptHeader {
        let mut h = GptHeader {
            signature: *GPT_SIGNATURE,
            revision: U32::new(GPT_REVISION),
            header_size: U32::new(92),
            header_crc32: U32::new(0),
            reserved: U32::new(0),
            current_lba: U64::new(current),
            backup_lba: U64::new(backup),
            first_usable_lba: U64::new(2 + self.table_sectors()),
            last_usable_lba: U64::new(self.backup_entries_lba() - 1),
            disk_guid: self.disk_guid,
            entries_lba: U64::new(entries_lba),
            num_entries: U32::new(self.num_entries),
            entry_size: U32::new(self.entry_size),
            entries_crc32: U32::new(entries_crc),
        };
        h.header_crc32 = U32::new(crc32(h.as_bytes()));
        h
    }

    pub fn build(&self) -> Vec<u8> {
        let ss = self.sector_size as usize;
        let mut data = vec![0u8; self.total_sectors as usize * ss];

        let pmbr = MbrEntry::new(
            PROTECTIVE_GPT,
            1,
            (self.total_sectors - 1).min(u32::MAX as u64) as u32,
        );
        let off = MBR_TABLE_OFFSET as usize;
        data[off..off + 16].copy_from_slice(pmbr.as_bytes());
        let off = MBR_SIGNATURE_OFFSET as usize;
        data[off..off + 2].copy_from_slice(&MBR_SIGNATURE);

        let table = self.table_bytes();
        let table_crc = crc32(&table);
        let backup_lba = self.backup_header_lba();
        let backup_entries = self.backup_entries_lba();

        let primary = self.header(GPT_PRIMARY_HEADER_LBA, backup_lba, 2, table_crc);
        let backup = self.header(backup_lba, GPT_PRIMARY_HEADER_LBA, backup_entries, table_crc);

        let put = |data: &mut Vec<u8>, offset: u64, bytes: &[u8]| {
            let o = offset as usize;
            data[o..o + bytes.len()].copy_from_slice(bytes);
        };
        put(&mut data, self.primary_entries_offset(), &table);
        put(&mut data, self.primary_header_offset(), primary.as_bytes());
        put(&mut data, self.backup_entries_offset(), &table);
        put(&mut data, self.backup_header_offset(), backup.as_bytes());
        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zerocopy::FromBytes;

    #[test]
    fn gpt_headers_checksum() {
        let img = GptImage::new(2048, 512).build();
        let (h, _) = GptHeader::read_from_prefix(&img[512..]).unwrap();
        assert_eq!(GptHeader::compute_crc32(&img[512..1024], 92), Some(h.header_crc32.get()));
        assert_eq!(h.backup_lba.get(), 2047);
        assert_eq!(h.first_usable_lba.get(), 34);
        assert_eq!(h.last_usable_lba.get(), 2047 - 32 - 1);
    }
}
