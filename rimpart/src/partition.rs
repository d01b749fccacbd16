// SPDX-License-Identifier: MIT

use alloc::string::String;

use crate::guids::GptPartitionKind;

/// One partition as the kernel will see it.
///
/// `number` is the 1-based slot the decoder assigned; `start` and `length`
/// are byte quantities, already converted from sectors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub number: u32,
    pub start: u64,
    pub length: u64,
    pub source: PartitionSource,
}

/// Table-specific details kept for reporting. The kernel only needs
/// `number`, `start` and `length`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartitionSource {
    Mbr {
        part_type: u8,
        /// Absolute first sector on the device.
        first_sector: u64,
        sectors: u64,
        /// Extended container (0x05/0x0F) rather than a data partition.
        extended: bool,
    },
    Gpt {
        kind: GptPartitionKind,
        unique_guid: [u8; 16],
        first_lba: u64,
        /// Inclusive, as stored on disk.
        last_lba: u64,
        attributes: u64,
        name: String,
    },
}

impl Partition {
    /// First LBA and inclusive last LBA as recorded in the table.
    pub fn lba_range(&self) -> (u64, u64) {
        match &self.source {
            PartitionSource::Mbr {
                first_sector,
                sectors,
                ..
            } => (*first_sector, first_sector + sectors.saturating_sub(1)),
            PartitionSource::Gpt {
                first_lba,
                last_lba,
                ..
            } => (*first_lba, *last_lba),
        }
    }

    pub fn is_extended(&self) -> bool {
        matches!(
            self.source,
            PartitionSource::Mbr { extended: true, .. }
        )
    }

    pub fn name(&self) -> &str {
        match &self.source {
            PartitionSource::Mbr { .. } => "",
            PartitionSource::Gpt { name, .. } => name,
        }
    }
}
