// SPDX-License-Identifier: MIT
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

#[doc(hidden)]
pub use paste;

#[macro_use]
mod macros;
mod io_ext;

/// GPT checksum (CRC-32/ISO-HDLC).
pub mod crc;
/// MBR/GPT classification from the second logical sector.
pub mod detect;
pub mod errors;
/// GUID Partition Table (GPT) reader with backup fallback.
pub mod gpt;
/// Common Partition Type GUIDs.
pub mod guids;
/// Master Boot Record (MBR) and extended partition chain walker.
pub mod mbr;
pub mod partition;
pub mod scanner;

#[cfg(any(test, feature = "builder"))]
pub mod builder;

pub use detect::{DiskType, detect_disk_type};
pub use io_ext::RimIOLbaExt;
pub use partition::{Partition, PartitionSource};
pub use scanner::{DiskLayout, GptInfo, scan_disk};

pub const DEFAULT_SECTOR_SIZE: u64 = 512;
