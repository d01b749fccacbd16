// SPDX-License-Identifier: MIT

//! "LBA-aware" RimIO helpers to avoid `* sector_size` everywhere,
//! with overflow checks on the offset computation.

use rimio::errors::RimIOError;
use rimio::prelude::*;

/// Offset = LBA * sector_size (with overflow-check)
#[inline]
pub(crate) fn lba_offset(lba: u64, sector_size: u64) -> RimIOResult<u64> {
    lba.checked_mul(sector_size)
        .ok_or(RimIOError::Other("lba_offset overflow"))
}

pub trait RimIOLbaExt: RimIO {
    /// Reads `buf.len()` bytes starting from an LBA (offset = lba * sector_size).
    #[inline]
    fn read_at_lba(&mut self, lba: u64, sector_size: u64, buf: &mut [u8]) -> RimIOResult {
        let off = lba_offset(lba, sector_size)?;
        self.read_at(off, buf)
    }

    /// Reads a struct `T` starting from an LBA (size = size_of::<T>()).
    #[inline]
    fn read_struct_lba<T>(&mut self, lba: u64, sector_size: u64) -> RimIOResult<T>
    where
        T: zerocopy::FromBytes + zerocopy::KnownLayout + zerocopy::Immutable,
    {
        let off = lba_offset(lba, sector_size)?;
        self.read_struct::<T>(off)
    }
}

impl<T: RimIO + ?Sized> RimIOLbaExt for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mbr::MbrTable;
    use alloc::vec;

    #[test]
    fn lba_reads_scale_by_sector_size() {
        let mut buf = vec![0u8; 4096 * 2];
        buf[4096] = 0xEE;
        buf[4096 + 4] = 0x83;
        let mut io = MemRimIO::new(&buf);

        let mut byte = [0u8; 1];
        io.read_at_lba(1, 4096, &mut byte).unwrap();
        assert_eq!(byte, [0xEE]);

        let table: MbrTable = io.read_struct_lba(1, 4096).unwrap();
        assert_eq!(table.entries[0].part_type, 0x83);
    }

    #[test]
    fn offset_overflow_is_reported() {
        assert!(lba_offset(u64::MAX, 512).is_err());
        assert_eq!(lba_offset(34, 512).unwrap(), 34 * 512);
    }
}
