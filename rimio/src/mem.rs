// SPDX-License-Identifier: MIT

use crate::{RimIO, RimIOError, RimIOResult};

/// In-memory implementation of `RimIO`.
///
/// Useful for tests and synthetic disk images.
#[derive(Debug)]
pub struct MemRimIO<'a> {
    buffer: &'a [u8],
}

impl<'a> MemRimIO<'a> {
    #[inline]
    pub fn new(buffer: &'a [u8]) -> Self {
        Self { buffer }
    }

    #[inline]
    fn check_bounds(&self, offset: u64, len: usize) -> RimIOResult<usize> {
        let end = offset
            .checked_add(len as u64)
            .ok_or(RimIOError::OutOfBounds)?;
        if end > self.buffer.len() as u64 {
            return Err(RimIOError::OutOfBounds);
        }
        Ok(offset as usize)
    }
}

impl<'a> RimIO for MemRimIO<'a> {
    #[inline(always)]
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> RimIOResult {
        let start = self.check_bounds(offset, buf.len())?;
        buf.copy_from_slice(&self.buffer[start..start + buf.len()]);
        Ok(())
    }

    #[inline]
    fn size(&mut self) -> RimIOResult<u64> {
        Ok(self.buffer.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_inside_and_past_the_end() {
        let data = [1u8, 2, 3, 4];
        let mut io = MemRimIO::new(&data);

        let mut buf = [0u8; 2];
        io.read_at(2, &mut buf).unwrap();
        assert_eq!(buf, [3, 4]);

        assert!(matches!(
            io.read_at(3, &mut buf),
            Err(RimIOError::OutOfBounds)
        ));
        assert!(matches!(
            io.read_at(u64::MAX, &mut buf),
            Err(RimIOError::OutOfBounds)
        ));
    }
}
