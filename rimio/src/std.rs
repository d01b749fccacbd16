// SPDX-License-Identifier: MIT

use std::io::{Read, Seek, SeekFrom};

use crate::{RimIO, RimIOResult};

/// `RimIO` over anything seekable: device special files, image files, cursors.
#[derive(Debug)]
pub struct StdRimIO<'a, T: Read + Seek> {
    io: &'a mut T,
}

impl<'a, T: Read + Seek> StdRimIO<'a, T> {
    #[inline]
    pub fn new(io: &'a mut T) -> Self {
        Self { io }
    }
}

impl<'a, T: Read + Seek> RimIO for StdRimIO<'a, T> {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> RimIOResult {
        self.io.seek(SeekFrom::Start(offset))?;
        self.io.read_exact(buf)?;
        Ok(())
    }

    fn size(&mut self) -> RimIOResult<u64> {
        // Block devices report no metadata length; seeking to the end works for both.
        let end = self.io.seek(SeekFrom::End(0))?;
        Ok(end)
    }
}
