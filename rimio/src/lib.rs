// SPDX-License-Identifier: MIT
#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "alloc")]
extern crate alloc;

// Core modules
pub mod errors;
#[macro_use]
mod macros;

// Backend modules
#[cfg(feature = "mem")]
mod mem;

#[cfg(feature = "std")]
mod std;

// Prelude re-exports (central entrypoint)
pub mod prelude {
    pub use super::RimIO;
    pub use super::RimIOExt;
    pub use super::RimIOStructExt;
    pub use super::errors::*;

    #[cfg(feature = "mem")]
    pub use super::mem::MemRimIO;

    #[cfg(feature = "std")]
    pub use super::std::StdRimIO;
}

// Internal use
use errors::*;

// Constants

/// Largest struct `read_struct` decodes through its stack buffer.
/// 4 KiB covers any logical sector a GPT header can live in.
pub const BLOCK_BUF_SIZE: usize = 4096;

// Traits

/// Read-only byte-range access to a device or image.
///
/// Every read is absolute from the start of the device and either fills
/// the whole buffer or fails. There is no retry.
pub trait RimIO {
    /// Reads exactly `buf.len()` bytes into `buf` from `offset` (absolute).
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> RimIOResult;

    /// Total length of the device in bytes.
    fn size(&mut self) -> RimIOResult<u64>;
}

/// Extension helpers for RimIO.
pub trait RimIOExt: RimIO {
    /// Reads `buf.len()` bytes from `offset` in chunks of `chunk_size` or less.
    #[inline(always)]
    fn read_in_chunks(&mut self, offset: u64, buf: &mut [u8], chunk_size: usize) -> RimIOResult {
        if chunk_size == 0 {
            return Err(RimIOError::Other("read_in_chunks: zero chunk size"));
        }
        let mut off = offset;
        for chunk in buf.chunks_mut(chunk_size) {
            self.read_at(off, chunk)?;
            off = off
                .checked_add(chunk.len() as u64)
                .ok_or(RimIOError::OutOfBounds)?;
        }
        Ok(())
    }

    /// Reads `len` bytes at `offset` into a freshly allocated buffer.
    #[cfg(feature = "alloc")]
    fn read_vec_at(&mut self, offset: u64, len: usize) -> RimIOResult<alloc::vec::Vec<u8>> {
        let mut buf = alloc::vec![0u8; len];
        self.read_in_chunks(offset, &mut buf, BLOCK_BUF_SIZE)?;
        Ok(buf)
    }

    // Implements read helpers for primitive types (u16, u32)
    rimio_impl_primitive_read!(u16, u32);
}

impl<T: RimIO + ?Sized> RimIOExt for T {}

/// Extension trait for reading structs using zerocopy.
///
/// Requires the struct to implement zerocopy traits for safe conversion.
/// Field endianness is whatever the struct declares (e.g. `zerocopy::little_endian::U32`).
pub trait RimIOStructExt: RimIO {
    /// Reads a struct of type `T` from the given offset.
    fn read_struct<T: zerocopy::FromBytes + zerocopy::KnownLayout + zerocopy::Immutable>(
        &mut self,
        offset: u64,
    ) -> RimIOResult<T> {
        let size = core::mem::size_of::<T>();
        if size > BLOCK_BUF_SIZE {
            return Err(RimIOError::Other("read_struct: type too large"));
        }
        let mut buf = [0u8; BLOCK_BUF_SIZE];
        self.read_at(offset, &mut buf[..size])?;
        T::read_from_bytes(&buf[..size]).map_err(|_| RimIOError::Other("read_struct failed"))
    }
}

impl<T: RimIO + ?Sized> RimIOStructExt for T {}
