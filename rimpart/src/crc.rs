// SPDX-License-Identifier: MIT

//! CRC-32 as used by GPT headers and partition arrays.
//!
//! Reflected CRC-32 with polynomial 0x04C11DB7, register preset to
//! 0xFFFFFFFF and final XOR 0xFFFFFFFF (CRC-32/ISO-HDLC). `crc32fast`
//! implements exactly this variant.

/// One-shot checksum of `bytes`.
#[inline]
pub fn crc32(bytes: &[u8]) -> u32 {
    crc32fast::hash(bytes)
}

/// Incremental checksum, for ranges that must be hashed piecewise
/// (e.g. a header with its own CRC field replaced by zeroes).
#[derive(Clone, Default)]
pub struct Crc32(crc32fast::Hasher);

impl Crc32 {
    #[inline]
    pub fn new() -> Self {
        Self(crc32fast::Hasher::new())
    }

    #[inline]
    pub fn update(&mut self, bytes: &[u8]) -> &mut Self {
        self.0.update(bytes);
        self
    }

    /// Feeds `len` zero bytes.
    pub fn update_zeroes(&mut self, len: usize) -> &mut Self {
        const ZEROES: [u8; 64] = [0u8; 64];
        let mut remaining = len;
        while remaining > 0 {
            let take = remaining.min(ZEROES.len());
            self.0.update(&ZEROES[..take]);
            remaining -= take;
        }
        self
    }

    #[inline]
    pub fn finalize(self) -> u32 {
        self.0.finalize()
    }
}
