// SPDX-License-Identifier: MIT

/// Implements little-endian `read_<ty>_at` helpers for primitive types on RimIO.
#[macro_export]
macro_rules! rimio_impl_primitive_read {
    ($($ty:ty),+ $(,)?) => {
        $(
            paste::paste! {
                #[doc = concat!("Reads a little-endian `", stringify!($ty), "` at `offset`.")]
                #[inline(always)]
                fn [<read_ $ty _at>](&mut self, offset: u64) -> $crate::errors::RimIOResult<$ty> {
                    let mut buf = [0u8; core::mem::size_of::<$ty>()];
                    self.read_at(offset, &mut buf)?;
                    Ok(<$ty>::from_le_bytes(buf))
                }
            }
        )+
    };
}
