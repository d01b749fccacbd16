// SPDX-License-Identifier: MIT

#[macro_export]
/// Defines a set of GPT partition types, along with associated constants and an enum for partition kinds.
///
/// This macro generates:
/// - A constant `[u8; 16]` for each partition type GUID (on-disk, mixed-endian byte order).
/// - An enum `GptPartitionKind` representing all defined partition types and an `Unknown` variant for unrecognized GUIDs.
/// - A `Display` implementation for `GptPartitionKind`.
///
/// # Example
/// ```rust
/// use rimpart::define_partition_types;
///
/// define_partition_types! {
///     EFI => "EFI System Partition", [0x28, 0x73, 0x2A, 0xC1, 0x1F, 0xF8, 0xD2, 0x11, 0xBA, 0x4B, 0x00, 0xA0, 0xC9, 0x3E, 0xC9, 0x3B],
/// }
/// ```
///
/// # Generated Items
/// For each partition type:
/// - `pub const GPT_PARTITION_TYPE_<NAME>: [u8; 16]`
///
/// # Note
/// Identifier concatenation goes through the `paste` crate re-exported by `rimpart`.
macro_rules! define_partition_types {
    (
        $(
            $name:ident => $desc:expr, $guid:expr
        ),+ $(,)?
    ) => {
        $crate::paste::paste! {
            $(
                #[doc = $desc]
                pub const [<GPT_PARTITION_TYPE_ $name:upper>]: [u8; 16] = $guid;
            )+

            #[allow(non_camel_case_types)]
            #[derive(Debug, Clone, PartialEq, Eq)]
            pub enum GptPartitionKind {
                $($name,)+
                Unknown([u8; 16]),
            }

            impl GptPartitionKind {
                pub fn from_guid(guid: &[u8; 16]) -> Self {
                    match guid {
                        $(g if g == &[<GPT_PARTITION_TYPE_ $name:upper>] => Self::$name,)+
                        other => Self::Unknown(*other),
                    }
                }

                pub fn as_guid(&self) -> &[u8; 16] {
                    match self {
                        $(Self::$name => &[<GPT_PARTITION_TYPE_ $name:upper>],)+
                        Self::Unknown(guid) => guid,
                    }
                }
            }

            impl core::fmt::Display for GptPartitionKind {
                fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                    match self {
                        $(Self::$name => write!(f, $desc),)+
                        Self::Unknown(guid) => write!(f, "{}", $crate::guids::GuidFmt(guid)),
                    }
                }
            }
        }
    };
}
