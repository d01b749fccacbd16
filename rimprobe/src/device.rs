// SPDX-License-Identifier: MIT

use std::fs::File;
use std::os::unix::io::AsRawFd;
use std::sync::Once;

use libc::c_int;
use rimpart::DEFAULT_SECTOR_SIZE;

static SECTOR_SIZE_WARNING: Once = Once::new();

/// Logical sector size of `file`.
///
/// Never fails: when the query is refused (regular files, odd drivers) or
/// returns something unusable, 512 is assumed and a warning is printed once
/// per process.
pub fn sector_size(file: &File) -> u64 {
    let mut size: c_int = 0;
    let queried = unsafe { ioctl::blksszget(file.as_raw_fd(), &mut size) };
    match queried {
        Ok(_) => match validate(size) {
            Some(ss) => {
                log::debug!("logical sector size: {ss}");
                ss
            }
            None => fallback(&format!("device reported sector size {size}")),
        },
        Err(errno) => fallback(&errno.to_string()),
    }
}

fn validate(size: c_int) -> Option<u64> {
    let size = u64::try_from(size).ok()?;
    (size >= DEFAULT_SECTOR_SIZE && size.is_power_of_two()).then_some(size)
}

fn fallback(reason: &str) -> u64 {
    SECTOR_SIZE_WARNING.call_once(|| {
        log::warn!("cannot query sector size ({reason}), assuming {DEFAULT_SECTOR_SIZE} bytes");
    });
    DEFAULT_SECTOR_SIZE
}

#[allow(clippy::missing_safety_doc)]
mod ioctl {
    use super::c_int;
    use nix::{ioctl_read_bad, request_code_none};
    ioctl_read_bad!(blksszget, request_code_none!(0x12, 104), c_int);
}
