// SPDX-License-Identifier: MIT

use std::fs::File;
use std::os::unix::io::AsRawFd;

use libc::{c_char, c_int, c_longlong, c_void};
use nix::errno::Errno;

use super::{KernelError, PartitionTable};

const BLKPG_ADD_PARTITION: c_int = 1;
const BLKPG_DEL_PARTITION: c_int = 2;
const BLKPG_DEVNAMELTH: usize = 64;
const BLKPG_VOLNAMELTH: usize = 64;

/// `struct blkpg_ioctl_arg` from `<linux/blkpg.h>`.
#[repr(C)]
pub struct BlkpgIoctlArg {
    op: c_int,
    flags: c_int,
    datalen: c_int,
    data: *mut c_void,
}

/// `struct blkpg_partition` from `<linux/blkpg.h>`.
#[repr(C)]
struct BlkpgPartition {
    start: c_longlong,
    length: c_longlong,
    pno: c_int,
    devname: [c_char; BLKPG_DEVNAMELTH],
    volname: [c_char; BLKPG_VOLNAMELTH],
}

impl BlkpgPartition {
    fn new(pno: c_int, start: c_longlong, length: c_longlong) -> Self {
        Self {
            start,
            length,
            pno,
            devname: [0; BLKPG_DEVNAMELTH],
            volname: [0; BLKPG_VOLNAMELTH],
        }
    }
}

/// Kernel partition map of an open block device, driven through `BLKPG`.
pub struct BlkpgTable<'a> {
    file: &'a File,
}

impl<'a> BlkpgTable<'a> {
    pub fn new(file: &'a File) -> Self {
        Self { file }
    }

    fn call(&self, op: c_int, mut part: BlkpgPartition) -> nix::Result<c_int> {
        let arg = BlkpgIoctlArg {
            op,
            flags: 0,
            datalen: size_of::<BlkpgPartition>() as c_int,
            data: (&mut part as *mut BlkpgPartition).cast(),
        };
        unsafe { ioctl::blkpg(self.file.as_raw_fd(), &arg) }
    }
}

fn to_kernel(partno: u32) -> Result<c_int, KernelError> {
    c_int::try_from(partno).map_err(|_| KernelError::OutOfRange { partno })
}

impl PartitionTable for BlkpgTable<'_> {
    fn delete_partition(&mut self, partno: u32) -> Result<(), KernelError> {
        let pno = to_kernel(partno)?;
        match self.call(BLKPG_DEL_PARTITION, BlkpgPartition::new(pno, 0, 0)) {
            Ok(_) => Ok(()),
            Err(Errno::ENXIO) => Err(KernelError::NoSuchPartition(partno)),
            Err(errno) => Err(KernelError::Rejected { partno, errno }),
        }
    }

    fn add_partition(&mut self, partno: u32, start: u64, length: u64) -> Result<(), KernelError> {
        let pno = to_kernel(partno)?;
        let start = c_longlong::try_from(start).map_err(|_| KernelError::OutOfRange { partno })?;
        let length = c_longlong::try_from(length).map_err(|_| KernelError::OutOfRange { partno })?;
        self.call(BLKPG_ADD_PARTITION, BlkpgPartition::new(pno, start, length))
            .map(|_| ())
            .map_err(|errno| KernelError::Rejected { partno, errno })
    }
}

#[allow(clippy::missing_safety_doc)]
mod ioctl {
    use super::BlkpgIoctlArg;
    use nix::{ioctl_write_ptr_bad, request_code_none};
    ioctl_write_ptr_bad!(blkpg, request_code_none!(0x12, 105), BlkpgIoctlArg);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn struct_layout_matches_linux() {
        assert_eq!(size_of::<BlkpgPartition>(), 152);
        assert_eq!(size_of::<BlkpgIoctlArg>(), 24);
    }

    #[test]
    fn regular_file_rejects_blkpg() {
        let file = tempfile::tempfile().unwrap();
        let mut table = BlkpgTable::new(&file);
        // ENOTTY on a regular file: neither a missing partition nor success.
        assert!(matches!(
            table.add_partition(1, 512, 512),
            Err(KernelError::Rejected { partno: 1, .. })
        ));
    }

    #[test]
    fn offsets_beyond_i64_are_out_of_range() {
        let file = tempfile::tempfile().unwrap();
        let mut table = BlkpgTable::new(&file);
        assert_eq!(
            table.add_partition(1, u64::MAX, 512),
            Err(KernelError::OutOfRange { partno: 1 })
        );
        assert_eq!(
            table.delete_partition(u32::MAX),
            Err(KernelError::OutOfRange { partno: u32::MAX })
        );
    }
}
