/*
 * Copyright 2025 Luc Lenôtre
 *
 * This file is part of Maestro.
 *
 * Maestro is free software: you can redistribute it and/or modify it under the
 * terms of the GNU General Public License as published by the Free Software
 * Foundation, either version 3 of the License, or (at your option) any later
 * version.
 *
 * Maestro is distributed in the hope that it will be useful, but WITHOUT ANY
 * WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR
 * A PARTICULAR PURPOSE. See the GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License along with
 * Maestro. If not, see <https://www.gnu.org/licenses/>.
 */

//! Block device access.
//!
//! All disk access goes through [`BlockDevice`], in whole blocks addressed
//! by LBA. A transfer either completes or reports an I/O error; the
//! filesystem performs no buffering on top.

use crate::BLOCK_SIZE;
use std::fs::File;
use std::io;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::io::Write;

/// Access to a disk in whole 4 KiB blocks.
///
/// `buf` must be a multiple of [`BLOCK_SIZE`] in length; the transfer covers
/// `buf.len() / BLOCK_SIZE` consecutive blocks starting at `lba`.
pub trait BlockDevice {
    /// Fills `buf` from consecutive blocks starting at `lba`.
    fn read_blocks(&mut self, lba: u32, buf: &mut [u8]) -> io::Result<()>;

    /// Persists `buf` to consecutive blocks starting at `lba`.
    fn write_blocks(&mut self, lba: u32, buf: &[u8]) -> io::Result<()>;
}

/// A block device backed by a disk image file.
pub struct FileDev {
    /// The image file.
    file: File,
}

impl FileDev {
    /// Creates a device over the given image file.
    pub fn new(file: File) -> Self {
        Self {
            file,
        }
    }
}

impl BlockDevice for FileDev {
    fn read_blocks(&mut self, lba: u32, buf: &mut [u8]) -> io::Result<()> {
        debug_assert_eq!(buf.len() % BLOCK_SIZE, 0);
        self.file
            .seek(SeekFrom::Start(lba as u64 * BLOCK_SIZE as u64))?;
        self.file.read_exact(buf)
    }

    fn write_blocks(&mut self, lba: u32, buf: &[u8]) -> io::Result<()> {
        debug_assert_eq!(buf.len() % BLOCK_SIZE, 0);
        self.file
            .seek(SeekFrom::Start(lba as u64 * BLOCK_SIZE as u64))?;
        self.file.write_all(buf)
    }
}

/// A block device held in memory, for tests and tooling.
pub struct RamDisk {
    /// The disk's content.
    data: Vec<u8>,
}

impl RamDisk {
    /// Creates a zeroed disk of `blocks` blocks.
    pub fn new(blocks: u32) -> Self {
        Self {
            data: vec![0; blocks as usize * BLOCK_SIZE],
        }
    }

    /// Checks that the transfer at `lba` of `len` bytes stays on the disk.
    fn check_range(&self, lba: u32, len: usize) -> io::Result<usize> {
        let off = lba as usize * BLOCK_SIZE;
        if off + len > self.data.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "block out of range",
            ));
        }
        Ok(off)
    }
}

impl BlockDevice for RamDisk {
    fn read_blocks(&mut self, lba: u32, buf: &mut [u8]) -> io::Result<()> {
        debug_assert_eq!(buf.len() % BLOCK_SIZE, 0);
        let off = self.check_range(lba, buf.len())?;
        buf.copy_from_slice(&self.data[off..(off + buf.len())]);
        Ok(())
    }

    fn write_blocks(&mut self, lba: u32, buf: &[u8]) -> io::Result<()> {
        debug_assert_eq!(buf.len() % BLOCK_SIZE, 0);
        let off = self.check_range(lba, buf.len())?;
        self.data[off..(off + buf.len())].copy_from_slice(buf);
        Ok(())
    }
}
