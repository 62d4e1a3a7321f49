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

//! Filesystem creation.

use crate::BITMAP_LBA;
use crate::BLOCK_SIZE;
use crate::MAX_BLOCKS;
use crate::ROOT_INODE;
use crate::SUPERBLOCK_LBA;
use crate::bitmap::Bitmap;
use crate::device::BlockDevice;
use crate::dirent::DirBlock;
use crate::error::FsError;
use crate::error::Result;
use crate::inode::Inode;
use crate::superblock::SFS_MAGIC;
use crate::superblock::Superblock;
use crate::util::get_timestamp;
use std::io;

/// The block holding the root directory's content on a fresh image.
const ROOT_CONTENT_LBA: u32 = 3;

/// Writes a fresh, empty filesystem spanning `blocks` blocks onto `dev`.
///
/// `blocks` must leave room for the reserved blocks and the root directory
/// and fit what a one-block bitmap can cover. `volume_id` is stamped into
/// the superblock.
pub fn format(dev: &mut impl BlockDevice, blocks: u32, volume_id: [u8; 16]) -> Result<()> {
    if blocks < 4 || blocks > MAX_BLOCKS {
        return Err(FsError::InvalidArgument);
    }
    let mut bitmap = Bitmap::new(blocks);
    bitmap.set(SUPERBLOCK_LBA);
    bitmap.set(BITMAP_LBA);
    bitmap.set(ROOT_INODE);
    bitmap.set(ROOT_CONTENT_LBA);
    let ts = get_timestamp().as_secs() as u32;
    let mut root = Inode::new(libc::S_IFDIR | 0o755, 0, 0, ts);
    root.ptrs[0] = ROOT_CONTENT_LBA;
    Superblock::new(blocks, volume_id).store(dev)?;
    bitmap.flush(dev)?;
    root.store(dev, ROOT_INODE)?;
    DirBlock::empty().store(dev, ROOT_CONTENT_LBA)?;
    Ok(())
}

/// Tells whether `dev` already carries a filesystem signature.
pub fn is_present(dev: &mut impl BlockDevice) -> io::Result<bool> {
    let mut block = [0; BLOCK_SIZE];
    dev.read_blocks(SUPERBLOCK_LBA, &mut block)?;
    let magic = u32::from_le_bytes([block[0], block[1], block[2], block[3]]);
    Ok(magic == SFS_MAGIC)
}
