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

//! `sfs` is a small block-addressed filesystem over a flat disk image.
//!
//! The disk is an array of 4 KiB blocks:
//! - block 0 is the superblock;
//! - block 1 is the free-space bitmap, one bit per block;
//! - block 2 is the root directory's inode;
//! - every other block is an inode, a directory block or file data,
//!   depending only on what references it.
//!
//! An inode fills a whole block: a 20-byte header followed by direct block
//! pointers. There is no indirection, so a file is at most
//! [`INODE_PTR_COUNT`] blocks long. A directory's content is a single block
//! of [`DIRENTS_PER_BLOCK`] fixed-size entries.
//!
//! Operations are synchronous and self-contained: each resolves its path
//! from the root, reads and writes the blocks it needs and returns. The
//! only state kept across operations is the superblock and the in-memory
//! copy of the bitmap, which is flushed back to block 1 by every operation
//! that allocates or frees.

pub mod bitmap;
pub mod check;
pub mod device;
pub mod dirent;
pub mod error;
pub mod format;
pub mod fs;
pub mod inode;
pub mod path;
pub mod superblock;
pub mod util;

/// The size of a block in bytes.
pub const BLOCK_SIZE: usize = 4096;
/// The maximum number of blocks on a disk. The bitmap is a single block, so
/// it cannot cover more.
pub const MAX_BLOCKS: u32 = (BLOCK_SIZE * 8) as u32;

/// LBA of the superblock.
pub const SUPERBLOCK_LBA: u32 = 0;
/// LBA of the free-space bitmap.
pub const BITMAP_LBA: u32 = 1;
/// LBA of the root directory's inode.
pub const ROOT_INODE: u32 = 2;

/// The maximum length of a file name in bytes, NUL terminator excluded.
/// Longer names are truncated.
pub const MAX_NAME_LEN: usize = 27;
/// The maximum number of components in a path. Further components are
/// ignored.
pub const MAX_PATH_DEPTH: usize = 10;
/// The number of entries in a directory block. A directory cannot hold
/// more.
pub const DIRENTS_PER_BLOCK: usize = 128;
/// The number of direct block pointers in an inode: the space left in the
/// inode's block after the header, in 32-bit words.
pub const INODE_PTR_COUNT: usize = BLOCK_SIZE / 4 - 5;
