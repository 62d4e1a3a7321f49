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

//! Filesystem consistency checking.
//!
//! The checker walks the directory tree from the root and verifies that the
//! on-disk structures agree with each other: every referenced block is
//! inside the disk and marked used, directories keep their content in a
//! single block, names are unique, and a file's pointers cover exactly its
//! size. It only reads; repairing is not supported.

use crate::BLOCK_SIZE;
use crate::ROOT_INODE;
use crate::device::BlockDevice;
use crate::dirent::DirBlock;
use crate::error::Result;
use crate::fs::SimpleFs;
use crate::inode::Inode;
use std::collections::HashSet;
use std::fmt;

/// A single consistency finding.
#[derive(Debug, Eq, PartialEq)]
pub enum CheckError {
    /// The root inode is not a directory.
    RootNotDirectory,
    /// An inode's pointer leaves the disk or aims at a reserved block.
    PointerOutOfRange {
        inode: u32,
        index: usize,
        ptr: u32,
    },
    /// An inode's pointer aims at a block marked free.
    PointerNotAllocated {
        inode: u32,
        index: usize,
        ptr: u32,
    },
    /// A directory inode uses a pointer past the first.
    DirectoryExtraPointer {
        inode: u32,
        index: usize,
    },
    /// A live entry has an empty name.
    EmptyName {
        dir: u32,
    },
    /// Two live entries of the same directory share a name.
    DuplicateName {
        dir: u32,
        name: Vec<u8>,
    },
    /// A live entry's inode number leaves the disk or aims at a reserved
    /// block.
    EntryOutOfRange {
        dir: u32,
        name: Vec<u8>,
        inode: u32,
    },
    /// A live entry aims at a block marked free.
    EntryNotAllocated {
        dir: u32,
        name: Vec<u8>,
        inode: u32,
    },
    /// A file's pointers do not cover exactly its size.
    SizeMismatch {
        inode: u32,
        size: u32,
    },
    /// A block is marked used but nothing in the tree references it.
    LeakedBlock {
        block: u32,
    },
}

impl fmt::Display for CheckError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RootNotDirectory => write!(fmt, "root inode is not a directory"),
            Self::PointerOutOfRange {
                inode,
                index,
                ptr,
            } => write!(fmt, "inode {inode}: pointer {index} out of range ({ptr})"),
            Self::PointerNotAllocated {
                inode,
                index,
                ptr,
            } => write!(
                fmt,
                "inode {inode}: pointer {index} references free block {ptr}"
            ),
            Self::DirectoryExtraPointer {
                inode,
                index,
            } => write!(fmt, "directory inode {inode}: unexpected pointer {index}"),
            Self::EmptyName {
                dir,
            } => write!(fmt, "directory {dir}: entry with empty name"),
            Self::DuplicateName {
                dir,
                name,
            } => write!(
                fmt,
                "directory {dir}: duplicate name `{}`",
                String::from_utf8_lossy(name)
            ),
            Self::EntryOutOfRange {
                dir,
                name,
                inode,
            } => write!(
                fmt,
                "directory {dir}: entry `{}` out of range ({inode})",
                String::from_utf8_lossy(name)
            ),
            Self::EntryNotAllocated {
                dir,
                name,
                inode,
            } => write!(
                fmt,
                "directory {dir}: entry `{}` references free block {inode}",
                String::from_utf8_lossy(name)
            ),
            Self::SizeMismatch {
                inode,
                size,
            } => write!(
                fmt,
                "inode {inode}: pointers do not match size {size}"
            ),
            Self::LeakedBlock {
                block,
            } => write!(fmt, "block {block} is marked used but unreachable"),
        }
    }
}

/// The outcome of a consistency check.
pub struct CheckReport {
    /// Every finding, in discovery order.
    pub errors: Vec<CheckError>,
    /// The number of blocks marked used, reserved blocks included.
    pub used_blocks: u32,
}

impl CheckReport {
    /// Tells whether the filesystem is consistent.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

impl<D: BlockDevice> SimpleFs<D> {
    /// Walks the whole tree and verifies the on-disk invariants.
    ///
    /// Returns the findings; an `Err` is only reported for device failures.
    pub fn check(&mut self) -> Result<CheckReport> {
        let blocks = self.sp.disk_size;
        let used_blocks = (0..blocks).filter(|b| self.bitmap.is_set(*b)).count() as u32;
        let mut errors = Vec::new();
        if !self.root.is_directory() {
            errors.push(CheckError::RootNotDirectory);
            return Ok(CheckReport {
                errors,
                used_blocks,
            });
        }
        let mut reachable = vec![false; blocks as usize];
        reachable[0] = true;
        reachable[1] = true;
        let mut visited = vec![false; blocks as usize];
        let mut stack = vec![ROOT_INODE];
        while let Some(inum) = stack.pop() {
            if visited[inum as usize] {
                continue;
            }
            visited[inum as usize] = true;
            reachable[inum as usize] = true;
            let inode = Inode::load(&mut self.dev, inum)?;
            let dir = inode.is_directory();
            for (index, ptr) in inode.ptrs.iter().enumerate() {
                let ptr = *ptr;
                if ptr == 0 {
                    continue;
                }
                if dir && index > 0 {
                    errors.push(CheckError::DirectoryExtraPointer {
                        inode: inum,
                        index,
                    });
                }
                if ptr < 2 || ptr >= blocks {
                    errors.push(CheckError::PointerOutOfRange {
                        inode: inum,
                        index,
                        ptr,
                    });
                    continue;
                }
                reachable[ptr as usize] = true;
                if !self.bitmap.is_set(ptr) {
                    errors.push(CheckError::PointerNotAllocated {
                        inode: inum,
                        index,
                        ptr,
                    });
                }
            }
            if dir {
                let content = inode.ptrs[0];
                if content < 2 || content >= blocks {
                    // already reported above
                    continue;
                }
                let entries = DirBlock::load(&mut self.dev, content)?;
                let mut names = HashSet::new();
                for ent in entries.iter_valid() {
                    let name = ent.name();
                    if name.is_empty() {
                        errors.push(CheckError::EmptyName {
                            dir: inum,
                        });
                    } else if !names.insert(name.to_vec()) {
                        errors.push(CheckError::DuplicateName {
                            dir: inum,
                            name: name.to_vec(),
                        });
                    }
                    let child = ent.inode();
                    if child < 2 || child >= blocks {
                        errors.push(CheckError::EntryOutOfRange {
                            dir: inum,
                            name: name.to_vec(),
                            inode: child,
                        });
                        continue;
                    }
                    if !self.bitmap.is_set(child) {
                        errors.push(CheckError::EntryNotAllocated {
                            dir: inum,
                            name: name.to_vec(),
                            inode: child,
                        });
                    }
                    stack.push(child);
                }
            } else {
                let covered = (inode.size as usize).div_ceil(BLOCK_SIZE);
                let mismatch = inode
                    .ptrs
                    .iter()
                    .enumerate()
                    .any(|(index, ptr)| (index < covered) != (*ptr != 0));
                if mismatch {
                    errors.push(CheckError::SizeMismatch {
                        inode: inum,
                        size: inode.size,
                    });
                }
            }
        }
        for block in 2..blocks {
            if self.bitmap.is_set(block) && !reachable[block as usize] {
                errors.push(CheckError::LeakedBlock {
                    block,
                });
            }
        }
        Ok(CheckReport {
            errors,
            used_blocks,
        })
    }
}
