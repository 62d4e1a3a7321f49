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

//! Filesystem operations.
//!
//! [`SimpleFs`] implements the whole operation surface handed to the VFS
//! adapter. Every operation resolves its path from the root inode, performs
//! its block reads and writes, and returns. Operations run one at a time;
//! an I/O error aborts the operation where it stands, without rollback.

use crate::BLOCK_SIZE;
use crate::INODE_PTR_COUNT;
use crate::MAX_NAME_LEN;
use crate::ROOT_INODE;
use crate::bitmap::Bitmap;
use crate::device::BlockDevice;
use crate::dirent::DirBlock;
use crate::error::FsError;
use crate::error::Result;
use crate::inode::Inode;
use crate::path;
use crate::superblock::Superblock;
use crate::util::get_timestamp;

/// The credentials a creating operation runs with.
///
/// The VFS adapter fills them from the calling process; new inodes are
/// owned by these ids.
#[derive(Clone, Copy, Debug)]
pub struct Creds {
    /// User ID.
    pub uid: u16,
    /// Group ID.
    pub gid: u16,
}

/// File attributes, as reported to the VFS adapter.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Stat {
    /// The block number of the file's inode.
    pub ino: u32,
    /// File type and permissions.
    pub mode: u32,
    /// Owner user ID.
    pub uid: u16,
    /// Owner group ID.
    pub gid: u16,
    /// Number of hard links, always `1`.
    pub nlink: u32,
    /// The size of the content in bytes.
    pub size: u32,
    /// Timestamp of the inode's creation.
    pub ctime: u32,
    /// Timestamp of the last modification of the content. The format keeps
    /// no separate access timestamp, so this value stands for both.
    pub mtime: u32,
    /// Preferred I/O size.
    pub blksize: u32,
}

/// Timestamps passed to [`SimpleFs::utime`].
#[derive(Clone, Copy, Debug)]
pub struct Utimbuf {
    /// Access timestamp. Not stored by the format.
    pub actime: u32,
    /// Modification timestamp.
    pub modtime: u32,
}

/// Filesystem statistics.
#[derive(Clone, Copy, Debug, Default)]
pub struct Statfs {
    /// The size of a block in bytes.
    pub f_bsize: u32,
    /// Fragment size, equal to the block size.
    pub f_frsize: u32,
    /// Number of data blocks: the disk minus the superblock and the bitmap.
    pub f_blocks: u32,
    /// Number of free blocks.
    pub f_bfree: u32,
    /// Number of free blocks available to unprivileged users.
    pub f_bavail: u32,
    /// Maximum length of a file name.
    pub f_namemax: u32,
}

/// An instance of the filesystem over a block device.
///
/// The superblock and the free-space bitmap are the only state kept in
/// memory across operations; inodes and directory blocks are re-read on
/// demand.
pub struct SimpleFs<D: BlockDevice> {
    /// The backing device.
    pub(crate) dev: D,
    /// The filesystem's superblock.
    pub(crate) sp: Superblock,
    /// In-memory copy of the free-space bitmap.
    pub(crate) bitmap: Bitmap,
    /// Cached copy of the root inode. The authoritative copy is re-read
    /// from block 2 by path resolution.
    pub(crate) root: Inode,
}

impl<D: BlockDevice> SimpleFs<D> {
    /// Loads the filesystem from `dev`.
    ///
    /// Reads the superblock, the free-space bitmap and the root inode into
    /// memory.
    pub fn load(mut dev: D) -> Result<Self> {
        let sp = Superblock::load(&mut dev)?;
        let bitmap = Bitmap::load(&mut dev, sp.disk_size)?;
        let root = Inode::load(&mut dev, ROOT_INODE)?;
        if !root.is_directory() {
            return Err(FsError::InvalidArgument);
        }
        Ok(Self {
            dev,
            sp,
            bitmap,
            root,
        })
    }

    /// Returns the filesystem's superblock.
    pub fn superblock(&self) -> &Superblock {
        &self.sp
    }

    /// Releases the filesystem, returning the underlying device.
    pub fn into_device(self) -> D {
        self.dev
    }

    /// The current timestamp, in seconds.
    fn now() -> u32 {
        get_timestamp().as_secs() as u32
    }

    /// Follows `name` in the directory whose inode is block `inum`.
    fn lookup(&mut self, inum: u32, name: &[u8]) -> Result<u32> {
        let inode = Inode::load(&mut self.dev, inum)?;
        if !inode.is_directory() {
            return Err(FsError::NotDirectory);
        }
        let dir = DirBlock::load(&mut self.dev, inode.ptrs[0])?;
        let slot = dir.find(name).ok_or(FsError::NoEntry)?;
        Ok(dir.entries[slot].inode())
    }

    /// Resolves a component list to an inode block number, walking from the
    /// root. An empty list resolves to the root itself.
    fn resolve_components(&mut self, comps: &[&[u8]]) -> Result<u32> {
        let mut inum = self.sp.root_inode;
        for comp in comps {
            inum = self.lookup(inum, comp)?;
        }
        Ok(inum)
    }

    /// Resolves `path` to the block number of its inode.
    fn resolve(&mut self, path: &str) -> Result<u32> {
        let comps = path::components(path);
        self.resolve_components(&comps)
    }

    /// Resolves the parent directory of `path`.
    ///
    /// Returns the parent's inode block number along with the path's last
    /// component. Fails with `InvalidArgument` when the path has no
    /// component, and with `NotDirectory` when the parent exists but is not
    /// a directory.
    fn resolve_parent<'p>(&mut self, path: &'p str) -> Result<(u32, &'p [u8])> {
        let comps = path::components(path);
        let Some((&name, parents)) = comps.split_last() else {
            return Err(FsError::InvalidArgument);
        };
        let inum = self.resolve_components(parents)?;
        let inode = Inode::load(&mut self.dev, inum)?;
        if !inode.is_directory() {
            return Err(FsError::NotDirectory);
        }
        Ok((inum, name))
    }

    /// Returns the attributes of the inode stored in block `inum`.
    fn stat_of(&mut self, inum: u32) -> Result<Stat> {
        let inode = Inode::load(&mut self.dev, inum)?;
        Ok(Stat {
            ino: inum,
            mode: inode.mode,
            uid: inode.uid,
            gid: inode.gid,
            nlink: 1,
            size: inode.size,
            ctime: inode.ctime,
            mtime: inode.mtime,
            blksize: BLOCK_SIZE as u32,
        })
    }

    /// Returns the attributes of the file at `path`.
    pub fn getattr(&mut self, path: &str) -> Result<Stat> {
        let inum = self.resolve(path)?;
        self.stat_of(inum)
    }

    /// Enumerates the directory at `path`.
    ///
    /// `f` is called for `"."` with the directory's own attributes, for
    /// `".."` without attributes, then once per live entry with the child's
    /// attributes, obtained by resolving the composed child path.
    pub fn readdir(&mut self, path: &str, mut f: impl FnMut(&[u8], Option<&Stat>)) -> Result<()> {
        let comps = path::components(path);
        let inum = self.resolve_components(&comps)?;
        let inode = Inode::load(&mut self.dev, inum)?;
        if !inode.is_directory() {
            return Err(FsError::NotDirectory);
        }
        let dir = DirBlock::load(&mut self.dev, inode.ptrs[0])?;
        let stat = self.stat_of(inum)?;
        f(b".", Some(&stat));
        f(b"..", None);
        for ent in dir.iter_valid() {
            let mut child = comps.clone();
            child.push(ent.name());
            let child_inum = self.resolve_components(&child)?;
            let stat = self.stat_of(child_inum)?;
            f(ent.name(), Some(&stat));
        }
        Ok(())
    }

    /// Creates a regular file at `path`, owned by `creds`.
    ///
    /// `mode` carries the `S_IFREG` type bits along with the permissions.
    pub fn create(&mut self, path: &str, mode: u32, creds: Creds) -> Result<()> {
        self.create_entry(path, mode, creds, false)
    }

    /// Creates a directory at `path`, owned by `creds`.
    ///
    /// `mode` carries permission bits only.
    pub fn mkdir(&mut self, path: &str, mode: u32, creds: Creds) -> Result<()> {
        self.create_entry(path, mode | libc::S_IFDIR, creds, true)
    }

    fn create_entry(&mut self, path: &str, mode: u32, creds: Creds, dir: bool) -> Result<()> {
        let (parent, name) = self.resolve_parent(path)?;
        let parent_inode = Inode::load(&mut self.dev, parent)?;
        let mut entries = DirBlock::load(&mut self.dev, parent_inode.ptrs[0])?;
        if entries.find(name).is_some() {
            return Err(FsError::AlreadyExists);
        }
        let Some(slot) = entries.first_free() else {
            return Err(FsError::NoSpace);
        };
        let inum = self.bitmap.alloc().ok_or(FsError::NoSpace)?;
        let mut inode = Inode::new(mode, creds.uid, creds.gid, Self::now());
        if dir {
            let Some(content) = self.bitmap.alloc() else {
                self.bitmap.free(inum);
                return Err(FsError::NoSpace);
            };
            inode.ptrs[0] = content;
            DirBlock::empty().store(&mut self.dev, content)?;
        }
        inode.store(&mut self.dev, inum)?;
        entries.entries[slot].fill(inum, name);
        entries.store(&mut self.dev, parent_inode.ptrs[0])?;
        self.bitmap.flush(&mut self.dev)?;
        Ok(())
    }

    /// Removes the regular file at `path`.
    pub fn unlink(&mut self, path: &str) -> Result<()> {
        self.remove_entry(path, false)
    }

    /// Removes the directory at `path`, which must be empty.
    pub fn rmdir(&mut self, path: &str) -> Result<()> {
        self.remove_entry(path, true)
    }

    fn remove_entry(&mut self, path: &str, dir: bool) -> Result<()> {
        let (parent, name) = self.resolve_parent(path)?;
        let parent_inode = Inode::load(&mut self.dev, parent)?;
        let mut entries = DirBlock::load(&mut self.dev, parent_inode.ptrs[0])?;
        let Some(slot) = entries.find(name) else {
            return Err(FsError::NoEntry);
        };
        let inum = entries.entries[slot].inode();
        let inode = Inode::load(&mut self.dev, inum)?;
        if dir {
            if !inode.is_directory() {
                return Err(FsError::NotDirectory);
            }
            let content = DirBlock::load(&mut self.dev, inode.ptrs[0])?;
            if !content.is_empty() {
                return Err(FsError::NotEmpty);
            }
        } else if inode.is_directory() {
            return Err(FsError::IsDirectory);
        }
        // Free the content blocks, then the inode's own block. The freed
        // inode block keeps its stale pointers; nothing references it
        // anymore.
        for ptr in inode.ptrs.iter().filter(|ptr| **ptr != 0) {
            self.bitmap.free(*ptr);
        }
        self.bitmap.free(inum);
        entries.entries[slot].invalidate();
        entries.store(&mut self.dev, parent_inode.ptrs[0])?;
        self.bitmap.flush(&mut self.dev)?;
        Ok(())
    }

    /// Renames an entry inside its directory.
    ///
    /// `src` and `dst` must have the same number of components and resolve
    /// to the same parent directory; this filesystem cannot move an entry
    /// across directories. The entry's inode is untouched, only the name in
    /// the parent's slot changes.
    pub fn rename(&mut self, src: &str, dst: &str) -> Result<()> {
        let src_comps = path::components(src);
        let dst_comps = path::components(dst);
        if src_comps.len() != dst_comps.len() {
            return Err(FsError::InvalidArgument);
        }
        let Some((&src_name, src_parents)) = src_comps.split_last() else {
            return Err(FsError::InvalidArgument);
        };
        // cannot fail: both lists have the same length
        let (&dst_name, dst_parents) = dst_comps.split_last().unwrap();
        let src_parent = self.resolve_components(src_parents)?;
        let dst_parent = self.resolve_components(dst_parents)?;
        if src_parent != dst_parent {
            return Err(FsError::InvalidArgument);
        }
        let mut parent_inode = Inode::load(&mut self.dev, src_parent)?;
        if !parent_inode.is_directory() {
            return Err(FsError::NotDirectory);
        }
        let mut entries = DirBlock::load(&mut self.dev, parent_inode.ptrs[0])?;
        let Some(slot) = entries.find(src_name) else {
            return Err(FsError::NoEntry);
        };
        if entries.find(dst_name).is_some() {
            return Err(FsError::AlreadyExists);
        }
        let inum = entries.entries[slot].inode();
        entries.entries[slot].fill(inum, dst_name);
        entries.store(&mut self.dev, parent_inode.ptrs[0])?;
        parent_inode.mtime = Self::now();
        parent_inode.store(&mut self.dev, src_parent)?;
        Ok(())
    }

    /// Reads up to `buf.len()` bytes at `offset` from the file at `path`.
    ///
    /// Returns the number of bytes copied; `0` when `offset` is at or past
    /// the end of the file.
    pub fn read(&mut self, path: &str, buf: &mut [u8], offset: u64) -> Result<usize> {
        let inum = self.resolve(path)?;
        let mut inode = Inode::load(&mut self.dev, inum)?;
        if inode.is_directory() {
            return Err(FsError::IsDirectory);
        }
        let size = inode.size as u64;
        if offset >= size {
            return Ok(0);
        }
        let to_read = buf.len().min((size - offset) as usize);
        let mut done = 0;
        let mut off = offset;
        let mut block = [0; BLOCK_SIZE];
        while done < to_read {
            let index = (off / BLOCK_SIZE as u64) as usize;
            let in_block = (off % BLOCK_SIZE as u64) as usize;
            if index >= INODE_PTR_COUNT {
                break;
            }
            let ptr = inode.ptrs[index];
            if ptr == 0 {
                break;
            }
            self.dev.read_blocks(ptr, &mut block)?;
            let len = (BLOCK_SIZE - in_block).min(to_read - done);
            buf[done..(done + len)].copy_from_slice(&block[in_block..(in_block + len)]);
            done += len;
            off += len as u64;
        }
        // The format keeps no access timestamp; the modification one stands
        // for it.
        inode.mtime = Self::now();
        inode.store(&mut self.dev, inum)?;
        Ok(done)
    }

    /// Writes `buf` at `offset` into the file at `path`.
    ///
    /// `offset` must not be past the end of the file: the format cannot
    /// represent holes. Appending exactly at the end is legal. Returns the
    /// number of bytes written; a short count means the disk or the inode's
    /// pointer array ran out.
    pub fn write(&mut self, path: &str, buf: &[u8], offset: u64) -> Result<usize> {
        let inum = self.resolve(path)?;
        let mut inode = Inode::load(&mut self.dev, inum)?;
        if inode.is_directory() {
            return Err(FsError::IsDirectory);
        }
        if offset > inode.size as u64 {
            return Err(FsError::InvalidArgument);
        }
        let mut done = 0;
        let mut off = offset;
        let mut block = [0; BLOCK_SIZE];
        while done < buf.len() {
            let index = (off / BLOCK_SIZE as u64) as usize;
            let in_block = (off % BLOCK_SIZE as u64) as usize;
            if index >= INODE_PTR_COUNT {
                break;
            }
            if inode.ptrs[index] == 0 {
                let Some(new) = self.bitmap.alloc() else {
                    break;
                };
                inode.ptrs[index] = new;
                block.fill(0);
            } else {
                self.dev.read_blocks(inode.ptrs[index], &mut block)?;
            }
            let len = (BLOCK_SIZE - in_block).min(buf.len() - done);
            block[in_block..(in_block + len)].copy_from_slice(&buf[done..(done + len)]);
            self.dev.write_blocks(inode.ptrs[index], &block)?;
            done += len;
            off += len as u64;
        }
        if off > inode.size as u64 {
            inode.size = off as u32;
        }
        inode.mtime = Self::now();
        inode.store(&mut self.dev, inum)?;
        self.bitmap.flush(&mut self.dev)?;
        Ok(done)
    }

    /// Truncates the file at `path` to zero length, releasing its blocks.
    ///
    /// The format cannot drop blocks from the middle of a file, so any
    /// other length is rejected.
    pub fn truncate(&mut self, path: &str, len: u64) -> Result<()> {
        if len != 0 {
            return Err(FsError::InvalidArgument);
        }
        let inum = self.resolve(path)?;
        let mut inode = Inode::load(&mut self.dev, inum)?;
        if inode.is_directory() {
            return Err(FsError::IsDirectory);
        }
        for ptr in inode.ptrs.iter_mut() {
            if *ptr != 0 {
                self.bitmap.free(*ptr);
                *ptr = 0;
            }
        }
        inode.size = 0;
        inode.mtime = Self::now();
        inode.store(&mut self.dev, inum)?;
        self.bitmap.flush(&mut self.dev)?;
        Ok(())
    }

    /// Replaces the permission bits of the file at `path`, keeping the type
    /// bits.
    pub fn chmod(&mut self, path: &str, mode: u32) -> Result<()> {
        let inum = self.resolve(path)?;
        let mut inode = Inode::load(&mut self.dev, inum)?;
        inode.mode = (mode & !libc::S_IFMT) | (inode.mode & libc::S_IFMT);
        inode.mtime = Self::now();
        inode.store(&mut self.dev, inum)?;
        Ok(())
    }

    /// Sets the modification timestamp of the file at `path`.
    pub fn utime(&mut self, path: &str, times: Utimbuf) -> Result<()> {
        let inum = self.resolve(path)?;
        let mut inode = Inode::load(&mut self.dev, inum)?;
        inode.mtime = times.modtime;
        inode.store(&mut self.dev, inum)?;
        Ok(())
    }

    /// Returns statistics for the filesystem holding `path`.
    ///
    /// The superblock and the bitmap are not counted as data blocks.
    pub fn statfs(&self, _path: &str) -> Statfs {
        let free = self.bitmap.count_free(2, self.sp.disk_size);
        Statfs {
            f_bsize: BLOCK_SIZE as u32,
            f_frsize: BLOCK_SIZE as u32,
            f_blocks: self.sp.disk_size - 2,
            f_bfree: free,
            f_bavail: free,
            f_namemax: MAX_NAME_LEN as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::RamDisk;
    use crate::format::format;

    const CREDS: Creds = Creds {
        uid: 500,
        gid: 500,
    };

    fn new_fs(blocks: u32) -> SimpleFs<RamDisk> {
        let mut dev = RamDisk::new(blocks);
        format(&mut dev, blocks, [0; 16]).unwrap();
        SimpleFs::load(dev).unwrap()
    }

    #[test]
    fn root_attributes() {
        let mut fs = new_fs(64);
        let stat = fs.getattr("/").unwrap();
        assert_eq!(stat.ino, ROOT_INODE);
        assert_eq!(stat.mode, libc::S_IFDIR | 0o755);
        assert_eq!(stat.nlink, 1);
        assert_eq!(stat.size, 0);
        assert_eq!(stat.blksize, BLOCK_SIZE as u32);
    }

    #[test]
    fn mkdir_getattr_readdir() {
        let mut fs = new_fs(64);
        fs.mkdir("/d", 0o755, CREDS).unwrap();
        let stat = fs.getattr("/d").unwrap();
        assert_eq!(stat.mode, libc::S_IFDIR | 0o755);
        assert_eq!(stat.uid, 500);
        assert_eq!(stat.gid, 500);
        let mut names = Vec::new();
        fs.readdir("/d", |name, _| names.push(name.to_vec()))
            .unwrap();
        assert_eq!(names, [b".".to_vec(), b"..".to_vec()]);
    }

    #[test]
    fn create_write_read() {
        let mut fs = new_fs(64);
        fs.mkdir("/d", 0o755, CREDS).unwrap();
        fs.create("/d/f", libc::S_IFREG | 0o644, CREDS).unwrap();
        assert_eq!(fs.write("/d/f", b"hello", 0).unwrap(), 5);
        let mut buf = [0; 5];
        assert_eq!(fs.read("/d/f", &mut buf, 0).unwrap(), 5);
        assert_eq!(&buf, b"hello");
        let stat = fs.getattr("/d/f").unwrap();
        assert_eq!(stat.mode, libc::S_IFREG | 0o644);
        assert_eq!(stat.size, 5);
    }

    #[test]
    fn create_existing() {
        let mut fs = new_fs(64);
        fs.create("/a", libc::S_IFREG | 0o666, CREDS).unwrap();
        let err = fs.create("/a", libc::S_IFREG | 0o666, CREDS).unwrap_err();
        assert!(matches!(err, FsError::AlreadyExists));
        assert_eq!(err.errno(), -libc::EEXIST);
        let err = fs.mkdir("/a", 0o755, CREDS).unwrap_err();
        assert!(matches!(err, FsError::AlreadyExists));
    }

    #[test]
    fn rmdir_not_empty() {
        let mut fs = new_fs(64);
        fs.mkdir("/d", 0o755, CREDS).unwrap();
        fs.create("/d/x", libc::S_IFREG | 0o644, CREDS).unwrap();
        let err = fs.rmdir("/d").unwrap_err();
        assert!(matches!(err, FsError::NotEmpty));
        assert_eq!(err.errno(), -libc::ENOTEMPTY);
        fs.unlink("/d/x").unwrap();
        fs.rmdir("/d").unwrap();
        assert!(matches!(fs.getattr("/d"), Err(FsError::NoEntry)));
    }

    #[test]
    fn multiblock_write_read() {
        let mut fs = new_fs(64);
        fs.create("/f", libc::S_IFREG | 0o644, CREDS).unwrap();
        let pattern: Vec<u8> = (0..(BLOCK_SIZE * 2 + 500)).map(|i| (i % 251) as u8).collect();
        assert_eq!(fs.write("/f", &pattern, 0).unwrap(), pattern.len());
        assert_eq!(fs.getattr("/f").unwrap().size as usize, pattern.len());
        let mut buf = vec![0; BLOCK_SIZE];
        assert_eq!(
            fs.read("/f", &mut buf, BLOCK_SIZE as u64).unwrap(),
            BLOCK_SIZE
        );
        assert_eq!(buf, pattern[BLOCK_SIZE..(BLOCK_SIZE * 2)]);
        // tail, shorter than the request
        let mut buf = vec![0; BLOCK_SIZE];
        assert_eq!(
            fs.read("/f", &mut buf, (BLOCK_SIZE * 2) as u64).unwrap(),
            500
        );
        assert_eq!(buf[..500], pattern[(BLOCK_SIZE * 2)..]);
    }

    #[test]
    fn read_past_end() {
        let mut fs = new_fs(64);
        fs.create("/f", libc::S_IFREG | 0o644, CREDS).unwrap();
        fs.write("/f", b"abc", 0).unwrap();
        let mut buf = [0; 8];
        assert_eq!(fs.read("/f", &mut buf, 3).unwrap(), 0);
        assert_eq!(fs.read("/f", &mut buf, 1000).unwrap(), 0);
        assert_eq!(fs.read("/f", &mut buf, 1).unwrap(), 2);
        assert_eq!(&buf[..2], b"bc");
    }

    #[test]
    fn rename_same_directory() {
        let mut fs = new_fs(64);
        fs.create("/f", libc::S_IFREG | 0o640, CREDS).unwrap();
        fs.write("/f", b"payload", 0).unwrap();
        let before = fs.getattr("/f").unwrap();
        fs.rename("/f", "/g").unwrap();
        assert!(matches!(fs.getattr("/f"), Err(FsError::NoEntry)));
        let after = fs.getattr("/g").unwrap();
        assert_eq!(after.ino, before.ino);
        assert_eq!(after.mode, before.mode);
        assert_eq!(after.uid, before.uid);
        assert_eq!(after.gid, before.gid);
        assert_eq!(after.size, before.size);
        let mut buf = [0; 7];
        assert_eq!(fs.read("/g", &mut buf, 0).unwrap(), 7);
        assert_eq!(&buf, b"payload");
    }

    #[test]
    fn rename_across_directories() {
        let mut fs = new_fs(64);
        fs.mkdir("/d", 0o755, CREDS).unwrap();
        fs.mkdir("/e", 0o755, CREDS).unwrap();
        fs.create("/a", libc::S_IFREG | 0o644, CREDS).unwrap();
        fs.create("/d/x", libc::S_IFREG | 0o644, CREDS).unwrap();
        // different depths
        let err = fs.rename("/a", "/d/b").unwrap_err();
        assert!(matches!(err, FsError::InvalidArgument));
        assert_eq!(err.errno(), -libc::EINVAL);
        // same depth, different parents
        assert!(matches!(
            fs.rename("/d/x", "/e/x"),
            Err(FsError::InvalidArgument)
        ));
    }

    #[test]
    fn rename_errors() {
        let mut fs = new_fs(64);
        fs.create("/a", libc::S_IFREG | 0o644, CREDS).unwrap();
        fs.create("/b", libc::S_IFREG | 0o644, CREDS).unwrap();
        assert!(matches!(fs.rename("/nope", "/c"), Err(FsError::NoEntry)));
        assert!(matches!(
            fs.rename("/a", "/b"),
            Err(FsError::AlreadyExists)
        ));
        assert!(matches!(fs.rename("/", "/"), Err(FsError::InvalidArgument)));
    }

    #[test]
    fn rename_directory() {
        let mut fs = new_fs(64);
        fs.mkdir("/d", 0o755, CREDS).unwrap();
        fs.create("/d/f", libc::S_IFREG | 0o644, CREDS).unwrap();
        fs.rename("/d", "/renamed").unwrap();
        assert!(matches!(fs.getattr("/d/f"), Err(FsError::NoEntry)));
        assert_eq!(fs.getattr("/renamed/f").unwrap().size, 0);
    }

    #[test]
    fn truncate_to_zero_only() {
        let mut fs = new_fs(64);
        fs.create("/f", libc::S_IFREG | 0o644, CREDS).unwrap();
        fs.write("/f", &vec![7; BLOCK_SIZE + 100], 0).unwrap();
        let free = fs.statfs("/").f_bfree;
        let err = fs.truncate("/f", 10).unwrap_err();
        assert!(matches!(err, FsError::InvalidArgument));
        fs.truncate("/f", 0).unwrap();
        assert_eq!(fs.getattr("/f").unwrap().size, 0);
        assert_eq!(fs.statfs("/").f_bfree, free + 2);
        let mut buf = [0; 4];
        assert_eq!(fs.read("/f", &mut buf, 0).unwrap(), 0);
    }

    #[test]
    fn unlink_restores_bitmap() {
        let mut fs = new_fs(64);
        let free = fs.statfs("/").f_bfree;
        fs.create("/f", libc::S_IFREG | 0o644, CREDS).unwrap();
        fs.write("/f", &vec![1; BLOCK_SIZE * 2 + 1], 0).unwrap();
        assert_eq!(fs.statfs("/").f_bfree, free - 4);
        fs.unlink("/f").unwrap();
        assert_eq!(fs.statfs("/").f_bfree, free);
        assert!(matches!(fs.unlink("/f"), Err(FsError::NoEntry)));
    }

    #[test]
    fn write_holes_rejected() {
        let mut fs = new_fs(64);
        fs.create("/f", libc::S_IFREG | 0o644, CREDS).unwrap();
        assert!(matches!(
            fs.write("/f", b"x", 1),
            Err(FsError::InvalidArgument)
        ));
        assert_eq!(fs.write("/f", b"abc", 0).unwrap(), 3);
        // appending exactly at the end is legal
        assert_eq!(fs.write("/f", b"def", 3).unwrap(), 3);
        assert!(matches!(
            fs.write("/f", b"x", 7),
            Err(FsError::InvalidArgument)
        ));
        let mut buf = [0; 6];
        assert_eq!(fs.read("/f", &mut buf, 0).unwrap(), 6);
        assert_eq!(&buf, b"abcdef");
    }

    #[test]
    fn overwrite_keeps_size() {
        let mut fs = new_fs(64);
        fs.create("/f", libc::S_IFREG | 0o644, CREDS).unwrap();
        fs.write("/f", b"0123456789", 0).unwrap();
        assert_eq!(fs.write("/f", b"abcd", 2).unwrap(), 4);
        assert_eq!(fs.getattr("/f").unwrap().size, 10);
        let mut buf = [0; 10];
        fs.read("/f", &mut buf, 0).unwrap();
        assert_eq!(&buf, b"01abcd6789");
    }

    #[test]
    fn type_errors() {
        let mut fs = new_fs(64);
        fs.mkdir("/d", 0o755, CREDS).unwrap();
        fs.create("/f", libc::S_IFREG | 0o644, CREDS).unwrap();
        let mut buf = [0; 4];
        assert!(matches!(
            fs.read("/d", &mut buf, 0),
            Err(FsError::IsDirectory)
        ));
        assert!(matches!(
            fs.write("/d", b"x", 0),
            Err(FsError::IsDirectory)
        ));
        assert!(matches!(fs.truncate("/d", 0), Err(FsError::IsDirectory)));
        assert!(matches!(fs.unlink("/d"), Err(FsError::IsDirectory)));
        assert!(matches!(fs.rmdir("/f"), Err(FsError::NotDirectory)));
        assert!(matches!(
            fs.readdir("/f", |_, _| {}),
            Err(FsError::NotDirectory)
        ));
        // a file used as an intermediate component
        assert!(matches!(fs.getattr("/f/x"), Err(FsError::NotDirectory)));
        assert!(matches!(
            fs.create("/f/x", libc::S_IFREG | 0o644, CREDS),
            Err(FsError::NotDirectory)
        ));
    }

    #[test]
    fn missing_paths() {
        let mut fs = new_fs(64);
        let err = fs.getattr("/nope").unwrap_err();
        assert!(matches!(err, FsError::NoEntry));
        assert_eq!(err.errno(), -libc::ENOENT);
        assert!(matches!(
            fs.create("/nope/f", libc::S_IFREG | 0o644, CREDS),
            Err(FsError::NoEntry)
        ));
        assert!(matches!(fs.rmdir("/nope"), Err(FsError::NoEntry)));
    }

    #[test]
    fn root_operations_rejected() {
        let mut fs = new_fs(64);
        assert!(matches!(
            fs.create("/", libc::S_IFREG | 0o644, CREDS),
            Err(FsError::InvalidArgument)
        ));
        assert!(matches!(fs.unlink("/"), Err(FsError::InvalidArgument)));
        assert!(matches!(fs.rmdir("/"), Err(FsError::InvalidArgument)));
        assert!(matches!(fs.truncate("/", 0), Err(FsError::IsDirectory)));
    }

    #[test]
    fn path_normalization() {
        let mut fs = new_fs(64);
        fs.mkdir("/d", 0o755, CREDS).unwrap();
        fs.create("/d/f", libc::S_IFREG | 0o644, CREDS).unwrap();
        assert!(fs.getattr("//d").is_ok());
        assert!(fs.getattr("/d/").is_ok());
        assert!(fs.getattr("//d///f/").is_ok());
        assert_eq!(
            fs.getattr("d/f").unwrap().ino,
            fs.getattr("/d/f").unwrap().ino
        );
    }

    #[test]
    fn long_names_truncated() {
        let mut fs = new_fs(64);
        let long = "/this-name-is-way-longer-than-the-limit";
        fs.create(long, libc::S_IFREG | 0o644, CREDS).unwrap();
        // lookups through the truncated and the full name find the same file
        let truncated = "/this-name-is-way-longer-tha";
        assert!(fs.getattr(truncated).is_ok());
        assert_eq!(fs.getattr(long).unwrap().ino, fs.getattr(truncated).unwrap().ino);
        let mut names = Vec::new();
        fs.readdir("/", |name, _| names.push(name.to_vec())).unwrap();
        assert!(names.contains(&truncated.as_bytes()[1..].to_vec()));
    }

    #[test]
    fn first_fit_placement() {
        let mut fs = new_fs(64);
        // the lowest free block follows the root directory's content block
        fs.create("/a", libc::S_IFREG | 0o644, CREDS).unwrap();
        assert_eq!(fs.getattr("/a").unwrap().ino, 4);
        fs.create("/b", libc::S_IFREG | 0o644, CREDS).unwrap();
        assert_eq!(fs.getattr("/b").unwrap().ino, 5);
        fs.unlink("/a").unwrap();
        fs.create("/c", libc::S_IFREG | 0o644, CREDS).unwrap();
        assert_eq!(fs.getattr("/c").unwrap().ino, 4);
    }

    #[test]
    fn directory_slots_exhausted() {
        let mut fs = new_fs(256);
        for i in 0..crate::DIRENTS_PER_BLOCK {
            fs.create(&format!("/f{i}"), libc::S_IFREG | 0o644, CREDS)
                .unwrap();
        }
        let err = fs
            .create("/one-too-many", libc::S_IFREG | 0o644, CREDS)
            .unwrap_err();
        assert!(matches!(err, FsError::NoSpace));
        assert_eq!(err.errno(), -libc::ENOSPC);
        // removing one entry frees its slot
        fs.unlink("/f64").unwrap();
        fs.create("/one-more", libc::S_IFREG | 0o644, CREDS).unwrap();
    }

    #[test]
    fn disk_exhaustion_short_write() {
        let mut fs = new_fs(8);
        fs.create("/f", libc::S_IFREG | 0o644, CREDS).unwrap();
        // three data blocks left on an 8-block disk
        let buf = vec![0xab; BLOCK_SIZE * 4];
        assert_eq!(fs.write("/f", &buf, 0).unwrap(), BLOCK_SIZE * 3);
        assert_eq!(fs.statfs("/").f_bfree, 0);
        let end = (BLOCK_SIZE * 3) as u64;
        assert_eq!(fs.write("/f", &buf, end).unwrap(), 0);
        assert!(matches!(
            fs.create("/g", libc::S_IFREG | 0o644, CREDS),
            Err(FsError::NoSpace)
        ));
        fs.unlink("/f").unwrap();
        fs.create("/g", libc::S_IFREG | 0o644, CREDS).unwrap();
    }

    #[test]
    fn mkdir_without_room_for_content() {
        let mut fs = new_fs(5);
        // one free block: the directory's inode fits but its content block
        // does not
        let free = fs.statfs("/").f_bfree;
        assert_eq!(free, 1);
        assert!(matches!(
            fs.mkdir("/d", 0o755, CREDS),
            Err(FsError::NoSpace)
        ));
        // the failed attempt did not leak its inode block
        assert_eq!(fs.statfs("/").f_bfree, 1);
        fs.create("/f", libc::S_IFREG | 0o644, CREDS).unwrap();
    }

    #[test]
    fn statfs_accounting() {
        let mut fs = new_fs(64);
        let stats = fs.statfs("/");
        assert_eq!(stats.f_bsize, BLOCK_SIZE as u32);
        assert_eq!(stats.f_blocks, 62);
        assert_eq!(stats.f_namemax, MAX_NAME_LEN as u32);
        // blocks 2 and 3 hold the root directory
        assert_eq!(stats.f_bfree, 60);
        fs.mkdir("/d", 0o755, CREDS).unwrap();
        assert_eq!(fs.statfs("/").f_bfree, 58);
        fs.create("/d/f", libc::S_IFREG | 0o644, CREDS).unwrap();
        fs.write("/d/f", b"x", 0).unwrap();
        assert_eq!(fs.statfs("/").f_bfree, 56);
        fs.unlink("/d/f").unwrap();
        fs.rmdir("/d").unwrap();
        assert_eq!(fs.statfs("/").f_bfree, 60);
    }

    #[test]
    fn chmod_keeps_type() {
        let mut fs = new_fs(64);
        fs.create("/f", libc::S_IFREG | 0o644, CREDS).unwrap();
        fs.chmod("/f", 0o600).unwrap();
        assert_eq!(fs.getattr("/f").unwrap().mode, libc::S_IFREG | 0o600);
        // type bits in the argument are discarded
        fs.chmod("/f", libc::S_IFDIR | 0o700).unwrap();
        assert_eq!(fs.getattr("/f").unwrap().mode, libc::S_IFREG | 0o700);
        fs.mkdir("/d", 0o755, CREDS).unwrap();
        fs.chmod("/d", 0o500).unwrap();
        assert_eq!(fs.getattr("/d").unwrap().mode, libc::S_IFDIR | 0o500);
    }

    #[test]
    fn utime_sets_mtime() {
        let mut fs = new_fs(64);
        fs.create("/f", libc::S_IFREG | 0o644, CREDS).unwrap();
        let times = Utimbuf {
            actime: 111,
            modtime: 222,
        };
        fs.utime("/f", times).unwrap();
        assert_eq!(fs.getattr("/f").unwrap().mtime, 222);
    }

    #[test]
    fn read_touches_mtime() {
        let mut fs = new_fs(64);
        fs.create("/f", libc::S_IFREG | 0o644, CREDS).unwrap();
        fs.write("/f", b"abc", 0).unwrap();
        let times = Utimbuf {
            actime: 1,
            modtime: 1,
        };
        fs.utime("/f", times).unwrap();
        let mut buf = [0; 3];
        fs.read("/f", &mut buf, 0).unwrap();
        assert!(fs.getattr("/f").unwrap().mtime > 1);
    }

    #[test]
    fn readdir_reports_children() {
        let mut fs = new_fs(64);
        fs.create("/a", libc::S_IFREG | 0o644, CREDS).unwrap();
        fs.mkdir("/d", 0o755, CREDS).unwrap();
        fs.create("/d/inner", libc::S_IFREG | 0o600, CREDS).unwrap();
        let mut entries = Vec::new();
        fs.readdir("/", |name, stat| {
            entries.push((name.to_vec(), stat.copied()));
        })
        .unwrap();
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[0].0, b".");
        assert_eq!(entries[0].1.unwrap().ino, ROOT_INODE);
        assert_eq!(entries[1].0, b"..");
        assert!(entries[1].1.is_none());
        let a = entries.iter().find(|(n, _)| n == b"a").unwrap();
        assert_eq!(a.1.unwrap().mode, libc::S_IFREG | 0o644);
        let d = entries.iter().find(|(n, _)| n == b"d").unwrap();
        assert_eq!(d.1.unwrap().mode, libc::S_IFDIR | 0o755);
        let mut inner = Vec::new();
        fs.readdir("/d", |name, _| inner.push(name.to_vec())).unwrap();
        assert_eq!(inner, [b".".to_vec(), b"..".to_vec(), b"inner".to_vec()]);
    }

    #[test]
    fn deep_paths_alias_their_prefix() {
        let mut fs = new_fs(64);
        let mut path = String::new();
        for i in 0..crate::MAX_PATH_DEPTH {
            path.push_str(&format!("/d{i}"));
            fs.mkdir(&path, 0o755, CREDS).unwrap();
        }
        // an eleventh component is dropped by path parsing, so the path
        // collides with its ten-component prefix
        let too_deep = format!("{path}/f");
        assert!(matches!(
            fs.create(&too_deep, libc::S_IFREG | 0o644, CREDS),
            Err(FsError::AlreadyExists)
        ));
        assert_eq!(fs.getattr(&too_deep).unwrap().ino, fs.getattr(&path).unwrap().ino);
    }

    #[test]
    fn write_read_full_file() {
        let mut fs = new_fs(64);
        fs.create("/f", libc::S_IFREG | 0o644, CREDS).unwrap();
        let n = BLOCK_SIZE * 3 + 123;
        let data: Vec<u8> = (0..n).map(|i| (i * 7 % 256) as u8).collect();
        assert_eq!(fs.write("/f", &data, 0).unwrap(), n);
        let mut out = vec![0; n];
        assert_eq!(fs.read("/f", &mut out, 0).unwrap(), n);
        assert_eq!(out, data);
    }
}
