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

//! Filesystem errors.
//!
//! Every operation reports the first error it runs into and stops there;
//! a failed mutating operation may have partial effect on disk.

use std::io;
use thiserror::Error;

/// An error returned by a filesystem operation.
///
/// Each variant corresponds to one POSIX errno; the VFS adapter reports the
/// negated value returned by [`FsError::errno`].
#[derive(Debug, Error)]
pub enum FsError {
    /// A component of the path does not exist.
    #[error("no such file or directory")]
    NoEntry,
    /// A path component used as a directory is not one.
    #[error("not a directory")]
    NotDirectory,
    /// The operation's target is a directory.
    #[error("is a directory")]
    IsDirectory,
    /// The destination name is already present.
    #[error("file exists")]
    AlreadyExists,
    /// The directory to remove still has entries.
    #[error("directory not empty")]
    NotEmpty,
    /// No free block, or no free directory slot, is left.
    #[error("no space left on device")]
    NoSpace,
    /// The request cannot be represented on this filesystem.
    #[error("invalid argument")]
    InvalidArgument,
    /// The underlying block device failed.
    #[error("input/output error")]
    Io(#[from] io::Error),
}

impl FsError {
    /// Returns the error as a negative errno value.
    pub fn errno(&self) -> i32 {
        let errno = match self {
            Self::NoEntry => libc::ENOENT,
            Self::NotDirectory => libc::ENOTDIR,
            Self::IsDirectory => libc::EISDIR,
            Self::AlreadyExists => libc::EEXIST,
            Self::NotEmpty => libc::ENOTEMPTY,
            Self::NoSpace => libc::ENOSPC,
            Self::InvalidArgument => libc::EINVAL,
            Self::Io(_) => libc::EIO,
        };
        -errno
    }
}

/// Result of a filesystem operation.
pub type Result<T> = std::result::Result<T, FsError>;
