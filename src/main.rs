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

//! Main of the `sfs` tools. The binary dispatches on the name it is invoked
//! through, so `mkfs.sfs` and `fsck.sfs` can be links to the same
//! executable.

mod fsck;
mod mkfs;

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::process::exit;

/// Writes an error to stderr, then exits.
pub fn error<M: fmt::Display>(bin: &str, msg: M) -> ! {
    eprintln!("{bin}: error: {msg}");
    exit(1);
}

fn main() {
    let mut args = env::args_os();
    let bin = args
        .next()
        .map(PathBuf::from)
        .and_then(|p| {
            p.file_name()
                .and_then(|name| name.to_str())
                .map(str::to_owned)
        })
        .unwrap_or_else(|| {
            error("sfs", "missing binary name");
        });
    match bin.as_str() {
        "mkfs" | "mkfs.sfs" => mkfs::main(args),
        "fsck" | "fsck.sfs" => fsck::main(args),
        // invoked directly: the first argument selects the command
        "sfs" => match args.next().as_ref().and_then(|s| s.to_str()) {
            Some("mkfs") => mkfs::main(args),
            Some("fsck") => fsck::main(args),
            _ => error("sfs", "usage: sfs <mkfs|fsck> [options] <image>"),
        },
        _ => error("sfs", "invalid binary name"),
    }
}
