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

//! The `fsck` tool checks a filesystem image for consistency.

use crate::error;
use sfs::device::FileDev;
use sfs::fs::SimpleFs;
use std::env::ArgsOs;
use std::fs::File;
use std::path::PathBuf;
use std::process::exit;
use uuid::Uuid;

/// Structure storing command line arguments.
#[derive(Default)]
struct Args {
    /// If true, print command line help.
    help: bool,
    /// The path to the disk image.
    device_path: Option<PathBuf>,
}

fn parse_args(args: ArgsOs) -> Args {
    let mut res: Args = Default::default();
    for arg in args {
        match arg.to_str() {
            Some("-h" | "--help") => res.help = true,
            _ => {
                res.device_path = Some(PathBuf::from(arg));
            }
        }
    }
    res
}

pub fn main(args: ArgsOs) {
    let args = parse_args(args);
    if args.help {
        println!("usage: fsck.sfs <image>");
        exit(0);
    }
    let device_path = args.device_path.unwrap_or_else(|| {
        error("fsck.sfs", "specify path to a disk image");
    });
    let file = File::open(&device_path).unwrap_or_else(|e| {
        error("fsck.sfs", format_args!("{}: {e}", device_path.display()));
    });
    let mut fs = SimpleFs::load(FileDev::new(file)).unwrap_or_else(|e| {
        error("fsck.sfs", format_args!("{}: {e}", device_path.display()));
    });
    let report = fs.check().unwrap_or_else(|e| {
        error("fsck.sfs", format_args!("{}: {e}", device_path.display()));
    });
    for finding in &report.errors {
        eprintln!("{}: {finding}", device_path.display());
    }
    let sp = fs.superblock();
    let stats = fs.statfs("/");
    println!(
        "{}: volume id {}, {} blocks, {} used, {} free",
        device_path.display(),
        Uuid::from_bytes(sp.volume_id),
        sp.disk_size,
        report.used_blocks,
        stats.f_bfree
    );
    if report.is_clean() {
        println!("{}: clean", device_path.display());
    } else {
        error(
            "fsck.sfs",
            format_args!("{} error(s) found", report.errors.len()),
        );
    }
}
