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

//! The `mkfs` tool creates a filesystem on a disk image.

use crate::error;
use sfs::BLOCK_SIZE;
use sfs::MAX_BLOCKS;
use sfs::device::FileDev;
use sfs::format;
use sfs::util::prompt;
use std::env::ArgsOs;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::exit;
use uuid::Uuid;

/// Structure storing command line arguments.
#[derive(Default)]
struct Args {
    /// If true, print command line help.
    help: bool,
    /// Size of the filesystem in blocks. Defaults to the image's length.
    blocks: Option<u32>,
    /// The path to the disk image.
    device_path: Option<PathBuf>,
}

fn parse_args(mut args: ArgsOs) -> Args {
    let mut res: Args = Default::default();
    while let Some(arg) = args.next() {
        match arg.to_str() {
            Some("-h" | "--help") => res.help = true,
            Some("-b" | "--blocks") => {
                let count = args
                    .next()
                    .and_then(|s| s.to_str().and_then(|s| s.parse().ok()))
                    .unwrap_or_else(|| {
                        error("mkfs.sfs", "`-b` expects a number of blocks");
                    });
                res.blocks = Some(count);
            }
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
        println!("usage: mkfs.sfs [-b blocks] <image>");
        exit(0);
    }
    let device_path = args.device_path.unwrap_or_else(|| {
        error("mkfs.sfs", "specify path to a disk image");
    });
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(&device_path)
        .unwrap_or_else(|e| {
            error("mkfs.sfs", format_args!("{}: {e}", device_path.display()));
        });
    let blocks = args.blocks.unwrap_or_else(|| {
        let len = file
            .metadata()
            .map(|metadata| metadata.len())
            .unwrap_or_else(|e| {
                error("mkfs.sfs", format_args!("{}: {e}", device_path.display()));
            });
        (len / BLOCK_SIZE as u64).min(MAX_BLOCKS as u64) as u32
    });
    let mut dev = FileDev::new(file);
    let present = format::is_present(&mut dev).unwrap_or_else(|e| {
        error("mkfs.sfs", format_args!("{}: {e}", device_path.display()));
    });
    if present {
        println!("{} already contains a filesystem", device_path.display());
        let confirm = prompt("Proceed anyway? (y/N) ")
            .map(|s| s.to_lowercase() == "y")
            .unwrap_or(false);
        if !confirm {
            eprintln!("Abort.");
            exit(1);
        }
    }
    let volume_id = *Uuid::new_v4().as_bytes();
    format::format(&mut dev, blocks, volume_id).unwrap_or_else(|e| {
        error(
            "mkfs.sfs",
            format_args!("failed to create filesystem: {e}"),
        );
    });
    println!(
        "{}: created filesystem with {blocks} blocks, volume id {}",
        device_path.display(),
        Uuid::from_bytes(volume_id)
    );
}
