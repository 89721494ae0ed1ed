//! Planner: walks input trees, stats every entry, assigns archive offsets,
//! and detects hard links via a (device, inode) link table.

use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use walkdir::WalkDir;

use crate::error::PtarError;
use crate::model::{Entry, Kind, LinkTable, WorkItem};

/// `2^33`: entries whose size reaches this are rejected, not handled.
pub const MAX_SIZE: u64 = 1 << 33;
/// `100` bytes: v7 tar name/link-target field width.
pub const MAX_NAME_LEN: usize = 100;

/// Walks `roots` depth-first and returns one [`WorkItem`] per visited entry,
/// in emission order, with offsets assigned contiguously starting at 0.
pub fn plan(roots: &[PathBuf]) -> Result<Vec<WorkItem>> {
    let mut items = Vec::new();
    let mut link_table: LinkTable = LinkTable::new();
    let mut current_offset: u64 = 0;

    for root in roots {
        let meta = fs::symlink_metadata(root)
            .with_context(|| PtarError::StatFailed(root.clone()))?;

        if meta.is_dir() {
            for dir_entry in WalkDir::new(root).follow_links(false).into_iter() {
                let dir_entry = dir_entry.with_context(|| PtarError::StatFailed(root.clone()))?;
                visit(dir_entry.path(), &mut link_table, &mut current_offset, &mut items)?;
            }
        } else {
            visit(root, &mut link_table, &mut current_offset, &mut items)?;
        }
    }

    Ok(items)
}

fn visit(
    path: &Path,
    link_table: &mut LinkTable,
    current_offset: &mut u64,
    items: &mut Vec<WorkItem>,
) -> Result<()> {
    let meta = fs::symlink_metadata(path)
        .with_context(|| PtarError::StatFailed(path.to_path_buf()))?;
    let file_type = meta.file_type();

    let stored_name = stored_name_for(path, file_type.is_dir());
    if stored_name.as_bytes().len() > MAX_NAME_LEN {
        bail!(PtarError::NameTooLong(path.to_path_buf()));
    }

    let offset = *current_offset;
    let mode = meta.mode() & 0o777;
    let uid = meta.uid();
    let gid = meta.gid();
    let mtime = meta.mtime().max(0) as u64;

    let (kind, size, link_target, source_path) = if file_type.is_symlink() {
        let target = fs::read_link(path)
            .with_context(|| PtarError::StatFailed(path.to_path_buf()))?;
        let target = target.to_string_lossy().to_string();
        if target.as_bytes().len() > MAX_NAME_LEN {
            bail!(PtarError::LinkTooLong(path.to_path_buf()));
        }
        (Kind::SymbolicLink, 0, Some(target), path.to_path_buf())
    } else if file_type.is_dir() {
        (Kind::Directory, 0, None, path.to_path_buf())
    } else if file_type.is_file() {
        let key = (meta.dev(), meta.ino());
        if let Some(first_path) = link_table.get(&key) {
            (Kind::HardLink, 0, Some(first_path.clone()), path.to_path_buf())
        } else {
            let size = meta.len();
            if size >= MAX_SIZE {
                bail!(PtarError::SizeOverflow(path.to_path_buf()));
            }
            link_table.insert(key, stored_name.clone());
            (Kind::Regular, size, None, path.to_path_buf())
        }
    } else {
        bail!(
            "unsupported file type (device/fifo/socket), not handled: {:?}",
            path
        );
    };

    let entry = Entry {
        path: stored_name,
        mode,
        uid,
        gid,
        mtime,
        size,
        kind,
        link_target,
        offset,
    };

    *current_offset += entry.span();
    items.push(WorkItem { source_path, entry });
    Ok(())
}

fn stored_name_for(path: &Path, is_dir: bool) -> String {
    let mut s = path.to_string_lossy().to_string();
    if is_dir && !s.ends_with('/') {
        s.push('/');
    }
    s
}
