//! Extract reader, extract worker, and link finalizer.

use std::fs::{self, File, Permissions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::thread;

use anyhow::{Context, Result};
use crossbeam_channel::{bounded, Receiver, Sender};
use filetime::FileTime;

use crate::error::PtarError;
use crate::fallback;
use crate::header;
use crate::model::{DeferredLink, Kind};
use crate::trailer;

#[derive(Debug, Clone)]
pub struct ExtractOptions {
    pub nthreads: usize,
    pub blocking_factor: usize,
    pub verbose: bool,
}

enum Message {
    Task(u64),
    Shutdown,
}

/// Opens `archive_path`, probes the trailer, and either extracts into
/// `outdir` or — when the trailer magic is absent — hands the process off
/// to the host `tar`, never returning in that case.
pub fn extract(archive_path: &Path, outdir: &Path, opts: &ExtractOptions) -> Result<()> {
    let mut probe = File::open(archive_path)
        .with_context(|| PtarError::OpenFailed(archive_path.to_path_buf()))?;
    let offsets = match trailer::read_trailer(&mut probe) {
        Ok(offsets) => offsets,
        Err(PtarError::NotAPtarArchive) => {
            return fallback::exec_host_tar(archive_path, opts.verbose);
        }
        Err(other) => return Err(other.into()),
    };
    drop(probe);

    fs::create_dir_all(outdir)
        .with_context(|| format!("creating output directory {outdir:?}"))?;

    let queue_capacity = (opts.nthreads * 4).max(1);
    let (tx, rx): (Sender<Message>, Receiver<Message>) = bounded(queue_capacity);

    let mut handles = Vec::with_capacity(opts.nthreads);
    for _ in 0..opts.nthreads {
        let rx = rx.clone();
        let archive_path = archive_path.to_path_buf();
        let outdir = outdir.to_path_buf();
        let blocking_factor = opts.blocking_factor;
        let verbose = opts.verbose;
        handles.push(thread::spawn(move || {
            extract_worker(rx, &archive_path, &outdir, blocking_factor, verbose)
        }));
    }
    drop(rx);

    for offset in offsets {
        tx.send(Message::Task(offset))
            .context("extract pool hung up while queuing tasks")?;
    }
    for _ in 0..opts.nthreads {
        tx.send(Message::Shutdown)
            .context("extract pool hung up while sending shutdown")?;
    }
    drop(tx);

    let mut deferred = Vec::new();
    for handle in handles {
        let links = handle
            .join()
            .map_err(|_| anyhow::anyhow!("extract worker thread panicked"))??;
        deferred.extend(links);
    }

    finalize_links(&deferred)
}

fn extract_worker(
    rx: Receiver<Message>,
    archive_path: &Path,
    outdir: &Path,
    blocking_factor: usize,
    verbose: bool,
) -> Result<Vec<DeferredLink>> {
    let mut archive = File::open(archive_path)
        .with_context(|| PtarError::OpenFailed(archive_path.to_path_buf()))?;
    let chunk_size = blocking_factor.max(1) * 4096;
    let mut buf = vec![0u8; chunk_size];
    let mut deferred = Vec::new();

    loop {
        match rx.recv() {
            Ok(Message::Shutdown) | Err(_) => break,
            Ok(Message::Task(offset)) => {
                if let Some(link) =
                    extract_one(&mut archive, archive_path, offset, outdir, &mut buf, verbose)?
                {
                    deferred.push(link);
                }
            }
        }
    }
    Ok(deferred)
}

fn extract_one(
    archive: &mut File,
    archive_path: &Path,
    offset: u64,
    outdir: &Path,
    buf: &mut [u8],
    verbose: bool,
) -> Result<Option<DeferredLink>> {
    archive
        .seek(SeekFrom::Start(offset))
        .with_context(|| PtarError::SeekFailed(archive_path.to_path_buf()))?;
    let mut header_buf = [0u8; header::HEADER_SIZE];
    archive
        .read_exact(&mut header_buf)
        .with_context(|| PtarError::ReadFailed(archive_path.to_path_buf()))?;
    let entry = header::decode(&header_buf, offset)?;
    if verbose {
        println!("{}", entry.path);
    }

    let rel = entry.path.trim_end_matches('/');
    let dest = outdir.join(rel);
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating parent directory for {dest:?}"))?;
    }

    match entry.kind {
        Kind::Directory => {
            fs::create_dir_all(&dest).with_context(|| format!("creating directory {dest:?}"))?;
            fs::set_permissions(&dest, Permissions::from_mode(entry.mode))
                .with_context(|| format!("setting mode on {dest:?}"))?;
            filetime::set_file_mtime(&dest, FileTime::from_unix_time(entry.mtime as i64, 0))
                .with_context(|| format!("setting mtime on {dest:?}"))?;
            Ok(None)
        }
        Kind::HardLink => {
            let target = entry.link_target.unwrap_or_default();
            let target_rel = target.trim_end_matches('/');
            Ok(Some(DeferredLink {
                is_symbolic: false,
                target_path: outdir.join(target_rel).to_string_lossy().to_string(),
                link_path: dest,
            }))
        }
        Kind::SymbolicLink => {
            let target = entry.link_target.unwrap_or_default();
            Ok(Some(DeferredLink { is_symbolic: true, target_path: target, link_path: dest }))
        }
        Kind::Regular => {
            let mut out = File::create(&dest).with_context(|| PtarError::OpenFailed(dest.clone()))?;
            let mut remaining = entry.size;
            while remaining > 0 {
                let want = remaining.min(buf.len() as u64) as usize;
                archive
                    .read_exact(&mut buf[..want])
                    .with_context(|| PtarError::ReadFailed(archive_path.to_path_buf()))?;
                out.write_all(&buf[..want])
                    .with_context(|| PtarError::WriteFailed(dest.clone()))?;
                remaining -= want as u64;
            }
            fs::set_permissions(&dest, Permissions::from_mode(entry.mode))
                .with_context(|| format!("setting mode on {dest:?}"))?;
            filetime::set_file_mtime(&dest, FileTime::from_unix_time(entry.mtime as i64, 0))
                .with_context(|| format!("setting mtime on {dest:?}"))?;
            Ok(None)
        }
    }
}

/// Applies deferred hard/symbolic links serially, after all regular entries
/// and directories exist, avoiding the non-deterministic creation order that
/// parallel workers would otherwise produce for link targets.
fn finalize_links(links: &[DeferredLink]) -> Result<()> {
    for link in links {
        if let Some(parent) = link.link_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating parent directory for {:?}", link.link_path))?;
        }
        if link.is_symbolic {
            std::os::unix::fs::symlink(&link.target_path, &link.link_path).with_context(|| {
                format!("creating symlink {:?} -> {}", link.link_path, link.target_path)
            })?;
        } else {
            fs::hard_link(&link.target_path, &link.link_path).with_context(|| {
                format!("creating hard link {:?} -> {}", link.link_path, link.target_path)
            })?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::create::{create, CreateOptions};
    use std::io::Write as _;
    use tempfile::tempdir;

    /// Runs `f` with the process cwd set to `dir`, restoring it afterwards.
    /// Lets tests pass relative roots so stored names stay relative and
    /// `outdir.join(name)` behaves as a normal extraction would.
    fn with_cwd<T>(dir: &Path, f: impl FnOnce() -> T) -> T {
        let prev = std::env::current_dir().unwrap();
        std::env::set_current_dir(dir).unwrap();
        let result = f();
        std::env::set_current_dir(prev).unwrap();
        result
    }

    #[test]
    fn round_trips_regular_files() {
        let work = tempdir().unwrap();
        fs::create_dir(work.path().join("src")).unwrap();
        fs::File::create(work.path().join("src/a.txt")).unwrap().write_all(b"abc").unwrap();

        with_cwd(work.path(), || {
            create(
                Path::new("out.ptar"),
                &[PathBuf::from("src")],
                &CreateOptions { nthreads: 3, blocking_factor: 1, verbose: false },
            )
            .unwrap();
            extract(
                Path::new("out.ptar"),
                Path::new("extracted"),
                &ExtractOptions { nthreads: 3, blocking_factor: 1, verbose: false },
            )
            .unwrap();
        });

        let content = fs::read(work.path().join("extracted/src/a.txt")).unwrap();
        assert_eq!(content, b"abc");
    }

    #[test]
    fn hard_links_share_inode_after_extract() {
        let work = tempdir().unwrap();
        fs::create_dir(work.path().join("src2")).unwrap();
        fs::File::create(work.path().join("src2/a")).unwrap().write_all(b"x").unwrap();
        fs::hard_link(work.path().join("src2/a"), work.path().join("src2/b")).unwrap();

        with_cwd(work.path(), || {
            create(
                Path::new("out2.ptar"),
                &[PathBuf::from("src2")],
                &CreateOptions { nthreads: 2, blocking_factor: 1, verbose: false },
            )
            .unwrap();
            extract(
                Path::new("out2.ptar"),
                Path::new("extracted2"),
                &ExtractOptions { nthreads: 2, blocking_factor: 1, verbose: false },
            )
            .unwrap();
        });

        let out_a = work.path().join("extracted2/src2/a");
        let out_b = work.path().join("extracted2/src2/b");
        assert!(out_a.exists());
        assert!(out_b.exists());
        use std::os::unix::fs::MetadataExt;
        assert_eq!(fs::metadata(&out_a).unwrap().ino(), fs::metadata(&out_b).unwrap().ino());
    }

    #[test]
    fn non_ptar_archive_is_rejected_before_fallback_would_fire() {
        let work = tempdir().unwrap();
        let plain = work.path().join("plain.tar");
        fs::write(&plain, [0u8; 1024]).unwrap();
        let mut f = File::open(&plain).unwrap();
        assert!(matches!(trailer::read_trailer(&mut f), Err(PtarError::NotAPtarArchive)));
    }
}
