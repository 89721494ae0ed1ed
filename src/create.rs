//! Writer worker and create coordinator.
//!
//! The planner runs on the calling thread and hands finished work items to a
//! bounded multi-producer/multi-consumer queue. Each writer thread owns its
//! own file handle and writes directly to its item's pre-assigned offset, so
//! no locking is needed between workers. Workers shut down on a single
//! `Shutdown` sentinel sent once per worker after all real work is queued.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::thread;

use anyhow::{Context, Result};
use crossbeam_channel::{bounded, Receiver, Sender};

use crate::error::PtarError;
use crate::header;
use crate::model::{Kind, WorkItem};
use crate::plan;
use crate::trailer;

#[derive(Debug, Clone)]
pub struct CreateOptions {
    pub nthreads: usize,
    pub blocking_factor: usize,
    pub verbose: bool,
}

enum Message {
    Item(WorkItem),
    Shutdown,
}

/// Truncates/creates `output_path`, plans `roots`, drains the plan through a
/// worker pool, and appends the two zero blocks plus the trailer.
pub fn create(output_path: &Path, roots: &[PathBuf], opts: &CreateOptions) -> Result<()> {
    if output_path.exists() {
        fs::remove_file(output_path)
            .with_context(|| PtarError::WriteFailed(output_path.to_path_buf()))?;
    }
    File::create(output_path)
        .with_context(|| PtarError::OpenFailed(output_path.to_path_buf()))?;

    let queue_capacity = (opts.nthreads * 4).max(1);
    let (tx, rx): (Sender<Message>, Receiver<Message>) = bounded(queue_capacity);

    let mut handles = Vec::with_capacity(opts.nthreads);
    for _ in 0..opts.nthreads {
        let rx = rx.clone();
        let output_path = output_path.to_path_buf();
        let blocking_factor = opts.blocking_factor;
        let verbose = opts.verbose;
        handles.push(thread::spawn(move || {
            writer_worker(rx, &output_path, blocking_factor, verbose)
        }));
    }
    drop(rx);

    let items = plan::plan(roots)?;
    let offsets: Vec<u64> = items.iter().map(|item| item.entry.offset).collect();

    for item in items {
        tx.send(Message::Item(item))
            .context("writer pool hung up while queuing work items")?;
    }
    for _ in 0..opts.nthreads {
        tx.send(Message::Shutdown)
            .context("writer pool hung up while sending shutdown")?;
    }
    drop(tx);

    for handle in handles {
        handle
            .join()
            .map_err(|_| anyhow::anyhow!("writer worker thread panicked"))??;
    }

    let mut out = OpenOptions::new()
        .append(true)
        .open(output_path)
        .with_context(|| PtarError::OpenFailed(output_path.to_path_buf()))?;
    out.write_all(&[0u8; header::HEADER_SIZE])
        .with_context(|| PtarError::WriteFailed(output_path.to_path_buf()))?;
    out.write_all(&[0u8; header::HEADER_SIZE])
        .with_context(|| PtarError::WriteFailed(output_path.to_path_buf()))?;
    trailer::write_trailer(&mut out, &offsets)
        .with_context(|| PtarError::WriteFailed(output_path.to_path_buf()))?;

    Ok(())
}

/// Each worker owns its own read-write handle, shared with all other
/// workers only through the disjoint-offset invariant the planner enforces —
/// no locking is used or needed.
fn writer_worker(
    rx: Receiver<Message>,
    output_path: &Path,
    blocking_factor: usize,
    verbose: bool,
) -> Result<()> {
    let mut out = OpenOptions::new()
        .read(true)
        .write(true)
        .open(output_path)
        .with_context(|| PtarError::OpenFailed(output_path.to_path_buf()))?;

    let chunk_size = blocking_factor.max(1) * 4096;
    let mut buf = vec![0u8; chunk_size];

    loop {
        match rx.recv() {
            Ok(Message::Shutdown) | Err(_) => break,
            Ok(Message::Item(item)) => {
                write_item(&mut out, &item, &mut buf)?;
                if verbose {
                    println!("{}", item.entry.path);
                }
            }
        }
    }
    Ok(())
}

fn write_item(out: &mut File, item: &WorkItem, buf: &mut [u8]) -> Result<()> {
    let entry = &item.entry;
    out.seek(SeekFrom::Start(entry.offset))
        .with_context(|| PtarError::SeekFailed(PathBuf::from(&entry.path)))?;

    let header_bytes = header::encode(entry)?;
    out.write_all(&header_bytes)
        .with_context(|| PtarError::WriteFailed(PathBuf::from(&entry.path)))?;

    if entry.kind == Kind::Regular {
        let mut src = File::open(&item.source_path)
            .with_context(|| PtarError::OpenFailed(item.source_path.clone()))?;
        let mut remaining = entry.size;
        while remaining > 0 {
            let want = remaining.min(buf.len() as u64) as usize;
            src.read_exact(&mut buf[..want])
                .with_context(|| PtarError::ReadFailed(item.source_path.clone()))?;
            out.write_all(&buf[..want])
                .with_context(|| PtarError::WriteFailed(PathBuf::from(&entry.path)))?;
            remaining -= want as u64;
        }
        let pad = entry.pad() as usize;
        if pad > 0 {
            out.write_all(&ZEROES[..pad])
                .with_context(|| PtarError::WriteFailed(PathBuf::from(&entry.path)))?;
        }
    }

    Ok(())
}

/// `pad()` is always `< 512`, so one zero-filled block covers any padding.
const ZEROES: [u8; 512] = [0u8; 512];
