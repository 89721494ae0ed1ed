//! Domain error kinds. Fatal variants propagate via `anyhow`; only
//! [`PtarError::NotAPtarArchive`] is inspected and handled rather than
//! simply bubbled to `main`.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PtarError {
    #[error("file name too long for v7 tar header (100 bytes max): {0:?}")]
    NameTooLong(PathBuf),

    #[error("link target too long for v7 tar header (100 bytes max): {0:?}")]
    LinkTooLong(PathBuf),

    #[error("file size too large for v7 tar header (must be < 2^33 bytes): {0:?}")]
    SizeOverflow(PathBuf),

    #[error("failed to stat {0:?}")]
    StatFailed(PathBuf),

    #[error("failed to open {0:?}")]
    OpenFailed(PathBuf),

    #[error("failed to read from {0:?}")]
    ReadFailed(PathBuf),

    #[error("failed to write to {0:?}")]
    WriteFailed(PathBuf),

    #[error("failed to seek in {0:?}")]
    SeekFailed(PathBuf),

    #[error("corrupt header at archive offset {0}: checksum mismatch")]
    CorruptHeader(u64),

    #[error("not a ptar archive (trailer magic absent)")]
    NotAPtarArchive,

    #[error("invalid combination of command-line arguments")]
    InvalidArguments,
}
