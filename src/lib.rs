//! ptar: a parallel tape archiver. Reads and writes v7-tar-compatible
//! archives using a pool of worker threads, each operating on an
//! independent byte offset inside one shared archive file.

pub mod cli;
pub mod create;
pub mod error;
pub mod extract;
pub mod fallback;
pub mod header;
pub mod model;
pub mod plan;
pub mod trailer;

pub use create::{create, CreateOptions};
pub use error::PtarError;
pub use extract::{extract, ExtractOptions};
