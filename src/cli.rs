//! Command-line surface. Thin glue over [`crate::create`] and
//! [`crate::extract`] — option parsing only.

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "ptar",
    version,
    about = "Parallel tar archiver: many worker threads, one offset-indexed archive file."
)]
pub struct Cli {
    /// Create mode.
    #[arg(short = 'c')]
    pub create: bool,

    /// Extract mode.
    #[arg(short = 'x')]
    pub extract: bool,

    /// File-mode; required alongside -c or -x.
    #[arg(short = 'f')]
    pub file: bool,

    /// Verbose: print one path per processed entry.
    #[arg(short = 'v')]
    pub verbose: bool,

    #[arg(long, default_value_t = 24)]
    pub nthreads: usize,

    #[arg(long, default_value_t = 2000)]
    pub blocking_factor: usize,

    /// Archive path, followed (create only) by the input roots.
    pub paths: Vec<PathBuf>,
}

pub enum Mode {
    Create { archive: PathBuf, roots: Vec<PathBuf> },
    Extract { archive: PathBuf },
}

impl Cli {
    /// Validates the flag combination and splits `paths` into archive +
    /// roots. `-c -f` and `-x -f` are the only valid combinations; any other
    /// combination — including both `-c` and `-x` together — is rejected
    /// rather than silently acting on `-c` only.
    pub fn mode(&self) -> Option<Mode> {
        if self.create == self.extract || !self.file || self.paths.is_empty() {
            return None;
        }
        let mut paths = self.paths.clone();
        let archive = paths.remove(0);
        if self.create {
            Some(Mode::Create { archive, roots: paths })
        } else {
            Some(Mode::Extract { archive })
        }
    }
}
