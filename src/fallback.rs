//! Fallback dispatch: when an archive lacks the ptar trailer magic,
//! the process image is replaced by the host `tar` — a strict handoff, not
//! a subprocess call, so no cleanup or further work happens in this program.

use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result};

/// Replaces the current process with `tar xf[v] <archive>`. Only returns if
/// `exec` itself fails (e.g. `tar` missing from `PATH`); on success the
/// process image is gone and this function never returns.
pub fn exec_host_tar(archive_path: &Path, verbose: bool) -> Result<()> {
    let flag = if verbose { "xfv" } else { "xf" };
    let err = Command::new("tar").arg(flag).arg(archive_path).exec();
    Err(err).context("failed to exec host `tar`")
}
