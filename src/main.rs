use std::path::Path;

use clap::Parser;

use ptar::cli::{Cli, Mode};
use ptar::create::{create, CreateOptions};
use ptar::extract::{extract, ExtractOptions};

fn main() {
    let cli = Cli::parse();

    let result = match cli.mode() {
        // Inconsistent flag combination: exit silently without action.
        None => return,
        Some(Mode::Create { archive, roots }) => create(
            &archive,
            &roots,
            &CreateOptions {
                nthreads: cli.nthreads,
                blocking_factor: cli.blocking_factor,
                verbose: cli.verbose,
            },
        ),
        Some(Mode::Extract { archive }) => extract(
            &archive,
            Path::new("."),
            &ExtractOptions {
                nthreads: cli.nthreads,
                blocking_factor: cli.blocking_factor,
                verbose: cli.verbose,
            },
        ),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
