//! Entry point wiring that stitches together the CLI surface, config-directory
//! discovery, and scene bootstrap before handing off to either the `--check`
//! report or the GL window in `run.rs`.
//!
//! Types:
//!
//! - None; this module focuses on orchestrating submodules.
//!
//! Functions:
//!
//! - `main` parses CLI input, initialises tracing, and dispatches to `run::run`.

mod bootstrap;
mod cli;
mod paths;
mod report;
mod run;
mod window;

use anyhow::Result;

fn main() -> Result<()> {
    let cli = cli::parse();
    run::initialise_tracing();
    run::run(cli.run)
}
