//! CLI logic for the Weir BPMN service.

mod args;
mod config;
pub mod service;

pub use args::Args;

use std::io;
use std::path::PathBuf;

use log::info;

use weir::{WeirError, Workbench};

/// Run the Weir service.
///
/// Builds a workbench (persistence resolved from the flag, the
/// environment, or the config file, in that order) and serves JSON-lines
/// requests on stdio until EOF.
///
/// # Errors
///
/// Returns `WeirError` for configuration loading and terminal I/O
/// failures; per-request errors are reported on the wire instead.
pub fn run(args: &Args) -> Result<(), WeirError> {
    let service_config = config::load_config(args.config.as_ref())?;

    let persist_dir = args
        .persist_dir
        .clone()
        .or_else(|| std::env::var(weir::PERSIST_DIR_ENV).ok().filter(|d| !d.is_empty()))
        .or_else(|| service_config.persist().directory().map(str::to_string));

    let mut workbench = match persist_dir {
        Some(dir) => {
            info!(dir = dir.as_str(); "Persistence enabled");
            Workbench::with_persist_dir(PathBuf::from(dir))
        }
        None => Workbench::new(),
    };

    info!("Serving BPMN tools on stdio");
    let stdin = io::stdin();
    let stdout = io::stdout();
    service::serve(&mut workbench, stdin.lock(), stdout.lock())?;
    info!("Input closed, shutting down");
    Ok(())
}
