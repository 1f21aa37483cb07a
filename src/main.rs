mod cli;
mod config;
mod error;
mod filter;
mod index;
mod input;
mod pager;
mod scan;

use std::io::{self, IsTerminal};
use std::process::ExitCode;

use clap::Parser;
use log::debug;

use cli::Args;
use config::ViewerConfig;
use error::{ViewError, EXIT_SUCCESS};
use filter::FilterOptions;
use pager::{parse_line_range, print_lines, PrintOptions};
use scan::{ScanState, Viewer};

fn run(args: Args) -> Result<(), ViewError> {
    let config = ViewerConfig::from_args(&args)?;
    let options = FilterOptions::from_args(&args);

    if args.grep.as_deref() == Some("") {
        return Err(ViewError::EmptyPattern);
    }
    // Reject a malformed range before spending a scan on the file
    if let Some(range) = &args.lines {
        parse_line_range(range, usize::MAX)?;
    }

    let mut viewer = Viewer::new(config);
    viewer.open(&args.file, args.encoding.open_mode(args.delimiter))?;

    if args.no_pager || !io::stdout().is_terminal() {
        print_mode(viewer, &args, &options)
    } else {
        pager::run_pager(viewer, &args, options)
    }
}

/// Wait for the scan, filter, and print to stdout
fn print_mode(mut viewer: Viewer, args: &Args, options: &FilterOptions) -> Result<(), ViewError> {
    if let ScanState::Failed(reason) = viewer.wait() {
        return Err(ViewError::ScanFailed { reason });
    }

    if let Some(pattern) = &args.grep {
        let summary = viewer.filter(pattern, options)?;
        debug!("{} lines matched '{}'", summary.matches, pattern);
    }

    let total = viewer.line_count();
    let range = match &args.lines {
        Some(range) => parse_line_range(range, total)?,
        None => (1, total),
    };
    let print_options = PrintOptions {
        range,
        line_numbers: args.line_numbers,
        only_matches: args.grep.is_some(),
        tab_width: viewer.config().tab_width,
    };

    let mut out = io::stdout().lock();
    match print_lines(&mut out, &viewer, &print_options) {
        // Reader went away, e.g. piped into head
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {}
        result => result.map_err(|e| ViewError::io(e, "stdout"))?,
    }

    if args.stats {
        if let Some(progress) = viewer.progress() {
            eprintln!("{progress}");
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp_millis()
        .init();

    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::from(EXIT_SUCCESS as u8),
        Err(e) => {
            eprintln!("plainview: {}", e);
            ExitCode::from(e.exit_code() as u8)
        }
    }
}
