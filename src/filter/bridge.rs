//! Runs the external filter program and flags the lines it reports.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::process::{Child, Command, Stdio};

use log::{debug, info, warn};
use thiserror::Error;

use crate::config::ViewerConfig;
use crate::error::ViewError;
use crate::index::{LineIndex, FLAG_MATCHED};
use crate::input::{is_wide_code_page, LineReader};

use super::options::{tool_args, FilterOptions};
use super::relay::spawn_relay;

/// Leading bytes of an output record examined for a line number
const NUMBER_FIELD: usize = 15;

/// Extra bytes collected when a record turns out to be a message
const MESSAGE_TAIL: usize = 255;

/// Errors from a filter run
#[derive(Error, Debug)]
pub enum FilterError {
    #[error("Failed to start filter program '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    /// The program printed something other than a numbered line before any match
    #[error("Filter program said: {message}")]
    ToolMessage { message: String },

    #[error("Delimiter {:?} is only supported with --tool-syntax agrep", char::from(*.delimiter))]
    UnsupportedDelimiter { delimiter: u8 },

    #[error("Filter I/O failed: {0}")]
    Io(#[from] io::Error),
}

/// Outcome of a filter run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSummary {
    /// Records that named a line of the index
    pub matches: usize,
    /// Message that ended parsing after at least one match
    pub diagnostic: Option<String>,
}

/// Clear all match flags, run the configured program over `path` and flag
/// every line it prints.
///
/// 16-bit files are relayed to the program's stdin as UTF-8, everything else
/// is passed by path.
pub fn run(
    config: &ViewerConfig,
    path: &Path,
    index: &LineIndex,
    pattern: &str,
    options: &FilterOptions,
    delimiter: u8,
    code_page: u16,
) -> Result<FilterSummary, ViewError> {
    if pattern.is_empty() {
        return Err(ViewError::EmptyPattern);
    }
    index.clear_all_flags();

    let args = tool_args(config.tool_syntax, pattern, options, delimiter)?;
    let wide = is_wide_code_page(code_page);

    let (output, writer) = os_pipe::pipe().map_err(FilterError::Io)?;
    let error_writer = writer.try_clone().map_err(FilterError::Io)?;

    let mut command = Command::new(&config.filter_tool);
    command.args(&args).stdout(writer).stderr(error_writer);
    if wide {
        command.stdin(Stdio::piped());
    } else {
        command.arg(path).stdin(Stdio::null());
    }
    debug!("Running {:?}", command);

    let mut child = command.spawn().map_err(|source| FilterError::Spawn {
        program: config.filter_tool.clone(),
        source,
    })?;
    // The command holds the write ends; the reader only sees EOF once they are gone
    drop(command);

    let relay = match child.stdin.take() {
        Some(stdin) => {
            let started = File::open(path)
                .map_err(|e| ViewError::io(e, path))
                .and_then(|source| spawn_relay(source, code_page, stdin).map_err(|e| FilterError::Io(e).into()));
            match started {
                Ok(handle) => Some(handle),
                Err(e) => {
                    abandon(&mut child);
                    return Err(e);
                }
            }
        }
        None => None,
    };

    let parsed = apply_matches(output, index, delimiter);

    let status = child.wait().map_err(FilterError::Io)?;
    debug!("Filter program exited with {}", status);

    if let Some(handle) = relay {
        match handle.join() {
            Ok(Ok(bytes)) => debug!("Relay finished after {} bytes", bytes),
            Ok(Err(e)) if e.kind() == io::ErrorKind::BrokenPipe => {
                debug!("Filter program stopped reading its input")
            }
            Ok(Err(e)) => warn!("Relay to filter program failed: {}", e),
            Err(_) => warn!("Relay thread panicked"),
        }
    }

    let summary = parsed?;
    info!("Filter matched {} of {} lines", summary.matches, index.len());
    if let Some(message) = &summary.diagnostic {
        warn!("Filter output ended with: {}", message);
    }
    Ok(summary)
}

/// Kill and reap a child whose output will not be read
fn abandon(child: &mut Child) {
    if let Err(e) = child.kill() {
        debug!("Could not kill filter program: {}", e);
    }
    match child.wait() {
        Ok(status) => debug!("Abandoned filter program exited with {}", status),
        Err(e) => warn!("Could not reap filter program: {}", e),
    }
}

/// Finds the records of a logical line in an index where over-long lines
/// span several records.
///
/// Tool output is in line order, so lookups move forward from the last one.
struct LogicalLines<'a> {
    index: &'a LineIndex,
    line: usize,
    record: usize,
}

impl<'a> LogicalLines<'a> {
    fn new(index: &'a LineIndex) -> Self {
        Self {
            index,
            line: 0,
            record: 0,
        }
    }

    /// First record of 0-based logical line `line`
    fn seek(&mut self, line: usize) -> Option<usize> {
        let (mut current, mut record) = if line < self.line {
            (0, 0)
        } else {
            (self.line, self.record)
        };
        self.index.get(record)?;
        while current < line {
            record += 1;
            if !self.index.get(record)?.continued {
                current += 1;
            }
        }
        self.line = current;
        self.record = record;
        Some(record)
    }

    /// Flag the record starting `line` and all of its continuations
    fn flag(&mut self, line: usize) -> bool {
        let Some(first) = self.seek(line) else {
            return false;
        };
        self.index.set_flag(first, FLAG_MATCHED);
        let mut next = first + 1;
        while self.index.get(next).is_some_and(|record| record.continued) {
            self.index.set_flag(next, FLAG_MATCHED);
            next += 1;
        }
        true
    }
}

/// Parse `N:...` records from `output` and flag logical line `N - 1` of
/// `index`, continuation records included.
///
/// Only the first bytes of a record are examined; the rest is skipped. A
/// record without a usable number is an error if it comes first, and ends
/// parsing otherwise.
pub fn apply_matches<R: Read>(output: R, index: &LineIndex, delimiter: u8) -> Result<FilterSummary, FilterError> {
    let mut reader = LineReader::new(output);
    let mut lines = LogicalLines::new(index);
    let mut record = Vec::with_capacity(NUMBER_FIELD + MESSAGE_TAIL + 1);
    let mut matches = 0;

    loop {
        record.clear();
        if reader.read_line_into(&mut record, NUMBER_FIELD, delimiter)? == 0 {
            break;
        }

        let flagged = leading_number(&record)
            .checked_sub(1)
            .and_then(|n| usize::try_from(n).ok())
            .is_some_and(|line| lines.flag(line));

        if !flagged {
            if !reader.line_complete() {
                reader.read_line_into(&mut record, MESSAGE_TAIL, delimiter)?;
            }
            let message = String::from_utf8_lossy(&record).trim_end().to_string();
            if matches == 0 {
                return Err(FilterError::ToolMessage { message });
            }
            return Ok(FilterSummary {
                matches,
                diagnostic: Some(message),
            });
        }
        matches += 1;

        if !reader.line_complete() {
            reader.read_line(usize::MAX, delimiter)?;
        }
    }

    Ok(FilterSummary {
        matches,
        diagnostic: None,
    })
}

/// Decimal number at the start of `field`, after optional blanks and sign.
/// Zero when there are no digits.
fn leading_number(field: &[u8]) -> i64 {
    let mut bytes = field
        .iter()
        .skip_while(|b| b.is_ascii_whitespace())
        .peekable();
    let negative = match bytes.peek() {
        Some(b'-') => {
            bytes.next();
            true
        }
        Some(b'+') => {
            bytes.next();
            false
        }
        _ => false,
    };

    let value = bytes
        .take_while(|b| b.is_ascii_digit())
        .fold(0i64, |acc, b| acc.saturating_mul(10).saturating_add(i64::from(b - b'0')));
    if negative {
        -value
    } else {
        value
    }
}
