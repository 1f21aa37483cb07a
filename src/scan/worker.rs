//! Body of the background scan thread.

use std::io::{self, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;
use std::time::Duration;

use log::{debug, info};
use thiserror::Error;

use crate::config::FileType;
use crate::index::{IndexError, LineIndex, MAX_LINE_LENGTH};
use crate::input::{
    sniff_code_page, CharsetTable, CodePageInfo, Encoding, EncodingState, LineReader, OpenMode,
    Terminator, WideTerminator,
};

/// State shared between the scan thread and the foreground
#[derive(Debug, Default)]
pub struct ScanShared {
    pub index: LineIndex,
    pub stop: AtomicBool,
    /// Set once, before the first line is indexed
    pub encoding: OnceLock<EncodingState>,
}

/// Errors that end a scan early
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("read failed after {lines} lines: {source}")]
    Io {
        #[source]
        source: io::Error,
        lines: usize,
    },

    #[error(transparent)]
    Index(#[from] IndexError),
}

/// How a scan that did not fail came to an end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    Completed,
    Stopped,
}

/// Sent exactly once by the scan thread when it is done
#[derive(Debug)]
pub struct ScanReport {
    pub result: Result<ScanOutcome, ScanError>,
    pub lines: usize,
    pub elapsed: Duration,
}

/// Resolve the encoding (in auto mode) and index every line of `source`.
///
/// Text that is not Unicode and names no charset is labelled with
/// `default_code_page`.
pub fn run_scan<R: Read>(
    source: R,
    mode: OpenMode,
    file_type: FileType,
    charsets: &dyn CharsetTable,
    default_code_page: u16,
    shared: &ScanShared,
) -> Result<ScanOutcome, ScanError> {
    let mut reader = LineReader::new(source);
    let mut state = EncodingState::new(mode.encoding, mode.delimiter);

    if mode.is_auto() {
        let bom = reader.read_bom(Encoding::Guess).map_err(|source| ScanError::Io {
            source,
            lines: 0,
        })?;
        state.encoding = bom.encoding;
        if bom.encoding == Encoding::Guess {
            state.code_page = sniff_code_page(&reader, file_type, charsets);
        }
        debug!(
            "Resolved encoding {} (bom {} bytes, code page {:?})",
            state.encoding, bom.consumed, state.code_page
        );
    }
    if state.code_page.is_none() && state.encoding.implied_code_page().is_none() {
        state.code_page = Some(CodePageInfo::generic(default_code_page));
    }

    let encoding = state.encoding;
    let delimiter = state.delimiter;
    if shared.encoding.set(state).is_err() {
        debug!("Encoding was already set for this scan");
    }

    match encoding {
        Encoding::Ucs2Le => index_lines(&mut reader, WideTerminator::le(delimiter), shared),
        Encoding::Ucs2Be => index_lines(&mut reader, WideTerminator::be(delimiter), shared),
        _ => index_lines(&mut reader, delimiter, shared),
    }
}

/// Append one record per line until end of input or a stop request.
///
/// Lines longer than `MAX_LINE_LENGTH` become several records, all but the
/// first marked as continuations.
pub fn index_lines<R: Read, T: Terminator>(
    reader: &mut LineReader<R>,
    eol: T,
    shared: &ScanShared,
) -> Result<ScanOutcome, ScanError> {
    let index = &shared.index;
    let mut continued = false;

    loop {
        let offset = reader.position();
        let length = reader
            .read_line(MAX_LINE_LENGTH as usize, eol)
            .map_err(|source| ScanError::Io {
                source,
                lines: index.len(),
            })?;
        if length == 0 {
            info!("Indexed {} lines", index.len());
            return Ok(ScanOutcome::Completed);
        }

        if continued {
            index.append_continued(offset, length as u32)?;
        } else {
            index.append(offset, length as u32)?;
        }
        continued = !reader.line_complete();

        if shared.stop.load(Ordering::Relaxed) {
            info!("Scan stopped after {} lines", index.len());
            return Ok(ScanOutcome::Stopped);
        }
    }
}
