mod codepage;
mod encoding;
mod reader;
mod sniff;
mod transcode;

use std::fs::File;
use std::io;
use std::path::Path;

use crate::error::ViewError;

pub use codepage::{has_decoder, BuiltinCharsets, CharsetTable};
pub use encoding::{
    is_wide_code_page, CodePageInfo, Encoding, EncodingState, OpenMode, CP_UTF16BE,
    DEFAULT_CODE_PAGE,
};
pub use reader::{LineReader, Terminator, WideTerminator};
pub use sniff::sniff_code_page;
pub use transcode::transcode_line;

/// Open two handles on `path` and make sure they reach the same file
pub fn open_pair(path: &Path) -> Result<(File, File), ViewError> {
    let open = || File::open(path).map_err(|e| ViewError::io(e, path));
    let first = open()?;
    let second = open()?;
    match same_file(&first, &second) {
        Ok(true) => Ok((first, second)),
        Ok(false) => Err(ViewError::FileReplaced {
            path: path.to_path_buf(),
        }),
        Err(e) => Err(ViewError::io(e, path)),
    }
}

#[cfg(unix)]
fn same_file(a: &File, b: &File) -> io::Result<bool> {
    use std::os::unix::fs::MetadataExt;
    let (a, b) = (a.metadata()?, b.metadata()?);
    Ok(a.dev() == b.dev() && a.ino() == b.ino())
}

#[cfg(not(unix))]
fn same_file(a: &File, b: &File) -> io::Result<bool> {
    let (a, b) = (a.metadata()?, b.metadata()?);
    Ok(a.len() == b.len() && a.modified().ok() == b.modified().ok())
}

/// Fold a multi-line record onto one line: each line feed becomes a space
/// (except at the start), carriage returns vanish, and indentation after a
/// line break is dropped
pub fn unwrap_line(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut eat = true;

    for ch in text.chars() {
        match ch {
            '\n' => {
                eat = true;
                if !result.is_empty() {
                    result.push(' ');
                }
            }
            '\r' => {}
            ' ' | '\t' => {
                if !eat {
                    result.push(' ');
                }
            }
            _ => {
                eat = false;
                result.push(ch);
            }
        }
    }

    result
}

/// Expand tabs to spaces with proper alignment
pub fn expand_tabs(text: &str, tab_width: usize) -> String {
    let mut result = String::with_capacity(text.len());
    let mut column = 0;

    for ch in text.chars() {
        match ch {
            '\t' => {
                // Calculate spaces needed to reach next tab stop
                let spaces_needed = tab_width - (column % tab_width);
                result.extend(std::iter::repeat(' ').take(spaces_needed));
                column += spaces_needed;
            }
            _ => {
                result.push(ch);
                // Handle wide characters
                let width = unicode_width::UnicodeWidthChar::width(ch).unwrap_or(1);
                column += width;
            }
        }
    }

    result
}
