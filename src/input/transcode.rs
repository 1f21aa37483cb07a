use std::io::{self, Read, Seek, SeekFrom};

use log::debug;

use super::codepage::{encoding_for_code_page, has_decoder};
use super::encoding::{is_wide_code_page, CP_UTF16BE, CP_UTF16LE};
use crate::index::LineRecord;

/// Byte range to read for `record`, widened to whole 16-bit units on
/// wide code pages
pub fn display_range(record: &LineRecord, code_page: u16) -> (u64, usize) {
    let mut offset = record.offset;
    let mut length = record.length as usize;
    if is_wide_code_page(code_page) {
        offset += offset & 1;
        length += length & 1;
    }
    (offset, length)
}

/// Read the raw bytes of one line from a seekable source
pub fn read_line_bytes<R: Read + Seek>(
    mut source: R,
    record: &LineRecord,
    code_page: u16,
) -> io::Result<Vec<u8>> {
    let (offset, length) = display_range(record, code_page);
    source.seek(SeekFrom::Start(offset))?;
    let mut bytes = Vec::with_capacity(length);
    source.take(length as u64).read_to_end(&mut bytes)?;
    Ok(bytes)
}

/// `unit` as it is stored in a file of `code_page`
fn code_unit(unit: u8, code_page: u16) -> ([u8; 2], usize) {
    match code_page {
        CP_UTF16LE => ([unit, 0], 2),
        CP_UTF16BE => ([0, unit], 2),
        _ => ([unit, 0], 1),
    }
}

/// Drop the record terminator from raw line bytes, and a carriage return
/// before a line feed. Matching happens before decoding, in the file's
/// code unit width.
pub fn strip_terminator(bytes: &[u8], delimiter: u8, code_page: u16) -> &[u8] {
    let strip = |bytes: &[u8], unit: u8| -> Option<usize> {
        let (unit, width) = code_unit(unit, code_page);
        bytes.ends_with(&unit[..width]).then(|| bytes.len() - width)
    };

    let Some(end) = strip(bytes, delimiter) else {
        return bytes;
    };
    let bytes = &bytes[..end];
    if delimiter == b'\n' {
        if let Some(end) = strip(bytes, b'\r') {
            return &bytes[..end];
        }
    }
    bytes
}

/// Decode line bytes with `code_page`
pub fn decode_line(bytes: &[u8], code_page: u16) -> String {
    if !has_decoder(code_page) {
        debug!("No decoder for code page {}, using windows-1252", code_page);
    }
    let (text, had_errors) = encoding_for_code_page(code_page).decode_without_bom_handling(bytes);
    if had_errors {
        debug!("Malformed input while decoding with code page {}", code_page);
    }
    text.into_owned()
}

/// Read one indexed line and decode it without its terminator; `None` if
/// the read fails
pub fn transcode_line<R: Read + Seek>(
    source: R,
    record: &LineRecord,
    code_page: u16,
    delimiter: u8,
) -> Option<String> {
    match read_line_bytes(source, record, code_page) {
        Ok(bytes) => Some(decode_line(strip_terminator(&bytes, delimiter, code_page), code_page)),
        Err(e) => {
            debug!("Could not read line at offset {}: {}", record.offset, e);
            None
        }
    }
}
