//! Feeds a UTF-16 file to a filter program as UTF-8.
//!
//! Line-oriented tools cannot read 16-bit text, so the file is decoded on a
//! separate thread and written into the child's stdin while the foreground
//! reads the child's output.

use std::fs::File;
use std::io::{self, ErrorKind, Read, Write};
use std::thread::{self, JoinHandle};

use encoding_rs::{CoderResult, UTF_16BE, UTF_16LE};
use log::debug;

use crate::input::CP_UTF16BE;

const RELAY_CHUNK: usize = 64 * 1024;

/// Start a thread that writes `source` into `sink` as UTF-8
pub fn spawn_relay<W>(source: File, code_page: u16, sink: W) -> io::Result<JoinHandle<io::Result<u64>>>
where
    W: Write + Send + 'static,
{
    let big_endian = code_page == CP_UTF16BE;
    thread::Builder::new()
        .name("plainview-relay".into())
        .spawn(move || relay_utf16(source, big_endian, sink))
}

/// Decode UTF-16 from `source` and write it to `sink`, returning the number
/// of bytes written. Code units split across reads are carried over; a
/// leading byte-order mark is dropped.
pub fn relay_utf16<R: Read, W: Write>(mut source: R, big_endian: bool, mut sink: W) -> io::Result<u64> {
    let encoding = if big_endian { UTF_16BE } else { UTF_16LE };
    let mut decoder = encoding.new_decoder_with_bom_removal();
    let mut input = vec![0u8; RELAY_CHUNK];
    let mut output = vec![0u8; RELAY_CHUNK * 3 / 2 + 16];
    let mut written = 0u64;

    loop {
        let n = match source.read(&mut input) {
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        let last = n == 0;

        let mut consumed = 0;
        loop {
            let (result, read, produced, _) = decoder.decode_to_utf8(&input[consumed..n], &mut output, last);
            consumed += read;
            sink.write_all(&output[..produced])?;
            written += produced as u64;
            if let CoderResult::InputEmpty = result {
                break;
            }
        }

        if last {
            break;
        }
    }

    sink.flush()?;
    debug!("Relayed {} bytes of UTF-8", written);
    Ok(written)
}
