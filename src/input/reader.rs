//! Chunked line reading over any `Read`.
//!
//! `LineReader` keeps one fixed-size chunk of the source resident and hands
//! out line lengths without ever holding more than that chunk in memory.
//! Byte and 16-bit modes share the same refill loop; they differ only in the
//! `Terminator` used to find the end of a line.

use std::io::{self, ErrorKind, Read};

use memchr::memchr;

use super::encoding::{Encoding, UTF16_BE_BOM, UTF16_LE_BOM, UTF8_BOM};

/// Size of the resident chunk (32 KiB)
pub const CHUNK_SIZE: usize = 32 * 1024;

/// Something that ends a line
pub trait Terminator: Copy {
    /// Width of one code unit in bytes
    const WIDTH: usize;

    /// Offset one past the first terminator in `haystack`
    fn find_end(self, haystack: &[u8]) -> Option<usize>;
}

impl Terminator for u8 {
    const WIDTH: usize = 1;

    fn find_end(self, haystack: &[u8]) -> Option<usize> {
        memchr(self, haystack).map(|pos| pos + 1)
    }
}

/// A 16-bit terminator, stored in file byte order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WideTerminator([u8; 2]);

impl WideTerminator {
    /// `delimiter` as a little-endian code unit
    pub fn le(delimiter: u8) -> Self {
        Self([delimiter, 0])
    }

    /// `delimiter` as a big-endian code unit
    pub fn be(delimiter: u8) -> Self {
        Self([0, delimiter])
    }
}

impl Terminator for WideTerminator {
    const WIDTH: usize = 2;

    fn find_end(self, haystack: &[u8]) -> Option<usize> {
        haystack
            .chunks_exact(2)
            .position(|unit| unit == self.0)
            .map(|pos| (pos + 1) * 2)
    }
}

/// Outcome of probing the start of a file for a byte-order mark
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bom {
    pub encoding: Encoding,
    /// Bytes taken by the mark itself
    pub consumed: usize,
}

/// Reads successive lines from `R` through a fixed-size chunk
pub struct LineReader<R> {
    inner: R,
    chunk: Box<[u8]>,
    /// Start of unconsumed bytes in `chunk`
    index: usize,
    /// Number of unconsumed bytes in `chunk`
    ahead: usize,
    /// Bytes consumed since the reader was created
    position: u64,
    terminated: bool,
}

impl<R: Read> LineReader<R> {
    pub fn new(inner: R) -> Self {
        Self::with_chunk_size(inner, CHUNK_SIZE)
    }

    /// Reader with a custom chunk size; must be even and non-zero
    pub fn with_chunk_size(inner: R, size: usize) -> Self {
        debug_assert!(size > 0 && size % 2 == 0);
        Self {
            inner,
            chunk: vec![0; size].into_boxed_slice(),
            index: 0,
            ahead: 0,
            position: 0,
            terminated: false,
        }
    }

    /// Byte offset of the next unconsumed byte
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Whether the last line read ended on its terminator
    pub fn line_complete(&self) -> bool {
        self.terminated
    }

    /// Probe the first bytes for a byte-order mark. Must be the first call
    /// on a fresh reader.
    ///
    /// Without a mark and with `guess == Encoding::Guess`, a zero byte in
    /// exactly one of the first two positions is taken as BOM-less UTF-16.
    /// Otherwise `guess` is returned unchanged.
    pub fn read_bom(&mut self, guess: Encoding) -> io::Result<Bom> {
        self.fill()?;
        let head = &self.chunk[..self.ahead];

        let (encoding, consumed) = if head.starts_with(UTF16_LE_BOM) {
            (Encoding::Ucs2Le, UTF16_LE_BOM.len())
        } else if head.starts_with(UTF16_BE_BOM) {
            (Encoding::Ucs2Be, UTF16_BE_BOM.len())
        } else if head.starts_with(UTF8_BOM) {
            (Encoding::Utf8, UTF8_BOM.len())
        } else if guess == Encoding::Guess && head.len() >= 2 {
            match (head[0], head[1]) {
                (a, 0) if a != 0 => (Encoding::Ucs2Le, 0),
                (0, b) if b != 0 => (Encoding::Ucs2Be, 0),
                _ => (guess, 0),
            }
        } else {
            (guess, 0)
        };

        self.consume(consumed);
        Ok(Bom { encoding, consumed })
    }

    /// Length of the next line including its terminator.
    ///
    /// Never returns more than `limit` (rounded down to whole code units); a
    /// longer line is split and the next call continues it. Returns the
    /// partial tail at end of input, and 0 once nothing is left.
    pub fn read_line<T: Terminator>(&mut self, limit: usize, eol: T) -> io::Result<usize> {
        self.advance(limit, eol, None)
    }

    /// Like `read_line`, also appending the line's bytes to `buf`
    pub fn read_line_into<T: Terminator>(
        &mut self,
        buf: &mut Vec<u8>,
        limit: usize,
        eol: T,
    ) -> io::Result<usize> {
        self.advance(limit, eol, Some(buf))
    }

    /// Look at a line already resident in the chunk without consuming it.
    ///
    /// `start` is relative to the current position. Returns the bytes up to
    /// and including `eol`, or `None` when no terminator occurs within
    /// `limit` bytes of resident data.
    pub fn peek_line(&self, start: usize, limit: usize, eol: u8) -> Option<&[u8]> {
        let resident = self.ahead.checked_sub(start)?;
        let from = self.index + start;
        let window = &self.chunk[from..from + resident.min(limit)];
        eol.find_end(window).map(|end| &window[..end])
    }

    fn advance<T: Terminator>(
        &mut self,
        limit: usize,
        eol: T,
        mut sink: Option<&mut Vec<u8>>,
    ) -> io::Result<usize> {
        let limit = limit - limit % T::WIDTH;
        let mut count = 0;
        self.terminated = false;

        loop {
            let take = (limit - count).min(self.ahead);
            let window = &self.chunk[self.index..self.index + take];
            let (take, found) = match eol.find_end(window) {
                Some(end) => (end, true),
                None => (take, false),
            };
            if let Some(buf) = sink.as_deref_mut() {
                buf.extend_from_slice(&window[..take]);
            }
            count += take;

            if found || count == limit {
                self.terminated = found;
                self.consume(take);
                return Ok(count);
            }

            // Whole resident remainder belongs to this line
            self.position += take as u64;
            self.fill()?;
            if self.ahead == 0 {
                return Ok(count);
            }
        }
    }

    fn consume(&mut self, n: usize) {
        self.index += n;
        self.ahead -= n;
        self.position += n as u64;
    }

    /// Replace the chunk with fresh data, reading until it is full or the
    /// source is exhausted so 16-bit units never straddle two fills.
    fn fill(&mut self) -> io::Result<()> {
        self.index = 0;
        self.ahead = 0;
        while self.ahead < self.chunk.len() {
            match self.inner.read(&mut self.chunk[self.ahead..]) {
                Ok(0) => break,
                Ok(n) => self.ahead += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Cursor;

    fn lines_of<T: Terminator>(reader: &mut LineReader<Cursor<Vec<u8>>>, limit: usize, eol: T) -> Vec<usize> {
        let mut lengths = Vec::new();
        loop {
            let len = reader.read_line(limit, eol).unwrap();
            if len == 0 {
                break;
            }
            lengths.push(len);
        }
        lengths
    }

    /// Reads one byte per call, to prove fills loop until the chunk is full
    struct Trickle(Cursor<Vec<u8>>);

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let end = buf.len().min(1);
            self.0.read(&mut buf[..end])
        }
    }

    #[test]
    fn test_bom_utf8() {
        let mut reader = LineReader::new(Cursor::new(b"\xEF\xBB\xBFhi\n".to_vec()));
        let bom = reader.read_bom(Encoding::Guess).unwrap();
        assert_eq!(bom, Bom { encoding: Encoding::Utf8, consumed: 3 });
        assert_eq!(reader.position(), 3);
        assert_eq!(reader.read_line(usize::MAX, b'\n').unwrap(), 3);
    }

    #[test]
    fn test_bom_utf16_le() {
        let mut reader = LineReader::new(Cursor::new(vec![0xFF, 0xFE, b'a', 0]));
        let bom = reader.read_bom(Encoding::Guess).unwrap();
        assert_eq!(bom, Bom { encoding: Encoding::Ucs2Le, consumed: 2 });
    }

    #[test]
    fn test_bom_utf16_be() {
        let mut reader = LineReader::new(Cursor::new(vec![0xFE, 0xFF, 0, b'a']));
        let bom = reader.read_bom(Encoding::Guess).unwrap();
        assert_eq!(bom, Bom { encoding: Encoding::Ucs2Be, consumed: 2 });
    }

    #[test]
    fn test_bom_guess_raw_utf16() {
        let mut reader = LineReader::new(Cursor::new(vec![0x00, b'A']));
        let bom = reader.read_bom(Encoding::Guess).unwrap();
        assert_eq!(bom, Bom { encoding: Encoding::Ucs2Be, consumed: 0 });

        let mut reader = LineReader::new(Cursor::new(vec![b'A', 0x00]));
        let bom = reader.read_bom(Encoding::Guess).unwrap();
        assert_eq!(bom, Bom { encoding: Encoding::Ucs2Le, consumed: 0 });
    }

    #[test]
    fn test_bom_guess_inconclusive() {
        let mut reader = LineReader::new(Cursor::new(b"plain".to_vec()));
        let bom = reader.read_bom(Encoding::Guess).unwrap();
        assert_eq!(bom, Bom { encoding: Encoding::Guess, consumed: 0 });

        // No guess requested: parity is not consulted
        let mut reader = LineReader::new(Cursor::new(vec![0x00, b'A']));
        let bom = reader.read_bom(Encoding::Ansi).unwrap();
        assert_eq!(bom.encoding, Encoding::Ansi);
    }

    #[test]
    fn test_bom_empty_input() {
        let mut reader = LineReader::new(Cursor::new(Vec::new()));
        let bom = reader.read_bom(Encoding::Guess).unwrap();
        assert_eq!(bom, Bom { encoding: Encoding::Guess, consumed: 0 });
        assert_eq!(reader.read_line(usize::MAX, b'\n').unwrap(), 0);
    }

    #[test]
    fn test_read_lines() {
        let mut reader = LineReader::new(Cursor::new(b"one\ntwo\n\nlast".to_vec()));
        assert_eq!(lines_of(&mut reader, usize::MAX, b'\n'), vec![4, 4, 1, 4]);
        assert_eq!(reader.position(), 13);
    }

    #[test]
    fn test_line_complete_flag() {
        let mut reader = LineReader::new(Cursor::new(b"ab\ncd".to_vec()));
        reader.read_line(usize::MAX, b'\n').unwrap();
        assert!(reader.line_complete());
        reader.read_line(usize::MAX, b'\n').unwrap();
        assert!(!reader.line_complete());
    }

    #[test]
    fn test_limit_splits_line() {
        let mut reader = LineReader::new(Cursor::new(b"abcdefg\nxy\n".to_vec()));
        assert_eq!(lines_of(&mut reader, 3, b'\n'), vec![3, 3, 2, 3]);
    }

    #[test]
    fn test_line_crosses_chunks() {
        let data = b"aaaaaa\nbbbbbbbbbbbbbbbbbbbbbb\ncc\n".to_vec();
        let mut reader = LineReader::with_chunk_size(Cursor::new(data), 4);
        assert_eq!(lines_of(&mut reader, usize::MAX, b'\n'), vec![7, 23, 3]);
    }

    #[test]
    fn test_line_ends_exactly_at_chunk_boundary() {
        // First line fills the chunk precisely
        let data = b"abc\ndef\n".to_vec();
        let mut small = LineReader::with_chunk_size(Cursor::new(data.clone()), 4);
        let mut large = LineReader::new(Cursor::new(data));
        assert_eq!(
            lines_of(&mut small, usize::MAX, b'\n'),
            lines_of(&mut large, usize::MAX, b'\n')
        );
    }

    #[test]
    fn test_read_line_into_copies_bytes() {
        let data = b"first line\nsecond\n".to_vec();
        let mut reader = LineReader::with_chunk_size(Cursor::new(data), 4);
        let mut buf = Vec::new();
        assert_eq!(reader.read_line_into(&mut buf, usize::MAX, b'\n').unwrap(), 11);
        assert_eq!(buf, b"first line\n");

        buf.clear();
        assert_eq!(reader.read_line_into(&mut buf, 3, b'\n').unwrap(), 3);
        assert_eq!(buf, b"sec");
    }

    #[test]
    fn test_wide_lines_le() {
        let data: Vec<u8> = "ab\ncd\n".encode_utf16().flat_map(u16::to_le_bytes).collect();
        let mut reader = LineReader::with_chunk_size(Cursor::new(data), 4);
        assert_eq!(lines_of(&mut reader, usize::MAX, WideTerminator::le(b'\n')), vec![6, 6]);
    }

    #[test]
    fn test_wide_lines_be() {
        let data: Vec<u8> = "x\nyz".encode_utf16().flat_map(u16::to_be_bytes).collect();
        let mut reader = LineReader::new(Cursor::new(data));
        assert_eq!(lines_of(&mut reader, usize::MAX, WideTerminator::be(b'\n')), vec![4, 4]);
    }

    #[test]
    fn test_wide_ignores_misaligned_match() {
        // 0x0A 0x00 straddles two code units here, so it is not a terminator
        let data = vec![0x41, 0x0A, 0x00, 0x42, 0x0A, 0x00];
        let mut reader = LineReader::new(Cursor::new(data));
        assert_eq!(lines_of(&mut reader, usize::MAX, WideTerminator::le(b'\n')), vec![6]);
    }

    #[test]
    fn test_wide_limit_rounds_to_units() {
        let data: Vec<u8> = "abcd".encode_utf16().flat_map(u16::to_le_bytes).collect();
        let mut reader = LineReader::new(Cursor::new(data));
        assert_eq!(lines_of(&mut reader, 5, WideTerminator::le(b'\n')), vec![4, 4]);
    }

    #[test]
    fn test_fill_tolerates_short_reads() {
        let data: Vec<u8> = "ab\ncd\n".encode_utf16().flat_map(u16::to_le_bytes).collect();
        let mut reader = LineReader::with_chunk_size(Trickle(Cursor::new(data)), 4);
        let mut lengths = Vec::new();
        while let Ok(len @ 1..) = reader.read_line(usize::MAX, WideTerminator::le(b'\n')) {
            lengths.push(len);
        }
        assert_eq!(lengths, vec![6, 6]);
    }

    #[test]
    fn test_peek_does_not_consume() {
        let mut reader = LineReader::new(Cursor::new(b"<?xml version='1.0'?>\n<root>".to_vec()));
        reader.read_bom(Encoding::Guess).unwrap();

        assert_eq!(reader.peek_line(0, 80, b'>'), Some(&b"<?xml version='1.0'?>"[..]));
        assert_eq!(reader.peek_line(21, 80, b'>'), Some(&b"\n<root>"[..]));
        assert_eq!(reader.peek_line(28, 80, b'>'), None);
        assert_eq!(reader.peek_line(0, 5, b'>'), None);
        assert_eq!(reader.position(), 0);
        assert_eq!(reader.read_line(usize::MAX, b'\n').unwrap(), 22);
    }

    #[test]
    fn test_peek_past_resident_data() {
        let mut reader = LineReader::new(Cursor::new(b"abc".to_vec()));
        reader.read_bom(Encoding::Guess).unwrap();
        assert_eq!(reader.peek_line(10, 80, b'\n'), None);
    }

    proptest! {
        #[test]
        fn prop_chunk_size_does_not_change_lines(
            data in prop::collection::vec(prop::sample::select(vec![b'a', b'b', b'\n']), 0..400),
            half_chunk in 1usize..40,
            limit in 1usize..64,
        ) {
            let mut small = LineReader::with_chunk_size(Cursor::new(data.clone()), half_chunk * 2);
            let mut large = LineReader::new(Cursor::new(data.clone()));
            let small_lines = lines_of(&mut small, limit, b'\n');
            let large_lines = lines_of(&mut large, limit, b'\n');

            prop_assert_eq!(&small_lines, &large_lines);
            prop_assert_eq!(small_lines.iter().sum::<usize>(), data.len());
            prop_assert!(small_lines.iter().all(|&len| len <= limit));
        }
    }
}
