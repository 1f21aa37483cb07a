//! Paged line index.
//!
//! Maps a dense 0-based line number to the byte range of that line in the
//! source file. Records live in fixed-size pages so that a file with more
//! lines than any sensible single allocation can still be indexed, and so
//! that appending never moves records a reader may be looking at.
//!
//! One thread appends (the scanner), any number of threads read. A record
//! is published by storing the new line count with `Release` after its
//! fields are written; readers load the count with `Acquire` before touching
//! a record, and pages are published through `OnceLock`.

mod record;

use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::OnceLock;

use thiserror::Error;

pub use record::{LineRecord, FLAG_MATCHED, MAX_LINE_LENGTH};

use record::FLAG_CONTINUED;

/// log2 of the number of records per page
pub const PAGE_SHIFT: u32 = 16;

/// Number of page slots in the page directory
pub const MAX_PAGES: usize = 1 << 16;

/// Errors raised while growing the index
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IndexError {
    /// A new page could not be allocated, or the page directory is full
    #[error("index allocation failed after {lines} lines")]
    Exhausted { lines: usize },
}

#[derive(Default)]
struct Slot {
    offset: AtomicU64,
    length: AtomicU32,
    flags: AtomicU8,
}

type Page = Box<[Slot]>;

/// Line number -> (offset, length, flags) table
pub struct LineIndex {
    shift: u32,
    pages: Box<[OnceLock<Page>]>,
    count: AtomicUsize,
}

impl LineIndex {
    /// Create an empty index with the default page size
    pub fn new() -> Self {
        Self::with_page_shift(PAGE_SHIFT)
    }

    /// Create an empty index holding `1 << shift` records per page
    pub fn with_page_shift(shift: u32) -> Self {
        assert!(shift <= PAGE_SHIFT, "page shift {shift} too large");
        let pages = (0..MAX_PAGES).map(|_| OnceLock::new()).collect();
        Self {
            shift,
            pages,
            count: AtomicUsize::new(0),
        }
    }

    /// Number of records per page
    pub fn page_size(&self) -> usize {
        1 << self.shift
    }

    /// Number of valid records
    pub fn len(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append a record and return its line number.
    ///
    /// Must only be called from one thread at a time.
    pub fn append(&self, offset: u64, length: u32) -> Result<usize, IndexError> {
        self.insert(offset, length, 0)
    }

    /// Append the continuation piece of a line that exceeded the length cap
    pub fn append_continued(&self, offset: u64, length: u32) -> Result<usize, IndexError> {
        self.insert(offset, length, FLAG_CONTINUED)
    }

    fn insert(&self, offset: u64, length: u32, flags: u8) -> Result<usize, IndexError> {
        debug_assert!(length <= MAX_LINE_LENGTH);
        let line = self.count.load(Ordering::Relaxed);
        let (page, slot) = self.split(line);

        let directory = self
            .pages
            .get(page)
            .ok_or(IndexError::Exhausted { lines: line })?;
        let page = match directory.get() {
            Some(page) => page,
            None => {
                let fresh = allocate_page(self.page_size()).ok_or(IndexError::Exhausted { lines: line })?;
                directory.get_or_init(|| fresh)
            }
        };

        let slot = &page[slot];
        slot.offset.store(offset, Ordering::Relaxed);
        slot.length.store(length.min(MAX_LINE_LENGTH), Ordering::Relaxed);
        slot.flags.store(flags, Ordering::Relaxed);
        self.count.store(line + 1, Ordering::Release);
        Ok(line)
    }

    /// Look up a record; `None` beyond the current count
    pub fn get(&self, line: usize) -> Option<LineRecord> {
        let slot = self.slot(line)?;
        let flags = slot.flags.load(Ordering::Relaxed);
        Some(LineRecord {
            offset: slot.offset.load(Ordering::Relaxed),
            length: slot.length.load(Ordering::Relaxed),
            flags: flags & !FLAG_CONTINUED,
            continued: flags & FLAG_CONTINUED != 0,
        })
    }

    /// Set flag bits on one line. Returns false if the line does not exist.
    pub fn set_flag(&self, line: usize, bits: u8) -> bool {
        match self.slot(line) {
            Some(slot) => {
                slot.flags.fetch_or(bits & !FLAG_CONTINUED, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    /// Reset the flag bits of every line
    pub fn clear_all_flags(&self) {
        let pages = self.len().div_ceil(self.page_size());
        for page in self.pages[..pages].iter().filter_map(OnceLock::get) {
            for slot in page.iter() {
                slot.flags.fetch_and(FLAG_CONTINUED, Ordering::Relaxed);
            }
        }
    }

    /// Find the nearest line after (`forward`) or before `from` carrying any
    /// of `bits`, wrapping around the ends. `from` itself is never returned.
    pub fn find_flagged(&self, from: usize, forward: bool, bits: u8) -> Option<usize> {
        let count = self.len();
        if count < 2 {
            return None;
        }
        let from = from.min(count - 1);
        (1..count)
            .map(|step| {
                if forward {
                    (from + step) % count
                } else {
                    (from + count - step) % count
                }
            })
            .find(|&line| self.get(line).is_some_and(|r| r.flags & bits != 0))
    }

    /// Snapshot iterator over the records present when called
    pub fn iter(&self) -> impl Iterator<Item = LineRecord> + '_ {
        (0..self.len()).filter_map(move |line| self.get(line))
    }

    /// Free every page and reset the count
    pub fn clear(&mut self) {
        for page in self.pages.iter_mut() {
            page.take();
        }
        *self.count.get_mut() = 0;
    }

    fn split(&self, line: usize) -> (usize, usize) {
        (line >> self.shift, line & (self.page_size() - 1))
    }

    fn slot(&self, line: usize) -> Option<&Slot> {
        if line >= self.len() {
            return None;
        }
        let (page, slot) = self.split(line);
        self.pages.get(page)?.get()?.get(slot)
    }
}

impl Default for LineIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LineIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineIndex")
            .field("page_size", &self.page_size())
            .field("len", &self.len())
            .finish()
    }
}

fn allocate_page(len: usize) -> Option<Page> {
    let mut slots = Vec::new();
    slots.try_reserve_exact(len).ok()?;
    slots.resize_with(len, Slot::default);
    Some(slots.into_boxed_slice())
}
