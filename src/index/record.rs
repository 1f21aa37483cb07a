/// Longest byte length a single record may describe (2^24 - 1)
pub const MAX_LINE_LENGTH: u32 = (1 << 24) - 1;

/// Set on lines reported by the last filter pass
pub const FLAG_MATCHED: u8 = 0x01;

/// Internal marker for the second and later pieces of an over-long line
pub(super) const FLAG_CONTINUED: u8 = 0x80;

/// Location of one logical line in the source file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRecord {
    /// Absolute byte offset of the first byte of the line
    pub offset: u64,
    /// Byte length including the terminator, at most `MAX_LINE_LENGTH`
    pub length: u32,
    /// Filter flag bits
    pub flags: u8,
    /// Whether this record continues the previous one (line was cut at the cap)
    pub continued: bool,
}

impl LineRecord {
    /// Offset one past the last byte of the line
    pub fn end(&self) -> u64 {
        self.offset + self.length as u64
    }

    pub fn is_matched(&self) -> bool {
        self.flags & FLAG_MATCHED != 0
    }
}
