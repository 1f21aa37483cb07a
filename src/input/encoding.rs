use std::fmt;

/// UTF-8 BOM bytes
pub const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// UTF-16 LE BOM
pub const UTF16_LE_BOM: &[u8] = &[0xFF, 0xFE];

/// UTF-16 BE BOM
pub const UTF16_BE_BOM: &[u8] = &[0xFE, 0xFF];

/// Code page numbers with a fixed meaning
pub const CP_UTF8: u16 = 65001;
pub const CP_UTF16LE: u16 = 1200;
pub const CP_UTF16BE: u16 = 1201;

/// Code page used when nothing better is known
pub const DEFAULT_CODE_PAGE: u16 = 1252;

/// Byte-level encoding of the file being scanned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    /// Not determined yet; an open in this state runs the resolver
    #[default]
    None,
    /// No BOM and no UTF-16 evidence; content sniffing still pending
    Guess,
    /// Single-byte or multi-byte legacy code page
    Ansi,
    Utf8,
    Ucs2Be,
    Ucs2Le,
}

impl Encoding {
    /// Code page implied by the encoding alone, if any
    pub fn implied_code_page(self) -> Option<u16> {
        match self {
            Encoding::Utf8 => Some(CP_UTF8),
            Encoding::Ucs2Le => Some(CP_UTF16LE),
            Encoding::Ucs2Be => Some(CP_UTF16BE),
            _ => None,
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Encoding::None | Encoding::Guess => "auto",
            Encoding::Ansi => "ANSI",
            Encoding::Utf8 => "UTF-8",
            Encoding::Ucs2Be => "UCS-2 BE",
            Encoding::Ucs2Le => "UCS-2 LE",
        };
        f.write_str(name)
    }
}

/// A numeric code page and the name it is known by
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodePageInfo {
    pub code_page: u16,
    pub name: String,
}

impl CodePageInfo {
    /// Label for a code page that has no table entry
    pub fn generic(code_page: u16) -> Self {
        Self {
            code_page,
            name: format!("windows-{code_page}"),
        }
    }
}

/// How to open a file: which encoding to assume and which byte ends a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenMode {
    pub encoding: Encoding,
    pub delimiter: u8,
}

impl OpenMode {
    /// Detect the encoding, records end at line feed
    pub fn auto() -> Self {
        Self::delimited(b'\n')
    }

    /// Detect the encoding, records end at `delimiter`
    pub fn delimited(delimiter: u8) -> Self {
        Self {
            encoding: Encoding::None,
            delimiter,
        }
    }

    /// Skip detection and read the file as `encoding`
    pub fn forced(encoding: Encoding) -> Self {
        Self {
            encoding,
            delimiter: b'\n',
        }
    }

    pub fn is_auto(&self) -> bool {
        self.encoding == Encoding::None
    }
}

impl Default for OpenMode {
    fn default() -> Self {
        Self::auto()
    }
}

/// Encoding facts established once per open, before lines are indexed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodingState {
    pub encoding: Encoding,
    pub delimiter: u8,
    pub code_page: Option<CodePageInfo>,
}

impl EncodingState {
    pub fn new(encoding: Encoding, delimiter: u8) -> Self {
        Self {
            encoding,
            delimiter,
            code_page: None,
        }
    }

    /// Code page to display with once scanning has finished: an explicit
    /// Unicode encoding wins, then whatever sniffing found, then `default`.
    pub fn final_code_page(&self, default: u16) -> u16 {
        self.encoding
            .implied_code_page()
            .or_else(|| self.code_page.as_ref().map(|info| info.code_page))
            .unwrap_or(default)
    }
}

/// Whether a code page stores text as 16-bit units
pub fn is_wide_code_page(code_page: u16) -> bool {
    matches!(code_page, CP_UTF16LE | CP_UTF16BE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_implied_code_page() {
        assert_eq!(Encoding::Utf8.implied_code_page(), Some(65001));
        assert_eq!(Encoding::Ucs2Le.implied_code_page(), Some(1200));
        assert_eq!(Encoding::Ucs2Be.implied_code_page(), Some(1201));
        assert_eq!(Encoding::Ansi.implied_code_page(), None);
        assert_eq!(Encoding::Guess.implied_code_page(), None);
    }

    #[test]
    fn test_final_code_page_prefers_unicode_encoding() {
        let mut state = EncodingState::new(Encoding::Utf8, b'\n');
        state.code_page = Some(CodePageInfo::generic(1251));
        assert_eq!(state.final_code_page(DEFAULT_CODE_PAGE), CP_UTF8);
    }

    #[test]
    fn test_final_code_page_uses_sniffed() {
        let mut state = EncodingState::new(Encoding::Guess, b'\n');
        state.code_page = Some(CodePageInfo::generic(1251));
        assert_eq!(state.final_code_page(DEFAULT_CODE_PAGE), 1251);
    }

    #[test]
    fn test_final_code_page_default() {
        let state = EncodingState::new(Encoding::Guess, b'\n');
        assert_eq!(state.final_code_page(437), 437);
    }

    #[test]
    fn test_generic_label() {
        assert_eq!(CodePageInfo::generic(1251).name, "windows-1251");
    }

    #[test]
    fn test_wide_code_pages() {
        assert!(is_wide_code_page(1200));
        assert!(is_wide_code_page(1201));
        assert!(!is_wide_code_page(65001));
        assert!(!is_wide_code_page(1252));
    }
}
