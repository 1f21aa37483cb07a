//! Charset name and code page resolution.

use std::collections::HashMap;

use encoding_rs::Encoding as Charset;
use once_cell::sync::Lazy;

use super::encoding::CodePageInfo;

/// Lookup from a charset name to a code page.
///
/// Absence of a name is an ordinary outcome.
pub trait CharsetTable {
    fn lookup(&self, name: &str) -> Option<CodePageInfo>;
}

/// Table backed by the WHATWG label list in `encoding_rs`
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinCharsets;

impl CharsetTable for BuiltinCharsets {
    fn lookup(&self, name: &str) -> Option<CodePageInfo> {
        let charset = Charset::for_label(name.trim().as_bytes())?;
        let code_page = *CODE_PAGE_BY_NAME.get(charset.name())?;
        Some(CodePageInfo {
            code_page,
            name: charset.name().to_string(),
        })
    }
}

/// Code pages that have a decoder
const KNOWN_CODE_PAGES: &[u16] = &[
    65001, 1200, 1201, 874, 1250, 1251, 1252, 1253, 1254, 1255, 1256, 1257, 1258, 932, 936,
    54936, 949, 950, 20866, 21866, 28592, 28593, 28594, 28595, 28596, 28597, 28598, 38598,
    28603, 28605, 20932, 50220, 866, 10000, 10007,
];

static CODE_PAGE_BY_NAME: Lazy<HashMap<&'static str, u16>> = Lazy::new(|| {
    KNOWN_CODE_PAGES
        .iter()
        .map(|&cp| (encoding_for_code_page(cp).name(), cp))
        .collect()
});

/// Decoder for a numeric code page; unknown pages fall back to windows-1252
pub fn encoding_for_code_page(code_page: u16) -> &'static Charset {
    match code_page {
        65001 => encoding_rs::UTF_8,
        1200 => encoding_rs::UTF_16LE,
        1201 => encoding_rs::UTF_16BE,
        874 => encoding_rs::WINDOWS_874,
        1250 => encoding_rs::WINDOWS_1250,
        1251 => encoding_rs::WINDOWS_1251,
        1252 => encoding_rs::WINDOWS_1252,
        1253 => encoding_rs::WINDOWS_1253,
        1254 => encoding_rs::WINDOWS_1254,
        1255 => encoding_rs::WINDOWS_1255,
        1256 => encoding_rs::WINDOWS_1256,
        1257 => encoding_rs::WINDOWS_1257,
        1258 => encoding_rs::WINDOWS_1258,
        932 => encoding_rs::SHIFT_JIS,
        936 => encoding_rs::GBK,
        54936 => encoding_rs::GB18030,
        949 => encoding_rs::EUC_KR,
        950 => encoding_rs::BIG5,
        20866 => encoding_rs::KOI8_R,
        21866 => encoding_rs::KOI8_U,
        28592 => encoding_rs::ISO_8859_2,
        28593 => encoding_rs::ISO_8859_3,
        28594 => encoding_rs::ISO_8859_4,
        28595 => encoding_rs::ISO_8859_5,
        28596 => encoding_rs::ISO_8859_6,
        28597 => encoding_rs::ISO_8859_7,
        28598 => encoding_rs::ISO_8859_8,
        38598 => encoding_rs::ISO_8859_8_I,
        28603 => encoding_rs::ISO_8859_13,
        28605 => encoding_rs::ISO_8859_15,
        20932 => encoding_rs::EUC_JP,
        50220 => encoding_rs::ISO_2022_JP,
        866 => encoding_rs::IBM866,
        10000 => encoding_rs::MACINTOSH,
        10007 => encoding_rs::X_MAC_CYRILLIC,
        _ => encoding_rs::WINDOWS_1252,
    }
}

/// Whether `encoding_for_code_page` has a dedicated decoder for this page
pub fn has_decoder(code_page: u16) -> bool {
    KNOWN_CODE_PAGES.contains(&code_page)
}

/// Strip leading zeros from every run of digits, keeping at least one digit
/// per run ("iso-8859-05" becomes "iso-8859-5").
pub fn normalize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut chars = name.chars().peekable();
    let mut in_digits = false;

    while let Some(c) = chars.next() {
        if c == '0' && !in_digits && chars.peek().is_some_and(char::is_ascii_digit) {
            continue;
        }
        in_digits = c.is_ascii_digit();
        out.push(c);
    }
    out
}

const GENERIC_PREFIXES: &[&str] = &["windows-", "windows", "cp-", "cp", "msdos-", "msdos"];

/// Read `windows-N`, `cpN`, `msdos-N` and friends as a bare code page number
fn generic_code_page(name: &str) -> Option<u16> {
    GENERIC_PREFIXES.iter().find_map(|prefix| {
        let rest = name.strip_prefix(prefix)?;
        let digits = rest.len() - rest.trim_start_matches(|c: char| c.is_ascii_digit()).len();
        rest[..digits].parse().ok()
    })
}

/// Resolve a sniffed charset name to a code page.
///
/// Tries the table, then the generic numeric patterns. `None` means the
/// name is unusable and the default code page applies.
pub fn resolve_charset(table: &dyn CharsetTable, name: &str) -> Option<CodePageInfo> {
    let name = normalize_name(name.trim()).to_ascii_lowercase();
    if name.is_empty() {
        return None;
    }
    table
        .lookup(&name)
        .or_else(|| generic_code_page(&name).map(CodePageInfo::generic))
}
