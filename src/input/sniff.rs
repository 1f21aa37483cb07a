//! Content sniffing for files that carry no byte-order mark.
//!
//! Each format has a small parser over one fragment of the file head: XML and
//! HTML look at one tag (text up to a `>`), RC and PO at one line. The
//! `sniff_code_page` driver feeds them fragments peeked from a `LineReader`
//! without moving its cursor.

use std::io::Read;

use log::debug;

use super::codepage::{resolve_charset, CharsetTable};
use super::encoding::CodePageInfo;
use super::reader::LineReader;
use crate::config::FileType;

/// Window for deciding whether a file starts with an XML declaration
const XML_PROBE_LIMIT: usize = 80;

/// Longest fragment any parser looks at
const FRAGMENT_LIMIT: usize = 1023;

fn is_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

/// Whether the file head opens with `<?xml` followed by whitespace
pub fn starts_with_xml_declaration(head: &[u8]) -> bool {
    head.strip_prefix(b"<?xml")
        .and_then(|rest| rest.first())
        .is_some_and(|&c| is_space(c as char))
}

/// `name=value` pairs of the last tag in `fragment` if it is a `tag` tag.
///
/// Names and values are lowercased. Parsing continues only while attributes
/// are separated by whitespace.
fn tag_attributes(fragment: &[u8], tag: &str) -> Option<Vec<(String, String)>> {
    let text = String::from_utf8_lossy(fragment).to_ascii_lowercase();
    let start = text.rfind('<')? + 1;
    let rest = text[start..].strip_prefix(tag)?;
    if !rest.starts_with(is_space) {
        return None;
    }

    let mut attributes = Vec::new();
    let mut cursor = rest.trim_start_matches(is_space);
    while !cursor.is_empty() {
        let name_end = cursor.find(|c: char| c == '=' || is_space(c)).unwrap_or(cursor.len());
        let name = &cursor[..name_end];
        cursor = &cursor[name_end..];

        let mut value = "";
        if let Some(after) = cursor.strip_prefix('=') {
            (value, cursor) = split_value(after);
        }
        attributes.push((name.to_string(), value.to_string()));

        let trimmed = cursor.trim_start_matches(is_space);
        if trimmed.len() == cursor.len() {
            break;
        }
        cursor = trimmed;
    }
    Some(attributes)
}

/// Split an attribute value off the front of `s`, returning (value, rest)
fn split_value(s: &str) -> (&str, &str) {
    let mut chars = s.chars();
    match chars.next() {
        Some(quote @ ('"' | '\'')) => match s[1..].find(quote) {
            Some(end) => (&s[1..end + 1], &s[end + 2..]),
            None => (s[1..].trim_end_matches(['>', quote]), ""),
        },
        _ => {
            let end = s.find(|c: char| is_space(c) || c == '>').unwrap_or(s.len());
            (s[..end].trim_matches(['\'', '"', '?', '/']), &s[end..])
        }
    }
}

fn attribute<'a>(attributes: &'a [(String, String)], name: &str) -> Option<&'a str> {
    attributes
        .iter()
        .find(|(n, _)| n == name)
        .map(|(_, value)| value.as_str())
}

/// Value of a ` charset = X` parameter among `separators`-delimited parts
pub fn charset_parameter(content: &str, separators: &[char]) -> Option<String> {
    content
        .split(separators)
        .filter(|part| !part.is_empty())
        .find_map(|part| {
            let rest = part.trim_start_matches(is_space).strip_prefix("charset")?;
            let value = rest.trim_start_matches(is_space).strip_prefix('=')?;
            Some(value.trim_matches(is_space).to_string())
        })
        .filter(|value| !value.is_empty())
}

/// Encoding named by an `<?xml ... encoding="..."?>` declaration
pub fn xml_declared_encoding(fragment: &[u8]) -> Option<String> {
    let attributes = tag_attributes(fragment, "?xml")?;
    attribute(&attributes, "encoding")
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Charset declared by a `<meta>` tag, either as an HTML5 `charset`
/// attribute or inside an `http-equiv="content-type"` content value
pub fn html_meta_charset(fragment: &[u8]) -> Option<String> {
    let attributes = tag_attributes(fragment, "meta")?;
    let http_equiv = attribute(&attributes, "http-equiv");
    let content = attribute(&attributes, "content");

    match (http_equiv, content) {
        (Some("content-type"), Some(content)) => charset_parameter(content, &[';']),
        _ => attribute(&attributes, "charset")
            .filter(|value| !value.is_empty())
            .map(str::to_string),
    }
}

/// Whether a tag fragment shows the document head is over
fn html_head_ended(fragment: &[u8]) -> bool {
    let text = String::from_utf8_lossy(fragment).to_ascii_lowercase();
    text.rfind('<')
        .map(|start| &text[start..])
        .is_some_and(|tag| tag.starts_with("<body") || tag.starts_with("</head"))
}

/// Code page from a `#pragma code_page(N)` line
pub fn rc_code_page(line: &[u8]) -> Option<u16> {
    let text = std::str::from_utf8(line).ok()?;
    let rest = text.strip_prefix("#pragma")?;
    let rest = rest
        .trim_start_matches(is_space)
        .strip_prefix("code_page(")?
        .trim_start_matches(is_space);
    let digits = rest.len() - rest.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    rest[..digits].parse().ok()
}

/// Unslashed text after `"Content-Type:` if `line` is that PO header line
pub fn po_content_type(line: &[u8]) -> Option<String> {
    let lower = line.to_ascii_lowercase();
    let rest = lower.strip_prefix(b"\"content-type:")?;
    Some(String::from_utf8_lossy(&unslash(rest)).into_owned())
}

/// Resolve C-style backslash escapes
pub fn unslash(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len());
    let mut i = 0;
    while i < input.len() {
        let c = input[i];
        i += 1;
        if c != b'\\' || i == input.len() {
            out.push(c);
            continue;
        }
        let escaped = input[i];
        i += 1;
        let byte = match escaped {
            b'a' => 0x07,
            b'b' => 0x08,
            b'f' => 0x0C,
            b'n' => b'\n',
            b'r' => b'\r',
            b't' => b'\t',
            b'v' => 0x0B,
            b'x' => match radix_prefix(&input[i..], 16) {
                (0, _) => b'x',
                (len, value) => {
                    i += len;
                    value as u8
                }
            },
            b'0'..=b'7' => {
                let (len, value) = radix_prefix(&input[i - 1..], 8);
                i += len - 1;
                value as u8
            }
            other => other,
        };
        out.push(byte);
    }
    out
}

/// Length and wrapping value of the leading digits of `bytes` in `radix`
fn radix_prefix(bytes: &[u8], radix: u32) -> (usize, u32) {
    bytes
        .iter()
        .map_while(|&b| (b as char).to_digit(radix))
        .fold((0, 0u32), |(len, value), digit| {
            (len + 1, value.wrapping_mul(radix).wrapping_add(digit))
        })
}

/// Sniff a code page from the resident head of `reader`.
///
/// Returns `None` when the content does not name one, or names one that
/// cannot be resolved.
pub fn sniff_code_page<R: Read>(
    reader: &LineReader<R>,
    file_type: FileType,
    charsets: &dyn CharsetTable,
) -> Option<CodePageInfo> {
    let probe = reader.peek_line(0, XML_PROBE_LIMIT, b'>').unwrap_or_default();
    let file_type = if starts_with_xml_declaration(probe) {
        FileType::Xml
    } else {
        file_type
    };

    let fragments = move |eol: u8| {
        let mut offset = 0;
        std::iter::from_fn(move || {
            let fragment = reader.peek_line(offset, FRAGMENT_LIMIT, eol)?;
            offset += fragment.len();
            Some(fragment)
        })
    };

    let resolve = |name: String| {
        let info = resolve_charset(charsets, &name);
        if info.is_none() {
            debug!("Charset name '{}' did not resolve to a code page", name);
        }
        info
    };

    match file_type {
        FileType::Xml => fragments(b'>')
            .next()
            .and_then(xml_declared_encoding)
            .and_then(resolve),
        FileType::Html => fragments(b'>')
            .take_while(|fragment| !html_head_ended(fragment))
            .find_map(html_meta_charset)
            .and_then(resolve),
        FileType::Rc => fragments(b'\n')
            .find_map(rc_code_page)
            .map(CodePageInfo::generic),
        FileType::Po => fragments(b'\n')
            .find_map(po_content_type)
            .and_then(|content| charset_parameter(&content, &['"', ';']))
            .and_then(resolve),
        FileType::Other => None,
    }
}
