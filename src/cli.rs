use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::filter::ToolSyntax;
use crate::input::{Encoding, OpenMode};

/// How to interpret the bytes of the file
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum EncodingArg {
    /// Detect from byte-order mark and content
    #[default]
    Auto,
    /// Legacy single- or multi-byte code page
    Ansi,
    Utf8,
    Ucs2le,
    Ucs2be,
    /// Detect the encoding, one record per XML tag
    Xml,
}

impl EncodingArg {
    /// Open mode for this choice; `delimiter` applies only to `auto`
    pub fn open_mode(self, delimiter: Option<u8>) -> OpenMode {
        match self {
            EncodingArg::Auto => OpenMode::delimited(delimiter.unwrap_or(b'\n')),
            EncodingArg::Ansi => OpenMode::forced(Encoding::Ansi),
            EncodingArg::Utf8 => OpenMode::forced(Encoding::Utf8),
            EncodingArg::Ucs2le => OpenMode::forced(Encoding::Ucs2Le),
            EncodingArg::Ucs2be => OpenMode::forced(Encoding::Ucs2Be),
            EncodingArg::Xml => OpenMode::delimited(b'>'),
        }
    }
}

/// plainview - a viewer for very large text files in any encoding
#[derive(Parser, Debug)]
#[command(name = "plainview")]
#[command(version)]
#[command(about = "A viewer for very large text files, with encoding detection and external grep filtering")]
#[command(long_about = None)]
pub struct Args {
    /// Input file
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Show line numbers
    #[arg(short = 'n', long = "line-numbers")]
    pub line_numbers: bool,

    /// Filter to lines matched by the external tool
    #[arg(short = 'g', long = "grep", value_name = "PAT")]
    pub grep: Option<String>,

    /// Case-insensitive filter
    #[arg(short = 'i', long = "ignore-case")]
    pub ignore_case: bool,

    /// Treat pattern as literal string, not regex
    #[arg(short = 'F', long = "fixed-strings")]
    pub fixed_strings: bool,

    /// Match whole words only
    #[arg(short = 'w', long = "word-regexp")]
    pub word_regexp: bool,

    /// Match whole lines only
    #[arg(short = 'x', long = "line-regexp")]
    pub line_regexp: bool,

    /// Match only at the start of a line
    #[arg(long = "begins-with")]
    pub begins_with: bool,

    /// Match only at the end of a line
    #[arg(long = "ends-with")]
    pub ends_with: bool,

    /// Select non-matching lines
    #[arg(short = 'v', long = "invert-match")]
    pub invert_match: bool,

    /// Show line range: 50:100, :100, 50:, or 50
    #[arg(short = 'L', long = "lines", value_name = "RANGE")]
    pub lines: Option<String>,

    /// Direct output, skip TUI pager
    #[arg(short = 'P', long = "no-pager")]
    pub no_pager: bool,

    /// File encoding: auto, ansi, utf8, ucs2le, ucs2be, xml
    #[arg(short = 'e', long = "encoding", value_enum, default_value = "auto")]
    pub encoding: EncodingArg,

    /// Record delimiter for auto encoding: a character, \n, \t, \r, \0, 0xNN or a byte value
    #[arg(short = 'd', long = "delimiter", value_name = "DELIM", value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,

    /// Display with this code page instead of the detected one
    #[arg(short = 'c', long = "code-page", value_name = "N")]
    pub code_page: Option<u16>,

    /// Code page for files with no detectable encoding
    #[arg(long = "default-code-page", value_name = "N", default_value = "1252")]
    pub default_code_page: u16,

    /// Tab width (power of two, 1 to 32)
    #[arg(short = 't', long = "tab-width", value_name = "N", default_value = "8", value_parser = parse_tab_width)]
    pub tab_width: usize,

    /// Extensions for a sniffed file type, e.g. html=htm;html;xhtml (repeatable)
    #[arg(long = "file-type", value_name = "TAG=EXTS")]
    pub file_types: Vec<String>,

    /// Filter program to run
    #[arg(long = "filter-tool", value_name = "PROGRAM", default_value = "grep")]
    pub filter_tool: String,

    /// Command-line dialect of the filter program
    #[arg(long = "tool-syntax", value_enum, default_value = "grep")]
    pub tool_syntax: ToolSyntax,

    /// Print scan statistics to stderr
    #[arg(long = "stats")]
    pub stats: bool,
}

/// Parse a record delimiter given on the command line
pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    let parsed = match value {
        "\\n" => Some(b'\n'),
        "\\t" => Some(b'\t'),
        "\\r" => Some(b'\r'),
        "\\0" => Some(0),
        _ if value.len() == 1 => value.bytes().next(),
        _ => match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
            Some(hex) => u8::from_str_radix(hex, 16).ok(),
            None => value.parse().ok(),
        },
    };
    parsed.ok_or_else(|| format!("'{value}' is not a single-byte delimiter"))
}

/// Parse a tab width: a power of two from 1 to 32
pub fn parse_tab_width(value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(width) if (1..=32).contains(&width) && width.is_power_of_two() => Ok(width),
        _ => Err(format!("'{value}' is not a power of two between 1 and 32")),
    }
}
