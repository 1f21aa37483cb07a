use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

use assert_cmd::Command as AssertCommand;
use predicates::prelude::*;
use tempfile::{Builder, NamedTempFile};

/// Run plainview with given args and return (stdout, stderr, exit_code)
fn run_plainview(args: &[&str]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_plainview"))
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .env("TERM", "dumb")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute plainview");

    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.code().unwrap_or(-1),
    )
}

/// Temp file with the given extension and raw content
fn fixture(suffix: &str, content: &[u8]) -> NamedTempFile {
    let mut file = Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(content).unwrap();
    file.flush().unwrap();
    file
}

fn path_str(file: &NamedTempFile) -> &str {
    file.path().to_str().unwrap()
}

fn grep_available() -> bool {
    Command::new("grep")
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok_and(|status| status.success())
}

// ============ CLI Tests ============

#[test]
fn test_help_flag() {
    let (stdout, _, code) = run_plainview(&["--help"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("Usage:"));
    assert!(stdout.contains("--line-numbers"));
    assert!(stdout.contains("--grep"));
    assert!(stdout.contains("--encoding"));
}

#[test]
fn test_version_flag() {
    let (stdout, _, code) = run_plainview(&["--version"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("plainview"));
}

#[test]
fn test_file_not_found() {
    let (_, stderr, code) = run_plainview(&["-P", "/nonexistent/file.txt"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("plainview:"));
    assert!(stderr.contains("/nonexistent/file.txt"));
}

#[test]
fn test_invalid_tab_width() {
    let (_, _, code) = run_plainview(&["-P", "-t", "3", "whatever.txt"]);
    assert_eq!(code, 2);
}

#[test]
fn test_unknown_code_page_rejected() {
    let file = fixture(".txt", b"x\n");
    AssertCommand::cargo_bin("plainview")
        .unwrap()
        .args(["-P", "-c", "4242", path_str(&file)])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--code-page"));
}

// ============ Basic File Reading Tests ============

#[test]
fn test_read_simple_file() {
    let file = fixture(".txt", b"Hello\nWorld\n");
    let (stdout, _, code) = run_plainview(&["-P", path_str(&file)]);
    assert_eq!(code, 0);
    assert_eq!(stdout, "Hello\nWorld\n");
}

#[test]
fn test_read_crlf_and_missing_final_newline() {
    let file = fixture(".txt", b"one\r\ntwo\r\nthree");
    let (stdout, _, code) = run_plainview(&["-P", path_str(&file)]);
    assert_eq!(code, 0);
    assert_eq!(stdout, "one\ntwo\nthree\n");
}

#[test]
fn test_read_with_line_numbers() {
    let content: String = (1..=10).map(|i| format!("Line {i}\n")).collect();
    let file = fixture(".txt", content.as_bytes());
    let (stdout, _, code) = run_plainview(&["-P", "-n", path_str(&file)]);
    assert_eq!(code, 0);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines[0], " 1 Line 1");
    assert_eq!(lines[9], "10 Line 10");
}

#[test]
fn test_empty_file() {
    let file = fixture(".txt", b"");
    let (stdout, _, code) = run_plainview(&["-P", path_str(&file)]);
    assert_eq!(code, 0);
    assert!(stdout.is_empty());
}

#[test]
fn test_stats_on_stderr() {
    let file = fixture(".txt", b"a\nb\nc\n");
    AssertCommand::cargo_bin("plainview")
        .unwrap()
        .args(["-P", "--stats", path_str(&file)])
        .assert()
        .success()
        .stdout("a\nb\nc\n")
        .stderr(predicate::str::is_match(r"^3 lines / elapsed time: [0-9,]+ ms\n$").unwrap());
}

#[test]
fn test_tab_expansion() {
    let file = fixture(".txt", b"a\tb\n");
    let (stdout, _, _) = run_plainview(&["-P", "-t", "4", path_str(&file)]);
    assert_eq!(stdout, "a   b\n");
}

// ============ Line Range Tests ============

#[test]
fn test_line_range_full() {
    let content: String = (1..=20).map(|i| format!("Line {i}\n")).collect();
    let file = fixture(".txt", content.as_bytes());
    let (stdout, _, code) = run_plainview(&["-P", "-L", "5:7", path_str(&file)]);
    assert_eq!(code, 0);
    assert_eq!(stdout, "Line 5\nLine 6\nLine 7\n");
}

#[test]
fn test_line_range_to_end() {
    let content: String = (1..=20).map(|i| format!("Line {i}\n")).collect();
    let file = fixture(".txt", content.as_bytes());
    let (stdout, _, _) = run_plainview(&["-P", "-L", "19:", path_str(&file)]);
    assert_eq!(stdout, "Line 19\nLine 20\n");
}

#[test]
fn test_line_range_invalid() {
    let file = fixture(".txt", b"a\n");
    let (_, stderr, code) = run_plainview(&["-P", "-L", "abc", path_str(&file)]);
    assert_eq!(code, 2);
    assert!(stderr.contains("Invalid line range"));
}

// ============ Encoding Tests ============

#[test]
fn test_utf8_bom_is_not_printed() {
    let file = fixture(".txt", "\u{FEFF}héllo\n".as_bytes());
    let (stdout, _, _) = run_plainview(&["-P", path_str(&file)]);
    assert_eq!(stdout, "héllo\n");
}

#[test]
fn test_utf16le_with_bom() {
    let mut data = vec![0xFF, 0xFE];
    data.extend("привет\nworld\n".encode_utf16().flat_map(u16::to_le_bytes));
    let file = fixture(".txt", &data);
    let (stdout, _, code) = run_plainview(&["-P", "-n", path_str(&file)]);
    assert_eq!(code, 0);
    assert_eq!(stdout, "1 привет\n2 world\n");
}

#[test]
fn test_utf16be_forced() {
    let data: Vec<u8> = "abc\nd\n".encode_utf16().flat_map(u16::to_be_bytes).collect();
    let file = fixture(".txt", &data);
    let (stdout, _, _) = run_plainview(&["-P", "-e", "ucs2be", path_str(&file)]);
    assert_eq!(stdout, "abc\nd\n");
}

#[test]
fn test_default_code_page_is_windows_1252() {
    let file = fixture(".txt", b"caf\xe9\n");
    let (stdout, _, _) = run_plainview(&["-P", path_str(&file)]);
    assert_eq!(stdout, "café\n");
}

#[test]
fn test_code_page_override() {
    let file = fixture(".txt", b"\xe0\n");
    let (stdout, _, _) = run_plainview(&["-P", "-c", "1251", path_str(&file)]);
    assert_eq!(stdout, "а\n");
}

#[test]
fn test_xml_declared_encoding() {
    let file = fixture(
        ".xml",
        b"<?xml version=\"1.0\" encoding=\"iso-8859-5\"?>\n<a>\xd0</a>\n",
    );
    let (stdout, _, _) = run_plainview(&["-P", "-L", "2", path_str(&file)]);
    assert_eq!(stdout, "<a>а</a>\n");
}

#[test]
fn test_xml_declaration_in_txt_file() {
    let file = fixture(
        ".txt",
        b"<?xml version=\"1.0\" encoding=\"windows-1251\"?>\n<a>\xe0</a>\n",
    );
    let (stdout, _, _) = run_plainview(&["-P", "-L", "2", path_str(&file)]);
    assert_eq!(stdout, "<a>а</a>\n");
}

#[test]
fn test_html_meta_charset() {
    let file = fixture(
        ".html",
        b"<html><head><meta http-equiv=\"Content-Type\" content=\"text/html; charset=windows-1251\"></head>\n<body>\xe0</body>\n",
    );
    let (stdout, _, _) = run_plainview(&["-P", "-L", "2", path_str(&file)]);
    assert_eq!(stdout, "<body>а</body>\n");
}

#[test]
fn test_po_content_type() {
    let file = fixture(
        ".po",
        b"msgid \"\"\nmsgstr \"\"\n\"Content-Type: text/plain; charset=KOI8-R\\n\"\n\nmsgid \"a\"\nmsgstr \"\xc1\"\n",
    );
    let (stdout, _, _) = run_plainview(&["-P", "-L", "6", path_str(&file)]);
    assert_eq!(stdout, "msgstr \"а\"\n");
}

#[test]
fn test_rc_pragma() {
    let file = fixture(".rc", b"#pragma code_page(1251)\nCAPTION \"\xe0\"\n");
    let (stdout, _, _) = run_plainview(&["-P", "-L", "2", path_str(&file)]);
    assert_eq!(stdout, "CAPTION \"а\"\n");
}

#[test]
fn test_file_type_override() {
    let file = fixture(".tmpl", b"<meta charset=\"koi8-r\">\n\xc1\n");
    let spec = "html=tmpl";
    let (stdout, _, _) = run_plainview(&["-P", "--file-type", spec, "-L", "2", path_str(&file)]);
    assert_eq!(stdout, "а\n");
}

// ============ Delimiter Tests ============

#[test]
fn test_xml_mode_splits_on_tags() {
    let file = fixture(".txt", b"<a><b\n  x=\"1\">text</b>");
    let (stdout, _, _) = run_plainview(&["-P", "-e", "xml", path_str(&file)]);
    assert_eq!(stdout, "<a\n<b x=\"1\"\ntext</b\n");
}

#[test]
fn test_custom_delimiter() {
    let file = fixture(".txt", b"a;b;c");
    let (stdout, _, _) = run_plainview(&["-P", "-d", ";", path_str(&file)]);
    assert_eq!(stdout, "a\nb\nc\n");
}

#[test]
fn test_custom_delimiter_needs_agrep() {
    let file = fixture(".txt", b"a;b;c");
    let (_, stderr, code) = run_plainview(&["-P", "-d", ";", "-g", "b", path_str(&file)]);
    assert_eq!(code, 2);
    assert!(stderr.contains("agrep"));
}

// ============ Filter Tests ============

#[test]
fn test_empty_pattern() {
    let file = fixture(".txt", b"a\n");
    let (_, stderr, code) = run_plainview(&["-P", "-g", "", path_str(&file)]);
    assert_eq!(code, 2);
    assert!(stderr.contains("Empty pattern"));
}

#[test]
fn test_missing_filter_tool() {
    let file = fixture(".txt", b"a\n");
    let (_, stderr, code) = run_plainview(&[
        "-P",
        "-g",
        "a",
        "--filter-tool",
        "/nonexistent/plainview-grep",
        path_str(&file),
    ]);
    assert_eq!(code, 1);
    assert!(stderr.contains("Failed to start filter program"));
}

#[test]
fn test_grep_basic() {
    if !grep_available() {
        return;
    }
    let file = fixture(".txt", b"apple\nbanana\ncherry\nblueberry\n");
    let (stdout, _, code) = run_plainview(&["-P", "-n", "-g", "b", path_str(&file)]);
    assert_eq!(code, 0);
    assert_eq!(stdout, "2 banana\n4 blueberry\n");
}

#[test]
fn test_grep_options() {
    if !grep_available() {
        return;
    }
    let file = fixture(".txt", b"Alpha\nalphabet\nbeta.x\nbetax\n");
    let path = path_str(&file);

    let (stdout, _, _) = run_plainview(&["-P", "-i", "-x", "-g", "alpha", path]);
    assert_eq!(stdout, "Alpha\n");

    let (stdout, _, _) = run_plainview(&["-P", "-F", "-g", "beta.x", path]);
    assert_eq!(stdout, "beta.x\n");

    let (stdout, _, _) = run_plainview(&["-P", "-v", "-g", "beta", path]);
    assert_eq!(stdout, "Alpha\nalphabet\n");

    let (stdout, _, _) = run_plainview(&["-P", "-F", "--begins-with", "-g", "alpha", path]);
    assert_eq!(stdout, "alphabet\n");
}

#[test]
fn test_grep_no_matches() {
    if !grep_available() {
        return;
    }
    let file = fixture(".txt", b"one\ntwo\n");
    let (stdout, _, code) = run_plainview(&["-P", "-g", "zzz", path_str(&file)]);
    assert_eq!(code, 0);
    assert!(stdout.is_empty());
}

#[test]
fn test_grep_invalid_regex() {
    if !grep_available() {
        return;
    }
    let file = fixture(".txt", b"(\n");
    let (_, stderr, code) = run_plainview(&["-P", "-g", "(", path_str(&file)]);
    assert_eq!(code, 1);
    assert!(stderr.contains("Filter program said"));
}

#[test]
fn test_grep_utf16_file() {
    if !grep_available() {
        return;
    }
    let mut data = vec![0xFF, 0xFE];
    data.extend("один\nдва\nтри\n".encode_utf16().flat_map(u16::to_le_bytes));
    let file = fixture(".txt", &data);
    let (stdout, _, code) = run_plainview(&["-P", "-n", "-g", "два", path_str(&file)]);
    assert_eq!(code, 0);
    assert_eq!(stdout, "2 два\n");
}

#[test]
fn test_binary_path_exists() {
    assert!(Path::new(env!("CARGO_BIN_EXE_plainview")).exists());
}
