use clap::ValueEnum;
use log::debug;

use crate::cli::Args;

use super::FilterError;

/// Command-line dialect of the external filter program
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum ToolSyntax {
    /// POSIX grep
    #[default]
    Grep,
    /// Windows FINDSTR
    Findstr,
    /// TRE agrep, the only one that understands custom record delimiters
    Agrep,
}

/// Match options for one filter run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterOptions {
    pub ignore_case: bool,
    /// Pattern is a plain string, not a regular expression
    pub literal: bool,
    pub begins_with: bool,
    pub ends_with: bool,
    pub whole_word: bool,
    /// Select lines that do not match
    pub invert: bool,
}

impl FilterOptions {
    /// Create FilterOptions from CLI args
    pub fn from_args(args: &Args) -> Self {
        Self {
            ignore_case: args.ignore_case,
            literal: args.fixed_strings,
            begins_with: args.begins_with || args.line_regexp,
            ends_with: args.ends_with || args.line_regexp,
            whole_word: args.word_regexp,
            invert: args.invert_match,
        }
    }

    fn anchored(&self) -> bool {
        self.begins_with || self.ends_with
    }
}

/// Escape the characters that are special in a POSIX extended regex
pub fn escape_ere(pattern: &str) -> String {
    let mut escaped = String::with_capacity(pattern.len() * 2);
    for ch in pattern.chars() {
        if matches!(ch, '.' | '[' | ']' | '(' | ')' | '*' | '+' | '?' | '{' | '}' | '|' | '^' | '$' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Wrap an extended regex in the anchors the options ask for
fn anchor(expression: &str, options: &FilterOptions) -> String {
    format!(
        "{}({}){}",
        if options.begins_with { "^" } else { "" },
        expression,
        if options.ends_with { "$" } else { "" }
    )
}

/// Expand FINDSTR shortcuts: `[set]+` becomes `[set][set]*` and `[set]^`
/// repeats the set once more
pub fn expand_repetitions(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len());
    // Start of the last `[`, and position of a `]` directly before the cursor
    let mut open = 0;
    let mut close: Option<usize> = None;
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        match ch {
            '[' => {
                open = i;
                close = Some(i);
                out.push(ch);
            }
            ']' => {
                close = Some(i);
                out.push(ch);
            }
            '+' | '^' => match close.filter(|&c| open < c) {
                Some(c) => {
                    out.extend(&chars[open..=c]);
                    if ch == '+' {
                        out.push('*');
                        close = None;
                    }
                }
                None => out.push(ch),
            },
            '\\' => {
                out.push(ch);
                if let Some(&next) = chars.get(i + 1) {
                    out.push(next);
                    i += 1;
                }
                close = None;
            }
            _ => {
                out.push(ch);
                close = None;
            }
        }
        i += 1;
    }
    out
}

/// Command-line arguments for `syntax`, not including the input path
pub fn tool_args(
    syntax: ToolSyntax,
    pattern: &str,
    options: &FilterOptions,
    delimiter: u8,
) -> Result<Vec<String>, FilterError> {
    if delimiter != b'\n' && syntax != ToolSyntax::Agrep {
        return Err(FilterError::UnsupportedDelimiter { delimiter });
    }

    let args = match syntax {
        ToolSyntax::Grep => {
            let mut args = vec!["-n".to_string(), "-a".to_string()];
            if options.ignore_case {
                args.push("-i".to_string());
            }
            if options.invert {
                args.push("-v".to_string());
            }
            if options.whole_word {
                args.push("-w".to_string());
            }
            let expression = if options.anchored() {
                args.push("-E".to_string());
                let base = if options.literal {
                    escape_ere(pattern)
                } else {
                    pattern.to_string()
                };
                anchor(&base, options)
            } else {
                args.push(if options.literal { "-F" } else { "-E" }.to_string());
                pattern.to_string()
            };
            args.push("-e".to_string());
            args.push(expression);
            args
        }
        ToolSyntax::Findstr => {
            let mut switches = String::from("/N");
            if options.begins_with {
                switches.push('B');
            }
            if options.ends_with {
                switches.push('E');
            }
            switches.push(if options.literal { 'L' } else { 'R' });
            if options.ignore_case {
                switches.push('I');
            }
            if options.invert {
                switches.push('V');
            }
            let expression = if options.literal {
                if options.whole_word {
                    debug!("FINDSTR has no whole-word switch for literal patterns");
                }
                pattern.to_string()
            } else if options.whole_word {
                format!("\\<{}\\>", expand_repetitions(pattern))
            } else {
                expand_repetitions(pattern)
            };
            // One search string, never read as a switch
            vec![switches, format!("/C:{expression}")]
        }
        ToolSyntax::Agrep => {
            let mut switches = String::from("-n");
            if options.whole_word {
                switches.push('w');
            }
            // Anchors only work in regex mode, so anchored literals get escaped instead
            if options.literal && !options.anchored() {
                switches.push('k');
            }
            if options.ignore_case {
                switches.push('i');
            }
            if options.invert {
                switches.push('v');
            }
            if delimiter >= b'!' {
                switches.push('M');
                switches.push('d');
                switches.push(delimiter as char);
            }
            let expression = match (options.anchored(), options.literal) {
                (true, true) => anchor(&escape_ere(pattern), options),
                (true, false) => anchor(pattern, options),
                _ => pattern.to_string(),
            };
            vec![switches, "-e".to_string(), expression]
        }
    };
    Ok(args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn opts() -> FilterOptions {
        FilterOptions::default()
    }

    #[test]
    fn test_grep_default_args() {
        let args = tool_args(ToolSyntax::Grep, "fo+", &opts(), b'\n').unwrap();
        assert_eq!(args, vec!["-n", "-a", "-E", "-e", "fo+"]);
    }

    #[test]
    fn test_grep_flags() {
        let options = FilterOptions {
            ignore_case: true,
            invert: true,
            whole_word: true,
            literal: true,
            ..opts()
        };
        let args = tool_args(ToolSyntax::Grep, "a.b", &options, b'\n').unwrap();
        assert_eq!(args, vec!["-n", "-a", "-i", "-v", "-w", "-F", "-e", "a.b"]);
    }

    #[test]
    fn test_grep_anchored_literal_is_escaped() {
        let options = FilterOptions {
            literal: true,
            begins_with: true,
            ends_with: true,
            ..opts()
        };
        let args = tool_args(ToolSyntax::Grep, "a.b(c)", &options, b'\n').unwrap();
        assert_eq!(args, vec!["-n", "-a", "-E", "-e", "^(a\\.b\\(c\\))$"]);
    }

    #[test]
    fn test_grep_begins_with_regex() {
        let options = FilterOptions {
            begins_with: true,
            ..opts()
        };
        let args = tool_args(ToolSyntax::Grep, "x|y", &options, b'\n').unwrap();
        assert_eq!(args.last().unwrap(), "^(x|y)");
    }

    #[test]
    fn test_findstr_switches() {
        let options = FilterOptions {
            begins_with: true,
            ends_with: true,
            ignore_case: true,
            invert: true,
            ..opts()
        };
        let args = tool_args(ToolSyntax::Findstr, "[0-9]+", &options, b'\n').unwrap();
        assert_eq!(args, vec!["/NBERIV", "/C:[0-9][0-9]*"]);

        let literal = FilterOptions { literal: true, ..opts() };
        let args = tool_args(ToolSyntax::Findstr, "[0-9]+", &literal, b'\n').unwrap();
        assert_eq!(args, vec!["/NL", "/C:[0-9]+"]);
    }

    #[test]
    fn test_agrep_switches_and_delimiter() {
        let options = FilterOptions {
            whole_word: true,
            literal: true,
            ignore_case: true,
            invert: true,
            ..opts()
        };
        let args = tool_args(ToolSyntax::Agrep, "item", &options, b'>').unwrap();
        assert_eq!(args, vec!["-nwkivMd>", "-e", "item"]);

        let args = tool_args(ToolSyntax::Agrep, "item", &opts(), b'\n').unwrap();
        assert_eq!(args, vec!["-n", "-e", "item"]);
    }

    #[test]
    fn test_leading_dash_pattern_is_not_a_switch() {
        for syntax in [ToolSyntax::Grep, ToolSyntax::Agrep] {
            let args = tool_args(syntax, "-v", &opts(), b'\n').unwrap();
            let (pattern, rest) = args.split_last().unwrap();
            assert_eq!(pattern, "-v");
            assert_eq!(rest.last().map(String::as_str), Some("-e"));
        }

        let args = tool_args(ToolSyntax::Findstr, "/V", &opts(), b'\n').unwrap();
        assert_eq!(args, vec!["/NR", "/C:/V"]);
        let args = tool_args(ToolSyntax::Findstr, "-x y", &opts(), b'\n').unwrap();
        assert_eq!(args, vec!["/NR", "/C:-x y"]);
    }

    #[test]
    fn test_custom_delimiter_needs_agrep() {
        let err = tool_args(ToolSyntax::Grep, "x", &opts(), b'>').unwrap_err();
        assert!(matches!(err, FilterError::UnsupportedDelimiter { delimiter: b'>' }));
        assert!(tool_args(ToolSyntax::Findstr, "x", &opts(), b';').is_err());
    }

    #[test]
    fn test_expand_repetitions() {
        assert_eq!(expand_repetitions("[a-z]+"), "[a-z][a-z]*");
        assert_eq!(expand_repetitions("x[0-9]+y"), "x[0-9][0-9]*y");
        assert_eq!(expand_repetitions("[ab]^"), "[ab][ab]");
        assert_eq!(expand_repetitions("a+"), "a+");
        assert_eq!(expand_repetitions("[^x]"), "[^x]");
        assert_eq!(expand_repetitions("[a]x+"), "[a]x+");
        assert_eq!(expand_repetitions("\\[a\\]+"), "\\[a\\]+");
        assert_eq!(expand_repetitions("[a]++"), "[a][a]*+");
    }

    #[test]
    fn test_escape_ere() {
        assert_eq!(escape_ere("a.b*c"), "a\\.b\\*c");
        assert_eq!(escape_ere("plain text"), "plain text");
        assert_eq!(escape_ere("$5^"), "\\$5\\^");
    }

    #[test]
    fn test_options_from_args() {
        let args = Args::try_parse_from(["plainview", "-x", "-i", "-v", "f.txt"]).unwrap();
        let options = FilterOptions::from_args(&args);
        assert!(options.begins_with && options.ends_with);
        assert!(options.ignore_case && options.invert);
        assert!(!options.literal && !options.whole_word);
    }
}
