use std::path::Path;
use std::time::Duration;

use crate::cli::Args;
use crate::error::ViewError;
use crate::filter::ToolSyntax;
use crate::input::{has_decoder, DEFAULT_CODE_PAGE};

/// How often the foreground checks on a running scan
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Formats whose content may name their own encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileType {
    Xml,
    Html,
    Rc,
    Po,
    Other,
}

impl FileType {
    fn from_tag(tag: &str) -> Option<Self> {
        match tag.to_ascii_lowercase().as_str() {
            "xml" => Some(FileType::Xml),
            "html" => Some(FileType::Html),
            "rc" => Some(FileType::Rc),
            "po" => Some(FileType::Po),
            _ => None,
        }
    }
}

/// Extension lists deciding which sniffer runs for a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTypeMap {
    entries: Vec<(FileType, Vec<String>)>,
}

impl Default for FileTypeMap {
    fn default() -> Self {
        let entry = |file_type, exts: &[&str]| (file_type, exts.iter().map(|e| e.to_string()).collect());
        Self {
            entries: vec![
                entry(FileType::Xml, &["xml", "xsl", "xslt", "xsd", "svg", "config", "manifest", "resx", "vcxproj", "csproj"]),
                entry(FileType::Html, &["html", "htm", "xhtml", "shtml", "hta"]),
                entry(FileType::Rc, &["rc", "rc2", "dlg"]),
                entry(FileType::Po, &["po", "pot"]),
            ],
        }
    }
}

impl FileTypeMap {
    /// Replace the extension list of one type from a `TAG=ext;ext` spec
    pub fn apply(&mut self, spec: &str) -> Result<(), ViewError> {
        let invalid = || ViewError::InvalidOption {
            option: "--file-type".to_string(),
            value: spec.to_string(),
        };
        let (tag, exts) = spec.split_once('=').ok_or_else(invalid)?;
        let file_type = FileType::from_tag(tag.trim()).ok_or_else(invalid)?;
        let exts: Vec<String> = exts
            .split([';', ','])
            .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();

        match self.entries.iter_mut().find(|(t, _)| *t == file_type) {
            Some((_, list)) => *list = exts,
            None => self.entries.push((file_type, exts)),
        }
        Ok(())
    }

    /// Classify a path by its extension
    pub fn classify(&self, path: &Path) -> FileType {
        let Some(ext) = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|s| s.to_lowercase())
        else {
            return FileType::Other;
        };
        self.entries
            .iter()
            .find(|(_, exts)| exts.iter().any(|e| *e == ext))
            .map(|(file_type, _)| *file_type)
            .unwrap_or(FileType::Other)
    }
}

/// Settings shared by the scan, display and filter paths
#[derive(Debug, Clone)]
pub struct ViewerConfig {
    /// Code page for content that names none
    pub default_code_page: u16,
    /// Code page forced by the user, replacing the detected one
    pub code_page_override: Option<u16>,
    pub file_types: FileTypeMap,
    pub filter_tool: String,
    pub tool_syntax: ToolSyntax,
    pub tab_width: usize,
    pub poll_interval: Duration,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            default_code_page: DEFAULT_CODE_PAGE,
            code_page_override: None,
            file_types: FileTypeMap::default(),
            filter_tool: "grep".to_string(),
            tool_syntax: ToolSyntax::Grep,
            tab_width: 8,
            poll_interval: POLL_INTERVAL,
        }
    }
}

impl ViewerConfig {
    pub fn from_args(args: &Args) -> Result<Self, ViewError> {
        let mut file_types = FileTypeMap::default();
        for spec in &args.file_types {
            file_types.apply(spec)?;
        }

        if args.filter_tool.trim().is_empty() {
            return Err(ViewError::InvalidOption {
                option: "--filter-tool".to_string(),
                value: args.filter_tool.clone(),
            });
        }

        let code_pages = [("--default-code-page", Some(args.default_code_page)), ("--code-page", args.code_page)];
        for (option, code_page) in code_pages {
            if let Some(code_page) = code_page.filter(|&cp| !has_decoder(cp)) {
                return Err(ViewError::InvalidOption {
                    option: option.to_string(),
                    value: code_page.to_string(),
                });
            }
        }

        Ok(Self {
            default_code_page: args.default_code_page,
            code_page_override: args.code_page,
            file_types,
            filter_tool: args.filter_tool.clone(),
            tool_syntax: args.tool_syntax,
            tab_width: args.tab_width,
            poll_interval: POLL_INTERVAL,
        })
    }
}
