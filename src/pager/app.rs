use std::num::NonZeroUsize;

use lru::LruCache;
use unicode_width::UnicodeWidthStr;

use crate::error::ViewError;
use crate::filter::FilterOptions;
use crate::scan::{ScanState, Viewer};

use super::display_text;

/// Decoded lines kept around for redraws
const CACHE_LINES: NonZeroUsize = match NonZeroUsize::new(1024) {
    Some(n) => n,
    None => unreachable!(),
};

/// Pager mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Normal viewing mode
    Normal,
    /// Typing a filter pattern
    Filter { pattern: String },
    /// Typing a line number
    Goto { input: String },
}

/// One line as it appears on screen
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibleLine {
    /// 1-based line number
    pub number: usize,
    pub text: String,
    pub matched: bool,
}

/// Main pager application state
pub struct App {
    pub viewer: Viewer,
    /// Display text by line, after terminator stripping and tab expansion
    lines: LruCache<usize, String>,
    /// Current scroll line (0-indexed, top of viewport)
    pub scroll_line: usize,
    /// Current horizontal scroll offset (0-indexed)
    pub scroll_col: usize,
    pub mode: Mode,
    pub should_quit: bool,
    /// Terminal size (width, height)
    pub terminal_size: (u16, u16),
    pub show_line_numbers: bool,
    pub tab_width: usize,
    /// Options used by the next filter run
    pub options: FilterOptions,
    pub last_pattern: Option<String>,
    /// Lines flagged by the last filter run
    pub match_count: Option<usize>,
    /// Line the last match navigation landed on
    pub current_match: Option<usize>,
    /// One-shot message for the status bar
    pub message: Option<String>,
    /// Widest line displayed so far
    pub max_line_width: usize,
    /// Pattern to apply once the scan is done
    pending_filter: Option<String>,
    /// 1-based line to jump to once the scan has reached it
    pending_line: Option<usize>,
}

impl App {
    pub fn new(viewer: Viewer, show_line_numbers: bool, tab_width: usize, options: FilterOptions) -> Self {
        Self {
            viewer,
            lines: LruCache::new(CACHE_LINES),
            scroll_line: 0,
            scroll_col: 0,
            mode: Mode::Normal,
            should_quit: false,
            terminal_size: (80, 24),
            show_line_numbers,
            tab_width,
            options,
            last_pattern: None,
            match_count: None,
            current_match: None,
            message: None,
            max_line_width: 0,
            pending_filter: None,
            pending_line: None,
        }
    }

    /// Check on the background scan; called once per event-loop tick
    pub fn tick(&mut self) {
        let finished = self.viewer.poll();
        if let Some(number) = self.pending_line {
            if finished.is_some() || number <= self.total_lines() {
                self.pending_line = None;
                self.go_to_line(number);
            }
        }

        if let Some(state) = finished {
            // The code page is final now and may differ from the provisional one
            self.lines.clear();
            match state {
                ScanState::Failed(reason) => self.message = Some(format!("Scan failed: {reason}")),
                _ => {
                    if let Some(pattern) = self.pending_filter.take() {
                        self.apply_filter(&pattern);
                    }
                }
            }
        }
    }

    /// Run `pattern` as a filter as soon as the scan allows it
    pub fn queue_filter(&mut self, pattern: String) {
        if self.viewer.state().is_scanning() {
            self.last_pattern = Some(pattern.clone());
            self.pending_filter = Some(pattern);
        } else {
            self.apply_filter(&pattern);
        }
    }

    /// Jump to 1-based line `number`, waiting for the scan to index it
    pub fn queue_go_to_line(&mut self, number: usize) {
        if self.viewer.state().is_scanning() && number > self.total_lines() {
            self.pending_line = Some(number);
        } else {
            self.go_to_line(number);
        }
    }

    /// Ask the running scan to stop
    pub fn stop_scan(&mut self) {
        self.viewer.stop();
    }

    /// Re-open the file and start a new scan
    pub fn refresh(&mut self) {
        match self.viewer.refresh() {
            Ok(()) => {
                self.lines.clear();
                self.match_count = None;
                self.current_match = None;
                self.max_line_width = 0;
                self.scroll_line = self.scroll_line.min(self.max_scroll());
            }
            Err(ViewError::ScanInProgress) => {}
            Err(e) => self.message = Some(e.to_string()),
        }
    }

    /// Run the external filter with `pattern` and jump to the first match
    pub fn apply_filter(&mut self, pattern: &str) {
        self.last_pattern = Some(pattern.to_string());
        match self.viewer.filter(pattern, &self.options) {
            Ok(summary) => {
                self.match_count = Some(summary.matches);
                self.current_match = None;
                self.message = summary.diagnostic;
                self.next_match();
            }
            Err(e) => {
                self.match_count = None;
                self.message = Some(e.to_string());
            }
        }
    }

    /// Enter filter mode, starting from the last pattern
    pub fn enter_filter_mode(&mut self) {
        self.mode = Mode::Filter {
            pattern: self.last_pattern.clone().unwrap_or_default(),
        };
    }

    /// Enter go-to-line mode
    pub fn enter_goto_mode(&mut self) {
        self.mode = Mode::Goto { input: String::new() };
    }

    /// Add a character to the prompt being typed
    pub fn prompt_push(&mut self, c: char) {
        match &mut self.mode {
            Mode::Filter { pattern } => pattern.push(c),
            Mode::Goto { input } if c.is_ascii_digit() => input.push(c),
            _ => {}
        }
    }

    /// Remove the last character from the prompt
    pub fn prompt_backspace(&mut self) {
        match &mut self.mode {
            Mode::Filter { pattern } => {
                pattern.pop();
            }
            Mode::Goto { input } => {
                input.pop();
            }
            Mode::Normal => {}
        }
    }

    /// Leave the prompt and act on what was typed
    pub fn confirm_prompt(&mut self) {
        match std::mem::replace(&mut self.mode, Mode::Normal) {
            Mode::Filter { pattern } if !pattern.is_empty() => self.apply_filter(&pattern),
            Mode::Goto { input } => {
                if let Ok(number) = input.parse::<usize>() {
                    self.go_to_line(number);
                }
            }
            _ => {}
        }
    }

    /// Leave the prompt without acting
    pub fn cancel_prompt(&mut self) {
        self.mode = Mode::Normal;
    }

    /// Centre 1-based line `number` in the viewport
    pub fn go_to_line(&mut self, number: usize) {
        let line = number.saturating_sub(1).min(self.total_lines().saturating_sub(1));
        self.scroll_to_line(line);
    }

    /// Navigate to the next flagged line
    pub fn next_match(&mut self) {
        self.jump_to_match(true);
    }

    /// Navigate to the previous flagged line
    pub fn prev_match(&mut self) {
        self.jump_to_match(false);
    }

    fn jump_to_match(&mut self, forward: bool) {
        let from = self.current_match.unwrap_or(self.scroll_line);
        if let Some(line) = self.viewer.next_match(from, forward) {
            self.current_match = Some(line);
            self.scroll_to_line(line);
        }
    }

    /// Scroll to show a specific line in the viewport
    fn scroll_to_line(&mut self, line_idx: usize) {
        let height = self.content_height();
        // Try to center the line in the viewport
        let target = line_idx.saturating_sub(height / 2);
        self.scroll_line = target.min(self.max_scroll());
    }

    /// Display text of line `line`, decoding it on a cache miss
    pub fn line_text(&mut self, line: usize) -> String {
        if let Some(text) = self.lines.get(&line) {
            return text.clone();
        }
        let Some(decoded) = self.viewer.read_line(line) else {
            return String::new();
        };

        let text = display_text(&decoded, self.viewer.delimiter(), self.tab_width);
        self.max_line_width = self.max_line_width.max(text.width());
        self.lines.put(line, text.clone());
        text
    }

    /// Lines in the viewport, decoded
    pub fn visible_lines(&mut self) -> Vec<VisibleLine> {
        let (start, end) = self.visible_line_range();
        let mut lines = Vec::with_capacity(end - start);
        for line in start..end {
            let text = self.line_text(line);
            let matched = self.viewer.record(line).is_some_and(|record| record.is_matched());
            lines.push(VisibleLine {
                number: line + 1,
                text,
                matched,
            });
        }
        lines
    }

    /// Flip one of the filter options
    pub fn toggle_option(&mut self, option: char) {
        let options = &mut self.options;
        match option {
            'i' => options.ignore_case = !options.ignore_case,
            'F' => options.literal = !options.literal,
            'w' => options.whole_word = !options.whole_word,
            'v' => options.invert = !options.invert,
            'b' => options.begins_with = !options.begins_with,
            'e' => options.ends_with = !options.ends_with,
            _ => {}
        }
    }

    /// Update terminal size
    pub fn set_terminal_size(&mut self, width: u16, height: u16) {
        self.terminal_size = (width, height);
    }

    /// Get the content area height (excluding status bar)
    pub fn content_height(&self) -> usize {
        self.terminal_size.1.saturating_sub(1) as usize
    }

    /// Get the content area width
    pub fn content_width(&self) -> usize {
        (self.terminal_size.0 as usize).saturating_sub(self.gutter_width())
    }

    /// Get the gutter (line number) width
    pub fn gutter_width(&self) -> usize {
        if !self.show_line_numbers {
            return 0;
        }
        let max_line = self.total_lines();
        if max_line == 0 {
            3 // Minimum " 1 "
        } else {
            let digits = max_line.ilog10() as usize + 1;
            digits + 2 // Space before and after number
        }
    }

    /// Get the range of visible lines
    pub fn visible_line_range(&self) -> (usize, usize) {
        let start = self.scroll_line.min(self.total_lines());
        let end = (start + self.content_height()).min(self.total_lines());
        (start, end)
    }

    /// Scroll down by n lines
    pub fn scroll_down(&mut self, n: usize) {
        self.scroll_line = (self.scroll_line + n).min(self.max_scroll());
    }

    /// Scroll up by n lines
    pub fn scroll_up(&mut self, n: usize) {
        self.scroll_line = self.scroll_line.saturating_sub(n);
    }

    /// Scroll left by n columns
    pub fn scroll_left(&mut self, n: usize) {
        self.scroll_col = self.scroll_col.saturating_sub(n);
    }

    /// Scroll right by n columns
    pub fn scroll_right(&mut self, n: usize) {
        let max_scroll = self.max_line_width.saturating_sub(self.content_width());
        self.scroll_col = (self.scroll_col + n).min(max_scroll);
    }

    pub fn scroll_to_line_start(&mut self) {
        self.scroll_col = 0;
    }

    /// Scroll to the end of the longest line seen
    pub fn scroll_to_line_end(&mut self) {
        self.scroll_col = self.max_line_width.saturating_sub(self.content_width());
    }

    pub fn go_to_top(&mut self) {
        self.scroll_line = 0;
    }

    pub fn go_to_bottom(&mut self) {
        self.scroll_line = self.max_scroll();
    }

    /// Get maximum scroll position
    fn max_scroll(&self) -> usize {
        self.total_lines().saturating_sub(self.content_height())
    }

    pub fn scroll_half_page_down(&mut self) {
        self.scroll_down(self.content_height() / 2);
    }

    pub fn scroll_half_page_up(&mut self) {
        self.scroll_up(self.content_height() / 2);
    }

    /// Get current line number for status bar (1-indexed)
    pub fn current_line_display(&self) -> usize {
        self.scroll_line + 1
    }

    /// Lines indexed so far; grows while the scan runs
    pub fn total_lines(&self) -> usize {
        self.viewer.line_count()
    }
}
