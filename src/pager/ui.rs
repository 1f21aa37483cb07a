use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line as RatatuiLine, Span},
    widgets::Paragraph,
    Frame,
};
use unicode_width::UnicodeWidthChar;

use crate::filter::FilterOptions;

use super::app::{App, Mode, VisibleLine};

const GUTTER_STYLE: Style = Style::new().fg(Color::DarkGray);
const MATCH_STYLE: Style = Style::new().fg(Color::Black).bg(Color::Yellow);
const STATUS_STYLE: Style = Style::new().fg(Color::White).bg(Color::DarkGray);

/// Render the main UI
pub fn render(frame: &mut Frame, app: &mut App) {
    let size = frame.area();

    // Layout: content area + status bar
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(1),    // Content area
            Constraint::Length(1), // Status bar
        ])
        .split(size);

    let lines = app.visible_lines();
    render_content(frame, app, &lines, chunks[0]);
    render_status_bar(frame, app, chunks[1]);
}

/// Render the content area (line numbers + text)
fn render_content(frame: &mut Frame, app: &App, lines: &[VisibleLine], area: Rect) {
    let gutter_width = app.gutter_width();
    let content_width = (area.width as usize).saturating_sub(gutter_width);

    if app.show_line_numbers && gutter_width > 0 {
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Length(gutter_width as u16),
                Constraint::Min(1),
            ])
            .split(area);

        render_gutter(frame, lines, gutter_width, chunks[0]);
        render_lines(frame, app.scroll_col, lines, content_width, chunks[1]);
    } else {
        render_lines(frame, app.scroll_col, lines, content_width, area);
    }
}

/// Render the line number gutter
fn render_gutter(frame: &mut Frame, lines: &[VisibleLine], gutter_width: usize, area: Rect) {
    let gutter_lines: Vec<RatatuiLine> = lines
        .iter()
        .map(|line| {
            let num_str = format!("{:>width$} ", line.number, width = gutter_width - 2);
            RatatuiLine::from(Span::styled(num_str, GUTTER_STYLE))
        })
        .collect();

    frame.render_widget(Paragraph::new(gutter_lines), area);
}

/// Render the text lines, matched ones highlighted across the full width
fn render_lines(frame: &mut Frame, scroll_col: usize, lines: &[VisibleLine], width: usize, area: Rect) {
    let display_lines: Vec<RatatuiLine> = lines
        .iter()
        .map(|line| {
            let text = truncate_with_scroll(&line.text, scroll_col, width);
            if line.matched {
                RatatuiLine::from(Span::styled(text, MATCH_STYLE))
            } else {
                RatatuiLine::from(Span::raw(text))
            }
        })
        .collect();

    frame.render_widget(Paragraph::new(display_lines), area);
}

/// Truncate text for horizontal scrolling
fn truncate_with_scroll(text: &str, scroll_col: usize, width: usize) -> String {
    let mut result = String::new();
    let mut current_col = 0;
    let mut cols_taken = 0;

    for ch in text.chars() {
        // Control characters would confuse the terminal
        let ch = if ch.is_control() { '\u{FFFD}' } else { ch };
        let ch_width = ch.width().unwrap_or(0);

        if current_col >= scroll_col {
            if cols_taken + ch_width <= width {
                result.push(ch);
                cols_taken += ch_width;
            } else {
                break;
            }
        } else if current_col + ch_width > scroll_col {
            // Character spans the scroll boundary - add spaces for partial overlap
            let overlap = current_col + ch_width - scroll_col;
            for _ in 0..overlap {
                if cols_taken < width {
                    result.push(' ');
                    cols_taken += 1;
                }
            }
        }

        current_col += ch_width;
    }

    // Pad with spaces so highlighted lines fill the row
    result.extend(std::iter::repeat(' ').take(width.saturating_sub(cols_taken)));
    result
}

/// Option letters for the filter prompt, upper case when active
fn option_flags(options: &FilterOptions) -> String {
    [
        ('i', options.ignore_case),
        ('f', options.literal),
        ('w', options.whole_word),
        ('v', options.invert),
        ('b', options.begins_with),
        ('e', options.ends_with),
    ]
    .iter()
    .map(|&(c, on)| if on { c.to_ascii_uppercase() } else { c })
    .collect()
}

/// Render the status bar
fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let name = app
        .viewer
        .path()
        .and_then(|path| path.file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    // Left: file name and position
    let position = format!(" {} ({}/{}) ", name, app.current_line_display(), app.total_lines());

    // Center: prompt, message or match info
    let center = match &app.mode {
        Mode::Filter { pattern } => format!(" [{}] /{}", option_flags(&app.options), pattern),
        Mode::Goto { input } => format!(" :{}", input),
        Mode::Normal => match (&app.message, app.match_count) {
            (Some(message), _) => format!(" {} ", message),
            (None, Some(count)) => format!(" {} matched ", count),
            (None, None) => String::new(),
        },
    };

    // Right: scan progress and encoding
    let progress = app.viewer.progress().map(|p| p.to_string()).unwrap_or_default();
    let encoding = app
        .viewer
        .encoding()
        .map(|state| state.encoding.to_string())
        .unwrap_or_else(|| "auto".to_string());
    let right = match app.viewer.code_page_name() {
        Some(name) => format!("{} | {} {} ", progress, encoding, name),
        None => format!("{} | {} cp{} ", progress, encoding, app.viewer.code_page()),
    };

    // Calculate spacing
    let total_width = area.width as usize;
    let used = position.chars().count() + center.chars().count() + right.chars().count();
    let available_space = total_width.saturating_sub(used);
    let left_padding = available_space / 2;
    let right_padding = available_space - left_padding;

    let status_text = format!(
        "{}{}{}{}{}",
        position,
        " ".repeat(left_padding),
        center,
        " ".repeat(right_padding),
        right
    );

    // Truncate if too long
    let status_text: String = status_text.chars().take(total_width).collect();

    let paragraph = Paragraph::new(RatatuiLine::from(Span::styled(
        status_text,
        STATUS_STYLE.add_modifier(Modifier::BOLD),
    )));
    frame.render_widget(paragraph, area);
}
