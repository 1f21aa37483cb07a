mod app;
mod input;
mod ui;

use std::io::{self, stdout, Write};
use std::panic;
use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};

use crate::cli::Args;
use crate::error::ViewError;
use crate::filter::FilterOptions;
use crate::input::{expand_tabs, unwrap_line};
use crate::scan::Viewer;

pub use app::App;

/// How long the event loop waits for input before checking the scan
const TICK: Duration = Duration::from_millis(100);

/// Parse line range from --lines argument
pub fn parse_line_range(range: &str, total_lines: usize) -> Result<(usize, usize), ViewError> {
    let range = range.trim();
    let invalid = || ViewError::InvalidLineRange {
        range: range.to_string(),
    };

    if range.is_empty() {
        return Err(invalid());
    }

    // Handle different formats: X:Y, :Y, X:, X
    if let Some((start_str, end_str)) = range.split_once(':') {
        let start = if start_str.is_empty() {
            1
        } else {
            start_str.parse::<usize>().map_err(|_| invalid())?
        };

        let end = if end_str.is_empty() {
            total_lines.max(start)
        } else {
            end_str.parse::<usize>().map_err(|_| invalid())?
        };

        if start == 0 || end == 0 || start > end {
            return Err(invalid());
        }

        Ok((start, end.min(total_lines)))
    } else {
        // Single line number
        let line = range.parse::<usize>().map_err(|_| invalid())?;

        if line == 0 || line > total_lines {
            return Err(invalid());
        }

        Ok((line, line))
    }
}

/// Screen text for a decoded line: records of delimited files folded onto
/// one line, tabs expanded
pub fn display_text(text: &str, delimiter: u8, tab_width: usize) -> String {
    if delimiter == b'\n' {
        expand_tabs(text, tab_width)
    } else {
        expand_tabs(&unwrap_line(text), tab_width)
    }
}

/// What `print_lines` writes
#[derive(Debug, Clone, Copy)]
pub struct PrintOptions {
    /// 1-based inclusive line range
    pub range: (usize, usize),
    pub line_numbers: bool,
    /// Only lines flagged by the last filter run
    pub only_matches: bool,
    pub tab_width: usize,
}

/// Write lines of the open file to `out` (no-pager mode)
pub fn print_lines<W: Write>(out: &mut W, viewer: &Viewer, options: &PrintOptions) -> io::Result<()> {
    let (start, end) = options.range;
    let delimiter = viewer.delimiter();

    let gutter_width = if options.line_numbers {
        let max_line = viewer.line_count();
        if max_line == 0 {
            3
        } else {
            max_line.ilog10() as usize + 3
        }
    } else {
        0
    };

    for number in start.max(1)..=end {
        let line = number - 1;
        let Some(record) = viewer.record(line) else {
            break;
        };
        if options.only_matches && !record.is_matched() {
            continue;
        }

        let text = viewer
            .read_line(line)
            .map(|text| display_text(&text, delimiter, options.tab_width))
            .unwrap_or_default();
        if options.line_numbers {
            write!(out, "{:>width$} ", number, width = gutter_width - 2)?;
        }
        writeln!(out, "{}", text)?;
    }

    out.flush()
}

fn terminal_error(source: io::Error) -> ViewError {
    ViewError::io(source, "terminal")
}

/// Run the pager TUI
pub fn run_pager(viewer: Viewer, args: &Args, options: FilterOptions) -> Result<(), ViewError> {
    // Set up panic hook to restore terminal on panic
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(stdout(), LeaveAlternateScreen);
        original_hook(panic_info);
    }));

    let tab_width = viewer.config().tab_width;
    let mut app = App::new(viewer, args.line_numbers, tab_width, options);
    if let Some(pattern) = &args.grep {
        app.queue_filter(pattern.clone());
    }
    if let Some(range) = &args.lines {
        let (start, _) = parse_line_range(range, usize::MAX)?;
        app.queue_go_to_line(start);
    }

    enable_raw_mode().map_err(terminal_error)?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen).map_err(terminal_error)?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).map_err(terminal_error)?;

    let size = terminal.size().map_err(terminal_error)?;
    app.set_terminal_size(size.width, size.height);

    let result = event_loop(&mut terminal, &mut app);
    app.viewer.close();

    // Cleanup
    disable_raw_mode().map_err(terminal_error)?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen).map_err(terminal_error)?;

    result
}

fn event_loop<B: ratatui::backend::Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<(), ViewError> {
    loop {
        app.tick();

        terminal
            .draw(|frame| ui::render(frame, app))
            .map_err(terminal_error)?;

        if event::poll(TICK).map_err(terminal_error)? {
            match event::read().map_err(terminal_error)? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    if input::handle_key(key, app) {
                        break;
                    }
                }
                Event::Resize(width, height) => app.set_terminal_size(width, height),
                _ => {}
            }
        }

        if app.should_quit {
            break;
        }
    }
    Ok(())
}
