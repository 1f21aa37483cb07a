use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use super::app::{App, Mode};

/// Handle a key event, returning true if the app should quit
pub fn handle_key(key: KeyEvent, app: &mut App) -> bool {
    // Check for Ctrl+C first - always quit
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        app.should_quit = true;
        return true;
    }

    match &app.mode {
        Mode::Normal => handle_normal_mode(key, app),
        Mode::Filter { .. } | Mode::Goto { .. } => handle_prompt_mode(key, app),
    }
}

/// Handle key events in normal mode
fn handle_normal_mode(key: KeyEvent, app: &mut App) -> bool {
    // A message stays up until the next key
    app.message = None;

    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => {
            app.should_quit = true;
            true
        }

        // Filter prompt
        KeyCode::Char('/') => {
            app.enter_filter_mode();
            false
        }

        // Go to line
        KeyCode::Char(':') => {
            app.enter_goto_mode();
            false
        }

        // Stop the scan
        KeyCode::Char('s') => {
            app.stop_scan();
            false
        }

        // Re-read the file
        KeyCode::Char('r') | KeyCode::F(5) => {
            app.refresh();
            false
        }

        // Filter option toggles
        KeyCode::Char(c @ ('i' | 'F' | 'w' | 'v' | 'b' | 'e')) => {
            app.toggle_option(c);
            false
        }

        KeyCode::Char('j') | KeyCode::Down => {
            app.scroll_down(1);
            false
        }

        KeyCode::Char('k') | KeyCode::Up => {
            app.scroll_up(1);
            false
        }

        KeyCode::Char('h') | KeyCode::Left => {
            app.scroll_left(4);
            false
        }

        KeyCode::Char('l') | KeyCode::Right => {
            app.scroll_right(4);
            false
        }

        KeyCode::Char('d') | KeyCode::PageDown => {
            app.scroll_half_page_down();
            false
        }

        KeyCode::Char('u') | KeyCode::PageUp => {
            app.scroll_half_page_up();
            false
        }

        KeyCode::Char('0') => {
            app.scroll_to_line_start();
            false
        }

        KeyCode::Char('$') => {
            app.scroll_to_line_end();
            false
        }

        KeyCode::Char('g') | KeyCode::Home => {
            app.go_to_top();
            false
        }

        KeyCode::Char('G') | KeyCode::End => {
            app.go_to_bottom();
            false
        }

        // Next matched line
        KeyCode::Char('n') | KeyCode::F(3) => {
            app.next_match();
            false
        }

        // Previous matched line
        KeyCode::Char('N') => {
            app.prev_match();
            false
        }

        // Toggle line numbers
        KeyCode::Char('#') => {
            app.show_line_numbers = !app.show_line_numbers;
            false
        }

        _ => false,
    }
}

/// Handle key events while a prompt is open
fn handle_prompt_mode(key: KeyEvent, app: &mut App) -> bool {
    match key.code {
        KeyCode::Esc => app.cancel_prompt(),
        KeyCode::Enter => app.confirm_prompt(),
        KeyCode::Backspace => app.prompt_backspace(),
        KeyCode::Char(c) => app.prompt_push(c),
        _ => {}
    }
    false
}
