use std::io;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, MouseEventKind};
use ratatui::{backend::CrosstermBackend, Terminal};

use crate::ui;
use crate::App;

/// Log lines per PgUp/PgDn
const LOG_PAGE: usize = 10;

pub fn run(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> anyhow::Result<()> {
    loop {
        if app.should_quit {
            return Ok(());
        }

        app.drain_logs();
        terminal.draw(|f| ui::draw(f, app))?;

        // 100ms poll keeps the list in step with the runner thread
        if event::poll(Duration::from_millis(100))? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    if app.confirm.is_some() {
                        handle_confirm_key(app, key);
                    } else {
                        handle_key(app, key);
                    }
                }
                Event::Mouse(mouse) => match mouse.kind {
                    MouseEventKind::ScrollUp => app.scroll_log_up(3),
                    MouseEventKind::ScrollDown => app.scroll_log_down(3),
                    _ => {}
                },
                _ => {}
            }
        }
    }
}

fn handle_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') | KeyCode::Char('Q') => app.request_quit(),
        KeyCode::Up | KeyCode::Char('k') | KeyCode::Char('K') => app.move_up(),
        KeyCode::Down | KeyCode::Char('j') | KeyCode::Char('J') => app.move_down(),
        KeyCode::Char('s') | KeyCode::Char('S') | KeyCode::Char(' ') => app.start_stop(),
        KeyCode::Char('l') | KeyCode::Char('L') => app.toggle_log(),
        KeyCode::PageUp => app.scroll_log_up(LOG_PAGE),
        KeyCode::PageDown => app.scroll_log_down(LOG_PAGE),
        _ => {}
    }
}

fn handle_confirm_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Left | KeyCode::Right | KeyCode::Tab | KeyCode::Char('h') | KeyCode::Char('l') => {
            if let Some(dialog) = app.confirm.as_mut() {
                dialog.toggle();
            }
        }
        KeyCode::Enter => {
            let yes = app.confirm.as_ref().is_some_and(|d| d.selected);
            app.resolve_confirm(yes);
        }
        KeyCode::Char('y') | KeyCode::Char('Y') => app.resolve_confirm(true),
        KeyCode::Esc | KeyCode::Char('n') | KeyCode::Char('N') => app.resolve_confirm(false),
        _ => {}
    }
}
