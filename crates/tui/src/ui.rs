use ratatui::{
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use brushwork_core::types::{EntryStatus, RunState};

use crate::App;

pub fn draw(f: &mut Frame, app: &App) {
    let chunks = if app.log_visible {
        Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
            .split(f.area())
    } else {
        Layout::default()
            .constraints([Constraint::Percentage(100)])
            .split(f.area())
    };

    let tally = app.tally();
    let (banner_label, banner_bg) = match app.run_state() {
        RunState::Running => ("RUNNING (S to pause, Ctrl+Shift+K aborts)".to_string(), Color::Green),
        RunState::Stopping => ("PAUSING after current command...".to_string(), Color::Yellow),
        RunState::Stopped => ("PAUSED (Press S to run)".to_string(), Color::Red),
        RunState::Finished => (
            format!("FINISHED {}/{} passed (Press Q to quit)", tally.passed, tally.passed + tally.failed),
            Color::Cyan,
        ),
    };

    let left = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(0)])
        .split(chunks[0]);

    // Full-width centered banner
    let width = left[0].width as usize;
    let pad_total = width.saturating_sub(banner_label.chars().count());
    let pad_left = pad_total / 2;
    let banner = format!("{}{}{}", " ".repeat(pad_left), banner_label, " ".repeat(pad_total - pad_left));
    f.render_widget(
        Paragraph::new(Span::styled(
            banner,
            Style::default().fg(Color::Black).bg(banner_bg).add_modifier(Modifier::BOLD),
        )),
        left[0],
    );

    let mut lines: Vec<Line> = vec![
        Line::from(vec![
            Span::styled(" j", Style::default().fg(Color::Yellow)),
            Span::raw("/"),
            Span::styled("k", Style::default().fg(Color::Yellow)),
            Span::raw(" select, "),
            Span::styled("l", Style::default().fg(Color::Yellow)),
            Span::raw(" logs, "),
            Span::styled("q", Style::default().fg(Color::Yellow)),
            Span::raw(format!(
                " quit    {} passed, {} failed, {} left",
                tally.passed, tally.failed, tally.pending
            )),
        ]),
        Line::from(""),
    ];

    {
        let entries = app.entries.lock().unwrap_or_else(|e| e.into_inner());
        for (i, entry) in entries.iter().enumerate() {
            let is_selected = i == app.selected;
            let (mark, color) = match entry.status {
                EntryStatus::Pending => ("[ ]", Color::DarkGray),
                EntryStatus::Running => ("[>]", Color::Yellow),
                EntryStatus::Passed => ("[+]", Color::Green),
                EntryStatus::Failed => ("[x]", Color::Red),
            };
            let text_style = if is_selected {
                Style::default().fg(Color::White).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::Gray)
            };
            lines.push(Line::from(vec![
                Span::raw(if is_selected { "> " } else { "  " }),
                Span::styled(mark, Style::default().fg(color)),
                Span::styled(format!(" {:>4} ", entry.line_no), Style::default().fg(Color::DarkGray)),
                Span::styled(entry.text.clone(), text_style),
            ]));
            if is_selected {
                if let Some(reason) = &entry.reason {
                    lines.push(Line::from(Span::styled(
                        format!("           {}", reason),
                        Style::default().fg(color),
                    )));
                }
            }
        }
    } // entries lock dropped here

    let list = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::LEFT | Borders::RIGHT | Borders::BOTTOM)
            .title(format!(" {} ", app.batch_name))
            .border_style(Style::default().fg(Color::Cyan)),
    );
    f.render_widget(list, left[1]);

    if app.log_visible && chunks.len() > 1 {
        let visible_height = chunks[1].height.saturating_sub(2) as usize;
        let total = app.log_messages.len();
        let scroll = app.log_scroll.min(total.saturating_sub(visible_height));
        let start = total.saturating_sub(visible_height + scroll);
        let end = total.saturating_sub(scroll);
        let log_lines: Vec<Line> = app.log_messages[start..end].iter().map(|m| parse_log_line(m)).collect();

        let log_panel = Paragraph::new(log_lines)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(" Logs ")
                    .border_style(Style::default().fg(Color::Yellow)),
            )
            .wrap(Wrap { trim: false });
        f.render_widget(log_panel, chunks[1]);
    }

    if let Some(dialog) = &app.confirm {
        dialog.render(f);
    }
}

/// Color index sent by the logger -> terminal color
fn prefix_color(idx: u8) -> Color {
    match idx {
        1 => Color::DarkGray,
        2 => Color::LightBlue,
        3 => Color::LightGreen,
        4 => Color::LightMagenta,
        _ => Color::White,
    }
}

/// Parse a structured log line (level\x1fprefix\x1fcolor\x1ftimestamp\x1fmessage)
/// into a colored Line for TUI rendering.
fn parse_log_line(raw: &str) -> Line<'_> {
    let parts: Vec<&str> = raw.splitn(5, '\x1f').collect();
    let [level, prefix, color, timestamp, message] = parts[..] else {
        return Line::from(raw);
    };
    let color = prefix_color(color.parse().unwrap_or(0));

    let mut spans = vec![
        Span::styled(timestamp, Style::default().fg(Color::DarkGray)),
        Span::raw(" "),
    ];
    match level {
        "ERROR" => spans.push(Span::styled("error ", Style::default().fg(Color::Red))),
        "WARN" => spans.push(Span::styled("warn ", Style::default().fg(Color::Yellow))),
        _ => {}
    }
    if !prefix.is_empty() {
        spans.push(Span::styled(prefix, Style::default().fg(color).add_modifier(Modifier::BOLD)));
        spans.push(Span::raw(" "));
    }
    spans.push(Span::styled(message, Style::default().fg(color)));
    Line::from(spans)
}
