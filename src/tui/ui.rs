use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::Line,
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table},
    Frame,
};
use chrono::Local;

use crate::commands::time_left;
use crate::parser::Confidence;
use super::app::{App, InputMode, ViewMode, InputField};

pub fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),    // Table
            Constraint::Length(4)  // Help + status
        ].as_ref())
        .split(f.area());

    let today = app.now.date();

    let rows: Vec<Row> = app
        .tasks
        .iter()
        .map(|t| {
            let style = match t.due_day() {
                _ if t.completed => Style::default().fg(Color::DarkGray),
                Some(day) if day < today => Style::default().fg(Color::Red),
                Some(day) if day == today => Style::default().fg(Color::Yellow),
                _ => Style::default().fg(Color::Green),
            };

            let due = match t.due_date {
                None => String::new(),
                Some(d) if t.is_all_day => d.date_naive().to_string(),
                Some(d) => d.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string(),
            };
            let repeats = match (&t.recurrence, t.parent_recurring_id) {
                (Some(rule), _) => rule.summary(),
                (None, Some(parent)) => format!("from #{}", parent),
                (None, None) => String::new(),
            };
            let next = t
                .recurrence
                .as_ref()
                .map(|r| match r.next_occurrence {
                    Some(n) if t.is_all_day => n.date_naive().to_string(),
                    Some(n) => n.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string(),
                    None => "ended".to_string(),
                })
                .unwrap_or_default();

            Row::new(vec![
                Cell::from(t.id.to_string()),
                Cell::from(t.title.clone()),
                Cell::from(due),
                Cell::from(time_left(t, today)),
                Cell::from(repeats),
                Cell::from(next),
                Cell::from(if t.completed { "Done" } else { "Pending" }),
            ]).style(style)
        })
        .collect();

    let widths = [
        Constraint::Length(4),
        Constraint::Min(20),
        Constraint::Length(17),
        Constraint::Length(12),
        Constraint::Length(28),
        Constraint::Length(17),
        Constraint::Length(8),
    ];

    let title = match app.view_mode {
        ViewMode::Tasks => "recurdo - Tasks",
        ViewMode::Recurring => "recurdo - Recurring",
    };

    let table = Table::new(rows, widths)
        .header(Row::new(vec!["ID", "Title", "Due", "Time Left", "Repeats", "Next", "Status"])
            .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
            .bottom_margin(1))
        .block(Block::default().borders(Borders::ALL).title(title))
        .row_highlight_style(Style::default().add_modifier(Modifier::BOLD).bg(Color::DarkGray))
        .highlight_symbol(">> ");

    f.render_stateful_widget(table, chunks[0], &mut app.state);

    let help_text = match app.input_mode {
        InputMode::Normal => match app.view_mode {
            ViewMode::Tasks => "q: Quit | a: Add | n: Title | t: Due | Space: Done | s: Spawn next | x: Stop repeating | c: Toggle Done | d: Del | v: Recurring",
            ViewMode::Recurring => "q: Quit | a: Add | t: Due | Space: Done | s: Spawn next | x: Stop repeating | d: Del | v: All Tasks",
        },
        InputMode::Editing => "Enter: Save | Esc: Cancel",
        InputMode::Adding => "Enter: Next Step | Esc: Cancel",
    };

    let help = Paragraph::new(vec![
        Line::from(help_text),
        Line::styled(app.status.clone().unwrap_or_default(), Style::default().fg(Color::Magenta)),
    ])
    .style(Style::default().fg(Color::Gray))
    .block(Block::default().borders(Borders::ALL));

    f.render_widget(help, chunks[1]);

    if app.input_mode == InputMode::Normal {
        return;
    }

    // Date fields get an extra line for the parse preview.
    let height = if app.editing_date() { 4 } else { 3 };
    let area = centered_rect(60, height, f.area());
    f.render_widget(Clear, area);

    let title = match (&app.input_mode, &app.input_field) {
        (InputMode::Adding, InputField::Title) => "Add Task: Enter Title",
        (InputMode::Adding, _) => "Add Task: Enter Due Date (e.g. \"next friday\", \"every monday\")",
        (_, InputField::Title) => "Edit Title",
        (_, InputField::Due) => "Edit Due Date (\"none\" clears it)",
        _ => "Edit",
    };

    let mut lines = vec![Line::styled(app.input_buffer.clone(), Style::default().fg(Color::Yellow))];
    if app.editing_date() {
        let preview = match &app.preview {
            None => Line::styled("Type a date", Style::default().fg(Color::DarkGray)),
            Some(p) => match (p.confidence, &p.display_text, &p.error) {
                (Confidence::Low, _, error) => Line::styled(
                    error.clone().unwrap_or_default(),
                    Style::default().fg(Color::Red),
                ),
                (Confidence::Medium, Some(text), _) => Line::styled(
                    format!("{} (some words ignored)", text),
                    Style::default().fg(Color::Yellow),
                ),
                (_, text, _) => Line::styled(
                    text.clone().unwrap_or_default(),
                    Style::default().fg(Color::Green),
                ),
            },
        };
        lines.push(preview);
    }

    let input = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(title));

    f.render_widget(input, area);
}

fn centered_rect(percent_x: u16, height: u16, r: Rect) -> Rect {
    let margin = r.height.saturating_sub(height) / 2;
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(margin),
            Constraint::Length(height),
            Constraint::Length(margin),
        ].as_ref())
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ].as_ref())
        .split(popup_layout[1])[1]
}
