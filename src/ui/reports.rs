//! Reports overlay rendering.

use chrono::{DateTime, NaiveDateTime};
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph},
    Frame,
};

use crate::app::App;

/// Render the list of generated reports over the current view.
pub fn render_overlay(frame: &mut Frame, app: &App, area: Rect) {
    let overlay = super::centered(area, 72, 18);
    frame.render_widget(Clear, overlay);

    let block = Block::default()
        .title(format!(" Reports ({}) ", app.reports.len()))
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.highlight));
    let inner = block.inner(overlay);
    frame.render_widget(block, overlay);

    let chunks = Layout::vertical([Constraint::Min(1), Constraint::Length(1)]).split(inner);

    if app.reports.is_empty() {
        let empty = Paragraph::new("No reports yet. Stop a session to generate one.")
            .style(Style::default().add_modifier(Modifier::DIM));
        frame.render_widget(empty, chunks[0]);
    } else {
        let items: Vec<ListItem> = app
            .reports
            .iter()
            .map(|r| {
                ListItem::new(Line::from(vec![
                    Span::raw(format!("{:<40}", r.filename)),
                    Span::raw(format!("{:>10}  ", r.size_kb())),
                    Span::styled(
                        format_created(&r.created),
                        Style::default().add_modifier(Modifier::DIM),
                    ),
                ]))
            })
            .collect();

        let list = List::new(items)
            .highlight_style(app.theme.selected)
            .highlight_symbol("▶ ");

        let selected = app.selected_report.min(app.reports.len() - 1);
        let mut state = ListState::default().with_selected(Some(selected));
        frame.render_stateful_widget(list, chunks[0], &mut state);
    }

    let hint = Paragraph::new("↑/↓ select  Enter download  r refresh  Esc close")
        .style(Style::default().add_modifier(Modifier::DIM));
    frame.render_widget(hint, chunks[1]);
}

/// Render an ISO-8601 timestamp as `YYYY-MM-DD HH:MM`, or return it as-is
/// when it does not parse.
fn format_created(created: &str) -> String {
    if let Ok(dt) = DateTime::parse_from_rfc3339(created) {
        return dt.format("%Y-%m-%d %H:%M").to_string();
    }
    match NaiveDateTime::parse_from_str(created, "%Y-%m-%dT%H:%M:%S%.f") {
        Ok(dt) => dt.format("%Y-%m-%d %H:%M").to_string(),
        Err(_) => created.to_string(),
    }
}
