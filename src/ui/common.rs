//! Common UI components shared across views.
//!
//! This module contains the header bar, tab bar, status bar, and help overlay.

use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Tabs},
    Frame,
};

use crate::app::{App, View};
use crate::source::{ConnectionState, LinkStatus};

const BAR_FULL: char = '█';
const BAR_EMPTY: char = '░';

/// Render the header bar.
///
/// Displays: overall severity, connection state, session progress.
pub fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let dashboard = &app.dashboard;
    let link = app.link();

    let connection = connection_label(&link);

    let mut spans = vec![
        Span::styled(" ● ", app.theme.severity_style(dashboard.overall_severity())),
        Span::styled("HOSTPULSE ", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw("│ "),
        Span::styled(connection, app.theme.connection_style(link.state)),
        Span::raw(" │ "),
    ];

    let session = &dashboard.session;
    if session.is_active() {
        spans.push(Span::styled(
            "● REC ",
            Style::default().fg(app.theme.critical).add_modifier(Modifier::BOLD),
        ));
        spans.push(Span::raw(format!("{} ", session.remaining_display())));
        spans.push(Span::styled(
            progress_bar(session.progress(), 20),
            Style::default().fg(app.theme.highlight),
        ));
        spans.push(Span::raw(format!(" {:>3.0}%", session.progress() * 100.0)));
    } else {
        spans.push(Span::styled(
            format!("Session {}", session.phase().label()),
            Style::default().add_modifier(Modifier::DIM),
        ));
        if let Some(report) = session.last_report() {
            spans.push(Span::raw(format!(" │ last report {}", report)));
        }
    }

    spans.push(Span::raw(format!(" │ {} frames", dashboard.frames())));

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

/// Connection state with retry progress, e.g. `Connecting (retry 3)`.
pub fn connection_label(link: &LinkStatus) -> String {
    let state = link.state.label();
    if link.gave_up {
        format!("{} (gave up after {} attempts)", state, link.attempts)
    } else if link.state != ConnectionState::Connected && link.attempts > 0 {
        format!("{} (retry {})", state, link.attempts)
    } else {
        state.to_string()
    }
}

/// A text progress bar `width` cells wide.
pub fn progress_bar(ratio: f64, width: usize) -> String {
    let ratio = if ratio.is_finite() { ratio.clamp(0.0, 1.0) } else { 0.0 };
    let filled = (ratio * width as f64).round() as usize;
    let mut bar = String::with_capacity(width * 3);
    bar.extend(std::iter::repeat(BAR_FULL).take(filled));
    bar.extend(std::iter::repeat(BAR_EMPTY).take(width - filled));
    bar
}

/// Render the tab bar showing available views.
///
/// Highlights the currently active view.
pub fn render_tabs(frame: &mut Frame, app: &App, area: Rect) {
    let titles: Vec<Line> = vec![
        Line::from(" 1:Overview "),
        Line::from(" 2:Processes "),
        Line::from(" 3:Storage "),
    ];

    let selected = match app.current_view {
        View::Overview => 0,
        View::Processes => 1,
        View::Storage => 2,
    };

    let tabs = Tabs::new(titles)
        .select(selected)
        .style(app.theme.tab_inactive)
        .highlight_style(app.theme.tab_active)
        .divider("|");

    frame.render_widget(tabs, area);
}

/// Render the status bar at the bottom.
///
/// Shows the current notification if any, otherwise source, data age and
/// the main controls.
pub fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    if let Some(notice) = app.notice() {
        let paragraph = Paragraph::new(format!(" {} ", notice.message))
            .style(app.theme.notice_style(notice.level));
        frame.render_widget(paragraph, area);
        return;
    }

    if let Some(err) = app.source_error() {
        let paragraph = Paragraph::new(format!(" Error: {} ", err))
            .style(Style::default().fg(app.theme.critical));
        frame.render_widget(paragraph, area);
        return;
    }

    let age = match app.last_frame_at {
        Some(at) => format!("{}s ago", at.elapsed().as_secs()),
        None => "waiting for data".to_string(),
    };

    let controls = if app.has_backend() {
        "s:start x:stop R:reports e:export c:clear ?:help q:quit"
    } else {
        "e:export c:clear ?:help q:quit"
    };

    let status = format!(
        " {} │ {} │ {} │ {}",
        app.current_view.label(),
        app.source_description(),
        age,
        controls
    );

    frame.render_widget(
        Paragraph::new(status).style(Style::default().add_modifier(Modifier::DIM)),
        area,
    );
}

/// Render the help overlay.
pub fn render_help(frame: &mut Frame, app: &App, area: Rect) {
    let section = |title: &'static str| {
        Line::from(vec![Span::styled(
            title,
            Style::default().add_modifier(Modifier::BOLD),
        )])
    };

    let help_text = vec![
        section(" Navigation"),
        Line::from("  Tab/←/→     Switch view"),
        Line::from("  1/2/3       Overview/Processes/Storage"),
        Line::from("  ↑/↓ j/k     Select row"),
        Line::from("  Esc         Close overlay"),
        Line::from(""),
        section(" Session"),
        Line::from("  s           Start 5-minute session"),
        Line::from("  x           Stop session, generate report"),
        Line::from("  R           Reports (Enter downloads)"),
        Line::from(""),
        section(" General"),
        Line::from("  c           Clear charts"),
        Line::from("  e           Export charts to JSON"),
        Line::from("  q           Quit"),
        Line::from(""),
        Line::from(vec![Span::styled(
            "Press any key to close",
            Style::default().add_modifier(Modifier::DIM),
        )]),
    ];

    let block = Block::default()
        .title(" Help ")
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.highlight));

    let help_area = super::centered(area, 46, 21);

    frame.render_widget(Clear, help_area);
    frame.render_widget(Paragraph::new(help_text).block(block), help_area);
}
