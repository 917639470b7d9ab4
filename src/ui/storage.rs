//! Storage view rendering.
//!
//! Displays mounted partitions with a usage bar per row and a summary of
//! cumulative disk I/O.

use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame,
};

use crate::app::App;
use crate::ui::common::progress_bar;

/// Render the Storage view.
pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let Some(disk) = &app.dashboard.gauges.disk else {
        let waiting = Paragraph::new("Waiting for disk data...")
            .style(Style::default().add_modifier(Modifier::DIM))
            .block(
                Block::default()
                    .title(" Storage ")
                    .borders(Borders::ALL)
                    .border_type(app.theme.border_type)
                    .border_style(Style::default().fg(app.theme.border)),
            );
        frame.render_widget(waiting, area);
        return;
    };

    let chunks = Layout::vertical([Constraint::Min(5), Constraint::Length(4)]).split(area);
    let threshold = app.dashboard.thresholds.disk;

    let header = Row::new(vec![
        Cell::from("Mount"),
        Cell::from("Device"),
        Cell::from("Type"),
        Cell::from("Used"),
        Cell::from("Total"),
        Cell::from("Usage"),
        Cell::from("%"),
    ])
    .height(1)
    .style(app.theme.header);

    let rows: Vec<Row> = disk
        .partitions
        .iter()
        .map(|p| {
            let style = app.theme.severity_style(threshold.classify(p.percent));
            Row::new(vec![
                Cell::from(p.mountpoint.clone()),
                Cell::from(p.device.clone()),
                Cell::from(p.fstype.clone()),
                Cell::from(format_gb(p.used)),
                Cell::from(format_gb(p.total)),
                Cell::from(progress_bar(p.percent / 100.0, 16)).style(style),
                Cell::from(format!("{:.1}%", p.percent)).style(style),
            ])
        })
        .collect();

    let widths = [
        Constraint::Fill(2),
        Constraint::Fill(2),
        Constraint::Length(6),
        Constraint::Length(10),
        Constraint::Length(10),
        Constraint::Length(16),
        Constraint::Length(7),
    ];

    let count = disk.partitions.len();
    let selected = app.selected_partition.min(count.saturating_sub(1));
    let position = if count > 0 {
        format!(" [{}/{}]", selected + 1, count)
    } else {
        String::new()
    };

    let table = Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .title(format!(" Partitions ({}){} ", count, position))
                .borders(Borders::ALL)
                .border_type(app.theme.border_type)
                .border_style(Style::default().fg(app.theme.border)),
        )
        .row_highlight_style(app.theme.selected)
        .highlight_symbol("▶ ");

    let mut state = TableState::default().with_selected((count > 0).then_some(selected));
    frame.render_stateful_widget(table, chunks[0], &mut state);

    let io = &disk.io;
    let summary = vec![
        Line::from(vec![
            Span::styled("Read  ", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(format!("{:.1} MB in {} ops ({} ms)", io.read_bytes, io.read_count, io.read_time)),
        ]),
        Line::from(vec![
            Span::styled("Write ", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(format!(
                "{:.1} MB in {} ops ({} ms)",
                io.write_bytes, io.write_count, io.write_time
            )),
        ]),
    ];

    let block = Block::default()
        .title(" Disk I/O ")
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.border));
    frame.render_widget(Paragraph::new(summary).block(block), chunks[1]);
}

/// Format a size given in GB, switching to TB past 1024.
fn format_gb(gb: f64) -> String {
    if gb >= 1024.0 {
        format!("{:.1} TB", gb / 1024.0)
    } else {
        format!("{:.1} GB", gb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_gb() {
        assert_eq!(format_gb(0.0), "0.0 GB");
        assert_eq!(format_gb(476.9), "476.9 GB");
        assert_eq!(format_gb(2048.0), "2.0 TB");
    }
}
