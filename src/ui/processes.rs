//! Processes view rendering.
//!
//! Four top-N tables: CPU, memory, network connections and disk I/O.
//! Each value cell is colored by its per-process threshold.

use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Modifier, Style},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table},
    Frame,
};

use crate::app::App;
use crate::data::Threshold;
use crate::source::ProcessEntry;

/// Render the Processes view.
pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let Some(processes) = &app.dashboard.gauges.processes else {
        let waiting = Paragraph::new("Waiting for process data...")
            .style(Style::default().add_modifier(Modifier::DIM))
            .block(
                Block::default()
                    .title(" Processes ")
                    .borders(Borders::ALL)
                    .border_type(app.theme.border_type)
                    .border_style(Style::default().fg(app.theme.border)),
            );
        frame.render_widget(waiting, area);
        return;
    };

    let rows = Layout::vertical([Constraint::Ratio(1, 2); 2]).split(area);
    let top = Layout::horizontal([Constraint::Ratio(1, 2); 2]).split(rows[0]);
    let bottom = Layout::horizontal([Constraint::Ratio(1, 2); 2]).split(rows[1]);

    let thresholds = &app.dashboard.thresholds;
    let tables = [
        (top[0], "Top CPU", "CPU %", &processes.cpu_top, thresholds.process_cpu, Unit::Percent),
        (top[1], "Top Memory", "Mem %", &processes.memory_top, thresholds.process_memory, Unit::Percent),
        (bottom[0], "Top Network", "Conns", &processes.network_top, thresholds.process_network, Unit::Count),
        (bottom[1], "Top Disk I/O", "MB", &processes.disk_top, thresholds.process_disk, Unit::Megabytes),
    ];

    for (area, title, column, entries, threshold, unit) in tables {
        render_table(frame, app, area, title, column, entries, threshold, unit);
    }
}

#[derive(Debug, Clone, Copy)]
enum Unit {
    Percent,
    Count,
    Megabytes,
}

fn format_value(value: f64, unit: Unit) -> String {
    match unit {
        Unit::Percent => format!("{:.1}%", value),
        Unit::Count => format!("{:.0}", value),
        Unit::Megabytes => format!("{:.1}", value),
    }
}

#[allow(clippy::too_many_arguments)]
fn render_table(
    frame: &mut Frame,
    app: &App,
    area: Rect,
    title: &str,
    column: &str,
    entries: &[ProcessEntry],
    threshold: Threshold,
    unit: Unit,
) {
    let header = Row::new(vec![
        Cell::from("PID"),
        Cell::from("Name"),
        Cell::from(column.to_string()),
    ])
    .height(1)
    .style(app.theme.header);

    let rows: Vec<Row> = entries
        .iter()
        .map(|p| {
            let style = app.theme.severity_style(threshold.classify(p.value));
            Row::new(vec![
                Cell::from(p.pid.to_string()),
                Cell::from(p.name.clone()),
                Cell::from(format_value(p.value, unit)).style(style),
            ])
        })
        .collect();

    let widths = [Constraint::Length(8), Constraint::Fill(1), Constraint::Length(9)];

    let table = Table::new(rows, widths).header(header).block(
        Block::default()
            .title(format!(" {} ({}) ", title, entries.len()))
            .borders(Borders::ALL)
            .border_type(app.theme.border_type)
            .border_style(Style::default().fg(app.theme.border)),
    );

    frame.render_widget(table, area);
}
