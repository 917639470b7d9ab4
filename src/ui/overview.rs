//! Overview rendering.
//!
//! Gauge cards for cpu, gpu, memory and network above live line charts
//! backed by the bounded series.

use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, Paragraph},
    Frame,
};

use crate::app::App;
use crate::data::{SeverityLevel, TimeSeries};
use crate::ui::Theme;

/// Render the Overview view.
pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let rows = Layout::vertical([Constraint::Length(6), Constraint::Min(8)]).split(area);

    render_cards(frame, app, rows[0]);
    render_charts(frame, app, rows[1]);
}

fn render_cards(frame: &mut Frame, app: &App, area: Rect) {
    let cols = Layout::horizontal([Constraint::Ratio(1, 4); 4]).split(area);
    let dashboard = &app.dashboard;
    let gauges = &dashboard.gauges;

    let cpu = match &gauges.cpu {
        Some(cpu) => {
            let mut lines = vec![
                headline(&app.theme, cpu.usage.percent, dashboard.cpu_severity()),
                Line::from(format!(
                    "Cores {}/{}",
                    cpu.usage.cores.physical.map_or("-".to_string(), |p| p.to_string()),
                    cpu.usage.cores.logical
                )),
                Line::from(format!("Freq {:.0} MHz", cpu.usage.frequency.current)),
            ];
            if cpu.temperature.available {
                lines.push(Line::from(format!(
                    "Temp {:.1}{}",
                    cpu.temperature.value, cpu.temperature.unit
                )));
            }
            lines
        }
        None => waiting(),
    };
    render_card(frame, &app.theme, cols[0], "CPU", dashboard.cpu_severity(), cpu);

    let gpu = match gauges.gpu.as_ref().and_then(|g| g.primary()) {
        Some(gpu) => vec![
            headline(&app.theme, gpu.load, dashboard.gpu_severity()),
            Line::from(truncate(&gpu.name, cols[1].width.saturating_sub(4) as usize)),
            Line::from(format!("VRAM {:.0}/{:.0} MB", gpu.memory_used, gpu.memory_total)),
            Line::from(format!("Temp {:.0}°C", gpu.temperature)),
        ],
        None if gauges.gpu.is_some() => vec![Line::from(Span::styled(
            "Not available",
            Style::default().add_modifier(Modifier::DIM),
        ))],
        None => waiting(),
    };
    render_card(frame, &app.theme, cols[1], "GPU", dashboard.gpu_severity(), gpu);

    let memory = match &gauges.memory {
        Some(memory) => vec![
            headline(&app.theme, memory.virtual_memory.percent, dashboard.memory_severity()),
            Line::from(format!(
                "{:.1}/{:.1} GB",
                memory.virtual_memory.used, memory.virtual_memory.total
            )),
            Line::from(format!("Swap {:.1}%", memory.swap.percent)),
        ],
        None => waiting(),
    };
    render_card(frame, &app.theme, cols[2], "Memory", dashboard.memory_severity(), memory);

    let network = match &gauges.network {
        Some(network) => vec![
            Line::from(Span::styled(
                format!("↑ {}", network.speed.upload_speed_formatted),
                Style::default().fg(app.theme.chart_upload),
            )),
            Line::from(Span::styled(
                format!("↓ {}", network.speed.download_speed_formatted),
                Style::default().fg(app.theme.chart_download),
            )),
            Line::from(format!("Connections {}", network.connections.total)),
        ],
        None => waiting(),
    };
    render_card(frame, &app.theme, cols[3], "Network", None, network);
}

fn headline(theme: &Theme, percent: f64, level: Option<SeverityLevel>) -> Line<'static> {
    let style = level.map_or(Style::default(), |l| theme.severity_style(l));
    let mut spans = vec![Span::styled(
        format!("{:.1}%", percent),
        style.add_modifier(Modifier::BOLD),
    )];
    if let Some(level) = level.filter(|l| *l != SeverityLevel::Normal) {
        spans.push(Span::styled(format!(" {}", level.label()), style));
    }
    Line::from(spans)
}

fn waiting() -> Vec<Line<'static>> {
    vec![Line::from(Span::styled(
        "Waiting for data...",
        Style::default().add_modifier(Modifier::DIM),
    ))]
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", kept)
    }
}

fn render_card(
    frame: &mut Frame,
    theme: &Theme,
    area: Rect,
    title: &str,
    level: Option<SeverityLevel>,
    lines: Vec<Line<'static>>,
) {
    let block = Block::default()
        .title(format!(" {} ", title))
        .borders(Borders::ALL)
        .border_type(theme.border_type)
        .border_style(theme.card_border(level));
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_charts(frame: &mut Frame, app: &App, area: Rect) {
    let cols = Layout::horizontal([Constraint::Ratio(1, 3); 3]).split(area);
    let charts = &app.dashboard.charts;
    let theme = &app.theme;

    let cpu_points = charts.cpu.points(0);
    let cpu = Dataset::default()
        .name("CPU %")
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(theme.chart_cpu))
        .data(&cpu_points);
    render_chart(frame, theme, cols[0], "CPU Usage", &charts.cpu, vec![cpu], 100.0);

    let memory_points = charts.memory.points(0);
    let memory = Dataset::default()
        .name("Memory %")
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(theme.chart_memory))
        .data(&memory_points);
    render_chart(frame, theme, cols[1], "Memory Usage", &charts.memory, vec![memory], 100.0);

    let upload_points = charts.network.points(0);
    let download_points = charts.network.points(1);
    let network = vec![
        Dataset::default()
            .name("Upload KB/s")
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(theme.chart_upload))
            .data(&upload_points),
        Dataset::default()
            .name("Download KB/s")
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(theme.chart_download))
            .data(&download_points),
    ];
    let ceiling = network_ceiling(charts.network.max_value());
    render_chart(frame, theme, cols[2], "Network (KB/s)", &charts.network, network, ceiling);
}

/// Y-axis ceiling for the network chart: 20% headroom, at least 1 KB/s.
fn network_ceiling(max: Option<f64>) -> f64 {
    max.map_or(1.0, |m| (m * 1.2).max(1.0))
}

fn render_chart<const N: usize>(
    frame: &mut Frame,
    theme: &Theme,
    area: Rect,
    title: &str,
    series: &TimeSeries<N>,
    datasets: Vec<Dataset<'_>>,
    y_max: f64,
) {
    let x_max = series.capacity().saturating_sub(1).max(1) as f64;
    let first = series.labels().front().cloned().unwrap_or_default();
    let last = series.last_label().unwrap_or_default().to_string();

    let block = Block::default()
        .title(format!(" {} ", title))
        .borders(Borders::ALL)
        .border_type(theme.border_type)
        .border_style(Style::default().fg(theme.border));

    let chart = Chart::new(datasets)
        .block(block)
        .x_axis(
            Axis::default()
                .style(Style::default().fg(theme.border))
                .bounds([0.0, x_max])
                .labels([first, last]),
        )
        .y_axis(
            Axis::default()
                .style(Style::default().fg(theme.border))
                .bounds([0.0, y_max])
                .labels(["0".to_string(), format!("{:.0}", y_max / 2.0), format!("{:.0}", y_max)]),
        );

    frame.render_widget(chart, area);
}
