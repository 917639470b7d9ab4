//! Theme configuration for the TUI.
//!
//! Supports light and dark themes with automatic terminal detection.

use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::block::BorderType;

use crate::app::NoticeLevel;
use crate::data::SeverityLevel;
use crate::source::ConnectionState;

/// Color and style theme for the TUI.
///
/// Use [`Theme::auto_detect()`] for automatic theme selection based on
/// terminal background, or [`Theme::dark()`]/[`Theme::light()`] explicitly.
#[derive(Debug, Clone)]
pub struct Theme {
    /// Accent color for highlights and active elements.
    pub highlight: Color,
    /// Color for warning severity.
    pub warning: Color,
    /// Color for danger severity.
    pub critical: Color,
    /// Color for normal severity.
    pub healthy: Color,
    /// Color for borders and separators.
    pub border: Color,
    /// Style for header rows in tables.
    pub header: Style,
    /// Style for selected/highlighted rows.
    pub selected: Style,
    /// Style for the active tab.
    pub tab_active: Style,
    /// Style for inactive tabs.
    pub tab_inactive: Style,
    /// Border style (rounded, plain, etc.).
    pub border_type: BorderType,
    /// Line colors for the cpu, memory, upload and download charts.
    pub chart_cpu: Color,
    pub chart_memory: Color,
    pub chart_upload: Color,
    pub chart_download: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self::dark()
    }
}

impl Theme {
    /// Create a dark theme suitable for dark terminal backgrounds.
    pub fn dark() -> Self {
        Self {
            highlight: Color::Cyan,
            warning: Color::Yellow,
            critical: Color::Red,
            healthy: Color::Green,
            border: Color::Gray,
            header: Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            selected: Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD),
            tab_active: Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            tab_inactive: Style::default().fg(Color::Gray),
            border_type: BorderType::Rounded,
            chart_cpu: Color::Cyan,
            chart_memory: Color::Magenta,
            chart_upload: Color::Green,
            chart_download: Color::LightBlue,
        }
    }

    /// Create a light theme suitable for light terminal backgrounds.
    pub fn light() -> Self {
        Self {
            highlight: Color::Blue,
            warning: Color::Yellow,
            critical: Color::Red,
            healthy: Color::Green,
            border: Color::DarkGray,
            header: Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD),
            selected: Style::default().bg(Color::LightBlue).add_modifier(Modifier::BOLD),
            tab_active: Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD),
            tab_inactive: Style::default().fg(Color::DarkGray),
            border_type: BorderType::Rounded,
            chart_cpu: Color::Blue,
            chart_memory: Color::Magenta,
            chart_upload: Color::Green,
            chart_download: Color::Blue,
        }
    }

    /// Auto-detect based on terminal background
    pub fn auto_detect() -> Self {
        match terminal_light::luma() {
            Ok(luma) if luma > 0.5 => Self::light(),
            _ => Self::dark(),
        }
    }

    /// Get style for a severity level
    pub fn severity_style(&self, level: SeverityLevel) -> Style {
        match level {
            SeverityLevel::Normal => Style::default().fg(self.healthy),
            SeverityLevel::Warning => Style::default().fg(self.warning),
            SeverityLevel::Danger => Style::default().fg(self.critical).add_modifier(Modifier::BOLD),
        }
    }

    /// Border color for a card; unclassified cards use the plain border.
    pub fn card_border(&self, level: Option<SeverityLevel>) -> Style {
        match level {
            Some(SeverityLevel::Normal) | None => Style::default().fg(self.border),
            Some(SeverityLevel::Warning) => Style::default().fg(self.warning),
            Some(SeverityLevel::Danger) => Style::default().fg(self.critical),
        }
    }

    pub fn connection_style(&self, state: ConnectionState) -> Style {
        match state {
            ConnectionState::Connected => Style::default().fg(self.healthy),
            ConnectionState::Connecting => Style::default().fg(self.warning),
            ConnectionState::Disconnected => Style::default().fg(self.critical),
        }
    }

    pub fn notice_style(&self, level: NoticeLevel) -> Style {
        match level {
            NoticeLevel::Info => Style::default().fg(self.highlight),
            NoticeLevel::Success => Style::default().fg(self.healthy),
            NoticeLevel::Error => Style::default().fg(self.critical).add_modifier(Modifier::BOLD),
        }
    }
}
