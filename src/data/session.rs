//! Monitoring session state.
//!
//! Tracks the lifecycle of a timed monitoring run. The authoritative
//! `active` flag always comes from the telemetry stream; acknowledgments of
//! start/stop requests only move the session into transitional phases.

use tracing::info;

use crate::source::{Completion, MonitoringStatus};

/// Fixed length of a monitoring session in seconds.
pub const SESSION_DURATION_SECS: f64 = 300.0;

/// Lifecycle phase of the monitoring session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    /// No session; the start affordance is enabled.
    #[default]
    Idle,
    /// Start was acknowledged; waiting for the stream to confirm.
    Starting,
    /// The stream reports an active session.
    Running,
    /// Stop was acknowledged; waiting for the stream to confirm.
    Stopping,
}

impl SessionPhase {
    pub fn label(&self) -> &'static str {
        match self {
            SessionPhase::Idle => "idle",
            SessionPhase::Starting => "starting",
            SessionPhase::Running => "running",
            SessionPhase::Stopping => "stopping",
        }
    }
}

/// What a status or completion frame did to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionTransition {
    /// Nothing changed beyond the timers.
    None,
    /// The stream confirmed a running session.
    Activated,
    /// The session ended (status frame reported inactive).
    Deactivated,
    /// A completion frame arrived.
    Completed(Completion),
}

/// State of the timed monitoring session.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitoringSession {
    phase: SessionPhase,
    elapsed_seconds: f64,
    remaining_seconds: f64,
    total_duration_seconds: f64,
    data_points: u64,
    last_report: Option<String>,
}

impl Default for MonitoringSession {
    fn default() -> Self {
        Self::new()
    }
}

impl MonitoringSession {
    /// Create an inert session.
    pub fn new() -> Self {
        Self {
            phase: SessionPhase::Idle,
            elapsed_seconds: 0.0,
            remaining_seconds: SESSION_DURATION_SECS,
            total_duration_seconds: SESSION_DURATION_SECS,
            data_points: 0,
            last_report: None,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Whether the stream considers a session to be running.
    pub fn is_active(&self) -> bool {
        matches!(self.phase, SessionPhase::Running | SessionPhase::Stopping)
    }

    /// Whether a start request may be issued.
    pub fn can_start(&self) -> bool {
        self.phase == SessionPhase::Idle
    }

    /// Whether a stop request makes sense.
    pub fn can_stop(&self) -> bool {
        matches!(self.phase, SessionPhase::Starting | SessionPhase::Running)
    }

    pub fn elapsed_seconds(&self) -> f64 {
        self.elapsed_seconds
    }

    pub fn remaining_seconds(&self) -> f64 {
        self.remaining_seconds
    }

    pub fn total_duration_seconds(&self) -> f64 {
        self.total_duration_seconds
    }

    pub fn data_points(&self) -> u64 {
        self.data_points
    }

    /// The most recent report reference surfaced by a completion or stop.
    pub fn last_report(&self) -> Option<&str> {
        self.last_report.as_deref()
    }

    /// The session-control collaborator accepted a start request.
    pub fn on_start_accepted(&mut self) {
        if self.phase == SessionPhase::Idle {
            info!("Monitoring session start acknowledged");
            self.phase = SessionPhase::Starting;
        }
    }

    /// The session-control collaborator accepted a stop request.
    ///
    /// The session stays active until the stream confirms it ended.
    pub fn on_stop_accepted(&mut self, report: Option<String>) {
        if matches!(self.phase, SessionPhase::Running | SessionPhase::Starting) {
            info!("Monitoring session stop acknowledged");
            self.phase = SessionPhase::Stopping;
        }
        if report.is_some() {
            self.last_report = report;
        }
    }

    /// Apply an inbound status frame.
    pub fn on_status_frame(&mut self, status: &MonitoringStatus) -> SessionTransition {
        self.elapsed_seconds = status.elapsed_seconds;
        self.remaining_seconds = status.remaining_seconds;
        self.data_points = status.data_points;

        match (status.active, self.phase) {
            (true, SessionPhase::Idle | SessionPhase::Starting) => {
                info!("Monitoring session running");
                self.phase = SessionPhase::Running;
                SessionTransition::Activated
            }
            (true, _) => SessionTransition::None,
            (false, SessionPhase::Idle) => SessionTransition::None,
            (false, _) => {
                info!("Monitoring session ended");
                self.phase = SessionPhase::Idle;
                SessionTransition::Deactivated
            }
        }
    }

    /// Apply an inbound completion frame. Always ends the session.
    pub fn on_completion_frame(&mut self, completion: &Completion) -> SessionTransition {
        info!(report = ?completion.report, "Monitoring session completed");
        self.phase = SessionPhase::Idle;
        if completion.report.is_some() {
            self.last_report = completion.report.clone();
        }
        SessionTransition::Completed(completion.clone())
    }

    /// Fraction of the session elapsed, clamped to `[0, 1]`.
    pub fn progress(&self) -> f64 {
        if self.total_duration_seconds <= 0.0 {
            return 0.0;
        }
        let ratio = self.elapsed_seconds / self.total_duration_seconds;
        if ratio.is_nan() {
            0.0
        } else {
            ratio.clamp(0.0, 1.0)
        }
    }

    /// Remaining time as `MM:SS`.
    pub fn remaining_display(&self) -> String {
        format_mm_ss(self.remaining_seconds)
    }
}

/// Format seconds as `MM:SS`, flooring both parts. Negative input shows `00:00`.
pub fn format_mm_ss(seconds: f64) -> String {
    let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
    let mins = (seconds / 60.0).floor() as u64;
    let secs = (seconds % 60.0).floor() as u64;
    format!("{:02}:{:02}", mins, secs)
}
