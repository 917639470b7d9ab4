use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::Event,
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use hostpulse::source::DEFAULT_PACE;
use hostpulse::ui::{self, Theme};
use hostpulse::{
    events, App, Backend, Dashboard, FrameSource, HttpControl, Overrides, SessionTransition,
    Settings, SourceEvent, StreamSource, WebSocketSource,
};

#[derive(Parser, Debug)]
#[command(name = "hostpulse")]
#[command(about = "Live terminal dashboard for host telemetry")]
struct Args {
    /// Backend origin URL; the channel lives at <server>/ws
    #[arg(short, long)]
    server: Option<String>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Replay newline-delimited JSON frames from a file ("-" for stdin)
    #[arg(short, long, conflicts_with = "server")]
    replay: Option<PathBuf>,

    /// Log dashboard events instead of drawing the terminal UI
    #[arg(long)]
    headless: bool,

    /// Append logs to this file in TUI mode
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Reconnect attempts before giving up
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Fixed delay between reconnect attempts, in milliseconds
    #[arg(long)]
    reconnect_delay_ms: Option<u64>,

    /// Directory downloaded reports are written to
    #[arg(long)]
    reports_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args)?;

    let overrides = Overrides {
        server: args.server.clone(),
        max_attempts: args.max_attempts,
        reconnect_delay_ms: args.reconnect_delay_ms,
        reports_dir: args.reports_dir.clone(),
    };
    let settings = Settings::load(args.config.as_deref(), &overrides)?;

    // The runtime drives the connection, replay and backend requests while
    // the UI loop stays on the main thread.
    let rt = tokio::runtime::Runtime::new()?;
    let _guard = rt.enter();

    let (source, backend) = match &args.replay {
        Some(path) => (open_replay(&rt, path)?, None),
        None => {
            let source = WebSocketSource::spawn(&settings.server, settings.reconnect)?;
            let control = HttpControl::builder()
                .endpoint(settings.server.clone())
                .build()?;
            (
                Box::new(source) as Box<dyn FrameSource>,
                Some(Arc::new(control) as Arc<dyn Backend>),
            )
        }
    };

    info!(source = source.description(), "Starting hostpulse");

    if args.headless {
        let exit_on_close = args.replay.is_some();
        return rt.block_on(run_headless(source, settings, exit_on_close));
    }

    run_tui(source, backend, settings)
}

/// Set up the tracing subscriber.
///
/// Headless mode logs to stderr. The TUI owns the terminal, so there logs
/// go to `--log-file` or nowhere.
fn init_logging(args: &Args) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("hostpulse=info"));

    if args.headless {
        tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr).init();
    } else if let Some(path) = &args.log_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(Arc::new(file))
            .init();
    }

    Ok(())
}

/// Open a recorded session for replay
fn open_replay(rt: &tokio::runtime::Runtime, path: &Path) -> Result<Box<dyn FrameSource>> {
    if path.as_os_str() == "-" {
        let source = StreamSource::spawn(tokio::io::stdin(), "stdin", Some(DEFAULT_PACE));
        return Ok(Box::new(source));
    }

    let source = rt
        .block_on(StreamSource::open_file(path, Some(DEFAULT_PACE)))
        .with_context(|| format!("Failed to open replay file {}", path.display()))?;
    Ok(Box::new(source))
}

/// Run the TUI with the given frame source
fn run_tui(
    source: Box<dyn FrameSource>,
    backend: Option<Arc<dyn Backend>>,
    settings: Settings,
) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend_term = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend_term)?;

    // Setup panic hook to restore terminal
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(panic);
    }));

    let tick = settings.tick();
    let mut app = App::new(source, settings.thresholds, backend, settings.reports_dir)
        .with_theme(Theme::auto_detect());
    app.request_status();

    // Run the main loop
    let result = run_app(&mut terminal, &mut app, tick);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    tick: Duration,
) -> Result<()> {
    while app.running {
        app.update();

        terminal.draw(|frame| ui::draw(frame, app))?;

        if let Some(event) = events::poll_event(tick)? {
            match event {
                Event::Key(key) => events::handle_key_event(app, key),
                Event::Resize(_, _) => {
                    // Terminal will redraw on next iteration
                }
                _ => {}
            }
        }
    }

    Ok(())
}

/// Run the dashboard core without a terminal, logging what it observes.
///
/// Exits on Ctrl-C, when the live connection gives up, or when a replay
/// reaches the end of its input.
async fn run_headless(
    mut source: Box<dyn FrameSource>,
    settings: Settings,
    exit_on_close: bool,
) -> Result<()> {
    let mut ticker = tokio::time::interval(settings.tick());
    let mut dashboard = Dashboard::new(settings.thresholds);
    let mut last_overall = None;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("Interrupted");
                break;
            }
            _ = ticker.tick() => {}
        }

        let mut closed = false;
        while let Some(event) = source.poll() {
            match event {
                SourceEvent::Connection(connected) => {
                    info!(connected, "Connection changed");
                    closed = !connected;
                }
                SourceEvent::Frame(frame) => {
                    let ingested = dashboard.ingest(&frame);

                    let overall = dashboard.overall_severity();
                    if last_overall != Some(overall) {
                        info!(severity = overall.label(), "Overall severity changed");
                        last_overall = Some(overall);
                    }
                    tracing::debug!(
                        cpu = ?dashboard.cpu_severity(),
                        memory = ?dashboard.memory_severity(),
                        gpu = ?dashboard.gpu_severity(),
                        label = ?dashboard.charts.cpu.last_label(),
                        "Frame"
                    );

                    match ingested.transition {
                        SessionTransition::None => {}
                        SessionTransition::Completed(completion) => match completion.error {
                            Some(err) => warn!(error = %err, "Monitoring complete, report failed"),
                            None => info!(report = ?completion.report, "Monitoring complete"),
                        },
                        transition => info!(
                            ?transition,
                            phase = dashboard.session.phase().label(),
                            "Session transition"
                        ),
                    }
                }
            }
        }

        if source.link().gave_up {
            warn!(error = ?source.error(), "Connection abandoned");
            break;
        }
        if exit_on_close && closed {
            info!(frames = dashboard.frames(), "Replay finished");
            break;
        }
    }

    source.disconnect();
    Ok(())
}
