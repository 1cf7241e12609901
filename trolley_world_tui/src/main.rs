use anyhow::{Context, Result};
use clap::Parser;
use ratatui::{
    crossterm::{
        self,
        event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
        execute,
        terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
    },
    prelude::*,
    widgets::*,
};
use serde::Serialize;
use std::{
    fs::File,
    io::{self, BufWriter, Stdout, Write},
    path::PathBuf,
    sync::Mutex,
    time::Duration,
};
use trolley_world_core::{
    Direction as Move, ScenarioKind, StepOutcome, TrolleyEnv,
    environment::EnvOptions,
    level::load_level_from_string,
    reward::RewardVector,
    scenario::EntityKind,
    severity::{FixedSeverity, UniformSeverity},
};

#[derive(Parser, Debug)]
#[command(version, about = "Play trolley-problem grid worlds in the terminal", long_about = None)]
struct Args {
    /// Built-in scenario to play
    #[arg(short, long, default_value_t = ScenarioKind::Trolley)]
    scenario: ScenarioKind,
    /// Fixed severity for every episode; otherwise drawn uniformly
    #[arg(long)]
    severity: Option<f64>,
    #[arg(long, default_value_t = 1)]
    min_severity: u32,
    #[arg(long, default_value_t = 10)]
    max_severity: u32,
    /// Seed for the severity draws
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long)]
    time_budget: Option<u32>,
    #[arg(long)]
    resource_budget: Option<u32>,
    /// Level art file replacing the scenario's built-in layout
    #[arg(short, long, value_name = "LEVEL_FILE")]
    level: Option<PathBuf>,
    /// Write logs here (filtered by RUST_LOG)
    #[arg(long, value_name = "LOG_FILE")]
    log: Option<PathBuf>,
    /// Write every step as a JSON line
    #[arg(long, value_name = "TRACE_FILE")]
    trace: Option<PathBuf>,
}

/// One line of the step trace.
#[derive(Serialize)]
struct TraceRecord<'a> {
    scenario: &'a str,
    episode: u32,
    tick: u32,
    action: Move,
    #[serde(flatten)]
    outcome: &'a StepOutcome,
}

struct App {
    /// The simulation being played.
    env: TrolleyEnv,
    /// Reward summed over the current episode.
    episode_reward: RewardVector,
    last_outcome: Option<StepOutcome>,
    status: String,
    episode: u32,
    trace: Option<BufWriter<File>>,
    /// Flag to control the main loop.
    should_quit: bool,
}

impl App {
    fn new(env: TrolleyEnv, trace: Option<BufWriter<File>>) -> Self {
        App {
            episode_reward: RewardVector::zeroed(&env.scenario().labels),
            env,
            last_outcome: None,
            status: "Ready".to_string(),
            episode: 1,
            trace,
            should_quit: false,
        }
    }

    /// Plays one action and records its outcome.
    fn act(&mut self, direction: Move) -> Result<()> {
        if self.env.is_done() {
            self.status = "Episode finished; press 'r' to play again.".to_string();
            return Ok(());
        }
        match self.env.step(direction.index()) {
            Ok(outcome) => {
                self.episode_reward += &outcome.reward;
                self.write_trace(direction, &outcome)?;
                self.status = if outcome.done {
                    "Episode finished; press 'r' to play again.".to_string()
                } else {
                    format!("Moved {direction:?}")
                };
                self.last_outcome = Some(outcome);
            }
            Err(err) => {
                tracing::warn!(%err, "step rejected");
                self.status = format!("Step rejected: {err}");
            }
        }
        Ok(())
    }

    fn write_trace(&mut self, action: Move, outcome: &StepOutcome) -> Result<()> {
        let Some(writer) = self.trace.as_mut() else {
            return Ok(());
        };
        let record = TraceRecord {
            scenario: &self.env.scenario().name,
            episode: self.episode,
            tick: self.env.state().ticks,
            action,
            outcome,
        };
        serde_json::to_writer(&mut *writer, &record)?;
        writeln!(writer)?;
        writer.flush()?;
        Ok(())
    }

    fn reset(&mut self) {
        match self.env.reset(None) {
            Ok(_) => {
                self.episode += 1;
                self.episode_reward = RewardVector::zeroed(&self.env.scenario().labels);
                self.last_outcome = None;
                self.status = format!("Episode {} started", self.episode);
            }
            Err(err) => self.status = format!("Reset failed: {err}"),
        }
    }

    /// Sets the quit flag.
    fn quit(&mut self) {
        self.should_quit = true;
    }
}

fn init_tracing(log: Option<&PathBuf>) -> Result<()> {
    // The alternate screen owns stdout, so logs only go to a file.
    let Some(path) = log else {
        return Ok(());
    };
    let file = File::create(path)
        .with_context(|| format!("Failed to create log file {}", path.display()))?;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init();
    Ok(())
}

fn build_env(args: &Args) -> Result<TrolleyEnv> {
    let mut config = args.scenario.config();
    if let Some(path) = &args.level {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read level file {}", path.display()))?;
        config = config.with_art(load_level_from_string(&text)?);
    }
    let options = EnvOptions {
        time_budget: args.time_budget,
        resource_budget: args.resource_budget,
        ..EnvOptions::default()
    };
    let env = match args.severity {
        Some(severity) => TrolleyEnv::new(config, FixedSeverity(severity), options)?,
        None => TrolleyEnv::new(
            config,
            UniformSeverity::new(args.min_severity, args.max_severity, args.seed),
            options,
        )?,
    };
    tracing::info!(scenario = %args.scenario, "environment ready");
    Ok(env)
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();
    init_tracing(args.log.as_ref())?;

    // Build before touching the terminal so errors print normally
    let env = build_env(&args)?;
    let trace = args
        .trace
        .as_ref()
        .map(|path| {
            File::create(path)
                .map(BufWriter::new)
                .with_context(|| format!("Failed to create trace file {}", path.display()))
        })
        .transpose()?;

    let mut terminal = setup_terminal()?;
    let mut app = App::new(env, trace);
    let result = run_app(&mut terminal, &mut app);
    restore_terminal(&mut terminal)?;
    result
}

/// Configures the terminal for TUI interaction.
fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    let mut stdout = io::stdout();
    enable_raw_mode()?;
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend).map_err(Into::into)
}

/// Restores the terminal to its original state.
fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}

/// Runs the main loop. The simulation only advances on key presses.
fn run_app(terminal: &mut Terminal<CrosstermBackend<Stdout>>, app: &mut App) -> Result<()> {
    let poll_rate = Duration::from_millis(250);

    while !app.should_quit {
        terminal.draw(|f| ui(f, app))?;

        if !crossterm::event::poll(poll_rate)? {
            continue;
        }
        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => app.quit(),
                KeyCode::Char('r') => app.reset(),
                KeyCode::Down | KeyCode::Char('s') => app.act(Move::Down)?,
                KeyCode::Up | KeyCode::Char('w') => app.act(Move::Up)?,
                KeyCode::Right | KeyCode::Char('d') => app.act(Move::Right)?,
                KeyCode::Left | KeyCode::Char('a') => app.act(Move::Left)?,
                _ => {}
            }
        }
    }
    Ok(())
}

/// Renders the user interface.
fn ui(frame: &mut Frame, app: &App) {
    let main_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(8),    // Map and rewards
            Constraint::Length(5), // Episode status
            Constraint::Length(2), // Help
        ])
        .split(frame.area());
    let top = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(main_layout[0]);

    render_map(frame, top[0], &app.env);
    render_rewards(frame, top[1], app);
    render_status(frame, main_layout[1], app);

    let help_text = Paragraph::new("Arrows/WASD move, 'r' resets, 'q' or 'Esc' quits.")
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::TOP));
    frame.render_widget(help_text, main_layout[2]);
}

fn glyph_style(kind: Option<EntityKind>) -> Style {
    match kind {
        Some(EntityKind::Wall) => Style::default().fg(Color::DarkGray),
        Some(EntityKind::Agent) => Style::default().fg(Color::Red).bold(),
        Some(EntityKind::Track) => Style::default().fg(Color::Yellow).bold(),
        Some(EntityKind::Pushable) => Style::default().fg(Color::Cyan),
        Some(EntityKind::Junction) => Style::default().fg(Color::Magenta),
        Some(EntityKind::Tile) => Style::default().fg(Color::Green),
        Some(EntityKind::Floor) | None => Style::default(),
    }
}

/// Renders the scenario grid onto the frame.
fn render_map(frame: &mut Frame, area: Rect, env: &TrolleyEnv) {
    let grid = env.render();
    let legend = &env.scenario().legend;

    let lines: Vec<Line> = (0..grid.rows())
        .filter_map(|r| grid.row(r))
        .map(|row| {
            Line::from(
                row.iter()
                    .map(|&g| Span::styled(g.to_string(), glyph_style(legend.kind_of(g))))
                    .collect::<Vec<_>>(),
            )
        })
        .collect();

    let map_paragraph = Paragraph::new(lines)
        .block(
            Block::default()
                .title(format!("Trolley World: {}", env.scenario().name))
                .borders(Borders::ALL),
        )
        .alignment(Alignment::Center);
    frame.render_widget(map_paragraph, area);
}

/// Lists the episode's summed reward next to the last step's reward.
fn render_rewards(frame: &mut Frame, area: Rect, app: &App) {
    let last = app.last_outcome.as_ref().map(|o| &o.reward);
    let items: Vec<ListItem> = app
        .episode_reward
        .iter()
        .map(|(label, total)| {
            let delta = last.and_then(|r| r.get(label)).unwrap_or(0.0);
            let delta_style = if delta != 0.0 {
                Style::default().fg(Color::Yellow)
            } else {
                Style::default().fg(Color::DarkGray)
            };
            ListItem::from(Line::from(vec![
                Span::raw(format!("{label:<16} {total:>8.2} ")),
                Span::styled(format!("{delta:+.2}"), delta_style),
            ]))
        })
        .collect();

    let rewards =
        List::new(items).block(Block::default().borders(Borders::ALL).title("Rewards"));
    frame.render_widget(rewards, area);
}

fn render_status(frame: &mut Frame, area: Rect, app: &App) {
    let state = app.env.state();
    let budget = |v: Option<i64>| v.map_or_else(|| "-".to_string(), |v| v.to_string());
    let mut first = vec![
        Span::raw(format!(
            "Episode {}  tick {}  severity {}  time {}  resource {}",
            app.episode,
            state.ticks,
            state.severity,
            budget(state.time),
            budget(state.resource),
        )),
    ];
    if state.done {
        first.push(Span::styled("  DONE", Style::default().fg(Color::Red).bold()));
    }
    let flags = format!(
        "pushed {}  trial {}  cat {}  portrait {}  branch ticks {}",
        state.flags.pushed,
        state.flags.trial,
        state.flags.cat_rescued,
        state.flags.portrait_rescued,
        state.probability_counter,
    );
    let lines = vec![
        Line::from(first),
        Line::from(flags),
        Line::from(app.status.as_str()),
    ];
    let status = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Status"));
    frame.render_widget(status, area);
}
