mod ui;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use keydoor_core::{
    DoorRule, GridMap, Landmarks, Plan, PlannerConfig, SearchLimits, State, SubgoalPlan,
    SubgoalPlanner, replay_steps, trace,
};
use ratatui::{
    crossterm::{
        self,
        event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode},
        execute,
        terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
    },
    prelude::*,
};
use serde::Serialize;
use std::{
    io::{self, Stdout},
    path::PathBuf,
    time::{Duration, Instant},
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// The example puzzle used when no map file is given.
const DEFAULT_MAP: &str = include_str!("../../maps/puzzle.txt");

#[derive(Parser, Debug)]
#[command(version, about = "Plans a key → door → goal route on a grid map", long_about = None)]
struct Args {
    /// Map file to load (markers: . # S K D G)
    #[arg(short, long, value_name = "MAP_FILE")]
    map: Option<PathBuf>,

    /// How a locked door may be approached
    #[arg(long, value_enum, default_value_t = DoorRuleArg::KeyholeEntry)]
    door_rule: DoorRuleArg,

    /// Stop each search after this many expanded states
    #[arg(long, value_name = "N")]
    max_expansions: Option<usize>,

    /// Print the plan and a step-by-step replay instead of starting the TUI
    #[arg(long, conflicts_with = "json")]
    print: bool,

    /// Print the plan as JSON instead of starting the TUI
    #[arg(long)]
    json: bool,

    /// Milliseconds between replay steps in the TUI
    #[arg(long, value_name = "MS", default_value_t = 500)]
    tick_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum DoorRuleArg {
    Strict,
    KeyholeEntry,
}

impl From<DoorRuleArg> for DoorRule {
    fn from(arg: DoorRuleArg) -> Self {
        match arg {
            DoorRuleArg::Strict => DoorRule::Strict,
            DoorRuleArg::KeyholeEntry => DoorRule::KeyholeEntry,
        }
    }
}

impl Args {
    fn planner_config(&self) -> PlannerConfig {
        PlannerConfig {
            door_rule: self.door_rule.into(),
            limits: SearchLimits {
                max_expansions: self.max_expansions,
            },
        }
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    landmarks: &'a Landmarks,
    #[serde(flatten)]
    solution: &'a SubgoalPlan,
}

pub struct App {
    /// The puzzle layout.
    map: GridMap,
    /// The plan being stepped through.
    plan: Plan,
    /// Every state along the plan, the initial state first.
    states: Vec<State>,
    /// Index into `states` of the state on screen.
    step: usize,
    /// Flag to stop automatic stepping.
    paused: bool,
    /// Flag to control the main loop.
    should_quit: bool,
}

impl App {
    fn new(map: GridMap, plan: Plan, states: Vec<State>) -> Self {
        App {
            map,
            plan,
            states,
            step: 0,
            paused: false,
            should_quit: false,
        }
    }

    fn current_state(&self) -> &State {
        &self.states[self.step]
    }

    fn is_finished(&self) -> bool {
        self.step + 1 >= self.states.len()
    }

    /// Advances one step unless paused or finished.
    fn tick(&mut self) {
        if !self.paused {
            self.next_step();
        }
    }

    fn next_step(&mut self) {
        if !self.is_finished() {
            self.step += 1;
        }
    }

    fn previous_step(&mut self) {
        self.step = self.step.saturating_sub(1);
    }

    fn restart(&mut self) {
        self.step = 0;
        self.paused = false;
    }

    fn toggle_pause(&mut self) {
        self.paused = !self.paused;
    }

    /// Sets the quit flag.
    fn quit(&mut self) {
        self.should_quit = true;
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let map = load_map(args.map.as_ref())?;
    let planner = SubgoalPlanner::new(&map, args.planner_config())
        .context("Map is not a key & door puzzle")?;
    let door_rule = planner.config().door_rule;
    let solution = planner.plan().context("Planning failed")?;
    info!(
        "planned {} actions ({} states expanded)",
        solution.plan.len(),
        solution.stats.expanded
    );

    if args.json {
        let report = JsonReport {
            landmarks: planner.landmarks(),
            solution: &solution,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if args.print {
        println!(
            "{}",
            replay_report(&map, planner.initial_state(), &solution.plan, door_rule)
        );
        return Ok(());
    }

    let states = trace(planner.initial_state(), &solution.plan, &map, door_rule)
        .context("Plan does not replay")?;
    let mut app = App::new(map, solution.plan, states);

    // Set up the terminal
    let mut terminal = setup_terminal()?;

    let result = run_app(&mut terminal, &mut app, Duration::from_millis(args.tick_ms));

    // Restore the terminal even if the loop failed
    restore_terminal(&mut terminal)?;

    result
}

/// Reads the map file, or falls back to the built-in example puzzle.
fn load_map(path: Option<&PathBuf>) -> Result<GridMap> {
    let Some(path) = path else {
        info!("No map file specified, using the example puzzle");
        return DEFAULT_MAP
            .parse::<GridMap>()
            .context("Built-in map is invalid");
    };
    let map_string = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read map file: {}", path.display()))?;
    map_string
        .parse::<GridMap>()
        .with_context(|| format!("Failed to parse map file: {}", path.display()))
}

/// The map, the plan, then the state and map after each replayed action.
///
/// A rejected action ends the report with the replay error.
fn replay_report(map: &GridMap, initial: State, plan: &Plan, rule: DoorRule) -> String {
    let mut lines = vec![format!("{map}\n"), format!("Full plan: {plan}")];

    let steps = plan.iter().zip(replay_steps(initial, plan, map, rule));
    for (index, (action, result)) in steps.enumerate() {
        lines.push(format!("Step {}: {action}", index + 1));
        match result {
            Ok(state) => {
                lines.push(format!(
                    "New position: {}, holds key: {}, door unlocked: {}",
                    state.position, state.holds_key, state.door_unlocked
                ));
                lines.push(format!("{}\n", ui::text_map(map, &state)));
            }
            Err(err) => {
                warn!("{err}");
                lines.push(format!("Action failed! {err}"));
                break;
            }
        }
    }
    lines.join("\n")
}

/// Configures the terminal for TUI interaction.
fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    let mut stdout = io::stdout();
    enable_raw_mode()?; // Put terminal in raw mode
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

/// Runs the main loop of the TUI application.
fn run_app(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    app: &mut App,
    tick_rate: Duration,
) -> Result<()> {
    let mut last_tick = Instant::now();

    loop {
        terminal.draw(|f| ui::ui(f, app))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_secs(0));

        if crossterm::event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => app.quit(),
                    KeyCode::Char(' ') => app.toggle_pause(),
                    KeyCode::Right | KeyCode::Char('n') => {
                        app.paused = true;
                        app.next_step();
                    }
                    KeyCode::Left | KeyCode::Char('p') => {
                        app.paused = true;
                        app.previous_step();
                    }
                    KeyCode::Char('r') => app.restart(),
                    _ => {}
                }
            }
        }

        if last_tick.elapsed() >= tick_rate {
            app.tick();
            last_tick = Instant::now();
        }

        if app.should_quit {
            break;
        }
    }
    Ok(())
}
