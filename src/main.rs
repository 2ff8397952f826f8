#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

use std::io;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Parser;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};

use manic_rust::simulation::{
    config::AgentConfig,
    environment::{PhaseSchedule, PlatformMentor, PlatformRun},
    persistence::{load_agent, save_agent},
};
use manic_rust::ui::{
    field::compute_contentment_grid,
    render::{draw_ui, overlay, world_to_grid_coords},
    DashboardState,
};

#[derive(Parser, Debug)]
#[command(name = "manic_rust")]
#[command(about = "Model-based learning agent on a drifting platform")]
struct Args {
    /// Steps with the mentor active
    #[arg(long, default_value_t = 2000)]
    supervised: u64,

    /// Steps without mentor, after the controls are rotated
    #[arg(long, default_value_t = 2000)]
    unsupervised: u64,

    /// Scored steps
    #[arg(long, default_value_t = 1000)]
    testing: u64,

    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Run without the dashboard, logging progress instead
    #[arg(long)]
    headless: bool,

    /// JSON agent config
    #[arg(long)]
    config: Option<PathBuf>,

    /// Use the reduced-budget preset
    #[arg(long)]
    light: bool,

    /// Write the agent snapshot here when the run ends
    #[arg(long)]
    save: Option<PathBuf>,

    /// Resume from an agent snapshot
    #[arg(long)]
    load: Option<PathBuf>,

    /// Drive the platform with uniform random actions, for a reference score
    #[arg(long)]
    random: bool,

    /// Dashboard tick in milliseconds
    #[arg(long, default_value_t = 20)]
    tick_ms: u64,
}

fn build_run(args: &Args) -> Result<PlatformRun, Box<dyn std::error::Error>> {
    let schedule = PhaseSchedule {
        supervised: args.supervised,
        unsupervised: args.unsupervised,
        testing: args.testing,
    };
    if let Some(path) = &args.load {
        let mentor = PlatformMentor::new();
        let agent = load_agent(path, Some(Box::new(mentor.clone())), args.seed)?;
        return Ok(PlatformRun::with_agent(agent, mentor, schedule, args.seed));
    }
    let config = match &args.config {
        Some(path) => AgentConfig::from_json_file(path)?,
        None if args.light => AgentConfig::light(),
        None => AgentConfig::default(),
    };
    Ok(PlatformRun::new(config, schedule, args.seed)?)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let mut run = build_run(&args)?;
    if args.random {
        run = run.with_random_actions();
    }

    if args.headless {
        env_logger::init();
        run_headless(&mut run)?;
    } else {
        // Setup Terminal
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let res = run_app(&mut terminal, &mut run, Duration::from_millis(args.tick_ms));

        // Restore Terminal
        disable_raw_mode()?;
        execute!(
            terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        )?;
        terminal.show_cursor()?;

        if let Err(err) = res {
            println!("{err:?}");
        }
        if let Some(mean) = run.mean_test_distance() {
            println!("Mean distance to origin during testing: {mean:.4}");
        }
    }

    if let Some(path) = &args.save {
        save_agent(&run.agent, path)?;
    }
    Ok(())
}

fn run_headless(run: &mut PlatformRun) -> Result<(), Box<dyn std::error::Error>> {
    let mut window = 0.0;
    let mut window_len = 0u32;
    while let Some(report) = run.advance()? {
        window += report.distance;
        window_len += 1;
        if window_len == 100 {
            log::info!(
                "step {} ({}): mean distance {:.4}",
                report.step + 1,
                report.phase.label(),
                window / f64::from(window_len)
            );
            window = 0.0;
            window_len = 0;
        }
    }
    match run.mean_test_distance() {
        Some(mean) => println!("Mean distance to origin during testing: {mean:.4}"),
        None => println!("No testing steps were run"),
    }
    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    run: &mut PlatformRun,
    tick_rate: Duration,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut last_tick = Instant::now();
    loop {
        // 1. Update
        if last_tick.elapsed() >= tick_rate {
            run.advance()?;
            last_tick = Instant::now();
        }

        // 2. Render
        let dashboard = DashboardState::from_run(run);
        let (x, y) = (run.platform.state[0], run.platform.state[1]);
        terminal.draw(|f| {
            let area = f.area();
            let rows = (area.height as usize).saturating_sub(1); // -1 for HUD
            let cols = area.width as usize;

            let mut grid = compute_contentment_grid(run.agent.models(), rows, cols);
            if rows > 0 && cols > 0 {
                let (r, c) = world_to_grid_coords(0.0, 0.0, rows, cols);
                overlay(&mut grid, r, c, '+');
                let (r, c) = world_to_grid_coords(x, y, rows, cols);
                overlay(&mut grid, r, c, 'O');
            }

            draw_ui(f, grid, &dashboard);
        })?;

        // 3. Input
        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_secs(0));

        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.code == KeyCode::Char('q') {
                    return Ok(());
                }
            }
        }
    }
}
