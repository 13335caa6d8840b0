use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::AtomicBool;
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};

use brushwork_core::calibration::{CalibrationProfile, CalibrationStore};
use brushwork_core::platform::{create_platform, hotkey, InputDevice};
use brushwork_core::protocol::{parse_batch, ProtocolLine};
use brushwork_core::session::{BatchReport, Session};
use brushwork_core::settings::Settings;
use brushwork_core::types::{Command, RunState};
use brushwork_core::{demo, logger, runner, BrushError};

#[derive(Parser, Debug)]
#[command(name = "brushwork", version, about = "Calibrated, verified drawing automation for Microsoft Paint")]
struct Cli {
    /// Use the in-memory stub platform instead of the native backend
    #[arg(long, global = true)]
    stub: bool,
    /// Settings file (defaults apply when it is missing)
    #[arg(long, global = true, default_value = "settings.json")]
    settings: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Record tool and color positions by hovering over them
    Calibrate(CalibrateArgs),
    /// Run a file of `TOOL: name | {json}` lines
    Run(RunArgs),
    /// Focus the Paint window and print the inferred canvas bounds
    Bounds,
    /// Draw a random grid of shapes
    Demo(DemoArgs),
}

#[derive(Args, Debug)]
struct CalibrateArgs {
    #[arg(long, default_value = "default")]
    profile: String,
    /// Seconds between pressing Enter and reading the cursor
    #[arg(long, default_value_t = 3)]
    delay: u64,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Batch file
    file: PathBuf,
    #[arg(long, default_value = "default")]
    profile: String,
    /// Show progress in the terminal UI
    #[arg(long)]
    tui: bool,
}

#[derive(Args, Debug)]
struct DemoArgs {
    #[arg(long, default_value = "default")]
    profile: String,
    #[arg(long, default_value_t = 3)]
    rows: u32,
    #[arg(long, default_value_t = 3)]
    cols: u32,
    /// Fixed seed for a reproducible grid
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let logs_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")).join("logs");
    logger::init(&logs_dir);
    logger::register_core_prefixes();

    let settings = Settings::load(&cli.settings);

    match cli.command {
        Commands::Calibrate(args) => {
            logger::set_echo(true);
            calibrate(&args, &settings, cli.stub)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Bounds => {
            logger::set_echo(true);
            let mut session = Session::new(create_platform(cli.stub), settings, CalibrationProfile::new());
            let bounds = session.refresh_bounds()?;
            println!("canvas {}", bounds);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Run(args) => {
            let text = std::fs::read_to_string(&args.file)
                .with_context(|| format!("reading {}", args.file.display()))?;
            let name = args.file.display().to_string();
            if args.tui {
                run_tui(parse_batch(&text), &name, &args.profile, settings, cli.stub)
            } else {
                run_plain(parse_batch(&text), &args.profile, settings, cli.stub)
            }
        }
        Commands::Demo(args) => {
            let text = demo::shape_grid(args.rows, args.cols, args.seed);
            run_plain(parse_batch(&text), &args.profile, settings, cli.stub)
        }
    }
}

fn open_session(profile: &str, settings: Settings, stub: bool) -> Result<Session> {
    match Session::open(create_platform(stub), settings, profile) {
        Ok(s) => Ok(s),
        Err(e @ BrushError::CalibrationMissing { .. }) => {
            Err(anyhow::Error::new(e).context("run `brushwork calibrate` first"))
        }
        Err(e) => Err(e.into()),
    }
}

fn exit_code(report: &BatchReport) -> ExitCode {
    if report.all_succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn print_report(report: &BatchReport) {
    for o in &report.outcomes {
        let mark = if o.success { "ok  " } else { "FAIL" };
        println!("{} line {:>3} {:<20} {}", mark, o.line_no, o.tool, o.reason);
        if let Some(d) = &o.diagnostics {
            println!("          before {}", d.before.display());
            println!("          after  {}", d.after.display());
        }
    }
    println!("{}", report.summary());
}

fn run_plain(lines: Vec<ProtocolLine>, profile: &str, settings: Settings, stub: bool) -> Result<ExitCode> {
    logger::set_echo(true);
    if lines.is_empty() {
        bail!("no `TOOL:` lines to run");
    }
    let mut session = open_session(profile, settings, stub)?;

    let abort = Arc::new(AtomicBool::new(false));
    hotkey::start_hotkey_listener(Arc::clone(&abort));

    let report = session.run_batch(&lines, Some(&abort));
    print_report(&report);
    Ok(exit_code(&report))
}

fn run_tui(lines: Vec<ProtocolLine>, name: &str, profile: &str, settings: Settings, stub: bool) -> Result<ExitCode> {
    if lines.is_empty() {
        bail!("no `TOOL:` lines to run");
    }
    let session = open_session(profile, settings, stub)?;

    // Shared state
    let entries = Arc::new(Mutex::new(runner::entries_for(&lines)));
    let run_state = Arc::new(Mutex::new(RunState::Stopped));

    // Channels
    let (log_tx, log_rx) = mpsc::channel::<String>();
    let (cmd_tx, cmd_rx) = mpsc::channel::<Command>();
    logger::set_tui_sender(log_tx);
    logger::info(&format!("{} command(s) loaded from {}, press S to run", lines.len(), name));

    // Abort hotkey (Ctrl+Shift+K), checked by the runner between commands
    let abort = Arc::new(AtomicBool::new(false));
    hotkey::start_hotkey_listener(Arc::clone(&abort));

    let worker = {
        let entries = Arc::clone(&entries);
        let run_state = Arc::clone(&run_state);
        thread::spawn(move || runner::run(entries, run_state, session, lines, cmd_rx, abort))
    };

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;

    let mut app = brushwork_tui::App::new(entries, run_state, name, log_rx, cmd_tx);
    let result = brushwork_tui::event::run(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;
    result?;

    // The runner exits on Quit once its current command is done
    let report = worker
        .join()
        .map_err(|_| anyhow::anyhow!("batch runner thread panicked"))?;
    print_report(&report);
    Ok(exit_code(&report))
}

fn calibrate(args: &CalibrateArgs, settings: &Settings, stub: bool) -> Result<()> {
    let platform = create_platform(stub);
    let store = CalibrationStore::new(&settings.profile_dir);
    let screen = platform.screen_size();

    let mut session = store.begin(&args.profile, screen).with_context(|| {
        format!("profile '{}' could not be read; fix or remove it first", args.profile)
    })?;
    if !session.profile().is_empty() {
        println!("updating profile '{}' ({} positions)", args.profile, session.profile().len());
    }

    println!("Hover over a tool or color, then press Enter.");
    println!("Enter alone takes the next missing label; type a label to name it yourself,");
    println!("'list' shows what is still missing, 'done' saves.");

    let stdin = io::stdin();
    let mut input = String::new();
    loop {
        let missing = session.missing_required();
        match missing.first() {
            Some(next) => print!("[{}] > ", next),
            None => print!("[all required labels captured] > "),
        }
        io::stdout().flush()?;

        input.clear();
        if stdin.lock().read_line(&mut input)? == 0 {
            break;
        }
        let label = match input.trim() {
            "done" | "q" => break,
            "list" => {
                println!("missing: {}", missing.join(", "));
                continue;
            }
            "" => match missing.first() {
                Some(next) => next.to_string(),
                None => {
                    println!("type a label name, or 'done'");
                    continue;
                }
            },
            other => other.to_string(),
        };

        for remaining in (1..=args.delay).rev() {
            print!("{}.. ", remaining);
            io::stdout().flush()?;
            thread::sleep(Duration::from_secs(1));
        }
        let Some(point) = platform.cursor_position() else {
            println!("cursor position unavailable");
            continue;
        };
        if session.record(&label, point) {
            println!("'{}' -> {}", label, point);
        } else {
            println!("'{}' at {} rejected (off screen)", label, point);
        }
    }

    let missing = session.missing_required();
    let profile = session.finish();
    if profile.is_empty() {
        bail!("nothing recorded, profile '{}' left untouched", args.profile);
    }
    let path = store.save(&profile, &args.profile)?;
    println!("saved {} position(s) to {}", profile.len(), path.display());
    if !missing.is_empty() {
        println!("still missing: {}", missing.join(", "));
    }
    Ok(())
}
