use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{mpsc, Mutex, OnceLock};
use chrono::Local;

static LOGGER: OnceLock<Mutex<Logger>> = OnceLock::new();

struct Logger {
    file: Option<File>,
    tui_tx: Option<mpsc::Sender<String>>,
    echo: bool,
    prefixes: HashMap<String, u8>, // prefix -> color index
}

// Color indices for TUI rendering (mapped in ui.rs)
pub const COLOR_GRAY: u8 = 1;
pub const COLOR_BLUE: u8 = 2;
pub const COLOR_GREEN: u8 = 3;
pub const COLOR_MAGENTA: u8 = 4;

/// Initialize the global logger. Clears the log file.
///
/// If the log file cannot be opened the logger still runs, without a file sink.
pub fn init(log_dir: &Path) {
    fs::create_dir_all(log_dir).ok();
    let log_path = log_dir.join("app.log");
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&log_path)
        .ok();

    LOGGER
        .set(Mutex::new(Logger { file, tui_tx: None, echo: false, prefixes: HashMap::new() }))
        .ok();
}

/// Wire the TUI log channel.
pub fn set_tui_sender(tx: mpsc::Sender<String>) {
    if let Some(logger) = LOGGER.get() {
        if let Ok(mut l) = logger.lock() {
            l.tui_tx = Some(tx);
        }
    }
}

/// Mirror plain log lines to stderr (CLI mode, no TUI).
pub fn set_echo(echo: bool) {
    if let Some(logger) = LOGGER.get() {
        if let Ok(mut l) = logger.lock() {
            l.echo = echo;
        }
    }
}

/// Register a prefix with a color. All subsequent log calls through
/// `info_p`/`warn_p`/`error_p` will use this color for the prefix.
pub fn register_prefix(prefix: &str, color: u8) {
    if let Some(logger) = LOGGER.get() {
        if let Ok(mut l) = logger.lock() {
            l.prefixes.insert(prefix.to_string(), color);
        }
    }
}

/// Register the prefixes used by the core components.
pub fn register_core_prefixes() {
    register_prefix("calib", COLOR_MAGENTA);
    register_prefix("canvas", COLOR_BLUE);
    register_prefix("exec", COLOR_GRAY);
    register_prefix("verify", COLOR_GREEN);
    register_prefix("session", COLOR_BLUE);
}

/// Internal: format for TUI channel uses \x1f as field separator:
/// level\x1fprefix\x1fcolor\x1ftimestamp\x1fmessage
fn write_log(level: &str, prefix: &str, color: u8, msg: &str) {
    let ts = Local::now().format("%H:%M:%S").to_string();

    // File always gets plain text
    let file_line = if prefix.is_empty() {
        format!("[{}] [{}] {}", ts, level, msg)
    } else {
        format!("[{}] [{}] [{}] {}", ts, level, prefix, msg)
    };

    // TUI gets structured data
    let tui_line = format!("{}\x1f{}\x1f{}\x1f{}\x1f{}", level, prefix, color, ts, msg);

    if let Some(logger) = LOGGER.get() {
        let Ok(mut l) = logger.lock() else { return };
        if let Some(file) = l.file.as_mut() {
            writeln!(file, "{}", file_line).ok();
        }
        if l.echo {
            eprintln!("{}", file_line);
        }
        if let Some(tx) = &l.tui_tx {
            tx.send(tui_line).ok();
        }
    }
}

fn prefix_color(prefix: &str) -> u8 {
    LOGGER.get()
        .and_then(|l| l.lock().ok())
        .and_then(|l| l.prefixes.get(prefix).copied())
        .unwrap_or(0)
}

pub fn info(msg: &str) {
    write_log("INFO", "", 0, msg);
}

pub fn warn(msg: &str) {
    write_log("WARN", "", 0, msg);
}

pub fn error(msg: &str) {
    write_log("ERROR", "", 0, msg);
}

/// Log with a registered prefix. Looks up the color from registration.
pub fn info_p(prefix: &str, msg: &str) {
    write_log("INFO", prefix, prefix_color(prefix), msg);
}

pub fn warn_p(prefix: &str, msg: &str) {
    write_log("WARN", prefix, prefix_color(prefix), msg);
}

pub fn error_p(prefix: &str, msg: &str) {
    write_log("ERROR", prefix, prefix_color(prefix), msg);
}
