use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::logger;
use crate::platform::hotkey;
use crate::protocol::ProtocolLine;
use crate::session::{log_outcome, BatchReport, Session};
use crate::types::*;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// TUI rows for a parsed batch, all pending.
pub fn entries_for(lines: &[ProtocolLine]) -> Vec<CommandEntry> {
    lines.iter().map(|l| CommandEntry::new(l.line_no, l.raw.clone())).collect()
}

/// Drain pending commands. Returns false on Quit.
fn process_commands(cmd_rx: &mpsc::Receiver<Command>, run_state: &Mutex<RunState>) -> bool {
    while let Ok(cmd) = cmd_rx.try_recv() {
        match cmd {
            Command::Quit => {
                logger::info("shutting down");
                return false;
            }
            Command::StartStop => match *lock(run_state) {
                // TUI already flipped the state; the loop below acts on it
                RunState::Running => logger::info("batch started"),
                RunState::Stopping => logger::info("batch stopping after the current command..."),
                RunState::Stopped | RunState::Finished => {}
            },
        }
    }
    true
}

/// Batch loop. Runs on a background thread, one command at a time, and
/// returns the report once the TUI asks to quit.
pub fn run(
    entries: Arc<Mutex<Vec<CommandEntry>>>,
    run_state: Arc<Mutex<RunState>>,
    mut session: Session,
    lines: Vec<ProtocolLine>,
    cmd_rx: mpsc::Receiver<Command>,
    abort: Arc<AtomicBool>,
) -> BatchReport {
    let mut report = BatchReport::default();
    let mut next = 0;

    loop {
        if !process_commands(&cmd_rx, &run_state) {
            return report;
        }

        if abort.swap(false, Ordering::AcqRel) {
            let mut state = lock(&run_state);
            if *state == RunState::Running {
                logger::warn("abort hotkey pressed");
                *state = RunState::Stopping;
                hotkey::activate_terminal();
            }
        }

        let current = *lock(&run_state);
        if current == RunState::Stopping {
            *lock(&run_state) = RunState::Stopped;
            logger::info(&format!("batch paused before command {}/{}", next + 1, lines.len()));
            continue;
        }
        if current != RunState::Running {
            std::thread::sleep(Duration::from_millis(100));
            continue;
        }

        let Some(line) = lines.get(next) else {
            *lock(&run_state) = RunState::Finished;
            logger::info(&format!("batch finished: {}", report.summary()));
            continue;
        };

        if let Some(entry) = lock(&entries).get_mut(next) {
            entry.status = EntryStatus::Running;
        }

        let (outcome, fatal) = match session.run_line(line) {
            Ok(outcome) => (outcome, None),
            Err((outcome, e)) => (outcome, Some(e)),
        };
        log_outcome(next + 1, lines.len(), &outcome);

        // Write back status (brief lock)
        if let Some(entry) = lock(&entries).get_mut(next) {
            entry.status = if outcome.success { EntryStatus::Passed } else { EntryStatus::Failed };
            entry.reason = Some(outcome.reason.clone());
        }
        report.record(outcome);
        next += 1;

        if let Some(e) = fatal {
            logger::error(&format!("stopping batch: {}", e));
            report.aborted = Some(e.to_string());
            *lock(&run_state) = RunState::Finished;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::parse_batch;
    use crate::session::tests::stub_session;
    use std::time::Instant;

    fn wait_for(state: &Mutex<RunState>, want: RunState) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while *lock(state) != want {
            assert!(Instant::now() < deadline, "runner never reached {:?}", want);
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    fn spawn(
        text: &str,
        start: RunState,
        abort: bool,
    ) -> (
        Arc<Mutex<Vec<CommandEntry>>>,
        Arc<Mutex<RunState>>,
        mpsc::Sender<Command>,
        std::thread::JoinHandle<BatchReport>,
    ) {
        let (session, _) = stub_session();
        let lines = parse_batch(text);
        let entries = Arc::new(Mutex::new(entries_for(&lines)));
        let run_state = Arc::new(Mutex::new(start));
        let abort = Arc::new(AtomicBool::new(abort));
        let (tx, rx) = mpsc::channel();
        let handle = {
            let entries = Arc::clone(&entries);
            let run_state = Arc::clone(&run_state);
            std::thread::spawn(move || run(entries, run_state, session, lines, rx, abort))
        };
        (entries, run_state, tx, handle)
    }

    const BATCH: &str = "\
TOOL: ensure_paint_focused
TOOL: select_color | {\"color_name\": \"mauve\"}
TOOL: draw_rectangle | {\"x1\": 100, \"y1\": 100, \"x2\": 300, \"y2\": 300}
";

    #[test]
    fn runs_to_completion_and_marks_entries() {
        let (entries, run_state, tx, handle) = spawn(BATCH, RunState::Running, false);
        wait_for(&run_state, RunState::Finished);
        tx.send(Command::Quit).unwrap();
        let report = handle.join().unwrap();

        assert_eq!((report.attempted, report.succeeded), (3, 2));
        let statuses: Vec<EntryStatus> = lock(&entries).iter().map(|e| e.status.clone()).collect();
        assert_eq!(statuses, vec![EntryStatus::Passed, EntryStatus::Failed, EntryStatus::Passed]);
        assert!(lock(&entries)[1].reason.as_deref().unwrap_or("").contains("mauve"));
    }

    #[test]
    fn stays_idle_until_started() {
        let (entries, run_state, tx, handle) = spawn(BATCH, RunState::Stopped, false);
        std::thread::sleep(Duration::from_millis(150));
        assert!(lock(&entries).iter().all(|e| e.status == EntryStatus::Pending));

        *lock(&run_state) = RunState::Running;
        tx.send(Command::StartStop).unwrap();
        wait_for(&run_state, RunState::Finished);
        tx.send(Command::Quit).unwrap();
        assert_eq!(handle.join().unwrap().attempted, 3);
    }

    #[test]
    fn abort_pauses_before_the_first_command() {
        let (entries, run_state, tx, handle) = spawn(BATCH, RunState::Running, true);
        wait_for(&run_state, RunState::Stopped);
        tx.send(Command::Quit).unwrap();
        let report = handle.join().unwrap();
        assert_eq!(report.attempted, 0);
        assert!(lock(&entries).iter().all(|e| e.status == EntryStatus::Pending));
    }
}
