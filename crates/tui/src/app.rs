use std::sync::{mpsc, Arc, Mutex, MutexGuard};

use brushwork_core::types::{Command, CommandEntry, EntryStatus, RunState};

use crate::confirm::ConfirmDialog;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// Passed / failed / not yet run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Tally {
    pub passed: usize,
    pub failed: usize,
    pub pending: usize,
}

pub struct App {
    pub entries: Arc<Mutex<Vec<CommandEntry>>>,
    pub run_state: Arc<Mutex<RunState>>,
    /// Batch file shown in the list title
    pub batch_name: String,
    pub selected: usize,
    pub log_visible: bool,
    pub log_messages: Vec<String>,
    pub log_scroll: usize, // scroll offset from bottom (0 = latest)
    pub log_rx: mpsc::Receiver<String>,
    pub cmd_tx: mpsc::Sender<Command>,
    pub confirm: Option<ConfirmDialog>,
    pub should_quit: bool,
}

impl App {
    pub fn new(
        entries: Arc<Mutex<Vec<CommandEntry>>>,
        run_state: Arc<Mutex<RunState>>,
        batch_name: impl Into<String>,
        log_rx: mpsc::Receiver<String>,
        cmd_tx: mpsc::Sender<Command>,
    ) -> Self {
        Self {
            entries,
            run_state,
            batch_name: batch_name.into(),
            selected: 0,
            log_visible: true,
            log_messages: Vec::new(),
            log_scroll: 0,
            log_rx,
            cmd_tx,
            confirm: None,
            should_quit: false,
        }
    }

    pub fn drain_logs(&mut self) {
        while let Ok(msg) = self.log_rx.try_recv() {
            self.log_messages.push(msg);
        }
    }

    pub fn scroll_log_up(&mut self, n: usize) {
        self.log_scroll = self.log_scroll.saturating_add(n);
    }

    pub fn scroll_log_down(&mut self, n: usize) {
        self.log_scroll = self.log_scroll.saturating_sub(n);
    }

    pub fn move_up(&mut self) {
        if self.selected > 0 {
            self.selected -= 1;
        }
    }

    pub fn move_down(&mut self) {
        let len = lock(&self.entries).len();
        if self.selected + 1 < len {
            self.selected += 1;
        }
    }

    pub fn toggle_log(&mut self) {
        self.log_visible = !self.log_visible;
    }

    pub fn run_state(&self) -> RunState {
        *lock(&self.run_state)
    }

    pub fn tally(&self) -> Tally {
        lock(&self.entries).iter().fold(Tally::default(), |mut t, e| {
            match e.status {
                EntryStatus::Passed => t.passed += 1,
                EntryStatus::Failed => t.failed += 1,
                EntryStatus::Pending | EntryStatus::Running => t.pending += 1,
            }
            t
        })
    }

    /// Flip the shared state, then wake the runner.
    pub fn start_stop(&mut self) {
        {
            let mut state = lock(&self.run_state);
            *state = match *state {
                RunState::Stopped => RunState::Running,
                RunState::Running => RunState::Stopping,
                RunState::Stopping | RunState::Finished => return,
            };
        }
        self.cmd_tx.send(Command::StartStop).ok();
    }

    /// Quit at once when idle; ask first while a command may be in flight.
    pub fn request_quit(&mut self) {
        if self.run_state() == RunState::Running {
            self.confirm = Some(ConfirmDialog::new("Batch is running. Quit anyway?"));
        } else {
            self.quit();
        }
    }

    pub fn resolve_confirm(&mut self, yes: bool) {
        if self.confirm.take().is_some() && yes {
            self.quit();
        }
    }

    pub fn quit(&mut self) {
        self.cmd_tx.send(Command::Quit).ok();
        self.should_quit = true;
    }
}
