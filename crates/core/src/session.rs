//! One automation session: a platform, a loaded profile, settings, and the
//! current canvas bounds of the target window.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::calibration::{CalibrationProfile, CalibrationStore};
use crate::canvas::{compute_bounds, CanvasBounds};
use crate::dispatch::{Dispatcher, DrawCommand};
use crate::error::{BrushError, Result};
use crate::executor::ActionExecutor;
use crate::logger;
use crate::platform::{InputDevice, Platform, WindowManager};
use crate::protocol::{ProtocolCommand, ProtocolLine};
use crate::settings::Settings;
use crate::sleep;
use crate::types::{Region, WindowId};
use crate::verify::{Diagnostics, ExecutionResult, VerificationEngine};

/// Result of one protocol line
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    pub line_no: usize,
    pub tool: String,
    pub success: bool,
    pub reason: String,
    /// The parameters could not be parsed; the command never ran
    pub unparsable: bool,
    pub diagnostics: Option<Diagnostics>,
}

impl CommandOutcome {
    fn from_result(line: &ProtocolLine, r: ExecutionResult) -> Self {
        Self {
            line_no: line.line_no,
            tool: line.tool.clone(),
            success: r.success,
            reason: r.reason,
            unparsable: false,
            diagnostics: r.diagnostics,
        }
    }

    fn failed(line: &ProtocolLine, err: &BrushError) -> Self {
        Self {
            line_no: line.line_no,
            tool: line.tool.clone(),
            success: false,
            reason: err.to_string(),
            unparsable: matches!(err, BrushError::Protocol(_)),
            diagnostics: None,
        }
    }
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub skipped_unparsable: usize,
    pub outcomes: Vec<CommandOutcome>,
    /// Why the batch stopped before its last line, if it did
    pub aborted: Option<String>,
}

impl BatchReport {
    pub fn record(&mut self, outcome: CommandOutcome) {
        self.attempted += 1;
        if outcome.success {
            self.succeeded += 1;
        }
        if outcome.unparsable {
            self.skipped_unparsable += 1;
        }
        self.outcomes.push(outcome);
    }

    pub fn all_succeeded(&self) -> bool {
        self.aborted.is_none() && self.succeeded == self.attempted
    }

    pub fn summary(&self) -> String {
        let mut s = format!("{}/{} commands succeeded", self.succeeded, self.attempted);
        if self.skipped_unparsable > 0 {
            s.push_str(&format!(", {} unparsable", self.skipped_unparsable));
        }
        if let Some(why) = &self.aborted {
            s.push_str(&format!(", stopped early: {}", why));
        }
        s
    }
}

pub struct Session {
    platform: Box<dyn Platform>,
    settings: Settings,
    profile: CalibrationProfile,
    window: Option<WindowId>,
    /// Outer window rectangle the bounds were derived from, and the bounds
    canvas: Option<(Region, CanvasBounds)>,
}

impl Session {
    /// Build a session around an already loaded profile. Entries that fall
    /// off the current screen are dropped.
    pub fn new(platform: Box<dyn Platform>, settings: Settings, mut profile: CalibrationProfile) -> Self {
        let dropped = profile.retain_on_screen(platform.screen_size());
        if dropped > 0 {
            logger::warn_p("session", &format!("{} calibrated position(s) ignored", dropped));
        }
        Self { platform, settings, profile, window: None, canvas: None }
    }

    /// Load `profile_name` from the configured profile directory.
    pub fn open(platform: Box<dyn Platform>, settings: Settings, profile_name: &str) -> Result<Self> {
        let profile = CalibrationStore::new(&settings.profile_dir).load(profile_name)?;
        let session = Self::new(platform, settings, profile);
        if session.profile.is_empty() {
            return Err(BrushError::CalibrationMissing {
                profile: profile_name.to_string(),
                reason: "no calibrated position lies on this screen".into(),
            });
        }
        Ok(session)
    }

    pub fn bounds(&self) -> Option<CanvasBounds> {
        self.canvas.map(|(_, b)| b)
    }

    /// Find and focus the window, then derive fresh bounds. Retries with
    /// backoff; `InvalidWindowState` once the attempts run out.
    pub fn refresh_bounds(&mut self) -> Result<CanvasBounds> {
        let focus = self.settings.focus.clone();
        let attempts = focus.attempts.max(1);
        let mut last_error = String::new();
        for attempt in 1..=attempts {
            match self.focus_and_measure() {
                Ok(bounds) => return Ok(bounds),
                Err(e) => {
                    logger::warn_p("session", &format!("focus attempt {}/{}: {}", attempt, attempts, e));
                    last_error = e.to_string();
                }
            }
            if attempt < attempts {
                std::thread::sleep(sleep::backoff_delay(&focus, attempt));
            }
        }
        Err(BrushError::InvalidWindowState(format!(
            "gave up after {} attempt(s), last: {}", attempts, last_error
        )))
    }

    fn focus_and_measure(&mut self) -> Result<CanvasBounds> {
        let pattern = &self.settings.window_pattern;
        let id = self.platform.find_window(pattern).ok_or_else(|| {
            BrushError::InvalidWindowState(format!("no window title matches '{}'", pattern))
        })?;
        self.window = Some(id);
        // Focusing may restore or maximize: the old bounds are stale either way
        self.canvas = None;
        if !self.platform.focus(id) {
            return Err(BrushError::InvalidWindowState("window did not come to the foreground".into()));
        }
        let rect = self
            .platform
            .outer_rect(id)
            .ok_or_else(|| BrushError::InvalidWindowState("window vanished while focusing".into()))?;
        let bounds = compute_bounds(&rect, &self.settings.margins())?;
        logger::info_p("canvas", &format!("canvas bounds {}", bounds));
        self.canvas = Some((rect, bounds));
        Ok(bounds)
    }

    /// Bounds for the next command. Reused while the window rectangle is
    /// unchanged, recomputed after a move or resize, and refreshed through
    /// focus when there is no usable window.
    pub fn current_bounds(&mut self) -> Result<CanvasBounds> {
        if let (Some(id), Some((rect, bounds))) = (self.window, self.canvas) {
            match self.platform.outer_rect(id) {
                Some(now) if now == rect => return Ok(bounds),
                Some(now) if !self.platform.is_minimized(id) => {
                    if let Ok(fresh) = compute_bounds(&now, &self.settings.margins()) {
                        logger::info_p("canvas", &format!("window moved or resized, canvas bounds {}", fresh));
                        self.canvas = Some((now, fresh));
                        return Ok(fresh);
                    }
                }
                _ => {}
            }
        }
        self.refresh_bounds()
    }

    /// Dispatch, execute and verify one drawing command.
    pub fn execute(&mut self, command: &DrawCommand) -> Result<ExecutionResult> {
        let bounds = self.current_bounds()?;
        let plan = Dispatcher::new(&self.profile, self.settings.inset).dispatch(command, &bounds)?;
        let engine = VerificationEngine::new(&self.settings);
        let delays = &self.settings.delays;
        let label = command.describe();
        logger::info_p("exec", &format!("{}: {} action(s)", label, plan.actions.len()));
        engine.verify(self.platform.as_mut(), plan.verify_rect, &label, |input| {
            ActionExecutor::new(input, delays).run(&plan.actions)
        })
    }

    /// Run one protocol line. Only a window that cannot be brought back is
    /// an error; every other failure lands in the outcome.
    pub fn run_line(&mut self, line: &ProtocolLine) -> std::result::Result<CommandOutcome, (CommandOutcome, BrushError)> {
        let command = match &line.command {
            Ok(c) => c,
            Err(e) => return Ok(CommandOutcome::failed(line, e)),
        };
        let result = match command {
            ProtocolCommand::Focus => self
                .refresh_bounds()
                .map(|b| ExecutionResult::unverified(format!("focused, canvas {}", b))),
            ProtocolCommand::Draw(cmd) => self.execute(cmd),
        };
        match result {
            Ok(r) => Ok(CommandOutcome::from_result(line, r)),
            Err(e @ BrushError::InvalidWindowState(_)) => Err((CommandOutcome::failed(line, &e), e)),
            Err(e) => Ok(CommandOutcome::failed(line, &e)),
        }
    }

    /// Run `lines` in order. `abort` is checked between commands.
    pub fn run_batch(&mut self, lines: &[ProtocolLine], abort: Option<&AtomicBool>) -> BatchReport {
        let mut report = BatchReport::default();
        for (i, line) in lines.iter().enumerate() {
            if abort.is_some_and(|a| a.load(Ordering::Acquire)) {
                logger::warn_p("session", "batch aborted by user");
                report.aborted = Some("aborted by user".into());
                break;
            }
            match self.run_line(line) {
                Ok(outcome) => {
                    log_outcome(i + 1, lines.len(), &outcome);
                    report.record(outcome);
                }
                Err((outcome, e)) => {
                    log_outcome(i + 1, lines.len(), &outcome);
                    report.record(outcome);
                    logger::error_p("session", &format!("stopping batch: {}", e));
                    report.aborted = Some(e.to_string());
                    break;
                }
            }
        }
        logger::info_p("session", &report.summary());
        report
    }
}

pub(crate) fn log_outcome(n: usize, total: usize, outcome: &CommandOutcome) {
    let msg = format!("[{}/{}] line {} {}: {}", n, total, outcome.line_no, outcome.tool, outcome.reason);
    if outcome.success {
        logger::info_p("session", &msg);
    } else {
        logger::warn_p("session", &msg);
    }
}
