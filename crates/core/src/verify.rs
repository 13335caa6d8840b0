//! Before/after screen comparison around an action.
//!
//! Only pixels on the perimeter of the expected rectangle are sampled, every
//! `stride` pixels along each edge. This is a cheap approximation: a shape
//! drawn fully inside the rectangle, or with an outline matching the old
//! background, reads as a failure; an unrelated change crossing the perimeter
//! reads as success. The result is a soft signal and never aborts a batch.

use std::path::{Path, PathBuf};

use chrono::Local;

use crate::error::{BrushError, Result};
use crate::logger;
use crate::platform::ScreenCapture;
use crate::settings::Settings;
use crate::sleep::sleep_ms;
use crate::types::{Capture, ScreenPoint, ScreenRect};

/// Paths of the rasters kept for a failed verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostics {
    pub before: PathBuf,
    pub after: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub success: bool,
    pub changed_samples: usize,
    pub total_samples: usize,
    pub reason: String,
    pub diagnostics: Option<Diagnostics>,
}

impl ExecutionResult {
    /// Result for an action that is not expected to change the canvas.
    pub fn unverified(reason: impl Into<String>) -> Self {
        Self {
            success: true,
            changed_samples: 0,
            total_samples: 0,
            reason: reason.into(),
            diagnostics: None,
        }
    }

    fn failed(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            changed_samples: 0,
            total_samples: 0,
            reason: reason.into(),
            diagnostics: None,
        }
    }
}

/// Perimeter points of `rect`, `stride` apart, walked clockwise from the
/// top-left corner. Each edge runs from its start corner up to (not
/// including) the next one, so every point appears once. A flat rectangle
/// (a horizontal or vertical line) is a single run including both ends.
pub fn perimeter_samples(rect: ScreenRect, stride: u32) -> Vec<ScreenPoint> {
    let step = stride.max(1) as usize;
    let ScreenRect { left, top, right, bottom } = rect;
    match (left == right, top == bottom) {
        (true, true) => Vec::new(),
        (false, true) => (left..=right).step_by(step).map(|x| ScreenPoint::new(x, top)).collect(),
        (true, false) => (top..=bottom).step_by(step).map(|y| ScreenPoint::new(left, y)).collect(),
        (false, false) => {
            let mut points = Vec::new();
            points.extend((left..right).step_by(step).map(|x| ScreenPoint::new(x, top)));
            points.extend((top..bottom).step_by(step).map(|y| ScreenPoint::new(right, y)));
            points.extend(((left + 1)..=right).rev().step_by(step).map(|x| ScreenPoint::new(x, bottom)));
            points.extend(((top + 1)..=bottom).rev().step_by(step).map(|y| ScreenPoint::new(left, y)));
            points
        }
    }
}

pub struct VerificationEngine {
    stride: u32,
    threshold: usize,
    settle_ms: u64,
    diagnostics_dir: Option<PathBuf>,
}

impl VerificationEngine {
    pub fn new(settings: &Settings) -> Self {
        let v = &settings.verification;
        Self {
            stride: v.stride,
            threshold: v.threshold,
            settle_ms: settings.delays.verify_settle_ms,
            diagnostics_dir: v.save_diagnostics.then(|| settings.diagnostics_dir.clone()),
        }
    }

    pub fn with_params(stride: u32, threshold: usize) -> Self {
        Self { stride, threshold, settle_ms: 0, diagnostics_dir: None }
    }

    pub fn capture_before<S: ScreenCapture + ?Sized>(&self, screen: &mut S) -> Option<Capture> {
        screen.capture()
    }

    /// Waits for the UI to settle, then captures.
    pub fn capture_after<S: ScreenCapture + ?Sized>(&self, screen: &mut S) -> Option<Capture> {
        sleep_ms(self.settle_ms);
        screen.capture()
    }

    /// Count perimeter samples that differ. Samples outside either raster
    /// count toward the total but never as changed.
    pub fn compare(&self, before: &Capture, after: &Capture, rect: ScreenRect) -> ExecutionResult {
        let samples = perimeter_samples(rect, self.stride);
        let changed = samples
            .iter()
            .filter(|p| match (before.pixel(p.x, p.y), after.pixel(p.x, p.y)) {
                (Some(a), Some(b)) => a != b,
                _ => false,
            })
            .count();
        let success = changed > self.threshold;
        let reason = if success {
            format!("{} of {} perimeter samples changed", changed, samples.len())
        } else {
            BrushError::VerificationFailed {
                changed,
                total: samples.len(),
                threshold: self.threshold,
            }
            .to_string()
        };
        ExecutionResult {
            success,
            changed_samples: changed,
            total_samples: samples.len(),
            reason,
            diagnostics: None,
        }
    }

    /// Capture, run `action`, capture again and compare around `rect`.
    ///
    /// Errors from `action` propagate. With no `rect` the action is trusted
    /// once it completes.
    pub fn verify<S, F>(&self, screen: &mut S, rect: Option<ScreenRect>, label: &str, action: F) -> Result<ExecutionResult>
    where
        S: ScreenCapture + ?Sized,
        F: FnOnce(&mut S) -> Result<()>,
    {
        let Some(rect) = rect else {
            action(screen)?;
            return Ok(ExecutionResult::unverified("no canvas change expected"));
        };

        let before = self.capture_before(screen);
        action(screen)?;
        let after = self.capture_after(screen);

        let (Some(before), Some(after)) = (before, after) else {
            logger::warn_p("verify", &format!("{}: screen capture unavailable", label));
            return Ok(ExecutionResult::failed("screen capture unavailable"));
        };

        let mut result = self.compare(&before, &after, rect);
        if result.success {
            logger::info_p("verify", &format!("{}: {}", label, result.reason));
        } else {
            logger::warn_p("verify", &format!("{}: {}", label, result.reason));
            if let Some(dir) = &self.diagnostics_dir {
                match save_diagnostics(dir, label, &before, &after) {
                    Ok(d) => {
                        logger::info_p("verify", &format!("diagnostics saved to {}", d.before.display()));
                        result.diagnostics = Some(d);
                    }
                    Err(e) => logger::warn_p("verify", &e.to_string()),
                }
            }
        }
        Ok(result)
    }
}

fn file_stem(label: &str) -> String {
    let stem: String = label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    stem.trim_matches('_').chars().take(40).collect()
}

fn save_diagnostics(dir: &Path, label: &str, before: &Capture, after: &Capture) -> Result<Diagnostics> {
    std::fs::create_dir_all(dir)
        .map_err(|source| BrushError::Persistence { path: dir.to_path_buf(), source })?;
    let stamp = Local::now().format("%Y%m%d_%H%M%S%3f");
    let stem = file_stem(label);
    let d = Diagnostics {
        before: dir.join(format!("{}_{}_before.png", stamp, stem)),
        after: dir.join(format!("{}_{}_after.png", stamp, stem)),
    };
    for (capture, path) in [(before, &d.before), (after, &d.after)] {
        capture.to_image().save(path).map_err(|e| BrushError::Persistence {
            path: path.clone(),
            source: std::io::Error::new(std::io::ErrorKind::Other, e),
        })?;
    }
    Ok(d)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::stub::StubPlatform;
    use crate::platform::InputDevice;
    use crate::types::Rgb;

    // 200x200 at stride 10 gives 20 samples per edge
    const RECT: ScreenRect = ScreenRect { left: 100, top: 100, right: 300, bottom: 300 };

    fn blank() -> Capture {
        Capture::filled(400, 400, Rgb::WHITE)
    }

    #[test]
    fn perimeter_sample_count() {
        assert_eq!(perimeter_samples(RECT, 10).len(), 80);
        assert!(perimeter_samples(ScreenRect { left: 5, top: 5, right: 5, bottom: 5 }, 10).is_empty());
    }

    #[test]
    fn perimeter_covers_every_corner_once() {
        let points = perimeter_samples(RECT, 10);
        let unique: std::collections::HashSet<_> = points.iter().copied().collect();
        assert_eq!(unique.len(), points.len());
        for corner in [RECT.top_left(), RECT.bottom_right(), ScreenPoint::new(RECT.right, RECT.top), ScreenPoint::new(RECT.left, RECT.bottom)] {
            assert!(unique.contains(&corner), "missing corner {}", corner);
        }
    }

    #[test]
    fn flat_rect_is_sampled_once() {
        let line = ScreenRect { left: 100, top: 40, right: 300, bottom: 40 };
        let points = perimeter_samples(line, 10);
        assert_eq!(points.len(), 21);
        assert_eq!(points.last(), Some(&ScreenPoint::new(300, 40)));

        let upright = ScreenRect { left: 70, top: 0, right: 70, bottom: 95 };
        let points = perimeter_samples(upright, 10);
        assert_eq!(points.len(), 10);
        assert!(points.iter().all(|p| p.x == 70));
    }

    #[test]
    fn unchanged_perimeter_fails() {
        let engine = VerificationEngine::with_params(10, 5);
        let r = engine.compare(&blank(), &blank(), RECT);
        assert!(!r.success);
        assert_eq!((r.changed_samples, r.total_samples), (0, 80));
    }

    #[test]
    fn twelve_changed_samples_pass() {
        let engine = VerificationEngine::with_params(10, 5);
        let mut after = blank();
        for x in (100..220).step_by(10) {
            after.set_pixel(x, 100, Rgb::BLACK);
        }
        let r = engine.compare(&blank(), &after, RECT);
        assert!(r.success);
        assert_eq!((r.changed_samples, r.total_samples), (12, 80));
    }

    #[test]
    fn threshold_is_exclusive() {
        let engine = VerificationEngine::with_params(10, 5);
        let mut after = blank();
        for x in (100..150).step_by(10) {
            after.set_pixel(x, 100, Rgb::BLACK);
        }
        let r = engine.compare(&blank(), &after, RECT);
        assert_eq!(r.changed_samples, 5);
        assert!(!r.success);
    }

    #[test]
    fn verify_saves_diagnostics_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::default();
        settings.delays.verify_settle_ms = 0;
        settings.diagnostics_dir = dir.path().join("diag");
        let engine = VerificationEngine::new(&settings);

        let mut stub = StubPlatform::new();
        let result = engine
            .verify(&mut stub, Some(RECT), "rectangle", |p| p.move_to(ScreenPoint::new(5, 5)))
            .unwrap();
        assert!(!result.success);
        let d = result.diagnostics.expect("diagnostics");
        assert!(d.before.exists());
        assert!(d.after.exists());
    }

    #[test]
    fn verify_passes_after_a_drag() {
        let engine = VerificationEngine::with_params(10, 5);
        let mut stub = StubPlatform::new();
        let result = engine
            .verify(&mut stub, Some(RECT), "rectangle", |p| {
                p.move_to(RECT.top_left())?;
                p.button_down()?;
                p.move_to(RECT.bottom_right())?;
                p.button_up()
            })
            .unwrap();
        assert!(result.success);
        assert_eq!(result.changed_samples, 80);
    }

    #[test]
    fn nothing_to_verify_trusts_the_action() {
        let engine = VerificationEngine::with_params(10, 5);
        let mut stub = StubPlatform::new();
        let result = engine.verify(&mut stub, None, "select", |_| Ok(())).unwrap();
        assert!(result.success);
        assert_eq!(result.total_samples, 0);
    }
}
