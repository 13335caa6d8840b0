use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::canvas::{MarginPreset, Margins};
use crate::error::{BrushError, Result};

/// Fixed settle delays in milliseconds. Empirical, never adapted at runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Delays {
    /// Between sub-steps of a click or drag (move, press, move, release)
    pub settle_ms: u64,
    /// After a completed click on a tool, color or canvas point
    pub click_settle_ms: u64,
    /// While the button is held, before and after the drag motion
    pub drag_settle_ms: u64,
    /// After typing literal text
    pub type_settle_ms: u64,
    /// Between the last action and the "after" capture
    pub verify_settle_ms: u64,
}

impl Default for Delays {
    fn default() -> Self {
        Self {
            settle_ms: 200,
            click_settle_ms: 500,
            drag_settle_ms: 200,
            type_settle_ms: 500,
            verify_settle_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationSettings {
    /// Distance in pixels between perimeter samples
    pub stride: u32,
    /// Success needs strictly more changed samples than this
    pub threshold: usize,
    /// Keep before/after rasters of failed verifications
    pub save_diagnostics: bool,
}

impl Default for VerificationSettings {
    fn default() -> Self {
        Self { stride: 10, threshold: 5, save_diagnostics: true }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backoff {
    Linear,
    Exponential,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FocusSettings {
    pub attempts: u32,
    pub backoff_ms: u64,
    pub backoff: Backoff,
}

impl Default for FocusSettings {
    fn default() -> Self {
        Self { attempts: 3, backoff_ms: 500, backoff: Backoff::Linear }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Case-insensitive regex matched against window titles
    pub window_pattern: String,
    pub profile_dir: PathBuf,
    pub diagnostics_dir: PathBuf,
    pub margin_preset: MarginPreset,
    /// Replaces the preset entirely when present
    pub margins: Option<Margins>,
    /// Keep-out distance from the canvas edge for every computed point
    pub inset: i32,
    pub delays: Delays,
    pub verification: VerificationSettings,
    pub focus: FocusSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            window_pattern: "paint".into(),
            profile_dir: PathBuf::from("calibration_profiles"),
            diagnostics_dir: PathBuf::from("logs").join("diagnostics"),
            margin_preset: MarginPreset::Classic,
            margins: None,
            inset: 10,
            delays: Delays::default(),
            verification: VerificationSettings::default(),
            focus: FocusSettings::default(),
        }
    }
}

impl Settings {
    /// Load from `path`; a missing or unreadable file yields the defaults.
    pub fn load(path: &Path) -> Self {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| BrushError::Persistence { path: path.to_path_buf(), source: e.into() })?;
        std::fs::write(path, json)
            .map_err(|source| BrushError::Persistence { path: path.to_path_buf(), source })
    }

    /// Margins in effect: the explicit override, else the named preset.
    pub fn margins(&self) -> Margins {
        self.margins.unwrap_or_else(|| self.margin_preset.margins())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let s = Settings::load(Path::new("/nonexistent/settings.json"));
        assert_eq!(s.inset, 10);
        assert_eq!(s.verification.threshold, 5);
        assert_eq!(s.margins(), MarginPreset::Classic.margins());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{ "margin_preset": "win11", "focus": { "attempts": 5 } }"#).unwrap();

        let s = Settings::load(&path);
        assert_eq!(s.margin_preset, MarginPreset::Win11);
        assert_eq!(s.focus.attempts, 5);
        assert_eq!(s.focus.backoff_ms, 500);
        assert_eq!(s.delays.click_settle_ms, 500);
    }

    #[test]
    fn save_then_load_keeps_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let mut s = Settings::default();
        s.window_pattern = "untitled - paint".into();
        s.focus.backoff = Backoff::Exponential;
        s.save(&path).unwrap();

        let loaded = Settings::load(&path);
        assert_eq!(loaded.window_pattern, "untitled - paint");
        assert_eq!(loaded.focus.backoff, Backoff::Exponential);
    }
}
