//! Calibration profiles: named maps from tool/color labels to screen points.
//!
//! Profiles are stored as `<dir>/<name>.json` (`{"label": [x, y], ...}`).
//! The older line format `label: (x, y)` in `<dir>/<name>.txt` is still read.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::error::{BrushError, Result};
use crate::logger;
use crate::types::{ScreenPoint, ScreenSize};

/// Labels the dispatcher reaches for in a typical drawing session.
pub const REQUIRED_LABELS: &[&str] = &[
    "rectangle", "oval", "triangle", "line", "text tool", "select",
    "black color", "indigo", "red", "green",
];

/// Trim, lower-case and collapse inner whitespace.
pub fn normalize_label(label: &str) -> String {
    label.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// A point is on screen iff `0 <= x <= width` and `0 <= y <= height`.
pub fn validate(point: ScreenPoint, screen: ScreenSize) -> bool {
    (0..=screen.width).contains(&point.x) && (0..=screen.height).contains(&point.y)
}

/// Immutable-once-loaded label -> point mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CalibrationProfile {
    points: BTreeMap<String, ScreenPoint>,
}

impl CalibrationProfile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, label: &str, point: ScreenPoint) {
        self.points.insert(normalize_label(label), point);
    }

    pub fn get(&self, label: &str) -> Option<ScreenPoint> {
        self.points.get(&normalize_label(label)).copied()
    }

    pub fn contains(&self, label: &str) -> bool {
        self.points.contains_key(&normalize_label(label))
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, ScreenPoint)> {
        self.points.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Drop entries that fall off the given screen. Returns how many went.
    pub fn retain_on_screen(&mut self, screen: ScreenSize) -> usize {
        let before = self.points.len();
        self.points.retain(|label, p| {
            let keep = validate(*p, screen);
            if !keep {
                logger::warn_p("calib", &format!(
                    "'{}' at {} is outside the {}x{} screen, ignored",
                    label, p, screen.width, screen.height
                ));
            }
            keep
        });
        before - self.points.len()
    }

    fn to_json(&self) -> Value {
        let map: Map<String, Value> = self
            .points
            .iter()
            .map(|(k, p)| (k.clone(), Value::from(vec![p.x, p.y])))
            .collect();
        Value::Object(map)
    }
}

/// Keep profile names to a safe file stem.
fn sanitize_profile_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() { "default".into() } else { cleaned }
}

fn json_point(value: &Value) -> Option<ScreenPoint> {
    match value {
        Value::Array(items) if items.len() == 2 => {
            let x = items[0].as_i64()?;
            let y = items[1].as_i64()?;
            Some(ScreenPoint::new(i32::try_from(x).ok()?, i32::try_from(y).ok()?))
        }
        Value::Object(obj) => {
            let x = obj.get("x")?.as_i64()?;
            let y = obj.get("y")?.as_i64()?;
            Some(ScreenPoint::new(i32::try_from(x).ok()?, i32::try_from(y).ok()?))
        }
        _ => None,
    }
}

/// Parse a JSON profile document, skipping malformed entries.
pub fn parse_json(text: &str) -> std::result::Result<CalibrationProfile, String> {
    let value: Value = serde_json::from_str(text).map_err(|e| e.to_string())?;
    let Value::Object(entries) = value else {
        return Err("profile is not a JSON object".into());
    };
    let mut profile = CalibrationProfile::new();
    for (label, raw) in &entries {
        match json_point(raw) {
            Some(p) if !normalize_label(label).is_empty() => profile.insert(label, p),
            _ => logger::warn_p("calib", &format!("skipping malformed entry '{}': {}", label, raw)),
        }
    }
    Ok(profile)
}

fn line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(.+):\s*\(?\s*(-?\d+)\s*,\s*(-?\d+)\s*\)?$").expect("static regex")
    })
}

/// Parse the line format `label: (x, y)`, skipping malformed lines.
pub fn parse_lines(text: &str) -> CalibrationProfile {
    let mut profile = CalibrationProfile::new();
    for (no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let parsed = line_re().captures(line).and_then(|c| {
            let label = normalize_label(&c[1]);
            let x = c[2].parse::<i32>().ok()?;
            let y = c[3].parse::<i32>().ok()?;
            (!label.is_empty()).then_some((label, ScreenPoint::new(x, y)))
        });
        match parsed {
            Some((label, p)) => profile.insert(&label, p),
            None => logger::warn_p("calib", &format!("skipping line {}: '{}'", no + 1, line)),
        }
    }
    profile
}

/// Directory of named profiles.
#[derive(Debug, Clone)]
pub struct CalibrationStore {
    dir: PathBuf,
}

impl CalibrationStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", sanitize_profile_name(name)))
    }

    fn legacy_path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.txt", sanitize_profile_name(name)))
    }

    /// Read a profile. Fails with `CalibrationMissing` when no file exists or
    /// not a single entry could be parsed.
    pub fn load(&self, name: &str) -> Result<CalibrationProfile> {
        let missing = |reason: String| BrushError::CalibrationMissing {
            profile: name.to_string(),
            reason,
        };

        let json_path = self.path_for(name);
        let legacy_path = self.legacy_path_for(name);
        let (path, profile) = if json_path.is_file() {
            let text = std::fs::read_to_string(&json_path)
                .map_err(|e| missing(format!("{}: {}", json_path.display(), e)))?;
            let profile = parse_json(&text)
                .map_err(|e| missing(format!("{}: {}", json_path.display(), e)))?;
            (json_path, profile)
        } else if legacy_path.is_file() {
            let text = std::fs::read_to_string(&legacy_path)
                .map_err(|e| missing(format!("{}: {}", legacy_path.display(), e)))?;
            (legacy_path, parse_lines(&text))
        } else {
            return Err(missing(format!("no profile file at {}", json_path.display())));
        };

        if profile.is_empty() {
            return Err(missing(format!("{} has no usable entries", path.display())));
        }
        logger::info_p("calib", &format!("loaded {} position(s) from {}", profile.len(), path.display()));
        Ok(profile)
    }

    /// Whether a profile file (JSON or legacy lines) exists under `name`.
    pub fn exists(&self, name: &str) -> bool {
        self.path_for(name).is_file() || self.legacy_path_for(name).is_file()
    }

    /// Calibration session for `name`: resumes the stored profile, or starts
    /// empty when there is none. A profile file that exists but cannot be
    /// read is an error, so a later save never overwrites it unseen.
    pub fn begin(&self, name: &str, screen: ScreenSize) -> Result<CalibrationSession> {
        if !self.exists(name) {
            return Ok(CalibrationSession::new(screen));
        }
        Ok(CalibrationSession::resume(self.load(name)?, screen))
    }

    /// Write a profile, creating the directory if needed.
    pub fn save(&self, profile: &CalibrationProfile, name: &str) -> Result<PathBuf> {
        let path = self.path_for(name);
        std::fs::create_dir_all(&self.dir)
            .map_err(|source| BrushError::Persistence { path: self.dir.clone(), source })?;
        let json = serde_json::to_string_pretty(&profile.to_json())
            .map_err(|e| BrushError::Persistence { path: path.clone(), source: e.into() })?;
        std::fs::write(&path, json)
            .map_err(|source| BrushError::Persistence { path: path.clone(), source })?;
        logger::info_p("calib", &format!("saved {} position(s) to {}", profile.len(), path.display()));
        Ok(path)
    }

    /// Names of stored profiles, sorted.
    pub fn list(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(&self.dir) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| matches!(p.extension().and_then(|e| e.to_str()), Some("json" | "txt")))
            .filter_map(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .collect();
        names.sort();
        names.dedup();
        names
    }
}

/// Interactive capture: collects validated samples into a new profile.
pub struct CalibrationSession {
    profile: CalibrationProfile,
    screen: ScreenSize,
}

impl CalibrationSession {
    pub fn new(screen: ScreenSize) -> Self {
        Self { profile: CalibrationProfile::new(), screen }
    }

    /// Seed with an existing profile so a session can patch it.
    pub fn resume(profile: CalibrationProfile, screen: ScreenSize) -> Self {
        Self { profile, screen }
    }

    /// Record `label` at `point`. Off-screen samples are rejected (`false`).
    pub fn record(&mut self, label: &str, point: ScreenPoint) -> bool {
        let label = normalize_label(label);
        if label.is_empty() {
            return false;
        }
        if !validate(point, self.screen) {
            logger::warn_p("calib", &format!("rejected '{}' at {}: off screen", label, point));
            return false;
        }
        logger::info_p("calib", &format!("recorded '{}' at {}", label, point));
        self.profile.insert(&label, point);
        true
    }

    pub fn missing_required(&self) -> Vec<&'static str> {
        REQUIRED_LABELS
            .iter()
            .copied()
            .filter(|l| !self.profile.contains(l))
            .collect()
    }

    pub fn profile(&self) -> &CalibrationProfile {
        &self.profile
    }

    pub fn finish(self) -> CalibrationProfile {
        self.profile
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCREEN: ScreenSize = ScreenSize { width: 1920, height: 1080 };

    fn sample_profile() -> CalibrationProfile {
        let mut p = CalibrationProfile::new();
        p.insert("Rectangle", ScreenPoint::new(320, 90));
        p.insert("oval", ScreenPoint::new(345, 90));
        p.insert("Black Color", ScreenPoint::new(760, 60));
        p.insert("gray-50%", ScreenPoint::new(0, 0));
        p.insert("corner", ScreenPoint::new(1920, 1080));
        p
    }

    #[test]
    fn validate_includes_screen_edges() {
        assert!(validate(ScreenPoint::new(0, 0), SCREEN));
        assert!(validate(ScreenPoint::new(1920, 1080), SCREEN));
        assert!(!validate(ScreenPoint::new(-1, 0), SCREEN));
        assert!(!validate(ScreenPoint::new(0, 1081), SCREEN));
        assert!(!validate(ScreenPoint::new(1921, 5), SCREEN));
    }

    #[test]
    fn labels_are_case_normalized() {
        let p = sample_profile();
        assert_eq!(p.get("  BLACK   color "), Some(ScreenPoint::new(760, 60)));
        assert!(p.contains("rectangle"));
    }

    #[test]
    fn begin_starts_fresh_only_without_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = CalibrationStore::new(dir.path());

        let fresh = store.begin("default", SCREEN).unwrap();
        assert!(fresh.profile().is_empty());

        store.save(&sample_profile(), "default").unwrap();
        let resumed = store.begin("default", SCREEN).unwrap();
        assert_eq!(resumed.profile().get("oval"), Some(ScreenPoint::new(345, 90)));

        std::fs::write(store.path_for("broken"), "{ not json").unwrap();
        let err = store.begin("broken", SCREEN).err().expect("corrupt profile must not start fresh");
        assert!(matches!(err, BrushError::CalibrationMissing { .. }));
        assert_eq!(std::fs::read_to_string(store.path_for("broken")).unwrap(), "{ not json");
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = CalibrationStore::new(dir.path().join("profiles"));
        let profile = sample_profile();

        let path = store.save(&profile, "office").unwrap();
        assert!(path.ends_with("office.json"));
        assert_eq!(store.load("office").unwrap(), profile);
        assert_eq!(store.list(), vec!["office".to_string()]);
    }

    #[test]
    fn missing_profile_is_calibration_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = CalibrationStore::new(dir.path());
        assert!(matches!(store.load("nope"), Err(BrushError::CalibrationMissing { .. })));
    }

    #[test]
    fn malformed_entries_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let store = CalibrationStore::new(dir.path());
        std::fs::write(
            store.path_for("mixed"),
            r#"{"red": [700, 60], "blue": "somewhere", "green": [1, 2, 3], "lime": {"x": 5, "y": 6}}"#,
        )
        .unwrap();

        let p = store.load("mixed").unwrap();
        assert_eq!(p.len(), 2);
        assert_eq!(p.get("lime"), Some(ScreenPoint::new(5, 6)));
    }

    #[test]
    fn all_entries_malformed_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let store = CalibrationStore::new(dir.path());
        std::fs::write(store.path_for("junk"), r#"{"red": null}"#).unwrap();
        assert!(matches!(store.load("junk"), Err(BrushError::CalibrationMissing { .. })));

        std::fs::write(store.path_for("broken"), "{not json").unwrap();
        assert!(matches!(store.load("broken"), Err(BrushError::CalibrationMissing { .. })));
    }

    #[test]
    fn legacy_line_format_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = CalibrationStore::new(dir.path());
        std::fs::write(
            dir.path().join("old.txt"),
            "rectangle: (320, 90)\nfive point star : (410,120)\n# comment\ngarbage line\ngray-50%: (800, 40)\n",
        )
        .unwrap();

        let p = store.load("old").unwrap();
        assert_eq!(p.len(), 3);
        assert_eq!(p.get("five point star"), Some(ScreenPoint::new(410, 120)));
        assert_eq!(p.get("gray-50%"), Some(ScreenPoint::new(800, 40)));
    }

    #[test]
    fn save_into_unwritable_location_is_persistence_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "x").unwrap();
        let store = CalibrationStore::new(blocker.join("profiles"));
        assert!(matches!(store.save(&sample_profile(), "a"), Err(BrushError::Persistence { .. })));
    }

    #[test]
    fn profile_names_cannot_escape_the_directory() {
        let store = CalibrationStore::new("/tmp/profiles");
        assert_eq!(store.path_for("../etc/passwd"), PathBuf::from("/tmp/profiles/___etc_passwd.json"));
        assert_eq!(store.path_for("  "), PathBuf::from("/tmp/profiles/default.json"));
    }

    #[test]
    fn session_rejects_off_screen_samples_and_tracks_required() {
        let mut s = CalibrationSession::new(SCREEN);
        assert!(s.record("Rectangle", ScreenPoint::new(10, 10)));
        assert!(!s.record("oval", ScreenPoint::new(-3, 10)));
        assert!(!s.record("   ", ScreenPoint::new(3, 10)));

        let missing = s.missing_required();
        assert!(!missing.contains(&"rectangle"));
        assert!(missing.contains(&"oval"));
        assert_eq!(s.finish().len(), 1);
    }

    #[test]
    fn retain_on_screen_drops_outside_points() {
        let mut p = sample_profile();
        p.insert("far", ScreenPoint::new(2500, 10));
        assert_eq!(p.retain_on_screen(SCREEN), 1);
        assert!(!p.contains("far"));
    }
}
