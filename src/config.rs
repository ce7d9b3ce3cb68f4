//! Engine configuration.
//!
//! Defaults describe the stock gears demo. A handful of environment
//! variables override them at startup:
//!
//! | variable      | values                |
//! |---------------|-----------------------|
//! | `HOMD_SCENE`  | `gears`, `triangle`   |
//! | `HOMD_VSYNC`  | `1`/`true`, `0`/`false` |
//! | `HOMD_WIDTH`  | initial width, pixels |
//! | `HOMD_HEIGHT` | initial height, pixels|
//!
//! Values that do not parse are logged and ignored.

use std::{fmt, str::FromStr};

use instant::Duration;

/// The scene pushed when the loop starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SceneChoice {
    #[default]
    Gears,
    Triangle,
}

impl FromStr for SceneChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gears" => Ok(SceneChoice::Gears),
            "triangle" => Ok(SceneChoice::Triangle),
            other => Err(format!("unknown scene `{other}`")),
        }
    }
}

impl fmt::Display for SceneChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SceneChoice::Gears => f.write_str("gears"),
            SceneChoice::Triangle => f.write_str("triangle"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub title: String,
    /// Initial inner size in physical pixels.
    pub width: u32,
    pub height: u32,
    pub resizable: bool,
    pub maximized: bool,
    pub vsync: bool,
    pub clear_colour: [f32; 4],
    /// How often scenes log their frame rate.
    pub fps_report_period: Duration,
    pub scene: SceneChoice,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            title: "Homd Engine".to_string(),
            width: 960,
            height: 540,
            resizable: true,
            maximized: true,
            vsync: false,
            clear_colour: [0.0, 0.0, 0.0, 1.0],
            fps_report_period: Duration::from_secs(5),
            scene: SceneChoice::Gears,
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(scene) = parse_var(&lookup, "HOMD_SCENE", str::parse::<SceneChoice>) {
            config.scene = scene;
        }
        if let Some(vsync) = parse_var(&lookup, "HOMD_VSYNC", parse_flag) {
            config.vsync = vsync;
        }
        if let Some(width) = parse_var(&lookup, "HOMD_WIDTH", parse_extent) {
            config.width = width;
        }
        if let Some(height) = parse_var(&lookup, "HOMD_HEIGHT", parse_extent) {
            config.height = height;
        }
        config
    }
}

fn parse_var<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    parse: impl Fn(&str) -> Result<T, String>,
) -> Option<T> {
    let raw = lookup(key)?;
    match parse(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            log::warn!("ignoring {key}={raw:?}: {e}");
            None
        }
    }
}

fn parse_flag(s: &str) -> Result<bool, String> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Ok(true),
        "0" | "false" | "off" | "no" => Ok(false),
        other => Err(format!("`{other}` is not a boolean")),
    }
}

fn parse_extent(s: &str) -> Result<u32, String> {
    match s.trim().parse::<u32>() {
        Ok(0) => Err("size must be positive".to_string()),
        Ok(value) => Ok(value),
        Err(e) => Err(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn empty_environment_keeps_defaults() {
        assert_eq!(EngineConfig::from_lookup(lookup(&[])), EngineConfig::default());
    }

    #[test]
    fn overrides_are_applied() {
        let config = EngineConfig::from_lookup(lookup(&[
            ("HOMD_SCENE", "Triangle"),
            ("HOMD_VSYNC", "1"),
            ("HOMD_WIDTH", "640"),
            ("HOMD_HEIGHT", "480"),
        ]));
        assert_eq!(config.scene, SceneChoice::Triangle);
        assert!(config.vsync);
        assert_eq!((config.width, config.height), (640, 480));
    }

    #[test]
    fn malformed_values_are_ignored() {
        let config = EngineConfig::from_lookup(lookup(&[
            ("HOMD_SCENE", "teapot"),
            ("HOMD_VSYNC", "sometimes"),
            ("HOMD_WIDTH", "0"),
            ("HOMD_HEIGHT", "-3"),
        ]));
        assert_eq!(config, EngineConfig::default());
    }
}
