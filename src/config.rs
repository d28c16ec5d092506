// config.rs — tunable viewer constants and host command line
//
// Config file lookup order:
// - CLI: --config <path>
// - Env: PANORAMA_CONFIG
// - <exe_dir>/panorama.json, then ./panorama.json
// - Built-in defaults

use crate::error::ConfigError;
use clap::Parser;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Radians of yaw added per idle frame.
pub const AUTO_ROTATE_SPEED: f32 = 0.002;
/// Radians of yaw/pitch per pixel of pointer drag.
pub const DRAG_SENSITIVITY: f32 = 0.005;
/// Degrees of FOV per unit of wheel delta.
pub const WHEEL_ZOOM_FACTOR: f32 = 0.1;
pub const INITIAL_FOV: f32 = 75.0;
pub const MIN_FOV: f32 = 30.0;
pub const MAX_FOV: f32 = 120.0;
pub const SPHERE_RADIUS: f32 = 500.0;
pub const MAX_PIXEL_RATIO: f64 = 2.0;
pub const SETTLE_DELAY_MS: u64 = 100;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub auto_rotate_speed: f32,
    pub drag_sensitivity: f32,
    pub wheel_zoom_factor: f32,
    pub initial_fov: f32,
    pub min_fov: f32,
    pub max_fov: f32,
    pub sphere_radius: f32,
    pub sphere_width_segments: u32,
    pub sphere_height_segments: u32,
    pub near: f32,
    pub far: f32,
    pub max_pixel_ratio: f64,
    pub settle_delay_ms: u64,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            auto_rotate_speed: AUTO_ROTATE_SPEED,
            drag_sensitivity: DRAG_SENSITIVITY,
            wheel_zoom_factor: WHEEL_ZOOM_FACTOR,
            initial_fov: INITIAL_FOV,
            min_fov: MIN_FOV,
            max_fov: MAX_FOV,
            sphere_radius: SPHERE_RADIUS,
            sphere_width_segments: 60,
            sphere_height_segments: 40,
            near: 0.1,
            far: 1000.0,
            max_pixel_ratio: MAX_PIXEL_RATIO,
            settle_delay_ms: SETTLE_DELAY_MS,
        }
    }
}

impl ViewerConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn from_json(text: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: ViewerConfig =
            serde_json::from_str(text).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text, path)
    }

    /// Explicit path wins; otherwise the first `panorama.json` found, otherwise defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match find_config_file() {
            Some(path) => {
                log::info!("using config {}", path.display());
                Self::load(&path)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if !(self.min_fov > 0.0 && self.min_fov <= self.max_fov && self.max_fov < 180.0) {
            return invalid(format!(
                "fov range {}..{} must satisfy 0 < min <= max < 180",
                self.min_fov, self.max_fov
            ));
        }
        if !(self.min_fov..=self.max_fov).contains(&self.initial_fov) {
            return invalid(format!(
                "initial_fov {} outside {}..{}",
                self.initial_fov, self.min_fov, self.max_fov
            ));
        }
        if !(self.sphere_radius > 0.0) {
            return invalid(format!("sphere_radius {} must be positive", self.sphere_radius));
        }
        if self.sphere_width_segments < 3 || self.sphere_height_segments < 2 {
            return invalid("sphere needs at least 3x2 segments".to_string());
        }
        if !(self.near > 0.0 && self.far > self.sphere_radius && self.near < self.far) {
            return invalid(format!(
                "clip planes {}..{} must enclose the sphere radius {}",
                self.near, self.far, self.sphere_radius
            ));
        }
        if !(self.max_pixel_ratio >= 1.0) {
            return invalid(format!("max_pixel_ratio {} must be >= 1", self.max_pixel_ratio));
        }
        Ok(())
    }
}

fn find_config_file() -> Option<PathBuf> {
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            let p = dir.join("panorama.json");
            if p.exists() {
                return Some(p);
            }
        }
    }

    let p = PathBuf::from("panorama.json");
    if p.exists() {
        return Some(p);
    }

    None
}

/// Interactive 360° panorama viewer
#[derive(Parser, Debug, Clone)]
#[command(name = "panosphere")]
pub struct Cli {
    /// Image to open: file path, file://, http(s):// or data: URL
    pub image: Option<String>,

    /// Caption shown above the panorama (defaults to the file name)
    #[arg(long)]
    pub name: Option<String>,

    /// UI language code (en, zh-Hans, ...)
    #[arg(long, env = "PANORAMA_LANG", default_value = "en")]
    pub lang: String,

    /// Path to a JSON config file
    #[arg(long, env = "PANORAMA_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Caption derived from the last path segment of a URL or path.
pub fn display_name_for(url: &str) -> String {
    if url.starts_with("data:") {
        return "panorama".to_string();
    }
    let trimmed = url.split(['?', '#']).next().unwrap_or(url);
    trimmed
        .rsplit(['/', '\\'])
        .find(|s| !s.is_empty())
        .unwrap_or(trimmed)
        .to_string()
}
