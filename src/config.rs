use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub vsync: bool,
    pub fullscreen: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self { title: "Skills Avatar".to_string(), width: 1280, height: 720, vsync: true, fullscreen: false }
    }
}

/// Timing and fade tunables for the stage itself.
#[derive(Debug, Clone, Deserialize)]
pub struct StageConfig {
    #[serde(default = "StageConfig::default_fade_ms")]
    pub fade_ms: f32,
    #[serde(default = "StageConfig::default_camera_ms")]
    pub camera_ms: f32,
    #[serde(default = "StageConfig::default_tooltip_fade_ms")]
    pub tooltip_fade_ms: f32,
    #[serde(default = "StageConfig::default_hover_floor")]
    pub hover_visibility_floor: f32,
}

impl StageConfig {
    const fn default_fade_ms() -> f32 {
        300.0
    }

    const fn default_camera_ms() -> f32 {
        1000.0
    }

    const fn default_tooltip_fade_ms() -> f32 {
        200.0
    }

    const fn default_hover_floor() -> f32 {
        0.3
    }
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            fade_ms: Self::default_fade_ms(),
            camera_ms: Self::default_camera_ms(),
            tooltip_fade_ms: Self::default_tooltip_fade_ms(),
            hover_visibility_floor: Self::default_hover_floor(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShadowConfig {
    #[serde(default = "ShadowConfig::default_resolution")]
    pub resolution: u32,
    #[serde(default = "ShadowConfig::default_blur_kernel")]
    pub blur_kernel: u32,
    #[serde(default = "ShadowConfig::default_strength")]
    pub strength: f32,
}

impl ShadowConfig {
    const fn default_resolution() -> u32 {
        1024
    }

    const fn default_blur_kernel() -> u32 {
        32
    }

    const fn default_strength() -> f32 {
        0.6
    }
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            resolution: Self::default_resolution(),
            blur_kernel: Self::default_blur_kernel(),
            strength: Self::default_strength(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub window: WindowConfig,
    #[serde(default)]
    pub stage: StageConfig,
    #[serde(default)]
    pub shadow: ShadowConfig,
    #[serde(default)]
    pub content_path: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct AppConfigOverrides {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub vsync: Option<bool>,
    pub content_path: Option<String>,
}

impl AppConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes =
            fs::read(path).with_context(|| format!("Failed to read config file {}", path.display()))?;
        let cfg = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(cfg)
    }

    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                eprintln!("[config] load error: {err:?}. Falling back to defaults.");
                Self::default()
            }
        }
    }

    pub fn apply_overrides(&mut self, overrides: &AppConfigOverrides) {
        if let Some(width) = overrides.width {
            self.window.width = width;
        }
        if let Some(height) = overrides.height {
            self.window.height = height;
        }
        if let Some(vsync) = overrides.vsync {
            self.window.vsync = vsync;
        }
        if let Some(path) = &overrides.content_path {
            self.content_path = Some(path.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_falls_back_to_defaults() {
        let cfg = AppConfig::load_or_default("config/definitely_absent.json");
        assert_eq!(cfg.window.width, 1280);
        assert!((cfg.stage.fade_ms - 300.0).abs() < f32::EPSILON);
        assert_eq!(cfg.shadow.resolution, 1024);
    }

    #[test]
    fn overrides_only_touch_provided_fields() {
        let mut cfg = AppConfig::default();
        cfg.apply_overrides(&AppConfigOverrides {
            width: Some(1920),
            height: None,
            vsync: Some(false),
            content_path: None,
        });
        assert_eq!(cfg.window.width, 1920);
        assert_eq!(cfg.window.height, 720);
        assert!(!cfg.window.vsync);
    }
}
