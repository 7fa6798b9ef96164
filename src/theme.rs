use anyhow::{Context, Result};
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const DEFAULT_THEME_PATH: &str = "config/theme.json";

#[derive(Debug, Clone, Copy)]
pub struct Palette {
    pub name: &'static str,
    /// Scene clear color.
    pub background: Vec3,
    /// Hover highlight tint.
    pub hover: Vec3,
    /// Commit spheres and edges.
    pub commit: Vec3,
    /// Sketch board fill and stroke.
    pub board_background: [u8; 4],
    pub board_ink: [u8; 4],
}

pub const PALETTES: [Palette; 3] = [
    Palette {
        name: "midnight",
        background: Vec3::new(0.05, 0.06, 0.09),
        hover: Vec3::new(0.95, 0.76, 0.2),
        commit: Vec3::new(0.85, 0.3, 0.25),
        board_background: [24, 26, 34, 255],
        board_ink: [235, 235, 240, 255],
    },
    Palette {
        name: "paper",
        background: Vec3::new(0.92, 0.9, 0.85),
        hover: Vec3::new(0.2, 0.45, 0.85),
        commit: Vec3::new(0.7, 0.2, 0.2),
        board_background: [245, 242, 232, 255],
        board_ink: [30, 30, 35, 255],
    },
    Palette {
        name: "forest",
        background: Vec3::new(0.07, 0.1, 0.08),
        hover: Vec3::new(0.55, 0.85, 0.4),
        commit: Vec3::new(0.9, 0.55, 0.2),
        board_background: [20, 30, 24, 255],
        board_ink: [220, 235, 220, 255],
    },
];

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ThemeFile {
    palette: usize,
}

/// Active palette index, persisted across runs.
#[derive(Debug, Clone)]
pub struct ThemeState {
    index: usize,
}

impl Default for ThemeState {
    fn default() -> Self {
        Self { index: 0 }
    }
}

impl ThemeState {
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path.as_ref()) {
            Ok(state) => state,
            Err(err) => {
                eprintln!("[theme] {err:?}. Using palette 0.");
                Self::default()
            }
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes =
            fs::read(path).with_context(|| format!("Reading theme file {}", path.display()))?;
        let file: ThemeFile = serde_json::from_slice(&bytes)
            .with_context(|| format!("Parsing theme file {}", path.display()))?;
        Ok(Self { index: file.palette % PALETTES.len() })
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Creating theme dir {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(&ThemeFile { palette: self.index })?;
        fs::write(path, json).with_context(|| format!("Writing theme file {}", path.display()))
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn active(&self) -> &'static Palette {
        &PALETTES[self.index % PALETTES.len()]
    }

    /// Advances to the next palette and returns it.
    pub fn cycle(&mut self) -> &'static Palette {
        self.index = (self.index + 1) % PALETTES.len();
        eprintln!("[theme] switched to '{}'", self.active().name);
        self.active()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_wraps_around() {
        let mut theme = ThemeState::default();
        for _ in 0..PALETTES.len() {
            theme.cycle();
        }
        assert_eq!(theme.index(), 0);
    }

    #[test]
    fn index_survives_save_load_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("theme.json");
        let mut theme = ThemeState::default();
        theme.cycle();
        theme.save(&path).expect("save");
        let restored = ThemeState::load_or_default(&path);
        assert_eq!(restored.index(), theme.index());
    }

    #[test]
    fn missing_file_falls_back_to_first_palette() {
        let theme = ThemeState::load_or_default("does/not/exist.json");
        assert_eq!(theme.index(), 0);
        assert_eq!(theme.active().name, PALETTES[0].name);
    }
}
