pub mod animation;
pub mod app;
pub mod assets;
pub mod camera;
pub mod cli;
pub mod commit_graph;
pub mod config;
pub mod content;
pub mod input;
pub mod interact;
pub mod lifecycle;
pub mod mesh;
pub mod registry;
pub mod renderer;
pub mod scene_graph;
pub mod selection;
pub mod sketch;
pub mod stage;
pub mod theme;
pub mod time;
pub mod tooltip;
pub mod tween;
pub mod ui;
pub mod visibility;

pub use app::{run, run_with_overrides, App};
