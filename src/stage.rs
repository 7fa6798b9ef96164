use crate::assets::{self, MeshSource};
use crate::camera::{CameraMove, StageCamera};
use crate::commit_graph::CommitGraph;
use crate::config::{ShadowConfig, StageConfig};
use crate::content::StageContent;
use crate::interact::{self, HoverState};
use crate::mesh::MeshData;
use crate::registry::NodeRegistry;
use crate::scene_graph::{NodeId, SceneGraph};
use crate::selection::{self, CommandQueue, StageCommand};
use crate::sketch::SketchBoard;
use crate::theme::ThemeState;
use crate::tooltip::TooltipLayer;
use crate::tween::{Axis, Channel, TweenScheduler};
use crate::visibility::set_visibility;
use crate::{animation, theme};
use anyhow::{bail, Result};
use glam::{Quat, Vec2, Vec3};
use rand::rngs::StdRng;
use rand::SeedableRng;
use winit::dpi::PhysicalSize;

#[derive(Debug, Clone, Copy)]
pub struct Lighting {
    pub direction: Vec3,
    pub color: Vec3,
    pub ambient: f32,
}

impl Default for Lighting {
    fn default() -> Self {
        Self {
            direction: Vec3::new(-0.4, -1.0, -0.3).normalize(),
            color: Vec3::ONE,
            ambient: 0.35,
        }
    }
}

/// Output of the shadow phase, consumed by the renderer's shadow pass.
#[derive(Debug, Clone, Default)]
pub struct ShadowSettings {
    pub resolution: u32,
    pub blur_kernel: u32,
    pub strength: f32,
    pub casters: Vec<NodeId>,
    /// Depth bounds along the light direction, derived from the casters.
    pub z_min: f32,
    pub z_max: f32,
}

/// All scene-side state in one place, handed around explicitly. The window
/// shell owns one of these and drives it through the lifecycle phases.
pub struct Stage {
    pub content: StageContent,
    pub settings: StageConfig,
    pub shadow_config: ShadowConfig,
    pub graph: SceneGraph,
    pub registry: NodeRegistry,
    pub meshes: Vec<MeshData>,
    pub tweens: TweenScheduler,
    pub camera: StageCamera,
    pub lighting: Lighting,
    pub shadows: ShadowSettings,
    pub tooltips: TooltipLayer,
    pub commits: Option<CommitGraph>,
    pub sketch: Option<SketchBoard>,
    pub theme: ThemeState,
    pub commands: CommandQueue,
    pub hover: HoverState,
    source: Box<dyn MeshSource>,
    rng: StdRng,
    scene_built: bool,
}

impl Stage {
    pub fn new(
        content: StageContent,
        settings: StageConfig,
        shadow_config: ShadowConfig,
        theme: ThemeState,
        source: Box<dyn MeshSource>,
    ) -> Self {
        let camera = StageCamera::from_pose(&content.starting_camera);
        Self {
            content,
            settings,
            shadow_config,
            graph: SceneGraph::new(),
            registry: NodeRegistry::new(),
            meshes: Vec::new(),
            tweens: TweenScheduler::new(),
            camera,
            lighting: Lighting::default(),
            shadows: ShadowSettings::default(),
            tooltips: TooltipLayer::default(),
            commits: None,
            sketch: None,
            theme,
            commands: CommandQueue::new(),
            hover: HoverState::new(),
            source,
            rng: StdRng::from_entropy(),
            scene_built: false,
        }
    }

    fn fade_seconds(&self) -> f32 {
        self.settings.fade_ms as f32 / 1000.0
    }

    fn camera_seconds(&self) -> f32 {
        self.settings.camera_ms as f32 / 1000.0
    }

    // --- lifecycle phase work -------------------------------------------------

    /// Initializing: root + orbit camera from the starting pose.
    pub fn build_scene(&mut self) -> Result<()> {
        self.graph = SceneGraph::new();
        self.registry = NodeRegistry::new();
        self.camera = StageCamera::from_pose(&self.content.starting_camera);
        self.scene_built = true;
        Ok(())
    }

    /// Initialized: directional light and ambient term.
    pub fn setup_lighting(&mut self) -> Result<()> {
        if !self.scene_built {
            bail!("lighting requested before the scene was built");
        }
        self.lighting = Lighting::default();
        Ok(())
    }

    /// Loading: declared models, the commit diorama and the sketch board.
    pub fn load_assets(&mut self) -> Result<()> {
        if !self.scene_built {
            bail!("asset load requested before the scene was built");
        }
        let theme_tag = self.theme.index();
        let outcome = assets::load_models(
            &self.content,
            self.source.as_ref(),
            &mut self.graph,
            &mut self.registry,
            &mut self.meshes,
            &mut self.tweens,
            theme_tag,
        );
        eprintln!(
            "[stage] models loaded: {} ok, {} dropped",
            outcome.loaded.len(),
            outcome.dropped.len()
        );

        self.commits = Some(CommitGraph::build(
            &self.content,
            &mut self.graph,
            &mut self.registry,
            &mut self.meshes,
            &mut self.tweens,
            theme_tag,
        ));
        let palette = *self.theme.active();
        if let Some(spec) = self.content.boards.first() {
            let group = self.content.group_of(&spec.name);
            self.sketch = Some(SketchBoard::build(
                spec,
                &mut self.graph,
                &mut self.registry,
                &mut self.meshes,
                &mut self.tweens,
                &palette,
                &group,
                theme_tag,
            ));
        }
        Ok(())
    }

    /// Loaded: overrides, tooltips, idle animation, billboards and the
    /// declared starting visibility.
    pub fn process_assets(&mut self) -> Result<()> {
        assets::apply_overrides(&self.content, &mut self.graph, &mut self.registry);

        for link in self.content.idle_models.clone() {
            if let Some(root) = self.registry.get(&link) {
                animation::start_idle_cycles(&mut self.graph, &mut self.tweens, &mut self.rng, root);
            }
        }
        for link in self.content.billboard_models.clone() {
            if let Some(root) = self.registry.get(&link) {
                animation::face_camera(&mut self.graph, root, self.camera.position());
            }
        }

        self.tooltips = TooltipLayer::realize(
            &self.content,
            &self.graph,
            &self.registry,
            self.settings.tooltip_fade_ms as f32 / 1000.0,
            self.settings.hover_visibility_floor,
        );

        // Declared starting visibility, instantly.
        let mut targets = Vec::new();
        for spec in &self.content.models {
            if let Some(root) = self.registry.get(&spec.link_name) {
                targets.push((root, spec.visibility.unwrap_or(1.0)));
            }
        }
        for spec in &self.content.overrides {
            if let (Some(root), Some(level)) = (self.registry.get(&spec.link_name), spec.visibility) {
                targets.push((root, level));
            }
        }
        for (root, level) in targets {
            set_visibility(&mut self.graph, &mut self.tweens, root, level, true, 0.0);
        }
        Ok(())
    }

    /// Processed: shadow casting configuration from the loaded casters.
    pub fn configure_shadows(&mut self) -> Result<()> {
        let mut casters = Vec::new();
        let mut z_min = f32::MAX;
        let mut z_max = f32::MIN;
        let light_dir = self.lighting.direction;
        for id in self.graph.ids().collect::<Vec<_>>() {
            let Some(node) = self.graph.node(id) else { continue };
            if node.mesh.is_none() {
                continue;
            }
            casters.push(id);
            let depth = self.graph.world_position(id).dot(light_dir);
            z_min = z_min.min(depth);
            z_max = z_max.max(depth);
        }
        if casters.is_empty() {
            z_min = 0.0;
            z_max = 1.0;
        }
        self.shadows = ShadowSettings {
            resolution: self.shadow_config.resolution,
            blur_kernel: self.shadow_config.blur_kernel,
            strength: self.shadow_config.strength,
            casters,
            z_min,
            z_max: z_max.max(z_min + 0.01),
        };
        Ok(())
    }

    /// Ready: fly to the starting pose.
    pub fn start_presentation(&mut self) {
        let pose = self.content.starting_camera.clone();
        let seconds = self.camera_seconds();
        self.camera.fly_to(&mut self.tweens, &CameraMove::from(&pose), seconds);
    }

    // --- per-frame ------------------------------------------------------------

    /// One frame: tick every tween, route the updates, keep billboards facing
    /// the camera and re-anchor the tooltips.
    pub fn tick(&mut self, dt: f32, viewport: PhysicalSize<u32>) {
        for update in self.tweens.tick(dt) {
            match update.channel {
                Channel::Visibility(id) => {
                    if let Some(node) = self.graph.node_mut(id) {
                        node.rendered_visibility = update.scalar().clamp(0.0, 1.0);
                    }
                }
                Channel::Translation(id, axis) => {
                    if let Some(node) = self.graph.node_mut(id) {
                        axis.write(&mut node.translation, update.scalar());
                    }
                }
                Channel::Rotation(id, axis) => {
                    if let Some(node) = self.graph.node_mut(id) {
                        let (mut x, mut y, mut z) = node.rotation.to_euler(glam::EulerRot::XYZ);
                        match axis {
                            Axis::X => x = update.scalar(),
                            Axis::Y => y = update.scalar(),
                            Axis::Z => z = update.scalar(),
                        }
                        node.rotation = Quat::from_euler(glam::EulerRot::XYZ, x, y, z);
                    }
                }
                Channel::Scale(id) => {
                    if let Some(node) = self.graph.node_mut(id) {
                        node.squash = update.scalar();
                    }
                }
                Channel::OverlayAlpha(id) => {
                    if let Some(node) = self.graph.node_mut(id) {
                        node.overlay_alpha = update.scalar().clamp(0.0, 1.0);
                    }
                }
                Channel::TooltipAlpha(_) => self.tooltips.apply_update(&update),
                Channel::CameraYaw => self.camera.yaw = update.scalar(),
                Channel::CameraPitch => self.camera.pitch = update.scalar(),
                Channel::CameraRadius => self.camera.radius = update.scalar(),
                Channel::CameraTarget => self.camera.target = update.value,
            }
        }

        for link in self.content.billboard_models.clone() {
            if let Some(root) = self.registry.get(&link) {
                animation::face_camera(&mut self.graph, root, self.camera.position());
            }
        }

        if let Some(root) = self.hover.current() {
            if !interact::hover_still_valid(&self.graph, root) {
                self.hover.clear(&mut self.graph, &mut self.tweens, &mut self.tooltips);
            }
        }

        self.tooltips.reanchor(&self.graph, &self.camera, viewport);
    }

    // --- input ----------------------------------------------------------------

    /// Hover routing: only declared pickable models highlight.
    pub fn handle_cursor(&mut self, screen: Vec2, viewport: PhysicalSize<u32>) {
        let hovered = interact::pick(&self.graph, &self.camera, screen, viewport)
            .map(|hit| interact::main_parent(&self.graph, hit))
            .filter(|&root| self.is_hoverable(root));
        self.hover.update(&mut self.graph, &mut self.tweens, &mut self.tooltips, hovered);
    }

    pub fn handle_click(&mut self, screen: Vec2, viewport: PhysicalSize<u32>) {
        let Some(hit) = interact::pick(&self.graph, &self.camera, screen, viewport) else {
            return;
        };
        if let Some(sketch) = self.sketch.as_mut() {
            if let Some(index) = sketch.marker_index(hit) {
                sketch.click_marker(&mut self.graph, &mut self.tweens, index);
                return;
            }
        }
        let root = interact::main_parent(&self.graph, hit);
        if self.is_hoverable(root) {
            interact::click_bounce(&mut self.tweens, root);
        }
    }

    /// Drops any active hover, for when the cursor leaves the window.
    pub fn clear_hover(&mut self) {
        self.hover.clear(&mut self.graph, &mut self.tweens, &mut self.tooltips);
    }

    fn is_hoverable(&self, root: NodeId) -> bool {
        let Some(node) = self.graph.node(root) else { return false };
        self.content.pickable_models.iter().any(|link| *link == node.meta.link_name)
    }

    // --- commands -------------------------------------------------------------

    /// Applies queued UI commands. Gated on the running flag; queued commands
    /// survive until then.
    pub fn apply_commands(&mut self, running: bool) {
        for command in self.commands.drain_if(running) {
            match command {
                StageCommand::SelectGroup(index) => self.select_group(index),
                StageCommand::SelectSkill(name) => self.select_skill(&name),
                StageCommand::AdvanceCommits => self.advance_commits(),
                StageCommand::CycleTheme => self.cycle_theme(),
            }
        }
    }

    fn select_group(&mut self, index: usize) {
        let group = selection::group_link(&self.content, index);
        eprintln!("[stage] select group '{group}'");
        self.hover.clear(&mut self.graph, &mut self.tweens, &mut self.tooltips);

        if let Some(members) = self.content.groups.get(&group).cloned() {
            let fade = self.fade_seconds();
            for link in selection::selectable_links(&self.content) {
                let Some(root) = self.registry.get(&link) else { continue };
                let member = members.iter().any(|m| *m == link);
                let target = if member {
                    self.graph.node(root).map(|n| n.meta.base_visibility).unwrap_or(1.0)
                } else {
                    0.0
                };
                set_visibility(&mut self.graph, &mut self.tweens, root, target, true, fade);
            }
        } else {
            eprintln!("[stage] group '{group}' has no members, visibility untouched");
        }

        let pose = self.content.starting_camera.clone();
        let seconds = self.camera_seconds();
        self.camera.fly_to(&mut self.tweens, &CameraMove::from(&pose), seconds);
        if let Some(sketch) = self.sketch.as_mut() {
            sketch.clear(&mut self.graph, &mut self.tweens);
        }
        if let Some(commits) = self.commits.as_mut() {
            commits.reset(&mut self.graph, &mut self.tweens);
        }
    }

    fn select_skill(&mut self, name: &str) {
        let Some(link) = self.content.skill_link(name).map(str::to_string) else {
            eprintln!("[stage] skill '{name}' has no model");
            return;
        };
        eprintln!("[stage] select skill '{name}' -> '{link}'");
        self.hover.clear(&mut self.graph, &mut self.tweens, &mut self.tooltips);

        let fade = self.fade_seconds();
        for other in selection::selectable_links(&self.content) {
            let Some(root) = self.registry.get(&other) else { continue };
            let target = if other == link { 1.0 } else { 0.0 };
            set_visibility(&mut self.graph, &mut self.tweens, root, target, true, fade);
        }

        let pose = self
            .content
            .models
            .iter()
            .find(|m| m.link_name == link)
            .and_then(|m| m.camera_pose.clone())
            .or_else(|| {
                self.content
                    .overrides
                    .iter()
                    .find(|o| o.link_name == link)
                    .and_then(|o| o.camera_pose.clone())
            })
            .unwrap_or_else(|| self.content.starting_camera.clone());
        let seconds = self.camera_seconds();
        self.camera.fly_to(&mut self.tweens, &CameraMove::from(&pose), seconds);
    }

    fn advance_commits(&mut self) {
        let fade = self.fade_seconds();
        if let Some(commits) = self.commits.as_mut() {
            commits.advance(&mut self.graph, &mut self.tweens, fade);
        }
    }

    fn cycle_theme(&mut self) {
        let palette = *self.theme.cycle();
        if let Err(err) = self.theme.save(theme::DEFAULT_THEME_PATH) {
            eprintln!("[theme] save failed: {err:?}");
        }
        if let Some(sketch) = self.sketch.as_mut() {
            sketch.recolor(&palette);
        }
        if let Some(commits) = self.commits.as_ref() {
            commits.recolor(&mut self.graph, palette.commit);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::testing::StubSource;
    use crate::config::{ShadowConfig, StageConfig};

    fn built_stage() -> Stage {
        let mut stage = Stage::new(
            StageContent::builtin(),
            StageConfig::default(),
            ShadowConfig::default(),
            ThemeState::default(),
            Box::new(StubSource::new()),
        );
        stage.build_scene().unwrap();
        stage.setup_lighting().unwrap();
        stage.load_assets().unwrap();
        stage.process_assets().unwrap();
        stage.configure_shadows().unwrap();
        stage
    }

    #[test]
    fn phase_misuse_is_an_error() {
        let mut stage = Stage::new(
            StageContent::builtin(),
            StageConfig::default(),
            ShadowConfig::default(),
            ThemeState::default(),
            Box::new(StubSource::new()),
        );
        assert!(stage.setup_lighting().is_err());
        assert!(stage.load_assets().is_err());
    }

    #[test]
    fn full_phase_chain_populates_the_stage() {
        let stage = built_stage();
        assert!(stage.registry.contains("css"));
        assert!(stage.registry.contains("js"), "override promoted");
        assert!(stage.registry.contains("commitModel"));
        assert!(stage.registry.contains("vectorDesk"));
        assert!(!stage.tooltips.is_empty());
        assert!(!stage.shadows.casters.is_empty());
        assert!(stage.shadows.z_max > stage.shadows.z_min);
    }

    #[test]
    fn starting_visibility_applied_from_declarations() {
        let stage = built_stage();
        let logos = stage.registry.get("logos").unwrap();
        assert_eq!(stage.graph.node(logos).unwrap().meta.visibility, 0.0);
        let css = stage.registry.get("css").unwrap();
        assert_eq!(stage.graph.node(css).unwrap().meta.visibility, 1.0);
    }

    #[test]
    fn commands_wait_for_running() {
        let mut stage = built_stage();
        stage.commands.push(StageCommand::SelectSkill("React".to_string()));
        stage.apply_commands(false);
        assert_eq!(stage.commands.len(), 1, "command must survive until running");
        stage.apply_commands(true);
        assert!(stage.commands.is_empty());
        let react = stage.registry.get("react").unwrap();
        assert_eq!(stage.graph.node(react).unwrap().meta.visibility, 1.0);
        let css = stage.registry.get("css").unwrap();
        assert_eq!(stage.graph.node(css).unwrap().meta.visibility, 0.0);
    }

    #[test]
    fn group_selection_restores_members_and_resets_fixtures() {
        let mut stage = built_stage();
        // Hide everything via a skill selection first.
        stage.commands.push(StageCommand::SelectSkill("Git".to_string()));
        stage.apply_commands(true);
        // Mess with the commit button and sketch board.
        stage.commands.push(StageCommand::AdvanceCommits);
        stage.apply_commands(true);

        stage.commands.push(StageCommand::SelectGroup(0));
        stage.apply_commands(true);

        let css = stage.registry.get("css").unwrap();
        assert_eq!(stage.graph.node(css).unwrap().meta.visibility, 1.0);
        // logos is a member but keeps its declared base of 0.
        let logos = stage.registry.get("logos").unwrap();
        assert_eq!(stage.graph.node(logos).unwrap().meta.visibility, 0.0);
        let git = stage.registry.get("git").unwrap();
        assert_eq!(stage.graph.node(git).unwrap().meta.visibility, 0.0);
        assert_eq!(stage.commits.as_ref().unwrap().button_label(), "commit");
        assert_eq!(stage.sketch.as_ref().unwrap().point_count(), 0);
    }

    #[test]
    fn tick_routes_camera_and_visibility_updates() {
        let mut stage = built_stage();
        stage.commands.push(StageCommand::SelectSkill("React".to_string()));
        stage.apply_commands(true);
        let viewport = PhysicalSize::new(1280, 720);
        // Run well past every fade and camera move.
        for _ in 0..300 {
            stage.tick(0.016, viewport);
        }
        let react = stage.registry.get("react").unwrap();
        assert_eq!(stage.graph.node(react).unwrap().rendered_visibility, 1.0);
        let css = stage.registry.get("css").unwrap();
        assert_eq!(stage.graph.node(css).unwrap().rendered_visibility, 0.0);
        // Camera settled on the react pose.
        let pose = stage.content.models.iter().find(|m| m.link_name == "react").unwrap();
        let expected = pose.camera_pose.as_ref().unwrap();
        assert!((stage.camera.radius - expected.radius).abs() < 1e-3);
        assert!((stage.camera.yaw - expected.yaw_deg.to_radians()).abs() < 1e-3);
    }
}
