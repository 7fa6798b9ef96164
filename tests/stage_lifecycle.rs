use anyhow::Result;
use avatar_stage::assets::testing::StubSource;
use avatar_stage::config::{ShadowConfig, StageConfig};
use avatar_stage::content::StageContent;
use avatar_stage::lifecycle::{Orchestrator, Phase, PhaseHost};
use avatar_stage::selection::StageCommand;
use avatar_stage::stage::Stage;
use avatar_stage::theme::ThemeState;

/// Headless stand-in for the window shell: engine start and the render loop
/// are no-ops, everything else goes straight to the stage.
struct HeadlessHost {
    stage: Stage,
    presentation_started: bool,
}

impl HeadlessHost {
    fn new(source: StubSource) -> Self {
        let stage = Stage::new(
            StageContent::builtin(),
            StageConfig::default(),
            ShadowConfig::default(),
            ThemeState::default(),
            Box::new(source),
        );
        Self { stage, presentation_started: false }
    }
}

impl PhaseHost for HeadlessHost {
    fn start_engine(&mut self) -> Result<()> {
        Ok(())
    }
    fn build_scene(&mut self) -> Result<()> {
        self.stage.build_scene()
    }
    fn setup_lighting(&mut self) -> Result<()> {
        self.stage.setup_lighting()
    }
    fn load_assets(&mut self) -> Result<()> {
        self.stage.load_assets()
    }
    fn process_assets(&mut self) -> Result<()> {
        self.stage.process_assets()
    }
    fn configure_shadows(&mut self) -> Result<()> {
        self.stage.configure_shadows()
    }
    fn start_render_loop(&mut self) -> Result<()> {
        self.stage.start_presentation();
        self.presentation_started = true;
        Ok(())
    }
}

#[test]
fn drive_parks_at_running_with_a_populated_stage() {
    let mut orchestrator = Orchestrator::new();
    let mut host = HeadlessHost::new(StubSource::new());
    orchestrator.drive(&mut host).unwrap();

    assert_eq!(orchestrator.phase(), Phase::Running);
    assert!(host.presentation_started);
    assert!(host.stage.registry.contains("css"));
    assert!(host.stage.registry.contains("commitModel"));
    assert!(host.stage.commits.is_some());
    assert!(host.stage.sketch.is_some());
    assert!(!host.stage.tooltips.is_empty());
}

#[test]
fn a_broken_model_file_does_not_abort_startup() {
    let mut orchestrator = Orchestrator::new();
    let mut host = HeadlessHost::new(StubSource { broken: vec!["css3.gltf".to_string()] });
    orchestrator.drive(&mut host).unwrap();

    assert_eq!(orchestrator.phase(), Phase::Running);
    // The broken entry is dropped, the rest of the batch still loads.
    assert!(!host.stage.registry.contains("css"));
    assert!(host.stage.registry.contains("react"));
}

#[test]
fn commands_queue_until_running_then_apply() {
    let mut orchestrator = Orchestrator::new();
    let mut host = HeadlessHost::new(StubSource::new());

    host.stage.commands.push(StageCommand::SelectSkill("React".to_string()));
    host.stage.apply_commands(orchestrator.is_running());
    assert_eq!(host.stage.commands.len(), 1, "not running yet, the command waits");

    orchestrator.drive(&mut host).unwrap();
    host.stage.apply_commands(orchestrator.is_running());
    assert!(host.stage.commands.is_empty());

    let react = host.stage.registry.get("react").unwrap();
    assert_eq!(host.stage.graph.node(react).unwrap().meta.visibility, 1.0);
}

#[test]
fn pause_blocks_commands_until_resume() {
    let mut orchestrator = Orchestrator::new();
    let mut host = HeadlessHost::new(StubSource::new());
    orchestrator.drive(&mut host).unwrap();

    orchestrator.pause();
    host.stage.commands.push(StageCommand::AdvanceCommits);
    host.stage.apply_commands(orchestrator.is_running());
    assert_eq!(host.stage.commits.as_ref().unwrap().button_label(), "commit");

    orchestrator.resume();
    host.stage.apply_commands(orchestrator.is_running());
    assert_eq!(host.stage.commits.as_ref().unwrap().button_label(), "merge");
}
