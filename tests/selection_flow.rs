use avatar_stage::assets::testing::StubSource;
use avatar_stage::config::{ShadowConfig, StageConfig};
use avatar_stage::content::StageContent;
use avatar_stage::selection::StageCommand;
use avatar_stage::stage::Stage;
use avatar_stage::theme::ThemeState;
use winit::dpi::PhysicalSize;

fn running_stage() -> Stage {
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
    stage.start_presentation();
    stage
}

fn settle(stage: &mut Stage) {
    let viewport = PhysicalSize::new(1280, 720);
    for _ in 0..300 {
        stage.tick(0.016, viewport);
    }
}

fn committed(stage: &Stage, link: &str) -> f32 {
    let root = stage.registry.get(link).unwrap();
    stage.graph.node(root).unwrap().meta.visibility
}

fn rendered(stage: &Stage, link: &str) -> f32 {
    let root = stage.registry.get(link).unwrap();
    stage.graph.node(root).unwrap().rendered_visibility
}

#[test]
fn skill_selection_isolates_one_model_and_moves_the_camera() {
    let mut stage = running_stage();
    stage.commands.push(StageCommand::SelectSkill("React".to_string()));
    stage.apply_commands(true);

    // Committed state flips immediately, before any fade finishes.
    assert_eq!(committed(&stage, "react"), 1.0);
    assert_eq!(committed(&stage, "css"), 0.0);
    assert_eq!(committed(&stage, "git"), 0.0);
    assert_eq!(committed(&stage, "commitModel"), 0.0);

    settle(&mut stage);
    assert_eq!(rendered(&stage, "react"), 1.0);
    assert_eq!(rendered(&stage, "css"), 0.0);

    let pose = stage
        .content
        .models
        .iter()
        .find(|m| m.link_name == "react")
        .and_then(|m| m.camera_pose.as_ref())
        .unwrap();
    assert!((stage.camera.radius - pose.radius).abs() < 1e-3);
    assert!((stage.camera.target - pose.target_vec()).length() < 1e-3);
}

#[test]
fn skill_without_a_model_changes_nothing() {
    let mut stage = running_stage();
    let before = committed(&stage, "css");
    stage.commands.push(StageCommand::SelectSkill("Teamwork".to_string()));
    stage.apply_commands(true);
    assert_eq!(committed(&stage, "css"), before);
}

#[test]
fn group_selection_restores_declared_bases() {
    let mut stage = running_stage();
    stage.commands.push(StageCommand::SelectSkill("Git".to_string()));
    stage.apply_commands(true);
    assert_eq!(committed(&stage, "css"), 0.0);

    // Group 0 is the programming group.
    stage.commands.push(StageCommand::SelectGroup(0));
    stage.apply_commands(true);

    assert_eq!(committed(&stage, "css"), 1.0);
    assert_eq!(committed(&stage, "react"), 1.0);
    // logos declares visibility 0 and must stay there even as a member.
    assert_eq!(committed(&stage, "logos"), 0.0);
    assert_eq!(committed(&stage, "git"), 0.0);

    settle(&mut stage);
    let home = &stage.content.starting_camera;
    assert!((stage.camera.radius - home.radius).abs() < 1e-3);
}

#[test]
fn group_selection_resets_the_fixtures() {
    let mut stage = running_stage();

    // Advance the diorama and scribble on the board first.
    stage.commands.push(StageCommand::AdvanceCommits);
    stage.apply_commands(true);
    let mut sketch = stage.sketch.take().unwrap();
    assert_eq!(sketch.point_count(), 0);
    sketch.click_marker(&mut stage.graph, &mut stage.tweens, 0);
    assert_eq!(sketch.point_count(), 1);
    stage.sketch = Some(sketch);
    assert_eq!(stage.commits.as_ref().unwrap().button_label(), "merge");

    stage.commands.push(StageCommand::SelectGroup(0));
    stage.apply_commands(true);

    assert_eq!(stage.commits.as_ref().unwrap().button_label(), "commit");
    assert_eq!(stage.sketch.as_ref().unwrap().point_count(), 0);
}

#[test]
fn out_of_range_group_index_falls_back_to_common() {
    let mut stage = running_stage();
    stage.commands.push(StageCommand::SelectSkill("Git".to_string()));
    stage.apply_commands(true);
    stage.commands.push(StageCommand::AdvanceCommits);
    stage.apply_commands(true);

    stage.commands.push(StageCommand::SelectGroup(99));
    stage.apply_commands(true);

    // The catch-all group contains the robot; everything else hides.
    assert_eq!(committed(&stage, "robot"), 1.0);
    assert_eq!(committed(&stage, "css"), 0.0);
    assert_eq!(stage.commits.as_ref().unwrap().button_label(), "commit");
}
