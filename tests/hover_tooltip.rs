use avatar_stage::assets::testing::StubSource;
use avatar_stage::config::{ShadowConfig, StageConfig};
use avatar_stage::content::StageContent;
use avatar_stage::stage::Stage;
use avatar_stage::theme::ThemeState;
use glam::Vec2;
use winit::dpi::PhysicalSize;

const VIEWPORT: PhysicalSize<u32> = PhysicalSize { width: 1280, height: 720 };

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
    stage
}

/// Screen position of a model root, for steering the cursor in tests.
fn screen_of(stage: &Stage, link: &str) -> Vec2 {
    let root = stage.registry.get(link).unwrap();
    let world = stage.graph.world_position(root);
    stage.camera.project_point(world, VIEWPORT).unwrap()
}

#[test]
fn hovering_a_model_reveals_its_tooltip() {
    let mut stage = running_stage();
    // Let the instant visibility writes land before picking.
    stage.tick(0.016, VIEWPORT);

    stage.handle_cursor(screen_of(&stage, "css"), VIEWPORT);
    let hovered = stage.hover.current().expect("css should be hovered");
    assert_eq!(stage.graph.node(hovered).unwrap().meta.link_name, "css");

    for _ in 0..60 {
        stage.tick(0.016, VIEWPORT);
    }
    let tooltip = stage.tooltips.get("css").unwrap();
    assert_eq!(tooltip.text, "CSS3");
    assert_eq!(tooltip.alpha, 1.0);
    assert!(tooltip.screen.is_some(), "visible tooltips carry a screen anchor");
    assert!(stage.tooltips.visible().any(|t| t.link_name == "css"));
    // Hover highlight is up as well.
    assert!(stage.graph.node(hovered).unwrap().overlay_alpha > 0.8);
}

#[test]
fn moving_off_the_model_hides_the_tooltip_again() {
    let mut stage = running_stage();
    stage.tick(0.016, VIEWPORT);

    stage.handle_cursor(screen_of(&stage, "css"), VIEWPORT);
    for _ in 0..60 {
        stage.tick(0.016, VIEWPORT);
    }
    assert!(stage.tooltips.visible().any(|t| t.link_name == "css"));

    // Empty sky in the corner.
    stage.handle_cursor(Vec2::new(2.0, 2.0), VIEWPORT);
    assert_eq!(stage.hover.current(), None);
    for _ in 0..60 {
        stage.tick(0.016, VIEWPORT);
    }
    assert!(!stage.tooltips.visible().any(|t| t.link_name == "css"));
}

#[test]
fn hiding_the_hovered_model_drops_the_hover() {
    let mut stage = running_stage();
    stage.tick(0.016, VIEWPORT);

    stage.handle_cursor(screen_of(&stage, "css"), VIEWPORT);
    assert!(stage.hover.current().is_some());

    // A skill selection elsewhere hides css mid-hover.
    stage.commands.push(avatar_stage::selection::StageCommand::SelectSkill("Git".to_string()));
    stage.apply_commands(true);
    stage.tick(0.016, VIEWPORT);
    assert_eq!(stage.hover.current(), None);
}

#[test]
fn clicking_a_model_squashes_it_briefly() {
    let mut stage = running_stage();
    stage.tick(0.016, VIEWPORT);

    let screen = screen_of(&stage, "css");
    stage.handle_click(screen, VIEWPORT);
    let root = stage.registry.get("css").unwrap();

    // Mid-bounce the squash factor dips below one, then recovers.
    stage.tick(0.06, VIEWPORT);
    let squashed = stage.graph.node(root).unwrap().squash;
    assert!(squashed < 1.0, "expected a squash dip, got {squashed}");
    for _ in 0..30 {
        stage.tick(0.016, VIEWPORT);
    }
    assert!((stage.graph.node(root).unwrap().squash - 1.0).abs() < 1e-3);
}
