use crate::selection::StageCommand;
use crate::stage::Stage;
use egui::{Align2, Color32, FontId, Pos2, Rect, Sense, Stroke, Vec2};
use winit::dpi::PhysicalSize;

const PANEL_WIDTH: f32 = 280.0;
const ARC_RADIUS: f32 = 11.0;
const ARC_SEGMENTS: usize = 24;

/// The whole overlay: skills side panel, screen-space tooltips and the
/// floating commit labels. Everything that touches the scene goes through the
/// command queue.
pub fn draw(ctx: &egui::Context, stage: &mut Stage, viewport: PhysicalSize<u32>) {
    side_panel(ctx, stage);
    tooltip_overlay(ctx, stage);
    label_overlay(ctx, stage, viewport);
}

fn side_panel(ctx: &egui::Context, stage: &mut Stage) {
    egui::SidePanel::right("skills_panel").exact_width(PANEL_WIDTH).show(ctx, |ui| {
        ui.heading("Skills");
        ui.separator();

        let groups: Vec<(usize, String)> = stage
            .content
            .skills
            .iter()
            .enumerate()
            .map(|(index, group)| (index, group.title.clone()))
            .collect();
        for (index, title) in groups {
            let header = ui.add(
                egui::Label::new(egui::RichText::new(&title).strong()).sense(Sense::click()),
            );
            if header.clicked() {
                stage.commands.push(StageCommand::SelectGroup(index));
            }
            let items: Vec<(String, u8)> = stage.content.skills[index]
                .items
                .iter()
                .map(|item| (item.name.clone(), item.level))
                .collect();
            for (name, level) in items {
                ui.horizontal(|ui| {
                    progress_arc(ui, level);
                    let label =
                        ui.add(egui::Label::new(&name).sense(Sense::click()));
                    if label.clicked() {
                        stage.commands.push(StageCommand::SelectSkill(name.clone()));
                    }
                });
            }
            ui.add_space(6.0);
        }

        ui.separator();
        ui.label(egui::RichText::new("Soft skills").strong());
        for skill in &stage.content.soft_skills {
            ui.label(format!("• {skill}"));
        }

        ui.separator();
        ui.horizontal(|ui| {
            let palette_name = stage.theme.active().name;
            if ui.button(format!("Theme: {palette_name}")).clicked() {
                stage.commands.push(StageCommand::CycleTheme);
            }
            let commit_label =
                stage.commits.as_ref().map(|c| c.button_label().to_string());
            if let Some(label) = commit_label {
                if ui.button(label).clicked() {
                    stage.commands.push(StageCommand::AdvanceCommits);
                }
            }
        });
    });
}

/// Level 0..100 as a small circular progress arc.
fn progress_arc(ui: &mut egui::Ui, level: u8) {
    let (rect, _) =
        ui.allocate_exact_size(Vec2::splat(ARC_RADIUS * 2.0 + 4.0), Sense::hover());
    let center = rect.center();
    let painter = ui.painter();
    painter.circle_stroke(center, ARC_RADIUS, Stroke::new(2.0, Color32::from_gray(70)));

    let sweep = std::f32::consts::TAU * (level as f32 / 100.0).clamp(0.0, 1.0);
    let points: Vec<Pos2> = (0..=ARC_SEGMENTS)
        .map(|segment| {
            let angle = -std::f32::consts::FRAC_PI_2 + sweep * segment as f32 / ARC_SEGMENTS as f32;
            center + Vec2::new(angle.cos(), angle.sin()) * ARC_RADIUS
        })
        .collect();
    painter.add(egui::Shape::line(points, Stroke::new(2.5, Color32::from_rgb(110, 190, 255))));
    painter.text(
        center,
        Align2::CENTER_CENTER,
        format!("{level}"),
        FontId::proportional(9.0),
        Color32::from_gray(200),
    );
}

fn tooltip_overlay(ctx: &egui::Context, stage: &Stage) {
    let painter = ctx.layer_painter(egui::LayerId::new(
        egui::Order::Foreground,
        egui::Id::new("stage_tooltips"),
    ));
    let ppp = ctx.pixels_per_point();
    for tooltip in stage.tooltips.visible() {
        let Some(screen) = tooltip.screen else { continue };
        let pos = Pos2::new(screen.x / ppp, screen.y / ppp);
        let alpha = (tooltip.alpha * 255.0) as u8;
        let galley_rect = Rect::from_center_size(pos, Vec2::new(90.0, 22.0));
        painter.rect_filled(galley_rect, 4.0, Color32::from_black_alpha(alpha / 2));
        painter.text(
            pos,
            Align2::CENTER_CENTER,
            &tooltip.text,
            FontId::proportional(14.0),
            Color32::from_white_alpha(alpha),
        );
    }
}

/// Text labels attached to scene nodes (commit messages), projected per frame.
fn label_overlay(ctx: &egui::Context, stage: &Stage, viewport: PhysicalSize<u32>) {
    let painter = ctx.layer_painter(egui::LayerId::new(
        egui::Order::Foreground,
        egui::Id::new("stage_labels"),
    ));
    let ppp = ctx.pixels_per_point();
    for id in stage.graph.ids() {
        let Some(node) = stage.graph.node(id) else { continue };
        let Some(label) = node.label.as_ref() else { continue };
        if node.rendered_visibility <= 0.05 {
            continue;
        }
        let world = stage.graph.world_position(id);
        let Some(screen) = stage.camera.project_point(world, viewport) else { continue };
        let alpha = (node.rendered_visibility * 255.0) as u8;
        painter.text(
            Pos2::new(screen.x / ppp, screen.y / ppp - 12.0),
            Align2::CENTER_BOTTOM,
            label,
            FontId::monospace(11.0),
            Color32::from_white_alpha(alpha),
        );
    }
}
