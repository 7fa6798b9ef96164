use crate::content::SketchBoardSpec;
use crate::mesh::MeshData;
use crate::registry::NodeRegistry;
use crate::scene_graph::{NodeId, SceneGraph};
use crate::theme::Palette;
use crate::tween::TweenScheduler;
use crate::visibility::set_visibility;
use glam::{Quat, Vec2, Vec3};
use image::RgbaImage;

const TEXTURE_SIZE: u32 = 512;
const MARKER_RADIUS: f32 = 0.08;
const POINT_RADIUS: i32 = 6;
const LINE_THICKNESS: i32 = 2;
/// Markers sit at this fraction of the board face half-extent.
const CORNER_INSET: f32 = 0.8;

/// The paintable board: a box with a dynamic texture and four faint corner
/// markers. Clicking markers stamps their mapped 2D points and connects them;
/// the fourth point closes the loop.
pub struct SketchBoard {
    pub board: NodeId,
    pub mesh_index: usize,
    markers: Vec<(NodeId, Vec2)>,
    points: Vec<Vec2>,
    texture: RgbaImage,
    background: [u8; 4],
    ink: [u8; 4],
    dirty: bool,
}

impl SketchBoard {
    pub fn build(
        spec: &SketchBoardSpec,
        graph: &mut SceneGraph,
        registry: &mut NodeRegistry,
        meshes: &mut Vec<MeshData>,
        tweens: &mut TweenScheduler,
        palette: &Palette,
        group_name: &str,
        theme_tag: usize,
    ) -> Self {
        let half = Vec3::from_array(spec.box_size) * 0.5;
        let stage_root = graph.root();
        let board = graph.insert(spec.name.as_str(), Some(stage_root));

        let mesh_index = meshes.len();
        let mut board_mesh = MeshData::cuboid(half);
        let mut texture = RgbaImage::new(TEXTURE_SIZE, TEXTURE_SIZE);
        fill(&mut texture, palette.board_background);
        board_mesh.texture = Some(texture.clone());
        meshes.push(board_mesh);

        if let Some(node) = graph.node_mut(board) {
            node.translation = Vec3::from_array(spec.position);
            node.rotation = Quat::from_euler(
                glam::EulerRot::XYZ,
                spec.rotation_deg[0].to_radians(),
                spec.rotation_deg[1].to_radians(),
                spec.rotation_deg[2].to_radians(),
            );
            node.mesh = Some(mesh_index);
            node.bound_radius = half.length();
        }
        registry.add_node(graph, &spec.name, board);

        // Corners of the drawing face (the thin axis points at the camera),
        // each mapped to a texel with the same margin.
        let marker_mesh = meshes.len();
        meshes.push(MeshData::sphere(MARKER_RADIUS, 8, 12));
        let mut markers = Vec::new();
        let uv = |sy: f32, sz: f32| {
            Vec2::new(
                (0.5 + sz * CORNER_INSET * 0.5) * TEXTURE_SIZE as f32,
                (0.5 - sy * CORNER_INSET * 0.5) * TEXTURE_SIZE as f32,
            )
        };
        for (index, (sy, sz)) in [(1.0, -1.0), (1.0, 1.0), (-1.0, 1.0), (-1.0, -1.0)].iter().enumerate() {
            let marker = graph.insert(format!("marker_{}", index + 1), Some(board));
            if let Some(node) = graph.node_mut(marker) {
                node.translation = Vec3::new(
                    half.x + MARKER_RADIUS,
                    sy * half.y * CORNER_INSET,
                    sz * half.z * CORNER_INSET,
                );
                node.mesh = Some(marker_mesh);
                node.bound_radius = MARKER_RADIUS;
            }
            markers.push((marker, uv(*sy, *sz)));
        }

        graph.tag_subtree(board, &spec.name, group_name, theme_tag);
        // Markers start faint; the clamp keeps them there.
        for &(marker, _) in &markers {
            set_visibility(graph, tweens, marker, 1.0, true, 0.0);
        }

        Self {
            board,
            mesh_index,
            markers,
            points: Vec::new(),
            texture,
            background: palette.board_background,
            ink: palette.board_ink,
            dirty: true,
        }
    }

    /// Marker index for a picked node, if it is one of the corner markers.
    pub fn marker_index(&self, id: NodeId) -> Option<usize> {
        self.markers.iter().position(|&(marker, _)| marker == id)
    }

    pub fn marker_node(&self, index: usize) -> Option<NodeId> {
        self.markers.get(index).map(|&(id, _)| id)
    }

    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    /// Consumes a marker click: hides the marker, stamps its point, connects
    /// it to the previous one, and closes the loop on the fourth.
    pub fn click_marker(
        &mut self,
        graph: &mut SceneGraph,
        tweens: &mut TweenScheduler,
        index: usize,
    ) {
        let Some(&(marker, texel)) = self.markers.get(index) else { return };
        let consumed = graph.node(marker).map(|n| n.meta.visibility <= 0.0).unwrap_or(true);
        if consumed {
            return;
        }
        set_visibility(graph, tweens, marker, 0.0, true, 0.0);
        self.points.push(texel);
        self.redraw();
    }

    /// Forgets all points and restores the faint markers.
    pub fn clear(&mut self, graph: &mut SceneGraph, tweens: &mut TweenScheduler) {
        self.points.clear();
        for &(marker, _) in &self.markers {
            set_visibility(graph, tweens, marker, 1.0, true, 0.0);
        }
        self.redraw();
    }

    /// Theme hook: repaints the whole board in the new palette.
    pub fn recolor(&mut self, palette: &Palette) {
        self.background = palette.board_background;
        self.ink = palette.board_ink;
        self.redraw();
    }

    pub fn texture(&self) -> &RgbaImage {
        &self.texture
    }

    /// True once after every repaint; the renderer re-uploads on it.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    fn redraw(&mut self) {
        fill(&mut self.texture, self.background);
        for window in self.points.windows(2) {
            stroke(&mut self.texture, window[0], window[1], self.ink);
        }
        if self.points.len() == self.markers.len() && self.points.len() >= 3 {
            let first = self.points[0];
            let last = self.points[self.points.len() - 1];
            stroke(&mut self.texture, last, first, self.ink);
        }
        for &point in &self.points {
            dot(&mut self.texture, point, self.ink);
        }
        self.dirty = true;
    }
}

fn fill(texture: &mut RgbaImage, color: [u8; 4]) {
    for pixel in texture.pixels_mut() {
        *pixel = image::Rgba(color);
    }
}

fn dot(texture: &mut RgbaImage, center: Vec2, color: [u8; 4]) {
    let (cx, cy) = (center.x as i32, center.y as i32);
    for dy in -POINT_RADIUS..=POINT_RADIUS {
        for dx in -POINT_RADIUS..=POINT_RADIUS {
            if dx * dx + dy * dy > POINT_RADIUS * POINT_RADIUS {
                continue;
            }
            put(texture, cx + dx, cy + dy, color);
        }
    }
}

fn stroke(texture: &mut RgbaImage, from: Vec2, to: Vec2, color: [u8; 4]) {
    let steps = (to - from).length().ceil().max(1.0) as i32;
    for step in 0..=steps {
        let p = from.lerp(to, step as f32 / steps as f32);
        for dy in -LINE_THICKNESS..=LINE_THICKNESS {
            for dx in -LINE_THICKNESS..=LINE_THICKNESS {
                put(texture, p.x as i32 + dx, p.y as i32 + dy, color);
            }
        }
    }
}

fn put(texture: &mut RgbaImage, x: i32, y: i32, color: [u8; 4]) {
    if x >= 0 && y >= 0 && (x as u32) < texture.width() && (y as u32) < texture.height() {
        texture.put_pixel(x as u32, y as u32, image::Rgba(color));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::StageContent;
    use crate::theme::PALETTES;
    use crate::visibility::MARKER_MAX_ALPHA;

    fn board() -> (SceneGraph, NodeRegistry, TweenScheduler, SketchBoard) {
        let content = StageContent::builtin();
        let mut graph = SceneGraph::new();
        let mut registry = NodeRegistry::new();
        let mut meshes = Vec::new();
        let mut tweens = TweenScheduler::new();
        let board = SketchBoard::build(
            &content.boards[0],
            &mut graph,
            &mut registry,
            &mut meshes,
            &mut tweens,
            &PALETTES[0],
            "graphicTools",
            0,
        );
        (graph, registry, tweens, board)
    }

    #[test]
    fn markers_start_faint_not_opaque() {
        let (graph, _, _, board) = board();
        for index in 0..4 {
            let marker = board.marker_node(index).unwrap();
            assert_eq!(graph.node(marker).unwrap().meta.visibility, MARKER_MAX_ALPHA);
        }
    }

    #[test]
    fn marker_click_hides_and_stamps_once() {
        let (mut graph, _, mut tweens, mut board) = board();
        board.click_marker(&mut graph, &mut tweens, 0);
        assert_eq!(board.point_count(), 1);
        let marker = board.marker_node(0).unwrap();
        assert_eq!(graph.node(marker).unwrap().meta.visibility, 0.0);
        // Consumed markers ignore further clicks.
        board.click_marker(&mut graph, &mut tweens, 0);
        assert_eq!(board.point_count(), 1);
    }

    #[test]
    fn fourth_point_closes_the_loop() {
        let (mut graph, _, mut tweens, mut board) = board();
        for index in 0..4 {
            board.click_marker(&mut graph, &mut tweens, index);
        }
        assert_eq!(board.point_count(), 4);
        assert!(board.take_dirty());
        // The texture carries ink somewhere between the first and last corner.
        let ink = PALETTES[0].board_ink;
        let has_ink = board.texture().pixels().any(|p| p.0 == ink);
        assert!(has_ink);
    }

    #[test]
    fn clear_restores_markers_and_background() {
        let (mut graph, _, mut tweens, mut board) = board();
        board.click_marker(&mut graph, &mut tweens, 0);
        board.click_marker(&mut graph, &mut tweens, 1);
        board.clear(&mut graph, &mut tweens);
        assert_eq!(board.point_count(), 0);
        let marker = board.marker_node(0).unwrap();
        assert_eq!(graph.node(marker).unwrap().meta.visibility, MARKER_MAX_ALPHA);
        let bg = PALETTES[0].board_background;
        assert!(board.texture().pixels().all(|p| p.0 == bg));
    }

    #[test]
    fn recolor_repaints_stamped_points() {
        let (mut graph, _, mut tweens, mut board) = board();
        board.click_marker(&mut graph, &mut tweens, 0);
        board.recolor(&PALETTES[1]);
        let ink = PALETTES[1].board_ink;
        assert!(board.texture().pixels().any(|p| p.0 == ink));
        let old_ink = PALETTES[0].board_ink;
        assert!(board.texture().pixels().all(|p| p.0 != old_ink));
    }
}
