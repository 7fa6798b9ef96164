use crate::content::PoseData;
use crate::tween::{Channel, Tween, TweenScheduler};
use glam::{Mat4, Vec2, Vec3, Vec4};
use winit::dpi::PhysicalSize;

const DEFAULT_FOV_Y: f32 = 0.8;
const NEAR: f32 = 0.1;
const FAR: f32 = 500.0;
const MIN_PITCH: f32 = 0.05;

/// A camera move. Each component is independent; only the provided ones are
/// animated, the rest stay where they are.
#[derive(Debug, Clone, Copy, Default)]
pub struct CameraMove {
    pub target: Option<Vec3>,
    pub yaw: Option<f32>,
    pub pitch: Option<f32>,
    pub radius: Option<f32>,
}

impl From<&PoseData> for CameraMove {
    fn from(pose: &PoseData) -> Self {
        Self {
            target: Some(pose.target_vec()),
            yaw: Some(pose.yaw_deg.to_radians()),
            pitch: Some(pose.pitch_deg.to_radians()),
            radius: Some(pose.radius),
        }
    }
}

/// Orbit rig around a target point. Pitch is measured from the vertical axis,
/// so ~90 degrees looks along the horizon.
#[derive(Debug, Clone)]
pub struct StageCamera {
    pub target: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub radius: f32,
    pub fov_y: f32,
}

impl StageCamera {
    pub fn from_pose(pose: &PoseData) -> Self {
        Self {
            target: pose.target_vec(),
            yaw: pose.yaw_deg.to_radians(),
            pitch: pose.pitch_deg.to_radians().clamp(MIN_PITCH, std::f32::consts::PI - MIN_PITCH),
            radius: pose.radius.max(0.1),
            fov_y: DEFAULT_FOV_Y,
        }
    }

    pub fn position(&self) -> Vec3 {
        let sin_pitch = self.pitch.sin();
        let offset = Vec3::new(
            sin_pitch * self.yaw.sin(),
            self.pitch.cos(),
            sin_pitch * self.yaw.cos(),
        ) * self.radius;
        self.target + offset
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position(), self.target, Vec3::Y)
    }

    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, aspect.max(0.0001), NEAR, FAR)
    }

    pub fn view_projection(&self, viewport: PhysicalSize<u32>) -> Mat4 {
        let aspect =
            if viewport.height > 0 { viewport.width as f32 / viewport.height as f32 } else { 1.0 };
        self.projection_matrix(aspect) * self.view_matrix()
    }

    /// World-space ray from the camera through a screen position.
    pub fn screen_ray(&self, screen: Vec2, viewport: PhysicalSize<u32>) -> Option<(Vec3, Vec3)> {
        if viewport.width == 0 || viewport.height == 0 {
            return None;
        }
        let ndc_x = (2.0 * screen.x / viewport.width as f32) - 1.0;
        let ndc_y = 1.0 - (2.0 * screen.y / viewport.height as f32);
        let clip = Vec4::new(ndc_x, ndc_y, 1.0, 1.0);
        let inv_view_proj = self.view_projection(viewport).inverse();
        let world = inv_view_proj * clip;
        if world.w.abs() < f32::EPSILON {
            return None;
        }
        let origin = self.position();
        let dir = ((world.truncate() / world.w) - origin).normalize();
        Some((origin, dir))
    }

    /// Screen position of a world point; `None` when behind the camera or the
    /// viewport is degenerate.
    pub fn project_point(&self, point: Vec3, viewport: PhysicalSize<u32>) -> Option<Vec2> {
        if viewport.width == 0 || viewport.height == 0 {
            return None;
        }
        let clip = self.view_projection(viewport) * point.extend(1.0);
        if clip.w <= f32::EPSILON {
            return None;
        }
        let ndc = clip.truncate() / clip.w;
        let x = (ndc.x + 1.0) * 0.5 * viewport.width as f32;
        let y = (1.0 - ndc.y) * 0.5 * viewport.height as f32;
        Some(Vec2::new(x, y))
    }

    /// Starts a tween per provided component, all in parallel on their own
    /// channels. Components the move omits are left untouched.
    pub fn fly_to(&self, tweens: &mut TweenScheduler, mov: &CameraMove, seconds: f32) {
        if let Some(target) = mov.target {
            tweens.start(Tween::vec(Channel::CameraTarget, self.target, target, seconds));
        }
        if let Some(yaw) = mov.yaw {
            tweens.start(Tween::scalar(Channel::CameraYaw, self.yaw, yaw, seconds));
        }
        if let Some(pitch) = mov.pitch {
            tweens.start(Tween::scalar(Channel::CameraPitch, self.pitch, pitch, seconds));
        }
        if let Some(radius) = mov.radius {
            tweens.start(Tween::scalar(Channel::CameraRadius, self.radius, radius, seconds));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera() -> StageCamera {
        StageCamera::from_pose(&PoseData {
            target: [-1.0, 2.5, 0.0],
            yaw_deg: 180.0,
            pitch_deg: 80.0,
            radius: 6.0,
        })
    }

    #[test]
    fn position_orbits_target_at_radius() {
        let camera = camera();
        let distance = camera.position().distance(camera.target);
        assert!((distance - 6.0).abs() < 1e-4);
    }

    #[test]
    fn project_round_trips_through_screen_ray() {
        let camera = camera();
        let viewport = PhysicalSize::new(1280, 720);
        let point = Vec3::new(0.0, 2.0, 0.0);
        let screen = camera.project_point(point, viewport).expect("point in front of camera");
        let (origin, dir) = camera.screen_ray(screen, viewport).expect("ray");
        // The ray must pass close to the original point.
        let to_point = point - origin;
        let closest = origin + dir * to_point.dot(dir);
        assert!(closest.distance(point) < 1e-2);
    }

    #[test]
    fn fly_to_only_tweens_provided_components() {
        let camera = camera();
        let mut tweens = TweenScheduler::new();
        camera.fly_to(&mut tweens, &CameraMove { radius: Some(3.0), ..Default::default() }, 1.0);
        assert_eq!(tweens.live_count(), 1);
        camera.fly_to(
            &mut tweens,
            &CameraMove::from(&PoseData {
                target: [0.0; 3],
                yaw_deg: 90.0,
                pitch_deg: 85.0,
                radius: 5.0,
            }),
            1.0,
        );
        assert_eq!(tweens.live_count(), 4);
    }

    #[test]
    fn degenerate_viewport_yields_no_ray() {
        let camera = camera();
        assert!(camera.screen_ray(Vec2::ZERO, PhysicalSize::new(0, 0)).is_none());
        assert!(camera.project_point(Vec3::ZERO, PhysicalSize::new(0, 0)).is_none());
    }
}
