use std::ops::RangeInclusive;

use mumax_toolbox_core::geom::Vec3F;
use tracing::debug;

use crate::scene::SceneBackend;

/// Bounds of the user-adjustable pan step.
pub const CAM_STEP_RANGE: RangeInclusive<f32> = 1.0..=20.0;
pub const DEFAULT_CAM_STEP: f32 = 5.0;

/// Tracks the focal point and pan step. No history is kept; the current
/// focal point and the step are the whole state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraController {
    focal: Vec3F,
    step: f32,
}

impl CameraController {
    pub fn new(focal: Vec3F) -> Self {
        Self {
            focal,
            step: DEFAULT_CAM_STEP,
        }
    }

    pub fn focal(&self) -> Vec3F {
        self.focal
    }

    pub fn step(&self) -> f32 {
        self.step
    }

    /// Clamps into [`CAM_STEP_RANGE`] and returns the stored value.
    pub fn set_step(&mut self, step: f32) -> f32 {
        self.step = step.clamp(*CAM_STEP_RANGE.start(), *CAM_STEP_RANGE.end());
        self.step
    }

    /// Relative pan in the view plane, scaled by the current step.
    pub fn pan<S: SceneBackend>(&mut self, scene: &mut S, dx: f32, dy: f32) {
        self.focal = self.focal + Vec3F::new(dx * self.step, dy * self.step, 0.0);
        scene.set_focal_point(self.focal);
    }

    /// Jumps back to a dataset-derived default focal point. Always
    /// available, whatever the current state.
    pub fn reset<S: SceneBackend>(&mut self, scene: &mut S, focal: Vec3F) {
        debug!(?focal, "camera reset");
        self.focal = focal;
        scene.set_focal_point(self.focal);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{RecordingScene, SceneOp};

    #[test]
    fn pan_applies_step() {
        let mut scene = RecordingScene::new();
        let mut camera = CameraController::new(Vec3F::new(256.0, 256.0, 0.0));
        camera.set_step(10.0);

        camera.pan(&mut scene, 1.0, 0.0);
        assert_eq!(camera.focal(), Vec3F::new(266.0, 256.0, 0.0));
        camera.pan(&mut scene, 0.0, -1.0);
        assert_eq!(camera.focal(), Vec3F::new(266.0, 246.0, 0.0));

        assert_eq!(
            scene.ops().last(),
            Some(&SceneOp::FocalPoint {
                focal: Vec3F::new(266.0, 246.0, 0.0)
            })
        );
    }

    #[test]
    fn step_is_clamped() {
        let mut camera = CameraController::new(Vec3F::default());
        assert_eq!(camera.set_step(0.0), 1.0);
        assert_eq!(camera.set_step(100.0), 20.0);
        assert_eq!(camera.set_step(7.5), 7.5);
    }

    #[test]
    fn reset_restores_default() {
        let mut scene = RecordingScene::new();
        let mut camera = CameraController::new(Vec3F::default());
        camera.pan(&mut scene, 3.0, 4.0);

        let center = Vec3F::new(2.0, 2.0, 2.0);
        camera.reset(&mut scene, center);
        assert_eq!(camera.focal(), center);
    }
}
