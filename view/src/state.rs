use mumax_toolbox_core::geom::{Dim3D, Vec3F};

use crate::{camera::CameraController, derived::DatasetDims};

/// The single owner of "what is currently shown": frame cursor, slice
/// offsets, and camera. Mutated only by user-driven parameter changes,
/// never read back from the rendering backend. Reset to dataset-relative
/// defaults on every dataset switch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewState {
    pub frame: usize,
    offsets: Vec3F,
    pub camera: CameraController,
}

impl ViewState {
    /// Frame 0, offsets at the volume center, camera focused on it.
    pub fn for_dataset(dims: &DatasetDims) -> Self {
        let center = dims.center();
        Self {
            frame: 0,
            offsets: center,
            camera: CameraController::new(center),
        }
    }

    pub fn offset(&self, axis: Dim3D) -> f32 {
        self.offsets[axis]
    }

    pub fn offsets(&self) -> Vec3F {
        self.offsets
    }

    /// Records an already-clamped offset. Clamping happens where the
    /// dimension bounds live (the slice engine, or the viewer when no
    /// dataset is bound).
    pub(crate) fn record_offset(&mut self, axis: Dim3D, value: f32) {
        self.offsets[axis] = value;
    }
}
