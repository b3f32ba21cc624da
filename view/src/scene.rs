//! Contract between the view-model and the 3D scene-graph backend.
//!
//! The backend that actually rasterizes geometry lives outside this crate;
//! everything it must be able to do for the cut-plane view is captured by
//! [`SceneBackend`]. [`RecordingScene`] is a headless implementation used
//! by tests and the CLI dry-run.

use mumax_toolbox_core::geom::{Dim3D, Vec3F};
use ndarray::ArrayView3;
use thiserror::Error;

/// One frame's data as handed to the backend: the three vector components
/// plus the scalar array that colors the glyphs.
#[derive(Debug, Clone, Copy)]
pub struct VectorPayload<'a> {
    pub u: ArrayView3<'a, f32>,
    pub v: ArrayView3<'a, f32>,
    pub w: ArrayView3<'a, f32>,
    pub scalars: ArrayView3<'a, f32>,
}

/// Backend handle for a volumetric vector-field source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VolumeId(pub u64);

/// Backend handle for one cut-plane widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlaneId(pub u64);

pub trait SceneBackend {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Stops redraws until the matching [`SceneBackend::resume_render`].
    /// Calls may nest; the backend must not redraw until the outermost
    /// resume.
    fn suspend_render(&mut self);
    fn resume_render(&mut self);

    fn create_vector_field(&mut self, payload: VectorPayload<'_>)
        -> Result<VolumeId, Self::Error>;

    /// Swaps the data buffers behind an existing source. Must not touch
    /// any geometry bound to the source.
    fn update_vector_field(
        &mut self,
        volume: VolumeId,
        payload: VectorPayload<'_>,
    ) -> Result<(), Self::Error>;

    fn create_cut_plane(
        &mut self,
        volume: VolumeId,
        axis: Dim3D,
        origin: Vec3F,
    ) -> Result<PlaneId, Self::Error>;

    fn set_plane_origin(&mut self, plane: PlaneId, origin: Vec3F) -> Result<(), Self::Error>;

    fn set_focal_point(&mut self, focal: Vec3F);

    fn remove_cut_plane(&mut self, plane: PlaneId) -> Result<(), Self::Error>;
    fn remove_vector_field(&mut self, volume: VolumeId) -> Result<(), Self::Error>;
}

/// Frames `f` in a suspend/resume bracket so the backend never observes
/// partially-applied slice state. Resumes even when `f` fails.
pub fn batched<S: SceneBackend, R>(scene: &mut S, f: impl FnOnce(&mut S) -> R) -> R {
    scene.suspend_render();
    let out = f(scene);
    scene.resume_render();
    out
}

/// Everything a [`RecordingScene`] was asked to do, in order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SceneOp {
    Suspend,
    Resume,
    CreateVolume {
        volume: VolumeId,
        /// First scalar value of the payload; lets tests identify which
        /// frame's data was pushed without copying the arrays.
        probe: f32,
    },
    UpdateVolume {
        volume: VolumeId,
        probe: f32,
    },
    CreatePlane {
        plane: PlaneId,
        volume: VolumeId,
        axis: Dim3D,
        origin: Vec3F,
    },
    PlaneOrigin {
        plane: PlaneId,
        origin: Vec3F,
    },
    FocalPoint {
        focal: Vec3F,
    },
    RemovePlane {
        plane: PlaneId,
    },
    RemoveVolume {
        volume: VolumeId,
    },
}

#[derive(Debug, Error)]
pub enum RecordingError {
    #[error("injected removal failure")]
    RemovalFailed,
}

/// Headless backend that records operations instead of rendering.
#[derive(Debug, Default)]
pub struct RecordingScene {
    ops: Vec<SceneOp>,
    next_handle: u64,
    suspend_depth: u32,
    unbatched_mutations: usize,
    /// When set, removals fail; exercises the teardown-is-non-fatal path.
    pub fail_removals: bool,
}

impl RecordingScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ops(&self) -> &[SceneOp] {
        &self.ops
    }

    pub fn clear_ops(&mut self) {
        self.ops.clear();
    }

    pub fn is_suspended(&self) -> bool {
        self.suspend_depth > 0
    }

    /// Scene mutations that arrived outside a suspend/resume bracket.
    pub fn unbatched_mutations(&self) -> usize {
        self.unbatched_mutations
    }

    fn handle(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    fn mutate(&mut self, op: SceneOp) {
        if self.suspend_depth == 0 {
            self.unbatched_mutations += 1;
        }
        self.ops.push(op);
    }
}

fn probe(payload: &VectorPayload<'_>) -> f32 {
    payload.scalars.first().copied().unwrap_or(f32::NAN)
}

impl SceneBackend for RecordingScene {
    type Error = RecordingError;

    fn suspend_render(&mut self) {
        self.suspend_depth += 1;
        self.ops.push(SceneOp::Suspend);
    }

    fn resume_render(&mut self) {
        self.suspend_depth = self.suspend_depth.saturating_sub(1);
        self.ops.push(SceneOp::Resume);
    }

    fn create_vector_field(
        &mut self,
        payload: VectorPayload<'_>,
    ) -> Result<VolumeId, Self::Error> {
        let volume = VolumeId(self.handle());
        let probe = probe(&payload);
        self.mutate(SceneOp::CreateVolume { volume, probe });
        Ok(volume)
    }

    fn update_vector_field(
        &mut self,
        volume: VolumeId,
        payload: VectorPayload<'_>,
    ) -> Result<(), Self::Error> {
        let probe = probe(&payload);
        self.mutate(SceneOp::UpdateVolume { volume, probe });
        Ok(())
    }

    fn create_cut_plane(
        &mut self,
        volume: VolumeId,
        axis: Dim3D,
        origin: Vec3F,
    ) -> Result<PlaneId, Self::Error> {
        let plane = PlaneId(self.handle());
        self.mutate(SceneOp::CreatePlane {
            plane,
            volume,
            axis,
            origin,
        });
        Ok(plane)
    }

    fn set_plane_origin(&mut self, plane: PlaneId, origin: Vec3F) -> Result<(), Self::Error> {
        self.mutate(SceneOp::PlaneOrigin { plane, origin });
        Ok(())
    }

    fn set_focal_point(&mut self, focal: Vec3F) {
        self.ops.push(SceneOp::FocalPoint { focal });
    }

    fn remove_cut_plane(&mut self, plane: PlaneId) -> Result<(), Self::Error> {
        if self.fail_removals {
            return Err(RecordingError::RemovalFailed);
        }
        self.mutate(SceneOp::RemovePlane { plane });
        Ok(())
    }

    fn remove_vector_field(&mut self, volume: VolumeId) -> Result<(), Self::Error> {
        if self.fail_removals {
            return Err(RecordingError::RemovalFailed);
        }
        self.mutate(SceneOp::RemoveVolume { volume });
        Ok(())
    }
}
