//! Three orthogonal cut planes bound to one volumetric source.
//!
//! Time scrubbing is the hot path: changing the active frame only swaps
//! the data buffers behind the existing source, never the plane geometry.
//! Moving an offset slider touches exactly one plane. Every scene
//! mutation is framed in a suspend/resume bracket.

use mumax_toolbox_core::{
    geom::{Dim3D, Vec3F, Vec3U},
    store::{Frame, FrameIndexError, FrameStore, PayloadError},
};
use thiserror::Error;
use tracing::{debug, warn};

use crate::scene::{batched, PlaneId, SceneBackend, VectorPayload, VolumeId};

#[derive(Debug, Error)]
pub enum SliceError<E: std::error::Error> {
    #[error("scene backend error: {0}")]
    Scene(E),
    #[error(transparent)]
    Payload(#[from] PayloadError),
    #[error(transparent)]
    Frame(#[from] FrameIndexError),
}

#[derive(Debug, Clone, Copy)]
struct CutPlane {
    id: PlaneId,
    axis: Dim3D,
    offset: f32,
}

/// Scene resources bound to the currently loaded volume.
#[derive(Debug)]
struct BoundSlices {
    volume: VolumeId,
    planes: [CutPlane; 3],
    dims: Vec3U,
}

#[derive(Debug, Default)]
pub struct SliceEngine {
    bound: Option<BoundSlices>,
}

impl SliceEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_bound(&self) -> bool {
        self.bound.is_some()
    }

    /// Current plane offsets, if a volume is bound.
    pub fn offsets(&self) -> Option<Vec3F> {
        self.bound.as_ref().map(|b| {
            let [x, y, z] = b.planes;
            Vec3F::new(x.offset, y.offset, z.offset)
        })
    }

    /// Releases all scene resources bound to the previous volume. Removal
    /// failures are logged and skipped: leaking a retired handle is
    /// preferable to corrupting the active view.
    pub fn teardown<S: SceneBackend>(&mut self, scene: &mut S) {
        let Some(bound) = self.bound.take() else {
            return;
        };
        batched(scene, |scene| {
            for plane in bound.planes {
                if let Err(err) = scene.remove_cut_plane(plane.id) {
                    warn!(?plane.id, %err, "failed to remove cut plane, leaking handle");
                }
            }
            if let Err(err) = scene.remove_vector_field(bound.volume) {
                warn!(?bound.volume, %err, "failed to remove vector field, leaking handle");
            }
        });
    }

    /// Tears down any previous binding, then builds a fresh source from
    /// the store's frame 0 and three planes at centered offsets.
    pub fn rebuild<S: SceneBackend>(
        &mut self,
        scene: &mut S,
        store: &FrameStore,
    ) -> Result<(), SliceError<S::Error>> {
        self.teardown(scene);

        let frame = store.get_frame(0)?;
        let dims = frame.dimensions();
        let center = dims.center();
        let payload = payload_of(frame)?;

        self.bound = batched(scene, |scene| {
            let volume = scene
                .create_vector_field(payload)
                .map_err(SliceError::Scene)?;

            let mut created: Vec<CutPlane> = Vec::with_capacity(3);
            for axis in Dim3D::iter() {
                let offset = clamp_offset(center[axis], dims[axis]);
                match scene.create_cut_plane(volume, axis, origin_for(axis, offset, center)) {
                    Ok(id) => created.push(CutPlane { id, axis, offset }),
                    Err(err) => {
                        // Partial build: drop what was created before
                        // reporting, so nothing dangles in the scene.
                        for plane in created {
                            if let Err(err) = scene.remove_cut_plane(plane.id) {
                                warn!(?plane.id, %err, "failed to remove cut plane, leaking handle");
                            }
                        }
                        if let Err(err) = scene.remove_vector_field(volume) {
                            warn!(?volume, %err, "failed to remove vector field, leaking handle");
                        }
                        return Err(SliceError::Scene(err));
                    }
                }
            }

            let planes = [created[0], created[1], created[2]];
            Ok(Some(BoundSlices {
                volume,
                planes,
                dims,
            }))
        })?;

        debug!(?dims, "rebuilt cut planes");
        Ok(())
    }

    /// Swaps the payload behind the bound source to another frame. Plane
    /// geometry and offsets are untouched. No-op when nothing is bound.
    pub fn set_active_frame<S: SceneBackend>(
        &mut self,
        scene: &mut S,
        store: &FrameStore,
        index: usize,
    ) -> Result<(), SliceError<S::Error>> {
        let Some(bound) = &self.bound else {
            return Ok(());
        };

        debug_assert!(
            index < store.frame_count(),
            "frame slider delivered out-of-range index {index}"
        );
        let frame = store.get_frame(index)?;
        let payload = payload_of(frame)?;

        batched(scene, |scene| {
            scene
                .update_vector_field(bound.volume, payload)
                .map_err(SliceError::Scene)
        })
    }

    /// Moves one plane along its own axis. The value is clamped to
    /// `[0, dim_axis]`; the stored offset is returned. The other two
    /// planes are untouched. No-op (apart from clamping against the
    /// placeholder bounds) when nothing is bound.
    pub fn set_offset<S: SceneBackend>(
        &mut self,
        scene: &mut S,
        axis: Dim3D,
        value: f32,
    ) -> Result<f32, SliceError<S::Error>> {
        let Some(bound) = &mut self.bound else {
            return Ok(clamp_offset(value, 1));
        };

        let clamped = clamp_offset(value, bound.dims[axis]);
        let plane = &mut bound.planes[axis as usize];
        plane.offset = clamped;
        let origin = origin_for(plane.axis, clamped, bound.dims.center());

        batched(scene, |scene| {
            scene
                .set_plane_origin(plane.id, origin)
                .map_err(SliceError::Scene)
        })?;
        Ok(clamped)
    }
}

/// Clamps a requested offset into the volume bounds. Requests outside
/// `[0, dim]` come from float rounding at the slider edges and are not
/// errors.
pub fn clamp_offset(value: f32, dim: u32) -> f32 {
    value.clamp(0.0, dim as f32)
}

/// A plane's origin: its own axis carries the offset, the other two sit
/// at the volume center (irrelevant for an axis-aligned plane).
fn origin_for(axis: Dim3D, offset: f32, center: Vec3F) -> Vec3F {
    let mut origin = center;
    origin[axis] = offset;
    origin
}

fn payload_of(frame: &Frame) -> Result<VectorPayload<'_>, PayloadError> {
    // Glyphs are colored by the z-component of magnetization.
    Ok(VectorPayload {
        u: frame.component(Dim3D::X)?,
        v: frame.component(Dim3D::Y)?,
        w: frame.component(Dim3D::Z)?,
        scalars: frame.component(Dim3D::Z)?,
    })
}
