//! The controller owning the active dataset and everything shown from it.
//!
//! The host event loop delivers parameter changes (slider drags, button
//! presses, dataset selection) to [`Viewer`] methods, which run to
//! completion synchronously. Dataset switching is an explicit phase
//! machine so partial-failure states are enumerable.

use std::{ops::RangeInclusive, path::Path};

use mumax_toolbox_core::{
    geom::Dim3D,
    store::{Frame, FrameStore, LoadError},
};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    derived::{DatasetDims, Derived},
    scene::SceneBackend,
    slices::{clamp_offset, SliceEngine, SliceError},
    state::ViewState,
};

/// External collaborator that turns raw simulation output into the
/// per-frame NPY files a [`FrameStore`] reads. Opaque and fallible.
pub trait Converter {
    fn convert(&self, source: &Path, target: &Path) -> Result<(), ConversionError>;
}

#[derive(Debug, Error)]
#[error("format conversion failed: {message}")]
pub struct ConversionError {
    message: String,
}

impl ConversionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Steps of a dataset switch. Reported by [`Viewer::phase`]; always back
/// to `Idle` once a switch completes or fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchPhase {
    Idle,
    Converting,
    TearingDownOld,
    LoadingNew,
    RebuildingSlices,
}

#[derive(Debug, Error)]
pub enum SwitchError<E: std::error::Error> {
    #[error(transparent)]
    Conversion(#[from] ConversionError),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Slice(#[from] SliceError<E>),
}

/// Owns the active [`FrameStore`], the derived dimensions, the slice
/// engine, and the [`ViewState`]. One per scene; single-threaded.
#[derive(Debug)]
pub struct Viewer {
    store: Option<FrameStore>,
    dims: Derived<DatasetDims>,
    engine: SliceEngine,
    state: ViewState,
    phase: SwitchPhase,
}

impl Default for Viewer {
    fn default() -> Self {
        Self::new()
    }
}

impl Viewer {
    pub fn new() -> Self {
        Self {
            store: None,
            dims: Derived::empty(),
            engine: SliceEngine::new(),
            state: ViewState::for_dataset(&DatasetDims::EMPTY),
            phase: SwitchPhase::Idle,
        }
    }

    pub fn store(&self) -> Option<&FrameStore> {
        self.store.as_ref()
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn phase(&self) -> SwitchPhase {
        self.phase
    }

    /// Extents and frame count of the active dataset, or the placeholder
    /// `(1,1,1)×1` with no dataset loaded. Cached; recomputed only after
    /// a dataset change, never during slider interaction.
    pub fn dims(&self) -> DatasetDims {
        self.dims.get_or_compute(|| match &self.store {
            Some(store) => DatasetDims::of(store),
            None => DatasetDims::EMPTY,
        })
    }

    /// Valid positions of the frame slider.
    pub fn frame_range(&self) -> RangeInclusive<usize> {
        self.dims().frame_range()
    }

    /// Valid positions of the offset slider along `axis`.
    pub fn offset_range(&self, axis: Dim3D) -> RangeInclusive<f32> {
        self.dims().offset_range(axis)
    }

    /// The frame currently shown, if a dataset is loaded.
    pub fn current_frame(&self) -> Option<&Frame> {
        self.store.as_ref()?.get_frame(self.state.frame).ok()
    }

    /// Moves the time cursor. Payload swap only; slice offsets and camera
    /// are untouched.
    pub fn set_frame<S: SceneBackend>(
        &mut self,
        scene: &mut S,
        index: usize,
    ) -> Result<(), SliceError<S::Error>> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        self.engine.set_active_frame(scene, store, index)?;
        self.state.frame = index;
        Ok(())
    }

    /// Moves one slice plane. Returns the stored (clamped) offset.
    pub fn set_offset<S: SceneBackend>(
        &mut self,
        scene: &mut S,
        axis: Dim3D,
        value: f32,
    ) -> Result<f32, SliceError<S::Error>> {
        let stored = if self.engine.is_bound() {
            self.engine.set_offset(scene, axis, value)?
        } else {
            clamp_offset(value, self.dims().dims[axis])
        };
        self.state.record_offset(axis, stored);
        Ok(stored)
    }

    pub fn pan<S: SceneBackend>(&mut self, scene: &mut S, dx: f32, dy: f32) {
        self.state.camera.pan(scene, dx, dy);
    }

    pub fn reset_camera<S: SceneBackend>(&mut self, scene: &mut S) {
        let center = self.dims().center();
        self.state.camera.reset(scene, center);
    }

    /// Clamps into the step bounds and returns the stored value.
    pub fn set_cam_step(&mut self, step: f32) -> f32 {
        self.state.camera.set_step(step)
    }

    /// Streams one new frame file into the active store and widens the
    /// frame-slider range. The view keeps showing the current frame.
    pub fn append_frame(&mut self, path: impl AsRef<Path>) -> Result<usize, LoadError> {
        let Some(store) = &mut self.store else {
            return Err(LoadError::AppendToEmpty);
        };
        let index = store.append(path.as_ref())?;
        self.dims.invalidate();
        Ok(index)
    }

    /// Loads a directory that already holds per-frame NPY files. Tears
    /// down whatever was shown before.
    pub fn open_dataset<S: SceneBackend>(
        &mut self,
        scene: &mut S,
        directory: impl AsRef<Path>,
    ) -> Result<(), SwitchError<S::Error>> {
        self.replace_dataset(scene, directory.as_ref())
    }

    /// Full dataset switch: convert raw output, then tear down the old
    /// dataset and load the converted one. Conversion failure leaves the
    /// prior dataset fully intact; teardown starts only after the
    /// converter succeeds.
    pub fn switch_to<S: SceneBackend, C: Converter>(
        &mut self,
        scene: &mut S,
        converter: &C,
        source: &Path,
        target: &Path,
    ) -> Result<(), SwitchError<S::Error>> {
        self.phase = SwitchPhase::Converting;
        info!(source = %source.display(), "converting dataset");
        if let Err(err) = converter.convert(source, target) {
            warn!(%err, "conversion failed, keeping current dataset");
            self.phase = SwitchPhase::Idle;
            return Err(err.into());
        }

        self.replace_dataset(scene, target)
    }

    fn replace_dataset<S: SceneBackend>(
        &mut self,
        scene: &mut S,
        directory: &Path,
    ) -> Result<(), SwitchError<S::Error>> {
        self.phase = SwitchPhase::TearingDownOld;
        self.engine.teardown(scene);
        self.store = None;
        self.dims.invalidate();

        self.phase = SwitchPhase::LoadingNew;
        let store = match FrameStore::load(directory) {
            Ok(store) => store,
            Err(err) => {
                self.enter_no_dataset_state();
                return Err(err.into());
            }
        };

        self.phase = SwitchPhase::RebuildingSlices;
        if let Err(err) = self.engine.rebuild(scene, &store) {
            self.enter_no_dataset_state();
            return Err(err.into());
        }

        self.store = Some(store);
        self.dims.invalidate();
        let dims = self.dims();
        self.state = ViewState::for_dataset(&dims);
        scene.set_focal_point(self.state.camera.focal());

        self.phase = SwitchPhase::Idle;
        info!(
            directory = %directory.display(),
            frames = dims.frame_count,
            ?dims.dims,
            "dataset loaded"
        );
        Ok(())
    }

    /// Explicit "no dataset loaded" state after a failure mid-switch:
    /// placeholder dimensions, default view, nothing bound in the scene.
    fn enter_no_dataset_state(&mut self) {
        debug!("entering no-dataset state");
        self.store = None;
        self.dims.invalidate();
        self.state = ViewState::for_dataset(&DatasetDims::EMPTY);
        self.phase = SwitchPhase::Idle;
    }
}
