//! Derived values with explicit invalidation.
//!
//! A [`Derived`] holds a value computed from upstream state. Upstream
//! writers call [`Derived::invalidate`]; readers recompute lazily on the
//! next get. This keeps slider-range reads cheap during continuous drags
//! while guaranteeing a recompute after a dataset switch.

use std::{cell::Cell, ops::RangeInclusive};

use mumax_toolbox_core::{
    geom::{Dim3D, Vec3F, Vec3U},
    store::FrameStore,
};

/// Dirty-flag cell for `Copy` values. The update model is single-threaded,
/// so a `Cell` suffices.
#[derive(Debug, Default)]
pub struct Derived<T: Copy> {
    value: Cell<Option<T>>,
}

impl<T: Copy> Derived<T> {
    pub fn empty() -> Self {
        Self {
            value: Cell::new(None),
        }
    }

    /// Marks the value dirty; the next get recomputes.
    pub fn invalidate(&self) {
        self.value.set(None);
    }

    pub fn get_or_compute(&self, f: impl FnOnce() -> T) -> T {
        match self.value.get() {
            Some(v) => v,
            None => {
                let v = f();
                self.value.set(Some(v));
                v
            }
        }
    }

    pub fn peek(&self) -> Option<T> {
        self.value.get()
    }
}

/// Extents and frame count of the active dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatasetDims {
    pub dims: Vec3U,
    pub frame_count: usize,
}

impl DatasetDims {
    /// Placeholder while no dataset is loaded, so dependent slider ranges
    /// stay well-formed.
    pub const EMPTY: DatasetDims = DatasetDims {
        dims: Vec3U::ONE,
        frame_count: 1,
    };

    pub fn of(store: &FrameStore) -> Self {
        match store.dimensions() {
            Some(dims) => Self {
                dims,
                frame_count: store.frame_count(),
            },
            None => Self::EMPTY,
        }
    }

    pub fn center(&self) -> Vec3F {
        self.dims.center()
    }

    /// Valid frame-slider positions.
    pub fn frame_range(&self) -> RangeInclusive<usize> {
        0..=self.frame_count.saturating_sub(1)
    }

    /// Valid offset-slider positions along `axis`.
    pub fn offset_range(&self, axis: Dim3D) -> RangeInclusive<f32> {
        0.0..=self.dims[axis] as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn computes_once_until_invalidated() {
        let cell: Derived<u32> = Derived::empty();
        let mut computes = 0;

        for _ in 0..3 {
            cell.get_or_compute(|| {
                computes += 1;
                7
            });
        }
        assert_eq!(computes, 1);

        cell.invalidate();
        assert_eq!(cell.peek(), None);
        assert_eq!(
            cell.get_or_compute(|| {
                computes += 1;
                9
            }),
            9
        );
        assert_eq!(computes, 2);
    }

    #[test]
    fn empty_dims_keep_ranges_well_formed() {
        let dims = DatasetDims::EMPTY;
        assert_eq!(dims.frame_range(), 0..=0);
        assert_eq!(dims.offset_range(Dim3D::X), 0.0..=1.0);
        assert_eq!(dims.center(), Vec3F::new(0.5, 0.5, 0.5));
    }
}
