use std::ops::{Index, IndexMut};

use derive_more::{Add, Constructor, Sub};
use serde::{Deserialize, Serialize};

/// Spatial axis of a volume. Also indexes the three magnetization
/// components, which are aligned with the spatial axes.
#[repr(u8)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum Dim3D {
    X = 0,
    Y = 1,
    Z = 2,
}

impl Dim3D {
    pub fn iter() -> impl Iterator<Item = Dim3D> {
        [Dim3D::X, Dim3D::Y, Dim3D::Z].into_iter()
    }
}

#[derive(
    Add, Sub, Constructor, Default, PartialEq, Eq, Debug, Copy, Clone, Hash, Serialize, Deserialize,
)]
pub struct Vec3<T> {
    pub x: T,
    pub y: T,
    pub z: T,
}

pub type Vec3U = Vec3<u32>;
pub type Vec3F = Vec3<f32>;

impl Vec3U {
    pub const ZERO: Vec3U = Vec3U { x: 0, y: 0, z: 0 };
    pub const ONE: Vec3U = Vec3U { x: 1, y: 1, z: 1 };

    pub fn as_f32(&self) -> Vec3F {
        Vec3F::new(self.x as f32, self.y as f32, self.z as f32)
    }

    /// Geometric center of a volume with these extents.
    pub fn center(&self) -> Vec3F {
        Vec3F::new(
            self.x as f32 / 2.0,
            self.y as f32 / 2.0,
            self.z as f32 / 2.0,
        )
    }
}

impl<T> From<(T, T, T)> for Vec3<T> {
    fn from((x, y, z): (T, T, T)) -> Self {
        Vec3 { x, y, z }
    }
}

impl<T> From<Vec3<T>> for (T, T, T) {
    fn from(v: Vec3<T>) -> Self {
        (v.x, v.y, v.z)
    }
}

impl<T> Vec3<T> {
    pub fn iter<'a>(&self) -> impl Iterator<Item = T> + 'a
    where
        T: Copy + 'a,
    {
        [self.x, self.y, self.z].into_iter()
    }

    pub fn enumerate<'a>(&self) -> impl Iterator<Item = (Dim3D, T)> + 'a
    where
        T: Copy + 'a,
    {
        Dim3D::iter().zip(self.iter())
    }
}

impl<T> Index<Dim3D> for Vec3<T> {
    type Output = T;

    fn index(&self, i: Dim3D) -> &T {
        match i {
            Dim3D::X => &self.x,
            Dim3D::Y => &self.y,
            Dim3D::Z => &self.z,
        }
    }
}

impl<T> IndexMut<Dim3D> for Vec3<T> {
    fn index_mut(&mut self, i: Dim3D) -> &mut T {
        match i {
            Dim3D::X => &mut self.x,
            Dim3D::Y => &mut self.y,
            Dim3D::Z => &mut self.z,
        }
    }
}
