//! Out-of-core storage for one dataset's magnetization frames.
//!
//! A dataset directory holds one NPY file per saved timestep, its stem
//! ending in a zero-padded 6-digit frame index (`m000042.npy`). Loading
//! only reads headers; a frame's payload is memory-mapped read-only on
//! first access, so datasets far larger than memory stay browsable.

use std::{
    fs,
    path::{Path, PathBuf},
};

use memmap2::Mmap;
use ndarray::{ArrayView3, ArrayView4, Axis};
use once_cell::sync::OnceCell;
use thiserror::Error;
use tracing::debug;

use crate::{
    formats::npy,
    geom::{Dim3D, Vec3U},
};

pub const FRAME_INDEX_DIGITS: usize = 6;
pub const FRAME_EXTENSION: &str = "npy";

/// Number of vector components per cell (mx, my, mz).
const COMPONENTS: usize = 3;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("failed to read dataset directory {path}: {source}")]
    Directory {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("no frame files (*.npy with a 6-digit index) in {0}")]
    NoFrames(PathBuf),
    #[error("duplicate frame index {0}")]
    DuplicateIndex(usize),
    #[error("non-contiguous frame indices: expected {expected}, found {found}")]
    NonContiguousIndices { expected: usize, found: usize },
    #[error("{path}: {source}")]
    Npy { path: PathBuf, source: npy::Error },
    #[error("{path}: payload must be shaped (3, depth, height, width), got {shape:?}")]
    BadShape { path: PathBuf, shape: Vec<usize> },
    #[error(
        "frame {index} has shape {found:?}, expected {expected:?}; \
         all frames of a dataset must share frame 0's shape"
    )]
    ShapeMismatch {
        index: usize,
        expected: Vec<usize>,
        found: Vec<usize>,
    },
    #[error("cannot append to an empty store (no base index to extend from)")]
    AppendToEmpty,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("frame index {index} out of range (frame count {count})")]
pub struct FrameIndexError {
    pub index: usize,
    pub count: usize,
}

#[derive(Error, Debug)]
pub enum PayloadError {
    #[error("failed to map {path}: {source}")]
    Map {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{path}: payload is truncated (need {expected} bytes, file holds {actual})")]
    Truncated {
        path: PathBuf,
        expected: usize,
        actual: usize,
    },
    #[error("{path}: payload bytes are not a valid f32 slice")]
    Cast { path: PathBuf },
    #[error("{path}: payload does not match its header shape: {source}")]
    Shape {
        path: PathBuf,
        source: ndarray::ShapeError,
    },
}

/// One timestep's vector-field volume. Immutable once loaded; the payload
/// is mapped on first access and only ever exposed as read-only views.
#[derive(Debug)]
pub struct Frame {
    index: usize,
    path: PathBuf,
    header: npy::Header,
    map: OnceCell<Mmap>,
}

impl Frame {
    /// Index within the store's timeline, not the digits in the file name.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `(depth, height, width)` of each component volume.
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.header.shape[1], self.header.shape[2], self.header.shape[3])
    }

    /// Volume extents as `(x, y, z)` = `(width, height, depth)`.
    pub fn dimensions(&self) -> Vec3U {
        let (d, h, w) = self.shape();
        Vec3U::new(w as u32, h as u32, d as u32)
    }

    /// Full `(3, depth, height, width)` view of the mapped payload.
    pub fn view(&self) -> Result<ArrayView4<'_, f32>, PayloadError> {
        let map = self.map.get_or_try_init(|| {
            let file = fs::File::open(&self.path).map_err(|source| PayloadError::Map {
                path: self.path.clone(),
                source,
            })?;
            // Read-only map. The dataset directory is treated as immutable
            // while a store is loaded; files must not be rewritten in place.
            unsafe { Mmap::map(&file) }.map_err(|source| PayloadError::Map {
                path: self.path.clone(),
                source,
            })
        })?;

        let end = self.header.data_offset + self.header.len_bytes();
        let bytes = map
            .get(self.header.data_offset..end)
            .ok_or_else(|| PayloadError::Truncated {
                path: self.path.clone(),
                expected: end,
                actual: map.len(),
            })?;
        let floats: &[f32] = bytemuck::try_cast_slice(bytes).map_err(|_| PayloadError::Cast {
            path: self.path.clone(),
        })?;

        let (d, h, w) = self.shape();
        ArrayView4::from_shape((COMPONENTS, d, h, w), floats).map_err(|source| {
            PayloadError::Shape {
                path: self.path.clone(),
                source,
            }
        })
    }

    /// One magnetization component over the volume.
    pub fn component(&self, c: Dim3D) -> Result<ArrayView3<'_, f32>, PayloadError> {
        Ok(self.view()?.index_axis_move(Axis(0), c as usize))
    }
}

/// Ordered collection of all frames in one dataset directory.
#[derive(Debug)]
pub struct FrameStore {
    directory: PathBuf,
    frames: Vec<Frame>,
}

impl FrameStore {
    /// Enumerates frame files, sorts by embedded index, and validates the
    /// contiguity and shape-homogeneity invariants. Payloads are not read.
    pub fn load(directory: impl Into<PathBuf>) -> Result<Self, LoadError> {
        let directory = directory.into();

        let entries = fs::read_dir(&directory).map_err(|source| LoadError::Directory {
            path: directory.clone(),
            source,
        })?;

        let mut indexed: Vec<(usize, PathBuf)> = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| LoadError::Directory {
                path: directory.clone(),
                source,
            })?;
            let path = entry.path();
            match frame_index_of(&path) {
                Some(index) => indexed.push((index, path)),
                None => debug!(path = %path.display(), "ignoring non-frame file"),
            }
        }
        indexed.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

        if indexed.is_empty() {
            return Err(LoadError::NoFrames(directory));
        }
        for (expected, &(found, _)) in indexed.iter().enumerate() {
            if found != expected {
                return Err(if expected > 0 && found == indexed[expected - 1].0 {
                    LoadError::DuplicateIndex(found)
                } else {
                    LoadError::NonContiguousIndices { expected, found }
                });
            }
        }

        let mut frames: Vec<Frame> = Vec::with_capacity(indexed.len());
        for (index, path) in indexed {
            let frame = open_frame(index, path)?;
            if let Some(first) = frames.first() {
                if frame.header.shape != first.header.shape {
                    return Err(LoadError::ShapeMismatch {
                        index,
                        expected: first.header.shape.clone(),
                        found: frame.header.shape,
                    });
                }
            }
            frames.push(frame);
        }

        debug!(
            directory = %directory.display(),
            frames = frames.len(),
            "loaded frame store"
        );
        Ok(Self { directory, frames })
    }

    /// A store with no frames yet; frames arrive via [`FrameStore::append`]
    /// only after at least one exists from `load`.
    pub fn empty(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            frames: Vec::new(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Volume extents read from frame 0; `None` for an empty store.
    pub fn dimensions(&self) -> Option<Vec3U> {
        self.frames.first().map(Frame::dimensions)
    }

    pub fn get_frame(&self, index: usize) -> Result<&Frame, FrameIndexError> {
        self.frames.get(index).ok_or(FrameIndexError {
            index,
            count: self.frames.len(),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Frame> {
        self.frames.iter()
    }

    /// Streams one new frame file into the store. The new frame's index is
    /// the current maximum plus one; digits in the file name are ignored.
    pub fn append(&mut self, path: impl Into<PathBuf>) -> Result<usize, LoadError> {
        let Some(last) = self.frames.last() else {
            return Err(LoadError::AppendToEmpty);
        };
        let index = last.index + 1;

        let frame = open_frame(index, path.into())?;
        let expected = &self.frames[0].header.shape;
        if &frame.header.shape != expected {
            return Err(LoadError::ShapeMismatch {
                index,
                expected: expected.clone(),
                found: frame.header.shape,
            });
        }

        debug!(index, path = %frame.path.display(), "appended frame");
        self.frames.push(frame);
        Ok(index)
    }
}

fn open_frame(index: usize, path: PathBuf) -> Result<Frame, LoadError> {
    let header = npy::Header::read_from_file(&path).map_err(|source| LoadError::Npy {
        path: path.clone(),
        source,
    })?;
    if header.shape.len() != 4
        || header.shape[0] != COMPONENTS
        || header.shape[1..].iter().any(|&d| d == 0)
    {
        return Err(LoadError::BadShape {
            path,
            shape: header.shape,
        });
    }
    Ok(Frame {
        index,
        path,
        header,
        map: OnceCell::new(),
    })
}

/// Extracts the frame index from a path if it follows the dataset naming
/// convention: a `.npy` extension and a stem ending in 6 ASCII digits.
fn frame_index_of(path: &Path) -> Option<usize> {
    let ext = path.extension()?.to_str()?;
    if !ext.eq_ignore_ascii_case(FRAME_EXTENSION) {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    let bytes = stem.as_bytes();
    if bytes.len() < FRAME_INDEX_DIGITS {
        return None;
    }
    let digits = &bytes[bytes.len() - FRAME_INDEX_DIGITS..];
    if !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(digits).ok()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use std::{fs::File, io::BufWriter};

    use tempfile::TempDir;

    use super::*;
    use crate::formats::npy;

    /// Writes a frame file whose every element is `fill`.
    fn write_frame(dir: &Path, name: &str, (d, h, w): (usize, usize, usize), fill: f32) {
        let data = vec![fill; 3 * d * h * w];
        let file = File::create(dir.join(name)).unwrap();
        npy::write_f4(BufWriter::new(file), &[3, d, h, w], &data).unwrap();
    }

    fn dataset(frames: &[usize], shape: (usize, usize, usize)) -> TempDir {
        let dir = TempDir::new().unwrap();
        for &i in frames {
            write_frame(dir.path(), &format!("m{i:06}.npy"), shape, i as f32);
        }
        dir
    }

    #[test]
    fn loads_sorted_and_contiguous() {
        let dir = dataset(&[0, 1, 2], (2, 3, 4));
        std::fs::write(dir.path().join("table.txt"), "# t (s)\n").unwrap();
        std::fs::write(dir.path().join("m12.npy"), "too short").unwrap();

        let store = FrameStore::load(dir.path()).unwrap();
        assert_eq!(store.frame_count(), 3);
        // (3, depth=2, height=3, width=4) -> (x=4, y=3, z=2)
        assert_eq!(store.dimensions(), Some(Vec3U::new(4, 3, 2)));
        for (i, frame) in store.iter().enumerate() {
            assert_eq!(frame.index(), i);
        }
    }

    #[test]
    fn frame_shapes_match_dimensions() {
        let dir = dataset(&[0, 1, 2], (4, 4, 4));
        let store = FrameStore::load(dir.path()).unwrap();

        for i in 0..store.frame_count() {
            let frame = store.get_frame(i).unwrap();
            assert_eq!(frame.dimensions(), store.dimensions().unwrap());
            let mx = frame.component(Dim3D::X).unwrap();
            assert_eq!(mx.dim(), (4, 4, 4));
        }
    }

    #[test]
    fn payload_is_readable_per_frame() {
        let dir = dataset(&[0, 1, 2], (2, 2, 2));
        let store = FrameStore::load(dir.path()).unwrap();

        let frame = store.get_frame(2).unwrap();
        let mz = frame.component(Dim3D::Z).unwrap();
        assert_eq!(mz[[0, 0, 0]], 2.0);
        assert!(mz.iter().all(|&v| v == 2.0));
    }

    #[test]
    fn gap_in_indices_is_an_error() {
        let dir = dataset(&[0, 1, 3], (2, 2, 2));
        let err = FrameStore::load(dir.path()).unwrap_err();
        assert!(matches!(
            err,
            LoadError::NonContiguousIndices {
                expected: 2,
                found: 3
            }
        ));
    }

    #[test]
    fn duplicate_index_is_an_error() {
        let dir = dataset(&[0, 1], (2, 2, 2));
        write_frame(dir.path(), "x000001.npy", (2, 2, 2), 9.0);
        let err = FrameStore::load(dir.path()).unwrap_err();
        assert!(matches!(err, LoadError::DuplicateIndex(1)));
    }

    #[test]
    fn must_start_at_zero() {
        let dir = dataset(&[1, 2], (2, 2, 2));
        let err = FrameStore::load(dir.path()).unwrap_err();
        assert!(matches!(
            err,
            LoadError::NonContiguousIndices {
                expected: 0,
                found: 1
            }
        ));
    }

    #[test]
    fn empty_directory_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            FrameStore::load(dir.path()),
            Err(LoadError::NoFrames(_))
        ));
    }

    #[test]
    fn heterogeneous_shapes_are_an_error() {
        let dir = dataset(&[0, 1], (2, 2, 2));
        write_frame(dir.path(), "m000002.npy", (2, 2, 3), 2.0);
        let err = FrameStore::load(dir.path()).unwrap_err();
        assert!(matches!(err, LoadError::ShapeMismatch { index: 2, .. }));
    }

    #[test]
    fn rejects_non_vector_payload() {
        let dir = TempDir::new().unwrap();
        let data = vec![0.0; 2 * 2 * 2];
        let file = File::create(dir.path().join("m000000.npy")).unwrap();
        npy::write_f4(BufWriter::new(file), &[2, 2, 2], &data).unwrap();

        let err = FrameStore::load(dir.path()).unwrap_err();
        assert!(matches!(err, LoadError::BadShape { .. }));
    }

    #[test]
    fn get_frame_out_of_range() {
        let dir = dataset(&[0, 1, 2], (2, 2, 2));
        let store = FrameStore::load(dir.path()).unwrap();
        let err = store.get_frame(3).unwrap_err();
        assert_eq!(err, FrameIndexError { index: 3, count: 3 });
    }

    #[test]
    fn append_extends_from_max_index() {
        let dir = dataset(&[0, 1, 2, 3, 4, 5], (2, 2, 2));
        let mut store = FrameStore::load(dir.path()).unwrap();

        // The digits in an appended file's name do not pick its index.
        write_frame(dir.path(), "m000099.npy", (2, 2, 2), 99.0);
        let index = store.append(dir.path().join("m000099.npy")).unwrap();
        assert_eq!(index, 6);
        assert_eq!(store.frame_count(), 7);
        assert_eq!(store.get_frame(6).unwrap().index(), 6);
    }

    #[test]
    fn append_rejects_shape_mismatch() {
        let dir = dataset(&[0], (2, 2, 2));
        let mut store = FrameStore::load(dir.path()).unwrap();
        write_frame(dir.path(), "m000001.npy", (2, 2, 3), 1.0);
        // Loaded before the mismatched file existed, so append is the only
        // path that sees it.
        let err = store.append(dir.path().join("m000001.npy")).unwrap_err();
        assert!(matches!(err, LoadError::ShapeMismatch { index: 1, .. }));
    }

    #[test]
    fn append_to_empty_is_an_error() {
        let dir = TempDir::new().unwrap();
        write_frame(dir.path(), "m000000.npy", (2, 2, 2), 0.0);
        let mut store = FrameStore::empty(dir.path());
        let err = store.append(dir.path().join("m000000.npy")).unwrap_err();
        assert!(matches!(err, LoadError::AppendToEmpty));
        assert_eq!(store.frame_count(), 0);
        assert_eq!(store.dimensions(), None);
    }

    #[test]
    fn frame_naming_convention() {
        assert_eq!(frame_index_of(Path::new("m000042.npy")), Some(42));
        assert_eq!(frame_index_of(Path::new("steps10Oe000007.npy")), Some(7));
        assert_eq!(frame_index_of(Path::new("000123.NPY")), Some(123));
        assert_eq!(frame_index_of(Path::new("m42.npy")), None);
        assert_eq!(frame_index_of(Path::new("m000042.txt")), None);
        assert_eq!(frame_index_of(Path::new("table.txt")), None);
        assert_eq!(frame_index_of(Path::new("m00004x.npy")), None);
    }
}
