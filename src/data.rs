//! Training corpus and sample-pixel types.
//!
//! A [`Corpus`] holds the full set of (depth, label) frame pairs training
//! operates on, together with the camera and label metadata discovered at
//! load time. Frame loading itself lives behind the [`CorpusLoader`] trait;
//! this crate only consumes the loaded arrays.

use half::f16;
use ndarray::{Array3, ArrayView2, Axis};
use std::path::Path;

/// Pixel types a depth image may carry.
///
/// Depth frames arrive from loaders as 16-bit floats, but inference is also
/// run on full-precision frames, so the feature kernel is generic over the
/// pixel width.
pub trait DepthPixel: Copy + Send + Sync + 'static {
    /// Depth value in meters.
    fn to_f32(self) -> f32;
}

impl DepthPixel for f16 {
    #[inline]
    fn to_f32(self) -> f32 {
        f32::from(self)
    }
}

impl DepthPixel for f32 {
    #[inline]
    fn to_f32(self) -> f32 {
        self
    }
}

/// A training sample: one pixel of one frame.
///
/// Every sample carries the frame it came from, and is owned by exactly one
/// pending tree node at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplePixel {
    pub x: u32,
    pub y: u32,
    /// Index of the frame this pixel belongs to.
    pub image: u32,
}

/// Errors raised while assembling or validating a corpus.
#[derive(Debug, thiserror::Error)]
pub enum CorpusError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("depth images are {depth:?} but label images are {labels:?}")]
    ShapeMismatch {
        depth: (usize, usize, usize),
        labels: (usize, usize, usize),
    },

    #[error("corpus has no frames")]
    Empty,

    #[error("label {label} in frame {frame} is bigger than expected (max {max})")]
    LabelOutOfRange { label: u8, frame: usize, max: u8 },

    #[error("frame {frame} has no in-body pixels")]
    EmptyFrame { frame: usize },

    #[error("{0}")]
    Loader(String),
}

/// An immutable set of (depth, label) frame pairs plus camera metadata.
///
/// Labels are `u8` values in `[0, n_labels)`; one value (`bg_label`) marks
/// the background, which is never learned. Pixels whose depth is at or
/// beyond `bg_depth` are likewise treated as out-of-body.
#[derive(Debug, Clone)]
pub struct Corpus {
    depth: Array3<f16>,
    labels: Array3<u8>,
    fov: f32,
    n_labels: u8,
    bg_label: u8,
    bg_depth: f32,
}

impl Corpus {
    /// Assemble a corpus from pre-loaded frame arrays.
    ///
    /// Both arrays are `(n_images, height, width)`, row-major. Every label
    /// value must be below `n_labels`; a violation here means corrupt input
    /// data and is reported as a load error rather than deferred to the
    /// training hot loops.
    pub fn from_parts(
        depth: Array3<f16>,
        labels: Array3<u8>,
        fov: f32,
        n_labels: u8,
        bg_label: u8,
        bg_depth: f32,
    ) -> Result<Self, CorpusError> {
        if depth.dim() != labels.dim() {
            return Err(CorpusError::ShapeMismatch {
                depth: depth.dim(),
                labels: labels.dim(),
            });
        }
        if depth.dim().0 == 0 {
            return Err(CorpusError::Empty);
        }
        for (frame, image) in labels.axis_iter(Axis(0)).enumerate() {
            if let Some(&label) = image.iter().find(|&&l| l >= n_labels) {
                return Err(CorpusError::LabelOutOfRange {
                    label,
                    frame,
                    max: n_labels - 1,
                });
            }
        }

        Ok(Self {
            depth,
            labels,
            fov,
            n_labels,
            bg_label,
            bg_depth,
        })
    }

    /// Number of frames.
    #[inline]
    pub fn n_images(&self) -> usize {
        self.depth.dim().0
    }

    /// Frame width in pixels.
    #[inline]
    pub fn width(&self) -> usize {
        self.depth.dim().2
    }

    /// Frame height in pixels.
    #[inline]
    pub fn height(&self) -> usize {
        self.depth.dim().1
    }

    /// Camera vertical field of view, radians.
    #[inline]
    pub fn fov(&self) -> f32 {
        self.fov
    }

    /// Number of distinct label values (background included).
    #[inline]
    pub fn n_labels(&self) -> u8 {
        self.n_labels
    }

    /// The label value reserved for the background.
    #[inline]
    pub fn bg_label(&self) -> u8 {
        self.bg_label
    }

    /// Depth at or beyond which a pixel counts as background.
    #[inline]
    pub fn bg_depth(&self) -> f32 {
        self.bg_depth
    }

    /// Pixels per meter at the image plane.
    ///
    /// Scales the configured uv range from meters into pixel units.
    #[inline]
    pub fn pixels_per_meter(&self) -> f32 {
        (self.height() as f32 / 2.0) / (self.fov / 2.0).tan()
    }

    /// Depth image of one frame, `(height, width)`.
    #[inline]
    pub fn depth_image(&self, image: usize) -> ArrayView2<'_, f16> {
        self.depth.index_axis(Axis(0), image)
    }

    /// Label image of one frame, `(height, width)`.
    #[inline]
    pub fn label_image(&self, image: usize) -> ArrayView2<'_, u8> {
        self.labels.index_axis(Axis(0), image)
    }

    /// Label at a sample pixel.
    #[inline]
    pub fn label_at(&self, pixel: SamplePixel) -> u8 {
        self.labels[(pixel.image as usize, pixel.y as usize, pixel.x as usize)]
    }

    /// Depth at a sample pixel, meters.
    #[inline]
    pub fn depth_at(&self, pixel: SamplePixel) -> f32 {
        self.depth[(pixel.image as usize, pixel.y as usize, pixel.x as usize)].to_f32()
    }
}

/// Source of training corpora.
///
/// Scanning a data directory and decoding frames is outside this crate;
/// callers supply an implementation that yields a ready [`Corpus`] for a
/// given index.
pub trait CorpusLoader {
    fn load(&self, data_dir: &Path, index_name: &str) -> Result<Corpus, CorpusError>;
}
