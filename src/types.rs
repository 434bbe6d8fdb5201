//! Shared value types: points, anchor sets, frames and viewport sizes.

use image::RgbImage;
use std::time::Instant;

/// A point in a detector's native pixel space
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RawPoint {
    pub x: f64,
    pub y: f64,
    /// Relative depth proxy, when the detector provides one
    pub z: Option<f64>,
}

impl RawPoint {
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y, z: None }
    }

    #[must_use]
    pub const fn with_depth(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z: Some(z) }
    }
}

/// A point in render (viewport pixel) space
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RenderPoint {
    pub x: f64,
    pub y: f64,
    pub z: Option<f64>,
}

impl RenderPoint {
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y, z: None }
    }

    /// Euclidean distance in the image plane
    #[must_use]
    pub fn distance_to(&self, other: &Self) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }

    /// Midpoint in the image plane; depth is averaged when both sides carry it
    #[must_use]
    pub fn midpoint(&self, other: &Self) -> Self {
        Self {
            x: (self.x + other.x) / 2.0,
            y: (self.y + other.y) / 2.0,
            z: match (self.z, other.z) {
                (Some(a), Some(b)) => Some((a + b) / 2.0),
                _ => None,
            },
        }
    }
}

/// Anything with planar coordinates that can be checked for finiteness
pub trait PlanarPoint {
    fn x(&self) -> f64;
    fn y(&self) -> f64;
    fn depth(&self) -> Option<f64>;

    fn is_finite(&self) -> bool {
        self.x().is_finite() && self.y().is_finite() && self.depth().map_or(true, f64::is_finite)
    }
}

impl PlanarPoint for RawPoint {
    fn x(&self) -> f64 {
        self.x
    }
    fn y(&self) -> f64 {
        self.y
    }
    fn depth(&self) -> Option<f64> {
        self.z
    }
}

impl PlanarPoint for RenderPoint {
    fn x(&self) -> f64 {
        self.x
    }
    fn y(&self) -> f64 {
        self.y
    }
    fn depth(&self) -> Option<f64> {
        self.z
    }
}

/// The named landmarks consumed by the pose estimator.
///
/// Eyes are named from the image's point of view, before mirroring. Ear
/// anchors are only needed for scale recovery.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnchorSet<P> {
    pub left_eye: P,
    pub right_eye: P,
    pub nose: P,
    pub left_ear: Option<P>,
    pub right_ear: Option<P>,
}

/// Anchors as reported by a detector backend
pub type RawAnchors = AnchorSet<RawPoint>;

/// Anchors after coordinate mapping
pub type RenderAnchors = AnchorSet<RenderPoint>;

impl<P> AnchorSet<P> {
    /// Anchor set without ear points
    pub fn new(left_eye: P, right_eye: P, nose: P) -> Self {
        Self {
            left_eye,
            right_eye,
            nose,
            left_ear: None,
            right_ear: None,
        }
    }

    #[must_use]
    pub fn with_ears(mut self, left_ear: P, right_ear: P) -> Self {
        self.left_ear = Some(left_ear);
        self.right_ear = Some(right_ear);
        self
    }

    /// Transform every anchor, producing a new set
    pub fn map<Q>(&self, mut f: impl FnMut(&P) -> Q) -> AnchorSet<Q> {
        AnchorSet {
            left_eye: f(&self.left_eye),
            right_eye: f(&self.right_eye),
            nose: f(&self.nose),
            left_ear: self.left_ear.as_ref().map(&mut f),
            right_ear: self.right_ear.as_ref().map(&mut f),
        }
    }

    /// Both ear anchors, if present
    pub fn ears(&self) -> Option<(&P, &P)> {
        self.left_ear.as_ref().zip(self.right_ear.as_ref())
    }
}

impl<P: PlanarPoint> AnchorSet<P> {
    /// True when every present anchor has finite coordinates
    pub fn is_finite(&self) -> bool {
        self.left_eye.is_finite()
            && self.right_eye.is_finite()
            && self.nose.is_finite()
            && self.left_ear.as_ref().map_or(true, PlanarPoint::is_finite)
            && self.right_ear.as_ref().map_or(true, PlanarPoint::is_finite)
    }
}

impl RenderAnchors {
    /// Midpoint between the eyes
    #[must_use]
    pub fn eye_center(&self) -> RenderPoint {
        self.left_eye.midpoint(&self.right_eye)
    }

    /// Inter-ocular distance in render pixels
    #[must_use]
    pub fn eye_distance(&self) -> f64 {
        self.left_eye.distance_to(&self.right_eye)
    }
}

/// Axis-aligned rectangle in pixel coordinates (detector boxes)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoxRegion {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoxRegion {
    #[must_use]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    #[must_use]
    pub fn center(&self) -> RawPoint {
        RawPoint::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    #[must_use]
    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// The same box shifted by the origin of an enclosing region
    #[must_use]
    pub fn offset_by(&self, origin: &Self) -> Self {
        Self::new(self.x + origin.x, self.y + origin.y, self.width, self.height)
    }
}

/// Source video frame size in pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoSize {
    pub width: f64,
    pub height: f64,
}

impl VideoSize {
    #[must_use]
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Render target size in pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    #[must_use]
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Render-space pixel to world coordinates of the orthographic scene
    /// (origin at the viewport center, y up)
    #[must_use]
    pub fn to_world(&self, x: f64, y: f64) -> (f64, f64) {
        (x - self.width / 2.0, -(y - self.height / 2.0))
    }

    /// World coordinates back to render-space pixels
    #[must_use]
    pub fn to_pixel(&self, world_x: f64, world_y: f64) -> (f64, f64) {
        (world_x + self.width / 2.0, self.height / 2.0 - world_y)
    }
}

/// A camera frame handed to detector backends
#[derive(Debug, Clone)]
pub struct Frame {
    pub image: RgbImage,
    /// Monotonic frame counter assigned by the frame source
    pub index: u64,
    pub captured_at: Instant,
}

impl Frame {
    #[must_use]
    pub fn new(image: RgbImage, index: u64) -> Self {
        Self {
            image,
            index,
            captured_at: Instant::now(),
        }
    }

    #[must_use]
    pub fn size(&self) -> VideoSize {
        VideoSize::new(f64::from(self.image.width()), f64::from(self.image.height()))
    }
}
