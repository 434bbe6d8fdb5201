//! Detector-space to render-space coordinate mapping.
//!
//! The video is shown mirrored and aspect-filled: scaled so it covers the whole
//! viewport, with the overflow cropped equally on both sides.

use crate::types::{AnchorSet, RawPoint, RenderPoint, VideoSize, Viewport};

/// Map a single detector-space point into render space.
///
/// Pure: NaN inputs come out as NaN.
#[must_use]
pub fn map_to_render_space(
    raw: &RawPoint,
    video_width: f64,
    video_height: f64,
    render_width: f64,
    render_height: f64,
) -> RenderPoint {
    CoordinateMapper::new(
        VideoSize::new(video_width, video_height),
        Viewport::new(render_width, render_height),
    )
    .map_point(raw)
}

/// Aspect-fill factors for one (video, viewport) pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateMapper {
    video: VideoSize,
    viewport: Viewport,
    display_width: f64,
    display_height: f64,
    offset_x: f64,
    offset_y: f64,
}

impl CoordinateMapper {
    #[must_use]
    pub fn new(video: VideoSize, viewport: Viewport) -> Self {
        let scale = (viewport.width / video.width).max(viewport.height / video.height);
        let display_width = video.width * scale;
        let display_height = video.height * scale;
        Self {
            video,
            viewport,
            display_width,
            display_height,
            offset_x: (viewport.width - display_width) / 2.0,
            offset_y: (viewport.height - display_height) / 2.0,
        }
    }

    /// Rebuild for a new viewport, keeping the video size
    #[must_use]
    pub fn resized(&self, viewport: Viewport) -> Self {
        Self::new(self.video, viewport)
    }

    #[must_use]
    pub const fn video(&self) -> VideoSize {
        self.video
    }

    #[must_use]
    pub const fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Size of the scaled video, at least as large as the viewport on both axes
    #[must_use]
    pub const fn display_size(&self) -> (f64, f64) {
        (self.display_width, self.display_height)
    }

    /// Top-left corner of the scaled video relative to the viewport (non-positive)
    #[must_use]
    pub const fn offset(&self) -> (f64, f64) {
        (self.offset_x, self.offset_y)
    }

    #[must_use]
    pub fn map_point(&self, raw: &RawPoint) -> RenderPoint {
        let nx = raw.x / self.video.width;
        let ny = raw.y / self.video.height;
        RenderPoint {
            x: self.offset_x + (1.0 - nx) * self.display_width,
            y: self.offset_y + ny * self.display_height,
            z: raw.z,
        }
    }

    #[must_use]
    pub fn map_anchors(&self, anchors: &AnchorSet<RawPoint>) -> AnchorSet<RenderPoint> {
        anchors.map(|p| self.map_point(p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_center_maps_to_center() {
        let cases = [
            (640.0, 480.0, 1280.0, 720.0),
            (640.0, 480.0, 480.0, 640.0),
            (1920.0, 1080.0, 800.0, 800.0),
            (640.0, 480.0, 640.0, 480.0),
        ];
        for (vw, vh, rw, rh) in cases {
            let p = map_to_render_space(&RawPoint::new(vw / 2.0, vh / 2.0), vw, vh, rw, rh);
            assert!((p.x - rw / 2.0).abs() < 1e-9, "x for {vw}x{vh} -> {rw}x{rh}");
            assert!((p.y - rh / 2.0).abs() < 1e-9, "y for {vw}x{vh} -> {rw}x{rh}");
        }
    }

    #[test]
    fn test_aspect_fill_crops_vertically() {
        let mapper = CoordinateMapper::new(VideoSize::new(640.0, 480.0), Viewport::new(1280.0, 720.0));
        assert_eq!(mapper.display_size(), (1280.0, 960.0));
        assert_eq!(mapper.offset(), (0.0, -120.0));
    }

    #[test]
    fn test_mirroring() {
        let p = map_to_render_space(&RawPoint::new(0.0, 0.0), 640.0, 480.0, 640.0, 480.0);
        assert_eq!((p.x, p.y), (640.0, 0.0));
        let p = map_to_render_space(&RawPoint::new(640.0, 480.0), 640.0, 480.0, 640.0, 480.0);
        assert_eq!((p.x, p.y), (0.0, 480.0));
    }

    #[test]
    fn test_depth_passes_through() {
        let p = map_to_render_space(&RawPoint::with_depth(10.0, 10.0, -0.04), 640.0, 480.0, 320.0, 240.0);
        assert_eq!(p.z, Some(-0.04));
    }

    #[test]
    fn test_nan_propagates() {
        let p = map_to_render_space(&RawPoint::new(f64::NAN, 10.0), 640.0, 480.0, 1280.0, 720.0);
        assert!(p.x.is_nan());
        assert!(p.y.is_finite());
    }

    #[test]
    fn test_resize_recomputes_factors() {
        let mapper = CoordinateMapper::new(VideoSize::new(640.0, 480.0), Viewport::new(640.0, 480.0));
        let resized = mapper.resized(Viewport::new(1280.0, 720.0));
        assert_eq!(resized.offset(), (0.0, -120.0));
        assert_eq!(resized.video(), mapper.video());
    }
}
