//! Rendering backends.
//!
//! The scene is orthographic with the origin at the viewport center and y up,
//! so projecting a world point is just [`Viewport::to_pixel`]. Renderers draw
//! the mirrored video and the screen-space bounds of every visible overlay
//! mesh.

use crate::{
    asset_manager::{AssetRole, OverlayAssetManager},
    coordinate_mapping::CoordinateMapper,
    pose_estimation::FacialPose,
    scene::Material,
    status::Status,
    types::{BoxRegion, Frame, Viewport},
    Result,
};
use std::collections::VecDeque;

/// User input surfaced by a renderer
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RenderCommand {
    /// Select the accessory at this catalog position (0-based)
    SelectAccessory(usize),
    ClearAccessory,
    Resize(Viewport),
    Exit,
}

/// Everything a renderer needs for one frame
pub struct RenderFrame<'a> {
    pub viewport: Viewport,
    /// Latest camera frame, if any arrived yet
    pub video: Option<&'a Frame>,
    pub mapper: Option<&'a CoordinateMapper>,
    pub assets: &'a OverlayAssetManager,
    pub pose: Option<&'a FacialPose>,
    pub status: &'a Status,
}

/// A mesh bound projected to viewport pixels
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectedMesh {
    pub role: AssetRole,
    pub name: String,
    pub rect: BoxRegion,
    pub material: Material,
}

/// Project the visible overlay meshes into viewport pixels
#[must_use]
pub fn project_overlay(assets: &OverlayAssetManager, viewport: Viewport) -> Vec<ProjectedMesh> {
    let mut projected = Vec::new();
    assets.for_each_visible_mesh(&mut |role, mesh, world| {
        let bounds = mesh.bounds.transformed(world);
        let (left, top) = viewport.to_pixel(bounds.min.x, bounds.max.y);
        let (right, bottom) = viewport.to_pixel(bounds.max.x, bounds.min.y);
        projected.push(ProjectedMesh {
            role,
            name: mesh.name.clone(),
            rect: BoxRegion::new(left, top, right - left, bottom - top),
            material: mesh.material,
        });
    });
    projected
}

/// A display backend driven by the render loop
pub trait Renderer {
    /// Adapt to a new viewport.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot resize its surface.
    fn resize(&mut self, viewport: Viewport) -> Result<()>;

    /// Draw one frame.
    ///
    /// # Errors
    ///
    /// Returns an error if presenting fails; the render loop logs it and goes on.
    fn render(&mut self, frame: &RenderFrame<'_>) -> Result<()>;

    /// Next pending user command, if any
    fn poll_command(&mut self) -> Option<RenderCommand>;
}

/// Summary of the last frame drawn by [`HeadlessRenderer`]
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedFrame {
    pub video_index: Option<u64>,
    pub root_visible: bool,
    pub meshes: Vec<ProjectedMesh>,
    pub status: String,
}

/// Renderer without a display; keeps a summary of what it would draw
#[derive(Debug, Default)]
pub struct HeadlessRenderer {
    viewport: Option<Viewport>,
    frames_rendered: u64,
    last: Option<RenderedFrame>,
    commands: VecDeque<RenderCommand>,
}

impl HeadlessRenderer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a command as if the user had issued it
    pub fn push_command(&mut self, command: RenderCommand) {
        self.commands.push_back(command);
    }

    #[must_use]
    pub const fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    #[must_use]
    pub const fn last_frame(&self) -> Option<&RenderedFrame> {
        self.last.as_ref()
    }

    #[must_use]
    pub const fn viewport(&self) -> Option<Viewport> {
        self.viewport
    }
}

impl Renderer for HeadlessRenderer {
    fn resize(&mut self, viewport: Viewport) -> Result<()> {
        self.viewport = Some(viewport);
        Ok(())
    }

    fn render(&mut self, frame: &RenderFrame<'_>) -> Result<()> {
        self.frames_rendered += 1;
        self.last = Some(RenderedFrame {
            video_index: frame.video.map(|f| f.index),
            root_visible: frame.assets.root().visible,
            meshes: project_overlay(frame.assets, frame.viewport),
            status: frame.status.to_string(),
        });
        Ok(())
    }

    fn poll_command(&mut self) -> Option<RenderCommand> {
        self.commands.pop_front()
    }
}

#[cfg(feature = "opencv")]
pub use window::WindowRenderer;

#[cfg(feature = "opencv")]
mod window {
    use super::{project_overlay, RenderCommand, RenderFrame, Renderer};
    use crate::{
        asset_manager::AssetRole,
        types::Viewport,
        utils::{
            image_conversion::rgb_image_to_bgr_mat,
            safe_cast::{f64_to_i32, f64_to_i32_clamp},
        },
        Result,
    };
    use opencv::{
        core::{self, Mat, Point, Rect, Scalar, Size, CV_8UC3},
        highgui::{self, WINDOW_NORMAL},
        imgproc::{self, FONT_HERSHEY_SIMPLEX, LINE_8},
        prelude::*,
    };

    const KEY_ESCAPE: i32 = 27;

    /// `OpenCV` highgui window
    pub struct WindowRenderer {
        title: String,
        viewport: Viewport,
        pending: Option<RenderCommand>,
    }

    impl WindowRenderer {
        /// Create the window.
        ///
        /// # Errors
        ///
        /// Returns an error if highgui cannot create a window.
        pub fn new(title: &str, viewport: Viewport) -> Result<Self> {
            highgui::named_window(title, WINDOW_NORMAL)?;
            highgui::resize_window(title, f64_to_i32(viewport.width)?, f64_to_i32(viewport.height)?)?;
            Ok(Self {
                title: title.to_string(),
                viewport,
                pending: None,
            })
        }

        fn canvas_size(&self) -> Result<Size> {
            Ok(Size::new(f64_to_i32(self.viewport.width)?, f64_to_i32(self.viewport.height)?))
        }

        /// Mirror and aspect-fill the camera frame onto the canvas
        fn draw_video(&self, frame: &RenderFrame<'_>) -> Result<Mat> {
            let size = self.canvas_size()?;
            let (Some(video), Some(mapper)) = (frame.video, frame.mapper) else {
                return Ok(Mat::zeros(size.height, size.width, CV_8UC3)?.to_mat()?);
            };

            let bgr = rgb_image_to_bgr_mat(&video.image)?;
            let (display_width, display_height) = mapper.display_size();
            let mut scaled = Mat::default();
            imgproc::resize(
                &bgr,
                &mut scaled,
                Size::new(f64_to_i32(display_width.round())?, f64_to_i32(display_height.round())?),
                0.0,
                0.0,
                imgproc::INTER_LINEAR,
            )?;
            let mut mirrored = Mat::default();
            core::flip(&scaled, &mut mirrored, 1)?;

            let (offset_x, offset_y) = mapper.offset();
            let crop = Rect::new(
                f64_to_i32_clamp(-offset_x, 0, mirrored.cols() - 1),
                f64_to_i32_clamp(-offset_y, 0, mirrored.rows() - 1),
                size.width.min(mirrored.cols()),
                size.height.min(mirrored.rows()),
            );
            Ok(Mat::roi(&mirrored, crop)?.try_clone()?)
        }
    }

    impl Renderer for WindowRenderer {
        fn resize(&mut self, viewport: Viewport) -> Result<()> {
            self.viewport = viewport;
            Ok(())
        }

        fn render(&mut self, frame: &RenderFrame<'_>) -> Result<()> {
            let mut canvas = self.draw_video(frame)?;

            for mesh in project_overlay(frame.assets, frame.viewport) {
                // The head proxy only occludes; nothing to draw at zero opacity
                if mesh.role == AssetRole::HeadProxy && mesh.material.opacity <= 0.0 {
                    continue;
                }
                let [r, g, b] = mesh.material.color.unwrap_or([0, 255, 0]);
                let rect = Rect::new(
                    f64_to_i32_clamp(mesh.rect.x, -10_000, 10_000),
                    f64_to_i32_clamp(mesh.rect.y, -10_000, 10_000),
                    f64_to_i32_clamp(mesh.rect.width, 0, 10_000),
                    f64_to_i32_clamp(mesh.rect.height, 0, 10_000),
                );
                imgproc::rectangle(
                    &mut canvas,
                    rect,
                    Scalar::new(f64::from(b), f64::from(g), f64::from(r), 0.0),
                    2,
                    LINE_8,
                    0,
                )?;
            }

            if let Some(pose) = frame.pose {
                let pose_text = format!(
                    "Yaw: {:.1} Pitch: {:.1} Roll: {:.1} Scale: {:.2}",
                    pose.rotation.yaw.to_degrees(),
                    pose.rotation.pitch.to_degrees(),
                    pose.rotation.roll.to_degrees(),
                    pose.scale
                );
                imgproc::put_text(
                    &mut canvas,
                    &pose_text,
                    Point::new(10, 60),
                    FONT_HERSHEY_SIMPLEX,
                    0.5,
                    Scalar::new(0.0, 255.0, 255.0, 0.0),
                    1,
                    LINE_8,
                    false,
                )?;
            }

            imgproc::put_text(
                &mut canvas,
                &frame.status.to_string(),
                Point::new(10, 30),
                FONT_HERSHEY_SIMPLEX,
                0.7,
                Scalar::new(0.0, 255.0, 0.0, 0.0),
                2,
                LINE_8,
                false,
            )?;

            highgui::imshow(&self.title, &canvas)?;

            let key = highgui::wait_key(1)?;
            self.pending = match key {
                KEY_ESCAPE => Some(RenderCommand::Exit),
                k if k == i32::from(b'q') => Some(RenderCommand::Exit),
                k if k == i32::from(b'0') => Some(RenderCommand::ClearAccessory),
                k if (i32::from(b'1')..=i32::from(b'9')).contains(&k) => {
                    usize::try_from(k - i32::from(b'1')).ok().map(RenderCommand::SelectAccessory)
                }
                _ => self.pending.take(),
            };

            let rect = highgui::get_window_image_rect(&self.title)?;
            if rect.width > 0 && rect.height > 0 {
                let viewport = Viewport::new(f64::from(rect.width), f64::from(rect.height));
                if viewport != self.viewport && self.pending.is_none() {
                    self.pending = Some(RenderCommand::Resize(viewport));
                }
            }
            Ok(())
        }

        fn poll_command(&mut self) -> Option<RenderCommand> {
            self.pending.take()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        asset_manager::{AssetLoader, OverlayAssetManager},
        scene::{Aabb, Mesh, SceneNode},
    };
    use nalgebra::Vector3;
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;

    struct OneBox;

    impl AssetLoader for OneBox {
        fn load(&self, _source: &Path) -> Result<SceneNode> {
            Ok(SceneNode::new("glasses").with_mesh(Mesh::new("frame", Aabb::centered(Vector3::new(100.0, 40.0, 10.0)))))
        }
    }

    #[test]
    fn test_projection_follows_root() {
        let mut assets = OverlayAssetManager::new(Arc::new(OneBox), 0.0);
        assets.replace_accessory("Classic", "glasses");
        assets.poll_timeout(Duration::from_secs(5));

        let viewport = Viewport::new(1280.0, 720.0);
        let projected = project_overlay(&assets, viewport);
        assert_eq!(projected.len(), 1);
        assert_eq!(projected[0].rect, BoxRegion::new(590.0, 340.0, 100.0, 40.0));

        assets.root_mut().transform.position = Vector3::new(100.0, 50.0, 0.0);
        assets.root_mut().transform.scale = Vector3::repeat(2.0);
        let projected = project_overlay(&assets, viewport);
        assert_eq!(projected[0].rect, BoxRegion::new(640.0, 270.0, 200.0, 80.0));

        assets.root_mut().visible = false;
        assert!(project_overlay(&assets, viewport).is_empty());
    }

    #[test]
    fn test_headless_records_frames_and_commands() {
        let assets = OverlayAssetManager::new(Arc::new(OneBox), 0.0);
        let mut renderer = HeadlessRenderer::new();
        renderer.push_command(RenderCommand::SelectAccessory(1));

        let status = Status::NoFaceDetected;
        let viewport = Viewport::new(640.0, 480.0);
        renderer.resize(viewport).unwrap();
        renderer
            .render(&RenderFrame {
                viewport,
                video: None,
                mapper: None,
                assets: &assets,
                pose: None,
                status: &status,
            })
            .unwrap();

        assert_eq!(renderer.frames_rendered(), 1);
        let last = renderer.last_frame().unwrap();
        assert_eq!(last.status, "No face detected");
        assert!(last.meshes.is_empty());
        assert_eq!(renderer.poll_command(), Some(RenderCommand::SelectAccessory(1)));
        assert_eq!(renderer.poll_command(), None);
    }
}
