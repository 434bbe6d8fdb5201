//! One-shot fit of a freshly attached accessory to the wearer's face.

use crate::{
    asset_manager::OverlayAsset,
    config::CalibrationConfig,
    constants::EPSILON,
    types::RenderAnchors,
};
use nalgebra::Vector3;

/// Calibration state of an overlay asset.
///
/// `Uncalibrated -> Calibrated` is the only transition; replacing the
/// accessory builds a new asset that starts over.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum CalibrationState {
    #[default]
    Uncalibrated,
    Calibrated {
        /// Factor multiplied into the asset's scale
        scale_factor: f64,
    },
}

impl CalibrationState {
    #[must_use]
    pub const fn is_calibrated(&self) -> bool {
        matches!(self, Self::Calibrated { .. })
    }
}

/// Fits accessories to the inter-ocular distance
#[derive(Debug, Clone, Default)]
pub struct CalibrationController {
    config: CalibrationConfig,
}

impl CalibrationController {
    #[must_use]
    pub const fn new(config: CalibrationConfig) -> Self {
        Self { config }
    }

    /// Scale factor that makes an asset of `asset_width` span the eyes with margin
    #[must_use]
    pub fn scale_factor(&self, eye_distance: f64, asset_width: f64) -> f64 {
        let width = if asset_width.is_finite() && asset_width > EPSILON {
            asset_width
        } else {
            1.0
        };
        eye_distance / width * self.config.margin
    }

    /// Calibrate `asset` against the current anchors.
    ///
    /// Returns `true` only on the call that performs the transition. Already
    /// calibrated assets, non-finite anchors and a zero eye distance leave the
    /// asset untouched.
    pub fn calibrate(&self, asset: &mut OverlayAsset, anchors: &RenderAnchors) -> bool {
        if asset.calibration.is_calibrated() || !anchors.is_finite() {
            return false;
        }

        let eye_distance = anchors.eye_distance();
        if !(eye_distance.is_finite() && eye_distance > EPSILON) {
            return false;
        }

        let scale_factor = self.scale_factor(eye_distance, asset.bounding_box_size.x);
        asset.node.transform.scale *= scale_factor;
        asset.node.transform.position = Vector3::new(0.0, self.config.offset_y, 0.0);
        asset.node.for_each_mesh_mut(&mut |mesh| mesh.material.make_opaque());
        asset.calibration = CalibrationState::Calibrated { scale_factor };

        log::info!(
            "Calibrated {} (eye distance {eye_distance:.1}, width {:.1}, factor {scale_factor:.3})",
            asset.name,
            asset.bounding_box_size.x
        );
        true
    }
}
