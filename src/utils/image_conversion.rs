//! Conversions between `image` buffers and `OpenCV` Mats.

use crate::{utils::safe_cast::f64_to_i32, Error, Result};
use image::{GrayImage, RgbImage};
use opencv::core::{Mat, Scalar, CV_8UC1, CV_8UC3};
use opencv::prelude::*;

fn dims(width: u32, height: u32) -> Result<(i32, i32)> {
    Ok((f64_to_i32(f64::from(height))?, f64_to_i32(f64::from(width))?))
}

/// Copy a grayscale image into a single-channel Mat
///
/// # Errors
/// * Returns error if the image is too large for Mat dimensions
/// * Returns error if Mat allocation fails
pub fn gray_image_to_mat(image: &GrayImage) -> Result<Mat> {
    let (rows, cols) = dims(image.width(), image.height())?;
    let mut mat = Mat::new_rows_cols_with_default(rows, cols, CV_8UC1, Scalar::all(0.0))?;
    mat.data_bytes_mut()?.copy_from_slice(image.as_raw());
    Ok(mat)
}

/// Copy an RGB image into a BGR Mat for drawing and display
///
/// # Errors
/// * Returns error if the image is too large for Mat dimensions
/// * Returns error if Mat allocation fails
pub fn rgb_image_to_bgr_mat(image: &RgbImage) -> Result<Mat> {
    let (rows, cols) = dims(image.width(), image.height())?;
    let mut mat = Mat::new_rows_cols_with_default(rows, cols, CV_8UC3, Scalar::all(0.0))?;
    let bytes = mat.data_bytes_mut()?;
    for (dst, src) in bytes.chunks_exact_mut(3).zip(image.as_raw().chunks_exact(3)) {
        dst[0] = src[2];
        dst[1] = src[1];
        dst[2] = src[0];
    }
    Ok(mat)
}

/// Convert a BGR camera Mat into an RGB image
///
/// # Errors
/// * Returns error if the Mat is empty or not 8-bit three-channel
/// * Returns error if Mat data cannot be accessed
#[allow(clippy::cast_sign_loss)] // Mat dimensions are checked positive
pub fn bgr_mat_to_rgb_image(mat: &Mat) -> Result<RgbImage> {
    let rows = mat.rows();
    let cols = mat.cols();
    if rows <= 0 || cols <= 0 {
        return Err(Error::InvalidInput(format!("Invalid Mat dimensions: {cols}x{rows}")));
    }
    if mat.typ() != CV_8UC3 {
        return Err(Error::InvalidInput(format!("Expected CV_8UC3 Mat, got type {}", mat.typ())));
    }

    let continuous;
    let source = if mat.is_continuous() {
        mat
    } else {
        continuous = mat.try_clone()?;
        &continuous
    };

    let mut data = source.data_bytes()?.to_vec();
    for pixel in data.chunks_exact_mut(3) {
        pixel.swap(0, 2);
    }

    RgbImage::from_raw(cols as u32, rows as u32, data)
        .ok_or_else(|| Error::InvalidInput("Mat data does not match its dimensions".to_string()))
}
