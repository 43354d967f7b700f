use image::DynamicImage;
use image::imageops::FilterType;

use crate::domain::ResizeAlgorithm;
use crate::error::ShotScaleError;

// Bicubic resampling.
const FILTER: FilterType = FilterType::CatmullRom;

// Longest side kept before the cover resize, as a multiple of the shorter side.
const MAX_ASPECT: u32 = 16;

#[derive(Debug, Clone, Copy)]
pub struct ImageTransformer {
    algorithm: ResizeAlgorithm,
    size: u32,
}

impl ImageTransformer {
    pub fn new(algorithm: ResizeAlgorithm, size: u32) -> Result<Self, ShotScaleError> {
        if size == 0 {
            return Err(ShotScaleError::InvalidConfig(
                "output image size must be positive".to_string(),
            ));
        }
        Ok(Self { algorithm, size })
    }

    pub fn algorithm(&self) -> ResizeAlgorithm {
        self.algorithm
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn transform(&self, image: &DynamicImage) -> Result<DynamicImage, ShotScaleError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(ShotScaleError::TransformFailure(format!(
                "empty image {}x{}",
                image.width(),
                image.height()
            )));
        }
        Ok(match self.algorithm {
            ResizeAlgorithm::Cropped => self.cropped(image),
            ResizeAlgorithm::Rescale => image.resize_exact(self.size, self.size, FILTER),
        })
    }

    fn cropped(&self, image: &DynamicImage) -> DynamicImage {
        let image = trim_extreme_aspect(image);
        let (width, height) = cover_dimensions(image.width(), image.height(), self.size);
        let resized = image.resize_exact(width, height, FILTER);
        let left = (width - self.size) / 2;
        let top = (height - self.size) / 2;
        resized.crop_imm(left, top, self.size, self.size)
    }
}

/// Center window of a very thin frame; the final crop never reaches past it.
fn trim_extreme_aspect(image: &DynamicImage) -> DynamicImage {
    let (width, height) = (image.width(), image.height());
    let limit = width.min(height).saturating_mul(MAX_ASPECT);
    if width > limit {
        image.crop_imm((width - limit) / 2, 0, limit, height)
    } else if height > limit {
        image.crop_imm(0, (height - limit) / 2, width, limit)
    } else {
        image.clone()
    }
}

/// Dimensions after dividing both sides by `shorter / size`, never below `size`.
pub fn cover_dimensions(width: u32, height: u32, size: u32) -> (u32, u32) {
    let ratio = f64::from(width.min(height)) / f64::from(size);
    let scale = |side: u32| ((f64::from(side) / ratio).round() as u32).max(size);
    (scale(width), scale(height))
}
