//! Data Augmentation Module
//!
//! Random geometric augmentation in the style of Keras' `ImageDataGenerator`:
//! one affine transform per image composed of rotation, shift, shear and zoom
//! about the image centre, sampled bilinearly, followed by an optional
//! horizontal flip. Pixel values are rescaled while converting to CHW floats.
//!
//! # Augmentation Strategy
//!
//! - **Training**: full random transform, then rescale
//! - **Validation/Prediction**: rescale only

use image::imageops::FilterType;
use image::{DynamicImage, RgbImage};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::utils::error::{HandSignError, Result};

/// How pixels that map outside the source image are filled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FillMode {
    /// Replicate the nearest edge pixel
    Nearest,
    /// Fill with black
    Constant,
}

/// Configuration for data augmentation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AugmentationConfig {
    /// Multiplier applied to raw 0-255 intensities
    pub rescale: f32,
    /// Maximum rotation in degrees (±)
    pub rotation_range: f32,
    /// Horizontal shift as a fraction of width (±)
    pub width_shift_range: f32,
    /// Vertical shift as a fraction of height (±)
    pub height_shift_range: f32,
    /// Shear angle in degrees (±)
    pub shear_range: f32,
    /// Zoom factors are drawn from [1 - zoom_range, 1 + zoom_range] per axis
    pub zoom_range: f32,
    /// Flip left-right with probability 0.5
    pub horizontal_flip: bool,
    pub fill_mode: FillMode,
}

impl Default for AugmentationConfig {
    fn default() -> Self {
        Self {
            rescale: 1.0 / 255.0,
            rotation_range: 40.0,
            width_shift_range: 0.2,
            height_shift_range: 0.2,
            shear_range: 0.2,
            zoom_range: 0.2,
            horizontal_flip: true,
            fill_mode: FillMode::Nearest,
        }
    }
}

impl AugmentationConfig {
    /// Rescale only; used for validation and prediction
    pub fn rescale_only() -> Self {
        Self {
            rotation_range: 0.0,
            width_shift_range: 0.0,
            height_shift_range: 0.0,
            shear_range: 0.0,
            zoom_range: 0.0,
            horizontal_flip: false,
            ..Self::default()
        }
    }

    /// Whether any random geometric transform is enabled
    pub fn is_geometric(&self) -> bool {
        self.rotation_range != 0.0
            || self.width_shift_range != 0.0
            || self.height_shift_range != 0.0
            || self.shear_range != 0.0
            || self.zoom_range != 0.0
            || self.horizontal_flip
    }

    pub fn validate(&self) -> Result<()> {
        let ranges = [
            ("rotation_range", self.rotation_range),
            ("width_shift_range", self.width_shift_range),
            ("height_shift_range", self.height_shift_range),
            ("shear_range", self.shear_range),
            ("zoom_range", self.zoom_range),
        ];
        if let Some((name, _)) = ranges.iter().find(|(_, v)| !(*v >= 0.0)) {
            return Err(HandSignError::Config(format!(
                "augmentation.{} must be non-negative",
                name
            )));
        }
        if self.zoom_range >= 1.0 {
            return Err(HandSignError::Config(
                "augmentation.zoom_range must be < 1.0".into(),
            ));
        }
        if !(self.rescale > 0.0) {
            return Err(HandSignError::Config(
                "augmentation.rescale must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Parameters of one sampled transform
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformParams {
    /// Rotation in radians
    pub theta: f32,
    /// Row shift in pixels
    pub tx: f32,
    /// Column shift in pixels
    pub ty: f32,
    /// Shear in radians
    pub shear: f32,
    /// Row zoom
    pub zx: f32,
    /// Column zoom
    pub zy: f32,
    pub flip_horizontal: bool,
}

impl TransformParams {
    pub fn identity() -> Self {
        Self {
            theta: 0.0,
            tx: 0.0,
            ty: 0.0,
            shear: 0.0,
            zx: 1.0,
            zy: 1.0,
            flip_horizontal: false,
        }
    }

    /// Map an output (row, col) to its source (row, col).
    ///
    /// Composition is rotation · shift · shear · zoom about the centre.
    fn source(&self, row: f32, col: f32, center: (f32, f32)) -> (f32, f32) {
        let (cr, cc) = center;
        let (r, c) = (row - cr, col - cc);

        // zoom
        let (r, c) = (r * self.zx, c * self.zy);
        // shear
        let (r, c) = (r - self.shear.sin() * c, self.shear.cos() * c);
        // shift
        let (r, c) = (r + self.tx, c + self.ty);
        // rotation
        let (sin, cos) = self.theta.sin_cos();
        let (r, c) = (cos * r - sin * c, sin * r + cos * c);

        (r + cr, c + cc)
    }
}

/// Image augmenter producing CHW float data
#[derive(Clone, Debug)]
pub struct Augmenter {
    config: AugmentationConfig,
    image_size: u32,
}

impl Augmenter {
    pub fn new(config: AugmentationConfig, image_size: u32) -> Self {
        Self { config, image_size }
    }

    /// Augmenter that only rescales
    pub fn rescale_only(image_size: u32) -> Self {
        Self::new(AugmentationConfig::rescale_only(), image_size)
    }

    pub fn config(&self) -> &AugmentationConfig {
        &self.config
    }

    pub fn image_size(&self) -> u32 {
        self.image_size
    }

    /// Resize to the target square with nearest-neighbour sampling
    pub fn resize(&self, img: &DynamicImage) -> RgbImage {
        img.resize_exact(self.image_size, self.image_size, FilterType::Nearest)
            .to_rgb8()
    }

    /// Draw random transform parameters for an image of `height` x `width`
    pub fn sample_params(&self, rng: &mut ChaCha8Rng, height: u32, width: u32) -> TransformParams {
        let cfg = &self.config;
        let mut params = TransformParams::identity();

        if cfg.rotation_range > 0.0 {
            params.theta = rng
                .gen_range(-cfg.rotation_range..=cfg.rotation_range)
                .to_radians();
        }
        if cfg.height_shift_range > 0.0 {
            params.tx = rng.gen_range(-cfg.height_shift_range..=cfg.height_shift_range)
                * height as f32;
        }
        if cfg.width_shift_range > 0.0 {
            params.ty =
                rng.gen_range(-cfg.width_shift_range..=cfg.width_shift_range) * width as f32;
        }
        if cfg.shear_range > 0.0 {
            params.shear = rng
                .gen_range(-cfg.shear_range..=cfg.shear_range)
                .to_radians();
        }
        if cfg.zoom_range > 0.0 {
            let (lo, hi) = (1.0 - cfg.zoom_range, 1.0 + cfg.zoom_range);
            params.zx = rng.gen_range(lo..=hi);
            params.zy = rng.gen_range(lo..=hi);
        }
        if cfg.horizontal_flip {
            params.flip_horizontal = rng.gen::<f32>() < 0.5;
        }

        params
    }

    /// Random transform then rescale, as CHW floats
    pub fn augment(&self, img: &RgbImage, rng: &mut ChaCha8Rng) -> Vec<f32> {
        if !self.config.is_geometric() {
            return self.to_tensor_data(img);
        }
        let (width, height) = img.dimensions();
        let params = self.sample_params(rng, height, width);
        self.apply(img, &params)
    }

    /// Apply a fixed transform then rescale, as CHW floats
    pub fn apply(&self, img: &RgbImage, params: &TransformParams) -> Vec<f32> {
        let (width, height) = img.dimensions();
        let (w, h) = (width as usize, height as usize);
        let plane = w * h;
        let center = ((height as f32 - 1.0) / 2.0, (width as f32 - 1.0) / 2.0);
        let mut data = vec![0.0f32; 3 * plane];

        for row in 0..h {
            for col in 0..w {
                let (sr, sc) = params.source(row as f32, col as f32, center);
                let pixel = self.sample(img, sr, sc);
                let out_col = if params.flip_horizontal { w - 1 - col } else { col };
                for (c, value) in pixel.iter().enumerate() {
                    data[c * plane + row * w + out_col] = value * self.config.rescale;
                }
            }
        }

        data
    }

    /// Bilinear sample at (row, col) honouring the fill mode
    fn sample(&self, img: &RgbImage, row: f32, col: f32) -> [f32; 3] {
        let (width, height) = img.dimensions();
        let max_r = height as f32 - 1.0;
        let max_c = width as f32 - 1.0;

        let (row, col) = match self.config.fill_mode {
            FillMode::Nearest => (row.clamp(0.0, max_r), col.clamp(0.0, max_c)),
            FillMode::Constant => {
                if row < 0.0 || col < 0.0 || row > max_r || col > max_c {
                    return [0.0; 3];
                }
                (row, col)
            }
        };

        let r0 = row.floor() as u32;
        let c0 = col.floor() as u32;
        let r1 = (r0 + 1).min(height - 1);
        let c1 = (c0 + 1).min(width - 1);
        let fr = row - r0 as f32;
        let fc = col - c0 as f32;

        let p00 = img.get_pixel(c0, r0);
        let p01 = img.get_pixel(c1, r0);
        let p10 = img.get_pixel(c0, r1);
        let p11 = img.get_pixel(c1, r1);

        let mut out = [0.0f32; 3];
        for (c, v) in out.iter_mut().enumerate() {
            *v = p00[c] as f32 * (1.0 - fr) * (1.0 - fc)
                + p01[c] as f32 * (1.0 - fr) * fc
                + p10[c] as f32 * fr * (1.0 - fc)
                + p11[c] as f32 * fr * fc;
        }
        out
    }

    /// Rescale only, as CHW floats
    pub fn to_tensor_data(&self, img: &RgbImage) -> Vec<f32> {
        let (width, height) = img.dimensions();
        let mut data = Vec::with_capacity(3 * height as usize * width as usize);

        for c in 0..3 {
            for y in 0..height {
                for x in 0..width {
                    data.push(img.get_pixel(x, y)[c] as f32 * self.config.rescale);
                }
            }
        }

        data
    }
}
