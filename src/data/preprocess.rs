// ============================================================
// Layer 4 — Image Preprocessing Pipeline
// ============================================================
// Turns a decoded image into the CHW float tensor a network
// expects.
//
// A pipeline is an ordered list of transforms:
//
//   image stage    Resize / CenterCrop / Grayscale
//       │
//       ▼
//   ToTensor       RGB u8 [H, W, 3] → f32 [3, H, W] in [0, 1]
//       │
//       ▼
//   tensor stage   Normalize (per-channel (x - mean) / std)
//
// The default pipeline is the ImageNet one every torchvision
// backbone is trained with:
//   Resize(224, 224) → ToTensor → Normalize(ImageNet mean/std)
//
// Any Preprocess implementation can replace it: a Compose
// built from the JSON config, or a plain closure wrapped in
// PreprocessFn.
//
// Reference: image crate documentation
//            Burn Book §3 (Tensor)

use burn::prelude::*;
use image::{imageops::FilterType, DynamicImage};
use serde::{Deserialize, Serialize};

use crate::error::ModelError;

pub const DEFAULT_INPUT_SIZE: u32 = 224;
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const IMAGENET_STD:  [f32; 3] = [0.229, 0.224, 0.225];

/// One step of a preprocessing pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Transform {
    /// Resize to exactly width × height (bilinear)
    Resize { width: u32, height: u32 },

    /// Crop the central width × height region, clamped to the image
    CenterCrop { width: u32, height: u32 },

    /// Convert to luma, keeping three identical channels
    Grayscale,

    ToTensor,

    Normalize { mean: [f32; 3], std: [f32; 3] },
}

impl Transform {
    fn is_image_op(&self) -> bool {
        matches!(
            self,
            Transform::Resize { .. } | Transform::CenterCrop { .. } | Transform::Grayscale
        )
    }
}

/// Host-side result of a pipeline: CHW data plus its shape
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    pub data:  Vec<f32>,
    pub shape: [usize; 3],
}

/// Anything that can turn an image into a [3, H, W] tensor
pub trait Preprocess<B: Backend> {
    fn apply(&self, image: &DynamicImage, device: &B::Device) -> Result<Tensor<B, 3>, ModelError>;
}

/// Adapter so a closure can be used as a preprocessing step
pub struct PreprocessFn<F>(F);

impl<F> PreprocessFn<F> {
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<B, F> Preprocess<B> for PreprocessFn<F>
where
    B: Backend,
    F: Fn(&DynamicImage, &B::Device) -> Result<Tensor<B, 3>, ModelError>,
{
    fn apply(&self, image: &DynamicImage, device: &B::Device) -> Result<Tensor<B, 3>, ModelError> {
        (self.0)(image, device)
    }
}

/// A validated, ordered list of transforms
#[derive(Debug, Clone, PartialEq)]
pub struct Compose {
    transforms: Vec<Transform>,
}

impl Compose {
    /// Validate and build a pipeline.
    ///
    /// Rules:
    ///   - exactly one ToTensor
    ///   - every image transform comes before it
    ///   - every Normalize comes after it
    pub fn new(transforms: Vec<Transform>) -> Result<Self, ModelError> {
        let to_tensor: Vec<usize> = transforms
            .iter()
            .enumerate()
            .filter(|(_, t)| matches!(t, Transform::ToTensor))
            .map(|(i, _)| i)
            .collect();

        let split = match to_tensor.as_slice() {
            [i] => *i,
            [] => return Err(ModelError::InvalidPipeline("missing ToTensor step".into())),
            _  => return Err(ModelError::InvalidPipeline("more than one ToTensor step".into())),
        };

        for (i, t) in transforms.iter().enumerate() {
            if t.is_image_op() && i > split {
                return Err(ModelError::InvalidPipeline(format!(
                    "{t:?} at position {i} must come before ToTensor"
                )));
            }
            match t {
                Transform::Normalize { std, mean } => {
                    if i < split {
                        return Err(ModelError::InvalidPipeline(format!(
                            "Normalize at position {i} must come after ToTensor"
                        )));
                    }
                    if std.iter().any(|s| !(*s > 0.0)) || mean.iter().any(|m| !m.is_finite()) {
                        return Err(ModelError::InvalidPipeline(format!(
                            "Normalize needs finite mean and positive std, got mean={mean:?} std={std:?}"
                        )));
                    }
                }
                Transform::Resize { width, height } | Transform::CenterCrop { width, height }
                    if *width == 0 || *height == 0 =>
                {
                    return Err(ModelError::InvalidPipeline(format!(
                        "{t:?} has a zero dimension"
                    )));
                }
                _ => {}
            }
        }

        Ok(Self { transforms })
    }

    /// Resize(224, 224) → ToTensor → Normalize(ImageNet)
    pub fn imagenet_default() -> Self {
        Self {
            transforms: vec![
                Transform::Resize { width: DEFAULT_INPUT_SIZE, height: DEFAULT_INPUT_SIZE },
                Transform::ToTensor,
                Transform::Normalize { mean: IMAGENET_MEAN, std: IMAGENET_STD },
            ],
        }
    }

    pub fn transforms(&self) -> &[Transform] {
        &self.transforms
    }

    /// Run the pipeline on the host, without touching a device
    pub fn run(&self, image: &DynamicImage) -> Result<ImageTensor, ModelError> {
        let mut image  = image.clone();
        let mut tensor = None;

        for t in &self.transforms {
            match t {
                Transform::Resize { width, height } => {
                    image = image.resize_exact(*width, *height, FilterType::Triangle);
                }
                Transform::CenterCrop { width, height } => {
                    image = center_crop(&image, *width, *height);
                }
                Transform::Grayscale => {
                    image = DynamicImage::ImageRgb8(DynamicImage::ImageLuma8(image.to_luma8()).to_rgb8());
                }
                Transform::ToTensor => {
                    tensor = Some(to_chw(&image));
                }
                Transform::Normalize { mean, std } => {
                    if let Some(t) = tensor.as_mut() {
                        normalize(t, mean, std);
                    }
                }
            }
        }

        tensor.ok_or_else(|| ModelError::InvalidPipeline("missing ToTensor step".into()))
    }
}

impl<B: Backend> Preprocess<B> for Compose {
    fn apply(&self, image: &DynamicImage, device: &B::Device) -> Result<Tensor<B, 3>, ModelError> {
        let ImageTensor { data, shape } = self.run(image)?;
        Ok(Tensor::from_data(TensorData::new(data, shape), device))
    }
}

fn center_crop(image: &DynamicImage, width: u32, height: u32) -> DynamicImage {
    let w = width.min(image.width());
    let h = height.min(image.height());
    let x = (image.width() - w) / 2;
    let y = (image.height() - h) / 2;
    image.crop_imm(x, y, w, h)
}

/// RGB u8 HWC → f32 CHW scaled to [0, 1]
fn to_chw(image: &DynamicImage) -> ImageTensor {
    let rgb = image.to_rgb8();
    let (w, h) = (rgb.width() as usize, rgb.height() as usize);
    let plane  = w * h;

    let mut data = vec![0.0f32; 3 * plane];
    for (x, y, pixel) in rgb.enumerate_pixels() {
        let offset = y as usize * w + x as usize;
        for c in 0..3 {
            data[c * plane + offset] = pixel[c] as f32 / 255.0;
        }
    }

    ImageTensor { data, shape: [3, h, w] }
}

fn normalize(tensor: &mut ImageTensor, mean: &[f32; 3], std: &[f32; 3]) {
    let plane = tensor.shape[1] * tensor.shape[2];
    for (c, channel) in tensor.data.chunks_mut(plane).enumerate().take(3) {
        for v in channel.iter_mut() {
            *v = (*v - mean[c]) / std[c];
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    type TestBackend = burn::backend::NdArray;

    fn solid(width: u32, height: u32, rgb: [u8; 3]) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(rgb)))
    }

    #[test]
    fn test_default_pipeline_shape() {
        let out = Compose::imagenet_default().run(&solid(100, 60, [10, 20, 30])).unwrap();
        assert_eq!(out.shape, [3, 224, 224]);
        assert_eq!(out.data.len(), 3 * 224 * 224);
    }

    #[test]
    fn test_default_pipeline_normalizes_per_channel() {
        let out   = Compose::imagenet_default().run(&solid(31, 47, [255, 255, 255])).unwrap();
        let plane = 224 * 224;
        for c in 0..3 {
            let expected = (1.0 - IMAGENET_MEAN[c]) / IMAGENET_STD[c];
            assert!((out.data[c * plane] - expected).abs() < 1e-5);
            assert!((out.data[c * plane + plane - 1] - expected).abs() < 1e-5);
        }
    }

    #[test]
    fn test_default_pipeline_to_burn_tensor() {
        let device = Default::default();
        let tensor: Tensor<TestBackend, 3> =
            Compose::imagenet_default().apply(&solid(300, 200, [0, 128, 255]), &device).unwrap();
        assert_eq!(tensor.dims(), [3, 224, 224]);
    }

    #[test]
    fn test_to_tensor_scales_to_unit_range() {
        let pipeline = Compose::new(vec![Transform::ToTensor]).unwrap();
        let out = pipeline.run(&solid(2, 2, [0, 255, 51])).unwrap();
        assert_eq!(out.shape, [3, 2, 2]);
        assert_eq!(&out.data[0..4], &[0.0; 4]);
        assert_eq!(&out.data[4..8], &[1.0; 4]);
        assert!((out.data[8] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_center_crop_is_clamped() {
        let pipeline = Compose::new(vec![
            Transform::CenterCrop { width: 4, height: 100 },
            Transform::ToTensor,
        ])
        .unwrap();
        let out = pipeline.run(&solid(10, 6, [1, 2, 3])).unwrap();
        assert_eq!(out.shape, [3, 6, 4]);
    }

    #[test]
    fn test_grayscale_keeps_three_equal_channels() {
        let pipeline = Compose::new(vec![Transform::Grayscale, Transform::ToTensor]).unwrap();
        let out = pipeline.run(&solid(1, 1, [200, 40, 90])).unwrap();
        assert_eq!(out.shape, [3, 1, 1]);
        assert_eq!(out.data[0], out.data[1]);
        assert_eq!(out.data[1], out.data[2]);
    }

    #[test]
    fn test_normalize_before_to_tensor_is_rejected() {
        let err = Compose::new(vec![
            Transform::Normalize { mean: IMAGENET_MEAN, std: IMAGENET_STD },
            Transform::ToTensor,
        ])
        .unwrap_err();
        assert!(matches!(err, ModelError::InvalidPipeline(_)));
    }

    #[test]
    fn test_resize_after_to_tensor_is_rejected() {
        let err = Compose::new(vec![
            Transform::ToTensor,
            Transform::Resize { width: 8, height: 8 },
        ]);
        assert!(err.is_err());
    }

    #[test]
    fn test_missing_to_tensor_is_rejected() {
        assert!(Compose::new(vec![Transform::Resize { width: 8, height: 8 }]).is_err());
    }

    #[test]
    fn test_zero_std_is_rejected() {
        let err = Compose::new(vec![
            Transform::ToTensor,
            Transform::Normalize { mean: [0.5; 3], std: [0.5, 0.0, 0.5] },
        ]);
        assert!(err.is_err());
    }

    #[test]
    fn test_closure_preprocess() {
        let device = Default::default();
        let pre = PreprocessFn::new(
            |_: &DynamicImage, device: &<TestBackend as Backend>::Device| -> Result<Tensor<TestBackend, 3>, ModelError> {
                Ok(Tensor::zeros([3, 8, 8], device))
            },
        );
        let tensor = Preprocess::<TestBackend>::apply(&pre, &solid(5, 5, [9, 9, 9]), &device).unwrap();
        assert_eq!(tensor.dims(), [3, 8, 8]);
    }

    #[test]
    fn test_transform_json_shape() {
        let json = serde_json::to_string(&Transform::Resize { width: 112, height: 112 }).unwrap();
        assert_eq!(json, r#"{"op":"resize","width":112,"height":112}"#);
    }
}
