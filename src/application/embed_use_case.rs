// ============================================================
// Layer 2 — EmbedUseCase
// ============================================================
// Runs a benchmarked model over a set of images:
//
//   Step 1: Build the model from ModelConfig     (Layer 5 - ml)
//   Step 2: Load the images                      (Layer 4 - data)
//   Step 3: Embed them batch_size at a time      (Layer 5 - ml)
//   Step 4: Write an EmbeddingReport as JSON     (this layer)
//
// Also answers "how similar are these two faces?" by embedding
// both images and taking the cosine similarity.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

use crate::data::{loader::load_single_image, preprocess::Compose};
use crate::domain::{
    embedding::Embedding,
    traits::{Embedder, ImageSource},
};
use crate::infra::config::ModelConfig;
use crate::ml::{
    base_model::{BaseModel, ModelOptions},
    device::{select_placement, InferBackend},
    vgg::Vgg,
};

/// The VGG family on the compiled-in backend
pub type VggModel = BaseModel<InferBackend, Vgg<InferBackend>>;

/// Model metadata written at the top of every report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportHeader {
    pub model:          String,
    pub num_identities: Option<usize>,
    pub extract_layer:  Option<String>,
}

/// One image's embedding as written to disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub source: String,
    pub dim:    usize,
    pub norm:   f32,
    pub vector: Vec<f32>,
}

impl From<Embedding> for EmbeddingRecord {
    fn from(e: Embedding) -> Self {
        Self { dim: e.dim(), norm: e.norm(), source: e.source, vector: e.vector }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingReport {
    #[serde(flatten)]
    pub header:     ReportHeader,
    pub embeddings: Vec<EmbeddingRecord>,
}

impl EmbeddingReport {
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
            .with_context(|| format!("Cannot write embeddings to '{}'", path.display()))?;
        tracing::info!("Wrote {} embeddings to '{}'", self.embeddings.len(), path.display());
        Ok(())
    }
}

pub struct EmbedUseCase<E: Embedder> {
    embedder:   E,
    header:     ReportHeader,
    batch_size: usize,
}

impl EmbedUseCase<VggModel> {
    /// Build the configured VGG model on the compiled-in backend
    pub fn from_config(config: &ModelConfig) -> Result<Self> {
        let mut options = ModelOptions::new(config.name.clone());
        if let Some(path) = &config.weights_path {
            options = options.with_weights(path);
        }
        if let Some(layer) = &config.extract_layer {
            options = options.with_extract_layer(layer.clone());
        }
        if let Some(transforms) = &config.preprocess {
            options = options.with_preprocess(Compose::new(transforms.clone())?);
        }

        let model = VggModel::new(
            options,
            &config.architecture.vgg_config(),
            select_placement(config.gpus),
        )
        .with_context(|| format!("Cannot build model '{}'", config.name))?;

        let header = ReportHeader {
            model:          model.name().to_string(),
            num_identities: model.num_identities(),
            extract_layer:  model.extract_layer().map(str::to_string),
        };
        Ok(Self::new(model, header, config.batch_size))
    }
}

impl<E: Embedder> EmbedUseCase<E> {
    pub fn new(embedder: E, header: ReportHeader, batch_size: usize) -> Self {
        Self { embedder, header, batch_size: batch_size.max(1) }
    }

    pub fn embedder(&self) -> &E {
        &self.embedder
    }

    /// Embed every image the source provides
    pub fn execute(&mut self, source: &dyn ImageSource) -> Result<EmbeddingReport> {
        let images = source.load_all()?;
        tracing::info!("Embedding {} images in batches of {}", images.len(), self.batch_size);

        let mut embeddings = Vec::with_capacity(images.len());
        for (i, batch) in images.chunks(self.batch_size).enumerate() {
            let out = self.embedder.embed_batch(batch)?;
            tracing::debug!("Batch {}: {} embeddings", i + 1, out.len());
            embeddings.extend(out.into_iter().map(EmbeddingRecord::from));
        }

        Ok(EmbeddingReport { header: self.header.clone(), embeddings })
    }

    /// Cosine similarity between the embeddings of two image files
    pub fn compare(&mut self, a: &Path, b: &Path) -> Result<f32> {
        let a = self.embedder.embed(&load_single_image(a)?)?;
        let b = self.embedder.embed(&load_single_image(b)?)?;
        let similarity = a.cosine_similarity(&b);
        tracing::debug!("{} vs {}: {:.4}", a.source, b.source, similarity);
        Ok(similarity)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::traits::LabeledImage;
    use image::{DynamicImage, Rgb, RgbImage};

    /// Embeds an image as its mean RGB value
    struct MeanColour;

    impl Embedder for MeanColour {
        fn embed_batch(&mut self, images: &[LabeledImage]) -> Result<Vec<Embedding>> {
            Ok(images
                .iter()
                .map(|l| {
                    let rgb = l.image.to_rgb8();
                    let n   = (rgb.width() * rgb.height()) as f32;
                    let mut sum = [0.0f32; 3];
                    for p in rgb.pixels() {
                        for c in 0..3 {
                            sum[c] += p[c] as f32;
                        }
                    }
                    Embedding::new(l.source.clone(), sum.iter().map(|s| s / n).collect())
                })
                .collect())
        }
    }

    struct FixedSource(Vec<LabeledImage>);

    impl ImageSource for FixedSource {
        fn load_all(&self) -> Result<Vec<LabeledImage>> {
            Ok(self.0.clone())
        }
    }

    fn solid(rgb: [u8; 3]) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(3, 3, Rgb(rgb)))
    }

    fn header() -> ReportHeader {
        ReportHeader { model: "mean".into(), num_identities: None, extract_layer: None }
    }

    #[test]
    fn test_execute_batches_everything_in_order() {
        let source = FixedSource(
            (0..5u8)
                .map(|i| LabeledImage::new(format!("{i}.png"), solid([i * 10, 0, 0])))
                .collect(),
        );
        let mut use_case = EmbedUseCase::new(MeanColour, header(), 2);
        let report = use_case.execute(&source).unwrap();

        assert_eq!(report.embeddings.len(), 5);
        assert_eq!(report.embeddings[4].source, "4.png");
        assert_eq!(report.embeddings[4].vector, vec![40.0, 0.0, 0.0]);
        assert_eq!(report.embeddings[4].dim, 3);
    }

    #[test]
    fn test_report_json_layout() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");

        let source = FixedSource(vec![LabeledImage::new("x.png", solid([3, 4, 0]))]);
        let report = EmbedUseCase::new(MeanColour, header(), 8).execute(&source).unwrap();
        report.save(&path).unwrap();

        let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["model"], "mean");
        assert_eq!(json["embeddings"][0]["source"], "x.png");
        assert_eq!(json["embeddings"][0]["norm"], 5.0);
    }

    #[test]
    fn test_compare_files() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.png");
        let b = dir.path().join("b.png");
        let c = dir.path().join("c.png");
        RgbImage::from_pixel(2, 2, Rgb([100, 0, 0])).save(&a).unwrap();
        RgbImage::from_pixel(2, 2, Rgb([50, 0, 0])).save(&b).unwrap();
        RgbImage::from_pixel(2, 2, Rgb([0, 70, 0])).save(&c).unwrap();

        let mut use_case = EmbedUseCase::new(MeanColour, header(), 1);
        assert!((use_case.compare(&a, &b).unwrap() - 1.0).abs() < 1e-6);
        assert!(use_case.compare(&a, &c).unwrap().abs() < 1e-6);
    }

    #[test]
    fn test_compare_missing_file_errors() {
        let mut use_case = EmbedUseCase::new(MeanColour, header(), 1);
        assert!(use_case.compare(Path::new("nope.png"), Path::new("nope2.png")).is_err());
    }
}
