// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The application layer talks to these traits, not to the
// concrete loader or model types:
//
//   ImageSource → ImageLoader (directory of image files)
//   Embedder    → BaseModel   (any FaceModel architecture)
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use anyhow::Result;
use image::DynamicImage;

use crate::domain::embedding::Embedding;

/// An image together with the name it was loaded under
#[derive(Debug, Clone)]
pub struct LabeledImage {
    pub source: String,
    pub image:  DynamicImage,
}

impl LabeledImage {
    pub fn new(source: impl Into<String>, image: DynamicImage) -> Self {
        Self { source: source.into(), image }
    }
}

/// Any component that can supply images to embed
pub trait ImageSource {
    fn load_all(&self) -> Result<Vec<LabeledImage>>;
}

/// Any component that can turn images into embeddings.
///
/// Takes &mut self because running a model overwrites its
/// captured hook output.
pub trait Embedder {
    fn embed_batch(&mut self, images: &[LabeledImage]) -> Result<Vec<Embedding>>;

    fn embed(&mut self, image: &LabeledImage) -> Result<Embedding> {
        self.embed_batch(std::slice::from_ref(image))?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("model returned no embedding for '{}'", image.source))
    }
}
