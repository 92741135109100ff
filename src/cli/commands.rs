// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the four subcommands: `inspect`, `layers`, `embed`
// and `compare`, and all their configurable flags.
//
// Model flags can come from a JSON config (--config) and be
// overridden one by one on the command line.
//
// Reference: Rust Book §12 (Building a CLI Program)

use anyhow::Result;
use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::infra::config::{Architecture, ModelConfig};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Summarise a PyTorch checkpoint: nesting, identity count, key mapping
    Inspect(InspectArgs),

    /// List the layer names a forward hook can be registered on
    Layers(LayersArgs),

    /// Embed every image in a directory and write the results as JSON
    Embed(EmbedArgs),

    /// Print the cosine similarity between two images' embeddings
    Compare(CompareArgs),
}

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Checkpoint file (.pth / .pt)
    #[arg(long)]
    pub weights: PathBuf,

    /// Architecture used to translate checkpoint keys
    #[arg(long, value_enum, default_value = "vgg16")]
    pub arch: Architecture,
}

#[derive(Args, Debug)]
pub struct LayersArgs {
    #[arg(long, value_enum, default_value = "vgg16")]
    pub arch: Architecture,
}

/// Flags shared by every command that builds a model
#[derive(Args, Debug, Clone, Default)]
pub struct ModelArgs {
    /// JSON model config; the flags below override its fields
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Name reported alongside the embeddings
    #[arg(long)]
    pub name: Option<String>,

    #[arg(long, value_enum)]
    pub arch: Option<Architecture>,

    /// Pretrained checkpoint; without it the network is randomly initialised
    #[arg(long)]
    pub weights: Option<PathBuf>,

    /// Layer whose output becomes the embedding, e.g. classifier.3
    #[arg(long)]
    pub extract_layer: Option<String>,

    /// Number of discrete GPUs to split batches over
    #[arg(long)]
    pub gpus: Option<usize>,

    #[arg(long)]
    pub batch_size: Option<usize>,
}

/// Build the application-layer config from CLI flags.
/// The application layer never sees clap types.
impl TryFrom<ModelArgs> for ModelConfig {
    type Error = anyhow::Error;

    fn try_from(a: ModelArgs) -> Result<Self> {
        let mut cfg = match &a.config {
            Some(path) => ModelConfig::load(path)?,
            None       => ModelConfig::default(),
        };

        if let Some(arch) = a.arch {
            cfg.architecture = arch;
        }
        if let Some(name) = a.name {
            cfg.name = name;
        }
        if a.weights.is_some() {
            cfg.weights_path = a.weights;
        }
        if a.extract_layer.is_some() {
            cfg.extract_layer = a.extract_layer;
        }
        if let Some(gpus) = a.gpus {
            cfg.gpus = gpus;
        }
        if let Some(batch_size) = a.batch_size {
            cfg.batch_size = batch_size;
        }
        Ok(cfg)
    }
}

#[derive(Args, Debug)]
pub struct EmbedArgs {
    /// Directory of face images
    #[arg(long, default_value = "data/faces")]
    pub images_dir: String,

    /// Where to write the embedding report
    #[arg(long, default_value = "embeddings.json")]
    pub output: PathBuf,

    #[command(flatten)]
    pub model: ModelArgs,
}

#[derive(Args, Debug)]
pub struct CompareArgs {
    #[arg(long)]
    pub image_a: PathBuf,

    #[arg(long)]
    pub image_b: PathBuf,

    #[command(flatten)]
    pub model: ModelArgs,
}
