// ============================================================
// Layer 6 — Model Configuration
// ============================================================
// Everything needed to rebuild a benchmarked model, stored as
// JSON so a benchmark run can be reproduced later:
//
//   {
//     "name": "vgg-face",
//     "architecture": "vgg_face",
//     "weights_path": "weights/vgg_face_dag.pth",
//     "extract_layer": "classifier.3",
//     "gpus": 0,
//     "batch_size": 16
//   }
//
// Missing fields fall back to ModelConfig::default().
//
// Reference: serde / serde_json documentation

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::{Path, PathBuf}};

use crate::data::preprocess::Transform;
use crate::ml::vgg::VggConfig;

/// Identity count of the VGG-Face training set
pub const VGG_FACE_IDENTITIES: usize = 2622;

/// Class count of the ImageNet-style VGG16 head
pub const VGG16_CLASSES: usize = 1000;

/// The network architectures this crate can build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Architecture {
    /// torchvision VGG16 layout, 1000-way head
    Vgg16,
    /// VGG16 layout with the 2622-identity VGG-Face head
    VggFace,
}

impl Architecture {
    /// Architecture config before any checkpoint overrides the head width
    pub fn vgg_config(&self) -> VggConfig {
        match self {
            Architecture::Vgg16   => VggConfig::vgg16(VGG16_CLASSES),
            Architecture::VggFace => VggConfig::vgg16(VGG_FACE_IDENTITIES),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub name:          String,
    pub architecture:  Architecture,
    pub weights_path:  Option<PathBuf>,
    pub extract_layer: Option<String>,

    /// Custom preprocessing; None selects the default pipeline
    pub preprocess:    Option<Vec<Transform>>,

    /// Number of discrete GPUs to spread batches over (0 = default device)
    pub gpus:          usize,
    pub batch_size:    usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name:          "vgg16".to_string(),
            architecture:  Architecture::Vgg16,
            weights_path:  None,
            extract_layer: None,
            preprocess:    None,
            gpus:          0,
            batch_size:    16,
        }
    }
}

impl ModelConfig {
    /// Read a config from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .with_context(|| format!("Cannot read model config '{}'", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("Invalid model config '{}'", path.display()))
    }

    /// Write this config as pretty JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
            .with_context(|| format!("Cannot write model config '{}'", path.display()))?;
        tracing::debug!("Saved model config to '{}'", path.display());
        Ok(())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let cfg: ModelConfig =
            serde_json::from_str(r#"{ "architecture": "vgg_face", "extract_layer": "classifier.3" }"#)
                .unwrap();
        assert_eq!(cfg.architecture, Architecture::VggFace);
        assert_eq!(cfg.extract_layer.as_deref(), Some("classifier.3"));
        assert_eq!(cfg.batch_size, 16);
        assert!(cfg.weights_path.is_none());
    }

    #[test]
    fn test_save_then_load() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");

        let cfg = ModelConfig {
            name: "bench".to_string(),
            preprocess: Some(vec![Transform::Resize { width: 112, height: 112 }, Transform::ToTensor]),
            ..ModelConfig::default()
        };
        cfg.save(&path).unwrap();

        let loaded = ModelConfig::load(&path).unwrap();
        assert_eq!(loaded.name, "bench");
        assert_eq!(loaded.preprocess, cfg.preprocess);
    }

    #[test]
    fn test_missing_config_file_errors() {
        let err = ModelConfig::load("no/such/config.json").unwrap_err();
        assert!(err.to_string().contains("no/such/config.json"));
    }

    #[test]
    fn test_vgg_face_head_width() {
        assert_eq!(Architecture::VggFace.vgg_config().num_classes, VGG_FACE_IDENTITIES);
    }
}
