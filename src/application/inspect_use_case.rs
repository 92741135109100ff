// ============================================================
// Layer 2 — InspectUseCase
// ============================================================
// Answers questions about a checkpoint or architecture without
// building a model:
//
//   - Is the checkpoint nested under "state_dict"?
//   - How many identities does its final layer classify?
//   - Which record key does every checkpoint key load into?
//   - Which layer names can a hook be registered on?

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

use crate::infra::{
    checkpoint::{translate_key, CheckpointSummary, ParamEntry},
    config::Architecture,
};

/// One checkpoint key and the record key it loads into
#[derive(Debug, Clone, Serialize)]
pub struct KeyMapping {
    pub checkpoint: String,
    pub record:     String,
    pub shape:      Vec<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckpointReport {
    pub path:           String,
    pub nested:         bool,
    pub entry_count:    usize,
    pub last_entry:     Option<ParamEntry>,

    /// None when the final entry carries no identity dimension
    pub num_identities: Option<usize>,
    pub keys:           Vec<KeyMapping>,
}

pub struct InspectUseCase {
    architecture: Architecture,
}

impl InspectUseCase {
    pub fn new(architecture: Architecture) -> Self {
        Self { architecture }
    }

    pub fn inspect(&self, weights: &Path) -> Result<CheckpointReport> {
        let summary = CheckpointSummary::inspect(weights)
            .with_context(|| format!("Cannot inspect '{}'", weights.display()))?;
        self.report(&summary)
    }

    /// Build the report from an already-read summary
    pub fn report(&self, summary: &CheckpointSummary) -> Result<CheckpointReport> {
        let num_identities = match summary.num_identities() {
            Ok(ids) => Some(ids),
            Err(e) => {
                tracing::warn!("Cannot infer identity count: {}", e);
                None
            }
        };

        let remaps = self.architecture.vgg_config().checkpoint_remaps();
        let keys = summary
            .entries
            .iter()
            .map(|entry| {
                Ok(KeyMapping {
                    checkpoint: entry.name.clone(),
                    record:     translate_key(&entry.name, &remaps)?,
                    shape:      entry.shape.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(CheckpointReport {
            path:        summary.path.display().to_string(),
            nested:      summary.nested,
            entry_count: summary.entries.len(),
            last_entry:  summary.last_entry().cloned(),
            num_identities,
            keys,
        })
    }

    /// Every layer name a hook can be registered on
    pub fn layers(&self) -> Vec<String> {
        self.architecture.vgg_config().layer_names()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_report_from_data_parallel_checkpoint() {
        let summary = CheckpointSummary {
            path:    PathBuf::from("vgg_face.pth"),
            nested:  true,
            entries: vec![
                ParamEntry::new("module.features.0.weight", vec![64, 3, 3, 3], "f32"),
                ParamEntry::new("module.classifier.6.weight", vec![2622, 4096], "f32"),
                ParamEntry::new("module.classifier.6.bias", vec![2622], "f32"),
            ],
        };

        let report = InspectUseCase::new(Architecture::VggFace).report(&summary).unwrap();
        assert!(report.nested);
        assert_eq!(report.entry_count, 3);
        assert_eq!(report.num_identities, Some(2622));
        assert_eq!(report.keys[0].record, "features.0.weight");
        assert_eq!(report.keys[2].record, "classifier.2.bias");
    }

    #[test]
    fn test_scalar_tail_reports_no_identities() {
        let summary = CheckpointSummary {
            path:    PathBuf::from("x.pth"),
            nested:  false,
            entries: vec![ParamEntry::new("step", vec![], "i64")],
        };
        let report = InspectUseCase::new(Architecture::Vgg16).report(&summary).unwrap();
        assert_eq!(report.num_identities, None);
    }

    #[test]
    fn test_missing_checkpoint_errors() {
        let use_case = InspectUseCase::new(Architecture::Vgg16);
        assert!(use_case.inspect(Path::new("missing.pth")).is_err());
    }

    #[test]
    fn test_vgg16_layers() {
        let layers = InspectUseCase::new(Architecture::Vgg16).layers();
        assert_eq!(layers.first().map(String::as_str), Some("features"));
        assert!(layers.contains(&"features.30".to_string()));
        assert!(layers.contains(&"classifier.3".to_string()));
    }

    #[test]
    fn test_inspect_real_checkpoint() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/data/data_parallel.pth");
        let report = InspectUseCase::new(Architecture::Vgg16).inspect(&path).unwrap();

        assert!(report.nested);
        assert_eq!(report.num_identities, Some(6));
        assert_eq!(report.last_entry.unwrap().name, "module.classifier.6.bias");
        assert_eq!(report.keys.last().unwrap().record, "classifier.2.bias");
    }
}
