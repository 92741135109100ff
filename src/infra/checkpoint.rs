// ============================================================
// Layer 6 — Checkpoint Inspector and Loader
// ============================================================
// Reads PyTorch checkpoints (.pth / .pt files) produced by
// face-recognition training code.
//
// Two jobs:
//   1. Inspection — list the parameter entries in file order,
//      so we can infer the number of identities the classifier
//      was trained on (first dimension of the final entry).
//   2. Loading — decode the tensors into a Burn record using
//      burn-import's PyTorchFileRecorder.
//
// Checkpoint shapes we accept:
//
//   { "features.0.weight": Tensor, ... }                  ← flat
//   { "state_dict": { "features.0.weight": ... }, ... }   ← nested
//
// A nested file may carry other top-level values ("epoch",
// "best_acc1"); only the state_dict entries count.
//
// Keys saved from a model wrapped in nn.DataParallel carry a
// "module." prefix ("module.features.0.weight"). The prefix is
// stripped before the architecture's own key remaps run.
//
// Reference: burn-import PyTorch recorder documentation
//            candle-core pickle module

use std::path::{Path, PathBuf};

use burn::{
    prelude::*,
    record::{FullPrecisionSettings, Record, Recorder},
};
use burn_import::pytorch::{LoadArgs, PyTorchFileRecorder};
use candle_core::pickle::{read_pth_tensor_info, TensorInfo};
use regex::Regex;
use serde::Serialize;

use crate::error::ModelError;

/// Key under which training scripts usually nest the parameters
pub const STATE_DICT_KEY: &str = "state_dict";

/// Prefix left behind by multi-device wrapping, and its removal
pub const DATA_PARALLEL_PATTERN:     &str = r"^module\.(.+)$";
pub const DATA_PARALLEL_REPLACEMENT: &str = "$1";

/// One parameter tensor as stored in the checkpoint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamEntry {
    pub name:  String,
    pub shape: Vec<usize>,
    pub dtype: String,
}

impl ParamEntry {
    pub fn new(name: impl Into<String>, shape: Vec<usize>, dtype: impl Into<String>) -> Self {
        Self { name: name.into(), shape, dtype: dtype.into() }
    }
}

/// Ordered view of a checkpoint's parameters
#[derive(Debug, Clone, Serialize)]
pub struct CheckpointSummary {
    /// File the summary was read from
    pub path:    PathBuf,

    /// True when the parameters live under `state_dict`
    pub nested:  bool,

    /// Parameter entries in file order
    pub entries: Vec<ParamEntry>,
}

impl CheckpointSummary {
    /// Inspect the checkpoint at `path`.
    ///
    /// Parameters under a `state_dict` key win whenever that key
    /// exists; otherwise the top-level mapping is used. A file with
    /// no tensors in the chosen mapping is rejected as unrecognized.
    pub fn inspect(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let path = path.as_ref().to_path_buf();

        let top_level = read_pth_tensor_info(&path, false, None).map_err(|source| {
            ModelError::Checkpoint { path: path.clone(), source }
        })?;
        // The file already parsed, so the keyed read can only fail on a missing key
        let (nested, infos) = match read_pth_tensor_info(&path, false, Some(STATE_DICT_KEY)) {
            Ok(nested) => (true, nested),
            Err(_)     => (false, top_level),
        };

        if infos.is_empty() {
            return Err(ModelError::UnrecognizedCheckpoint(path));
        }

        let entries = file_order(infos)
            .into_iter()
            .map(|info| ParamEntry {
                shape: info.layout.shape().dims().to_vec(),
                dtype: info.dtype.as_str().to_string(),
                name:  info.name,
            })
            .collect::<Vec<_>>();

        tracing::debug!(
            "Inspected '{}': {} entries (nested={})",
            path.display(),
            entries.len(),
            nested
        );

        Ok(Self { path, nested, entries })
    }

    /// The final parameter entry in file order
    pub fn last_entry(&self) -> Option<&ParamEntry> {
        self.entries.last()
    }

    /// Number of identities the network was trained to classify.
    ///
    /// This is the first dimension of the final entry, which for a
    /// classification head is either its weight [ids, in] or its
    /// bias [ids]. Both give the same answer.
    pub fn num_identities(&self) -> Result<usize, ModelError> {
        let last = self
            .last_entry()
            .ok_or_else(|| ModelError::UnrecognizedCheckpoint(self.path.clone()))?;

        last.shape
            .first()
            .copied()
            .ok_or_else(|| ModelError::ScalarEntry(last.name.clone()))
    }

    /// Load the checkpoint into a Burn record.
    ///
    /// `remaps` are the architecture's (pattern, replacement) pairs;
    /// they run after the data-parallel prefix has been stripped.
    pub fn load_record<B: Backend, R: Record<B>>(
        &self,
        remaps: &[(String, String)],
        device: &B::Device,
    ) -> Result<R, ModelError> {
        let mut args = LoadArgs::new(self.path.clone());
        for (pattern, replacement) in full_remaps(remaps) {
            args = args.with_key_remap(&pattern, &replacement);
        }
        if self.nested {
            args = args.with_top_level_key(STATE_DICT_KEY);
        }

        tracing::info!("Loading weights from '{}'", self.path.display());

        let recorder = PyTorchFileRecorder::<FullPrecisionSettings>::default();
        Recorder::<B>::load(&recorder, args, device)
            .map_err(|e| ModelError::Record(format!("{e:?}")))
    }
}

/// Most dict items pickle writes under one SETITEMS opcode
const PICKLE_BATCH: usize = 1000;

/// Put the pickle reader's entries back into file order.
///
/// The reader appends each SETITEMS batch back to front. torch
/// numbers storages in the order it writes them, so once every
/// batch is flipped a stable sort on the storage key fixes the rest
/// (entries sharing a storage keep their batch order).
fn file_order(mut infos: Vec<TensorInfo>) -> Vec<TensorInfo> {
    for batch in infos.chunks_mut(PICKLE_BATCH) {
        batch.reverse();
    }

    let keys: Option<Vec<usize>> = infos.iter().map(storage_key).collect();
    match keys {
        Some(keys) => {
            let mut keyed: Vec<_> = keys.into_iter().zip(infos).collect();
            keyed.sort_by_key(|(key, _)| *key);
            keyed.into_iter().map(|(_, info)| info).collect()
        }
        None => infos,
    }
}

/// Storage number from a data path such as "archive/data/12"
fn storage_key(info: &TensorInfo) -> Option<usize> {
    info.path.rsplit('/').next()?.parse().ok()
}

/// Prefix-stripping remap followed by the architecture remaps,
/// in the order the recorder applies them.
pub fn full_remaps(remaps: &[(String, String)]) -> Vec<(String, String)> {
    let mut all = vec![(
        DATA_PARALLEL_PATTERN.to_string(),
        DATA_PARALLEL_REPLACEMENT.to_string(),
    )];
    all.extend(remaps.iter().cloned());
    all
}

/// Translate one checkpoint key the same way the loader does.
pub fn translate_key(name: &str, remaps: &[(String, String)]) -> Result<String, ModelError> {
    let mut key = name.to_string();
    for (pattern, replacement) in full_remaps(remaps) {
        let re = Regex::new(&pattern)
            .map_err(|e| ModelError::Record(format!("invalid key remap '{pattern}': {e}")))?;
        if re.is_match(&key) {
            key = re.replace_all(&key, replacement.as_str()).into_owned();
        }
    }
    Ok(key)
}
