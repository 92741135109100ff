// ============================================================
// Layer 5 — Base Model
// ============================================================
// The common wrapper around every benchmarked face network.
//
// FaceModel is what an architecture implements:
//   build           — construct the network (optionally sized
//                     to a checkpoint's identity count)
//   named_layers    — the layer names hooks can attach to
//   forward         — run the network, reporting layers to a hook
//   get_output      — turn a preprocessed batch into embeddings
//
// BaseModel does the rest, always in this order:
//
//   1. pick the preprocessing pipeline (custom or default)
//   2. inspect the checkpoint → number of identities
//   3. build the network
//   4. load the weights ("module." prefix stripped)
//   5. place it on the device(s), replicating if more than one
//   6. register the forward hook (fails on an unknown layer)
//
// Inference runs on a backend without autodiff, so the model
// is always in evaluation mode: dropout is the identity.
//
// Reference: Burn Book §3 (Building Blocks), §6 (Records)

use std::path::{Path, PathBuf};

use burn::{
    module::{ModuleVisitor, ParamId},
    prelude::*,
};
use image::DynamicImage;

use crate::data::preprocess::{Compose, Preprocess};
use crate::domain::embedding::Embedding;
use crate::domain::traits::{Embedder, LabeledImage};
use crate::error::ModelError;
use crate::infra::checkpoint::CheckpointSummary;
use crate::ml::device::Placement;
use crate::ml::hook::{HookSlot, LayerHook, LayerOutput};

/// A network architecture usable with BaseModel
pub trait FaceModel<B: Backend>: Module<B> {
    /// Architecture hyperparameters
    type Config;

    /// Build the network with freshly initialised weights.
    /// `num_identities`, when known, sizes the classification head.
    fn build(config: &Self::Config, num_identities: Option<usize>, device: &B::Device) -> Self;

    /// Every name a forward hook can be registered on
    fn named_layers(&self) -> Vec<String>;

    /// (regex, replacement) pairs translating checkpoint keys to
    /// this module's record keys
    fn checkpoint_remaps(&self) -> Vec<(String, String)> {
        Vec::new()
    }

    /// Run the network on [batch, 3, H, W], reporting each named
    /// layer's output to `hook`
    fn forward(&self, input: Tensor<B, 4>, hook: &mut dyn LayerHook<B>) -> Tensor<B, 2>;

    /// Turn a preprocessed batch into [batch, dim] embeddings
    fn get_output(&self, image_tensor: Tensor<B, 4>, hook: &mut HookSlot<B>) -> Tensor<B, 2>;
}

/// Construction options shared by every architecture
pub struct ModelOptions<B: Backend> {
    pub name:          String,
    pub weights_path:  Option<PathBuf>,
    pub extract_layer: Option<String>,
    pub preprocess:    Option<Box<dyn Preprocess<B>>>,
}

impl<B: Backend> ModelOptions<B> {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), weights_path: None, extract_layer: None, preprocess: None }
    }

    pub fn with_weights(mut self, path: impl Into<PathBuf>) -> Self {
        self.weights_path = Some(path.into());
        self
    }

    pub fn with_extract_layer(mut self, layer: impl Into<String>) -> Self {
        self.extract_layer = Some(layer.into());
        self
    }

    pub fn with_preprocess(mut self, preprocess: impl Preprocess<B> + 'static) -> Self {
        self.preprocess = Some(Box::new(preprocess));
        self
    }
}

pub struct BaseModel<B: Backend, M: FaceModel<B>> {
    name:           String,
    model:          M,
    replicas:       Vec<M>,
    placement:      Placement<B>,
    num_identities: Option<usize>,
    weights_path:   Option<PathBuf>,
    extract_layer:  Option<String>,
    hook:           HookSlot<B>,
    preprocess:     Box<dyn Preprocess<B>>,
}

impl<B: Backend, M: FaceModel<B>> BaseModel<B, M> {
    pub fn new(
        options:   ModelOptions<B>,
        config:    &M::Config,
        placement: Placement<B>,
    ) -> Result<Self, ModelError> {
        let ModelOptions { name, weights_path, extract_layer, preprocess } = options;

        let preprocess = preprocess
            .unwrap_or_else(|| Box::new(Compose::imagenet_default()) as Box<dyn Preprocess<B>>);

        let checkpoint = weights_path
            .as_ref()
            .map(CheckpointSummary::inspect)
            .transpose()?;
        let num_identities = checkpoint
            .as_ref()
            .map(CheckpointSummary::num_identities)
            .transpose()?;
        if let Some(ids) = num_identities {
            tracing::info!("Checkpoint classifies {} identities", ids);
        }

        let model = M::build(config, num_identities, placement.primary());

        let mut this = Self {
            name,
            model,
            replicas: Vec::new(),
            placement,
            num_identities,
            weights_path,
            extract_layer,
            hook: HookSlot::detached(),
            preprocess,
        };

        if let Some(checkpoint) = &checkpoint {
            this.load_model(checkpoint)?;
        }
        // Also builds the replicas, so loaded weights reach every device
        this.to_device();
        this.register_hook()?;

        tracing::info!("Model '{}' ready", this.name);
        Ok(this)
    }

    /// Load checkpoint weights into the network.
    /// `load_record` swaps tensors in without looking at them, so
    /// every parameter shape is compared with the built network.
    fn load_model(&mut self, checkpoint: &CheckpointSummary) -> Result<(), ModelError> {
        let remaps = self.model.checkpoint_remaps();
        let record = checkpoint.load_record::<B, M::Record>(&remaps, self.placement.primary())?;

        let expected = param_shapes(&self.model);
        let loaded   = self.model.clone().load_record(record);
        check_shapes(&expected, &param_shapes(&loaded), &checkpoint.path)?;

        self.model = loaded;
        Ok(())
    }

    /// Move the network to the primary device and refresh the
    /// replicas on every secondary device
    fn to_device(&mut self) {
        self.model = self.model.clone().to_device(self.placement.primary());
        self.replicas = self
            .placement
            .secondaries()
            .iter()
            .map(|device| self.model.clone().to_device(device))
            .collect();
        if !self.replicas.is_empty() {
            tracing::info!("Replicated '{}' across {} devices", self.name, self.placement.devices().len());
        }
    }

    fn register_hook(&mut self) -> Result<(), ModelError> {
        self.hook = match &self.extract_layer {
            Some(layer) => HookSlot::register(layer, &self.model.named_layers())?,
            None        => HookSlot::detached(),
        };
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn device(&self) -> &B::Device {
        self.placement.primary()
    }

    pub fn placement(&self) -> &Placement<B> {
        &self.placement
    }

    pub fn num_identities(&self) -> Option<usize> {
        self.num_identities
    }

    pub fn weights_path(&self) -> Option<&PathBuf> {
        self.weights_path.as_ref()
    }

    pub fn extract_layer(&self) -> Option<&str> {
        self.extract_layer.as_deref()
    }

    /// Output of the instrumented layer from the most recent pass.
    /// None before the first pass or when no layer is instrumented.
    pub fn hook_output(&self) -> Option<&LayerOutput<B>> {
        self.hook.output()
    }

    /// Run the preprocessing pipeline on one image → [3, H, W]
    pub fn preprocess(&self, image: &DynamicImage) -> Result<Tensor<B, 3>, ModelError> {
        self.preprocess.apply(image, self.placement.primary())
    }

    /// Turn a preprocessed batch into [batch, dim] embeddings.
    ///
    /// With several devices the batch is split into one chunk per
    /// device; outputs and hook captures are joined back on the
    /// primary device in the original order.
    pub fn get_output(&mut self, image_tensor: Tensor<B, 4>) -> Result<Tensor<B, 2>, ModelError> {
        let batch = image_tensor.dims()[0];
        if batch == 0 {
            return Err(ModelError::EmptyBatch);
        }

        if self.replicas.is_empty() {
            return Ok(self.model.get_output(image_tensor, &mut self.hook));
        }

        let primary = self.placement.primary().clone();
        let chunks  = image_tensor.chunk(self.placement.devices().len(), 0);
        let models  = std::iter::once(&self.model).chain(self.replicas.iter());

        let mut outputs  = Vec::with_capacity(chunks.len());
        let mut captures = Vec::with_capacity(chunks.len());
        for ((chunk, model), device) in chunks.into_iter().zip(models).zip(self.placement.devices()) {
            let mut slot = self.hook.fork();
            let out = model.get_output(chunk.to_device(device), &mut slot);
            outputs.push(out.to_device(&primary));
            if let Some(captured) = slot.take() {
                captures.push(captured.to_device(&primary));
            }
        }

        tracing::debug!("Split batch of {} across {} devices", batch, outputs.len());
        self.hook.set_output(LayerOutput::cat(captures));
        Ok(Tensor::cat(outputs, 0))
    }

    /// Preprocess and stack images, then run get_output
    pub fn embed_images(&mut self, images: &[DynamicImage]) -> Result<Tensor<B, 2>, ModelError> {
        if images.is_empty() {
            return Err(ModelError::EmptyBatch);
        }
        let tensors = images
            .iter()
            .map(|image| self.preprocess(image))
            .collect::<Result<Vec<_>, _>>()?;
        self.get_output(Tensor::stack(tensors, 0))
    }
}

/// Collects float parameter shapes in visiting order
struct ParamShapes(Vec<Vec<usize>>);

impl<B: Backend> ModuleVisitor<B> for ParamShapes {
    fn visit_float<const D: usize>(&mut self, _id: ParamId, tensor: &Tensor<B, D>) {
        self.0.push(tensor.dims().to_vec());
    }
}

fn param_shapes<B: Backend, M: Module<B>>(module: &M) -> Vec<Vec<usize>> {
    let mut shapes = ParamShapes(Vec::new());
    module.visit(&mut shapes);
    shapes.0
}

fn check_shapes(expected: &[Vec<usize>], loaded: &[Vec<usize>], path: &Path) -> Result<(), ModelError> {
    if expected.len() != loaded.len() {
        return Err(ModelError::Record(format!(
            "'{}' has {} parameters, the architecture has {}",
            path.display(),
            loaded.len(),
            expected.len()
        )));
    }
    match expected.iter().zip(loaded).position(|(e, l)| e != l) {
        Some(i) => Err(ModelError::Record(format!(
            "parameter {} in '{}' has shape {:?}, the architecture expects {:?}",
            i,
            path.display(),
            loaded[i],
            expected[i]
        ))),
        None => Ok(()),
    }
}

impl<B: Backend, M: FaceModel<B>> Embedder for BaseModel<B, M> {
    fn embed_batch(&mut self, images: &[LabeledImage]) -> anyhow::Result<Vec<Embedding>> {
        if images.is_empty() {
            return Ok(Vec::new());
        }

        let tensors = images
            .iter()
            .map(|labeled| self.preprocess(&labeled.image))
            .collect::<Result<Vec<_>, _>>()?;
        let output = self.get_output(Tensor::stack(tensors, 0))?;

        let [_, dim] = output.dims();
        let values = output
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| ModelError::TensorData(format!("{e:?}")))?;

        Ok(values
            .chunks_exact(dim)
            .zip(images)
            .map(|(vector, labeled)| Embedding::new(labeled.source.clone(), vector.to_vec()))
            .collect())
    }
}
