// ============================================================
// Layer 5 — Forward Hooks
// ============================================================
// Burn modules have no hook registry, so a FaceModel's forward
// pass takes a LayerHook and reports each named layer's output
// to it as it goes:
//
//   features.0 → features.1 → ... → avgpool → classifier.6
//        │            │                 │            │
//        └────────────┴──── hook.wants(name)? ───────┘
//                               │ yes
//                               ▼
//                     hook.capture(name, output)
//
// HookSlot is the single-layer hook BaseModel owns: one slot,
// overwritten on every pass, empty until the first pass that
// goes through the instrumented layer.
//
// Reference: Burn Book §3 (Building Blocks)

use burn::prelude::*;

use crate::error::ModelError;

/// Output of one named layer
#[derive(Debug, Clone)]
pub enum LayerOutput<B: Backend> {
    /// Convolutional / pooling output: [batch, channels, height, width]
    Spatial(Tensor<B, 4>),

    /// Fully-connected output: [batch, features]
    Flat(Tensor<B, 2>),
}

impl<B: Backend> LayerOutput<B> {
    pub fn dims(&self) -> Vec<usize> {
        match self {
            LayerOutput::Spatial(t) => t.dims().to_vec(),
            LayerOutput::Flat(t)    => t.dims().to_vec(),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.dims()[0]
    }

    /// Collapse everything but the batch dimension
    pub fn flatten(self) -> Tensor<B, 2> {
        match self {
            LayerOutput::Spatial(t) => t.flatten(1, 3),
            LayerOutput::Flat(t)    => t,
        }
    }

    pub fn to_device(self, device: &B::Device) -> Self {
        match self {
            LayerOutput::Spatial(t) => LayerOutput::Spatial(t.to_device(device)),
            LayerOutput::Flat(t)    => LayerOutput::Flat(t.to_device(device)),
        }
    }

    /// Copy the values back to host memory in row-major order
    pub fn to_vec(&self) -> Result<Vec<f32>, ModelError> {
        let data = match self {
            LayerOutput::Spatial(t) => t.to_data(),
            LayerOutput::Flat(t)    => t.to_data(),
        };
        data.to_vec::<f32>()
            .map_err(|e| ModelError::TensorData(format!("{e:?}")))
    }

    /// Concatenate per-device captures along the batch dimension.
    /// Returns None for an empty list or mixed variants.
    pub fn cat(parts: Vec<Self>) -> Option<Self> {
        let first = parts.first()?;
        match first {
            LayerOutput::Spatial(_) => {
                let tensors = parts
                    .into_iter()
                    .map(|p| match p {
                        LayerOutput::Spatial(t) => Some(t),
                        LayerOutput::Flat(_)    => None,
                    })
                    .collect::<Option<Vec<_>>>()?;
                Some(LayerOutput::Spatial(Tensor::cat(tensors, 0)))
            }
            LayerOutput::Flat(_) => {
                let tensors = parts
                    .into_iter()
                    .map(|p| match p {
                        LayerOutput::Flat(t)    => Some(t),
                        LayerOutput::Spatial(_) => None,
                    })
                    .collect::<Option<Vec<_>>>()?;
                Some(LayerOutput::Flat(Tensor::cat(tensors, 0)))
            }
        }
    }
}

/// Receives layer outputs during a forward pass
pub trait LayerHook<B: Backend> {
    /// Whether the output of `layer` should be captured
    fn wants(&self, layer: &str) -> bool;

    fn capture(&mut self, layer: &str, output: LayerOutput<B>);
}

/// Report a layer's output; the tensor is only materialised
/// for layers the hook asks for.
pub fn observe<B: Backend>(
    hook:   &mut dyn LayerHook<B>,
    layer:  &str,
    output: impl FnOnce() -> LayerOutput<B>,
) {
    if hook.wants(layer) {
        hook.capture(layer, output());
    }
}

/// A hook that captures nothing
pub struct NoHook;

impl<B: Backend> LayerHook<B> for NoHook {
    fn wants(&self, _layer: &str) -> bool {
        false
    }

    fn capture(&mut self, _layer: &str, _output: LayerOutput<B>) {}
}

/// One instrumented layer and its most recent output
#[derive(Debug, Clone)]
pub struct HookSlot<B: Backend> {
    layer:  Option<String>,
    output: Option<LayerOutput<B>>,
}

impl<B: Backend> Default for HookSlot<B> {
    fn default() -> Self {
        Self { layer: None, output: None }
    }
}

impl<B: Backend> HookSlot<B> {
    /// A slot with no layer attached; captures nothing
    pub fn detached() -> Self {
        Self::default()
    }

    /// Attach to `layer`, which must be one of `available`
    pub fn register(layer: &str, available: &[String]) -> Result<Self, ModelError> {
        if !available.iter().any(|name| name == layer) {
            return Err(ModelError::LayerNotFound(layer.to_string()));
        }
        tracing::debug!("Registered forward hook on '{}'", layer);
        Ok(Self { layer: Some(layer.to_string()), output: None })
    }

    /// A fresh empty slot watching the same layer
    pub fn fork(&self) -> Self {
        Self { layer: self.layer.clone(), output: None }
    }

    pub fn layer(&self) -> Option<&str> {
        self.layer.as_deref()
    }

    pub fn output(&self) -> Option<&LayerOutput<B>> {
        self.output.as_ref()
    }

    pub fn set_output(&mut self, output: Option<LayerOutput<B>>) {
        self.output = output;
    }

    pub fn take(&mut self) -> Option<LayerOutput<B>> {
        self.output.take()
    }
}

impl<B: Backend> LayerHook<B> for HookSlot<B> {
    fn wants(&self, layer: &str) -> bool {
        self.layer.as_deref() == Some(layer)
    }

    fn capture(&mut self, _layer: &str, output: LayerOutput<B>) {
        self.output = Some(output);
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    type TestBackend = burn::backend::NdArray;

    fn layers() -> Vec<String> {
        vec!["features.0".to_string(), "classifier.3".to_string()]
    }

    #[test]
    fn test_register_known_layer() {
        let slot = HookSlot::<TestBackend>::register("classifier.3", &layers()).unwrap();
        assert_eq!(slot.layer(), Some("classifier.3"));
        assert!(slot.output().is_none());
    }

    #[test]
    fn test_register_unknown_layer_names_it() {
        let err = HookSlot::<TestBackend>::register("classifier.30", &layers()).unwrap_err();
        assert!(matches!(&err, ModelError::LayerNotFound(name) if name == "classifier.30"));
        assert_eq!(err.to_string(), "Layer classifier.30 not found in the model.");
    }

    #[test]
    fn test_slot_is_overwritten() {
        let device = Default::default();
        let mut slot = HookSlot::<TestBackend>::register("features.0", &layers()).unwrap();

        observe(&mut slot, "features.0", || LayerOutput::Flat(Tensor::ones([1, 2], &device)));
        observe(&mut slot, "classifier.3", || LayerOutput::Flat(Tensor::zeros([1, 9], &device)));
        assert_eq!(slot.output().unwrap().dims(), vec![1, 2]);

        observe(&mut slot, "features.0", || LayerOutput::Flat(Tensor::zeros([3, 2], &device)));
        let values = slot.output().unwrap().to_vec().unwrap();
        assert_eq!(values, vec![0.0; 6]);
    }

    #[test]
    fn test_detached_slot_captures_nothing() {
        let device = Default::default();
        let mut slot = HookSlot::<TestBackend>::detached();
        observe(&mut slot, "features.0", || LayerOutput::Flat(Tensor::ones([1, 2], &device)));
        assert!(slot.output().is_none());
    }

    #[test]
    fn test_cat_and_flatten() {
        let device = Default::default();
        let a = LayerOutput::<TestBackend>::Spatial(Tensor::ones([1, 2, 3, 3], &device));
        let b = LayerOutput::<TestBackend>::Spatial(Tensor::zeros([2, 2, 3, 3], &device));
        let joined = LayerOutput::cat(vec![a, b]).unwrap();
        assert_eq!(joined.dims(), vec![3, 2, 3, 3]);
        assert_eq!(joined.flatten().dims(), [3, 18]);
    }

    #[test]
    fn test_cat_rejects_mixed_variants() {
        let device = Default::default();
        let a = LayerOutput::<TestBackend>::Spatial(Tensor::ones([1, 2, 1, 1], &device));
        let b = LayerOutput::<TestBackend>::Flat(Tensor::ones([1, 2], &device));
        assert!(LayerOutput::cat(vec![a, b]).is_none());
        assert!(LayerOutput::<TestBackend>::cat(vec![]).is_none());
    }
}
