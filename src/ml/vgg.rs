// ============================================================
// Layer 5 — VGG Face Network
// ============================================================
// A VGG-style convolutional network whose layer names and
// checkpoint keys follow the torchvision layout, so hooks can
// be placed with the same names a PyTorch user would write
// ("features.30", "classifier.3") and torchvision / VGG-Face
// checkpoints load directly.
//
// torchvision numbers every layer of the two Sequential
// blocks, ReLUs and pools included:
//
//   features.0  Conv 3→64      classifier.0  Linear 25088→4096
//   features.1  ReLU           classifier.1  ReLU
//   features.2  Conv 64→64     classifier.2  Dropout
//   features.3  ReLU           classifier.3  Linear 4096→4096
//   features.4  MaxPool        classifier.4  ReLU
//   ...                        classifier.5  Dropout
//   features.30 MaxPool        classifier.6  Linear 4096→ids
//
// The Burn record only stores the layers with parameters, in
// order (features.0..12, classifier.0..2), so checkpoint keys
// are remapped from torch positions to record positions.
//
// Reference: Simonyan & Zisserman (2015) Very Deep Convolutional Networks
//            Parkhi et al. (2015) Deep Face Recognition
//            Burn Book §3 (Building Blocks)

use burn::{
    module::Ignored,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
        Dropout, DropoutConfig, Linear, LinearConfig, PaddingConfig2d,
    },
    prelude::*,
    tensor::activation::relu,
};
use serde::{Deserialize, Serialize};

use crate::ml::base_model::FaceModel;
use crate::ml::hook::{observe, HookSlot, LayerHook, LayerOutput};

/// One entry of the feature extractor: a 3×3 conv (+ ReLU) with
/// the given output channels, or a 2×2 max pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VggStage {
    Conv(usize),
    Pool,
}

use VggStage::{Conv, Pool};

/// Configuration "D" of the VGG paper
pub const VGG16_STAGES: [VggStage; 18] = [
    Conv(64), Conv(64), Pool,
    Conv(128), Conv(128), Pool,
    Conv(256), Conv(256), Conv(256), Pool,
    Conv(512), Conv(512), Conv(512), Pool,
    Conv(512), Conv(512), Conv(512), Pool,
];

#[derive(Config, Debug)]
pub struct VggConfig {
    pub stages:      Vec<VggStage>,
    pub num_classes: usize,
    #[config(default = 4096)]
    pub hidden:      usize,
    #[config(default = 7)]
    pub pool_size:   usize,
    #[config(default = 0.5)]
    pub dropout:     f64,
    #[config(default = 3)]
    pub in_channels: usize,
}

impl VggConfig {
    pub fn vgg16(num_classes: usize) -> Self {
        Self::new(VGG16_STAGES.to_vec(), num_classes)
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> Vgg<B> {
        let mut features = Vec::new();
        let mut channels = self.in_channels;
        for stage in &self.stages {
            if let Conv(out) = stage {
                features.push(
                    Conv2dConfig::new([channels, *out], [3, 3])
                        .with_padding(PaddingConfig2d::Explicit(1, 1))
                        .init(device),
                );
                channels = *out;
            }
        }

        let flat = channels * self.pool_size * self.pool_size;
        let classifier = vec![
            LinearConfig::new(flat, self.hidden).init(device),
            LinearConfig::new(self.hidden, self.hidden).init(device),
            LinearConfig::new(self.hidden, self.num_classes).init(device),
        ];

        Vgg {
            features,
            pool:    MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
            avgpool: AdaptiveAvgPool2dConfig::new([self.pool_size, self.pool_size]).init(),
            classifier,
            dropout: DropoutConfig::new(self.dropout).init(),
            stages:  Ignored(self.stages.clone()),
        }
    }

    pub fn layer_names(&self) -> Vec<String> {
        layer_names(&self.stages)
    }

    pub fn checkpoint_remaps(&self) -> Vec<(String, String)> {
        checkpoint_remaps(&self.stages)
    }
}

#[derive(Module, Debug)]
pub struct Vgg<B: Backend> {
    pub features:   Vec<Conv2d<B>>,
    pub pool:       MaxPool2d,
    pub avgpool:    AdaptiveAvgPool2d,
    pub classifier: Vec<Linear<B>>,
    pub dropout:    Dropout,
    pub stages:     Ignored<Vec<VggStage>>,
}

/// What sits at each torchvision position
#[derive(Debug, Clone, Copy, PartialEq)]
enum Op {
    Conv(usize),
    Linear(usize),
    Relu,
    Dropout,
    Pool,
}

const CLASSIFIER_OPS: [Op; 7] = [
    Op::Linear(0), Op::Relu, Op::Dropout,
    Op::Linear(1), Op::Relu, Op::Dropout,
    Op::Linear(2),
];

fn feature_ops(stages: &[VggStage]) -> Vec<Op> {
    let mut ops  = Vec::new();
    let mut conv = 0;
    for stage in stages {
        match stage {
            Conv(_) => {
                ops.push(Op::Conv(conv));
                ops.push(Op::Relu);
                conv += 1;
            }
            Pool => ops.push(Op::Pool),
        }
    }
    ops
}

fn layer_names(stages: &[VggStage]) -> Vec<String> {
    let mut names = vec!["features".to_string()];
    names.extend((0..feature_ops(stages).len()).map(|i| format!("features.{i}")));
    names.push("avgpool".to_string());
    names.push("classifier".to_string());
    names.extend((0..CLASSIFIER_OPS.len()).map(|i| format!("classifier.{i}")));
    names
}

/// torch position → record position, for every layer that moved.
/// Rules are ordered by torch position and each maps to a lower
/// index, so no key is rewritten twice.
fn checkpoint_remaps(stages: &[VggStage]) -> Vec<(String, String)> {
    let mut remaps = Vec::new();
    let blocks = [("features", feature_ops(stages)), ("classifier", CLASSIFIER_OPS.to_vec())];
    for (block, ops) in blocks {
        for (torch, op) in ops.iter().enumerate() {
            if let Op::Conv(record) | Op::Linear(record) = *op {
                if record != torch {
                    remaps.push((
                        format!(r"^{block}\.{torch}\.(weight|bias)$"),
                        format!("{block}.{record}.$1"),
                    ));
                }
            }
        }
    }
    remaps
}

impl<B: Backend> FaceModel<B> for Vgg<B> {
    type Config = VggConfig;

    fn build(config: &VggConfig, num_identities: Option<usize>, device: &B::Device) -> Self {
        let mut config = config.clone();
        if let Some(ids) = num_identities {
            config.num_classes = ids;
        }
        tracing::info!(
            "Building VGG: {} conv layers, {} classes",
            config.stages.iter().filter(|s| matches!(s, Conv(_))).count(),
            config.num_classes
        );
        config.init(device)
    }

    fn named_layers(&self) -> Vec<String> {
        layer_names(&self.stages)
    }

    fn checkpoint_remaps(&self) -> Vec<(String, String)> {
        checkpoint_remaps(&self.stages)
    }

    fn forward(&self, input: Tensor<B, 4>, hook: &mut dyn LayerHook<B>) -> Tensor<B, 2> {
        let mut x = input;
        for (index, op) in feature_ops(&self.stages).into_iter().enumerate() {
            x = match op {
                Op::Conv(i) => self.features[i].forward(x),
                Op::Pool    => self.pool.forward(x),
                _           => relu(x),
            };
            observe(hook, &format!("features.{index}"), || LayerOutput::Spatial(x.clone()));
        }
        observe(hook, "features", || LayerOutput::Spatial(x.clone()));

        let x = self.avgpool.forward(x);
        observe(hook, "avgpool", || LayerOutput::Spatial(x.clone()));

        let mut x: Tensor<B, 2> = x.flatten(1, 3);
        for (index, op) in CLASSIFIER_OPS.iter().enumerate() {
            x = match op {
                Op::Linear(i) => self.classifier[*i].forward(x),
                Op::Dropout   => self.dropout.forward(x),
                _             => relu(x),
            };
            observe(hook, &format!("classifier.{index}"), || LayerOutput::Flat(x.clone()));
        }
        observe(hook, "classifier", || LayerOutput::Flat(x.clone()));

        x
    }

    /// The flattened hook capture when a layer is instrumented,
    /// otherwise the classifier output.
    fn get_output(&self, image_tensor: Tensor<B, 4>, hook: &mut HookSlot<B>) -> Tensor<B, 2> {
        let logits = self.forward(image_tensor, hook);
        match hook.output() {
            Some(captured) => captured.clone().flatten(),
            None           => logits,
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::checkpoint::translate_key;
    use crate::ml::hook::NoHook;

    type TestBackend = burn::backend::NdArray;

    fn tiny() -> VggConfig {
        VggConfig::new(vec![Conv(4), Pool, Conv(8), Pool], 5)
            .with_hidden(16)
            .with_pool_size(2)
    }

    #[test]
    fn test_vgg16_layer_names() {
        let names = VggConfig::vgg16(2622).layer_names();
        assert!(names.contains(&"features.30".to_string()));
        assert!(!names.contains(&"features.31".to_string()));
        assert!(names.contains(&"classifier.6".to_string()));
        assert!(names.contains(&"avgpool".to_string()));
    }

    #[test]
    fn test_vgg16_checkpoint_keys() {
        let remaps = VggConfig::vgg16(1000).checkpoint_remaps();
        let key = |k: &str| translate_key(k, &remaps).unwrap();

        assert_eq!(key("features.0.weight"), "features.0.weight");
        assert_eq!(key("features.2.bias"), "features.1.bias");
        assert_eq!(key("module.features.28.weight"), "features.12.weight");
        assert_eq!(key("classifier.3.weight"), "classifier.1.weight");
        assert_eq!(key("module.classifier.6.bias"), "classifier.2.bias");
    }

    #[test]
    fn test_forward_shape() {
        let device = Default::default();
        let model  = Vgg::<TestBackend>::build(&tiny(), None, &device);
        let out    = model.forward(Tensor::ones([2, 3, 16, 16], &device), &mut NoHook);
        assert_eq!(out.dims(), [2, 5]);
    }

    #[test]
    fn test_identity_count_sets_head_width() {
        let device = Default::default();
        let model  = Vgg::<TestBackend>::build(&tiny(), Some(11), &device);
        let out    = model.forward(Tensor::zeros([1, 3, 16, 16], &device), &mut NoHook);
        assert_eq!(out.dims(), [1, 11]);
    }

    #[test]
    fn test_hook_sees_feature_layer() {
        let device = Default::default();
        let model  = Vgg::<TestBackend>::build(&tiny(), None, &device);
        let mut slot = HookSlot::register("features.4", &model.named_layers()).unwrap();

        model.forward(Tensor::ones([2, 3, 16, 16], &device), &mut slot);
        // conv(pad 1) keeps 16, pool halves to 8, second conv keeps 8
        assert_eq!(slot.output().unwrap().dims(), vec![2, 8, 8, 8]);
    }

    #[test]
    fn test_get_output_uses_hook_capture() {
        let device = Default::default();
        let model  = Vgg::<TestBackend>::build(&tiny(), None, &device);

        let mut slot = HookSlot::register("classifier.3", &model.named_layers()).unwrap();
        let out = model.get_output(Tensor::ones([3, 3, 16, 16], &device), &mut slot);
        assert_eq!(out.dims(), [3, 16]);

        let mut none = HookSlot::detached();
        let out = model.get_output(Tensor::ones([3, 3, 16, 16], &device), &mut none);
        assert_eq!(out.dims(), [3, 5]);
    }
}
