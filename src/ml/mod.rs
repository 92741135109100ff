// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All Burn model code lives here.
//
//   base_model.rs — FaceModel trait + BaseModel wrapper
//                   Checkpoint → build → load → place → hook
//
//   hook.rs       — Forward hooks
//                   LayerHook trait, the single-layer HookSlot,
//                   LayerOutput (spatial or flat activations)
//
//   device.rs     — Device placement
//                   Compile-time backend choice, primary device
//                   plus replicas for batch splitting
//
//   vgg.rs        — VGG16 / VGG-Face network
//                   torchvision layer names and checkpoint keys
//
// Reference: Burn Book §2 (Backends), §3 (Building Blocks)

/// FaceModel trait and the BaseModel wrapper
pub mod base_model;

/// Forward hooks and captured layer outputs
pub mod hook;

/// Backend selection and multi-device placement
pub mod device;

/// VGG network with torchvision-compatible naming
pub mod vgg;
