// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything between image files on disk and the tensor a
// network consumes:
//
//   image files
//       │
//       ▼
//   ImageLoader   → decodes files, labels them by file name
//       │
//       ▼
//   Compose       → Resize / Crop / ToTensor / Normalize
//       │
//       ▼
//   [3, H, W] tensor on the model's device
//
// Reference: image crate documentation
//            Burn Book §3 (Tensor)

/// Loads image files from a directory
pub mod loader;

/// Preprocessing transforms and the default ImageNet pipeline
pub mod preprocess;
