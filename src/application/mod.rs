// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Workflows that tie the other layers together. No tensor code
// here and no printing (that's Layer 1).
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// Embedding a directory of images, comparing two images
pub mod embed_use_case;

// Checkpoint and architecture inspection
pub mod inspect_use_case;
