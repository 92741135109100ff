// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types shared by every other layer. No Burn
// types here: an Embedding is just a Vec<f32> with a name.
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// A model output for one image
pub mod embedding;

// Core abstractions (traits) that other layers implement
pub mod traits;
