// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// File formats the rest of the system depends on:
//
//   checkpoint.rs — PyTorch checkpoint inspection and loading
//                   Lists parameter entries in file order,
//                   infers the identity count, and decodes
//                   weights into Burn records with key remaps
//                   (including the "module." prefix strip).
//
//   config.rs     — JSON model configuration
//                   Name, architecture, weights, hook layer,
//                   preprocessing and device settings.
//
// Reference: Rust Book §7 (Modules)
//            burn-import PyTorch recorder documentation

/// PyTorch checkpoint inspection and record loading
pub mod checkpoint;

/// JSON model configuration
pub mod config;
