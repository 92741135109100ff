// ============================================================
// Cross-layer — Library Error Type
// ============================================================
// Every fallible operation below the application layer returns
// a ModelError. The application and CLI layers wrap these in
// anyhow::Error with extra path context.
//
// Reference: Rust Book §9 (Error Handling)
//            thiserror crate documentation

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    /// The requested hook layer is not in the model's named layers
    #[error("Layer {0} not found in the model.")]
    LayerNotFound(String),

    /// The checkpoint could not be opened or unpickled
    #[error("cannot read checkpoint '{}': {source}", path.display())]
    Checkpoint {
        path:   PathBuf,
        #[source]
        source: candle_core::Error,
    },

    /// The checkpoint opened fine but holds no tensor entries,
    /// neither at the top level nor under `state_dict`
    #[error("unrecognized checkpoint format in '{}': no tensor entries found", .0.display())]
    UnrecognizedCheckpoint(PathBuf),

    /// The final checkpoint entry has no first dimension
    #[error("checkpoint entry '{0}' is a scalar and carries no identity dimension")]
    ScalarEntry(String),

    /// The weights could not be decoded into the model's record,
    /// or their shapes do not fit the built network
    #[error("failed to load weights into the model: {0}")]
    Record(String),

    #[error("invalid preprocessing pipeline: {0}")]
    InvalidPipeline(String),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// Converting tensor data back to host memory failed
    #[error("tensor data error: {0}")]
    TensorData(String),

    #[error("cannot run inference on an empty batch")]
    EmptyBatch,
}
