use thiserror::Error;

use crate::types::CharCode;

/// Errors that can occur while building, training, or scoring character models.
#[derive(Debug, Error)]
pub enum FudeError {
    /// A sequence collection holds no sequences at all.
    #[error("sequence collection for character {code} is empty")]
    EmptyCollection {
        /// Character whose collection is empty.
        code: CharCode,
    },

    /// A state received no feature vectors during equal-split estimation.
    #[error("state {state} of character {code} has no feature vectors to estimate from")]
    DegenerateState {
        /// Character being modeled.
        code: CharCode,
        /// Index of the empty state.
        state: usize,
    },

    /// No initial model has been stored for the character.
    #[error("no initial model found for character {code}")]
    NoInitialModel {
        /// Character with no initial model.
        code: CharCode,
    },

    /// The training sequence collection is missing or holds no usable sequences.
    #[error("no training data found for character {code}")]
    NoTrainingData {
        /// Character with no training data.
        code: CharCode,
    },

    /// The trained model set is empty.
    #[error("no trained models available")]
    NoTrainedModels,

    /// A sequence with no feature vectors was given where one is required.
    #[error("feature sequence is empty")]
    EmptySequence,

    /// Model parameters violate shape or probability constraints.
    #[error("invalid model parameters: {0}")]
    InvalidModel(String),

    /// A stored sequence could not be decoded into feature vectors.
    #[error("malformed feature sequence: {reason}")]
    MalformedSequence {
        /// What was wrong with the stored data.
        reason: String,
    },

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Filesystem error while reading or writing a store.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored document could not be (de)serialized.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for Fude operations.
pub type Result<T> = std::result::Result<T, FudeError>;
