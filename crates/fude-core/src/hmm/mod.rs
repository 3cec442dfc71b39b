pub mod engine;
pub mod gaussian;

pub use engine::{HmmEngine, Refinement};
pub use gaussian::GaussianHmm;
