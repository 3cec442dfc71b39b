pub mod extractor;

pub use extractor::{FeatureExtractor, extract};
