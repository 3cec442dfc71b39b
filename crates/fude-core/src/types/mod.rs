pub mod feature;
pub mod model;
pub mod stroke;

pub use feature::{FeatureSequence, FeatureVector, Partition, SequenceCollection};
pub use model::{CharacterModel, DiagonalGaussian, HmmParameters, Stage};
pub use stroke::{CharCode, Point, Stroke, Writing, render_code};
