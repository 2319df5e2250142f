//! modelport - model persistence and portable-graph inference
//!
//! Trains two small models (a tabular logistic-regression classifier and a
//! text-classification pipeline), persists them, and reloads them for
//! inference through two serialization mechanisms:
//!
//! - a generic binary artifact readable only by a compatible version of this
//!   crate, and
//! - a portable computation-graph format executable by a standalone
//!   inference session that never touches the training code.
//!
//! # Modules
//!
//! - [`data`] - CSV loading and dataset extraction
//! - [`preprocessing`] - one-hot categorical encoding
//! - [`text`] - tokenization and n-gram count vectorization
//! - [`training`] - logistic regression
//! - [`model`] - trained model variants, feature rows, class contract
//! - [`artifact`] - generic serialized artifacts
//! - [`graph`] - portable graph format, conversion, and runtime
//! - [`cli`] - command-line interface

pub mod error;

pub mod artifact;
pub mod data;
pub mod graph;
pub mod model;
pub mod preprocessing;
pub mod text;
pub mod training;

pub mod cli;

pub use error::{ModelPortError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::artifact::{load_model, save_model, ModelMetadata, SerializedArtifact};
    pub use crate::data::TextDataset;
    pub use crate::error::{ModelPortError, Result};
    pub use crate::graph::convert::to_graph;
    pub use crate::graph::runtime::{GraphSession, TensorValue};
    pub use crate::graph::{Graph, GraphModel};
    pub use crate::model::{BinaryClass, FeatureRow, TabularClassifier, TextPipeline, TrainedModel};
    pub use crate::preprocessing::OneHotEncoder;
    pub use crate::text::{CountVectorizer, TextTokenizer};
    pub use crate::training::LogisticRegression;
}
