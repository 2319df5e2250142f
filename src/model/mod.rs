//! Trained model representations
//!
//! A fitted model is one of two variants: a tabular classifier bound to a
//! named feature schema, or a two-stage text pipeline (vectorizer followed by
//! classifier). Both are plain serde values, so the whole variant serializes
//! as one unit and a single artifact round-trip restores everything needed
//! for inference.

use crate::data;
use crate::error::{ModelPortError, Result};
use crate::text::CountVectorizer;
use crate::training::LogisticRegression;
use ndarray::{Array1, Array2};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Class-index contract for every two-column probability surface in this
/// crate: column 0 is the negative class, column 1 the positive class. The
/// `probabilities` tensor of an exported graph follows the same ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryClass {
    Negative,
    Positive,
}

impl BinaryClass {
    pub const N_CLASSES: usize = 2;

    /// Column index of this class in a probability matrix.
    pub fn column(self) -> usize {
        match self {
            BinaryClass::Negative => 0,
            BinaryClass::Positive => 1,
        }
    }
}

/// A fitted model of either supported kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TrainedModel {
    Tabular(TabularClassifier),
    Text(TextPipeline),
}

impl TrainedModel {
    pub fn model_type(&self) -> &'static str {
        match self {
            TrainedModel::Tabular(_) => "tabular_classifier",
            TrainedModel::Text(_) => "text_pipeline",
        }
    }

    pub fn as_tabular(&self) -> Result<&TabularClassifier> {
        match self {
            TrainedModel::Tabular(m) => Ok(m),
            other => Err(ModelPortError::Data(format!(
                "artifact holds a {} model, expected tabular_classifier",
                other.model_type()
            ))),
        }
    }

    pub fn as_text(&self) -> Result<&TextPipeline> {
        match self {
            TrainedModel::Text(m) => Ok(m),
            other => Err(ModelPortError::Data(format!(
                "artifact holds a {} model, expected text_pipeline",
                other.model_type()
            ))),
        }
    }
}

/// A single hand-built inference record: named columns in caller order.
///
/// Converted to a one-row DataFrame for prediction; the model then checks
/// the names and their order against its trained schema.
#[derive(Debug, Clone, Default)]
pub struct FeatureRow {
    columns: Vec<(String, f64)>,
}

impl FeatureRow {
    pub fn new() -> Self {
        Self {
            columns: Vec::new(),
        }
    }

    /// Append a named value. Order of calls is the column order.
    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.columns.push((name.into(), value));
        self
    }

    /// Build the one-row DataFrame.
    pub fn into_dataframe(self) -> Result<DataFrame> {
        let cols: Vec<Column> = self
            .columns
            .iter()
            .map(|(name, value)| Column::new(name.as_str().into(), vec![*value]))
            .collect();
        DataFrame::new(cols).map_err(|e| ModelPortError::Data(e.to_string()))
    }
}

/// Logistic-regression classifier over a fixed, named tabular feature schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TabularClassifier {
    model: LogisticRegression,
    feature_names: Vec<String>,
    target: String,
}

impl TabularClassifier {
    /// Fit against `target`; every other column of `df`, in frame order,
    /// becomes part of the feature schema. The frame must already be encoded
    /// and free of missing values.
    pub fn fit(df: &DataFrame, target: &str, model: LogisticRegression) -> Result<Self> {
        if df.column(target).is_err() {
            return Err(ModelPortError::ColumnNotFound(target.to_string()));
        }

        let feature_names: Vec<String> = df
            .get_column_names()
            .into_iter()
            .filter(|name| name.as_str() != target)
            .map(|s| s.to_string())
            .collect();

        let x = data::columns_to_matrix(df, &feature_names)?;
        let y = data::column_to_vector(df, target)?;

        let mut model = model;
        model.fit(&x, &y)?;
        info!(
            features = feature_names.len(),
            samples = x.nrows(),
            "Fitted tabular classifier"
        );

        Ok(Self {
            model,
            feature_names,
            target: target.to_string(),
        })
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn linear(&self) -> &LogisticRegression {
        &self.model
    }

    /// Inference input must carry exactly the trained columns, in the trained
    /// order. A missing, extra, renamed, or reordered column is a schema
    /// error, never silently reconciled.
    fn validate_schema(&self, df: &DataFrame) -> Result<()> {
        let actual: Vec<String> = df
            .get_column_names()
            .into_iter()
            .map(|s| s.to_string())
            .collect();
        if actual != self.feature_names {
            return Err(ModelPortError::SchemaMismatch {
                expected: self.feature_names.join(", "),
                actual: actual.join(", "),
            });
        }
        Ok(())
    }

    /// Per-class probabilities, columns ordered by [`BinaryClass`].
    pub fn class_probabilities(&self, df: &DataFrame) -> Result<Array2<f64>> {
        self.validate_schema(df)?;
        let x = data::columns_to_matrix(df, &self.feature_names)?;
        let positive = self.model.predict_proba(&x)?;

        let mut out = Array2::zeros((positive.len(), BinaryClass::N_CLASSES));
        for (i, &p) in positive.iter().enumerate() {
            out[[i, BinaryClass::Negative.column()]] = 1.0 - p;
            out[[i, BinaryClass::Positive.column()]] = p;
        }
        Ok(out)
    }

    /// Positive-class probabilities.
    pub fn predict_positive(&self, df: &DataFrame) -> Result<Array1<f64>> {
        let proba = self.class_probabilities(df)?;
        Ok(proba.column(BinaryClass::Positive.column()).to_owned())
    }
}

/// Two-stage text classifier: count vectorizer composed with logistic
/// regression. Fitting learns the vocabulary and the weights together;
/// predicting applies stage 1 then stage 2 without refitting either.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextPipeline {
    vectorizer: CountVectorizer,
    classifier: LogisticRegression,
    n_training_documents: usize,
}

impl TextPipeline {
    pub fn new(vectorizer: CountVectorizer, classifier: LogisticRegression) -> Self {
        Self {
            vectorizer,
            classifier,
            n_training_documents: 0,
        }
    }

    pub fn fit(&mut self, texts: &[String], labels: &Array1<f64>) -> Result<&mut Self> {
        if texts.len() != labels.len() {
            return Err(ModelPortError::SchemaMismatch {
                expected: format!("{} labels", texts.len()),
                actual: format!("{} labels", labels.len()),
            });
        }

        let x = self.vectorizer.fit_transform(texts)?;
        self.classifier.fit(&x, labels)?;
        self.n_training_documents = texts.len();
        info!(
            documents = texts.len(),
            vocabulary = self.vectorizer.vocabulary_len(),
            "Fitted text pipeline"
        );
        Ok(self)
    }

    /// Positive-sentiment probability for one raw string.
    pub fn predict_proba(&self, text: &str) -> Result<f64> {
        let x = self.vectorizer.transform(&[text.to_string()])?;
        let p = self.classifier.predict_proba(&x)?;
        Ok(p[0])
    }

    /// Per-class probabilities for a batch, columns ordered by
    /// [`BinaryClass`].
    pub fn class_probabilities(&self, texts: &[String]) -> Result<Array2<f64>> {
        let x = self.vectorizer.transform(texts)?;
        let positive = self.classifier.predict_proba(&x)?;

        let mut out = Array2::zeros((positive.len(), BinaryClass::N_CLASSES));
        for (i, &p) in positive.iter().enumerate() {
            out[[i, BinaryClass::Negative.column()]] = 1.0 - p;
            out[[i, BinaryClass::Positive.column()]] = p;
        }
        Ok(out)
    }

    pub fn vectorizer(&self) -> &CountVectorizer {
        &self.vectorizer
    }

    pub fn classifier(&self) -> &LogisticRegression {
        &self.classifier
    }

    /// Documents actually fitted on, after deduplication upstream.
    pub fn n_training_documents(&self) -> usize {
        self.n_training_documents
    }
}
