//! modelport CLI
//!
//! One subcommand per pipeline step: train and persist the tabular
//! classifier or the text pipeline, reload an artifact for inference, export
//! a fitted pipeline to the portable graph format, and run the graph through
//! the standalone session. Each subcommand is a sequential batch run; the
//! result is a single probability line on stdout.

use clap::{Parser, Subcommand};
use colored::*;
use std::path::PathBuf;
use std::time::Instant;

use crate::artifact::{self, ModelMetadata};
use crate::data;
use crate::graph::convert;
use crate::graph::runtime::GraphSession;
use crate::model::{BinaryClass, FeatureRow, TabularClassifier, TextPipeline, TrainedModel};
use crate::preprocessing::OneHotEncoder;
use crate::text::CountVectorizer;
use crate::training::LogisticRegression;

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString {
    s.truecolor(100, 100, 100)
}
fn accent(s: &str) -> ColoredString {
    s.truecolor(120, 170, 255)
}
fn ok(s: &str) -> ColoredString {
    s.truecolor(100, 210, 120)
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "modelport")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Train, persist, and reload ML models via artifacts and portable graphs")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train the tabular survival classifier and save it as an artifact
    TrainTabular {
        /// Training CSV with Survived, Age, Sex, Pclass columns
        #[arg(short, long, default_value = "data/titanic.csv")]
        data: PathBuf,

        /// Output artifact file
        #[arg(short, long, default_value = "survival_model.bin")]
        output: PathBuf,
    },

    /// Reload the tabular artifact and predict for one passenger
    PredictTabular {
        /// Trained artifact file
        #[arg(short, long, default_value = "survival_model.bin")]
        model: PathBuf,

        /// Passenger age
        #[arg(long, default_value = "30")]
        age: f64,

        /// Passenger sex (female or male)
        #[arg(long, default_value = "female")]
        sex: String,

        /// Passenger class (1, 2 or 3)
        #[arg(long, default_value = "1")]
        pclass: u8,
    },

    /// Train the text sentiment pipeline and save it as an artifact
    TrainText {
        /// Training CSV with Text and Sentiment columns
        #[arg(short, long, default_value = "data/reviews.csv")]
        data: PathBuf,

        /// Output artifact file
        #[arg(short, long, default_value = "sentiment_pipeline.bin")]
        output: PathBuf,
    },

    /// Reload the pipeline artifact and score one review
    PredictText {
        /// Trained artifact file
        #[arg(short, long, default_value = "sentiment_pipeline.bin")]
        model: PathBuf,

        /// Review text to score
        #[arg(short, long, default_value = "Great food and excellent service!")]
        text: String,
    },

    /// Convert a fitted artifact into a portable graph file
    ExportGraph {
        /// Trained artifact file
        #[arg(short, long, default_value = "sentiment_pipeline.bin")]
        model: PathBuf,

        /// Output graph file
        #[arg(short, long, default_value = "sentiment_pipeline.graph")]
        output: PathBuf,
    },

    /// Score one review through the portable graph inference session
    PredictGraph {
        /// Portable graph file
        #[arg(short, long, default_value = "sentiment_pipeline.graph")]
        graph: PathBuf,

        /// Review text to score
        #[arg(short, long, default_value = "Great food and excellent service!")]
        text: String,
    },
}

// ─── Commands ──────────────────────────────────────────────────────────────────

const TABULAR_COLUMNS: [&str; 4] = ["Survived", "Age", "Sex", "Pclass"];

pub fn cmd_train_tabular(data_path: &PathBuf, output: &PathBuf) -> anyhow::Result<()> {
    section("Train tabular classifier");

    step_run("Loading data");
    let start = Instant::now();
    let df = data::load_csv(data_path)?;
    step_done(&format!(
        "{} rows × {} cols in {:?}",
        df.height(),
        df.width(),
        start.elapsed()
    ));

    step_run("Encoding features");
    let complete = data::select_complete_rows(&df, &TABULAR_COLUMNS)?;
    let mut encoder = OneHotEncoder::new();
    let encoded = encoder.fit_transform(&complete, &["Sex", "Pclass"])?;
    step_done(&format!("{} complete rows", encoded.height()));

    step_run("Fitting logistic regression");
    let start = Instant::now();
    let model = TabularClassifier::fit(&encoded, "Survived", LogisticRegression::new())?;
    step_done(&format!("{:?}", start.elapsed()));

    let metadata = ModelMetadata::new("survival")
        .with_model_type("tabular_classifier")
        .with_features(model.feature_names().to_vec())
        .with_target("Survived")
        .with_training_rows(encoded.height())
        .add_hyperparameter("learning_rate", "0.1")
        .add_hyperparameter("alpha", "0.01")
        .add_hyperparameter("max_iter", "1000")
        .add_hyperparameter("random_state", "42");
    artifact::save_model(&TrainedModel::Tabular(model), output, metadata)?;

    step_ok(&format!("Artifact written to {}", output.display()));
    Ok(())
}

pub fn cmd_predict_tabular(
    model_path: &PathBuf,
    age: f64,
    sex: &str,
    pclass: u8,
) -> anyhow::Result<()> {
    let (model, metadata): (TrainedModel, ModelMetadata) = artifact::load_model(model_path)?;
    tracing::debug!(metadata = %metadata.to_json()?, "Artifact metadata");
    let model = model.as_tabular()?;

    let sex = sex.to_lowercase();
    let row = FeatureRow::new()
        .with("Age", age)
        .with("Sex_female", if sex == "female" { 1.0 } else { 0.0 })
        .with("Sex_male", if sex == "male" { 1.0 } else { 0.0 })
        .with("Pclass_1", if pclass == 1 { 1.0 } else { 0.0 })
        .with("Pclass_2", if pclass == 2 { 1.0 } else { 0.0 })
        .with("Pclass_3", if pclass == 3 { 1.0 } else { 0.0 });
    let frame = row.into_dataframe()?;

    let proba = model.class_probabilities(&frame)?;
    let p = proba[[0, BinaryClass::Positive.column()]];

    println!("Survival probability: {:.2}%", p * 100.0);
    Ok(())
}

pub fn cmd_train_text(data_path: &PathBuf, output: &PathBuf) -> anyhow::Result<()> {
    section("Train text pipeline");

    step_run("Loading data");
    let start = Instant::now();
    let dataset = data::load_text_dataset(data_path)?;
    step_done(&format!(
        "{} rows, {} unique after dedup in {:?}",
        dataset.n_rows_raw,
        dataset.texts.len(),
        start.elapsed()
    ));

    step_run("Fitting vectorizer + classifier");
    let start = Instant::now();
    let mut pipeline = TextPipeline::new(
        CountVectorizer::new().with_ngram_range(1, 2).with_min_df(20),
        LogisticRegression::new().with_max_iter(1000),
    );
    pipeline.fit(&dataset.texts, &dataset.labels)?;
    step_done(&format!(
        "{} vocabulary terms in {:?}",
        pipeline.vectorizer().vocabulary_len(),
        start.elapsed()
    ));

    let metadata = ModelMetadata::new("sentiment")
        .with_model_type("text_pipeline")
        .with_target("Sentiment")
        .with_training_rows(dataset.texts.len())
        .add_hyperparameter("ngram_range", "1-2")
        .add_hyperparameter("min_df", "20")
        .add_hyperparameter("max_iter", "1000")
        .add_hyperparameter("random_state", "42");
    artifact::save_model(&TrainedModel::Text(pipeline), output, metadata)?;

    step_ok(&format!("Artifact written to {}", output.display()));
    Ok(())
}

pub fn cmd_predict_text(model_path: &PathBuf, text: &str) -> anyhow::Result<()> {
    let (model, metadata): (TrainedModel, ModelMetadata) = artifact::load_model(model_path)?;
    tracing::debug!(metadata = %metadata.to_json()?, "Artifact metadata");
    let pipeline = model.as_text()?;

    let p = pipeline.predict_proba(text)?;
    println!("Positive sentiment probability: {:.10}", p);
    Ok(())
}

pub fn cmd_export_graph(model_path: &PathBuf, output: &PathBuf) -> anyhow::Result<()> {
    section("Export portable graph");

    let (model, _metadata): (TrainedModel, ModelMetadata) = artifact::load_model(model_path)?;

    step_run("Converting to graph");
    let graph_model = convert::to_graph(&model)?;
    step_done(&format!(
        "{} nodes, opset {}",
        graph_model.graph.nodes.len(),
        graph_model.opset_version
    ));

    graph_model.save(output)?;
    step_ok(&format!("Graph written to {}", output.display()));
    Ok(())
}

pub fn cmd_predict_graph(graph_path: &PathBuf, text: &str) -> anyhow::Result<()> {
    let session = GraphSession::open(graph_path)?;
    tracing::info!(
        inputs = %session.input_names().join(", "),
        outputs = %session.output_names().join(", "),
        "Resolved graph tensors"
    );

    let p = session.positive_probability(text)?;
    println!("Positive sentiment probability: {:.10}", p);
    Ok(())
}
