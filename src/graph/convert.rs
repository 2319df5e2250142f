//! Model → graph conversion
//!
//! Rebuilds a fitted model as a portable graph. The text pipeline's
//! vectorizer is not embedded as code: its vocabulary and tokenizer settings
//! become attributes of a `StringVectorizer` node, and the executing session
//! re-implements tokenization from those attributes. The substituted
//! tokenization is equivalent but not the same code path, and graph weights
//! are stored single-precision, so graph predictions agree with the native
//! model only to within floating-point tolerance, not bit-for-bit.

use crate::error::{ModelPortError, Result};
use crate::model::{TabularClassifier, TextPipeline, TrainedModel};
use crate::training::LogisticRegression;
use ndarray::Array1;
use tracing::info;

use super::{Attribute, Dim, Graph, GraphModel, Initializer, Node, OpKind, TensorSpec};

fn batch() -> Dim {
    Dim::Symbolic("batch".to_string())
}

/// Append the logistic head to a graph whose `features_tensor` already holds
/// a `[batch, n_features]` float tensor: scores, sigmoid, two-class
/// probability assembly (column 0 negative, column 1 positive), and label.
fn linear_head(
    graph: Graph,
    coefficients: &Array1<f64>,
    intercept: f64,
    features_tensor: &str,
) -> Graph {
    let n_features = coefficients.len() as i64;

    graph
        .add_initializer(Initializer::new(
            "coefficients",
            vec![n_features, 1],
            coefficients.iter().map(|&w| w as f32).collect(),
        ))
        .add_initializer(Initializer::new(
            "intercept",
            vec![1],
            vec![intercept as f32],
        ))
        .add_initializer(Initializer::new("unit", vec![1], vec![1.0]))
        .add_node(Node::new(
            "scores_matmul",
            OpKind::MatMul,
            vec![features_tensor.to_string(), "coefficients".to_string()],
            vec!["scores_raw".to_string()],
        ))
        .add_node(Node::new(
            "scores_bias",
            OpKind::Add,
            vec!["scores_raw".to_string(), "intercept".to_string()],
            vec!["scores".to_string()],
        ))
        .add_node(Node::new(
            "positive_sigmoid",
            OpKind::Sigmoid,
            vec!["scores".to_string()],
            vec!["prob_positive".to_string()],
        ))
        .add_node(Node::new(
            "negative_complement",
            OpKind::Sub,
            vec!["unit".to_string(), "prob_positive".to_string()],
            vec!["prob_negative".to_string()],
        ))
        .add_node(
            Node::new(
                "assemble_probabilities",
                OpKind::Concat,
                vec!["prob_negative".to_string(), "prob_positive".to_string()],
                vec!["probabilities".to_string()],
            )
            .with_attribute("axis", Attribute::Int(1)),
        )
        .add_node(
            Node::new(
                "pick_label",
                OpKind::ArgMax,
                vec!["probabilities".to_string()],
                vec!["label".to_string()],
            )
            .with_attribute("axis", Attribute::Int(1)),
        )
}

fn fitted_parameters(classifier: &LogisticRegression) -> Result<(&Array1<f64>, f64)> {
    let coefficients = classifier
        .coefficients
        .as_ref()
        .ok_or(ModelPortError::NotFitted)?;
    Ok((coefficients, classifier.intercept.unwrap_or(0.0)))
}

fn text_pipeline_graph(pipeline: &TextPipeline) -> Result<Graph> {
    let vectorizer = pipeline.vectorizer();
    if !vectorizer.is_fitted() {
        return Err(ModelPortError::NotFitted);
    }
    if vectorizer.is_binary() {
        // opset 1 StringVectorizer only counts occurrences
        return Err(ModelPortError::UnsupportedOperator(
            "StringVectorizer with binary counting".to_string(),
        ));
    }

    let (coefficients, intercept) = fitted_parameters(pipeline.classifier())?;
    let tokenizer = vectorizer.tokenizer();
    let (ngram_min, ngram_max) = vectorizer.ngram_range();

    let vectorize = Node::new(
        "vectorize",
        OpKind::StringVectorizer,
        vec!["string_input".to_string()],
        vec!["token_counts".to_string()],
    )
    .with_attribute("vocabulary", Attribute::Strs(vectorizer.feature_names()))
    .with_attribute("ngram_min", Attribute::Int(ngram_min as i64))
    .with_attribute("ngram_max", Attribute::Int(ngram_max as i64))
    .with_attribute(
        "stop_words",
        Attribute::Strs(tokenizer.stop_words().to_vec()),
    )
    .with_attribute(
        "min_token_length",
        Attribute::Int(tokenizer.min_token_length() as i64),
    )
    .with_attribute("lowercase", Attribute::Int(tokenizer.lowercase() as i64));

    let graph = Graph::new("text_pipeline")
        .add_input(TensorSpec::string(
            "string_input",
            vec![batch(), Dim::Fixed(1)],
        ))
        .add_output(TensorSpec::int64("label", vec![batch(), Dim::Fixed(1)]))
        .add_output(TensorSpec::float(
            "probabilities",
            vec![batch(), Dim::Fixed(2)],
        ))
        .add_node(vectorize);

    Ok(linear_head(graph, coefficients, intercept, "token_counts"))
}

fn tabular_graph(model: &TabularClassifier) -> Result<Graph> {
    let (coefficients, intercept) = fitted_parameters(model.linear())?;
    let n_features = model.feature_names().len() as i64;

    let graph = Graph::new("tabular_classifier")
        .add_input(TensorSpec::float(
            "float_input",
            vec![batch(), Dim::Fixed(n_features)],
        ))
        .add_output(TensorSpec::int64("label", vec![batch(), Dim::Fixed(1)]))
        .add_output(TensorSpec::float(
            "probabilities",
            vec![batch(), Dim::Fixed(2)],
        ));

    Ok(linear_head(graph, coefficients, intercept, "float_input"))
}

/// Convert a fitted model into a portable graph model.
///
/// Fails with an unsupported-operator error when the fitted model uses an
/// option the graph opset cannot express.
pub fn to_graph(model: &TrainedModel) -> Result<GraphModel> {
    let graph = match model {
        TrainedModel::Text(pipeline) => text_pipeline_graph(pipeline)?,
        TrainedModel::Tabular(tabular) => tabular_graph(tabular)?,
    };

    info!(
        graph = %graph.name,
        nodes = graph.nodes.len(),
        initializers = graph.initializers.len(),
        "Converted model to portable graph"
    );
    Ok(GraphModel::new(graph))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::TensorType;
    use crate::text::CountVectorizer;
    use ndarray::array;

    fn fitted_pipeline(binary: bool) -> TextPipeline {
        let texts: Vec<String> = vec![
            "great food great service".to_string(),
            "great food again".to_string(),
            "awful food awful service".to_string(),
            "awful food again".to_string(),
        ];
        let labels = array![1.0, 1.0, 0.0, 0.0];

        let mut pipeline = TextPipeline::new(
            CountVectorizer::new()
                .with_min_df(2)
                .with_ngram_range(1, 2)
                .with_binary(binary),
            LogisticRegression::new().with_learning_rate(0.5),
        );
        pipeline.fit(&texts, &labels).unwrap();
        pipeline
    }

    #[test]
    fn test_text_pipeline_converts() {
        let model = TrainedModel::Text(fitted_pipeline(false));
        let graph_model = to_graph(&model).unwrap();
        let graph = &graph_model.graph;

        assert_eq!(graph.inputs.len(), 1);
        assert_eq!(graph.inputs[0].name, "string_input");
        assert_eq!(graph.inputs[0].dtype, TensorType::String);

        let output_names: Vec<&str> = graph.outputs.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(output_names, vec!["label", "probabilities"]);

        assert!(graph
            .nodes
            .iter()
            .any(|n| n.op == OpKind::StringVectorizer));
        assert_eq!(graph.initializers.len(), 3);
    }

    #[test]
    fn test_binary_counting_is_unsupported() {
        let model = TrainedModel::Text(fitted_pipeline(true));
        let err = to_graph(&model).unwrap_err();
        match err {
            ModelPortError::UnsupportedOperator(op) => {
                assert!(op.contains("StringVectorizer"), "got {op}")
            }
            other => panic!("expected UnsupportedOperator, got {other:?}"),
        }
    }

    #[test]
    fn test_unfitted_pipeline_rejected() {
        let pipeline = TextPipeline::new(
            CountVectorizer::new(),
            LogisticRegression::new(),
        );
        let err = to_graph(&TrainedModel::Text(pipeline)).unwrap_err();
        assert!(matches!(err, ModelPortError::NotFitted));
    }

    #[test]
    fn test_vectorizer_attributes_round_trip() {
        let pipeline = fitted_pipeline(false);
        let vocab_len = pipeline.vectorizer().vocabulary_len();
        let model = TrainedModel::Text(pipeline);
        let graph_model = to_graph(&model).unwrap();

        let vectorize = graph_model
            .graph
            .nodes
            .iter()
            .find(|n| n.op == OpKind::StringVectorizer)
            .unwrap();
        assert_eq!(vectorize.strs_attribute("vocabulary").unwrap().len(), vocab_len);
        assert_eq!(vectorize.int_attribute("ngram_min").unwrap(), 1);
        assert_eq!(vectorize.int_attribute("ngram_max").unwrap(), 2);
    }
}
