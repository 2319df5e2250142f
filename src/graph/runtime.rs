//! Graph inference session
//!
//! Loads a portable graph file and executes it. The session knows nothing
//! about the training code: tensor names, dtypes, and shapes are resolved
//! from the graph's declared specs, node semantics from the operator tags,
//! and the `StringVectorizer` tokenization is reconstructed purely from node
//! attributes. All arithmetic runs in `f32`.

use crate::error::{ModelPortError, Result};
use crate::model::BinaryClass;
use ndarray::{concatenate, Array2, Axis};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::debug;

use super::{Dim, GraphModel, Initializer, Node, OpKind, TensorSpec, TensorType};

/// A materialized tensor flowing through the graph.
#[derive(Debug, Clone)]
pub enum TensorValue {
    Float(Array2<f32>),
    Int(Array2<i64>),
    Str(Vec<String>),
}

impl TensorValue {
    pub fn dtype(&self) -> TensorType {
        match self {
            TensorValue::Float(_) => TensorType::Float,
            TensorValue::Int(_) => TensorType::Int64,
            TensorValue::Str(_) => TensorType::String,
        }
    }

    pub fn as_float(&self) -> Result<&Array2<f32>> {
        match self {
            TensorValue::Float(a) => Ok(a),
            other => Err(ModelPortError::Graph(format!(
                "expected float tensor, got {}",
                other.dtype().as_str()
            ))),
        }
    }

    pub fn as_int(&self) -> Result<&Array2<i64>> {
        match self {
            TensorValue::Int(a) => Ok(a),
            other => Err(ModelPortError::Graph(format!(
                "expected int64 tensor, got {}",
                other.dtype().as_str()
            ))),
        }
    }

    pub fn as_str_batch(&self) -> Result<&[String]> {
        match self {
            TensorValue::Str(v) => Ok(v),
            other => Err(ModelPortError::Graph(format!(
                "expected string tensor, got {}",
                other.dtype().as_str()
            ))),
        }
    }
}

/// An inference session over one loaded graph.
pub struct GraphSession {
    model: GraphModel,
}

impl GraphSession {
    /// Load a graph file and wrap it in a session.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            model: GraphModel::load(path)?,
        })
    }

    pub fn from_model(model: GraphModel) -> Self {
        Self { model }
    }

    pub fn input_specs(&self) -> &[TensorSpec] {
        &self.model.graph.inputs
    }

    pub fn output_specs(&self) -> &[TensorSpec] {
        &self.model.graph.outputs
    }

    pub fn input_names(&self) -> Vec<&str> {
        self.model.graph.inputs.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn output_names(&self) -> Vec<&str> {
        self.model.graph.outputs.iter().map(|s| s.name.as_str()).collect()
    }

    /// Execute the graph on the given named inputs and return the requested
    /// tensors in request order.
    pub fn run(
        &self,
        inputs: Vec<(String, TensorValue)>,
        requested: &[&str],
    ) -> Result<Vec<TensorValue>> {
        let graph = &self.model.graph;
        let mut env: HashMap<String, TensorValue> = HashMap::new();

        for init in &graph.initializers {
            env.insert(
                init.name.clone(),
                TensorValue::Float(initializer_to_array(init)?),
            );
        }

        for (name, value) in inputs {
            let spec = graph
                .inputs
                .iter()
                .find(|s| s.name == name)
                .ok_or_else(|| {
                    ModelPortError::Graph(format!("graph declares no input named '{name}'"))
                })?;
            validate_input(spec, &value)?;
            env.insert(name, value);
        }

        for spec in &graph.inputs {
            if !env.contains_key(&spec.name) {
                return Err(ModelPortError::Graph(format!(
                    "missing value for declared input '{}'",
                    spec.name
                )));
            }
        }

        for node in &graph.nodes {
            execute_node(node, &mut env)?;
            debug!(node = %node.name, op = node.op.as_str(), "Executed node");
        }

        requested
            .iter()
            .map(|name| {
                env.get(*name).cloned().ok_or_else(|| {
                    ModelPortError::Graph(format!(
                        "unknown tensor '{}'; graph declares outputs: {}",
                        name,
                        self.output_names().join(", ")
                    ))
                })
            })
            .collect()
    }

    /// Positive-class probability for one query string.
    ///
    /// The input and output tensors are discovered from the declared specs:
    /// the string-typed input carries the query, and the float-typed output
    /// is the class-probability tensor (its column order follows
    /// [`BinaryClass`]). Neither a tensor name nor an output index is
    /// assumed.
    pub fn positive_probability(&self, text: &str) -> Result<f32> {
        let graph = &self.model.graph;

        let input_spec = graph
            .inputs
            .iter()
            .find(|s| s.dtype == TensorType::String)
            .ok_or_else(|| {
                ModelPortError::Graph("graph declares no string-typed input".to_string())
            })?;
        let prob_spec = graph
            .outputs
            .iter()
            .find(|s| s.dtype == TensorType::Float)
            .ok_or_else(|| {
                ModelPortError::Graph("graph declares no float-typed output".to_string())
            })?;

        let input_name = input_spec.name.clone();
        let prob_name = prob_spec.name.clone();

        let outputs = self.run(
            vec![(input_name, TensorValue::Str(vec![text.to_string()]))],
            &[prob_name.as_str()],
        )?;
        let probs = outputs[0].as_float()?;

        let column = BinaryClass::Positive.column();
        if probs.ncols() <= column {
            return Err(ModelPortError::Graph(format!(
                "probability tensor has {} columns, cannot select class column {}",
                probs.ncols(),
                column
            )));
        }
        Ok(probs[[0, column]])
    }
}

fn initializer_to_array(init: &Initializer) -> Result<Array2<f32>> {
    let (rows, cols) = match init.dims.as_slice() {
        [n] => (1usize, *n as usize),
        [r, c] => (*r as usize, *c as usize),
        other => {
            return Err(ModelPortError::Graph(format!(
                "initializer '{}' has unsupported rank {}",
                init.name,
                other.len()
            )))
        }
    };
    if rows * cols != init.data.len() {
        return Err(ModelPortError::Graph(format!(
            "initializer '{}' declares {}x{} but holds {} values",
            init.name,
            rows,
            cols,
            init.data.len()
        )));
    }
    Ok(Array2::from_shape_vec((rows, cols), init.data.clone())?)
}

fn validate_input(spec: &TensorSpec, value: &TensorValue) -> Result<()> {
    if spec.dtype != value.dtype() {
        return Err(ModelPortError::SchemaMismatch {
            expected: format!("{} tensor for input '{}'", spec.dtype.as_str(), spec.name),
            actual: format!("{} tensor", value.dtype().as_str()),
        });
    }

    let actual_shape: Vec<i64> = match value {
        TensorValue::Float(a) => vec![a.nrows() as i64, a.ncols() as i64],
        TensorValue::Int(a) => vec![a.nrows() as i64, a.ncols() as i64],
        // a string batch is a [batch, 1] column
        TensorValue::Str(v) => vec![v.len() as i64, 1],
    };

    if spec.shape.len() != actual_shape.len() {
        return Err(ModelPortError::SchemaMismatch {
            expected: format!("rank {} for input '{}'", spec.shape.len(), spec.name),
            actual: format!("rank {}", actual_shape.len()),
        });
    }

    for (dim, actual) in spec.shape.iter().zip(actual_shape.iter()) {
        if let Dim::Fixed(expected) = dim {
            if expected != actual {
                return Err(ModelPortError::SchemaMismatch {
                    expected: format!("dimension {} for input '{}'", expected, spec.name),
                    actual: format!("dimension {}", actual),
                });
            }
        }
    }
    Ok(())
}

fn fetch<'a>(
    env: &'a HashMap<String, TensorValue>,
    node: &Node,
    name: &str,
) -> Result<&'a TensorValue> {
    env.get(name).ok_or_else(|| {
        ModelPortError::Graph(format!(
            "tensor '{}' required by node '{}' ({}) is not available",
            name,
            node.name,
            node.op.as_str()
        ))
    })
}

fn execute_node(node: &Node, env: &mut HashMap<String, TensorValue>) -> Result<()> {
    let out_name = node
        .outputs
        .first()
        .ok_or_else(|| {
            ModelPortError::Graph(format!("node '{}' declares no output tensor", node.name))
        })?
        .clone();

    let result = match node.op {
        OpKind::StringVectorizer => {
            let docs = fetch(env, node, &node.inputs[0])?.as_str_batch()?;
            TensorValue::Float(string_vectorize(node, docs)?)
        }
        OpKind::MatMul => {
            let a = fetch(env, node, &node.inputs[0])?.as_float()?;
            let b = fetch(env, node, &node.inputs[1])?.as_float()?;
            if a.ncols() != b.nrows() {
                return Err(ModelPortError::Graph(format!(
                    "node '{}': cannot multiply {}x{} by {}x{}",
                    node.name,
                    a.nrows(),
                    a.ncols(),
                    b.nrows(),
                    b.ncols()
                )));
            }
            TensorValue::Float(a.dot(b))
        }
        OpKind::Add => {
            let a = fetch(env, node, &node.inputs[0])?.as_float()?.clone();
            let b = fetch(env, node, &node.inputs[1])?.as_float()?.clone();
            TensorValue::Float(broadcast_binary(node, &a, &b, |x, y| x + y)?)
        }
        OpKind::Sub => {
            let a = fetch(env, node, &node.inputs[0])?.as_float()?.clone();
            let b = fetch(env, node, &node.inputs[1])?.as_float()?.clone();
            TensorValue::Float(broadcast_binary(node, &a, &b, |x, y| x - y)?)
        }
        OpKind::Sigmoid => {
            let a = fetch(env, node, &node.inputs[0])?.as_float()?;
            TensorValue::Float(a.mapv(|v| 1.0 / (1.0 + (-v).exp())))
        }
        OpKind::Concat => {
            let axis = node.int_attribute("axis")?;
            if axis != 1 {
                return Err(ModelPortError::Graph(format!(
                    "node '{}': Concat only supports axis 1, got {}",
                    node.name, axis
                )));
            }
            let mut parts = Vec::with_capacity(node.inputs.len());
            for input in &node.inputs {
                parts.push(fetch(env, node, input)?.as_float()?.clone());
            }
            let views: Vec<_> = parts.iter().map(|p| p.view()).collect();
            TensorValue::Float(concatenate(Axis(1), &views)?)
        }
        OpKind::ArgMax => {
            let axis = node.int_attribute("axis")?;
            if axis != 1 {
                return Err(ModelPortError::Graph(format!(
                    "node '{}': ArgMax only supports axis 1, got {}",
                    node.name, axis
                )));
            }
            let a = fetch(env, node, &node.inputs[0])?.as_float()?;
            let mut labels = Array2::zeros((a.nrows(), 1));
            for (row_idx, row) in a.outer_iter().enumerate() {
                let mut best = 0usize;
                for (col_idx, &v) in row.iter().enumerate() {
                    if v > row[best] {
                        best = col_idx;
                    }
                }
                labels[[row_idx, 0]] = best as i64;
            }
            TensorValue::Int(labels)
        }
    };

    env.insert(out_name, result);
    Ok(())
}

// Elementwise binary op with scalar (1x1) broadcasting on either side.
fn broadcast_binary(
    node: &Node,
    a: &Array2<f32>,
    b: &Array2<f32>,
    op: impl Fn(f32, f32) -> f32,
) -> Result<Array2<f32>> {
    if a.dim() == b.dim() {
        let mut out = a.clone();
        out.zip_mut_with(b, |x, &y| *x = op(*x, y));
        Ok(out)
    } else if b.dim() == (1, 1) {
        let scalar = b[[0, 0]];
        Ok(a.mapv(|v| op(v, scalar)))
    } else if a.dim() == (1, 1) {
        let scalar = a[[0, 0]];
        Ok(b.mapv(|v| op(scalar, v)))
    } else {
        Err(ModelPortError::Graph(format!(
            "node '{}': incompatible shapes {:?} and {:?}",
            node.name,
            a.dim(),
            b.dim()
        )))
    }
}

// Independent re-implementation of tokenization from node attributes; the
// training-side vectorizer is deliberately not referenced here.
fn string_vectorize(node: &Node, docs: &[String]) -> Result<Array2<f32>> {
    let vocabulary = node.strs_attribute("vocabulary")?;
    let ngram_min = node.int_attribute("ngram_min")?.max(1) as usize;
    let ngram_max = node.int_attribute("ngram_max")?.max(1) as usize;
    let stop_words = node.strs_attribute("stop_words")?;
    let min_token_length = node.int_attribute("min_token_length")?.max(0) as usize;
    let lowercase = node.int_attribute("lowercase")? != 0;

    let index: HashMap<&str, usize> = vocabulary
        .iter()
        .enumerate()
        .map(|(i, term)| (term.as_str(), i))
        .collect();
    let stop: HashSet<&str> = stop_words.iter().map(|s| s.as_str()).collect();

    let mut counts = Array2::zeros((docs.len(), vocabulary.len()));
    for (row, doc) in docs.iter().enumerate() {
        let text = if lowercase {
            doc.to_lowercase()
        } else {
            doc.clone()
        };
        let tokens: Vec<&str> = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|s| !s.is_empty())
            .filter(|s| s.len() >= min_token_length)
            .filter(|s| !stop.contains(s))
            .collect();

        for n in ngram_min..=ngram_max {
            if tokens.len() < n {
                continue;
            }
            for i in 0..=(tokens.len() - n) {
                let gram = tokens[i..i + n].join(" ");
                if let Some(&idx) = index.get(gram.as_str()) {
                    counts[[row, idx]] += 1.0f32;
                }
            }
        }
    }
    Ok(counts)
}
