//! Portable computation-graph format
//!
//! A strongly-typed, tagged-node graph representation of a fitted model,
//! serialized into a versioned binary container. Unlike the generic artifact
//! (crate-private object dump), a graph file declares its opset version and
//! its input/output tensors by name, dtype, and shape, so any inference
//! session that understands the opset can execute it without the training
//! code.
//!
//! - [`convert`] turns a [`TrainedModel`](crate::model::TrainedModel) into a
//!   graph.
//! - [`runtime`] loads a graph file and executes it.

pub mod convert;
pub mod runtime;

use crate::error::{ModelPortError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tracing::info;

/// Element type of a graph tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TensorType {
    Float,
    Int64,
    String,
}

impl TensorType {
    pub fn as_str(self) -> &'static str {
        match self {
            TensorType::Float => "float",
            TensorType::Int64 => "int64",
            TensorType::String => "string",
        }
    }
}

/// One dimension of a tensor shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Dim {
    /// Fixed size
    Fixed(i64),
    /// Named symbolic dimension (e.g. "batch")
    Symbolic(String),
}

/// Declared name, dtype, and shape of a graph input or output tensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TensorSpec {
    pub name: String,
    pub dtype: TensorType,
    pub shape: Vec<Dim>,
}

impl TensorSpec {
    pub fn new(name: impl Into<String>, dtype: TensorType, shape: Vec<Dim>) -> Self {
        Self {
            name: name.into(),
            dtype,
            shape,
        }
    }

    pub fn float(name: impl Into<String>, shape: Vec<Dim>) -> Self {
        Self::new(name, TensorType::Float, shape)
    }

    pub fn int64(name: impl Into<String>, shape: Vec<Dim>) -> Self {
        Self::new(name, TensorType::Int64, shape)
    }

    pub fn string(name: impl Into<String>, shape: Vec<Dim>) -> Self {
        Self::new(name, TensorType::String, shape)
    }
}

/// Operator tag of a graph node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpKind {
    /// Tokenize + n-gram count a batch of strings against an embedded
    /// vocabulary
    StringVectorizer,
    MatMul,
    Add,
    Sub,
    Sigmoid,
    /// Concatenate along an axis attribute
    Concat,
    /// Row-wise argmax along an axis attribute
    ArgMax,
}

impl OpKind {
    pub fn as_str(self) -> &'static str {
        match self {
            OpKind::StringVectorizer => "StringVectorizer",
            OpKind::MatMul => "MatMul",
            OpKind::Add => "Add",
            OpKind::Sub => "Sub",
            OpKind::Sigmoid => "Sigmoid",
            OpKind::Concat => "Concat",
            OpKind::ArgMax => "ArgMax",
        }
    }
}

/// Typed attribute value attached to a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Attribute {
    Int(i64),
    Float(f64),
    Str(String),
    Ints(Vec<i64>),
    Floats(Vec<f64>),
    Strs(Vec<String>),
}

/// One operation in the graph: tagged operator, named input/output tensors,
/// and typed attributes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    pub op: OpKind,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub attributes: BTreeMap<String, Attribute>,
}

impl Node {
    pub fn new(
        name: impl Into<String>,
        op: OpKind,
        inputs: Vec<String>,
        outputs: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            op,
            inputs,
            outputs,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: Attribute) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    fn attribute(&self, key: &str) -> Result<&Attribute> {
        self.attributes.get(key).ok_or_else(|| {
            ModelPortError::Graph(format!(
                "node '{}' ({}) is missing attribute '{}'",
                self.name,
                self.op.as_str(),
                key
            ))
        })
    }

    pub fn int_attribute(&self, key: &str) -> Result<i64> {
        match self.attribute(key)? {
            Attribute::Int(v) => Ok(*v),
            other => Err(ModelPortError::Graph(format!(
                "node '{}': attribute '{}' has unexpected type {:?}",
                self.name, key, other
            ))),
        }
    }

    pub fn strs_attribute(&self, key: &str) -> Result<&[String]> {
        match self.attribute(key)? {
            Attribute::Strs(v) => Ok(v),
            other => Err(ModelPortError::Graph(format!(
                "node '{}': attribute '{}' has unexpected type {:?}",
                self.name, key, other
            ))),
        }
    }
}

/// Constant weight tensor embedded in the graph.
///
/// Graph weights are single-precision: converting a model exports its `f64`
/// parameters as `f32`, which is why graph predictions are numerically close
/// to, but not bit-identical with, the native model's.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Initializer {
    pub name: String,
    pub dims: Vec<i64>,
    pub data: Vec<f32>,
}

impl Initializer {
    pub fn new(name: impl Into<String>, dims: Vec<i64>, data: Vec<f32>) -> Self {
        Self {
            name: name.into(),
            dims,
            data,
        }
    }
}

/// The computation graph: declared inputs/outputs, nodes in execution order,
/// and constant initializers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Graph {
    pub name: String,
    pub inputs: Vec<TensorSpec>,
    pub outputs: Vec<TensorSpec>,
    pub nodes: Vec<Node>,
    pub initializers: Vec<Initializer>,
}

impl Graph {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            nodes: Vec::new(),
            initializers: Vec::new(),
        }
    }

    pub fn add_input(mut self, spec: TensorSpec) -> Self {
        self.inputs.push(spec);
        self
    }

    pub fn add_output(mut self, spec: TensorSpec) -> Self {
        self.outputs.push(spec);
        self
    }

    pub fn add_node(mut self, node: Node) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn add_initializer(mut self, init: Initializer) -> Self {
        self.initializers.push(init);
        self
    }
}

/// Versioned on-disk container for a [`Graph`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphModel {
    pub magic: [u8; 4],
    pub ir_version: u32,
    pub opset_version: u32,
    pub producer_name: String,
    pub producer_version: String,
    pub graph: Graph,
}

impl GraphModel {
    const MAGIC: [u8; 4] = *b"MPGF";
    const IR_VERSION: u32 = 1;
    /// Highest opset this crate can produce and execute.
    pub const OPSET_VERSION: u32 = 1;

    pub fn new(graph: Graph) -> Self {
        Self {
            magic: Self::MAGIC,
            ir_version: Self::IR_VERSION,
            opset_version: Self::OPSET_VERSION,
            producer_name: "modelport".to_string(),
            producer_version: env!("CARGO_PKG_VERSION").to_string(),
            graph,
        }
    }

    /// Write the graph file. The buffered handle is flushed and dropped
    /// before returning.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = File::create(path.as_ref())?;
        let mut writer = BufWriter::new(file);
        bincode::serialize_into(&mut writer, self)
            .map_err(|e| ModelPortError::Serialization(format!("failed to write graph: {e}")))?;
        writer.flush()?;

        info!(
            path = %path.as_ref().display(),
            nodes = self.graph.nodes.len(),
            opset = self.opset_version,
            "Saved portable graph"
        );
        Ok(())
    }

    /// Read and validate a graph file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let reader = BufReader::new(file);

        let model: GraphModel = bincode::deserialize_from(reader)
            .map_err(|e| ModelPortError::Serialization(format!("failed to read graph: {e}")))?;

        if model.magic != Self::MAGIC {
            return Err(ModelPortError::Serialization(
                "not a portable graph file (bad magic bytes)".to_string(),
            ));
        }
        if model.opset_version > Self::OPSET_VERSION {
            return Err(ModelPortError::Serialization(format!(
                "graph opset {} is newer than supported opset {}",
                model.opset_version,
                Self::OPSET_VERSION
            )));
        }

        info!(
            path = %path.as_ref().display(),
            producer = %model.producer_name,
            nodes = model.graph.nodes.len(),
            "Loaded portable graph"
        );
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_graph() -> Graph {
        Graph::new("tiny")
            .add_input(TensorSpec::float(
                "x",
                vec![Dim::Symbolic("batch".to_string()), Dim::Fixed(2)],
            ))
            .add_output(TensorSpec::float(
                "y",
                vec![Dim::Symbolic("batch".to_string()), Dim::Fixed(1)],
            ))
            .add_initializer(Initializer::new("w", vec![2, 1], vec![0.5, -0.5]))
            .add_node(Node::new(
                "mul",
                OpKind::MatMul,
                vec!["x".to_string(), "w".to_string()],
                vec!["y".to_string()],
            ))
    }

    #[test]
    fn test_graph_builder() {
        let graph = tiny_graph();
        assert_eq!(graph.inputs.len(), 1);
        assert_eq!(graph.outputs.len(), 1);
        assert_eq!(graph.nodes.len(), 1);
        assert_eq!(graph.initializers.len(), 1);
    }

    #[test]
    fn test_node_attributes() {
        let node = Node::new(
            "concat",
            OpKind::Concat,
            vec!["a".to_string(), "b".to_string()],
            vec!["out".to_string()],
        )
        .with_attribute("axis", Attribute::Int(1));

        assert_eq!(node.int_attribute("axis").unwrap(), 1);
        assert!(node.int_attribute("missing").is_err());
    }

    #[test]
    fn test_graph_model_save_load() {
        let model = GraphModel::new(tiny_graph());
        let file = tempfile::NamedTempFile::new().unwrap();
        model.save(file.path()).unwrap();

        let loaded = GraphModel::load(file.path()).unwrap();
        assert_eq!(loaded.opset_version, GraphModel::OPSET_VERSION);
        assert_eq!(loaded.graph.nodes.len(), 1);
        assert_eq!(loaded.graph.name, "tiny");
    }

    #[test]
    fn test_load_rejects_bad_magic() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), b"garbage bytes that are not a graph").unwrap();
        assert!(matches!(
            GraphModel::load(file.path()),
            Err(ModelPortError::Serialization(_))
        ));
    }

    #[test]
    fn test_load_rejects_newer_opset() {
        let mut model = GraphModel::new(tiny_graph());
        model.opset_version = GraphModel::OPSET_VERSION + 1;
        let file = tempfile::NamedTempFile::new().unwrap();
        model.save(file.path()).unwrap();

        let err = GraphModel::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("newer than supported"));
    }
}
