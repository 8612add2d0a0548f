//! Investigation Knowledge Graph
//!
//! Append-only triple store plus Turtle serialization. The row template
//! lives in [`builder`], type projection in [`types`], namespaces in
//! [`vocab`].

pub mod builder;
pub mod types;
pub mod vocab;

use oxrdf::{Graph, NamedNode, NamedOrBlankNode, Term, Triple, TripleRef};
use oxttl::{TurtleParser, TurtleSerializer};
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use tracing::info;

/// Errors raised while building or writing the graph.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// A term could not be turned into a valid IRI.
    #[error("Invalid IRI '{iri}': {message}")]
    InvalidIri { iri: String, message: String },

    /// Writing the serialized graph failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A Turtle document could not be parsed.
    #[error("Turtle parse error: {0}")]
    Parse(String),
}

/// Parse an IRI coming from outside the fixed vocabulary.
pub fn named_node(iri: &str) -> Result<NamedNode, GraphError> {
    NamedNode::new(iri).map_err(|e| GraphError::InvalidIri {
        iri: iri.to_string(),
        message: e.to_string(),
    })
}

/// In-memory triple store for one run.
///
/// Statements can only be added; there is no update or delete.
#[derive(Debug, Clone, Default)]
pub struct InvestigationGraph {
    graph: Graph,
}

impl InvestigationGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a statement. Returns `false` if it was already present.
    pub fn add(
        &mut self,
        subject: impl Into<NamedOrBlankNode>,
        predicate: impl Into<NamedNode>,
        object: impl Into<Term>,
    ) -> bool {
        let triple = Triple::new(subject, predicate, object);
        self.graph.insert(&triple)
    }

    pub fn len(&self) -> usize {
        self.graph.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.is_empty()
    }

    pub fn contains<'a>(&self, triple: impl Into<TripleRef<'a>>) -> bool {
        self.graph.contains(triple)
    }

    pub fn iter(&self) -> impl Iterator<Item = TripleRef<'_>> {
        self.graph.iter()
    }

    /// Read-only view of the underlying graph.
    pub fn as_graph(&self) -> &Graph {
        &self.graph
    }

    /// Serialize as Turtle with the fixed prefix table into `writer`.
    pub fn write_turtle<W: Write>(&self, writer: W) -> Result<W, GraphError> {
        let mut serializer = TurtleSerializer::new();
        for ns in vocab::PREFIXES {
            serializer = serializer
                .with_prefix(ns.prefix, ns.iri)
                .map_err(|e| GraphError::InvalidIri {
                    iri: ns.iri.to_string(),
                    message: e.to_string(),
                })?;
        }
        let mut writer = serializer.for_writer(writer);
        for triple in self.graph.iter() {
            writer.serialize_triple(triple)?;
        }
        Ok(writer.finish()?)
    }

    /// Serialize as a Turtle string.
    pub fn to_turtle(&self) -> Result<String, GraphError> {
        let bytes = self.write_turtle(Vec::new())?;
        String::from_utf8(bytes).map_err(|e| GraphError::Parse(e.to_string()))
    }

    /// Write the graph to `path` in a single pass.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), GraphError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        let mut writer = self.write_turtle(BufWriter::new(file))?;
        writer.flush()?;
        info!(
            name: "graph.serialized",
            path = %path.display(),
            triples = self.len(),
            "Graph written as Turtle"
        );
        Ok(())
    }

    /// Parse a Turtle document into a new graph.
    pub fn from_turtle<R: Read>(reader: R) -> Result<Self, GraphError> {
        let mut graph = Graph::new();
        for triple in TurtleParser::new().for_reader(reader) {
            let triple = triple.map_err(|e| GraphError::Parse(e.to_string()))?;
            graph.insert(&triple);
        }
        Ok(Self { graph })
    }
}
