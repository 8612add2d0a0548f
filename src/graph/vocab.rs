//! Namespaces and IRI minting.
//!
//! Every term the graph emits is qualified under one of the fixed
//! namespaces below. Free text (investigation names, outcome types,
//! fallback entity names) goes through [`local_name`] first so the same
//! text always produces the same IRI.

use super::{GraphError, named_node};
use oxrdf::NamedNode;

/// A prefix bound to a base IRI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Namespace {
    /// Prefix used in the Turtle prefix table.
    pub prefix: &'static str,
    /// Base IRI that terms are appended to.
    pub iri: &'static str,
}

impl Namespace {
    pub const fn new(prefix: &'static str, iri: &'static str) -> Self {
        Self { prefix, iri }
    }

    /// Qualify a known vocabulary term.
    ///
    /// `local` must already be a valid IRI fragment; use [`Namespace::mint`]
    /// for arbitrary text.
    pub fn term(&self, local: &str) -> NamedNode {
        NamedNode::new_unchecked(format!("{}{}", self.iri, local))
    }

    /// Qualify arbitrary text after normalizing it with [`local_name`].
    pub fn mint(&self, text: &str) -> Result<NamedNode, GraphError> {
        named_node(&self.mint_iri(text))
    }

    /// The IRI string [`Namespace::mint`] would produce.
    pub fn mint_iri(&self, text: &str) -> String {
        format!("{}{}", self.iri, local_name(text))
    }
}

pub const RDF: Namespace = Namespace::new("rdf", "http://www.w3.org/1999/02/22-rdf-syntax-ns#");
pub const RDFS: Namespace = Namespace::new("rdfs", "http://www.w3.org/2000/01/rdf-schema#");
pub const XSD: Namespace = Namespace::new("xsd", "http://www.w3.org/2001/XMLSchema#");
pub const FOAF: Namespace = Namespace::new("foaf", "http://xmlns.com/foaf/0.1/");
pub const EX: Namespace = Namespace::new("ex", "http://example.org/");
pub const DBR: Namespace = Namespace::new("dbr", "http://dbpedia.org/resource/");
pub const DUL: Namespace = Namespace::new(
    "dul",
    "http://www.ontologydesignpatterns.org/ont/dul/DUL.owl#",
);
pub const SCHEMA: Namespace = Namespace::new("schema", "http://schema.org/");
pub const SEM: Namespace = Namespace::new("sem", "http://semanticweb.cs.vu.nl/2009/11/sem/");
pub const TL: Namespace = Namespace::new("tl", "http://purl.org/NET/c4dm/timeline.owl#");
pub const WD: Namespace = Namespace::new("wd", "http://www.wikidata.org/entity/");

/// Prefix table written at the top of every serialized graph.
pub const PREFIXES: [Namespace; 11] = [RDF, RDFS, XSD, FOAF, EX, DBR, DUL, SCHEMA, SEM, TL, WD];

/// Normalize free text into an IRI-safe local name.
///
/// Each whitespace character becomes `_`. Characters that may not appear
/// in an IRI path, and `%` itself, are percent-encoded. Everything else
/// (including non-ASCII letters) is kept as-is.
pub fn local_name(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_whitespace() {
            out.push('_');
        } else if matches!(
            c,
            '<' | '>' | '"' | '{' | '}' | '|' | '\\' | '^' | '`' | '%' | '#' | '[' | ']'
        )
            || c.is_control()
        {
            let mut buf = [0u8; 4];
            for byte in c.encode_utf8(&mut buf).bytes() {
                out.push_str(&format!("%{byte:02X}"));
            }
        } else {
            out.push(c);
        }
    }
    out
}
